//! Streaming log record iterator.
//!
//! Reads records one by one through a bounded buffer, so replaying a large
//! log never holds more than one record (plus the buffer) in memory.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{LogRecord, RecordHeader, CRC_SIZE, HEADER_SIZE};
use vapor_storage::RandomAccessFile;

/// Read buffer size for streaming iteration.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// How the log ended once the iterator is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    /// The last record ended exactly at the end of the file.
    Clean,
    /// Zero bytes follow the last record (page padding).
    Padding,
    /// A torn record follows the last complete one: either a partial header
    /// at the end of the file, or a valid header whose payload runs past it.
    Truncated,
}

/// A streaming iterator over log records.
///
/// Yields `(offset, record)` pairs. The checksum of every record is verified
/// before it is yielded; payloads are not decrypted here.
///
/// # Error Handling
///
/// - Bad magic, a bad header checksum, an unknown version, CRC mismatches
///   and data after a zero header yield an error and stop
/// - A torn trailing record or zero padding stops cleanly; see [`tail`](Self::tail)
pub struct LogRecordIterator<'a> {
    file: &'a dyn RandomAccessFile,
    total_size: u64,
    /// Offset of the next unread record.
    offset: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
    tail: Option<LogTail>,
    finished: bool,
}

impl<'a> LogRecordIterator<'a> {
    /// Creates an iterator over the whole of `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file size cannot be determined.
    pub fn new(file: &'a dyn RandomAccessFile) -> CoreResult<Self> {
        let total_size = file.stat()?.size;
        Ok(Self {
            file,
            total_size,
            offset: 0,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
            tail: None,
            finished: false,
        })
    }

    /// Offset just past the last complete record read so far.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.offset
    }

    /// How the log ended, once the iterator has returned `None`.
    #[must_use]
    pub fn tail(&self) -> Option<LogTail> {
        self.tail
    }

    /// Ensures at least `min_bytes` are buffered from the current position.
    ///
    /// Returns `false` if the file ends first.
    fn ensure_buffered(&mut self, min_bytes: usize) -> CoreResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let remaining = self.total_size - self.offset;
        if remaining < min_bytes as u64 {
            return Ok(false);
        }

        // Move the unread bytes to the front
        self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let unbuffered = remaining - available as u64;
        let to_read = usize::try_from(unbuffered)
            .unwrap_or(usize::MAX)
            .min(self.buffer.len() - self.buffer_len);
        let read_offset = self.offset + available as u64;
        let window = self.buffer_len..self.buffer_len + to_read;
        let n = self.file.read_at(&mut self.buffer[window], read_offset)?;
        self.buffer_len += n;

        Ok(self.buffer_len >= min_bytes)
    }

    /// Returns `true` if every byte from `from` to the end of the file is zero.
    fn zeros_from(&self, from: u64) -> CoreResult<bool> {
        let mut chunk = vec![0u8; READ_BUFFER_SIZE];
        let mut offset = from;
        while offset < self.total_size {
            let want = usize::try_from(self.total_size - offset)
                .unwrap_or(usize::MAX)
                .min(chunk.len());
            let n = self.file.read_at(&mut chunk[..want], offset)?;
            if n == 0 {
                break;
            }
            if chunk[..n].iter().any(|&b| b != 0) {
                return Ok(false);
            }
            offset += n as u64;
        }
        Ok(true)
    }

    /// Classifies a tail too short to hold a header.
    ///
    /// Only a torn append can leave a partial header at the very end.
    fn classify_short_tail(&self) -> CoreResult<LogTail> {
        if self.offset == self.total_size {
            Ok(LogTail::Clean)
        } else if self.zeros_from(self.offset)? {
            Ok(LogTail::Padding)
        } else {
            Ok(LogTail::Truncated)
        }
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        let record_offset = self.offset;

        if !self.ensure_buffered(HEADER_SIZE)? {
            self.tail = Some(self.classify_short_tail()?);
            return Ok(None);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + HEADER_SIZE]);
        if header_bytes.iter().all(|&b| b == 0) {
            if !self.zeros_from(record_offset)? {
                return Err(CoreError::malformed(format!(
                    "zero header followed by data at offset {record_offset}"
                )));
            }
            self.tail = Some(LogTail::Padding);
            return Ok(None);
        }

        let header = RecordHeader::decode(&header_bytes).map_err(|err| match err {
            CoreError::MalformedRecord { message } => {
                CoreError::malformed(format!("{message} at offset {record_offset}"))
            }
            other => other,
        })?;

        // The header checksum passed, so a record running past the end of
        // the file can only be a torn append.
        let total_len = HEADER_SIZE + header.payload_len + CRC_SIZE;
        if !self.ensure_buffered(total_len)? {
            self.tail = Some(LogTail::Truncated);
            return Ok(None);
        }

        let start = self.buffer_pos;
        let crc_start = start + HEADER_SIZE + header.payload_len;
        let stored_crc = u32::from_le_bytes([
            self.buffer[crc_start],
            self.buffer[crc_start + 1],
            self.buffer[crc_start + 2],
            self.buffer[crc_start + 3],
        ]);
        let computed_crc = crc32fast::hash(&self.buffer[start..crc_start]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = LogRecord {
            sequence: header.sequence,
            payload: self.buffer[start + HEADER_SIZE..crc_start].to_vec(),
        };

        self.buffer_pos += total_len;
        self.offset += total_len as u64;
        Ok(Some((record_offset, record)))
    }
}

impl Iterator for LogRecordIterator<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
