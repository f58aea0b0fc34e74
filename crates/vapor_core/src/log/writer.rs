//! Append-only batch log.

use crate::error::{CoreError, CoreResult};
use crate::log::iterator::{LogRecordIterator, LogTail};
use crate::log::record::LogRecord;
use crate::types::SequenceNumber;
use vapor_storage::RandomAccessFile;

/// An open batch log positioned for appending.
///
/// The log owns its medium; records are written at the end offset found by
/// replay, never at the physical file size, so zero padding left by an
/// encrypted paged medium is overwritten in place.
///
/// A failed append is rolled back to the previous end. If the rollback fails
/// too, the log refuses further appends until it is reopened.
pub struct LogFile {
    file: Box<dyn RandomAccessFile>,
    end: u64,
    last_sequence: Option<SequenceNumber>,
    sync_on_append: bool,
    poisoned: bool,
}

impl LogFile {
    /// Replays every record of `file` through `apply`, then returns the log
    /// ready for appending.
    ///
    /// A partial trailing record left by a crash is discarded and its bytes
    /// are zeroed. The first record may carry any sequence number above 0;
    /// each later one must follow its predecessor by exactly one.
    ///
    /// # Errors
    ///
    /// Returns an error on a corrupt envelope, a sequence gap, an I/O error,
    /// or any error returned by `apply`.
    pub fn open<F>(
        file: Box<dyn RandomAccessFile>,
        sync_on_append: bool,
        mut apply: F,
    ) -> CoreResult<Self>
    where
        F: FnMut(LogRecord) -> CoreResult<()>,
    {
        let mut last_sequence: Option<SequenceNumber> = None;
        let (end, tail) = {
            let mut iter = LogRecordIterator::new(file.as_ref())?;
            for result in iter.by_ref() {
                let (offset, record) = result?;
                let expected = last_sequence.map(SequenceNumber::next);
                match expected {
                    Some(expected) if record.sequence != expected => {
                        return Err(CoreError::malformed(format!(
                            "sequence gap at offset {offset}: expected {expected}, found {}",
                            record.sequence
                        )));
                    }
                    None if record.sequence.as_u64() == 0 => {
                        return Err(CoreError::malformed(format!(
                            "record at offset {offset} has sequence 0"
                        )));
                    }
                    _ => {}
                }
                last_sequence = Some(record.sequence);
                apply(record)?;
            }
            (iter.end_offset(), iter.tail())
        };

        if tail == Some(LogTail::Truncated) {
            tracing::warn!(offset = end, "discarding truncated record at end of log");
            Self::zero_tail(file.as_ref(), end)?;
        }

        Ok(Self {
            file,
            end,
            last_sequence,
            sync_on_append,
            poisoned: false,
        })
    }

    /// Starts an empty log on `file`, discarding anything it held.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be truncated.
    pub fn create(file: Box<dyn RandomAccessFile>, sync_on_append: bool) -> CoreResult<Self> {
        file.truncate(0)?;
        Ok(Self {
            file,
            end: 0,
            last_sequence: None,
            sync_on_append,
            poisoned: false,
        })
    }

    /// Cuts the medium back to `end` and zeroes whatever it keeps past it.
    ///
    /// Paged media round truncation up to whole pages, so the tail of the
    /// last page still has to be overwritten.
    fn zero_tail(file: &dyn RandomAccessFile, end: u64) -> CoreResult<()> {
        file.truncate(end)?;
        let size = file.stat()?.size;
        if size > end {
            let len = usize::try_from(size - end)
                .map_err(|_| CoreError::malformed("log tail too large"))?;
            file.write_at(&vec![0u8; len], end)?;
        }
        file.sync()?;
        Ok(())
    }

    /// Appends `record`, syncing first if configured to.
    ///
    /// Returns the offset the record was written at.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the sequence number does not
    /// follow the last record or the log is poisoned, or the I/O error that
    /// made the append fail. Nothing of a failed append stays on the medium.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<u64> {
        if self.poisoned {
            return Err(CoreError::invalid_operation(
                "log has an unrepaired failed append; reopen the store",
            ));
        }

        let valid = match self.last_sequence {
            Some(last) => record.sequence == last.next(),
            None => record.sequence.as_u64() > 0,
        };
        if !valid {
            return Err(CoreError::invalid_operation(format!(
                "cannot append {} after {:?}",
                record.sequence, self.last_sequence
            )));
        }

        let data = record.encode()?;
        if let Err(err) = self.write_record(&data) {
            match Self::zero_tail(self.file.as_ref(), self.end) {
                Ok(()) => {
                    tracing::warn!(offset = self.end, error = %err, "rolled back failed append");
                }
                Err(rollback) => {
                    tracing::error!(
                        offset = self.end,
                        error = %err,
                        rollback_error = %rollback,
                        "could not roll back failed append"
                    );
                    self.poisoned = true;
                }
            }
            return Err(err);
        }

        let offset = self.end;
        self.end += data.len() as u64;
        self.last_sequence = Some(record.sequence);
        Ok(offset)
    }

    fn write_record(&self, data: &[u8]) -> CoreResult<()> {
        self.file.write_at(data, self.end)?;
        if self.sync_on_append {
            self.file.sync()?;
        }
        Ok(())
    }

    /// Whether a failed append could not be rolled back.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Flushes all appended records to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium fails to sync.
    pub fn sync(&self) -> CoreResult<()> {
        self.file.sync()?;
        Ok(())
    }

    /// Offset the next record will be written at.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.end
    }

    /// Sequence number of the last record, if any.
    #[must_use]
    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        self.last_sequence
    }

    /// Gives back the medium without syncing it.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn RandomAccessFile> {
        self.file
    }
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFile")
            .field("end", &self.end)
            .field("last_sequence", &self.last_sequence)
            .field("sync_on_append", &self.sync_on_append)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
