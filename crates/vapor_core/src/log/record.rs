//! Log record envelope and batch serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::{Item, SequenceNumber};
use vapor_storage::{Cipher, EncryptionKey};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"VLOG";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + sequence (8) + length (4) + header crc32 (4)
pub const HEADER_SIZE: usize = 22;

/// Header bytes covered by the header checksum.
const HEADER_BODY_SIZE: usize = HEADER_SIZE - CRC_SIZE;

/// Trailing CRC32 size.
pub const CRC_SIZE: usize = 4;

/// One durable, encrypted batch.
///
/// `payload` is `nonce || AES-GCM(batch)` with the sequence number bound as
/// associated data, so a record cannot be replayed under another sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence number of the batch.
    pub sequence: SequenceNumber,
    /// Encrypted batch.
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Serializes the record with its envelope and checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not fit the 4-byte length field.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let len = u32::try_from(self.payload.len())
            .map_err(|_| CoreError::invalid_operation("log record payload too large"))?;

        let mut data = Vec::with_capacity(self.encoded_len());
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        data.extend_from_slice(&len.to_le_bytes());
        let header_crc = crc32fast::hash(&data);
        data.extend_from_slice(&header_crc.to_le_bytes());
        data.extend_from_slice(&self.payload);

        // CRC32 over everything before it
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Size of the encoded record in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }
}

/// Parsed fixed-size record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Format version.
    pub version: u16,
    /// Sequence number.
    pub sequence: SequenceNumber,
    /// Payload length in bytes.
    pub payload_len: usize,
}

impl RecordHeader {
    /// Parses and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] for bad magic, a header
    /// checksum mismatch, or an unknown version.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> CoreResult<Self> {
        if bytes[0..4] != LOG_MAGIC {
            return Err(CoreError::malformed("invalid magic"));
        }

        let stored_crc = u32::from_le_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]);
        let computed_crc = crc32fast::hash(&bytes[..HEADER_BODY_SIZE]);
        if stored_crc != computed_crc {
            return Err(CoreError::malformed(format!(
                "header checksum mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version == 0 || version > LOG_VERSION {
            return Err(CoreError::malformed(format!("unsupported version {version}")));
        }

        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&bytes[6..14]);
        let payload_len = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);

        Ok(Self {
            version,
            sequence: SequenceNumber::new(u64::from_le_bytes(sequence)),
            payload_len: payload_len as usize,
        })
    }
}

/// Serializes items as `count | { key_len | key | has_value | [value_len | value] }*`.
///
/// # Errors
///
/// Returns an error if any length does not fit in a `u32`.
pub fn encode_batch(items: &[Item]) -> CoreResult<Vec<u8>> {
    let too_large = || CoreError::invalid_operation("batch field exceeds u32 length");

    let mut buf = Vec::new();
    let count = u32::try_from(items.len()).map_err(|_| too_large())?;
    buf.extend_from_slice(&count.to_le_bytes());

    for item in items {
        let key_len = u32::try_from(item.key.len()).map_err(|_| too_large())?;
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(&item.key);
        match &item.value {
            Some(value) => {
                buf.push(1);
                let value_len = u32::try_from(value.len()).map_err(|_| too_large())?;
                buf.extend_from_slice(&value_len.to_le_bytes());
                buf.extend_from_slice(value);
            }
            None => buf.push(0),
        }
    }

    Ok(buf)
}

/// Parses the output of [`encode_batch`].
///
/// # Errors
///
/// Returns [`CoreError::MalformedRecord`] on truncation, an invalid
/// presence flag, or trailing bytes.
pub fn decode_batch(data: &[u8]) -> CoreResult<Vec<Item>> {
    let mut reader = ByteReader { data, pos: 0 };

    let count = reader.u32()? as usize;
    // Each item needs at least 5 bytes; cap the allocation by what is there.
    let mut items = Vec::with_capacity(count.min(data.len() / 5));
    for _ in 0..count {
        let key_len = reader.u32()? as usize;
        let key = reader.take(key_len)?.to_vec();
        let value = match reader.u8()? {
            0 => None,
            1 => {
                let value_len = reader.u32()? as usize;
                Some(reader.take(value_len)?.to_vec())
            }
            flag => {
                return Err(CoreError::malformed(format!("invalid value flag {flag}")));
            }
        };
        items.push(Item { key, value });
    }

    if reader.pos != data.len() {
        return Err(CoreError::malformed(format!(
            "trailing bytes in batch: decoded {} of {}",
            reader.pos,
            data.len()
        )));
    }
    Ok(items)
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| CoreError::malformed("unexpected end of batch"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Encrypts batches into log records and back.
#[derive(Debug, Clone)]
pub struct BatchCodec {
    cipher: Cipher,
}

impl BatchCodec {
    /// Creates a codec for `key`.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Cipher::new(key),
        }
    }

    /// Serializes and encrypts `items` as the record for `sequence`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or encryption fails.
    pub fn seal(&self, sequence: SequenceNumber, items: &[Item]) -> CoreResult<LogRecord> {
        let plain = encode_batch(items)?;
        let payload = self
            .cipher
            .seal_with_aad(&plain, &sequence.as_u64().to_le_bytes())?;
        Ok(LogRecord { sequence, payload })
    }

    /// Decrypts and parses a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DecryptionFailed`] for a wrong key, a tampered
    /// payload, or a payload moved to another sequence number, and
    /// [`CoreError::MalformedRecord`] if the plaintext does not parse.
    pub fn open(&self, record: &LogRecord) -> CoreResult<Vec<Item>> {
        let plain = self
            .cipher
            .open_with_aad(&record.payload, &record.sequence.as_u64().to_le_bytes())
            .map_err(|_| {
                CoreError::decryption_failed(format!(
                    "log record {} failed authentication",
                    record.sequence
                ))
            })?;
        decode_batch(&plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(byte: u8) -> BatchCodec {
        BatchCodec::new(&EncryptionKey::from_bytes(&[byte; 32]).unwrap())
    }

    fn sample() -> Vec<Item> {
        vec![
            Item::put("k1", "v1"),
            Item::tombstone("gone"),
            Item::put("", ""),
            Item::put(vec![0xFF; 3], vec![0u8; 300]),
        ]
    }

    #[test]
    fn batch_encoding_layout() {
        let encoded = encode_batch(&[Item::put("ab", "c"), Item::tombstone("d")]).unwrap();
        assert_eq!(
            encoded,
            [
                &2u32.to_le_bytes()[..],
                &2u32.to_le_bytes(),
                b"ab",
                &[1u8],
                &1u32.to_le_bytes(),
                b"c",
                &1u32.to_le_bytes(),
                b"d",
                &[0u8],
            ]
            .concat()
        );
        assert_eq!(decode_batch(&encoded).unwrap().len(), 2);
    }

    #[test]
    fn batch_preserves_empty_keys_and_tombstones() {
        let items = sample();
        assert_eq!(decode_batch(&encode_batch(&items).unwrap()).unwrap(), items);
    }

    #[test]
    fn truncated_batch_is_malformed() {
        let encoded = encode_batch(&sample()).unwrap();
        for cut in [0, 3, 10, encoded.len() - 1] {
            let err = decode_batch(&encoded[..cut]).unwrap_err();
            assert!(matches!(err, CoreError::MalformedRecord { .. }), "cut {cut}");
        }
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let mut encoded = encode_batch(&sample()).unwrap();
        encoded.push(0);
        assert!(matches!(
            decode_batch(&encoded),
            Err(CoreError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn bad_value_flag_is_malformed() {
        let mut encoded = encode_batch(&[Item::put("k", "v")]).unwrap();
        encoded[9] = 7;
        assert!(decode_batch(&encoded).unwrap_err().to_string().contains("flag 7"));
    }

    #[test]
    fn huge_count_does_not_preallocate() {
        let encoded = u32::MAX.to_le_bytes();
        assert!(decode_batch(&encoded).is_err());
    }

    #[test]
    fn envelope_layout() {
        let record = LogRecord {
            sequence: SequenceNumber::new(7),
            payload: vec![0xAA; 5],
        };
        let encoded = record.encode().unwrap();

        assert_eq!(encoded.len(), record.encoded_len());
        assert_eq!(&encoded[0..4], b"VLOG");
        let header: [u8; HEADER_SIZE] = encoded[..HEADER_SIZE].try_into().unwrap();
        let parsed = RecordHeader::decode(&header).unwrap();
        assert_eq!(parsed.sequence, SequenceNumber::new(7));
        assert_eq!(parsed.payload_len, 5);

        let crc_at = HEADER_SIZE + 5;
        let stored = u32::from_le_bytes(encoded[crc_at..].try_into().unwrap());
        assert_eq!(stored, crc32fast::hash(&encoded[..crc_at]));
    }

    #[test]
    fn header_rejects_bad_magic_and_version() {
        let mut header = [0u8; HEADER_SIZE];
        assert!(RecordHeader::decode(&header).is_err());

        header[0..4].copy_from_slice(b"VLOG");
        header[4..6].copy_from_slice(&2u16.to_le_bytes());
        let crc = crc32fast::hash(&header[..HEADER_BODY_SIZE]);
        header[HEADER_BODY_SIZE..].copy_from_slice(&crc.to_le_bytes());
        assert!(RecordHeader::decode(&header)
            .unwrap_err()
            .to_string()
            .contains("version 2"));
    }

    #[test]
    fn header_checksum_covers_length() {
        let record = LogRecord {
            sequence: SequenceNumber::new(1),
            payload: vec![1; 40],
        };
        let encoded = record.encode().unwrap();
        let mut header: [u8; HEADER_SIZE] = encoded[..HEADER_SIZE].try_into().unwrap();
        assert!(RecordHeader::decode(&header).is_ok());

        header[17] = 0x7F;
        let err = RecordHeader::decode(&header).unwrap_err();
        assert!(matches!(err, CoreError::MalformedRecord { .. }));
        assert!(err.to_string().contains("header checksum"));
    }

    #[test]
    fn sealed_record_opens_with_same_key() {
        let items = sample();
        let record = codec(1).seal(SequenceNumber::new(3), &items).unwrap();
        assert_eq!(codec(1).open(&record).unwrap(), items);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let record = codec(1).seal(SequenceNumber::new(1), &sample()).unwrap();
        assert!(codec(2).open(&record).unwrap_err().is_decryption_failed());
    }

    #[test]
    fn moved_sequence_fails_decryption() {
        let mut record = codec(1).seal(SequenceNumber::new(1), &sample()).unwrap();
        record.sequence = SequenceNumber::new(2);
        assert!(codec(1).open(&record).unwrap_err().is_decryption_failed());
    }
}
