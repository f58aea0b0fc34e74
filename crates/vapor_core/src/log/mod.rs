//! Sequence-numbered batch log.
//!
//! Every non-empty batch becomes one record, appended before the batch is
//! made visible to readers. At open the log is replayed in sequence order to
//! rebuild the index.
//!
//! ## Record Format
//!
//! ```text
//! | magic "VLOG" (4) | version (2) | sequence (8) | length (4) | header crc32 (4) |
//! | payload (N) | crc32 (4) |
//! ```
//!
//! The header checksum covers the first 18 bytes; the trailing one covers
//! everything before it.
//!
//! All integers are little-endian. The payload is `nonce || AES-GCM(batch)`
//! with the sequence number as associated data, and the batch is
//!
//! ```text
//! | count (4) | { key_len (4) | key | has_value (1) | [value_len (4) | value] }* |
//! ```
//!
//! ## Recovery Policy
//!
//! Tolerated (the log simply ends there):
//!
//! - **Torn header**: fewer than a header's worth of bytes at the end of the
//!   file. The tail is discarded at open.
//! - **Torn payload**: a header that passes its checksum but promises more
//!   bytes than the file holds. The tail is discarded at open.
//! - **Zero padding**: a zero header with only zero bytes after it, as left
//!   by an encrypted paged medium.
//!
//! Fatal (open fails, nothing is truncated):
//!
//! - Bad magic, header checksum mismatch, unknown version, CRC mismatch
//! - A zero header followed by non-zero bytes
//! - A sequence number that does not follow its predecessor by one
//! - A payload that fails authentication or does not parse

mod iterator;
mod record;
mod writer;

pub use iterator::{LogRecordIterator, LogTail};
pub use record::{
    decode_batch, encode_batch, BatchCodec, LogRecord, RecordHeader, CRC_SIZE, HEADER_SIZE,
    LOG_MAGIC, LOG_VERSION,
};
pub use writer::LogFile;
