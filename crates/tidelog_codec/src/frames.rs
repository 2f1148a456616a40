//! Fixed binary frames: file headers, log records, index entries and
//! snapshots.
//!
//! ## Record frame
//!
//! ```text
//! | size (u32) | flags (u32) | time (i64) | index (u64) | payload (size) |
//! 0            4             8            16            24
//! ```
//!
//! ## Index entry frame (24 bytes)
//!
//! ```text
//! | time (i64) | index (u64) | offset (i64) |
//! 0            8             16             24
//! ```
//!
//! ## File header frame (16 bytes)
//!
//! ```text
//! | signature (3 x u8) | version (u8) | flags (u32) | ttl (i64) |
//! 0                    3              4             8           16
//! ```
//!
//! Offsets stored in index entries are measured from byte 0 of the data
//! file and point at the start of the record header, not the payload.

use crate::error::{CodecError, CodecResult};
use crate::raw;

/// Size of the file header frame in both the data and index files.
pub const FILE_HEADER_SIZE: usize = 16;

/// Size of the record header preceding each payload in the data file.
pub const RECORD_HEADER_SIZE: usize = 24;

/// Size of one index entry.
pub const INDEX_ENTRY_SIZE: usize = 24;

/// Size of an encoded snapshot.
pub const SNAPSHOT_SIZE: usize = 24;

/// Signature bytes opening a data file.
pub const LOG_SIGNATURE: [u8; 3] = *b"LOG";

/// Signature bytes opening an index file.
pub const INDEX_SIGNATURE: [u8; 3] = *b"IDX";

/// The kind of tidelog file a header belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// A data file (`LOG`).
    Log,
    /// An index file (`IDX`).
    Index,
}

impl Signature {
    /// Returns the three signature bytes.
    #[must_use]
    pub const fn as_bytes(self) -> [u8; 3] {
        match self {
            Self::Log => LOG_SIGNATURE,
            Self::Index => INDEX_SIGNATURE,
        }
    }

    /// Parses signature bytes, returning `None` for unknown signatures.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 3]) -> Option<Self> {
        match bytes {
            LOG_SIGNATURE => Some(Self::Log),
            INDEX_SIGNATURE => Some(Self::Index),
            _ => None,
        }
    }
}

/// The 16-byte header at the start of each file in a log pair.
///
/// Both files of a pair carry the same version, flags and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// File kind.
    pub signature: Signature,
    /// Format version.
    pub version: u8,
    /// Opaque boolean flags.
    pub flags: u32,
    /// Advisory time-to-live in nanoseconds; 0 disables it.
    pub ttl: i64,
}

impl FileHeader {
    /// Creates a header for the given file kind.
    #[must_use]
    pub const fn new(signature: Signature, version: u8, flags: u32, ttl: i64) -> Self {
        Self {
            signature,
            version,
            flags,
            ttl,
        }
    }

    /// Encodes the header into the first [`FILE_HEADER_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> CodecResult<()> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(CodecError::BufferTooSmall {
                needed: FILE_HEADER_SIZE,
                offset: 0,
                len: buf.len(),
            });
        }
        buf[0..3].copy_from_slice(&self.signature.as_bytes());
        buf[3] = self.version;
        raw::write_u32(buf, 4, self.flags)?;
        raw::write_i64(buf, 8, self.ttl)?;
        Ok(())
    }

    /// Decodes a header, failing with [`CodecError::InvalidSignature`] when
    /// the signature bytes are not `LOG` or `IDX`.
    pub fn decode(buf: &[u8]) -> CodecResult<Self> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(CodecError::BufferTooSmall {
                needed: FILE_HEADER_SIZE,
                offset: 0,
                len: buf.len(),
            });
        }
        let mut sig = [0u8; 3];
        sig.copy_from_slice(&buf[0..3]);
        let signature =
            Signature::from_bytes(sig).ok_or(CodecError::InvalidSignature { found: sig })?;
        Ok(Self {
            signature,
            version: buf[3],
            flags: raw::read_u32(buf, 4)?,
            ttl: raw::read_i64(buf, 8)?,
        })
    }
}

/// One fixed-width entry in the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Nanoseconds since the Unix epoch when the record was written.
    pub time: i64,
    /// The record's dense, 0-based index.
    pub index: u64,
    /// Byte offset of the record header inside the data file.
    pub offset: i64,
}

impl IndexEntry {
    /// Encodes the entry into the first [`INDEX_ENTRY_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> CodecResult<()> {
        raw::write_i64(buf, 0, self.time)?;
        raw::write_u64(buf, 8, self.index)?;
        raw::write_i64(buf, 16, self.offset)?;
        Ok(())
    }

    /// Decodes an entry from the first [`INDEX_ENTRY_SIZE`] bytes of `buf`.
    pub fn decode(buf: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            time: raw::read_i64(buf, 0)?,
            index: raw::read_u64(buf, 8)?,
            offset: raw::read_i64(buf, 16)?,
        })
    }

    /// Advisory expiration check: true when `ttl` is positive and `now`
    /// lies beyond `time + ttl`.
    #[must_use]
    pub fn is_expired(&self, now: i64, ttl: i64) -> bool {
        ttl > 0 && now > self.time.saturating_add(ttl)
    }
}

/// A decoded log record borrowing its payload.
///
/// Cursors hand out `Record` views over a reusable scratch buffer; the
/// borrow ends at the next cursor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Opaque boolean flags.
    pub flags: u32,
    /// Nanoseconds since the Unix epoch when the record was written.
    pub time: i64,
    /// The record's dense, 0-based index.
    pub index: u64,
    /// The payload bytes.
    pub data: &'a [u8],
}

impl<'a> Record<'a> {
    /// Payload length in bytes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn size(&self) -> u32 {
        // Writers cap payloads at u32::MAX, so the cast is lossless.
        self.data.len() as u32
    }

    /// Total encoded frame length: header plus payload.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.data.len()
    }

    /// Encodes the full frame (header + payload) into `buf`, which must be
    /// at least [`Record::encoded_len`] bytes.
    pub fn encode(&self, buf: &mut [u8]) -> CodecResult<usize> {
        let total = self.encoded_len();
        if buf.len() < total {
            return Err(CodecError::BufferTooSmall {
                needed: total,
                offset: 0,
                len: buf.len(),
            });
        }
        encode_record_header(buf, self.size(), self.flags, self.time, self.index)?;
        buf[RECORD_HEADER_SIZE..total].copy_from_slice(self.data);
        Ok(total)
    }

    /// Decodes a full record frame.
    ///
    /// Fails with [`CodecError::InvalidRecordSize`] when the buffer is
    /// shorter than a record header or when the declared payload size does
    /// not match the bytes present.
    pub fn decode(buf: &'a [u8]) -> CodecResult<Self> {
        if buf.len() < RECORD_HEADER_SIZE {
            return Err(CodecError::InvalidRecordSize {
                declared: 0,
                actual: buf.len(),
            });
        }
        let size = raw::read_u32(buf, 0)? as usize;
        let actual = buf.len() - RECORD_HEADER_SIZE;
        if size != actual {
            return Err(CodecError::InvalidRecordSize {
                declared: size,
                actual,
            });
        }
        Ok(Self {
            flags: raw::read_u32(buf, 4)?,
            time: raw::read_i64(buf, 8)?,
            index: raw::read_u64(buf, 16)?,
            data: &buf[RECORD_HEADER_SIZE..],
        })
    }

    /// Advisory expiration check, mirroring [`IndexEntry::is_expired`].
    #[must_use]
    pub fn is_expired(&self, now: i64, ttl: i64) -> bool {
        ttl > 0 && now > self.time.saturating_add(ttl)
    }
}

/// Encodes a 24-byte record header in place.
pub fn encode_record_header(
    buf: &mut [u8],
    size: u32,
    flags: u32,
    time: i64,
    index: u64,
) -> CodecResult<()> {
    raw::write_u32(buf, 0, size)?;
    raw::write_u32(buf, 4, flags)?;
    raw::write_i64(buf, 8, time)?;
    raw::write_u64(buf, 16, index)?;
    Ok(())
}

/// An immutable summary of a log's state: last write time, data file size
/// in bytes, and the rolling 64-bit digest over the index entry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Nanoseconds since the Unix epoch of the last write.
    pub time: i64,
    /// Data file size in bytes, header included.
    pub size: u64,
    /// Rolling digest over the index entry stream.
    pub hash: u64,
}

impl Snapshot {
    /// Encodes the snapshot as a 24-byte little-endian frame.
    #[must_use]
    pub fn encode(&self) -> [u8; SNAPSHOT_SIZE] {
        let mut buf = [0u8; SNAPSHOT_SIZE];
        buf[0..8].copy_from_slice(&self.time.to_le_bytes());
        buf[8..16].copy_from_slice(&self.size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.hash.to_le_bytes());
        buf
    }

    /// Decodes a snapshot frame, failing with
    /// [`CodecError::InvalidSnapshot`] unless the buffer is exactly
    /// [`SNAPSHOT_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> CodecResult<Self> {
        if buf.len() != SNAPSHOT_SIZE {
            return Err(CodecError::InvalidSnapshot {
                expected: SNAPSHOT_SIZE,
                actual: buf.len(),
            });
        }
        Ok(Self {
            time: raw::read_i64(buf, 0)?,
            size: raw::read_u64(buf, 8)?,
            hash: raw::read_u64(buf, 16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrip() {
        for sig in [Signature::Log, Signature::Index] {
            assert_eq!(Signature::from_bytes(sig.as_bytes()), Some(sig));
        }
        assert_eq!(Signature::from_bytes(*b"XXX"), None);
    }

    #[test]
    fn file_header_roundtrip() {
        for sig in [Signature::Log, Signature::Index] {
            let header = FileHeader::new(sig, 1, 0xF00D, 5_000_000_000);
            let mut buf = [0u8; FILE_HEADER_SIZE];
            header.encode(&mut buf).unwrap();
            assert_eq!(FileHeader::decode(&buf).unwrap(), header);
        }
    }

    #[test]
    fn file_header_layout() {
        let header = FileHeader::new(Signature::Log, 1, 2, 3);
        let mut buf = [0u8; FILE_HEADER_SIZE];
        header.encode(&mut buf).unwrap();
        assert_eq!(&buf[0..3], b"LOG");
        assert_eq!(buf[3], 1);
        assert_eq!(buf[4..8], [2, 0, 0, 0]);
        assert_eq!(buf[8..16], [3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn file_header_unknown_signature_fails() {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..3].copy_from_slice(b"WAT");
        let err = FileHeader::decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSignature { found } if &found == b"WAT"));
    }

    #[test]
    fn index_entry_roundtrip() {
        let entry = IndexEntry {
            time: 1_700_000_000_000_000_000,
            index: 42,
            offset: 16 + 42 * 32,
        };
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        entry.encode(&mut buf).unwrap();
        assert_eq!(IndexEntry::decode(&buf).unwrap(), entry);
    }

    #[test]
    fn index_entry_expiry() {
        let entry = IndexEntry {
            time: 100,
            index: 0,
            offset: 16,
        };
        assert!(!entry.is_expired(200, 0));
        assert!(!entry.is_expired(150, 100));
        assert!(entry.is_expired(201, 100));
    }

    #[test]
    fn record_roundtrip() {
        let record = Record {
            flags: 7,
            time: 99,
            index: 3,
            data: b"payload bytes",
        };
        let mut buf = vec![0u8; record.encoded_len()];
        let n = record.encode(&mut buf).unwrap();
        assert_eq!(n, RECORD_HEADER_SIZE + 13);
        assert_eq!(Record::decode(&buf).unwrap(), record);
    }

    #[test]
    fn record_empty_payload() {
        let record = Record {
            flags: 0,
            time: 1,
            index: 0,
            data: b"",
        };
        let mut buf = vec![0u8; record.encoded_len()];
        record.encode(&mut buf).unwrap();
        let decoded = Record::decode(&buf).unwrap();
        assert_eq!(decoded.size(), 0);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn record_short_buffer_fails() {
        let err = Record::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidRecordSize { .. }));
    }

    #[test]
    fn record_size_mismatch_fails() {
        let record = Record {
            flags: 0,
            time: 0,
            index: 0,
            data: b"abcd",
        };
        let mut buf = vec![0u8; record.encoded_len()];
        record.encode(&mut buf).unwrap();
        // Corrupt the declared size.
        buf[0] = 9;
        let err = Record::decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidRecordSize {
                declared: 9,
                actual: 4
            }
        ));
    }

    #[test]
    fn snapshot_roundtrip() {
        let snapshot = Snapshot {
            time: -5,
            size: 176,
            hash: 0xDEAD_BEEF_CAFE_F00D,
        };
        let buf = snapshot.encode();
        assert_eq!(Snapshot::decode(&buf).unwrap(), snapshot);
    }

    #[test]
    fn snapshot_wrong_length_fails() {
        let err = Snapshot::decode(&[0u8; 23]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSnapshot { actual: 23, .. }));
    }
}
