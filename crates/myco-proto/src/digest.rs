//! LEB128-varint digest codec: sequences of `(id, version)` pairs.
//!
//! Wire format: a little-endian `u16` count, followed by `count` entries of
//! `leb128(id)` then `leb128(version)`.

use crate::errors::{ProtocolError, Result};

/// One `(id, version)` pair as carried in a Sync/Control digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigestEntry {
    /// Service id.
    pub id: u64,
    /// Packed HLC version.
    pub version: u64,
}

fn write_varint(value: u64, buf: &mut [u8], cursor: &mut usize) -> Result<()> {
    let mut value = value;
    loop {
        if *cursor >= buf.len() {
            return Err(ProtocolError::BufferFull);
        }
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf[*cursor] = byte;
        *cursor += 1;
        if value == 0 {
            return Ok(());
        }
    }
}

fn read_varint(buf: &[u8], cursor: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if *cursor >= buf.len() || shift >= 64 {
            return Err(ProtocolError::DigestCorrupt);
        }
        let byte = buf[*cursor];
        *cursor += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Encode `entries` into `buf`, returning the number of bytes used.
///
/// # Errors
///
/// Returns [`ProtocolError::BufferFull`] if `buf` cannot hold the count
/// header or any entry.
pub fn encode(entries: &[DigestEntry], buf: &mut [u8]) -> Result<usize> {
    let count: u16 = entries.len().try_into().map_err(|_| ProtocolError::BufferFull)?;
    if buf.len() < 2 {
        return Err(ProtocolError::BufferFull);
    }
    buf[0..2].copy_from_slice(&count.to_le_bytes());
    let mut cursor = 2usize;
    for entry in entries {
        write_varint(entry.id, buf, &mut cursor)?;
        write_varint(entry.version, buf, &mut cursor)?;
    }
    Ok(cursor)
}

/// Decode entries from `buf` into `out`, returning the number decoded.
///
/// # Errors
///
/// Returns [`ProtocolError::DigestCorrupt`] if the declared count exceeds
/// `out.len()`, or if a varint runs past the end of `buf`.
pub fn decode(buf: &[u8], out: &mut [DigestEntry]) -> Result<usize> {
    if buf.len() < 2 {
        return Err(ProtocolError::DigestCorrupt);
    }
    let count = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    if count > out.len() {
        return Err(ProtocolError::DigestCorrupt);
    }
    let mut cursor = 2usize;
    for slot in out.iter_mut().take(count) {
        let id = read_varint(buf, &mut cursor)?;
        let version = read_varint(buf, &mut cursor)?;
        *slot = DigestEntry { id, version };
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_basic_entries() {
        let entries = [
            DigestEntry { id: 1, version: 2 },
            DigestEntry { id: 300, version: 70_000 },
            DigestEntry { id: u64::MAX, version: 0 },
        ];
        let mut buf = [0u8; 64];
        let used = encode(&entries, &mut buf).unwrap();
        let mut out = [DigestEntry::default(); 8];
        let count = decode(&buf[..used], &mut out).unwrap();
        assert_eq!(count, entries.len());
        assert_eq!(&out[..count], &entries[..]);
    }

    #[test]
    fn small_ids_pack_tighter_than_16_bytes_each() {
        let entries: Vec<DigestEntry> =
            (0..120).map(|i| DigestEntry { id: i, version: i * 2 }).collect();
        let mut buf = [0u8; 2048];
        let used = encode(&entries, &mut buf).unwrap();
        assert!(used < 120 * 16);
        let mut out = vec![DigestEntry::default(); 120];
        let count = decode(&buf[..used], &mut out).unwrap();
        assert_eq!(count, 120);
        assert_eq!(out, entries);
    }

    #[test]
    fn decode_rejects_count_overflowing_output() {
        let mut buf = [0u8; 4];
        buf[0..2].copy_from_slice(&10u16.to_le_bytes());
        let mut out = [DigestEntry::default(); 2];
        assert!(matches!(decode(&buf, &mut out), Err(ProtocolError::DigestCorrupt)));
    }

    #[test]
    fn decode_rejects_truncated_varint() {
        let mut buf = [0u8; 3];
        buf[0..2].copy_from_slice(&1u16.to_le_bytes());
        buf[2] = 0x80; // continuation bit set, but no more bytes
        let mut out = [DigestEntry::default(); 2];
        assert!(matches!(decode(&buf, &mut out), Err(ProtocolError::DigestCorrupt)));
    }
}
