use core::varint;

use crate::error::WalError;

/// Grounded on `examples/original_source/src/database/wal.h`'s
/// `DatabaseWAL::Type` enum, renamed to spell out the operation it records
/// rather than the original's abbreviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryType {
    Commit = 0,
    ReplaceDocument = 1,
    DeleteDocument = 2,
    SetMetadata = 3,
    AddSpelling = 4,
    RemoveSpelling = 5,
}

impl EntryType {
    pub fn from_u8(b: u8) -> Option<EntryType> {
        match b {
            0 => Some(EntryType::Commit),
            1 => Some(EntryType::ReplaceDocument),
            2 => Some(EntryType::DeleteDocument),
            3 => Some(EntryType::SetMetadata),
            4 => Some(EntryType::AddSpelling),
            5 => Some(EntryType::RemoveSpelling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub revision: u64,
    pub entry_type: EntryType,
    pub payload: Vec<u8>,
}

const HEADER_MAGIC: u8 = 0xA0;
const FOOTER_MAGIC: u8 = 0xA1;

/// Frames one entry as `{magic=0xA0, flags, length_u32} payload
/// {checksum_u32, magic=0xA1}` (spec.md §6 "WAL on-disk layout"). The
/// entry's revision and type are varint-prefixed fields inside `payload`
/// rather than part of the fixed frame header, so the frame shape matches
/// spec.md exactly while still carrying everything `Entry` needs.
pub fn encode(entry: &Entry) -> Vec<u8> {
    let mut payload = Vec::with_capacity(entry.payload.len() + 16);
    varint::encode(entry.revision, &mut payload);
    payload.push(entry.entry_type as u8);
    payload.extend_from_slice(&entry.payload);

    let mut framed = Vec::with_capacity(payload.len() + 10);
    framed.push(HEADER_MAGIC);
    framed.push(0); // flags, unused
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(&payload);
    let checksum = crc32c::crc32c(&payload);
    framed.extend_from_slice(&checksum.to_le_bytes());
    framed.push(FOOTER_MAGIC);
    framed
}

/// Decodes one framed entry starting at `buf[0]`. Returns the entry and
/// the number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(Entry, usize), WalError> {
    if buf.len() < 10 {
        return Err(WalError::Corrupt("frame shorter than header+footer".into()));
    }
    if buf[0] != HEADER_MAGIC {
        return Err(WalError::Corrupt(format!("bad header magic {:#x}", buf[0])));
    }
    let length = u32::from_le_bytes(buf[2..6].try_into().unwrap()) as usize;
    let payload_start = 6;
    let payload_end = payload_start + length;
    let frame_end = payload_end + 5;
    if buf.len() < frame_end {
        return Err(WalError::Corrupt("truncated frame".into()));
    }

    let payload = &buf[payload_start..payload_end];
    let checksum = u32::from_le_bytes(buf[payload_end..payload_end + 4].try_into().unwrap());
    let footer_magic = buf[payload_end + 4];
    if footer_magic != FOOTER_MAGIC {
        return Err(WalError::Corrupt(format!("bad footer magic {:#x}", footer_magic)));
    }
    if crc32c::crc32c(payload) != checksum {
        return Err(WalError::Corrupt("checksum mismatch".into()));
    }

    let (revision, n) = varint::decode(payload).map_err(|e| WalError::Corrupt(e.to_string()))?;
    let entry_type = EntryType::from_u8(*payload.get(n).ok_or_else(|| WalError::Corrupt("missing entry type".into()))?)
        .ok_or_else(|| WalError::Corrupt("unknown entry type".into()))?;
    let entry = Entry {
        revision,
        entry_type,
        payload: payload[n + 1..].to_vec(),
    };
    Ok((entry, frame_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let entry = Entry { revision: 42, entry_type: EntryType::ReplaceDocument, payload: b"doc-bytes".to_vec() };
        let framed = encode(&entry);
        let (decoded, consumed) = decode(&framed).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, framed.len());
    }

    #[test]
    fn detects_checksum_corruption() {
        let entry = Entry { revision: 1, entry_type: EntryType::Commit, payload: vec![] };
        let mut framed = encode(&entry);
        let last = framed.len() - 1;
        framed[last - 2] ^= 0xFF; // flip a checksum byte
        assert!(decode(&framed).is_err());
    }

    #[test]
    fn two_entries_concatenate() {
        let a = Entry { revision: 1, entry_type: EntryType::Commit, payload: vec![] };
        let b = Entry { revision: 2, entry_type: EntryType::DeleteDocument, payload: b"id".to_vec() };
        let mut buf = encode(&a);
        buf.extend_from_slice(&encode(&b));

        let (decoded_a, n) = decode(&buf).unwrap();
        assert_eq!(decoded_a, a);
        let (decoded_b, _) = decode(&buf[n..]).unwrap();
        assert_eq!(decoded_b, b);
    }
}
