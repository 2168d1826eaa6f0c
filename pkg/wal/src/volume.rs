use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::entry::{decode, encode, Entry};
use crate::error::WalError;
use crate::header::{VolumeHeader, BLOCK_SIZE};

/// A single WAL volume file: one fixed-size [`VolumeHeader`] block followed
/// by framed [`Entry`] records for a contiguous revision range. Grounded on
/// `examples/original_source/src/database/wal.h`'s per-volume storage
/// layout.
///
/// Runs synchronous `std::fs` I/O — callers invoke this from inside a pool
/// worker (spec.md §4.C), never from the reactor thread.
pub struct Volume {
    path: PathBuf,
    file: File,
    header: VolumeHeader,
    write_offset: u32,
}

impl Volume {
    pub fn create(path: impl AsRef<Path>, first_revision: u64, uuid: [u8; 16]) -> Result<Volume, WalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;
        let header = VolumeHeader::new(first_revision, uuid);
        file.write_all(&header.encode())?;
        file.flush()?;
        Ok(Volume { path, file, header: header.clone(), write_offset: header.first_offset })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Volume, WalError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mut buf = vec![0u8; BLOCK_SIZE];
        file.read_exact(&mut buf)?;
        let header = VolumeHeader::decode(&buf).ok_or_else(|| WalError::Corrupt("truncated volume header".into()))?;
        let len = file.metadata()?.len() as u32;
        Ok(Volume { path, file, header, write_offset: len.max(BLOCK_SIZE as u32) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uuid(&self) -> [u8; 16] {
        self.header.uuid
    }

    pub fn first_revision(&self) -> u64 {
        self.header.first_revision
    }

    /// Appends one entry, records its offset in the slot table, and
    /// rewrites just the header block (cheap: one `BLOCK_SIZE` page).
    pub fn append(&mut self, entry: &Entry) -> Result<u32, WalError> {
        let framed = encode(entry);
        let offset = self.write_offset;

        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&framed)?;
        self.write_offset += framed.len() as u32;

        self.header.set_slot(entry.revision, offset);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        self.file.flush()?;

        Ok(offset)
    }

    fn read_frame_at(&mut self, offset: u32) -> Result<(Entry, usize), WalError> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        // An entry's framed size isn't known up front; read a generous
        // chunk and let `decode` tell us how much it actually needed.
        let mut buf = vec![0u8; 64 * 1024];
        let read = self.file.read(&mut buf)?;
        buf.truncate(read);
        decode(&buf)
    }

    pub fn read_revision(&mut self, revision: u64) -> Result<Entry, WalError> {
        let slot = self.header.slot_for(revision).ok_or(WalError::NotFound(revision))?;
        let offset = self.header.slot_table[slot];
        if offset == 0 {
            return Err(WalError::NotFound(revision));
        }
        self.read_frame_at(offset).map(|(e, _)| e)
    }

    /// Binary-searches the slot table for the highest revision with a
    /// non-zero (written) slot, then validates that slot actually decodes
    /// — crash recovery per spec.md §4.E "Recovery": "the WAL's highest
    /// valid slot is determined by binary-searching the last volume until
    /// a slot points to a valid framed entry".
    pub fn highest_valid_revision(&mut self) -> Option<u64> {
        let slots = &self.header.slot_table;
        let mut lo = 0usize;
        let mut hi = slots.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if slots[mid] != 0 {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        // `lo` is now one past the last non-zero slot, assuming a
        // contiguous prefix of written slots (true barring a torn write).
        let mut candidate = lo;
        while candidate > 0 {
            let offset = slots[candidate - 1];
            if offset != 0 && self.read_frame_at(offset).is_ok() {
                return Some(self.header.first_revision + candidate as u64 - 1);
            }
            candidate -= 1;
        }
        None
    }

    /// Replays every entry from `from_revision` (exclusive) onward,
    /// calling `apply` for each. Used both for normal recovery and for
    /// "replay calls the same operation methods but with a flag that
    /// suppresses further WAL writes" (spec.md §4.E) — `apply` is
    /// responsible for honoring that suppression.
    pub fn replay(&mut self, from_revision: u64, mut apply: impl FnMut(&Entry)) -> Result<(), WalError> {
        let Some(highest) = self.highest_valid_revision() else { return Ok(()) };
        for revision in (from_revision + 1)..=highest {
            if let Ok(entry) = self.read_revision(revision) {
                apply(&entry);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;

    #[test]
    fn append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut vol = Volume::create(dir.path().join("0000000001"), 1, [9u8; 16]).unwrap();

        vol.append(&Entry { revision: 1, entry_type: EntryType::ReplaceDocument, payload: b"a".to_vec() }).unwrap();
        vol.append(&Entry { revision: 2, entry_type: EntryType::ReplaceDocument, payload: b"b".to_vec() }).unwrap();
        vol.append(&Entry { revision: 3, entry_type: EntryType::Commit, payload: vec![] }).unwrap();

        assert_eq!(vol.highest_valid_revision(), Some(3));
        assert_eq!(vol.read_revision(2).unwrap().payload, b"b".to_vec());
    }

    #[test]
    fn reopen_recovers_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0000000001");
        {
            let mut vol = Volume::create(&path, 1, [3u8; 16]).unwrap();
            vol.append(&Entry { revision: 1, entry_type: EntryType::Commit, payload: vec![] }).unwrap();
        }
        let mut reopened = Volume::open(&path).unwrap();
        assert_eq!(reopened.uuid(), [3u8; 16]);
        assert_eq!(reopened.highest_valid_revision(), Some(1));
    }

    #[test]
    fn replay_applies_entries_after_a_given_revision() {
        let dir = tempfile::tempdir().unwrap();
        let mut vol = Volume::create(dir.path().join("v"), 1, [0u8; 16]).unwrap();
        for r in 1..=5u64 {
            vol.append(&Entry { revision: r, entry_type: EntryType::ReplaceDocument, payload: vec![r as u8] }).unwrap();
        }
        let mut seen = Vec::new();
        vol.replay(2, |e| seen.push(e.revision)).unwrap();
        assert_eq!(seen, vec![3, 4, 5]);
    }
}
