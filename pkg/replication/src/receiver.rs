use std::fs;
use std::path::PathBuf;

use store::IndexEngine;
use uuid::Uuid;

use crate::error::ReplicationError;
use crate::message::{Anchor, Message};

pub enum ReceiverEvent {
    Applied,
    /// END_OF_CHANGES: hand the anchor back to the caller so the
    /// connection can switch back to the remote sub-protocol (spec.md
    /// §4.J).
    SwitchToRemoteProtocol(Anchor),
    Failed(String),
}

/// Receiver side of spec.md §4.J. Owns the engine being synchronized and
/// the staging directory file transfers land in.
pub struct Receiver {
    dir: PathBuf,
    pending_filename: Option<String>,
    target_uuid: Option<Uuid>,
    engine: Box<dyn IndexEngine>,
}

impl Receiver {
    pub fn new(dir: PathBuf, engine: Box<dyn IndexEngine>) -> Receiver {
        Receiver { dir, pending_filename: None, target_uuid: None, engine }
    }

    pub fn engine(&self) -> &dyn IndexEngine {
        self.engine.as_ref()
    }

    /// Applies one incoming replication message. `new_engine` constructs
    /// a fresh engine for the target UUID when a SET_DB_FOOTER finalizes
    /// a full-database transfer.
    pub fn apply(
        &mut self,
        msg: Message,
        new_engine: impl FnOnce(Uuid) -> Box<dyn IndexEngine>,
    ) -> Result<ReceiverEvent, ReplicationError> {
        match msg {
            Message::SetDbHeader { uuid, revision: _ } => {
                self.target_uuid = Some(uuid);
                self.pending_filename = None;
                Ok(ReceiverEvent::Applied)
            }
            Message::SetDbFilename { filename } => {
                self.pending_filename = Some(filename);
                Ok(ReceiverEvent::Applied)
            }
            Message::SetDbFileData { payload } => {
                let filename = self
                    .pending_filename
                    .clone()
                    .ok_or_else(|| ReplicationError::Protocol("SET_DB_FILEDATA before SET_DB_FILENAME".into()))?;
                fs::create_dir_all(&self.dir)?;
                let staged = self.dir.join(format!("{filename}.tmp"));
                fs::write(&staged, &payload)?;
                fs::rename(&staged, self.dir.join(&filename))?;
                Ok(ReceiverEvent::Applied)
            }
            Message::SetDbFooter { revision: _ } => {
                let uuid = self
                    .target_uuid
                    .take()
                    .ok_or_else(|| ReplicationError::Protocol("SET_DB_FOOTER before SET_DB_HEADER".into()))?;
                let filename = self
                    .pending_filename
                    .take()
                    .ok_or_else(|| ReplicationError::Protocol("SET_DB_FOOTER before any SET_DB_FILEDATA".into()))?;
                let bytes = fs::read(self.dir.join(&filename))?;
                let mut fresh = new_engine(uuid);
                fresh.apply_changeset(&bytes)?;
                self.engine = fresh;
                Ok(ReceiverEvent::Applied)
            }
            Message::Changeset { bytes } => {
                // "re-frame into a temporary file and apply" (spec.md
                // §4.J) — round-trip through staging even though the
                // in-memory engine doesn't strictly need the disk hop.
                fs::create_dir_all(&self.dir)?;
                let staged = self.dir.join("incoming.changeset.tmp");
                fs::write(&staged, &bytes)?;
                let reread = fs::read(&staged)?;
                fs::remove_file(&staged).ok();
                self.engine.apply_changeset(&reread)?;
                Ok(ReceiverEvent::Applied)
            }
            Message::EndOfChanges { anchor } => Ok(ReceiverEvent::SwitchToRemoteProtocol(anchor)),
            Message::Fail { message } => {
                self.discard_staging();
                Ok(ReceiverEvent::Failed(message))
            }
            Message::GetChangesets { .. } => {
                Err(ReplicationError::Protocol("receiver does not expect GET_CHANGESETS".into()))
            }
        }
    }

    /// Any failure mid-transfer leaves the staged files unusable; discard
    /// them so the next attempt starts clean (spec.md §4.J "Failure
    /// semantics").
    fn discard_staging(&mut self) {
        self.pending_filename = None;
        self.target_uuid = None;
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().map(|ext| ext == "tmp").unwrap_or(false) {
                    let _ = fs::remove_file(path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::respond_to_get_changesets;
    use store::{FieldPath, InMemoryEngine, Value};

    #[test]
    fn seed_test_6_full_copy_matches_source() {
        let mut source = InMemoryEngine::new(Uuid::from_u128(0x55));
        for i in 1..=5u64 {
            source.add_document(i, vec![(FieldPath::from("title"), Value::Str(format!("doc-{i}")))]).unwrap();
        }
        assert_eq!(source.revision(), 5);

        let messages = respond_to_get_changesets(&source, "idx", Uuid::from_u128(0x11), 10);

        let dir = tempfile::tempdir().unwrap();
        let receiver_engine = InMemoryEngine::new(Uuid::from_u128(0x11));
        let mut receiver = Receiver::new(dir.path().to_path_buf(), Box::new(receiver_engine));

        let mut anchor = None;
        for msg in messages {
            match receiver.apply(msg, |uuid| Box::new(InMemoryEngine::new(uuid))).unwrap() {
                ReceiverEvent::SwitchToRemoteProtocol(a) => anchor = Some(a),
                ReceiverEvent::Applied => {}
                ReceiverEvent::Failed(m) => panic!("unexpected failure: {m}"),
            }
        }

        assert_eq!(receiver.engine().uuid(), source.uuid());
        assert_eq!(receiver.engine().revision(), source.revision());
        assert_eq!(receiver.engine().doccount(), source.doccount());
        let anchor = anchor.expect("END_OF_CHANGES must be the final message");
        assert_eq!(anchor.uuid, source.uuid());
        assert_eq!(anchor.revision, source.revision());
    }

    #[test]
    fn matching_uuid_path_applies_only_the_tail_changeset() {
        let mut source = InMemoryEngine::new(Uuid::from_u128(3));
        source.add_document(1, vec![(FieldPath::from("title"), Value::Str("a".into()))]).unwrap();
        let at_one = source.revision();
        source.add_document(2, vec![(FieldPath::from("title"), Value::Str("b".into()))]).unwrap();

        let messages = respond_to_get_changesets(&source, "idx", Uuid::from_u128(3), at_one);

        let dir = tempfile::tempdir().unwrap();
        let mut receiver_engine = InMemoryEngine::new(Uuid::from_u128(3));
        receiver_engine.add_document(1, vec![(FieldPath::from("title"), Value::Str("a".into()))]).unwrap();
        let mut receiver = Receiver::new(dir.path().to_path_buf(), Box::new(receiver_engine));

        for msg in messages {
            let _ = receiver.apply(msg, |uuid| Box::new(InMemoryEngine::new(uuid))).unwrap();
        }

        assert_eq!(receiver.engine().doccount(), 2);
        assert_eq!(receiver.engine().postlist("title:b"), vec![2]);
    }

    #[test]
    fn fail_message_discards_staging() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("partial.tmp"), b"junk").unwrap();

        let mut receiver = Receiver::new(dir.path().to_path_buf(), Box::new(InMemoryEngine::new(Uuid::from_u128(1))));
        let event = receiver.apply(Message::Fail { message: "disk full".into() }, |uuid| Box::new(InMemoryEngine::new(uuid))).unwrap();
        assert!(matches!(event, ReceiverEvent::Failed(_)));
        assert!(!dir.path().join("partial.tmp").exists());
    }
}
