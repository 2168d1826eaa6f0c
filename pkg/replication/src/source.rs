use store::IndexEngine;
use uuid::Uuid;

use crate::message::{Anchor, Message};

/// Synthetic filename used for the full-database transfer (spec.md §4.J
/// "SET_DB_FILENAME, SET_DB_FILEDATA"). `InMemoryEngine` has no real
/// on-disk file layout, so the whole engine snapshot travels as one
/// named blob rather than the original's multi-file set.
const SNAPSHOT_FILENAME: &str = "snapshot.changeset";

/// Drives the source side of spec.md §4.J for one GET_CHANGESETS request,
/// producing the full message sequence to send.
pub fn respond_to_get_changesets(engine: &dyn IndexEngine, path: &str, source_uuid: Uuid, from_revision: u64) -> Vec<Message> {
    let mut messages = Vec::new();

    if source_uuid == engine.uuid() {
        let changeset = engine.emit_changeset(from_revision);
        if !changeset.is_empty() {
            messages.push(Message::Changeset { bytes: changeset });
        }
    } else {
        messages.push(Message::SetDbHeader { uuid: engine.uuid(), revision: engine.revision() });
        messages.push(Message::SetDbFilename { filename: SNAPSHOT_FILENAME.to_string() });
        messages.push(Message::SetDbFileData { payload: engine.emit_changeset(0) });
        messages.push(Message::SetDbFooter { revision: engine.revision() });

        // "the new base" is the revision the file transfer just brought
        // the receiver to, so the tail changeset stream covers nothing
        // more (spec.md §8 boundary: "UUID mismatch with from_revision ==
        // 0 -> full copy plus empty changeset stream").
        let tail = engine.emit_changeset(engine.revision());
        if !tail.is_empty() {
            messages.push(Message::Changeset { bytes: tail });
        }
    }

    messages.push(Message::EndOfChanges {
        anchor: Anchor { uuid: engine.uuid(), revision: engine.revision(), path: path.to_string() },
    });
    messages
}
