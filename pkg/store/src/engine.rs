use std::collections::BTreeMap;

use uuid::Uuid;

use crate::document::{FieldPath, Value};
use crate::error::EngineError;

/// The opaque index-library boundary spec.md §1 defers to (see §6A of the
/// expanded spec). A real deployment substitutes a real search engine here;
/// this crate only needs the contract to be honest.
pub trait IndexEngine {
    fn doccount(&self) -> u64;
    fn uuid(&self) -> Uuid;
    fn revision(&self) -> u64;
    fn add_document(&mut self, docid: u64, fields: Vec<(FieldPath, Value)>) -> Result<(), EngineError>;
    fn replace_document(&mut self, docid: u64, fields: Vec<(FieldPath, Value)>) -> Result<(), EngineError>;
    fn delete_document(&mut self, docid: u64) -> Result<(), EngineError>;
    fn termlist(&self, docid: u64) -> Vec<String>;
    fn postlist(&self, term: &str) -> Vec<u64>;
    fn value(&self, docid: u64, slot: u32) -> Option<Vec<u8>>;
    fn commit(&mut self) -> Result<(), EngineError>;
    fn emit_changeset(&self, from_revision: u64) -> Vec<u8>;
    fn apply_changeset(&mut self, changeset: &[u8]) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, PartialEq)]
struct StoredDocument {
    fields: Vec<(FieldPath, Value)>,
    revision: u64,
}

/// A single changeset record: one document mutation, tagged with the
/// revision it was committed at. `emit_changeset`/`apply_changeset` work
/// over a serialized run of these (spec.md §4.J "CHANGESET" frames).
#[derive(Debug, Clone, PartialEq)]
enum ChangeOp {
    Upsert(u64, Vec<(FieldPath, Value)>),
    Delete(u64),
}

#[derive(Debug, Clone, PartialEq)]
struct ChangeRecord {
    revision: u64,
    op: ChangeOp,
}

/// `BTreeMap`-backed [`IndexEngine`] sufficient to exercise every
/// operation, invariant, and round-trip property in spec.md §8, per §6A's
/// explicit scope: "A single concrete `InMemoryEngine`... not a production
/// search engine".
pub struct InMemoryEngine {
    uuid: Uuid,
    revision: u64,
    documents: BTreeMap<u64, StoredDocument>,
    postings: BTreeMap<String, Vec<u64>>,
    log: Vec<ChangeRecord>,
}

impl InMemoryEngine {
    pub fn new(uuid: Uuid) -> Self {
        InMemoryEngine {
            uuid,
            revision: 0,
            documents: BTreeMap::new(),
            postings: BTreeMap::new(),
            log: Vec::new(),
        }
    }

    fn reindex(&mut self, docid: u64, fields: &[(FieldPath, Value)]) {
        self.unindex(docid);
        for (path, value) in fields {
            let term = format!("{}:{}", path.0, term_text(value));
            self.postings.entry(term).or_default().push(docid);
        }
    }

    fn unindex(&mut self, docid: u64) {
        for postings in self.postings.values_mut() {
            postings.retain(|&d| d != docid);
        }
    }

    fn put(&mut self, docid: u64, fields: Vec<(FieldPath, Value)>) {
        self.revision += 1;
        self.reindex(docid, &fields);
        self.log.push(ChangeRecord { revision: self.revision, op: ChangeOp::Upsert(docid, fields.clone()) });
        self.documents.insert(docid, StoredDocument { fields, revision: self.revision });
    }
}

fn term_text(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.clone(),
        Value::Geo { lat, lon } => format!("{lat},{lon}"),
    }
}

impl IndexEngine for InMemoryEngine {
    fn doccount(&self) -> u64 {
        self.documents.len() as u64
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn add_document(&mut self, docid: u64, fields: Vec<(FieldPath, Value)>) -> Result<(), EngineError> {
        if self.documents.contains_key(&docid) {
            return Err(EngineError::VersionConflict(docid));
        }
        self.put(docid, fields);
        Ok(())
    }

    fn replace_document(&mut self, docid: u64, fields: Vec<(FieldPath, Value)>) -> Result<(), EngineError> {
        self.put(docid, fields);
        Ok(())
    }

    fn delete_document(&mut self, docid: u64) -> Result<(), EngineError> {
        if self.documents.remove(&docid).is_none() {
            return Err(EngineError::NotFound(docid));
        }
        self.revision += 1;
        self.unindex(docid);
        self.log.push(ChangeRecord { revision: self.revision, op: ChangeOp::Delete(docid) });
        Ok(())
    }

    fn termlist(&self, docid: u64) -> Vec<String> {
        match self.documents.get(&docid) {
            Some(doc) => doc.fields.iter().map(|(p, v)| format!("{}:{}", p.0, term_text(v))).collect(),
            None => Vec::new(),
        }
    }

    fn postlist(&self, term: &str) -> Vec<u64> {
        self.postings.get(term).cloned().unwrap_or_default()
    }

    fn value(&self, docid: u64, slot: u32) -> Option<Vec<u8>> {
        let doc = self.documents.get(&docid)?;
        let (_, value) = doc.fields.get(slot as usize)?;
        Some(term_text(value).into_bytes())
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Serializes every logged change with `revision > from_revision` as
    /// `varint(revision) varint(op_tag) ...` records, concatenated. This
    /// stands in for spec.md §4.J's CHANGESET frames at the engine layer;
    /// pkg/replication frames these bytes onto the wire unmodified.
    fn emit_changeset(&self, from_revision: u64) -> Vec<u8> {
        let mut out = Vec::new();
        for record in &self.log {
            if record.revision <= from_revision {
                continue;
            }
            core::varint::encode(record.revision, &mut out);
            match &record.op {
                ChangeOp::Upsert(docid, fields) => {
                    out.push(0);
                    core::varint::encode(*docid, &mut out);
                    core::varint::encode(fields.len() as u64, &mut out);
                    for (path, value) in fields {
                        core::varint::encode_string(&path.0, &mut out);
                        core::varint::encode_string(&term_text(value), &mut out);
                    }
                }
                ChangeOp::Delete(docid) => {
                    out.push(1);
                    core::varint::encode(*docid, &mut out);
                }
            }
        }
        out
    }

    fn apply_changeset(&mut self, changeset: &[u8]) -> Result<(), EngineError> {
        let mut pos = 0usize;
        while pos < changeset.len() {
            let (revision, n) = core::varint::decode(&changeset[pos..])
                .map_err(|e| EngineError::Serialisation(e.to_string()))?;
            pos += n;
            let tag = *changeset.get(pos).ok_or_else(|| EngineError::Serialisation("truncated changeset".into()))?;
            pos += 1;
            match tag {
                0 => {
                    let (docid, n) = core::varint::decode(&changeset[pos..])
                        .map_err(|e| EngineError::Serialisation(e.to_string()))?;
                    pos += n;
                    let (count, n) = core::varint::decode(&changeset[pos..])
                        .map_err(|e| EngineError::Serialisation(e.to_string()))?;
                    pos += n;
                    let mut fields = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        let (path, n) = core::varint::decode_string(&changeset[pos..])
                            .map_err(|e| EngineError::Serialisation(e.to_string()))?;
                        pos += n;
                        let (text, n) = core::varint::decode_string(&changeset[pos..])
                            .map_err(|e| EngineError::Serialisation(e.to_string()))?;
                        pos += n;
                        fields.push((FieldPath(path), Value::Str(text)));
                    }
                    self.revision = self.revision.max(revision);
                    self.reindex(docid, &fields);
                    self.documents.insert(docid, StoredDocument { fields, revision });
                }
                1 => {
                    let (docid, n) = core::varint::decode(&changeset[pos..])
                        .map_err(|e| EngineError::Serialisation(e.to_string()))?;
                    pos += n;
                    self.revision = self.revision.max(revision);
                    self.documents.remove(&docid);
                    self.unindex(docid);
                }
                other => return Err(EngineError::Serialisation(format!("unknown changeset op {other}"))),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Vec<(FieldPath, Value)> {
        vec![(FieldPath::from("title"), Value::Str(name.to_string()))]
    }

    #[test]
    fn add_then_replace_updates_postings() {
        let mut engine = InMemoryEngine::new(Uuid::from_u128(1));
        engine.add_document(1, doc("alpha")).unwrap();
        assert_eq!(engine.postlist("title:alpha"), vec![1]);

        engine.replace_document(1, doc("beta")).unwrap();
        assert!(engine.postlist("title:alpha").is_empty());
        assert_eq!(engine.postlist("title:beta"), vec![1]);
        assert_eq!(engine.doccount(), 1);
    }

    #[test]
    fn add_rejects_duplicate_docid() {
        let mut engine = InMemoryEngine::new(Uuid::from_u128(1));
        engine.add_document(1, doc("alpha")).unwrap();
        assert!(matches!(engine.add_document(1, doc("beta")), Err(EngineError::VersionConflict(1))));
    }

    #[test]
    fn delete_removes_postings_and_doc() {
        let mut engine = InMemoryEngine::new(Uuid::from_u128(1));
        engine.add_document(1, doc("alpha")).unwrap();
        engine.delete_document(1).unwrap();
        assert_eq!(engine.doccount(), 0);
        assert!(engine.postlist("title:alpha").is_empty());
    }

    #[test]
    fn changeset_roundtrip_reproduces_state() {
        let mut source = InMemoryEngine::new(Uuid::from_u128(7));
        source.add_document(1, doc("alpha")).unwrap();
        source.add_document(2, doc("beta")).unwrap();
        source.delete_document(1).unwrap();

        let changeset = source.emit_changeset(0);
        let mut receiver = InMemoryEngine::new(Uuid::from_u128(7));
        receiver.apply_changeset(&changeset).unwrap();

        assert_eq!(receiver.doccount(), source.doccount());
        assert_eq!(receiver.postlist("title:beta"), source.postlist("title:beta"));
        assert_eq!(receiver.revision(), source.revision());
    }

    #[test]
    fn changeset_from_nonzero_revision_only_carries_the_tail() {
        let mut source = InMemoryEngine::new(Uuid::from_u128(7));
        source.add_document(1, doc("alpha")).unwrap();
        let at_one = source.revision();
        source.add_document(2, doc("beta")).unwrap();

        let tail = source.emit_changeset(at_one);
        let mut receiver = InMemoryEngine::new(Uuid::from_u128(7));
        receiver.apply_changeset(&tail).unwrap();
        assert_eq!(receiver.postlist("title:beta"), vec![2]);
        assert!(receiver.postlist("title:alpha").is_empty());
    }
}
