use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::slot::{prefix, slot};
use crate::types::{FieldFlags, FieldSchema, FieldType, Schema};

/// Number of CAS retries before a schema update gives up (spec.md §4.F
/// "Writers retry schema updates up to a small bound (≈10)").
const MAX_CAS_RETRIES: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema update for {index:?} lost the CAS race {retries} times in a row")]
    CasExhausted { index: String, retries: usize },
    #[error("field {field:?} in {index:?} is already typed {existing:?}, cannot retype to {attempted:?}")]
    MissingType { index: String, field: String, existing: String, attempted: String },
}

/// One immutable `Schema` snapshot per top-level index (spec.md §4.F "One
/// schema per top-level index"), swapped via `arc_swap::ArcSwap` so readers
/// never block on a writer (spec.md §4.F "Copy-on-write").
pub struct SchemaRegistry {
    indexes: parking_lot::RwLock<HashMap<String, Arc<ArcSwap<Schema>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry { indexes: parking_lot::RwLock::new(HashMap::new()) }
    }

    fn slot_for(&self, index: &str) -> Arc<ArcSwap<Schema>> {
        if let Some(slot) = self.indexes.read().get(index) {
            return slot.clone();
        }
        self.indexes
            .write()
            .entry(index.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(Schema::new("")))))
            .clone()
    }

    /// Readers take an immutable snapshot and never block.
    pub fn snapshot(&self, index: &str) -> Arc<Schema> {
        self.slot_for(index).load_full()
    }

    /// Applies `f` to the current snapshot and CAS-swaps the result in,
    /// retrying on a concurrent writer up to [`MAX_CAS_RETRIES`] times.
    pub fn update(&self, index: &str, mut f: impl FnMut(&Schema) -> Schema) -> Result<Arc<Schema>, SchemaError> {
        let slot = self.slot_for(index);
        for _ in 0..MAX_CAS_RETRIES {
            let current = slot.load_full();
            let next = Arc::new(f(&current));
            let prev = slot.compare_and_swap(&current, next.clone());
            if Arc::ptr_eq(&*prev, &current) {
                return Ok(next);
            }
        }
        Err(SchemaError::CasExhausted { index: index.to_string(), retries: MAX_CAS_RETRIES })
    }

    /// Gets or creates `field`'s frozen type. On the first document that
    /// mentions `field`, `inferred` is persisted and becomes immutable
    /// (spec.md §4.F "On the first indexed document, fields receive types
    /// by inference... Detected types are persisted into the schema and
    /// become immutable"). A later document with a different inferred type
    /// for the same field is rejected in strict mode.
    pub fn type_field(&self, index: &str, field: &str, inferred: FieldType, strict: bool) -> Result<FieldSchema, SchemaError> {
        if let Some(existing) = self.snapshot(index).get(field) {
            if existing.field_type == inferred {
                return Ok(existing.clone());
            }
            if strict {
                return Err(SchemaError::MissingType {
                    index: index.to_string(),
                    field: field.to_string(),
                    existing: format!("{:?}", existing.field_type),
                    attempted: format!("{:?}", inferred),
                });
            }
            return Ok(existing.clone());
        }

        let new_field = FieldSchema {
            field_type: inferred,
            slot: slot(field),
            prefix: prefix(field, inferred),
            accuracy: inferred.default_accuracy(),
            flags: FieldFlags { indexed: true, stored: true, multivalued: false },
        };
        self.update(index, |s| s.with_field(field, new_field.clone()))?;
        Ok(new_field)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::{prefix, slot};
    use crate::types::{FieldFlags, FieldSchema, FieldType};

    fn field(name: &str, ty: FieldType) -> FieldSchema {
        FieldSchema {
            field_type: ty,
            slot: slot(name),
            prefix: prefix(name, ty),
            accuracy: ty.default_accuracy(),
            flags: FieldFlags { indexed: true, stored: true, multivalued: false },
        }
    }

    #[test]
    fn update_is_visible_to_new_snapshots() {
        let registry = SchemaRegistry::new();
        registry.update("books", |s| s.with_field("title", field("title", FieldType::Text))).unwrap();
        let snap = registry.snapshot("books");
        assert!(snap.get("title").is_some());
    }

    #[test]
    fn concurrent_snapshot_is_unaffected_by_later_update() {
        let registry = SchemaRegistry::new();
        registry.update("books", |s| s.with_field("title", field("title", FieldType::Text))).unwrap();
        let before = registry.snapshot("books");
        registry.update("books", |s| s.with_field("author", field("author", FieldType::Keyword))).unwrap();
        assert!(before.get("author").is_none());
        let after = registry.snapshot("books");
        assert!(after.get("author").is_some());
    }

    #[test]
    fn first_document_freezes_the_type() {
        let registry = SchemaRegistry::new();
        let typed = registry.type_field("books", "price", FieldType::Integer, true).unwrap();
        assert_eq!(typed.field_type, FieldType::Integer);

        let again = registry.type_field("books", "price", FieldType::Integer, true).unwrap();
        assert_eq!(again.field_type, FieldType::Integer);
    }

    #[test]
    fn strict_mode_rejects_retyping() {
        let registry = SchemaRegistry::new();
        registry.type_field("books", "price", FieldType::Integer, true).unwrap();
        let err = registry.type_field("books", "price", FieldType::Text, true).unwrap_err();
        assert!(matches!(err, SchemaError::MissingType { .. }));
    }

    #[test]
    fn non_strict_mode_keeps_the_frozen_type() {
        let registry = SchemaRegistry::new();
        registry.type_field("books", "price", FieldType::Integer, true).unwrap();
        let coerced = registry.type_field("books", "price", FieldType::Text, false).unwrap();
        assert_eq!(coerced.field_type, FieldType::Integer);
    }
}
