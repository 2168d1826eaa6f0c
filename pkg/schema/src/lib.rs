pub mod accuracy;
pub mod inference;
pub mod registry;
pub mod slot;
pub mod types;

pub use registry::{SchemaError, SchemaRegistry};
pub use types::{Accuracy, FieldFlags, FieldSchema, FieldType, Schema};
