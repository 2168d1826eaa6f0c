pub mod committer;
pub mod entry;
pub mod error;
pub mod header;
pub mod volume;
#[allow(clippy::module_inception)]
pub mod wal;

pub use committer::AutoCommitter;
pub use entry::{Entry, EntryType};
pub use error::WalError;
pub use header::VolumeHeader;
pub use volume::Volume;
pub use wal::Wal;
