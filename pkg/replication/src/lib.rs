pub mod error;
pub mod message;
pub mod receiver;
pub mod source;

pub use error::ReplicationError;
pub use message::{Anchor, Message, Op};
pub use receiver::{Receiver, ReceiverEvent};
pub use source::respond_to_get_changesets;
