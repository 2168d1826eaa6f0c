pub mod client;
pub mod frame;
pub mod http;
pub mod task_queue;

pub use client::{read_loop, BufferedClient};
pub use frame::{Frame, FrameDecoder, SWITCH_MARKER};
pub use http::{encode_response, HttpError, HttpParser, Request};
pub use task_queue::{SingleFlightLatch, TaskQueue};
