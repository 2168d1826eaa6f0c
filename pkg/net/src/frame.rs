use bytes::{Buf, BytesMut};
use core::varint::{self, VarintError};

/// Type byte meaning "switch to replication sub-protocol; the next
/// frame's type is reinterpreted as a replication op" (spec.md §4.B /
/// §6).
pub const SWITCH_MARKER: u8 = 0xFE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_switch_marker(&self) -> bool {
        self.frame_type == SWITCH_MARKER
    }

    pub fn encode(frame_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 6);
        out.push(frame_type);
        varint::encode(payload.len() as u64, &mut out);
        out.extend_from_slice(payload);
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame length: {0}")]
    Malformed(#[from] VarintError),
}

/// Incremental `u8 type | varint length | bytes payload` decoder
/// (spec.md §4.B "Binary frame format"). Bytes arrive in arbitrary
/// chunks via [`feed`](Self::feed); [`try_decode`](Self::try_decode)
/// extracts as many complete frames as the buffer currently holds.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder { buf: BytesMut::new() }
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns the next complete frame if the buffer holds one, consuming
    /// its bytes; `Ok(None)` means "need more data", not an error.
    pub fn try_decode(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let frame_type = self.buf[0];

        // "bounded" decode mode (spec.md §4.B): the length varint is read
        // unbounded, then exactly that many payload bytes are required.
        let (length, consumed) = match varint::decode(&self.buf[1..]) {
            Ok(pair) => pair,
            Err(VarintError::Truncated) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let header_len = 1 + consumed;
        let total_len = header_len + length as usize;
        if self.buf.len() < total_len {
            return Ok(None);
        }

        self.buf.advance(header_len);
        let payload = self.buf.split_to(length as usize).to_vec();
        Ok(Some(Frame { frame_type, payload }))
    }
}
