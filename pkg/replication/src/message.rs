use core::varint;
use uuid::Uuid;

/// Replication sub-protocol op codes (spec.md §4.J / §6). These are the
/// byte values a binary frame's `type` is reinterpreted as once the
/// connection has seen the `0xFE` switch marker (spec.md §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    GetChangesets = 0,
    SetDbHeader = 1,
    SetDbFilename = 2,
    SetDbFileData = 3,
    SetDbFooter = 4,
    Changeset = 5,
    EndOfChanges = 6,
    Fail = 7,
}

impl Op {
    fn from_u8(b: u8) -> Option<Op> {
        match b {
            0 => Some(Op::GetChangesets),
            1 => Some(Op::SetDbHeader),
            2 => Some(Op::SetDbFilename),
            3 => Some(Op::SetDbFileData),
            4 => Some(Op::SetDbFooter),
            5 => Some(Op::Changeset),
            6 => Some(Op::EndOfChanges),
            7 => Some(Op::Fail),
            _ => None,
        }
    }
}

/// A synchronization anchor: the `{uuid, revision, path}` triple spec.md
/// §4.J says accompanies replication initialization and the final
/// END_OF_CHANGES.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub uuid: Uuid,
    pub revision: u64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    GetChangesets { source_uuid: Uuid, from_revision: u64, index_path: String },
    SetDbHeader { uuid: Uuid, revision: u64 },
    SetDbFilename { filename: String },
    SetDbFileData { payload: Vec<u8> },
    SetDbFooter { revision: u64 },
    Changeset { bytes: Vec<u8> },
    EndOfChanges { anchor: Anchor },
    Fail { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("too short")]
    TooShort,
    #[error("unknown replication op {0}")]
    UnknownOp(u8),
    #[error("malformed message: {0}")]
    Malformed(#[from] varint::VarintError),
}

fn encode_uuid(uuid: Uuid, out: &mut Vec<u8>) {
    out.extend_from_slice(uuid.as_bytes());
}

fn decode_uuid(buf: &[u8]) -> Result<(Uuid, usize), DecodeError> {
    if buf.len() < 16 {
        return Err(DecodeError::TooShort);
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&buf[..16]);
    Ok((Uuid::from_bytes(bytes), 16))
}

fn encode_bytes(data: &[u8], out: &mut Vec<u8>) {
    varint::encode(data.len() as u64, out);
    out.extend_from_slice(data);
}

fn decode_bytes(buf: &[u8]) -> Result<(Vec<u8>, usize), DecodeError> {
    let (len, n) = varint::decode(buf)?;
    let len = len as usize;
    if buf.len() < n + len {
        return Err(DecodeError::TooShort);
    }
    Ok((buf[n..n + len].to_vec(), n + len))
}

impl Message {
    pub fn op(&self) -> Op {
        match self {
            Message::GetChangesets { .. } => Op::GetChangesets,
            Message::SetDbHeader { .. } => Op::SetDbHeader,
            Message::SetDbFilename { .. } => Op::SetDbFilename,
            Message::SetDbFileData { .. } => Op::SetDbFileData,
            Message::SetDbFooter { .. } => Op::SetDbFooter,
            Message::Changeset { .. } => Op::Changeset,
            Message::EndOfChanges { .. } => Op::EndOfChanges,
            Message::Fail { .. } => Op::Fail,
        }
    }

    /// Encodes the op byte and payload (spec.md §6 "Binary protocol
    /// framing": `u8 type | varint length | bytes payload` — the length
    /// prefix is added by the caller at the frame layer, so this only
    /// produces the payload bytes the frame carries after `type`).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.op() as u8];
        match self {
            Message::GetChangesets { source_uuid, from_revision, index_path } => {
                encode_uuid(*source_uuid, &mut out);
                varint::encode(*from_revision, &mut out);
                varint::encode_string(index_path, &mut out);
            }
            Message::SetDbHeader { uuid, revision } => {
                encode_uuid(*uuid, &mut out);
                varint::encode(*revision, &mut out);
            }
            Message::SetDbFilename { filename } => {
                varint::encode_string(filename, &mut out);
            }
            Message::SetDbFileData { payload } => {
                encode_bytes(payload, &mut out);
            }
            Message::SetDbFooter { revision } => {
                varint::encode(*revision, &mut out);
            }
            Message::Changeset { bytes } => {
                encode_bytes(bytes, &mut out);
            }
            Message::EndOfChanges { anchor } => {
                encode_uuid(anchor.uuid, &mut out);
                varint::encode(anchor.revision, &mut out);
                varint::encode_string(&anchor.path, &mut out);
            }
            Message::Fail { message } => {
                varint::encode_string(message, &mut out);
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
        let op = *buf.first().ok_or(DecodeError::TooShort)?;
        let op = Op::from_u8(op).ok_or(DecodeError::UnknownOp(op))?;
        let rest = &buf[1..];
        Ok(match op {
            Op::GetChangesets => {
                let (source_uuid, n1) = decode_uuid(rest)?;
                let (from_revision, n2) = varint::decode(&rest[n1..])?;
                let (index_path, _) = varint::decode_string(&rest[n1 + n2..])?;
                Message::GetChangesets { source_uuid, from_revision, index_path }
            }
            Op::SetDbHeader => {
                let (uuid, n1) = decode_uuid(rest)?;
                let (revision, _) = varint::decode(&rest[n1..])?;
                Message::SetDbHeader { uuid, revision }
            }
            Op::SetDbFilename => {
                let (filename, _) = varint::decode_string(rest)?;
                Message::SetDbFilename { filename }
            }
            Op::SetDbFileData => {
                let (payload, _) = decode_bytes(rest)?;
                Message::SetDbFileData { payload }
            }
            Op::SetDbFooter => {
                let (revision, _) = varint::decode(rest)?;
                Message::SetDbFooter { revision }
            }
            Op::Changeset => {
                let (bytes, _) = decode_bytes(rest)?;
                Message::Changeset { bytes }
            }
            Op::EndOfChanges => {
                let (uuid, n1) = decode_uuid(rest)?;
                let (revision, n2) = varint::decode(&rest[n1..])?;
                let (path, _) = varint::decode_string(&rest[n1 + n2..])?;
                Message::EndOfChanges { anchor: Anchor { uuid, revision, path } }
            }
            Op::Fail => {
                let (message, _) = varint::decode_string(rest)?;
                Message::Fail { message }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_changesets_roundtrip() {
        let msg = Message::GetChangesets { source_uuid: Uuid::from_u128(1), from_revision: 10, index_path: "idx".into() };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn changeset_roundtrip() {
        let msg = Message::Changeset { bytes: vec![1, 2, 3, 4] };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn end_of_changes_carries_the_anchor() {
        let msg = Message::EndOfChanges { anchor: Anchor { uuid: Uuid::from_u128(2), revision: 42, path: "idx".into() } };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(matches!(Message::decode(&[0xEE]), Err(DecodeError::UnknownOp(0xEE))));
    }
}
