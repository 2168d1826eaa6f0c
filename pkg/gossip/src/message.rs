use std::net::Ipv4Addr;

use core::varint;

/// spec.md §6 "Gossip wire format": `u8 kind | u16 proto_version_LE |
/// varint(cluster_name_len) | cluster_name_bytes | varint(ipv4_addr_u32) |
/// varint(http_port) | varint(binary_port) | varint(node_name_len) |
/// node_name_bytes | varint(pid)`.
pub const PROTO_VERSION: u16 = 0x0001; // major=0x00, minor=0x01

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Hello = 0,
    Wave = 1,
    Sneer = 2,
    Ping = 3,
    Pong = 4,
    Bye = 5,
}

impl Kind {
    pub fn from_u8(b: u8) -> Option<Kind> {
        match b {
            0 => Some(Kind::Hello),
            1 => Some(Kind::Wave),
            2 => Some(Kind::Sneer),
            3 => Some(Kind::Ping),
            4 => Some(Kind::Pong),
            5 => Some(Kind::Bye),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GossipMessage {
    pub kind: Kind,
    pub proto_version: u16,
    pub cluster_name: String,
    pub addr: Ipv4Addr,
    pub http_port: u16,
    pub binary_port: u16,
    pub node_name: String,
    pub pid: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("datagram too short")]
    TooShort,
    #[error("unknown gossip message kind {0}")]
    UnknownKind(u8),
    #[error("malformed field: {0}")]
    Malformed(#[from] varint::VarintError),
}

impl GossipMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.cluster_name.len() + self.node_name.len());
        out.push(self.kind as u8);
        out.extend_from_slice(&self.proto_version.to_le_bytes());
        varint::encode_string(&self.cluster_name, &mut out);
        varint::encode(u32::from(self.addr) as u64, &mut out);
        varint::encode(self.http_port as u64, &mut out);
        varint::encode(self.binary_port as u64, &mut out);
        varint::encode_string(&self.node_name, &mut out);
        varint::encode(self.pid as u64, &mut out);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<GossipMessage, DecodeError> {
        if buf.len() < 4 {
            return Err(DecodeError::TooShort);
        }
        let kind = Kind::from_u8(buf[0]).ok_or(DecodeError::UnknownKind(buf[0]))?;
        let proto_version = u16::from_le_bytes([buf[1], buf[2]]);

        let mut pos = 3;
        let (cluster_name, n) = varint::decode_string(&buf[pos..])?;
        pos += n;
        let (addr_raw, n) = varint::decode(&buf[pos..])?;
        pos += n;
        let (http_port, n) = varint::decode(&buf[pos..])?;
        pos += n;
        let (binary_port, n) = varint::decode(&buf[pos..])?;
        pos += n;
        let (node_name, n) = varint::decode_string(&buf[pos..])?;
        pos += n;
        let (pid, _n) = varint::decode(&buf[pos..])?;

        Ok(GossipMessage {
            kind,
            proto_version,
            cluster_name,
            addr: Ipv4Addr::from(addr_raw as u32),
            http_port: http_port as u16,
            binary_port: binary_port as u16,
            node_name,
            pid: pid as u32,
        })
    }

    /// A major-version mismatch causes the receiver to drop the message; a
    /// minor mismatch is tolerated (spec.md §4.G "Protocol versioning").
    pub fn compatible_with(proto_version: u16) -> impl Fn(u16) -> bool {
        let major = proto_version >> 8;
        move |other: u16| other >> 8 == major
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let msg = GossipMessage {
            kind: Kind::Hello,
            proto_version: PROTO_VERSION,
            cluster_name: "prod".into(),
            addr: Ipv4Addr::new(10, 0, 0, 5),
            http_port: 8880,
            binary_port: 8881,
            node_name: "alpha".into(),
            pid: 4242,
        };
        let encoded = msg.encode();
        let decoded = GossipMessage::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn rejects_unknown_kind() {
        let buf = [9u8, 0, 0, 0];
        assert!(matches!(GossipMessage::decode(&buf), Err(DecodeError::UnknownKind(9))));
    }
}
