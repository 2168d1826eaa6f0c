use crate::{NodeName, RegionId, Term};

/// Wire-level Raft messages (spec.md §6 lists `REQUEST_VOTE, RESPONSE_VOTE,
/// LEADER, LEADERSHIP, HEARTBEAT_LEADER, RESET`; spec.md §4.H describes the
/// `LEADER` message as serving double duty as both heartbeat and election
/// announcement, so `MessageBody::Leader` covers `LEADER`/`LEADERSHIP`/
/// `HEARTBEAT_LEADER` — they are one wire kind carrying the same payload).
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    RequestVote { term: Term, candidate: NodeName },
    ResponseVote { term: Term, vote_granted: bool },
    Leader { term: Term, leader: NodeName, known_members: u32 },
    /// Forces the receiver back to FOLLOWER with a cleared vote, used when a
    /// LEADER sees another LEADER in-region (spec.md §4.H "step down").
    Reset { term: Term },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub region: RegionId,
    pub from: NodeName,
    pub to: Vec<NodeName>,
    pub body: MessageBody,
}
