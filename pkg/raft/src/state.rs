use std::collections::HashSet;
use std::time::Instant;

use crate::{NodeName, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Raft state per region (spec.md §3 "Raft state (per region)"). Initial:
/// FOLLOWER, term=0, no vote. Runs for process lifetime — there is no
/// terminal state.
#[derive(Debug, Clone)]
pub struct RaftState {
    pub term: Term,
    pub voted_for: Option<NodeName>,
    pub role: Role,
    /// Names of peers that granted a vote in the current candidacy. Only
    /// meaningful while `role == Candidate`.
    pub votes: HashSet<NodeName>,
    /// Peers in this region, excluding the local node.
    pub members: HashSet<NodeName>,
    pub election_timeout_deadline: Instant,
    pub heartbeat_deadline: Instant,
    pub last_leader: Option<NodeName>,
}

impl RaftState {
    pub fn new(now: Instant) -> Self {
        RaftState {
            term: 0,
            voted_for: None,
            role: Role::Follower,
            votes: HashSet::new(),
            members: HashSet::new(),
            election_timeout_deadline: now,
            heartbeat_deadline: now,
            last_leader: None,
        }
    }

    /// Known members in the region, including the local node.
    pub fn known_members(&self) -> u32 {
        self.members.len() as u32 + 1
    }

    /// Number of granted votes required to win an election in this region
    /// (spec.md §4.H "votes > known_members/2").
    pub fn majority(&self) -> u32 {
        self.known_members() / 2 + 1
    }
}
