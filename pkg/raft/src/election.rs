use std::time::{Duration, Instant};

use rand::Rng;

use crate::message::{Message, MessageBody};
use crate::state::{RaftState, Role};
use crate::{NodeName, RegionId, Term};

/// Randomized election timeout range, larger than the heartbeat period so a
/// healthy leader's heartbeats always beat a follower's timeout (spec.md
/// §4.H "Timers"). Grounded on
/// `examples/dennisss-repo/pkg/raft/src/consensus.rs`'s `ELECTION_TIMEOUT`.
const ELECTION_TIMEOUT: (Duration, Duration) = (Duration::from_millis(400), Duration::from_millis(800));
const HEARTBEAT_PERIOD: Duration = Duration::from_millis(150);

/// Drives the per-region Raft election state machine. Not `Send`-shared
/// directly; owned by the region's `Services` entry behind a `Mutex`.
pub struct Raft {
    self_name: NodeName,
    region: RegionId,
    state: RaftState,
}

impl Raft {
    pub fn new(self_name: NodeName, region: RegionId, now: Instant) -> Self {
        Raft {
            self_name,
            region,
            state: RaftState::new(now),
        }
    }

    pub fn state(&self) -> &RaftState {
        &self.state
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn term(&self) -> Term {
        self.state.term
    }

    /// Membership changes are driven by gossip (spec.md §4.G); the election
    /// layer just needs the current count to compute majorities.
    pub fn set_members(&mut self, members: impl IntoIterator<Item = NodeName>) {
        self.state.members = members.into_iter().filter(|n| n != &self.self_name).collect();
    }

    fn new_election_timeout(now: Instant) -> Instant {
        let millis = rand::thread_rng().gen_range(ELECTION_TIMEOUT.0.as_millis()..=ELECTION_TIMEOUT.1.as_millis());
        now + Duration::from_millis(millis as u64)
    }

    fn broadcast(&self, body: MessageBody) -> Vec<Message> {
        if self.state.members.is_empty() {
            return Vec::new();
        }
        vec![Message {
            region: self.region,
            from: self.self_name.clone(),
            to: self.state.members.iter().cloned().collect(),
            body,
        }]
    }

    /// Call periodically (e.g. every tick of a `tokio::time::interval`).
    /// Returns any messages that need to go out as a result of a timer
    /// firing; also advances the relevant deadline.
    pub fn tick(&mut self, now: Instant) -> Vec<Message> {
        match self.state.role {
            Role::Follower => {
                if now >= self.state.election_timeout_deadline {
                    self.start_election(now)
                } else {
                    Vec::new()
                }
            }
            Role::Candidate => {
                if now >= self.state.election_timeout_deadline {
                    tracing::debug!(region = self.region, term = self.state.term, "election timed out, retrying");
                    self.start_election(now)
                } else {
                    Vec::new()
                }
            }
            Role::Leader => {
                if now >= self.state.heartbeat_deadline {
                    self.state.heartbeat_deadline = now + HEARTBEAT_PERIOD;
                    self.broadcast(MessageBody::Leader {
                        term: self.state.term,
                        leader: self.self_name.clone(),
                        known_members: self.state.known_members(),
                    })
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn start_election(&mut self, now: Instant) -> Vec<Message> {
        self.state.term += 1;
        self.state.voted_for = Some(self.self_name.clone());
        self.state.role = Role::Candidate;
        self.state.votes = std::iter::once(self.self_name.clone()).collect();
        self.state.election_timeout_deadline = Self::new_election_timeout(now);

        tracing::info!(region = self.region, term = self.state.term, "starting election");

        // Single-node region: trivially win without waiting for responses.
        if self.state.members.is_empty() {
            return self.become_leader(now);
        }

        self.broadcast(MessageBody::RequestVote {
            term: self.state.term,
            candidate: self.self_name.clone(),
        })
    }

    fn become_leader(&mut self, now: Instant) -> Vec<Message> {
        self.state.role = Role::Leader;
        self.state.last_leader = Some(self.self_name.clone());
        self.state.heartbeat_deadline = now;
        tracing::info!(region = self.region, term = self.state.term, "elected leader");
        self.tick(now)
    }

    fn become_follower(&mut self, now: Instant) {
        self.state.role = Role::Follower;
        self.state.votes.clear();
        self.state.election_timeout_deadline = Self::new_election_timeout(now);
    }

    /// Any role, on a message with a higher term: adopt term, become
    /// follower, clear vote (spec.md §4.H).
    fn observe_term(&mut self, now: Instant, term: Term) {
        if term > self.state.term {
            self.state.term = term;
            self.state.voted_for = None;
            self.become_follower(now);
        }
    }

    pub fn handle_request_vote(&mut self, now: Instant, term: Term, candidate: NodeName) -> Message {
        self.observe_term(now, term);

        let grant = term >= self.state.term
            && match &self.state.voted_for {
                Some(existing) => *existing == candidate,
                None => true,
            };

        if grant {
            self.state.voted_for = Some(candidate.clone());
            if self.state.role == Role::Candidate {
                // CANDIDATE on REQUEST_VOTE from higher-term peer: grant and
                // become FOLLOWER (spec.md §4.H).
                self.become_follower(now);
            } else if self.state.role == Role::Follower {
                self.state.election_timeout_deadline = Self::new_election_timeout(now);
            }
        }

        Message {
            region: self.region,
            from: self.self_name.clone(),
            to: vec![candidate],
            body: MessageBody::ResponseVote { term: self.state.term, vote_granted: grant },
        }
    }

    pub fn handle_response_vote(&mut self, now: Instant, from: NodeName, term: Term, vote_granted: bool) -> Vec<Message> {
        self.observe_term(now, term);

        if self.state.role != Role::Candidate || term != self.state.term {
            return Vec::new();
        }

        if vote_granted {
            self.state.votes.insert(from);
        }

        if self.state.votes.len() as u32 >= self.state.majority() {
            return self.become_leader(now);
        }

        Vec::new()
    }

    /// A `LEADER` heartbeat/announcement from another node (spec.md §4.H
    /// "Heartbeat content"): treated as both a term update and confirmation
    /// that an election succeeded.
    pub fn handle_leader(&mut self, now: Instant, term: Term, leader: NodeName, known_members: u32) {
        if term < self.state.term {
            return;
        }

        if self.state.role == Role::Leader && term == self.state.term && leader != self.self_name {
            // Two leaders in the same term/region: step down (spec.md §4.H
            // "LEADER seeing another LEADER in-region: step down").
            tracing::warn!(region = self.region, term, %leader, "observed rival leader, stepping down");
        }

        self.observe_term(now, term);
        self.state.last_leader = Some(leader);
        self.state.election_timeout_deadline = Self::new_election_timeout(now);
        let _ = known_members;

        if self.state.role == Role::Leader {
            self.become_follower(now);
        }
    }

    pub fn handle_reset(&mut self, now: Instant) {
        self.state.voted_for = None;
        self.become_follower(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<NodeName> {
        (0..n).map(|i| format!("node-{i}")).collect()
    }

    #[test]
    fn single_node_region_self_elects() {
        let now = Instant::now();
        let mut raft = Raft::new("a".into(), 0, now);
        let msgs = raft.tick(now + Duration::from_secs(1));
        assert_eq!(raft.role(), Role::Leader);
        // No peers to send to.
        assert!(msgs.is_empty());
    }

    #[test]
    fn seed_test_4_three_node_election() {
        // spec.md §8 seed test 4: 3 nodes, A's timeout fires first, B and C
        // vote yes, A becomes leader in term 1.
        let now = Instant::now();
        let mut a = Raft::new("a".into(), 0, now);
        let mut b = Raft::new("b".into(), 0, now);
        let mut c = Raft::new("c".into(), 0, now);
        let all: Vec<NodeName> = vec!["a".into(), "b".into(), "c".into()];
        for r in [&mut a, &mut b, &mut c] {
            r.set_members(all.clone());
        }

        let t1 = now + Duration::from_millis(500);
        let out = a.tick(t1);
        assert_eq!(a.role(), Role::Candidate);
        assert_eq!(a.term(), 1);
        assert_eq!(out.len(), 1);

        let MessageBody::RequestVote { term, candidate } = out[0].body.clone() else {
            panic!("expected RequestVote");
        };

        let resp_b = b.handle_request_vote(t1, term, candidate.clone());
        let resp_c = c.handle_request_vote(t1, term, candidate);

        let MessageBody::ResponseVote { vote_granted: gb, term: tb } = resp_b.body else { panic!() };
        let MessageBody::ResponseVote { vote_granted: gc, term: tc } = resp_c.body else { panic!() };
        assert!(gb && gc);

        // A needs only a majority of the 3-node region (2 votes, including
        // its own), so it becomes leader as soon as B's vote lands; C's
        // vote arrives after the fact and is a no-op.
        let leader_msgs = a.handle_response_vote(t1, "b".into(), tb, gb);
        let late_msgs = a.handle_response_vote(t1, "c".into(), tc, gc);

        assert_eq!(a.role(), Role::Leader);
        assert_eq!(leader_msgs.len(), 1);
        assert!(late_msgs.is_empty());
        let MessageBody::Leader { term: lt, leader, known_members } = leader_msgs[0].body.clone() else {
            panic!("expected Leader heartbeat");
        };
        assert_eq!(lt, 1);
        assert_eq!(leader, "a");
        assert_eq!(known_members, 3);

        b.handle_leader(t1, lt, leader.clone(), known_members);
        c.handle_leader(t1, lt, leader, known_members);
        assert_eq!(b.role(), Role::Follower);
        assert_eq!(c.role(), Role::Follower);

        // Exactly one leader in the region for term 1.
        let leaders = [a.role(), b.role(), c.role()].iter().filter(|r| **r == Role::Leader).count();
        assert_eq!(leaders, 1);
    }

    #[test]
    fn higher_term_forces_follower() {
        let now = Instant::now();
        let mut a = Raft::new("a".into(), 0, now);
        a.set_members(names(3));
        a.tick(now + Duration::from_secs(1));
        assert_eq!(a.role(), Role::Candidate);

        a.handle_leader(now, 99, "z".into(), 3);
        assert_eq!(a.role(), Role::Follower);
        assert_eq!(a.term(), 99);
    }

    #[test]
    fn does_not_vote_twice_in_same_term() {
        let now = Instant::now();
        let mut a = Raft::new("a".into(), 0, now);
        a.set_members(names(3));

        let r1 = a.handle_request_vote(now, 5, "b".into());
        let r2 = a.handle_request_vote(now, 5, "c".into());
        let MessageBody::ResponseVote { vote_granted: g1, .. } = r1.body else { panic!() };
        let MessageBody::ResponseVote { vote_granted: g2, .. } = r2.body else { panic!() };
        assert!(g1);
        assert!(!g2);
    }
}
