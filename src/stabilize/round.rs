use super::protocol::RoundId;
use crate::clock::ProcessId;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Membership of this node in one round.
#[derive(Debug, Clone)]
pub struct Claim {
    pub round: RoundId,
    /// `None` on the root.
    pub parent: Option<ProcessId>,
    pub claimed_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    SameRound,
    OtherRound(RoundId),
}

/// Round-scoped working state of one node: the claimed flag and the children gathered
/// under it. Always accessed under the stabilizer's mutex.
#[derive(Debug, Default)]
pub struct RoundState {
    claim: Option<Claim>,
    children: BTreeMap<ProcessId, SocketAddr>,
}

impl RoundState {
    /// Test-and-set of the claimed flag.
    ///
    /// A claim held for longer than `stale_after` by another round is taken over; its root is
    /// assumed gone.
    pub fn try_claim(
        &mut self,
        round: RoundId,
        parent: Option<ProcessId>,
        stale_after: Duration,
    ) -> ClaimOutcome {
        if let Some(current) = &self.claim {
            if current.round == round {
                return ClaimOutcome::SameRound;
            }
            if current.claimed_at.elapsed() < stale_after {
                return ClaimOutcome::OtherRound(current.round);
            }
            tracing::warn!(
                "Taking over stale claim of round {} (held {:?})",
                current.round,
                current.claimed_at.elapsed()
            );
        }

        self.claim = Some(Claim {
            round,
            parent,
            claimed_at: Instant::now(),
        });
        self.children.clear();
        ClaimOutcome::Claimed
    }

    pub fn current_round(&self) -> Option<RoundId> {
        self.claim.as_ref().map(|claim| claim.round)
    }

    pub fn parent(&self) -> Option<ProcessId> {
        self.claim.as_ref().and_then(|claim| claim.parent)
    }

    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }

    /// Records a child of `round`. Ignored if the node has moved on to another round.
    pub fn add_child(&mut self, round: RoundId, id: ProcessId, addr: SocketAddr) -> bool {
        if self.current_round() != Some(round) {
            return false;
        }
        self.children.insert(id, addr);
        true
    }

    /// Children of `round`, or `None` if this node is not in that round.
    pub fn children_of(&self, round: RoundId) -> Option<Vec<(ProcessId, SocketAddr)>> {
        if self.current_round() != Some(round) {
            return None;
        }
        Some(self.children.iter().map(|(id, addr)| (*id, *addr)).collect())
    }

    /// Clears the state if it still belongs to `round`.
    pub fn finish(&mut self, round: RoundId) -> bool {
        if self.current_round() != Some(round) {
            return false;
        }
        self.claim = None;
        self.children.clear();
        true
    }
}
