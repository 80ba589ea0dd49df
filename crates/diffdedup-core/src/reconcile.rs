//! Turns before/after cluster slots into downstream events.
//!
//! An inbound op touches at most two clusters (an update can move an element
//! from one key to another). Every other cluster keeps its representative and
//! therefore its relative order, so the downstream list only needs:
//!
//! 1. deletes for touched clusters whose slot goes away or gets a new
//!    representative, in descending old rank;
//! 2. inserts (and in-place updates) for touched clusters in their new slot,
//!    in ascending new rank.
//!
//! Deleting from the highest rank down means no delete shifts the index of a
//! later one. Inserting from the lowest rank up means every cluster ranked
//! below the one being inserted is already present. Each index is therefore
//! valid against the consumer's list at the moment it is applied, without any
//! after-the-fact correction.

use crate::cluster::Slot;
use crate::operator::ConfigError;
use serde::{Deserialize, Serialize};

/// How a representative replaced in place is reported downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitPolicy {
    /// Emit `update` when a slot keeps its index
    #[default]
    Update,
    /// Never emit `update`; use `delete` + `insert` at the same index
    Reinsert,
}

impl std::fmt::Display for EmitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitPolicy::Update => write!(f, "update"),
            EmitPolicy::Reinsert => write!(f, "reinsert"),
        }
    }
}

impl std::str::FromStr for EmitPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(EmitPolicy::Update),
            "reinsert" => Ok(EmitPolicy::Reinsert),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// The kind of inbound op being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// An element was inserted
    Insert,
    /// An element was deleted
    Delete,
    /// The element with this serial was rewritten
    Update {
        /// Serial of the rewritten element
        serial: u64,
    },
}

/// One cluster touched by an inbound op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touched {
    /// Slot before the op (`None` if the cluster did not exist)
    pub before: Option<Slot>,
    /// Slot after the op (`None` if the cluster was dropped)
    pub after: Option<Slot>,
}

/// A downstream event without its payload.
///
/// Insert and update ranks are ranks after the op; the payload is the
/// representative found there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// Insert the representative ranked here
    Insert(usize),
    /// Replace the slot at this index with the representative ranked here
    Update(usize),
    /// Delete the slot at this index
    Delete(usize),
}

/// Derives minimal events from touched cluster slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: EmitPolicy,
}

impl Reconciler {
    /// Create a reconciler with the given policy.
    #[must_use]
    pub fn new(policy: EmitPolicy) -> Self {
        Self { policy }
    }

    /// The emission policy in effect.
    #[must_use]
    pub fn policy(&self) -> EmitPolicy {
        self.policy
    }

    /// Compute the events for one inbound op.
    ///
    /// Structural inserts and deletes never produce `Update`: a representative
    /// change is always a delete followed by an insert. Updates of an element
    /// collapse a delete and insert on the same index into one `Update` unless
    /// the policy is [`EmitPolicy::Reinsert`].
    #[must_use]
    pub fn reconcile(&self, touched: &[Touched], cause: Cause) -> Vec<Emit> {
        let old_ranks: Vec<usize> = touched
            .iter()
            .filter_map(|t| t.before)
            .map(|s| s.rank)
            .collect();
        let new_ranks: Vec<usize> = touched
            .iter()
            .filter_map(|t| t.after)
            .map(|s| s.rank)
            .collect();

        let mut deletes = Vec::new();
        let mut placed = Vec::new();

        for t in touched {
            match (t.before, t.after) {
                (None, None) => {}
                (Some(before), None) => deletes.push(before.rank),
                (None, Some(after)) => placed.push(Emit::Insert(after.rank)),
                (Some(before), Some(after)) => {
                    // Kept means same representative and same neighbours among
                    // the clusters this op did not touch.
                    let kept = before.representative == after.representative
                        && untouched_before(&old_ranks, before.rank)
                            == untouched_before(&new_ranks, after.rank);
                    let rewritten = cause
                        == Cause::Update {
                            serial: after.representative,
                        };

                    if !kept || (rewritten && self.policy == EmitPolicy::Reinsert) {
                        deletes.push(before.rank);
                        placed.push(Emit::Insert(after.rank));
                    } else if rewritten {
                        placed.push(Emit::Update(after.rank));
                    }
                }
            }
        }

        deletes.sort_unstable_by(|a, b| b.cmp(a));
        placed.sort_unstable_by_key(|emit| match emit {
            Emit::Insert(rank) | Emit::Update(rank) | Emit::Delete(rank) => *rank,
        });

        let emits = deletes.into_iter().map(Emit::Delete).chain(placed);
        if matches!(cause, Cause::Update { .. }) && self.policy == EmitPolicy::Update {
            collapse(emits)
        } else {
            emits.collect()
        }
    }
}

/// Number of untouched clusters ranked below `rank`.
fn untouched_before(touched_ranks: &[usize], rank: usize) -> usize {
    rank - touched_ranks.iter().filter(|&&r| r < rank).count()
}

/// Merge each `Delete(i)` directly followed by `Insert(i)` into `Update(i)`.
fn collapse(emits: impl Iterator<Item = Emit>) -> Vec<Emit> {
    let mut out: Vec<Emit> = Vec::new();
    for emit in emits {
        match (out.last().copied(), emit) {
            (Some(Emit::Delete(deleted)), Emit::Insert(rank)) if deleted == rank => {
                out.pop();
                out.push(Emit::Update(rank));
            }
            _ => out.push(emit),
        }
    }
    out
}
