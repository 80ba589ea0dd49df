//! A naive downstream consumer.
//!
//! Mirrors the emitted event stream into a plain `Vec`, one slot per visible
//! index. Useful for checking an operator's output and for tooling that needs
//! the current view of a stream.

use crate::op::OutputOp;

/// Position-addressed list rebuilt from output events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica<P> {
    items: Vec<P>,
}

impl<P> Default for Replica<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Replica<P> {
    /// Create an empty replica.
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns error if the event addresses an index outside the list. The
    /// replica is left unchanged.
    pub fn apply(&mut self, op: OutputOp<P>) -> Result<(), ReplicaError> {
        let len = self.items.len();
        match op {
            OutputOp::Insert { id, data } if id <= len => self.items.insert(id, data),
            OutputOp::Update { id, data } if id < len => self.items[id] = data,
            OutputOp::Delete { id } if id < len => {
                self.items.remove(id);
            }
            op => {
                return Err(ReplicaError::OutOfRange {
                    event: op.name(),
                    id: op.id(),
                    len,
                })
            }
        }
        Ok(())
    }

    /// Apply events in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range error.
    pub fn apply_all(
        &mut self,
        ops: impl IntoIterator<Item = OutputOp<P>>,
    ) -> Result<(), ReplicaError> {
        ops.into_iter().try_for_each(|op| self.apply(op))
    }

    /// Current items in visible order.
    #[must_use]
    pub fn items(&self) -> &[P] {
        &self.items
    }

    /// Consume the replica, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<P> {
        self.items
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the replica is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Errors raised while replaying events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaError {
    /// The event addressed an index outside the list
    #[error("{event} at index {id} is out of range for a list of {len}")]
    OutOfRange {
        /// Event name
        event: &'static str,
        /// Offending index
        id: usize,
        /// List length at the time
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_events_like_array_splices() {
        let mut replica = Replica::new();
        replica
            .apply_all([
                OutputOp::Insert { id: 0, data: "b" },
                OutputOp::Insert { id: 0, data: "a" },
                OutputOp::Insert { id: 2, data: "c" },
                OutputOp::Update { id: 1, data: "B" },
                OutputOp::Delete { id: 0 },
            ])
            .unwrap();

        assert_eq!(replica.items(), &["B", "c"]);
        assert_eq!(replica.len(), 2);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut replica = Replica::new();
        replica.apply(OutputOp::Insert { id: 0, data: 1 }).unwrap();

        assert_eq!(
            replica.apply(OutputOp::Insert { id: 2, data: 2 }),
            Err(ReplicaError::OutOfRange {
                event: "insert",
                id: 2,
                len: 1
            })
        );
        assert!(replica.apply(OutputOp::Update { id: 1, data: 3 }).is_err());
        assert!(replica.apply(OutputOp::Delete { id: 1 }).is_err());
        assert_eq!(replica.into_items(), vec![1]);
    }
}
