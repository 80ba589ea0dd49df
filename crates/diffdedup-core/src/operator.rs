//! The deduplication operator.
//!
//! Routes each inbound op through renumbering, the cluster table, and the
//! reconciler, in the order the op kind requires:
//!
//! - insert: renumber, mutate, reconcile
//! - update: mutate, reconcile
//! - delete: mutate, reconcile, renumber (the element must be found before
//!   positions shift)

use crate::cluster::{Cluster, ClusterTable, Slot};
use crate::index::{SourceIndex, Splice};
use crate::op::{InputOp, OutputOp};
use crate::reconcile::{Cause, Emit, EmitPolicy, Reconciler, Touched};

type KeyFn<P, K> = Box<dyn Fn(&P) -> K + Send>;
type SortFn<P, S> = Box<dyn Fn(&P, Option<i64>, usize) -> S + Send>;

/// Builder for [`Dedup`].
///
/// The sort key defaults to `()`, which orders members by source position
/// alone.
pub struct DedupBuilder<P, K, S = ()> {
    key_fn: Option<KeyFn<P, K>>,
    sort_fn: SortFn<P, S>,
    policy: EmitPolicy,
}

impl<P, K> Default for DedupBuilder<P, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, K> DedupBuilder<P, K> {
    /// Create a builder with no key function and positional ordering.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key_fn: None,
            sort_fn: Box::new(|_, _, _| ()),
            policy: EmitPolicy::default(),
        }
    }
}

impl<P, K, S> DedupBuilder<P, K, S> {
    /// Set the function deriving a cluster key from a payload.
    #[must_use]
    pub fn key_fn(mut self, key_fn: impl Fn(&P) -> K + Send + 'static) -> Self {
        self.key_fn = Some(Box::new(key_fn));
        self
    }

    /// Set the function deriving a member's sort key from its payload, the
    /// op's `sortIndex`, and the op's source position.
    ///
    /// The key is computed once per insert or update and kept as is while
    /// positions shift. Members with equal sort keys are ordered by their
    /// current source position.
    #[must_use]
    pub fn sort_fn<S2>(
        self,
        sort_fn: impl Fn(&P, Option<i64>, usize) -> S2 + Send + 'static,
    ) -> DedupBuilder<P, K, S2> {
        DedupBuilder {
            key_fn: self.key_fn,
            sort_fn: Box::new(sort_fn),
            policy: self.policy,
        }
    }

    /// Set the emission policy.
    #[must_use]
    pub fn policy(mut self, policy: EmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the operator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKeyFn`] if no key function was set.
    pub fn build(self) -> Result<Dedup<P, K, S>, ConfigError>
    where
        K: Eq,
        S: Ord,
    {
        let key_fn = self.key_fn.ok_or(ConfigError::MissingKeyFn)?;
        Ok(Dedup {
            table: ClusterTable::new(),
            key_fn,
            sort_fn: self.sort_fn,
            reconciler: Reconciler::new(self.policy),
        })
    }
}

/// Incremental deduplication of a position-addressed diff stream.
///
/// Feed it upstream ops with [`Dedup::apply`]; it returns the ops a
/// downstream consumer needs to keep a list of one representative per key.
pub struct Dedup<P, K, S = ()> {
    table: ClusterTable<K, S, P>,
    key_fn: KeyFn<P, K>,
    sort_fn: SortFn<P, S>,
    reconciler: Reconciler,
}

impl<P, K> Dedup<P, K> {
    /// Start building an operator.
    #[must_use]
    pub fn builder() -> DedupBuilder<P, K> {
        DedupBuilder::new()
    }
}

impl<P, K, S> Dedup<P, K, S>
where
    P: Clone,
    K: Eq + Clone,
    S: Ord,
{
    /// Apply one upstream op and return the downstream ops it causes.
    ///
    /// Deletes come first, then inserts and updates. Applying the returned
    /// ops in order to a list that mirrors everything emitted so far yields
    /// the current representatives in visible order.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::UnknownSource`] if an update or delete names a
    /// source position holding no element. Upstream and operator disagree on
    /// the sequence at that point; the operator should not be fed again.
    pub fn apply(&mut self, op: InputOp<P>) -> Result<Vec<OutputOp<P>>, DedupError> {
        let name = op.name();
        let id = op.id();

        let events = match op {
            InputOp::Insert {
                id,
                data,
                sort_index,
            } => self.insert(id, data, sort_index),
            InputOp::Update {
                id,
                data,
                sort_index,
            } => self.update(id, data, sort_index)?,
            InputOp::Delete { id } => self.delete(id)?,
        };

        tracing::debug!(
            op = name,
            id,
            emitted = events.len(),
            clusters = self.table.len(),
            "Applied op"
        );
        Ok(events)
    }

    fn insert(&mut self, id: usize, data: P, sort_index: Option<i64>) -> Vec<OutputOp<P>> {
        let key = (self.key_fn)(&data);
        let sort = (self.sort_fn)(&data, sort_index, id);

        self.table.renumber(Splice::Insert(id));
        let before = self.table.slot(&key);
        self.table.insert(key.clone(), id, sort, data);
        let after = self.table.slot(&key);

        self.emit(&[Touched { before, after }], Cause::Insert)
    }

    fn update(
        &mut self,
        id: usize,
        data: P,
        sort_index: Option<i64>,
    ) -> Result<Vec<OutputOp<P>>, DedupError> {
        let (rank, _) = self
            .table
            .find_by_source(id)
            .ok_or(DedupError::UnknownSource { id })?;
        let old_key = self.table.clusters()[rank].key().clone();
        let key = (self.key_fn)(&data);
        let sort = (self.sort_fn)(&data, sort_index, id);

        let keys = if old_key == key {
            vec![old_key]
        } else {
            vec![old_key, key.clone()]
        };
        let before: Vec<Option<Slot>> = keys.iter().map(|k| self.table.slot(k)).collect();

        let serial = self
            .table
            .update(id, key, sort, data)
            .ok_or(DedupError::UnknownSource { id })?;

        let touched: Vec<Touched> = keys
            .iter()
            .zip(before)
            .map(|(k, before)| Touched {
                before,
                after: self.table.slot(k),
            })
            .collect();

        Ok(self.emit(&touched, Cause::Update { serial }))
    }

    fn delete(&mut self, id: usize) -> Result<Vec<OutputOp<P>>, DedupError> {
        let (rank, _) = self
            .table
            .find_by_source(id)
            .ok_or(DedupError::UnknownSource { id })?;
        let key = self.table.clusters()[rank].key().clone();

        let before = self.table.slot(&key);
        self.table.remove(id);
        let after = self.table.slot(&key);

        let events = self.emit(&[Touched { before, after }], Cause::Delete);
        self.table.renumber(Splice::Remove(id));
        Ok(events)
    }

    fn emit(&self, touched: &[Touched], cause: Cause) -> Vec<OutputOp<P>> {
        self.reconciler
            .reconcile(touched, cause)
            .into_iter()
            .map(|emit| match emit {
                Emit::Insert(rank) => OutputOp::Insert {
                    id: rank,
                    data: self.representative_payload(rank),
                },
                Emit::Update(rank) => OutputOp::Update {
                    id: rank,
                    data: self.representative_payload(rank),
                },
                Emit::Delete(rank) => OutputOp::Delete { id: rank },
            })
            .collect()
    }

    fn representative_payload(&self, rank: usize) -> P {
        self.table.clusters()[rank].representative().payload.clone()
    }
}

impl<P, K, S> Dedup<P, K, S>
where
    K: Eq,
    S: Ord,
{
    /// Number of live clusters, i.e. the length of the downstream list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if no elements are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of live upstream elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.table.element_count()
    }

    /// Check if a cluster for `key` is live.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.find_by_key(key).is_some()
    }

    /// Representative payloads in visible order.
    pub fn representatives(&self) -> impl Iterator<Item = &P> {
        self.table
            .clusters()
            .iter()
            .map(|c| &c.representative().payload)
    }

    /// Clusters in visible order.
    #[must_use]
    pub fn clusters(&self) -> &[Cluster<K, S, P>] {
        self.table.clusters()
    }

    /// The emission policy in effect.
    #[must_use]
    pub fn policy(&self) -> EmitPolicy {
        self.reconciler.policy()
    }
}

/// Errors raised while applying upstream ops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DedupError {
    /// An update or delete named a source position with no element
    #[error("no element at source position {id}; upstream is out of sync")]
    UnknownSource {
        /// The offending source position
        id: usize,
    },
}

/// Errors raised while building an operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No cluster key function was supplied
    #[error("a cluster key function is required")]
    MissingKeyFn,
    /// An emission policy name was not recognised
    #[error("unknown emit policy '{0}', expected 'update' or 'reinsert'")]
    UnknownPolicy(String),
}
