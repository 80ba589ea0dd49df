//! Sorted-of-sorted cluster table.
//!
//! Elements are grouped into clusters by key. Inside a cluster, members are
//! sorted by `(sort, source_id)`; the first member is the representative.
//! Clusters themselves are kept sorted by their representative's order key,
//! and a cluster's rank in that order is its visible index downstream.
//!
//! The source position acts as the tie breaker, so with the unit sort key `()`
//! members are ordered purely by where they sit in the input sequence.

use crate::index::{SourceIndex, Splice};

/// One element of the input sequence, stored inside its cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member<S, P> {
    /// Current position in the input sequence
    pub source_id: usize,
    /// Caller-supplied sort key
    pub sort: S,
    /// Identity assigned on first insert, kept across updates
    pub serial: u64,
    /// Opaque payload
    pub payload: P,
}

impl<S: Ord, P> Member<S, P> {
    fn order(&self) -> (&S, usize) {
        (&self.sort, self.source_id)
    }
}

/// The equivalence class for one key. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster<K, S, P> {
    key: K,
    members: Vec<Member<S, P>>,
}

impl<K, S: Ord, P> Cluster<K, S, P> {
    fn singleton(key: K, member: Member<S, P>) -> Self {
        Self {
            key,
            members: vec![member],
        }
    }

    /// The cluster key.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Members in ascending order.
    #[must_use]
    pub fn members(&self) -> &[Member<S, P>] {
        &self.members
    }

    /// Number of members (at least one).
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// The member with the smallest order key.
    #[must_use]
    pub fn representative(&self) -> &Member<S, P> {
        &self.members[0]
    }

    fn order(&self) -> (&S, usize) {
        self.representative().order()
    }

    /// Binary-insert a member, after any member that compares equal.
    fn insert_member(&mut self, member: Member<S, P>) -> usize {
        let at = {
            let order = member.order();
            self.members.partition_point(|m| m.order() <= order)
        };
        self.members.insert(at, member);
        at
    }
}

/// Visible state of one cluster at one moment: where it sits and who represents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Rank among all live clusters
    pub rank: usize,
    /// Serial of the representative member
    pub representative: u64,
}

/// Clusters in global order.
#[derive(Debug, Clone)]
pub struct ClusterTable<K, S, P> {
    clusters: Vec<Cluster<K, S, P>>,
    next_serial: u64,
}

impl<K, S, P> Default for ClusterTable<K, S, P>
where
    K: Eq,
    S: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S, P> ClusterTable<K, S, P>
where
    K: Eq,
    S: Ord,
{
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clusters: Vec::new(),
            next_serial: 0,
        }
    }

    /// Number of live clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Check if the table holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of live elements across all clusters.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.clusters.iter().map(Cluster::member_count).sum()
    }

    /// Clusters in visible order.
    #[must_use]
    pub fn clusters(&self) -> &[Cluster<K, S, P>] {
        &self.clusters
    }

    /// Rank of the cluster for `key`, if one is live.
    #[must_use]
    pub fn find_by_key(&self, key: &K) -> Option<usize> {
        self.clusters.iter().position(|c| c.key == *key)
    }

    /// Locate the element at a source position.
    ///
    /// Returns the owning cluster's rank and the member's index inside it.
    #[must_use]
    pub fn find_by_source(&self, source_id: usize) -> Option<(usize, usize)> {
        self.clusters.iter().enumerate().find_map(|(rank, cluster)| {
            cluster
                .members
                .iter()
                .position(|m| m.source_id == source_id)
                .map(|sub| (rank, sub))
        })
    }

    /// Current slot of the cluster for `key`.
    #[must_use]
    pub fn slot(&self, key: &K) -> Option<Slot> {
        let rank = self.find_by_key(key)?;
        Some(Slot {
            rank,
            representative: self.clusters[rank].representative().serial,
        })
    }

    /// Insert a new element.
    ///
    /// The source position must already be free, i.e. the table has been
    /// renumbered for the insert. Returns the element's serial.
    pub fn insert(&mut self, key: K, source_id: usize, sort: S, payload: P) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.insert_member(
            key,
            Member {
                source_id,
                sort,
                serial,
                payload,
            },
        );
        serial
    }

    /// Remove the element at a source position.
    ///
    /// A cluster losing its last member is dropped. Positions are not
    /// renumbered; that is up to the caller.
    pub fn remove(&mut self, source_id: usize) -> Option<Member<S, P>> {
        let (rank, sub) = self.find_by_source(source_id)?;
        Some(self.remove_at(rank, sub))
    }

    /// Replace the key, sort key, and payload of the element at a source position.
    ///
    /// Unchanged key and sort key means an in-place payload swap; anything
    /// else moves the element. It keeps its serial either way, which is
    /// returned.
    pub fn update(&mut self, source_id: usize, key: K, sort: S, payload: P) -> Option<u64> {
        let (rank, sub) = self.find_by_source(source_id)?;

        let cluster = &mut self.clusters[rank];
        if cluster.key == key && cluster.members[sub].sort == sort {
            let member = &mut cluster.members[sub];
            member.payload = payload;
            return Some(member.serial);
        }

        let serial = self.remove_at(rank, sub).serial;
        self.insert_member(
            key,
            Member {
                source_id,
                sort,
                serial,
                payload,
            },
        );
        Some(serial)
    }

    fn insert_member(&mut self, key: K, member: Member<S, P>) -> usize {
        match self.find_by_key(&key) {
            None => self.place(Cluster::singleton(key, member)),
            Some(rank) => {
                if self.clusters[rank].insert_member(member) == 0 {
                    self.relocate(rank)
                } else {
                    rank
                }
            }
        }
    }

    fn remove_at(&mut self, rank: usize, sub: usize) -> Member<S, P> {
        if self.clusters[rank].members.len() == 1 {
            let mut cluster = self.clusters.remove(rank);
            return cluster.members.swap_remove(0);
        }

        let member = self.clusters[rank].members.remove(sub);
        if sub == 0 {
            self.relocate(rank);
        }
        member
    }

    /// Binary-insert a cluster into the global order, after equal ones.
    fn place(&mut self, cluster: Cluster<K, S, P>) -> usize {
        let at = {
            let order = cluster.order();
            self.clusters.partition_point(|c| c.order() <= order)
        };
        self.clusters.insert(at, cluster);
        at
    }

    /// Re-seat a cluster whose representative changed.
    fn relocate(&mut self, rank: usize) -> usize {
        let cluster = self.clusters.remove(rank);
        self.place(cluster)
    }
}

impl<K, S, P> SourceIndex for ClusterTable<K, S, P> {
    fn renumber(&mut self, splice: Splice) {
        for member in self.clusters.iter_mut().flat_map(|c| c.members.iter_mut()) {
            member.source_id = splice.apply(member.source_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(table: &ClusterTable<&'static str, i64, &'static str>) -> Vec<&'static str> {
        table.clusters().iter().map(|c| *c.key()).collect()
    }

    fn reps(table: &ClusterTable<&'static str, i64, &'static str>) -> Vec<&'static str> {
        table
            .clusters()
            .iter()
            .map(|c| c.representative().payload)
            .collect()
    }

    #[test]
    fn clusters_sorted_by_representative() {
        let mut table = ClusterTable::new();
        table.insert("b", 0, 5, "b5");
        table.insert("a", 1, 9, "a9");
        table.insert("c", 2, 1, "c1");

        assert_eq!(keys(&table), vec!["c", "b", "a"]);
        assert_eq!(table.find_by_key(&"a"), Some(2));
        assert_eq!(table.find_by_key(&"z"), None);
    }

    #[test]
    fn new_representative_relocates_cluster() {
        let mut table = ClusterTable::new();
        table.insert("a", 0, 5, "a5");
        table.insert("b", 1, 3, "b3");
        assert_eq!(keys(&table), vec!["b", "a"]);

        table.insert("a", 2, 1, "a1");
        assert_eq!(keys(&table), vec!["a", "b"]);
        assert_eq!(reps(&table), vec!["a1", "b3"]);
        assert_eq!(table.clusters()[0].member_count(), 2);
    }

    #[test]
    fn removing_last_member_drops_cluster() {
        let mut table = ClusterTable::new();
        table.insert("a", 0, 0, "a0");
        table.insert("b", 1, 1, "b1");

        let removed = table.remove(0).unwrap();
        assert_eq!(removed.payload, "a0");
        assert_eq!(keys(&table), vec!["b"]);
        assert!(table.remove(0).is_none());
    }

    #[test]
    fn removing_representative_promotes_next() {
        let mut table = ClusterTable::new();
        table.insert("a", 0, 0, "a0");
        table.insert("b", 1, 1, "b1");
        table.insert("a", 2, 2, "a2");

        table.remove(0);
        assert_eq!(keys(&table), vec!["b", "a"]);
        assert_eq!(reps(&table), vec!["b1", "a2"]);
    }

    #[test]
    fn source_position_breaks_ties() {
        let mut table: ClusterTable<&str, (), &str> = ClusterTable::new();
        table.insert("a", 3, (), "late");
        table.insert("a", 1, (), "early");

        let cluster = &table.clusters()[0];
        assert_eq!(cluster.representative().payload, "early");
        assert_eq!(cluster.members()[1].source_id, 3);
    }

    #[test]
    fn find_by_source_reports_sub_index() {
        let mut table = ClusterTable::new();
        table.insert("a", 0, 0, "a0");
        table.insert("a", 1, 1, "a1");
        table.insert("b", 2, 2, "b2");

        assert_eq!(table.find_by_source(1), Some((0, 1)));
        assert_eq!(table.find_by_source(2), Some((1, 0)));
        assert_eq!(table.find_by_source(9), None);
    }

    #[test]
    fn update_in_place_keeps_position_and_serial() {
        let mut table = ClusterTable::new();
        let serial = table.insert("a", 0, 0, "old");
        table.insert("b", 1, 1, "b1");

        assert_eq!(table.update(0, "a", 0, "new"), Some(serial));
        assert_eq!(reps(&table), vec!["new", "b1"]);
    }

    #[test]
    fn update_moves_element_between_clusters() {
        let mut table = ClusterTable::new();
        let serial = table.insert("a", 0, 0, "a0");
        table.insert("a", 1, 1, "a1");

        assert_eq!(table.update(0, "b", 0, "b0"), Some(serial));
        assert_eq!(keys(&table), vec!["b", "a"]);
        assert_eq!(table.slot(&"b").unwrap().representative, serial);
        assert_eq!(table.element_count(), 2);
        assert_eq!(table.update(7, "b", 0, "missing"), None);
    }

    #[test]
    fn renumber_follows_splices() {
        let mut table = ClusterTable::new();
        table.insert("a", 0, 0, "a0");
        table.insert("b", 1, 1, "b1");

        table.renumber(Splice::Insert(0));
        assert_eq!(table.find_by_source(1), Some((0, 0)));
        assert_eq!(table.find_by_source(2), Some((1, 0)));
        assert_eq!(table.find_by_source(0), None);
    }
}
