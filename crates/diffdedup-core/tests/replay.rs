//! Property tests: the replica built from emitted events always matches a
//! from-scratch dedup of the current input sequence.

use diffdedup_core::{Dedup, InputOp, Replica};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq)]
struct Item {
    key: char,
    tag: u32,
}

#[derive(Clone, Debug)]
enum Step {
    Insert {
        at: usize,
        key: char,
        sort: Option<i64>,
    },
    Update {
        at: usize,
        key: char,
        sort: Option<i64>,
    },
    Delete {
        at: usize,
    },
}

fn arbitrary_key() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['a', 'b', 'c', 'd'])
}

fn arbitrary_sort() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(-3i64..3)
}

fn arbitrary_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (any::<usize>(), arbitrary_key(), arbitrary_sort())
            .prop_map(|(at, key, sort)| Step::Insert { at, key, sort }),
        2 => (any::<usize>(), arbitrary_key(), arbitrary_sort())
            .prop_map(|(at, key, sort)| Step::Update { at, key, sort }),
        2 => any::<usize>().prop_map(|at| Step::Delete { at }),
    ]
}

/// Source sequence kept alongside the operator: `(payload, sort)`, where
/// `sort` is the `sortIndex`, or the position the op addressed when absent.
type Source = Vec<(Item, i64)>;

/// Sort key as the operator captures it when an op is applied.
fn captured_sort(sort_index: Option<i64>, id: usize) -> i64 {
    sort_index.unwrap_or_else(|| i64::try_from(id).unwrap())
}

/// Turn a step into a valid op for the current sequence and apply it there.
fn concretize(step: &Step, source: &mut Source, tag: u32) -> InputOp<Item> {
    let len = source.len();
    match *step {
        Step::Insert { key, sort, .. } | Step::Update { key, sort, .. } if len == 0 => {
            let item = Item { key, tag };
            source.insert(0, (item.clone(), captured_sort(sort, 0)));
            InputOp::Insert {
                id: 0,
                data: item,
                sort_index: sort,
            }
        }
        Step::Delete { .. } if len == 0 => {
            let item = Item { key: 'a', tag };
            source.insert(0, (item.clone(), 0));
            InputOp::Insert {
                id: 0,
                data: item,
                sort_index: None,
            }
        }
        Step::Insert { at, key, sort } => {
            let id = at % (len + 1);
            let item = Item { key, tag };
            source.insert(id, (item.clone(), captured_sort(sort, id)));
            InputOp::Insert {
                id,
                data: item,
                sort_index: sort,
            }
        }
        Step::Update { at, key, sort } => {
            let id = at % len;
            let item = Item { key, tag };
            source[id] = (item.clone(), captured_sort(sort, id));
            InputOp::Update {
                id,
                data: item,
                sort_index: sort,
            }
        }
        Step::Delete { at } => {
            let id = at % len;
            source.remove(id);
            InputOp::Delete { id }
        }
    }
}

/// Dedup the whole sequence from scratch: one representative per key, the
/// member with the smallest `(sort, position)`, listed in that same order.
fn oracle<S: Ord + Clone>(source: &Source, sort_of: impl Fn(i64) -> S) -> Vec<Item> {
    let keys: BTreeSet<char> = source.iter().map(|(item, _)| item.key).collect();
    let mut reps: Vec<((S, usize), Item)> = keys
        .into_iter()
        .filter_map(|key| {
            source
                .iter()
                .enumerate()
                .filter(|(_, (item, _))| item.key == key)
                .map(|(pos, (item, sort))| ((sort_of(*sort), pos), item.clone()))
                .min_by(|a, b| a.0.cmp(&b.0))
        })
        .collect();
    reps.sort_by(|a, b| a.0.cmp(&b.0));
    reps.into_iter().map(|(_, item)| item).collect()
}

fn distinct_keys(source: &Source) -> usize {
    source
        .iter()
        .map(|(item, _)| item.key)
        .collect::<BTreeSet<_>>()
        .len()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// With the default sort key, representatives are first occurrences in
    /// source order.
    #[test]
    fn positional_replica_matches_oracle(
        steps in prop::collection::vec(arbitrary_step(), 1..60),
    ) {
        let mut dedup = Dedup::builder().key_fn(|item: &Item| item.key).build().unwrap();
        let mut replica = Replica::new();
        let mut source = Source::new();

        for (tag, step) in (0u32..).zip(&steps) {
            let op = concretize(step, &mut source, tag);
            let events = dedup.apply(op).unwrap();
            replica.apply_all(events).unwrap();

            let expected = oracle(&source, |_| ());
            prop_assert_eq!(replica.items(), expected.as_slice());
            prop_assert_eq!(dedup.len(), distinct_keys(&source));
            prop_assert_eq!(dedup.element_count(), source.len());
        }
    }

    /// With a sort key taken from `sortIndex`, defaulting to the position the
    /// op addressed; ties fall back to current source order.
    #[test]
    fn sorted_replica_matches_oracle(steps in prop::collection::vec(arbitrary_step(), 1..60)) {
        let mut dedup = Dedup::builder()
            .key_fn(|item: &Item| item.key)
            .sort_fn(|_: &Item, sort_index, id| captured_sort(sort_index, id))
            .build()
            .unwrap();
        let mut replica = Replica::new();
        let mut source = Source::new();

        for (tag, step) in (0u32..).zip(&steps) {
            let op = concretize(step, &mut source, tag);
            let events = dedup.apply(op).unwrap();
            replica.apply_all(events).unwrap();

            let expected = oracle(&source, |sort| sort);
            prop_assert_eq!(replica.items(), expected.as_slice());
            prop_assert_eq!(dedup.len(), distinct_keys(&source));
        }
    }

    /// The reinsert policy reaches the same list without ever emitting updates.
    #[test]
    fn reinsert_policy_never_updates(steps in prop::collection::vec(arbitrary_step(), 1..60)) {
        let mut dedup = Dedup::builder()
            .key_fn(|item: &Item| item.key)
            .policy(diffdedup_core::EmitPolicy::Reinsert)
            .build()
            .unwrap();
        let mut replica = Replica::new();
        let mut source = Source::new();

        for (tag, step) in (0u32..).zip(&steps) {
            let op = concretize(step, &mut source, tag);
            let events = dedup.apply(op).unwrap();
            prop_assert!(events.iter().all(|e| e.name() != "update"));
            replica.apply_all(events).unwrap();

            let expected = oracle(&source, |_| ());
            prop_assert_eq!(replica.items(), expected.as_slice());
        }
    }

    /// Each op touches at most two clusters, so at most two deletes and two
    /// inserts come out.
    #[test]
    fn output_is_bounded(steps in prop::collection::vec(arbitrary_step(), 1..60)) {
        let mut dedup = Dedup::builder()
            .key_fn(|item: &Item| item.key)
            .sort_fn(|_: &Item, sort_index, id| captured_sort(sort_index, id))
            .build()
            .unwrap();
        let mut source = Source::new();

        for (tag, step) in (0u32..).zip(&steps) {
            let op = concretize(step, &mut source, tag);
            let events = dedup.apply(op).unwrap();
            prop_assert!(events.len() <= 4);
        }
    }
}
