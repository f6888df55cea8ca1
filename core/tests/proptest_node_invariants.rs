//! Property-based invariant tests for nodes.
//!
//! 1. The last static assignment to a key is what `get` returns.
//! 2. `apply(diff(source, baseline))` makes the baseline equal to the source.
//! 3. Freezing twice is the same as freezing once; frozen keys reject writes.
//! 4. A failed transaction leaves the node exactly as it was.
//! 5. Snapshots and plain-tree reloads reproduce the plain tree.

use std::collections::BTreeMap;

use datakit_core::{DataError, Node, Value};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("a".to_string()),
        Just("b".to_string()),
        Just("c".to_string()),
        Just("count".to_string()),
        Just("name".to_string()),
        Just("_flag".to_string()),
    ]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-z]{0,8}".prop_map(Value::Str),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar(),
        1 => proptest::collection::vec(scalar(), 0..4).prop_map(Value::List),
        1 => proptest::collection::btree_map("[a-z]{1,4}", scalar(), 0..4).prop_map(Value::Map),
    ]
}

fn fields() -> impl Strategy<Value = BTreeMap<String, Value>> {
    proptest::collection::btree_map(key(), value(), 0..6)
}

fn node_from(fields: &BTreeMap<String, Value>) -> Node {
    Node::from_fields(fields.iter().map(|(k, v)| (k.clone(), v.clone()))).unwrap()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Static set/get
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn last_assignment_wins(ops in proptest::collection::vec((key(), value()), 1..20)) {
        let node = Node::new();
        let mut expected = BTreeMap::new();
        for (k, v) in &ops {
            node.set(k, v.clone()).unwrap();
            expected.insert(k.clone(), v.clone());
        }
        for (k, v) in &expected {
            let got = node.get(k).unwrap();
            prop_assert_eq!(got.as_ref(), Some(v));
        }
        prop_assert_eq!(node.len(), expected.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Diff / apply round trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn apply_of_diff_converges(source in fields(), baseline in fields()) {
        let source = node_from(&source);
        let baseline = node_from(&baseline);
        let patch = source.diff(&baseline).unwrap();
        baseline.apply(&patch).unwrap();
        prop_assert!(source.diff(&baseline).unwrap().is_empty());
        prop_assert_eq!(source.keys(), baseline.keys());
    }

    #[test]
    fn diff_of_node_with_itself_is_empty(f in fields()) {
        let node = node_from(&f);
        prop_assert!(node.diff(&node).unwrap().is_empty());
        prop_assert!(node.diff(&node.snapshot()).unwrap().is_empty());
    }

    #[test]
    fn patch_counts_partition_entries(source in fields(), baseline in fields()) {
        let patch = node_from(&source).diff(&node_from(&baseline)).unwrap();
        prop_assert_eq!(patch.additions() + patch.removals() + patch.updates(), patch.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Freeze
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn freeze_is_idempotent(f in fields(), k in key(), v in scalar()) {
        let node = node_from(&f);
        node.freeze().unwrap();
        let first = node.structural_hash().unwrap();
        let tree = node.to_plain_tree().unwrap();
        node.freeze().unwrap();
        prop_assert_eq!(node.structural_hash().unwrap(), first);
        prop_assert_eq!(node.to_plain_tree().unwrap(), tree);

        let err = node.set(&k, v).unwrap_err();
        prop_assert!(err.is_immutability());
    }

    #[test]
    fn freezing_preserves_contents(f in fields()) {
        let node = node_from(&f);
        let before = node.to_plain_tree().unwrap();
        node.freeze().unwrap();
        prop_assert_eq!(node.to_plain_tree().unwrap(), before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Transaction rollback
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn failed_transaction_restores_everything(
        f in fields(),
        ops in proptest::collection::vec((key(), proptest::option::of(value())), 1..10),
    ) {
        let node = node_from(&f);
        let before = node.to_plain_tree().unwrap();
        let outcome: Result<(), DataError> = node.transaction(|n| {
            for (k, v) in &ops {
                match v {
                    Some(v) => n.set(k, v.clone())?,
                    None => {
                        n.remove(k)?;
                    }
                }
            }
            Err(DataError::Transaction { message: "abort".into() })
        });
        prop_assert!(outcome.is_err());
        prop_assert_eq!(node.to_plain_tree().unwrap(), before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Snapshot and plain-tree reload
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn snapshot_has_same_tree(f in fields()) {
        let node = node_from(&f);
        prop_assert_eq!(node.snapshot().to_plain_tree().unwrap(), node.to_plain_tree().unwrap());
    }

    #[test]
    fn plain_tree_reload_is_stable(f in fields()) {
        let tree = node_from(&f).to_plain_tree().unwrap();
        let reloaded = Node::from_plain_tree(&tree).unwrap();
        prop_assert_eq!(reloaded.to_plain_tree().unwrap(), tree);
    }
}
