//! End-to-end scenarios over the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use datakit_core::{
    anti_freeze, computed, lazy, method, DataError, EvalKind, Node, RemovalPolicy, Settings,
    SlotKind, TransactionState, Value,
};
use serde_json::json;

fn int(v: i64) -> Value {
    Value::Int(v)
}

#[test]
fn computed_and_lazy_slots() {
    let lazy_runs = Rc::new(Cell::new(0));
    let counter = lazy_runs.clone();
    let d = Node::builder()
        .field("x", 10)
        .field("y", computed(|s| Ok(int(s.get_i64("x")? + 5))))
        .field(
            "z",
            lazy(move |s| {
                counter.set(counter.get() + 1);
                Ok(int(s.get_i64("x")? * 2))
            }),
        )
        .build()
        .unwrap();

    assert_eq!(d.get_i64("y").unwrap(), 15);
    assert_eq!(d.get_i64("z").unwrap(), 20);
    assert_eq!(d.get_i64("z").unwrap(), 20);
    assert_eq!(lazy_runs.get(), 1);

    d.set("x", 7).unwrap();
    assert_eq!(d.get_i64("z").unwrap(), 14);
    assert_eq!(d.get_i64("y").unwrap(), 15);
    assert_eq!(lazy_runs.get(), 2);
}

#[test]
fn failed_transaction_restores_credits() {
    let d = Node::from_fields([("credits", 100)]).unwrap();
    let outcome: Result<(), DataError> = d.transaction(|n| {
        n.set("credits", n.get_i64("credits")? - 50)?;
        Err(DataError::Transaction {
            message: "payment declined".into(),
        })
    });
    match outcome {
        Err(DataError::Transaction { message }) => assert_eq!(message, "payment declined"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(d.get_i64("credits").unwrap(), 100);
}

#[test]
fn diff_then_apply() {
    let source = Node::from_fields([("x", 1), ("y", 3), ("z", 4)]).unwrap();
    let baseline = Node::from_fields([("x", 1), ("y", 2)]).unwrap();
    let patch = source.diff(&baseline).unwrap();
    assert_eq!(patch.to_plain_tree().unwrap(), json!({"y": [2, 3], "z": [null, 4]}));

    baseline.apply(&patch).unwrap();
    assert_eq!(baseline.get_i64("y").unwrap(), 3);
    assert_eq!(baseline.get_i64("z").unwrap(), 4);
}

#[test]
fn anti_freeze_cache_stays_writable() {
    let d = Node::from_fields([("cache", anti_freeze(Value::new_map()))]).unwrap();
    d.freeze().unwrap();
    d.update("cache", |c| c.insert("k", 1)).unwrap();
    assert_eq!(d.get_path("cache.k", Value::Null).unwrap(), int(1));

    let err = d.set("other", 1).unwrap_err();
    assert!(err.is_immutability());
}

#[test]
fn parent_child_cycle_serializes_with_sentinel() {
    let parent = Node::from_fields([("name", "Parent")]).unwrap();
    let child = Node::builder()
        .field("name", "Child")
        .field("parent", parent.clone())
        .build()
        .unwrap();
    parent.set("child", child).unwrap();
    assert_eq!(
        parent.to_plain_tree().unwrap(),
        json!({
            "name": "Parent",
            "child": {"name": "Child", "parent": {"$circular": true}}
        })
    );
}

#[test]
fn methods_bind_to_their_own_node() {
    for i in 0..200i64 {
        let x = Node::builder()
            .field("n", i)
            .field(
                "add",
                method(|s, args| {
                    let v = args.first().and_then(Value::as_i64).ok_or("missing argument")?;
                    Ok(int(s.get_i64("n")? + v))
                }),
            )
            .build()
            .unwrap();
        assert_eq!(x.call("add", &[int(1)]).unwrap(), int(i + 1));
    }
}

#[test]
fn method_errors_carry_key_and_cause() {
    let d = Node::from_fields([("fail", method(|_, _| Err("division by zero".into())))]).unwrap();
    match d.call("fail", &[]) {
        Err(DataError::Computation { key, kind, source }) => {
            assert_eq!(key, "fail");
            assert_eq!(kind, EvalKind::Method);
            assert_eq!(source.to_string(), "division by zero");
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn watchers_see_every_mutation_in_order() {
    let d = Node::from_fields([("a", 2), ("b", 3)]).unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    d.watch(move |k, old, new| {
        sink.borrow_mut().push((k.to_string(), old.cloned(), new.cloned()));
        Ok(())
    });
    d.set("b", 20).unwrap();
    d.set_path("nested.value", true).unwrap();
    assert_eq!(events.borrow()[0], ("b".to_string(), Some(int(3)), Some(int(20))));
    assert_eq!(events.borrow()[1].0, "nested");
}

#[test]
fn transaction_guard_states() {
    let d = Node::from_fields([("a", 1)]).unwrap();
    let tx = d.begin().unwrap();
    assert_eq!(tx.state(), TransactionState::Active);
    assert!(tx.root().ptr_eq(&d));
    d.set("a", 2).unwrap();
    tx.commit();
    assert_eq!(d.get_i64("a").unwrap(), 2);
}

#[test]
fn freeze_pins_lazy_and_locks_node() {
    let d = Node::builder()
        .field("a", 2)
        .field("product", lazy(|s| Ok(int(s.get_i64("a")? * 3))))
        .build()
        .unwrap();
    d.freeze().unwrap();
    assert_eq!(d.slot_kind("product"), Some(SlotKind::Computed));
    assert_eq!(d.get_i64("product").unwrap(), 6);
    assert!(d.set("a", 123).unwrap_err().is_immutability());
}

#[test]
fn path_access_and_defaults() {
    let d = Node::new();
    d.set_path("foo.bar.baz", 42).unwrap();
    assert_eq!(d.get_path("foo.bar.baz", Value::Null).unwrap(), int(42));
    assert_eq!(d.get_path("foo.nope", "default").unwrap(), Value::from("default"));
}

#[test]
fn snapshot_is_detached() {
    let d = Node::from_fields([("a", 1), ("b", 2)]).unwrap();
    let snap = d.snapshot();
    d.set("b", 500).unwrap();
    assert_eq!(snap.get_i64("b").unwrap(), 2);
}

#[test]
fn view_recomputes_and_wraps_failures() {
    let d = Node::from_fields([("a", 1), ("b", 99)]).unwrap();
    let v = d
        .view()
        .field("double_a", |s| Ok(int(s.get_i64("a")? * 2)))
        .field("sum", |s| Ok(int(s.get_i64("a")? + s.get_i64("b")?)));
    assert_eq!(v.get("double_a").unwrap(), int(2));
    assert_eq!(v.get("sum").unwrap(), int(100));

    let bad = d.view().field("oops", |_| Err("division by zero".into()));
    assert!(matches!(
        bad.get("oops"),
        Err(DataError::Computation {
            kind: EvalKind::View,
            ..
        })
    ));
}

#[test]
fn assign_null_removal_policy() {
    let settings = Settings {
        removal_policy: RemovalPolicy::AssignNull,
        ..Settings::default()
    };
    let source = Node::from_fields([("a", 1)]).unwrap();
    let target = Node::builder()
        .settings(settings)
        .field("a", 1)
        .field("b", 2)
        .build()
        .unwrap();
    let patch = source.diff(&target).unwrap();
    target.apply(&patch).unwrap();
    assert_eq!(target.get("b").unwrap(), Some(Value::Null));
}

#[test]
fn settings_loaded_from_yaml_flow_into_nodes() {
    use std::io::Write;
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(file, "circular_marker: \"$loop\"").unwrap();
    let settings = datakit_core::settings::load(file.path()).unwrap();

    let d = Node::with_settings(settings);
    d.set_path("inner.me", Value::Null).unwrap();
    let inner = d.get_node("inner").unwrap();
    inner.set("root", d.clone()).unwrap();
    assert_eq!(
        d.to_plain_tree().unwrap(),
        json!({"inner": {"me": null, "root": {"$loop": true}}})
    );
}
