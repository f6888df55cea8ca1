//! `dk demo`: a guided tour of the node engine.

use std::cell::RefCell;
use std::rc::Rc;

use datakit_core::{
    anti_freeze, computed, lazy, method, DataError, Node, Settings, Value,
};

/// Collects the demo output section by section.
#[derive(Default)]
struct Report {
    lines: Vec<String>,
}

impl Report {
    fn section(&mut self, title: &str) {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("=== {} ===", title));
    }

    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

fn plain(node: &Node) -> Result<String, DataError> {
    Ok(node.to_plain_tree()?.to_string())
}

pub fn run(settings: Settings) -> Result<String, DataError> {
    let settings = Rc::new(settings);
    let mut out = Report::default();

    out.section("BASIC CONSTRUCTION");
    let d = Node::builder()
        .settings(settings.clone())
        .field("a", 2)
        .field("b", 3)
        .field("sum", computed(|s| Ok(Value::Int(s.get_i64("a")? + s.get_i64("b")?))))
        .field("product", lazy(|s| Ok(Value::Int(s.get_i64("a")? * s.get_i64("b")?))))
        .field(
            "increment",
            method(|s, args| {
                let by = args.first().and_then(Value::as_i64).ok_or("increment needs an int")?;
                Ok(Value::Int(s.get_i64("a")? + by))
            }),
        )
        .field(
            "fail",
            method(|s, _| {
                let zero = s.get_i64("a")? - s.get_i64("a")?;
                s.get_i64("b")?.checked_div(zero).map(Value::Int).ok_or_else(|| "division by zero".into())
            }),
        )
        .build()?;
    out.line(format!("sum: {}", d.get_i64("sum")?));
    out.line(format!("product: {}", d.get_i64("product")?));
    out.line(format!("increment(5): {:?}", d.call("increment", &[Value::Int(5)])?));

    out.section("LAZY CACHE & INVALIDATION");
    d.set("a", 10)?;
    out.line(format!("product after a=10: {}", d.get_i64("product")?));
    out.line(format!("sum after a=10: {} (computed once)", d.get_i64("sum")?));

    out.section("METHOD ERROR WRAPPING");
    match d.call("fail", &[]) {
        Err(DataError::Computation { key, kind, source }) => {
            out.line(format!("{} '{}' failed: {}", kind, key, source))
        }
        other => out.line(format!("unexpected: {:?}", other)),
    }

    out.section("WATCHERS");
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let handle = d.watch(move |k, old, new| {
        sink.borrow_mut().push(format!("({}, {:?}, {:?})", k, old, new));
        Ok(())
    });
    d.set("b", 20)?;
    out.line(format!("watch events: {}", events.borrow().join(", ")));

    out.section("TRANSACTION COMMIT");
    d.transaction(|n| -> Result<(), DataError> {
        n.set("a", 1)?;
        n.set("b", 2)
    })?;
    out.line(format!("after commit: a={} b={}", d.get_i64("a")?, d.get_i64("b")?));

    out.section("TRANSACTION ROLLBACK");
    let credits = Node::builder()
        .settings(settings.clone())
        .field("credits", 100)
        .build()?;
    let outcome: Result<(), DataError> = credits.transaction(|n| {
        let c = n.get_i64("credits")?;
        n.set("credits", c - 50)?;
        Err(DataError::Transaction {
            message: "insufficient funds".into(),
        })
    });
    if let Err(e) = outcome {
        out.line(format!("transaction failed: {}", e));
    }
    out.line(format!("credits after rollback: {}", credits.get_i64("credits")?));
    handle.unsubscribe();

    out.section("FREEZE");
    d.freeze()?;
    match d.set("a", 123) {
        Err(e) if e.is_immutability() => out.line(format!("freeze OK ({})", e)),
        other => out.line(format!("unexpected: {:?}", other)),
    }
    out.line(format!("hash: {:016x}", d.structural_hash()?));

    out.section("ANTI FREEZE");
    let d2 = Node::builder()
        .settings(settings.clone())
        .field("x", 1)
        .field("y", anti_freeze(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        .build()?;
    d2.freeze()?;
    d2.update("y", |v| v.push(4))?;
    out.line(format!("anti-freeze: {}", plain(&d2)?));
    match d2.set("x", 2) {
        Err(e) => out.line(format!("x stays frozen: {}", e)),
        Ok(()) => out.line("unexpected: x was writable"),
    }

    out.section("PATH GET / SET");
    let d3 = Node::with_settings(settings.clone());
    d3.set_path("foo.bar.baz", 42)?;
    out.line(format!("path get: {:?}", d3.get_path("foo.bar.baz", Value::Null)?));
    out.line(format!("missing path: {:?}", d3.get_path("foo.nope", "default")?));

    out.section("DIFF / APPLY");
    let source = Node::builder()
        .settings(settings.clone())
        .field("x", 1)
        .field("y", 3)
        .field("z", 4)
        .build()?;
    let baseline = Node::builder()
        .settings(settings.clone())
        .field("x", 1)
        .field("y", 2)
        .build()?;
    let patch = source.diff(&baseline)?;
    out.line(format!("patch: {} ({})", patch.to_plain_tree()?, patch.summary()));
    baseline.apply(&patch)?;
    out.line(format!("after apply: {}", plain(&baseline)?));

    out.section("SNAPSHOT");
    let snap = baseline.snapshot();
    baseline.set("y", 500)?;
    out.line(format!("snapshot preserved: y={}", snap.get_i64("y")?));

    out.section("VIEW");
    let view = baseline
        .view()
        .field("double_x", |s| Ok(Value::Int(s.get_i64("x")? * 2)))
        .field("sum", |s| Ok(Value::Int(s.get_i64("x")? + s.get_i64("y")?)));
    for (name, value) in view.evaluate_all()? {
        out.line(format!("view.{}: {:?}", name, value));
    }
    let bad = baseline.view().field("oops", |s| Ok(s.require("missing")?));
    if let Err(e) = bad.get("oops") {
        out.line(format!("view error OK: {}", e));
    }

    out.section("CIRCULAR SERIALIZATION");
    let parent = Node::builder()
        .settings(settings.clone())
        .field("name", "Parent")
        .build()?;
    let child = Node::builder()
        .settings(settings.clone())
        .field("name", "Child")
        .field("parent", parent.clone())
        .build()?;
    parent.set("child", child)?;
    out.line(plain(&parent)?);

    out.section("MASS OBJECT STRESS");
    let mut total = 0;
    for i in 0..1000i64 {
        let o = Node::builder()
            .field("i", i)
            .field("sq", computed(|s| Ok(Value::Int(s.get_i64("i")?.pow(2)))))
            .field(
                "add",
                method(|s, args| {
                    let v = args.first().and_then(Value::as_i64).unwrap_or(0);
                    Ok(Value::Int(s.get_i64("i")? + v))
                }),
            )
            .field("lz", lazy(|s| Ok(Value::Int(s.get_i64("i")? + 1))))
            .build()?;
        total += o.get_i64("sq")?;
        total += o.call("add", &[Value::Int(1)])?.as_i64().unwrap_or(0);
        total += o.get_i64("lz")?;
    }
    out.line(format!("mass total: {}", total));

    // Break the parent/child cycle so both nodes are dropped.
    parent.remove("child")?;
    Ok(out.finish())
}
