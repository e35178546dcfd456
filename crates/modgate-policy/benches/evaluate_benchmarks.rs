//! Evaluation latency benchmarks
//!
//! Measures `DecisionEngine::evaluate` across policy set sizes and for each
//! exit path: policy hit, blacklist hit, and fall-through to review.
//!
//! Run with: cargo bench -p modgate-policy

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modgate_policy::{DecisionEngine, DocumentSource, KeywordBlacklist};
use std::fmt::Write;
use std::sync::Arc;

/// `count` keyword policies followed by one composite policy
fn policy_document(count: usize) -> String {
    let mut doc = String::from("policies:\n");
    for i in 0..count {
        let _ = writeln!(
            doc,
            "  - {{ id: p{i}, rule: {{ type: keyword, keywords: [word{i}a, word{i}b, word{i}c] }}, risk: MEDIUM }}"
        );
    }
    doc.push_str(
        "  - id: combo\n    rule:\n      type: AND\n      rules:\n        - { type: keyword, keywords: [target] }\n        - { type: user, prefixes: [bot_] }\n    action: REJECTED\n",
    );
    doc
}

fn engine(count: usize) -> DecisionEngine {
    let engine = DecisionEngine::new(Arc::new(KeywordBlacklist::new([
        "spam", "scam", "illegal",
    ])));
    engine
        .load(&DocumentSource::yaml(policy_document(count)))
        .expect("benchmark document should load");
    engine
}

/// Worst case: every policy is evaluated before the last one matches
fn benchmark_policy_set_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_last_policy");

    for count in [1, 10, 100, 1_000] {
        let engine = engine(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &engine, |b, engine| {
            b.iter(|| engine.evaluate(black_box("hit the target please"), black_box("bot_7")))
        });
    }

    group.finish();
}

fn benchmark_exit_paths(c: &mut Criterion) {
    let engine = engine(50);
    let cases = [
        ("first_policy", "contains word0b here", "u1"),
        ("blacklist", "cheap spam offer", "u1"),
        ("queued", "an ordinary message with nothing to see", "u1"),
    ];

    let mut group = c.benchmark_group("evaluate_exit_path");
    for (name, text, user) in cases {
        group.bench_with_input(BenchmarkId::new("evaluate", name), &(text, user), |b, (text, user)| {
            b.iter(|| engine.evaluate(black_box(text), black_box(user)))
        });
    }
    group.finish();
}

fn benchmark_load(c: &mut Criterion) {
    let document = policy_document(100);
    let engine = DecisionEngine::new(Arc::new(KeywordBlacklist::default()));

    c.bench_function("load_100_policies", |b| {
        b.iter(|| {
            engine
                .load(&DocumentSource::yaml(black_box(document.as_str())))
                .expect("benchmark document should load")
        })
    });
}

criterion_group!(
    benches,
    benchmark_policy_set_size,
    benchmark_exit_paths,
    benchmark_load
);
criterion_main!(benches);
