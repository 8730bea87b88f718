//! Value canonicalization benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use coresync_value::{canonicalize, Value};

/// Create a flat map the size of a typical record payload.
fn flat_map() -> Value {
    Value::Map(vec![
        ("name".into(), Value::Str("Surface sample 12".into())),
        ("value".into(), Value::Float(1.0000012)),
        ("collected".into(), Value::Bool(true)),
        ("note".into(), Value::Null),
        ("depth".into(), Value::Int(14)),
    ])
}

/// Create a nested map value.
fn nested_value(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::Str("leaf".into())
    } else {
        let children: Vec<(String, Value)> = (0..width)
            .map(|i| (format!("key_{}", i), nested_value(depth - 1, width)))
            .collect();
        Value::Map(children)
    }
}

/// Benchmark canonicalizing scalar values.
fn bench_scalars(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize");

    // Null
    group.bench_function("null", |b| {
        let value = Value::Null;
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // Boolean
    group.bench_function("bool", |b| {
        let value = Value::Bool(true);
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // Float, kept below the rounding threshold
    group.bench_function("float", |b| {
        let value = Value::Float(1.0000012345);
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // Plain text, no rewrite applies
    group.bench_function("text_plain", |b| {
        let value = Value::Str("surface sample, oxidised".into());
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // Flat map
    group.bench_function("map_flat", |b| {
        let value = flat_map();
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    group.finish();
}

/// Benchmark the string rewrite paths.
fn bench_text_rewrites(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize_text");

    // ISO datetime collapsed to the second
    group.bench_function("datetime", |b| {
        let value = Value::Str("2024-03-01T12:30:45.123456+00:00".into());
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // EWKT point, reparsed and reprinted
    group.bench_function("geometry_point", |b| {
        let value = Value::Str("SRID=4326;POINT (5.1234567 6.7654321)".into());
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // EWKT polygon ring
    group.bench_function("geometry_polygon", |b| {
        let value = Value::Str(
            "SRID=4326;POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))".into(),
        );
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // Serialized JSON, parsed back into structure
    group.bench_function("json_text", |b| {
        let value = Value::Str(
            r#"{"zone": "north", "grades": [1.5, 2.25], "flagged": false}"#.into(),
        );
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    // Python-style literal, rewritten before the parse
    group.bench_function("literal_text", |b| {
        let value = Value::Str("{'zone': 'north', 'flagged': False}".into());
        b.iter(|| {
            let result = canonicalize(black_box(&value));
            black_box(result);
        });
    });

    group.finish();
}

/// Benchmark canonicalization over growing structures.
fn bench_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize_nested");

    for width in [2, 4, 8].iter() {
        let value = nested_value(3, *width);
        group.throughput(Throughput::Elements(width.pow(3) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &value, |b, value| {
            b.iter(|| {
                let result = canonicalize(black_box(value));
                black_box(result);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scalars, bench_text_rewrites, bench_nested);

criterion_main!(benches);
