//! Record fingerprinting benchmarks.

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use coresync_schema::DEFAULT_EXCLUDED_FIELDS;
use coresync_value::{canonical_record, fingerprint, to_canonical_json, Record, Value};

/// Create the default excluded-field set.
fn excluded() -> BTreeSet<String> {
    DEFAULT_EXCLUDED_FIELDS.iter().map(ToString::to_string).collect()
}

/// Create a record with `fields` mixed-type fields.
fn wide_record(fields: usize) -> Record {
    let mut record = Record::with_capacity(fields);
    for i in 0..fields {
        let value = match i % 4 {
            0 => Value::Str(format!("text value {}", i)),
            1 => Value::Int(i as i64),
            2 => Value::Float(i as f64 + 0.125),
            _ => Value::Bool(i % 8 == 3),
        };
        record.set(format!("field_{}", i), value);
    }
    record
}

/// Create a record shaped like a synced row: id, audit fields, payload.
fn typical_record() -> Record {
    let mut record = Record::new();
    record.set("id", 1204_i64);
    record.set("name", "Surface sample 12");
    record.set("value", 1.0000012);
    record.set("collected", true);
    record.set("collected_at", "2024-03-01T12:30:45+00:00");
    record.set("geometry", "SRID=4326;POINT (115.857 -31.9505)");
    record.set("note", Value::Null);
    record.set("created_at", "2024-02-28T09:00:00+00:00");
    record.set("updated_at", "2024-03-01T12:31:02+00:00");
    record.set("created_by", "field-tablet-3");
    record
}

/// Benchmark fingerprinting a typical synced row.
fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    let excluded = excluded();

    group.bench_function("typical", |b| {
        let record = typical_record();
        b.iter(|| {
            let result = fingerprint(black_box(&record), &excluded).unwrap();
            black_box(result);
        });
    });

    // Same row without the audit fields the hash drops
    group.bench_function("typical_no_excluded", |b| {
        let record = canonical_record(&typical_record(), &excluded);
        let none = BTreeSet::new();
        b.iter(|| {
            let result = fingerprint(black_box(&record), &none).unwrap();
            black_box(result);
        });
    });

    group.finish();
}

/// Benchmark fingerprinting over growing field counts.
fn bench_fingerprint_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint_width");
    let excluded = excluded();

    for fields in [8, 16, 32, 64].iter() {
        let record = wide_record(*fields);
        group.throughput(Throughput::Elements(*fields as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(fields),
            &record,
            |b, record| {
                b.iter(|| {
                    let result = fingerprint(black_box(record), &excluded).unwrap();
                    black_box(result);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the canonical JSON stage on its own.
fn bench_canonical_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical_json");

    group.bench_function("typical", |b| {
        let value = Value::Map(typical_record().into_pairs());
        b.iter(|| {
            let result = to_canonical_json(black_box(&value)).unwrap();
            black_box(result);
        });
    });

    group.bench_function("wide_64", |b| {
        let value = Value::Map(wide_record(64).into_pairs());
        b.iter(|| {
            let result = to_canonical_json(black_box(&value)).unwrap();
            black_box(result);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_fingerprint_width,
    bench_canonical_json,
);

criterion_main!(benches);
