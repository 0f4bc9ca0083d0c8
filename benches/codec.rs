//! Benchmarks for value encoding and reconciliation.
//!
//! Run with: cargo bench --bench codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use reg_reconcile::codec::{encode, matches};
use reg_reconcile::*;

// ============================================================================
// Helper functions to generate test data
// ============================================================================

/// Hex string of `len` bytes, upper case and unspaced.
fn generate_hex(len: usize) -> String {
    (0..len).map(|i| format!("{:02X}", i % 256)).collect()
}

/// Catalog with one purging key and `num_values` values under it.
fn generate_catalog(num_values: usize) -> Catalog {
    let mut entries = vec![serde_json::json!({
        "resource": "registry_key",
        "path": r"HKLM\Software\Bench",
        "purge_values": true,
    })];
    for i in 0..num_values {
        entries.push(serde_json::json!({
            "resource": "registry_value",
            "path": format!(r"HKLM\Software\Bench\Value{}", i),
            "type": "dword",
            "data": i,
        }));
    }
    Catalog::from_json(&serde_json::Value::Array(entries).to_string()).unwrap()
}

// ============================================================================
// Benchmark: codec
// ============================================================================

fn bench_encode_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_binary");

    for len in [16, 256, 4096] {
        group.throughput(Throughput::Bytes(len as u64));
        let raw = RawData::from(generate_hex(len).as_str());

        group.bench_with_input(BenchmarkId::from_parameter(len), &raw, |b, raw| {
            b.iter(|| black_box(encode(ValueKind::Binary, black_box(raw))));
        });
    }

    group.finish();
}

fn bench_encode_integers(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_integer");

    for literal in ["42", "0xFFFFFFFF", "-1", "0b1010_1010"] {
        let raw = RawData::from(literal);
        group.bench_with_input(BenchmarkId::from_parameter(literal), &raw, |b, raw| {
            b.iter(|| black_box(encode(ValueKind::Dword, black_box(raw))));
        });
    }

    group.finish();
}

fn bench_matches(c: &mut Criterion) {
    let desired = encode(ValueKind::Binary, &RawData::from(generate_hex(1024).as_str())).unwrap();
    let current = RawValue::encode(&desired);

    c.bench_function("decode_and_match_binary_1k", |b| {
        b.iter(|| {
            let decoded = black_box(&current).decode().unwrap();
            black_box(matches(ValueKind::Binary, &decoded, &desired))
        });
    });
}

// ============================================================================
// Benchmark: full runs
// ============================================================================

fn bench_engine_noop_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_noop_run");

    for num_values in [10, 100, 1000] {
        let catalog = generate_catalog(num_values);
        let mut registry = MemoryRegistry::new();
        Engine::new(&mut registry).run(&catalog, &RunOptions::default());

        group.throughput(Throughput::Elements(num_values as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_values),
            &catalog,
            |b, catalog| {
                b.iter(|| {
                    let report = Engine::new(&mut registry).run(catalog, &RunOptions::default());
                    black_box(report)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_binary,
    bench_encode_integers,
    bench_matches,
    bench_engine_noop_run,
);

criterion_main!(benches);
