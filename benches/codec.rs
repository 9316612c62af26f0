//! Codec benchmark suite.
//!
//! Benchmarks JSON-RPC encoding and decoding at different payload sizes:
//! - Param sizes: 16, 256, 4096 array entries
//! - Text and binary inbound frames
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use resilient_ws::{Codec, JsonRpcCodec, Payload, RetryPolicy, RpcMessage};
use serde_json::json;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PARAM_SIZES: &[usize] = &[16, 256, 4096];

fn request(size: usize) -> RpcMessage {
    let params: Vec<u64> = (0..size as u64).collect();
    RpcMessage::request(1, "bench.method", Some(json!({ "values": params })))
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let codec = JsonRpcCodec;
    let mut group = c.benchmark_group("encode");

    for &size in PARAM_SIZES {
        let message = request(size);
        let encoded = codec.encode(&message).expect("encode");
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(BenchmarkId::new("request", size), &message, |b, message| {
            b.iter(|| codec.encode(black_box(message)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let codec = JsonRpcCodec;
    let mut group = c.benchmark_group("decode");

    for &size in PARAM_SIZES {
        let text = codec.encode(&request(size)).expect("encode");
        let binary = Payload::Binary(text.as_bytes().to_vec());
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_with_input(BenchmarkId::new("text", size), &text, |b, payload| {
            b.iter(|| codec.decode(black_box(payload)));
        });
        group.bench_with_input(BenchmarkId::new("binary", size), &binary, |b, payload| {
            b.iter(|| codec.decode(black_box(payload)));
        });
    }

    let garbage = Payload::from("{\"jsonrpc\":\"2.0\",\"id\":1");
    group.bench_function("malformed", |b| {
        b.iter(|| codec.decode(black_box(&garbage)));
    });

    group.finish();
}

// ============================================================================
// Benchmark: Backoff Schedule
// ============================================================================

fn bench_schedule(c: &mut Criterion) {
    let policy = RetryPolicy::default();
    c.bench_function("retry_schedule", |b| {
        b.iter(|| black_box(&policy).schedule().sum::<std::time::Duration>());
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_schedule);
criterion_main!(benches);
