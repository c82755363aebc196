//! # State-Channel Client Benchmarks
//!
//! | Subsystem | Path | Target |
//! |-----------|------|--------|
//! | sc-01 Signer | sign + recover an envelope hash | < 1ms |
//! | sc-02 RPC Session | envelope encode / decode | < 10µs |
//! | sc-02 RPC Session | correlation register + complete | < 5µs |
//! | sc-03 Channel Lifecycle | resize guard | < 5µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sc_01_signer::{recover_address, LocalSigner, Signer};
use sc_02_rpc_session::{Envelope, PendingRequestStore, RpcMessage};
use sc_03_channel_lifecycle::{validate_resize, BalanceSnapshot};
use serde_json::json;
use shared_types::{SignedAmount, U256};
use std::time::Duration;

fn sample_envelope(id: u64) -> Envelope {
    Envelope::new(
        id,
        "resize_channel",
        json!({
            "channel_id": format!("0x{}", "ab".repeat(32)),
            "allocate_amount": "5000000",
            "resize_amount": "-10000000",
            "funds_destination": format!("0x{}", "cd".repeat(20)),
        }),
        1_700_000_000_000 + id,
    )
}

fn bench_signer(c: &mut Criterion) {
    let mut group = c.benchmark_group("sc-01-signer");
    group.measurement_time(Duration::from_secs(5));

    let signer = LocalSigner::random();
    let hash = sample_envelope(1).signing_hash();
    let signature = signer.sign_hash(&hash).unwrap();

    group.bench_function("sign_envelope", |b| {
        b.iter(|| black_box(signer.sign_hash(black_box(&hash)).unwrap()))
    });
    group.bench_function("recover_envelope_signer", |b| {
        b.iter(|| black_box(recover_address(black_box(&hash), &signature).unwrap()))
    });
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("sc-02-codec");

    let envelope = sample_envelope(7);
    let text = RpcMessage::request(envelope.clone(), vec![]).to_text();

    group.bench_function("encode", |b| b.iter(|| black_box(envelope.encode())));
    group.bench_function("decode_frame", |b| {
        b.iter(|| black_box(RpcMessage::from_text(black_box(&text)).unwrap()))
    });
    group.finish();
}

fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sc-02-correlation");

    for in_flight in [1u64, 64, 1024] {
        group.throughput(Throughput::Elements(in_flight));
        group.bench_with_input(
            BenchmarkId::new("register_complete", in_flight),
            &in_flight,
            |b, &n| {
                b.iter(|| {
                    let store = PendingRequestStore::new(1024);
                    let receivers: Vec<_> =
                        (0..n).map(|id| store.register(id, "get_assets")).collect();
                    for id in 0..n {
                        let reply = RpcMessage::response(
                            Envelope::new(id, "get_assets", json!({}), 0),
                            vec![],
                        );
                        black_box(store.complete(reply));
                    }
                    black_box(receivers)
                })
            },
        );
    }
    group.finish();
}

fn bench_resize_guard(c: &mut Criterion) {
    let mut group = c.benchmark_group("sc-03-resize-guard");

    let snapshot = BalanceSnapshot {
        decimals: 6,
        custody: U256::from(100_000_000u64),
        channel: U256::from(10_000_000u64),
        unified: U256::from(50_000_000u64),
    };
    let resize = SignedAmount::negative(U256::from(10_000_000u64));
    let allocate = SignedAmount::positive(U256::from(5_000_000u64));

    group.bench_function("validate_resize", |b| {
        b.iter(|| black_box(validate_resize(&snapshot, resize, allocate).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_signer,
    bench_codec,
    bench_correlation,
    bench_resize_guard
);
criterion_main!(benches);
