use stake_replay::floatstream;
use stake_replay::games::{GameId, Registry, Seeds};
use stake_replay::predicate::{Op, Predicate};
use stake_replay::scan::{scan, ScanRequest};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        deriving_a_single_float_block,
        filling_a_ten_float_buffer,
        evaluating_ten_thousand_dice_nonces,
        scanning_one_million_nonces_for_crash,
}

fn deriving_a_single_float_block(c: &mut criterion::Criterion) {
    let server = b"bench-server-seed";
    c.bench_function("derive one HMAC block", |b| {
        b.iter(|| floatstream::fill_buf(server, "bench-client-seed", 1, 0, &mut [0.0; 8]).unwrap())
    });
}

fn filling_a_ten_float_buffer(c: &mut criterion::Criterion) {
    let server = b"bench-server-seed";
    let mut buf = [0.0; 10];
    c.bench_function("fill a ten-float keno buffer", |b| {
        b.iter(|| floatstream::fill_buf(server, "bench-client-seed", 1, 0, &mut buf).unwrap())
    });
}

fn evaluating_ten_thousand_dice_nonces(c: &mut criterion::Criterion) {
    let registry = Registry::default();
    let game = registry.get(GameId::Dice).unwrap();
    let server = b"bench-server-seed";
    let params = serde_json::json!({});
    c.bench_function("evaluate 10k dice nonces", |b| {
        b.iter(|| {
            let mut floats = [0.0; 1];
            for nonce in 1..=10_000u64 {
                floatstream::fill_buf(server, "bench-client-seed", nonce, 0, &mut floats).unwrap();
                game.evaluate(&floats, &params, false).unwrap();
            }
        })
    });
}

fn scanning_one_million_nonces_for_crash(c: &mut criterion::Criterion) {
    let registry = Registry::default();
    c.bench_function("scan 1M nonces for a rare crash predicate", |b| {
        b.iter(|| {
            let request = ScanRequest {
                game: GameId::Crash,
                seeds: Seeds {
                    server: b"bench-server-seed",
                    client: "bench-client-seed",
                },
                nonce_start: 1,
                nonce_end: 1_000_000,
                params: serde_json::json!({}),
                predicate: Predicate {
                    op: Op::Ge,
                    val: 1000.0,
                    val2: None,
                    tolerance: None,
                },
                limit: 0,
                timeout_ms: 0,
            };
            scan(&request, &registry, Arc::new(AtomicBool::new(false))).unwrap()
        })
    });
}
