use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use num::BigUint;
use rand::Rng;
use header_warp::blocks::block::CanonicalHeader;
use header_warp::blocks::hash::ChainHash;
use header_warp::circuits::encoder::{encode_batch, HEADERS_PER_BATCH};

fn random_batch() -> (Vec<CanonicalHeader>, Vec<BigUint>) {
    let mut rng = rand::thread_rng();
    let headers = (0..HEADERS_PER_BATCH)
        .map(|_| {
            let mut bytes = [0u8; 80];
            rng.fill(&mut bytes[..]);
            CanonicalHeader::from_bytes(&bytes).unwrap()
        })
        .collect();
    let targets = (0..HEADERS_PER_BATCH)
        .map(|_| BigUint::from(rng.gen::<u128>()) << 96)
        .collect();
    (headers, targets)
}

fn criterion_benchmark(c: &mut Criterion) {
    let (headers, targets) = random_batch();

    let mut group = c.benchmark_group("encoding");
    group.sample_size(50);

    group.bench_function("encode_batch", |b| {
        b.iter(|| encode_batch(&headers, &targets, &ChainHash::ZERO).unwrap())
    });
    group.bench_function("hash_batch", |b| {
        b.iter(|| headers.iter().map(|h| h.hash()).collect::<Vec<_>>())
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
