// Run this benchmark with:
// cargo bench --bench logger

use criterion::{criterion_group, criterion_main, Criterion};

use beacon::{Logger, Record};

fn criterion_benchmark(c: &mut Criterion) {
    let fire_and_forget = Logger::new("bench");
    c.bench_function("info_fire_and_forget", |b| {
        b.iter(|| fire_and_forget.info("bench.tick", Record::new().with("sequence", 1i64)))
    });

    let acknowledged = Logger::new("bench");
    c.bench_function("info_acknowledged", |b| {
        b.iter(|| acknowledged.info("bench.tick", Record::new()).wait())
    });

    c.bench_function("ulid", |b| b.iter(beacon::trace::ulid));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
