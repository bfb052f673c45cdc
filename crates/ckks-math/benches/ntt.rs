use ckks_math::{ntt::NttOperator, rq::Context, rq::Poly, rq::Representation, zq::Modulus};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::thread_rng;
use std::sync::Arc;

fn ntt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ntt");
    let mut rng = thread_rng();
    let p = 4611686018326724609;

    for degree in [4096usize, 8192, 16384] {
        let q = Modulus::new(p).unwrap();
        let op = NttOperator::new(&q, degree).unwrap();
        let mut a = q.random_vec(degree, &mut rng);

        group.bench_function(BenchmarkId::new("forward", degree), |b| {
            b.iter(|| op.forward(&mut a));
        });
        group.bench_function(BenchmarkId::new("backward", degree), |b| {
            b.iter(|| op.backward(&mut a));
        });
    }

    group.finish();
}

fn poly(c: &mut Criterion) {
    let mut group = c.benchmark_group("poly");
    let mut rng = thread_rng();
    let ctx = Arc::new(
        Context::new(
            &[
                4611686018326724609,
                4611686018309947393,
                4611686018232352769,
            ],
            8192,
        )
        .unwrap(),
    );
    let p = Poly::random(&ctx, Representation::Ntt, &mut rng);
    let q = Poly::random(&ctx, Representation::Ntt, &mut rng);

    group.bench_function("mul", |b| b.iter(|| &p * &q));
    group.bench_function("substitute", |b| b.iter(|| p.substitute(5).unwrap()));
    group.bench_function("mod_switch_down_next", |b| {
        b.iter(|| {
            let mut r = p.clone();
            r.mod_switch_down_next().unwrap();
            r
        })
    });

    group.finish();
}

criterion_group!(benches, ntt, poly);
criterion_main!(benches);
