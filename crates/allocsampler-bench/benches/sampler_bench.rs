//! Benchmarks for the allocation-free sampling decision hot path.

use allocsampler_core::config::{SamplerConfig, SamplerScheme};
use allocsampler_core::decision::{ThreadSamplerState, decide_alloc, decide_free};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn cfg_with(scheme: SamplerScheme) -> SamplerConfig {
    SamplerConfig {
        scheme,
        ..SamplerConfig::default()
    }
}

fn bench_decide_alloc(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 64, 256, 1024, 4096, 32768];
    let mut group = c.benchmark_group("decide_alloc");

    for scheme in [SamplerScheme::Poisson, SamplerScheme::StatelessHash, SamplerScheme::Combined] {
        for &size in sizes {
            let label = format!("{scheme:?}");
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, &sz| {
                let mut state = ThreadSamplerState::new(0x1000, 1_700_000_000, 7);
                let cfg = cfg_with(scheme);
                let mut addr = 0x1000usize;
                b.iter(|| {
                    addr = addr.wrapping_add(32);
                    criterion::black_box(decide_alloc(&mut state, &cfg, addr, sz));
                });
            });
        }
    }
    group.finish();
}

fn bench_decide_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide_free");

    for scheme in [SamplerScheme::Poisson, SamplerScheme::StatelessHash, SamplerScheme::Combined] {
        let label = format!("{scheme:?}");
        group.bench_function(&label, |b| {
            let cfg = cfg_with(scheme);
            let mut addr = 0x1000usize;
            b.iter(|| {
                addr = addr.wrapping_add(32);
                criterion::black_box(decide_free(&cfg, addr, || false));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decide_alloc, bench_decide_free);
criterion_main!(benches);
