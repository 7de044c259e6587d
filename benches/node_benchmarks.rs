use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use einklang::host::{HostProfile, SoftwareContext};
use einklang::nodes::{ConstantSource, Gain, IirFilter, Oscillator};
use einklang::{CapabilityCache, OfflineAudioContext, OfflineContextOptions};

fn context(profile: HostProfile) -> OfflineAudioContext {
    let options = OfflineContextOptions::new(1, 44_100, 44_100.0);
    let native = SoftwareContext::with_profile(options, profile).unwrap();
    OfflineAudioContext::with_cache(Arc::new(native), Arc::new(CapabilityCache::new()))
}

fn iir_graph(profile: HostProfile) -> OfflineAudioContext {
    let context = context(profile);
    let source = context.add(Oscillator::sine(440.0)).unwrap();
    let filter = context
        .add(IirFilter::new(vec![0.0675, 0.135, 0.0675], vec![1.0, -1.143, 0.4128]))
        .unwrap();
    source.connect(&filter).unwrap();
    filter.connect(&context.destination()).unwrap();
    source.start(0.0).unwrap();
    context
}

fn gain_graph(profile: HostProfile) -> OfflineAudioContext {
    let context = context(profile);
    let source = context.add(ConstantSource::new(1.0)).unwrap();
    let gain = context.add(Gain::new(0.5)).unwrap();
    source.connect(&gain).unwrap();
    gain.connect(&context.destination()).unwrap();
    source.start(0.0).unwrap();
    context
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt().try_init();
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

    c.bench_function("IirFilter native, 1s", |b| {
        b.iter(|| {
            let context = iir_graph(HostProfile::complete());
            black_box(runtime.block_on(context.start_rendering()).unwrap())
        })
    });

    c.bench_function("IirFilter faked, 1s", |b| {
        b.iter(|| {
            let context = iir_graph(HostProfile::complete().with_iir_filter(false));
            black_box(runtime.block_on(context.start_rendering()).unwrap())
        })
    });

    c.bench_function("ConstantSource -> Gain offline render, 1s", |b| {
        b.iter(|| {
            let context = gain_graph(HostProfile::minimal());
            black_box(runtime.block_on(context.start_rendering()).unwrap())
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
