#[macro_use]
extern crate criterion;

use std::sync::Arc;

use criterion::Criterion;
use smartplc_config::{tags, PlcConfig};
use smartplc_core::time::VirtualClock;
use smartplc_engine::SimulationEngine;
use smartplc_simulator::NoiseSeed;

/// Cost of one full tick: drain, model steps, commit, alarms and publish.
fn bench_single_tick(c: &mut Criterion) {
    let engine = SimulationEngine::builder(PlcConfig::default())
        .clock(Arc::new(VirtualClock::new(0)))
        .seed(NoiseSeed::Fixed(42))
        .build()
        .unwrap();
    let subscription = engine.subscribe();
    engine.set_actuator(tags::MOTOR, true).unwrap();

    c.bench_function("engine_single_tick", |b| {
        b.iter(|| {
            engine.step().unwrap();
            subscription.drain();
        })
    });
}

criterion_group!(benches, bench_single_tick);
criterion_main!(benches);
