use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use std::str::FromStr;

use pulsegen_rs::parser::OpCode;
use pulsegen_rs::pulse::{Pulse, WaveformCache};
use pulsegen_rs::sequence::Segment;
use pulsegen_rs::PulseParams;

const OP_CODES: &[&str] = &[
    "X90 qb1",
    "mY45 qb2",
    "sZ:theta qb3",
    "Z:2*[phi]+90 qb1",
    "CZ_nztc40 qb3 qb2",
    "mCZ:[cphase]/2 qb1 qb4",
];

fn drag_pulse(sigma: f64) -> PulseParams {
    serde_json::from_value(serde_json::json!({
        "pulse_type": "SSB_DRAG_pulse",
        "I_channel": "qb1_I",
        "Q_channel": "qb1_Q",
        "amplitude": 0.5,
        "sigma": sigma,
        "nr_sigma": 4,
        "motzoi": 0.1,
        "mod_frequency": -100e6,
    }))
    .expect("DRAG pulse parameters should deserialize")
}

fn benchmark_op_code_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("op code parsing");
    for op_code in OP_CODES {
        group.bench_with_input(BenchmarkId::from_parameter(op_code), op_code, |b, op_code| {
            b.iter(|| OpCode::from_str(black_box(op_code)))
        });
    }
    group.finish();
}

fn benchmark_drag_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("DRAG rendering");
    for sigma in [5e-9, 10e-9, 50e-9] {
        let pulse = Pulse::from_params(&drag_pulse(sigma)).expect("DRAG pulse should build");
        let tvals = Array1::range(0.0, pulse.length(), 1.0 / 2.4e9);
        group.bench_with_input(BenchmarkId::new("chan_wf", sigma), &tvals, |b, tvals| {
            b.iter(|| pulse.chan_wf(black_box("qb1_I"), tvals))
        });
    }

    // repeated pulses render once and are served from the cache afterwards
    let records: Vec<PulseParams> = (0..50)
        .map(|index| {
            let mut record = drag_pulse(10e-9);
            record.set("name", format!("drag_{index}"));
            record
        })
        .collect();
    let mut segment = Segment::new("drag train", records).expect("segment should build");
    segment.resolve_timing().expect("timing should resolve");
    group.bench_function("cached segment", |b| {
        let mut cache = WaveformCache::new();
        b.iter(|| segment.render(black_box("qb1_I"), 2.4e9, &mut cache))
    });
    group.finish();
}

criterion_group!(benches, benchmark_op_code_parsing, benchmark_drag_rendering);
criterion_main!(benches);
