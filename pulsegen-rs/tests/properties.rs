//! Laws every operation dictionary and pulse shape should obey, checked through the public API.

use approx::assert_relative_eq;
use ndarray::Array1;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use pulsegen_rs::builder::{BlockAlignment, CompositionOptions, DecompositionPolicy, SweepOptions, SweepOutput};
use pulsegen_rs::pulse::Pulse;
use pulsegen_rs::sequence::{BuildOptions, Segment};
use pulsegen_rs::sweep::SweepPoints;
use pulsegen_rs::{BuilderConfig, CircuitBuilder, OperationDict, ParamValue, PulseParams};

const OPERATIONS: &str = include_str!("fixtures/two_qubits.json");
const DRAG_LENGTH: f64 = 4e-8;

fn builder_with(config: BuilderConfig) -> CircuitBuilder {
    CircuitBuilder::new(OperationDict::from_json(OPERATIONS).unwrap(), config)
}

fn builder() -> CircuitBuilder {
    builder_with(BuilderConfig::default())
}

fn rotation(pulse: &PulseParams, qubit: &str) -> Option<f64> {
    pulse.value("basis_rotation")?.as_map()?.get(qubit)?.as_f64()
}

fn params(value: serde_json::Value) -> PulseParams {
    serde_json::from_value(value).unwrap()
}

#[rstest]
#[case("X90 qb1")]
#[case("mY45 qb2")]
#[case("sX180 qb1")]
#[case("Z37.5 qb2")]
#[case("X:theta qb1")]
#[case("CZ qb1 qb2")]
#[case("CZ_nztc qb2 qb1")]
fn resolution_is_idempotent(#[case] op: &str) {
    let builder = builder();
    assert_eq!(builder.get_pulses(op).unwrap(), builder.get_pulses(op).unwrap());
}

#[test]
fn default_cz_is_the_calibrated_gate() {
    let builder = builder();
    let resolved = builder.get_pulse("CZ qb1 qb2").unwrap();
    let mut calibrated = builder
        .operation_dict()
        .copy_op("CZ_nztc qb2 qb1")
        .unwrap();
    calibrated.set("op_code", "CZ qb1 qb2");
    assert_eq!(resolved, calibrated);
}

#[rstest]
#[case(90.0)]
#[case(45.0)]
#[case(270.0)]
fn decomposed_cz_accumulates_the_requested_phase(#[case] cphase: f64) {
    let mut config = BuilderConfig::default();
    config
        .decompose_rotation_gates
        .insert("CZ_nztc".to_owned(), DecompositionPolicy::All(true));
    let pulses = builder_with(config)
        .get_pulses(&format!("CZ_nztc{cphase} qb1 qb2"))
        .unwrap();
    assert_eq!(pulses.len(), 12);
    assert_eq!(pulses[1].op_code(), Some("CZ_nztc qb2 qb1"));
    assert_eq!(pulses[7].op_code(), Some("CZ_nztc qb2 qb1"));
    let net = |qubit: &str| -> f64 {
        pulses
            .iter()
            .filter_map(|p| rotation(p, qubit))
            .sum::<f64>()
            .rem_euclid(360.0)
    };
    // the frame of the first qubit is restored, the phase splits evenly between the qubits
    assert_relative_eq!(net("qb1"), 0.0, epsilon = 1e-9);
    assert_relative_eq!(net("qb2"), (-cphase / 2.0).rem_euclid(360.0), epsilon = 1e-9);
    let differential = rotation(&pulses[4], "qb1").unwrap() - rotation(&pulses[11], "qb2").unwrap();
    assert_relative_eq!(differential, cphase, epsilon = 1e-9);
}

proptest! {
    #[test]
    fn minus_modifier_negates_virtual_rotations(angle in -720.0f64..720.0) {
        let builder = builder();
        let angle = (angle * 8.0).round() / 8.0;
        let plain = builder.get_pulse(&format!("Z{angle} qb1")).unwrap();
        let negated = builder.get_pulse(&format!("mZ{angle} qb1")).unwrap();
        prop_assert_eq!(rotation(&plain, "qb1"), Some(angle));
        prop_assert_eq!(rotation(&negated, "qb1"), Some(-angle));
    }

    #[test]
    fn simultaneous_modifier_only_sets_the_reference_point(angle in 0.0f64..360.0) {
        let builder = builder();
        let angle = angle.round();
        let op = format!("sZ{angle} qb2");
        let mut plain = builder.get_pulse(&format!("Z{angle} qb2")).unwrap();
        let simultaneous = builder.get_pulse(&op).unwrap();
        plain.set("ref_point", "start").set("op_code", op.as_str());
        prop_assert_eq!(plain, simultaneous);
    }

    #[test]
    fn simultaneous_blocks_end_with_the_longest(n_first in 1usize..4, n_second in 1usize..4) {
        let builder = builder();
        let end_time = |first: usize, second: usize| -> f64 {
            let blocks = vec![
                builder.block_from_ops("first", &vec!["X180 qb1"; first], None, None).unwrap(),
                builder.block_from_ops("second", &vec!["X90 qb2"; second], None, None).unwrap(),
            ];
            let options = CompositionOptions {
                block_align: BlockAlignment::Start,
                ..CompositionOptions::default()
            };
            let pulses = builder
                .simultaneous_blocks("both", blocks, &options)
                .unwrap()
                .build(BuildOptions::default())
                .unwrap();
            let mut segment = Segment::new("segment", pulses).unwrap();
            segment.resolve_timing().unwrap();
            segment
                .resolved_pulses()
                .unwrap()
                .iter()
                .find(|pulse| pulse.name.ends_with("simultaneous_end_pulse"))
                .map(Pulse::algorithm_time)
                .unwrap()
        };
        let expected = n_first.max(n_second) as f64 * DRAG_LENGTH;
        let end = end_time(n_first, n_second);
        prop_assert!((end - expected).abs() < 1e-15);
        prop_assert!((end_time(n_second, n_first) - end).abs() < 1e-15);
    }

    #[test]
    fn sweeps_give_one_segment_per_point(n in 1usize..6, m in 1usize..4) {
        let builder = builder();
        let mut sweep_points = SweepPoints::single("theta", (0..n).map(|k| k as f64 * 10.0));
        if m > 1 {
            sweep_points.add_sweep_dimension();
            sweep_points
                .add_sweep_parameter("phi", (0..m).map(|k| k as f64), "deg", "Phase")
                .unwrap();
        }
        let options = SweepOptions {
            body_block: Some(
                builder
                    .block_from_ops("body", &["X:theta qb1", "X90 qb2"], None, None)
                    .unwrap(),
            ),
            ..SweepOptions::default()
        };
        let SweepOutput::Sequences { sequences, acq_indices } =
            builder.sweep_n_dim(&sweep_points, options).unwrap()
        else {
            panic!("expected sequences");
        };
        prop_assert_eq!(sequences.len(), m);
        prop_assert!(sequences.iter().all(|sequence| sequence.len() == n));
        // both readouts share one acquisition element
        prop_assert_eq!(sequences[0].n_acq_elements(), n);
        prop_assert_eq!(acq_indices[0].len(), n);
        prop_assert_eq!(acq_indices.len(), if m > 1 { 2 } else { 1 });
    }

    #[test]
    fn samples_only_depend_on_their_hashables(
        amplitude in -0.5f64..0.5,
        amplitude2 in -0.5f64..0.5,
        other_amplitude2 in -0.5f64..0.5,
    ) {
        prop_assume!(amplitude2 != other_amplitude2);
        let flip = |amplitude2: f64| {
            Pulse::from_params(&params(serde_json::json!({
                "pulse_type": "BufferedNZFLIPPulse",
                "channel": "fl1",
                "channel2": "fl2",
                "amplitude": amplitude,
                "amplitude2": amplitude2,
                "pulse_length": 40e-9,
            })))
            .unwrap()
        };
        let first = flip(amplitude2);
        let second = flip(other_amplitude2);
        let tvals = Array1::range(0.0, 100e-9, 1e-9);
        prop_assert_eq!(first.hashables(0.0, "fl1"), second.hashables(0.0, "fl1"));
        prop_assert_eq!(first.chan_wf("fl1", &tvals), second.chan_wf("fl1", &tvals));
        prop_assert_ne!(first.hashables(0.0, "fl2"), second.hashables(0.0, "fl2"));
    }

    #[test]
    fn transition_controlled_pulses_are_net_zero(
        pulse_length in 10u32..60,
        trans_length in 0u32..10,
        trans2_length in 0u32..10,
        trans_amplitude in -0.2f64..0.2,
        trans2_amplitude in -0.2f64..0.2,
    ) {
        let pulse = Pulse::from_params(&params(serde_json::json!({
            "pulse_type": "NZTransitionControlledPulse",
            "channel": "fl1",
            "channel2": "fl2",
            "amplitude": 0.3,
            "amplitude2": 0.1,
            "pulse_length": f64::from(pulse_length) * 1e-9,
            "trans_amplitude": trans_amplitude,
            "trans_amplitude2": trans_amplitude / 2.0,
            "trans_length": f64::from(trans_length) * 1e-9,
            "trans2_amplitude": trans2_amplitude,
            "trans2_amplitude2": trans2_amplitude / 2.0,
            "trans2_length": f64::from(trans2_length) * 1e-9,
        })))
        .unwrap();
        for channel in ["fl1", "fl2"] {
            prop_assert!(integral(&pulse, channel).abs() < 1e-13);
        }
    }

    #[test]
    fn flip_pulses_are_net_zero(
        alpha in 0.5f64..2.0,
        flux_buffer_length in 0u32..5,
        channel_relative_delay in -4i32..4,
    ) {
        let pulse = Pulse::from_params(&params(serde_json::json!({
            "pulse_type": "BufferedNZFLIPPulse",
            "channel": "fl1",
            "channel2": "fl2",
            "amplitude": 0.3,
            "amplitude2": -0.2,
            "alpha": alpha,
            "pulse_length": 40e-9,
            "flux_buffer_length": f64::from(flux_buffer_length) * 1e-9,
            "channel_relative_delay": f64::from(channel_relative_delay) * 1e-9,
        })))
        .unwrap();
        for channel in ["fl1", "fl2"] {
            prop_assert!(integral(&pulse, channel).abs() < 1e-13);
        }
    }
}

fn integral(pulse: &Pulse, channel: &str) -> f64 {
    let dt = 0.1e-9;
    let tvals = (Array1::range(0.0, (pulse.length() + 20e-9) / dt, 1.0) + 0.5) * dt;
    pulse.chan_wf(channel, &tvals).sum() * dt
}

#[test]
fn parametric_rotations_resolve_like_numeric_ones() {
    let builder = builder();
    let mut parametric = builder.get_pulse("mZ:phi qb1").unwrap();
    parametric
        .resolve_parametric(&[("phi".to_owned(), 30.0)].into())
        .unwrap();
    let numeric = builder.get_pulse("mZ30 qb1").unwrap();
    assert_eq!(rotation(&parametric, "qb1"), rotation(&numeric, "qb1"));
    assert!(matches!(
        parametric.value("basis_rotation"),
        Some(ParamValue::Map(_))
    ));
}
