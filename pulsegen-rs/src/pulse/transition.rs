// Copyright 2021 Rigetti Computing
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Net-zero flux pulses whose conditional phase is set through transition steps.

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::{
    from_params, hashables, piecewise::piecewise_constant, to_params, Hashable, PulseError,
    PulseShape, PulseShapeParameters,
};
use crate::parameter::{ParamValue, PulseParams};
use crate::units::floor_mod;

/// How a conditional-phase calibration table is interpolated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CphaseInterpolation {
    Linear,
    /// Through the three calibration points nearest to the requested phase.
    #[default]
    Quadratic,
}

struct Table {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Table {
    fn new(name: &str, xs: &[f64], ys: Vec<f64>) -> Result<Self, PulseError> {
        if xs.len() != ys.len() {
            return Err(PulseError::Calibration(format!(
                "`{name}` has {} points but `cphase` has {}",
                ys.len(),
                xs.len()
            )));
        }
        let (xs, ys) = xs
            .iter()
            .copied()
            .zip(ys)
            .sorted_by(|a, b| a.0.total_cmp(&b.0))
            .unzip();
        Ok(Self { xs, ys })
    }

    fn interpolate(&self, x: f64, kind: CphaseInterpolation) -> Result<f64, PulseError> {
        let n = self.xs.len();
        let minimum_points = match kind {
            CphaseInterpolation::Linear => 2,
            CphaseInterpolation::Quadratic => 3,
        };
        if n < minimum_points {
            return Err(PulseError::Calibration(format!(
                "{kind:?} interpolation needs at least {minimum_points} points, found {n}"
            )));
        }
        if x < self.xs[0] || x > self.xs[n - 1] {
            return Err(PulseError::Calibration(format!(
                "{x} is outside the calibrated range [{}, {}]",
                self.xs[0],
                self.xs[n - 1]
            )));
        }
        let segment = self.xs[1..]
            .iter()
            .position(|&upper| x <= upper)
            .unwrap_or(n - 2);
        let window = match kind {
            CphaseInterpolation::Linear => segment..segment + 2,
            CphaseInterpolation::Quadratic => {
                let first = segment.min(n - 3);
                first..first + 3
            }
        };
        // Lagrange polynomial through the points of the window.
        Ok(window
            .clone()
            .map(|j| {
                let weight: f64 = window
                    .clone()
                    .filter(|&m| m != j)
                    .map(|m| (x - self.xs[m]) / (self.xs[j] - self.xs[m]))
                    .product();
                weight * self.ys[j]
            })
            .sum())
    }
}

fn numbers(name: &str, value: &ParamValue) -> Result<Vec<f64>, PulseError> {
    value
        .as_list()
        .and_then(|values| values.iter().map(ParamValue::as_f64).collect())
        .ok_or_else(|| PulseError::Calibration(format!("`{name}` should be a list of numbers")))
}

/// Find the control parameters which implement the conditional phase `cphase`.
///
/// `calibration` holds the measured `cphase` values together with the value of every control
/// parameter at those points; qubit-keyed parameters such as `basis_rotation` hold one list
/// per qubit. The table may cover more than 360 degrees, so every calibrated phase congruent
/// to `cphase` is a candidate; the one whose main control parameter (the first of
/// `ctrl_params`) lies closest to `target` wins, and all control parameters are interpolated
/// at that phase.
pub fn calc_cphase_params(
    cphase: f64,
    calibration: &IndexMap<String, ParamValue>,
    ctrl_params: &[String],
    target: f64,
    interpolation: CphaseInterpolation,
) -> Result<IndexMap<String, ParamValue>, PulseError> {
    let cphases = calibration
        .get("cphase")
        .ok_or_else(|| PulseError::Calibration("the table has no `cphase` entry".to_owned()))
        .and_then(|value| numbers("cphase", value))?;
    let main = ctrl_params
        .first()
        .ok_or_else(|| PulseError::Calibration("no control parameters given".to_owned()))?;
    let lookup = |name: &str| {
        calibration
            .get(name)
            .ok_or_else(|| PulseError::Calibration(format!("the table has no `{name}` entry")))
    };

    let minimum = cphases.iter().copied().fold(f64::INFINITY, f64::min);
    let maximum = cphases.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let main_table = Table::new(main, &cphases, numbers(main, lookup(main)?)?)?;
    let mut best: Option<(f64, f64)> = None;
    let mut candidate = minimum + floor_mod(cphase - minimum, 360.0);
    while candidate < maximum {
        let distance = (main_table.interpolate(candidate, interpolation)? - target).abs();
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((candidate, distance));
        }
        candidate += 360.0;
    }
    let (chosen, _) = best.ok_or_else(|| {
        PulseError::Calibration(format!(
            "no calibrated phase in [{minimum}, {maximum}) is congruent to {cphase}"
        ))
    })?;
    tracing::debug!(cphase, chosen, target, "resolved conditional phase calibration");

    let mut values = IndexMap::new();
    for name in ctrl_params {
        let value = match lookup(name)? {
            ParamValue::Map(per_qubit) => {
                let mut resolved = IndexMap::new();
                for (qubit, data) in per_qubit {
                    let table = Table::new(name, &cphases, numbers(name, data)?)?;
                    resolved.insert(
                        qubit.clone(),
                        ParamValue::Number(table.interpolate(chosen, interpolation)?),
                    );
                }
                ParamValue::Map(resolved)
            }
            data => {
                let table = Table::new(name, &cphases, numbers(name, data)?)?;
                ParamValue::Number(table.interpolate(chosen, interpolation)?)
            }
        };
        values.insert(name.clone(), value);
    }
    Ok(values)
}

/// The segments played on one of the two gate channels.
#[derive(Clone, Debug, PartialEq)]
struct ChannelSegments {
    channel: String,
    lengths: Vec<f64>,
    amplitudes: Vec<f64>,
}

/// A further pulse played alongside the gate, e.g. on a spectator qubit's flux line.
#[derive(Clone, Debug, PartialEq)]
struct AuxPulse {
    delay: f64,
    shape: PulseShape,
}

/// A net-zero flux pulse on one or two channels.
///
/// Each channel plays a main step of `pulse_length`, split in two halves of opposite sign,
/// with a transition step of `trans_amplitude` for `trans_length` and a secondary step of
/// `trans2_amplitude` for `trans2_length` on either side of the sign change:
///
/// ```text
///  amplitude   trans2  trans    -trans  -trans2   -amplitude
/// [buffer][ main/2 ][ t2 ][ t/2 ][ t/2 ][ t2 ][ main/2 ][buffer]
/// ```
///
/// An `amplitude_offset` shifts both halves and lengthens the one it shrinks in magnitude so
/// the pulse stays net-zero. Given a `cphase` and a calibration table, the control parameters
/// are looked up with [`calc_cphase_params`] when the pulse is constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NzTransitionControlledPulse {
    pub channel: Option<String>,
    pub channel2: Option<String>,
    pub amplitude: f64,
    pub amplitude2: f64,
    pub amplitude_offset: f64,
    pub amplitude_offset2: f64,
    pub aux_pulses_list: Vec<PulseParams>,
    pub extra_buffer_aux_pulse: f64,
    pub pulse_length: f64,
    pub trans_amplitude: f64,
    pub trans_amplitude2: f64,
    pub trans_length: f64,
    pub trans2_amplitude: f64,
    pub trans2_amplitude2: f64,
    pub trans2_length: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    /// Delay of `channel2` with respect to `channel`.
    pub channel_relative_delay: f64,
    pub gaussian_filter_sigma: f64,
    pub cphase: Option<f64>,
    pub cphase_calib_dict: Option<IndexMap<String, ParamValue>>,
    pub cphase_ctrl_params: Vec<String>,
    pub cphase_interpolation: CphaseInterpolation,
    /// Pad both buffers equally so the pulse has this total length.
    pub fixed_pulse_length: Option<f64>,
    #[serde(skip)]
    segments: Vec<ChannelSegments>,
    #[serde(skip)]
    aux_pulses: Vec<AuxPulse>,
}

impl Default for NzTransitionControlledPulse {
    fn default() -> Self {
        Self {
            channel: None,
            channel2: None,
            amplitude: 0.0,
            amplitude2: 0.0,
            amplitude_offset: 0.0,
            amplitude_offset2: 0.0,
            aux_pulses_list: Vec::new(),
            extra_buffer_aux_pulse: 5e-9,
            pulse_length: 0.0,
            trans_amplitude: 0.0,
            trans_amplitude2: 0.0,
            trans_length: 0.0,
            trans2_amplitude: 0.0,
            trans2_amplitude2: 0.0,
            trans2_length: 0.0,
            buffer_length_start: 30e-9,
            buffer_length_end: 30e-9,
            channel_relative_delay: 0.0,
            gaussian_filter_sigma: 1e-9,
            cphase: None,
            cphase_calib_dict: None,
            cphase_ctrl_params: vec!["trans_amplitude2".to_owned(), "basis_rotation".to_owned()],
            cphase_interpolation: CphaseInterpolation::default(),
            fixed_pulse_length: None,
            segments: Vec::new(),
            aux_pulses: Vec::new(),
        }
    }
}

impl NzTransitionControlledPulse {
    fn channel_segments(
        &self,
        channel: &str,
        main_amplitude: f64,
        trans_amplitude: f64,
        offset: f64,
        delay: f64,
        trans2_amplitude: f64,
    ) -> ChannelSegments {
        let main_length = self.pulse_length;
        let trans_length = self.trans_length;
        let trans2_length = self.trans2_length;
        let first = main_amplitude + offset;
        let second = -main_amplitude + offset;
        let stretch = |amplitude: f64| {
            if amplitude != 0.0 {
                f64::max(-(main_length * offset) / amplitude, 0.0)
            } else {
                0.0
            }
        };
        let (stretch_first, stretch_second) = (stretch(first), stretch(second));

        let mut lengths = vec![
            self.buffer_length_start + delay - stretch_first,
            stretch_first + main_length / 2.0,
            trans2_length,
            trans_length / 2.0,
            trans_length / 2.0,
            trans2_length,
            main_length / 2.0 + stretch_second,
            self.buffer_length_end - delay - stretch_second,
        ];
        if let Some(fixed) = self.fixed_pulse_length {
            let padding = (fixed - lengths.iter().sum::<f64>()) / 2.0;
            lengths[0] += padding;
            lengths[7] += padding;
        }
        ChannelSegments {
            channel: channel.to_owned(),
            lengths,
            amplitudes: vec![
                0.0,
                first,
                trans2_amplitude,
                trans_amplitude,
                -trans_amplitude,
                -trans2_amplitude,
                second,
                0.0,
            ],
        }
    }

    fn segments_of(&self, channel: &str) -> Option<&ChannelSegments> {
        self.segments.iter().find(|segments| segments.channel == channel)
    }

    fn build_aux_pulse(&self, aux: &PulseParams) -> Result<AuxPulse, PulseError> {
        let base = Self {
            aux_pulses_list: Vec::new(),
            segments: Vec::new(),
            aux_pulses: Vec::new(),
            ..self.clone()
        };
        let mut params: PulseParams = to_params(&base, Self::PULSE_TYPE)?;
        params.set("pulse_type", Self::PULSE_TYPE);
        params.update(aux);
        params.shift_remove("aux_pulses_list");
        let delay = params.f64_or("pulse_delay", 0.0)?;
        let shape = PulseShape::from_params(&mut params)?;
        Ok(AuxPulse { delay, shape })
    }
}

impl PulseShapeParameters for NzTransitionControlledPulse {
    const PULSE_TYPE: &'static str = "NZTransitionControlledPulse";

    fn preprocess(params: &mut PulseParams) -> Result<(), PulseError> {
        let cphase = match params.value("cphase") {
            None | Some(ParamValue::Parametric(_)) => return Ok(()),
            Some(_) => params.f64("cphase")?,
        };
        #[derive(Deserialize)]
        struct Calibration {
            cphase_calib_dict: Option<IndexMap<String, ParamValue>>,
            cphase_ctrl_params: Option<Vec<String>>,
            #[serde(default)]
            cphase_interpolation: CphaseInterpolation,
        }
        let calibration: Calibration = from_params(params, Self::PULSE_TYPE)?;
        let table = calibration.cphase_calib_dict.ok_or_else(|| {
            PulseError::Calibration("a conditional phase needs `cphase_calib_dict`".to_owned())
        })?;
        let ctrl_params = calibration
            .cphase_ctrl_params
            .unwrap_or_else(|| Self::default().cphase_ctrl_params);
        let target = match ctrl_params.first() {
            Some(main) => params.f64_or(main, 0.0)?,
            None => 0.0,
        };
        let values = calc_cphase_params(
            cphase,
            &table,
            &ctrl_params,
            target,
            calibration.cphase_interpolation,
        )?;
        for (name, value) in values {
            params.set(name, value);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PulseError> {
        let half_delay = self.channel_relative_delay / 2.0;
        let mut segments = Vec::new();
        if let Some(channel) = &self.channel {
            segments.push(self.channel_segments(
                channel,
                self.amplitude,
                self.trans_amplitude,
                self.amplitude_offset,
                -half_delay,
                self.trans2_amplitude,
            ));
        }
        if let Some(channel) = &self.channel2 {
            segments.push(self.channel_segments(
                channel,
                self.amplitude2,
                self.trans_amplitude2,
                self.amplitude_offset2,
                half_delay,
                self.trans2_amplitude2,
            ));
        }
        self.segments = segments;
        self.aux_pulses = self
            .aux_pulses_list
            .iter()
            .map(|aux| self.build_aux_pulse(aux))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn length(&self) -> f64 {
        self.segments
            .iter()
            .map(|segments| segments.lengths.iter().sum::<f64>())
            .fold(0.0, f64::max)
    }

    fn channels(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|segments| segments.channel.clone())
            .chain(self.aux_pulses.iter().flat_map(|aux| aux.shape.channels()))
            .unique()
            .collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let mut samples = match self.segments_of(channel) {
            Some(segments) => piecewise_constant(
                tvals,
                algorithm_time,
                segments
                    .lengths
                    .iter()
                    .copied()
                    .zip(segments.amplitudes.iter().copied()),
                self.gaussian_filter_sigma,
            ),
            None => Array1::zeros(tvals.len()),
        };
        for aux in &self.aux_pulses {
            if aux.shape.channels().iter().any(|c| c == channel) {
                samples += &aux
                    .shape
                    .waveform(channel, algorithm_time + aux.delay, tvals);
            }
        }
        samples
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, tstart: f64) -> Vec<Hashable> {
        let mut hashables = Vec::new();
        if let Some(segments) = self.segments_of(channel) {
            hashables.push(segments.lengths.len().into());
            hashables.extend(segments.lengths.iter().map(|&length| Hashable::from(length)));
            hashables.extend(segments.amplitudes.iter().map(|&amp| Hashable::from(amp)));
            hashables.push(self.gaussian_filter_sigma.into());
        }
        for aux in &self.aux_pulses {
            if aux.shape.channels().iter().any(|c| c == channel) {
                hashables.extend(hashables![
                    aux.shape.pulse_type(),
                    aux.delay,
                    aux.shape.length(),
                ]);
                hashables.extend(aux.shape.hashables(channel, algorithm_time + aux.delay, tstart));
            }
        }
        hashables
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use indexmap::IndexMap;
    use ndarray::Array1;
    use rstest::rstest;

    use super::{calc_cphase_params, CphaseInterpolation, NzTransitionControlledPulse};
    use crate::parameter::{ParamValue, PulseParams};
    use crate::pulse::{PulseError, PulseShape, PulseShapeParameters};

    fn table() -> IndexMap<String, ParamValue> {
        // A cphase which grows linearly with the transition amplitude over 720 degrees.
        let cphases: Vec<f64> = (0..=8).map(|k| 100.0 + 90.0 * k as f64).collect();
        let amplitudes: Vec<f64> = cphases.iter().map(|cp| cp / 1000.0).collect();
        let rotations: Vec<f64> = cphases.iter().map(|cp| -cp / 2.0).collect();
        serde_json::from_value(serde_json::json!({
            "cphase": cphases,
            "trans_amplitude2": amplitudes,
            "basis_rotation": {"qb1": rotations},
        }))
        .unwrap()
    }

    fn ctrl_params() -> Vec<String> {
        vec!["trans_amplitude2".to_owned(), "basis_rotation".to_owned()]
    }

    #[rstest]
    #[case(180.0, 0.0, 180.0)]
    #[case(180.0, 1.0, 540.0)]
    #[case(180.0, 0.4, 540.0)]
    #[case(-90.0, 0.0, 270.0)]
    #[case(630.0, 0.65, 630.0)]
    fn picks_the_congruent_phase_closest_to_the_target(
        #[case] cphase: f64,
        #[case] target: f64,
        #[case] chosen: f64,
    ) {
        let values = calc_cphase_params(
            cphase,
            &table(),
            &ctrl_params(),
            target,
            CphaseInterpolation::Quadratic,
        )
        .unwrap();
        let amplitude = values["trans_amplitude2"].as_f64().unwrap();
        assert_relative_eq!(amplitude, chosen / 1000.0, epsilon = 1e-9);
        let rotation = values["basis_rotation"].as_map().unwrap()["qb1"].as_f64().unwrap();
        assert_relative_eq!(rotation, -chosen / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_table_entries_are_reported() {
        let mut table = table();
        table.shift_remove("basis_rotation");
        assert!(matches!(
            calc_cphase_params(180.0, &table, &ctrl_params(), 0.0, CphaseInterpolation::Linear),
            Err(PulseError::Calibration(_))
        ));
    }

    fn pulse() -> NzTransitionControlledPulse {
        let mut pulse = NzTransitionControlledPulse {
            channel: Some("fl1".into()),
            channel2: Some("fl2".into()),
            amplitude: 0.3,
            amplitude2: 0.1,
            pulse_length: 40e-9,
            trans_amplitude: 0.05,
            trans_amplitude2: 0.02,
            trans_length: 6e-9,
            trans2_amplitude: 0.01,
            trans2_amplitude2: 0.03,
            trans2_length: 4e-9,
            buffer_length_start: 10e-9,
            buffer_length_end: 10e-9,
            channel_relative_delay: 2e-9,
            ..NzTransitionControlledPulse::default()
        };
        pulse.finish().unwrap();
        pulse
    }

    #[test]
    fn both_channels_integrate_to_zero() {
        let pulse = pulse();
        let dt = 0.1e-9;
        let tvals = Array1::range(0.0, (pulse.length() + 20e-9) / dt, 1.0) * dt + 50e-9;
        for channel in ["fl1", "fl2"] {
            let samples = pulse.waveform(channel, 50e-9, &tvals);
            assert_relative_eq!(samples.sum() * dt, 0.0, epsilon = 1e-13);
            assert!(samples.iter().any(|&v| v.abs() > 0.05));
        }
    }

    #[test]
    fn channel_delay_keeps_the_total_length() {
        let pulse = pulse();
        assert_relative_eq!(pulse.length(), 10e-9 + 40e-9 + 8e-9 + 6e-9 + 10e-9, epsilon = 1e-18);
        let mut fixed = NzTransitionControlledPulse {
            fixed_pulse_length: Some(100e-9),
            ..pulse.clone()
        };
        fixed.finish().unwrap();
        assert_relative_eq!(fixed.length(), 100e-9, epsilon = 1e-18);
    }

    #[test]
    fn offsets_stretch_the_smaller_half() {
        let mut pulse = NzTransitionControlledPulse {
            amplitude_offset: 0.05,
            ..pulse()
        };
        pulse.finish().unwrap();
        let dt = 0.1e-9;
        let tvals = Array1::range(0.0, (pulse.length() + 20e-9) / dt, 1.0) * dt;
        let samples = pulse.waveform("fl1", 0.0, &tvals);
        assert_relative_eq!(samples.sum() * dt, 0.0, epsilon = 1e-13);
    }

    #[test]
    fn cphase_is_looked_up_when_the_pulse_is_built() {
        let mut record: PulseParams = serde_json::from_value(serde_json::json!({
            "pulse_type": "NZTransitionControlledPulse",
            "channel": "fl1",
            "channel2": "fl2",
            "trans_amplitude2": 0.5,
            "cphase": 90.0,
            "cphase_calib_dict": serde_json::to_value(table()).unwrap(),
        }))
        .unwrap();
        let shape = PulseShape::from_params(&mut record).unwrap();
        assert_relative_eq!(record.f64("trans_amplitude2").unwrap(), 0.45, epsilon = 1e-9);
        assert!(matches!(
            record.get("basis_rotation"),
            Some(ParamValue::Map(rotations)) if rotations.contains_key("qb1")
        ));
        let PulseShape::NzTransitionControlled(pulse) = shape else {
            panic!("wrong shape");
        };
        assert_relative_eq!(pulse.trans_amplitude2, 0.45, epsilon = 1e-9);
    }

    #[test]
    fn aux_pulses_play_on_their_own_channels() {
        let mut record: PulseParams = serde_json::from_value(serde_json::json!({
            "pulse_type": "NZTransitionControlledPulse",
            "channel": "fl1",
            "pulse_length": 40e-9,
            "amplitude": 0.2,
            "aux_pulses_list": [
                {"pulse_type": "BufferedSquarePulse", "channel": "fl3", "amplitude": 0.05,
                 "pulse_length": 20e-9, "pulse_delay": 10e-9, "buffer_length_start": 0,
                 "buffer_length_end": 0, "gaussian_filter_sigma": 0},
            ],
        }))
        .unwrap();
        let shape = PulseShape::from_params(&mut record).unwrap();
        assert_eq!(shape.channels(), vec!["fl1", "fl3"]);
        let dt = 1e-9;
        let tvals = (Array1::range(0.0, 100.0, 1.0) + 0.5) * dt;
        let samples = shape.waveform("fl3", 0.0, &tvals);
        assert_relative_eq!(samples[9], 0.0);
        assert_relative_eq!(samples[10], 0.05);
        assert_relative_eq!(samples[29], 0.05);
        assert_relative_eq!(samples[30], 0.0);
        let hashables = shape.hashables("fl3", 0.0, 0.0);
        assert_eq!(hashables[0], "BufferedSquarePulse".into());
    }
}
