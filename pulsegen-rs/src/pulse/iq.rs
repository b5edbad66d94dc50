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

//! Square IQ drive pulses with Gaussian-filtered edges.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::{
    apply_modulation, deserialize_flag, hashables, piecewise::filtered_step,
    BufferedSquarePulse, Hashable, Modulation, PulseError, PulseShapeParameters, ScalarOrList,
};

/// A square pulse with smoothed edges, modulated onto an I/Q channel pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussFilteredCosIqPulse {
    #[serde(rename = "I_channel")]
    pub i_channel: Option<String>,
    #[serde(rename = "Q_channel")]
    pub q_channel: Option<String>,
    pub amplitude: f64,
    pub pulse_length: f64,
    pub mod_frequency: f64,
    pub phase: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub alpha: f64,
    pub phi_skew: f64,
    pub gaussian_filter_sigma: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    pub phase_lock: bool,
}

impl Default for GaussFilteredCosIqPulse {
    fn default() -> Self {
        Self {
            i_channel: None,
            q_channel: None,
            amplitude: 0.0,
            pulse_length: 0.0,
            mod_frequency: 0.0,
            phase: 0.0,
            buffer_length_start: 10e-9,
            buffer_length_end: 10e-9,
            alpha: 1.0,
            phi_skew: 0.0,
            gaussian_filter_sigma: 0.0,
            phase_lock: false,
        }
    }
}

impl GaussFilteredCosIqPulse {
    fn envelope(&self, amplitude: f64, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let start = algorithm_time + self.buffer_length_start;
        let end = start + self.pulse_length;
        tvals.mapv(|t| filtered_step(t, start, end, amplitude, self.gaussian_filter_sigma))
    }

    fn phase_reference(&self, algorithm_time: f64) -> f64 {
        if self.phase_lock {
            0.0
        } else {
            algorithm_time
        }
    }

    fn locked_phase(&self, phase: f64, frequency: f64, algorithm_time: f64) -> f64 {
        let lock = if self.phase_lock { 1.0 } else { 0.0 };
        phase + 360.0 * lock * frequency * algorithm_time
    }

    fn select(&self, channel: &str, i: Array1<f64>, q: Array1<f64>) -> Array1<f64> {
        if self.i_channel.as_deref() == Some(channel) {
            i
        } else {
            q
        }
    }

    fn geometry_hashables(&self) -> Vec<Hashable> {
        hashables![
            self.gaussian_filter_sigma,
            self.buffer_length_start,
            self.buffer_length_end,
            self.pulse_length,
        ]
    }
}

impl PulseShapeParameters for GaussFilteredCosIqPulse {
    const PULSE_TYPE: &'static str = "GaussFilteredCosIQPulse";

    fn length(&self) -> f64 {
        self.pulse_length + self.buffer_length_start + self.buffer_length_end
    }

    fn channels(&self) -> Vec<String> {
        self.i_channel
            .iter()
            .chain(self.q_channel.iter())
            .cloned()
            .collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let envelope = self.envelope(self.amplitude, algorithm_time, tvals);
        let (i, q) = apply_modulation(
            &envelope,
            &Array1::zeros(tvals.len()),
            tvals,
            &Modulation {
                frequency: self.mod_frequency,
                phase: self.phase,
                phi_skew: self.phi_skew,
                alpha: self.alpha,
                phase_reference: self.phase_reference(algorithm_time),
            },
        );
        self.select(channel, i, q)
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let mut hashables = hashables![
            self.i_channel.as_deref() == Some(channel),
            self.amplitude,
            self.mod_frequency,
        ];
        hashables.extend(self.geometry_hashables());
        hashables.extend(hashables![
            self.alpha,
            self.phi_skew,
            self.locked_phase(self.phase, self.mod_frequency, algorithm_time),
        ]);
        hashables
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.phase)
    }
}

/// A [`GaussFilteredCosIqPulse`] accompanied by a square flux pulse which starts
/// `flux_extend_start` before the drive and ends `flux_extend_end` after it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussFilteredCosIqPulseWithFlux {
    #[serde(flatten)]
    pub drive: GaussFilteredCosIqPulse,
    pub flux_channel: Option<String>,
    pub flux_amplitude: f64,
    pub flux_extend_start: f64,
    pub flux_extend_end: f64,
    pub flux_gaussian_filter_sigma: f64,
}

impl Default for GaussFilteredCosIqPulseWithFlux {
    fn default() -> Self {
        Self {
            drive: GaussFilteredCosIqPulse::default(),
            flux_channel: None,
            flux_amplitude: 0.0,
            flux_extend_start: 20e-9,
            flux_extend_end: 150e-9,
            flux_gaussian_filter_sigma: 0.5e-9,
        }
    }
}

impl GaussFilteredCosIqPulseWithFlux {
    fn flux_pulse(&self) -> BufferedSquarePulse {
        let pulse_length =
            self.drive.pulse_length + self.flux_extend_start + self.flux_extend_end;
        let buffer_length_start = self.drive.buffer_length_start - self.flux_extend_start;
        BufferedSquarePulse {
            channel: self.flux_channel.clone(),
            channels: Vec::new(),
            amplitude: self.flux_amplitude,
            pulse_length,
            buffer_length_start,
            buffer_length_end: self.drive.length() - buffer_length_start - pulse_length,
            gaussian_filter_sigma: self.flux_gaussian_filter_sigma,
        }
    }

    fn is_flux(&self, channel: &str) -> bool {
        self.flux_channel.as_deref() == Some(channel)
    }
}

impl PulseShapeParameters for GaussFilteredCosIqPulseWithFlux {
    const PULSE_TYPE: &'static str = "GaussFilteredCosIQPulseWithFlux";

    fn length(&self) -> f64 {
        self.drive.length()
    }

    fn channels(&self) -> Vec<String> {
        let mut channels = self.drive.channels();
        channels.extend(self.flux_channel.iter().cloned());
        channels
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        if self.is_flux(channel) {
            self.flux_pulse().waveform(channel, algorithm_time, tvals)
        } else {
            self.drive.waveform(channel, algorithm_time, tvals)
        }
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, tstart: f64) -> Vec<Hashable> {
        if self.is_flux(channel) {
            self.flux_pulse().hashables(channel, algorithm_time, tstart)
        } else {
            self.drive.hashables(channel, algorithm_time, tstart)
        }
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.drive.phase)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Tone {
    amplitude: f64,
    frequency: f64,
    phase: f64,
    phi_skew: f64,
    alpha: f64,
}

/// Several independently modulated tones sharing one filtered square envelope.
///
/// `mod_frequency` lists the tones; `amplitude`, `phase`, `phi_skew` and `alpha` are either a
/// single value shared by all tones or one value per tone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussFilteredCosIqPulseMultiChromatic {
    #[serde(rename = "I_channel")]
    pub i_channel: Option<String>,
    #[serde(rename = "Q_channel")]
    pub q_channel: Option<String>,
    pub amplitude: ScalarOrList,
    pub pulse_length: f64,
    pub mod_frequency: ScalarOrList,
    pub phase: ScalarOrList,
    pub phi_skew: ScalarOrList,
    pub alpha: ScalarOrList,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub gaussian_filter_sigma: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    pub phase_lock: bool,
    #[serde(skip)]
    tones: Vec<Tone>,
}

impl Default for GaussFilteredCosIqPulseMultiChromatic {
    fn default() -> Self {
        Self {
            i_channel: None,
            q_channel: None,
            amplitude: ScalarOrList::Scalar(0.0),
            pulse_length: 0.0,
            mod_frequency: ScalarOrList::List(vec![0.0]),
            phase: ScalarOrList::Scalar(0.0),
            phi_skew: ScalarOrList::Scalar(0.0),
            alpha: ScalarOrList::Scalar(1.0),
            buffer_length_start: 10e-9,
            buffer_length_end: 10e-9,
            gaussian_filter_sigma: 0.0,
            phase_lock: false,
            tones: Vec::new(),
        }
    }
}

impl GaussFilteredCosIqPulseMultiChromatic {
    /// The pulse restricted to a single tone.
    fn tone_pulse(&self, tone: &Tone) -> GaussFilteredCosIqPulse {
        GaussFilteredCosIqPulse {
            i_channel: self.i_channel.clone(),
            q_channel: self.q_channel.clone(),
            amplitude: tone.amplitude,
            pulse_length: self.pulse_length,
            mod_frequency: tone.frequency,
            phase: tone.phase,
            buffer_length_start: self.buffer_length_start,
            buffer_length_end: self.buffer_length_end,
            alpha: tone.alpha,
            phi_skew: tone.phi_skew,
            gaussian_filter_sigma: self.gaussian_filter_sigma,
            phase_lock: self.phase_lock,
        }
    }
}

impl PulseShapeParameters for GaussFilteredCosIqPulseMultiChromatic {
    const PULSE_TYPE: &'static str = "GaussFilteredCosIQPulseMultiChromatic";

    fn finish(&mut self) -> Result<(), PulseError> {
        let ScalarOrList::List(frequencies) = &self.mod_frequency else {
            return Err(PulseError::shape(
                Self::PULSE_TYPE,
                "`mod_frequency` must be a list of frequencies",
            ));
        };
        let n = frequencies.len();
        let broadcast = |name: &str, value: &ScalarOrList| {
            value.broadcast(n).ok_or_else(|| {
                PulseError::shape(
                    Self::PULSE_TYPE,
                    format!("`{name}` must be a single value or a list of {n} values"),
                )
            })
        };
        let amplitudes = broadcast("amplitude", &self.amplitude)?;
        let phases = broadcast("phase", &self.phase)?;
        let skews = broadcast("phi_skew", &self.phi_skew)?;
        let alphas = broadcast("alpha", &self.alpha)?;
        self.tones = (0..n)
            .map(|k| Tone {
                amplitude: amplitudes[k],
                frequency: frequencies[k],
                phase: phases[k],
                phi_skew: skews[k],
                alpha: alphas[k],
            })
            .collect();
        Ok(())
    }

    fn length(&self) -> f64 {
        self.pulse_length + self.buffer_length_start + self.buffer_length_end
    }

    fn channels(&self) -> Vec<String> {
        self.i_channel
            .iter()
            .chain(self.q_channel.iter())
            .cloned()
            .collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        self.tones
            .iter()
            .fold(Array1::<f64>::zeros(tvals.len()), |sum, tone| {
                sum + self.tone_pulse(tone).waveform(channel, algorithm_time, tvals)
            })
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let single = self.tone_pulse(&Tone {
            amplitude: 0.0,
            frequency: 0.0,
            phase: 0.0,
            phi_skew: 0.0,
            alpha: 1.0,
        });
        let mut hashables = hashables![self.i_channel.as_deref() == Some(channel)];
        hashables.extend(self.tones.iter().map(|tone| Hashable::from(tone.amplitude)));
        hashables.extend(self.tones.iter().map(|tone| Hashable::from(tone.frequency)));
        hashables.extend(single.geometry_hashables());
        hashables.extend(self.tones.iter().map(|tone| Hashable::from(tone.alpha)));
        hashables.extend(self.tones.iter().map(|tone| Hashable::from(tone.phi_skew)));
        hashables.extend(self.tones.iter().map(|tone| {
            Hashable::from(single.locked_phase(tone.phase, tone.frequency, algorithm_time))
        }));
        hashables
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::Array1;

    use super::{
        GaussFilteredCosIqPulse, GaussFilteredCosIqPulseMultiChromatic,
        GaussFilteredCosIqPulseWithFlux,
    };
    use crate::pulse::{PulseError, PulseShapeParameters, ScalarOrList};

    fn drive() -> GaussFilteredCosIqPulse {
        GaussFilteredCosIqPulse {
            i_channel: Some("I".into()),
            q_channel: Some("Q".into()),
            amplitude: 0.2,
            pulse_length: 100e-9,
            mod_frequency: 50e6,
            ..GaussFilteredCosIqPulse::default()
        }
    }

    fn tvals() -> Array1<f64> {
        (Array1::range(0.0, 120.0, 1.0) + 0.5) * 1e-9
    }

    #[test]
    fn unlocked_phase_is_referenced_to_the_pulse() {
        let pulse = drive();
        let early = pulse.waveform("I", 0.0, &tvals());
        let late = pulse.waveform("I", 7e-9, &(tvals() + 7e-9));
        assert_relative_eq!(early, late, epsilon = 1e-9);
        assert_eq!(pulse.hashables("I", 0.0, 0.0), pulse.hashables("I", 7e-9, 7e-9));
    }

    #[test]
    fn locked_phase_is_part_of_the_key() {
        let pulse = GaussFilteredCosIqPulse {
            phase_lock: true,
            ..drive()
        };
        assert_ne!(pulse.hashables("I", 0.0, 0.0), pulse.hashables("I", 7e-9, 7e-9));
    }

    #[test]
    fn flux_pulse_brackets_the_drive() {
        let pulse = GaussFilteredCosIqPulseWithFlux {
            drive: GaussFilteredCosIqPulse {
                buffer_length_start: 30e-9,
                buffer_length_end: 30e-9,
                ..drive()
            },
            flux_channel: Some("fl".into()),
            flux_amplitude: 0.1,
            flux_extend_start: 20e-9,
            flux_extend_end: 20e-9,
            flux_gaussian_filter_sigma: 0.0,
        };
        assert_eq!(pulse.channels(), vec!["I", "Q", "fl"]);
        let tvals = (Array1::range(0.0, 160.0, 1.0) + 0.5) * 1e-9;
        let flux = pulse.waveform("fl", 0.0, &tvals);
        assert_relative_eq!(flux[9], 0.0);
        assert_relative_eq!(flux[10], 0.1);
        assert_relative_eq!(flux[149], 0.1);
        assert_relative_eq!(flux[150], 0.0);
    }

    #[test]
    fn tones_add_up() {
        let mut pulse = GaussFilteredCosIqPulseMultiChromatic {
            i_channel: Some("I".into()),
            q_channel: Some("Q".into()),
            amplitude: ScalarOrList::List(vec![0.1, 0.05]),
            pulse_length: 100e-9,
            mod_frequency: ScalarOrList::List(vec![50e6, -20e6]),
            ..GaussFilteredCosIqPulseMultiChromatic::default()
        };
        pulse.finish().unwrap();
        let first = GaussFilteredCosIqPulse {
            amplitude: 0.1,
            ..drive()
        };
        let second = GaussFilteredCosIqPulse {
            amplitude: 0.05,
            mod_frequency: -20e6,
            ..drive()
        };
        let expected = first.waveform("Q", 0.0, &tvals()) + second.waveform("Q", 0.0, &tvals());
        assert_relative_eq!(pulse.waveform("Q", 0.0, &tvals()), expected, epsilon = 1e-12);
        assert_eq!(pulse.hashables("Q", 0.0, 0.0).len(), 1 + 2 + 2 + 4 + 2 + 2 + 2);
    }

    #[test]
    fn tone_parameters_must_match_the_frequencies() {
        let mut pulse = GaussFilteredCosIqPulseMultiChromatic {
            amplitude: ScalarOrList::List(vec![0.1, 0.05, 0.2]),
            mod_frequency: ScalarOrList::List(vec![50e6, -20e6]),
            ..GaussFilteredCosIqPulseMultiChromatic::default()
        };
        assert!(matches!(pulse.finish(), Err(PulseError::Shape { .. })));
        let mut pulse = GaussFilteredCosIqPulseMultiChromatic {
            mod_frequency: ScalarOrList::Scalar(50e6),
            ..GaussFilteredCosIqPulseMultiChromatic::default()
        };
        assert!(matches!(pulse.finish(), Err(PulseError::Shape { .. })));
    }
}
