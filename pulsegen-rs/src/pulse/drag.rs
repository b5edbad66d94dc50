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

//! Gaussian-derivative (DRAG) drive pulses.

use std::f64::consts::PI;

use ndarray::{Array1, Zip};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{
    apply_modulation, deserialize_flag, hashables, Hashable, Modulation, PulseError,
    PulseShapeParameters,
};

/// A single-sideband modulated pulse with a truncated Gaussian envelope on I and its scaled
/// derivative on Q.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsbDragPulse {
    #[serde(rename = "I_channel")]
    pub i_channel: Option<String>,
    #[serde(rename = "Q_channel")]
    pub q_channel: Option<String>,
    pub amplitude: f64,
    pub sigma: f64,
    pub nr_sigma: f64,
    pub motzoi: f64,
    /// Without a modulation frequency the envelope is played on both channels unmodulated.
    pub mod_frequency: Option<f64>,
    pub phase: f64,
    pub alpha: f64,
    pub phi_skew: f64,
    /// Reference the carrier phase to the global time origin instead of the pulse center.
    #[serde(deserialize_with = "deserialize_flag")]
    pub phaselock: bool,
}

impl Default for SsbDragPulse {
    fn default() -> Self {
        Self {
            i_channel: None,
            q_channel: None,
            amplitude: 0.1,
            sigma: 10e-9,
            nr_sigma: 5.0,
            motzoi: 0.0,
            mod_frequency: Some(1e6),
            phase: 0.0,
            alpha: 1.0,
            phi_skew: 0.0,
            phaselock: true,
        }
    }
}

impl SsbDragPulse {
    fn half_width(&self) -> f64 {
        self.nr_sigma * self.sigma / 2.0
    }

    fn center(&self, algorithm_time: f64) -> f64 {
        algorithm_time + self.half_width()
    }

    /// The Gaussian envelope, shifted down so it vanishes at the truncation points.
    fn envelope(&self, amplitude: f64, center: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let half = self.half_width();
        let sigma = self.sigma;
        let floor = (-0.5 * half * half / (sigma * sigma)).exp();
        tvals.mapv(|t| {
            let x = t - center;
            if (-half..half).contains(&x) {
                amplitude * ((-0.5 * x * x / (sigma * sigma)).exp() - floor)
            } else {
                0.0
            }
        })
    }

    fn derivative(&self, envelope: &Array1<f64>, center: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let motzoi = self.motzoi;
        let sigma = self.sigma;
        Zip::from(envelope)
            .and(tvals)
            .map_collect(|&env, &t| -motzoi * (t - center) * env / sigma)
    }

    fn modulate(
        &self,
        i_env: Array1<f64>,
        q_env: &Array1<f64>,
        tvals: &Array1<f64>,
        modulation: Option<Modulation>,
    ) -> (Array1<f64>, Array1<f64>) {
        match modulation {
            Some(modulation) => apply_modulation(&i_env, q_env, tvals, &modulation),
            None => (i_env.clone(), i_env),
        }
    }

    fn modulation(&self, center: f64) -> Option<Modulation> {
        self.mod_frequency.map(|frequency| Modulation {
            frequency,
            phase: self.phase,
            phi_skew: self.phi_skew,
            alpha: self.alpha,
            phase_reference: if self.phaselock { 0.0 } else { center },
        })
    }

    fn render(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let center = self.center(algorithm_time);
        let envelope = self.envelope(self.amplitude, center, tvals);
        let derivative = self.derivative(&envelope, center, tvals);
        let (i, q) = self.modulate(envelope, &derivative, tvals, self.modulation(center));
        self.select(channel, i, q)
    }

    fn select(&self, channel: &str, i: Array1<f64>, q: Array1<f64>) -> Array1<f64> {
        if self.i_channel.as_deref() == Some(channel) {
            i
        } else {
            q
        }
    }

    /// The carrier phase at the pulse center, which is what the samples depend on besides the
    /// pulse's position within its rendering chunk.
    fn effective_phase(&self, frequency: f64, center: f64) -> f64 {
        let lock = if self.phaselock { 1.0 } else { 0.0 };
        self.phase + 360.0 * lock * frequency * center
    }

    fn envelope_hashables(&self, channel: &str, algorithm_time: f64) -> Vec<Hashable> {
        let mut hashables = hashables![
            self.i_channel.as_deref() == Some(channel),
            self.amplitude,
            self.sigma,
            self.nr_sigma,
            self.motzoi,
            self.mod_frequency,
        ];
        if let Some(frequency) = self.mod_frequency {
            hashables.extend(hashables![
                self.alpha,
                self.phi_skew,
                self.effective_phase(frequency, self.center(algorithm_time)),
            ]);
        }
        hashables
    }
}

impl PulseShapeParameters for SsbDragPulse {
    const PULSE_TYPE: &'static str = "SSB_DRAG_pulse";

    fn length(&self) -> f64 {
        self.sigma * self.nr_sigma
    }

    fn channels(&self) -> Vec<String> {
        self.i_channel
            .iter()
            .chain(self.q_channel.iter())
            .cloned()
            .collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        self.render(channel, algorithm_time, tvals)
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        self.envelope_hashables(channel, algorithm_time)
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.phase)
    }
}

/// A DRAG pulse with a cosine-squared envelope whose quadrature is tuned to cancel leakage
/// at a given detuning from the carrier.
///
/// With a `cancellation_frequency_offset`, the envelope modulation frequency and the amplitude
/// are corrected such that the spectral peak stays at the requested envelope modulation
/// frequency and the power at zero detuning is unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsbDragCosPulse {
    #[serde(flatten)]
    pub drag: SsbDragPulse,
    pub cancellation_frequency_offset: Option<f64>,
    pub env_mod_frequency: f64,
}

impl Default for SsbDragCosPulse {
    fn default() -> Self {
        Self {
            drag: SsbDragPulse::default(),
            cancellation_frequency_offset: None,
            env_mod_frequency: 0.0,
        }
    }
}

impl SsbDragCosPulse {
    /// The envelope modulation frequency and amplitude after the cancellation correction.
    fn corrected(&self) -> (f64, f64) {
        let gate_time = self.drag.nr_sigma * self.drag.sigma;
        let mut env_mod_frequency = self.env_mod_frequency;
        let mut amplitude = self.drag.amplitude;
        if let Some(offset) = self.cancellation_frequency_offset {
            let k = PI * PI - 6.0;
            env_mod_frequency += 3.0 / (offset * gate_time * gate_time * k);
            let x = gate_time * env_mod_frequency;
            amplitude /= 1.0 - k * x * x / 6.0;
        }
        (env_mod_frequency, amplitude)
    }

    fn envelopes(&self, algorithm_time: f64, tvals: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let gate_time = self.drag.nr_sigma * self.drag.sigma;
        let half = gate_time / 2.0;
        let center = self.drag.center(algorithm_time);
        let (env_mod_frequency, amplitude) = self.corrected();

        let envelope: Array1<Complex64> = tvals.mapv(|t| {
            let x = t - center;
            if (-half..half).contains(&x) {
                let cos = (PI * x / gate_time).cos();
                Complex64::from_polar(1.0, -2.0 * PI * env_mod_frequency * x) * (amplitude * cos * cos)
            } else {
                Complex64::new(0.0, 0.0)
            }
        });

        let quadrature = match self.cancellation_frequency_offset {
            Some(offset) if tvals.len() > 1 => {
                let q = -1.0 / (2.0 * PI * offset * gate_time);
                let dt = tvals[1] - tvals[0];
                let n = envelope.len();
                Array1::from_shape_fn(n, |k| {
                    // Average of the backward and forward differences, zero-padded at the ends.
                    let previous = if k > 0 { envelope[k - 1] } else { Complex64::new(0.0, 0.0) };
                    let next = if k + 1 < n { envelope[k + 1] } else { Complex64::new(0.0, 0.0) };
                    let backward = envelope[k] - previous;
                    let forward = next - envelope[k];
                    (backward + forward) * (q * gate_time * 0.5 / dt)
                })
            }
            Some(_) => Array1::from_elem(envelope.len(), Complex64::new(0.0, 0.0)),
            None => {
                tracing::debug!("DRAG-cos pulse without a cancellation offset has no quadrature");
                Array1::from_elem(envelope.len(), Complex64::new(0.0, 0.0))
            }
        };

        let total = envelope + quadrature * Complex64::i();
        (total.mapv(|z| z.re), total.mapv(|z| z.im))
    }
}

impl PulseShapeParameters for SsbDragCosPulse {
    const PULSE_TYPE: &'static str = "SSB_DRAG_pulse_cos";

    fn finish(&mut self) -> Result<(), PulseError> {
        if self.cancellation_frequency_offset.is_none() {
            tracing::warn!(
                "no cancellation_frequency_offset given, the cos pulse has no DRAG component"
            );
        }
        Ok(())
    }

    fn length(&self) -> f64 {
        self.drag.length()
    }

    fn channels(&self) -> Vec<String> {
        self.drag.channels()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let (i_env, q_env) = self.envelopes(algorithm_time, tvals);
        let center = self.drag.center(algorithm_time);
        let (i, q) = self
            .drag
            .modulate(i_env, &q_env, tvals, self.drag.modulation(center));
        self.drag.select(channel, i, q)
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let mut hashables = self.drag.envelope_hashables(channel, algorithm_time);
        hashables.extend(hashables![
            self.cancellation_frequency_offset,
            self.env_mod_frequency,
        ]);
        hashables
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.drag.phase)
    }
}

/// Overrides for one copy of a DRAG pulse on a further pair of channels, e.g. to cancel
/// crosstalk of the main drive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CancellationDrive {
    #[serde(rename = "I_channel")]
    pub i_channel: String,
    #[serde(rename = "Q_channel")]
    pub q_channel: String,
    /// Relative to the main pulse.
    #[serde(default = "unit_scale")]
    pub amplitude: f64,
    /// Relative to the main pulse, in degrees.
    #[serde(default)]
    pub phase: f64,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub mod_frequency: Option<f64>,
    #[serde(default)]
    pub phi_skew: Option<f64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub phaselock: Option<bool>,
}

fn unit_scale() -> f64 {
    1.0
}

/// A DRAG pulse played together with scaled, phase-shifted and delayed copies of itself on
/// further I/Q channel pairs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsbDragWithCancellation {
    #[serde(flatten)]
    pub drag: SsbDragPulse,
    pub cancellation_params: Vec<CancellationDrive>,
}

impl SsbDragWithCancellation {
    fn cancellation_drive(&self, channel: &str) -> Option<&CancellationDrive> {
        self.cancellation_params
            .iter()
            .find(|drive| drive.i_channel == channel || drive.q_channel == channel)
    }

    /// The main pulse as seen by a cancellation drive, with its overrides applied.
    fn copy_for(&self, drive: &CancellationDrive) -> SsbDragPulse {
        SsbDragPulse {
            i_channel: Some(drive.i_channel.clone()),
            q_channel: Some(drive.q_channel.clone()),
            amplitude: self.drag.amplitude * drive.amplitude,
            mod_frequency: drive.mod_frequency.or(self.drag.mod_frequency),
            phase: self.drag.phase + drive.phase,
            alpha: drive.alpha.unwrap_or(self.drag.alpha),
            phi_skew: drive.phi_skew.unwrap_or(self.drag.phi_skew),
            phaselock: drive.phaselock.unwrap_or(self.drag.phaselock),
            ..self.drag.clone()
        }
    }
}

impl PulseShapeParameters for SsbDragWithCancellation {
    const PULSE_TYPE: &'static str = "SSB_DRAG_pulse_with_cancellation";

    fn length(&self) -> f64 {
        self.drag.length()
    }

    fn channels(&self) -> Vec<String> {
        let mut channels = self.drag.channels();
        for drive in &self.cancellation_params {
            channels.push(drive.i_channel.clone());
            channels.push(drive.q_channel.clone());
        }
        channels
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        match self.cancellation_drive(channel) {
            Some(drive) if !self.drag.channels().iter().any(|c| c == channel) => {
                self.copy_for(drive)
                    .render(channel, algorithm_time + drive.delay, tvals)
            }
            _ => self.drag.render(channel, algorithm_time, tvals),
        }
    }

    fn hashables(&self, channel: &str, algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        match self.cancellation_drive(channel) {
            Some(drive) if !self.drag.channels().iter().any(|c| c == channel) => {
                let mut hashables = self
                    .copy_for(drive)
                    .envelope_hashables(channel, algorithm_time + drive.delay);
                hashables.push(drive.delay.into());
                hashables
            }
            _ => self.drag.envelope_hashables(channel, algorithm_time),
        }
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.drag.phase)
    }
}
