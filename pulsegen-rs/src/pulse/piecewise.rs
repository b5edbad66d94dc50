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

//! Piecewise-constant flux pulses with Gaussian-filtered edges.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;

use super::{hashables, Hashable, PulseError, PulseShapeParameters, ScalarOrList};

/// A step of height `amplitude` on `[start, end)`, convolved with a Gaussian of standard
/// deviation `sigma`. A non-positive `sigma` gives a hard step.
pub(crate) fn filtered_step(t: f64, start: f64, end: f64, amplitude: f64, sigma: f64) -> f64 {
    if sigma > 0.0 {
        let scale = 1.0 / (std::f64::consts::SQRT_2 * sigma);
        0.5 * amplitude * (erf((t - start) * scale) - erf((t - end) * scale))
    } else if t >= start && t < end {
        amplitude
    } else {
        0.0
    }
}

/// Consecutive filtered steps with the given `(length, amplitude)` segments, starting at
/// `start`.
pub(crate) fn piecewise_constant(
    tvals: &Array1<f64>,
    start: f64,
    segments: impl IntoIterator<Item = (f64, f64)> + Clone,
    sigma: f64,
) -> Array1<f64> {
    tvals.mapv(|t| {
        let mut t0 = start;
        let mut value = 0.0;
        for (length, amplitude) in segments.clone() {
            let t1 = t0 + length;
            value += filtered_step(t, t0, t1, amplitude, sigma);
            t0 = t1;
        }
        value
    })
}

/// Constant segments of individually chosen lengths and amplitudes, one list of each per
/// channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianFilteredPiecewiseConstPulse {
    pub channels: Vec<String>,
    pub lengths: Vec<Vec<f64>>,
    pub amplitudes: Vec<Vec<f64>>,
    pub gaussian_filter_sigma: ScalarOrList,
}

impl GaussianFilteredPiecewiseConstPulse {
    fn channel_index(&self, channel: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }

    fn sigma(&self, index: usize) -> f64 {
        match &self.gaussian_filter_sigma {
            ScalarOrList::Scalar(sigma) => *sigma,
            ScalarOrList::List(sigmas) => sigmas.get(index).copied().unwrap_or_default(),
        }
    }
}

impl PulseShapeParameters for GaussianFilteredPiecewiseConstPulse {
    const PULSE_TYPE: &'static str = "GaussianFilteredPiecewiseConstPulse";

    fn finish(&mut self) -> Result<(), PulseError> {
        let n = self.channels.len();
        if self.lengths.len() != n || self.amplitudes.len() != n {
            return Err(PulseError::shape(
                Self::PULSE_TYPE,
                format!(
                    "{n} channels need as many length and amplitude lists, found {} and {}",
                    self.lengths.len(),
                    self.amplitudes.len()
                ),
            ));
        }
        for ((channel, lengths), amplitudes) in
            self.channels.iter().zip(&self.lengths).zip(&self.amplitudes)
        {
            if lengths.len() != amplitudes.len() {
                return Err(PulseError::shape(
                    Self::PULSE_TYPE,
                    format!(
                        "channel {channel} has {} lengths but {} amplitudes",
                        lengths.len(),
                        amplitudes.len()
                    ),
                ));
            }
        }
        if let ScalarOrList::List(sigmas) = &self.gaussian_filter_sigma {
            if sigmas.len() != n {
                return Err(PulseError::shape(
                    Self::PULSE_TYPE,
                    format!("{n} channels need as many filter widths, found {}", sigmas.len()),
                ));
            }
        }
        Ok(())
    }

    fn length(&self) -> f64 {
        self.lengths
            .iter()
            .map(|lengths| lengths.iter().sum::<f64>())
            .fold(0.0, f64::max)
    }

    fn channels(&self) -> Vec<String> {
        self.channels.clone()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        match self.channel_index(channel) {
            Some(index) => piecewise_constant(
                tvals,
                algorithm_time,
                self.lengths[index]
                    .iter()
                    .copied()
                    .zip(self.amplitudes[index].iter().copied()),
                self.sigma(index),
            ),
            None => Array1::zeros(tvals.len()),
        }
    }

    fn hashables(&self, channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let Some(index) = self.channel_index(channel) else {
            return Vec::new();
        };
        let lengths = &self.lengths[index];
        let mut hashables = hashables![lengths.len()];
        hashables.extend(lengths.iter().map(|&length| Hashable::from(length)));
        hashables.extend(self.amplitudes[index].iter().map(|&amp| Hashable::from(amp)));
        hashables.push(self.sigma(index).into());
        hashables
    }
}
