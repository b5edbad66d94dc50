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

//! Buffered square flux pulses and the CZ and FLIP gates built from them.
//!
//! All of these are flanked by buffers before and after the active part of the pulse and
//! have their edges smoothed by a Gaussian filter of width `gaussian_filter_sigma`.

use std::f64::consts::PI;

use indexmap::IndexMap;
use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};

use super::{
    channel_list, hashables, piecewise::filtered_step, Hashable, PulseError,
    PulseShapeParameters,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferedSquarePulse {
    pub channel: Option<String>,
    pub channels: Vec<String>,
    pub amplitude: f64,
    pub pulse_length: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub gaussian_filter_sigma: f64,
}

impl Default for BufferedSquarePulse {
    fn default() -> Self {
        Self {
            channel: None,
            channels: Vec::new(),
            amplitude: 0.0,
            pulse_length: 0.0,
            buffer_length_start: 0.0,
            buffer_length_end: 0.0,
            gaussian_filter_sigma: 0.0,
        }
    }
}

impl PulseShapeParameters for BufferedSquarePulse {
    const PULSE_TYPE: &'static str = "BufferedSquarePulse";

    fn finish(&mut self) -> Result<(), PulseError> {
        if self.channel.is_none() && self.channels.is_empty() {
            return Err(PulseError::shape(
                Self::PULSE_TYPE,
                "either `channel` or `channels` must be given",
            ));
        }
        Ok(())
    }

    fn length(&self) -> f64 {
        self.pulse_length + self.buffer_length_start + self.buffer_length_end
    }

    fn channels(&self) -> Vec<String> {
        channel_list(&self.channel, &self.channels)
    }

    fn waveform(&self, _channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let start = algorithm_time + self.buffer_length_start;
        let end = start + self.pulse_length;
        tvals.mapv(|t| filtered_step(t, start, end, self.amplitude, self.gaussian_filter_sigma))
    }

    fn hashables(&self, _channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        hashables![
            self.amplitude,
            self.pulse_length,
            self.buffer_length_start,
            self.buffer_length_end,
            self.gaussian_filter_sigma,
        ]
    }
}

/// The amplitude and timing of a buffered pulse on one channel. Auxiliary channels play
/// stretched copies of the main pulse.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Geometry {
    amplitude: f64,
    buffer_start: f64,
    buffer_end: f64,
    pulse_length: f64,
}

fn aux_geometry(
    main: Geometry,
    aux_amplitude: f64,
    extra_buffer: f64,
) -> Geometry {
    Geometry {
        amplitude: aux_amplitude,
        buffer_start: main.buffer_start - extra_buffer,
        buffer_end: main.buffer_end - extra_buffer,
        pulse_length: main.pulse_length + 2.0 * extra_buffer,
    }
}

/// A square flux pulse on a cosine carrier, with stretched copies of the envelope on
/// auxiliary channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferedCzPulse {
    pub channel: Option<String>,
    /// Amplitudes of the auxiliary channels, keyed by channel.
    pub aux_channels_dict: Option<IndexMap<String, f64>>,
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
    pub pulse_length: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub extra_buffer_aux_pulse: f64,
    pub gaussian_filter_sigma: f64,
}

impl Default for BufferedCzPulse {
    fn default() -> Self {
        Self {
            channel: None,
            aux_channels_dict: None,
            amplitude: 0.0,
            frequency: 0.0,
            phase: 0.0,
            pulse_length: 0.0,
            buffer_length_start: 0.0,
            buffer_length_end: 0.0,
            extra_buffer_aux_pulse: 5e-9,
            gaussian_filter_sigma: 0.0,
        }
    }
}

impl BufferedCzPulse {
    fn geometry(&self, channel: &str) -> Geometry {
        let main = Geometry {
            amplitude: self.amplitude,
            buffer_start: self.buffer_length_start,
            buffer_end: self.buffer_length_end,
            pulse_length: self.pulse_length,
        };
        match self.aux_amplitude(channel) {
            Some(amplitude) => aux_geometry(main, amplitude, self.extra_buffer_aux_pulse),
            None => main,
        }
    }

    fn aux_amplitude(&self, channel: &str) -> Option<f64> {
        if self.channel.as_deref() == Some(channel) {
            return None;
        }
        self.aux_channels_dict
            .as_ref()
            .and_then(|aux| aux.get(channel).copied())
    }
}

impl PulseShapeParameters for BufferedCzPulse {
    const PULSE_TYPE: &'static str = "BufferedCZPulse";

    fn length(&self) -> f64 {
        self.pulse_length + self.buffer_length_start + self.buffer_length_end
    }

    fn channels(&self) -> Vec<String> {
        self.channel
            .iter()
            .cloned()
            .chain(self.aux_channels_dict.iter().flat_map(|aux| aux.keys().cloned()))
            .collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let geometry = self.geometry(channel);
        let start = algorithm_time + geometry.buffer_start;
        let end = start + geometry.pulse_length;
        tvals.mapv(|t| {
            let envelope = filtered_step(
                t,
                start,
                end,
                geometry.amplitude,
                self.gaussian_filter_sigma,
            );
            let carrier =
                (2.0 * PI * (self.frequency * (t - algorithm_time) + self.phase / 360.0)).cos();
            envelope * carrier
        })
    }

    fn hashables(&self, channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let geometry = self.geometry(channel);
        hashables![
            geometry.amplitude,
            geometry.pulse_length,
            geometry.buffer_start,
            geometry.buffer_end,
            self.gaussian_filter_sigma,
            self.frequency,
            self.phase % 360.0,
        ]
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.phase)
    }
}

/// A net-zero flux pulse: two steps of opposite sign whose lengths are in the ratio `alpha`
/// and whose amplitudes are in the ratio `-1 / alpha`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NzBufferedCzPulse {
    pub channel: Option<String>,
    /// Amplitudes of the auxiliary channels relative to `amplitude`, keyed by channel.
    pub aux_channels_dict: Option<IndexMap<String, f64>>,
    pub amplitude: f64,
    pub alpha: f64,
    pub pulse_length: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub extra_buffer_aux_pulse: f64,
    pub gaussian_filter_sigma: f64,
}

impl Default for NzBufferedCzPulse {
    fn default() -> Self {
        Self {
            channel: None,
            aux_channels_dict: None,
            amplitude: 0.0,
            alpha: 1.0,
            pulse_length: 0.0,
            buffer_length_start: 0.0,
            buffer_length_end: 0.0,
            extra_buffer_aux_pulse: 5e-9,
            gaussian_filter_sigma: 0.0,
        }
    }
}

impl NzBufferedCzPulse {
    fn geometry(&self, channel: &str) -> Geometry {
        let main = Geometry {
            amplitude: self.amplitude,
            buffer_start: self.buffer_length_start,
            buffer_end: self.buffer_length_end,
            pulse_length: self.pulse_length,
        };
        let aux = (self.channel.as_deref() != Some(channel))
            .then(|| self.aux_channels_dict.as_ref()?.get(channel).copied())
            .flatten();
        match aux {
            Some(scale) => aux_geometry(main, scale * self.amplitude, self.extra_buffer_aux_pulse),
            None => main,
        }
    }
}

impl PulseShapeParameters for NzBufferedCzPulse {
    const PULSE_TYPE: &'static str = "NZBufferedCZPulse";

    fn length(&self) -> f64 {
        self.pulse_length + self.buffer_length_start + self.buffer_length_end
    }

    fn channels(&self) -> Vec<String> {
        self.channel
            .iter()
            .cloned()
            .chain(self.aux_channels_dict.iter().flat_map(|aux| aux.keys().cloned()))
            .collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let geometry = self.geometry(channel);
        let first_length = self.alpha * geometry.pulse_length / (self.alpha + 1.0);
        let first = geometry.amplitude;
        let second = -geometry.amplitude * self.alpha;
        let start = algorithm_time + geometry.buffer_start;
        let middle = start + first_length;
        let end = start + geometry.pulse_length;
        let sigma = self.gaussian_filter_sigma;
        tvals.mapv(|t| filtered_step(t, start, middle, first, sigma) + filtered_step(t, middle, end, second, sigma))
    }

    fn hashables(&self, channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let geometry = self.geometry(channel);
        hashables![
            geometry.amplitude,
            geometry.pulse_length,
            geometry.buffer_start,
            geometry.buffer_end,
            self.gaussian_filter_sigma,
            self.alpha,
        ]
    }
}

/// The per-channel timing of a two-channel FLIP gate.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FlipTiming {
    buffer_start: f64,
    buffer_end: f64,
    /// Extra length of this channel's steps, taken from the other channel's flux buffer.
    stretch: f64,
    /// Gap between the steps of this channel.
    gap: f64,
}

/// Buffers of the two channels of a FLIP gate, accounting for their relative delay.
///
/// `own_buffer` is the flux buffer of `channel`, `other_buffer` that of `channel2`; `first`
/// selects which of the two channels is being timed.
fn flip_buffers(
    first: bool,
    buffer_start: f64,
    buffer_end: f64,
    delay: f64,
    own_buffer: f64,
) -> (f64, f64) {
    match (first, delay < 0.0) {
        (true, true) => (buffer_start - delay + own_buffer, buffer_end + own_buffer),
        (false, true) => (buffer_start + own_buffer, buffer_end - delay + own_buffer),
        (true, false) => (buffer_start + own_buffer, buffer_end + delay + own_buffer),
        (false, false) => (buffer_start + delay + own_buffer, buffer_end + own_buffer),
    }
}

/// A net-zero flux pulse played on two qubits' flux lines, with flux buffers of configurable
/// length around the sign change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferedNzFlipPulse {
    pub channel: Option<String>,
    pub channel2: Option<String>,
    pub amplitude: f64,
    pub amplitude2: f64,
    pub alpha: f64,
    pub pulse_length: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub flux_buffer_length: f64,
    pub flux_buffer_length2: f64,
    /// Delay of `channel2` with respect to `channel`.
    pub channel_relative_delay: f64,
    pub gaussian_filter_sigma: f64,
}

impl Default for BufferedNzFlipPulse {
    fn default() -> Self {
        Self {
            channel: None,
            channel2: None,
            amplitude: 0.0,
            amplitude2: 0.0,
            alpha: 1.0,
            pulse_length: 0.0,
            buffer_length_start: 30e-9,
            buffer_length_end: 30e-9,
            flux_buffer_length: 0.0,
            flux_buffer_length2: 0.0,
            channel_relative_delay: 0.0,
            gaussian_filter_sigma: 1e-9,
        }
    }
}

impl BufferedNzFlipPulse {
    fn is_first(&self, channel: &str) -> bool {
        self.channel.as_deref() == Some(channel)
    }

    fn timing(&self, first: bool) -> FlipTiming {
        // Each channel waits out the other channel's flux buffer during its own.
        let (own, other) = if first {
            (self.flux_buffer_length2, self.flux_buffer_length)
        } else {
            (self.flux_buffer_length, self.flux_buffer_length2)
        };
        let (buffer_start, buffer_end) = flip_buffers(
            first,
            self.buffer_length_start,
            self.buffer_length_end,
            self.channel_relative_delay,
            own,
        );
        FlipTiming {
            buffer_start,
            buffer_end,
            stretch: 2.0 * other,
            gap: 2.0 * own,
        }
    }

    fn step_lengths(&self, timing: &FlipTiming) -> (f64, f64) {
        let alpha = self.alpha;
        (
            alpha * self.pulse_length / (alpha + 1.0) + timing.stretch,
            self.pulse_length / (alpha + 1.0) + timing.stretch,
        )
    }
}

impl PulseShapeParameters for BufferedNzFlipPulse {
    const PULSE_TYPE: &'static str = "BufferedNZFLIPPulse";

    fn finish(&mut self) -> Result<(), PulseError> {
        if self.channel.is_none() || self.channel2.is_none() {
            return Err(PulseError::shape(
                Self::PULSE_TYPE,
                "both `channel` and `channel2` must be given",
            ));
        }
        Ok(())
    }

    fn length(&self) -> f64 {
        let timing = self.timing(true);
        let (first, second) = self.step_lengths(&timing);
        first + second + timing.buffer_start + timing.buffer_end + timing.gap
    }

    fn channels(&self) -> Vec<String> {
        self.channel.iter().chain(self.channel2.iter()).cloned().collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let first_channel = self.is_first(channel);
        let timing = self.timing(first_channel);
        let (first_length, second_length) = self.step_lengths(&timing);
        let amplitude = if first_channel {
            self.amplitude
        } else {
            self.amplitude2
        };
        let second_amplitude = -amplitude * self.alpha;
        let start = algorithm_time + timing.buffer_start;
        let second_start = start + first_length + timing.gap;
        let sigma = self.gaussian_filter_sigma;
        let first = tvals.mapv(|t| filtered_step(t, start, start + first_length, amplitude, sigma));
        let second = tvals.mapv(|t| {
            filtered_step(t, second_start, second_start + second_length, second_amplitude, sigma)
        });
        Zip::from(&first).and(&second).map_collect(|a, b| a + b)
    }

    fn hashables(&self, channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let first_channel = self.is_first(channel);
        let timing = self.timing(first_channel);
        let amplitude = if first_channel {
            self.amplitude
        } else {
            self.amplitude2
        };
        hashables![
            amplitude,
            self.pulse_length,
            timing.buffer_start,
            timing.buffer_end,
            self.gaussian_filter_sigma,
            self.alpha,
            timing.stretch,
            timing.gap,
        ]
    }
}

/// A single square flux pulse on each of two channels, lengthened by the channel's flux
/// buffer on both sides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferedFlipPulse {
    pub channel: Option<String>,
    pub channel2: Option<String>,
    pub amplitude: f64,
    pub amplitude2: f64,
    pub pulse_length: f64,
    pub buffer_length_start: f64,
    pub buffer_length_end: f64,
    pub flux_buffer_length: f64,
    pub flux_buffer_length2: f64,
    pub channel_relative_delay: f64,
    pub gaussian_filter_sigma: f64,
}

impl Default for BufferedFlipPulse {
    fn default() -> Self {
        Self {
            channel: None,
            channel2: None,
            amplitude: 0.0,
            amplitude2: 0.0,
            pulse_length: 0.0,
            buffer_length_start: 30e-9,
            buffer_length_end: 30e-9,
            flux_buffer_length: 0.0,
            flux_buffer_length2: 0.0,
            channel_relative_delay: 0.0,
            gaussian_filter_sigma: 1e-9,
        }
    }
}

impl BufferedFlipPulse {
    /// Buffer before, buffer after and length of the step of one channel.
    fn timing(&self, first: bool) -> (f64, f64, f64) {
        let (own, step) = if first {
            (self.flux_buffer_length2, self.pulse_length + 2.0 * self.flux_buffer_length)
        } else {
            (self.flux_buffer_length, self.pulse_length + 2.0 * self.flux_buffer_length2)
        };
        let (buffer_start, buffer_end) = flip_buffers(
            first,
            self.buffer_length_start,
            self.buffer_length_end,
            self.channel_relative_delay,
            own,
        );
        (buffer_start, buffer_end, step)
    }
}

impl PulseShapeParameters for BufferedFlipPulse {
    const PULSE_TYPE: &'static str = "BufferedFLIPPulse";

    fn finish(&mut self) -> Result<(), PulseError> {
        if self.channel.is_none() || self.channel2.is_none() {
            return Err(PulseError::shape(
                Self::PULSE_TYPE,
                "both `channel` and `channel2` must be given",
            ));
        }
        Ok(())
    }

    fn length(&self) -> f64 {
        let (buffer_start, buffer_end, step) = self.timing(true);
        step + buffer_start + buffer_end + 2.0 * self.flux_buffer_length2
    }

    fn channels(&self) -> Vec<String> {
        self.channel.iter().chain(self.channel2.iter()).cloned().collect()
    }

    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        let first = self.channel.as_deref() == Some(channel);
        let (buffer_start, _, step) = self.timing(first);
        let amplitude = if first { self.amplitude } else { self.amplitude2 };
        let start = algorithm_time + buffer_start;
        tvals.mapv(|t| filtered_step(t, start, start + step, amplitude, self.gaussian_filter_sigma))
    }

    fn hashables(&self, channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        let first = self.channel.as_deref() == Some(channel);
        let (buffer_start, buffer_end, step) = self.timing(first);
        let amplitude = if first { self.amplitude } else { self.amplitude2 };
        hashables![
            amplitude,
            self.pulse_length,
            buffer_start,
            buffer_end,
            self.gaussian_filter_sigma,
            step,
        ]
    }
}
