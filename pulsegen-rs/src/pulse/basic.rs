use std::f64::consts::PI;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::{channel_list, hashables, Hashable, PulseError, PulseShapeParameters};
use crate::units::floor_mod;

/// A placeholder that plays nothing, used as a timing reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualPulse {
    pub pulse_length: f64,
}

impl PulseShapeParameters for VirtualPulse {
    const PULSE_TYPE: &'static str = "VirtualPulse";

    fn length(&self) -> f64 {
        self.pulse_length
    }

    fn channels(&self) -> Vec<String> {
        Vec::new()
    }

    fn waveform(&self, _channel: &str, _algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        Array1::zeros(tvals.len())
    }

    fn hashables(&self, _channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        Vec::new()
    }
}

/// A constant `amplitude` for `length`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquarePulse {
    pub channel: Option<String>,
    pub channels: Vec<String>,
    pub amplitude: f64,
    pub length: f64,
}

impl PulseShapeParameters for SquarePulse {
    const PULSE_TYPE: &'static str = "SquarePulse";

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
        self.length
    }

    fn channels(&self) -> Vec<String> {
        channel_list(&self.channel, &self.channels)
    }

    fn waveform(&self, _channel: &str, _algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        Array1::from_elem(tvals.len(), self.amplitude)
    }

    fn hashables(&self, _channel: &str, _algorithm_time: f64, _tstart: f64) -> Vec<Hashable> {
        hashables![self.amplitude, self.length]
    }
}

/// A cosine whose phase is referenced to the global time origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosPulse {
    pub channel: Option<String>,
    pub amplitude: f64,
    pub length: f64,
    pub frequency: f64,
    pub phase: f64,
}

impl Default for CosPulse {
    fn default() -> Self {
        Self {
            channel: None,
            amplitude: 0.0,
            length: 0.0,
            frequency: 1e6,
            phase: 0.0,
        }
    }
}

impl PulseShapeParameters for CosPulse {
    const PULSE_TYPE: &'static str = "CosPulse";

    fn length(&self) -> f64 {
        self.length
    }

    fn channels(&self) -> Vec<String> {
        self.channel.iter().cloned().collect()
    }

    fn waveform(&self, _channel: &str, _algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64> {
        tvals.mapv(|t| {
            self.amplitude * (2.0 * PI * (self.frequency * t + self.phase / 360.0)).cos()
        })
    }

    fn hashables(&self, _channel: &str, _algorithm_time: f64, tstart: f64) -> Vec<Hashable> {
        hashables![
            self.amplitude,
            self.length,
            self.frequency,
            floor_mod(self.phase + self.frequency * tstart * 360.0, 360.0),
        ]
    }

    fn phase_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.phase)
    }
}
