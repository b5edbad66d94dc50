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

//! The waveform rendering engine.
//!
//! Every pulse shape is a plain parameter struct implementing the sealed
//! [`PulseShapeParameters`] trait. [`PulseShape`] closes over the registered shapes and
//! dispatches on the `pulse_type` field of a pulse-parameter record, and [`Pulse`] adds the
//! bookkeeping shared by all shapes: the algorithm time assigned by timing resolution, the
//! `pulse_off` switch and virtual Z rotations.

use indexmap::IndexMap;
use ndarray::Array1;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::parameter::{ParameterError, PulseParams};

pub use basic::{CosPulse, SquarePulse, VirtualPulse};
pub use cache::{WaveformCache, WaveformKey};
pub use drag::{CancellationDrive, SsbDragCosPulse, SsbDragPulse, SsbDragWithCancellation};
pub use flux::{
    BufferedCzPulse, BufferedFlipPulse, BufferedNzFlipPulse, BufferedSquarePulse,
    NzBufferedCzPulse,
};
pub use hashable::Hashable;
pub(crate) use hashable::hashables;
pub use iq::{
    GaussFilteredCosIqPulse, GaussFilteredCosIqPulseMultiChromatic,
    GaussFilteredCosIqPulseWithFlux,
};
pub use modulation::{apply_modulation, Modulation};
pub use piecewise::GaussianFilteredPiecewiseConstPulse;
pub use transition::{calc_cphase_params, CphaseInterpolation, NzTransitionControlledPulse};

mod basic;
mod cache;
mod drag;
mod flux;
mod hashable;
mod iq;
mod modulation;
mod piecewise;
mod transition;

#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("pulse record has no `pulse_type`")]
    MissingPulseType,
    #[error("unknown pulse type `{0}`")]
    UnknownPulseType(String),
    #[error("invalid parameters for {pulse_type}: {source}")]
    InvalidParameters {
        pulse_type: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{pulse_type}: {message}")]
    Shape {
        pulse_type: &'static str,
        message: String,
    },
    #[error("conditional phase calibration: {0}")]
    Calibration(String),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

impl PulseError {
    pub(crate) fn shape(pulse_type: &'static str, message: impl Into<String>) -> Self {
        Self::Shape {
            pulse_type,
            message: message.into(),
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// The parameter schema and renderer of one pulse shape.
///
/// Implementors are deserialized from a pulse-parameter record; fields they don't name are
/// ignored and fields the record omits take the shape's defaults.
pub trait PulseShapeParameters:
    private::Sealed + Clone + Default + Serialize + DeserializeOwned
{
    /// The `pulse_type` discriminator this shape is registered under.
    const PULSE_TYPE: &'static str;

    /// Rewrite the raw record before it is deserialized.
    fn preprocess(_params: &mut PulseParams) -> Result<(), PulseError> {
        Ok(())
    }

    /// Validate and precompute derived values after deserialization.
    fn finish(&mut self) -> Result<(), PulseError> {
        Ok(())
    }

    /// The duration of the pulse in seconds.
    fn length(&self) -> f64;

    /// The output channels this pulse plays on.
    fn channels(&self) -> Vec<String>;

    /// Render the samples of `channel` at the absolute times `tvals`, for a pulse starting at
    /// `algorithm_time`. Only called for channels this pulse plays on.
    fn waveform(&self, channel: &str, algorithm_time: f64, tvals: &Array1<f64>) -> Array1<f64>;

    /// Every value besides the start time and length which `waveform` depends on for
    /// `channel`, for a rendering chunk starting at `tstart`.
    fn hashables(&self, channel: &str, algorithm_time: f64, tstart: f64) -> Vec<Hashable>;

    /// The phase of the carrier in degrees, for shapes that have one.
    fn phase_mut(&mut self) -> Option<&mut f64> {
        None
    }

    /// The parameter schema of this shape with its defaults.
    fn default_params() -> Result<PulseParams, PulseError> {
        let mut params: PulseParams = to_params(&Self::default(), Self::PULSE_TYPE)?;
        params.shift_insert(0, "pulse_type".to_owned(), Self::PULSE_TYPE.into());
        Ok(params)
    }
}

fn to_params<T: Serialize>(value: &T, pulse_type: &str) -> Result<PulseParams, PulseError> {
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(|source| PulseError::InvalidParameters {
            pulse_type: pulse_type.to_owned(),
            source,
        })
}

/// Deserialize a record into a shape's parameter struct.
pub(crate) fn from_params<T: DeserializeOwned>(
    params: &PulseParams,
    pulse_type: &str,
) -> Result<T, PulseError> {
    if let Some(parameter) = params.unresolved_parameters().into_iter().next() {
        let name = params
            .iter()
            .find(|(_, value)| value.unresolved_parameter() == Some(parameter.as_str()))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        return Err(ParameterError::Unresolved { name, parameter }.into());
    }
    serde_json::to_value(params)
        .and_then(serde_json::from_value)
        .map_err(|source| PulseError::InvalidParameters {
            pulse_type: pulse_type.to_owned(),
            source,
        })
}

fn build<S: PulseShapeParameters>(params: &mut PulseParams) -> Result<S, PulseError> {
    S::preprocess(params)?;
    let mut shape: S = from_params(params, S::PULSE_TYPE)?;
    shape.finish()?;
    Ok(shape)
}

/// Accepts booleans as well as the integers `0` and `1`.
pub(crate) fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}

/// A parameter given either once for all tones or channels, or as one value per entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrList {
    Scalar(f64),
    List(Vec<f64>),
}

impl Default for ScalarOrList {
    fn default() -> Self {
        Self::Scalar(0.0)
    }
}

impl ScalarOrList {
    /// Expand to `len` entries. A scalar is repeated; a list must have exactly `len` entries.
    pub fn broadcast(&self, len: usize) -> Option<Vec<f64>> {
        match self {
            Self::Scalar(value) => Some(vec![*value; len]),
            Self::List(values) if values.len() == len => Some(values.clone()),
            Self::List(_) => None,
        }
    }
}

/// A list of channel names, or the single `channel` when the list is empty.
pub(crate) fn channel_list(channel: &Option<String>, channels: &[String]) -> Vec<String> {
    if channels.is_empty() {
        channel.iter().cloned().collect()
    } else {
        channels.to_vec()
    }
}

macro_rules! pulse_shapes {
    ($($variant:ident($shape:ty)),* $(,)?) => {
        $(impl private::Sealed for $shape {})*

        /// The closed set of renderable pulse shapes.
        #[derive(Clone, Debug, PartialEq)]
        pub enum PulseShape {
            $($variant($shape)),*
        }

        impl PulseShape {
            /// The `pulse_type` of every registered shape.
            pub const PULSE_TYPES: &'static [&'static str] =
                &[$(<$shape as PulseShapeParameters>::PULSE_TYPE),*];

            /// Construct the shape named by the record's `pulse_type`. The record may be
            /// rewritten in the process, e.g. by a conditional-phase calibration lookup.
            pub fn from_params(params: &mut PulseParams) -> Result<Self, PulseError> {
                let pulse_type = params
                    .pulse_type()
                    .ok_or(PulseError::MissingPulseType)?
                    .to_owned();
                $(
                    if pulse_type == <$shape as PulseShapeParameters>::PULSE_TYPE {
                        return build::<$shape>(params).map(PulseShape::$variant);
                    }
                )*
                Err(PulseError::UnknownPulseType(pulse_type))
            }

            /// The parameter schema of a registered shape with its defaults.
            pub fn default_params(pulse_type: &str) -> Result<PulseParams, PulseError> {
                $(
                    if pulse_type == <$shape as PulseShapeParameters>::PULSE_TYPE {
                        return <$shape as PulseShapeParameters>::default_params();
                    }
                )*
                Err(PulseError::UnknownPulseType(pulse_type.to_owned()))
            }

            pub fn pulse_type(&self) -> &'static str {
                match self {
                    $(PulseShape::$variant(_) => <$shape as PulseShapeParameters>::PULSE_TYPE),*
                }
            }

            pub fn length(&self) -> f64 {
                match self {
                    $(PulseShape::$variant(shape) => shape.length()),*
                }
            }

            pub fn channels(&self) -> Vec<String> {
                match self {
                    $(PulseShape::$variant(shape) => shape.channels()),*
                }
            }

            pub fn waveform(
                &self,
                channel: &str,
                algorithm_time: f64,
                tvals: &Array1<f64>,
            ) -> Array1<f64> {
                match self {
                    $(PulseShape::$variant(shape) => shape.waveform(channel, algorithm_time, tvals)),*
                }
            }

            pub fn hashables(&self, channel: &str, algorithm_time: f64, tstart: f64) -> Vec<Hashable> {
                match self {
                    $(PulseShape::$variant(shape) => shape.hashables(channel, algorithm_time, tstart)),*
                }
            }

            pub fn phase_mut(&mut self) -> Option<&mut f64> {
                match self {
                    $(PulseShape::$variant(shape) => shape.phase_mut()),*
                }
            }
        }
    };
}

pulse_shapes!(
    SsbDrag(SsbDragPulse),
    SsbDragCos(SsbDragCosPulse),
    SsbDragWithCancellation(SsbDragWithCancellation),
    GaussianFilteredPiecewiseConst(GaussianFilteredPiecewiseConstPulse),
    NzTransitionControlled(NzTransitionControlledPulse),
    BufferedSquare(BufferedSquarePulse),
    BufferedCz(BufferedCzPulse),
    NzBufferedCz(NzBufferedCzPulse),
    BufferedNzFlip(BufferedNzFlipPulse),
    BufferedFlip(BufferedFlipPulse),
    GaussFilteredCosIq(GaussFilteredCosIqPulse),
    GaussFilteredCosIqWithFlux(GaussFilteredCosIqPulseWithFlux),
    GaussFilteredCosIqMultiChromatic(GaussFilteredCosIqPulseMultiChromatic),
    Virtual(VirtualPulse),
    Square(SquarePulse),
    Cos(CosPulse),
);

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct CommonParams {
    name: Option<String>,
    element_name: Option<String>,
    #[serde(deserialize_with = "deserialize_codeword")]
    codeword: Option<i64>,
    #[serde(deserialize_with = "deserialize_flag")]
    pulse_off: bool,
    op_code: Option<String>,
    #[serde(deserialize_with = "deserialize_basis_rotation")]
    basis_rotation: IndexMap<String, f64>,
}

fn deserialize_codeword<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Index(i64),
        Other(serde_json::Value),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Index(index) => Some(index),
        Raw::Other(_) => None,
    })
}

fn deserialize_basis_rotation<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<IndexMap<String, f64>, D::Error> {
    Ok(Option::<IndexMap<String, f64>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A pulse ready for rendering: a shape plus the bookkeeping every shape shares.
#[derive(Clone, Debug, PartialEq)]
pub struct Pulse {
    pub name: String,
    pub element_name: Option<String>,
    /// The feed-forward codeword this pulse is played on, if any.
    pub codeword: Option<i64>,
    pub pulse_off: bool,
    pub op_code: String,
    /// Virtual Z rotations in degrees, keyed by qubit name.
    pub basis_rotation: IndexMap<String, f64>,
    algorithm_time: f64,
    pub shape: PulseShape,
}

impl Pulse {
    /// Construct a pulse from a fully resolved pulse-parameter record.
    pub fn from_params(params: &PulseParams) -> Result<Self, PulseError> {
        let mut params = params.clone();
        let shape = PulseShape::from_params(&mut params)?;
        let common: CommonParams = from_params(&params, shape.pulse_type())?;
        Ok(Self {
            name: common.name.unwrap_or_default(),
            element_name: common.element_name,
            codeword: common.codeword,
            pulse_off: common.pulse_off,
            op_code: common.op_code.unwrap_or_default(),
            basis_rotation: common.basis_rotation,
            algorithm_time: 0.0,
            shape,
        })
    }

    pub fn pulse_type(&self) -> &'static str {
        self.shape.pulse_type()
    }

    pub fn length(&self) -> f64 {
        self.shape.length()
    }

    pub fn channels(&self) -> Vec<String> {
        self.shape.channels()
    }

    pub fn algorithm_time(&self) -> f64 {
        self.algorithm_time
    }

    pub fn set_algorithm_time(&mut self, algorithm_time: f64) {
        self.algorithm_time = algorithm_time;
    }

    /// Whether this pulse contributes anything to `channel`.
    pub fn plays_on(&self, channel: &str) -> bool {
        !self.pulse_off && self.shape.channels().iter().any(|c| c == channel)
    }

    /// The qubit a single-qubit operation acts on, judged by the last operand of its op code.
    pub fn target_qubit(&self) -> Option<&str> {
        let mut operands = self.op_code.split_whitespace().skip(1);
        match (operands.next(), operands.next()) {
            (Some(qubit), None) => Some(qubit),
            _ => None,
        }
    }

    /// Render `channel` at the absolute times `tvals`. Channels this pulse doesn't play on,
    /// and every channel of a pulse that is turned off, render as zeros.
    pub fn chan_wf(&self, channel: &str, tvals: &Array1<f64>) -> Array1<f64> {
        if !self.plays_on(channel) {
            return Array1::zeros(tvals.len());
        }
        self.shape.waveform(channel, self.algorithm_time, tvals)
    }

    /// The cache key of this pulse's samples on `channel`, for a rendering chunk starting at
    /// `tstart`. Empty when the pulse doesn't contribute to `channel`.
    pub fn hashables(&self, tstart: f64, channel: &str) -> Vec<Hashable> {
        if !self.plays_on(channel) {
            return Vec::new();
        }
        let mut hashables = hashables![
            self.pulse_type(),
            self.algorithm_time - tstart,
            self.length(),
        ];
        hashables.extend(self.shape.hashables(channel, self.algorithm_time, tstart));
        hashables
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Pulse, PulseError, PulseShape, ScalarOrList};
    use crate::parameter::{ParamValue, ParametricValue, PulseParams};

    fn params(json: &str) -> PulseParams {
        serde_json::from_str(json).unwrap()
    }

    #[rstest]
    #[case("SSB_DRAG_pulse")]
    #[case("SSB_DRAG_pulse_cos")]
    #[case("NZTransitionControlledPulse")]
    #[case("BufferedNZFLIPPulse")]
    #[case("GaussFilteredCosIQPulseMultiChromatic")]
    #[case("VirtualPulse")]
    fn every_registered_shape_builds_from_its_defaults(#[case] pulse_type: &str) {
        assert!(PulseShape::PULSE_TYPES.contains(&pulse_type));
        let mut defaults = PulseShape::default_params(pulse_type).unwrap();
        assert_eq!(defaults.pulse_type(), Some(pulse_type));
        defaults.set("channel", "AWG1_ch1").set("channel2", "AWG1_ch2");
        defaults.set("I_channel", "AWG2_ch1").set("Q_channel", "AWG2_ch2");
        let shape = PulseShape::from_params(&mut defaults).unwrap();
        assert_eq!(shape.pulse_type(), pulse_type);
    }

    #[test]
    fn cos_drag_pulses_build_from_operation_records() {
        let mut record = params(
            r#"{"pulse_type": "SSB_DRAG_pulse_cos", "I_channel": "ch1", "Q_channel": "ch2",
                "amplitude": 0.4, "sigma": 1e-8, "nr_sigma": 4, "motzoi": 0.1,
                "cancellation_frequency_offset": -2e8, "env_mod_frequency": 0}"#,
        );
        let shape = PulseShape::from_params(&mut record).unwrap();
        let PulseShape::SsbDragCos(pulse) = &shape else {
            panic!("expected a cos DRAG pulse, got {shape:?}");
        };
        assert_eq!(pulse.cancellation_frequency_offset, Some(-2e8));
        assert_eq!(shape.pulse_type(), "SSB_DRAG_pulse_cos");
    }

    #[test]
    fn unknown_pulse_types_are_rejected() {
        let mut record = params(r#"{"pulse_type": "MartianPulse"}"#);
        assert!(matches!(
            PulseShape::from_params(&mut record),
            Err(PulseError::UnknownPulseType(name)) if name == "MartianPulse"
        ));
        let mut record = params(r#"{"amplitude": 0.1}"#);
        assert!(matches!(
            PulseShape::from_params(&mut record),
            Err(PulseError::MissingPulseType)
        ));
    }

    #[test]
    fn unresolved_parametric_values_are_rejected() {
        let mut record = params(r#"{"pulse_type": "SSB_DRAG_pulse", "I_channel": "ch1"}"#);
        record.set(
            "amplitude",
            ParamValue::from(ParametricValue::new("amp")),
        );
        assert!(matches!(
            Pulse::from_params(&record),
            Err(PulseError::Parameter(_))
        ));
    }

    #[test]
    fn common_fields_are_read() {
        let record = params(
            r#"{"pulse_type": "VirtualPulse", "name": "start", "codeword": "no_codeword",
                "basis_rotation": {"qb1": 90}, "op_code": "Z90 qb1", "pulse_off": 0}"#,
        );
        let pulse = Pulse::from_params(&record).unwrap();
        assert_eq!(pulse.name, "start");
        assert_eq!(pulse.codeword, None);
        assert_eq!(pulse.basis_rotation.get("qb1"), Some(&90.0));
        assert_eq!(pulse.target_qubit(), Some("qb1"));
        assert!(!pulse.pulse_off);
    }

    #[test]
    fn pulses_turned_off_render_nothing() {
        let record = params(
            r#"{"pulse_type": "SquarePulse", "channel": "ch1", "amplitude": 0.3,
                "length": 1e-8, "pulse_off": true}"#,
        );
        let pulse = Pulse::from_params(&record).unwrap();
        let tvals = Array1::linspace(0.0, 1e-8, 11);
        assert_eq!(pulse.chan_wf("ch1", &tvals), Array1::<f64>::zeros(11));
        assert!(pulse.hashables(0.0, "ch1").is_empty());
    }

    #[test]
    fn unaddressed_channels_render_nothing() {
        let record = params(
            r#"{"pulse_type": "SquarePulse", "channel": "ch1", "amplitude": 0.3, "length": 1e-8}"#,
        );
        let pulse = Pulse::from_params(&record).unwrap();
        let tvals = Array1::linspace(0.0, 1e-8, 11);
        assert_eq!(pulse.chan_wf("ch2", &tvals), Array1::<f64>::zeros(11));
        assert!(pulse.hashables(0.0, "ch2").is_empty());
        assert_eq!(pulse.chan_wf("ch1", &tvals), Array1::from_elem(11, 0.3));
    }

    #[rstest]
    #[case(ScalarOrList::Scalar(0.5), 3, Some(vec![0.5, 0.5, 0.5]))]
    #[case(ScalarOrList::List(vec![0.1, 0.2]), 2, Some(vec![0.1, 0.2]))]
    #[case(ScalarOrList::List(vec![0.1, 0.2]), 3, None)]
    fn scalars_broadcast_and_lists_must_match(
        #[case] value: ScalarOrList,
        #[case] len: usize,
        #[case] expected: Option<Vec<f64>>,
    ) {
        assert_eq!(value.broadcast(len), expected);
    }
}
