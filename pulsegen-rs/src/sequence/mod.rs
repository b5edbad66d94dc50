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

//! Blocks, segments and sequences: the timing layer between pulse-parameter records and
//! rendered waveforms.
//!
//! A [`Block`] is built into records with segment-wide names, a [`Segment`] turns records into
//! [`Pulse`](crate::pulse::Pulse)s placed in absolute time, and a [`Sequence`] collects the
//! segments of one sweep.

use indexmap::IndexMap;

use crate::operation::OperationDict;
use crate::parameter::ParameterError;
use crate::pulse::{PulseError, PulseShape};

pub use block::{Block, BuildOptions, BLOCK_SEPARATOR, PREVIOUS_PULSE, SEGMENT_START};
pub use segment::Segment;

mod block;
mod segment;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TimingError {
    #[error("pulse `{pulse}` references unknown pulse `{reference}`")]
    UnknownReference { pulse: String, reference: String },
    #[error("timing references form a cycle through pulse `{0}`")]
    Cycle(String),
    #[error("invalid timing field on pulse `{pulse}`: {message}")]
    InvalidField { pulse: String, message: String },
    #[error("timing of segment `{0}` has not been resolved")]
    NotResolved(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error(transparent)]
    Timing(#[from] TimingError),
    #[error("failed to construct pulse `{name}`")]
    Pulse {
        name: String,
        #[source]
        source: PulseError,
    },
    #[error("pulse name `{0}` is used more than once")]
    DuplicatePulse(String),
    #[error("segment name `{0}` is used more than once")]
    DuplicateSegment(String),
    #[error("operation `{0}` not found in the operation dictionary")]
    UnknownOperation(String),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// A request to the hardware to repeat a readout operation instead of storing each
/// occurrence as its own waveform.
#[derive(Clone, Debug, PartialEq)]
pub struct RepeatPattern {
    pub op_code: String,
    pub channels: Vec<String>,
    /// The number of occurrences of the readout in each segment, in segment order.
    pub repetitions: Vec<usize>,
}

/// An ordered collection of uniquely named segments.
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    pub name: String,
    segments: IndexMap<String, Segment>,
    repeat_patterns: Vec<RepeatPattern>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, segment: Segment) -> Result<(), SequenceError> {
        if self.segments.contains_key(&segment.name) {
            return Err(SequenceError::DuplicateSegment(segment.name));
        }
        self.segments.insert(segment.name.clone(), segment);
        Ok(())
    }

    pub fn extend(
        &mut self,
        segments: impl IntoIterator<Item = Segment>,
    ) -> Result<(), SequenceError> {
        segments.into_iter().try_for_each(|segment| self.add(segment))
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.get(name)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The number of acquisition elements: per segment, the distinct elements readout pulses
    /// play on.
    pub fn n_acq_elements(&self) -> usize {
        self.segments
            .values()
            .map(|segment| {
                let mut elements: Vec<&str> = segment
                    .pulses()
                    .iter()
                    .filter(|pulse| pulse.op_code.starts_with("RO "))
                    .map(|pulse| pulse.element_name.as_deref().unwrap_or(&pulse.name))
                    .collect();
                elements.sort_unstable();
                elements.dedup();
                elements.len()
            })
            .sum()
    }

    /// Record that the readout `op_code` should be played as a repetition on its channels.
    pub fn repeat_ro(
        &mut self,
        op_code: &str,
        operation_dict: &OperationDict,
    ) -> Result<(), SequenceError> {
        let mut record = operation_dict
            .copy_op(op_code)
            .ok_or_else(|| SequenceError::UnknownOperation(op_code.to_owned()))?;
        let channels = PulseShape::from_params(&mut record)
            .map_err(|source| SequenceError::Pulse {
                name: op_code.to_owned(),
                source,
            })?
            .channels();
        let repetitions = self
            .segments
            .values()
            .map(|segment| {
                segment
                    .pulses()
                    .iter()
                    .filter(|pulse| pulse.op_code == op_code)
                    .count()
            })
            .collect();
        tracing::debug!(sequence = %self.name, op_code, "repeating readout");
        self.repeat_patterns.retain(|pattern| pattern.op_code != op_code);
        self.repeat_patterns.push(RepeatPattern {
            op_code: op_code.to_owned(),
            channels,
            repetitions,
        });
        Ok(())
    }

    pub fn repeat_patterns(&self) -> &[RepeatPattern] {
        &self.repeat_patterns
    }
}
