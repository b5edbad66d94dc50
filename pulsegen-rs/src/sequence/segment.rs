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

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{s, Array1};
use petgraph::{algo::toposort, graph::DiGraph};
use serde::Deserialize;

use crate::parameter::{ParamValue, PulseParams};
use crate::pulse::{Pulse, WaveformCache, WaveformKey};

use super::block::{PREVIOUS_PULSE, SEGMENT_START};
use super::{SequenceError, TimingError};

const BLOCK_ALIGN_ITERATIONS: usize = 32;
const BLOCK_ALIGN_TOLERANCE: f64 = 1e-15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RefPoint {
    Start,
    Middle,
    #[default]
    End,
}

impl RefPoint {
    fn fraction(self) -> f64 {
        match self {
            RefPoint::Start => 0.0,
            RefPoint::Middle => 0.5,
            RefPoint::End => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RefFunction {
    #[default]
    Max,
    Min,
    Mean,
}

impl RefFunction {
    fn combine(self, times: &[f64]) -> f64 {
        match self {
            RefFunction::Max => times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            RefFunction::Min => times.iter().copied().fold(f64::INFINITY, f64::min),
            RefFunction::Mean => times.iter().sum::<f64>() / times.len() as f64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum RefPulseSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum BlockAlign {
    Fraction(f64),
    Named(RefPoint),
}

impl BlockAlign {
    fn fraction(self) -> f64 {
        match self {
            BlockAlign::Fraction(fraction) => fraction,
            BlockAlign::Named(point) => point.fraction(),
        }
    }
}

/// The relative-timing fields of a pulse-parameter record.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct TimingSpec {
    ref_pulse: Option<RefPulseSpec>,
    ref_point: Option<RefPoint>,
    ref_point_new: Option<RefPoint>,
    pulse_delay: Option<f64>,
    ref_function: Option<RefFunction>,
    block_align: Option<BlockAlign>,
}

impl TimingSpec {
    fn from_params(params: &PulseParams, pulse: &str) -> Result<Self, TimingError> {
        let invalid = |error: serde_json::Error| TimingError::InvalidField {
            pulse: pulse.to_owned(),
            message: error.to_string(),
        };
        let value = serde_json::to_value(params).map_err(invalid)?;
        serde_json::from_value(value).map_err(invalid)
    }
}

/// What a pulse's start time is computed from.
#[derive(Clone, Debug, PartialEq)]
enum Reference {
    SegmentStart,
    Pulses(Vec<usize>),
}

/// One repetition of an experiment: a flat list of pulses placed in time relative to each
/// other.
#[derive(Clone, Debug)]
pub struct Segment {
    pub name: String,
    pulses: Vec<Pulse>,
    timing: Vec<TimingSpec>,
    resolved: bool,
    attributes: IndexMap<String, ParamValue>,
}

impl Segment {
    /// Construct the pulses of a segment from fully resolved pulse-parameter records.
    pub fn new(name: impl Into<String>, records: Vec<PulseParams>) -> Result<Self, SequenceError> {
        let name = name.into();
        let mut pulses = Vec::with_capacity(records.len());
        let mut timing = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let mut pulse = Pulse::from_params(record).map_err(|source| SequenceError::Pulse {
                name: record
                    .name()
                    .map_or_else(|| index.to_string(), str::to_owned),
                source,
            })?;
            if pulse.name.is_empty() {
                pulse.name = index.to_string();
            }
            if pulses.iter().any(|other: &Pulse| other.name == pulse.name) {
                return Err(SequenceError::DuplicatePulse(pulse.name));
            }
            timing.push(TimingSpec::from_params(record, &pulse.name)?);
            pulses.push(pulse);
        }
        Ok(Self {
            name,
            pulses,
            timing,
            resolved: false,
            attributes: IndexMap::new(),
        })
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    fn references(&self) -> Result<Vec<Reference>, TimingError> {
        let by_name: HashMap<&str, usize> = self
            .pulses
            .iter()
            .enumerate()
            .map(|(index, pulse)| (pulse.name.as_str(), index))
            .collect();
        self.timing
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let names: Vec<&str> = match &spec.ref_pulse {
                    None => vec![PREVIOUS_PULSE],
                    Some(RefPulseSpec::One(name)) => vec![name.as_str()],
                    Some(RefPulseSpec::Many(names)) => names.iter().map(String::as_str).collect(),
                };
                let mut indices = Vec::with_capacity(names.len());
                for name in names {
                    match name {
                        SEGMENT_START => return Ok(Reference::SegmentStart),
                        PREVIOUS_PULSE if index == 0 => return Ok(Reference::SegmentStart),
                        PREVIOUS_PULSE => indices.push(index - 1),
                        name => match by_name.get(name) {
                            Some(referenced) => indices.push(*referenced),
                            None => {
                                return Err(TimingError::UnknownReference {
                                    pulse: self.pulses[index].name.clone(),
                                    reference: name.to_owned(),
                                })
                            }
                        },
                    }
                }
                if indices.is_empty() {
                    Ok(Reference::SegmentStart)
                } else {
                    Ok(Reference::Pulses(indices))
                }
            })
            .collect()
    }

    fn start_times(&self, order: &[usize], references: &[Reference], shifts: &[f64]) -> Vec<f64> {
        let mut times = vec![0.0; self.pulses.len()];
        for &index in order {
            let spec = &self.timing[index];
            let origin = match &references[index] {
                Reference::SegmentStart => 0.0,
                Reference::Pulses(referenced) => {
                    let point = spec.ref_point.unwrap_or_default().fraction();
                    let points: Vec<f64> = referenced
                        .iter()
                        .map(|&r| times[r] + point * self.pulses[r].length())
                        .collect();
                    spec.ref_function.unwrap_or_default().combine(&points)
                }
            };
            let point_new = spec.ref_point_new.unwrap_or(RefPoint::Start).fraction();
            times[index] = origin + spec.pulse_delay.unwrap_or(0.0) + shifts[index]
                - point_new * self.pulses[index].length();
        }
        times
    }

    /// Assign every pulse its absolute start time, order the pulses by it and apply virtual Z
    /// rotations. Resolving an already resolved segment does nothing.
    pub fn resolve_timing(&mut self) -> Result<(), TimingError> {
        if self.resolved {
            return Ok(());
        }
        let references = self.references()?;
        let mut graph = DiGraph::<usize, ()>::with_capacity(self.pulses.len(), 0);
        let nodes: Vec<_> = (0..self.pulses.len()).map(|i| graph.add_node(i)).collect();
        for (index, reference) in references.iter().enumerate() {
            if let Reference::Pulses(referenced) = reference {
                for &r in referenced {
                    graph.add_edge(nodes[r], nodes[index], ());
                }
            }
        }
        let order: Vec<usize> = toposort(&graph, None)
            .map_err(|cycle| TimingError::Cycle(self.pulses[graph[cycle.node_id()]].name.clone()))?
            .into_iter()
            .map(|node| graph[node])
            .collect();

        let aligned = self.aligned_blocks();
        let mut shifts = vec![0.0; self.pulses.len()];
        let mut times = self.start_times(&order, &references, &shifts);
        for _ in 0..BLOCK_ALIGN_ITERATIONS {
            let mut changed = false;
            for &(start, end, fraction) in &aligned {
                let duration = times[end] + self.pulses[end].length() - times[start];
                let shift = -fraction * duration;
                if (shift - shifts[start]).abs() > BLOCK_ALIGN_TOLERANCE {
                    shifts[start] = shift;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            times = self.start_times(&order, &references, &shifts);
        }

        for (pulse, time) in self.pulses.iter_mut().zip(&times) {
            pulse.set_algorithm_time(*time);
        }
        let mut indexed: Vec<(Pulse, TimingSpec)> =
            self.pulses.drain(..).zip(self.timing.drain(..)).collect();
        indexed.sort_by(|(a, _), (b, _)| a.algorithm_time().total_cmp(&b.algorithm_time()));
        (self.pulses, self.timing) = indexed.into_iter().unzip();
        self.apply_virtual_z();
        self.resolved = true;
        tracing::debug!(segment = %self.name, pulses = self.pulses.len(), "resolved timing");
        Ok(())
    }

    /// `(start marker, end marker, fraction)` of every block start marker carrying a
    /// `block_align`.
    fn aligned_blocks(&self) -> Vec<(usize, usize, f64)> {
        self.timing
            .iter()
            .enumerate()
            .filter_map(|(start, spec)| {
                let fraction = spec.block_align?.fraction();
                let end_name = self.pulses[start]
                    .name
                    .strip_suffix("start")
                    .map(|prefix| format!("{prefix}end"))?;
                let end = self.pulses.iter().position(|p| p.name == end_name)?;
                Some((start, end, fraction))
            })
            .collect()
    }

    fn apply_virtual_z(&mut self) {
        let mut rotations: HashMap<String, f64> = HashMap::new();
        for pulse in &mut self.pulses {
            let is_drive = !pulse.op_code.starts_with("RO ");
            if let Some(qubit) = pulse.target_qubit().map(str::to_owned) {
                if let (true, Some(rotation)) = (is_drive, rotations.get(&qubit)) {
                    if let Some(phase) = pulse.shape.phase_mut() {
                        *phase -= rotation;
                    }
                }
            }
            for (qubit, rotation) in &pulse.basis_rotation {
                *rotations.entry(qubit.clone()).or_insert(0.0) += rotation;
            }
        }
    }

    /// Pulses in the order of their start time, once timing is resolved.
    pub fn resolved_pulses(&self) -> Result<&[Pulse], TimingError> {
        if self.resolved {
            Ok(&self.pulses)
        } else {
            Err(TimingError::NotResolved(self.name.clone()))
        }
    }

    /// The time from the earliest pulse start to the latest pulse end.
    pub fn duration(&self) -> Result<f64, TimingError> {
        let pulses = self.resolved_pulses()?;
        let (start, end) = pulses.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(start, end), pulse| {
                (
                    start.min(pulse.algorithm_time()),
                    end.max(pulse.algorithm_time() + pulse.length()),
                )
            },
        );
        Ok(if pulses.is_empty() { 0.0 } else { end - start })
    }

    /// The end time of the pulse starting last.
    pub fn last_pulse_end(&self) -> Result<f64, TimingError> {
        Ok(self
            .resolved_pulses()?
            .last()
            .map_or(0.0, |pulse| pulse.algorithm_time() + pulse.length()))
    }

    /// Every channel some pulse plays on, in order of first appearance.
    pub fn channels(&self) -> Vec<String> {
        self.pulses
            .iter()
            .flat_map(Pulse::channels)
            .unique()
            .collect()
    }

    /// Set a segment-level attribute, as swept by `Segment.<attribute>` sweep parameters.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&ParamValue> {
        self.attributes.get(name)
    }

    /// Render one channel at `sample_rate`.
    ///
    /// Returns the time of the first sample and the samples, covering every pulse that plays
    /// on the channel on a grid aligned to multiples of the sample period. Each pulse is
    /// rendered over its own chunk of that grid, through `cache`.
    pub fn render(
        &self,
        channel: &str,
        sample_rate: f64,
        cache: &mut WaveformCache,
    ) -> Result<(f64, Array1<f64>), TimingError> {
        let playing: Vec<&Pulse> = self
            .resolved_pulses()?
            .iter()
            .filter(|pulse| pulse.plays_on(channel))
            .collect();
        let chunk = |pulse: &Pulse| -> (i64, i64) {
            let start = (pulse.algorithm_time() * sample_rate).floor() as i64;
            let end = ((pulse.algorithm_time() + pulse.length()) * sample_rate).ceil() as i64;
            (start, end.max(start))
        };
        let Some(first) = playing.iter().map(|pulse| chunk(pulse).0).min() else {
            return Ok((0.0, Array1::zeros(0)));
        };
        let last = playing.iter().map(|pulse| chunk(pulse).1).max().unwrap_or(first);

        let mut samples = Array1::<f64>::zeros((last - first) as usize);
        for pulse in playing {
            let (start, end) = chunk(pulse);
            let n_samples = (end - start) as usize;
            let tstart = start as f64 / sample_rate;
            let key = WaveformKey::new(pulse.hashables(tstart, channel), n_samples, sample_rate);
            let rendered = cache.get_or_render(key, || {
                let tvals = Array1::from_iter((start..end).map(|k| k as f64 / sample_rate));
                pulse.chan_wf(channel, &tvals)
            });
            let offset = (start - first) as usize;
            let mut target = samples.slice_mut(s![offset..offset + n_samples]);
            target += &rendered;
        }
        Ok((first as f64 / sample_rate, samples))
    }
}
