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

use crate::parameter::{ParamValue, PulseModifs, PulseParams};
use crate::sweep::SweepPoints;

use super::SequenceError;

/// Separates a block's name from the names of its pulses once the block is built.
pub const BLOCK_SEPARATOR: &str = "-|-";

/// The reference of a pulse that follows the pulse listed before it.
pub const PREVIOUS_PULSE: &str = "previous_pulse";

/// The reference of a pulse timed from the start of its segment.
pub const SEGMENT_START: &str = "segment_start";

/// Where and how a block is placed when it is built.
#[derive(Clone, Debug)]
pub struct BuildOptions<'a> {
    /// The pulse the block's start marker references; the previous pulse by default.
    pub ref_pulse: Option<ParamValue>,
    pub ref_point: Option<String>,
    pub ref_point_new: Option<String>,
    pub block_delay: f64,
    /// Shift the block by this fraction of its duration, or by `start`, `middle` or `end`.
    pub block_align: Option<ParamValue>,
    /// Build under this name instead of the block's own (counted) name.
    pub name: Option<String>,
    /// Substitute the values of this sweep point into parametric pulse fields.
    pub sweep: Option<(&'a SweepPoints, &'a [usize])>,
}

impl Default for BuildOptions<'_> {
    fn default() -> Self {
        Self {
            ref_pulse: None,
            ref_point: None,
            ref_point_new: None,
            block_delay: 0.0,
            block_align: None,
            name: None,
            sweep: None,
        }
    }
}

impl<'a> BuildOptions<'a> {
    pub fn referencing(ref_pulse: impl Into<ParamValue>) -> Self {
        Self {
            ref_pulse: Some(ref_pulse.into()),
            ..Self::default()
        }
    }

    pub fn with_ref_point(mut self, ref_point: impl Into<String>) -> Self {
        self.ref_point = Some(ref_point.into());
        self
    }

    pub fn with_block_align(mut self, block_align: impl Into<ParamValue>) -> Self {
        self.block_align = Some(block_align.into());
        self
    }

    pub fn with_sweep(mut self, sweep_points: &'a SweepPoints, indices: &'a [usize]) -> Self {
        self.sweep = Some((sweep_points, indices));
        self
    }
}

/// An ordered group of pulse-parameter records whose timing references are local to the group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub name: String,
    pub pulses: Vec<PulseParams>,
    end_after_all_pulses: bool,
    counter_disabled: bool,
    build_count: usize,
}

impl Block {
    pub fn new(name: impl Into<String>, pulses: Vec<PulseParams>) -> Self {
        Self {
            name: name.into(),
            pulses,
            ..Self::default()
        }
    }

    pub fn push(&mut self, pulse: PulseParams) {
        self.pulses.push(pulse);
    }

    pub fn extend(&mut self, pulses: impl IntoIterator<Item = PulseParams>) {
        self.pulses.extend(pulses);
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Let the block end with the pulse ending last in time, rather than with the pulse listed
    /// last.
    pub fn set_end_after_all_pulses(&mut self, end_after_all_pulses: bool) {
        self.end_after_all_pulses = end_after_all_pulses;
    }

    pub fn end_after_all_pulses(&self) -> bool {
        self.end_after_all_pulses
    }

    /// Build under the block's own name every time, without a repetition counter.
    pub fn disable_counter(&mut self) {
        self.counter_disabled = true;
    }

    pub fn apply_pulse_modifs(&mut self, modifs: &PulseModifs) -> Result<(), SequenceError> {
        modifs.apply(&mut self.pulses)?;
        Ok(())
    }

    fn next_build_name(&mut self) -> String {
        let name = if self.build_count == 0 || self.counter_disabled {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, self.build_count)
        };
        self.build_count += 1;
        name
    }

    /// Flatten the block into records with segment-wide names and references.
    ///
    /// The pulses are framed by a `start` marker, placed according to `options`, and an `end`
    /// marker; every name and every reference to a name in the block is prefixed with the
    /// build name and [`BLOCK_SEPARATOR`].
    pub fn build(&mut self, options: BuildOptions<'_>) -> Result<Vec<PulseParams>, SequenceError> {
        let name = match options.name {
            Some(name) => name,
            None => self.next_build_name(),
        };
        let prefix = format!("{name}{BLOCK_SEPARATOR}");
        let local_names: Vec<String> = self
            .pulses
            .iter()
            .enumerate()
            .map(|(index, pulse)| {
                pulse
                    .name()
                    .map_or_else(|| index.to_string(), str::to_owned)
            })
            .collect();
        let is_local = |reference: &str| reference == "start" || local_names.iter().any(|n| n == reference);
        let prefixed = |reference: &ParamValue| -> ParamValue {
            match reference {
                ParamValue::Str(reference) if is_local(reference) => {
                    ParamValue::Str(format!("{prefix}{reference}"))
                }
                ParamValue::List(references) => ParamValue::List(
                    references
                        .iter()
                        .map(|reference| match reference {
                            ParamValue::Str(reference) if is_local(reference) => {
                                ParamValue::Str(format!("{prefix}{reference}"))
                            }
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            }
        };

        let mut start = PulseParams::new();
        start
            .set("name", format!("{prefix}start"))
            .set("pulse_type", "VirtualPulse")
            .set("pulse_length", 0.0)
            .set("ref_pulse", options.ref_pulse.unwrap_or_else(|| PREVIOUS_PULSE.into()))
            .set("ref_point", options.ref_point.unwrap_or_else(|| "end".to_owned()))
            .set("ref_point_new", options.ref_point_new.unwrap_or_else(|| "start".to_owned()))
            .set("pulse_delay", options.block_delay);
        if let Some(block_align) = options.block_align {
            start.set("block_align", block_align);
        }

        let mut built = Vec::with_capacity(self.pulses.len() + 2);
        built.push(start);
        for (index, (pulse, local_name)) in self.pulses.iter().zip(&local_names).enumerate() {
            let mut pulse = pulse.clone();
            pulse.set("name", format!("{prefix}{local_name}"));
            match pulse.value("ref_pulse") {
                Some(reference) => {
                    let reference = prefixed(reference);
                    pulse.set("ref_pulse", reference);
                }
                None if index == 0 => {
                    pulse.set("ref_pulse", format!("{prefix}start"));
                }
                None => {}
            }
            if let Some((sweep_points, indices)) = options.sweep {
                pulse.resolve_parametric(&sweep_points.numeric_values(indices))?;
            }
            built.push(pulse);
        }

        if !local_names.iter().any(|n| n == "end") {
            let mut end = PulseParams::new();
            end.set("name", format!("{prefix}end"))
                .set("pulse_type", "VirtualPulse")
                .set("pulse_length", 0.0)
                .set("ref_point", "end");
            if self.end_after_all_pulses && !local_names.is_empty() {
                end.set(
                    "ref_pulse",
                    local_names
                        .iter()
                        .map(|n| ParamValue::Str(format!("{prefix}{n}")))
                        .collect::<Vec<_>>(),
                )
                .set("ref_function", "max");
            } else {
                let last = local_names.last().map_or("start", String::as_str);
                end.set("ref_pulse", format!("{prefix}{last}"));
            }
            built.push(end);
        }
        tracing::debug!(block = %name, pulses = built.len(), "built block");
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Block, BuildOptions};
    use crate::parameter::{ParamValue, ParametricValue, PulseParams};
    use crate::sweep::SweepPoints;

    fn pulse(name: Option<&str>) -> PulseParams {
        let mut pulse = PulseParams::new();
        pulse.set("pulse_type", "VirtualPulse").set("pulse_length", 1e-8);
        if let Some(name) = name {
            pulse.set("name", name);
        }
        pulse
    }

    fn names(pulses: &[PulseParams]) -> Vec<&str> {
        pulses.iter().filter_map(PulseParams::name).collect()
    }

    #[test]
    fn names_and_references_are_prefixed() {
        let mut second = pulse(Some("second"));
        second.set("ref_pulse", "first").set("ref_point", "start");
        let mut outside = pulse(None);
        outside.set("ref_pulse", "other-|-end");
        let mut block = Block::new("blk", vec![pulse(Some("first")), second, outside]);

        let built = block.build(BuildOptions::default()).unwrap();
        assert_eq!(
            names(&built),
            vec!["blk-|-start", "blk-|-first", "blk-|-second", "blk-|-2", "blk-|-end"]
        );
        assert_eq!(built[1].str("ref_pulse"), Some("blk-|-start"));
        assert_eq!(built[2].str("ref_pulse"), Some("blk-|-first"));
        assert_eq!(built[3].str("ref_pulse"), Some("other-|-end"));
        assert_eq!(built[4].str("ref_pulse"), Some("blk-|-2"));
        assert_eq!(built[0].str("ref_pulse"), Some("previous_pulse"));
    }

    #[test]
    fn repeated_builds_are_counted() {
        let mut block = Block::new("blk", vec![pulse(None)]);
        block.build(BuildOptions::default()).unwrap();
        let built = block.build(BuildOptions::default()).unwrap();
        assert_eq!(built[0].name(), Some("blk_1-|-start"));

        block.disable_counter();
        let built = block.build(BuildOptions::default()).unwrap();
        assert_eq!(built[0].name(), Some("blk-|-start"));
    }

    #[test]
    fn end_after_all_pulses_references_every_pulse() {
        let mut block = Block::new("blk", vec![pulse(Some("a")), pulse(Some("b"))]);
        block.set_end_after_all_pulses(true);
        let built = block.build(BuildOptions::default()).unwrap();
        let end = built.last().unwrap();
        assert_eq!(
            end.get("ref_pulse"),
            Some(&ParamValue::List(vec!["blk-|-a".into(), "blk-|-b".into()]))
        );
        assert_eq!(end.str("ref_function"), Some("max"));
    }

    #[test]
    fn sweep_values_are_substituted() {
        let mut swept = pulse(Some("a"));
        swept.set("pulse_length", ParametricValue::new("length"));
        let mut block = Block::new("blk", vec![swept]);
        let sweep_points = SweepPoints::single("length", [1e-8, 2e-8]);
        let built = block
            .build(BuildOptions::default().with_sweep(&sweep_points, &[1]))
            .unwrap();
        assert_eq!(built[1].f64("pulse_length"), Ok(2e-8));
    }
}
