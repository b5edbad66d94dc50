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

//! Assembly of resolved operations into blocks, and of blocks into larger blocks, segments and
//! sequences.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::parameter::{ParamValue, ParameterError, PulseModifs, PulseParams};
use crate::sequence::{Block, BuildOptions, Segment, Sequence};

use super::{BuilderError, CircuitBuilder, QubitSelection};

/// Values for the `{key}` placeholders of operation codes, as in `X180 {qbt}`.
pub type FillValues = HashMap<String, String>;

/// `{key}`, optionally with an (ignored) format specification such as `{key:}`.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)(?::[^{}]*)?\}").expect("placeholder pattern is valid"));

fn fill_placeholders(op: &str, fill_values: &FillValues) -> Result<String, BuilderError> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(op)
        .map(|captures| captures[1].to_owned())
        .find(|key| !fill_values.contains_key(key))
    {
        return Err(BuilderError::MissingFillValue(missing));
    }
    Ok(PLACEHOLDER
        .replace_all(op, |captures: &Captures| {
            fill_values.get(&captures[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}

/// The standard initializations, by state label.
fn standard_init(label: &str) -> Option<&'static [&'static str]> {
    let ops: &'static [&'static str] = match label {
        "0" | "g" => &["I"],
        "1" | "e" => &["X180"],
        "+" => &["Y90"],
        "-" => &["mY90"],
        "f" => &["X180", "X180_ef"],
        _ => return None,
    };
    Some(ops)
}

/// The state qubits are initialized (or finalized) in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitState {
    /// A single state label (`0`, `1`, `+`, `-`, `g`, `e` or `f`) applied to every qubit, or
    /// one label character per qubit.
    Label(String),
    /// One state label or operation name per qubit.
    PerQubit(Vec<String>),
    /// Explicit operation names per qubit, without the qubit name.
    Ops(Vec<Vec<String>>),
}

impl Default for InitState {
    fn default() -> Self {
        InitState::Label("0".to_owned())
    }
}

impl From<&str> for InitState {
    fn from(label: &str) -> Self {
        InitState::Label(label.to_owned())
    }
}

impl InitState {
    /// Read a state from the value of an `initialize` or `finalize` sweep parameter.
    pub fn from_param(value: &ParamValue) -> Result<Self, ParameterError> {
        let wrong_type = || ParameterError::WrongType {
            name: "initialize".to_owned(),
            expected: "a state label or a list of them",
            found: value.kind().to_owned(),
        };
        let strings = |values: &[ParamValue]| {
            values
                .iter()
                .map(|value| value.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
        };
        match value {
            ParamValue::Str(label) => Ok(InitState::Label(label.clone())),
            ParamValue::List(values) => {
                if let Some(labels) = strings(values) {
                    return Ok(InitState::PerQubit(labels));
                }
                values
                    .iter()
                    .map(|value| value.as_list().and_then(strings))
                    .collect::<Option<Vec<_>>>()
                    .map(InitState::Ops)
                    .ok_or_else(wrong_type)
            }
            _ => Err(wrong_type()),
        }
    }

    /// The operation names for each of `n_qubits` qubits.
    fn ops(&self, n_qubits: usize) -> Result<Vec<Vec<String>>, BuilderError> {
        let expand = |label: &str| match standard_init(label) {
            Some(ops) => ops.iter().map(|op| (*op).to_owned()).collect(),
            None => vec![label.to_owned()],
        };
        let ops: Vec<Vec<String>> = match self {
            InitState::Label(label) if label.chars().count() == 1 => {
                vec![expand(label); n_qubits]
            }
            InitState::Label(labels) => labels
                .chars()
                .map(|label| expand(&label.to_string()))
                .collect(),
            InitState::PerQubit(labels) => labels.iter().map(|label| expand(label)).collect(),
            InitState::Ops(ops) => ops.clone(),
        };
        if ops.len() != n_qubits {
            return Err(BuilderError::InitStateMismatch {
                states: ops.len(),
                qubits: n_qubits,
            });
        }
        Ok(ops)
    }
}

/// Which preparation precedes an initialization.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Preparation {
    /// The builder's configured preparation parameters.
    #[default]
    Configured,
    Custom(super::PrepParams),
    None,
}

#[derive(Clone, Debug)]
pub struct InitOptions {
    /// Replaces the generated block name.
    pub block_name: Option<String>,
    pub preparation: Preparation,
    /// Start the pulses of all qubits together instead of one after another.
    pub simultaneous: bool,
    pub pulse_modifs: Option<PulseModifs>,
    /// A block executed between the preparation and the initialization pulses.
    pub prepend_block: Option<Block>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            block_name: None,
            preparation: Preparation::Configured,
            simultaneous: true,
            pulse_modifs: None,
            prepend_block: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReadoutOptions {
    /// The acquisition element shared by the readout pulses.
    pub element_name: String,
    pub block_name: String,
    /// Set on the first readout pulse.
    pub overrides: PulseParams,
}

impl Default for ReadoutOptions {
    fn default() -> Self {
        Self {
            element_name: "RO".to_owned(),
            block_name: "Readout".to_owned(),
            overrides: PulseParams::new(),
        }
    }
}

/// The point at which simultaneous blocks are aligned.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum BlockAlignment {
    #[default]
    Start,
    Middle,
    End,
    /// A fraction of each block's duration, from 0 (start) to 1 (end).
    Fraction(f64),
}

impl BlockAlignment {
    fn as_param(self) -> Option<ParamValue> {
        match self {
            BlockAlignment::Start => None,
            BlockAlignment::Middle => Some("middle".into()),
            BlockAlignment::End => Some("end".into()),
            BlockAlignment::Fraction(fraction) => Some(fraction.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompositionOptions {
    /// Only used by simultaneous composition.
    pub block_align: BlockAlignment,
    /// Let every composed block end with the pulse ending last in time.
    pub set_end_after_all_pulses: bool,
    /// Build every composed block under its own name, without a repetition counter.
    pub disable_block_counter: bool,
}

/// Anything a block can be made from.
#[derive(Clone, Debug, PartialEq)]
pub enum PulseSpec {
    Block(Block),
    Op(String),
    Ops(Vec<String>),
    /// A pulse dictionary; see [`CircuitBuilder::block_from_pulse_dicts`].
    PulseDict(PulseParams),
    PulseDicts(Vec<PulseParams>),
}

impl From<Block> for PulseSpec {
    fn from(block: Block) -> Self {
        PulseSpec::Block(block)
    }
}

impl From<&str> for PulseSpec {
    fn from(op: &str) -> Self {
        PulseSpec::Op(op.to_owned())
    }
}

impl From<Vec<String>> for PulseSpec {
    fn from(ops: Vec<String>) -> Self {
        PulseSpec::Ops(ops)
    }
}

impl From<PulseParams> for PulseSpec {
    fn from(pulse_dict: PulseParams) -> Self {
        PulseSpec::PulseDict(pulse_dict)
    }
}

impl From<Vec<PulseParams>> for PulseSpec {
    fn from(pulse_dicts: Vec<PulseParams>) -> Self {
        PulseSpec::PulseDicts(pulse_dicts)
    }
}

pub(super) fn selection_label(qubits: &QubitSelection) -> String {
    match qubits {
        QubitSelection::All => "all".to_owned(),
        QubitSelection::Names(names) => names.join("_"),
    }
}

impl CircuitBuilder {
    /// A block of the pulses of `operations`, in order.
    ///
    /// With `fill_values`, `{key}` placeholders in the operation codes are substituted first,
    /// so that e.g. `X180 {qbt}` can be written once for any target qubit. The `pulse_modifs`
    /// are applied to the resolved pulses.
    pub fn block_from_ops<S: AsRef<str>>(
        &self,
        block_name: &str,
        operations: &[S],
        fill_values: Option<&FillValues>,
        pulse_modifs: Option<&PulseModifs>,
    ) -> Result<Block, BuilderError> {
        let mut pulses = Vec::new();
        for op in operations {
            let op = match fill_values {
                Some(fill_values) if !fill_values.is_empty() => {
                    fill_placeholders(op.as_ref(), fill_values)?
                }
                _ => op.as_ref().to_owned(),
            };
            pulses.extend(self.get_pulses(&op)?);
        }
        let mut block = Block::new(block_name, pulses);
        if let Some(pulse_modifs) = pulse_modifs {
            block.apply_pulse_modifs(pulse_modifs)?;
        }
        Ok(block)
    }

    /// A block from pulse dictionaries. A dictionary with an `op_code` is the resolved
    /// operation with the other entries of the dictionary overriding its parameters; any
    /// other dictionary is taken as a complete set of pulse parameters.
    pub fn block_from_pulse_dicts(
        &self,
        pulse_dicts: &[PulseParams],
        block_name: &str,
    ) -> Result<Block, BuilderError> {
        let mut pulses = Vec::new();
        for (index, pulse_dict) in pulse_dicts.iter().enumerate() {
            let Some(op_code) = pulse_dict.op_code() else {
                pulses.push(pulse_dict.clone());
                continue;
            };
            let mut resolved = self.get_pulses(op_code)?;
            let overrides: PulseParams = pulse_dict
                .iter()
                .filter(|(key, _)| key.as_str() != "op_code")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if !overrides.is_empty() {
                match resolved.as_mut_slice() {
                    [pulse] => pulse.update(&overrides),
                    _ => return Err(BuilderError::AmbiguousPulseDict(index)),
                }
            }
            pulses.extend(resolved);
        }
        Ok(Block::new(block_name, pulses))
    }

    pub fn block_from_anything(
        &self,
        spec: impl Into<PulseSpec>,
        block_name: &str,
    ) -> Result<Block, BuilderError> {
        match spec.into() {
            PulseSpec::Block(block) => Ok(block),
            PulseSpec::Op(op) => self.block_from_ops(block_name, &[op], None, None),
            PulseSpec::Ops(ops) => self.block_from_ops(block_name, &ops, None, None),
            PulseSpec::PulseDict(pulse_dict) => {
                self.block_from_pulse_dicts(std::slice::from_ref(&pulse_dict), block_name)
            }
            PulseSpec::PulseDicts(pulse_dicts) => {
                self.block_from_pulse_dicts(&pulse_dicts, block_name)
            }
        }
    }

    /// Initialize `qubits` in `state`, preceded by the preparation of `options`.
    ///
    /// The initialization pulses of all qubits start together unless `options.simultaneous`
    /// is unset, and the block ends after the last of them.
    pub fn initialize(
        &self,
        state: &InitState,
        qubits: &QubitSelection,
        options: InitOptions,
    ) -> Result<Block, BuilderError> {
        let block_name = options
            .block_name
            .unwrap_or_else(|| format!("Initialization_{}", selection_label(qubits)));
        let qb_names = self.get_qubits(qubits, true)?;
        if qb_names.is_empty() {
            return Ok(Block::new(block_name, Vec::new()));
        }

        let mut pulses = Vec::new();
        for (qb_name, ops) in qb_names.iter().zip(state.ops(qb_names.len())?) {
            if ops == ["I"] {
                continue;
            }
            let ops: Vec<String> = ops.iter().map(|op| format!("{op} {qb_name}")).collect();
            let mut qb_block =
                self.block_from_ops("tmp_block", &ops, None, options.pulse_modifs.as_ref())?;
            if options.simultaneous {
                if let Some(first) = qb_block.pulses.first_mut() {
                    first.set("ref_pulse", "start");
                }
            }
            pulses.append(&mut qb_block.pulses);
        }
        let mut block = Block::new(block_name.clone(), pulses);
        block.set_end_after_all_pulses(true);

        let prep_params = match options.preparation {
            Preparation::Configured => Some(self.get_prep_params()),
            Preparation::Custom(prep_params) => Some(prep_params),
            Preparation::None => None,
        };
        let mut blocks = Vec::new();
        if let Some(prep_params) = prep_params {
            let qubits = QubitSelection::Names(qb_names);
            blocks.push(self.prepare(&qubits, "start", &prep_params, None)?);
        }
        blocks.extend(options.prepend_block);
        if blocks.is_empty() {
            return Ok(block);
        }
        blocks.push(block);
        self.sequential_blocks(&block_name, blocks, &CompositionOptions::default())
    }

    /// Final rotations of `qubits` into `state`: an initialization without preparation.
    pub fn finalize(
        &self,
        state: &InitState,
        qubits: &QubitSelection,
        options: InitOptions,
    ) -> Result<Block, BuilderError> {
        let block_name = options
            .block_name
            .unwrap_or_else(|| format!("Finalization_{}", selection_label(qubits)));
        let options = InitOptions {
            block_name: Some(block_name),
            preparation: Preparation::None,
            ..options
        };
        self.initialize(state, qubits, options)
    }

    /// Simultaneous readout of `qubits` in a single acquisition element.
    pub fn mux_readout(
        &self,
        qubits: &QubitSelection,
        options: &ReadoutOptions,
    ) -> Result<Block, BuilderError> {
        let mut ro_pulses = Vec::new();
        for (j, qb_name) in self.get_qubits(qubits, true)?.iter().enumerate() {
            let op_code = format!("RO {qb_name}");
            let mut ro_pulse = self
                .operation_dict
                .copy_op(&op_code)
                .ok_or_else(|| BuilderError::ReadoutNotFound(qb_name.clone()))?;
            ro_pulse
                .set("name", format!("{}_{j}", options.element_name))
                .set("element_name", options.element_name.as_str())
                .set("op_code", op_code);
            if j == 0 {
                ro_pulse.update(&options.overrides);
            } else {
                ro_pulse.set("ref_point", "start");
            }
            ro_pulses.push(ro_pulse);
        }
        let mut block = Block::new(options.block_name.as_str(), ro_pulses);
        block.set_end_after_all_pulses(true);
        Ok(block)
    }

    /// A block playing `blocks` at the same time, aligned at `options.block_align`.
    ///
    /// The block ends with a marker after the latest end of the composed blocks. Note that a
    /// block ends with its last listed pulse unless it was told to end after all of them.
    pub fn simultaneous_blocks(
        &self,
        block_name: &str,
        blocks: impl IntoIterator<Item = Block>,
        options: &CompositionOptions,
    ) -> Result<Block, BuilderError> {
        let mut simultaneous = Block::new(block_name, Vec::new());
        let mut end_pulses = Vec::new();
        for mut block in blocks {
            if options.set_end_after_all_pulses {
                block.set_end_after_all_pulses(true);
            }
            let mut build_options = BuildOptions::referencing("start");
            build_options.block_align = options.block_align.as_param();
            if options.disable_block_counter {
                build_options.name = Some(block.name.clone());
            }
            let built = block.build(build_options)?;
            if let Some(end) = built.last().and_then(PulseParams::name) {
                end_pulses.push(ParamValue::from(end));
            }
            simultaneous.extend(built);
        }
        let mut end = PulseParams::new();
        end.set("name", "simultaneous_end_pulse")
            .set("pulse_type", "VirtualPulse")
            .set("pulse_length", 0.0)
            .set("pulse_delay", 0.0)
            .set("ref_pulse", end_pulses)
            .set("ref_point", "end")
            .set("ref_function", "max");
        simultaneous.push(end);
        Ok(simultaneous)
    }

    /// A block playing `blocks` one after another.
    pub fn sequential_blocks(
        &self,
        block_name: &str,
        blocks: impl IntoIterator<Item = Block>,
        options: &CompositionOptions,
    ) -> Result<Block, BuilderError> {
        let mut sequential = Block::new(block_name, Vec::new());
        for mut block in blocks {
            if options.set_end_after_all_pulses {
                block.set_end_after_all_pulses(true);
            }
            let build_options = BuildOptions {
                name: options.disable_block_counter.then(|| block.name.clone()),
                ..BuildOptions::default()
            };
            sequential.extend(block.build(build_options)?);
        }
        Ok(sequential)
    }

    /// Initialization, the operations and a readout of all qubits, as one segment.
    pub fn seg_from_ops<S: AsRef<str>>(
        &self,
        seg_name: &str,
        operations: &[S],
        fill_values: Option<&FillValues>,
        pulse_modifs: Option<&PulseModifs>,
        init_state: &InitState,
        readout: &ReadoutOptions,
    ) -> Result<Segment, BuilderError> {
        let mut pulses = self
            .initialize(init_state, &QubitSelection::All, InitOptions::default())?
            .build(BuildOptions::default())?;
        pulses.extend(
            self.block_from_ops("Block1", operations, fill_values, pulse_modifs)?
                .build(BuildOptions::default())?,
        );
        pulses.extend(
            self.mux_readout(&QubitSelection::All, readout)?
                .build(BuildOptions::default())?,
        );
        Ok(Segment::new(seg_name, pulses)?)
    }

    /// As [`CircuitBuilder::seg_from_ops`], wrapped in a sequence of that single segment.
    pub fn seq_from_ops<S: AsRef<str>>(
        &self,
        seq_name: &str,
        operations: &[S],
        fill_values: Option<&FillValues>,
        pulse_modifs: Option<&PulseModifs>,
        init_state: &InitState,
        readout: &ReadoutOptions,
    ) -> Result<Sequence, BuilderError> {
        let mut sequence = Sequence::new(seq_name);
        sequence.add(self.seg_from_ops(
            "Segment1",
            operations,
            fill_values,
            pulse_modifs,
            init_state,
            readout,
        )?)?;
        Ok(sequence)
    }

    /// The end time of initialization followed by `operations`, from the timing of a segment
    /// which is never rendered.
    pub fn get_ops_duration<S: AsRef<str>>(
        &self,
        operations: &[S],
        fill_values: Option<&FillValues>,
        pulse_modifs: Option<&PulseModifs>,
        init_state: &InitState,
    ) -> Result<f64, BuilderError> {
        let mut pulses = self
            .initialize(init_state, &QubitSelection::All, InitOptions::default())?
            .build(BuildOptions::default())?;
        pulses.extend(
            self.block_from_ops("Block1", operations, fill_values, pulse_modifs)?
                .build(BuildOptions::default())?,
        );
        Self::get_pulses_duration(pulses)
    }

    /// The end time of the pulse starting last among already built `pulses`.
    pub fn get_pulses_duration(pulses: Vec<PulseParams>) -> Result<f64, BuilderError> {
        let mut segment = Segment::new("Segment 1", pulses)?;
        segment.resolve_timing()?;
        Ok(segment.last_pulse_end()?)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::super::tests::{builder, OPERATIONS};
    use super::{
        BlockAlignment, CompositionOptions, FillValues, InitOptions, InitState, Preparation,
        PulseSpec, ReadoutOptions,
    };
    use crate::builder::{
        BuilderConfig, BuilderError, CircuitBuilder, DecompositionPolicy, QubitSelection,
    };
    use crate::operation::OperationDict;
    use crate::parameter::{ParamValue, PulseModifs, PulseParams};
    use crate::sequence::{BuildOptions, Segment};

    const DRAG_LENGTH: f64 = 4e-8;

    fn op_codes(pulses: &[PulseParams]) -> Vec<&str> {
        pulses.iter().filter_map(PulseParams::op_code).collect()
    }

    #[test]
    fn placeholders_are_filled() {
        let fill_values: FillValues = [("qbt", "qb1"), ("qbc", "qb2")]
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        let block = builder()
            .block_from_ops("fill", &["X180 {qbt:}", "X90 {qbc}"], Some(&fill_values), None)
            .unwrap();
        assert_eq!(op_codes(&block.pulses), vec!["X180 qb1", "X90 qb2"]);

        let error = builder()
            .block_from_ops("fill", &["CZ {qbt} {qbx}"], Some(&fill_values), None)
            .unwrap_err();
        assert!(matches!(error, BuilderError::MissingFillValue(key) if key == "qbx"));
    }

    #[test]
    fn pulse_modifs_apply_to_resolved_pulses() {
        let modifs = PulseModifs::new().at(
            1,
            [("ref_point", ParamValue::from("start"))].into_iter().collect(),
        );
        let block = builder()
            .block_from_ops("modified", &["X180 qb1", "Y90 qb2"], None, Some(&modifs))
            .unwrap();
        assert_eq!(block.pulses[1].str("ref_point"), Some("start"));
        assert_eq!(block.pulses[0].str("ref_point"), None);
    }

    #[test]
    fn pulse_dicts_override_operations() {
        let mut with_op_code = PulseParams::new();
        with_op_code.set("op_code", "X90 qb1").set("amplitude", 0.3);
        let mut wait = PulseParams::new();
        wait.set("name", "wait")
            .set("pulse_type", "VirtualPulse")
            .set("pulse_length", 1e-7);
        let block = builder()
            .block_from_pulse_dicts(&[with_op_code.clone(), wait.clone()], "dicts")
            .unwrap();
        assert_eq!(block.pulses.len(), 2);
        assert_relative_eq!(block.pulses[0].f64("amplitude").unwrap(), 0.3);
        assert_eq!(block.pulses[0].pulse_type(), Some("SSB_DRAG_pulse"));
        assert_eq!(block.pulses[1], wait);

        let single = builder()
            .block_from_anything(with_op_code, "single")
            .unwrap();
        assert_eq!(single.pulses.len(), 1);
    }

    #[test]
    fn overrides_of_decomposed_operations_are_ambiguous() {
        let mut decompose_rotation_gates = IndexMap::new();
        decompose_rotation_gates.insert("CZ_nztc".to_owned(), DecompositionPolicy::All(true));
        let builder = CircuitBuilder::new(
            OperationDict::from_json(OPERATIONS).unwrap(),
            BuilderConfig {
                decompose_rotation_gates,
                ..BuilderConfig::default()
            },
        );
        let mut pulse_dict = PulseParams::new();
        pulse_dict.set("op_code", "CZ90 qb1 qb2").set("pulse_delay", 1e-9);
        let unused = PulseParams::new();
        assert!(matches!(
            builder.block_from_pulse_dicts(&[unused, pulse_dict], "cz"),
            Err(BuilderError::AmbiguousPulseDict(1))
        ));
    }

    #[rstest]
    #[case(PulseSpec::from("X90 qb1"), 1)]
    #[case(PulseSpec::from(vec!["X90 qb1".to_owned(), "Y90 qb2".to_owned()]), 2)]
    #[case(PulseSpec::from(crate::sequence::Block::new("given", Vec::new())), 0)]
    fn blocks_from_anything(#[case] spec: PulseSpec, #[case] n_pulses: usize) {
        let block = builder().block_from_anything(spec, "anything").unwrap();
        assert_eq!(block.len(), n_pulses);
    }

    #[test]
    fn initialization_pulses_start_together() {
        let options = InitOptions {
            preparation: Preparation::None,
            ..InitOptions::default()
        };
        let block = builder()
            .initialize(&InitState::from("1"), &QubitSelection::All, options)
            .unwrap();
        assert_eq!(op_codes(&block.pulses), vec!["X180 qb1", "X180 qb2"]);
        assert!(block.end_after_all_pulses());
        assert!(block
            .pulses
            .iter()
            .all(|pulse| pulse.str("ref_pulse") == Some("start")));
    }

    #[test]
    fn excited_states_chain_per_qubit() {
        let options = InitOptions {
            preparation: Preparation::None,
            ..InitOptions::default()
        };
        let block = builder()
            .initialize(&InitState::from("fg"), &QubitSelection::All, options)
            .unwrap();
        assert_eq!(op_codes(&block.pulses), vec!["X180 qb1", "X180_ef qb1"]);
        assert_eq!(block.pulses[0].str("ref_pulse"), Some("start"));
        assert_eq!(block.pulses[1].str("ref_pulse"), None);
    }

    #[test]
    fn initialization_needs_a_state_per_qubit() {
        let error = builder()
            .initialize(
                &InitState::from("011"),
                &QubitSelection::All,
                InitOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            error,
            BuilderError::InitStateMismatch {
                states: 3,
                qubits: 2
            }
        ));
    }

    #[test]
    fn configured_preparation_wraps_the_initialization() {
        let block = builder()
            .initialize(
                &InitState::PerQubit(vec!["+".to_owned(), "X90".to_owned()]),
                &QubitSelection::All,
                InitOptions {
                    block_name: Some("init".to_owned()),
                    ..InitOptions::default()
                },
            )
            .unwrap();
        assert_eq!(block.name, "init");
        assert_eq!(op_codes(&block.pulses), vec!["Y90 qb1", "X90 qb2"]);
        assert!(block
            .pulses
            .iter()
            .any(|pulse| pulse.name() == Some("Preparation_qb1_qb2-|-start")));
    }

    #[rstest]
    #[case(ParamValue::from("e"), InitState::Label("e".to_owned()))]
    #[case(
        ParamValue::from(vec![ParamValue::from("g"), ParamValue::from("+")]),
        InitState::PerQubit(vec!["g".to_owned(), "+".to_owned()])
    )]
    #[case(
        ParamValue::from(vec![ParamValue::from(vec![ParamValue::from("X90")])]),
        InitState::Ops(vec![vec!["X90".to_owned()]])
    )]
    fn init_states_from_sweep_values(#[case] value: ParamValue, #[case] expected: InitState) {
        assert_eq!(InitState::from_param(&value).unwrap(), expected);
    }

    #[test]
    fn readout_is_multiplexed() {
        let overrides: PulseParams = [("pulse_delay", ParamValue::from(1e-8))]
            .into_iter()
            .collect();
        let options = ReadoutOptions {
            overrides,
            ..ReadoutOptions::default()
        };
        let block = builder()
            .mux_readout(&QubitSelection::All, &options)
            .unwrap();
        let names: Vec<_> = block.pulses.iter().filter_map(PulseParams::name).collect();
        assert_eq!(names, vec!["RO_0", "RO_1"]);
        assert_eq!(op_codes(&block.pulses), vec!["RO qb1", "RO qb2"]);
        assert!(block.pulses.iter().all(|p| p.element_name() == Some("RO")));
        assert_relative_eq!(block.pulses[0].f64("pulse_delay").unwrap(), 1e-8);
        assert_eq!(block.pulses[1].str("ref_point"), Some("start"));
        assert!(block.end_after_all_pulses());
    }

    fn end_of_simultaneous(first: &[&str], second: &[&str], block_align: BlockAlignment) -> f64 {
        let builder = builder();
        let blocks = vec![
            builder.block_from_ops("first", first, None, None).unwrap(),
            builder.block_from_ops("second", second, None, None).unwrap(),
        ];
        let options = CompositionOptions {
            block_align,
            ..CompositionOptions::default()
        };
        let pulses = builder
            .simultaneous_blocks("both", blocks, &options)
            .unwrap()
            .build(BuildOptions::default())
            .unwrap();
        let mut segment = Segment::new("simultaneous", pulses).unwrap();
        segment.resolve_timing().unwrap();
        let end = segment
            .resolved_pulses()
            .unwrap()
            .iter()
            .find(|pulse| pulse.name == "both-|-simultaneous_end_pulse")
            .unwrap();
        end.algorithm_time()
    }

    #[test]
    fn simultaneous_blocks_end_after_the_longest() {
        let short = ["X180 qb1"];
        let long = ["X180 qb2", "X90 qb2"];
        let end = end_of_simultaneous(&short, &long, BlockAlignment::Start);
        assert_relative_eq!(end, 2.0 * DRAG_LENGTH, max_relative = 1e-12);
        let swapped = end_of_simultaneous(&long, &short, BlockAlignment::Start);
        assert_relative_eq!(swapped, end, max_relative = 1e-12);
        // end-aligned blocks end together
        let aligned = end_of_simultaneous(&short, &long, BlockAlignment::End);
        assert_relative_eq!(aligned, 0.0, epsilon = 1e-18);
    }

    #[test]
    fn sequential_blocks_follow_each_other() {
        let builder = builder();
        let blocks = vec![
            builder.block_from_ops("a", &["X180 qb1"], None, None).unwrap(),
            builder.block_from_ops("b", &["X90 qb2"], None, None).unwrap(),
        ];
        let options = CompositionOptions {
            disable_block_counter: true,
            ..CompositionOptions::default()
        };
        let pulses = builder
            .sequential_blocks("ab", blocks, &options)
            .unwrap()
            .build(BuildOptions::default())
            .unwrap();
        assert!(pulses.iter().any(|p| p.name() == Some("ab-|-b-|-0")));
        assert_relative_eq!(
            CircuitBuilder::get_pulses_duration(pulses).unwrap(),
            2.0 * DRAG_LENGTH,
            max_relative = 1e-12
        );
    }

    #[test]
    fn operation_durations_include_the_initialization() {
        let duration = builder()
            .get_ops_duration(&["X90 qb1"], None, None, &InitState::from("1"))
            .unwrap();
        assert_relative_eq!(duration, 2.0 * DRAG_LENGTH, max_relative = 1e-12);
        let duration = builder()
            .get_ops_duration(&["X90 qb1", "Y90 qb1"], None, None, &InitState::default())
            .unwrap();
        assert_relative_eq!(duration, 2.0 * DRAG_LENGTH, max_relative = 1e-12);
    }

    #[test]
    fn segments_from_operations() {
        let sequence = builder()
            .seq_from_ops(
                "sequence",
                &["X90 qb1", "CZ qb1 qb2"],
                None,
                None,
                &InitState::default(),
                &ReadoutOptions::default(),
            )
            .unwrap();
        assert_eq!(sequence.len(), 1);
        assert_eq!(sequence.n_acq_elements(), 1);
        let segment = sequence.segment("Segment1").unwrap();
        assert!(segment.channels().contains(&"qb2_flux".to_owned()));
    }
}
