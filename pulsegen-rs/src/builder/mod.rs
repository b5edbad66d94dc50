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

//! The circuit builder: resolves operation codes into pulse-parameter records, assembles
//! them into blocks and sweeps blocks into segments and sequences.

use crate::operation::OperationDict;
use crate::parameter::ParameterError;
use crate::parser::ParseError;
use crate::pulse::PulseError;
use crate::qubits::{QubitError, QubitRegistry};
use crate::sequence::{SequenceError, TimingError};
use crate::sweep::SweepError;

pub use assemble::{
    BlockAlignment, CompositionOptions, FillValues, InitOptions, InitState, Preparation,
    PulseSpec, ReadoutOptions,
};
pub use calibration::{CalibrationOptions, CalibrationPoints};
pub use config::{BuilderConfig, ConfigError, DecompositionPolicy, PrepParams, PreparationType};
pub use sweep::{BodyBlockFn, SweepOptions, SweepOutput};

mod assemble;
mod calibration;
mod config;
mod prepare;
mod resolve;
mod sweep;

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("operation `{0}` not found")]
    OperationNotFound(String),
    #[error("CZ gate `{gate} {qb1} {qb2}` not found")]
    CzNotFound {
        gate: String,
        qb1: String,
        qb2: String,
    },
    #[error("no readout operation for qubit {0}")]
    ReadoutNotFound(String),
    #[error("operation `{op_code}` needs {expected} qubits, got {found}")]
    OperandCount {
        op_code: String,
        expected: usize,
        found: usize,
    },
    #[error("there must be one initialization per qubit, got {states} for {qubits} qubits")]
    InitStateMismatch { states: usize, qubits: usize },
    #[error("threshold mapping of qubit {qubit} needs {expected} entries, found {found}")]
    ThresholdMapping {
        qubit: String,
        expected: usize,
        found: usize,
    },
    #[error("no value to fill the placeholder `{{{0}}}`")]
    MissingFillValue(String),
    #[error("decomposition of single-qubit rotations `{0}` is not implemented")]
    SingleQubitDecomposition(String),
    #[error("only 1D and 2D sweeps are implemented, got {0} dimensions")]
    TooManySweepDimensions(usize),
    #[error(
        "operation of pulse dict {0} resolved to several pulses, so its parameters are ambiguous"
    )]
    AmbiguousPulseDict(usize),
    #[error("operation `{0}` resolved to several pulses")]
    MultiplePulses(String),
    #[error("unknown state `{0}`")]
    UnknownState(String),
    #[error("exactly one of a body block and a body block generator must be given")]
    BodyBlock,
    #[error(transparent)]
    Qubit(#[from] QubitError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Pulse(#[from] PulseError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Timing(#[from] TimingError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
}

/// The qubits an operation of the builder acts on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QubitSelection {
    /// Every qubit of the builder, in logical order.
    #[default]
    All,
    /// Qubit names, or logical indices when every entry is an integer.
    Names(Vec<String>),
}

impl From<&str> for QubitSelection {
    fn from(name: &str) -> Self {
        QubitSelection::Names(vec![name.to_owned()])
    }
}

impl From<Vec<String>> for QubitSelection {
    fn from(names: Vec<String>) -> Self {
        QubitSelection::Names(names)
    }
}

impl From<&[String]> for QubitSelection {
    fn from(names: &[String]) -> Self {
        QubitSelection::Names(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for QubitSelection {
    fn from(names: [&str; N]) -> Self {
        QubitSelection::Names(names.iter().map(|name| (*name).to_owned()).collect())
    }
}

/// Builds blocks, segments and sequences from operation codes.
///
/// The builder owns a snapshot of the operation dictionary, replaced explicitly through
/// [`CircuitBuilder::update_operation_dict`].
#[derive(Clone, Debug)]
pub struct CircuitBuilder {
    operation_dict: OperationDict,
    qubits: QubitRegistry,
    cz_pulse_name: String,
    config: BuilderConfig,
    prep_sweep_params: indexmap::IndexMap<String, indexmap::IndexMap<String, String>>,
}

impl CircuitBuilder {
    /// A builder acting on every qubit named in the operation dictionary.
    pub fn new(operation_dict: OperationDict, config: BuilderConfig) -> Self {
        let qubits = QubitRegistry::from_operation_dict(&operation_dict, None);
        Self::with_registry(operation_dict, qubits, config)
    }

    /// A builder acting on the given qubits, in this logical order.
    pub fn with_qubits<S: Into<String>>(
        operation_dict: OperationDict,
        qb_names: impl IntoIterator<Item = S>,
        config: BuilderConfig,
    ) -> Self {
        Self::with_registry(operation_dict, QubitRegistry::new(qb_names), config)
    }

    /// A builder acting on the qubits of the operation dictionary which appear in `filter`.
    pub fn filtered(operation_dict: OperationDict, filter: &[String], config: BuilderConfig) -> Self {
        let qubits = QubitRegistry::from_operation_dict(&operation_dict, Some(filter));
        Self::with_registry(operation_dict, qubits, config)
    }

    fn with_registry(
        operation_dict: OperationDict,
        qubits: QubitRegistry,
        config: BuilderConfig,
    ) -> Self {
        let cz_pulse_name = config
            .cz_pulse_name
            .clone()
            .or_else(|| {
                operation_dict
                    .operation_types()
                    .find(|op_type| op_type.contains("CZ"))
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| "CZ".to_owned());
        let qubits = qubits.with_configs(config.qubits.clone());
        let prep_sweep_params = qubits
            .names()
            .iter()
            .map(|name| (name.clone(), indexmap::IndexMap::new()))
            .collect();
        Self {
            operation_dict,
            qubits,
            cz_pulse_name,
            config,
            prep_sweep_params,
        }
    }

    pub fn operation_dict(&self) -> &OperationDict {
        &self.operation_dict
    }

    /// Replace the operation dictionary snapshot.
    pub fn update_operation_dict(&mut self, operation_dict: OperationDict) {
        let version = self.operation_dict.version();
        self.operation_dict = operation_dict;
        tracing::debug!(
            previous_version = version,
            operations = self.operation_dict.len(),
            "updated operation dictionary"
        );
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn cz_pulse_name(&self) -> &str {
        &self.cz_pulse_name
    }

    pub fn qb_names(&self) -> &[String] {
        self.qubits.names()
    }

    pub fn fast_mode(&self) -> bool {
        self.config.fast_mode
    }

    /// Resolve a qubit selection into names, in the order given (or logical order for
    /// [`QubitSelection::All`]).
    pub fn get_qubits(
        &self,
        selection: &QubitSelection,
        strict: bool,
    ) -> Result<Vec<String>, BuilderError> {
        match selection {
            QubitSelection::All => Ok(self.qubits.names().to_vec()),
            QubitSelection::Names(names) => Ok(self.qubits.resolve(names, strict)?),
        }
    }

    /// Swap two logical qubit indices.
    pub fn swap_qubit_indices(&mut self, i: usize, j: usize) -> Result<(), BuilderError> {
        Ok(self.qubits.swap(i, j)?)
    }

    /// The configured preparation parameters, or the standard ones.
    pub fn get_prep_params(&self) -> PrepParams {
        self.config.prep_params.clone().unwrap_or_default()
    }

    /// Turn the field `field` of the preselection readout of `qb_name` into a sweep over
    /// `param`.
    pub fn set_prep_sweep_param(
        &mut self,
        qb_name: impl Into<String>,
        field: impl Into<String>,
        param: impl Into<String>,
    ) {
        self.prep_sweep_params
            .entry(qb_name.into())
            .or_default()
            .insert(field.into(), param.into());
    }
}
