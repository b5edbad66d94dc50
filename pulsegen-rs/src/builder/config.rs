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

//! Builder configuration, loaded from JSON or YAML.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::qubits::QubitConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("unsupported configuration file extension `{0}`")]
    UnsupportedFormat(String),
}

/// When the builder decomposes arbitrary-angle controlled phase gates of one gate type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecompositionPolicy {
    /// Decompose every gate of this type (or none).
    All(bool),
    /// Decompose gates between these qubit pairs only. The single-qubit gates of the
    /// decomposition act on the first qubit of the pair as listed.
    Pairs(Vec<[String; 2]>),
}

impl DecompositionPolicy {
    /// The qubits, in decomposition order, if a gate on `qubits` should be decomposed.
    pub fn decomposition_qubits(&self, qubits: &[String; 2]) -> Option<[String; 2]> {
        match self {
            DecompositionPolicy::All(true) => Some(qubits.clone()),
            DecompositionPolicy::All(false) => None,
            DecompositionPolicy::Pairs(pairs) => pairs
                .iter()
                .find(|pair| {
                    (pair[0] == qubits[0] && pair[1] == qubits[1])
                        || (pair[0] == qubits[1] && pair[1] == qubits[0])
                })
                .cloned(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, DecompositionPolicy::All(false))
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PreparationType {
    /// No preparation.
    #[default]
    Wait,
    /// A readout before the experiment, whose outcome is used to discard runs.
    Preselection,
    /// Readouts each followed by a feed-forward reset from the first excited state.
    ActiveResetE,
    /// As [`PreparationType::ActiveResetE`], resetting the second excited state too.
    ActiveResetEf,
}

/// Parameters of the preparation step preceding an experiment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepParams {
    pub preparation_type: PreparationType,
    pub reset_reps: usize,
    pub ro_separation: f64,
    pub post_ro_wait: f64,
    /// End the preparation `ro_separation` after the start of the last reset readout.
    pub pad_end: bool,
    /// Per qubit, the state each classified readout outcome corresponds to.
    pub threshold_mapping: IndexMap<String, IndexMap<i64, String>>,
}

impl Default for PrepParams {
    fn default() -> Self {
        Self {
            preparation_type: PreparationType::Wait,
            reset_reps: 3,
            ro_separation: 1.5e-6,
            post_ro_wait: 1e-6,
            pad_end: false,
            threshold_mapping: IndexMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// The gate type `CZ` op codes resolve to.
    pub cz_pulse_name: Option<String>,
    /// Keyed by gate type, e.g. `CZ_nztc`.
    pub decompose_rotation_gates: IndexMap<String, DecompositionPolicy>,
    pub prep_params: Option<PrepParams>,
    /// Skip logical qubit index resolution, and sweep resolution of generated body blocks.
    pub fast_mode: bool,
    /// Calibration of individual qubits, keyed by qubit name.
    pub qubits: IndexMap<String, QubitConfig>,
}

impl BuilderConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a configuration file, choosing the format by its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("json") => Self::from_json(&contents),
            Some("yaml" | "yml") => Self::from_yaml(&contents),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_owned(),
            )),
        }
    }
}
