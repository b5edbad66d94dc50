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

//! The qubits a builder addresses, their logical order and their drive calibration.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::operation::OperationDict;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QubitError {
    #[error("qubit {name} not found in {known:?}")]
    NotFound { name: String, known: Vec<String> },
    #[error("logical qubit index {index} is out of range for {len} qubits")]
    IndexOutOfRange { index: i64, len: usize },
}

/// A user-supplied amplitude correction.
#[derive(Clone)]
pub struct CorrectionFn(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl CorrectionFn {
    pub fn new(function: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(function))
    }
}

impl fmt::Debug for CorrectionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrectionFn({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for CorrectionFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Maps a rotation, as a signed fraction of a 180 degree rotation, to the fraction of the
/// calibrated 180 degree drive amplitude which realizes it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NonlinearityCorrection {
    /// The amplitude is proportional to the rotation angle.
    #[default]
    Linear,
    /// `sum_k c_k x^(2k+1)`. The coefficients should sum to one so that a 180 degree rotation
    /// keeps its calibrated amplitude.
    OddPolynomial { coefficients: Vec<f64> },
    #[serde(skip)]
    Custom(CorrectionFn),
}

impl NonlinearityCorrection {
    pub fn apply(&self, fraction: f64) -> f64 {
        match self {
            NonlinearityCorrection::Linear => fraction,
            NonlinearityCorrection::OddPolynomial { coefficients } => {
                let square = fraction * fraction;
                coefficients
                    .iter()
                    .rev()
                    .fold(0.0, |acc, coefficient| acc * square + coefficient)
                    * fraction
            }
            NonlinearityCorrection::Custom(function) => (function.0)(fraction),
        }
    }
}

/// Per-qubit configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QubitConfig {
    pub nonlinearity_correction: NonlinearityCorrection,
}

/// The ordered qubit names of a builder. A qubit's position is its logical index, which
/// operation codes may use instead of its name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QubitRegistry {
    qb_names: Vec<String>,
    configs: IndexMap<String, QubitConfig>,
}

impl QubitRegistry {
    pub fn new<S: Into<String>>(qb_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            qb_names: qb_names.into_iter().map(Into::into).collect(),
            configs: IndexMap::new(),
        }
    }

    /// The qubits named in the keys of an operation dictionary, in sorted order, optionally
    /// restricted to `filter`.
    pub fn from_operation_dict(operation_dict: &OperationDict, filter: Option<&[String]>) -> Self {
        let qb_names = operation_dict
            .qubit_names()
            .into_iter()
            .filter(|name| filter.map_or(true, |filter| filter.contains(name)));
        Self::new(qb_names)
    }

    pub fn with_configs(mut self, configs: IndexMap<String, QubitConfig>) -> Self {
        self.configs = configs;
        self
    }

    pub fn set_config(&mut self, qb_name: impl Into<String>, config: QubitConfig) {
        self.configs.insert(qb_name.into(), config);
    }

    pub fn names(&self) -> &[String] {
        &self.qb_names
    }

    pub fn contains(&self, qb_name: &str) -> bool {
        self.qb_names.iter().any(|name| name == qb_name)
    }

    /// Resolve qubit names or logical indices into names.
    ///
    /// Entries are read as logical indices only when every entry is an integer; negative
    /// indices count from the end. In strict mode an unknown name is an error, otherwise it is
    /// passed through as given.
    pub fn resolve<S: AsRef<str>>(
        &self,
        qb_names: &[S],
        strict: bool,
    ) -> Result<Vec<String>, QubitError> {
        let indices: Option<Vec<i64>> = qb_names
            .iter()
            .map(|name| name.as_ref().trim().parse().ok())
            .collect();
        let resolved = match indices {
            Some(indices) if !indices.is_empty() => indices
                .into_iter()
                .map(|index| self.by_index(index).map(str::to_owned))
                .collect::<Result<Vec<_>, _>>()?,
            _ => qb_names.iter().map(|name| name.as_ref().to_owned()).collect(),
        };
        if strict {
            if let Some(unknown) = resolved.iter().find(|name| !self.contains(name)) {
                return Err(QubitError::NotFound {
                    name: unknown.clone(),
                    known: self.qb_names.clone(),
                });
            }
        }
        Ok(resolved)
    }

    fn by_index(&self, index: i64) -> Result<&str, QubitError> {
        let len = self.qb_names.len();
        let position = if index < 0 { index + len as i64 } else { index };
        usize::try_from(position)
            .ok()
            .and_then(|position| self.qb_names.get(position))
            .map(String::as_str)
            .ok_or(QubitError::IndexOutOfRange { index, len })
    }

    /// Swap the qubits at two logical indices.
    pub fn swap(&mut self, i: usize, j: usize) -> Result<(), QubitError> {
        let len = self.qb_names.len();
        for index in [i, j] {
            if index >= len {
                return Err(QubitError::IndexOutOfRange {
                    index: index as i64,
                    len,
                });
            }
        }
        self.qb_names.swap(i, j);
        Ok(())
    }

    /// The amplitude correction of a qubit; linear when the qubit is not configured.
    pub fn nonlinearity_correction(&self, qb_name: &str) -> NonlinearityCorrection {
        self.configs
            .get(qb_name)
            .map(|config| config.nonlinearity_correction.clone())
            .unwrap_or_default()
    }
}
