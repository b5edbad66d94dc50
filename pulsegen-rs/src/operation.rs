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

//! The operation dictionary: default pulse parameters of every named operation on the device.

use std::collections::BTreeSet;
use std::io::Read;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parameter::PulseParams;

#[derive(Debug, thiserror::Error)]
pub enum OperationDictError {
    #[error("failed to parse operation dictionary: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read operation dictionary: {0}")]
    Io(#[from] std::io::Error),
}

/// An owned snapshot of the operation dictionary, keyed by `"<operation> <qubit> [qubit]"`.
///
/// The version is bumped each time the snapshot is replaced, so that derived data can detect
/// a stale dictionary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationDict {
    operations: IndexMap<String, PulseParams>,
    #[serde(skip)]
    version: u64,
}

impl OperationDict {
    pub fn new(operations: IndexMap<String, PulseParams>) -> Self {
        Self {
            operations,
            version: 0,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, OperationDictError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, OperationDictError> {
        Ok(Self::new(serde_json::from_reader(reader)?))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the whole snapshot.
    pub fn replace(&mut self, operations: IndexMap<String, PulseParams>) {
        self.operations = operations;
        self.version += 1;
    }

    pub fn insert(&mut self, op_code: impl Into<String>, pulse: PulseParams) {
        self.operations.insert(op_code.into(), pulse);
        self.version += 1;
    }

    pub fn get(&self, op_code: &str) -> Option<&PulseParams> {
        self.operations.get(op_code)
    }

    pub fn contains(&self, op_code: &str) -> bool {
        self.operations.contains_key(op_code)
    }

    /// A fresh copy of the record of an operation, safe to mutate.
    pub fn copy_op(&self, op_code: &str) -> Option<PulseParams> {
        self.operations.get(op_code).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PulseParams)> {
        self.operations.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.operations.keys()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The operation names (first word of each key), in dictionary order.
    pub fn operation_types(&self) -> impl Iterator<Item = &str> {
        self.operations
            .keys()
            .filter_map(|key| key.split_whitespace().next())
    }

    /// Every qubit named in some key, unique and sorted.
    pub fn qubit_names(&self) -> Vec<String> {
        self.operations
            .keys()
            .flat_map(|key| key.split_whitespace().skip(1))
            .map(str::to_owned)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::OperationDict;

    const DICT: &str = r#"{
        "X180 qb2": {"pulse_type": "SSB_DRAG_pulse", "amplitude": 0.4},
        "CZ_nztc qb2 qb1": {"pulse_type": "NZTransitionControlledPulse"},
        "RO qb10": {"pulse_type": "GaussFilteredCosIQPulse"},
        "X180 qb1": {"pulse_type": "SSB_DRAG_pulse", "amplitude": 0.3}
    }"#;

    #[test]
    fn extracts_sorted_unique_qubits() {
        let dict = OperationDict::from_json(DICT).unwrap();
        assert_eq!(dict.qubit_names(), vec!["qb1", "qb10", "qb2"]);
    }

    #[test]
    fn operation_types_keep_dictionary_order() {
        let dict = OperationDict::from_json(DICT).unwrap();
        assert_eq!(
            dict.operation_types().collect::<Vec<_>>(),
            vec!["X180", "CZ_nztc", "RO", "X180"]
        );
    }

    #[test]
    fn copies_are_independent_of_the_snapshot() {
        let mut dict = OperationDict::from_json(DICT).unwrap();
        let mut copy = dict.copy_op("X180 qb1").unwrap();
        copy.set("amplitude", 1.0);
        assert_eq!(dict.get("X180 qb1").unwrap().f64("amplitude"), Ok(0.3));

        let version = dict.version();
        dict.insert("X90 qb1", copy);
        assert_eq!(dict.version(), version + 1);
    }
}
