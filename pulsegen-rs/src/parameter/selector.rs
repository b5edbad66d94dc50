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

use std::str::FromStr;

use indexmap::IndexMap;

use super::{ParamValue, ParameterError, PulseParams};

/// Identifies one field in some of the pulses of a block, written
/// `attr=<field>[, op_code=<op code>][, name=<pulse name>][, occurrence=<n>]`.
///
/// Without an `occurrence`, every matching pulse is selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSelector {
    pub attr: String,
    pub op_code: Option<String>,
    pub name: Option<String>,
    pub occurrence: Option<usize>,
}

impl AttributeSelector {
    pub fn new(attr: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            op_code: None,
            name: None,
            occurrence: None,
        }
    }

    pub fn with_op_code(mut self, op_code: impl Into<String>) -> Self {
        self.op_code = Some(op_code.into());
        self
    }

    fn matches(&self, pulse: &PulseParams) -> bool {
        self.op_code
            .as_deref()
            .map_or(true, |op_code| pulse.op_code() == Some(op_code))
            && self
                .name
                .as_deref()
                .map_or(true, |name| pulse.name() == Some(name))
    }

    /// Indices of the selected pulses.
    pub fn select(&self, pulses: &[PulseParams]) -> Vec<usize> {
        let matching = pulses
            .iter()
            .enumerate()
            .filter(|(_, pulse)| self.matches(pulse))
            .map(|(index, _)| index);
        match self.occurrence {
            Some(occurrence) => matching.skip(occurrence).take(1).collect(),
            None => matching.collect(),
        }
    }
}

impl FromStr for AttributeSelector {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParameterError::Selector(s.to_owned());
        let mut attr = None;
        let mut selector = Self::new("");
        for part in s.split(',') {
            let (key, value) = part.split_once('=').ok_or_else(malformed)?;
            let value = value.trim().to_owned();
            match key.trim() {
                "attr" => attr = Some(value),
                "op_code" => selector.op_code = Some(value),
                "name" => selector.name = Some(value),
                "occurrence" => {
                    selector.occurrence = Some(value.parse().map_err(|_| malformed())?)
                }
                _ => return Err(malformed()),
            }
        }
        selector.attr = attr.filter(|attr| !attr.is_empty()).ok_or_else(malformed)?;
        Ok(selector)
    }
}

/// Modifications applied to the pulses of a block after its operations were resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PulseModifs {
    /// Field overrides keyed by the position of the pulse in the block.
    pub by_index: IndexMap<usize, PulseParams>,
    /// Single fields, set on every pulse an attribute selector picks.
    pub by_selector: Vec<(AttributeSelector, ParamValue)>,
}

impl PulseModifs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty() && self.by_selector.is_empty()
    }

    pub fn at(mut self, index: usize, overrides: PulseParams) -> Self {
        self.by_index
            .entry(index)
            .or_default()
            .update(&overrides);
        self
    }

    pub fn select(mut self, selector: AttributeSelector, value: impl Into<ParamValue>) -> Self {
        self.by_selector.push((selector, value.into()));
        self
    }

    /// Parse the string-keyed form used in configuration files, where keys are either pulse
    /// indices or attribute selectors.
    pub fn from_map(map: &IndexMap<String, ParamValue>) -> Result<Self, ParameterError> {
        let mut modifs = Self::new();
        for (key, value) in map {
            if let Ok(index) = key.trim().parse::<usize>() {
                let overrides = value
                    .as_map()
                    .ok_or_else(|| ParameterError::WrongType {
                        name: key.clone(),
                        expected: "a map",
                        found: value.kind().to_owned(),
                    })?
                    .clone();
                modifs = modifs.at(index, overrides.into());
            } else {
                modifs = modifs.select(key.parse()?, value.clone());
            }
        }
        Ok(modifs)
    }

    pub fn apply(&self, pulses: &mut [PulseParams]) -> Result<(), ParameterError> {
        let len = pulses.len();
        for (index, overrides) in &self.by_index {
            pulses
                .get_mut(*index)
                .ok_or(ParameterError::IndexOutOfRange { index: *index, len })?
                .update(overrides);
        }
        for (selector, value) in &self.by_selector {
            for index in selector.select(pulses) {
                pulses[index].set(selector.attr.clone(), value.clone());
            }
        }
        Ok(())
    }
}
