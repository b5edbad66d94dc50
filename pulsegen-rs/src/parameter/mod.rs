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

//! The values held by pulse-parameter records.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expression::EvaluationError;

pub use parametric::{ParametricOutput, ParametricValue};
pub use selector::{AttributeSelector, PulseModifs};

mod parametric;
mod selector;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("missing parameter `{0}`")]
    Missing(String),
    #[error("parameter `{name}` should be {expected}, found {found}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("parameter `{name}` depends on the unresolved sweep parameter `{parameter}`")]
    Unresolved { name: String, parameter: String },
    #[error("malformed attribute selector `{0}`")]
    Selector(String),
    #[error("pulse index {index} is out of range for a block of {len} pulses")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// A single value in a pulse-parameter record.
///
/// Records are deserialized from JSON or YAML operation dictionaries, so the variants mirror
/// those data models. [`ParamValue::Parametric`] only ever arises from resolving a parametric
/// operation code and is substituted before pulses are built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Str(String),
    List(Vec<ParamValue>),
    Map(IndexMap<String, ParamValue>),
    #[serde(skip_deserializing)]
    Parametric(Box<ParametricValue>),
}

impl ParamValue {
    /// The numeric value of an integer or floating point entry.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(value) => Some(*value as f64),
            ParamValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Booleans, plus the integers `0` and `1`, which configuration files use interchangeably.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            ParamValue::Integer(0) => Some(false),
            ParamValue::Integer(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, ParamValue>> {
        match self {
            ParamValue::Map(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// A short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "a boolean",
            ParamValue::Integer(_) => "an integer",
            ParamValue::Number(_) => "a number",
            ParamValue::Str(_) => "a string",
            ParamValue::List(_) => "a list",
            ParamValue::Map(_) => "a map",
            ParamValue::Parametric(_) => "a parametric value",
        }
    }

    /// Apply `value * scale + offset` to a numeric or parametric value.
    pub fn affine(&self, scale: f64, offset: f64) -> Option<ParamValue> {
        match self {
            ParamValue::Parametric(parametric) => Some(ParamValue::Parametric(Box::new(
                parametric.as_ref().clone() * scale + offset,
            ))),
            other => other.as_f64().map(|value| ParamValue::Number(value * scale + offset)),
        }
    }

    /// The first sweep parameter this value (or any value nested inside it) depends on.
    pub fn unresolved_parameter(&self) -> Option<&str> {
        match self {
            ParamValue::Parametric(parametric) => Some(&parametric.param),
            ParamValue::List(values) => values.iter().find_map(ParamValue::unresolved_parameter),
            ParamValue::Map(values) => values.values().find_map(ParamValue::unresolved_parameter),
            _ => None,
        }
    }

    /// Replace every parametric value whose parameter is bound in `values`, recursing into
    /// lists and maps. Unbound parametric values are left in place.
    pub fn resolve_parametric(
        &mut self,
        values: &HashMap<String, f64>,
    ) -> Result<(), ParameterError> {
        match self {
            ParamValue::Parametric(parametric) => {
                if let Some(value) = values.get(&parametric.param) {
                    *self = ParamValue::Number(parametric.resolve(*value)?);
                }
            }
            ParamValue::List(items) => {
                for item in items {
                    item.resolve_parametric(values)?;
                }
            }
            ParamValue::Map(items) => {
                for item in items.values_mut() {
                    item.resolve_parametric(values)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(value) => write!(f, "{value}"),
            ParamValue::Parametric(parametric) => write!(f, "{parametric}"),
            other => match serde_json::to_string(other) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => write!(f, "{other:?}"),
            },
        }
    }
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for ParamValue {
                fn from(value: $source) -> Self {
                    ParamValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    i64 => Integer,
    f64 => Number,
    String => Str,
    &str => Str,
    Vec<ParamValue> => List,
    IndexMap<String, ParamValue> => Map,
);

impl From<ParametricValue> for ParamValue {
    fn from(value: ParametricValue) -> Self {
        ParamValue::Parametric(Box::new(value))
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// A pulse-parameter record: an ordered mapping from field name to value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PulseParams(IndexMap<String, ParamValue>);

impl Deref for PulseParams {
    type Target = IndexMap<String, ParamValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PulseParams {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<IndexMap<String, ParamValue>> for PulseParams {
    fn from(values: IndexMap<String, ParamValue>) -> Self {
        Self(values)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for PulseParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl PulseParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> IndexMap<String, ParamValue> {
        self.0
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Overwrite fields with those of `other`, keeping the position of existing fields.
    pub fn update(&mut self, other: &PulseParams) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// A field which is present and not null.
    pub fn value(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> ParameterError {
        match self.0.get(key) {
            Some(ParamValue::Parametric(parametric)) => ParameterError::Unresolved {
                name: key.to_owned(),
                parameter: parametric.param.clone(),
            },
            Some(value) => ParameterError::WrongType {
                name: key.to_owned(),
                expected,
                found: value.kind().to_owned(),
            },
            None => ParameterError::Missing(key.to_owned()),
        }
    }

    pub fn f64(&self, key: &str) -> Result<f64, ParameterError> {
        self.value(key)
            .and_then(ParamValue::as_f64)
            .ok_or_else(|| self.wrong_type(key, "a number"))
    }

    /// A numeric field which may be absent or null.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, ParameterError> {
        match self.value(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "a number")),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ParameterError> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(ParamValue::as_str)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ParameterError> {
        match self.value(key) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| self.wrong_type(key, "a boolean")),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.str("name")
    }

    pub fn op_code(&self) -> Option<&str> {
        self.str("op_code")
    }

    pub fn pulse_type(&self) -> Option<&str> {
        self.str("pulse_type")
    }

    pub fn element_name(&self) -> Option<&str> {
        self.str("element_name")
    }

    /// Whether this record is a readout, judged by its `op_code`.
    pub fn is_readout(&self) -> bool {
        self.op_code().map_or(false, |op_code| op_code.starts_with("RO "))
    }

    /// The names of every sweep parameter some field of this record still depends on.
    pub fn unresolved_parameters(&self) -> Vec<String> {
        let mut parameters: Vec<String> = Vec::new();
        for value in self.0.values() {
            collect_unresolved(value, &mut parameters);
        }
        parameters
    }

    /// Substitute bound sweep parameters into every parametric field.
    pub fn resolve_parametric(
        &mut self,
        values: &HashMap<String, f64>,
    ) -> Result<(), ParameterError> {
        for value in self.0.values_mut() {
            value.resolve_parametric(values)?;
        }
        Ok(())
    }
}

fn collect_unresolved(value: &ParamValue, parameters: &mut Vec<String>) {
    match value {
        ParamValue::Parametric(parametric) => {
            if !parameters.contains(&parametric.param) {
                parameters.push(parametric.param.clone());
            }
        }
        ParamValue::List(values) => values
            .iter()
            .for_each(|value| collect_unresolved(value, parameters)),
        ParamValue::Map(values) => values
            .values()
            .for_each(|value| collect_unresolved(value, parameters)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::{ParamValue, ParameterError, ParametricValue, PulseParams};

    fn drive_pulse() -> PulseParams {
        serde_json::from_str(
            r#"{"pulse_type": "SSB_DRAG_pulse", "amplitude": 0.5, "sigma": 1e-8,
                "nr_sigma": 4, "phaselock": true, "I_channel": "AWG1_ch1", "ref_pulse": null}"#,
        )
        .unwrap()
    }

    #[test]
    fn deserializes_integers_and_floats_distinctly() {
        let pulse = drive_pulse();
        assert_eq!(pulse.get("nr_sigma"), Some(&ParamValue::Integer(4)));
        assert_eq!(pulse.get("amplitude"), Some(&ParamValue::Number(0.5)));
        assert_eq!(pulse.f64("nr_sigma"), Ok(4.0));
    }

    #[test]
    fn typed_getters_report_the_offending_field() {
        let pulse = drive_pulse();
        assert_eq!(
            pulse.f64("I_channel"),
            Err(ParameterError::WrongType {
                name: "I_channel".to_owned(),
                expected: "a number",
                found: "a string".to_owned(),
            })
        );
        assert_eq!(
            pulse.f64("motzoi"),
            Err(ParameterError::Missing("motzoi".to_owned()))
        );
        assert_eq!(pulse.opt_f64("ref_pulse"), Ok(None));
    }

    #[test]
    fn resolves_nested_parametric_values() {
        let mut pulse = drive_pulse();
        let mut rotation = indexmap::IndexMap::new();
        rotation.insert(
            "qb1".to_owned(),
            ParamValue::from(ParametricValue::new("theta") * -1.0),
        );
        pulse.set("basis_rotation", rotation);
        assert_eq!(pulse.unresolved_parameters(), vec!["theta".to_owned()]);

        pulse
            .resolve_parametric(&HashMap::from([("theta".to_owned(), 30.0)]))
            .unwrap();
        assert!(pulse.unresolved_parameters().is_empty());
        assert_eq!(
            pulse["basis_rotation"].as_map().unwrap()["qb1"],
            ParamValue::Number(-30.0)
        );
    }

    #[test]
    fn affine_applies_to_numbers_and_parametric_values() {
        assert_eq!(
            ParamValue::Integer(90).affine(-0.5, 180.0),
            Some(ParamValue::Number(135.0))
        );
        let parametric = ParamValue::from(ParametricValue::new("cphase"))
            .affine(-0.5, 180.0)
            .unwrap();
        match parametric {
            ParamValue::Parametric(parametric) => assert_eq!(parametric.resolve(90.0), Ok(135.0)),
            other => panic!("expected a parametric value, got {other:?}"),
        }
        assert_eq!(ParamValue::from("x").affine(1.0, 0.0), None);
    }
}
