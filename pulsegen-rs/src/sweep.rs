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

//! Multi-dimensional sweeps over named parameters.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parameter::ParamValue;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("sweep parameter `{name}` has {found} values, but its dimension has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("sweep parameter `{0}` is already defined")]
    Duplicate(String),
}

/// The values of one swept parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepParameter {
    pub values: Vec<ParamValue>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub label: String,
}

/// Named parameters swept along one or more dimensions. All parameters of a dimension have
/// the same number of values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SweepPoints {
    dimensions: Vec<IndexMap<String, SweepParameter>>,
}

impl SweepPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single dimension sweeping one parameter.
    pub fn single<V: Into<ParamValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let mut sweep_points = Self::new();
        sweep_points.add_sweep_dimension();
        // A new dimension accepts any length, and holds no other parameter.
        let _ = sweep_points.add_sweep_parameter(name, values, "", "");
        sweep_points
    }

    /// The number of dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dimensions(&self) -> &[IndexMap<String, SweepParameter>] {
        &self.dimensions
    }

    pub fn add_sweep_dimension(&mut self) {
        self.dimensions.push(IndexMap::new());
    }

    /// Add a parameter to the last dimension, creating the first dimension if needed.
    pub fn add_sweep_parameter<V: Into<ParamValue>>(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
        unit: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<(), SweepError> {
        let name = name.into();
        if self.find_parameter(&name).is_some() {
            return Err(SweepError::Duplicate(name));
        }
        if self.dimensions.is_empty() {
            self.add_sweep_dimension();
        }
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        let dimension = self.dimensions.len() - 1;
        if let Some(expected) = Self::dimension_length(&self.dimensions[dimension]) {
            if expected != values.len() {
                return Err(SweepError::LengthMismatch {
                    name,
                    expected,
                    found: values.len(),
                });
            }
        }
        self.dimensions[dimension].insert(
            name,
            SweepParameter {
                values,
                unit: unit.into(),
                label: label.into(),
            },
        );
        Ok(())
    }

    fn dimension_length(dimension: &IndexMap<String, SweepParameter>) -> Option<usize> {
        dimension.values().next().map(|parameter| parameter.values.len())
    }

    /// The number of points along each dimension.
    pub fn length(&self) -> Vec<usize> {
        self.dimensions
            .iter()
            .map(|dimension| Self::dimension_length(dimension).unwrap_or(0))
            .collect()
    }

    /// The dimension a parameter is swept in.
    pub fn find_parameter(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .position(|dimension| dimension.contains_key(name))
    }

    pub fn values(&self, dimension: usize, name: &str) -> Option<&[ParamValue]> {
        self.dimensions
            .get(dimension)?
            .get(name)
            .map(|parameter| parameter.values.as_slice())
    }

    /// The value of a parameter at a sweep point, given one index per dimension.
    pub fn value(&self, name: &str, indices: &[usize]) -> Option<&ParamValue> {
        let dimension = self.find_parameter(name)?;
        self.values(dimension, name)?.get(*indices.get(dimension)?)
    }

    /// The names of the parameters of one dimension.
    pub fn parameters(&self, dimension: usize) -> impl Iterator<Item = &str> {
        self.dimensions
            .get(dimension)
            .into_iter()
            .flat_map(|dimension| dimension.keys().map(String::as_str))
    }

    /// The numeric value of every parameter at a sweep point.
    pub fn numeric_values(&self, indices: &[usize]) -> HashMap<String, f64> {
        self.dimensions
            .iter()
            .zip(indices)
            .flat_map(|(dimension, index)| {
                dimension.iter().filter_map(move |(name, parameter)| {
                    let value = parameter.values.get(*index)?.as_f64()?;
                    Some((name.clone(), value))
                })
            })
            .collect()
    }

    /// The dimensions from `dimension` onwards.
    pub fn slice_from(&self, dimension: usize) -> Self {
        Self {
            dimensions: self.dimensions.iter().skip(dimension).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{SweepError, SweepPoints};
    use crate::parameter::ParamValue;

    fn two_dimensional() -> SweepPoints {
        let mut sweep_points = SweepPoints::single("theta", [0.0, 90.0, 180.0]);
        sweep_points
            .add_sweep_parameter("amp", [0.1, 0.2, 0.3], "V", "Amplitude")
            .unwrap();
        sweep_points.add_sweep_dimension();
        sweep_points
            .add_sweep_parameter("cphase", [45.0, 90.0], "deg", "Conditional phase")
            .unwrap();
        sweep_points
    }

    #[test]
    fn reports_dimension_lengths() {
        assert_eq!(two_dimensional().length(), vec![3, 2]);
        assert_eq!(two_dimensional().find_parameter("cphase"), Some(1));
        assert_eq!(two_dimensional().find_parameter("phase"), None);
    }

    #[test]
    fn looks_up_values_by_sweep_point() {
        let sweep_points = two_dimensional();
        assert_eq!(
            sweep_points.value("amp", &[2, 0]),
            Some(&ParamValue::Number(0.3))
        );
        assert_eq!(
            sweep_points.value("cphase", &[2, 1]),
            Some(&ParamValue::Number(90.0))
        );
        let values = sweep_points.numeric_values(&[1, 0]);
        assert_eq!(values.len(), 3);
        assert_eq!(values["theta"], 90.0);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let mut sweep_points = two_dimensional();
        assert_eq!(
            sweep_points.add_sweep_parameter("other", [1.0], "", ""),
            Err(SweepError::LengthMismatch {
                name: "other".to_owned(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn slices_off_leading_dimensions() {
        let sliced = two_dimensional().slice_from(1);
        assert_eq!(sliced.length(), vec![2]);
        assert_eq!(sliced.find_parameter("cphase"), Some(0));
    }
}
