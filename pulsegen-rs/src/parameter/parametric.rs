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

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Serialize, Serializer};

use crate::expression::{EvaluationError, Expression};
use crate::qubits::NonlinearityCorrection;
use crate::units::{rotation_fraction, Degrees};

/// What a resolved angle is turned into.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum ParametricOutput {
    /// The angle itself, as used for virtual Z rotations and conditional phases.
    Scalar,
    /// A drive amplitude: the calibrated 180 degree `amplitude`, rescaled through the qubit's
    /// non-linearity correction of the rotation angle.
    DriveAmplitude {
        amplitude: f64,
        correction: NonlinearityCorrection,
    },
}

/// A pulse parameter which depends on a sweep parameter and is only known once a sweep point
/// has been chosen.
///
/// Resolution computes `output(sign * f(x) * scale + offset)`, where `f` is the angle
/// expression of the operation code (the identity when the angle is the bare parameter).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParametricValue {
    /// The name of the sweep parameter.
    pub param: String,
    #[serde(serialize_with = "serialize_expression")]
    pub expression: Option<Expression>,
    pub sign: f64,
    pub scale: f64,
    pub offset: f64,
    #[serde(flatten)]
    pub output: ParametricOutput,
    /// The operation name and qubits this value originates from, e.g. `["Z:theta", "qb1"]`.
    pub op_code: Vec<String>,
}

fn serialize_expression<S: Serializer>(
    expression: &Option<Expression>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match expression {
        Some(expression) => serializer.serialize_str(&expression.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ParametricValue {
    /// A value equal to the sweep parameter itself.
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            expression: None,
            sign: 1.0,
            scale: 1.0,
            offset: 0.0,
            output: ParametricOutput::Scalar,
            op_code: Vec::new(),
        }
    }

    pub fn with_expression(mut self, expression: Expression) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn with_sign(mut self, sign: f64) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_output(mut self, output: ParametricOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_op_code(mut self, op_code: Vec<String>) -> Self {
        self.op_code = op_code;
        self
    }

    /// The angle, in degrees, for a given value of the sweep parameter.
    pub fn angle(&self, value: f64) -> Result<f64, EvaluationError> {
        let evaluated = match &self.expression {
            Some(expression) => expression.evaluate_single(&self.param, value)?,
            None => value,
        };
        Ok(self.sign * evaluated * self.scale + self.offset)
    }

    /// Resolve the value for a given value of the sweep parameter.
    pub fn resolve(&self, value: f64) -> Result<f64, EvaluationError> {
        let angle = self.angle(value)?;
        let resolved = match &self.output {
            ParametricOutput::Scalar => angle,
            ParametricOutput::DriveAmplitude {
                amplitude,
                correction,
            } => amplitude * correction.apply(rotation_fraction(Degrees(angle))),
        };
        if resolved.is_finite() {
            Ok(resolved)
        } else {
            Err(EvaluationError::NonFinite)
        }
    }
}

impl fmt::Display for ParametricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.param)?;
        if let Some(expression) = &self.expression {
            write!(f, ": {expression}")?;
        }
        if !self.op_code.is_empty() {
            write!(f, " from `{}`", self.op_code.join(" "))?;
        }
        write!(f, ">")
    }
}

impl Mul<f64> for ParametricValue {
    type Output = Self;

    fn mul(mut self, factor: f64) -> Self {
        self.scale *= factor;
        self.offset *= factor;
        self
    }
}

impl Div<f64> for ParametricValue {
    type Output = Self;

    fn div(self, divisor: f64) -> Self {
        self * divisor.recip()
    }
}

impl Add<f64> for ParametricValue {
    type Output = Self;

    fn add(mut self, term: f64) -> Self {
        self.offset += term;
        self
    }
}

impl Sub<f64> for ParametricValue {
    type Output = Self;

    fn sub(self, term: f64) -> Self {
        self + -term
    }
}

impl Neg for ParametricValue {
    type Output = Self;

    fn neg(self) -> Self {
        self * -1.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::{ParametricOutput, ParametricValue};
    use crate::expression::Expression;
    use crate::qubits::NonlinearityCorrection;

    #[rstest]
    #[case(90.0, 45.0)]
    #[case(-30.0, -15.0)]
    fn half_phase(#[case] cphase: f64, #[case] expected: f64) {
        let value = ParametricValue::new("cphase") / 2.0;
        assert_relative_eq!(value.resolve(cphase).unwrap(), expected);
    }

    #[test]
    fn affine_operations_compose_in_order() {
        let value = -(ParametricValue::new("cphase") / 2.0) + 180.0;
        assert_relative_eq!(value.resolve(90.0).unwrap(), 135.0);
    }

    #[test]
    fn sign_applies_to_the_expression() {
        let expression: Expression = "2*[theta]".parse().unwrap();
        let value = ParametricValue::new("theta")
            .with_expression(expression)
            .with_sign(-1.0);
        assert_relative_eq!(value.resolve(20.0).unwrap(), -40.0);
    }

    #[test]
    fn drive_amplitude_wraps_the_rotation() {
        let value = ParametricValue::new("theta").with_output(ParametricOutput::DriveAmplitude {
            amplitude: 0.4,
            correction: NonlinearityCorrection::Linear,
        });
        assert_relative_eq!(value.resolve(90.0).unwrap(), 0.2);
        assert_relative_eq!(value.resolve(270.0).unwrap(), -0.2);
        assert_relative_eq!(value.resolve(180.0).unwrap(), 0.4);
    }
}
