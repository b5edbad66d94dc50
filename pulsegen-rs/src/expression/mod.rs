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

//! Angle expressions of sweep parameters, as written after the `:` of an operation code.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::parser::{parse_expression_str, ParseError};
use crate::units::floor_mod;

/// The different possible types of errors that could occur during expression evaluation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("no value was bound for parameter `{0}`")]
    Unbound(String),
    #[error("the expression evaluated to a non-finite number")]
    NonFinite,
}

/// An arithmetic expression over real numbers and bracketed sweep parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    FunctionCall(FunctionCallExpression),
    Infix(InfixExpression),
    Number(f64),
    PiConstant,
    Parameter(String),
    Prefix(PrefixExpression),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCallExpression {
    pub function: ExpressionFunction,
    pub expression: Box<Expression>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InfixExpression {
    pub left: Box<Expression>,
    pub operator: InfixOperator,
    pub right: Box<Expression>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrefixExpression {
    pub operator: PrefixOperator,
    pub expression: Box<Expression>,
}

/// Compute the result of an infix expression.
#[inline]
pub(crate) fn calculate_infix(left: f64, operator: InfixOperator, right: f64) -> f64 {
    use InfixOperator::*;
    match operator {
        Power => left.powf(right),
        Plus => left + right,
        Minus => left - right,
        Percent => floor_mod(left, right),
        Slash => left / right,
        Star => left * right,
    }
}

#[inline]
pub(crate) fn calculate_function(function: ExpressionFunction, argument: f64) -> f64 {
    use ExpressionFunction::*;
    match function {
        Absolute => argument.abs(),
        Cosine => argument.cos(),
        Exponent => argument.exp(),
        Logarithm => argument.ln(),
        Sine => argument.sin(),
        SquareRoot => argument.sqrt(),
        Tangent => argument.tan(),
    }
}

impl Expression {
    /// Evaluate the expression with the given parameter values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pulsegen_rs::expression::Expression;
    /// use std::collections::HashMap;
    /// use std::str::FromStr;
    ///
    /// let expression = Expression::from_str("2*[theta] + 10").unwrap();
    /// let values = HashMap::from([("theta", 40.0)]);
    ///
    /// assert_eq!(expression.evaluate(&values).unwrap(), 90.0);
    /// ```
    pub fn evaluate<K>(&self, values: &HashMap<K, f64>) -> Result<f64, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        let value = self.evaluate_unchecked(values)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvaluationError::NonFinite)
        }
    }

    fn evaluate_unchecked<K>(&self, values: &HashMap<K, f64>) -> Result<f64, EvaluationError>
    where
        K: Borrow<str> + Hash + Eq,
    {
        use Expression::*;

        match self {
            FunctionCall(FunctionCallExpression {
                function,
                expression,
            }) => Ok(calculate_function(
                *function,
                expression.evaluate_unchecked(values)?,
            )),
            Infix(InfixExpression {
                left,
                operator,
                right,
            }) => {
                let left = left.evaluate_unchecked(values)?;
                let right = right.evaluate_unchecked(values)?;
                Ok(calculate_infix(left, *operator, right))
            }
            Prefix(PrefixExpression {
                operator,
                expression,
            }) => {
                let value = expression.evaluate_unchecked(values)?;
                match operator {
                    PrefixOperator::Minus => Ok(-value),
                    PrefixOperator::Plus => Ok(value),
                }
            }
            Parameter(name) => values
                .get(name.as_str())
                .copied()
                .ok_or_else(|| EvaluationError::Unbound(name.clone())),
            PiConstant => Ok(PI),
            Number(number) => Ok(*number),
        }
    }

    /// Evaluate an expression of a single parameter at `value`.
    pub fn evaluate_single(&self, parameter: &str, value: f64) -> Result<f64, EvaluationError> {
        self.evaluate(&HashMap::from([(parameter, value)]))
    }

    /// The distinct parameters referenced by this expression, in order of first appearance.
    pub fn parameters(&self) -> Vec<String> {
        let mut parameters = Vec::new();
        self.collect_parameters(&mut parameters);
        parameters
    }

    fn collect_parameters(&self, parameters: &mut Vec<String>) {
        match self {
            Expression::FunctionCall(FunctionCallExpression { expression, .. })
            | Expression::Prefix(PrefixExpression { expression, .. }) => {
                expression.collect_parameters(parameters)
            }
            Expression::Infix(InfixExpression { left, right, .. }) => {
                left.collect_parameters(parameters);
                right.collect_parameters(parameters);
            }
            Expression::Parameter(name) => {
                if !parameters.contains(name) {
                    parameters.push(name.clone());
                }
            }
            Expression::Number(_) | Expression::PiConstant => {}
        }
    }

    /// Fold every parameter-free subexpression into a number, in-place.
    ///
    /// Subexpressions which do not evaluate to a finite number are left as they are, so that
    /// the error surfaces when the expression is evaluated.
    pub fn simplify(&mut self) {
        match self {
            Expression::Number(_) | Expression::Parameter(_) => {}
            Expression::PiConstant => *self = Expression::Number(PI),
            Expression::FunctionCall(FunctionCallExpression { expression, .. })
            | Expression::Prefix(PrefixExpression { expression, .. }) => {
                expression.simplify();
                self.fold();
            }
            Expression::Infix(InfixExpression { left, right, .. }) => {
                left.simplify();
                right.simplify();
                self.fold();
            }
        }
    }

    fn fold(&mut self) {
        if self.parameters().is_empty() {
            if let Ok(value) = self.evaluate(&HashMap::<&str, f64>::new()) {
                *self = Expression::Number(value);
            }
        }
    }

    /// Consume the expression, simplifying it as much as possible.
    pub fn into_simplified(mut self) -> Self {
        self.simplify();
        self
    }

    /// Substitute an expression in the place of each matching parameter.
    #[must_use]
    pub fn substitute_parameters<K>(&self, parameter_values: &HashMap<K, Expression>) -> Self
    where
        K: Borrow<str> + Hash + Eq,
    {
        use Expression::*;

        match self {
            FunctionCall(FunctionCallExpression {
                function,
                expression,
            }) => FunctionCall(FunctionCallExpression {
                function: *function,
                expression: Box::new(expression.substitute_parameters(parameter_values)),
            }),
            Infix(InfixExpression {
                left,
                operator,
                right,
            }) => Infix(InfixExpression {
                left: Box::new(left.substitute_parameters(parameter_values)),
                operator: *operator,
                right: Box::new(right.substitute_parameters(parameter_values)),
            }),
            Prefix(PrefixExpression {
                operator,
                expression,
            }) => Prefix(PrefixExpression {
                operator: *operator,
                expression: Box::new(expression.substitute_parameters(parameter_values)),
            }),
            Parameter(name) => match parameter_values.get(name.as_str()) {
                Some(value) => value.clone(),
                None => Parameter(name.clone()),
            },
            other => other.clone(),
        }
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_expression_str(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::FunctionCall(FunctionCallExpression {
                function,
                expression,
            }) => write!(f, "{function}({expression})"),
            Expression::Infix(InfixExpression {
                left,
                operator,
                right,
            }) => {
                format_inner_expression(f, left)?;
                write!(f, "{operator}")?;
                format_inner_expression(f, right)
            }
            Expression::Number(value) => write!(f, "{value}"),
            Expression::PiConstant => write!(f, "pi"),
            Expression::Parameter(name) => write!(f, "[{name}]"),
            Expression::Prefix(PrefixExpression {
                operator,
                expression,
            }) => {
                write!(f, "{operator}")?;
                format_inner_expression(f, expression)
            }
        }
    }
}

/// Wrap infix subexpressions in parentheses, so that precedence survives a round trip.
fn format_inner_expression(f: &mut fmt::Formatter<'_>, expression: &Expression) -> fmt::Result {
    match expression {
        Expression::Infix(_) => write!(f, "({expression})"),
        _ => write!(f, "{expression}"),
    }
}

/// A function which may be called within an angle expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum ExpressionFunction {
    #[strum(serialize = "abs")]
    Absolute,
    #[strum(serialize = "cos")]
    Cosine,
    #[strum(serialize = "exp")]
    Exponent,
    #[strum(serialize = "log")]
    Logarithm,
    #[strum(serialize = "sin")]
    Sine,
    #[strum(serialize = "sqrt")]
    SquareRoot,
    #[strum(serialize = "tan")]
    Tangent,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrefixOperator {
    Plus,
    Minus,
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOperator::Plus => write!(f, "+"),
            PrefixOperator::Minus => write!(f, "-"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InfixOperator {
    Power,
    Plus,
    Minus,
    Percent,
    Slash,
    Star,
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InfixOperator::*;
        write!(
            f,
            "{}",
            match self {
                Power => "**",
                Plus => " + ",
                Minus => " - ",
                Percent => " % ",
                Slash => "/",
                Star => "*",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::str::FromStr;

    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{EvaluationError, Expression};

    #[rstest]
    #[case("2*[x] + 10", 40.0, 90.0)]
    #[case("-[x]/2", 90.0, -45.0)]
    #[case("-[x]/2 + 180", 90.0, 135.0)]
    #[case("([x] + 180) % 360", 270.0, 90.0)]
    #[case("-[x] % 360", 90.0, 270.0)]
    #[case("2**-1 * [x]", 10.0, 5.0)]
    #[case("-[x]**2", 3.0, -9.0)]
    #[case("sqrt(abs([x]))", -16.0, 4.0)]
    #[case("180*cos(pi*[x])", 1.0, -180.0)]
    fn evaluates_single_parameter(#[case] input: &str, #[case] x: f64, #[case] expected: f64) {
        let expression = Expression::from_str(input).unwrap();
        assert_relative_eq!(
            expression.evaluate_single("x", x).unwrap(),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn unbound_parameter_is_an_error() {
        let expression = Expression::from_str("[a] + [b]").unwrap();
        let values = HashMap::from([("a", 1.0)]);
        assert_eq!(
            expression.evaluate(&values),
            Err(EvaluationError::Unbound("b".to_owned()))
        );
    }

    #[test]
    fn non_finite_result_is_an_error() {
        let expression = Expression::from_str("log([x])").unwrap();
        assert_eq!(
            expression.evaluate_single("x", 0.0),
            Err(EvaluationError::NonFinite)
        );
    }

    #[test]
    fn simplify_folds_constant_subexpressions() {
        let simplified = Expression::from_str("[x] * (2 * pi / pi)")
            .unwrap()
            .into_simplified();
        assert_eq!(simplified.to_string(), "[x]*2");
    }

    #[test]
    fn substitution_replaces_parameters() {
        let expression = Expression::from_str("[x] + [y]").unwrap();
        let substituted = expression.substitute_parameters(&HashMap::from([(
            "y",
            Expression::Number(1.5),
        )]));
        assert_relative_eq!(substituted.evaluate_single("x", 1.0).unwrap(), 2.5);
        assert_eq!(substituted.parameters(), vec!["x".to_owned()]);
    }

    proptest! {
        #[test]
        fn display_round_trips_through_parser(
            a in -1e3f64..1e3,
            b in 1e-3f64..1e3,
            x in -1e3f64..1e3,
        ) {
            let expression = Expression::from_str(&format!("{a} * [x] - [x] / {b}")).unwrap();
            let reparsed = Expression::from_str(&expression.to_string()).unwrap();
            let expected = expression.evaluate_single("x", x).unwrap();
            let actual = reparsed.evaluate_single("x", x).unwrap();
            prop_assert!((expected - actual).abs() <= 1e-9 * expected.abs().max(1.0));
        }
    }
}
