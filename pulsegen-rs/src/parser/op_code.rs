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

//! The grammar of operation codes such as `X180 qb1`, `mY90s qb2`, `Z:theta qb1`,
//! `X:2*[theta] qb1` or `CZ_nztc45 qb1 qb2`.
//!
//! ```text
//! op_code   := op_name (' '+ operand)*
//! op_name   := ['s'] ['m'] gate [angle] ['s']
//! gate      := the name, up to the maximal trailing run of angle characters
//! angle     := number | ':' parameter | ':' expression
//! ```

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{all_consuming, opt, rest},
    number::complete::double,
    sequence::preceded,
    Finish, IResult,
};

use crate::expression::Expression;

use super::error::{ParseError, ParseErrorKind};

const ANGLE_CHARACTERS: &str = "0123456789.e-";

/// The family a gate name belongs to, which decides how it is translated into pulses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateFamily {
    /// A flux-activated controlled phase gate, named `CZ...`.
    ControlledPhase,
    /// A virtual rotation about Z, implemented as a basis rotation.
    VirtualZ,
    /// A resonant drive about an axis, named `X...`, `Y...` or `Z...`.
    Drive,
    Unsupported,
}

/// The rotation angle of an operation code.
#[derive(Clone, Debug, PartialEq)]
pub enum Angle {
    /// A numeric angle in degrees.
    Value(f64),
    /// A sweep parameter used directly as the angle, as in `Z:theta`.
    Parameter(String),
    /// An expression of exactly one sweep parameter, as in `X:2*[theta]`.
    Expression {
        parameter: String,
        expression: Expression,
    },
}

impl Angle {
    /// The sweep parameter this angle depends on, if any.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Angle::Value(_) => None,
            Angle::Parameter(parameter) | Angle::Expression { parameter, .. } => Some(parameter),
        }
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Angle::Value(value) => write!(f, "{value}"),
            Angle::Parameter(parameter) => write!(f, ":{parameter}"),
            Angle::Expression { expression, .. } => write!(f, ":{expression}"),
        }
    }
}

/// A parsed operation code.
#[derive(Clone, Debug, PartialEq)]
pub struct OpCode {
    /// Set by a leading or trailing `s`: the operation starts together with the previous one.
    pub simultaneous: bool,
    /// Set by a leading `m`: the rotation angle is negated.
    pub negated: bool,
    pub gate: String,
    pub angle: Option<Angle>,
    pub operands: Vec<String>,
}

impl OpCode {
    pub fn family(&self) -> GateFamily {
        if self.gate.starts_with("CZ") {
            GateFamily::ControlledPhase
        } else if self.gate == "Z" {
            GateFamily::VirtualZ
        } else if self.gate.starts_with(['X', 'Y', 'Z']) {
            GateFamily::Drive
        } else {
            GateFamily::Unsupported
        }
    }

    /// `-1.0` for a negated operation, `1.0` otherwise.
    pub fn sign(&self) -> f64 {
        if self.negated {
            -1.0
        } else {
            1.0
        }
    }

    /// The operation name without the simultaneity modifier, e.g. `mY90` for `smY90`.
    pub fn name(&self) -> String {
        let negation = if self.negated { "m" } else { "" };
        match &self.angle {
            Some(angle) => format!("{negation}{}{angle}", self.gate),
            None => format!("{negation}{}", self.gate),
        }
    }

    /// Split the simultaneity modifiers (a leading and/or a trailing `s`) off an operation
    /// name, returning whether any was present.
    pub fn strip_simultaneity(op_name: &str) -> (bool, &str) {
        let mut simultaneous = false;
        let mut name = op_name;
        if let Some(stripped) = name.strip_prefix('s') {
            simultaneous = true;
            name = stripped;
        }
        if let Some(stripped) = name.strip_suffix('s') {
            simultaneous = true;
            name = stripped;
        }
        (simultaneous, name)
    }

    /// The operation code with any simultaneity modifier removed and operands single-spaced.
    pub fn without_simultaneity(op_code: &str) -> String {
        let mut words = op_code.split_whitespace();
        let name = words.next().map(|name| Self::strip_simultaneity(name).1);
        name.into_iter().chain(words).collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.simultaneous {
            write!(f, "s")?;
        }
        write!(f, "{}", self.name())?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

impl FromStr for OpCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let op_name = words
            .next()
            .ok_or_else(|| ParseError::for_input(s, ParseErrorKind::EmptyOpCode))?;
        let operands = words.map(str::to_owned).collect();

        let (simultaneous, op_name) = Self::strip_simultaneity(op_name);
        let (_, (negated, head, parameter)) = parse_op_name(op_name)
            .finish()
            .map_err(|_: nom::error::Error<&str>| {
                ParseError::for_input(s, ParseErrorKind::EmptyOpCode)
            })?;

        let (gate, angle_text) = split_angle(head);
        if gate.is_empty() {
            return Err(ParseError::for_input(s, ParseErrorKind::EmptyOpCode));
        }
        let angle = match (angle_text, parameter) {
            ("", None) => None,
            ("", Some(parameter)) => Some(parse_parametric_angle(parameter)?),
            (number, None) => Some(Angle::Value(parse_angle_value(number).ok_or_else(|| {
                ParseError::for_input(s, ParseErrorKind::InvalidAngle(number.to_owned()))
            })?)),
            (number, Some(parameter)) => {
                return Err(ParseError::for_input(
                    s,
                    ParseErrorKind::InvalidAngle(format!("{number}:{parameter}")),
                ))
            }
        };

        Ok(Self {
            simultaneous,
            negated,
            gate: gate.to_owned(),
            angle,
            operands,
        })
    }
}

/// `['m'] head [':' parameter]`
fn parse_op_name(input: &str) -> IResult<&str, (bool, &str, Option<&str>)> {
    let (input, negation) = opt(char('m'))(input)?;
    let (input, head) = take_while1(|c: char| c != ':')(input)?;
    let (input, parameter) = opt(preceded(char(':'), rest))(input)?;
    Ok((input, (negation.is_some(), head, parameter)))
}

/// Split the maximal trailing run of angle characters off a gate name.
fn split_angle(head: &str) -> (&str, &str) {
    let gate = head.trim_end_matches(|c: char| ANGLE_CHARACTERS.contains(c));
    (gate, &head[gate.len()..])
}

fn parse_angle_value(text: &str) -> Option<f64> {
    all_consuming(double::<_, nom::error::Error<&str>>)(text)
        .finish()
        .ok()
        .map(|(_, value)| value)
}

fn parse_parametric_angle(text: &str) -> Result<Angle, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::for_input(text, ParseErrorKind::EmptyParameter));
    }
    if !text.contains('[') {
        return Ok(Angle::Parameter(text.trim().to_owned()));
    }
    let expression: Expression = text.parse()?;
    let mut parameters = expression.parameters();
    match parameters.len() {
        1 => Ok(Angle::Expression {
            parameter: parameters.remove(0),
            expression,
        }),
        _ => Err(ParseError::for_input(
            text,
            ParseErrorKind::MultipleParameters(parameters),
        )),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Angle, GateFamily, OpCode};
    use crate::parser::ParseErrorKind;

    #[rstest]
    #[case("X180 qb1", false, false, "X", Some(180.0))]
    #[case("mY90 qb2", false, true, "Y", Some(90.0))]
    #[case("sX90 qb1", true, false, "X", Some(90.0))]
    #[case("X90s qb1", true, false, "X", Some(90.0))]
    #[case("smZ45.5 qb1", true, true, "Z", Some(45.5))]
    #[case("Z-90 qb1", false, false, "Z", Some(-90.0))]
    #[case("CZ qb1 qb2", false, false, "CZ", None)]
    #[case("CZ_nztc30 qb1 qb2", false, false, "CZ_nztc", Some(30.0))]
    #[case("Y qb1", false, false, "Y", None)]
    #[case("sX90s qb1", true, false, "X", Some(90.0))]
    fn parses_numeric_op_codes(
        #[case] input: &str,
        #[case] simultaneous: bool,
        #[case] negated: bool,
        #[case] gate: &str,
        #[case] angle: Option<f64>,
    ) {
        let op: OpCode = input.parse().unwrap();
        assert_eq!(op.simultaneous, simultaneous);
        assert_eq!(op.negated, negated);
        assert_eq!(op.gate, gate);
        assert_eq!(op.angle, angle.map(Angle::Value));
    }

    #[test]
    fn parses_bare_parameter() {
        let op: OpCode = "Z:theta qb1".parse().unwrap();
        assert_eq!(op.angle, Some(Angle::Parameter("theta".to_owned())));
        assert_eq!(op.operands, vec!["qb1".to_owned()]);
        assert_eq!(op.family(), GateFamily::VirtualZ);
    }

    #[test]
    fn parses_expression_of_one_parameter() {
        let op: OpCode = "mX:2*[theta]+10 qb1".parse().unwrap();
        assert!(op.negated);
        match op.angle {
            Some(Angle::Expression { parameter, .. }) => assert_eq!(parameter, "theta"),
            other => panic!("expected an expression angle, got {other:?}"),
        }
    }

    #[test]
    fn rejects_expression_of_two_parameters() {
        let error = "X:[a]+[b] qb1".parse::<OpCode>().unwrap_err();
        assert!(matches!(
            error.kind(),
            ParseErrorKind::MultipleParameters(parameters) if parameters.len() == 2
        ));
    }

    #[rstest]
    #[case("")]
    #[case("X9-0 qb1")]
    #[case("X90:theta qb1")]
    #[case("Z: qb1")]
    fn rejects_malformed_op_codes(#[case] input: &str) {
        assert!(input.parse::<OpCode>().is_err());
    }

    #[rstest]
    #[case("X180 qb1", GateFamily::Drive)]
    #[case("X180_ef qb1", GateFamily::Drive)]
    #[case("Z180 qb1", GateFamily::VirtualZ)]
    #[case("Z_flux qb1", GateFamily::Drive)]
    #[case("CZ qb1 qb2", GateFamily::ControlledPhase)]
    #[case("H qb1", GateFamily::Unsupported)]
    fn classifies_gate_families(#[case] input: &str, #[case] family: GateFamily) {
        assert_eq!(input.parse::<OpCode>().unwrap().family(), family);
    }

    #[test]
    fn strips_simultaneity_for_provenance() {
        assert_eq!(OpCode::without_simultaneity("sX90 qb1"), "X90 qb1");
        assert_eq!(OpCode::without_simultaneity("mY90s  qb2"), "mY90 qb2");
        assert_eq!(OpCode::without_simultaneity("X180 qb1"), "X180 qb1");
    }
}
