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

use nom::combinator::opt;

use crate::expression::{
    Expression, ExpressionFunction, FunctionCallExpression, InfixExpression, InfixOperator,
    PrefixExpression, PrefixOperator,
};
use crate::{expected_token, token, unexpected_eof};

use super::error::{InternalError, ParseErrorKind};
use super::token::{Operator, Token};
use super::{InternalParserResult, ParserInput};

#[derive(Debug, PartialEq, PartialOrd)]
enum Precedence {
    Lowest,
    Sum,
    Product,
    Prefix,
    Exponentiation,
}

impl From<&Operator> for Precedence {
    fn from(operator: &Operator) -> Self {
        match operator {
            Operator::Plus | Operator::Minus => Precedence::Sum,
            Operator::Star | Operator::Slash | Operator::Percent => Precedence::Product,
            Operator::DoubleStar => Precedence::Exponentiation,
        }
    }
}

fn get_precedence(input: ParserInput) -> Precedence {
    match super::first_token(input) {
        Some(Token::Operator(operator)) => Precedence::from(operator),
        _ => Precedence::Lowest,
    }
}

/// Parse an expression at the head of the current input, for as long as the expression continues.
/// Return an error only if the first token(s) do not form an expression.
pub(crate) fn parse_expression(input: ParserInput) -> InternalParserResult<Expression> {
    parse(input, Precedence::Lowest)
}

/// Recursively parse an expression as long as operator precedence is satisfied.
///
/// A prefix operator binds more loosely than `**`, so `-x**2` is `-(x**2)`.
fn parse(input: ParserInput, precedence: Precedence) -> InternalParserResult<Expression> {
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (mut input, mut left) = match prefix {
        Some(operator) => {
            let (remainder, operand) = parse(input, Precedence::Prefix)?;
            (
                remainder,
                Expression::Prefix(PrefixExpression {
                    operator,
                    expression: Box::new(operand),
                }),
            )
        }
        None => parse_primary(input)?,
    };

    while get_precedence(input) > precedence {
        let (remainder, expression) = parse_infix(input, left)?;
        left = expression;
        input = remainder;
    }

    Ok((input, left))
}

fn parse_primary(input: ParserInput) -> InternalParserResult<Expression> {
    match super::split_first_token(input) {
        None => unexpected_eof!(input, "expression"),
        Some((Token::Number(value), remainder)) => Ok((remainder, Expression::Number(*value))),
        Some((Token::Parameter(name), remainder)) => {
            Ok((remainder, Expression::Parameter(name.clone())))
        }
        Some((Token::Identifier(_), _)) => parse_expression_identifier(input),
        Some((Token::LParenthesis, remainder)) => parse_grouped_expression(remainder),
        Some((token, _)) => expected_token!(input, token, "expression".to_owned()),
    }
}

/// Given an expression function, parse the expression within its parentheses.
fn parse_function_call<'a>(
    input: ParserInput<'a>,
    function: ExpressionFunction,
) -> InternalParserResult<'a, Expression> {
    let (input, _) = token!(LParenthesis)(input)?;
    let (input, expression) = parse(input, Precedence::Lowest)?;
    let (input, _) = token!(RParenthesis)(input)?;
    Ok((
        input,
        Expression::FunctionCall(FunctionCallExpression {
            function,
            expression: Box::new(expression),
        }),
    ))
}

/// Identifiers name either a function or the constant `pi`. Sweep parameters are always
/// bracketed, so any other bare name is an error.
fn parse_expression_identifier(input: ParserInput) -> InternalParserResult<Expression> {
    match super::split_first_token(input) {
        None => unexpected_eof!(input, "identifier"),
        Some((Token::Identifier(ident), remainder)) => match ident.as_str() {
            "pi" => Ok((remainder, Expression::PiConstant)),
            name => match name.parse::<ExpressionFunction>() {
                Ok(function) => parse_function_call(remainder, function),
                Err(_) => Err(nom::Err::Failure(InternalError::from_kind(
                    input,
                    ParseErrorKind::UnknownIdentifier(name.to_owned()),
                ))),
            },
        },
        Some((other_token, _)) => expected_token!(input, other_token, "identifier".to_owned()),
    }
}

/// To be called following an opening parenthesis, this will parse the expression to its end
/// and then expect a closing right parenthesis.
fn parse_grouped_expression(input: ParserInput) -> InternalParserResult<Expression> {
    let (input, expression) = parse(input, Precedence::Lowest)?;
    match super::split_first_token(input) {
        None => unexpected_eof!(input, "right parenthesis"),
        Some((Token::RParenthesis, remainder)) => Ok((remainder, expression)),
        Some((other_token, _)) => {
            expected_token!(input, other_token, "right parenthesis".to_owned())
        }
    }
}

/// Parse an infix operator and then the expression to the right of the operator, and return the
/// resulting infixed expression.
fn parse_infix(input: ParserInput, left: Expression) -> InternalParserResult<Expression> {
    match super::split_first_token(input) {
        None => unexpected_eof!(input, "infix operator"),
        Some((Token::Operator(token_operator), remainder)) => {
            let (operator, precedence) = match token_operator {
                Operator::Plus => (InfixOperator::Plus, Precedence::Sum),
                Operator::Minus => (InfixOperator::Minus, Precedence::Sum),
                Operator::Star => (InfixOperator::Star, Precedence::Product),
                Operator::Slash => (InfixOperator::Slash, Precedence::Product),
                Operator::Percent => (InfixOperator::Percent, Precedence::Product),
                // Right-associative: the right operand may itself contain `**`.
                Operator::DoubleStar => (InfixOperator::Power, Precedence::Prefix),
            };
            let (remainder, right) = parse(remainder, precedence)?;
            Ok((
                remainder,
                Expression::Infix(InfixExpression {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                }),
            ))
        }
        Some((other_token, _)) => expected_token!(input, other_token, "infix operator".to_owned()),
    }
}

/// Return the prefix operator at the beginning of the input, if any.
fn parse_prefix(input: ParserInput) -> InternalParserResult<PrefixOperator> {
    match super::split_first_token(input) {
        None => unexpected_eof!(input, "prefix operator"),
        Some((Token::Operator(Operator::Minus), remainder)) => {
            Ok((remainder, PrefixOperator::Minus))
        }
        Some((Token::Operator(Operator::Plus), remainder)) => {
            Ok((remainder, PrefixOperator::Plus))
        }
        Some((other_token, _)) => expected_token!(input, other_token, "prefix operator".to_owned()),
    }
}
