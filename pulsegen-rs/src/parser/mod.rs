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

//! Parsers for operation codes and for the angle expressions they may contain.

use nom::IResult;
use nom_locate::LocatedSpan;

use crate::expression::Expression;

pub use error::{ParseError, ParseErrorKind};
pub use op_code::{Angle, GateFamily, OpCode};
pub use token::{Operator, Token};

use error::InternalError;
use token::TokenWithLocation;

pub(crate) mod error;
mod expression;
pub(crate) mod lexer;
mod macros;
mod op_code;
pub(crate) mod token;

pub(crate) type ParserInput<'a> = &'a [TokenWithLocation<'a>];
pub(crate) type InternalParserResult<'a, R> =
    IResult<ParserInput<'a>, R, InternalError<ParserInput<'a>>>;

pub(crate) fn split_first_token<'a>(
    input: ParserInput<'a>,
) -> Option<(&'a Token, ParserInput<'a>)> {
    input
        .split_first()
        .map(|(first, rest)| (first.as_token(), rest))
}

pub(crate) fn first_token<'a>(input: ParserInput<'a>) -> Option<&'a Token> {
    input.first().map(TokenWithLocation::as_token)
}

/// Lex and parse a complete angle expression, rejecting trailing tokens.
pub(crate) fn parse_expression_str(input: &str) -> Result<Expression, ParseError> {
    let tokens = lexer::lex(LocatedSpan::new(input))?;
    let (remainder, expression) = expression::parse_expression(&tokens)?;
    match remainder.first() {
        None => Ok(expression),
        Some(token) => Err(ParseError::new(
            Some(token.column()),
            token.snippet(),
            ParseErrorKind::LeftoverInput,
        )),
    }
}
