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

use super::lexer::LexInput;
use super::token::Token;
use super::ParserInput;

/// An error raised while parsing an operation code or an angle expression.
///
/// The error carries the column at which parsing failed (or `None` when the input ended
/// prematurely) and the remaining input from that position.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{} ({snippet:?}): {kind}", describe_location(.column))]
pub struct ParseError {
    column: Option<usize>,
    snippet: String,
    kind: ParseErrorKind,
}

fn describe_location(column: &Option<usize>) -> String {
    match column {
        Some(column) => format!("at column {column}"),
        None => "at end of input".to_owned(),
    }
}

impl ParseError {
    pub(crate) fn new(column: Option<usize>, snippet: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            column,
            snippet: snippet.into(),
            kind,
        }
    }

    /// Build an error which applies to a whole input string rather than a position within it.
    pub(crate) fn for_input(input: &str, kind: ParseErrorKind) -> Self {
        Self::new(Some(1), input, kind)
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

/// Kinds of errors that may occur while parsing.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    /// Reached end of input, but expected something else.
    #[error("expected {0}, found end of input")]
    UnexpectedEof(&'static str),

    /// Got an unexpected token and expected something else.
    #[error("expected {expected}, found {actual}")]
    ExpectedToken { actual: Token, expected: String },

    /// A character which does not start any token.
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),

    /// An identifier which is neither a known function nor a known constant.
    #[error("unknown function or constant `{0}`")]
    UnknownIdentifier(String),

    /// Tokens remained after a complete expression was parsed.
    #[error("unexpected trailing input")]
    LeftoverInput,

    /// Parametric angles are unary functions, so they may only reference one parameter.
    #[error("an angle expression may reference a single parameter, found {0:?}")]
    MultipleParameters(Vec<String>),

    /// The operation code had no operation name.
    #[error("empty operation code")]
    EmptyOpCode,

    /// The text following the operation type is not a number.
    #[error("`{0}` is not a valid rotation angle")]
    InvalidAngle(String),

    /// A `:` was not followed by a parameter name or expression.
    #[error("expected a parameter name or expression after `:`")]
    EmptyParameter,

    /// A failure inside one of the underlying nom combinators.
    #[error("{0}")]
    Internal(String),
}

/// The error type threaded through the nom parsers of this module.
#[derive(Debug)]
pub(crate) struct InternalError<I> {
    pub(crate) input: I,
    pub(crate) kind: ParseErrorKind,
}

impl<I> InternalError<I> {
    pub(crate) fn from_kind(input: I, kind: ParseErrorKind) -> Self {
        Self { input, kind }
    }
}

impl<I> nom::error::ParseError<I> for InternalError<I> {
    fn from_error_kind(input: I, kind: nom::error::ErrorKind) -> Self {
        Self::from_kind(input, ParseErrorKind::Internal(kind.description().to_owned()))
    }

    fn append(_: I, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

/// Anything which can report where in the original input an error occurred.
pub(crate) trait ErrorInput {
    fn column(&self) -> Option<usize>;
    fn snippet(&self) -> String;
}

impl ErrorInput for LexInput<'_> {
    fn column(&self) -> Option<usize> {
        Some(self.get_utf8_column())
    }

    fn snippet(&self) -> String {
        self.fragment().to_string()
    }
}

impl ErrorInput for ParserInput<'_> {
    fn column(&self) -> Option<usize> {
        self.first().map(|token| token.column())
    }

    fn snippet(&self) -> String {
        self.first()
            .map(|token| token.snippet().to_owned())
            .unwrap_or_default()
    }
}

impl<I: ErrorInput> From<InternalError<I>> for ParseError {
    fn from(error: InternalError<I>) -> Self {
        Self::new(error.input.column(), error.input.snippet(), error.kind)
    }
}

impl<I: ErrorInput> From<nom::Err<InternalError<I>>> for ParseError {
    fn from(error: nom::Err<InternalError<I>>) -> Self {
        match error {
            nom::Err::Error(error) | nom::Err::Failure(error) => error.into(),
            nom::Err::Incomplete(_) => Self::new(
                None,
                String::new(),
                ParseErrorKind::UnexpectedEof("more input"),
            ),
        }
    }
}
