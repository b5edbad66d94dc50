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

use super::lexer::{LexInput, LexResult};

/// The tokens of the angle-expression language.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Identifier(String),
    LParenthesis,
    Number(f64),
    Operator(Operator),
    /// A sweep parameter reference, written `[name]`.
    Parameter(String),
    RParenthesis,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "{name}"),
            Token::LParenthesis => write!(f, "("),
            Token::Number(value) => write!(f, "{value}"),
            Token::Operator(operator) => write!(f, "{operator}"),
            Token::Parameter(name) => write!(f, "[{name}]"),
            Token::RParenthesis => write!(f, ")"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Operator {
    #[strum(serialize = "**")]
    DoubleStar,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "%")]
    Percent,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "/")]
    Slash,
    #[strum(serialize = "*")]
    Star,
}

/// Wrapper for [`Token`] that includes its location within the original input.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenWithLocation<'a> {
    token: Token,
    original_input: LexInput<'a>,
}

impl PartialEq<Token> for TokenWithLocation<'_> {
    fn eq(&self, other: &Token) -> bool {
        &self.token == other
    }
}

impl TokenWithLocation<'_> {
    /// Returns a reference to the contained token.
    pub fn as_token(&self) -> &Token {
        &self.token
    }

    /// The column this token starts at.
    pub fn column(&self) -> usize {
        self.original_input.get_utf8_column()
    }

    /// The remainder of the input, starting with this token.
    pub(crate) fn snippet(&self) -> &str {
        self.original_input.fragment()
    }
}

/// Wraps a parser that returns a [`Token`] and combines it with location information.
pub(crate) fn token_with_location<'i, P>(
    mut parser: P,
) -> impl FnMut(LexInput<'i>) -> LexResult<'i, TokenWithLocation<'i>>
where
    P: nom::Parser<LexInput<'i>, Token, super::error::InternalError<LexInput<'i>>>,
{
    move |input| {
        parser.parse(input).map(|(leftover, token)| {
            (
                leftover,
                TokenWithLocation {
                    token,
                    original_input: input,
                },
            )
        })
    }
}
