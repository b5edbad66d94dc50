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

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{alpha1, char, multispace0, satisfy},
    combinator::{map, recognize, value},
    number::complete::double,
    sequence::{delimited, pair},
    Finish, IResult,
};
use nom_locate::LocatedSpan;

use super::error::{InternalError, ParseError, ParseErrorKind};
use super::token::{token_with_location, Operator, Token, TokenWithLocation};

pub(crate) type LexInput<'a> = LocatedSpan<&'a str>;
pub(crate) type LexResult<'a, T = Token> = IResult<LexInput<'a>, T, InternalError<LexInput<'a>>>;

/// Break an angle expression into tokens, skipping whitespace between them.
pub(crate) fn lex(input: LexInput) -> Result<Vec<TokenWithLocation>, ParseError> {
    _lex(input)
        .finish()
        .map(|(_, tokens)| tokens)
        .map_err(ParseError::from)
}

fn _lex(mut input: LexInput) -> LexResult<Vec<TokenWithLocation>> {
    let mut tokens = Vec::new();
    loop {
        let (remainder, _) = multispace0(input)?;
        input = remainder;
        if input.fragment().is_empty() {
            return Ok((input, tokens));
        }
        match lex_token(input) {
            Ok((remainder, token)) => {
                tokens.push(token);
                input = remainder;
            }
            Err(nom::Err::Error(_)) => {
                let unexpected = input.fragment().chars().next().unwrap_or_default();
                return Err(nom::Err::Failure(InternalError::from_kind(
                    input,
                    ParseErrorKind::UnexpectedCharacter(unexpected),
                )));
            }
            Err(error) => return Err(error),
        }
    }
}

fn lex_token(input: LexInput) -> LexResult<TokenWithLocation> {
    alt((
        token_with_location(lex_punctuation),
        token_with_location(lex_operator),
        token_with_location(lex_parameter),
        // Identifiers come before numbers so that `inf` and `nan` are never read as floats.
        token_with_location(lex_identifier),
        token_with_location(lex_number),
    ))(input)
}

fn lex_punctuation(input: LexInput) -> LexResult {
    alt((
        value(Token::LParenthesis, char('(')),
        value(Token::RParenthesis, char(')')),
    ))(input)
}

fn lex_operator(input: LexInput) -> LexResult {
    use Operator::*;
    map(
        alt((
            value(DoubleStar, tag("**")),
            value(Star, tag("*")),
            value(Plus, tag("+")),
            value(Minus, tag("-")),
            value(Slash, tag("/")),
            value(Percent, tag("%")),
        )),
        Token::Operator,
    )(input)
}

fn lex_parameter(input: LexInput) -> LexResult {
    map(delimited(char('['), is_not("]"), char(']')), |name: LexInput| {
        Token::Parameter(name.fragment().trim().to_owned())
    })(input)
}

fn lex_identifier(input: LexInput) -> LexResult {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        |name: LexInput| Token::Identifier(name.fragment().to_string()),
    )(input)
}

fn lex_number(input: LexInput) -> LexResult {
    // `double` accepts a sign, which must remain an operator token.
    let (_, _) = satisfy(|c: char| c.is_ascii_digit() || c == '.')(input)?;
    map(double, Token::Number)(input)
}

#[cfg(test)]
mod tests {
    use nom_locate::LocatedSpan;
    use rstest::rstest;

    use super::lex;
    use crate::parser::token::{Operator, Token};

    fn tokens(input: &str) -> Vec<Token> {
        lex(LocatedSpan::new(input))
            .expect("input should lex")
            .into_iter()
            .map(|token| token.as_token().clone())
            .collect()
    }

    #[test]
    fn lexes_power_as_a_single_operator() {
        assert_eq!(
            tokens("2**[x]"),
            vec![
                Token::Number(2.0),
                Token::Operator(Operator::DoubleStar),
                Token::Parameter("x".to_owned()),
            ]
        );
    }

    #[rstest]
    #[case("inf", Token::Identifier("inf".to_owned()))]
    #[case("1e-3", Token::Number(1e-3))]
    #[case(".5", Token::Number(0.5))]
    #[case("[ cphase ]", Token::Parameter("cphase".to_owned()))]
    fn lexes_single_tokens(#[case] input: &str, #[case] expected: Token) {
        assert_eq!(tokens(input), vec![expected]);
    }

    #[test]
    fn minus_stays_an_operator() {
        assert_eq!(
            tokens("-2"),
            vec![Token::Operator(Operator::Minus), Token::Number(2.0)]
        );
    }

    #[test]
    fn reports_column_of_unexpected_character() {
        let error = lex(LocatedSpan::new("1 + $")).unwrap_err();
        assert_eq!(error.column(), Some(5));
    }
}
