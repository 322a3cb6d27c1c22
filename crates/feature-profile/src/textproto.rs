//! Minimal protobuf text-format reader.
//!
//! Supports what feature profiles use: scalar fields (`name: "bgp"`,
//! `version: 1`), nested messages with or without a colon (`id { ... }`),
//! repeated fields, and `#` comments. Enum values and bare identifiers are
//! returned as unquoted scalars.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1},
    character::complete::{char, multispace1, not_line_ending, one_of},
    combinator::{map, opt, recognize, value},
    error::{ErrorKind, ParseError},
    multi::{fold_many0, many0, many0_count, many1},
    sequence::{pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

use crate::error::{ProfileError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum TextError {
    #[error("unexpected input ({0:?})")]
    Nom(ErrorKind),

    #[error("unterminated string")]
    UnterminatedString,

    #[error("unsupported escape sequence")]
    InvalidEscape,

    #[error("missing closing brace")]
    MissingClosingBrace,

    #[error("expected field name")]
    ExpectedFieldName,

    #[error("expected value for field {0}")]
    ExpectedValue(String),
}

/// A [`TextError`] with the remaining input where it was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocatedTextError<'a> {
    input: &'a str,
    error: TextError,
}

impl<'a> ParseError<&'a str> for LocatedTextError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self {
            input,
            error: TextError::Nom(kind),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type TextResult<'a, O> = IResult<&'a str, O, LocatedTextError<'a>>;

fn failure(input: &str, error: TextError) -> nom::Err<LocatedTextError<'_>> {
    nom::Err::Failure(LocatedTextError { input, error })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '+')
}

/// Whitespace and `#` comments.
fn blank(input: &str) -> TextResult<'_, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            recognize(pair(char('#'), not_line_ending)),
        ))),
    )(input)
}

fn ident(input: &str) -> TextResult<'_, &str> {
    take_while1(is_ident_char)(input)
}

fn escape(input: &str) -> TextResult<'_, &str> {
    preceded(
        char('\\'),
        alt((
            value("\n", char('n')),
            value("\t", char('t')),
            value("\\", char('\\')),
            value("\"", char('"')),
            value("'", char('\'')),
        )),
    )(input)
}

/// A string literal in `quote`s. Once the opening quote matches, any error
/// is final.
fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> TextResult<'a, String> {
    let stop = if quote == '"' { "\\\"\n" } else { "\\'\n" };
    move |input| {
        let (rest, _) = char(quote)(input)?;
        let (rest, text) = fold_many0(
            alt((is_not(stop), escape)),
            String::new,
            |mut acc: String, part| {
                acc.push_str(part);
                acc
            },
        )(rest)?;
        match char::<_, LocatedTextError<'a>>(quote)(rest) {
            Ok((rest, _)) => Ok((rest, text)),
            Err(_) if rest.starts_with('\\') => Err(failure(rest, TextError::InvalidEscape)),
            Err(_) => Err(failure(rest, TextError::UnterminatedString)),
        }
    }
}

fn string_literal(input: &str) -> TextResult<'_, String> {
    alt((quoted('"'), quoted('\'')))(input)
}

/// A scalar value. Adjacent string literals concatenate.
fn scalar(input: &str) -> TextResult<'_, Value> {
    alt((
        map(many1(terminated(string_literal, blank)), |parts: Vec<String>| {
            Value::Scalar {
                text: parts.concat(),
                quoted: true,
            }
        }),
        map(terminated(ident, blank), |text: &str| Value::Scalar {
            text: text.to_string(),
            quoted: false,
        }),
    ))(input)
}

/// A field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A scalar; `quoted` is false for numbers, booleans and enum names.
    Scalar { text: String, quoted: bool },
    Message(Message),
}

/// One `name: value` or `name { ... }` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: Value,
    pub line: usize,
}

/// A parsed message: its fields in file order. Repeated fields appear once
/// per occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub fields: Vec<Field>,
}

impl Message {
    /// Parses a whole document.
    pub fn parse(input: &str) -> Result<Message> {
        let parser = TextParser { src: input };
        match parser.document(input) {
            Ok((_, message)) => Ok(message),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ProfileError::Parse {
                line: parser.line_at(e.input),
                message: e.error.to_string(),
            }),
            Err(nom::Err::Incomplete(_)) => Err(ProfileError::Parse {
                line: parser.line_at(""),
                message: "incomplete input".to_string(),
            }),
        }
    }
}

struct TextParser<'a> {
    src: &'a str,
}

impl<'a> TextParser<'a> {
    /// 1-based line of `at`, which must be a suffix of the source.
    fn line_at(&self, at: &str) -> usize {
        let offset = self.src.len().saturating_sub(at.len());
        self.src[..offset].matches('\n').count() + 1
    }

    fn document(&self, input: &'a str) -> TextResult<'a, Message> {
        let (rest, _) = blank(input)?;
        let (rest, fields) = many0(|i| self.field(i))(rest)?;
        if !rest.is_empty() {
            return Err(failure(rest, TextError::ExpectedFieldName));
        }
        Ok((rest, Message { fields }))
    }

    /// `{ fields }`, or the `< fields >` spelling.
    fn block(&self, input: &'a str) -> TextResult<'a, Message> {
        let (rest, _) = terminated(one_of("{<"), blank)(input)?;
        let (rest, fields) = many0(|i| self.field(i))(rest)?;
        match terminated(one_of::<_, _, LocatedTextError<'a>>("}>"), blank)(rest) {
            Ok((rest, _)) => Ok((rest, Message { fields })),
            Err(_) if rest.is_empty() => Err(failure(rest, TextError::MissingClosingBrace)),
            Err(_) => Err(failure(rest, TextError::ExpectedFieldName)),
        }
    }

    fn field(&self, input: &'a str) -> TextResult<'a, Field> {
        let line = self.line_at(input);
        let (rest, name) = terminated(ident, blank)(input)?;
        let (rest, colon) = opt(terminated(char(':'), blank))(rest)?;
        let parsed = match colon {
            Some(_) => alt((map(|i| self.block(i), Value::Message), scalar))(rest),
            None => map(|i| self.block(i), Value::Message)(rest),
        };
        let (rest, value) = parsed.map_err(|e| match e {
            nom::Err::Error(e) => failure(e.input, TextError::ExpectedValue(name.to_string())),
            other => other,
        })?;
        Ok((
            rest,
            Field {
                name: name.to_string(),
                value,
                line,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested_and_repeated() {
        let msg = Message::parse(
            r#"
            # comment
            id { name: "bgp" version: 1 }
            config_path { path: "/a/b" }
            config_path: { path: '/a/c' }
            "#,
        )
        .unwrap();

        assert_eq!(msg.fields.len(), 3);
        assert_eq!(msg.fields[0].name, "id");
        assert_eq!(msg.fields[2].line, 5);
        match &msg.fields[0].value {
            Value::Message(id) => {
                assert_eq!(
                    id.fields[1].value,
                    Value::Scalar {
                        text: "1".to_string(),
                        quoted: false
                    }
                );
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes_and_concatenation() {
        let msg = Message::parse(r#"path: "/a/" "b\"c""#).unwrap();
        assert_eq!(
            msg.fields[0].value,
            Value::Scalar {
                text: "/a/b\"c".to_string(),
                quoted: true
            }
        );
    }

    #[test]
    fn test_errors_carry_line() {
        let err = Message::parse("id {\n name: \"bgp\"\n").unwrap_err();
        assert!(err.to_string().contains("missing closing brace"));

        match Message::parse("a: 1\nb: \"open\n").unwrap_err() {
            ProfileError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {}", other),
        }

        let err = Message::parse("name \"x\"").unwrap_err();
        assert!(err.to_string().contains("expected value for field name"));
        let err = Message::parse("}").unwrap_err();
        assert!(err.to_string().contains("expected field name"));
        let err = Message::parse("id { \"x\" }").unwrap_err();
        assert!(err.to_string().contains("expected field name"));
    }

    #[test]
    fn test_empty_string_and_bad_escape() {
        let msg = Message::parse("a: \"\" b: ''").unwrap();
        assert_eq!(msg.fields.len(), 2);
        assert_eq!(
            msg.fields[1].value,
            Value::Scalar {
                text: String::new(),
                quoted: true
            }
        );

        let err = Message::parse("a: \"x\\q\"").unwrap_err();
        assert!(err.to_string().contains("unsupported escape"), "{}", err);
    }

    #[test]
    fn test_angle_brackets_and_trailing_comment() {
        let msg = Message::parse("id < name: \"bgp\" > # done").unwrap();
        match &msg.fields[0].value {
            Value::Message(id) => assert_eq!(id.fields[0].name, "name"),
            other => panic!("unexpected value {:?}", other),
        }
    }
}
