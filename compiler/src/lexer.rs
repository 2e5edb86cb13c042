// lexer.rs — Tokenizer for calculator formulas
//
// Scans left to right. At each position a numeric literal is tried first,
// then the fixed token table in priority order. The table order is part of
// the grammar: the first entry whose text matches at the current position
// wins.
//
// Preconditions: whitespace has already been stripped by the caller.
// Postconditions: returns the complete token sequence.
// Failure modes: any position matching neither a literal nor a table entry
//   fails the whole lex with `LexError` (no position is reported).
// Side effects: none.

use std::fmt;

use crate::ast::{NamedConstant, UnaryOp, Variable};

/// A formula token. Function tokens include their opening bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Literal(f32),
    LeftBracket,
    RightBracket,
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
    Function(UnaryOp),
    Constant(NamedConstant),
    Variable(Variable),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(v) => write!(f, "literal {v}"),
            Token::LeftBracket => write!(f, "'('"),
            Token::RightBracket => write!(f, "')'"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Multiply => write!(f, "'*'"),
            Token::Divide => write!(f, "'/'"),
            Token::Power => write!(f, "'^'"),
            Token::Function(op) => write!(f, "'{}('", op.name()),
            Token::Constant(c) => write!(f, "'{}'", c.name()),
            Token::Variable(v) => write!(f, "'{}'", v.name()),
        }
    }
}

/// The formula contained text that is not a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError;

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized input")
    }
}

// ── Token table (priority order) ───────────────────────────────────────────

const TOKEN_TABLE: &[(&str, Token)] = &[
    ("(", Token::LeftBracket),
    (")", Token::RightBracket),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Multiply),
    ("/", Token::Divide),
    ("^", Token::Power),
    ("sqrt(", Token::Function(UnaryOp::Sqrt)),
    ("floor(", Token::Function(UnaryOp::Floor)),
    ("ceil(", Token::Function(UnaryOp::Ceil)),
    ("round(", Token::Function(UnaryOp::Round)),
    ("cos(", Token::Function(UnaryOp::Cos)),
    ("acos(", Token::Function(UnaryOp::Acos)),
    ("sin(", Token::Function(UnaryOp::Sin)),
    ("asin(", Token::Function(UnaryOp::Asin)),
    ("tan(", Token::Function(UnaryOp::Tan)),
    ("atan(", Token::Function(UnaryOp::Atan)),
    ("abs(", Token::Function(UnaryOp::Abs)),
    ("log(", Token::Function(UnaryOp::Log)),
    ("e", Token::Constant(NamedConstant::E)),
    ("pi", Token::Constant(NamedConstant::Pi)),
    ("phi", Token::Constant(NamedConstant::Phi)),
    ("tau", Token::Constant(NamedConstant::Tau)),
    ("x", Token::Variable(Variable::X)),
    ("y", Token::Variable(Variable::Y)),
    ("z", Token::Variable(Variable::Z)),
    ("w", Token::Variable(Variable::W)),
];

// ── Public entry point ─────────────────────────────────────────────────────

pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while !rest.is_empty() {
        let (token, len) = match scan_literal(rest) {
            Some(found) => found,
            None => scan_table(rest).ok_or(LexError)?,
        };
        tokens.push(token);
        rest = &rest[len..];
    }
    Ok(tokens)
}

/// Matches `([0-9]*[.])?[0-9]+` anchored at the start of `text`.
fn scan_literal(text: &str) -> Option<(Token, usize)> {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let whole = digits_from(0);
    let mut len = whole;
    if bytes.get(whole) == Some(&b'.') {
        let fraction = digits_from(whole + 1);
        if fraction > 0 {
            len = whole + 1 + fraction;
        }
    }
    if len == 0 {
        return None;
    }
    let value = text[..len].parse::<f32>().ok()?;
    Some((Token::Literal(value), len))
}

fn scan_table(text: &str) -> Option<(Token, usize)> {
    TOKEN_TABLE
        .iter()
        .find(|(pattern, _)| text.starts_with(pattern))
        .map(|(pattern, token)| (*token, pattern.len()))
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        match lex(source) {
            Ok(tokens) => tokens,
            Err(e) => panic!("lex failed for {source:?}: {e}"),
        }
    }

    #[test]
    fn nested_function_call() {
        assert_eq!(
            lex_ok("sin(3^(1.0+2))"),
            vec![
                Token::Function(UnaryOp::Sin),
                Token::Literal(3.0),
                Token::Power,
                Token::LeftBracket,
                Token::Literal(1.0),
                Token::Plus,
                Token::Literal(2.0),
                Token::RightBracket,
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn variables_and_operators() {
        assert_eq!(
            lex_ok("x+y+z"),
            vec![
                Token::Variable(Variable::X),
                Token::Plus,
                Token::Variable(Variable::Y),
                Token::Plus,
                Token::Variable(Variable::Z),
            ]
        );
    }

    #[test]
    fn literal_forms() {
        assert_eq!(lex_ok(".5"), vec![Token::Literal(0.5)]);
        assert_eq!(lex_ok("42"), vec![Token::Literal(42.0)]);
        assert_eq!(lex_ok("1.2.3"), vec![Token::Literal(1.2), Token::Literal(0.3)]);
    }

    #[test]
    fn trailing_dot_is_not_part_of_literal() {
        // "3." matches the literal "3", then "." matches nothing.
        assert_eq!(lex("3."), Err(LexError));
    }

    #[test]
    fn constants_in_table_order() {
        assert_eq!(
            lex_ok("pi*phi-tau/e"),
            vec![
                Token::Constant(NamedConstant::Pi),
                Token::Multiply,
                Token::Constant(NamedConstant::Phi),
                Token::Minus,
                Token::Constant(NamedConstant::Tau),
                Token::Divide,
                Token::Constant(NamedConstant::E),
            ]
        );
    }

    #[test]
    fn every_function_keyword() {
        let names = [
            ("sqrt(", UnaryOp::Sqrt),
            ("floor(", UnaryOp::Floor),
            ("ceil(", UnaryOp::Ceil),
            ("round(", UnaryOp::Round),
            ("cos(", UnaryOp::Cos),
            ("acos(", UnaryOp::Acos),
            ("sin(", UnaryOp::Sin),
            ("asin(", UnaryOp::Asin),
            ("tan(", UnaryOp::Tan),
            ("atan(", UnaryOp::Atan),
            ("abs(", UnaryOp::Abs),
            ("log(", UnaryOp::Log),
        ];
        for (text, op) in names {
            assert_eq!(lex_ok(text), vec![Token::Function(op)], "{text}");
        }
    }

    #[test]
    fn function_name_without_bracket_fails() {
        assert_eq!(lex("sin"), Err(LexError));
        assert_eq!(lex("sqrt x"), Err(LexError));
    }

    #[test]
    fn whitespace_is_rejected() {
        assert_eq!(lex("x + y"), Err(LexError));
    }

    #[test]
    fn unknown_characters_fail() {
        assert_eq!(lex("x%y"), Err(LexError));
        assert_eq!(lex("q"), Err(LexError));
    }

    #[test]
    fn empty_input_is_empty_stream() {
        assert_eq!(lex_ok(""), vec![]);
    }
}
