// parser.rs — Precedence-climbing parser for calculator formulas
//
// Consumes the lexer's token stream and builds a `MathExpr`.
//
// Binding powers (left, right):
//   + -   (1, 2)
//   * /   (3, 4)
//   ^     (5, 6)
//   prefix + -  7
// The loop continues while the next operator's left power is at least the
// caller's minimum, then recurses with the right power. All infix operators
// are therefore left-associative.
//
// Preconditions: none.
// Postconditions: on success the whole token stream was consumed.
// Failure modes: lex failure, empty input, unexpected token in prefix
//   position, missing `)`, trailing tokens after a complete expression.
// Side effects: none.

use crate::ast::{BinaryOp, MathExpr, UnaryOp};
use crate::lexer::{lex, LexError, Token};

const PREFIX_BP: u8 = 7;

/// Why a formula was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    #[error("unrecognized input")]
    Lex,

    #[error("formula ended where an operand was expected")]
    UnexpectedEnd,

    #[error("unexpected {found} at token {position}")]
    UnexpectedToken { found: Token, position: usize },

    #[error("missing ')' at token {position}")]
    MissingClosingBracket { position: usize },
}

impl From<LexError> for MathError {
    fn from(_: LexError) -> Self {
        MathError::Lex
    }
}

// ── Public entry points ────────────────────────────────────────────────────

/// Lex and parse a formula string.
pub fn parse_formula(source: &str) -> Result<MathExpr, MathError> {
    let tokens = lex(source)?;
    parse_tokens(&tokens)
}

/// Parse a complete token stream.
pub fn parse_tokens(tokens: &[Token]) -> Result<MathExpr, MathError> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(found) => Err(MathError::UnexpectedToken {
            found,
            position: parser.pos,
        }),
    }
}

// ── Parser state ───────────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self, min_bp: u8) -> Result<MathExpr, MathError> {
        let mut lhs = self.prefix()?;

        while let Some(token) = self.peek() {
            let Some((op, left_bp, right_bp)) = infix_binding(token) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(right_bp)?;
            lhs = MathExpr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<MathExpr, MathError> {
        let position = self.pos;
        let token = self.next().ok_or(MathError::UnexpectedEnd)?;
        match token {
            Token::Literal(v) => Ok(MathExpr::Literal(v)),
            Token::Variable(v) => Ok(MathExpr::Variable(v)),
            Token::Constant(c) => Ok(MathExpr::Constant(c)),
            Token::LeftBracket => self.bracketed(),
            Token::Function(op) => Ok(MathExpr::unary(op, self.bracketed()?)),
            Token::Plus => Ok(MathExpr::unary(UnaryOp::Plus, self.expression(PREFIX_BP)?)),
            Token::Minus => Ok(MathExpr::unary(UnaryOp::Minus, self.expression(PREFIX_BP)?)),
            found @ (Token::RightBracket | Token::Multiply | Token::Divide | Token::Power) => {
                Err(MathError::UnexpectedToken { found, position })
            }
        }
    }

    /// The remainder of a bracketed group; the opening bracket is consumed.
    fn bracketed(&mut self) -> Result<MathExpr, MathError> {
        let inner = self.expression(0)?;
        match self.next() {
            Some(Token::RightBracket) => Ok(inner),
            _ => Err(MathError::MissingClosingBracket { position: self.pos }),
        }
    }
}

fn infix_binding(token: Token) -> Option<(BinaryOp, u8, u8)> {
    match token {
        Token::Plus => Some((BinaryOp::Add, 1, 2)),
        Token::Minus => Some((BinaryOp::Subtract, 1, 2)),
        Token::Multiply => Some((BinaryOp::Multiply, 3, 4)),
        Token::Divide => Some((BinaryOp::Divide, 3, 4)),
        Token::Power => Some((BinaryOp::Power, 5, 6)),
        _ => None,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NamedConstant, Variable};

    fn parse_ok(source: &str) -> MathExpr {
        match parse_formula(source) {
            Ok(expr) => expr,
            Err(e) => panic!("parse failed for {source:?}: {e}"),
        }
    }

    fn var(v: Variable) -> MathExpr {
        MathExpr::Variable(v)
    }

    fn lit(v: f32) -> MathExpr {
        MathExpr::Literal(v)
    }

    #[test]
    fn addition_is_left_associative() {
        assert_eq!(
            parse_ok("x+y+z"),
            MathExpr::binary(
                BinaryOp::Add,
                MathExpr::binary(BinaryOp::Add, var(Variable::X), var(Variable::Y)),
                var(Variable::Z),
            )
        );
    }

    #[test]
    fn precedence_inside_function_argument() {
        assert_eq!(
            parse_ok("sin(3*x^(1.0+2))"),
            MathExpr::unary(
                UnaryOp::Sin,
                MathExpr::binary(
                    BinaryOp::Multiply,
                    lit(3.0),
                    MathExpr::binary(
                        BinaryOp::Power,
                        var(Variable::X),
                        MathExpr::binary(BinaryOp::Add, lit(1.0), lit(2.0)),
                    ),
                ),
            )
        );
    }

    #[test]
    fn subtraction_and_division_are_left_associative() {
        assert_eq!(parse_ok("x-y-z").to_string(), "sub(sub(x, y), z)");
        assert_eq!(parse_ok("x/y/z").to_string(), "div(div(x, y), z)");
        assert_eq!(parse_ok("x^y^z").to_string(), "pow(pow(x, y), z)");
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(parse_ok("x+y*z").to_string(), "add(x, mul(y, z))");
        assert_eq!(parse_ok("(x+y)*z").to_string(), "mul(add(x, y), z)");
    }

    #[test]
    fn prefix_operators() {
        assert_eq!(parse_ok("-x").to_string(), "neg(x)");
        assert_eq!(parse_ok("--x").to_string(), "neg(neg(x))");
        assert_eq!(parse_ok("+x*y").to_string(), "mul(plus(x), y)");
        assert_eq!(parse_ok("x*-y").to_string(), "mul(x, neg(y))");
    }

    #[test]
    fn constants_and_functions() {
        assert_eq!(
            parse_ok("abs(pi)"),
            MathExpr::unary(UnaryOp::Abs, MathExpr::Constant(NamedConstant::Pi))
        );
        assert_eq!(parse_ok("sqrt(floor(w))").to_string(), "sqrt(floor(w))");
    }

    #[test]
    fn unterminated_function_call_fails() {
        assert_eq!(
            parse_formula("sqrt(1"),
            Err(MathError::MissingClosingBracket { position: 2 })
        );
        assert!(matches!(
            parse_formula("(x+y"),
            Err(MathError::MissingClosingBracket { .. })
        ));
    }

    #[test]
    fn empty_input_fails() {
        assert_eq!(parse_formula(""), Err(MathError::UnexpectedEnd));
    }

    #[test]
    fn trailing_operator_fails() {
        assert_eq!(parse_formula("x+"), Err(MathError::UnexpectedEnd));
    }

    #[test]
    fn stray_closing_bracket_fails() {
        assert_eq!(
            parse_formula(")"),
            Err(MathError::UnexpectedToken {
                found: Token::RightBracket,
                position: 0,
            })
        );
        assert!(matches!(
            parse_formula("x)"),
            Err(MathError::UnexpectedToken { position: 1, .. })
        ));
    }

    #[test]
    fn infix_operator_without_left_operand_fails() {
        assert!(matches!(
            parse_formula("*x"),
            Err(MathError::UnexpectedToken {
                found: Token::Multiply,
                ..
            })
        ));
        assert!(matches!(
            parse_formula("x*^y"),
            Err(MathError::UnexpectedToken {
                found: Token::Power,
                ..
            })
        ));
    }

    #[test]
    fn adjacent_operands_fail() {
        assert!(matches!(
            parse_formula("xy"),
            Err(MathError::UnexpectedToken { position: 1, .. })
        ));
    }

    #[test]
    fn lex_errors_surface_as_lex() {
        assert_eq!(parse_formula("x$y"), Err(MathError::Lex));
    }
}
