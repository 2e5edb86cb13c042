// ast.rs — Expression tree for calculator formulas
//
// Produced once by the parser and never mutated afterwards. Variables
// x/y/z/w refer to a calculator node's first four inputs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    X,
    Y,
    Z,
    W,
}

impl Variable {
    /// Input port index the variable reads from.
    pub fn index(self) -> usize {
        match self {
            Variable::X => 0,
            Variable::Y => 1,
            Variable::Z => 2,
            Variable::W => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
            Variable::Z => "z",
            Variable::W => "w",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedConstant {
    E,
    Pi,
    Phi,
    Tau,
}

impl NamedConstant {
    pub fn value(self) -> f32 {
        match self {
            NamedConstant::E => std::f32::consts::E,
            NamedConstant::Pi => std::f32::consts::PI,
            NamedConstant::Phi => 1.618_034,
            NamedConstant::Tau => std::f32::consts::TAU,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NamedConstant::E => "e",
            NamedConstant::Pi => "pi",
            NamedConstant::Phi => "phi",
            NamedConstant::Tau => "tau",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Sqrt,
    Floor,
    Ceil,
    Round,
    Cos,
    Acos,
    Sin,
    Asin,
    Tan,
    Atan,
    Abs,
    Log,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Plus => "plus",
            UnaryOp::Minus => "neg",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Floor => "floor",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Round => "round",
            UnaryOp::Cos => "cos",
            UnaryOp::Acos => "acos",
            UnaryOp::Sin => "sin",
            UnaryOp::Asin => "asin",
            UnaryOp::Tan => "tan",
            UnaryOp::Atan => "atan",
            UnaryOp::Abs => "abs",
            UnaryOp::Log => "log",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "sub",
            BinaryOp::Multiply => "mul",
            BinaryOp::Divide => "div",
            BinaryOp::Power => "pow",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MathExpr {
    Literal(f32),
    Variable(Variable),
    Constant(NamedConstant),
    Unary(UnaryOp, Box<MathExpr>),
    Binary(BinaryOp, Box<MathExpr>, Box<MathExpr>),
}

impl MathExpr {
    pub fn unary(op: UnaryOp, operand: MathExpr) -> MathExpr {
        MathExpr::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: MathExpr, rhs: MathExpr) -> MathExpr {
        MathExpr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

/// Prefix form, e.g. `add(add(x, y), z)`.
impl fmt::Display for MathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathExpr::Literal(v) => write!(f, "{v}"),
            MathExpr::Variable(v) => write!(f, "{}", v.name()),
            MathExpr::Constant(c) => write!(f, "{}", c.name()),
            MathExpr::Unary(op, operand) => write!(f, "{}({operand})", op.name()),
            MathExpr::Binary(op, lhs, rhs) => write!(f, "{}({lhs}, {rhs})", op.name()),
        }
    }
}
