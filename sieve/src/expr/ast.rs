// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query expression tree and its canonical textual form

use crate::batch::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a predicate looks at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Extractor {
    /// A field by name, matched exactly or by dotted suffix
    Field(String),
    /// Every field of the given type (`:addr`)
    Type(DataType),
    /// The schema name of the batch (`#schema`)
    Schema,
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extractor::Field(name) => write!(f, "{}", name),
            Extractor::Type(data_type) => write!(f, ":{}", data_type),
            Extractor::Schema => write!(f, "#schema"),
        }
    }
}

/// Relational operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// String containment: `field ni "needle"`
    Contains,
    NotContains,
}

impl RelOp {
    /// Whether the operator holds when its positive counterpart does not
    pub fn is_negative(&self) -> bool {
        matches!(self, RelOp::NotEqual | RelOp::NotContains)
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            RelOp::Less | RelOp::LessEqual | RelOp::Greater | RelOp::GreaterEqual
        )
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            RelOp::Equal => "==",
            RelOp::NotEqual => "!=",
            RelOp::Less => "<",
            RelOp::LessEqual => "<=",
            RelOp::Greater => ">",
            RelOp::GreaterEqual => ">=",
            RelOp::Contains => "ni",
            RelOp::NotContains => "!ni",
        };
        f.write_str(op)
    }
}

/// `extractor op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub extractor: Extractor,
    pub op: RelOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(extractor: Extractor, op: RelOp, value: impl Into<Value>) -> Self {
        Self {
            extractor,
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.extractor, self.op, self.value)
    }
}

/// A boolean query expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Predicate(Predicate),
    Conjunction(Vec<Expression>),
    Disjunction(Vec<Expression>),
    Negation(Box<Expression>),
}

impl Expression {
    /// `field op value`
    pub fn field(name: impl Into<String>, op: RelOp, value: impl Into<Value>) -> Self {
        Expression::Predicate(Predicate::new(Extractor::Field(name.into()), op, value))
    }

    /// `:type op value`
    pub fn typed(data_type: DataType, op: RelOp, value: impl Into<Value>) -> Self {
        Expression::Predicate(Predicate::new(Extractor::Type(data_type), op, value))
    }

    /// `#schema op value`
    pub fn schema(op: RelOp, name: impl Into<String>) -> Self {
        Expression::Predicate(Predicate::new(
            Extractor::Schema,
            op,
            Value::String(name.into()),
        ))
    }

    pub fn and(operands: Vec<Expression>) -> Self {
        Expression::Conjunction(operands)
    }

    pub fn or(operands: Vec<Expression>) -> Self {
        Expression::Disjunction(operands)
    }

    pub fn negate(operand: Expression) -> Self {
        Expression::Negation(Box::new(operand))
    }

    fn is_connective(&self) -> bool {
        matches!(self, Expression::Conjunction(_) | Expression::Disjunction(_))
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_connective() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }

    fn fmt_connective(
        f: &mut fmt::Formatter<'_>,
        operands: &[Expression],
        separator: &str,
    ) -> fmt::Result {
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(separator)?;
            }
            operand.fmt_operand(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Predicate(predicate) => write!(f, "{}", predicate),
            Expression::Conjunction(operands) => Self::fmt_connective(f, operands, " && "),
            Expression::Disjunction(operands) => Self::fmt_connective(f, operands, " || "),
            Expression::Negation(operand) => {
                f.write_str("! ")?;
                operand.fmt_operand(f)
            }
        }
    }
}

impl From<Predicate> for Expression {
    fn from(predicate: Predicate) -> Self {
        Expression::Predicate(predicate)
    }
}
