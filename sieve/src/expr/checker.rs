// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Predicate compilation and evaluation
//!
//! `compile` specializes an expression to one schema by resolving field names
//! to column indexes and type-checking every literal. The resulting `Checker`
//! is evaluated row by row and yields a selection of local row offsets.

use super::ast::{Expression, Extractor, Predicate, RelOp};
use crate::batch::{Batch, DataType, Schema, Selection, Value};
use std::cmp::Ordering;
use thiserror::Error;

/// Reasons an expression cannot be specialized to a schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Type mismatch: '{extractor}' has type {column_type}, cannot compare with {value}")]
    TypeMismatch {
        extractor: String,
        column_type: DataType,
        value: Value,
    },

    #[error("Operator '{op}' is not supported for type {data_type}")]
    UnsupportedOperator { op: RelOp, data_type: DataType },

    #[error("Operator '{op}' is not supported for the schema extractor")]
    UnsupportedSchemaOperator { op: RelOp },

    #[error("Empty {0} in expression")]
    EmptyConnective(&'static str),
}

/// An expression specialized to one schema
#[derive(Debug, Clone, PartialEq)]
pub enum Checker {
    Constant(bool),
    Compare {
        column: usize,
        op: RelOp,
        value: Value,
    },
    All(Vec<Checker>),
    Any(Vec<Checker>),
    Not(Box<Checker>),
}

impl Checker {
    /// Evaluate the checker against local `row` of `batch`
    pub fn matches(&self, batch: &Batch, row: u64) -> bool {
        match self {
            Checker::Constant(result) => *result,
            Checker::Compare { column, op, value } => batch
                .value(row, *column)
                .map(|lhs| compare(lhs, *op, value))
                .unwrap_or(false),
            Checker::All(checkers) => checkers.iter().all(|c| c.matches(batch, row)),
            Checker::Any(checkers) => checkers.iter().any(|c| c.matches(batch, row)),
            Checker::Not(checker) => !checker.matches(batch, row),
        }
    }
}

/// Specialize `expr` to `schema`
///
/// Predicates on fields the schema does not have compile to a constant
/// `false`.
pub fn compile(schema: &Schema, expr: &Expression) -> Result<Checker, CompileError> {
    match expr {
        Expression::Predicate(predicate) => compile_predicate(schema, predicate),
        Expression::Conjunction(operands) => {
            if operands.is_empty() {
                return Err(CompileError::EmptyConnective("conjunction"));
            }
            let checkers = operands
                .iter()
                .map(|operand| compile(schema, operand))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Checker::All(checkers))
        }
        Expression::Disjunction(operands) => {
            if operands.is_empty() {
                return Err(CompileError::EmptyConnective("disjunction"));
            }
            let checkers = operands
                .iter()
                .map(|operand| compile(schema, operand))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Checker::Any(checkers))
        }
        Expression::Negation(operand) => Ok(Checker::Not(Box::new(compile(schema, operand)?))),
    }
}

/// Selection of all local rows of `batch` that satisfy `checker`
pub fn evaluate(checker: &Checker, batch: &Batch) -> Selection {
    match checker {
        Checker::Constant(false) => Selection::new(),
        Checker::Constant(true) => Selection::from_range(0..batch.rows()),
        _ => (0..batch.rows())
            .filter(|&row| checker.matches(batch, row))
            .collect(),
    }
}

fn compile_predicate(schema: &Schema, predicate: &Predicate) -> Result<Checker, CompileError> {
    let columns = match &predicate.extractor {
        Extractor::Schema => return compile_schema_predicate(schema, predicate),
        Extractor::Field(name) => schema.resolve(name),
        Extractor::Type(data_type) => schema.columns_of_type(*data_type),
    };
    let mut checkers = Vec::with_capacity(columns.len());
    for column in columns {
        let column_type = schema.fields[column].data_type;
        check_operands(&predicate.extractor, column_type, predicate.op, &predicate.value)?;
        checkers.push(Checker::Compare {
            column,
            op: predicate.op,
            value: predicate.value.clone(),
        });
    }
    Ok(match checkers.len() {
        0 => Checker::Constant(false),
        1 => checkers.remove(0),
        _ if predicate.op.is_negative() => Checker::All(checkers),
        _ => Checker::Any(checkers),
    })
}

fn compile_schema_predicate(schema: &Schema, predicate: &Predicate) -> Result<Checker, CompileError> {
    let name = predicate
        .value
        .as_str()
        .ok_or_else(|| CompileError::TypeMismatch {
            extractor: predicate.extractor.to_string(),
            column_type: DataType::String,
            value: predicate.value.clone(),
        })?;
    let result = match predicate.op {
        RelOp::Equal => schema.name == name,
        RelOp::NotEqual => schema.name != name,
        RelOp::Contains => schema.name.contains(name),
        RelOp::NotContains => !schema.name.contains(name),
        op => return Err(CompileError::UnsupportedSchemaOperator { op }),
    };
    Ok(Checker::Constant(result))
}

fn check_operands(
    extractor: &Extractor,
    column_type: DataType,
    op: RelOp,
    value: &Value,
) -> Result<(), CompileError> {
    let value_type = match value.data_type() {
        // Nulls only take part in (in)equality
        None if matches!(op, RelOp::Equal | RelOp::NotEqual) => return Ok(()),
        None => {
            return Err(CompileError::UnsupportedOperator {
                op,
                data_type: column_type,
            })
        }
        Some(value_type) => value_type,
    };
    if !column_type.is_comparable_with(&value_type) {
        return Err(CompileError::TypeMismatch {
            extractor: extractor.to_string(),
            column_type,
            value: value.clone(),
        });
    }
    let supported = match op {
        RelOp::Equal | RelOp::NotEqual => true,
        RelOp::Contains | RelOp::NotContains => column_type == DataType::String,
        _ => column_type.is_ordered(),
    };
    if !supported {
        return Err(CompileError::UnsupportedOperator {
            op,
            data_type: column_type,
        });
    }
    Ok(())
}

fn compare(lhs: &Value, op: RelOp, rhs: &Value) -> bool {
    if lhs.is_null() || rhs.is_null() {
        let both = lhs.is_null() && rhs.is_null();
        return match op {
            RelOp::Equal => both,
            RelOp::NotEqual => !both,
            _ => false,
        };
    }
    match op {
        RelOp::Contains | RelOp::NotContains => {
            let contained = match (lhs.as_str(), rhs.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            };
            contained == (op == RelOp::Contains)
        }
        _ => match lhs.compare(rhs) {
            Some(ordering) => match op {
                RelOp::Equal => ordering == Ordering::Equal,
                RelOp::NotEqual => ordering != Ordering::Equal,
                RelOp::Less => ordering == Ordering::Less,
                RelOp::LessEqual => ordering != Ordering::Greater,
                RelOp::Greater => ordering == Ordering::Greater,
                RelOp::GreaterEqual => ordering != Ordering::Less,
                RelOp::Contains | RelOp::NotContains => false,
            },
            None => op == RelOp::NotEqual,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Field;
    use std::net::IpAddr;
    use std::sync::Arc;

    fn flows() -> Batch {
        let schema = Arc::new(Schema::new(
            "flow",
            vec![
                Field::new("id.orig_h", DataType::Address),
                Field::new("id.resp_h", DataType::Address),
                Field::new("bytes", DataType::Count),
                Field::new("service", DataType::String),
            ],
        ));
        let addr = |s: &str| Value::Address(s.parse::<IpAddr>().unwrap());
        Batch::from_rows(
            schema,
            0,
            vec![
                vec![addr("10.0.0.1"), addr("10.0.0.2"), Value::Count(10), "dns".into()],
                vec![addr("10.0.0.2"), addr("10.0.0.3"), Value::Count(2000), "http".into()],
                vec![addr("10.0.0.3"), addr("10.0.0.1"), Value::Null, "https".into()],
            ],
        )
        .unwrap()
    }

    fn matches(expr: &Expression) -> Vec<u64> {
        let batch = flows();
        let checker = compile(batch.schema(), expr).unwrap();
        evaluate(&checker, &batch).iter().collect()
    }

    #[test]
    fn test_field_predicates() {
        assert_eq!(matches(&Expression::field("bytes", RelOp::Greater, Value::Count(100))), vec![1]);
        assert_eq!(matches(&Expression::field("bytes", RelOp::Less, Value::Integer(5000))), vec![0, 1]);
        assert_eq!(matches(&Expression::field("bytes", RelOp::Equal, Value::Null)), vec![2]);
        assert_eq!(matches(&Expression::field("service", RelOp::Contains, "http")), vec![1, 2]);
    }

    #[test]
    fn test_type_extractor_any_and_all() {
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(
            matches(&Expression::typed(DataType::Address, RelOp::Equal, addr)),
            vec![0, 2]
        );
        assert_eq!(
            matches(&Expression::typed(DataType::Address, RelOp::NotEqual, addr)),
            vec![1]
        );
    }

    #[test]
    fn test_connectives_and_schema() {
        let expr = Expression::and(vec![
            Expression::schema(RelOp::Equal, "flow"),
            Expression::negate(Expression::field("service", RelOp::Equal, "dns")),
        ]);
        assert_eq!(matches(&expr), vec![1, 2]);

        let expr = Expression::or(vec![
            Expression::schema(RelOp::Equal, "other"),
            Expression::field("bytes", RelOp::Equal, Value::Count(10)),
        ]);
        assert_eq!(matches(&expr), vec![0]);
    }

    #[test]
    fn test_unknown_field_is_false() {
        let batch = flows();
        let checker = compile(batch.schema(), &Expression::field("nope", RelOp::Equal, 1u64)).unwrap();
        assert_eq!(checker, Checker::Constant(false));
        assert!(evaluate(&checker, &batch).is_empty());
    }

    #[test]
    fn test_compile_errors() {
        let schema = flows().schema().clone();
        let err = compile(&schema, &Expression::field("bytes", RelOp::Equal, "ten")).unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { column_type: DataType::Count, .. }));

        let err = compile(&schema, &Expression::field("bytes", RelOp::Contains, 1u64)).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperator { op: RelOp::Contains, .. }));

        let err = compile(&schema, &Expression::schema(RelOp::Less, "flow")).unwrap_err();
        assert_eq!(err, CompileError::UnsupportedSchemaOperator { op: RelOp::Less });

        let err = compile(&schema, &Expression::and(vec![])).unwrap_err();
        assert_eq!(err, CompileError::EmptyConnective("conjunction"));
    }
}
