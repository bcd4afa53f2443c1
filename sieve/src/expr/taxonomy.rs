// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Taxonomy concepts
//!
//! A concept names a set of fields (or other concepts) that carry the same
//! meaning across schemas, e.g. `net.src.ip` for `id.orig_h` in one schema
//! and `src_ip` in another. Resolving substitutes concepts with concrete
//! field names before the expression is compiled.

use super::ast::{Expression, Extractor, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Concept definitions: concept name -> fields or nested concepts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomies {
    pub concepts: HashMap<String, Vec<String>>,
}

impl Taxonomies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concept(mut self, name: impl Into<String>, members: Vec<String>) -> Self {
        self.concepts.insert(name.into(), members);
        self
    }

    /// Concrete field names behind `name`, in definition order
    ///
    /// Returns `None` when `name` is not a concept.
    pub fn expand(&self, name: &str) -> Option<Vec<String>> {
        if !self.concepts.contains_key(name) {
            return None;
        }
        let mut fields = Vec::new();
        let mut visited = HashSet::new();
        self.expand_into(name, &mut visited, &mut fields);
        Some(fields)
    }

    fn expand_into(&self, name: &str, visited: &mut HashSet<String>, out: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        match self.concepts.get(name) {
            Some(members) => {
                for member in members {
                    self.expand_into(member, visited, out);
                }
            }
            None => {
                if !out.iter().any(|f| f == name) {
                    out.push(name.to_string());
                }
            }
        }
    }
}

/// Substitute concept references in `expr` with concrete fields
///
/// Positive predicates expand to a disjunction over the concept's fields,
/// negative ones (`!=`, `!ni`) to a conjunction.
pub fn resolve(taxonomies: &Taxonomies, expr: &Expression) -> Expression {
    match expr {
        Expression::Predicate(predicate) => resolve_predicate(taxonomies, predicate),
        Expression::Conjunction(operands) => Expression::Conjunction(
            operands.iter().map(|e| resolve(taxonomies, e)).collect(),
        ),
        Expression::Disjunction(operands) => Expression::Disjunction(
            operands.iter().map(|e| resolve(taxonomies, e)).collect(),
        ),
        Expression::Negation(operand) => {
            Expression::Negation(Box::new(resolve(taxonomies, operand)))
        }
    }
}

fn resolve_predicate(taxonomies: &Taxonomies, predicate: &Predicate) -> Expression {
    let name = match &predicate.extractor {
        Extractor::Field(name) => name,
        _ => return Expression::Predicate(predicate.clone()),
    };
    let fields = match taxonomies.expand(name) {
        Some(fields) if !fields.is_empty() => fields,
        _ => return Expression::Predicate(predicate.clone()),
    };
    let mut operands: Vec<Expression> = fields
        .into_iter()
        .map(|field| {
            Expression::Predicate(Predicate {
                extractor: Extractor::Field(field),
                op: predicate.op,
                value: predicate.value.clone(),
            })
        })
        .collect();
    if operands.len() == 1 {
        return operands.remove(0);
    }
    if predicate.op.is_negative() {
        Expression::Conjunction(operands)
    } else {
        Expression::Disjunction(operands)
    }
}
