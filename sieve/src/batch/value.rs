// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar values carried by batch columns and predicate literals
//!
//! Supports the data types commonly found in telemetry and security events:
//! - Basic types: Bool, Integer, Count, Real, String, Null
//! - Temporal types: Time
//! - Network types: Address

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Integer,
    Count,
    Real,
    String,
    Time,
    Address,
}

impl DataType {
    /// Whether the type takes part in numeric comparisons
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Count | DataType::Real)
    }

    /// Whether values of `self` and `other` can be compared with each other
    pub fn is_comparable_with(&self, other: &DataType) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }

    /// Whether the type has a total order usable by `<`, `<=`, `>`, `>=`
    pub fn is_ordered(&self) -> bool {
        !matches!(self, DataType::Bool)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::Integer => "int",
            DataType::Count => "count",
            DataType::Real => "real",
            DataType::String => "string",
            DataType::Time => "time",
            DataType::Address => "addr",
        };
        f.write_str(name)
    }
}

/// A single scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Count(u64),
    Real(f64),
    String(String),
    Time(DateTime<Utc>),
    Address(IpAddr),
}

impl Value {
    /// Data type of the value, `None` for `Null`
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Count(_) => Some(DataType::Count),
            Value::Real(_) => Some(DataType::Real),
            Value::String(_) => Some(DataType::String),
            Value::Time(_) => Some(DataType::Time),
            Value::Address(_) => Some(DataType::Address),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Compare two values of comparable types
    ///
    /// Integers and counts compare exactly; any comparison involving a real
    /// goes through `f64`. Returns `None` for nulls, incomparable types and NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Count(a), Value::Count(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Count(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Value::Count(a), Value::Integer(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Address(a), Value::Address(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Count(c) => Some(*c as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) if *i >= 0 => write!(f, "+{}", i),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Count(c) => write!(f, "{}", c),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::String(s) => write!(f, "\"{}\"", s.escape_default()),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Address(a) => write!(f, "{}", a),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<u64> for Value {
    fn from(c: u64) -> Self {
        Value::Count(c)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<IpAddr> for Value {
    fn from(a: IpAddr) -> Self {
        Value::Address(a)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Time(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numeric_cross_type_comparison() {
        assert_eq!(
            Value::Integer(-1).compare(&Value::Count(0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Count(u64::MAX).compare(&Value::Integer(i64::MAX)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Real(2.5).compare(&Value::Count(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Real(f64::NAN).compare(&Value::Real(1.0)), None);
    }

    #[test]
    fn test_incomparable_values() {
        assert_eq!(Value::from("a").compare(&Value::Count(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert!(!DataType::String.is_comparable_with(&DataType::Count));
        assert!(DataType::Real.is_comparable_with(&DataType::Integer));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::Integer(42).to_string(), "+42");
        assert_eq!(Value::Integer(-42).to_string(), "-42");
        assert_eq!(Value::Count(42).to_string(), "42");
        assert_eq!(Value::Real(1.0).to_string(), "1.0");
        assert_eq!(Value::Null.to_string(), "nil");
        let t = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(Value::Time(t).to_string(), "2021-03-04T05:06:07Z");
        let addr: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(Value::from(addr).to_string(), "10.0.0.1");
    }
}
