//! The typed value system shared by every KadeDB storage model
//!
//! [`Value`] is a tagged variant over the five supported types. All cells in
//! rows, documents, time-series points, and graph properties are `Value`s,
//! and the predicate model compares them through one total order.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KadeError, KadeResult};

/// Type tag for a [`Value`] variant
///
/// The declaration order fixes the cross-variant ordering used by
/// [`Value::compare`]: Null < Integer < Float < String < Boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Integer,
    Float,
    String,
    Boolean,
}

impl ValueType {
    /// Variant index used for cross-type ordering
    pub const fn index(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer => 1,
            Self::Float => 2,
            Self::String => 3,
            Self::Boolean => 4,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// Generic value type for database operations
///
/// Cloning is deep; equality and ordering are content-based. Integer and
/// Float compare numerically against each other, every other cross-variant
/// pair orders by variant index, and Null is strictly less than every
/// non-null value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    /// Create a Null value
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create an Integer value
    pub const fn integer(v: i64) -> Self {
        Self::Integer(v)
    }

    /// Create a Float value
    pub const fn float(v: f64) -> Self {
        Self::Float(v)
    }

    /// Create a String value
    pub fn string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    /// Create a Boolean value
    pub const fn boolean(v: bool) -> Self {
        Self::Boolean(v)
    }

    /// The type tag of this value
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Boolean(_) => ValueType::Boolean,
        }
    }

    /// Whether this value is Null
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Total-order comparison across all variants
    ///
    /// Within a variant the natural order applies (`f64::total_cmp` for
    /// floats, byte order for strings, `false < true`). Integer and Float
    /// compare numerically; any other cross-variant pair orders by variant
    /// index, which also makes Null smaller than every non-null value.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Integer(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            _ => self.value_type().index().cmp(&other.value_type().index()),
        }
    }

    /// Convert to a boolean
    ///
    /// Integer/Float convert by `!= 0`, String by non-emptiness. Null is
    /// not convertible.
    pub fn as_bool(&self) -> KadeResult<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            Self::Integer(i) => Ok(*i != 0),
            Self::Float(f) => Ok(*f != 0.0),
            Self::String(s) => Ok(!s.is_empty()),
            Self::Null => Err(KadeError::invalid_argument(
                "null is not convertible to boolean",
            )),
        }
    }

    /// Convert to an integer; floats truncate toward zero
    pub fn as_int(&self) -> KadeResult<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            Self::Float(f) => Ok(*f as i64),
            other => Err(KadeError::invalid_argument(format!(
                "{} is not convertible to integer",
                other.value_type()
            ))),
        }
    }

    /// Convert to a float
    pub fn as_float(&self) -> KadeResult<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Integer(i) => Ok(*i as f64),
            other => Err(KadeError::invalid_argument(format!(
                "{} is not convertible to float",
                other.value_type()
            ))),
        }
    }

    /// Borrow the string content; fails for every non-String variant
    pub fn as_str(&self) -> KadeResult<&str> {
        match self {
            Self::String(s) => Ok(s.as_str()),
            other => Err(KadeError::invalid_argument(format!(
                "{} is not convertible to string",
                other.value_type()
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_and_types() {
        assert_eq!(Value::null().value_type(), ValueType::Null);
        assert_eq!(Value::integer(7).value_type(), ValueType::Integer);
        assert_eq!(Value::float(1.5).value_type(), ValueType::Float);
        assert_eq!(Value::string("hi").value_type(), ValueType::String);
        assert_eq!(Value::boolean(true).value_type(), ValueType::Boolean);
    }

    #[test]
    fn test_numeric_cross_type_compare() {
        assert_eq!(
            Value::integer(3).compare(&Value::float(3.0)),
            Ordering::Equal
        );
        assert_eq!(Value::integer(2).compare(&Value::float(2.5)), Ordering::Less);
        assert_eq!(
            Value::float(10.0).compare(&Value::integer(9)),
            Ordering::Greater
        );
        assert_eq!(Value::integer(3), Value::float(3.0));
    }

    #[test]
    fn test_null_ordering() {
        for v in [
            Value::integer(i64::MIN),
            Value::float(f64::NEG_INFINITY),
            Value::string(""),
            Value::boolean(false),
        ] {
            assert_eq!(Value::null().compare(&v), Ordering::Less);
            assert_eq!(v.compare(&Value::null()), Ordering::Greater);
        }
        assert_eq!(Value::null(), Value::null());
    }

    #[test]
    fn test_cross_variant_order_stable() {
        // String orders above both numeric variants, Boolean above String.
        assert_eq!(
            Value::string("0").compare(&Value::integer(999)),
            Ordering::Greater
        );
        assert_eq!(
            Value::boolean(false).compare(&Value::string("zzz")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_string_byte_order() {
        assert_eq!(
            Value::string("abc").compare(&Value::string("abd")),
            Ordering::Less
        );
        // Byte-based, not collation-aware: uppercase sorts before lowercase.
        assert_eq!(
            Value::string("Z").compare(&Value::string("a")),
            Ordering::Less
        );
    }

    #[test]
    fn test_bool_conversion() {
        assert!(Value::integer(5).as_bool().unwrap());
        assert!(!Value::integer(0).as_bool().unwrap());
        assert!(Value::float(0.1).as_bool().unwrap());
        assert!(!Value::float(0.0).as_bool().unwrap());
        assert!(Value::string("x").as_bool().unwrap());
        assert!(!Value::string("").as_bool().unwrap());
        assert!(Value::null().as_bool().is_err());
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Value::float(3.9).as_int().unwrap(), 3);
        assert_eq!(Value::float(-3.9).as_int().unwrap(), -3);
        assert_eq!(Value::integer(4).as_float().unwrap(), 4.0);
        assert!(Value::string("12").as_int().is_err());
        assert!(Value::null().as_float().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::null().to_string(), "null");
        assert_eq!(Value::integer(-42).to_string(), "-42");
        assert_eq!(Value::float(1.5).to_string(), "1.5");
        assert_eq!(Value::string("raw, content").to_string(), "raw, content");
        assert_eq!(Value::boolean(false).to_string(), "false");
    }
}
