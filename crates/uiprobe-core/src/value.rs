//! Scalar values carried by content and expected trees.

use std::fmt;

use serde_json::Value;

/// A primitive value read from the UI or written in an expected state.
///
/// Equality is strict by type and value, with one carve-out: two NaN
/// numbers compare equal so an expected NaN can match an actual NaN.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Num(a), Scalar::Num(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Num(v) => write!(f, "{v}"),
            Scalar::Str(v) => write!(f, "{v}"),
        }
    }
}

impl Scalar {
    /// Convert a JSON leaf into a scalar. Objects and arrays yield `None`.
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    n.as_f64().map(Scalar::Num)
                }
            }
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Num(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Scalar::Num(f64::NAN), Scalar::Num(f64::NAN));
        assert_ne!(Scalar::Num(f64::NAN), Scalar::Num(5.0));
        assert_ne!(Scalar::Num(5.0), Scalar::Num(f64::NAN));
    }

    #[test]
    fn equality_is_strict_by_type() {
        assert_ne!(Scalar::Int(1), Scalar::Num(1.0));
        assert_ne!(Scalar::Str("1".into()), Scalar::Int(1));
        assert_ne!(Scalar::Bool(false), Scalar::Null);
    }

    #[test]
    fn from_json_leaves() {
        assert_eq!(
            Scalar::from_json(&serde_json::json!(42)),
            Some(Scalar::Int(42))
        );
        assert_eq!(
            Scalar::from_json(&serde_json::json!(1.5)),
            Some(Scalar::Num(1.5))
        );
        assert_eq!(Scalar::from_json(&serde_json::json!({})), None);
        assert_eq!(Scalar::from_json(&serde_json::json!([])), None);
    }
}
