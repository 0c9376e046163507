//! The dynamically-keyed, statically-represented value type carried in
//! [`crate::Record::data`] and [`crate::Meta`]'s passthrough fields.
//!
//! Record data is a mapping from string to a tagged value. Integer and
//! float variants coexist so JSON round-trips preserve `5` vs `5.0`, but
//! every numeric operation in the primitives (tolerance comparison,
//! interpolation, sums) coerces through [`Value::as_f64`] so the two behave
//! identically in math.

use indexmap::IndexMap;
use serde_json::Number;

/// A JSON-compatible value with integer/float numbers kept distinct.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// A JSON number with no fractional part and no exponent
    I64(i64),
    /// Any other JSON number
    F64(f64),
    /// JSON string
    Str(String),
    /// JSON array
    List(Vec<Value>),
    /// JSON object; order-preserving so re-serialized records are stable
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Coerce integers and floats to `f64`; everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(i) => Some(*i as f64),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// `true` for any numeric variant holding a finite value.
    pub fn is_finite_number(&self) -> bool {
        self.as_f64().is_some_and(f64::is_finite)
    }

    /// Borrow as a string, if this is [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a bool, if this is [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a map, if this is [`Value::Map`].
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Tolerance-aware equality used by dedup and other primitives.
    /// Numeric variants compare via `as_f64` within `tolerance`; everything
    /// else requires exact structural equality.
    pub fn approx_eq(&self, other: &Value, tolerance: f64) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() <= tolerance,
            _ => self == other,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => number_to_value(&n),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

fn number_to_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::I64(i)
    } else {
        Value::F64(n.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::I64(i) => serde_json::Value::Number(i.into()),
            Value::F64(f) => Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
            Value::List(l) => serde_json::Value::Array(l.into_iter().map(Into::into).collect()),
            Value::Map(m) => {
                serde_json::Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_json::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_integer_vs_float() {
        let v: Value = serde_json::json!(5).into();
        assert_eq!(v, Value::I64(5));
        let v: Value = serde_json::json!(5.0).into();
        assert_eq!(v, Value::F64(5.0));
    }

    #[test]
    fn approx_eq_coerces_int_and_float() {
        assert!(Value::I64(5).approx_eq(&Value::F64(5.0001), 0.001));
        assert!(!Value::I64(5).approx_eq(&Value::F64(5.1), 0.001));
    }
}
