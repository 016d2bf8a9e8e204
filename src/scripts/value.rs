use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stage::ObjectId;

/// Dynamically typed value crossing the script boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ScriptValue {
    #[default]
    Void,
    Real(f64),
    Bool(bool),
    String(String),
    Array(Vec<ScriptValue>),
}

impl ScriptValue {
    pub fn is_void(&self) -> bool {
        matches!(self, ScriptValue::Void)
    }

    /// Numeric view: booleans are 0/1, strings parse or give 0, arrays give their length.
    pub fn as_real(&self) -> f64 {
        match self {
            ScriptValue::Void => 0.0,
            ScriptValue::Real(v) => *v,
            ScriptValue::Bool(b) => f64::from(u8::from(*b)),
            ScriptValue::String(s) => s.trim().parse().unwrap_or(0.0),
            ScriptValue::Array(items) => items.len() as f64,
        }
    }

    /// Truncates toward zero.
    pub fn as_int(&self) -> i64 {
        self.as_real() as i64
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ScriptValue::Void => false,
            ScriptValue::Real(v) => *v != 0.0,
            ScriptValue::Bool(b) => *b,
            ScriptValue::String(s) => !s.is_empty(),
            ScriptValue::Array(items) => !items.is_empty(),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            ScriptValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn as_array(&self) -> &[ScriptValue] {
        match self {
            ScriptValue::Array(items) => items,
            _ => &[],
        }
    }

    pub fn as_id(&self) -> ObjectId {
        ObjectId::from_script(self.as_real())
    }

    pub fn real_array(values: impl IntoIterator<Item = f64>) -> ScriptValue {
        ScriptValue::Array(values.into_iter().map(ScriptValue::Real).collect())
    }

    pub fn id_array(ids: impl IntoIterator<Item = ObjectId>) -> ScriptValue {
        ScriptValue::Array(ids.into_iter().map(ScriptValue::from).collect())
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Void => Ok(()),
            ScriptValue::Real(v) => write!(f, "{v}"),
            ScriptValue::Bool(b) => write!(f, "{b}"),
            ScriptValue::String(s) => f.write_str(s),
            ScriptValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Real(value)
    }
}

impl From<f32> for ScriptValue {
    fn from(value: f32) -> Self {
        ScriptValue::Real(f64::from(value))
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Real(value as f64)
    }
}

impl From<usize> for ScriptValue {
    fn from(value: usize) -> Self {
        ScriptValue::Real(value as f64)
    }
}

impl From<u32> for ScriptValue {
    fn from(value: u32) -> Self {
        ScriptValue::Real(f64::from(value))
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<ObjectId> for ScriptValue {
    fn from(id: ObjectId) -> Self {
        ScriptValue::Real(id.0 as f64)
    }
}

impl From<Vec<ScriptValue>> for ScriptValue {
    fn from(items: Vec<ScriptValue>) -> Self {
        ScriptValue::Array(items)
    }
}

impl From<glam::Vec2> for ScriptValue {
    fn from(v: glam::Vec2) -> Self {
        ScriptValue::real_array([f64::from(v.x), f64::from(v.y)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_follow_script_rules() {
        assert_eq!(ScriptValue::from(true).as_real(), 1.0);
        assert_eq!(ScriptValue::from("12.5").as_real(), 12.5);
        assert_eq!(ScriptValue::from("abc").as_int(), 0);
        assert_eq!(ScriptValue::Real(-2.7).as_int(), -2);
        assert!(!ScriptValue::Void.as_bool());
        assert_eq!(ScriptValue::from(ObjectId(7)).as_id(), ObjectId(7));
    }

    #[test]
    fn arrays_display_like_lists() {
        let value = ScriptValue::Array(vec![1.0.into(), "a".into(), ScriptValue::real_array([2.0])]);
        assert_eq!(value.to_string(), "[1,a,[2]]");
        assert_eq!(value.as_array().len(), 3);
        assert!(ScriptValue::Real(1.0).as_array().is_empty());
    }
}
