use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The payload recorded by a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Binary(bool),
    Multistate(i32),
    Numeric(f64),
    Alphanumeric(String),
}

/// The kind of payload a data point records
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Binary,
    Multistate,
    Numeric,
    Alphanumeric,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Binary(_) => ValueType::Binary,
            Self::Multistate(_) => ValueType::Multistate,
            Self::Numeric(_) => ValueType::Numeric,
            Self::Alphanumeric(_) => ValueType::Alphanumeric,
        }
    }

    /// The value as a double, if it has a numeric interpretation
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Binary(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Multistate(m) => Some(f64::from(*m)),
            Self::Numeric(n) => Some(*n),
            Self::Alphanumeric(_) => None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Binary(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Multistate(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Alphanumeric(value.to_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary(b) => write!(f, "{b}"),
            Self::Multistate(m) => write!(f, "{m}"),
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Alphanumeric(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_interpretation() {
        assert_eq!(Value::from(true).as_f64(), Some(1.0));
        assert_eq!(Value::from(3).as_f64(), Some(3.0));
        assert_eq!(Value::from(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::from("on").as_f64(), None);
    }

    #[test]
    fn tagged_serialization() {
        let json = serde_json::to_string(&Value::Multistate(7)).unwrap();
        assert_eq!(json, r#"{"type":"multistate","value":7}"#);
        assert_eq!(Value::Multistate(7).value_type(), ValueType::Multistate);
    }
}
