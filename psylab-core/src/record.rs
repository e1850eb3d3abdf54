use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column names the engine itself reads or writes
pub mod fields {
    pub const COND: &str = "cond";
    pub const NAME: &str = "name";
    pub const ONSET: &str = "onset";
    pub const DUR: &str = "dur";
    pub const CORR_RESP: &str = "corr_resp";
    pub const SUBJ_RESP: &str = "subj_resp";
    pub const ACCURACY: &str = "accuracy";
    pub const RT: &str = "rt";
    pub const AUTO_RESP: &str = "auto_resp";
    pub const AUTO_RT: &str = "auto_rt";
    pub const SUBJ_ID: &str = "subj_id";
}

/// A single cell of a trial record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    #[default]
    Empty,
}

/// Written for subject response, accuracy and RT when nothing was pressed
pub const NO_RESPONSE: Value = Value::Empty;

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Cell text for the data file; floats are cut to 1 ms precision.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Float(v) => format!("{:.3}", v),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Empty => Ok(()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One trial occurrence. Field order is insertion order and becomes the
/// column order of the data file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialRecord {
    fields: IndexMap<String, Value>,
}

impl TrialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Overwrites an existing field in place, or appends a new one at the end.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Multiplies a numeric field by `factor`; non-numeric fields are left alone.
    pub fn scale(&mut self, key: &str, factor: f64) {
        if let Some(v) = self.fields.get_mut(key) {
            if let Some(x) = v.as_f64() {
                *v = Value::Float(x * factor);
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved_on_overwrite() {
        let mut rec = TrialRecord::new()
            .with(fields::COND, 3u32)
            .with(fields::ONSET, Value::Empty)
            .with(fields::RT, Value::Empty);
        rec.set(fields::ONSET, 1.25);
        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["cond", "onset", "rt"]);
        assert_eq!(rec.get_f64(fields::ONSET), Some(1.25));
    }

    #[test]
    fn cells_use_millisecond_precision() {
        assert_eq!(Value::Float(0.30000001).to_cell(), "0.300");
        assert_eq!(Value::Float(12.0).to_cell(), "12.000");
        assert_eq!(Value::Int(7).to_cell(), "7");
        assert_eq!(Value::from("Correct").to_cell(), "Correct");
        assert_eq!(NO_RESPONSE.to_cell(), "");
    }

    #[test]
    fn scale_skips_text_and_empty() {
        let mut rec = TrialRecord::new()
            .with(fields::RT, 0.5)
            .with(fields::SUBJ_RESP, Value::Empty)
            .with(fields::NAME, "face");
        rec.scale(fields::RT, 100.0);
        rec.scale(fields::SUBJ_RESP, 100.0);
        rec.scale(fields::NAME, 100.0);
        assert_eq!(rec.get_f64(fields::RT), Some(50.0));
        assert!(rec.get(fields::SUBJ_RESP).unwrap().is_empty());
        assert_eq!(rec.get(fields::NAME).and_then(Value::as_str), Some("face"));
    }

    #[test]
    fn serializes_as_an_ordered_object() {
        let rec = TrialRecord::new()
            .with(fields::COND, 1u32)
            .with(fields::RT, Value::Empty);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"cond":1,"rt":null}"#);
    }
}
