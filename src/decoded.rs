use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A single decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Flag(bool),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Text is parsed leniently: blanks and
    /// `_`-suffixed placeholders (e.g. `"1_"`) read as 0.0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() || s.ends_with('_') {
                    Some(0.0)
                } else {
                    s.parse().ok()
                }
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Number(n) => write!(f, "{}", n),
            Self::Flag(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Flag(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Result of decoding one response: either ordered named fields or exactly one
/// error description, never both.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Fields(Vec<(String, FieldValue)>),
    Error(String),
}

impl Default for Decoded {
    fn default() -> Self {
        Self::Fields(Vec::new())
    }
}

impl Decoded {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error(message.into())
    }

    /// Builds a `{status: ...}` map, the shape every successful write returns.
    pub fn status(status: &str) -> Self {
        Self::Fields(vec![("status".to_string(), FieldValue::from(status))])
    }

    /// Appends a field. Pushing onto an error response is a no-op.
    pub fn push<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        if let Self::Fields(fields) = self {
            fields.push((key.into(), value.into()));
        }
    }

    pub fn with<K: Into<String>, V: Into<FieldValue>>(mut self, key: K, value: V) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self {
            Self::Fields(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::Error(_) => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_f64)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(e) => Some(e),
            Self::Fields(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fields(fields) => fields.is_empty(),
            Self::Error(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Fields(fields) => fields.len(),
            Self::Error(_) => 1,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Fields(fields) => fields.iter().map(|(k, _)| k.as_str()).collect(),
            Self::Error(_) => vec!["error"],
        }
    }
}

impl FromIterator<(String, FieldValue)> for Decoded {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self::Fields(iter.into_iter().collect())
    }
}

impl Serialize for Decoded {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Fields(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Error(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", e)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_never_gains_fields() {
        let mut d = Decoded::error("NAK response received. Command not accepted.");
        d.push("grid_voltage", "230.0");
        assert_eq!(d.keys(), vec!["error"]);
        assert_eq!(d.get("grid_voltage"), None);
    }

    #[test]
    fn preserves_order() {
        let d = Decoded::new().with("b", "1").with("a", "2");
        assert_eq!(d.keys(), vec!["b", "a"]);
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"b":"1","a":"2"}"#
        );
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(FieldValue::from("1_").as_f64(), Some(0.0));
        assert_eq!(FieldValue::from(" ").as_f64(), Some(0.0));
        assert_eq!(FieldValue::from("052.60").as_f64(), Some(52.6));
        assert_eq!(FieldValue::from("SBU").as_f64(), None);
    }

    #[test]
    fn serializes_error() {
        let d = Decoded::error("empty response");
        assert_eq!(serde_json::to_string(&d).unwrap(), r#"{"error":"empty response"}"#);
    }
}
