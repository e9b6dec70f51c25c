//! Sample field selection
//!
//! A sample carries its value under one of several field names, or as a
//! counter inside the nested `enum_values` object. [`DataKey`] describes
//! what a leaf wants; [`ResolvedKey`] is that choice bound to one response,
//! decided once from the first sample and then applied to every sample.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Sample;

/// Field holding the per-value counters of an enum metric
pub const ENUM_VALUES_FIELD: &str = "enum_values";

/// Field preference used when a leaf selects no specific submetric
pub const DEFAULT_FIELD_PREFERENCE: [&str; 3] = ["average", "latest", "numPoints"];

/// A numeric sample value, keeping integers as integers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Integer(i64),
    Float(f64),
}

impl PointValue {
    /// Convert a JSON number; anything else is not a point value
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(PointValue::Integer)
                .or_else(|| n.as_f64().map(PointValue::Float)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            PointValue::Integer(i) => *i as f64,
            PointValue::Float(f) => *f,
        }
    }

    /// Point `position` of `span` along the line from `start` to `end`
    ///
    /// Two integers interpolate with floored integer arithmetic; any float
    /// makes the result a float. `position` must not exceed `span`.
    pub fn interpolate(start: PointValue, end: PointValue, position: usize, span: usize) -> PointValue {
        match (start, end) {
            (PointValue::Integer(a), PointValue::Integer(b)) => {
                // floor(diff * p / s) == q * p + floor(r * p / s) with
                // diff == q * s + r, which keeps every product in range
                let (a, diff) = (i128::from(a), i128::from(b) - i128::from(a));
                let span_wide = span as i128;
                let (q, r) = (diff.div_euclid(span_wide), diff.rem_euclid(span_wide));
                let fraction = (r as u128 * position as u128) / span as u128;
                let value = a + q * position as i128 + fraction as i128;
                // Between the endpoints, so it fits back into i64
                PointValue::Integer(value as i64)
            }
            _ => {
                let a = start.as_f64();
                let b = end.as_f64();
                PointValue::Float(a + (b - a) * position as f64 / span as f64)
            }
        }
    }
}

/// Outcome of reading a field from a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// The field is not there
    Missing,
    /// The field is there but holds null or a non-numeric value
    Null,
    Value(PointValue),
}

impl FieldValue {
    pub fn value(self) -> Option<PointValue> {
        match self {
            FieldValue::Value(v) => Some(v),
            FieldValue::Missing | FieldValue::Null => None,
        }
    }
}

/// What a leaf wants to read from each sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataKey {
    /// First field of this preference list present in the response
    Plain(Vec<String>),
    /// A named counter under `enum_values`
    Enum(String),
}

impl DataKey {
    /// Plain key with the default preference list
    pub fn default_plain() -> Self {
        DataKey::Plain(DEFAULT_FIELD_PREFERENCE.iter().map(|s| s.to_string()).collect())
    }

    /// Plain key for exactly one field
    pub fn field(name: impl Into<String>) -> Self {
        DataKey::Plain(vec![name.into()])
    }

    /// Bind this key to a response
    ///
    /// Plain keys look at the first sample only: the first preferred field
    /// present there is used for the whole response.
    pub fn resolve(&self, samples: &[Sample]) -> ResolvedKey {
        match self {
            DataKey::Enum(value) => ResolvedKey::EnumValue(value.clone()),
            DataKey::Plain(preference) => samples
                .first()
                .and_then(|first| {
                    preference
                        .iter()
                        .find(|name| first.fields.contains_key(name.as_str()))
                })
                .map(|name| ResolvedKey::Field(name.clone()))
                .unwrap_or(ResolvedKey::Unavailable),
        }
    }
}

/// A key bound to one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedKey {
    /// Top-level field
    Field(String),
    /// Counter under `enum_values`
    EnumValue(String),
    /// No preferred field was present; every sample reads as missing
    Unavailable,
}

impl ResolvedKey {
    /// Whether the sample carries the selected field
    pub fn exists(&self, sample: &Sample) -> bool {
        !matches!(self.extract(sample), FieldValue::Missing)
    }

    /// Read the selected field; never fails on missing keys
    pub fn extract(&self, sample: &Sample) -> FieldValue {
        let raw = match self {
            ResolvedKey::Field(name) => sample.fields.get(name),
            ResolvedKey::EnumValue(value) => sample
                .fields
                .get(ENUM_VALUES_FIELD)
                .and_then(Value::as_object)
                .and_then(|counters| counters.get(value)),
            ResolvedKey::Unavailable => None,
        };

        match raw {
            None => FieldValue::Missing,
            Some(v) => PointValue::from_json(v)
                .map(FieldValue::Value)
                .unwrap_or(FieldValue::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(fields: Value) -> Sample {
        let mut sample = Sample::new(0);
        if let Value::Object(map) = fields {
            sample.fields = map;
        }
        sample
    }

    #[test]
    fn test_plain_key_resolves_from_first_sample() {
        let samples = vec![
            sample(json!({"latest": 3, "numPoints": 1})),
            sample(json!({"average": 2.5, "latest": 4})),
        ];
        let key = DataKey::default_plain().resolve(&samples);
        assert_eq!(key, ResolvedKey::Field("latest".to_string()));

        // The second sample has `average`, but the key is already bound
        assert_eq!(key.extract(&samples[1]), FieldValue::Value(PointValue::Integer(4)));
    }

    #[test]
    fn test_plain_key_without_samples() {
        assert_eq!(DataKey::default_plain().resolve(&[]), ResolvedKey::Unavailable);
        let key = DataKey::field("average").resolve(&[sample(json!({"max": 1}))]);
        assert_eq!(key, ResolvedKey::Unavailable);
        assert!(!key.exists(&sample(json!({"average": 1}))));
    }

    #[test]
    fn test_enum_key_needs_container_and_value() {
        let key = DataKey::Enum("v1".to_string()).resolve(&[]);
        assert!(key.exists(&sample(json!({"enum_values": {"v1": 13, "v2": 7}}))));
        assert!(!key.exists(&sample(json!({"enum_values": {"v2": 7}}))));
        assert!(!key.exists(&sample(json!({"v1": 13}))));
        assert!(!key.exists(&sample(json!({"enum_values": 5}))));
        assert_eq!(
            key.extract(&sample(json!({"enum_values": {"v1": 13}}))),
            FieldValue::Value(PointValue::Integer(13))
        );
    }

    #[test]
    fn test_null_is_distinct_from_missing() {
        let key = ResolvedKey::Field("average".to_string());
        assert_eq!(key.extract(&sample(json!({"average": null}))), FieldValue::Null);
        assert_eq!(key.extract(&sample(json!({"latest": 1}))), FieldValue::Missing);
        assert!(key.exists(&sample(json!({"average": null}))));
        assert_eq!(key.extract(&sample(json!({"average": "n/a"}))), FieldValue::Null);
    }

    #[test]
    fn test_integer_interpolation_floors() {
        let a = PointValue::Integer(13);
        let b = PointValue::Integer(11);
        assert_eq!(PointValue::interpolate(a, b, 1, 3), PointValue::Integer(12));
        assert_eq!(PointValue::interpolate(a, b, 2, 3), PointValue::Integer(11));

        let a = PointValue::Integer(7);
        let b = PointValue::Integer(3);
        assert_eq!(PointValue::interpolate(a, b, 1, 3), PointValue::Integer(5));
        assert_eq!(PointValue::interpolate(a, b, 2, 3), PointValue::Integer(4));
    }

    #[test]
    fn test_integer_interpolation_extreme_endpoints() {
        let (min, max) = (PointValue::Integer(i64::MIN), PointValue::Integer(i64::MAX));
        assert_eq!(PointValue::interpolate(min, max, 1, 2), PointValue::Integer(-1));
        assert_eq!(PointValue::interpolate(max, min, 1, 2), PointValue::Integer(-1));
        assert_eq!(PointValue::interpolate(max, min, 2, 2), min);
        assert_eq!(PointValue::interpolate(min, max, 0, 7), min);

        let a = PointValue::Integer(i64::MIN / 2);
        let b = PointValue::Integer(i64::MAX / 2);
        assert_eq!(PointValue::interpolate(a, b, 1, 2), PointValue::Integer(-1));
        assert_eq!(
            PointValue::interpolate(a, b, 1, 3),
            PointValue::Integer(-1_537_228_672_809_129_302)
        );
    }

    #[test]
    fn test_float_interpolation() {
        let v = PointValue::interpolate(PointValue::Integer(10), PointValue::Float(40.0), 1, 3);
        assert_eq!(v, PointValue::Float(20.0));
        let v = PointValue::interpolate(PointValue::Float(4449.97), PointValue::Float(14449.97), 1, 3);
        match v {
            PointValue::Float(f) => assert!((f - 7783.303333333333).abs() < 1e-9),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_point_value_from_json() {
        assert_eq!(PointValue::from_json(&json!(3)), Some(PointValue::Integer(3)));
        assert_eq!(PointValue::from_json(&json!(1.5)), Some(PointValue::Float(1.5)));
        assert_eq!(PointValue::from_json(&json!("3")), None);
        assert_eq!(serde_json::to_string(&PointValue::Integer(3)).unwrap(), "3");
    }
}
