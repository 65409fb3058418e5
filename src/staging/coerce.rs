//! Lenient field deserializers for raw log and catalog JSON.
//!
//! The raw logs are not consistently typed: `userId` arrives as `"39"`, as `39`
//! or as `""` for logged-out sessions, and `registration` is a float holding an
//! epoch in millis. These helpers coerce such values to the staging column
//! types and reject anything that cannot be represented.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn value_to_int<E: Error>(value: Value) -> Result<Option<i64>, E> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(Some)
            .ok_or_else(|| E::custom(format!("{} is not an integer", n))),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map(Some)
                .ok_or_else(|| E::custom(format!("\"{}\" is not an integer", s)))
        }
        other => Err(E::custom(format!("expected an integer, got {}", other))),
    }
}

pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => value_to_int(value),
    }
}

pub fn required_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    int(deserializer)?.ok_or_else(|| D::Error::custom("value is required"))
}

pub fn float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("{} is not a float", n))),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("\"{}\" is not a float", s)))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected a float, got {}",
            other
        ))),
    }
}

pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar, got {}",
            other
        ))),
    }
}
