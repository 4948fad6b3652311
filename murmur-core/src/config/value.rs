//! Tagged parameter values and the coercion rules used when values arrive
//! as text (parameter files) or JSON (serialized configurations).

use serde::{Deserialize, Serialize};

use super::ParamKind;

/// A typed parameter value.
///
/// Serialized untagged, so a snapshot reads as plain JSON
/// (`{"samprate": 16000.0, "dict": "turtle.dic", "cionly": false}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "boolean",
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
        }
    }

    /// Check this value against `kind`, widening integers for float
    /// parameters. Returns `None` when the kinds are incompatible.
    pub(crate) fn conform(self, kind: ParamKind) -> Option<ParamValue> {
        match (kind, self) {
            (ParamKind::String, v @ ParamValue::Str(_)) => Some(v),
            (ParamKind::Integer, v @ ParamValue::Int(_)) => Some(v),
            (ParamKind::Float, v @ ParamValue::Float(_)) => Some(v),
            (ParamKind::Float, ParamValue::Int(i)) => Some(ParamValue::Float(i as f64)),
            (ParamKind::Boolean, v @ ParamValue::Bool(_)) => Some(v),
            _ => None,
        }
    }

    /// Whether a float may be stored. NaN and the infinities never may.
    pub(crate) fn is_storable(&self) -> bool {
        match self {
            ParamValue::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    /// Parse `text` as a value of `kind`.
    ///
    /// Strings are taken verbatim, including the empty string. Other kinds
    /// are trimmed first and empty text is invalid for them. Booleans are
    /// decided by their first character (`y`/`t`/`1` or `n`/`f`/`0`, any
    /// case). Floats must be finite.
    pub fn parse(kind: ParamKind, text: &str) -> Option<ParamValue> {
        if kind == ParamKind::String {
            return Some(ParamValue::Str(text.to_string()));
        }
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match kind {
            ParamKind::String => None,
            ParamKind::Integer => text.parse().ok().map(ParamValue::Int),
            ParamKind::Float => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(ParamValue::Float),
            ParamKind::Boolean => match text.as_bytes()[0].to_ascii_lowercase() {
                b'y' | b't' | b'1' => Some(ParamValue::Bool(true)),
                b'n' | b'f' | b'0' => Some(ParamValue::Bool(false)),
                _ => None,
            },
        }
    }

    /// Coerce a JSON value to `kind`. `Ok(None)` means JSON `null` (unset).
    pub(crate) fn from_json(kind: ParamKind, json: &serde_json::Value) -> Result<Option<ParamValue>, ()> {
        use serde_json::Value;

        let value = match (kind, json) {
            (_, Value::Null) => return Ok(None),
            (ParamKind::String, Value::String(s)) => Some(ParamValue::Str(s.clone())),
            (_, Value::String(s)) => ParamValue::parse(kind, s),
            (ParamKind::String, Value::Number(n)) => Some(ParamValue::Str(n.to_string())),
            (ParamKind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(ParamValue::Int),
            (ParamKind::Float, Value::Number(n)) => n.as_f64().map(ParamValue::Float),
            (ParamKind::Boolean, Value::Number(n)) => n.as_f64().map(|f| ParamValue::Bool(f != 0.0)),
            (ParamKind::Boolean, Value::Bool(b)) => Some(ParamValue::Bool(*b)),
            _ => None,
        };
        value.map(Some).ok_or(())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_booleans_by_first_character() {
        for yes in ["yes", "Y", "true", "T", "1"] {
            assert_eq!(ParamValue::parse(ParamKind::Boolean, yes), Some(ParamValue::Bool(true)));
        }
        for no in ["no", "N", "false", "F", "0"] {
            assert_eq!(ParamValue::parse(ParamKind::Boolean, no), Some(ParamValue::Bool(false)));
        }
        assert_eq!(ParamValue::parse(ParamKind::Boolean, "maybe"), None);
    }

    #[test]
    fn parse_rejects_empty_and_malformed_numbers() {
        assert_eq!(ParamValue::parse(ParamKind::Integer, ""), None);
        assert_eq!(ParamValue::parse(ParamKind::Integer, "12.5"), None);
        assert_eq!(ParamValue::parse(ParamKind::Integer, " 1024 "), Some(ParamValue::Int(1024)));
        assert_eq!(ParamValue::parse(ParamKind::Float, "1e-48"), Some(ParamValue::Float(1e-48)));
        assert_eq!(ParamValue::parse(ParamKind::Float, "inf"), None);
        assert_eq!(ParamValue::parse(ParamKind::Float, "NaN"), None);
    }

    #[test]
    fn strings_parse_verbatim() {
        assert_eq!(ParamValue::parse(ParamKind::String, ""), Some(ParamValue::Str(String::new())));
        assert_eq!(
            ParamValue::parse(ParamKind::String, "  two words "),
            Some(ParamValue::Str("  two words ".into()))
        );
        assert_eq!(
            ParamValue::from_json(ParamKind::String, &json!(" ")),
            Ok(Some(ParamValue::Str(" ".into())))
        );
        assert_eq!(
            ParamValue::from_json(ParamKind::String, &json!("")),
            Ok(Some(ParamValue::Str(String::new())))
        );
    }

    #[test]
    fn conform_widens_integers_only_for_floats() {
        assert_eq!(ParamValue::Int(8000).conform(ParamKind::Float), Some(ParamValue::Float(8000.0)));
        assert_eq!(ParamValue::Float(1.5).conform(ParamKind::Integer), None);
        assert_eq!(ParamValue::Bool(true).conform(ParamKind::Integer), None);
        assert_eq!(ParamValue::Str("x".into()).conform(ParamKind::Boolean), None);
    }

    #[test]
    fn json_coercion_follows_parameter_kind() {
        assert_eq!(
            ParamValue::from_json(ParamKind::Integer, &json!("1024")),
            Ok(Some(ParamValue::Int(1024)))
        );
        assert_eq!(
            ParamValue::from_json(ParamKind::Float, &json!(48000)),
            Ok(Some(ParamValue::Float(48000.0)))
        );
        assert_eq!(
            ParamValue::from_json(ParamKind::String, &json!(13)),
            Ok(Some(ParamValue::Str("13".into())))
        );
        assert_eq!(ParamValue::from_json(ParamKind::String, &json!(null)), Ok(None));
        assert!(ParamValue::from_json(ParamKind::Boolean, &json!([1, 2])).is_err());
    }

    #[test]
    fn untagged_serialization_keeps_variant() {
        let values = vec![
            ParamValue::Bool(true),
            ParamValue::Int(-1),
            ParamValue::Float(0.025625),
            ParamValue::Str("live".into()),
        ];
        let text = serde_json::to_string(&values).expect("serialize values");
        assert_eq!(text, r#"[true,-1,0.025625,"live"]"#);
        let back: Vec<ParamValue> = serde_json::from_str(&text).expect("deserialize values");
        assert_eq!(back, values);
    }
}
