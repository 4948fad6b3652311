//! Typed configuration store.
//!
//! ## Key normalization
//!
//! Parameters may be addressed as `hmm`, `-hmm`, `--hmm` or `_hmm`. The
//! exact spelling is tried first, then the spelling with its marker
//! stripped. Entries are stored under their bare canonical name, so every
//! alias reads and writes the same slot.
//!
//! ## Values
//!
//! Each slot holds an optional [`ParamValue`]. Only string parameters can be
//! unset (`None`); every other kind always has a value, starting from its
//! schema default.

pub mod schema;
pub mod value;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{MurmurError, Result};

pub use schema::{default_schema, ParamDef, ParamKind};
pub use value::ParamValue;

#[derive(Debug, Clone)]
struct Slot {
    def: ParamDef,
    default: Option<ParamValue>,
    value: Option<ParamValue>,
}

/// Parameter table with a fixed schema.
#[derive(Debug, Clone)]
pub struct Config {
    slots: BTreeMap<String, Slot>,
}

/// Strip a leading `-`, `--` or `_` marker.
fn strip_marker(name: &str) -> &str {
    name.strip_prefix("--")
        .or_else(|| name.strip_prefix('-'))
        .or_else(|| name.strip_prefix('_'))
        .unwrap_or(name)
}

impl Config {
    /// Build a store from an engine-reported schema.
    ///
    /// Schema spellings that collapse to the same canonical name are merged
    /// (first definition wins). Definitions whose default does not parse as
    /// their own kind are skipped. String defaults are kept verbatim, so an
    /// empty default is a set empty string rather than unset.
    pub fn new(schema: impl IntoIterator<Item = ParamDef>) -> Self {
        let mut slots = BTreeMap::new();
        for mut def in schema {
            let canonical = strip_marker(&def.name).to_string();
            if slots.contains_key(&canonical) {
                debug!(name = %def.name, "duplicate schema spelling collapsed");
                continue;
            }
            let default = match def.default.as_deref() {
                None => None,
                Some(text) => match ParamValue::parse(def.kind, text) {
                    Some(v) => Some(v),
                    None => {
                        warn!("bad default value for {}: {:?}", def.name, text);
                        continue;
                    }
                },
            };
            def.name = canonical.clone();
            slots.insert(
                canonical,
                Slot {
                    def,
                    value: default.clone(),
                    default,
                },
            );
        }
        Self { slots }
    }

    /// Resolve any accepted spelling to the canonical name.
    fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.slots.get_key_value(name) {
            return Some(key);
        }
        self.slots
            .get_key_value(strip_marker(name))
            .map(|(key, _)| key.as_str())
    }

    fn slot(&self, name: &str) -> Result<&Slot> {
        self.resolve(name)
            .and_then(|key| self.slots.get(key))
            .ok_or_else(|| MurmurError::UnknownParameter(name.to_string()))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut Slot> {
        let key = if self.slots.contains_key(name) {
            name
        } else {
            strip_marker(name)
        };
        self.slots
            .get_mut(key)
            .ok_or_else(|| MurmurError::UnknownParameter(name.to_string()))
    }

    /// Set a parameter.
    ///
    /// # Errors
    /// - `UnknownParameter` if `name` is not in the schema.
    /// - `TypeMismatch` if the value's variant does not match the parameter
    ///   kind (integers are accepted for float parameters).
    /// - `InvalidValue` for a NaN or infinite float.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let slot = self.slot_mut(name)?;
        if !value.is_storable() {
            return Err(MurmurError::InvalidValue {
                name: slot.def.name.clone(),
                value: format!("{value:?}"),
            });
        }
        let found = value.kind_name();
        let value = value.conform(slot.def.kind).ok_or_else(|| MurmurError::TypeMismatch {
            name: slot.def.name.clone(),
            expected: slot.def.kind,
            found,
        })?;
        slot.value = Some(value);
        Ok(())
    }

    /// Boolean-returning form of [`Config::set`].
    pub fn try_set(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        match self.set(name, value) {
            Ok(()) => true,
            Err(e) => {
                debug!("set {name} rejected: {e}");
                false
            }
        }
    }

    /// Set a parameter from text, parsed according to its kind.
    pub fn set_from_str(&mut self, name: &str, text: &str) -> Result<()> {
        let slot = self.slot_mut(name)?;
        let value = ParamValue::parse(slot.def.kind, text).ok_or_else(|| MurmurError::InvalidValue {
            name: slot.def.name.clone(),
            value: text.to_string(),
        })?;
        slot.value = Some(value);
        Ok(())
    }

    /// Set a parameter from a JSON value, coerced to its kind. `null`
    /// restores the default.
    pub fn set_json(&mut self, name: &str, json: &serde_json::Value) -> Result<()> {
        let slot = self.slot_mut(name)?;
        match ParamValue::from_json(slot.def.kind, json) {
            Ok(Some(value)) => slot.value = Some(value),
            Ok(None) => slot.value = slot.default.clone(),
            Err(()) => {
                return Err(MurmurError::InvalidValue {
                    name: slot.def.name.clone(),
                    value: json.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Current value; `None` only for an unset string parameter.
    pub fn get(&self, name: &str) -> Result<Option<ParamValue>> {
        Ok(self.slot(name)?.value.clone())
    }

    /// Reset a parameter to its schema default.
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let slot = self.slot_mut(name)?;
        slot.value = slot.default.clone();
        Ok(())
    }

    /// Whether `name` (in any accepted spelling) is a known parameter.
    pub fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn kind_of(&self, name: &str) -> Result<ParamKind> {
        Ok(self.slot(name)?.def.kind)
    }

    fn mismatch(slot: &Slot, found: &'static str) -> MurmurError {
        MurmurError::TypeMismatch {
            name: slot.def.name.clone(),
            expected: slot.def.kind,
            found,
        }
    }

    pub fn get_str(&self, name: &str) -> Result<Option<&str>> {
        let slot = self.slot(name)?;
        match (&slot.def.kind, &slot.value) {
            (ParamKind::String, v) => Ok(v.as_ref().and_then(ParamValue::as_str)),
            _ => Err(Self::mismatch(slot, "string")),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        let slot = self.slot(name)?;
        match slot.value {
            Some(ParamValue::Int(i)) => Ok(i),
            _ => Err(Self::mismatch(slot, "integer")),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        let slot = self.slot(name)?;
        match slot.value {
            Some(ParamValue::Float(f)) => Ok(f),
            _ => Err(Self::mismatch(slot, "float")),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let slot = self.slot(name)?;
        match slot.value {
            Some(ParamValue::Bool(b)) => Ok(b),
            _ => Err(Self::mismatch(slot, "boolean")),
        }
    }

    /// Number of parameters. Fixed for the lifetime of the store.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Canonical names and current values, in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ParamValue>)> {
        self.slots
            .iter()
            .map(|(name, slot)| (name.as_str(), slot.value.as_ref()))
    }

    /// Canonical parameter names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Schema definitions, in sorted name order.
    pub fn describe(&self) -> impl Iterator<Item = &ParamDef> {
        self.slots.values().map(|slot| &slot.def)
    }

    /// All set-or-default values. Unset string parameters are omitted.
    pub fn snapshot(&self) -> BTreeMap<String, ParamValue> {
        self.iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v.clone())))
            .collect()
    }

    /// Serialize [`Config::snapshot`] as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Apply every entry of a JSON object. Keys may use any accepted
    /// spelling; unknown keys are an error.
    pub fn apply_json(&mut self, json: &str) -> Result<()> {
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        for (key, value) in &entries {
            self.set_json(key, value)?;
        }
        Ok(())
    }

    /// Build a store over `schema` and apply a [`Config::to_json`] document.
    pub fn from_json(schema: impl IntoIterator<Item = ParamDef>, json: &str) -> Result<Self> {
        let mut config = Self::new(schema);
        config.apply_json(json)?;
        Ok(config)
    }

    /// Path for a model resource: the value of `key` if set, otherwise
    /// `file` inside the acoustic model directory (`hmm`).
    pub fn model_file_path(&self, key: &str, file: &str) -> Result<String> {
        if let Some(path) = self.get_str(key)? {
            return Ok(path.to_string());
        }
        match self.get_str("hmm")? {
            Some(hmm) => Ok(format!("{}/{}", hmm.trim_end_matches('/'), file)),
            None => Err(MurmurError::MissingModelPath(key.to_string())),
        }
    }

    /// Cross-parameter checks: at most one grammar source may be configured.
    pub fn validate(&self) -> Result<()> {
        let grammars = ["jsgf", "fsg"]
            .iter()
            .filter(|key| matches!(self.get_str(key), Ok(Some(_))))
            .count();
        if grammars > 1 {
            return Err(MurmurError::ConflictingGrammars);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_schema())
    }
}
