/*!

Types associated with configuration parameters.

`Config` (see `config.rs`) holds the solver's working defaults as plain fields; this module is the
thin layer underneath it that reads an *override* file in from disk at runtime, the way the
original reads its command-line flags. Rather than re-deriving a flag parser, the override file is
a flat JSON object of `name -> value`, parsed with the `json` crate.

*/

use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

use json::JsonValue;

use crate::Error;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ParameterValue {
  UnsignedInteger(u64),
  Bool(bool),
  Double(f64),
}

impl ParameterValue {
  fn from_json(value: &JsonValue) -> Option<Self> {
    if let Some(b) = value.as_bool() {
      return Some(ParameterValue::Bool(b));
    }
    if let Some(n) = value.as_u64() {
      return Some(ParameterValue::UnsignedInteger(n));
    }
    value.as_f64().map(ParameterValue::Double)
  }

  pub fn as_u64(&self) -> Option<u64> {
    match self {
      ParameterValue::UnsignedInteger(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      ParameterValue::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      ParameterValue::Double(d) => Some(*d),
      _ => None,
    }
  }
}

/// A flat table of overrides, keyed by parameter name (e.g. `"restart_base"`, `"max_memory"`).
/// Unrecognized keys are kept around rather than rejected: `Config::apply_overrides` only reads
/// the names it knows about, so a newer override file works against an older binary.
#[derive(Clone, Debug, Default)]
pub struct Parameters {
  values: HashMap<String, ParameterValue>,
}

impl Parameters {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<ParameterValue> {
    self.values.get(name).copied()
  }

  pub fn set(&mut self, name: &str, value: ParameterValue) {
    self.values.insert(name.to_string(), value);
  }

  /// Reads a flat JSON object of parameter overrides from `path`.
  pub fn load(path: &Path) -> Result<Self, Error> {
    let text = read_to_string(path)
      .map_err(|e| Error::config(format!("could not read parameter file {:?}: {}", path, e)))?;
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<Self, Error> {
    let parsed =
      json::parse(text).map_err(|e| Error::config(format!("malformed parameter JSON: {}", e)))?;

    let mut values = HashMap::new();
    if let JsonValue::Object(object) = parsed {
      for (key, value) in object.iter() {
        if let Some(parsed_value) = ParameterValue::from_json(value) {
          values.insert(key.to_string(), parsed_value);
        }
      }
    } else {
      return Err(Error::config("expected a top-level JSON object of parameter overrides"));
    }

    Ok(Self { values })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_mixed_value_types() {
    let params = Parameters::parse(r#"{"restart_base": 256, "recover_late_clause": true, "var_decay": 0.95}"#).unwrap();
    assert_eq!(params.get("restart_base").unwrap().as_u64(), Some(256));
    assert_eq!(params.get("recover_late_clause").unwrap().as_bool(), Some(true));
    assert_eq!(params.get("var_decay").unwrap().as_f64(), Some(0.95));
  }

  #[test]
  fn rejects_non_object_top_level() {
    assert!(Parameters::parse("[1, 2, 3]").is_err());
  }

  #[test]
  fn unknown_keys_are_kept_but_harmless() {
    let params = Parameters::parse(r#"{"some_future_flag": 1}"#).unwrap();
    assert!(params.get("some_future_flag").is_some());
    assert!(params.get("restart_base").is_none());
  }
}
