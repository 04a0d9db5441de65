/*!

Typed, validated configuration consumed internally by the solver. Mirrors the teacher's split
between a typed `Config` and an untyped `parameters::Parameters` override database: the handful of
numeric knobs that are tunable (restart base factor, activity decay, simplex pivot bound, domain
expansion cap) can be overridden from a JSON parameter file without recompiling, via
`Config::from_parameters`; everything else is a plain field with a sensible built-in default.

*/

use crate::parameters::Parameters;
use crate::Error;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum RestartStrategy {
  /// The Luby sequence times a base factor of conflicts (the default).
  Luby,
  /// A fixed number of conflicts between restarts, ignoring the Luby sequence.
  Static,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Config {
  // region SAT engine
  /// Base factor multiplying the Luby sequence to get the conflict count before a restart.
  pub restart_base: u32,
  pub restart_strategy: RestartStrategy,
  /// Every `activity_decay_interval` backtracks, every variable's activity is halved.
  pub activity_decay_interval: u32,
  /// Amount every literal touched during conflict analysis bumps its variable's activity by.
  pub activity_bump: f64,
  // endregion

  // region theory/store
  /// Numerator/denominator bound for the linear theory's exact rationals (`Error::OverflowError`
  /// past this).
  pub simplex_max_int: i64,
  /// Hard cap on how many integers `theory::domain`'s `dom(x, lb, ub)` will expand eagerly.
  pub domain_expansion_cap: u32,
  // endregion

  // region CHR VM
  pub chr_max_registers: u16,
  pub chr_max_value_stack: u16,
  // endregion

  // region protocol
  /// When `true`, a theory propagator posting a "late clause" (every literal from an older
  /// decision level) is recovered via backjump-and-retry instead of raising
  /// `Error::ProtocolError`. Defaults to `false`, matching the original's strictness.
  pub recover_late_clause: bool,
  // endregion

  /// `0` means unlimited (see `ResourceLimit`).
  pub max_memory_mb: u64,
  pub max_conflicts: u64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      restart_base: 256,
      restart_strategy: RestartStrategy::Luby,
      activity_decay_interval: 256,
      activity_bump: 1.0,
      simplex_max_int: 1 << 48,
      domain_expansion_cap: 1 << 16,
      chr_max_registers: 256,
      chr_max_value_stack: 1024,
      recover_late_clause: false,
      max_memory_mb: 0,
      max_conflicts: 0,
    }
  }
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  /// Projects the untyped `Parameters` override database onto a `Config`, raising
  /// `Error::ConfigError` on a mistyped value. Unrecognized keys are ignored (forward
  /// compatibility, see `parameters.rs`).
  pub fn from_parameters(parameters: &Parameters) -> Result<Self, Error> {
    let mut config = Self::default();

    if let Some(value) = parameters.get("restart_base") {
      config.restart_base = value
        .as_u64()
        .ok_or_else(|| Error::config("restart_base must be an unsigned integer"))? as u32;
    }
    if let Some(value) = parameters.get("activity_decay_interval") {
      config.activity_decay_interval = value
        .as_u64()
        .ok_or_else(|| Error::config("activity_decay_interval must be an unsigned integer"))? as u32;
    }
    if let Some(value) = parameters.get("recover_late_clause") {
      config.recover_late_clause = value
        .as_bool()
        .ok_or_else(|| Error::config("recover_late_clause must be a boolean"))?;
    }
    if let Some(value) = parameters.get("domain_expansion_cap") {
      config.domain_expansion_cap = value
        .as_u64()
        .ok_or_else(|| Error::config("domain_expansion_cap must be an unsigned integer"))? as u32;
    }
    if let Some(value) = parameters.get("max_memory_mb") {
      config.max_memory_mb =
        value.as_u64().ok_or_else(|| Error::config("max_memory_mb must be an unsigned integer"))?;
    }
    if let Some(value) = parameters.get("max_conflicts") {
      config.max_conflicts =
        value.as_u64().ok_or_else(|| Error::config("max_conflicts must be an unsigned integer"))?;
    }

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_baseline() {
    let config = Config::default();
    assert_eq!(config.restart_base, 256);
    assert!(!config.recover_late_clause);
  }

  #[test]
  fn from_parameters_overrides_only_named_fields() {
    let params = Parameters::parse(r#"{"restart_base": 512, "recover_late_clause": true}"#).unwrap();
    let config = Config::from_parameters(&params).unwrap();
    assert_eq!(config.restart_base, 512);
    assert!(config.recover_late_clause);
    assert_eq!(config.activity_decay_interval, 256); // left at default
  }

  #[test]
  fn mistyped_override_is_a_config_error() {
    let params = Parameters::parse(r#"{"restart_base": true}"#).unwrap();
    assert!(Config::from_parameters(&params).is_err());
  }
}
