/*!

Handles emitting debug, assert, verbose, and generic log messages.

Mirrors the two-tier model of the original SMCHR `debug.c`/`options.c`: a
per-tag `trace!` facility for targeted diagnostics (enabled rule firings,
store hash probes, ...) and an integer `verbosity` knob that gates generic
progress messages. Both are process-wide, which is fine because the solver
itself is single-threaded (§5).

*/

pub use assertions::*;
pub use trace::*;
pub use verbosity::*;

pub(crate) mod assertions {
  use crate::SMCHR_FULL_VERSION;
  use std::sync::atomic::AtomicBool;

  pub(crate) static ASSERTIONS_ENABLED: AtomicBool = AtomicBool::new(true);

  /// Prints an assertion violation to `stderr`.
  pub fn notify_assertion_violation(code: &str, file: &str, line: u32) {
    eprintln!(
      "ASSERTION VIOLATION\nFile: {}\nLine: {}\n{}",
      file, line, code,
    );

    #[cfg(feature = "debug")]
    {
      eprintln!(
        "(tracking SMCHR {}; please file an issue describing how you encountered this)",
        SMCHR_FULL_VERSION
      );
    }
  }

  /// A logged assert that includes source location on failure. Non-fatal. Equivalent to
  /// `SASSERT` in the original.
  #[macro_export]
  macro_rules! sassert {
    ($cond:expr) => {{
      #[cfg(feature = "debug")]
      {
        if $crate::log::assertions::ASSERTIONS_ENABLED.load(std::sync::atomic::Ordering::Relaxed)
          && !($cond)
        {
          $crate::log::assertions::notify_assertion_violation(
            stringify!($cond),
            file!(),
            line!(),
          );
        }
      }
    }};
  }

  /// A logged assert that includes source location on failure and panics. Unlike `sassert!`,
  /// `verify!` is not guarded by a feature flag.
  #[macro_export]
  macro_rules! verify {
    ($cond:expr) => {{
      if !($cond) {
        $crate::log::assertions::notify_assertion_violation(
          stringify!($cond),
          file!(),
          line!(),
        );
        panic!("failed to verify: {}", stringify!($cond));
      }
    }};
  }
}

pub(crate) mod trace {
  use std::collections::HashMap;
  use std::sync::Mutex;

  static ENABLED_TRACES: Mutex<Option<HashMap<String, bool>>> = Mutex::new(None);

  fn print_trace(text: &str) {
    eprintln!("{}", text);
  }

  /// Auxiliary helper for `trace!`, do not use directly.
  pub fn trace_prefix(tag: &str, function: &str, filename: &str, line_number: u32) {
    print_trace(&format!(
      "-------- [{}] {} {}:{} ---------",
      tag, function, filename, line_number
    ));
  }

  /// Auxiliary helper for `trace!`, do not use directly.
  pub fn trace_suffix() {
    print_trace("------------------------------------------------");
  }

  pub fn is_trace_enabled(tag: &str) -> bool {
    let guard = ENABLED_TRACES.lock().unwrap();
    guard.as_ref().and_then(|m| m.get(tag)).copied().unwrap_or(false)
  }

  pub fn update_trace(tag: &str, enable: bool) {
    let mut guard = ENABLED_TRACES.lock().unwrap();
    guard.get_or_insert_with(HashMap::new).insert(tag.to_string(), enable);
  }

  /// Runs `$code` only when tracing is enabled for `$tag`, bracketed by a header/footer.
  #[macro_export]
  macro_rules! trace {
    ($tag:expr, $code:expr) => {{
      if $crate::log::trace::is_trace_enabled($tag) {
        $crate::log::trace::trace_prefix($tag, "trace", file!(), line!());
        $code;
        $crate::log::trace::trace_suffix();
      }
    }};
  }
}

// Global control over verbose messaging.
pub(crate) mod verbosity {
  use std::sync::atomic::{AtomicI32, Ordering};

  static VERBOSITY: AtomicI32 = AtomicI32::new(0);

  pub(crate) fn verbosity_is_at_least(lvl: i32) -> bool {
    lvl <= VERBOSITY.load(Ordering::Relaxed)
  }

  pub fn set_verbosity(new_value: i32) {
    VERBOSITY.store(new_value, Ordering::Relaxed);
  }

  pub fn get_verbosity() -> i32 {
    VERBOSITY.load(Ordering::Relaxed)
  }

  fn verbose_emit(msg: &str) {
    eprintln!("{}", msg);
  }

  /// Equivalent to z3's `IF_VERBOSE`: emits `msg` only if the current verbosity is at least `level`.
  pub fn log_at_level(level: i32, msg: &str) {
    if verbosity_is_at_least(level) {
      verbose_emit(msg);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trace_tags_toggle_independently() {
    trace::update_trace("sat", true);
    assert!(trace::is_trace_enabled("sat"));
    assert!(!trace::is_trace_enabled("chr"));
    trace::update_trace("sat", false);
    assert!(!trace::is_trace_enabled("sat"));
  }

  #[test]
  fn verbosity_gate() {
    verbosity::set_verbosity(2);
    assert!(verbosity::verbosity_is_at_least(1));
    assert!(verbosity::verbosity_is_at_least(2));
    assert!(!verbosity::verbosity_is_at_least(3));
  }
}
