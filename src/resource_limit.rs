/*!

An aggregate type describing limits on the resources a solver is allowed to use: a step counter
plus a cancellation flag, checked periodically by the SAT loop (`sat::Engine::run`) and the CHR VM
so that a long-running query can be aborted cleanly.

The solver itself is single-threaded and cooperative, but `cancel()` may legitimately be called
from another thread (a UI "stop" button, a `Ctrl-C` handler), so the cancellation flag is atomic;
everything else here is only ever touched from the solver's own thread.

*/

use std::sync::atomic::{AtomicBool, Ordering};

pub const CANCELED_MSG: &str = "canceled";
pub const MAX_STEPS_MSG: &str = "max. steps exceeded";
pub const MAX_RESOURCE_MSG: &str = "max. resource limit exceeded";

/// Tracks a step count against an optional ceiling, plus an independently settable cancel flag.
/// `push`/`pop` nest scoped limits (tighter limits only ever shrink the effective ceiling while
/// in scope); `ScopedResourceLimit` and `ScopedSuspendedResourceLimit` are RAII wrappers over
/// `push`/`pop` and the suspend flag respectively.
#[derive(Debug, Default)]
pub struct ResourceLimit {
  canceled: AtomicBool,
  suspended: bool,
  count: u64,
  /// `None` means unlimited.
  limit: Option<u64>,
  /// Previous values of `limit`, restored in LIFO order by `pop`.
  saved_limits: Vec<Option<u64>>,
}

impl ResourceLimit {
  pub fn new() -> Self {
    Self::default()
  }

  /// Pushes a new ceiling of `count() + delta` (or leaves it unlimited if `delta == 0`),
  /// narrowing it against whatever limit is already in effect. The old limit is restored by the
  /// matching `pop`.
  pub fn push(&mut self, delta: u64) {
    let new_limit = if delta == 0 { None } else { Some(self.count.saturating_add(delta)) };
    self.saved_limits.push(self.limit);
    self.limit = match (self.limit, new_limit) {
      (Some(a), Some(b)) => Some(u64::min(a, b)),
      (Some(a), None) => Some(a),
      (None, Some(b)) => Some(b),
      (None, None) => None,
    };
  }

  pub fn pop(&mut self) {
    self.limit = self.saved_limits.pop().unwrap_or(None);
  }

  /// Advances the step count by `n` and returns whether the limit still permits progress.
  pub fn inc_by(&mut self, n: u64) -> bool {
    self.count += n;
    self.not_canceled()
  }

  pub fn inc(&mut self) -> bool {
    self.inc_by(1)
  }

  pub fn count(&self) -> u64 {
    self.count
  }

  pub fn suspended(&self) -> bool {
    self.suspended
  }

  pub fn not_canceled(&self) -> bool {
    self.suspended || (!self.canceled.load(Ordering::Relaxed) && self.limit.map_or(true, |l| self.count <= l))
  }

  pub fn is_canceled(&self) -> bool {
    !self.not_canceled()
  }

  pub fn cancel_msg(&self) -> &'static str {
    if self.canceled.load(Ordering::Relaxed) {
      CANCELED_MSG
    } else {
      MAX_RESOURCE_MSG
    }
  }

  /// Settable from another thread; see module docs.
  pub fn cancel(&self) {
    self.canceled.store(true, Ordering::Relaxed);
  }

  pub fn reset_cancel(&self) {
    self.canceled.store(false, Ordering::Relaxed);
  }
}

/// Pushes `limit` onto a `ResourceLimit` for the duration of this value's lifetime.
pub struct ScopedResourceLimit<'r> {
  resource_limit: &'r mut ResourceLimit,
}

impl<'r> ScopedResourceLimit<'r> {
  pub fn new(resource_limit: &'r mut ResourceLimit, limit: u64) -> Self {
    resource_limit.push(limit);
    Self { resource_limit }
  }
}

impl<'r> Drop for ScopedResourceLimit<'r> {
  fn drop(&mut self) {
    self.resource_limit.pop();
  }
}

/// Forces a `ResourceLimit` into the suspended state (never canceled, regardless of count/limit)
/// for the duration of this value's lifetime, restoring the prior suspend state on drop. Used
/// around sections that must not be interrupted mid-mutation (e.g. replaying the trail).
pub struct ScopedSuspendedResourceLimit<'r> {
  resource_limit: &'r mut ResourceLimit,
  original_suspend_state: bool,
}

impl<'r> ScopedSuspendedResourceLimit<'r> {
  pub fn new(resource_limit: &'r mut ResourceLimit) -> Self {
    let original_suspend_state = resource_limit.suspended;
    resource_limit.suspended = true;
    Self { resource_limit, original_suspend_state }
  }
}

impl<'r> Drop for ScopedSuspendedResourceLimit<'r> {
  fn drop(&mut self) {
    self.resource_limit.suspended = self.original_suspend_state;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inc_respects_pushed_limit() {
    let mut limit = ResourceLimit::new();
    {
      let _scope = ScopedResourceLimit::new(&mut limit, 3);
    }
    assert!(limit.not_canceled());
  }

  #[test]
  fn push_pop_restores_prior_limit() {
    let mut limit = ResourceLimit::new();
    limit.push(2);
    assert!(limit.inc());
    assert!(limit.inc());
    assert!(!limit.inc()); // count is now 3, over the limit of 2
    limit.pop();
    assert!(limit.not_canceled()); // unlimited again
  }

  #[test]
  fn cancel_takes_effect_immediately() {
    let limit = ResourceLimit::new();
    assert!(limit.not_canceled());
    limit.cancel();
    assert!(limit.is_canceled());
  }

  #[test]
  fn suspended_ignores_cancellation() {
    let mut limit = ResourceLimit::new();
    limit.cancel();
    assert!(limit.is_canceled());
    let _scope = ScopedSuspendedResourceLimit::new(&mut limit);
    assert!(limit.not_canceled());
  }
}
