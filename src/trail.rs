/*!

A generic undo log ("trail" in the original SMCHR sources), the `trail(&x->next)` /
`trail_func(var_reverse, info)` mechanism generalized to safe Rust.

The original solver is built around a single append-only array of "undo closures": a C function
pointer plus an opaque argument, invoked in reverse order when the SAT engine backtracks past the
point at which they were pushed. Rust has no equivalent of a self-referential closure capturing
`&mut Solver` that can be stored and replayed later without either `unsafe` or a `Box<dyn FnMut>`
that aliases the very state it mutates.

Instead, each stateful subsystem (the union-find in `union_find`, the constraint store in
`store`, the propagator queue in `propagator`, the SAT engine in `sat`) defines its own small
`Op` enum recording *what value was overwritten*, and owns one `Trail<Op>`. Backtracking to a
decision level means: for every subsystem, pop its trail back down to the mark recorded when that
level was pushed, applying each op's inverse. This keeps undo data next to the state it undoes and
needs no dynamic dispatch or unsafe code, at the cost of one small enum per subsystem instead of
one generic closure type.

*/

/// An opaque position in a `Trail`, returned by `Trail::mark` and consumed by `Trail::undo_to`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Mark(usize);

/// An append-only log of undo operations of type `Op`.
#[derive(Clone, Debug)]
pub struct Trail<Op> {
  ops: Vec<Op>,
}

impl<Op> Trail<Op> {
  pub fn new() -> Self {
    Self { ops: Vec::new() }
  }

  pub fn push(&mut self, op: Op) {
    self.ops.push(op);
  }

  /// The current trail position; pass this to `undo_to` to later undo everything pushed since.
  pub fn mark(&self) -> Mark {
    Mark(self.ops.len())
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  /// Pops operations back down to `mark`, applying `undo` to each one in LIFO order -- the same
  /// order the original's per-variable reverse-the-path trail function relies on.
  pub fn undo_to<F>(&mut self, mark: Mark, mut undo: F)
  where
    F: FnMut(Op),
  {
    while self.ops.len() > mark.0 {
      let op = self.ops.pop().expect("checked len() > mark.0 above");
      undo(op);
    }
  }
}

impl<Op> Default for Trail<Op> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn undo_to_replays_in_lifo_order() {
    let mut trail: Trail<i32> = Trail::new();
    let mark = trail.mark();
    trail.push(1);
    trail.push(2);
    trail.push(3);

    let mut undone = Vec::new();
    trail.undo_to(mark, |op| undone.push(op));

    assert_eq!(undone, vec![3, 2, 1]);
    assert!(trail.is_empty());
  }

  #[test]
  fn undo_to_is_a_no_op_at_the_current_mark() {
    let mut trail: Trail<&str> = Trail::new();
    trail.push("a");
    let mark = trail.mark();

    let mut undone = Vec::new();
    trail.undo_to(mark, |op| undone.push(op));

    assert!(undone.is_empty());
    assert_eq!(trail.len(), 1);
  }
}
