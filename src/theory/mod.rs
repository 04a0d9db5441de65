/*!

The theory/SAT coupling contract (SPEC_FULL §4.8, §9's "longjmp-style unwind across theory" design
note). The original jumps back into the SAT loop via a raw saved stack pointer on failure or
restart; this crate models that as a result-returning call instead: every theory entry point
returns an `Outcome`, and `sat::Engine` acts on it at the Boolean-loop boundary rather than
unwinding through arbitrary call frames. The invariant SPEC_FULL §4.1 requires -- once failure is
signalled, no theory frame observes state beyond the failure point -- holds because a propagator
that fails returns immediately; nothing after a `ctx.fail(...)` call keeps running.

*/

pub mod bounds;
pub mod domain;
pub mod equality;
pub mod heaps;
pub mod linear;

use crate::propagator::EventMask;
use crate::store::Store;
use crate::union_find::UnionFind;
use crate::{ConsId, Literal, VarId};

/// The result of a single propagator wake or a lazy clause addition. See the module docs.
#[derive(Clone, Debug)]
pub enum Outcome {
  /// The propagator ran to completion; any side effects it wanted are already recorded in the
  /// `TheoryContext` it was given (asserted literals, added clauses, union-find binds).
  Propagate,
  /// An immediate conflict; `reason` is the clause to learn from (every literal false under the
  /// current trail, forming the basis for conflict analysis).
  Fail(Vec<Literal>),
  /// A unit clause was posted that requires unwinding to decision level 0 and propagating `unit`
  /// there before search can resume (`sat::Engine::add_clause_during_search`'s RESTART case).
  Restart(Literal),
}

/// A deferred SAT-level effect a theory propagator wants applied once it returns. Union-find and
/// store mutations are applied immediately (they carry their own trail); only effects that need
/// `sat::Engine`'s cooperation -- asserting a literal, adding a clause, or failing -- are queued
/// here and drained by the engine after the propagator yields.
#[derive(Clone, Debug)]
pub enum Action {
  AssertLiteral { lit: Literal, reason: Vec<Literal> },
  AddClause { lits: Vec<Literal>, keep: bool },
  Fail { reason: Vec<Literal> },
}

/// The environment a propagator runs in: shared access to the equality theory and constraint
/// store, plus an outbox for SAT-level effects.
pub struct TheoryContext<'a> {
  pub union_find: &'a mut UnionFind,
  pub store: &'a mut Store,
  pub actions: Vec<Action>,
}

impl<'a> TheoryContext<'a> {
  pub fn new(union_find: &'a mut UnionFind, store: &'a mut Store) -> Self {
    Self { union_find, store, actions: Vec::new() }
  }

  pub fn assert_literal(&mut self, lit: Literal, reason: Vec<Literal>) {
    self.actions.push(Action::AssertLiteral { lit, reason });
  }

  pub fn add_clause(&mut self, lits: Vec<Literal>, keep: bool) {
    self.actions.push(Action::AddClause { lits, keep });
  }

  pub fn fail(&mut self, reason: Vec<Literal>) -> Outcome {
    Outcome::Fail(reason)
  }
}

/// A theory solver registers itself against a set of symbols and is woken whenever one of its
/// constraints' event mask matches an emitted event (SPEC_FULL §4.2).
pub trait Propagator {
  fn name(&self) -> &'static str;

  /// Symbols (by `AtomId`) this solver attaches propagators to at constraint-construction time.
  fn symbols(&self) -> &[crate::AtomId];

  fn events(&self) -> EventMask;

  /// Runs on a wake of the propagator co-located with `cons`, whose reification literal was just
  /// decided to `value`.
  fn propagate(&mut self, ctx: &mut TheoryContext, cons: ConsId, value: bool) -> Outcome;

  /// Per-variable scratch-state hook: most solvers stash bounds/domain data here keyed by the
  /// variable's identity rather than on the constraint, since several constraints can share an
  /// argument. Default no-op for solvers that don't need it.
  fn on_variable_allocated(&mut self, _var: VarId) {}
}
