/*!

Finite-domain expansion, SPEC_FULL §4.8 and `original_source/solver_dom.c`. A `dom(x, lb, ub)`
constraint, once decided true, is expanded eagerly and exactly once into one `EQ_C(x, v)`
constraint per integer `v` in `[lb, ub]` plus a clause asserting at least one of them holds; the
bounds solver (`theory::bounds`) takes it from there, since two `EQ_C` constraints on the same
variable decided true simultaneously tighten its interval to an empty range and fail.

Expansion is capped by `Config::domain_expansion_cap` -- a `dom` whose range is wider than the cap
would otherwise blow up memory for what's almost always a modelling mistake (an unbounded integer
declared via `dom` rather than left to `theory::bounds`/`theory::linear`). The one-shot expansion
itself must never re-fire after a restart; `sat::Engine` annihilates (rather than merely kills) this
propagator's registration once it returns `Outcome::Propagate` for a `dom` constraint, per the
kill/annihilate distinction in `propagator.rs`.

Each minted `EQ_C(x, v)` needs its own reifying SAT variable -- it is a fresh disjunct, not a
rephrasing of an existing one -- and that variable must in turn wake `theory::bounds` the same way
`backend::Backend::wire_relation` wires a compile-time `EQ_C`. Expansion therefore runs under its
own `DomainContext`, which bundles the engine's variable minting, propagator registration, and wake
table the way `chr::vm::ChrContext` does for CHR's own mid-search variable minting.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::SolverSlot;
use crate::propagator::{EventMask, PropagatorQueue};
use crate::store::Store;
use crate::term::{Num, Term};
use crate::union_find::UnionFind;
use crate::{AtomId, BoolVariable, ConsId, PropId};

use super::{Action, Outcome};

/// The environment a `dom` expansion runs in: union-find/store access plus everything needed to
/// mint a fresh reifying SAT variable per disjunct and wire it into `theory::bounds`, mirroring
/// `chr::vm::ChrContext`'s wider access for the same reason (mid-search variable minting).
pub struct DomainContext<'a> {
  pub union_find: &'a mut UnionFind,
  pub store: &'a mut Store,
  pub propagators: &'a mut PropagatorQueue,
  pub prop_slot: &'a mut HashMap<PropId, SolverSlot>,
  pub var_to_props: &'a mut HashMap<BoolVariable, Vec<PropId>>,
  pub next_bool_var: &'a mut BoolVariable,
  pub actions: Vec<Action>,
}

impl<'a> DomainContext<'a> {
  fn mint_bool_var(&mut self) -> BoolVariable {
    let v = *self.next_bool_var;
    *self.next_bool_var += 1;
    v
  }

  fn add_clause(&mut self, lits: Vec<crate::Literal>, keep: bool) {
    self.actions.push(Action::AddClause { lits, keep });
  }
}

pub struct DomainSolver {
  dom_symbol: AtomId,
  eq_c_symbol: AtomId,
  expansion_cap: u32,
}

impl DomainSolver {
  pub fn new(dom_symbol: AtomId, eq_c_symbol: AtomId, expansion_cap: u32) -> Self {
    Self { dom_symbol, eq_c_symbol, expansion_cap }
  }

  pub fn name(&self) -> &'static str {
    "domain"
  }

  /// Runs the one-shot finite-domain expansion for `cons` (a `dom(x, lb, ub)` constraint just
  /// decided to `value`). Every `EQ_C(x, v)` it mints gets its own fresh SAT variable, registered
  /// as a Bounds propagator and entered into `var_to_props` exactly as `backend::wire_relation`
  /// wires a compile-time `EQ_C(var, const)`, so deciding one wakes `theory::bounds` the same way.
  pub fn expand(&mut self, ctx: &mut DomainContext, cons: ConsId, value: bool) -> Outcome {
    if !value {
      return Outcome::Propagate;
    }

    let c = ctx.store.get(cons).clone();
    debug_assert_eq!(c.symbol, self.dom_symbol);

    let x = match c.args[0].as_ref() {
      Term::Var(v) => *v,
      _ => return Outcome::Propagate,
    };
    let lb = match c.args[1].as_ref() {
      Term::Num(n) => *n,
      _ => return Outcome::Propagate,
    };
    let ub = match c.args[2].as_ref() {
      Term::Num(n) => *n,
      _ => return Outcome::Propagate,
    };

    if lb > ub {
      return Outcome::Fail(vec![!c.literal]);
    }

    let lb_int = lb.to_integer();
    let ub_int = ub.to_integer();
    let span = ub_int.saturating_sub(lb_int).saturating_add(1);
    if span < 0 || span as u64 > self.expansion_cap as u64 {
      return Outcome::Fail(vec![!c.literal]);
    }

    let mut disjuncts = Vec::with_capacity(span as usize);
    let mut reason = Vec::new();
    let mut v = lb_int;
    while v <= ub_int {
      let value_term = Rc::new(Term::Num(Num::from_integer(v)));
      let eq_literal = crate::Literal::positive(ctx.mint_bool_var());
      let (eq_cons, is_new) = ctx.store.intern(
        ctx.union_find,
        &mut reason,
        self.eq_c_symbol,
        vec![Rc::new(Term::Var(x)), value_term],
        eq_literal,
      );
      if is_new {
        let prop = ctx.propagators.register(eq_cons, 2, EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE));
        ctx.prop_slot.insert(prop, SolverSlot::Bounds);
        ctx.var_to_props.entry(eq_literal.var()).or_default().push(prop);
      }
      disjuncts.push(eq_literal);
      v += 1;
    }

    ctx.add_clause(disjuncts, true);
    Outcome::Propagate
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::Store;
  use crate::union_find::UnionFind;
  use crate::Literal;

  /// Builds a `DomainContext` over fresh backing maps/queue, starting variable minting past
  /// `first_free_var` (as `sat::Engine` would start past every CNF-allocated variable).
  fn new_ctx<'a>(
    uf: &'a mut UnionFind,
    store: &'a mut Store,
    propagators: &'a mut PropagatorQueue,
    prop_slot: &'a mut HashMap<PropId, SolverSlot>,
    var_to_props: &'a mut HashMap<BoolVariable, Vec<PropId>>,
    next_bool_var: &'a mut BoolVariable,
  ) -> DomainContext<'a> {
    DomainContext { union_find: uf, store, propagators, prop_slot, var_to_props, next_bool_var, actions: Vec::new() }
  }

  #[test]
  fn small_range_expands_without_error() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let mut reason = Vec::new();
    let (cons, _) = store.intern(
      &uf,
      &mut reason,
      0,
      vec![Rc::new(Term::Var(x)), Rc::new(Term::Num(Num::from_integer(1))), Rc::new(Term::Num(Num::from_integer(3)))],
      Literal::positive(0),
    );

    let mut solver = DomainSolver::new(0, 1, 16);
    let mut propagators = PropagatorQueue::new();
    let mut prop_slot = HashMap::new();
    let mut var_to_props = HashMap::new();
    let mut next_bool_var = 1;
    let mut ctx = new_ctx(&mut uf, &mut store, &mut propagators, &mut prop_slot, &mut var_to_props, &mut next_bool_var);
    let outcome = solver.expand(&mut ctx, cons, true);
    assert!(matches!(outcome, Outcome::Propagate));
    assert_eq!(ctx.actions.len(), 1);
    // One fresh SAT variable and one registered Bounds propagator per integer in [1, 3].
    assert_eq!(next_bool_var, 4);
    assert_eq!(prop_slot.len(), 3);
    assert!(prop_slot.values().all(|slot| *slot == SolverSlot::Bounds));
    assert_eq!(var_to_props.len(), 3);
  }

  #[test]
  fn range_past_the_cap_fails() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let mut reason = Vec::new();
    let (cons, _) = store.intern(
      &uf,
      &mut reason,
      0,
      vec![Rc::new(Term::Var(x)), Rc::new(Term::Num(Num::from_integer(0))), Rc::new(Term::Num(Num::from_integer(1000)))],
      Literal::positive(0),
    );

    let mut solver = DomainSolver::new(0, 1, 4);
    let mut propagators = PropagatorQueue::new();
    let mut prop_slot = HashMap::new();
    let mut var_to_props = HashMap::new();
    let mut next_bool_var = 1;
    let mut ctx = new_ctx(&mut uf, &mut store, &mut propagators, &mut prop_slot, &mut var_to_props, &mut next_bool_var);
    let outcome = solver.expand(&mut ctx, cons, true);
    assert!(matches!(outcome, Outcome::Fail(_)));
  }

  #[test]
  fn empty_range_fails_immediately() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let mut reason = Vec::new();
    let (cons, _) = store.intern(
      &uf,
      &mut reason,
      0,
      vec![Rc::new(Term::Var(x)), Rc::new(Term::Num(Num::from_integer(5))), Rc::new(Term::Num(Num::from_integer(2)))],
      Literal::positive(0),
    );

    let mut solver = DomainSolver::new(0, 1, 16);
    let mut propagators = PropagatorQueue::new();
    let mut prop_slot = HashMap::new();
    let mut var_to_props = HashMap::new();
    let mut next_bool_var = 1;
    let mut ctx = new_ctx(&mut uf, &mut store, &mut propagators, &mut prop_slot, &mut var_to_props, &mut next_bool_var);
    let outcome = solver.expand(&mut ctx, cons, true);
    assert!(matches!(outcome, Outcome::Fail(_)));
  }
}
