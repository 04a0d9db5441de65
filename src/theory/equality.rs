/*!

The equality theory fast path, SPEC_FULL §4.8 and `original_source/solver_eq.c`. Every ordinary
equality atom `x = y` between two logical variables already gets a clause-level encoding from
`cnf.rs`, but routing it through a dedicated propagator lets the solver skip straight to a
union-find bind instead of waiting on a clause to imply it -- the same optimization `solver_eq.c`
describes as registering directly on the commutative `=` symbol rather than leaving it to the
general constraint machinery.

*/

use crate::propagator::EventMask;
use crate::term::Term;
use crate::{AtomId, ConsId};

use super::{Outcome, Propagator, TheoryContext};

pub struct EqualitySolver {
  symbol: AtomId,
  symbols: [AtomId; 1],
}

impl EqualitySolver {
  pub fn new(symbol: AtomId) -> Self {
    Self { symbol, symbols: [symbol] }
  }
}

impl Propagator for EqualitySolver {
  fn name(&self) -> &'static str {
    "equality"
  }

  fn symbols(&self) -> &[AtomId] {
    &self.symbols
  }

  fn events(&self) -> EventMask {
    EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE)
  }

  fn propagate(&mut self, ctx: &mut TheoryContext, cons: ConsId, value: bool) -> Outcome {
    let c = ctx.store.get(cons).clone();
    debug_assert_eq!(c.symbol, self.symbol);

    let (x, y) = match (c.args[0].as_ref(), c.args[1].as_ref()) {
      (Term::Var(x), Term::Var(y)) => (*x, *y),
      // Either side isn't a bare variable (e.g. `f(x) = y`); that's the general congruence
      // closure's job, not this fast path's.
      _ => return Outcome::Propagate,
    };

    if value {
      if ctx.union_find.bind(c.literal, x, y) {
        let rep = ctx.union_find.deref(x);
        let attached = ctx.union_find.attached_constraints(rep).to_vec();
        ctx.store.rebind(ctx.union_find, &attached);
      }
      Outcome::Propagate
    } else {
      // Decided false: `x != y`. If the union-find already considers them equal, that's an
      // immediate conflict; the justifying path plus the falsified literal is the reason.
      let mut reason = vec![!c.literal];
      if ctx.union_find.match_vars(&mut reason, x, y) {
        Outcome::Fail(reason)
      } else {
        Outcome::Propagate
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;
  use crate::store::Store;
  use crate::union_find::UnionFind;
  use crate::Literal;

  #[test]
  fn deciding_true_binds_the_union_find() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    let mut reason = Vec::new();
    let (cons, _) = store.intern(&uf, &mut reason, 0, vec![Rc::new(Term::Var(x)), Rc::new(Term::Var(y))], Literal::positive(5));

    let mut solver = EqualitySolver::new(0);
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    let outcome = solver.propagate(&mut ctx, cons, true);
    assert!(matches!(outcome, Outcome::Propagate));
    assert_eq!(uf.deref(x), uf.deref(y));
  }

  #[test]
  fn deciding_false_on_already_equal_vars_fails() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    uf.bind(Literal::positive(1), x, y);
    let mut reason = Vec::new();
    let (cons, _) = store.intern(&uf, &mut reason, 0, vec![Rc::new(Term::Var(x)), Rc::new(Term::Var(y))], Literal::positive(5));

    let mut solver = EqualitySolver::new(0);
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    let outcome = solver.propagate(&mut ctx, cons, false);
    assert!(matches!(outcome, Outcome::Fail(_)));
  }

  #[test]
  fn deciding_false_on_unrelated_vars_is_fine() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    let mut reason = Vec::new();
    let (cons, _) = store.intern(&uf, &mut reason, 0, vec![Rc::new(Term::Var(x)), Rc::new(Term::Var(y))], Literal::positive(5));

    let mut solver = EqualitySolver::new(0);
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    let outcome = solver.propagate(&mut ctx, cons, false);
    assert!(matches!(outcome, Outcome::Propagate));
  }
}
