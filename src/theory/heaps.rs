/*!

The separation-logic-style heap theory, SPEC_FULL §4.8 and `original_source/solver_heaps.c`/
`solver_heaps.h`. The original exposes eight symbols (`IN`, `EMP`, `ONE`, `SEP`, `EQUAL`, `SUB`,
`ALLOC`, `ASSIGN`); `rewrite.rs` normalizes the four constructors (`EMP`, `ONE`, `ALLOC`, `ASSIGN`)
down to facts stated in terms of the four relations this propagator actually watches --
`emp(h)` becomes "h's domain is empty", `one(h, x, v)` becomes `in(x, h)` plus a singleton-domain
fact, `assign(h', h, x, v)` becomes a `sep` triple relating `h'` to `h` -- so only `in`, `sep`,
`eq`, and `sub` need runtime propagators.

This solver tracks asserted facts (`x` is/isn't in heap `h`'s domain; two heaps are known disjoint,
equal, or one a subheap of the other) and flags the direct contradictions between them -- it is not
a full separation-logic decision procedure (no frame inference, no entailment search), matching the
scale the rest of this crate's theory solvers operate at.

*/

use std::collections::HashMap;

use crate::propagator::EventMask;
use crate::term::Term;
use crate::trail::{Mark, Trail};
use crate::union_find::UnionFind;
use crate::{AtomId, ConsId, Literal, VarId};

use super::{Outcome, Propagator, TheoryContext};

#[derive(Clone, Debug)]
enum Op {
  Membership { key: (VarId, VarId) },
  Disjoint { key: (VarId, VarId) },
  Subset { key: (VarId, VarId) },
}

fn unordered(a: VarId, b: VarId) -> (VarId, VarId) {
  if a <= b {
    (a, b)
  } else {
    (b, a)
  }
}

pub struct HeapsSolver {
  in_symbol: AtomId,
  sep_symbol: AtomId,
  eq_symbol: AtomId,
  sub_symbol: AtomId,
  symbols: [AtomId; 4],
  membership: HashMap<(VarId, VarId), (bool, Literal)>,
  disjoint: HashMap<(VarId, VarId), Literal>,
  subset: HashMap<(VarId, VarId), Literal>,
  trail: Trail<Op>,
}

impl HeapsSolver {
  pub fn new(in_symbol: AtomId, sep_symbol: AtomId, eq_symbol: AtomId, sub_symbol: AtomId) -> Self {
    Self {
      in_symbol,
      sep_symbol,
      eq_symbol,
      sub_symbol,
      symbols: [in_symbol, sep_symbol, eq_symbol, sub_symbol],
      membership: HashMap::new(),
      disjoint: HashMap::new(),
      subset: HashMap::new(),
      trail: Trail::new(),
    }
  }

  pub fn mark(&self) -> Mark {
    self.trail.mark()
  }

  pub fn undo_to(&mut self, mark: Mark) {
    let membership = &mut self.membership;
    let disjoint = &mut self.disjoint;
    let subset = &mut self.subset;
    self.trail.undo_to(mark, |op| match op {
      Op::Membership { key } => {
        membership.remove(&key);
      }
      Op::Disjoint { key } => {
        disjoint.remove(&key);
      }
      Op::Subset { key } => {
        subset.remove(&key);
      }
    });
  }

  fn heap_of(uf: &UnionFind, term: &Term) -> Option<VarId> {
    match term {
      Term::Var(v) => Some(uf.deref(*v)),
      _ => None,
    }
  }

  fn assert_membership(&mut self, x: VarId, h: VarId, member: bool, literal: Literal) -> Outcome {
    if let Some(&(existing, existing_lit)) = self.membership.get(&(x, h)) {
      return if existing == member { Outcome::Propagate } else { Outcome::Fail(vec![!literal, !existing_lit]) };
    }

    // Contradiction against a known-disjoint pair: x can't be a member of both sides.
    if member {
      for (&(a, b), &disjoint_lit) in &self.disjoint {
        let other = if a == h { Some(b) } else if b == h { Some(a) } else { None };
        if let Some(other_heap) = other {
          if let Some(&(true, other_lit)) = self.membership.get(&(x, other_heap)) {
            return Outcome::Fail(vec![!literal, !disjoint_lit, !other_lit]);
          }
        }
      }
      for (&(sub, sup), &subset_lit) in &self.subset {
        if sup == h {
          continue; // membership in the superset says nothing about the subset
        }
        if sub == h {
          if let Some(&(false, sup_lit)) = self.membership.get(&(x, sup)) {
            return Outcome::Fail(vec![!literal, !subset_lit, !sup_lit]);
          }
        }
      }
    }

    self.membership.insert((x, h), (member, literal));
    self.trail.push(Op::Membership { key: (x, h) });
    Outcome::Propagate
  }

  fn assert_disjoint(&mut self, h1: VarId, h2: VarId, literal: Literal) -> Outcome {
    let key = unordered(h1, h2);
    if self.disjoint.contains_key(&key) {
      return Outcome::Propagate;
    }
    for (&(x, h), &(member, member_lit)) in &self.membership {
      if !member {
        continue;
      }
      let other = if h == h1 { Some(h2) } else if h == h2 { Some(h1) } else { None };
      if let Some(other_heap) = other {
        if let Some(&(true, other_lit)) = self.membership.get(&(x, other_heap)) {
          return Outcome::Fail(vec![!literal, !member_lit, !other_lit]);
        }
      }
    }
    self.disjoint.insert(key, literal);
    self.trail.push(Op::Disjoint { key });
    Outcome::Propagate
  }

  fn assert_subset(&mut self, sub: VarId, sup: VarId, literal: Literal) -> Outcome {
    let key = (sub, sup);
    if self.subset.contains_key(&key) {
      return Outcome::Propagate;
    }
    for (&(x, h), &(member, member_lit)) in &self.membership {
      if h == sub && member {
        if let Some(&(false, sup_lit)) = self.membership.get(&(x, sup)) {
          return Outcome::Fail(vec![!literal, !member_lit, !sup_lit]);
        }
      }
    }
    self.subset.insert(key, literal);
    self.trail.push(Op::Subset { key });
    Outcome::Propagate
  }
}

impl Propagator for HeapsSolver {
  fn name(&self) -> &'static str {
    "heaps"
  }

  fn symbols(&self) -> &[AtomId] {
    &self.symbols
  }

  fn events(&self) -> EventMask {
    EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE)
  }

  fn propagate(&mut self, ctx: &mut TheoryContext, cons: ConsId, value: bool) -> Outcome {
    let c = ctx.store.get(cons).clone();

    if c.symbol == self.in_symbol {
      let (Some(x), Some(h)) = (Self::heap_of(ctx.union_find, &c.args[0]), Self::heap_of(ctx.union_find, &c.args[1])) else {
        return Outcome::Propagate;
      };
      self.assert_membership(x, h, value, c.literal)
    } else if c.symbol == self.sep_symbol {
      if !value {
        return Outcome::Propagate; // negated `sep` gives no direct disjointness fact
      }
      let (Some(h1), Some(h2)) = (Self::heap_of(ctx.union_find, &c.args[0]), Self::heap_of(ctx.union_find, &c.args[1])) else {
        return Outcome::Propagate;
      };
      self.assert_disjoint(h1, h2, c.literal)
    } else if c.symbol == self.eq_symbol {
      if !value {
        return Outcome::Propagate;
      }
      let (Some(h1), Some(h2)) = (Self::heap_of(ctx.union_find, &c.args[0]), Self::heap_of(ctx.union_find, &c.args[1])) else {
        return Outcome::Propagate;
      };
      if ctx.union_find.bind(c.literal, h1, h2) {
        let rep = ctx.union_find.deref(h1);
        let attached = ctx.union_find.attached_constraints(rep).to_vec();
        ctx.store.rebind(ctx.union_find, &attached);
      }
      Outcome::Propagate
    } else if c.symbol == self.sub_symbol {
      if !value {
        return Outcome::Propagate;
      }
      let (Some(sub), Some(sup)) = (Self::heap_of(ctx.union_find, &c.args[0]), Self::heap_of(ctx.union_find, &c.args[1])) else {
        return Outcome::Propagate;
      };
      self.assert_subset(sub, sup, c.literal)
    } else {
      Outcome::Propagate
    }
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;
  use crate::store::Store;

  fn var_term(v: VarId) -> Rc<Term> {
    Rc::new(Term::Var(v))
  }

  #[test]
  fn membership_in_both_halves_of_a_disjoint_split_fails() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let h1 = uf.fresh_var();
    let h2 = uf.fresh_var();
    let mut reason = Vec::new();

    let mut solver = HeapsSolver::new(0, 1, 2, 3);

    let (sep_cons, _) = store.intern(&uf, &mut reason, 1, vec![var_term(h1), var_term(h2)], Literal::positive(10));
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    assert!(matches!(solver.propagate(&mut ctx, sep_cons, true), Outcome::Propagate));
    drop(ctx);

    let (in1, _) = store.intern(&uf, &mut reason, 0, vec![var_term(x), var_term(h1)], Literal::positive(11));
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    assert!(matches!(solver.propagate(&mut ctx, in1, true), Outcome::Propagate));
    drop(ctx);

    let (in2, _) = store.intern(&uf, &mut reason, 0, vec![var_term(x), var_term(h2)], Literal::positive(12));
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    let outcome = solver.propagate(&mut ctx, in2, true);
    assert!(matches!(outcome, Outcome::Fail(_)));
  }

  #[test]
  fn subset_propagates_membership_contradiction() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let sub = uf.fresh_var();
    let sup = uf.fresh_var();
    let mut reason = Vec::new();
    let mut solver = HeapsSolver::new(0, 1, 2, 3);

    let (member_cons, _) = store.intern(&uf, &mut reason, 0, vec![var_term(x), var_term(sub)], Literal::positive(20));
    {
      let mut ctx = TheoryContext::new(&mut uf, &mut store);
      solver.propagate(&mut ctx, member_cons, true);
    }
    let (not_member_cons, _) = store.intern(&uf, &mut reason, 0, vec![var_term(x), var_term(sup)], Literal::positive(21));
    {
      let mut ctx = TheoryContext::new(&mut uf, &mut store);
      solver.propagate(&mut ctx, not_member_cons, false);
    }

    let (sub_cons, _) = store.intern(&uf, &mut reason, 3, vec![var_term(sub), var_term(sup)], Literal::positive(22));
    let mut ctx = TheoryContext::new(&mut uf, &mut store);
    let outcome = solver.propagate(&mut ctx, sub_cons, true);
    assert!(matches!(outcome, Outcome::Fail(_)));
  }

  #[test]
  fn undo_forgets_asserted_facts() {
    let mut uf = UnionFind::new();
    let mut store = Store::new();
    let x = uf.fresh_var();
    let h = uf.fresh_var();
    let mut reason = Vec::new();
    let mut solver = HeapsSolver::new(0, 1, 2, 3);

    let (cons, _) = store.intern(&uf, &mut reason, 0, vec![var_term(x), var_term(h)], Literal::positive(30));
    let mark = solver.mark();
    {
      let mut ctx = TheoryContext::new(&mut uf, &mut store);
      solver.propagate(&mut ctx, cons, true);
    }
    assert!(solver.membership.contains_key(&(x, h)));
    solver.undo_to(mark);
    assert!(!solver.membership.contains_key(&(x, h)));
  }
}
