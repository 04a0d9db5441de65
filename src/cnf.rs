/*!

NNF and Tseitin CNF, the last two steps of the term -> expression -> ... -> clauses pipeline
(SPEC_FULL §4.6, `original_source/pass_cnf.c`).

NNF eliminates `<->` and `xor` (the only connectives not already in negation normal form thanks to
the expression construction rules in `expr.rs`) and pushes `~` down to the leaves via De Morgan.
Tseitin CNF then walks the NNF formula: a top-level conjunction contributes its conjuncts as
clauses directly, and any sub-formula appearing under a disjunction that isn't already a literal is
replaced by a fresh Boolean variable with defining clauses for both directions of the
biconditional. Atomic theory constraints (`x = y`, `x > y`, function/predicate applications) are
left as opaque atoms and recorded in `definitions` so the backend (`backend.rs`) can bind each one
to the SAT variable that names it.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::expr::{make_and, make_or};
use crate::term::{Op, Term};
use crate::{BoolVariable, Literal, LiteralVector, VarId};

/// Pushes negation to the leaves and eliminates `<->`/`xor`, per `iffelim_expr` in
/// `original_source/pass_cnf.c`. `negate` is `true` when the *enclosing* context requires this
/// sub-formula's negation.
pub fn nnf(term: &Rc<Term>, negate: bool) -> Rc<Term> {
  match term.as_ref() {
    Term::Op(Op::Not, args) if args.len() == 1 => nnf(&args[0], !negate),

    Term::Op(Op::And, args) => {
      let children: Vec<Rc<Term>> = args.iter().map(|a| nnf(a, negate)).collect();
      if negate {
        make_or(children)
      } else {
        make_and(children)
      }
    }

    Term::Op(Op::Or, args) => {
      let children: Vec<Rc<Term>> = args.iter().map(|a| nnf(a, negate)).collect();
      if negate {
        make_and(children)
      } else {
        make_or(children)
      }
    }

    Term::Op(Op::Implies, args) if args.len() == 2 => {
      let expanded = Rc::new(Term::Op(
        Op::Or,
        vec![Rc::new(Term::Op(Op::Not, vec![args[0].clone()])), args[1].clone()],
      ));
      nnf(&expanded, negate)
    }

    Term::Op(Op::Xor, args) if args.len() == 2 => {
      let expanded = Rc::new(Term::Op(
        Op::Not,
        vec![Rc::new(Term::Op(Op::Iff, vec![args[0].clone(), args[1].clone()]))],
      ));
      nnf(&expanded, negate)
    }

    Term::Op(Op::Iff, args) if args.len() == 2 => {
      let a = nnf(&args[0], false);
      let na = nnf(&args[0], true);
      let b = nnf(&args[1], false);
      let nb = nnf(&args[1], true);

      if !negate {
        // (~a \/ b) /\ (a \/ ~b)
        make_and(vec![make_or(vec![na, b]), make_or(vec![a, nb])])
      } else {
        // (a /\ b) \/ (~a /\ ~b)
        make_or(vec![make_and(vec![a, b]), make_and(vec![na, nb])])
      }
    }

    Term::Bool(b) if negate => Rc::new(Term::Bool(!*b)),

    _ if negate => Rc::new(Term::Op(Op::Not, vec![term.clone()])),

    _ => term.clone(),
  }
}

/// An atomic constraint that `cnf.rs` could not interpret Boolean-structurally and so handed off
/// to the backend bound to the SAT variable `var` whenever the CNF needed its truth value.
#[derive(Clone, Debug)]
pub struct Definition {
  pub var: BoolVariable,
  pub atom: Rc<Term>,
}

pub struct CnfBuilder {
  next_bool_var: BoolVariable,
  var_map: HashMap<VarId, BoolVariable>,
  atom_cache: HashMap<Rc<Term>, Literal>,
  pub clauses: Vec<LiteralVector>,
  pub definitions: Vec<Definition>,
  true_var: BoolVariable,
}

impl CnfBuilder {
  pub fn new(start_bool_var: BoolVariable) -> Self {
    let true_var = start_bool_var;
    let mut builder = Self {
      next_bool_var: start_bool_var,
      var_map: HashMap::new(),
      atom_cache: HashMap::new(),
      clauses: Vec::new(),
      definitions: Vec::new(),
      true_var,
    };
    builder.fresh_bool_var();
    builder.clauses.push(vec![Literal::positive(true_var)]);
    builder
  }

  fn fresh_bool_var(&mut self) -> BoolVariable {
    let v = self.next_bool_var;
    self.next_bool_var += 1;
    v
  }

  pub fn next_bool_var(&self) -> BoolVariable {
    self.next_bool_var
  }

  /// Asserts `term` (already flattened) as true, normalizing to NNF first.
  pub fn assert_true(&mut self, term: &Rc<Term>) {
    let normalized = nnf(term, false);
    self.assert_true_nnf(&normalized);
  }

  fn assert_true_nnf(&mut self, term: &Rc<Term>) {
    match term.as_ref() {
      Term::Bool(true) => {}
      Term::Bool(false) => self.clauses.push(Vec::new()), // the empty clause: immediate conflict
      Term::Op(Op::And, args) => {
        for arg in args {
          self.assert_true_nnf(arg);
        }
      }
      Term::Op(Op::Or, args) => {
        let lits: LiteralVector = args.iter().map(|a| self.encode_literal(a)).collect();
        self.clauses.push(lits);
      }
      _ => {
        let lit = self.encode_literal(term);
        self.clauses.push(vec![lit]);
      }
    }
  }

  fn encode_literal(&mut self, term: &Rc<Term>) -> Literal {
    match term.as_ref() {
      Term::Bool(true) => Literal::positive(self.true_var),
      Term::Bool(false) => Literal::negative(self.true_var),
      Term::Op(Op::Not, args) if args.len() == 1 => !self.encode_literal(&args[0]),
      Term::Op(Op::And, _) | Term::Op(Op::Or, _) => self.tseitin_box(term),
      Term::Var(id) => {
        if let Some(&var) = self.var_map.get(id) {
          Literal::positive(var)
        } else {
          let fresh = self.fresh_bool_var();
          self.var_map.insert(*id, fresh);
          Literal::positive(fresh)
        }
      }
      _ => self.atom_literal(term),
    }
  }

  fn tseitin_box(&mut self, term: &Rc<Term>) -> Literal {
    if let Some(&lit) = self.atom_cache.get(term) {
      return lit;
    }

    let b = self.fresh_bool_var();
    let lit = Literal::positive(b);
    self.atom_cache.insert(term.clone(), lit);

    match term.as_ref() {
      Term::Op(Op::And, args) => {
        let lits: Vec<Literal> = args.iter().map(|a| self.encode_literal(a)).collect();
        for &c in &lits {
          self.clauses.push(vec![!lit, c]);
        }
        let mut big = vec![lit];
        big.extend(lits.iter().map(|&c| !c));
        self.clauses.push(big);
      }
      Term::Op(Op::Or, args) => {
        let lits: Vec<Literal> = args.iter().map(|a| self.encode_literal(a)).collect();
        for &c in &lits {
          self.clauses.push(vec![!c, lit]);
        }
        let mut big = vec![!lit];
        big.extend(lits.iter().copied());
        self.clauses.push(big);
      }
      _ => unreachable!("tseitin_box only called on And/Or nodes"),
    }

    lit
  }

  /// Binds an opaque theory atom (`x = y`, `x > y`, a predicate application, ...) to a SAT
  /// variable, recording the binding in `definitions` for the backend.
  fn atom_literal(&mut self, term: &Rc<Term>) -> Literal {
    if let Some(&lit) = self.atom_cache.get(term) {
      return lit;
    }
    let b = self.fresh_bool_var();
    let lit = Literal::positive(b);
    self.atom_cache.insert(term.clone(), lit);
    self.definitions.push(Definition { var: b, atom: term.clone() });
    lit
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::Num;

  fn var(id: VarId) -> Rc<Term> {
    Rc::new(Term::Var(id))
  }

  #[test]
  fn top_level_conjunction_contributes_clauses_directly() {
    let mut builder = CnfBuilder::new(1);
    let a = var(0);
    let b = var(1);
    let conj = Rc::new(Term::Op(Op::And, vec![a, b]));
    builder.assert_true(&conj);

    // one clause for the implicit `true` unit, one for each conjunct, no Tseitin boxing needed.
    assert_eq!(builder.clauses.len(), 3);
    assert!(builder.clauses[1..].iter().all(|c| c.len() == 1));
  }

  #[test]
  fn disjunction_becomes_a_single_clause() {
    let mut builder = CnfBuilder::new(1);
    let a = var(0);
    let b = var(1);
    let disj = Rc::new(Term::Op(Op::Or, vec![a, b]));
    builder.assert_true(&disj);

    assert_eq!(builder.clauses.len(), 2);
    assert_eq!(builder.clauses[1].len(), 2);
  }

  #[test]
  fn iff_expands_to_two_clauses_at_the_top_level() {
    let mut builder = CnfBuilder::new(1);
    let a = var(0);
    let b = var(1);
    let iff = Rc::new(Term::Op(Op::Iff, vec![a, b]));
    builder.assert_true(&iff);

    // (~a \/ b) /\ (a \/ ~b), plus the initial `true` unit clause.
    assert_eq!(builder.clauses.len(), 3);
  }

  #[test]
  fn a_disjunction_directly_under_the_top_conjunction_is_not_boxed() {
    // A disjunction that is itself a direct conjunct of the top-level formula becomes a clause
    // with no Tseitin variable -- boxing is only needed when a sub-formula sits *inside* another
    // disjunction or appears more than once.
    let mut builder = CnfBuilder::new(1);
    let a = var(0);
    let b = var(1);
    let c = var(2);
    let inner_or = Rc::new(Term::Op(Op::Or, vec![b, c]));
    let outer_and = Rc::new(Term::Op(Op::And, vec![a, inner_or]));
    builder.assert_true(&outer_and);

    assert_eq!(builder.clauses.len(), 1 + 1 + 1);
  }

  #[test]
  fn a_conjunction_nested_inside_a_disjunction_is_tseitin_boxed() {
    let mut builder = CnfBuilder::new(1);
    let a = var(0);
    let b = var(1);
    let c = var(2);
    let inner_and = Rc::new(Term::Op(Op::And, vec![b, c]));
    let outer_or = Rc::new(Term::Op(Op::Or, vec![a, inner_and]));
    builder.assert_true(&outer_or);

    // the outer `Or` is one clause over [a, box]; boxing `b /\ c` adds 3 more (box->b, box->c,
    // b/\c->box), plus the initial `true` unit clause.
    assert_eq!(builder.clauses.len(), 1 + 1 + 3);
  }

  #[test]
  fn relation_atoms_are_recorded_as_definitions() {
    let mut builder = CnfBuilder::new(1);
    let x = var(0);
    let five = Rc::new(Term::Num(Num::from_integer(5)));
    let atom = Rc::new(Term::Op(Op::Eq, vec![x, five]));
    builder.assert_true(&atom);

    assert_eq!(builder.definitions.len(), 1);
  }
}
