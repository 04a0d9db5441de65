/*!

The flatten pass turns non-primitive arithmetic/relational sub-expressions into a conjunction of
canonical primitive constraints plus auxiliary variable equalities, per `original_source/expr.c`'s
`factor`/`expr_getnumfactor` machinery and SPEC_FULL §4.6's canonical shape list:

  `x = y`, `x > y`, `x = c`, `x > c`, `x = y + z`, `x = y + c`, `x = c * y`, `x = y * z`, `x = y^c`

Boolean structure (`/\`, `\/`, `~`, `->` , `<->`, `xor`) is left alone here -- `cnf.rs` handles
that -- except that flattening recurses *into* Boolean connectives to flatten the arithmetic
leaves underneath them. Common arithmetic sub-expressions are shared via a memo table keyed by
the (already AC-canonicalized) expression, so `x*x + x*x` allocates one auxiliary variable for
`x*x`, not two.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::term::{Num, Op, Term};
use crate::VarId;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Operand {
  Var(VarId),
  Const(Num),
}

/// One canonical primitive constraint, defining a fresh variable in terms of at most two others
/// (or a relation between two operands).
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Primitive {
  Eq(Operand, Operand),
  Gt(Operand, Operand),
  EqAdd(VarId, Operand, Operand),
  EqMul(VarId, Operand, Operand),
  EqPowConst(VarId, VarId, Num),
}

pub struct Flattener {
  next_var: VarId,
  memo: HashMap<Rc<Term>, VarId>,
  pub constraints: Vec<Primitive>,
}

impl Flattener {
  /// `start_var` must be past every variable id already in use, so fresh auxiliary variables
  /// never collide with a user-visible one.
  pub fn new(start_var: VarId) -> Self {
    Self { next_var: start_var, memo: HashMap::new(), constraints: Vec::new() }
  }

  pub fn fresh_var(&mut self) -> VarId {
    let v = self.next_var;
    self.next_var += 1;
    v
  }

  pub fn next_var(&self) -> VarId {
    self.next_var
  }

  /// Flattens a term appearing in Boolean/formula position: recurses through connectives,
  /// flattening arithmetic leaves and relational atoms in place.
  pub fn flatten_formula(&mut self, term: &Rc<Term>) -> Rc<Term> {
    match term.as_ref() {
      Term::Op(op @ (Op::And | Op::Or | Op::Not | Op::Implies | Op::Iff | Op::Xor), args) => {
        let new_args = args.iter().map(|a| self.flatten_formula(a)).collect();
        Rc::new(Term::Op(*op, new_args))
      }
      Term::Op(op @ (Op::Eq | Op::Neq | Op::Lt | Op::Leq | Op::Gt | Op::Geq), args)
        if args.len() == 2 =>
      {
        self.flatten_relation(*op, &args[0], &args[1])
      }
      _ => term.clone(),
    }
  }

  fn operand_to_term(operand: Operand) -> Rc<Term> {
    match operand {
      Operand::Var(v) => Rc::new(Term::Var(v)),
      Operand::Const(n) => Rc::new(Term::Num(n)),
    }
  }

  /// Canonicalizes a comparison the way SPEC_FULL §4.6 describes: `<=`/`>=` fold into a negated
  /// `<`/`>`, and every comparison is re-expressed as `gt`/`eq` over flattened operands.
  fn flatten_relation(&mut self, op: Op, lhs: &Rc<Term>, rhs: &Rc<Term>) -> Rc<Term> {
    let l = self.flatten_term(lhs);
    let r = self.flatten_term(rhs);

    let (primitive, negate) = match op {
      Op::Eq => (Primitive::Eq(l, r), false),
      Op::Neq => (Primitive::Eq(l, r), true),
      Op::Gt => (Primitive::Gt(l, r), false),
      Op::Leq => (Primitive::Gt(l, r), true),
      Op::Lt => (Primitive::Gt(r, l), false),
      Op::Geq => (Primitive::Gt(r, l), true),
      _ => unreachable!("flatten_relation only called on comparison ops"),
    };

    let (a, b) = match &primitive {
      Primitive::Eq(a, b) | Primitive::Gt(a, b) => (*a, *b),
      _ => unreachable!(),
    };
    let relation_op = if matches!(primitive, Primitive::Eq(..)) { Op::Eq } else { Op::Gt };
    self.constraints.push(primitive);

    let atom = Rc::new(Term::Op(relation_op, vec![Self::operand_to_term(a), Self::operand_to_term(b)]));
    if negate {
      Rc::new(Term::Op(Op::Not, vec![atom]))
    } else {
      atom
    }
  }

  /// Flattens a purely arithmetic sub-expression to an `Operand`, introducing and memoizing a
  /// fresh variable for every compound shape that isn't already a bare variable or constant.
  fn flatten_term(&mut self, term: &Rc<Term>) -> Operand {
    match term.as_ref() {
      Term::Var(v) => Operand::Var(*v),
      Term::Num(n) => Operand::Const(*n),
      Term::Op(Op::Add, args) => self.flatten_chain(args, |v, a, b| Primitive::EqAdd(v, a, b)),
      Term::Op(Op::Mul, args) => self.flatten_chain(args, |v, a, b| Primitive::EqMul(v, a, b)),
      Term::Op(Op::Pow, args) if args.len() == 2 => {
        if let Term::Num(exponent) = args[1].as_ref() {
          if let Operand::Var(base) = self.flatten_term(&args[0]) {
            if let Some(&cached) = self.memo.get(term) {
              return Operand::Var(cached);
            }
            let v = self.fresh_var();
            self.memo.insert(term.clone(), v);
            self.constraints.push(Primitive::EqPowConst(v, base, *exponent));
            return Operand::Var(v);
          }
        }
        self.flatten_opaque(term)
      }
      _ => self.flatten_opaque(term),
    }
  }

  /// Left-folds an n-ary AC chain (`a + b + c + ...`) into binary primitives:
  /// `t1 = a + b`, `t2 = t1 + c`, ..., returning the final operand.
  fn flatten_chain(
    &mut self,
    args: &[Rc<Term>],
    make: impl Fn(VarId, Operand, Operand) -> Primitive,
  ) -> Operand {
    assert!(!args.is_empty(), "AC operator with no arguments");
    let mut acc = self.flatten_term(&args[0]);
    for arg in &args[1..] {
      let next = self.flatten_term(arg);
      let v = self.fresh_var();
      self.constraints.push(make(v, acc, next));
      acc = Operand::Var(v);
    }
    acc
  }

  /// Any arithmetic shape not otherwise recognized (e.g. an uninterpreted function application
  /// used numerically) gets its own opaque variable, memoized by structural identity.
  fn flatten_opaque(&mut self, term: &Rc<Term>) -> Operand {
    if let Some(&v) = self.memo.get(term) {
      return Operand::Var(v);
    }
    let v = self.fresh_var();
    self.memo.insert(term.clone(), v);
    Operand::Var(v)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn var(id: VarId) -> Rc<Term> {
    Rc::new(Term::Var(id))
  }

  fn num(n: i64) -> Rc<Term> {
    Rc::new(Term::Num(Num::from_integer(n)))
  }

  #[test]
  fn flattens_a_sum_into_binary_primitives() {
    let mut flattener = Flattener::new(100);
    let x = var(0);
    let y = var(1);
    let z = var(2);
    let sum_eq_zero = Rc::new(Term::Op(Op::Eq, vec![Rc::new(Term::Op(Op::Add, vec![x, y, z])), num(0)]));

    let result = flattener.flatten_formula(&sum_eq_zero);
    assert!(matches!(result.as_ref(), Term::Op(Op::Eq, _)));
    assert_eq!(flattener.constraints.len(), 2); // one EqAdd for x+y, one EqAdd for (x+y)+z
    assert!(matches!(flattener.constraints[0], Primitive::EqAdd(..)));
  }

  #[test]
  fn shares_a_common_subexpression() {
    let mut flattener = Flattener::new(0);
    let x = var(0);
    let mul = Rc::new(Term::Op(Op::Mul, vec![x.clone(), x.clone()]));
    let lhs = flattener.flatten_term(&mul);
    let rhs = flattener.flatten_term(&mul);
    assert_eq!(lhs, rhs);
    assert_eq!(flattener.constraints.len(), 1);
  }

  #[test]
  fn leq_negates_gt() {
    let mut flattener = Flattener::new(0);
    let formula = Rc::new(Term::Op(Op::Leq, vec![var(0), var(1)]));
    let result = flattener.flatten_formula(&formula);
    assert!(matches!(result.as_ref(), Term::Op(Op::Not, _)));
  }
}
