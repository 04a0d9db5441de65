/*!

Expression normal form: smart constructors that keep associative-commutative operators
(`+`, `*`, `/\`, `\/`) in a canonical shape instead of a raw syntax tree.

Following `original_source/expr.c`, each AC operator is represented as a map rather than a list of
children:

  - `+` is a map from *key* term to numeric *coefficient*, plus a separate constant: `3*x + 2*y + 5`
    is `{x: 3, y: 2}` with constant `5`.
  - `*` is a map from base term to numeric *exponent*: `x^2 * y` is `{x: 2, y: 1}`.
  - `/\` and `\/` are maps from key term to a *sign* bit: `a /\ ~b` is `{a: false, b: true}` (`true`
    means the key appears negated).

The map is a `BTreeMap` ordered by `Term`'s derived `Ord`, which is what `original_source/expr.c`
calls `expr_compare` — so two structurally-equal expressions always iterate in the same order, a
prerequisite for `Term`'s `Eq`/`Hash` (used to look terms up in the constraint store) to agree with
structural equality regardless of the order operands were supplied in.

*/

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::term::{Num, Op, Term};

/// `original_source/expr.c`'s `expr_compare`: just structural `Ord` on the canonical form.
pub fn compare(a: &Term, b: &Term) -> Ordering {
  a.cmp(b)
}

fn zero() -> Num {
  Num::from_integer(0)
}

fn one() -> Num {
  Num::from_integer(1)
}

/// Splits `term` into `(key, coefficient)` for insertion into an additive AC map: `3*x` becomes
/// `(x, 3)`, a bare numeral becomes `(1, n)`, anything else becomes `(term, 1)`.
fn as_addend(term: &Rc<Term>) -> (Rc<Term>, Num) {
  match term.as_ref() {
    Term::Num(n) => (Rc::new(Term::Num(one())), *n),
    Term::Op(Op::Mul, args) if args.len() == 2 => {
      if let Term::Num(n) = args[0].as_ref() {
        (args[1].clone(), *n)
      } else if let Term::Num(n) = args[1].as_ref() {
        (args[0].clone(), *n)
      } else {
        (term.clone(), one())
      }
    }
    Term::Op(Op::Neg, args) if args.len() == 1 => {
      let (key, coeff) = as_addend(&args[0]);
      (key, -coeff)
    }
    _ => (term.clone(), one()),
  }
}

/// Builds the canonical sum of `args`, merging like terms and folding numeric literals into a
/// single constant. `args` may themselves be `Op::Add` nodes, which are flattened in (associativity).
pub fn make_add(args: Vec<Rc<Term>>) -> Rc<Term> {
  let mut coeffs: BTreeMap<Rc<Term>, Num> = BTreeMap::new();
  let mut constant = zero();
  let one_key = Rc::new(Term::Num(one()));

  let mut pending = args;
  while let Some(arg) = pending.pop() {
    match arg.as_ref() {
      Term::Op(Op::Add, children) => pending.extend(children.iter().cloned()),
      _ => {
        let (key, coeff) = as_addend(&arg);
        if key.as_ref() == one_key.as_ref() {
          constant = constant + coeff;
        } else {
          let entry = coeffs.entry(key).or_insert_with(zero);
          *entry = *entry + coeff;
        }
      }
    }
  }

  coeffs.retain(|_, coeff| *coeff != zero());

  let mut terms: Vec<Rc<Term>> = coeffs
    .into_iter()
    .map(|(key, coeff)| {
      if coeff == one() {
        key
      } else {
        Rc::new(Term::Op(Op::Mul, vec![Rc::new(Term::Num(coeff)), key]))
      }
    })
    .collect();

  if constant != zero() || terms.is_empty() {
    terms.push(Rc::new(Term::Num(constant)));
  }
  terms.sort();

  match terms.len() {
    1 => terms.into_iter().next().unwrap(),
    _ => Rc::new(Term::Op(Op::Add, terms)),
  }
}

fn as_factor(term: &Rc<Term>) -> (Rc<Term>, Num) {
  match term.as_ref() {
    Term::Op(Op::Pow, args) if args.len() == 2 => {
      if let Term::Num(n) = args[1].as_ref() {
        return (args[0].clone(), *n);
      }
      (term.clone(), one())
    }
    _ => (term.clone(), one()),
  }
}

/// Builds the canonical product of `args`, merging repeated bases into exponents. A zero factor
/// collapses the whole product to `0`.
pub fn make_mul(args: Vec<Rc<Term>>) -> Rc<Term> {
  let mut exponents: BTreeMap<Rc<Term>, Num> = BTreeMap::new();
  let mut constant = one();

  let mut pending = args;
  while let Some(arg) = pending.pop() {
    match arg.as_ref() {
      Term::Op(Op::Mul, children) => pending.extend(children.iter().cloned()),
      Term::Num(n) => constant = constant * *n,
      _ => {
        let (base, exponent) = as_factor(&arg);
        let entry = exponents.entry(base).or_insert_with(zero);
        *entry = *entry + exponent;
      }
    }
  }

  if constant == zero() {
    return Rc::new(Term::Num(zero()));
  }

  exponents.retain(|_, exponent| *exponent != zero());

  let mut terms: Vec<Rc<Term>> = exponents
    .into_iter()
    .map(|(base, exponent)| {
      if exponent == one() {
        base
      } else {
        Rc::new(Term::Op(Op::Pow, vec![base, Rc::new(Term::Num(exponent))]))
      }
    })
    .collect();

  if constant != one() || terms.is_empty() {
    terms.push(Rc::new(Term::Num(constant)));
  }
  terms.sort();

  match terms.len() {
    1 => terms.into_iter().next().unwrap(),
    _ => Rc::new(Term::Op(Op::Mul, terms)),
  }
}

const TRUE_TERM: Term = Term::Bool(true);
const FALSE_TERM: Term = Term::Bool(false);

fn as_signed(term: &Rc<Term>) -> (Rc<Term>, bool) {
  match term.as_ref() {
    Term::Op(Op::Not, args) if args.len() == 1 => (args[0].clone(), true),
    _ => (term.clone(), false),
  }
}

/// Builds the canonical conjunction of `args`. Flattens nested conjunctions, drops duplicates,
/// short-circuits to `false` on `a /\ ~a`, and drops `true` literals.
pub fn make_and(args: Vec<Rc<Term>>) -> Rc<Term> {
  let mut signs: BTreeMap<Rc<Term>, bool> = BTreeMap::new();
  let mut pending = args;

  while let Some(arg) = pending.pop() {
    match arg.as_ref() {
      Term::Op(Op::And, children) => pending.extend(children.iter().cloned()),
      Term::Bool(false) => return Rc::new(FALSE_TERM),
      Term::Bool(true) => {}
      _ => {
        let (key, sign) = as_signed(&arg);
        match signs.get(&key) {
          Some(&existing) if existing != sign => return Rc::new(FALSE_TERM),
          _ => {
            signs.insert(key, sign);
          }
        }
      }
    }
  }

  let terms: Vec<Rc<Term>> = signs
    .into_iter()
    .map(|(key, sign)| if sign { Rc::new(Term::Op(Op::Not, vec![key])) } else { key })
    .collect();

  match terms.len() {
    0 => Rc::new(TRUE_TERM),
    1 => terms.into_iter().next().unwrap(),
    _ => {
      let mut terms = terms;
      terms.sort();
      Rc::new(Term::Op(Op::And, terms))
    }
  }
}

/// Builds the canonical disjunction of `args`, dual to `make_and`.
pub fn make_or(args: Vec<Rc<Term>>) -> Rc<Term> {
  let mut signs: BTreeMap<Rc<Term>, bool> = BTreeMap::new();
  let mut pending = args;

  while let Some(arg) = pending.pop() {
    match arg.as_ref() {
      Term::Op(Op::Or, children) => pending.extend(children.iter().cloned()),
      Term::Bool(true) => return Rc::new(TRUE_TERM),
      Term::Bool(false) => {}
      _ => {
        let (key, sign) = as_signed(&arg);
        match signs.get(&key) {
          Some(&existing) if existing != sign => return Rc::new(TRUE_TERM),
          _ => {
            signs.insert(key, sign);
          }
        }
      }
    }
  }

  let terms: Vec<Rc<Term>> = signs
    .into_iter()
    .map(|(key, sign)| if sign { Rc::new(Term::Op(Op::Not, vec![key])) } else { key })
    .collect();

  match terms.len() {
    0 => Rc::new(FALSE_TERM),
    1 => terms.into_iter().next().unwrap(),
    _ => {
      let mut terms = terms;
      terms.sort();
      Rc::new(Term::Op(Op::Or, terms))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn var(id: usize) -> Rc<Term> {
    Rc::new(Term::Var(id))
  }

  fn num(n: i64) -> Rc<Term> {
    Rc::new(Term::Num(Num::from_integer(n)))
  }

  #[test]
  fn add_merges_like_terms_and_constants() {
    // x + 2 + 3*x + 5 should normalize to 4*x + 7
    let x = var(0);
    let sum = make_add(vec![
      x.clone(),
      num(2),
      Rc::new(Term::Op(Op::Mul, vec![num(3), x.clone()])),
      num(5),
    ]);

    match sum.as_ref() {
      Term::Op(Op::Add, terms) => {
        assert_eq!(terms.len(), 2);
        assert!(terms.iter().any(|t| matches!(t.as_ref(), Term::Num(n) if *n == Num::from_integer(7))));
        assert!(terms.iter().any(|t| matches!(
          t.as_ref(),
          Term::Op(Op::Mul, args) if args.len() == 2 && matches!(args[0].as_ref(), Term::Num(n) if *n == Num::from_integer(4))
        )));
      }
      other => panic!("expected Add node, got {:?}", other),
    }
  }

  #[test]
  fn add_is_order_independent() {
    let x = var(1);
    let y = var(2);
    let a = make_add(vec![x.clone(), y.clone()]);
    let b = make_add(vec![y, x]);
    assert_eq!(a, b);
  }

  #[test]
  fn and_of_a_variable_and_its_negation_is_false() {
    let x = var(3);
    let result = make_and(vec![x.clone(), Rc::new(Term::Op(Op::Not, vec![x]))]);
    assert_eq!(*result, Term::Bool(false));
  }

  #[test]
  fn or_drops_duplicate_literals() {
    let x = var(4);
    let result = make_or(vec![x.clone(), x.clone(), x]);
    assert!(matches!(result.as_ref(), Term::Var(4)));
  }

  #[test]
  fn mul_collapses_zero_factor() {
    let x = var(5);
    let result = make_mul(vec![x, num(0)]);
    assert_eq!(*result, Term::Num(Num::from_integer(0)));
  }
}
