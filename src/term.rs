/*!

Terms are the surface syntax the solver accepts before normalization: variables, atoms, Boolean
and numeric literals, strings, the empty list, and n-ary operator applications. `expr.rs` turns a
`Term` into the associative-commutative *expression* normal form that the rest of the pipeline
(`rewrite.rs`, `flatten.rs`, `cnf.rs`) operates on.

Exact rationals (`Num`) are used throughout rather than floats: the linear theory (`theory::linear`)
needs exact arithmetic to avoid false conflicts from rounding, and nothing upstream benefits from
float performance enough to justify two numeric representations.

*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use num_rational::Ratio;

use crate::{AtomId, VarId};

/// An exact rational number, the sole numeric representation used from parsing through to the
/// linear theory solver.
pub type Num = Ratio<i64>;

/// The operators a `Term::Op` node can carry, mirroring `exprop_e`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Op {
  And,
  Or,
  Implies,
  Iff,
  Xor,
  Not,
  Eq,
  Neq,
  Lt,
  Leq,
  Gt,
  Geq,
  Add,
  Sub,
  Mul,
  Div,
  Pow,
  Neg,
  /// An uninterpreted function/predicate application named by `AtomId`, arity implicit in the
  /// number of children.
  Func(AtomId),
}

impl Op {
  pub fn is_commutative(&self) -> bool {
    matches!(self, Op::And | Op::Or | Op::Add | Op::Mul | Op::Eq | Op::Neq | Op::Iff | Op::Xor)
  }

  pub fn arity(&self) -> Option<usize> {
    match self {
      Op::Not | Op::Neg => Some(1),
      Op::Func(_) => None,
      _ => Some(2),
    }
  }
}

impl Display for Op {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Op::And => "/\\",
      Op::Or => "\\/",
      Op::Implies => "->",
      Op::Iff => "<->",
      Op::Xor => "xor",
      Op::Not => "~",
      Op::Eq => "=",
      Op::Neq => "!=",
      Op::Lt => "<",
      Op::Leq => "<=",
      Op::Gt => ">",
      Op::Geq => ">=",
      Op::Add => "+",
      Op::Sub => "-",
      Op::Mul => "*",
      Op::Div => "/",
      Op::Pow => "^",
      Op::Neg => "-",
      Op::Func(id) => return write!(f, "func#{}", id),
    };
    write!(f, "{}", name)
  }
}

/// A surface term. Shared via `Rc` so that repeated subterms (common after flattening) don't
/// duplicate storage, and so `expr.rs`'s AC maps can cheaply clone keys.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Term {
  Var(VarId),
  Atom(AtomId),
  Bool(bool),
  Num(Num),
  Str(Rc<str>),
  Nil,
  Op(Op, Vec<Rc<Term>>),
}

impl Term {
  pub fn is_var(&self) -> bool {
    matches!(self, Term::Var(_))
  }

  pub fn is_op(&self) -> bool {
    matches!(self, Term::Op(..))
  }

  pub fn op(&self) -> Option<Op> {
    match self {
      Term::Op(op, _) => Some(*op),
      _ => None,
    }
  }

  pub fn args(&self) -> &[Rc<Term>] {
    match self {
      Term::Op(_, args) => args,
      _ => &[],
    }
  }

  pub fn arity(&self) -> usize {
    self.args().len()
  }
}

impl Display for Term {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Term::Var(v) => write!(f, "_v{}", v),
      Term::Atom(a) => write!(f, "atom#{}", a),
      Term::Bool(b) => write!(f, "{}", b),
      Term::Num(n) => write!(f, "{}", n),
      Term::Str(s) => write!(f, "\"{}\"", s),
      Term::Nil => write!(f, "nil"),
      Term::Op(op, args) if args.len() == 2 => write!(f, "({} {} {})", args[0], op, args[1]),
      Term::Op(op, args) if args.len() == 1 => write!(f, "({}{})", op, args[0]),
      Term::Op(op, args) => {
        write!(f, "{}(", op)?;
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", arg)?;
        }
        write!(f, ")")
      }
    }
  }
}

/// Interns `(name, arity)` pairs into stable `AtomId`s. An atom's arity is part of its identity:
/// `foo/1` and `foo/2` are unrelated atoms, matching Prolog-style functor naming used by the CHR
/// layer (`chr::ast`) and by uninterpreted function applications (`Op::Func`).
#[derive(Debug, Default)]
pub struct AtomTable {
  names: Vec<(Box<str>, u32)>,
  by_name: HashMap<(Box<str>, u32), AtomId>,
}

impl AtomTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn intern(&mut self, name: &str, arity: u32) -> AtomId {
    let key = (Box::<str>::from(name), arity);
    if let Some(&id) = self.by_name.get(&key) {
      return id;
    }

    let id = self.names.len();
    self.names.push(key.clone());
    self.by_name.insert(key, id);
    id
  }

  pub fn name(&self, atom: AtomId) -> &str {
    &self.names[atom].0
  }

  pub fn arity(&self, atom: AtomId) -> u32 {
    self.names[atom].1
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn atom_identity_includes_arity() {
    let mut atoms = AtomTable::new();
    let foo1 = atoms.intern("foo", 1);
    let foo2 = atoms.intern("foo", 2);
    let foo1_again = atoms.intern("foo", 1);

    assert_ne!(foo1, foo2);
    assert_eq!(foo1, foo1_again);
    assert_eq!(atoms.name(foo2), "foo");
    assert_eq!(atoms.arity(foo2), 2);
  }

  #[test]
  fn display_renders_infix_binary_ops() {
    let lhs = Rc::new(Term::Var(0));
    let rhs = Rc::new(Term::Num(Num::from_integer(1)));
    let sum = Term::Op(Op::Add, vec![lhs, rhs]);
    assert_eq!(format!("{}", sum), "(_v0 + 1)");
  }

  #[test]
  fn commutativity_classification_matches_ac_operators() {
    assert!(Op::Add.is_commutative());
    assert!(Op::And.is_commutative());
    assert!(!Op::Sub.is_commutative());
    assert!(!Op::Implies.is_commutative());
  }
}
