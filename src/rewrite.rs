/*!

User-registered rewrite rules, `head --> body`, applied bottom-up before flattening.

A rule's head and body are ordinary `Term` trees in which `Term::Var` nodes stand for *pattern*
variables local to the rule rather than solver-level logical variables -- the two share a
representation because both are "a slot that gets bound to a sub-term", which is exactly what a
rewrite-rule variable is. Matching binds each pattern variable to the sub-expression found at its
position; a pattern variable that occurs more than once in the head must bind to structurally
equal sub-expressions every time it recurs.

Rules are indexed by their head's top symbol (`HeadKey`) so that rewriting a sub-expression only
tries rules that could possibly apply, mirroring `original_source/pass_rewrite.c`'s
`ruleinfo_t` table keyed on the head atom.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::term::{AtomTable, Op, Term};
use crate::{AtomId, VarId};

/// Matching and rewriting recurse at most this many times per sub-expression before giving up,
/// guarding against non-terminating rule sets.
pub const MAX_DEPTH: usize = 64;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Rule {
  pub head: Rc<Term>,
  pub body: Rc<Term>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
enum HeadKey {
  Op(Op),
  Func(AtomId),
  Atom(AtomId),
}

fn head_key(term: &Term) -> Option<HeadKey> {
  match term {
    Term::Op(Op::Func(atom), _) => Some(HeadKey::Func(*atom)),
    Term::Op(op, _) => Some(HeadKey::Op(*op)),
    Term::Atom(atom) => Some(HeadKey::Atom(*atom)),
    _ => None,
  }
}

#[derive(Default)]
pub struct RewriteTable {
  rules: HashMap<HeadKey, Vec<Rule>>,
}

impl RewriteTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `head --> body`. Rules with a head that has no stable top symbol (a bare variable
  /// or literal) are rejected: they would apply everywhere and almost certainly loop.
  pub fn register(&mut self, head: Rc<Term>, body: Rc<Term>) -> Result<(), crate::Error> {
    let key = head_key(&head)
      .ok_or_else(|| crate::Error::type_error("rewrite rule head must have a fixed top symbol"))?;
    self.rules.entry(key).or_default().push(Rule { head, body });
    Ok(())
  }

  fn candidates(&self, term: &Term) -> &[Rule] {
    head_key(term).and_then(|k| self.rules.get(&k)).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Rewrites `term` to a fixpoint (bounded by `MAX_DEPTH`), memoising already-rewritten
  /// sub-expressions so each is rewritten at most once per pass.
  pub fn rewrite(&self, term: &Rc<Term>) -> Rc<Term> {
    let mut memo = HashMap::new();
    self.rewrite_memo(term, &mut memo, 0)
  }

  fn rewrite_memo(
    &self,
    term: &Rc<Term>,
    memo: &mut HashMap<Rc<Term>, Rc<Term>>,
    depth: usize,
  ) -> Rc<Term> {
    if let Some(cached) = memo.get(term) {
      return cached.clone();
    }

    // Rewrite children first (bottom-up), then retry this node against the rule table.
    let rebuilt = match term.as_ref() {
      Term::Op(op, args) => {
        let new_args: Vec<Rc<Term>> =
          args.iter().map(|a| self.rewrite_memo(a, memo, depth)).collect();
        if new_args == *args {
          term.clone()
        } else {
          Rc::new(Term::Op(*op, new_args))
        }
      }
      _ => term.clone(),
    };

    let result = if depth >= MAX_DEPTH {
      rebuilt
    } else {
      self.try_rules(&rebuilt, memo, depth)
    };

    memo.insert(term.clone(), result.clone());
    result
  }

  fn try_rules(
    &self,
    term: &Rc<Term>,
    memo: &mut HashMap<Rc<Term>, Rc<Term>>,
    depth: usize,
  ) -> Rc<Term> {
    for rule in self.candidates(term) {
      let mut bindings = HashMap::new();
      if match_pattern(&rule.head, term, &mut bindings) {
        let instantiated = substitute(&rule.body, &bindings);
        return self.rewrite_memo(&instantiated, memo, depth + 1);
      }
    }
    term.clone()
  }
}

/// Matches `pattern` against `subject`, extending `bindings` with any pattern-variable matches.
/// A pattern variable seen again must agree with its first binding (structural equality).
fn match_pattern(pattern: &Rc<Term>, subject: &Rc<Term>, bindings: &mut HashMap<VarId, Rc<Term>>) -> bool {
  match pattern.as_ref() {
    Term::Var(id) => match bindings.get(id) {
      Some(existing) => existing == subject,
      None => {
        bindings.insert(*id, subject.clone());
        true
      }
    },
    Term::Op(pop, pargs) => match subject.as_ref() {
      Term::Op(sop, sargs) if pop == sop && pargs.len() == sargs.len() => {
        pargs.iter().zip(sargs.iter()).all(|(p, s)| match_pattern(p, s, bindings))
      }
      _ => false,
    },
    _ => pattern == subject,
  }
}

/// Replaces every pattern variable in `body` with its binding. Variables with no binding (can
/// only happen for a malformed rule whose body mentions a variable absent from its head) are left
/// as-is.
fn substitute(body: &Rc<Term>, bindings: &HashMap<VarId, Rc<Term>>) -> Rc<Term> {
  match body.as_ref() {
    Term::Var(id) => bindings.get(id).cloned().unwrap_or_else(|| body.clone()),
    Term::Op(op, args) => {
      let new_args: Vec<Rc<Term>> = args.iter().map(|a| substitute(a, bindings)).collect();
      Rc::new(Term::Op(*op, new_args))
    }
    _ => body.clone(),
  }
}

/// Convenience for parsers/tests: builds the `Func` head/body for a named rewrite rule without
/// going through the atom table directly.
pub fn make_func(atoms: &mut AtomTable, name: &str, args: Vec<Rc<Term>>) -> Rc<Term> {
  let id = atoms.intern(name, args.len() as u32);
  Rc::new(Term::Op(Op::Func(id), args))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::Num;

  #[test]
  fn rewrites_a_simple_function_application() {
    let mut atoms = AtomTable::new();
    let mut table = RewriteTable::new();

    // double(X) --> X + X
    let x_pattern = Rc::new(Term::Var(0));
    let head = make_func(&mut atoms, "double", vec![x_pattern.clone()]);
    let body = Rc::new(Term::Op(Op::Add, vec![x_pattern.clone(), x_pattern]));
    table.register(head, body).unwrap();

    let five = Rc::new(Term::Num(Num::from_integer(5)));
    let goal = make_func(&mut atoms, "double", vec![five.clone()]);

    let result = table.rewrite(&goal);
    assert_eq!(result, Rc::new(Term::Op(Op::Add, vec![five.clone(), five])));
  }

  #[test]
  fn repeated_pattern_variable_must_agree() {
    let mut atoms = AtomTable::new();
    let mut table = RewriteTable::new();

    // same(X, X) --> true
    let x_pattern = Rc::new(Term::Var(0));
    let head = make_func(&mut atoms, "same", vec![x_pattern.clone(), x_pattern]);
    table.register(head, Rc::new(Term::Bool(true))).unwrap();

    let a = Rc::new(Term::Num(Num::from_integer(1)));
    let b = Rc::new(Term::Num(Num::from_integer(2)));

    let matches = make_func(&mut atoms, "same", vec![a.clone(), a]);
    let mismatches = make_func(&mut atoms, "same", vec![b.clone(), Rc::new(Term::Num(Num::from_integer(3)))]);

    assert_eq!(table.rewrite(&matches), Rc::new(Term::Bool(true)));
    assert_eq!(table.rewrite(&mismatches), mismatches);
  }

  #[test]
  fn rule_with_unstable_head_is_rejected() {
    let mut table = RewriteTable::new();
    let head = Rc::new(Term::Var(0));
    assert!(table.register(head, Rc::new(Term::Bool(true))).is_err());
  }
}
