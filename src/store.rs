/*!

The constraint store: a chaining hash table from a 128-bit structural key to the constraints
registered under it, per SPEC_FULL §4.3 and `original_source/store.c`/`store.h` (key combination
strategy per `original_source/hash.c`).

Every constraint symbol declares a set of "lookups" -- subsets of argument positions used to index
it for partial-match retrieval (the CHR compiler in `chr::compiler` registers one lookup per
partner pattern it needs to probe). A constraint is inserted once under its *primary* key (symbol +
every argument) and once more under each of its symbol's declared lookup keys. Variable rebinding
(`Store::rebind`) re-indexes every constraint whose key depended on the rebound variable, since the
key of a variable argument is its union-find identity.

The original derives its 128-bit key from an AES round function; pulling in AES intrinsics for a
non-cryptographic structural hash would be a fabricated dependency with no counterpart elsewhere in
this crate's stack, so `hash128` instead salts two independent FNV-1a accumulators (see DESIGN.md).

*/

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::term::Term;
use crate::trail::{Mark, Trail};
use crate::union_find::UnionFind;
use crate::{AtomId, ConsId, Literal, VarId};

/// One declared lookup: the subset of argument positions (in order) this lookup hashes on.
pub type Lookup = Vec<usize>;

/// A marker distinguishing which of a symbol's keys (primary, or the n-th declared lookup) a given
/// 128-bit hash was computed for, folded into the hash itself so primary and secondary buckets for
/// the same symbol can never collide.
const PRIMARY_MARKER: u64 = u64::MAX;

#[derive(Clone, Debug, Default)]
pub struct SymbolInfo {
  pub commutative: bool,
  pub lookups: Vec<Lookup>,
}

/// A registered theory constraint (`cons` in the original sources): a symbol application whose
/// truth is reified by the SAT literal `literal`.
#[derive(Clone, Debug)]
pub struct Cons {
  pub id: ConsId,
  pub symbol: AtomId,
  pub literal: Literal,
  pub args: Vec<Rc<Term>>,
  purged: bool,
}

impl Cons {
  pub fn is_purged(&self) -> bool {
    self.purged
  }
}

fn hash128_of(symbol: AtomId, marker: u64, keyed_args: &[u128]) -> u128 {
  let mut a = DefaultHasher::new();
  let mut b = DefaultHasher::new();
  // Two independent salts so the two halves diverge even for short inputs, approximating the
  // original's 128-bit AES-derived key with a deterministic, dependency-free structural hash.
  0xA5A5_A5A5_u64.hash(&mut a);
  0x5A5A_5A5A_u64.hash(&mut b);
  symbol.hash(&mut a);
  symbol.hash(&mut b);
  marker.hash(&mut a);
  marker.hash(&mut b);
  for key in keyed_args {
    key.hash(&mut a);
    key.rotate_left(17).hash(&mut b);
  }
  ((a.finish() as u128) << 64) | (b.finish() as u128)
}

/// The identity hash of one argument: a variable's representative id (so the key tracks the
/// union-find class, not the syntactic variable) or the argument's plain structural hash.
fn arg_key(uf: &UnionFind, term: &Rc<Term>) -> u128 {
  match term.as_ref() {
    Term::Var(v) => (uf.deref(*v) as u128) | (1u128 << 127),
    _ => {
      let mut hasher = DefaultHasher::new();
      term.hash(&mut hasher);
      hasher.finish() as u128
    }
  }
}

#[derive(Clone, Debug)]
enum Op {
  Insert { key: u128, cons: ConsId },
  Purge { cons: ConsId },
}

#[derive(Default)]
pub struct Store {
  symbols: HashMap<AtomId, SymbolInfo>,
  constraints: Vec<Cons>,
  buckets: HashMap<u128, Vec<ConsId>>,
  trail: Trail<Op>,
  in_search: bool,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  /// Marks the boundary between setup-time insertions (permanent) and search-time insertions
  /// (trailed). Called once by `sat::Engine` as it begins the search loop.
  pub fn begin_search(&mut self) {
    self.in_search = true;
  }

  pub fn mark(&self) -> Mark {
    self.trail.mark()
  }

  /// Declares a symbol's commutativity and lookup set. When `commutative` is set, the
  /// argument-swapped form of every declared lookup is auto-registered too (SPEC_FULL §9's
  /// "commutative lookups" open question, resolved this way: CHR authors need not declare both
  /// orderings themselves).
  pub fn declare_symbol(&mut self, symbol: AtomId, commutative: bool, mut lookups: Vec<Lookup>) {
    if commutative {
      let swapped: Vec<Lookup> = lookups
        .iter()
        .filter(|l| l.len() == 2)
        .map(|l| vec![l[1], l[0]])
        .collect();
      lookups.extend(swapped);
    }
    self.symbols.entry(symbol).or_default().commutative = commutative;
    self.symbols.entry(symbol).or_default().lookups = lookups;
  }

  fn symbol_info(&self, symbol: AtomId) -> SymbolInfo {
    self.symbols.get(&symbol).cloned().unwrap_or_default()
  }

  fn primary_key(&self, uf: &UnionFind, symbol: AtomId, args: &[Rc<Term>]) -> u128 {
    let keys: Vec<u128> = args.iter().map(|a| arg_key(uf, a)).collect();
    hash128_of(symbol, PRIMARY_MARKER, &keys)
  }

  fn lookup_key(&self, uf: &UnionFind, symbol: AtomId, args: &[Rc<Term>], lookup_index: usize, positions: &[usize]) -> u128 {
    let keys: Vec<u128> = positions.iter().map(|&p| arg_key(uf, &args[p])).collect();
    hash128_of(symbol, lookup_index as u64, &keys)
  }

  fn insert_bucket(&mut self, key: u128, cons: ConsId) {
    self.buckets.entry(key).or_default().push(cons);
    if self.in_search {
      self.trail.push(Op::Insert { key, cons });
    }
  }

  /// Canonicalizes commutative arguments by swapping to put the lexicographically smaller operand
  /// first, per SPEC_FULL §4.3.
  fn canonical_args(&self, symbol: AtomId, mut args: Vec<Rc<Term>>) -> Vec<Rc<Term>> {
    if self.symbol_info(symbol).commutative && args.len() == 2 && args[1] < args[0] {
      args.swap(0, 1);
    }
    args
  }

  /// Finds or creates the canonical constraint for `(symbol, args)` reified by `literal`. On a
  /// hit, the equalities walked from the caller's arguments to the stored constraint's arguments
  /// are appended to `reason` (via `UnionFind::match_vars`) so the caller can justify reusing it.
  /// Returns `(id, is_new)`.
  pub fn intern(
    &mut self,
    uf: &UnionFind,
    reason: &mut Vec<Literal>,
    symbol: AtomId,
    args: Vec<Rc<Term>>,
    literal: Literal,
  ) -> (ConsId, bool) {
    let args = self.canonical_args(symbol, args);
    let key = self.primary_key(uf, symbol, &args);

    if let Some(bucket) = self.buckets.get(&key) {
      for &candidate_id in bucket {
        let candidate = &self.constraints[candidate_id];
        if candidate.is_purged() || candidate.symbol != symbol || candidate.args.len() != args.len() {
          continue;
        }
        if self.args_equal_modulo_uf(uf, reason, &args, &candidate.args) {
          return (candidate_id, false);
        }
      }
    }

    let id = self.constraints.len();
    self.constraints.push(Cons { id, symbol, literal, args: args.clone(), purged: false });
    self.insert_bucket(key, id);

    let info = self.symbol_info(symbol);
    for (lookup_index, positions) in info.lookups.iter().enumerate() {
      let lookup_key = self.lookup_key(uf, symbol, &args, lookup_index, positions);
      self.insert_bucket(lookup_key, id);
    }

    (id, true)
  }

  fn args_equal_modulo_uf(
    &self,
    uf: &UnionFind,
    reason: &mut Vec<Literal>,
    lhs: &[Rc<Term>],
    rhs: &[Rc<Term>],
  ) -> bool {
    let start_len = reason.len();
    for (l, r) in lhs.iter().zip(rhs.iter()) {
      let ok = match (l.as_ref(), r.as_ref()) {
        (Term::Var(x), Term::Var(y)) => uf.match_vars(reason, *x, *y),
        _ => l == r,
      };
      if !ok {
        reason.truncate(start_len);
        return false;
      }
    }
    true
  }

  /// Every live (non-purged) constraint registered under `symbol`'s `lookup_index`-th lookup for
  /// the given argument subset, used by the CHR VM's `LOOKUP`/`NEXT` opcodes.
  pub fn probe<'s>(
    &'s self,
    uf: &UnionFind,
    symbol: AtomId,
    lookup_index: usize,
    bound_args: &[Rc<Term>],
  ) -> impl Iterator<Item = ConsId> + 's {
    let positions = self
      .symbols
      .get(&symbol)
      .and_then(|info| info.lookups.get(lookup_index))
      .cloned()
      .unwrap_or_default();
    let key = self.lookup_key(uf, symbol, bound_args, lookup_index, &positions);
    self
      .buckets
      .get(&key)
      .into_iter()
      .flatten()
      .copied()
      .filter(move |&id| !self.constraints[id].is_purged())
  }

  pub fn get(&self, id: ConsId) -> &Cons {
    &self.constraints[id]
  }

  /// Marks a constraint deleted; lookups skip purged constraints from here on. Trailed so
  /// backtracking resurrects it, matching the propagator `kill`/`annihilate` distinction (purging
  /// during search is always reversible; a permanent symbol-table-level removal has no API here).
  pub fn purge(&mut self, id: ConsId) {
    if self.constraints[id].purged {
      return;
    }
    self.constraints[id].purged = true;
    if self.in_search {
      self.trail.push(Op::Purge { cons: id });
    }
  }

  /// Re-indexes every constraint attached to `old_rep` under `new_rep`'s identity after a
  /// union-find bind, per SPEC_FULL §4.3's `move` operation. Must be called with the *old*
  /// representative still resolvable as distinct from the new one is not required: `constraints`
  /// here is exactly the list `UnionFind::bind` already transplanted, so this only needs to
  /// recompute and re-insert lookup keys computed over the rebound identity.
  pub fn rebind(&mut self, uf: &UnionFind, constraints: &[ConsId]) {
    for &id in constraints {
      if self.constraints[id].is_purged() {
        continue;
      }
      let symbol = self.constraints[id].symbol;
      let args = self.constraints[id].args.clone();
      let key = self.primary_key(uf, symbol, &args);
      self.insert_bucket(key, id);

      let info = self.symbol_info(symbol);
      for (lookup_index, positions) in info.lookups.iter().enumerate() {
        let lookup_key = self.lookup_key(uf, symbol, &args, lookup_index, positions);
        self.insert_bucket(lookup_key, id);
      }
    }
  }

  pub fn undo_to(&mut self, mark: Mark) {
    let buckets = &mut self.buckets;
    let constraints = &mut self.constraints;
    self.trail.undo_to(mark, |op| match op {
      Op::Insert { key, cons } => {
        if let Some(bucket) = buckets.get_mut(&key) {
          if let Some(pos) = bucket.iter().rposition(|&c| c == cons) {
            bucket.remove(pos);
          }
        }
      }
      Op::Purge { cons } => {
        constraints[cons].purged = false;
      }
    });
  }

  pub fn len(&self) -> usize {
    self.constraints.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::Num;

  fn num(n: i64) -> Rc<Term> {
    Rc::new(Term::Num(Num::from_integer(n)))
  }

  #[test]
  fn repeated_intern_of_identical_constant_args_is_deduplicated() {
    let uf = UnionFind::new();
    let mut store = Store::new();
    let mut reason = Vec::new();

    let (id1, is_new1) = store.intern(&uf, &mut reason, 0, vec![num(1), num(2)], Literal::positive(0));
    assert!(is_new1);
    let (id2, is_new2) = store.intern(&uf, &mut reason, 0, vec![num(1), num(2)], Literal::positive(1));
    assert!(!is_new2);
    assert_eq!(id1, id2);
  }

  #[test]
  fn intern_resolves_modulo_equal_variables() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    uf.bind(Literal::positive(7), x, y);

    let mut store = Store::new();
    let mut reason = Vec::new();
    let (id1, _) = store.intern(&uf, &mut reason, 1, vec![Rc::new(Term::Var(x))], Literal::positive(0));
    let (id2, is_new2) = store.intern(&uf, &mut reason, 1, vec![Rc::new(Term::Var(y))], Literal::positive(1));

    assert!(!is_new2);
    assert_eq!(id1, id2);
    assert!(reason.contains(&Literal::positive(7)));
  }

  #[test]
  fn commutative_symbol_canonicalizes_argument_order() {
    let uf = UnionFind::new();
    let mut store = Store::new();
    store.declare_symbol(2, true, vec![]);
    let mut reason = Vec::new();

    let (id1, _) = store.intern(&uf, &mut reason, 2, vec![num(2), num(1)], Literal::positive(0));
    let (id2, is_new2) = store.intern(&uf, &mut reason, 2, vec![num(1), num(2)], Literal::positive(1));
    assert!(!is_new2);
    assert_eq!(id1, id2);
  }

  #[test]
  fn purge_is_undone_on_backtrack() {
    let uf = UnionFind::new();
    let mut store = Store::new();
    store.begin_search();
    let mut reason = Vec::new();
    let (id, _) = store.intern(&uf, &mut reason, 3, vec![num(5)], Literal::positive(0));

    let mark = store.mark();
    store.purge(id);
    assert!(store.get(id).is_purged());
    store.undo_to(mark);
    assert!(!store.get(id).is_purged());
  }

  #[test]
  fn lookup_finds_constraint_by_declared_argument_subset() {
    let uf = UnionFind::new();
    let mut store = Store::new();
    store.declare_symbol(4, false, vec![vec![0]]);
    let mut reason = Vec::new();
    let (id, _) = store.intern(&uf, &mut reason, 4, vec![num(9), num(10)], Literal::positive(0));

    let found: Vec<ConsId> = store.probe(&uf, 4, 0, &[num(9)]).collect();
    assert_eq!(found, vec![id]);
  }
}
