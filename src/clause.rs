/*!

A `Clause` is a data structure that efficiently represents a set of OR'ed literals.

A clause is a set of distinct literals OR'ed together. For example
$x_1 \lor \overline{x}_2 \lor \overline{x}_3 \lor x_4$.

*/

use std::ops::Index;

use crate::approximate_set::{ApproximateSet, OredIntegerSet};
use crate::{BoolVariable, ClauseId, Literal, LiteralVector};

/// A bloom-filter-ish over the variables occurring in a clause, used to cheaply rule out
/// subsumption candidates before paying for the real literal-by-literal check.
pub type VariableApproximateSet = OredIntegerSet<u64, BoolVariable>;

pub type ClauseVector = Vec<Clause>;
pub type ClauseWrapperVector = Vec<ClauseWrapper>;

/// The primary clause representation. Clauses live in the `Solver`'s clause database, indexed
/// by `ClauseId`; nothing outside this module holds a raw pointer or index into `literals`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Clause {
  literals: LiteralVector,
  approx: VariableApproximateSet,

  id: ClauseId,

  inact_rounds: u32,
  glue: u32,
  psm: u32, // Transient field used during gc.

  is_strengthened: bool,
  is_removed: bool,
  is_learned: bool,
  is_used: bool,
  is_frozen: bool,
}

impl Clause {
  pub fn new(id: ClauseId, literals: LiteralVector, is_learned: bool) -> Self {
    let approx = VariableApproximateSet::with_values(literals.iter().map(|l| l.var()).collect());

    Self {
      id,
      literals,
      approx,
      is_learned,
      inact_rounds: 0,
      glue: 0,
      psm: 0,
      is_strengthened: false,
      is_removed: false,
      is_used: false,
      is_frozen: false,
    }
  }

  // region Getters and Setters

  pub fn literals(&self) -> &LiteralVector {
    &self.literals
  }

  pub fn approx(&self) -> &VariableApproximateSet {
    &self.approx
  }

  pub fn id(&self) -> ClauseId {
    self.id
  }

  pub fn size(&self) -> usize {
    self.literals.len()
  }

  pub fn inact_rounds(&self) -> u32 {
    self.inact_rounds
  }

  pub fn glue(&self) -> u32 {
    self.glue
  }

  pub fn psm(&self) -> u32 {
    self.psm
  }

  pub fn is_strengthened(&self) -> bool {
    self.is_strengthened
  }

  pub fn is_removed(&self) -> bool {
    self.is_removed
  }

  pub fn is_learned(&self) -> bool {
    self.is_learned
  }

  pub fn is_used(&self) -> bool {
    self.is_used
  }

  pub fn is_frozen(&self) -> bool {
    self.is_frozen
  }

  pub fn set_removed(&mut self, is_removed: bool) {
    self.is_removed = is_removed;
  }

  pub fn set_used(&mut self, is_used: bool) {
    self.is_used = is_used;
  }

  pub fn set_glue(&mut self, glue: u32) {
    self.glue = u32::min(glue, 255);
  }

  pub fn set_psm(&mut self, psm: u32) {
    self.psm = u32::min(psm, 255);
  }

  pub fn set_frozen(&mut self, is_frozen: bool) {
    sassert!(self.is_learned);
    self.is_frozen = is_frozen;
  }

  pub fn freeze(&mut self) {
    self.set_frozen(true);
  }

  pub fn unfreeze(&mut self) {
    self.set_frozen(false);
  }

  pub fn inc_inact_rounds(&mut self) {
    self.inact_rounds += 1;
  }

  pub fn reset_inact_rounds(&mut self) {
    self.inact_rounds = 0;
  }

  // endregion

  pub fn contains_variable(&self, variable: BoolVariable) -> bool {
    self.literals.iter().any(|l| l.var() == variable)
  }

  pub fn contains_literal(&self, literal: Literal) -> bool {
    self.literals.contains(&literal)
  }

  /// Removes every instance of `literal` in place and recomputes the approximate set.
  pub fn eliminate(&mut self, literal: Literal) {
    let initial_size = self.literals.len();
    self.literals.retain(|&l| l != literal);

    if self.literals.len() != initial_size {
      self.is_strengthened = true;
      self.refresh_approx();
    }
  }

  /// Shortens the clause to its first `literal_count` literals, used by the watcher when
  /// strengthening a learned clause during minimization.
  pub fn shrink(&mut self, literal_count: usize) {
    sassert!(literal_count <= self.literals.len());
    if literal_count < self.literals.len() {
      self.literals.truncate(literal_count);
      self.is_strengthened = true;
      self.refresh_approx();
    }
  }

  fn refresh_approx(&mut self) {
    self.approx = VariableApproximateSet::with_values(self.literals.iter().map(|l| l.var()).collect());
  }

  /// Swaps the literals at `i` and `j`, used to keep the two watched literals at slots 0/1.
  pub fn swap_literals(&mut self, i: usize, j: usize) {
    self.literals.swap(i, j);
  }
}

impl Index<usize> for Clause {
  type Output = Literal;

  fn index(&self, index: usize) -> &Self::Output {
    &self.literals[index]
  }
}

/// A wrapper type for `Clause` that provides a smaller representation for binary clauses, which
/// never need a database entry: no two-watched-literal search is required for a binary clause,
/// only watching the other literal directly.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum ClauseWrapper {
  Binary { literal1: Literal, literal2: Literal, is_learned: bool },
  Nonbinary(ClauseId),
}

impl ClauseWrapper {
  pub fn contains_literal(&self, literal: Literal, db: &ClauseVector) -> bool {
    match self {
      ClauseWrapper::Binary { literal1, literal2, .. } => literal == *literal1 || literal == *literal2,
      ClauseWrapper::Nonbinary(id) => db[*id].contains_literal(literal),
    }
  }

  pub fn contains_variable(&self, variable: BoolVariable, db: &ClauseVector) -> bool {
    match self {
      ClauseWrapper::Binary { literal1, literal2, .. } => {
        variable == literal1.var() || variable == literal2.var()
      }
      ClauseWrapper::Nonbinary(id) => db[*id].contains_variable(variable),
    }
  }

  pub fn is_learned(&self) -> bool {
    match self {
      ClauseWrapper::Binary { is_learned, .. } => *is_learned,
      ClauseWrapper::Nonbinary(_) => false, // queried on the database entry instead
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn eliminate_recomputes_approx() {
    let a = Literal::positive(1);
    let b = Literal::positive(2);
    let c = Literal::positive(3);
    let mut clause = Clause::new(0, vec![a, b, c], false);

    clause.eliminate(b);
    assert_eq!(clause.literals(), &vec![a, c]);
    assert!(clause.is_strengthened());
    assert!(clause.approx().may_contain(&a.var()));
    assert!(!clause.approx().may_contain(&b.var()));
  }

  #[test]
  fn shrink_truncates() {
    let lits: LiteralVector = (0..4).map(Literal::positive).collect();
    let mut clause = Clause::new(1, lits, true);
    clause.shrink(2);
    assert_eq!(clause.size(), 2);
  }
}
