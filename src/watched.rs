/*!

A watched element is an entry in the SAT engine's watch list, indexed by literal. When a literal
becomes false, its watch list is walked to find a replacement watch or to propagate/conflict.

A watched entry is one of:

  1) a literal, for a watched binary clause (binary clauses have no database entry: the clause is
     just `{watched_on, literal}`);
  2) a literal plus a `ClauseId`, for a watched clause of three or more literals — the literal is
     a "blocked literal" used to skip the clause without touching the database when it is already
     satisfied;
  3) an extension constraint index, for a theory propagator that registered interest in this
     literal's value via `Engine::watch_extension`.

*/

use crate::clause::ClauseVector;
use crate::{ClauseId, ExtensionConstraintIndex, Literal};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Watched {
  Binary { literal: Literal, is_learned: bool },

  Clause { blocked_literal: Literal, clause_id: ClauseId },

  ExtensionConstraint(ExtensionConstraintIndex),
}

impl Watched {
  /// Whether `self` names the same underlying watch as `other`, ignoring fields that are allowed
  /// to drift (`is_learned`, `blocked_literal`). Used to erase a watch by clause identity rather
  /// than by exact value.
  pub fn matches(&self, other: &Watched) -> bool {
    match (self, other) {
      (Watched::Clause { clause_id: a, .. }, Watched::Clause { clause_id: b, .. }) => a == b,
      (Watched::Binary { literal: a, .. }, Watched::Binary { literal: b, .. }) => a == b,
      (Watched::ExtensionConstraint(a), Watched::ExtensionConstraint(b)) => a == b,
      _ => false,
    }
  }

  pub fn is_binary(&self) -> bool {
    matches!(self, Watched::Binary { .. })
  }
}

/// A `Vec<Watched>` with find/erase that compare by clause identity rather than full equality.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct WatchList {
  pub list: Vec<Watched>,
}

impl WatchList {
  pub fn new() -> Self {
    Self { list: Vec::new() }
  }

  pub fn push(&mut self, watched: Watched) {
    self.list.push(watched);
  }

  /// Removes every entry matching `watched` (see `Watched::matches`).
  pub fn erase_watch(&mut self, watched: Watched) {
    self.list.retain(|w| !watched.matches(w));
  }

  pub fn find(&self, watched: Watched) -> Option<&Watched> {
    self.list.iter().find(|w| watched.matches(w))
  }
}

/// The full watch-list table, indexed by `Literal::index()`: `table[lit.index()]` holds every
/// watch that should be examined when `lit` becomes false.
#[derive(Clone, Debug, Default)]
pub struct WatchTable {
  table: Vec<WatchList>,
}

impl WatchTable {
  pub fn new() -> Self {
    Self { table: Vec::new() }
  }

  fn ensure_capacity(&mut self, index: usize) {
    if index >= self.table.len() {
      self.table.resize(index + 1, WatchList::new());
    }
  }

  pub fn watch(&mut self, literal: Literal, watched: Watched) {
    self.ensure_capacity(literal.index());
    self.table[literal.index()].push(watched);
  }

  pub fn get(&self, literal: Literal) -> &WatchList {
    static EMPTY: WatchList = WatchList { list: Vec::new() };
    self.table.get(literal.index()).unwrap_or(&EMPTY)
  }

  pub fn get_mut(&mut self, literal: Literal) -> &mut WatchList {
    self.ensure_capacity(literal.index());
    &mut self.table[literal.index()]
  }

  pub fn unwatch(&mut self, literal: Literal, watched: Watched) {
    if let Some(list) = self.table.get_mut(literal.index()) {
      list.erase_watch(watched);
    }
  }

  /// Every clause watched on `literal` that is not a binary short-circuit, for diagnostics.
  pub fn clause_ids_on(&self, literal: Literal) -> impl Iterator<Item = ClauseId> + '_ {
    self.get(literal).list.iter().filter_map(|w| match w {
      Watched::Clause { clause_id, .. } => Some(*clause_id),
      _ => None,
    })
  }

  pub fn is_empty(&self, literal: Literal, _db: &ClauseVector) -> bool {
    self.get(literal).list.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn erase_by_clause_identity_ignores_blocked_literal() {
    let mut list = WatchList::new();
    let lit_a = Literal::positive(0);
    let lit_b = Literal::positive(1);
    list.push(Watched::Clause { blocked_literal: lit_a, clause_id: 5 });

    list.erase_watch(Watched::Clause { blocked_literal: lit_b, clause_id: 5 });
    assert!(list.list.is_empty());
  }

  #[test]
  fn watch_table_grows_on_demand() {
    let mut table = WatchTable::new();
    let lit = Literal::positive(10);
    table.watch(lit, Watched::Binary { literal: Literal::positive(2), is_learned: false });
    assert_eq!(table.get(lit).list.len(), 1);
    assert!(table.get(Literal::positive(0)).list.is_empty());
  }
}
