/*!

Linear arithmetic over the rationals, SPEC_FULL §4.8 and `original_source/solver_linear.c`: a
bounded Simplex tableau in the style of Dutertre & de Moura, chosen because it (unlike classical
two-phase Simplex) tolerates bounds changing incrementally during search without restarting from
scratch. Every row defines one "slack" variable as a linear combination of others; asserting a
bound on a variable either adjusts it directly (if non-basic) or, if that pushes some basic row out
of its own bounds, pivots using Bland's rule (lowest-index entering/leaving variable) to restore
feasibility or prove there is none.

The tableau's row structure is fixed once `add_row` has been called for every slack the flattener
introduced; only variable bounds and values are part of the trail, matching the scope the original
keeps mutable during search (row coefficients are derived from the problem's fixed linear
structure, not from search decisions).

Pivots are not trail-undone: a pivot is a change of basis, not a change of the feasible region it
describes, and Dutertre & de Moura's algorithm is explicitly basis-independent -- any basis reached
along the way still represents the same system of equations, so there's nothing to restore.

*/

use std::collections::HashMap;

use crate::propagator::EventMask;
use crate::term::{Num, Term};
use crate::trail::{Mark, Trail};
use crate::{AtomId, ConsId, Literal, VarId};

use super::{Outcome, Propagator, TheoryContext};

#[derive(Clone, Debug, Default)]
struct Row {
  /// `basic = sum(coeff * nonbasic)`.
  coeffs: HashMap<VarId, Num>,
}

#[derive(Clone, Debug)]
enum Op {
  SetLower { var: VarId, old: Option<(Num, Literal)> },
  SetUpper { var: VarId, old: Option<(Num, Literal)> },
  SetValue { var: VarId, old: Num },
}

pub struct LinearSolver {
  leq_symbol: AtomId,
  symbols: [AtomId; 1],
  rows: HashMap<VarId, Row>,
  value: HashMap<VarId, Num>,
  lower: HashMap<VarId, (Num, Literal)>,
  upper: HashMap<VarId, (Num, Literal)>,
  max_int: i64,
  trail: Trail<Op>,
}

impl LinearSolver {
  pub fn new(leq_symbol: AtomId, max_int: i64) -> Self {
    Self {
      leq_symbol,
      symbols: [leq_symbol],
      rows: HashMap::new(),
      value: HashMap::new(),
      lower: HashMap::new(),
      upper: HashMap::new(),
      max_int,
      trail: Trail::new(),
    }
  }

  pub fn mark(&self) -> Mark {
    self.trail.mark()
  }

  pub fn undo_to(&mut self, mark: Mark) {
    let lower = &mut self.lower;
    let upper = &mut self.upper;
    let value = &mut self.value;
    self.trail.undo_to(mark, |op| match op {
      Op::SetLower { var, old } => match old {
        Some(entry) => {
          lower.insert(var, entry);
        }
        None => {
          lower.remove(&var);
        }
      },
      Op::SetUpper { var, old } => match old {
        Some(entry) => {
          upper.insert(var, entry);
        }
        None => {
          upper.remove(&var);
        }
      },
      Op::SetValue { var, old } => {
        value.insert(var, old);
      }
    });
  }

  /// Whether `n`'s numerator or denominator has escaped `Config::simplex_max_int`. Callers
  /// (`backend.rs`) check this before handing a row to the tableau and raise
  /// `Error::OverflowError` themselves -- `Outcome` has no channel for a fatal `Error`, only
  /// theory-local conflicts, so the bound lives at the call boundary instead.
  pub fn is_within_bound(&self, n: Num) -> bool {
    n.numer().unsigned_abs() <= self.max_int as u64 && n.denom().unsigned_abs() <= self.max_int as u64
  }

  /// Registers `basic = sum(terms)` as a fixed structural row. `basic` must not already have a
  /// row (the flattener allocates one fresh slack per linear primitive).
  pub fn add_row(&mut self, basic: VarId, terms: Vec<(Num, VarId)>) {
    let mut coeffs = HashMap::new();
    for (coeff, var) in terms {
      *coeffs.entry(var).or_insert_with(|| Num::from_integer(0)) += coeff;
    }
    let value = coeffs.iter().map(|(var, c)| *c * self.value_of(*var)).fold(Num::from_integer(0), |a, b| a + b);
    self.rows.insert(basic, Row { coeffs });
    self.value.insert(basic, value);
  }

  fn value_of(&self, var: VarId) -> Num {
    self.value.get(&var).copied().unwrap_or_else(|| Num::from_integer(0))
  }

  fn is_basic(&self, var: VarId) -> bool {
    self.rows.contains_key(&var)
  }

  fn set_value(&mut self, var: VarId, new_value: Num) {
    let old = self.value_of(var);
    if old == new_value {
      return;
    }
    self.trail.push(Op::SetValue { var, old });
    self.value.insert(var, new_value);
  }

  /// Updates a non-basic variable's value and every basic row it feeds into.
  fn update_nonbasic(&mut self, var: VarId, new_value: Num) {
    let delta = new_value - self.value_of(var);
    self.set_value(var, new_value);
    let affected: Vec<(VarId, Num)> = self
      .rows
      .iter()
      .filter_map(|(&basic, row)| row.coeffs.get(&var).map(|&c| (basic, c)))
      .collect();
    for (basic, coeff) in affected {
      let updated = self.value_of(basic) + coeff * delta;
      self.set_value(basic, updated);
    }
  }

  /// Exchanges basic variable `leaving` for non-basic `entering`, rewriting every row that
  /// mentions `entering` so the tableau keeps describing the same system of equations.
  fn pivot(&mut self, leaving: VarId, entering: VarId) {
    let row = self.rows.remove(&leaving).expect("leaving must be basic");
    let coeff_e = *row.coeffs.get(&entering).expect("entering must appear in leaving's row");
    let inv = Num::from_integer(1) / coeff_e;

    let mut new_row = HashMap::new();
    for (&var, &c) in row.coeffs.iter() {
      if var != entering {
        new_row.insert(var, -(c * inv));
      }
    }
    new_row.insert(leaving, inv);

    for other in self.rows.values_mut() {
      if let Some(c) = other.coeffs.remove(&entering) {
        for (&var, &nc) in &new_row {
          *other.coeffs.entry(var).or_insert_with(|| Num::from_integer(0)) += c * nc;
        }
      }
    }

    self.rows.insert(entering, Row { coeffs: new_row });
  }

  fn bound_reason(&self, var: VarId, too_low: bool) -> Literal {
    if too_low {
      self.upper.get(&var).map(|(_, lit)| !*lit).unwrap_or(Literal::null())
    } else {
      self.lower.get(&var).map(|(_, lit)| !*lit).unwrap_or(Literal::null())
    }
  }

  /// Restores feasibility after a bound tightening, Bland's-rule style: repeatedly pick the
  /// lowest-indexed out-of-bounds basic variable and pivot in the lowest-indexed non-basic
  /// variable that can move it back in range. No eligible entering variable means the system is
  /// infeasible; `Outcome::Fail` carries the negation of every bound witness involved.
  fn restore_feasibility(&mut self) -> Outcome {
    loop {
      let violation = self
        .rows
        .keys()
        .copied()
        .filter_map(|basic| {
          let v = self.value_of(basic);
          if let Some((lo, _)) = self.lower.get(&basic) {
            if v < *lo {
              return Some((basic, true));
            }
          }
          if let Some((hi, _)) = self.upper.get(&basic) {
            if v > *hi {
              return Some((basic, false));
            }
          }
          None
        })
        .min_by_key(|(basic, _)| *basic);

      let (basic, too_low) = match violation {
        Some(v) => v,
        None => return Outcome::Propagate,
      };

      let row = self.rows[&basic].clone();
      let mut candidates: Vec<(VarId, Num)> = row.coeffs.into_iter().collect();
      candidates.sort_by_key(|(var, _)| *var);

      let zero = Num::from_integer(0);
      let entering = candidates.into_iter().find(|&(var, coeff)| {
        let can_increase = self.upper.get(&var).map_or(true, |(hi, _)| self.value_of(var) < *hi);
        let can_decrease = self.lower.get(&var).map_or(true, |(lo, _)| self.value_of(var) > *lo);
        if too_low {
          (coeff > zero && can_increase) || (coeff < zero && can_decrease)
        } else {
          (coeff > zero && can_decrease) || (coeff < zero && can_increase)
        }
      });

      match entering {
        None => {
          let mut reason = vec![self.bound_reason(basic, too_low)];
          for &var in self.rows[&basic].coeffs.keys() {
            if let Some((_, lit)) = self.upper.get(&var) {
              reason.push(!*lit);
            }
            if let Some((_, lit)) = self.lower.get(&var) {
              reason.push(!*lit);
            }
          }
          return Outcome::Fail(reason);
        }
        Some((entering_var, _)) => {
          let target = if too_low { self.lower[&basic].0 } else { self.upper[&basic].0 };
          self.pivot(basic, entering_var);
          self.update_nonbasic(basic, target);
        }
      }
    }
  }

  pub fn set_lower(&mut self, var: VarId, bound: Num, literal: Literal) -> Outcome {
    let old = self.lower.get(&var).copied();
    if old.is_some_and(|(b, _)| b >= bound) {
      return Outcome::Propagate;
    }
    self.trail.push(Op::SetLower { var, old });
    self.lower.insert(var, (bound, literal));
    if !self.is_basic(var) && self.value_of(var) < bound {
      self.update_nonbasic(var, bound);
    }
    self.restore_feasibility()
  }

  pub fn set_upper(&mut self, var: VarId, bound: Num, literal: Literal) -> Outcome {
    let old = self.upper.get(&var).copied();
    if old.is_some_and(|(b, _)| b <= bound) {
      return Outcome::Propagate;
    }
    self.trail.push(Op::SetUpper { var, old });
    self.upper.insert(var, (bound, literal));
    if !self.is_basic(var) && self.value_of(var) > bound {
      self.update_nonbasic(var, bound);
    }
    self.restore_feasibility()
  }
}

impl Propagator for LinearSolver {
  fn name(&self) -> &'static str {
    "linear"
  }

  fn symbols(&self) -> &[AtomId] {
    &self.symbols
  }

  fn events(&self) -> EventMask {
    EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE)
  }

  /// `cons` is `LEQ(slack, c)`: `slack`'s row was registered ahead of time by the backend from
  /// the flattened linear primitive it reifies. Decided true tightens `slack`'s upper bound;
  /// decided false tightens its lower bound to the same cut point, the same non-strict-bound
  /// simplification `theory::bounds` makes for negated `LB` atoms.
  fn propagate(&mut self, ctx: &mut TheoryContext, cons: ConsId, value: bool) -> Outcome {
    let c = ctx.store.get(cons).clone();
    debug_assert_eq!(c.symbol, self.leq_symbol);

    let slack = match c.args[0].as_ref() {
      Term::Var(v) => *v,
      _ => return Outcome::Propagate,
    };
    let bound = match c.args[1].as_ref() {
      Term::Num(n) => *n,
      _ => return Outcome::Propagate,
    };

    if value {
      self.set_upper(slack, bound, c.literal)
    } else {
      self.set_lower(slack, bound, c.literal)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_basic_bound_propagates_through_a_row() {
    let mut solver = LinearSolver::new(0, 1 << 32);
    // slack = x + y
    solver.add_row(2, vec![(Num::from_integer(1), 0), (Num::from_integer(1), 1)]);
    solver.set_lower(0, Num::from_integer(3), Literal::positive(1));
    solver.set_lower(1, Num::from_integer(4), Literal::positive(2));
    let outcome = solver.set_upper(2, Num::from_integer(6), Literal::positive(3));
    assert!(matches!(outcome, Outcome::Fail(_)));
  }

  #[test]
  fn feasible_system_propagates_cleanly() {
    let mut solver = LinearSolver::new(0, 1 << 32);
    solver.add_row(2, vec![(Num::from_integer(1), 0), (Num::from_integer(1), 1)]);
    solver.set_lower(0, Num::from_integer(1), Literal::positive(1));
    solver.set_lower(1, Num::from_integer(1), Literal::positive(2));
    let outcome = solver.set_upper(2, Num::from_integer(10), Literal::positive(3));
    assert!(matches!(outcome, Outcome::Propagate));
  }

  #[test]
  fn undo_restores_bounds_and_values() {
    let mut solver = LinearSolver::new(0, 1 << 32);
    solver.add_row(2, vec![(Num::from_integer(1), 0), (Num::from_integer(1), 1)]);
    let mark = solver.mark();
    solver.set_lower(0, Num::from_integer(5), Literal::positive(1));
    solver.undo_to(mark);
    assert!(solver.lower.get(&0).is_none());
    assert_eq!(solver.value_of(0), Num::from_integer(0));
  }

  #[test]
  fn overflow_guard_flags_oversized_rationals() {
    let solver = LinearSolver::new(0, 100);
    assert!(solver.is_within_bound(Num::from_integer(50)));
    assert!(!solver.is_within_bound(Num::from_integer(1000)));
  }
}
