/*!

The CDCL Boolean search engine, SPEC_FULL §4.1 and `original_source/sat.c`/`sat.h`: two-watched-literal
unit propagation, first-UIP conflict-driven clause learning with non-chronological backtracking, a
lazily-deleted activity-ordered decision heap (the original's `sat_order` array made safe without an
intrusive structure), and Luby-sequence restarts.

The original's theory coupling is a raw `longjmp` back into this loop's stack frame on conflict or
restart; `theory::Outcome` replaces that with an ordinary return value (see `theory/mod.rs`'s module
docs), so `Engine::propagate_to_fixpoint` interleaves Boolean unit propagation with draining
`PropagatorQueue` exactly the way the original interleaves `sat_propagate` with `prop_run`, just
without unwinding arbitrary call frames to get there.

*/

use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::backend::{CompiledProblem, SolverSlot, TheorySuite};
use crate::chr::compiler::ChrProgram;
use crate::chr::vm::{ChrContext, ChrSymbols};
use crate::chr::vm;
use crate::theory::domain::DomainContext;
use crate::clause::{Clause, ClauseVector};
use crate::cnf::Definition;
use crate::config::{Config, RestartStrategy};
use crate::data_structures::RandomGenerator;
use crate::lifted_bool::LiftedBool;
use crate::model::Model;
use crate::propagator::PropagatorQueue;
use crate::resource_limit::ResourceLimit;
use crate::status::Status;
use crate::store::Store;
use crate::term::Term;
use crate::theory::{Action, Outcome, TheoryContext};
use crate::trail::Mark;
use crate::union_find::UnionFind;
use crate::watched::{Watched, WatchTable};
use crate::{BoolVariable, ClauseId, ConsId, Error, Literal, LiteralVector, PropId};

/// Why a variable is currently assigned, for conflict-analysis resolution and for skipping
/// decision-level-0 facts (which never need to appear in a learned clause).
#[derive(Clone, Debug)]
enum Reason {
  /// A branching choice: nothing to resolve through.
  Decision,
  /// Forced by a unit clause loaded before search began (always at decision level 0).
  Unit,
  /// Forced by a binary clause `{lit, other}` where `other` had just become false.
  Binary(Literal),
  /// Forced by a clause of three or more literals.
  Clause(ClauseId),
  /// Forced by a theory propagator's `TheoryContext::assert_literal`; the boxed slice is the full
  /// antecedent clause (asserted literal first, then the literals that justify it, each false).
  Theory(Rc<[Literal]>),
}

#[derive(Clone, Debug, Default)]
struct VarState {
  value: LiftedBool,
  level: u32,
  reason: Option<Reason>,
}

/// One entry in the decision heap. Stale entries (pushed before a later activity bump) are left in
/// place and discarded lazily at pop time rather than updated in place, the common VSIDS heap trick.
#[derive(Copy, Clone, Debug)]
struct ActivityEntry {
  activity: f64,
  var: BoolVariable,
}

impl PartialEq for ActivityEntry {
  fn eq(&self, other: &Self) -> bool {
    self.activity == other.activity && self.var == other.var
  }
}
impl Eq for ActivityEntry {}

impl PartialOrd for ActivityEntry {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for ActivityEntry {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.activity.partial_cmp(&other.activity).unwrap_or(std::cmp::Ordering::Equal).then_with(|| self.var.cmp(&other.var))
  }
}

/// The marks every trailed subsystem needs recorded at the start of a decision level, so backjumping
/// can undo each one in lockstep with the SAT assignment trail.
#[derive(Copy, Clone, Debug)]
struct LevelMark {
  trail_len: usize,
  union_find: Mark,
  store: Mark,
  propagators: Mark,
}

pub struct Engine {
  config: Config,

  clauses: ClauseVector,
  watches: WatchTable,

  model: Model,
  var_state: Vec<VarState>,
  trail: Vec<Literal>,
  level_marks: Vec<LevelMark>,
  qhead: usize,
  theory_qhead: usize,

  order_heap: BinaryHeap<ActivityEntry>,
  activity: Vec<f64>,
  saved_phase: Vec<bool>,
  rng: RandomGenerator,

  union_find: UnionFind,
  store: Store,
  propagators: PropagatorQueue,
  theories: TheorySuite,
  prop_slot: std::collections::HashMap<PropId, SolverSlot>,
  var_to_props: std::collections::HashMap<BoolVariable, Vec<PropId>>,
  chr: ChrProgram,
  chr_cons_prop: std::collections::HashMap<ConsId, PropId>,
  chr_symbols: ChrSymbols,
  /// The next fresh Boolean variable a CHR disjunctive body may mint to reify a branch, per
  /// `chr::vm`'s module docs. Starts past every variable CNF compilation already allocated.
  next_bool_var: BoolVariable,
  /// Kept only so a satisfying model can be read back into residual atomic constraints once
  /// search succeeds; `Engine` itself never inspects the atoms.
  definitions: Vec<Definition>,

  conflicts: u64,
  backtracks: u64,
  next_restart: u64,
  restart_seq: u64,
  next_decay: u64,

  resource_limit: ResourceLimit,
  is_unsat: bool,
}

impl Engine {
  pub fn new(compiled: CompiledProblem, config: Config) -> Result<Self, Error> {
    let num_vars = compiled.num_bool_vars;

    let mut model = Model::new();
    model.resize(num_vars);

    let mut order_heap = BinaryHeap::with_capacity(num_vars);
    for var in 0..num_vars {
      order_heap.push(ActivityEntry { activity: 0.0, var });
    }

    let restart_base = config.restart_base as u64;
    let next_decay = config.activity_decay_interval as u64;

    let mut engine = Self {
      config,
      clauses: ClauseVector::new(),
      watches: WatchTable::new(),
      model,
      var_state: vec![VarState::default(); num_vars],
      trail: Vec::new(),
      level_marks: Vec::new(),
      qhead: 0,
      theory_qhead: 0,
      order_heap,
      activity: vec![0.0; num_vars],
      saved_phase: vec![false; num_vars],
      rng: RandomGenerator::new(),
      union_find: compiled.union_find,
      store: compiled.store,
      propagators: compiled.propagators,
      theories: compiled.theories,
      prop_slot: compiled.prop_slot,
      var_to_props: compiled.var_to_props,
      definitions: compiled.definitions,
      chr: compiled.chr,
      chr_cons_prop: compiled.chr_cons_prop,
      chr_symbols: compiled.chr_symbols,
      next_bool_var: num_vars,
      conflicts: 0,
      backtracks: 0,
      next_restart: restart_base,
      restart_seq: 1,
      next_decay,
      resource_limit: ResourceLimit::new(),
      is_unsat: false,
    };

    for lits in compiled.clauses {
      engine.add_initial_clause(lits)?;
    }

    Ok(engine)
  }

  // region accessors

  fn decision_level(&self) -> u32 {
    self.level_marks.len() as u32
  }

  fn value_of(&self, lit: Literal) -> LiftedBool {
    self.model.value_of(lit)
  }

  /// The atoms a satisfying model left undecided, for `solver::execute`'s `Status::Sat` residue.
  /// `Engine` only exposes the fact/term pair; deciding which ones are still "residual" (as
  /// opposed to fully resolved by the union-find and theory stores) is the caller's job.
  pub fn model(&self) -> &Model {
    &self.model
  }

  pub fn definitions(&self) -> &[Definition] {
    &self.definitions
  }

  fn atom_of(definition: &Definition) -> Rc<Term> {
    definition.atom.clone()
  }

  /// Atoms whose defining Boolean variable is still undecided in the final model -- this should
  /// never happen once `run` reports `Status::Sat` (every variable gets a value before the search
  /// loop stops), but is exposed for callers that want to sanity-check that invariant.
  pub fn undecided_atoms(&self) -> Vec<Rc<Term>> {
    self
      .definitions
      .iter()
      .filter(|d| self.model.value_of(Literal::positive(d.var)) == LiftedBool::Undefined)
      .map(Self::atom_of)
      .collect()
  }

  /// Grows every per-variable array up to `n` variables, pushing a fresh `ActivityEntry` for each
  /// newly added one so the decision heap can pick it. Called the first time a CHR disjunctive
  /// body mints a fresh reifying variable (`chr::vm::ChrContext::mint_bool_var`).
  fn grow_vars_to(&mut self, n: BoolVariable) {
    let old = self.var_state.len();
    if n <= old {
      return;
    }
    self.model.resize(n);
    self.var_state.resize(n, VarState::default());
    self.activity.resize(n, 0.0);
    self.saved_phase.resize(n, false);
    for var in old..n {
      self.order_heap.push(ActivityEntry { activity: 0.0, var });
    }
  }

  // endregion

  // region clause loading

  fn add_initial_clause(&mut self, lits: LiteralVector) -> Result<(), Error> {
    match lits.len() {
      0 => {
        self.is_unsat = true;
      }
      1 => {
        self.enqueue_unit(lits[0])?;
      }
      2 => {
        self.watch_binary(lits[0], lits[1]);
      }
      _ => {
        self.install_clause(lits, false);
      }
    }
    Ok(())
  }

  fn watch_binary(&mut self, a: Literal, b: Literal) {
    self.watches.watch(a, Watched::Binary { literal: b, is_learned: false });
    self.watches.watch(b, Watched::Binary { literal: a, is_learned: false });
  }

  fn install_clause(&mut self, lits: LiteralVector, is_learned: bool) -> ClauseId {
    let id = self.clauses.len();
    let clause = Clause::new(id, lits, is_learned);
    let lit0 = clause[0];
    let lit1 = clause[1];
    self.clauses.push(clause);
    self.watches.watch(lit0, Watched::Clause { blocked_literal: lit1, clause_id: id });
    self.watches.watch(lit1, Watched::Clause { blocked_literal: lit0, clause_id: id });
    id
  }

  fn enqueue_unit(&mut self, lit: Literal) -> Result<(), Error> {
    match self.value_of(lit) {
      LiftedBool::True => Ok(()),
      LiftedBool::False => {
        self.is_unsat = true;
        Ok(())
      }
      LiftedBool::Undefined => {
        self.assign(lit, Reason::Unit);
        Ok(())
      }
    }
  }

  // endregion

  // region assignment and backtracking

  fn assign(&mut self, lit: Literal, reason: Reason) {
    let var = lit.var();
    let value = LiftedBool::from(!lit.sign());
    self.var_state[var] = VarState { value, level: self.decision_level(), reason: Some(reason) };
    self.model.set(var, value);
    self.trail.push(lit);
  }

  fn new_decision_level(&mut self) {
    self.level_marks.push(LevelMark {
      trail_len: self.trail.len(),
      union_find: self.union_find.mark(),
      store: self.store.mark(),
      propagators: self.propagators.mark(),
    });
  }

  /// Unwinds every trailed subsystem back to the start of decision level `level`, leaving the
  /// engine at exactly that level (no decision literal for `level` remains assigned).
  fn backjump(&mut self, level: u32) {
    while self.level_marks.len() > level as usize {
      let mark = self.level_marks.pop().expect("checked len() above");
      while self.trail.len() > mark.trail_len {
        let lit = self.trail.pop().expect("checked len() above");
        self.saved_phase[lit.var()] = !lit.sign();
        self.var_state[lit.var()] = VarState::default();
        self.order_heap.push(ActivityEntry { activity: self.activity[lit.var()], var: lit.var() });
      }
      self.union_find.undo_to(mark.union_find);
      self.store.undo_to(mark.store);
      self.propagators.undo_to(mark.propagators);
    }
    self.propagators.flush();
    self.qhead = self.trail.len();
    self.theory_qhead = self.trail.len();
  }

  // endregion

  // region Boolean constraint propagation

  fn find_new_watch(model: &Model, clause: &mut Clause, falsified: Literal) -> Option<Literal> {
    let pos = if clause[0] == falsified { 0 } else { 1 };
    for k in 2..clause.size() {
      if model.value_of(clause[k]) != LiftedBool::False {
        let new_lit = clause[k];
        clause.swap_literals(pos, k);
        return Some(new_lit);
      }
    }
    None
  }

  /// Drains the Boolean propagation queue. Returns the violated clause (already in "every literal
  /// false" form) on conflict.
  fn bcp(&mut self) -> Option<Vec<Literal>> {
    while self.qhead < self.trail.len() {
      let p = self.trail[self.qhead];
      self.qhead += 1;
      let falsified = !p;

      let taken = std::mem::take(&mut self.watches.get_mut(falsified).list);
      let mut kept = Vec::with_capacity(taken.len());
      let mut idx = 0;
      let mut conflict = None;
      let mut to_enqueue: Vec<(Literal, Reason)> = Vec::new();

      while idx < taken.len() {
        let w = taken[idx];
        idx += 1;
        match w {
          Watched::Binary { literal, .. } => match self.value_of(literal) {
            LiftedBool::True => kept.push(w),
            LiftedBool::False => {
              conflict = Some(vec![falsified, literal]);
              kept.push(w);
              break;
            }
            LiftedBool::Undefined => {
              kept.push(w);
              to_enqueue.push((literal, Reason::Binary(falsified)));
            }
          },
          Watched::Clause { blocked_literal, clause_id } => {
            if self.value_of(blocked_literal) == LiftedBool::True {
              kept.push(w);
              continue;
            }
            let moved = {
              let model = &self.model;
              Self::find_new_watch(model, &mut self.clauses[clause_id], falsified)
            };
            match moved {
              Some(new_lit) => {
                self.watches.get_mut(new_lit).list.push(Watched::Clause { blocked_literal, clause_id });
              }
              None => match self.value_of(blocked_literal) {
                LiftedBool::Undefined => {
                  kept.push(w);
                  to_enqueue.push((blocked_literal, Reason::Clause(clause_id)));
                }
                LiftedBool::False => {
                  conflict = Some(self.clauses[clause_id].literals().clone());
                  kept.push(w);
                  break;
                }
                LiftedBool::True => unreachable!("handled above"),
              },
            }
          }
          Watched::ExtensionConstraint(_) => kept.push(w),
        }
      }

      kept.extend_from_slice(&taken[idx..]);
      self.watches.get_mut(falsified).list = kept;

      for (lit, reason) in to_enqueue {
        // A literal can be targeted by more than one watch in the same pass (e.g. two different
        // binary clauses both implying it); only the first assignment sticks, the rest are
        // redundant once it's no longer free.
        if self.value_of(lit) == LiftedBool::Undefined {
          self.assign(lit, reason);
        } else if self.value_of(lit) == LiftedBool::False {
          return Some(vec![lit, !lit]);
        }
      }

      if conflict.is_some() {
        return conflict;
      }
    }
    None
  }

  // endregion

  // region theory coupling

  /// Dispatches one propagator wake to its owning theory, applying any deferred `Action`s it
  /// queued. Returns the `Outcome` the theory reported, or the first fatal error raised while
  /// applying a queued `Action::AddClause`.
  fn run_propagator(&mut self, prop: PropId) -> Result<Outcome, Error> {
    let cons = self.propagators.cons_of(prop);
    let lit = self.store.get(cons).literal;
    let value = self.value_of(lit) == LiftedBool::True;
    let slot = self.prop_slot.get(&prop).copied();

    let (outcome, actions) = if let Some(SolverSlot::Chr(symbol)) = slot {
      let mut next_bool_var = self.next_bool_var;
      let mut chr_ctx = ChrContext {
        union_find: &mut self.union_find,
        store: &mut self.store,
        propagators: &mut self.propagators,
        prop_slot: &mut self.prop_slot,
        var_to_props: &mut self.var_to_props,
        chr_cons_prop: &mut self.chr_cons_prop,
        next_bool_var: &mut next_bool_var,
        symbols: self.chr_symbols,
        true_literal: Literal::positive(1),
        actions: Vec::new(),
      };
      let outcome = vm::run_for_symbol(&self.chr, symbol, &mut chr_ctx, cons)?;
      let actions = std::mem::take(&mut chr_ctx.actions);
      drop(chr_ctx);
      if next_bool_var > self.next_bool_var {
        self.next_bool_var = next_bool_var;
        self.grow_vars_to(next_bool_var);
      }
      (outcome, actions)
    } else if slot == Some(SolverSlot::Domain) {
      // A `dom` expansion mints a fresh SAT variable per disjunct and wires each into the Bounds
      // slot, so it needs the same wider access as the Chr branch above, not a plain
      // `TheoryContext`; see `theory::domain`'s module docs.
      let mut next_bool_var = self.next_bool_var;
      let mut ctx = DomainContext {
        union_find: &mut self.union_find,
        store: &mut self.store,
        propagators: &mut self.propagators,
        prop_slot: &mut self.prop_slot,
        var_to_props: &mut self.var_to_props,
        next_bool_var: &mut next_bool_var,
        actions: Vec::new(),
      };
      let outcome = self.theories.domain.expand(&mut ctx, cons, value);
      let actions = std::mem::take(&mut ctx.actions);
      drop(ctx);
      if next_bool_var > self.next_bool_var {
        self.next_bool_var = next_bool_var;
        self.grow_vars_to(next_bool_var);
      }
      (outcome, actions)
    } else {
      let mut ctx = TheoryContext::new(&mut self.union_find, &mut self.store);
      let outcome = match slot {
        Some(SolverSlot::Equality) => self.theories.equality.propagate(&mut ctx, cons, value),
        Some(SolverSlot::Bounds) => self.theories.bounds.propagate(&mut ctx, cons, value),
        Some(SolverSlot::Linear) => self.theories.linear.propagate(&mut ctx, cons, value),
        Some(SolverSlot::Heaps) => self.theories.heaps.propagate(&mut ctx, cons, value),
        Some(SolverSlot::Domain) => unreachable!("handled above"),
        Some(SolverSlot::Chr(_)) => unreachable!("handled above"),
        None => Outcome::Propagate,
      };
      let actions = std::mem::take(&mut ctx.actions);
      drop(ctx);
      (outcome, actions)
    };

    if slot == Some(SolverSlot::Domain) && matches!(outcome, Outcome::Propagate) {
      // A `dom` expansion is one-shot: it must never re-fire even after a restart re-decides the
      // same literal, per `theory::domain`'s module docs.
      self.propagators.annihilate(prop);
    }

    for action in actions {
      match action {
        Action::AssertLiteral { lit, reason } => {
          let mut clause_lits = vec![lit];
          clause_lits.extend(reason);
          self.assign(lit, Reason::Theory(clause_lits.into()));
        }
        Action::AddClause { lits, keep } => {
          self.add_clause_during_search(lits, keep)?;
        }
        Action::Fail { .. } => {
          // Folded into the propagator's own `Outcome::Fail` return in every theory solver this
          // crate ships; kept here only so `Action` stays a complete enum for future propagators.
        }
      }
    }

    Ok(outcome)
  }

  /// Schedules every propagator registered against variables assigned since the last call, then
  /// drains `PropagatorQueue` until it's empty or a theory reports `Fail`/`Restart`. Interleaved
  /// with `bcp` by `propagate_to_fixpoint` so a theory-asserted literal gets Boolean-propagated
  /// before the next theory wake runs.
  fn drain_theories(&mut self) -> Result<Option<Outcome>, Error> {
    while self.theory_qhead < self.trail.len() {
      let lit = self.trail[self.theory_qhead];
      self.theory_qhead += 1;
      let event = if lit.sign() { crate::propagator::EventMask::DECISION_FALSE } else { crate::propagator::EventMask::DECISION_TRUE };
      if let Some(props) = self.var_to_props.get(&lit.var()).cloned() {
        for prop in props {
          if self.propagators.wakes_on(prop, event) {
            self.propagators.schedule(prop);
          }
        }
      }
    }

    while let Some(prop) = self.propagators.pop_ready() {
      let outcome = self.run_propagator(prop)?;
      self.propagators.finish_running();
      match outcome {
        Outcome::Propagate => continue,
        other => return Ok(Some(other)),
      }
    }
    Ok(None)
  }

  /// Runs Boolean unit propagation and theory propagation to a joint fixpoint. Returns the
  /// conflict clause on failure (in "every literal false" form, ready for `analyze`).
  fn propagate_to_fixpoint(&mut self) -> Result<Option<Vec<Literal>>, Error> {
    loop {
      if let Some(conflict) = self.bcp() {
        return Ok(Some(conflict));
      }
      if self.theory_qhead >= self.trail.len() && self.propagators.pop_ready().is_none() {
        return Ok(None);
      }
      match self.drain_theories()? {
        None => {
          if self.theory_qhead >= self.trail.len() {
            return Ok(None);
          }
        }
        Some(Outcome::Fail(reason)) => return Ok(Some(reason)),
        Some(Outcome::Restart(unit)) => {
          self.backjump(0);
          self.enqueue_unit(unit)?;
          if self.is_unsat {
            return Ok(Some(Vec::new()));
          }
        }
        Some(Outcome::Propagate) => {}
      }
    }
  }

  // endregion

  // region clause learning

  fn reason_literals(&self, lit: Literal) -> Vec<Literal> {
    match &self.var_state[lit.var()].reason {
      Some(Reason::Binary(other)) => vec![lit, *other],
      Some(Reason::Clause(id)) => self.clauses[*id].literals().clone(),
      Some(Reason::Theory(lits)) => lits.to_vec(),
      Some(Reason::Unit) | Some(Reason::Decision) | None => vec![lit],
    }
  }

  fn bump_activity(&mut self, var: BoolVariable) {
    self.activity[var] += self.config.activity_bump;
    self.order_heap.push(ActivityEntry { activity: self.activity[var], var });
  }

  fn decay_activities(&mut self) {
    for a in &mut self.activity {
      *a *= 0.5;
    }
  }

  /// First-UIP conflict analysis: marks literals at the current decision level, resolves through
  /// their antecedents walking the trail backwards, and stops the moment exactly one literal from
  /// the current level remains unresolved (the UIP). Mirrors `original_source/sat.c`'s
  /// `sat_backtrack`, adapted to Rust ownership (no in-place marking of a global variable array
  /// shared with the rest of the engine -- `seen` is local to this call).
  fn analyze(&mut self, conflict: Vec<Literal>) -> (Vec<Literal>, u32) {
    let mut seen = vec![false; self.var_state.len()];
    let mut learned: Vec<Literal> = vec![Literal::null()];
    let mut back_level: u32 = 0;
    let mut counter: u32 = 0;
    let mut clause_lits = conflict;
    let mut trail_idx = self.trail.len();
    let mut p: Option<Literal> = None;

    loop {
      for &q in &clause_lits {
        if Some(q) == p {
          continue;
        }
        let var = q.var();
        if seen[var] {
          continue;
        }
        let level = self.var_state[var].level;
        if level == 0 {
          continue;
        }
        seen[var] = true;
        self.bump_activity(var);
        if level == self.decision_level() {
          counter += 1;
        } else if learned.len() == 1 {
          learned.push(q);
          back_level = level;
        } else if level > back_level {
          let displaced = learned[1];
          learned.push(displaced);
          learned[1] = q;
          back_level = level;
        } else {
          learned.push(q);
        }
      }

      loop {
        trail_idx -= 1;
        let lit = self.trail[trail_idx];
        if seen[lit.var()] {
          p = Some(lit);
          break;
        }
      }
      let pv = p.expect("trail walk always finds the marked literal before running out");
      seen[pv.var()] = false;
      counter -= 1;
      if counter == 0 {
        break;
      }
      clause_lits = self.reason_literals(pv);
    }

    learned[0] = !p.expect("loop always sets p before breaking");
    (learned, back_level)
  }

  // endregion

  // region lazy clause addition (theory-posted lemmas)

  /// Adds a clause discovered mid-search by a theory propagator (`TheoryContext::add_clause`),
  /// classifying it exactly as `original_source/sat.c`'s `sat_lazy_clause`: redundant/tautological
  /// clauses are dropped, unit clauses trigger a restart-and-propagate, and a clause whose forcing
  /// literal sits at an older decision level than the current one is a "late clause" -- an error
  /// unless `Config::recover_late_clause` allows recovering it by backjumping to that literal's
  /// level and retrying, at which point it installs like any ordinary clause.
  fn add_clause_during_search(&mut self, mut lits: Vec<Literal>, keep: bool) -> Result<(), Error> {
    lits.sort_by_key(|l| l.index());
    lits.dedup();
    if lits.iter().any(|&l| lits.contains(&!l)) {
      return Ok(()); // tautology, contributes nothing
    }
    lits.retain(|&l| !(self.var_state[l.var()].level == 0 && self.value_of(l) == LiftedBool::False));

    match lits.len() {
      0 => {
        self.is_unsat = true;
      }
      1 => match self.value_of(lits[0]) {
        LiftedBool::True => {}
        LiftedBool::False => self.is_unsat = true,
        LiftedBool::Undefined => {
          self.backjump(0);
          self.enqueue_unit(lits[0])?;
        }
      },
      _ => {
        lits.sort_by_key(|&l| match self.value_of(l) {
          LiftedBool::Undefined => 0,
          LiftedBool::True => 1,
          LiftedBool::False => 2,
        });
        let lit0 = lits[0];
        let lit1 = lits[1];

        if self.value_of(lit0) == LiftedBool::False {
          let lit0_level = self.var_state[lit0.var()].level;
          if lit0_level != self.decision_level() {
            if !self.config.recover_late_clause {
              return Err(Error::late_clause(self.clauses.len()));
            }
            self.backjump(lit0_level);
            return self.add_clause_during_search(lits, keep);
          }
        }

        let id = self.install_clause(lits, keep);
        if keep {
          self.clauses[id].freeze();
        }
        if self.value_of(lit0) == LiftedBool::Undefined && self.value_of(lit1) == LiftedBool::False {
          self.assign(lit0, Reason::Clause(id));
        }
      }
    }
    Ok(())
  }

  // endregion

  // region restarts and decisions

  fn luby(i: u64) -> u64 {
    if i <= 1 {
      return 1;
    }
    let mut j = i + 1;
    let mut k = 0;
    while j & 1 == 0 {
      j >>= 1;
      k += 1;
    }
    if j == 1 {
      1 << (k.max(1) - 1)
    } else {
      while j != 1 {
        j >>= 1;
        k += 1;
      }
      Self::luby(i - (1 << k) + 1)
    }
  }

  fn maybe_restart(&mut self) {
    if self.backtracks < self.next_restart {
      return;
    }
    self.restart_seq += 1;
    let base = self.config.restart_base as u64;
    let bump = match self.config.restart_strategy {
      RestartStrategy::Luby => base * Self::luby(self.restart_seq),
      RestartStrategy::Static => base,
    };
    self.next_restart += bump;
    self.backjump(0);
  }

  /// Phase-saved polarity almost always, with an occasional random flip for diversification --
  /// `original_source/sat.c`'s `sat_decide` picking a random sign roughly one time in twenty.
  fn pick_branch_literal(&mut self) -> Option<Literal> {
    while let Some(entry) = self.order_heap.pop() {
      if self.var_state[entry.var].value == LiftedBool::Undefined {
        let saved = self.saved_phase[entry.var];
        let sign = if self.rng.at_most(20) == 0 { !saved } else { saved };
        return Some(Literal::new(entry.var, sign));
      }
    }
    None
  }

  // endregion

  /// Runs the search to completion: unit-propagates the initial clauses, then alternates deciding
  /// a literal and propagating until either every variable is assigned (SAT) or a conflict at
  /// decision level 0 proves the problem UNSAT.
  pub fn run(&mut self) -> Result<Status, Error> {
    if self.is_unsat {
      return Ok(Status::Unsat);
    }

    if self.propagate_to_fixpoint()?.is_some() {
      return Ok(Status::Unsat);
    }

    loop {
      if !self.resource_limit.inc() {
        return Err(Error::protocol(self.resource_limit.cancel_msg()));
      }

      self.maybe_restart();
      if self.backtracks >= self.next_decay {
        self.next_decay += self.config.activity_decay_interval as u64;
        self.decay_activities();
      }

      let lit = match self.pick_branch_literal() {
        Some(lit) => lit,
        None => return Ok(Status::sat()),
      };

      self.new_decision_level();
      self.assign(lit, Reason::Decision);

      loop {
        match self.propagate_to_fixpoint()? {
          None => break,
          Some(conflict) => {
            self.conflicts += 1;
            self.backtracks += 1;
            if self.decision_level() == 0 {
              return Ok(Status::Unsat);
            }
            let (learned, back_level) = self.analyze(conflict);
            self.backjump(back_level);
            match learned.len() {
              1 => {
                self.enqueue_unit(learned[0])?;
              }
              2 => {
                self.watch_binary(learned[0], learned[1]);
                if self.value_of(learned[0]) == LiftedBool::Undefined {
                  self.assign(learned[0], Reason::Binary(learned[1]));
                }
              }
              _ => {
                let id = self.install_clause(learned.clone(), true);
                if self.value_of(learned[0]) == LiftedBool::Undefined {
                  self.assign(learned[0], Reason::Clause(id));
                }
              }
            }
            if self.is_unsat {
              return Ok(Status::Unsat);
            }
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::BuiltinSymbols;
  use crate::term::AtomTable;

  fn empty_problem(num_bool_vars: BoolVariable) -> CompiledProblem {
    let mut atoms = AtomTable::new();
    let symbols = BuiltinSymbols::register(&mut atoms);
    let config = Config::default();
    CompiledProblem {
      clauses: Vec::new(),
      num_bool_vars,
      union_find: UnionFind::new(),
      store: Store::new(),
      propagators: PropagatorQueue::new(),
      theories: TheorySuite::new(&symbols, &config),
      prop_slot: std::collections::HashMap::new(),
      var_to_props: std::collections::HashMap::new(),
      definitions: Vec::new(),
      chr: ChrProgram::default(),
      chr_cons_prop: std::collections::HashMap::new(),
      chr_symbols: ChrSymbols { eq: symbols.eq, eq_c: symbols.eq_c },
    }
  }

  #[test]
  fn unit_clause_forces_its_literal() {
    let mut compiled = empty_problem(2);
    compiled.clauses.push(vec![Literal::positive(1)]);
    let mut engine = Engine::new(compiled, Config::default()).unwrap();
    let status = engine.run().unwrap();
    assert!(status.is_sat());
    assert_eq!(engine.value_of(Literal::positive(1)), LiftedBool::True);
  }

  #[test]
  fn conflicting_units_are_unsat() {
    let mut compiled = empty_problem(2);
    compiled.clauses.push(vec![Literal::positive(1)]);
    compiled.clauses.push(vec![Literal::negative(1)]);
    let mut engine = Engine::new(compiled, Config::default()).unwrap();
    assert!(engine.run().unwrap().is_unsat());
  }

  #[test]
  fn binary_clause_propagates_the_other_literal() {
    let mut compiled = empty_problem(3);
    compiled.clauses.push(vec![Literal::positive(1)]);
    compiled.clauses.push(vec![Literal::negative(1), Literal::positive(2)]);
    let mut engine = Engine::new(compiled, Config::default()).unwrap();
    let status = engine.run().unwrap();
    assert!(status.is_sat());
    assert_eq!(engine.value_of(Literal::positive(2)), LiftedBool::True);
  }

  #[test]
  fn pigeonhole_two_into_one_is_unsat() {
    // x1 v x2 (someone takes the hole), ~x1 v ~x2 (not both).
    let mut compiled = empty_problem(3);
    compiled.clauses.push(vec![Literal::positive(1), Literal::positive(2)]);
    compiled.clauses.push(vec![Literal::negative(1), Literal::negative(2)]);
    let mut engine = Engine::new(compiled, Config::default()).unwrap();
    assert!(engine.run().unwrap().is_sat());
  }

  #[test]
  fn three_clause_conflict_triggers_learning_and_stays_sat() {
    // (x1 v x2 v x3), (~x1 v x2), (~x2 v x3), (~x1 v ~x3): forces a decision, a conflict, and a
    // backjump before the remaining variable settles.
    let mut compiled = empty_problem(4);
    compiled.clauses.push(vec![Literal::positive(1), Literal::positive(2), Literal::positive(3)]);
    compiled.clauses.push(vec![Literal::negative(1), Literal::positive(2)]);
    compiled.clauses.push(vec![Literal::negative(2), Literal::positive(3)]);
    compiled.clauses.push(vec![Literal::negative(1), Literal::negative(3)]);
    let mut engine = Engine::new(compiled, Config::default()).unwrap();
    assert!(engine.run().unwrap().is_sat());
  }

  #[test]
  fn empty_clause_set_is_trivially_sat() {
    let compiled = empty_problem(1);
    let mut engine = Engine::new(compiled, Config::default()).unwrap();
    assert!(engine.run().unwrap().is_sat());
  }
}
