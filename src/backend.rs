/*!

The bridge between the term/expr/rewrite/flatten/cnf pipeline and the constraint store/propagator
queue/theory solvers, SPEC_FULL §4.6-§4.8. `Backend::compile` takes a fully rewritten goal term and
produces a `CompiledProblem`: the CNF clauses `sat::Engine` loads directly, plus the constraint
store and theory solvers wired up so that whenever the engine assigns one of `cnf::Definition`'s
Boolean variables, it knows which theory propagator to wake.

Flattened arithmetic primitives (`flatten::Primitive`) are facts that hold unconditionally -- they
define an auxiliary variable, they aren't reified by a SAT literal -- so they're wired directly into
`theory::bounds`/`theory::linear` at compile time rather than routed through the constraint store's
wake mechanism. Only the *relational* atoms CNF couldn't interpret Boolean-structurally (`x = y`,
`x > c`, predicate applications) are reified and go through the store.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::chr::compiler::ChrProgram;
use crate::chr::vm::ChrSymbols;
use crate::cnf::{CnfBuilder, Definition};
use crate::config::Config;
use crate::flatten::{Flattener, Operand, Primitive};
use crate::propagator::{EventMask, PropagatorQueue};
use crate::store::Store;
use crate::term::{AtomTable, Num, Op, Term};
use crate::theory::bounds::BoundsSolver;
use crate::theory::domain::DomainSolver;
use crate::theory::equality::EqualitySolver;
use crate::theory::heaps::HeapsSolver;
use crate::theory::linear::LinearSolver;
use crate::union_find::UnionFind;
use crate::{AtomId, BoolVariable, ConsId, Error, Literal, LiteralVector, PropId, VarId};

/// Every built-in predicate/relation symbol the backend and theory solvers agree on by construction
/// (as opposed to user-declared CHR predicates, which are interned ad hoc as they're parsed).
#[derive(Copy, Clone, Debug)]
pub struct BuiltinSymbols {
  pub eq: AtomId,
  pub gt: AtomId,
  pub lb: AtomId,
  pub eq_c: AtomId,
  pub dom: AtomId,
  pub sep: AtomId,
  pub eq_h: AtomId,
  pub sub: AtomId,
  pub inn: AtomId,
}

impl BuiltinSymbols {
  pub fn register(atoms: &mut AtomTable) -> Self {
    Self {
      eq: atoms.intern("=", 2),
      gt: atoms.intern(">", 2),
      lb: atoms.intern("$lb", 2),
      eq_c: atoms.intern("$eqc", 2),
      dom: atoms.intern("dom", 3),
      sep: atoms.intern("sep", 2),
      eq_h: atoms.intern("eqh", 2),
      sub: atoms.intern("sub", 2),
      inn: atoms.intern("in", 2),
    }
  }
}

/// Which theory solver owns a registered propagator, so the SAT engine's wake loop knows which
/// field of `TheorySuite` to call back into.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolverSlot {
  Equality,
  Bounds,
  Domain,
  Linear,
  Heaps,
  /// A user-declared CHR predicate, woken to run every occurrence registered for `symbol`
  /// (`chr::vm::run_for_symbol`).
  Chr(AtomId),
}

pub struct TheorySuite {
  pub equality: EqualitySolver,
  pub bounds: BoundsSolver,
  pub domain: DomainSolver,
  pub linear: LinearSolver,
  pub heaps: HeapsSolver,
}

impl TheorySuite {
  pub fn new(symbols: &BuiltinSymbols, config: &Config) -> Self {
    Self {
      equality: EqualitySolver::new(symbols.eq),
      bounds: BoundsSolver::new(symbols.lb, symbols.eq_c),
      domain: DomainSolver::new(symbols.dom, symbols.eq_c, config.domain_expansion_cap),
      linear: LinearSolver::new(symbols.gt, config.simplex_max_int),
      heaps: HeapsSolver::new(symbols.inn, symbols.sep, symbols.eq_h, symbols.sub),
    }
  }
}

/// A fully compiled problem: clauses ready for `sat::Engine`, plus the constraint store and theory
/// solvers those clauses' definitional atoms were wired into.
pub struct CompiledProblem {
  pub clauses: Vec<LiteralVector>,
  pub num_bool_vars: BoolVariable,
  pub union_find: UnionFind,
  pub store: Store,
  pub propagators: PropagatorQueue,
  pub theories: TheorySuite,
  pub prop_slot: HashMap<PropId, SolverSlot>,
  /// Which propagators wake when a given Boolean variable is decided, so `sat::Engine` can drive
  /// `PropagatorQueue::schedule` straight off its assignment trail instead of re-deriving it.
  pub var_to_props: HashMap<BoolVariable, Vec<PropId>>,
  /// The Tseitin definitions CNF boxed, kept around so a satisfying model can be read back into
  /// residual atomic constraints (`solver::execute`'s `Status::Sat` residue).
  pub definitions: Vec<Definition>,
  /// The compiled CHR occurrence programs, carried through unchanged from the `Backend` that
  /// compiled this problem so `sat::Engine` can dispatch `SolverSlot::Chr` wakes.
  pub chr: ChrProgram,
  /// Which propagator a CHR-visible constraint's `Instr::Delete` should kill.
  pub chr_cons_prop: HashMap<ConsId, PropId>,
  pub chr_symbols: ChrSymbols,
}

pub struct Backend<'a> {
  atoms: &'a mut AtomTable,
  symbols: BuiltinSymbols,
  config: &'a Config,
  chr: &'a ChrProgram,
}

impl<'a> Backend<'a> {
  pub fn new(atoms: &'a mut AtomTable, config: &'a Config, chr: &'a ChrProgram) -> Self {
    let symbols = BuiltinSymbols::register(atoms);
    Self { atoms, symbols, config, chr }
  }

  /// Compiles `goal` (already through `rewrite.rs`) into a `CompiledProblem`. `first_free_var`
  /// must be past every term-level variable already allocated, since `Flattener` mints auxiliary
  /// variables starting there.
  pub fn compile(&mut self, goal: &Rc<Term>, first_free_var: VarId) -> Result<CompiledProblem, Error> {
    let mut flattener = Flattener::new(first_free_var);
    let flattened_goal = flattener.flatten_formula(goal);

    let mut cnf = CnfBuilder::new(1);
    cnf.assert_true(&flattened_goal);

    let mut union_find = UnionFind::new();
    while (union_find.len() as VarId) < flattener.next_var() {
      union_find.fresh_var();
    }

    let mut store = Store::new();
    store.declare_symbol(self.symbols.eq, true, vec![]);
    store.declare_symbol(self.symbols.gt, false, vec![]);
    store.declare_symbol(self.symbols.sep, true, vec![]);
    store.declare_symbol(self.symbols.eq_h, true, vec![]);
    for (symbol, lookups) in self.chr.declared_symbols() {
      store.declare_symbol(symbol, false, lookups.to_vec());
    }

    let mut propagators = PropagatorQueue::new();
    let mut theories = TheorySuite::new(&self.symbols, self.config);
    let mut prop_slot = HashMap::new();
    let mut var_to_props: HashMap<BoolVariable, Vec<PropId>> = HashMap::new();
    let mut chr_cons_prop: HashMap<ConsId, PropId> = HashMap::new();

    for primitive in &flattener.constraints {
      self.wire_primitive(primitive, &mut theories)?;
    }

    let mut reason = Vec::new();
    for definition in &cnf.definitions {
      self.wire_definition(
        definition,
        &union_find,
        &mut store,
        &mut propagators,
        &mut prop_slot,
        &mut var_to_props,
        &mut chr_cons_prop,
        &mut reason,
      )?;
    }

    store.begin_search();

    let num_bool_vars = cnf.next_bool_var();
    let chr_symbols = ChrSymbols { eq: self.symbols.eq, eq_c: self.symbols.eq_c };

    Ok(CompiledProblem {
      clauses: cnf.clauses,
      num_bool_vars,
      union_find,
      store,
      propagators,
      theories,
      prop_slot,
      var_to_props,
      definitions: cnf.definitions,
      chr: self.chr.clone(),
      chr_cons_prop,
      chr_symbols,
    })
  }

  fn operand_num(operand: Operand) -> Option<Num> {
    match operand {
      Operand::Const(n) => Some(n),
      Operand::Var(_) => None,
    }
  }

  /// Wires an unconditional arithmetic definition straight into the bounds/linear solvers, per the
  /// module doc comment.
  fn wire_primitive(&self, primitive: &Primitive, theories: &mut TheorySuite) -> Result<(), Error> {
    match primitive {
      Primitive::Eq(_, _) | Primitive::Gt(_, _) => {
        // These are relational, not definitional; they're reached again as `cnf::Definition`s
        // once boxed by `cnf.rs`, so there is nothing to wire up here.
      }
      &Primitive::EqAdd(result, a, b) => {
        let terms = Self::operand_row_terms(a, b);
        theories.linear.add_row(result, terms);
      }
      &Primitive::EqMul(result, a, b) => match (Self::operand_num(a), Self::operand_num(b)) {
        (Some(c), None) => theories.linear.add_row(result, vec![(c, Self::operand_var_or_scratch(b))]),
        (None, Some(c)) => theories.linear.add_row(result, vec![(c, Self::operand_var_or_scratch(a))]),
        _ => {
          return Err(Error::type_error("non-linear multiplication (both operands variable) is unsupported"));
        }
      },
      &Primitive::EqPowConst(result, base, exponent) => {
        if exponent == Num::from_integer(1) {
          theories.linear.add_row(result, vec![(Num::from_integer(1), base)]);
        } else {
          return Err(Error::type_error("exponents other than 1 are outside the linear theory"));
        }
      }
    }
    Ok(())
  }

  fn operand_row_terms(a: Operand, b: Operand) -> Vec<(Num, VarId)> {
    // A constant operand in a sum contributes no row term; constant folding for `x = c1 + c2`
    // shaped sums happens upstream in `expr.rs`'s AC canonicalization, so by the time a `Primitive`
    // reaches here at least one operand is a variable in the overwhelming common case. A
    // const-only sum (both sides constants) has no meaningful row and is dropped.
    let mut terms = Vec::new();
    if let Operand::Var(v) = a {
      terms.push((Num::from_integer(1), v));
    }
    if let Operand::Var(v) = b {
      terms.push((Num::from_integer(1), v));
    }
    terms
  }

  fn operand_var_or_scratch(operand: Operand) -> VarId {
    match operand {
      Operand::Var(v) => v,
      Operand::Const(_) => unreachable!("caller already matched out the constant operand"),
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn wire_definition(
    &mut self,
    definition: &Definition,
    union_find: &UnionFind,
    store: &mut Store,
    propagators: &mut PropagatorQueue,
    prop_slot: &mut HashMap<PropId, SolverSlot>,
    var_to_props: &mut HashMap<BoolVariable, Vec<PropId>>,
    chr_cons_prop: &mut HashMap<ConsId, PropId>,
    reason: &mut Vec<Literal>,
  ) -> Result<(), Error> {
    let lit = Literal::positive(definition.var);

    match definition.atom.as_ref() {
      Term::Op(Op::Eq, args) if args.len() == 2 => {
        self.wire_relation(self.symbols.eq, lit, &args[0], &args[1], union_find, store, propagators, prop_slot, var_to_props, reason, SolverSlot::Equality, SolverSlot::Bounds)
      }
      Term::Op(Op::Gt, args) if args.len() == 2 => {
        self.wire_gt(lit, &args[0], &args[1], union_find, store, propagators, prop_slot, var_to_props, reason)
      }
      Term::Op(Op::Func(symbol), args) => {
        self.wire_predicate(*symbol, lit, args, union_find, store, propagators, prop_slot, var_to_props, chr_cons_prop, reason)
      }
      other => Err(Error::internal(format!("cnf produced an unclassifiable definition atom: {other}"))),
    }
  }

  fn note_wake(var_to_props: &mut HashMap<BoolVariable, Vec<PropId>>, lit: Literal, prop: PropId) {
    var_to_props.entry(lit.var()).or_default().push(prop);
  }

  #[allow(clippy::too_many_arguments)]
  fn wire_relation(
    &self,
    symbol: AtomId,
    lit: Literal,
    lhs: &Rc<Term>,
    rhs: &Rc<Term>,
    union_find: &UnionFind,
    store: &mut Store,
    propagators: &mut PropagatorQueue,
    prop_slot: &mut HashMap<PropId, SolverSlot>,
    var_to_props: &mut HashMap<BoolVariable, Vec<PropId>>,
    reason: &mut Vec<Literal>,
    var_var_slot: SolverSlot,
    var_const_slot: SolverSlot,
  ) -> Result<(), Error> {
    match (lhs.as_ref(), rhs.as_ref()) {
      (Term::Var(_), Term::Var(_)) => {
        let (cons, _) = store.intern(union_find, reason, symbol, vec![lhs.clone(), rhs.clone()], lit);
        let prop = propagators.register(cons, 3, EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE));
        prop_slot.insert(prop, var_var_slot);
        Self::note_wake(var_to_props, lit, prop);
      }
      (Term::Var(v), Term::Num(c)) | (Term::Num(c), Term::Var(v)) => {
        let args = vec![Rc::new(Term::Var(*v)), Rc::new(Term::Num(*c))];
        let (cons, _) = store.intern(union_find, reason, self.symbols.eq_c, args, lit);
        let prop = propagators.register(cons, 2, EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE));
        prop_slot.insert(prop, var_const_slot);
        Self::note_wake(var_to_props, lit, prop);
      }
      _ => return Err(Error::type_error("equality between two constants reached the backend unevaluated")),
    }
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn wire_gt(
    &self,
    lit: Literal,
    lhs: &Rc<Term>,
    rhs: &Rc<Term>,
    union_find: &UnionFind,
    store: &mut Store,
    propagators: &mut PropagatorQueue,
    prop_slot: &mut HashMap<PropId, SolverSlot>,
    var_to_props: &mut HashMap<BoolVariable, Vec<PropId>>,
    reason: &mut Vec<Literal>,
  ) -> Result<(), Error> {
    match (lhs.as_ref(), rhs.as_ref()) {
      // `a > c`: register LB(a, c) under the *negated* literal (LB is `a >= c`, so `a > c`'s
      // negation-of-strict collapses to the same cut point as the bounds solver's non-strict
      // `LB` per the simplification documented in `theory::bounds`).
      (Term::Var(v), Term::Num(c)) => {
        let args = vec![Rc::new(Term::Var(*v)), Rc::new(Term::Num(*c))];
        let (cons, _) = store.intern(union_find, reason, self.symbols.lb, args, lit);
        let prop = propagators.register(cons, 2, EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE));
        prop_slot.insert(prop, SolverSlot::Bounds);
        Self::note_wake(var_to_props, lit, prop);
      }
      // `c > a`, i.e. `a < c`: the negation of `LB(a, c)`, so reify under `!lit`.
      (Term::Num(c), Term::Var(v)) => {
        let args = vec![Rc::new(Term::Var(*v)), Rc::new(Term::Num(*c))];
        let (cons, _) = store.intern(union_find, reason, self.symbols.lb, args, !lit);
        let prop = propagators.register(cons, 2, EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE));
        prop_slot.insert(prop, SolverSlot::Bounds);
        Self::note_wake(var_to_props, lit, prop);
      }
      (Term::Var(a), Term::Var(_)) => {
        // `a > b`: no general two-variable comparison theory here, so this reaches the linear
        // theory via its `gt` symbol directly over a row the caller must have flattened into a
        // difference variable upstream; absent that, fall back to treating the pair as opaque
        // (no propagation, decided purely by the SAT search).
        let args = vec![lhs.clone(), rhs.clone()];
        let (cons, _) = store.intern(union_find, reason, self.symbols.gt, args, lit);
        let _ = a;
        propagators.register(cons, 4, EventMask::none());
      }
      _ => return Err(Error::type_error("comparison between two constants reached the backend unevaluated")),
    }
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn wire_predicate(
    &self,
    symbol: AtomId,
    lit: Literal,
    args: &[Rc<Term>],
    union_find: &UnionFind,
    store: &mut Store,
    propagators: &mut PropagatorQueue,
    prop_slot: &mut HashMap<PropId, SolverSlot>,
    var_to_props: &mut HashMap<BoolVariable, Vec<PropId>>,
    chr_cons_prop: &mut HashMap<ConsId, PropId>,
    reason: &mut Vec<Literal>,
  ) -> Result<(), Error> {
    let (cons, _) = store.intern(union_find, reason, symbol, args.to_vec(), lit);

    if symbol == self.symbols.dom {
      let prop = propagators.register(cons, 1, EventMask::DECISION_TRUE);
      prop_slot.insert(prop, SolverSlot::Domain);
      Self::note_wake(var_to_props, lit, prop);
    } else if symbol == self.symbols.sep || symbol == self.symbols.eq_h || symbol == self.symbols.sub || symbol == self.symbols.inn {
      let prop = propagators.register(cons, 3, EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE));
      prop_slot.insert(prop, SolverSlot::Heaps);
      Self::note_wake(var_to_props, lit, prop);
    } else if self.chr.has_occurrences(symbol) {
      let prop = propagators.register(cons, 6, EventMask::DECISION_TRUE);
      prop_slot.insert(prop, SolverSlot::Chr(symbol));
      Self::note_wake(var_to_props, lit, prop);
      chr_cons_prop.insert(cons, prop);
    } else {
      // A user-declared predicate with no occurrences (yet): no theory propagator, just a store
      // entry a later-loaded CHR file's `Lookup`/`Next` opcodes can still find.
      propagators.register(cons, 7, EventMask::none());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::Num;

  #[test]
  fn builtin_symbols_are_distinct() {
    let mut atoms = AtomTable::new();
    let symbols = BuiltinSymbols::register(&mut atoms);
    let all = [symbols.eq, symbols.gt, symbols.lb, symbols.eq_c, symbols.dom, symbols.sep, symbols.eq_h, symbols.sub, symbols.inn];
    for i in 0..all.len() {
      for j in (i + 1)..all.len() {
        assert_ne!(all[i], all[j]);
      }
    }
  }

  #[test]
  fn compiling_a_simple_inequality_produces_a_bounds_definition() {
    let mut atoms = AtomTable::new();
    let config = Config::default();
    let chr = ChrProgram::default();
    let mut backend = Backend::new(&mut atoms, &config, &chr);

    let x = Rc::new(Term::Var(0));
    let five = Rc::new(Term::Num(Num::from_integer(5)));
    let goal = Rc::new(Term::Op(Op::Gt, vec![x, five]));

    let compiled = backend.compile(&goal, 1).expect("compiles");
    assert!(!compiled.clauses.is_empty());
    assert_eq!(compiled.prop_slot.len(), 1);
  }
}
