/*!

The top-level facade, SPEC_FULL §6's `load`/`execute` entry points. A `Solver` owns everything that
must persist across a session's queries -- the atom table, accumulated rewrite rules, the compiled
CHR program and its typesigs -- while each `execute` call builds a fresh `backend::CompiledProblem`
and `sat::Engine` from the goal at hand, exactly as `original_source/main.c`'s REPL loop re-solves
from scratch on every query against a persistent global state.

*/

use std::fs::read_to_string;
use std::rc::Rc;

use crate::backend::{Backend, BuiltinSymbols};
use crate::chr;
use crate::chr::compiler::ChrProgram;
use crate::chr::typecheck::TypeEnv;
use crate::config::Config;
use crate::log;
use crate::rewrite::RewriteTable;
use crate::sat;
use crate::status::Status;
use crate::term::{AtomTable, Term};
use crate::{AtomId, Error, VarId};

/// The built-in theory names `load` accepts besides a `.chr` file. `backend::Backend::compile`
/// wires every one of these unconditionally, so naming one here only validates the name -- there
/// is no enable/disable switch to flip, unlike the CHR program, which genuinely accumulates.
const BUILTIN_THEORIES: &[&str] = &["equality", "bounds", "domain", "linear", "heaps"];

pub struct Solver {
  atoms: AtomTable,
  rewrites: RewriteTable,
  chr_program: ChrProgram,
  chr_types: TypeEnv,
  config: Config,
  next_var: VarId,
}

impl Solver {
  pub fn new(config: Config) -> Self {
    Self {
      atoms: AtomTable::new(),
      rewrites: RewriteTable::new(),
      chr_program: ChrProgram::default(),
      chr_types: TypeEnv::new(),
      config,
      next_var: 0,
    }
  }

  /// Mints a fresh term-level variable for a caller building a goal to pass to `execute`.
  pub fn fresh_var(&mut self) -> VarId {
    let var = self.next_var;
    self.next_var += 1;
    var
  }

  /// Interns a predicate/function symbol in this solver's atom table, so a caller building a goal
  /// by hand names the same symbol a loaded `.chr` file's rules resolve to.
  pub fn intern_atom(&mut self, name: &str, arity: u32) -> AtomId {
    self.atoms.intern(name, arity)
  }

  /// Loads a solver by name: a path ending in `.chr` is read from disk and compiled into this
  /// session's CHR program; anything else must name one of the always-on built-in theories.
  pub fn load(&mut self, name: &str) -> Result<(), Error> {
    if name.ends_with(".chr") {
      let source =
        read_to_string(name).map_err(|e| Error::config(format!("could not read CHR file `{}`: {}", name, e)))?;
      return self.load_chr_source(name, &source);
    }

    if BUILTIN_THEORIES.contains(&name) {
      return Ok(());
    }

    Err(Error::config(format!("unknown solver `{}` (expected a `.chr` file or one of {:?})", name, BUILTIN_THEORIES)))
  }

  /// The file-IO-free core of loading a `.chr` file, split out the way `parameters::Parameters`
  /// splits `load` (path + IO) from `parse` (text), so tests (and an embedding caller with CHR
  /// source already in memory) don't need a real file on disk.
  pub fn load_chr_source(&mut self, file: &str, source: &str) -> Result<(), Error> {
    let eq_symbol = BuiltinSymbols::register(&mut self.atoms).eq;
    let rewrites = chr::load_source(
      file,
      source,
      &mut self.atoms,
      eq_symbol,
      &mut self.chr_types,
      &self.config,
      &mut self.chr_program,
    )?;
    for (pattern, replacement) in rewrites {
      self.rewrites.register(pattern, replacement)?;
    }
    Ok(())
  }

  /// Rewrites, compiles, and solves `goal`, returning its satisfiability and any residual atomic
  /// constraints. `filename`/`lineno` locate the query for the fatal-error log line
  /// `Error::ProtocolError`/`Error::InternalError` trigger (see `errors.rs`'s module docs): those
  /// two kinds indicate a correctness bug, not a user mistake, so `execute` logs and panics rather
  /// than return them to the caller.
  pub fn execute(&mut self, filename: &str, lineno: usize, goal: Rc<Term>) -> Result<Status, Error> {
    match self.execute_inner(goal) {
      Ok(status) => Ok(status),
      Err(err) if err.is_fatal() => {
        log::log_at_level(0, &format!("{}:{}: {}", filename, lineno, err));
        panic!("{}:{}: fatal solver error: {}", filename, lineno, err);
      }
      Err(err) => Err(err),
    }
  }

  fn execute_inner(&mut self, goal: Rc<Term>) -> Result<Status, Error> {
    let rewritten = self.rewrites.rewrite(&goal);
    let mut backend = Backend::new(&mut self.atoms, &self.config, &self.chr_program);
    let compiled = backend.compile(&rewritten, self.next_var)?;
    let mut engine = sat::Engine::new(compiled, self.config.clone())?;
    match engine.run()? {
      Status::Unsat => Ok(Status::unsat()),
      Status::Sat { .. } => Ok(Status::sat_with_residue(engine.undecided_atoms())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::{Num, Op};

  #[test]
  fn loading_an_unknown_builtin_name_is_a_config_error() {
    let mut solver = Solver::new(Config::default());
    assert!(solver.load("not_a_real_theory").is_err());
  }

  #[test]
  fn loading_a_known_builtin_name_is_a_no_op() {
    let mut solver = Solver::new(Config::default());
    assert!(solver.load("bounds").is_ok());
  }

  #[test]
  fn bare_true_is_satisfiable_with_no_residue() {
    let mut solver = Solver::new(Config::default());
    let status = solver.execute("test", 1, Rc::new(Term::Bool(true))).unwrap();
    assert!(status.is_sat());
    assert!(status.residue().is_empty());
  }

  #[test]
  fn bare_false_is_unsatisfiable() {
    let mut solver = Solver::new(Config::default());
    let status = solver.execute("test", 1, Rc::new(Term::Bool(false))).unwrap();
    assert!(status.is_unsat());
  }

  #[test]
  fn a_satisfiable_inequality_solves() {
    let mut solver = Solver::new(Config::default());
    let x = solver.fresh_var();
    let goal = Rc::new(Term::Op(Op::Gt, vec![Rc::new(Term::Var(x)), Rc::new(Term::Num(Num::from_integer(5)))]));
    let status = solver.execute("test", 1, goal).unwrap();
    assert!(status.is_sat());
  }

  #[test]
  fn a_contradictory_bound_is_unsatisfiable() {
    let mut solver = Solver::new(Config::default());
    let x = solver.fresh_var();
    let five = Rc::new(Term::Num(Num::from_integer(5)));
    let xv = Rc::new(Term::Var(x));
    // x > 5 /\ x = 5 is unsatisfiable: equality pins x to 5, contradicting the strict bound.
    let goal = Rc::new(Term::Op(
      Op::And,
      vec![
        Rc::new(Term::Op(Op::Gt, vec![xv.clone(), five.clone()])),
        Rc::new(Term::Op(Op::Eq, vec![xv, five])),
      ],
    ));
    let status = solver.execute("test", 1, goal).unwrap();
    assert!(status.is_unsat());
  }

  /// End-to-end CHR: an antisymmetry rule over a user-declared `leq/2` constraint should unify its
  /// two arguments via the union-find once both `leq(X, Y)` and `leq(Y, X)` are posted, leaving
  /// the goal satisfiable.
  #[test]
  fn chr_antisymmetry_rule_fires_end_to_end() {
    let mut solver = Solver::new(Config::default());
    solver
      .load_chr_source("antisymmetry.chr", "type leq(num, num).\nleq(X, Y), leq(Y, X) <=> X = Y.\n")
      .unwrap();

    let leq = solver.intern_atom("leq", 2);
    let x = solver.fresh_var();
    let y = solver.fresh_var();
    let leq_xy = Rc::new(Term::Op(Op::Func(leq), vec![Rc::new(Term::Var(x)), Rc::new(Term::Var(y))]));
    let leq_yx = Rc::new(Term::Op(Op::Func(leq), vec![Rc::new(Term::Var(y)), Rc::new(Term::Var(x))]));
    let goal = Rc::new(Term::Op(Op::And, vec![leq_xy, leq_yx]));

    let status = solver.execute("antisymmetry.chr", 2, goal).unwrap();
    assert!(status.is_sat());
  }

  #[test]
  fn chr_rule_referencing_undeclared_variable_is_rejected_at_load() {
    let mut solver = Solver::new(Config::default());
    // `Y` appears only in the body of a propagation rule, never in a head: not range-restricted.
    let result = solver.load_chr_source("bad.chr", "p(X) ==> q(Y).");
    assert!(result.is_err());
  }
}
