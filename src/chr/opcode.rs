/*!

The occurrence bytecode, SPEC_FULL §4.7's opcode table and `original_source/solver_chr.c`'s
`opcode_e`/`cmp_e`/`binop_e`. `chr::compiler` emits one `Vec<Instr>` per head occurrence;
`chr::vm` interprets it against a register file and a matching-choicepoint stack -- see `vm.rs`'s
module doc for both.

The original's `GET`/`GET_VAL`/`GET_VAR` three-way split collapses here to a single `Get`: a
register holds whatever `Rc<Term>` a constraint argument currently derefs to (a bound value or a
still-free `Term::Var`), and `Equal`'s operand comparison handles the var-vs-var,
var-vs-constant, and constant-vs-constant cases uniformly, so the bytecode doesn't need to commit
up front to which case a given head position is.

*/

use crate::term::{Num, Term};
use crate::AtomId;
use std::rc::Rc;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Cmp {
  Eq,
  Neq,
  Lt,
  Leq,
  Gt,
  Geq,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Binop {
  Add,
  Sub,
  Mul,
  Div,
}

pub type Reg = u16;

/// The right-hand side of an `Equal` test, or one argument of a posted body atom: either an
/// already-matched register, or a literal baked in at compile time (a body atom's ground argument,
/// or a head pattern's literal position).
#[derive(Clone, Debug)]
pub enum ValueSource {
  Reg(Reg),
  Const(Rc<Term>),
}

#[derive(Clone, Debug)]
pub enum Instr {
  /// `dst := args[position]` of the constraint held in register `src`.
  Get { dst: Reg, src: Reg, position: usize },

  /// `dst :=` the runtime identity of the constraint held in register `src` (a head's `# ID`
  /// annotation).
  GetId { dst: Reg, src: Reg },

  /// Begins (or, on backtrack, resumes) iterating every live constraint registered under
  /// `symbol`'s `lookup_index`-th lookup matching the argument values bound in `bound_args`,
  /// binding the next candidate into `dst`. Skips the constraint in register `exclude` when
  /// present (a partner pattern sharing its head's own symbol must not match the active
  /// constraint against itself). Opens a choicepoint at this instruction.
  Lookup { dst: Reg, symbol: AtomId, lookup_index: usize, bound_args: Vec<Reg>, exclude: Option<Reg> },

  /// Marks where a guard/equality failure after the matching `Lookup` resumes on backtrack (by
  /// advancing that lookup's candidate iterator). A no-op when reached by falling through.
  Next { lookup_pc: usize },

  /// Fails (backtracks) unless register `a`'s bound value and `b` denote the same entity: two
  /// variables compare through the union-find, a variable against a ground value never matches,
  /// and two ground values compare structurally.
  Equal { a: Reg, b: ValueSource },

  /// Removes the constraint held in register `reg` from the store (a head marked `kill`), and
  /// kills its propagator so it can never wake again.
  Delete { reg: Reg },

  /// Posts a fresh predicate constraint, unconditionally true.
  Prop { symbol: AtomId, args: Vec<ValueSource> },
  /// Posts `a = b`, unconditionally true (a direct union-find bind, not a reified constraint).
  PropEq { a: ValueSource, b: ValueSource },

  /// Posts a predicate application reified under disjunction branch `branch`'s literal, minting
  /// that literal the first time any instruction references the branch.
  Disjunct { branch: usize, symbol: AtomId, args: Vec<ValueSource> },
  /// Posts `a = b` reified under disjunction branch `branch`'s literal.
  DisjEq { branch: usize, a: ValueSource, b: ValueSource },
  /// Ensures branch `branch`'s literal is minted even though the branch posts nothing (an empty
  /// disjunct arm).
  TouchBranch { branch: usize },
  /// Posts the big-OR clause over every touched branch's reifying literal and clears the pending
  /// disjunction, ready for the body's next disjunction (if any).
  PropDisj,

  /// Unconditional failure: forces a conflict (the `fail` body predicate).
  Fail,
  /// Explicit backtrack to the innermost open choicepoint, emitted at the end of a propagation
  /// rule's body so every partner combination is enumerated rather than just the first.
  Retry,

  /// Guard/body arithmetic, a tiny stack machine over `Num`:
  EvalPush { src: ValueSource },
  EvalPop { dst: Reg },
  /// Pops two values (`b` then `a`), fails (backtracks) unless `a cmp b` holds.
  EvalCmp { cmp: Cmp },
  /// Pops two values (`b` then `a`), pushes `a binop b`.
  EvalBinop { binop: Binop },

  /// Debug/trace output of a register's value, gated by `log::trace!`'s `"chr"` tag.
  Print { reg: Reg },

  /// Vestigial in the original (marked `// TODO: Remove this hack!` in `solver_chr.c`): bumps a
  /// per-occurrence fire counter exposed as a statistic. Kept for bytecode-table fidelity.
  Inc,
}

pub(super) fn num_literal(n: Num) -> ValueSource {
  ValueSource::Const(Rc::new(Term::Num(n)))
}
