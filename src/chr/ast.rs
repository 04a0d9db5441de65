/*!

The parsed form of a `.chr` rule file, SPEC_FULL §6's "CHR source format" and
`original_source/solver_chr.c`'s `chr_compile_*` family -- before bytecode compilation, a CHR file is
just declarations over `crate::term::Term`. Constraint applications (`leq(X, Y)`) reuse
`Term::Op(Op::Func(atom), args)` exactly as uninterpreted predicates do elsewhere in this crate;
there is no separate "CHR term" type.

Variables here are rule-local: `Term::Var(n)` numbers the `n`-th distinct variable name encountered
while parsing a single rule or rewrite, not a global union-find identity. `compiler.rs` maps each one
to a register; only at VM execution time does a variable acquire a real `VarId` (via `GET_VAR`, or by
being bound to a matched constraint's argument).

*/

use std::rc::Rc;

use crate::term::Term;

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Priority {
  Low,
  Medium,
  High,
}

/// A constraint symbol's per-argument type-inst, SPEC_FULL §6. Only used for `TypeError` reporting
/// at `load` time (`typecheck.rs`); the bytecode compiler itself is untyped, matching
/// `original_source/solver_chr.c`'s own runtime (types gate what `.chr` files load, not how
/// occurrences execute).
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum TypeInst {
  Nil,
  Bool,
  Num,
  Atom,
  Str,
  Any,
  User(Rc<str>),
  /// `var of T`: the argument must be an unbound variable whose eventual binding has type `T`.
  VarOf(Box<TypeInst>),
}

#[derive(Clone, Debug)]
pub struct TypeDecl {
  pub symbol: Rc<str>,
  pub arg_types: Vec<TypeInst>,
}

#[derive(Clone, Debug)]
pub struct PriorityDecl {
  pub symbol: Rc<str>,
  pub arity: usize,
  pub priority: Priority,
}

#[derive(Clone, Debug)]
pub struct RewriteDecl {
  pub pattern: Rc<Term>,
  pub replacement: Rc<Term>,
}

/// One head-position constraint occurrence. `kill` distinguishes a simpagation rule's "kill" set
/// (deleted on firing) from its "remain" set (kept); a plain simplification or propagation rule's
/// heads are all `kill` or all not, respectively.
#[derive(Clone, Debug)]
pub struct HeadAtom {
  pub sign: bool,
  pub symbol: Rc<str>,
  pub args: Vec<Rc<Term>>,
  /// The variable bound to this occurrence's runtime identity by a trailing `# ID` annotation.
  pub id: Option<usize>,
  pub kill: bool,
}

#[derive(Clone, Debug)]
pub struct BodyAtom {
  pub sign: bool,
  pub symbol: Rc<str>,
  pub args: Vec<Rc<Term>>,
}

/// A rule body: a plain conjunction, or a disjunction of conjunctive branches (`;`-separated),
/// compiled to `DISJUNCT`/`PROP_DISJ` rather than `PROP`, per SPEC_FULL §4.7.
#[derive(Clone, Debug)]
pub enum Body {
  Conjunction(Vec<BodyAtom>),
  Disjunction(Vec<Vec<BodyAtom>>),
}

#[derive(Clone, Debug)]
pub struct Rule {
  pub heads: Vec<HeadAtom>,
  /// Guard tests, evaluated left to right; a rule with no guard has an empty vec.
  pub guard: Vec<Rc<Term>>,
  pub body: Body,
  /// How many rule-local variable slots `compiler.rs` needs to allocate registers for.
  pub num_vars: usize,
  pub file: Rc<str>,
  pub line: usize,
}

#[derive(Clone, Debug)]
pub enum Decl {
  Type(TypeDecl),
  TypePriority(PriorityDecl),
  Rule(Rule),
  Rewrite(RewriteDecl),
}

#[derive(Clone, Debug, Default)]
pub struct ChrSource {
  pub decls: Vec<Decl>,
}
