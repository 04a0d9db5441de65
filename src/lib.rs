/*!

A CDCL SAT/SMT core: a Boolean search engine coupled with theory propagators
over a shared constraint store and a Constraint Handling Rules interpreter.

The pipeline (term -> expression -> rewrite -> flatten -> NNF/CNF -> backend)
compiles a goal down to SAT clauses and theory constraints; the search loop
(SAT engine, propagator queue, constraint store, union-find, theory solvers,
CHR virtual machine) then decides satisfiability.

*/

#[macro_use]
mod log;

mod errors;
mod resource_limit;
mod config;
mod parameters;
mod data_structures;

mod lifted_bool;
mod literal;
mod approximate_set;
mod clause;
mod watched;
mod trail;

mod term;
mod expr;
mod rewrite;
mod flatten;
mod cnf;
mod backend;

mod union_find;
mod store;
mod propagator;

mod sat;
mod theory;
mod chr;

mod model;
mod status;
mod solver;

// Re-exported items
pub use approximate_set::{ApproximateSet, OredIntegerSet};
pub use data_structures::{Statistic, Statistics};
pub use errors::Error;
pub use lifted_bool::LiftedBool;
pub use literal::{Literal, LiteralVector};
pub use model::Model;
pub use resource_limit::{
  ResourceLimit,
  ScopedResourceLimit,
  ScopedSuspendedResourceLimit,
};
pub use solver::Solver;
pub use status::Status;
pub use term::{Term, AtomTable, Op as TermOp, Num};
pub use config::Config;

/// This library tracks the version of GJDuck's SMCHR that this spec was
/// distilled from; it is reported on some fatal errors in debug mode.
const SMCHR_FULL_VERSION: &str = "1.2.3";

/// A bool variable $x_j$ has corresponding literals $x_j$ and $\overline{x}_j$. We represent
/// $x_j$ by $j$ and $\overline{x}_j$ by $\overline{j}$.
pub type BoolVariable = usize;
pub const NULL_BOOL_VAR: BoolVariable = BoolVariable::MAX >> 1;

/// A logical (term-level) variable, distinct from a `BoolVariable`: the union-find node kind.
pub type VarId = usize;

/// The identifier of an interned atom (name + arity), compared by identity.
pub type AtomId = usize;

/// The identifier of a theory constraint (`cons` in the original SMCHR sources).
pub type ConsId = usize;

/// The identifier of a propagator (co-located with its owning constraint).
pub type PropId = usize;

/// The identifier of a clause in the clause database.
pub type ClauseId = usize;

pub type BoolVariableVector = Vec<BoolVariable>;
pub type ExtensionConstraintIndex = usize;
pub type ExternalJustificationIndex = usize;
pub type Theory = i32;
pub type UIntSet = bit_set::BitSet;

#[cfg(test)]
mod tests {
  #[test]
  fn it_works() {
    assert_eq!(2 + 2, 4);
  }
}
