/*!

`Status` is the user-visible result of `Solver::execute`: a goal is either unsatisfiable,
satisfiable with a residual conjunction of atomic constraints left un-decided, or satisfiable
outright with an empty residue. Error is not a `Status` variant -- `execute` returns
`Result<Status, Error>`, keeping unsatisfiability a normal result, distinct from error.

*/

use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::term::Term;

#[derive(Clone, Debug)]
pub enum Status {
  /// The goal is unsatisfiable.
  Unsat,
  /// The goal is satisfiable. `residue` is the conjunction of atomic constraints the solver could
  /// not (or chose not to) decide further -- empty when the goal is fully resolved.
  Sat { residue: Vec<Rc<Term>> },
}

impl Status {
  pub fn sat_with_residue(residue: Vec<Rc<Term>>) -> Status {
    Status::Sat { residue }
  }

  pub fn sat() -> Status {
    Status::Sat { residue: Vec::new() }
  }

  pub fn unsat() -> Status {
    Status::Unsat
  }

  pub fn is_sat(&self) -> bool {
    matches!(self, Status::Sat { .. })
  }

  pub fn is_unsat(&self) -> bool {
    matches!(self, Status::Unsat)
  }

  pub fn residue(&self) -> &[Rc<Term>] {
    match self {
      Status::Sat { residue } => residue,
      Status::Unsat => &[],
    }
  }
}

impl Display for Status {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Status::Unsat => write!(f, "unsat"),
      Status::Sat { residue } if residue.is_empty() => write!(f, "sat"),
      Status::Sat { residue } => {
        write!(f, "sat ")?;
        for (i, atom) in residue.iter().enumerate() {
          if i > 0 {
            write!(f, " /\\ ")?;
          }
          write!(f, "{}", atom)?;
        }
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::Num;

  #[test]
  fn unsat_has_no_residue() {
    assert!(Status::unsat().residue().is_empty());
  }

  #[test]
  fn sat_with_residue_reports_it() {
    let atom = Rc::new(Term::Num(Num::from_integer(3)));
    let status = Status::sat_with_residue(vec![atom]);
    assert_eq!(status.residue().len(), 1);
    assert!(status.is_sat());
  }

  #[test]
  fn display_distinguishes_bare_sat_from_residue() {
    assert_eq!(format!("{}", Status::sat()), "sat");
    assert_eq!(format!("{}", Status::unsat()), "unsat");
  }
}
