/*!

Error kinds reported by the solver, distinct from unsatisfiability, which is
a normal result (see `crate::status::Status`).

`ParseError`, `TypeError`, `RangeError`, and `ConfigError` abort the current
query and are returned to the caller. `OverflowError` in the linear theory
aborts the current query. `ProtocolError` and `InternalError` are fatal:
`Solver::execute` logs them and panics, since they indicate a correctness
bug rather than a user-level mistake -- except the `LateClause` case of
`ProtocolError`, which is downgraded to a recoverable backjump when
`Config::recover_late_clause` is set (see `sat::Engine::add_clause_during_search`).

*/

use thiserror::Error as DeriveError;
use user_error::UFE;

use crate::ClauseId;

#[derive(Clone, Eq, PartialEq, Debug, Hash, DeriveError)]
pub enum Error {
  #[error("parse error at {file}:{line}: {message}")]
  ParseError { file: String, line: usize, message: String },

  #[error("type error: {message}")]
  TypeError { message: String },

  #[error("config error: {message}")]
  ConfigError { message: String },

  #[error("range error: {message}")]
  RangeError { message: String },

  #[error("overflow error: {message}")]
  OverflowError { message: String },

  #[error("protocol error: {message}")]
  ProtocolError { message: String, late_clause: Option<ClauseId> },

  #[error("internal error (invariant violation): {message}")]
  InternalError { message: String },
}

impl Error {
  pub fn parse<S: Into<String>>(file: &str, line: usize, message: S) -> Self {
    Error::ParseError { file: file.to_string(), line, message: message.into() }
  }

  pub fn type_error<S: Into<String>>(message: S) -> Self {
    Error::TypeError { message: message.into() }
  }

  pub fn config<S: Into<String>>(message: S) -> Self {
    Error::ConfigError { message: message.into() }
  }

  pub fn range<S: Into<String>>(message: S) -> Self {
    Error::RangeError { message: message.into() }
  }

  pub fn overflow<S: Into<String>>(message: S) -> Self {
    Error::OverflowError { message: message.into() }
  }

  pub fn protocol<S: Into<String>>(message: S) -> Self {
    Error::ProtocolError { message: message.into(), late_clause: None }
  }

  pub fn late_clause(clause: ClauseId) -> Self {
    Error::ProtocolError {
      message: format!("theory solver posted late clause {}", clause),
      late_clause: Some(clause),
    }
  }

  pub fn internal<S: Into<String>>(message: S) -> Self {
    Error::InternalError { message: message.into() }
  }

  /// `ProtocolError` and `InternalError` indicate a correctness bug and are fatal per §7;
  /// everything else aborts only the current query.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Error::ProtocolError { .. } | Error::InternalError { .. })
  }
}

// Spurious "trait bound `Error: Error` is not satisfied" error avoided by an empty impl body.
// The trait bound is derived using `thiserror::Error`.
impl UFE for Error { /* User Facing Error - nothing to implement. */ }
