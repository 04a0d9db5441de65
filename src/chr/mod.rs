/*!

The CHR (Constraint Handling Rules) front end and back end, SPEC_FULL §4.7/§6: a `.chr` source
file is lexed (`lexer`), parsed into an AST (`parser`/`ast`), checked against its `type`/`type
priority` declarations (`typecheck`), compiled into per-symbol occurrence bytecode (`compiler`/
`opcode`), and finally interpreted by `vm` as constraints are posted and activated during search.

`Solver::load` is the only caller that needs to see every stage; `sat::Engine` only needs `vm` and
the `compiler::ChrProgram` it runs against.

*/

pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod typecheck;
pub mod vm;

use std::rc::Rc;

use crate::term::AtomTable;
use crate::{AtomId, Error};

/// Lexes, parses, typechecks, and compiles one `.chr` source file, adding its occurrences to
/// `program` and its typesigs to `types`. `Solver::load` calls this once per loaded file; `program`
/// and `types` both accumulate across calls the way `compiler::ChrProgram` already documents.
pub fn load_source(
  file: &str,
  source: &str,
  atoms: &mut AtomTable,
  eq_symbol: AtomId,
  types: &mut typecheck::TypeEnv,
  config: &crate::config::Config,
  program: &mut compiler::ChrProgram,
) -> Result<Vec<(Rc<crate::term::Term>, Rc<crate::term::Term>)>, Error> {
  let parsed = parser::parse(file, source, atoms)?;
  types.check_source(&parsed, config)?;
  compiler::compile_into(&parsed, atoms, eq_symbol, program)?;
  Ok(rewrite_decls(&parsed))
}

/// Pulls out the `-->` rewrite rules a `.chr` file may also declare, as `(pattern, replacement)`
/// pairs ready for `rewrite::RewriteTable::register`. Returned separately rather than threading
/// `rewrite::RewriteTable` itself through this module, which otherwise has no reason to depend on
/// it.
fn rewrite_decls(source: &ast::ChrSource) -> Vec<(Rc<crate::term::Term>, Rc<crate::term::Term>)> {
  source
    .decls
    .iter()
    .filter_map(|decl| match decl {
      ast::Decl::Rewrite(rewrite) => Some((rewrite.pattern.clone(), rewrite.replacement.clone())),
      _ => None,
    })
    .collect()
}
