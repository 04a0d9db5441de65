/*!

Validates a parsed `chr::ast::ChrSource` before it reaches `compiler.rs`, SPEC_FULL §6's typesig
declarations and `original_source/typecheck.c`'s checks over the same `type`/`type priority`
declarations: no conflicting re-declaration of a symbol's argument types, no priority declaration
for an undeclared typesig, arity agreement between a typesig and its uses, and range-restriction
for propagation rules (every body/guard variable must also appear in a head -- a pure-propagation
rule never deletes its heads, so an unbound body variable could never be given a value).

`TypeEnv` is meant to be kept by `Solver` across `load` calls: a `.chr` file's rules may reference
typesigs declared by an earlier file, the same way `chr::compiler::ChrProgram` accumulates
occurrences across files.

*/

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::chr::ast::{Body, BodyAtom, ChrSource, Decl, Priority, Rule};
use crate::config::Config;
use crate::term::Term;
use crate::Error;

/// A rule this restrictive would need more head constraints than any real `.chr` file in the
/// corpus uses; past this it's far more likely a missing `\` or `,` than an intentional rule.
const MAX_RULE_HEADS: usize = 16;

#[derive(Default)]
pub struct TypeEnv {
  types: HashMap<(Rc<str>, usize), Vec<crate::chr::ast::TypeInst>>,
  priorities: HashMap<(Rc<str>, usize), Priority>,
}

impl TypeEnv {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `source`'s declarations into this environment and validates every rule it
  /// contains against the environment as it stands *after* that registration, so a single file's
  /// own `type` declarations are already in scope for its own rules.
  pub fn check_source(&mut self, source: &ChrSource, config: &Config) -> Result<(), Error> {
    for decl in &source.decls {
      match decl {
        Decl::Type(type_decl) => self.register_type(&type_decl.symbol, &type_decl.arg_types)?,
        Decl::TypePriority(priority_decl) => {
          self.register_priority(&priority_decl.symbol, priority_decl.arity, priority_decl.priority)?
        }
        _ => {}
      }
    }
    for decl in &source.decls {
      if let Decl::Rule(rule) = decl {
        self.check_rule(rule, config)?;
      }
    }
    Ok(())
  }

  fn register_type(&mut self, symbol: &Rc<str>, arg_types: &[crate::chr::ast::TypeInst]) -> Result<(), Error> {
    let key = (symbol.clone(), arg_types.len());
    match self.types.get(&key) {
      Some(existing) if existing != arg_types => {
        Err(Error::config(format!("conflicting `type` declarations for `{}`/{}", symbol, key.1)))
      }
      Some(_) => Ok(()),
      None => {
        self.types.insert(key, arg_types.to_vec());
        Ok(())
      }
    }
  }

  fn register_priority(&mut self, symbol: &Rc<str>, arity: usize, priority: Priority) -> Result<(), Error> {
    let key = (symbol.clone(), arity);
    if !self.types.contains_key(&key) {
      return Err(Error::type_error(format!(
        "`type priority` declaration for `{}`/{} has no matching `type` declaration",
        symbol, arity
      )));
    }
    match self.priorities.get(&key) {
      Some(&existing) if existing != priority => {
        Err(Error::config(format!("conflicting `type priority` declarations for `{}`/{}", symbol, arity)))
      }
      _ => {
        self.priorities.insert(key, priority);
        Ok(())
      }
    }
  }

  /// If exactly one typesig is on file for `symbol` (under some arity) and it doesn't match
  /// `arity`, this use is almost certainly a mistake. Symbols overloaded across several arities
  /// (no typesig at all, or more than one declared arity) are left unchecked.
  fn check_arity(&self, symbol: &Rc<str>, arity: usize) -> Result<(), Error> {
    if self.types.contains_key(&(symbol.clone(), arity)) {
      return Ok(());
    }
    let other_arities: Vec<usize> =
      self.types.keys().filter(|(name, _)| name == symbol).map(|(_, arity)| *arity).collect();
    if other_arities.len() == 1 {
      return Err(Error::type_error(format!(
        "`{}` is used with {} argument(s), but its declared typesig takes {}",
        symbol, arity, other_arities[0]
      )));
    }
    Ok(())
  }

  fn check_rule(&self, rule: &Rule, config: &Config) -> Result<(), Error> {
    if rule.heads.len() > MAX_RULE_HEADS {
      return Err(Error::range(format!(
        "rule has {} head constraints, more than the supported maximum of {}",
        rule.heads.len(),
        MAX_RULE_HEADS
      )));
    }
    // Register 0 is reserved for the active constraint; every other rule-local variable needs
    // its own.
    let registers_needed = rule.num_vars + 1;
    if registers_needed > config.chr_max_registers as usize {
      return Err(Error::range(format!(
        "rule needs {} registers, more than chr_max_registers ({})",
        registers_needed, config.chr_max_registers
      )));
    }

    for head in &rule.heads {
      self.check_arity(&head.symbol, head.args.len())?;
    }
    for atom in body_atoms(&rule.body) {
      if atom.symbol.as_ref() != "=" && atom.symbol.as_ref() != "fail" {
        self.check_arity(&atom.symbol, atom.args.len())?;
      }
    }

    let is_propagation = !rule.heads.is_empty() && rule.heads.iter().all(|h| !h.kill);
    if is_propagation {
      let mut head_vars = HashSet::new();
      for head in &rule.heads {
        for arg in &head.args {
          collect_vars(arg, &mut head_vars);
        }
        if let Some(id) = head.id {
          head_vars.insert(id);
        }
      }
      for guard in &rule.guard {
        let mut used = HashSet::new();
        collect_vars(guard, &mut used);
        if let Some(var) = used.difference(&head_vars).next() {
          return Err(Error::range(format!(
            "propagation rule's guard references variable #{}, which no head binds",
            var
          )));
        }
      }
      for atom in body_atoms(&rule.body) {
        let mut used = HashSet::new();
        for arg in &atom.args {
          collect_vars(arg, &mut used);
        }
        if let Some(var) = used.difference(&head_vars).next() {
          return Err(Error::range(format!(
            "propagation rule's body references variable #{}, which no head binds",
            var
          )));
        }
      }
    }

    Ok(())
  }
}

fn body_atoms(body: &Body) -> Vec<&BodyAtom> {
  match body {
    Body::Conjunction(atoms) => atoms.iter().collect(),
    Body::Disjunction(branches) => branches.iter().flatten().collect(),
  }
}

fn collect_vars(term: &Rc<Term>, out: &mut HashSet<usize>) {
  match term.as_ref() {
    Term::Var(n) => {
      out.insert(*n);
    }
    Term::Op(_, args) => {
      for arg in args {
        collect_vars(arg, out);
      }
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chr::parser;
  use crate::term::AtomTable;

  fn check(src: &str) -> Result<(), Error> {
    let mut atoms = AtomTable::new();
    let source = parser::parse("test", src, &mut atoms).unwrap();
    TypeEnv::new().check_source(&source, &Config::default())
  }

  #[test]
  fn accepts_a_well_formed_rule() {
    assert!(check("leq(X, X) <=> true.").is_ok());
  }

  #[test]
  fn accepts_matching_type_and_priority_decls() {
    assert!(check("type leq(num, num). type priority leq(num, num) high.").is_ok());
  }

  #[test]
  fn rejects_priority_decl_without_matching_type() {
    assert!(check("type priority leq(num, num) high.").is_err());
  }

  #[test]
  fn rejects_conflicting_type_decls() {
    assert!(check("type leq(num, num). type leq(atom, atom).").is_err());
  }

  #[test]
  fn rejects_arity_mismatch_against_a_sole_typesig() {
    assert!(check("type leq(num, num). leq(X, X, X) <=> true.").is_err());
  }

  #[test]
  fn rejects_unbound_variable_in_a_propagation_rule_body() {
    assert!(check("p(X) ==> q(Y).").is_err());
  }

  #[test]
  fn accepts_a_propagation_rule_whose_body_vars_are_all_head_bound() {
    assert!(check("p(X), q(Y) ==> r(X, Y).").is_ok());
  }
}
