/*!

Compiles a parsed `chr::ast::Rule` into one occurrence bytecode program per head atom, per
SPEC_FULL §4.7 and `original_source/solver_chr.c`'s `chr_compile_occurrence`.

Each occurrence treats exactly one head as "active" (the constraint whose wake the solver drives
it from, register 0 at execution time) and the rule's other heads as partners, matched by
`Instr::Lookup` against the store's declared lookups. A rule with `n` heads therefore compiles to
`n` occurrences, one per active position, mirroring how the original registers a rule once per
constraint symbol it mentions in a head.

Only positive (non-negated) heads are supported: the parser never produces a negated head, so
`HeadAtom::sign == false` reaching this module is an internal error, not a user mistake to report
gracefully.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::chr::ast::{Body, BodyAtom, HeadAtom, Rule};
use crate::chr::opcode::{num_literal, Binop, Cmp, Instr, Reg, ValueSource};
use crate::store::Lookup;
use crate::term::{AtomTable, Op, Term};
use crate::{AtomId, Error};

#[derive(Clone)]
pub struct Occurrence {
  pub program: Vec<Instr>,
  pub file: Rc<str>,
  pub line: usize,
}

/// One compiled `.chr` source file (or accumulation of several `load`ed files): every occurrence
/// grouped by the symbol that wakes it, plus the lookups each partner pattern needs the store to
/// have declared.
#[derive(Default, Clone)]
pub struct ChrProgram {
  occurrences: HashMap<AtomId, Vec<Occurrence>>,
  symbol_lookups: HashMap<AtomId, Vec<Lookup>>,
}

impl ChrProgram {
  pub fn has_occurrences(&self, symbol: AtomId) -> bool {
    self.occurrences.get(&symbol).is_some_and(|v| !v.is_empty())
  }

  pub fn occurrences_for(&self, symbol: AtomId) -> &[Occurrence] {
    self.occurrences.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Every symbol with at least one occurrence, paired with the lookups `Backend::compile` must
  /// declare on the store before search begins.
  pub fn declared_symbols(&self) -> impl Iterator<Item = (AtomId, &[Lookup])> {
    self.symbol_lookups.iter().map(|(&sym, lookups)| (sym, lookups.as_slice()))
  }

}

struct RuleCompiler<'a> {
  atoms: &'a mut AtomTable,
  eq_symbol: AtomId,
  var_reg: Vec<Option<Reg>>,
  next_reg: Reg,
  /// Shared across every occurrence compiled from the same `ChrProgram`, so a `lookup_index`
  /// baked into one occurrence's bytecode still means the same argument-position subset once
  /// `ChrProgram::declared_symbols` hands the combined table to `Store::declare_symbol`.
  symbol_lookups: &'a mut HashMap<AtomId, Vec<Lookup>>,
}

impl<'a> RuleCompiler<'a> {
  fn fresh_reg(&mut self) -> Reg {
    let r = self.next_reg;
    self.next_reg += 1;
    r
  }

  fn register_lookup(&mut self, symbol: AtomId, positions: Lookup) -> usize {
    let entry = self.symbol_lookups.entry(symbol).or_default();
    if let Some(index) = entry.iter().position(|l| l == &positions) {
      return index;
    }
    entry.push(positions);
    entry.len() - 1
  }

  /// Emits the matching instructions for one head's arguments against `src` (the register holding
  /// its constraint), returning appended instructions. Already-bound variables compile to
  /// `Equal`; a variable's first occurrence just binds a fresh register.
  fn compile_head_args(&mut self, head: &HeadAtom, src: Reg, out: &mut Vec<Instr>) -> Result<(), Error> {
    for (position, arg) in head.args.iter().enumerate() {
      let dst = self.fresh_reg();
      out.push(Instr::Get { dst, src, position });
      match arg.as_ref() {
        Term::Var(n) => match self.var_reg[*n] {
          None => self.var_reg[*n] = Some(dst),
          Some(existing) => out.push(Instr::Equal { a: existing, b: ValueSource::Reg(dst) }),
        },
        Term::Op(..) => {
          return Err(Error::type_error("CHR head patterns may not contain nested function applications"));
        }
        ground => out.push(Instr::Equal { a: dst, b: ValueSource::Const(Rc::new(ground.clone())) }),
      }
    }
    if let Some(id_var) = head.id {
      let id_reg = self.fresh_reg();
      out.push(Instr::GetId { dst: id_reg, src });
      self.var_reg[id_var] = Some(id_reg);
    }
    Ok(())
  }

  /// Which of `head`'s argument positions are already bound (by an earlier-matched head in the
  /// same occurrence), in ascending order -- the lookup key this partner should probe.
  fn bound_positions(&self, head: &HeadAtom) -> (Vec<usize>, Vec<Reg>) {
    let mut positions = Vec::new();
    let mut regs = Vec::new();
    for (position, arg) in head.args.iter().enumerate() {
      if let Term::Var(n) = arg.as_ref() {
        if let Some(reg) = self.var_reg[*n] {
          positions.push(position);
          regs.push(reg);
        }
      }
    }
    (positions, regs)
  }

  fn resolve_symbol(&mut self, name: &str, arity: usize) -> AtomId {
    self.atoms.intern(name, arity as u32)
  }

  fn compile_partner(&mut self, active_symbol: AtomId, active_reg: Reg, head: &HeadAtom, out: &mut Vec<Instr>) -> Result<Reg, Error> {
    let symbol = self.resolve_symbol(&head.symbol, head.args.len());
    let (positions, bound_args) = self.bound_positions(head);
    let lookup_index = self.register_lookup(symbol, positions);
    let dst = self.fresh_reg();
    let exclude = if symbol == active_symbol { Some(active_reg) } else { None };
    let lookup_pc = out.len();
    out.push(Instr::Lookup { dst, symbol, lookup_index, bound_args, exclude });
    self.compile_head_args(head, dst, out)?;
    out.push(Instr::Next { lookup_pc });
    Ok(dst)
  }

  fn arith_to_instrs(&mut self, term: &Rc<Term>, out: &mut Vec<Instr>) -> Result<(), Error> {
    match term.as_ref() {
      Term::Num(n) => out.push(Instr::EvalPush { src: num_literal(*n) }),
      Term::Var(v) => {
        let reg = self.var_reg[*v].ok_or_else(|| Error::range("guard references a variable not yet bound by any head"))?;
        out.push(Instr::EvalPush { src: ValueSource::Reg(reg) });
      }
      Term::Op(op, args) if args.len() == 2 => {
        let binop = match op {
          Op::Add => Binop::Add,
          Op::Sub => Binop::Sub,
          Op::Mul => Binop::Mul,
          Op::Div => Binop::Div,
          _ => return Err(Error::type_error("unsupported operator in a CHR guard's arithmetic")),
        };
        self.arith_to_instrs(&args[0], out)?;
        self.arith_to_instrs(&args[1], out)?;
        out.push(Instr::EvalBinop { binop });
      }
      _ => return Err(Error::type_error("malformed guard expression")),
    }
    Ok(())
  }

  fn compile_guard(&mut self, term: &Rc<Term>, out: &mut Vec<Instr>) -> Result<(), Error> {
    let Term::Op(op, args) = term.as_ref() else {
      return Err(Error::type_error("a CHR guard must be a comparison"));
    };
    if args.len() != 2 {
      return Err(Error::type_error("a CHR guard comparison must be binary"));
    }
    let cmp = match op {
      Op::Eq => Cmp::Eq,
      Op::Neq => Cmp::Neq,
      Op::Lt => Cmp::Lt,
      Op::Leq => Cmp::Leq,
      Op::Gt => Cmp::Gt,
      Op::Geq => Cmp::Geq,
      _ => return Err(Error::type_error("unsupported CHR guard comparison operator")),
    };
    self.arith_to_instrs(&args[0], out)?;
    self.arith_to_instrs(&args[1], out)?;
    out.push(Instr::EvalCmp { cmp });
    Ok(())
  }

  fn body_atom_args(&mut self, atom: &BodyAtom) -> Result<Vec<ValueSource>, Error> {
    atom.args.iter().map(|arg| self.value_source(arg)).collect()
  }

  fn value_source(&mut self, term: &Rc<Term>) -> Result<ValueSource, Error> {
    match term.as_ref() {
      Term::Var(n) => {
        let reg = self.var_reg[*n].ok_or_else(|| Error::range("a rule body references a variable no head binds"))?;
        Ok(ValueSource::Reg(reg))
      }
      Term::Op(..) => Err(Error::type_error("CHR body arguments may not be nested function applications")),
      ground => Ok(ValueSource::Const(Rc::new(ground.clone()))),
    }
  }

  fn compile_conjunction_atom(&mut self, atom: &BodyAtom, out: &mut Vec<Instr>) -> Result<(), Error> {
    if !atom.sign {
      return Err(Error::type_error("negated body atoms are not supported"));
    }
    if atom.symbol.as_ref() == "=" && atom.args.len() == 2 {
      let a = self.value_source(&atom.args[0])?;
      let b = self.value_source(&atom.args[1])?;
      out.push(Instr::PropEq { a, b });
    } else if atom.symbol.as_ref() == "fail" {
      out.push(Instr::Fail);
    } else {
      let symbol = self.resolve_symbol(&atom.symbol, atom.args.len());
      let args = self.body_atom_args(atom)?;
      out.push(Instr::Prop { symbol, args });
    }
    Ok(())
  }

  fn compile_disjunction_atom(&mut self, branch: usize, atom: &BodyAtom, out: &mut Vec<Instr>) -> Result<(), Error> {
    if !atom.sign {
      return Err(Error::type_error("negated body atoms are not supported"));
    }
    if atom.symbol.as_ref() == "=" && atom.args.len() == 2 {
      let a = self.value_source(&atom.args[0])?;
      let b = self.value_source(&atom.args[1])?;
      out.push(Instr::DisjEq { branch, a, b });
    } else {
      let symbol = self.resolve_symbol(&atom.symbol, atom.args.len());
      let args = self.body_atom_args(atom)?;
      out.push(Instr::Disjunct { branch, symbol, args });
    }
    Ok(())
  }

  fn compile_body(&mut self, body: &Body, out: &mut Vec<Instr>) -> Result<(), Error> {
    match body {
      Body::Conjunction(atoms) => {
        for atom in atoms {
          self.compile_conjunction_atom(atom, out)?;
        }
      }
      Body::Disjunction(branches) => {
        for (branch, atoms) in branches.iter().enumerate() {
          if atoms.is_empty() {
            out.push(Instr::TouchBranch { branch });
          }
          for atom in atoms {
            self.compile_disjunction_atom(branch, atom, out)?;
          }
        }
        out.push(Instr::PropDisj);
      }
    }
    Ok(())
  }

  fn compile_occurrence(&mut self, rule: &Rule, active_index: usize) -> Result<Vec<Instr>, Error> {
    debug_assert_eq!(self.resolve_symbol("=", 2), self.eq_symbol, "`=`/2 must already be interned as the shared equality symbol");
    self.var_reg = vec![None; rule.num_vars];
    self.next_reg = 1; // register 0 is the active constraint, pre-bound by the VM.

    let mut program = Vec::new();
    let active = &rule.heads[active_index];
    let active_symbol = self.resolve_symbol(&active.symbol, active.args.len());
    self.compile_head_args(active, 0, &mut program)?;

    let mut head_regs = vec![0 as Reg; rule.heads.len()];
    for (index, head) in rule.heads.iter().enumerate() {
      if index == active_index {
        continue;
      }
      head_regs[index] = self.compile_partner(active_symbol, 0, head, &mut program)?;
    }

    for guard in &rule.guard {
      self.compile_guard(guard, &mut program)?;
    }

    for (index, head) in rule.heads.iter().enumerate() {
      if head.kill {
        program.push(Instr::Delete { reg: head_regs[index] });
      }
    }

    self.compile_body(&rule.body, &mut program)?;

    if !rule.heads.iter().any(|h| h.kill) {
      // Pure propagation: nothing was deleted, so after firing once the VM should keep searching
      // for further partner combinations rather than stopping at the first match.
      program.push(Instr::Retry);
    }

    Ok(program)
  }
}

/// Compiles every rule in `source` into occurrence programs, resolving predicate names against
/// `atoms` (the same table the rest of the pipeline interns `Op::Func` symbols into). `program`
/// accumulates across every `.chr` file `solver::load` compiles, so a later file's rules can add
/// occurrences for a symbol an earlier file already declared lookups for.
pub fn compile_into(source: &crate::chr::ast::ChrSource, atoms: &mut AtomTable, eq_symbol: AtomId, program: &mut ChrProgram) -> Result<(), Error> {
  for decl in &source.decls {
    if let crate::chr::ast::Decl::Rule(rule) = decl {
      compile_rule(rule, atoms, eq_symbol, program)?;
    }
  }
  Ok(())
}

pub fn compile(source: &crate::chr::ast::ChrSource, atoms: &mut AtomTable, eq_symbol: AtomId) -> Result<ChrProgram, Error> {
  let mut program = ChrProgram::default();
  compile_into(source, atoms, eq_symbol, &mut program)?;
  Ok(program)
}

fn compile_rule(rule: &Rule, atoms: &mut AtomTable, eq_symbol: AtomId, program: &mut ChrProgram) -> Result<(), Error> {
  for head in &rule.heads {
    if !head.sign {
      return Err(Error::type_error("negated CHR heads are not supported"));
    }
  }

  let mut new_occurrences: Vec<(AtomId, Occurrence)> = Vec::new();
  for active_index in 0..rule.heads.len() {
    let mut compiler =
      RuleCompiler { atoms, eq_symbol, var_reg: Vec::new(), next_reg: 1, symbol_lookups: &mut program.symbol_lookups };
    let instrs = compiler.compile_occurrence(rule, active_index)?;
    let symbol = compiler.resolve_symbol(&rule.heads[active_index].symbol, rule.heads[active_index].args.len());
    new_occurrences.push((symbol, Occurrence { program: instrs, file: rule.file.clone(), line: rule.line }));
  }
  for (symbol, occ) in new_occurrences {
    program.occurrences.entry(symbol).or_default().push(occ);
  }
  Ok(())
}
