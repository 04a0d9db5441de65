/*!

The occurrence bytecode interpreter, SPEC_FULL §4.7 and `original_source/solver_chr.c`'s
`chr_run`. A CHR wake runs every occurrence registered for the symbol that fired, each over its
own register file and matching-choicepoint stack; `sat::Engine::run_propagator` drives this from
its `SolverSlot::Chr` arm exactly as it drives the bundled theory solvers from `TheoryContext`.

Matching a rule's partner heads is itself a small backtracking search: a `Lookup` instruction
collects every live candidate the store's declared lookup returns (there is no live iterator held
across the run -- the candidates are materialized once into a plain `Vec`, since a borrowed
`Store` iterator can't coexist with the `&mut Store` later instructions need for `Delete`/`Prop`)
and a `Choicepoint` remembers how far into that list the VM has tried. A guard or `Equal` failure,
or an explicit `Retry` at the end of a propagation rule's body (so every partner combination fires,
not just the first), triggers the same backtrack routine: pop candidates off the innermost open
choicepoint until one succeeds or the stack empties, at which point the occurrence simply doesn't
fire this time.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::SolverSlot;
use crate::propagator::{EventMask, PropagatorQueue};
use crate::store::Store;
use crate::term::{Num, Term};
use crate::theory::{Action, Outcome};
use crate::union_find::UnionFind;
use crate::{AtomId, BoolVariable, ConsId, Error, Literal, PropId};

use super::compiler::ChrProgram;
use super::opcode::{Binop, Cmp, Instr, Reg, ValueSource};

/// The builtin symbols CHR-posted equalities route through, mirroring `backend::BuiltinSymbols`'s
/// `eq`/`eq_c` split between two-variable and variable-constant equalities.
#[derive(Copy, Clone)]
pub struct ChrSymbols {
  pub eq: AtomId,
  pub eq_c: AtomId,
}

/// Everything a CHR wake may mutate, bundled the way `theory::TheoryContext` bundles a plain
/// theory propagator's access -- except CHR also needs to register new propagators (for facts it
/// posts) and mint fresh Boolean variables (for disjunctive bodies), so it gets its own context
/// type rather than reusing `TheoryContext`.
pub struct ChrContext<'a> {
  pub union_find: &'a mut UnionFind,
  pub store: &'a mut Store,
  pub propagators: &'a mut PropagatorQueue,
  pub prop_slot: &'a mut HashMap<PropId, SolverSlot>,
  pub var_to_props: &'a mut HashMap<BoolVariable, Vec<PropId>>,
  /// Reverse lookup from a CHR-visible constraint to the propagator registered for it, so
  /// `Instr::Delete` can kill that propagator as well as purging the store entry.
  pub chr_cons_prop: &'a mut HashMap<ConsId, PropId>,
  pub next_bool_var: &'a mut BoolVariable,
  pub symbols: ChrSymbols,
  pub true_literal: Literal,
  pub actions: Vec<Action>,
}

impl<'a> ChrContext<'a> {
  fn mint_bool_var(&mut self) -> BoolVariable {
    let v = *self.next_bool_var;
    *self.next_bool_var += 1;
    v
  }

  /// Interns `(symbol, args)` reified by `literal`, registering a fresh propagator the first time
  /// it's seen so it participates in further CHR matching (and, for `eq`/`eq_c`, the bundled
  /// equality/bounds theories) exactly the way `backend::Backend::wire_predicate` wires a
  /// compile-time predicate.
  fn post(&mut self, symbol: AtomId, args: Vec<Rc<Term>>, literal: Literal, slot: SolverSlot) -> ConsId {
    let mut reason = Vec::new();
    let (cons, is_new) = self.store.intern(self.union_find, &mut reason, symbol, args, literal);
    if is_new {
      let priority = if matches!(slot, SolverSlot::Chr(_)) { 6 } else { 2 };
      let events = EventMask::DECISION_TRUE.union(EventMask::DECISION_FALSE);
      let prop = self.propagators.register(cons, priority, events);
      self.prop_slot.insert(prop, slot);
      self.var_to_props.entry(literal.var()).or_default().push(prop);
      self.chr_cons_prop.insert(cons, prop);
      if self.store.get(cons).literal == self.true_literal {
        // `true_literal` was decided at decision level 0, long before this wake; nothing will
        // walk back over that trail entry, so schedule explicitly.
        self.propagators.schedule(prop);
      }
    }
    cons
  }

  fn post_predicate(&mut self, symbol: AtomId, args: Vec<Rc<Term>>, literal: Literal) -> ConsId {
    self.post(symbol, args, literal, SolverSlot::Chr(symbol))
  }

  /// Posts `lhs = rhs` reified under `literal`. Two variables route through the `eq` symbol (the
  /// same fast-path `theory::equality::EqualitySolver` already serves); a variable and a constant
  /// route through `eq_c` (`theory::bounds`'s var-constant slot); two grounds are resolved
  /// immediately, with no store entry needed.
  fn post_eq(&mut self, lhs: Rc<Term>, rhs: Rc<Term>, literal: Literal) -> Result<(), Vec<Literal>> {
    match (lhs.as_ref(), rhs.as_ref()) {
      (Term::Var(_), Term::Var(_)) => {
        self.post(self.symbols.eq, vec![lhs, rhs], literal, SolverSlot::Equality);
      }
      (Term::Var(_), _) | (_, Term::Var(_)) => {
        let (v, c) = if matches!(lhs.as_ref(), Term::Var(_)) { (lhs, rhs) } else { (rhs, lhs) };
        self.post(self.symbols.eq_c, vec![v, c], literal, SolverSlot::Bounds);
      }
      _ if lhs == rhs => {}
      _ => return Err(vec![!literal]),
    }
    Ok(())
  }
}

#[derive(Clone)]
enum RegVal {
  Cons(ConsId),
  Term(Rc<Term>),
}

struct Choicepoint {
  lookup_pc: usize,
  dst: Reg,
  candidates: Vec<ConsId>,
  cursor: usize,
  matched_len: usize,
}

struct Frame {
  regs: Vec<Option<RegVal>>,
  stack: Vec<Num>,
  choicepoints: Vec<Choicepoint>,
  /// The reifying literals of every constraint currently matched into a register -- if the body
  /// ever hits `Instr::Fail`, their negations form the conflict clause (at least one of these
  /// "this partner combination holds" facts must not all be true at once).
  matched_literals: Vec<Literal>,
  branch_literals: HashMap<usize, Literal>,
}

impl Frame {
  fn new(active: ConsId) -> Self {
    Self {
      regs: vec![Some(RegVal::Cons(active)); 1],
      stack: Vec::new(),
      choicepoints: Vec::new(),
      matched_literals: Vec::new(),
      branch_literals: HashMap::new(),
    }
  }

  fn set(&mut self, reg: Reg, value: RegVal) {
    let index = reg as usize;
    if index >= self.regs.len() {
      self.regs.resize(index + 1, None);
    }
    self.regs[index] = Some(value);
  }

  fn cons_at(&self, reg: Reg) -> ConsId {
    match &self.regs[reg as usize] {
      Some(RegVal::Cons(id)) => *id,
      _ => unreachable!("compiler only reads a constraint register where `Lookup`/register 0 put one"),
    }
  }

  fn term_at(&self, reg: Reg) -> Rc<Term> {
    match &self.regs[reg as usize] {
      Some(RegVal::Term(t)) => t.clone(),
      _ => unreachable!("compiler only reads a term register after `Get`/`GetId` populated it"),
    }
  }

  fn resolve(&self, src: &ValueSource) -> Rc<Term> {
    match src {
      ValueSource::Reg(r) => self.term_at(*r),
      ValueSource::Const(t) => t.clone(),
    }
  }
}

fn term_equal(uf: &UnionFind, a: &Term, b: &Term) -> bool {
  match (a, b) {
    (Term::Var(x), Term::Var(y)) => uf.deref(*x) == uf.deref(*y),
    _ => a == b,
  }
}

fn as_num(term: &Term) -> Result<Num, Error> {
  match term {
    Term::Num(n) => Ok(*n),
    _ => Err(Error::type_error("a CHR guard/body arithmetic operand is not bound to a number")),
  }
}

/// Pops the innermost open choicepoint's next candidate, re-binding its register, or pops it
/// entirely once exhausted and tries the next one out. Returns the instruction index to resume at,
/// or `None` once every choicepoint is exhausted (the occurrence has no further match).
fn backtrack(frame: &mut Frame, store: &Store) -> Option<usize> {
  while let Some(cp) = frame.choicepoints.last_mut() {
    frame.matched_literals.truncate(cp.matched_len);
    if cp.cursor < cp.candidates.len() {
      let candidate = cp.candidates[cp.cursor];
      cp.cursor += 1;
      let dst = cp.dst;
      let lookup_pc = cp.lookup_pc;
      frame.matched_literals.push(store.get(candidate).literal);
      frame.set(dst, RegVal::Cons(candidate));
      return Some(lookup_pc + 1);
    }
    frame.choicepoints.pop();
  }
  None
}

/// Runs every occurrence registered for `symbol` against the constraint `active` that just woke
/// them, per SPEC_FULL §4.7. Stops at the first occurrence that fails or requests a restart,
/// exactly as `sat::Engine::run_propagator` already stops at the first theory that does.
pub fn run_for_symbol(program: &ChrProgram, symbol: AtomId, ctx: &mut ChrContext, active: ConsId) -> Result<Outcome, Error> {
  for occurrence in program.occurrences_for(symbol) {
    if ctx.store.get(active).is_purged() {
      break;
    }
    match run_occurrence(&occurrence.program, ctx, active)? {
      Outcome::Propagate => continue,
      other => return Ok(other),
    }
  }
  Ok(Outcome::Propagate)
}

fn run_occurrence(program: &[Instr], ctx: &mut ChrContext, active: ConsId) -> Result<Outcome, Error> {
  let mut frame = Frame::new(active);
  frame.matched_literals.push(ctx.store.get(active).literal);
  let mut pc = 0usize;

  loop {
    let Some(instr) = program.get(pc) else {
      return Ok(Outcome::Propagate);
    };

    match instr {
      Instr::Get { dst, src, position } => {
        let cons = frame.cons_at(*src);
        let arg = ctx.store.get(cons).args[*position].clone();
        frame.set(*dst, RegVal::Term(arg));
        pc += 1;
      }
      Instr::GetId { dst, src } => {
        let cons = frame.cons_at(*src);
        frame.set(*dst, RegVal::Term(Rc::new(Term::Num(Num::from_integer(cons as i64)))));
        pc += 1;
      }
      Instr::Lookup { dst, symbol, lookup_index, bound_args, exclude } => {
        let bound_values: Vec<Rc<Term>> = bound_args.iter().map(|r| frame.term_at(*r)).collect();
        let mut candidates: Vec<ConsId> = ctx.store.probe(ctx.union_find, *symbol, *lookup_index, &bound_values).collect();
        if let Some(exclude_reg) = exclude {
          let excluded = frame.cons_at(*exclude_reg);
          candidates.retain(|&c| c != excluded);
        }
        frame.choicepoints.push(Choicepoint { lookup_pc: pc, dst: *dst, candidates, cursor: 0, matched_len: frame.matched_literals.len() });
        match backtrack(&mut frame, ctx.store) {
          Some(resume) => pc = resume,
          None => return Ok(Outcome::Propagate),
        }
      }
      Instr::Next { .. } => {
        pc += 1;
      }
      Instr::Equal { a, b } => {
        let lhs = frame.term_at(*a);
        let rhs = frame.resolve(b);
        if term_equal(ctx.union_find, &lhs, &rhs) {
          pc += 1;
        } else {
          match backtrack(&mut frame, ctx.store) {
            Some(resume) => pc = resume,
            None => return Ok(Outcome::Propagate),
          }
        }
      }
      Instr::Delete { reg } => {
        let cons = frame.cons_at(*reg);
        ctx.store.purge(cons);
        if let Some(&prop) = ctx.chr_cons_prop.get(&cons) {
          ctx.propagators.kill(prop);
        }
        pc += 1;
      }
      Instr::Prop { symbol, args } => {
        let resolved: Vec<Rc<Term>> = args.iter().map(|a| frame.resolve(a)).collect();
        ctx.post_predicate(*symbol, resolved, ctx.true_literal);
        pc += 1;
      }
      Instr::PropEq { a, b } => {
        let lhs = frame.resolve(a);
        let rhs = frame.resolve(b);
        let lit = ctx.true_literal;
        if let Err(reason) = ctx.post_eq(lhs, rhs, lit) {
          return Ok(Outcome::Fail(reason));
        }
        pc += 1;
      }
      Instr::Disjunct { branch, symbol, args } => {
        let resolved: Vec<Rc<Term>> = args.iter().map(|a| frame.resolve(a)).collect();
        let lit = branch_literal(ctx, &mut frame.branch_literals, *branch);
        ctx.post_predicate(*symbol, resolved, lit);
        pc += 1;
      }
      Instr::DisjEq { branch, a, b } => {
        let lhs = frame.resolve(a);
        let rhs = frame.resolve(b);
        let lit = branch_literal(ctx, &mut frame.branch_literals, *branch);
        if let Err(reason) = ctx.post_eq(lhs, rhs, lit) {
          return Ok(Outcome::Fail(reason));
        }
        pc += 1;
      }
      Instr::TouchBranch { branch } => {
        branch_literal(ctx, &mut frame.branch_literals, *branch);
        pc += 1;
      }
      Instr::PropDisj => {
        let lits: Vec<Literal> = frame.branch_literals.values().copied().collect();
        if !lits.is_empty() {
          ctx.actions.push(Action::AddClause { lits, keep: true });
        }
        frame.branch_literals.clear();
        pc += 1;
      }
      Instr::Fail => {
        let reason = frame.matched_literals.iter().map(|&l| !l).collect();
        return Ok(Outcome::Fail(reason));
      }
      Instr::Retry => match backtrack(&mut frame, ctx.store) {
        Some(resume) => pc = resume,
        None => return Ok(Outcome::Propagate),
      },
      Instr::EvalPush { src } => {
        let term = frame.resolve(src);
        frame.stack.push(as_num(&term)?);
        pc += 1;
      }
      Instr::EvalPop { dst } => {
        let n = frame.stack.pop().expect("compiler balances EvalPush/EvalPop");
        frame.set(*dst, RegVal::Term(Rc::new(Term::Num(n))));
        pc += 1;
      }
      Instr::EvalCmp { cmp } => {
        let b = frame.stack.pop().expect("compiler balances guard arithmetic");
        let a = frame.stack.pop().expect("compiler balances guard arithmetic");
        let holds = match cmp {
          Cmp::Eq => a == b,
          Cmp::Neq => a != b,
          Cmp::Lt => a < b,
          Cmp::Leq => a <= b,
          Cmp::Gt => a > b,
          Cmp::Geq => a >= b,
        };
        if holds {
          pc += 1;
        } else {
          match backtrack(&mut frame, ctx.store) {
            Some(resume) => pc = resume,
            None => return Ok(Outcome::Propagate),
          }
        }
      }
      Instr::EvalBinop { binop } => {
        let b = frame.stack.pop().expect("compiler balances guard arithmetic");
        let a = frame.stack.pop().expect("compiler balances guard arithmetic");
        let result = match binop {
          Binop::Add => a + b,
          Binop::Sub => a - b,
          Binop::Mul => a * b,
          Binop::Div => a / b,
        };
        frame.stack.push(result);
        pc += 1;
      }
      Instr::Print { reg } => {
        let term = frame.term_at(*reg);
        crate::trace!("chr", eprintln!("chr: {}", term));
        pc += 1;
      }
      Instr::Inc => {
        let n = frame.stack.pop().unwrap_or_else(|| Num::from_integer(0));
        frame.stack.push(n + Num::from_integer(1));
        pc += 1;
      }
    }
  }
}

fn branch_literal(ctx: &mut ChrContext, branch_literals: &mut HashMap<usize, Literal>, branch: usize) -> Literal {
  *branch_literals.entry(branch).or_insert_with(|| Literal::positive(ctx.mint_bool_var()))
}
