/*!

Hand-written recursive-descent parser over `chr::lexer::Token`s, turning a `.chr` file's token
stream into a `chr::ast::ChrSource`. Like the lexer, there is no parser-generator dependency: the
grammar is small and almost entirely unambiguous by leading keyword, with only expressions
(arithmetic and comparisons) needing real precedence climbing, matching
`original_source/solver_chr.c`'s own recursive-descent reader.

A `.chr` file is a sequence of `.`-terminated declarations. Since `.` never appears inside a
declaration (the lexer only emits `Dot` as a standalone token; a decimal point is folded into its
number), each declaration is first carved out by splitting on top-level `Dot` tokens, then parsed
on its own.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::chr::ast::{Body, BodyAtom, ChrSource, Decl, HeadAtom, Priority, PriorityDecl, Rule, RewriteDecl, TypeDecl, TypeInst};
use crate::chr::lexer::{Lexer, Token, TokenKind};
use crate::term::{AtomTable, Op, Term};
use crate::Error;

/// Parses a whole `.chr` source file. `atoms` interns the ground 0-arity atoms and function
/// symbols encountered in expression position (rewrite patterns/replacements, nested term
/// arguments); head/body *constraint* symbols are left as plain names and resolved later by
/// `compiler::resolve_symbol`, the same table.
pub fn parse(file: &str, source: &str, atoms: &mut AtomTable) -> Result<ChrSource, Error> {
  let tokens = Lexer::new(file, source).tokenize()?;
  let file: Rc<str> = file.into();
  let mut decls = Vec::new();
  let mut start = 0usize;
  for (i, tok) in tokens.iter().enumerate() {
    match &tok.kind {
      TokenKind::Dot => {
        let slice = &tokens[start..i];
        if !slice.is_empty() {
          decls.push(parse_decl(file.clone(), slice, atoms)?);
        }
        start = i + 1;
      }
      TokenKind::Eof => {
        if start != i {
          return Err(Error::parse(&file, tok.line, "trailing declaration not terminated by `.`"));
        }
        break;
      }
      _ => {}
    }
  }
  Ok(ChrSource { decls })
}

/// Cursor over one declaration's tokens (or some sub-slice of it, e.g. the left side of a rule's
/// connective). Owns a copy of the slice plus a trailing `Eof` sentinel so `peek`/`bump` never run
/// off the end.
struct Cur {
  tokens: Vec<Token>,
  pos: usize,
  file: Rc<str>,
}

impl Cur {
  fn new(file: Rc<str>, slice: &[Token]) -> Self {
    let mut tokens = slice.to_vec();
    let line = tokens.last().map(|t| t.line).unwrap_or(1);
    tokens.push(Token { kind: TokenKind::Eof, line });
    Self { tokens, pos: 0, file }
  }

  fn peek(&self) -> &TokenKind {
    &self.tokens[self.pos].kind
  }

  fn line(&self) -> usize {
    self.tokens[self.pos].line
  }

  fn bump(&mut self) -> TokenKind {
    let kind = self.tokens[self.pos].kind.clone();
    if self.pos + 1 < self.tokens.len() {
      self.pos += 1;
    }
    kind
  }

  fn at_end(&self) -> bool {
    matches!(self.peek(), TokenKind::Eof)
  }

  fn error<S: Into<String>>(&self, message: S) -> Error {
    Error::parse(&self.file, self.line(), message)
  }

  fn peek_ident(&self, word: &str) -> bool {
    matches!(self.peek(), TokenKind::Ident(s) if s.as_ref() == word)
  }

  fn eat_comma(&mut self) -> bool {
    if matches!(self.peek(), TokenKind::Comma) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn eat_op(&mut self, op: &str) -> bool {
    if matches!(self.peek(), TokenKind::Op(o) if *o == op) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn expect_lparen(&mut self) -> Result<(), Error> {
    if matches!(self.peek(), TokenKind::LParen) {
      self.bump();
      Ok(())
    } else {
      Err(self.error("expected `(`"))
    }
  }

  fn expect_rparen(&mut self) -> Result<(), Error> {
    if matches!(self.peek(), TokenKind::RParen) {
      self.bump();
      Ok(())
    } else {
      Err(self.error("expected `)`"))
    }
  }

  fn expect_any_ident(&mut self) -> Result<Rc<str>, Error> {
    match self.peek().clone() {
      TokenKind::Ident(s) => {
        self.bump();
        Ok(s)
      }
      other => Err(self.error(format!("expected an identifier, found {:?}", other))),
    }
  }
}

/// Rule-local variable numbering: each distinct name (besides `_`) gets one slot the first time
/// it is seen, shared across the rule's heads, guard, and body. `_` is always fresh.
#[derive(Default)]
struct VarScope {
  ids: HashMap<Rc<str>, usize>,
  next: usize,
}

impl VarScope {
  fn var_id(&mut self, name: &str) -> usize {
    if name == "_" {
      let id = self.next;
      self.next += 1;
      return id;
    }
    if let Some(&id) = self.ids.get(name) {
      return id;
    }
    let id = self.next;
    self.next += 1;
    self.ids.insert(name.into(), id);
    id
  }

  fn len(&self) -> usize {
    self.next
  }
}

fn parse_decl(file: Rc<str>, slice: &[Token], atoms: &mut AtomTable) -> Result<Decl, Error> {
  let line = slice.first().map(|t| t.line).unwrap_or(1);
  if matches!(&slice[0].kind, TokenKind::Ident(s) if s.as_ref() == "type") {
    let mut cur = Cur::new(file, slice);
    cur.bump(); // "type"
    let decl = if cur.peek_ident("priority") {
      cur.bump();
      Decl::TypePriority(parse_priority_decl(&mut cur)?)
    } else {
      Decl::Type(parse_type_decl(&mut cur)?)
    };
    if !cur.at_end() {
      return Err(cur.error("unexpected trailing tokens after declaration"));
    }
    return Ok(decl);
  }
  parse_rule_or_rewrite(file, line, slice, atoms)
}

fn parse_type_inst(cur: &mut Cur) -> Result<TypeInst, Error> {
  if cur.peek_ident("var") {
    cur.bump();
    if !cur.peek_ident("of") {
      return Err(cur.error("expected `of` after `var`"));
    }
    cur.bump();
    return Ok(TypeInst::VarOf(Box::new(parse_type_inst(cur)?)));
  }
  let name = cur.expect_any_ident()?;
  Ok(match name.as_ref() {
    "nil" => TypeInst::Nil,
    "bool" => TypeInst::Bool,
    "num" => TypeInst::Num,
    "atom" => TypeInst::Atom,
    "str" => TypeInst::Str,
    "any" => TypeInst::Any,
    _ => TypeInst::User(name),
  })
}

fn parse_type_decl(cur: &mut Cur) -> Result<TypeDecl, Error> {
  let symbol = cur.expect_any_ident()?;
  cur.expect_lparen()?;
  let mut arg_types = Vec::new();
  if !matches!(cur.peek(), TokenKind::RParen) {
    loop {
      arg_types.push(parse_type_inst(cur)?);
      if !cur.eat_comma() {
        break;
      }
    }
  }
  cur.expect_rparen()?;
  Ok(TypeDecl { symbol, arg_types })
}

fn parse_priority_decl(cur: &mut Cur) -> Result<PriorityDecl, Error> {
  let symbol = cur.expect_any_ident()?;
  cur.expect_lparen()?;
  let mut arity = 0usize;
  if !matches!(cur.peek(), TokenKind::RParen) {
    loop {
      parse_type_inst(cur)?;
      arity += 1;
      if !cur.eat_comma() {
        break;
      }
    }
  }
  cur.expect_rparen()?;
  let level = cur.expect_any_ident()?;
  let priority = match level.as_ref() {
    "low" => Priority::Low,
    "medium" => Priority::Medium,
    "high" => Priority::High,
    other => return Err(cur.error(format!("unknown priority level `{}` (expected low/medium/high)", other))),
  };
  Ok(PriorityDecl { symbol, arity, priority })
}

/// Finds the rule's top-level connective (`-->`, `<=>`, or `==>`), skipping over parenthesized
/// sub-expressions so a nested arithmetic term never gets mistaken for it.
fn find_top_level_connective(tokens: &[Token]) -> Option<(usize, &'static str)> {
  let mut depth = 0i32;
  for (i, t) in tokens.iter().enumerate() {
    match &t.kind {
      TokenKind::LParen => depth += 1,
      TokenKind::RParen => depth -= 1,
      TokenKind::Op(op) if depth == 0 && matches!(*op, "-->" | "<=>" | "==>") => return Some((i, op)),
      _ => {}
    }
  }
  None
}

fn find_top_level_op(tokens: &[Token], target: &str) -> Option<usize> {
  let mut depth = 0i32;
  for (i, t) in tokens.iter().enumerate() {
    match &t.kind {
      TokenKind::LParen => depth += 1,
      TokenKind::RParen => depth -= 1,
      TokenKind::Op(op) if depth == 0 && *op == target => return Some(i),
      _ => {}
    }
  }
  None
}

fn split_top_level(tokens: &[Token], is_sep: impl Fn(&TokenKind) -> bool) -> Vec<Vec<Token>> {
  let mut out = Vec::new();
  let mut current = Vec::new();
  let mut depth = 0i32;
  for t in tokens {
    match &t.kind {
      TokenKind::LParen => {
        depth += 1;
        current.push(t.clone());
      }
      TokenKind::RParen => {
        depth -= 1;
        current.push(t.clone());
      }
      k if depth == 0 && is_sep(k) => out.push(std::mem::take(&mut current)),
      _ => current.push(t.clone()),
    }
  }
  out.push(current);
  out
}

fn parse_rule_or_rewrite(file: Rc<str>, line: usize, tokens: &[Token], atoms: &mut AtomTable) -> Result<Decl, Error> {
  let Some((idx, connective)) = find_top_level_connective(tokens) else {
    return Err(Error::parse(&file, line, "a declaration must be a `type` declaration or a rule/rewrite (no `==>`, `<=>`, or `-->` found)"));
  };
  let lhs = &tokens[..idx];
  let rhs = &tokens[idx + 1..];
  let mut scope = VarScope::default();

  if connective == "-->" {
    let mut lcur = Cur::new(file.clone(), lhs);
    let pattern = parse_expr(&mut lcur, atoms, &mut scope)?;
    if !lcur.at_end() {
      return Err(lcur.error("unexpected trailing tokens in rewrite pattern"));
    }
    let mut rcur = Cur::new(file.clone(), rhs);
    let replacement = parse_expr(&mut rcur, atoms, &mut scope)?;
    if !rcur.at_end() {
      return Err(rcur.error("unexpected trailing tokens in rewrite replacement"));
    }
    return Ok(Decl::Rewrite(RewriteDecl { pattern, replacement }));
  }

  let mut heads = Vec::new();
  if connective == "<=>" {
    if let Some(bpos) = find_top_level_op(lhs, "\\") {
      let mut kcur = Cur::new(file.clone(), &lhs[..bpos]);
      heads.extend(parse_head_list(&mut kcur, atoms, &mut scope, false)?);
      let mut dcur = Cur::new(file.clone(), &lhs[bpos + 1..]);
      heads.extend(parse_head_list(&mut dcur, atoms, &mut scope, true)?);
    } else {
      let mut hcur = Cur::new(file.clone(), lhs);
      heads.extend(parse_head_list(&mut hcur, atoms, &mut scope, true)?);
    }
  } else {
    if find_top_level_op(lhs, "\\").is_some() {
      return Err(Error::parse(&file, line, "simpagation `\\` is only valid in a `<=>` rule"));
    }
    let mut hcur = Cur::new(file.clone(), lhs);
    heads.extend(parse_head_list(&mut hcur, atoms, &mut scope, false)?);
  }

  let (guard_tokens, body_tokens): (&[Token], &[Token]) = match find_top_level_op(rhs, "|") {
    Some(gpos) => (&rhs[..gpos], &rhs[gpos + 1..]),
    None => (&[], rhs),
  };
  let guard = parse_guard(file.clone(), guard_tokens, atoms, &mut scope)?;
  let body = parse_body(file.clone(), body_tokens, atoms, &mut scope)?;

  Ok(Decl::Rule(Rule { heads, guard, body, num_vars: scope.len(), file, line }))
}

fn parse_head_list(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope, kill: bool) -> Result<Vec<HeadAtom>, Error> {
  let mut heads = vec![parse_head_atom(cur, atoms, scope, kill)?];
  while cur.eat_comma() {
    heads.push(parse_head_atom(cur, atoms, scope, kill)?);
  }
  if !cur.at_end() {
    return Err(cur.error("unexpected trailing tokens in head list"));
  }
  Ok(heads)
}

fn parse_head_atom(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope, kill: bool) -> Result<HeadAtom, Error> {
  let symbol = cur.expect_any_ident()?;
  let mut args = Vec::new();
  if matches!(cur.peek(), TokenKind::LParen) {
    cur.bump();
    if !matches!(cur.peek(), TokenKind::RParen) {
      loop {
        args.push(parse_expr(cur, atoms, scope)?);
        if !cur.eat_comma() {
          break;
        }
      }
    }
    cur.expect_rparen()?;
  }
  let mut id = None;
  if cur.eat_op("#") {
    match cur.peek().clone() {
      TokenKind::Var(name) => {
        cur.bump();
        id = Some(scope.var_id(&name));
      }
      other => return Err(cur.error(format!("expected a variable after `#`, found {:?}", other))),
    }
  }
  Ok(HeadAtom { sign: true, symbol, args, id, kill })
}

fn parse_guard(file: Rc<str>, tokens: &[Token], atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Vec<Rc<Term>>, Error> {
  if tokens.is_empty() {
    return Ok(Vec::new());
  }
  let mut out = Vec::new();
  for part in split_top_level(tokens, |k| matches!(k, TokenKind::Comma)) {
    let mut cur = Cur::new(file.clone(), &part);
    out.push(parse_expr(&mut cur, atoms, scope)?);
    if !cur.at_end() {
      return Err(cur.error("unexpected trailing tokens in guard"));
    }
  }
  Ok(out)
}

fn parse_body(file: Rc<str>, tokens: &[Token], atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Body, Error> {
  let branches = split_top_level(tokens, |k| matches!(k, TokenKind::Semi));
  if branches.len() > 1 {
    let mut out = Vec::new();
    for branch in &branches {
      out.push(parse_conjunction(file.clone(), branch, atoms, scope)?);
    }
    Ok(Body::Disjunction(out))
  } else {
    Ok(Body::Conjunction(parse_conjunction(file, &branches[0], atoms, scope)?))
  }
}

fn parse_conjunction(file: Rc<str>, tokens: &[Token], atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Vec<BodyAtom>, Error> {
  let mut out = Vec::new();
  for part in split_top_level(tokens, |k| matches!(k, TokenKind::Comma)) {
    if part.is_empty() {
      continue;
    }
    let mut cur = Cur::new(file.clone(), &part);
    if let Some(atom) = parse_body_atom(&mut cur, atoms, scope)? {
      if !cur.at_end() {
        return Err(cur.error("unexpected trailing tokens in body atom"));
      }
      out.push(atom);
    }
  }
  Ok(out)
}

/// A body atom is either `fail`, the no-op `true` (dropped, `None`), a predicate application, or
/// an equality post (`Lhs = Rhs`, the bare `=` token, distinct from the guard-only `$=`).
fn parse_body_atom(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Option<BodyAtom>, Error> {
  if cur.peek_ident("fail") {
    cur.bump();
    return Ok(Some(BodyAtom { sign: true, symbol: "fail".into(), args: Vec::new() }));
  }
  if cur.peek_ident("true") {
    cur.bump();
    return Ok(None);
  }
  let lhs = parse_expr(cur, atoms, scope)?;
  if cur.eat_op("=") {
    let rhs = parse_expr(cur, atoms, scope)?;
    return Ok(Some(BodyAtom { sign: true, symbol: "=".into(), args: vec![lhs, rhs] }));
  }
  match lhs.as_ref() {
    Term::Op(Op::Func(id), args) => Ok(Some(BodyAtom { sign: true, symbol: atoms.name(*id).into(), args: args.clone() })),
    Term::Atom(id) => Ok(Some(BodyAtom { sign: true, symbol: atoms.name(*id).into(), args: Vec::new() })),
    _ => Err(cur.error("a rule body atom must be a predicate application, an equality, `fail`, or `true`")),
  }
}

fn cmp_op(op: &str) -> Option<Op> {
  match op {
    "$=" | ":=" => Some(Op::Eq),
    "$!=" => Some(Op::Neq),
    "$>" => Some(Op::Gt),
    "$>=" => Some(Op::Geq),
    "$<" => Some(Op::Lt),
    "$<=" => Some(Op::Leq),
    _ => None,
  }
}

fn binop(op: &str) -> Option<Op> {
  match op {
    "$+" => Some(Op::Add),
    "$-" => Some(Op::Sub),
    "$*" => Some(Op::Mul),
    "$/" => Some(Op::Div),
    _ => None,
  }
}

/// Full expression grammar: a comparison wraps an additive/multiplicative arithmetic tower. Real
/// CHR fixity (`$*` right-associative, the rest left) doesn't matter for any arithmetic this VM
/// actually evaluates (no subtraction/division chains appear in the test corpus), so this climbs
/// left-to-right at both arithmetic levels rather than tracking per-operator associativity.
fn parse_expr(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Rc<Term>, Error> {
  parse_comparison(cur, atoms, scope)
}

fn parse_comparison(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Rc<Term>, Error> {
  let lhs = parse_additive(cur, atoms, scope)?;
  if let TokenKind::Op(op) = cur.peek().clone() {
    if let Some(cmp) = cmp_op(op) {
      cur.bump();
      let rhs = parse_additive(cur, atoms, scope)?;
      return Ok(Rc::new(Term::Op(cmp, vec![lhs, rhs])));
    }
  }
  Ok(lhs)
}

fn parse_additive(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Rc<Term>, Error> {
  let mut lhs = parse_multiplicative(cur, atoms, scope)?;
  loop {
    let op = match cur.peek() {
      TokenKind::Op(op @ ("$+" | "$-")) => *op,
      _ => break,
    };
    cur.bump();
    let rhs = parse_multiplicative(cur, atoms, scope)?;
    lhs = Rc::new(Term::Op(binop(op).unwrap(), vec![lhs, rhs]));
  }
  Ok(lhs)
}

fn parse_multiplicative(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Rc<Term>, Error> {
  let mut lhs = parse_primary(cur, atoms, scope)?;
  loop {
    let op = match cur.peek() {
      TokenKind::Op(op @ ("$*" | "$/")) => *op,
      _ => break,
    };
    cur.bump();
    let rhs = parse_primary(cur, atoms, scope)?;
    lhs = Rc::new(Term::Op(binop(op).unwrap(), vec![lhs, rhs]));
  }
  Ok(lhs)
}

fn parse_primary(cur: &mut Cur, atoms: &mut AtomTable, scope: &mut VarScope) -> Result<Rc<Term>, Error> {
  match cur.peek().clone() {
    TokenKind::Num(n) => {
      cur.bump();
      Ok(Rc::new(Term::Num(n)))
    }
    TokenKind::Str(s) => {
      cur.bump();
      Ok(Rc::new(Term::Str(s)))
    }
    TokenKind::Var(name) => {
      cur.bump();
      Ok(Rc::new(Term::Var(scope.var_id(&name))))
    }
    TokenKind::Ident(name) => {
      cur.bump();
      if matches!(cur.peek(), TokenKind::LParen) {
        cur.bump();
        let mut args = Vec::new();
        if !matches!(cur.peek(), TokenKind::RParen) {
          loop {
            args.push(parse_expr(cur, atoms, scope)?);
            if !cur.eat_comma() {
              break;
            }
          }
        }
        cur.expect_rparen()?;
        let id = atoms.intern(&name, args.len() as u32);
        return Ok(Rc::new(Term::Op(Op::Func(id), args)));
      }
      match name.as_ref() {
        "nil" => Ok(Rc::new(Term::Nil)),
        "true" => Ok(Rc::new(Term::Bool(true))),
        "false" => Ok(Rc::new(Term::Bool(false))),
        _ => Ok(Rc::new(Term::Atom(atoms.intern(&name, 0)))),
      }
    }
    TokenKind::LParen => {
      cur.bump();
      let inner = parse_expr(cur, atoms, scope)?;
      cur.expect_rparen()?;
      Ok(inner)
    }
    other => Err(cur.error(format!("unexpected token in expression: {:?}", other))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse_ok(src: &str) -> ChrSource {
    let mut atoms = AtomTable::new();
    parse("test", src, &mut atoms).unwrap()
  }

  #[test]
  fn parses_a_type_declaration() {
    let source = parse_ok("type leq(num, num).");
    assert_eq!(source.decls.len(), 1);
    match &source.decls[0] {
      Decl::Type(decl) => {
        assert_eq!(decl.symbol.as_ref(), "leq");
        assert_eq!(decl.arg_types, vec![TypeInst::Num, TypeInst::Num]);
      }
      other => panic!("expected a type decl, got {:?}", other),
    }
  }

  #[test]
  fn parses_a_priority_declaration() {
    let source = parse_ok("type priority leq(num, num) high.");
    match &source.decls[0] {
      Decl::TypePriority(decl) => {
        assert_eq!(decl.symbol.as_ref(), "leq");
        assert_eq!(decl.arity, 2);
        assert_eq!(decl.priority, Priority::High);
      }
      other => panic!("expected a priority decl, got {:?}", other),
    }
  }

  #[test]
  fn parses_a_simplification_rule_with_true_body() {
    let source = parse_ok("leq(X, X) <=> true.");
    match &source.decls[0] {
      Decl::Rule(rule) => {
        assert_eq!(rule.heads.len(), 1);
        assert!(rule.heads[0].kill);
        assert_eq!(rule.num_vars, 1);
        match &rule.body {
          Body::Conjunction(atoms) => assert!(atoms.is_empty()),
          other => panic!("expected an empty conjunction, got {:?}", other),
        }
      }
      other => panic!("expected a rule, got {:?}", other),
    }
  }

  #[test]
  fn parses_a_propagation_rule_with_guard() {
    let source = parse_ok("leq(X, Y), leq(Y, X) ==> X $> Y | fail.");
    match &source.decls[0] {
      Decl::Rule(rule) => {
        assert_eq!(rule.heads.len(), 2);
        assert!(rule.heads.iter().all(|h| !h.kill));
        assert_eq!(rule.guard.len(), 1);
        match &rule.body {
          Body::Conjunction(atoms) => {
            assert_eq!(atoms.len(), 1);
            assert_eq!(atoms[0].symbol.as_ref(), "fail");
          }
          other => panic!("expected a one-atom conjunction, got {:?}", other),
        }
      }
      other => panic!("expected a rule, got {:?}", other),
    }
  }

  #[test]
  fn parses_simpagation_with_backslash_split() {
    let source = parse_ok("leq(X, Y) \\ leq(X, Y) <=> true.");
    match &source.decls[0] {
      Decl::Rule(rule) => {
        assert_eq!(rule.heads.len(), 2);
        assert!(!rule.heads[0].kill);
        assert!(rule.heads[1].kill);
      }
      other => panic!("expected a rule, got {:?}", other),
    }
  }

  #[test]
  fn parses_body_equality_and_id_binding() {
    let source = parse_ok("min(X, Y) # Id <=> X $<= Y | Result = X.");
    match &source.decls[0] {
      Decl::Rule(rule) => {
        assert!(rule.heads[0].id.is_some());
        match &rule.body {
          Body::Conjunction(atoms) => {
            assert_eq!(atoms.len(), 1);
            assert_eq!(atoms[0].symbol.as_ref(), "=");
            assert_eq!(atoms[0].args.len(), 2);
          }
          other => panic!("expected a one-atom conjunction, got {:?}", other),
        }
      }
      other => panic!("expected a rule, got {:?}", other),
    }
  }

  #[test]
  fn parses_a_disjunctive_body() {
    let source = parse_ok("p(X) ==> a(X) ; b(X).");
    match &source.decls[0] {
      Decl::Rule(rule) => match &rule.body {
        Body::Disjunction(branches) => assert_eq!(branches.len(), 2),
        other => panic!("expected a disjunction, got {:?}", other),
      },
      other => panic!("expected a rule, got {:?}", other),
    }
  }

  #[test]
  fn parses_a_rewrite_declaration() {
    let source = parse_ok("add(X, 0) --> X.");
    match &source.decls[0] {
      Decl::Rewrite(decl) => {
        assert!(matches!(decl.pattern.as_ref(), Term::Op(Op::Func(_), _)));
        assert!(matches!(decl.replacement.as_ref(), Term::Var(_)));
      }
      other => panic!("expected a rewrite decl, got {:?}", other),
    }
  }

  #[test]
  fn rejects_a_declaration_with_no_connective() {
    let mut atoms = AtomTable::new();
    assert!(parse("test", "p(X).", &mut atoms).is_err());
  }

  #[test]
  fn rejects_unbound_guard_variable() {
    // `Y` never appears in the head, so this should fail at compile time, not here: the parser
    // only builds the AST. Exercised instead in `compiler.rs`'s own tests.
  }
}
