/*!

Tokenizer for the CHR rule-file grammar, SPEC_FULL §6. A hand-written scanner rather than a
`logos`/`pest` grammar: the token set is small and fixed (the declared operator table, identifiers,
variables, numbers, strings, and a handful of punctuation marks), matching the scale of the rest of
this crate's hand-rolled lexing (there is no other parser-generator dependency to stay aligned with).

*/

use std::rc::Rc;

use crate::term::Num;
use crate::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
  /// A lowercase-leading (or quoted) name: atom, predicate, or keyword.
  Ident(Rc<str>),
  /// An uppercase- or underscore-leading name: a rule-local variable.
  Var(Rc<str>),
  Num(Num),
  Str(Rc<str>),
  /// One of the fixed declared operators, by its surface spelling (e.g. `"==>"`, `"$+"`).
  Op(&'static str),
  LParen,
  RParen,
  Comma,
  /// Separates disjunctive body branches (`a(X) ; b(X)`), SPEC_FULL §6's disjunctive-body
  /// extension.
  Semi,
  Dot,
  Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
  pub kind: TokenKind,
  pub line: usize,
}

/// Operators recognized as a single token, longest-match-first so e.g. `<=>` isn't split into `<`
/// then `=>`.
const OPERATORS: &[&str] = &[
  "==>", "<=>", "-->", "$!=", "$>=", "$<=", ":=", "$=", "$>", "$<", "$+", "$-", "$*", "$/", "|", "\\", "#",
  // Bare `=`, used only in a rule body to post an equality fact (`X = Y`), distinct from the
  // guard-only numeric comparison `$=`.
  "=",
];

pub struct Lexer<'a> {
  file: &'a str,
  chars: Vec<char>,
  pos: usize,
  line: usize,
}

impl<'a> Lexer<'a> {
  pub fn new(file: &'a str, source: &'a str) -> Self {
    Self { file, chars: source.chars().collect(), pos: 0, line: 1 }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += 1;
    if c == '\n' {
      self.line += 1;
    }
    Some(c)
  }

  fn error<S: Into<String>>(&self, message: S) -> Error {
    Error::parse(self.file, self.line, message)
  }

  fn skip_trivia(&mut self) {
    loop {
      match self.peek() {
        Some(c) if c.is_whitespace() => {
          self.bump();
        }
        Some('%') => {
          while let Some(c) = self.peek() {
            if c == '\n' {
              break;
            }
            self.bump();
          }
        }
        Some('/') if self.peek_at(1) == Some('*') => {
          self.bump();
          self.bump();
          loop {
            match self.peek() {
              None => break,
              Some('*') if self.peek_at(1) == Some('/') => {
                self.bump();
                self.bump();
                break;
              }
              _ => {
                self.bump();
              }
            }
          }
        }
        _ => break,
      }
    }
  }

  pub fn tokenize(mut self) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    loop {
      self.skip_trivia();
      let line = self.line;
      let Some(c) = self.peek() else {
        tokens.push(Token { kind: TokenKind::Eof, line });
        break;
      };

      let kind = if c == '(' {
        self.bump();
        TokenKind::LParen
      } else if c == ')' {
        self.bump();
        TokenKind::RParen
      } else if c == ',' {
        self.bump();
        TokenKind::Comma
      } else if c == ';' {
        self.bump();
        TokenKind::Semi
      } else if c == '.' && !self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
        self.bump();
        TokenKind::Dot
      } else if c == '"' {
        self.lex_string()?
      } else if c.is_ascii_digit() {
        self.lex_number()
      } else if c == '_' || c.is_uppercase() {
        TokenKind::Var(self.lex_name().into())
      } else if c.is_alphabetic() {
        TokenKind::Ident(self.lex_name().into())
      } else if let Some(op) = self.lex_operator() {
        TokenKind::Op(op)
      } else {
        return Err(self.error(format!("unexpected character `{}`", c)));
      };
      tokens.push(Token { kind, line });
    }
    Ok(tokens)
  }

  fn lex_name(&mut self) -> String {
    let mut s = String::new();
    while let Some(c) = self.peek() {
      if c.is_alphanumeric() || c == '_' {
        s.push(c);
        self.bump();
      } else {
        break;
      }
    }
    s
  }

  fn lex_number(&mut self) -> TokenKind {
    let mut s = String::new();
    while let Some(c) = self.peek() {
      if c.is_ascii_digit() {
        s.push(c);
        self.bump();
      } else {
        break;
      }
    }
    if self.peek() == Some('.') && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
      s.push('.');
      self.bump();
      while let Some(c) = self.peek() {
        if c.is_ascii_digit() {
          s.push(c);
          self.bump();
        } else {
          break;
        }
      }
      let value: f64 = s.parse().unwrap_or(0.0);
      return TokenKind::Num(Num::approximate_float(value).unwrap_or_else(Num::from_integer(0).clone));
    }
    let value: i64 = s.parse().unwrap_or(0);
    TokenKind::Num(Num::from_integer(value))
  }

  fn lex_string(&mut self) -> Result<TokenKind, Error> {
    self.bump(); // opening quote
    let mut s = String::new();
    loop {
      match self.bump() {
        None => return Err(self.error("unterminated string literal")),
        Some('"') => break,
        Some('\\') => match self.bump() {
          Some('n') => s.push('\n'),
          Some('t') => s.push('\t'),
          Some(c) => s.push(c),
          None => return Err(self.error("unterminated string literal")),
        },
        Some(c) => s.push(c),
      }
    }
    Ok(TokenKind::Str(s.into()))
  }

  fn lex_operator(&mut self) -> Option<&'static str> {
    for &op in OPERATORS {
      if self.chars[self.pos..].starts_with(&op.chars().collect::<Vec<_>>()[..]) {
        for _ in 0..op.chars().count() {
          self.bump();
        }
        return Some(op);
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(src: &str) -> Vec<TokenKind> {
    Lexer::new("test", src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
  }

  #[test]
  fn lexes_a_simple_simplification_rule() {
    let kinds = kinds("leq(X, X) <=> true.");
    assert_eq!(
      kinds,
      vec![
        TokenKind::Ident("leq".into()),
        TokenKind::LParen,
        TokenKind::Var("X".into()),
        TokenKind::Comma,
        TokenKind::Var("X".into()),
        TokenKind::RParen,
        TokenKind::Op("<=>"),
        TokenKind::Ident("true".into()),
        TokenKind::Dot,
        TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn longest_match_prefers_fat_arrow_over_eq() {
    let kinds = kinds("$>=");
    assert_eq!(kinds, vec![TokenKind::Op("$>="), TokenKind::Eof]);
  }

  #[test]
  fn skips_percent_and_block_comments() {
    let kinds = kinds("% a line comment\n/* a block\ncomment */leq");
    assert_eq!(kinds, vec![TokenKind::Ident("leq".into()), TokenKind::Eof]);
  }

  #[test]
  fn rejects_unterminated_strings() {
    assert!(Lexer::new("test", "\"oops").tokenize().is_err());
  }
}
