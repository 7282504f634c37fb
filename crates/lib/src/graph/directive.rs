//! Dependency directive scanner.
//!
//! Recognizes the restricted import/export grammar the bundler rewrites. This
//! is not a JavaScript parser: a directive must begin a line (after
//! indentation), although its body may span several lines.
//!
//! # Grammar
//!
//! ```text
//! import      := "import" ( STRING | clause "from" STRING ) ";"?
//! clause      := IDENT ( "," ( namespace | named ) )? | namespace | named
//! namespace   := "*" "as" IDENT
//! named       := "{" ( spec ( "," spec )* ","? )? "}"
//! spec        := IDENT ( "as" IDENT )?
//!
//! export      := "export" ( default | decl | list | all )
//! default     := "default" ( ("async")? "function" "*"? IDENT | "class" IDENT | <expression> )
//! decl        := ( "const" | "let" | "var" ) declarator ( "," declarator )* | ("async")? "function" "*"? IDENT | "class" IDENT
//! declarator  := IDENT ( "=" <expression> )?
//! list        := named ( "from" STRING )? ";"?
//! all         := "*" "from" STRING ";"?
//! ```
//!
//! Anything starting with `import`/`export` that does not match is reported as
//! [`Unsupported`] so the caller can log it; it is never rewritten.

use std::ops::Range;

use crate::util::lex::{LexState, lex_line, quoted_end, regex_allowed, regex_end, template_end};

/// One name crossing a module boundary.
///
/// `name` is the binding on the providing side, `alias` what it is called on
/// the receiving side. For `import { a as b }` that is `a` → `b`; for
/// `export { a as b }` it is local `a` → exported `b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
  pub name: String,
  pub alias: String,
}

impl Binding {
  pub fn same(name: &str) -> Self {
    Self {
      name: name.to_string(),
      alias: name.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
  /// Any import form. All fields empty means a side-effect-only import.
  Import {
    default: Option<String>,
    namespace: Option<String>,
    named: Vec<Binding>,
  },
  /// `export default <expr>`; the span covers `export default `.
  ExportDefaultExpr,
  /// `export default function f` / `class C`; the span covers `export default `.
  ExportDefaultDecl { name: String },
  /// `export const a = 1, b = 2` and friends, one name per declarator; the
  /// span covers `export `.
  ExportDecl { names: Vec<String> },
  /// `export { a, b as c }`.
  ExportList { bindings: Vec<Binding> },
  /// `export { a, b as c } from '...'`.
  ReExport { bindings: Vec<Binding> },
  /// `export * from '...'`.
  ReExportAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
  pub kind: DirectiveKind,
  /// Module specifier, for forms that reference another file.
  pub specifier: Option<String>,
  /// Byte range in the source replaced when rewriting.
  pub span: Range<usize>,
  /// 1-based line of the directive start.
  pub line: usize,
}

/// A line that starts with `import`/`export` but is outside the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported {
  pub line: usize,
  pub text: String,
}

#[derive(Debug, Default)]
pub struct ScanResult {
  pub directives: Vec<Directive>,
  pub unsupported: Vec<Unsupported>,
}

/// Scan `source` for dependency directives, in source order.
pub fn scan(source: &str) -> ScanResult {
  let mut result = ScanResult::default();
  let mut state = LexState::Code;
  // Directives may span lines; lines starting before this offset are already consumed.
  let mut resume_at = 0;

  let mut offset = 0;
  for (index, raw_line) in source.split_inclusive('\n').enumerate() {
    let line_start = offset;
    offset += raw_line.len();

    if line_start < resume_at {
      continue;
    }

    if state == LexState::Code {
      let indent = raw_line.len() - raw_line.trim_start().len();
      let start = line_start + indent;
      let rest = &source[start..];

      if keyword_at(rest, "import") || keyword_at(rest, "export") {
        let mut cursor = Cursor::new(source, start);
        match cursor.directive(index + 1) {
          Parsed::Directive(directive) => {
            resume_at = directive.span.end.max(line_start + 1);
            result.directives.push(directive);
            if resume_at > offset {
              // Lines swallowed by a multi-line directive are plain code.
              continue;
            }
            state = lex_line(&source[resume_at.min(offset)..offset], state);
            continue;
          }
          Parsed::NotADirective => {}
          Parsed::Unsupported => result.unsupported.push(Unsupported {
            line: index + 1,
            text: raw_line.trim().to_string(),
          }),
        }
      }
    }

    state = lex_line(raw_line, state);
  }

  result
}

/// Trailing bytes after which a line break cannot end an initializer.
const CONTINUATION: &[u8] = b"=+-*/%&|^<>?:.!~";

/// Leading bytes that continue the previous line's expression.
const LEADING_CONTINUATION: &[u8] = b"=+-*%&|^<>?:.";

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// `text` starts with `kw` followed by a non-identifier character.
fn keyword_at(text: &str, kw: &str) -> bool {
  text.starts_with(kw) && !text[kw.len()..].chars().next().is_some_and(is_ident_char)
}

enum Parsed {
  Directive(Directive),
  /// `import(...)` / `import.meta`: expressions, not declarations.
  NotADirective,
  Unsupported,
}

struct Cursor<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Cursor<'a> {
  fn new(src: &'a str, pos: usize) -> Self {
    Self { src, pos }
  }

  fn rest(&self) -> &'a str {
    &self.src[self.pos..]
  }

  fn peek(&self) -> Option<char> {
    self.rest().chars().next()
  }

  /// Skip whitespace (including newlines) and comments.
  fn skip_trivia(&mut self) {
    loop {
      let rest = self.rest();
      let trimmed = rest.trim_start();
      self.pos += rest.len() - trimmed.len();

      if trimmed.starts_with("//") {
        self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
      } else if trimmed.starts_with("/*") {
        match trimmed[2..].find("*/") {
          Some(end) => self.pos += end + 4,
          None => self.pos = self.src.len(),
        }
      } else {
        return;
      }
    }
  }

  /// Skip spaces and tabs on the current line only.
  fn skip_inline_space(&mut self) {
    let rest = self.rest();
    let trimmed = rest.trim_start_matches([' ', '\t']);
    self.pos += rest.len() - trimmed.len();
  }

  fn eat(&mut self, c: char) -> bool {
    self.skip_trivia();
    if self.peek() == Some(c) {
      self.pos += c.len_utf8();
      true
    } else {
      false
    }
  }

  fn eat_keyword(&mut self, kw: &str) -> bool {
    self.skip_trivia();
    if keyword_at(self.rest(), kw) {
      self.pos += kw.len();
      true
    } else {
      false
    }
  }

  fn ident(&mut self) -> Option<String> {
    self.skip_trivia();
    let rest = self.rest();
    if !rest.chars().next().is_some_and(is_ident_start) {
      return None;
    }
    let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
    self.pos += len;
    Some(rest[..len].to_string())
  }

  fn string(&mut self) -> Option<String> {
    self.skip_trivia();
    let quote = self.peek().filter(|c| *c == '\'' || *c == '"')?;
    let body = &self.rest()[1..];
    let end = body.find([quote, '\n'])?;
    if !body[end..].starts_with(quote) {
      return None;
    }
    let value = body[..end].to_string();
    self.pos += end + 2;
    Some(value)
  }

  /// Consume an optional `;` on the same logical statement.
  fn finish_statement(&mut self) {
    let save = self.pos;
    self.skip_inline_space();
    if self.peek() == Some(';') {
      self.pos += 1;
    } else {
      self.pos = save;
    }
  }

  fn directive(&mut self, line: usize) -> Parsed {
    let start = self.pos;
    if self.eat_keyword("import") {
      if matches!(self.peek(), Some('(') | Some('.')) {
        return Parsed::NotADirective;
      }
      let after_kw = self.pos;
      self.skip_trivia();
      if self.peek() == Some('(') {
        return Parsed::NotADirective;
      }
      self.pos = after_kw;
      return self.import(start, line).map_or(Parsed::Unsupported, Parsed::Directive);
    }
    if self.eat_keyword("export") {
      return self.export(start, line).map_or(Parsed::Unsupported, Parsed::Directive);
    }
    Parsed::NotADirective
  }

  fn import(&mut self, start: usize, line: usize) -> Option<Directive> {
    let mut default = None;
    let mut namespace = None;
    let mut named = Vec::new();

    let specifier = if let Some(spec) = self.string() {
      spec
    } else {
      let save = self.pos;
      match self.ident() {
        Some(ident) => {
          default = Some(ident);
          if self.eat(',') {
            self.import_tail(&mut namespace, &mut named)?;
          }
        }
        _ => {
          self.pos = save;
          self.import_tail(&mut namespace, &mut named)?;
        }
      }
      if !self.eat_keyword("from") {
        return None;
      }
      self.string()?
    };

    self.finish_statement();
    Some(Directive {
      kind: DirectiveKind::Import {
        default,
        namespace,
        named,
      },
      specifier: Some(specifier),
      span: start..self.pos,
      line,
    })
  }

  fn import_tail(&mut self, namespace: &mut Option<String>, named: &mut Vec<Binding>) -> Option<()> {
    if self.eat('*') {
      if !self.eat_keyword("as") {
        return None;
      }
      *namespace = Some(self.ident()?);
      Some(())
    } else if self.eat('{') {
      *named = self.binding_list()?;
      Some(())
    } else {
      None
    }
  }

  /// Parse `a, b as c }` after an opening brace.
  fn binding_list(&mut self) -> Option<Vec<Binding>> {
    let mut bindings = Vec::new();
    loop {
      if self.eat('}') {
        return Some(bindings);
      }
      let name = self.ident()?;
      let alias = if self.eat_keyword("as") { self.ident()? } else { name.clone() };
      bindings.push(Binding { name, alias });
      if !self.eat(',') {
        return self.eat('}').then_some(bindings);
      }
    }
  }

  fn export(&mut self, start: usize, line: usize) -> Option<Directive> {
    let directive = |kind, specifier, span| Directive {
      kind,
      specifier,
      span,
      line,
    };

    if self.eat_keyword("default") {
      self.skip_inline_space();
      let prefix_end = self.pos;
      let kind = match self.declared_name() {
        Some(name) => DirectiveKind::ExportDefaultDecl { name },
        None => DirectiveKind::ExportDefaultExpr,
      };
      return Some(directive(kind, None, start..prefix_end));
    }

    if self.eat('{') {
      let bindings = self.binding_list()?;
      if self.eat_keyword("from") {
        let spec = self.string()?;
        self.finish_statement();
        return Some(directive(DirectiveKind::ReExport { bindings }, Some(spec), start..self.pos));
      }
      self.finish_statement();
      return Some(directive(DirectiveKind::ExportList { bindings }, None, start..self.pos));
    }

    if self.eat('*') {
      if !self.eat_keyword("from") {
        return None;
      }
      let spec = self.string()?;
      self.finish_statement();
      return Some(directive(DirectiveKind::ReExportAll, Some(spec), start..self.pos));
    }

    self.skip_trivia();
    let decl_start = self.pos;
    for kw in ["const", "let", "var"] {
      if self.eat_keyword(kw) {
        let names = self.declarators()?;
        return Some(directive(DirectiveKind::ExportDecl { names }, None, start..decl_start));
      }
    }
    let name = self.declared_name()?;
    Some(directive(
      DirectiveKind::ExportDecl { names: vec![name] },
      None,
      start..decl_start,
    ))
  }

  /// Names bound by a declarator list. `None` for destructuring patterns and
  /// initializers that cannot be followed to their end.
  fn declarators(&mut self) -> Option<Vec<String>> {
    let mut names = vec![self.ident()?];
    while self.skip_initializer()? {
      names.push(self.ident()?);
    }
    Some(names)
  }

  /// Move past the rest of one declarator. `Some(true)` when a top-level `,`
  /// introduces another one, `Some(false)` at the end of the statement.
  fn skip_initializer(&mut self) -> Option<bool> {
    let bytes = self.src.as_bytes();
    let mut depth = 0usize;
    // Whether the last significant byte was an operator awaiting an operand.
    let mut pending = false;

    while self.pos < bytes.len() {
      let b = bytes[self.pos];
      match b {
        b'/' if bytes.get(self.pos + 1) == Some(&b'/') => {
          let len = self.rest().find('\n').unwrap_or(self.rest().len());
          self.pos += len;
          continue;
        }
        b'/' if bytes.get(self.pos + 1) == Some(&b'*') => {
          let end = self.rest()[2..].find("*/")?;
          self.pos += end + 4;
          continue;
        }
        b'\'' | b'"' => {
          self.pos = quoted_end(bytes, self.pos)?;
          pending = false;
        }
        b'`' => {
          self.pos = template_end(bytes, self.pos)?;
          pending = false;
        }
        b'/' if regex_allowed(&bytes[..self.pos]) => match regex_end(bytes, self.pos) {
          Some(end) => {
            self.pos = end;
            pending = false;
          }
          None => pending = true,
        },
        b'(' | b'[' | b'{' => {
          depth += 1;
          pending = true;
        }
        b')' | b']' | b'}' if depth == 0 => return Some(false),
        b')' | b']' | b'}' => {
          depth -= 1;
          pending = false;
        }
        b',' if depth == 0 => {
          self.pos += 1;
          return Some(true);
        }
        b';' if depth == 0 => return Some(false),
        b'\n' if depth == 0 && !pending => {
          self.pos += 1;
          self.skip_trivia();
          let rest = self.rest().as_bytes();
          match rest.first() {
            Some(b',') => {
              self.pos += 1;
              return Some(true);
            }
            // A leading binary operator continues the expression.
            Some(c) if LEADING_CONTINUATION.contains(c) && !rest.starts_with(b"++") && !rest.starts_with(b"--") => {
              continue;
            }
            _ => return Some(false),
          }
        }
        b if b.is_ascii_whitespace() => {}
        b => pending = CONTINUATION.contains(&b),
      }
      self.pos += 1;
    }

    Some(false)
  }

  /// Match `async? function *? NAME` or `class NAME`, restoring the cursor.
  fn declared_name(&mut self) -> Option<String> {
    let save = self.pos;
    let name = self.declared_name_inner();
    self.pos = save;
    name
  }

  fn declared_name_inner(&mut self) -> Option<String> {
    if self.eat_keyword("class") {
      return self.ident().filter(|n| n != "extends");
    }
    self.eat_keyword("async");
    if !self.eat_keyword("function") {
      return None;
    }
    self.eat('*');
    self.ident()
  }
}
