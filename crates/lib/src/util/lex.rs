//! Line-oriented lexer state for script sources.
//!
//! Tracks just enough to know whether a line starts inside a block comment or
//! a template literal. Single- and double-quoted strings end at the line.
//! A `/` in operand position opens a regular expression literal, so quote
//! and backtick characters inside one do not change the state.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
  Code,
  BlockComment,
  Template,
}

/// Advance the lexer state across one line of code.
pub fn lex_line(line: &str, mut state: LexState) -> LexState {
  let bytes = line.as_bytes();
  let mut i = 0;
  let mut quote: Option<u8> = None;

  while i < bytes.len() {
    let b = bytes[i];
    match state {
      LexState::BlockComment => {
        if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
          state = LexState::Code;
          i += 1;
        }
      }
      LexState::Template => match b {
        b'\\' => i += 1,
        b'`' => state = LexState::Code,
        _ => {}
      },
      LexState::Code => {
        if let Some(q) = quote {
          if b == b'\\' {
            i += 1;
          } else if b == q {
            quote = None;
          }
        } else {
          match b {
            b'\'' | b'"' => quote = Some(b),
            b'`' => state = LexState::Template,
            b'/' if bytes.get(i + 1) == Some(&b'/') => break,
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
              state = LexState::BlockComment;
              i += 1;
            }
            b'/' if regex_allowed(&bytes[..i]) => {
              // An unterminated body means it was a division after all.
              if let Some(end) = regex_end(bytes, i) {
                i = end;
              }
            }
            _ => {}
          }
        }
      }
    }
    i += 1;
  }

  state
}

/// Words after which a `/` begins a regular expression rather than a division.
const REGEX_KEYWORDS: &[&str] = &[
  "await",
  "case",
  "delete",
  "do",
  "else",
  "in",
  "instanceof",
  "new",
  "of",
  "return",
  "throw",
  "typeof",
  "void",
  "yield",
];

fn is_word_byte(b: u8) -> bool {
  b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Whether a `/` preceded by `before` starts a regular expression literal.
///
/// Decided from the last significant byte: an operand (identifier, number,
/// closing bracket or string) makes it a division.
pub fn regex_allowed(before: &[u8]) -> bool {
  let before = before.trim_ascii_end();
  match before.last() {
    None => true,
    Some(&b) if is_word_byte(b) => {
      let start = before.iter().rposition(|&c| !is_word_byte(c)).map_or(0, |i| i + 1);
      let word = &before[start..];
      REGEX_KEYWORDS.iter().any(|kw| kw.as_bytes() == word)
    }
    Some(b')' | b']' | b'}' | b'\'' | b'"' | b'`') => false,
    Some(_) => true,
  }
}

/// Index of the `/` closing the regex literal opened at `open`, if it closes on this line.
pub fn regex_end(bytes: &[u8], open: usize) -> Option<usize> {
  let mut in_class = false;
  let mut i = open + 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 1,
      b'\n' | b'\r' => return None,
      b'[' => in_class = true,
      b']' => in_class = false,
      b'/' if !in_class => return Some(i),
      _ => {}
    }
    i += 1;
  }
  None
}

/// Index of the quote closing the string opened at `open`. Strings end at the line.
pub fn quoted_end(bytes: &[u8], open: usize) -> Option<usize> {
  let quote = bytes[open];
  let mut i = open + 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 1,
      b'\n' => return None,
      b if b == quote => return Some(i),
      _ => {}
    }
    i += 1;
  }
  None
}

/// Index of the backtick closing the template literal opened at `open`.
///
/// Braces inside `${ }` substitutions are balanced; nested template literals
/// inside a substitution are not supported.
pub fn template_end(bytes: &[u8], open: usize) -> Option<usize> {
  let mut substitution = 0usize;
  let mut i = open + 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 1,
      b'$' if substitution == 0 && bytes.get(i + 1) == Some(&b'{') => {
        substitution = 1;
        i += 1;
      }
      b'{' if substitution > 0 => substitution += 1,
      b'}' if substitution > 0 => substitution -= 1,
      b'`' if substitution == 0 => return Some(i),
      _ => {}
    }
    i += 1;
  }
  None
}
