//! Comment and whitespace stripping for production output.
//!
//! Deliberately conservative: script stripping only removes comments that
//! start a line, and never touches lines inside template literals or block
//! comments that started mid-line. `/*!` comments are preserved.

use crate::util::lex::{LexState, lex_line};

/// Strip whole-line comments, trailing whitespace and blank lines from a script.
pub fn strip_script(code: &str) -> String {
  let mut out = String::with_capacity(code.len());
  let mut state = LexState::Code;
  let mut in_stripped_comment = false;

  for raw in code.lines() {
    let mut line = raw;

    if in_stripped_comment {
      match line.find("*/") {
        Some(end) => {
          in_stripped_comment = false;
          line = &line[end + 2..];
        }
        None => continue,
      }
    }

    if state != LexState::Code {
      out.push_str(line);
      out.push('\n');
      state = lex_line(line, state);
      continue;
    }

    let trimmed = line.trim_start();
    if trimmed.starts_with("//") {
      continue;
    }
    if trimmed.starts_with("/*") && !trimmed.starts_with("/*!") {
      match trimmed[2..].find("*/") {
        Some(end) => line = &trimmed[end + 4..],
        None => {
          in_stripped_comment = true;
          continue;
        }
      }
    }

    let next = lex_line(line, state);
    // Trailing whitespace before an open template literal belongs to the literal.
    let kept = if next == LexState::Template { line } else { line.trim_end() };
    if kept.trim_start().is_empty() {
      continue;
    }
    out.push_str(kept);
    out.push('\n');
    state = next;
  }

  out
}

/// Strip every comment outside string literals, trailing whitespace and blank lines from a stylesheet.
pub fn strip_style(css: &str) -> String {
  let mut without_comments = String::with_capacity(css.len());
  let mut chars = css.char_indices().peekable();
  let mut quote: Option<char> = None;

  while let Some((i, c)) = chars.next() {
    if let Some(q) = quote {
      without_comments.push(c);
      if c == '\\' {
        if let Some((_, escaped)) = chars.next() {
          without_comments.push(escaped);
        }
      } else if c == q {
        quote = None;
      }
      continue;
    }

    match c {
      '"' | '\'' => {
        quote = Some(c);
        without_comments.push(c);
      }
      '/' if css[i + 1..].starts_with('*') => match css[i + 2..].find("*/") {
        Some(end) => {
          let resume = i + 2 + end + 2;
          while chars.peek().is_some_and(|(j, _)| *j < resume) {
            chars.next();
          }
        }
        None => break,
      },
      _ => without_comments.push(c),
    }
  }

  let mut out = String::with_capacity(without_comments.len());
  for line in without_comments.lines() {
    let kept = line.trim_end();
    if !kept.trim_start().is_empty() {
      out.push_str(kept);
      out.push('\n');
    }
  }
  out
}
