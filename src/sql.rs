//! Lexical pre-scanner for `{name:Type}` parameter placeholders.
//!
//! The scanner walks a SQL string once, skipping comments and quoted
//! strings, and collects a `name -> type-string` map from every placeholder
//! in live SQL. It understands just enough lexical structure to do that:
//! `--`, `#` and `#!` line comments, non-nesting `/* ... */` block comments,
//! and single-quoted strings with `''` doubling. The type portion of a
//! placeholder may itself contain quoted strings, commas and nested
//! parentheses (`{e:Enum8('a'=1)}`), so the scanner tracks paren depth and
//! quote state until the matching `}`.

use crate::{
    Error,
    Result,
};
use std::collections::HashMap;

/// Extracts the `name -> type-string` hint map from a SQL string.
///
/// Placeholders inside comments and string literals are ignored. Duplicate
/// names must agree on their type string exactly; a disagreement is a
/// [`Error::ParameterConflict`]. An empty or placeholder-free input yields
/// an empty map.
pub fn extract_param_hints(sql: &str) -> Result<HashMap<String, String>> {
    let bytes = sql.as_bytes();
    let mut hints = HashMap::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = skip_string(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_line(bytes, i)
            }
            b'#' => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i)
            }
            b'{' => match scan_placeholder(sql, i)? {
                Some((name, type_str, end)) => {
                    if let Some(existing) =
                        hints.get(&name).filter(|t: &&String| **t != type_str)
                    {
                        return Err(Error::ParameterConflict {
                            name,
                            first: existing.clone(),
                            second: type_str,
                        });
                    }
                    hints.insert(name, type_str);
                    i = end;
                }
                // A brace with no colon is ordinary SQL text.
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    Ok(hints)
}

/// Skips a `'...'` literal with `''` doubling, returning the index after
/// the closing quote (or the end of input for an unterminated literal).
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    i
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// Skips `/* ... */`. ClickHouse block comments do not nest.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Scans a `{name:Type}` placeholder starting at the `{`.
///
/// Returns `None` when the brace has no colon before its closing brace, and
/// an error when a placeholder with a colon never closes.
fn scan_placeholder(
    sql: &str,
    start: usize,
) -> Result<Option<(String, String, usize)>> {
    let bytes = sql.as_bytes();
    let mut i = start + 1;

    // Name portion runs to the first ':'.
    let name_start = i;
    loop {
        match bytes.get(i) {
            Some(b':') => break,
            Some(b'}') | None => return Ok(None),
            Some(b'{') => return Ok(None),
            Some(_) => i += 1,
        }
    }
    let name = sql[name_start..i].trim().to_string();
    if name.is_empty() {
        return Ok(None);
    }
    i += 1;

    // Type portion runs to the matching '}' at paren depth 0 outside quotes.
    let type_start = i;
    let mut depth = 0usize;
    let mut in_quote = false;
    loop {
        match bytes.get(i) {
            None => {
                return Err(Error::parse(
                    format!("unterminated parameter placeholder '{}'", name),
                    start,
                ))
            }
            Some(b'\'') => {
                if in_quote && bytes.get(i + 1) == Some(&b'\'') {
                    i += 1;
                } else {
                    in_quote = !in_quote;
                }
            }
            Some(b'(') if !in_quote => depth += 1,
            Some(b')') if !in_quote => depth = depth.saturating_sub(1),
            Some(b'}') if !in_quote && depth == 0 => break,
            Some(_) => {}
        }
        i += 1;
    }
    let type_str = sql[type_start..i].trim().to_string();
    if type_str.is_empty() {
        return Err(Error::parse(
            format!("parameter '{}' has an empty type", name),
            start,
        ));
    }
    Ok(Some((name, type_str, i + 1)))
}
