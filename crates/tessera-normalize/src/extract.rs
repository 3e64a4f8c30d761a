//! Recovering JSON text from noisy model output.

/// Upper bound on cut points tried while repairing truncated JSON.
const MAX_REPAIR_CUTS: usize = 32;

/// Upper bound on opening brackets tried while looking for valid JSON.
const MAX_EXTRACT_CANDIDATES: usize = 16;

/// Remove wrapper markers models put around structured output.
///
/// Handles fenced code blocks (with or without a language tag, closed or
/// cut off) and `<json>...</json>` tags. Returns the trimmed inner text, or
/// the trimmed input when no wrapper is present.
pub fn strip_wrappers(raw: &str) -> &str {
  let trimmed = raw.trim();

  if let Some(inner) = strip_fence(trimmed) {
    return inner.trim();
  }
  if let Some(inner) = strip_tag(trimmed, "<json>", "</json>") {
    return inner.trim();
  }

  trimmed
}

fn strip_fence(text: &str) -> Option<&str> {
  let start = text.find("```")?;
  let after = &text[start + 3..];

  // An info string ("json", "JSON5", "") runs to the end of the fence line.
  let body = match after.find('\n') {
    Some(newline)
      if after[..newline]
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
    {
      &after[newline + 1..]
    }
    _ => after,
  };

  match body.find("```") {
    Some(end) => Some(&body[..end]),
    None => Some(body),
  }
}

fn strip_tag<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
  let start = text.find(open)? + open.len();
  let body = &text[start..];
  match body.find(close) {
    Some(end) => Some(&body[..end]),
    None => Some(body),
  }
}

/// Find the first balanced JSON object or array in `text` that parses.
///
/// Brackets inside JSON strings are ignored. Returns `None` when nothing
/// balanced and valid is present (for example when the output was cut off).
pub fn extract_json(text: &str) -> Option<&str> {
  text
    .char_indices()
    .filter(|(_, c)| *c == '{' || *c == '[')
    .take(MAX_EXTRACT_CANDIDATES)
    .find_map(|(start, _)| {
      let candidate = &text[start..];
      let end = find_matching_close(candidate)?;
      let json = &candidate[..end];
      serde_json::from_str::<serde_json::Value>(json)
        .is_ok()
        .then_some(json)
    })
}

/// Byte offset just past the bracket closing the one `s` starts with.
fn find_matching_close(s: &str) -> Option<usize> {
  let mut stack: Vec<char> = Vec::new();
  let mut in_string = false;
  let mut escape = false;

  for (i, c) in s.char_indices() {
    if in_string {
      if escape {
        escape = false;
      } else if c == '\\' {
        escape = true;
      } else if c == '"' {
        in_string = false;
      }
      continue;
    }

    match c {
      '"' => in_string = true,
      '{' => stack.push('}'),
      '[' => stack.push(']'),
      '}' | ']' => {
        if stack.pop() != Some(c) {
          return None;
        }
        if stack.is_empty() {
          return Some(i + c.len_utf8());
        }
      }
      _ => {}
    }
  }

  None
}

/// Scan state at the end of a JSON prefix.
struct Scan {
  closers: Vec<char>,
  in_string: bool,
  escape: bool,
  /// Byte offsets where the prefix can be cut and still be closable.
  cuts: Vec<usize>,
  /// Set when a closing bracket did not match.
  broken: bool,
}

fn scan(prefix: &str) -> Scan {
  let mut state = Scan {
    closers: Vec::new(),
    in_string: false,
    escape: false,
    cuts: Vec::new(),
    broken: false,
  };

  for (i, c) in prefix.char_indices() {
    if state.in_string {
      if state.escape {
        state.escape = false;
      } else if c == '\\' {
        state.escape = true;
      } else if c == '"' {
        state.in_string = false;
      }
      continue;
    }

    match c {
      '"' => state.in_string = true,
      '{' | '[' => {
        state.closers.push(if c == '{' { '}' } else { ']' });
        state.cuts.push(i + 1);
      }
      '}' | ']' => {
        if state.closers.pop() != Some(c) {
          state.broken = true;
          return state;
        }
      }
      ',' => state.cuts.push(i),
      _ => {}
    }
  }

  state
}

/// Close whatever `prefix` left open and return it if the result parses.
fn close(prefix: &str) -> Option<String> {
  let state = scan(prefix);
  if state.broken {
    return None;
  }

  let mut out = prefix.to_string();
  if state.in_string {
    if state.escape {
      out.pop();
    }
    out.push('"');
  }

  out.truncate(out.trim_end().len());
  if out.ends_with(',') {
    out.pop();
  } else if out.ends_with(':') {
    out.push_str(" null");
  }

  for closer in state.closers.iter().rev() {
    out.push(*closer);
  }

  serde_json::from_str::<serde_json::Value>(&out)
    .is_ok()
    .then_some(out)
}

/// Repair JSON that was cut off mid-stream.
///
/// Starting at the first `{` or `[`, closes an open string and every open
/// bracket. If that does not parse, progressively drops the trailing
/// element (cutting back to the previous `,` or opening bracket) and tries
/// again. Returns `None` when no prefix can be repaired.
pub fn repair_truncated(text: &str) -> Option<String> {
  let start = text.find(['{', '['])?;
  let body = &text[start..];

  if let Some(fixed) = close(body) {
    return Some(fixed);
  }

  let cuts = scan(body).cuts;
  cuts
    .iter()
    .rev()
    .take(MAX_REPAIR_CUTS)
    .find_map(|&cut| close(&body[..cut]))
}
