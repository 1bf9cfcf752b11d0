use serde_json::Value;

/// One step of a reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Key(String),
  Index(usize),
}

fn is_key_char(c: char) -> bool {
  c != '.' && c != '['
}

/// Parse a reference expression such as `a.b[0]["c d"]`.
///
/// Returns `None` for malformed expressions. The first segment is always a
/// key: the root name.
pub fn parse_path(expr: &str) -> Option<Vec<Segment>> {
  let expr = expr.trim();
  let root_end = expr.find(|c| !is_key_char(c)).unwrap_or(expr.len());
  let root = &expr[..root_end];
  if root.is_empty() {
    return None;
  }

  let mut segments = vec![Segment::Key(root.to_string())];
  let mut rest = &expr[root_end..];

  while let Some(c) = rest.chars().next() {
    match c {
      '.' => {
        let tail = &rest[1..];
        let end = tail.find(|c| !is_key_char(c)).unwrap_or(tail.len());
        if end == 0 {
          return None;
        }
        segments.push(Segment::Key(tail[..end].to_string()));
        rest = &tail[end..];
      }
      '[' => {
        let close = rest.find(']')?;
        segments.push(parse_bracket(rest[1..close].trim())?);
        rest = &rest[close + 1..];
      }
      _ => return None,
    }
  }

  Some(segments)
}

fn parse_bracket(inner: &str) -> Option<Segment> {
  for quote in ['"', '\''] {
    if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
      return Some(Segment::Key(inner[1..inner.len() - 1].to_string()));
    }
  }
  inner.parse().ok().map(Segment::Index)
}

/// The root name of a reference expression.
pub fn root_name(expr: &str) -> Option<String> {
  match parse_path(expr)?.into_iter().next()? {
    Segment::Key(root) => Some(root),
    Segment::Index(_) => None,
  }
}

/// Follow `segments` from `value`.
///
/// When the path continues into a string holding a JSON object or array, the
/// string is parsed and traversal continues into it.
pub(crate) fn walk(value: &Value, segments: &[Segment]) -> Option<Value> {
  let Some((segment, tail)) = segments.split_first() else {
    return Some(value.clone());
  };

  match (value, segment) {
    (Value::Object(map), Segment::Key(key)) => walk(map.get(key)?, tail),
    (Value::Array(items), Segment::Index(index)) => walk(items.get(*index)?, tail),
    (Value::String(text), _) => {
      let parsed: Value = serde_json::from_str(text).ok()?;
      if parsed.is_object() || parsed.is_array() {
        walk(&parsed, segments)
      } else {
        None
      }
    }
    _ => None,
  }
}
