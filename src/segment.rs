use std::cmp::Ordering;
use std::fmt;

use crate::error::InsertError;

/// Controls how many request segments a replacement field consumes.
///
/// The declaration order doubles as the search priority among sibling
/// fields: `None < Optional < Plus < Star`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Modifier {
  /// `{id}` — exactly one segment.
  None,
  /// `{id?}` — one segment or none.
  Optional,
  /// `{id+}` — one or more segments.
  Plus,
  /// `{id*}` — zero or more segments.
  Star,
}

/// One compiled segment of a path pattern: either a literal byte string or a
/// replacement field.
///
/// Two fields with different identifiers but the same modifier are *equal*:
/// they occupy the same slot in the tree, so the identifier never takes part
/// in comparisons.
#[derive(Clone, Debug)]
pub enum SegmentPattern {
  /// A literal segment, stored percent-decoded.
  Literal(String),
  /// A replacement field. An empty `id` is an anonymous field (`{}`), which
  /// matches like any other field but records no capture.
  Field { id: String, modifier: Modifier },
}

impl SegmentPattern {
  /// Returns `true` if the given request segment can be bound to this
  /// pattern segment. Fields match any segment.
  pub fn matches(&self, seg: &str) -> bool {
    match self {
      SegmentPattern::Literal(text) => text == seg,
      SegmentPattern::Field { .. } => true,
    }
  }

  pub fn is_literal(&self) -> bool {
    matches!(self, SegmentPattern::Literal(_))
  }

  /// The field modifier, if this is a field.
  pub fn modifier(&self) -> Option<Modifier> {
    match self {
      SegmentPattern::Literal(_) => None,
      SegmentPattern::Field { modifier, .. } => Some(*modifier),
    }
  }
}

impl Ord for SegmentPattern {
  fn cmp(&self, other: &Self) -> Ordering {
    use SegmentPattern::*;
    match (self, other) {
      (Literal(a), Literal(b)) => a.as_bytes().cmp(b.as_bytes()),
      (Literal(_), Field { .. }) => Ordering::Less,
      (Field { .. }, Literal(_)) => Ordering::Greater,
      (Field { modifier: a, .. }, Field { modifier: b, .. }) => a.cmp(b),
    }
  }
}

impl PartialOrd for SegmentPattern {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for SegmentPattern {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for SegmentPattern {}

impl fmt::Display for SegmentPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SegmentPattern::Literal(text) => f.write_str(text),
      SegmentPattern::Field { id, modifier } => {
        let modifier = match modifier {
          Modifier::None => "",
          Modifier::Optional => "?",
          Modifier::Plus => "+",
          Modifier::Star => "*",
        };
        write!(f, "{{{}{}}}", id, modifier)
      }
    }
  }
}

/// Parses one segment of an already normalized pattern.
pub(crate) fn parse_segment(seg: &str) -> Result<SegmentPattern, InsertError> {
  if let Some(rest) = seg.strip_prefix('{') {
    let inner = rest
      .strip_suffix('}')
      .ok_or_else(|| InsertError::malformed(seg))?;
    if inner.contains('{') || inner.contains('}') {
      return Err(InsertError::malformed(seg));
    }
    let (id, modifier) = match inner.as_bytes().last() {
      Some(b'?') => (&inner[..inner.len() - 1], Modifier::Optional),
      Some(b'*') => (&inner[..inner.len() - 1], Modifier::Star),
      Some(b'+') => (&inner[..inner.len() - 1], Modifier::Plus),
      _ => (inner, Modifier::None),
    };
    if !valid_id(id) {
      return Err(InsertError::malformed(seg));
    }
    return Ok(SegmentPattern::Field {
      id: id.to_owned(),
      modifier,
    });
  }
  if seg.contains('{') || seg.contains('}') {
    return Err(InsertError::malformed(seg));
  }
  Ok(SegmentPattern::Literal(decode_literal(seg)?))
}

/// Parses a normalized pattern into its segment sequence, rejecting duplicate
/// named fields and more than one variadic field per pattern.
pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<SegmentPattern>, InsertError> {
  if pattern.is_empty() {
    return Ok(Vec::new());
  }

  let mut segments: Vec<SegmentPattern> = Vec::new();
  let mut variadics = 0;

  for seg in pattern.split('/') {
    let parsed = parse_segment(seg)?;
    if let SegmentPattern::Field { id, modifier } = &parsed {
      if matches!(modifier, Modifier::Star | Modifier::Plus) {
        variadics += 1;
        if variadics > 1 {
          return Err(InsertError::DuplicateVariadic);
        }
      }
      // anonymous fields never collide
      if !id.is_empty() {
        let seen = segments.iter().any(|s| match s {
          SegmentPattern::Field { id: other, .. } => other == id,
          SegmentPattern::Literal(_) => false,
        });
        if seen {
          return Err(InsertError::DuplicateField { id: id.clone() });
        }
      }
    }
    segments.push(parsed);
  }

  Ok(segments)
}

// id := ALPHA (ALPHA | DIGIT | "_")*
fn valid_id(id: &str) -> bool {
  let mut bytes = id.bytes();
  match bytes.next() {
    None => true,
    Some(first) if first.is_ascii_alphabetic() => {
      bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
    }
    Some(_) => false,
  }
}

// pchar as in RFC 3986: unreserved / pct-encoded / sub-delims / ":" / "@"
fn is_pchar(b: u8) -> bool {
  b.is_ascii_alphanumeric()
    || matches!(
      b,
      b'-'
        | b'.'
        | b'_'
        | b'~'
        | b'!'
        | b'$'
        | b'&'
        | b'\''
        | b'('
        | b')'
        | b'*'
        | b'+'
        | b','
        | b';'
        | b'='
        | b':'
        | b'@'
    )
}

fn decode_literal(seg: &str) -> Result<String, InsertError> {
  let bytes = seg.as_bytes();
  let mut decoded = Vec::with_capacity(bytes.len());
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'%' => {
        let hi = bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16));
        let lo = bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16));
        match (hi, lo) {
          (Some(hi), Some(lo)) => {
            decoded.push((hi * 16 + lo) as u8);
            i += 3;
          }
          _ => return Err(InsertError::malformed(seg)),
        }
      }
      b if is_pchar(b) => {
        decoded.push(b);
        i += 1;
      }
      b if !b.is_ascii() => {
        // multibyte characters pass through as written
        decoded.push(b);
        i += 1;
      }
      _ => return Err(InsertError::malformed(seg)),
    }
  }

  String::from_utf8(decoded).map_err(|_| InsertError::malformed(seg))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn literal(text: &str) -> SegmentPattern {
    SegmentPattern::Literal(text.to_owned())
  }

  fn field(id: &str, modifier: Modifier) -> SegmentPattern {
    SegmentPattern::Field {
      id: id.to_owned(),
      modifier,
    }
  }

  #[test]
  fn literal_match() {
    let pattern = parse_segment("test").unwrap();
    assert!(pattern.matches("test"));
    assert!(!pattern.matches("anything"));
    assert!(!pattern.matches("Test"));
  }

  #[test]
  fn field_matches_anything() {
    let pattern = parse_segment("{test}").unwrap();
    assert!(pattern.matches("anything"));
    assert!(pattern.matches(""));
  }

  #[test]
  fn parse_fields() {
    assert_eq!(parse_segment("{id}").unwrap(), field("id", Modifier::None));
    assert_eq!(
      parse_segment("{id?}").unwrap(),
      field("id", Modifier::Optional)
    );
    assert_eq!(parse_segment("{id+}").unwrap(), field("id", Modifier::Plus));
    assert_eq!(parse_segment("{id*}").unwrap(), field("id", Modifier::Star));
    // anonymous fields
    assert_eq!(parse_segment("{}").unwrap(), field("", Modifier::None));
    assert_eq!(parse_segment("{*}").unwrap(), field("", Modifier::Star));
  }

  #[test]
  fn parse_malformed() {
    for seg in [
      "{id", "id}", "{id}}", "{{id}", "{1abc}", "{ab-c}", "{id}x", "x{id}", "a{b", "%zz", "%4",
      "a b", "{id!}",
    ] {
      assert_eq!(
        parse_segment(seg),
        Err(InsertError::malformed(seg)),
        "{}",
        seg
      );
    }
  }

  #[test]
  fn percent_decoding() {
    assert_eq!(parse_segment("a%20b").unwrap(), literal("a b"));
    assert_eq!(parse_segment("%D0%B8%D0%B3%D1%80%D1%8B").unwrap(), literal("игры"));
    assert_eq!(parse_segment("caf%C3%A9").unwrap(), literal("café"));
  }

  #[test]
  fn equality_ignores_id() {
    assert_eq!(field("a", Modifier::None), field("b", Modifier::None));
    assert_eq!(field("a", Modifier::Star), field("", Modifier::Star));
    assert_ne!(field("a", Modifier::None), field("a", Modifier::Star));
    assert_ne!(literal("a"), field("a", Modifier::None));
  }

  #[test]
  fn ordering() {
    // literals before fields, literals by bytes, fields by modifier
    let mut segments = vec![
      field("x", Modifier::Star),
      field("x", Modifier::Plus),
      field("x", Modifier::Optional),
      field("x", Modifier::None),
      literal("b"),
      literal("a"),
    ];
    segments.sort();
    assert_eq!(
      segments,
      vec![
        literal("a"),
        literal("b"),
        field("x", Modifier::None),
        field("x", Modifier::Optional),
        field("x", Modifier::Plus),
        field("x", Modifier::Star),
      ]
    );
  }

  #[test]
  fn pattern_parsing() {
    assert_eq!(parse_pattern("").unwrap(), vec![]);
    assert_eq!(
      parse_pattern("games/{gameId}").unwrap(),
      vec![literal("games"), field("gameId", Modifier::None)]
    );
    assert_eq!(
      parse_pattern("a/{x?}/{rest*}").unwrap(),
      vec![
        literal("a"),
        field("x", Modifier::Optional),
        field("rest", Modifier::Star),
      ]
    );
  }

  #[test]
  fn pattern_duplicate_field() {
    assert_eq!(
      parse_pattern("a/{x}/{x}"),
      Err(InsertError::DuplicateField { id: "x".to_owned() })
    );
    // a named and an anonymous field do not collide
    assert!(parse_pattern("a/{x}/{}").is_ok());
    assert!(parse_pattern("a/{}/{}").is_ok());
  }

  #[test]
  fn pattern_duplicate_variadic() {
    assert_eq!(
      parse_pattern("{a*}/{b+}"),
      Err(InsertError::DuplicateVariadic)
    );
    assert_eq!(
      parse_pattern("{a+}/x/{b+}"),
      Err(InsertError::DuplicateVariadic)
    );
    assert!(parse_pattern("{a?}/{b*}").is_ok());
  }
}
