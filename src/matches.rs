use std::fmt;
use std::ops::Index;
use std::slice;

/// A single captured replacement field: an identifier and the request
/// substring bound to it.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Capture {
  id: String,
  value: String,
}

/// The captures produced by a successful lookup, in pattern order.
///
/// For plain and optional fields the value is a single segment (the empty
/// string for an absent optional). For plus and star fields it is the
/// matched segments joined by `/` (empty for a star that consumed nothing).
///
/// ```rust
/// use road_core::{Matches, Router};
///
/// # fn main() -> Result<(), road_core::InsertError> {
/// let mut router = Router::new();
/// router.insert("/games/{gameId}", ())?;
///
/// let mut matches = Matches::new();
/// router.find_path("/games/42", &mut matches);
///
/// assert_eq!(matches.get("gameId"), Some("42"));
/// assert_eq!(&matches[0], "42");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Matches {
  captures: Vec<Capture>,
}

impl Matches {
  pub fn new() -> Self {
    Matches::default()
  }

  /// Returns the value bound to the first capture with the given id.
  pub fn get(&self, id: &str) -> Option<&str> {
    self
      .captures
      .iter()
      .find(|capture| capture.id == id)
      .map(|capture| capture.value.as_str())
  }

  /// The number of captures.
  pub fn len(&self) -> usize {
    self.captures.len()
  }

  pub fn is_empty(&self) -> bool {
    self.captures.is_empty()
  }

  /// Iterates over `(id, value)` pairs in capture order.
  pub fn iter(&self) -> Iter<'_> {
    Iter {
      inner: self.captures.iter(),
    }
  }

  /// Removes every capture. The router calls this before a lookup and again
  /// when the lookup does not match.
  pub fn clear(&mut self) {
    self.captures.clear();
  }

  pub(crate) fn push(&mut self, id: &str, value: String) {
    self.captures.push(Capture {
      id: id.to_owned(),
      value,
    });
  }

  pub(crate) fn truncate(&mut self, len: usize) {
    self.captures.truncate(len);
  }
}

impl Index<usize> for Matches {
  type Output = str;

  fn index(&self, pos: usize) -> &Self::Output {
    &self.captures[pos].value
  }
}

impl Index<&str> for Matches {
  type Output = str;

  /// # Panics
  ///
  /// Panics if no capture with the given id exists. Use [`Matches::get`] for
  /// a fallible lookup.
  fn index(&self, id: &str) -> &Self::Output {
    self
      .get(id)
      .unwrap_or_else(|| panic!("no capture for field '{}'", id))
  }
}

/// An iterator over the `(id, value)` pairs of a [`Matches`].
pub struct Iter<'m> {
  inner: slice::Iter<'m, Capture>,
}

impl<'m> Iterator for Iter<'m> {
  type Item = (&'m str, &'m str);

  fn next(&mut self) -> Option<Self::Item> {
    self
      .inner
      .next()
      .map(|capture| (capture.id.as_str(), capture.value.as_str()))
  }
}

impl<'m> IntoIterator for &'m Matches {
  type Item = (&'m str, &'m str);
  type IntoIter = Iter<'m>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl fmt::Display for Matches {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (id, value) in self {
      if !first {
        f.write_str(", ")?;
      }
      write!(f, "{}={}", id, value)?;
      first = false;
    }
    Ok(())
  }
}
