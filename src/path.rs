//! Pattern path normalization.
//!
//! Patterns are normalized once, at registration time. The following rules
//! are applied:
//!  1. Leading and trailing slashes are removed.
//!  2. Multiple slashes collapse into a single slash.
//!  3. Each `.` path element is eliminated.
//!  4. Each inner `..` element is eliminated along with the non-`..`
//!     element that precedes it; `..` elements that would climb past the
//!     root simply vanish.
//!
//! The result of normalizing the root path is the empty string.
//!
//! Request paths are *not* normalized here; the lookup side receives
//! whatever segments the caller hands it.

/// Returns the canonical form of a pattern path.
pub fn normalize(path: &str) -> String {
  let mut segments: Vec<&str> = Vec::new();

  for seg in path.split('/') {
    match seg {
      "" | "." => {}
      ".." => {
        segments.pop();
      }
      _ => segments.push(seg),
    }
  }

  segments.join("/")
}

/// Percent-decodes one request segment.
///
/// Valid `%XX` triplets are replaced by the byte they encode; anything else
/// passes through as written. This is the same decoding applied to literal
/// pattern segments at registration, so the two sides compare equal.
pub fn decode(seg: &str) -> String {
  let bytes = seg.as_bytes();
  let mut decoded = Vec::with_capacity(bytes.len());
  let mut i = 0;

  while i < bytes.len() {
    if bytes[i] == b'%' {
      let hi = bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16));
      let lo = bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16));
      if let (Some(hi), Some(lo)) = (hi, lo) {
        decoded.push((hi * 16 + lo) as u8);
        i += 3;
        continue;
      }
    }
    decoded.push(bytes[i]);
    i += 1;
  }

  String::from_utf8_lossy(&decoded).into_owned()
}

/// Splits a request path into decoded segments, skipping empty ones.
pub fn split(path: &str) -> Vec<String> {
  path
    .split('/')
    .filter(|seg| !seg.is_empty())
    .map(decode)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  // path, result
  fn normalize_tests() -> Vec<(&'static str, &'static str)> {
    vec![
      // Already clean
      ("", ""),
      ("/", ""),
      ("/abc", "abc"),
      ("/a/b/c", "a/b/c"),
      ("abc", "abc"),
      // Remove trailing slash
      ("/abc/", "abc"),
      ("/a/b/c/", "a/b/c"),
      // Remove doubled slash
      ("//", ""),
      ("/abc//", "abc"),
      ("/abc//def//ghi", "abc/def/ghi"),
      ("//abc", "abc"),
      ("///abc", "abc"),
      // Remove . elements
      (".", ""),
      ("./", ""),
      ("/abc/./def", "abc/def"),
      ("/./abc/def", "abc/def"),
      ("/abc/.", "abc"),
      // Remove .. elements
      ("..", ""),
      ("../", ""),
      ("../../", ""),
      ("../../abc", "abc"),
      ("/abc/def/ghi/../jkl", "abc/def/jkl"),
      ("/abc/def/../ghi/../jkl", "abc/jkl"),
      ("/abc/def/..", "abc"),
      ("/abc/def/../..", ""),
      ("/abc/def/../../..", ""),
      ("/abc/def/../../../ghi/jkl/../../../mno", "mno"),
      // Combinations
      ("abc/./../def", "def"),
      ("abc//./../def", "def"),
      ("abc/../../././../def", "def"),
    ]
  }

  #[test]
  fn test_normalize() {
    for (path, expected) in normalize_tests() {
      assert_eq!(normalize(path), expected, "{}", path);
      // normalization is idempotent
      assert_eq!(normalize(expected), expected, "{}", expected);
    }
  }

  #[test]
  fn test_decode() {
    assert_eq!(decode("plain"), "plain");
    assert_eq!(decode("a%20b"), "a b");
    assert_eq!(decode("%D0%B8%D0%B3%D1%80%D1%8B"), "игры");
    // malformed triplets pass through
    assert_eq!(decode("100%"), "100%");
    assert_eq!(decode("%zz"), "%zz");
  }

  #[test]
  fn test_split() {
    assert_eq!(split("/games/42"), vec!["games", "42"]);
    assert_eq!(split("/games//42/"), vec!["games", "42"]);
    assert_eq!(split("/"), Vec::<String>::new());
    assert_eq!(split(""), Vec::<String>::new());
    assert_eq!(split("/a%2Fb"), vec!["a/b"]);
  }
}
