use std::marker::PhantomData;

use crate::error::InsertError;
use crate::matches::Matches;
use crate::path;
use crate::tree::ResourceTree;

/// A URL path router.
///
/// This container matches request paths against registered path patterns and
/// hands back the value registered for the unique matching pattern, together
/// with the replacement-field captures.
///
/// `Router` is a thin typed facade: the tree underneath stores payloads
/// type-erased, so one tree implementation serves routers of any payload
/// type (the HTTP server keeps one `Router` per request method).
///
/// ```rust
/// use road_core::{Matches, Router};
///
/// # fn main() -> Result<(), road_core::InsertError> {
/// let mut router = Router::new();
/// router.insert("/games", "the list")?;
/// router.insert("/games/{gameId}", "one game")?;
///
/// let mut matches = Matches::new();
/// assert_eq!(router.find_path("/games/42", &mut matches), Some(&"one game"));
/// assert_eq!(matches.get("gameId"), Some("42"));
/// # Ok(())
/// # }
/// ```
pub struct Router<T> {
  tree: ResourceTree,
  _payload: PhantomData<fn() -> T>,
}

impl<T> Default for Router<T> {
  fn default() -> Self {
    Router {
      tree: ResourceTree::new(),
      _payload: PhantomData,
    }
  }
}

impl<T: Send + Sync + 'static> Router<T> {
  pub fn new() -> Self {
    Router::default()
  }

  /// Registers a pattern for `value`. Registering the same pattern again
  /// replaces the previous value.
  pub fn insert(&mut self, pattern: &str, value: T) -> Result<(), InsertError> {
    self.tree.insert(pattern, Box::new(value))
  }

  /// Matches a sequence of request segments, in the same encoding convention
  /// the patterns were registered with.
  pub fn find<'r>(&'r self, segments: &[&str], matches: &mut Matches) -> Option<&'r T> {
    self
      .tree
      .find(segments, matches)
      .and_then(|payload| payload.downcast_ref())
  }

  /// Matches a raw request path: splits it on `/`, skipping empty segments,
  /// and percent-decodes each segment before matching.
  pub fn find_path<'r>(&'r self, request_path: &str, matches: &mut Matches) -> Option<&'r T> {
    let decoded = path::split(request_path);
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
    self.find(&segments, matches)
  }

  /// The number of trie nodes behind this router, root included.
  pub fn node_count(&self) -> usize {
    self.tree.node_count()
  }

  #[doc(hidden)]
  pub fn check_invariants(&self) -> Result<(), String> {
    self.tree.check_invariants()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn typed_roundtrip() {
    let mut router: Router<u32> = Router::new();
    router.insert("/games", 7).unwrap();

    let mut matches = Matches::new();
    assert_eq!(router.find_path("/games", &mut matches), Some(&7));
    assert_eq!(router.find_path("/other", &mut matches), None);
  }

  #[test]
  fn find_decodes_request_segments() {
    let mut router = Router::new();
    router.insert("/tags/caf%C3%A9", "tag").unwrap();

    let mut matches = Matches::new();
    // both the encoded and the decoded spelling reach the same literal
    assert_eq!(router.find_path("/tags/caf%C3%A9", &mut matches), Some(&"tag"));
    assert_eq!(router.find_path("/tags/café", &mut matches), Some(&"tag"));
  }

  #[test]
  fn owned_payloads_are_dropped_with_the_router() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted(Arc<AtomicUsize>);
    impl Drop for Counted {
      fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
      }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let mut router = Router::new();
    router.insert("/a", Counted(drops.clone())).unwrap();
    // replacement frees the old payload exactly once
    router.insert("/a", Counted(drops.clone())).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    drop(router);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
  }
}
