//! The resource tree: a trie whose edges are labelled with pattern segments.
//!
//! Every registered pattern is a root-to-leaf path through the tree; the
//! leaf owns the payload. A node's children are kept sorted by the segment
//! order (literals first, then fields by modifier), which makes the search
//! deterministic: static routes are tried before dynamic ones, longer
//! variadic spans before shorter ones, and a consuming optional before a
//! skipping one. The first terminal found under that order wins.
//!
//! Nodes live in a contiguous pool and refer to each other by index, so
//! parent links are plain back-references instead of owning cycles. Nodes
//! are never removed and indices stay stable for the lifetime of the tree.

use std::any::Any;

use crate::error::InsertError;
use crate::matches::Matches;
use crate::path;
use crate::segment::{parse_pattern, Modifier, SegmentPattern};

/// An owned, type-erased payload. The tree never inspects it; the typed
/// [`Router`](crate::Router) facade downcasts it back on lookup.
pub type Payload = Box<dyn Any + Send + Sync>;

struct ResourceNode {
  /// The edge label from the parent. The root's label is never read.
  seg: SegmentPattern,
  parent: Option<usize>,
  /// Child indices, sorted by the children's segment order.
  children: Vec<usize>,
  payload: Option<Payload>,
  /// The normalized pattern terminating here, kept for nodes with a payload.
  pattern: Option<String>,
}

impl ResourceNode {
  fn new(seg: SegmentPattern, parent: Option<usize>) -> Self {
    ResourceNode {
      seg,
      parent,
      children: Vec::new(),
      payload: None,
      pattern: None,
    }
  }
}

/// The segment trie mapping registered patterns to payloads.
pub struct ResourceTree {
  nodes: Vec<ResourceNode>,
}

impl Default for ResourceTree {
  fn default() -> Self {
    ResourceTree {
      nodes: vec![ResourceNode::new(SegmentPattern::Literal(String::new()), None)],
    }
  }
}

impl ResourceTree {
  pub fn new() -> Self {
    ResourceTree::default()
  }

  /// The number of nodes in the pool, root included.
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Registers `pattern`, extending the tree so the pattern's segment
  /// sequence is a root-to-leaf path, and attaches the payload to the leaf.
  ///
  /// The pattern is normalized first (see [`path::normalize`]). On any
  /// grammar error the tree is left untouched. Registering a pattern twice
  /// replaces the payload: later registrations win.
  pub fn insert(&mut self, pattern: &str, payload: Payload) -> Result<(), InsertError> {
    let normalized = path::normalize(pattern);
    // parse completely before touching the tree
    let segments = parse_pattern(&normalized)?;

    let mut cur = 0;
    for seg in segments {
      let found = self.nodes[cur]
        .children
        .binary_search_by(|&child| self.nodes[child].seg.cmp(&seg));
      cur = match found {
        Ok(pos) => self.nodes[cur].children[pos],
        Err(pos) => {
          let child = self.nodes.len();
          self.nodes.push(ResourceNode::new(seg, Some(cur)));
          self.nodes[cur].children.insert(pos, child);
          child
        }
      };
    }

    let node = &mut self.nodes[cur];
    node.payload = Some(payload);
    node.pattern = Some(normalized);
    Ok(())
  }

  /// Walks the tree driven by the request segments and returns the payload
  /// of the unique matching pattern, filling `matches` with the field
  /// captures in pattern order. On no-match, `matches` is left empty.
  pub fn find<'t>(&'t self, segments: &[&str], matches: &mut Matches) -> Option<&'t Payload> {
    matches.clear();
    match self.try_match(segments, 0, matches) {
      Some(node) => self.nodes[node].payload.as_ref(),
      None => {
        matches.clear();
        None
      }
    }
  }

  /// Recursive descent with ordered backtracking. Returns the index of a
  /// terminal node carrying a payload, or `None` when every branch fails.
  fn try_match(&self, mut segs: &[&str], mut cur: usize, caps: &mut Matches) -> Option<usize> {
    loop {
      let node = &self.nodes[cur];

      let Some((&s, rest)) = segs.split_first() else {
        if node.payload.is_some() {
          return Some(cur);
        }
        // the input is exhausted, but an optional or star edge below can
        // still match nothing
        for &child in &node.children {
          if let SegmentPattern::Field {
            modifier: Modifier::Optional | Modifier::Star,
            ..
          } = self.nodes[child].seg
          {
            let mark = caps.len();
            self.bind(child, String::new(), caps);
            if let Some(found) = self.try_match(segs, child, caps) {
              return Some(found);
            }
            caps.truncate(mark);
          }
        }
        return None;
      };

      // When exactly one child can take `s` and it consumes exactly one
      // segment, there is nothing to branch over: descend in place.
      let mut candidates = node
        .children
        .iter()
        .filter(|&&child| self.nodes[child].seg.matches(s));
      if let (Some(&only), None) = (candidates.next(), candidates.next()) {
        match &self.nodes[only].seg {
          SegmentPattern::Literal(_) => {
            cur = only;
            segs = rest;
            continue;
          }
          SegmentPattern::Field {
            modifier: Modifier::None,
            ..
          } => {
            self.bind(only, s.to_owned(), caps);
            cur = only;
            segs = rest;
            continue;
          }
          // optional and variadic fields enumerate alternatives below
          SegmentPattern::Field { .. } => {}
        }
      }

      // Children are sorted, so this tries literals before fields and
      // fields in modifier order.
      for &child in &node.children {
        let mark = caps.len();
        match &self.nodes[child].seg {
          SegmentPattern::Literal(text) => {
            if text != s {
              continue;
            }
            if let Some(found) = self.try_match(rest, child, caps) {
              return Some(found);
            }
          }
          SegmentPattern::Field { modifier, .. } => match modifier {
            Modifier::None => {
              self.bind(child, s.to_owned(), caps);
              if let Some(found) = self.try_match(rest, child, caps) {
                return Some(found);
              }
              caps.truncate(mark);
            }
            Modifier::Optional => {
              // consume one segment, then retry consuming none
              self.bind(child, s.to_owned(), caps);
              if let Some(found) = self.try_match(rest, child, caps) {
                return Some(found);
              }
              caps.truncate(mark);
              self.bind(child, String::new(), caps);
              if let Some(found) = self.try_match(segs, child, caps) {
                return Some(found);
              }
              caps.truncate(mark);
            }
            Modifier::Plus => {
              for take in (1..=segs.len()).rev() {
                self.bind(child, segs[..take].join("/"), caps);
                if let Some(found) = self.try_match(&segs[take..], child, caps) {
                  return Some(found);
                }
                caps.truncate(mark);
              }
            }
            Modifier::Star => {
              // longest span first, the empty span last
              for take in (1..=segs.len()).rev() {
                self.bind(child, segs[..take].join("/"), caps);
                if let Some(found) = self.try_match(&segs[take..], child, caps) {
                  return Some(found);
                }
                caps.truncate(mark);
              }
              self.bind(child, String::new(), caps);
              if let Some(found) = self.try_match(segs, child, caps) {
                return Some(found);
              }
              caps.truncate(mark);
            }
          },
        }
      }
      return None;
    }
  }

  fn bind(&self, node: usize, value: String, caps: &mut Matches) {
    if let SegmentPattern::Field { id, .. } = &self.nodes[node].seg {
      // anonymous fields match but record nothing
      if !id.is_empty() {
        caps.push(id, value);
      }
    }
  }

  /// Validates the structural invariants of the node pool. Used by tests.
  #[doc(hidden)]
  pub fn check_invariants(&self) -> Result<(), String> {
    let root = self
      .nodes
      .first()
      .ok_or_else(|| "node pool is empty".to_owned())?;
    if root.parent.is_some() {
      return Err("root has a parent".to_owned());
    }

    for (idx, node) in self.nodes.iter().enumerate() {
      for pair in node.children.windows(2) {
        if self.nodes[pair[0]].seg >= self.nodes[pair[1]].seg {
          return Err(format!("children of node {} are not in ascending order", idx));
        }
      }
      for &child in &node.children {
        if self.nodes[child].parent != Some(idx) {
          return Err(format!("node {} does not point back to its parent {}", child, idx));
        }
      }
      if node.payload.is_some() != node.pattern.is_some() {
        return Err(format!("node {} payload and pattern are out of step", idx));
      }
    }

    for idx in 1..self.nodes.len() {
      let parent = self.nodes[idx].parent.ok_or(format!("node {} has no parent", idx))?;
      let links = self.nodes[parent]
        .children
        .iter()
        .filter(|&&child| child == idx)
        .count();
      if links != 1 {
        return Err(format!("node {} appears {} times among its parent's children", idx, links));
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tree_with(routes: &[&str]) -> ResourceTree {
    let mut tree = ResourceTree::new();
    for route in routes {
      tree.insert(route, Box::new(route.to_string())).unwrap();
    }
    tree.check_invariants().unwrap();
    tree
  }

  fn lookup<'t>(tree: &'t ResourceTree, segs: &[&str], matches: &mut Matches) -> Option<&'t str> {
    tree
      .find(segs, matches)
      .and_then(|payload| payload.downcast_ref::<String>())
      .map(String::as_str)
  }

  #[test]
  fn insert_root_route() {
    let tree = tree_with(&["/root"]);
    // the pool holds the root plus one literal node
    assert_eq!(tree.node_count(), 2);
  }

  #[test]
  fn insert_child_route() {
    let tree = tree_with(&["/root", "/root/child"]);
    assert_eq!(tree.node_count(), 3);
  }

  #[test]
  fn insert_shares_prefixes() {
    let tree = tree_with(&["/a/b/c", "/a/b/d", "/a/x"]);
    // root, a, b, c, d, x
    assert_eq!(tree.node_count(), 6);
  }

  #[test]
  fn update_existing_route() {
    let mut tree = ResourceTree::new();
    tree.insert("/root", Box::new("resource1".to_string())).unwrap();
    tree.insert("/root", Box::new("resource2".to_string())).unwrap();

    assert_eq!(tree.node_count(), 2);
    let mut matches = Matches::new();
    assert_eq!(lookup(&tree, &["root"], &mut matches), Some("resource2"));
  }

  #[test]
  fn malformed_insert_leaves_tree_unmodified() {
    let mut tree = ResourceTree::new();
    tree.insert("/a", Box::new(1u32)).unwrap();
    let before = tree.node_count();

    assert!(tree.insert("/a/{bad", Box::new(2u32)).is_err());
    assert!(tree.insert("/a/{x}/{x}", Box::new(3u32)).is_err());
    assert_eq!(tree.node_count(), before);
    tree.check_invariants().unwrap();
  }

  #[test]
  fn root_pattern() {
    let tree = tree_with(&["/"]);
    assert_eq!(tree.node_count(), 1);
    let mut matches = Matches::new();
    assert_eq!(lookup(&tree, &[], &mut matches), Some("/"));
  }

  #[test]
  fn siblings_stay_sorted() {
    // inserted in an order that exercises every insertion position
    let tree = tree_with(&[
      "/m/x",
      "/{rest*}",
      "/a/y",
      "/{id}",
      "/z/z",
      "/{opt?}",
      "/{plus+}",
    ]);
    tree.check_invariants().unwrap();

    // literal beats every field shape
    let mut matches = Matches::new();
    assert_eq!(lookup(&tree, &["a", "y"], &mut matches), Some("/a/y"));
    assert_eq!(lookup(&tree, &["q"], &mut matches), Some("/{id}"));
    assert_eq!(matches.get("id"), Some("q"));
  }

  #[test]
  fn same_shape_fields_share_a_node() {
    let mut tree = ResourceTree::new();
    tree.insert("/a/{x}", Box::new("first".to_string())).unwrap();
    tree.insert("/a/{y}", Box::new("second".to_string())).unwrap();

    // the second field reuses the first one's slot
    assert_eq!(tree.node_count(), 3);

    let mut matches = Matches::new();
    assert_eq!(lookup(&tree, &["a", "1"], &mut matches), Some("second"));
    // captures bind under the id stored on the edge
    assert_eq!(matches.get("x"), Some("1"));
  }

  #[test]
  fn no_captures_left_behind_on_failure() {
    let tree = tree_with(&["/{a}/{b}/end"]);
    let mut matches = Matches::new();

    assert_eq!(lookup(&tree, &["1", "2", "nope"], &mut matches), None);
    assert!(matches.is_empty());
  }

  #[test]
  fn backtracks_across_variadic_spans() {
    let tree = tree_with(&["/a/{rest*}/z"]);
    let mut matches = Matches::new();

    assert_eq!(
      lookup(&tree, &["a", "1", "2", "z"], &mut matches),
      Some("/a/{rest*}/z")
    );
    assert_eq!(matches.get("rest"), Some("1/2"));

    // the star also matches nothing at all
    assert_eq!(lookup(&tree, &["a", "z"], &mut matches), Some("/a/{rest*}/z"));
    assert_eq!(matches.get("rest"), Some(""));
  }

  #[test]
  fn literal_wins_over_star_span() {
    let tree = tree_with(&["/a/{rest*}", "/a/b/c"]);
    let mut matches = Matches::new();

    assert_eq!(lookup(&tree, &["a", "b", "c"], &mut matches), Some("/a/b/c"));
    assert!(matches.is_empty());

    assert_eq!(lookup(&tree, &["a", "b", "d"], &mut matches), Some("/a/{rest*}"));
    assert_eq!(matches.get("rest"), Some("b/d"));
  }

  #[test]
  fn anonymous_field_records_nothing() {
    let tree = tree_with(&["/files/{}/{name}"]);
    let mut matches = Matches::new();

    assert_eq!(
      lookup(&tree, &["files", "2024", "report"], &mut matches),
      Some("/files/{}/{name}")
    );
    assert_eq!(matches.len(), 1);
    assert_eq!(matches.get("name"), Some("report"));
  }
}
