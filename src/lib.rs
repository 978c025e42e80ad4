#![deny(rust_2018_idioms)]

//! A small game service built around a URL path router.
//!
//! The router matches request paths against registered *path patterns* and
//! extracts the values bound by replacement fields:
//!
//! ```rust
//! use road_core::{Matches, Router};
//!
//! # fn main() -> Result<(), road_core::InsertError> {
//! let mut router = Router::new();
//! router.insert("/games", "game list")?;
//! router.insert("/games/{gameId}", "one game")?;
//!
//! let mut matches = Matches::new();
//! let value = router.find_path("/games/42", &mut matches);
//!
//! assert_eq!(value, Some(&"one game"));
//! assert_eq!(matches.get("gameId"), Some("42"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Patterns
//!
//! A pattern is a `/`-separated sequence of segments. Each segment is either
//! a literal (compared byte for byte, percent-decoded) or a replacement
//! field:
//!
//! ```text
//! Syntax    Consumes
//! {id}      exactly one segment
//! {id?}     one segment, or none
//! {id+}     one or more segments
//! {id*}     zero or more segments
//! ```
//!
//! Multi-segment captures are joined with `/`: against `/src/{path*}`, the
//! request `/src/a/b/c` binds `path` to `a/b/c`. Patterns are normalized at
//! registration (`//`, `.` and `..` are resolved), and at most one `+` or
//! `*` field may appear per pattern.
//!
//! ## How does it work?
//!
//! Registered patterns share a trie with one pattern segment per edge:
//!
//! ```text
//! /                       <- root
//! └games                  *<1>
//!      ├history           *<2>
//!      └{gameId}          *<3>
//!               └moves    *<4>
//! ```
//!
//! A lookup walks the trie driven by the request segments. Whenever more
//! than one child could take the next segment the search branches, trying
//! children in a fixed order: literals before fields (static routes beat
//! dynamic ones), fields by modifier, longer variadic spans before shorter
//! ones. The first terminal reached under that order is *the* match, so the
//! result is deterministic no matter what order routes were registered in.
//!
//! The router performs no I/O and never locks; the HTTP server in
//! [`server`] registers every route before it starts accepting connections
//! and then shares the router read-only.

mod error;
mod matches;
mod path;
mod router;
mod segment;
mod tree;

pub mod db;
pub mod query;
pub mod serializer;
pub mod server;
pub mod store;

pub use error::InsertError;
pub use matches::{Iter, Matches};
pub use path::normalize;
pub use router::Router;
pub use segment::{Modifier, SegmentPattern};
pub use tree::{Payload, ResourceTree};
