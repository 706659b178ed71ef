//! # sitegen
//!
//! Concurrent page transformation and persistence for static site builds.
//! A site is a batch of [`Page`](page::Page)s, each a destination path plus
//! its bytes. Writing a batch runs every page through an ordered list of
//! transformers and stores the result under a destination directory.
//!
//! # Architecture: Stage Pipeline
//!
//! ```text
//! pages ──▶ Pipe[ Bundle → Minify → Gzip ] ──▶ persist ──▶ dist/
//!                                                           │
//!                                      gen-server ◀─────────┘
//! ```
//!
//! - [`pipe`] is the engine: a generic, lazily started chain of stages that
//!   keeps many items in flight at once.
//! - [`write`] drives one pipe per batch, persists pages as they come out and
//!   collects every failure instead of stopping at the first one.
//! - [`server`] serves the written tree, gzipped files included.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`page`] | The immutable `Page` value and its destination path rules |
//! | [`pipe`] | Concurrent stage chain: receive, deliver, lazy worker lifecycle |
//! | [`transform`] | `Transformer` trait plus the bundle, minify and gzip stages |
//! | [`write`] | Transform-and-persist orchestration with error aggregation |
//! | [`sitemap`] | `sitemap.xml` page for the HTML pages of a batch |
//! | [`config`] | `gen.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting for write reports |
//! | [`server`] | Static file server with gzip detection |
//!
//! # Design Decisions
//!
//! ## Unordered Delivery
//!
//! Items inside a stage run in parallel and leave it in the order they
//! finish. Nothing downstream needs input order: every page knows its own
//! destination, and [`write`] tags each in-flight item with the path it
//! entered under, so errors still name their page.
//!
//! ## Workers Only While Busy
//!
//! A pipe owns no threads while idle. The first item in starts them, the last
//! item out stops them. A build tool runs in bursts, and an idle pipe that
//! costs nothing can simply be kept around.
//!
//! ## Collect, Don't Abort
//!
//! One broken page should not hide the state of the other hundred. A write
//! attempts every page and returns the full list of failures.
//!
//! ## Pre-Compressed Output
//!
//! The gzip stage compresses at build time, once. The bundled server only
//! has to notice the gzip magic bytes and set `Content-Encoding`, so serving
//! costs no CPU and any dumb file host can do the same.

pub mod config;
pub mod output;
pub mod page;
pub mod pipe;
pub mod server;
pub mod sitemap;
pub mod transform;
pub mod write;

pub use page::Page;
pub use pipe::Pipe;
pub use transform::Transformer;
pub use write::{WriteError, write, write_only, write_with_defaults};

#[cfg(test)]
pub(crate) mod test_helpers;
