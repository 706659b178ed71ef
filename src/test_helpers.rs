//! Shared test utilities for the sitegen test suite.
//!
//! Page builders for in-memory batches and a tree reader that turns a written
//! destination directory back into something `assert_eq!` can compare.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_only(tmp.path(), sample_site());
//!
//! let tree = read_tree(tmp.path());
//! assert_eq!(tree["index.html"], sample_page("/index.html").content());
//! ```

use crate::page::Page;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

// =========================================================================
// Page builders
// =========================================================================

/// A page with text content.
pub fn page(path: &str, content: &str) -> Page {
    Page::new(path, content)
}

/// A small site: two HTML pages referencing a stylesheet and a script, the
/// assets themselves, and an XML feed.
pub fn sample_site() -> Vec<Page> {
    vec![
        page(
            "/index.html",
            "<!DOCTYPE html>\n\
             <html>\n\
             <head>\n  \
             <title>Home</title>\n  \
             <link rel=\"stylesheet\" href=\"/css/site.css\">\n\
             </head>\n\
             <body>\n  \
             <h1>  Welcome  </h1>\n  \
             <script src=\"/js/site.js\"></script>\n\
             </body>\n\
             </html>\n",
        ),
        page(
            "/blog/index.html",
            "<html>\n\
             <link rel=\"stylesheet\" href=\"/css/site.css\">\n\
             <body><p>Posts</p></body>\n\
             </html>\n",
        ),
        page("/css/site.css", "body {\n    margin : 0 ;\n}\n"),
        page("/js/site.js", "function hello ( ) {\n    return 1 ;\n}\n"),
        page(
            "/feed.xml",
            "<feed>\n    <title>Posts</title>\n</feed>\n",
        ),
    ]
}

/// Look up a page of [`sample_site`] by path. Panics if not found.
pub fn sample_page(path: &str) -> Page {
    let site = sample_site();
    let paths: Vec<String> = site.iter().map(|p| p.path().to_string()).collect();
    site.into_iter()
        .find(|p| p.path() == path)
        .unwrap_or_else(|| panic!("page '{path}' not in sample site. Available: {paths:?}"))
}

// =========================================================================
// Tree readers
// =========================================================================

/// Every file under `root`, keyed by its `/`-separated path relative to
/// `root`.
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap_or_else(|e| panic!("walking {}: {e}", root.display())))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read(entry.path())
                .unwrap_or_else(|e| panic!("reading {}: {e}", entry.path().display()));
            (rel, content)
        })
        .collect()
}
