//! The page value type shared by every stage of the build.
//!
//! A [`Page`] is a destination path plus the bytes that end up at that path.
//! Pages are immutable: a transform never edits a page in place, it builds a
//! new one with [`Page::with_content`]. The content lives behind an `Arc`, so
//! handing the same page to several threads costs a reference count, not a
//! copy.
//!
//! ## Paths
//!
//! Paths are destination-relative. A leading `/` is accepted and ignored, so
//! `/app.css` and `app.css` name the same output file. HTML references assets
//! in the root-relative form, which lets the bundle stage match a reference
//! against a page path directly.
//!
//! ```text
//! Page::new("/blog/index.html", html)  →  <destination>/blog/index.html
//! Page::new("app.css", css)            →  <destination>/app.css
//! Page::new("../escape.html", html)    →  rejected at persist time
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A unit of site content: where it goes and what it contains.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    path: String,
    content: Arc<[u8]>,
}

impl Page {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: Arc::from(content.into()),
        }
    }

    /// Drain a reader into a new page.
    pub fn from_reader(path: impl Into<String>, mut reader: impl Read) -> Result<Self, PageError> {
        let path = path.into();
        let mut content = Vec::new();
        match reader.read_to_end(&mut content) {
            Ok(_) => Ok(Self::new(path, content)),
            Err(source) => Err(PageError::Read { path, source }),
        }
    }

    /// Read a file from disk into a page published at `path`.
    pub fn from_file(path: impl Into<String>, file: &Path) -> Result<Self, PageError> {
        let path = path.into();
        match File::open(file) {
            Ok(f) => Self::from_reader(path, f),
            Err(source) => Err(PageError::Read { path, source }),
        }
    }

    /// The path exactly as the page was created with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path without its leading `/`, used for comparisons and for
    /// joining onto a destination directory.
    pub fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.path).extension().and_then(|e| e.to_str())
    }

    /// Case-insensitive extension check (`"html"` matches `index.HTML`).
    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// A new page at the same path with different content.
    pub fn with_content(&self, content: impl Into<Vec<u8>>) -> Self {
        Self::new(self.path.clone(), content)
    }

    /// Where this page lands under `root`.
    ///
    /// Returns `None` for paths that are empty or would leave `root`
    /// (`..`, absolute prefixes on Windows).
    pub fn destination(&self, root: &Path) -> Option<PathBuf> {
        let mut target = root.to_path_buf();
        let mut has_name = false;
        for component in Path::new(self.relative_path()).components() {
            match component {
                Component::Normal(part) => {
                    target.push(part);
                    has_name = true;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        has_name.then_some(target)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("path", &self.path)
            .field("len", &self.content.len())
            .finish()
    }
}
