//! Page transforms.
//!
//! | Transformer | What it does | State |
//! |---|---|---|
//! | [`Bundle`] | Inlines referenced CSS/JS into HTML pages | Asset index, built once per batch |
//! | [`Minify`] | Minifies HTML, CSS, JS and XML | [`MinifyConfig`](crate::config::MinifyConfig) |
//! | [`Gzip`] | Gzip-compresses every page | Compression level |
//!
//! A [`Transformer`] maps one page to one page, or fails. Any
//! `Fn(Page) -> Result<Page, TransformError>` closure is a transformer too, so
//! one-off stages don't need a type of their own.

pub mod bundle;
pub mod gzip;
pub mod minify;

pub use bundle::Bundle;
pub use gzip::Gzip;
pub use minify::Minify;

use crate::config::GenConfig;
use crate::page::Page;
use std::io;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("{page} references {reference}, but no page with that path was found")]
    PageNotFound { page: String, reference: String },
    #[error("Minify failed for {path}: {message}")]
    Minify { path: String, message: String },
    #[error("Compression failed for {path}: {source}")]
    Compress {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Failed(String),
}

/// Creates a new page from the given page.
pub trait Transformer: Send + Sync {
    fn transform(&self, page: Page) -> Result<Page, TransformError>;
}

impl<F> Transformer for F
where
    F: Fn(Page) -> Result<Page, TransformError> + Send + Sync,
{
    fn transform(&self, page: Page) -> Result<Page, TransformError> {
        self(page)
    }
}

/// The standard build: bundle, then minify, then gzip.
///
/// The bundle index is taken from `pages`, so pass the same batch that is
/// about to be written.
pub fn defaults(pages: &[Page], config: &GenConfig) -> Vec<Arc<dyn Transformer>> {
    vec![
        Arc::new(Bundle::new(pages)),
        Arc::new(Minify::new(&config.minify)),
        Arc::new(Gzip::new(&config.gzip)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_transformers() {
        let upper = |page: Page| {
            let text = String::from_utf8_lossy(page.content()).to_uppercase();
            Ok::<_, TransformError>(page.with_content(text))
        };
        let out = upper.transform(Page::new("/a.txt", "shout")).unwrap();
        assert_eq!(out.content(), b"SHOUT");
    }

    #[test]
    fn defaults_has_three_stages() {
        let pages = vec![Page::new("/index.html", "<p>hi</p>")];
        assert_eq!(defaults(&pages, &GenConfig::default()).len(), 3);
    }

    #[test]
    fn defaults_run_in_order() {
        let pages = vec![
            Page::new("/index.html", "<html>\n<link rel=\"stylesheet\" href=\"/app.css\">\n</html>\n"),
            Page::new("/app.css", "body {  color : red ; }\n"),
        ];
        let mut page = pages[0].clone();
        for stage in defaults(&pages, &GenConfig::default()) {
            page = stage.transform(page).unwrap();
        }
        // Gzip ran last
        assert_eq!(&page.content()[..2], &[0x1f, 0x8b]);
    }
}
