//! CSS/JS inlining for HTML pages.
//!
//! Scans each HTML page line by line for one of two root-relative references:
//!
//! ```text
//! <script src="/app.js"></script>
//! <link rel="stylesheet" href="/app.css">
//! ```
//!
//! A matching line is replaced as a whole by the referenced asset wrapped in
//! `<script type='text/javascript'>` or `<style>`. References without a
//! leading `/` are plain text to this stage. Only the first reference on a
//! line is looked at, and a script reference wins over a stylesheet one.

use super::{TransformError, Transformer};
use crate::page::Page;
use std::collections::HashMap;

const JS_PREFIX: &[u8] = b"script src=\"/";
const CSS_PREFIX: &[u8] = b"link rel=\"stylesheet\" href=\"/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetKind {
    Css,
    Js,
}

impl AssetKind {
    fn of(page: &Page) -> Option<Self> {
        if page.has_extension("css") {
            Some(Self::Css)
        } else if page.has_extension("js") {
            Some(Self::Js)
        } else {
            None
        }
    }

    fn wrap(self) -> (&'static [u8], &'static [u8]) {
        match self {
            Self::Css => (b"<style>\n", b"</style>"),
            Self::Js => (b"<script type='text/javascript'>\n", b"</script>"),
        }
    }
}

/// Inlines CSS and JS pages into the HTML pages that reference them.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// CSS/JS pages of the batch, keyed by relative path.
    assets: HashMap<String, (AssetKind, Page)>,
}

impl Bundle {
    /// Index the CSS and JS pages of a batch.
    ///
    /// The index is a snapshot: every HTML page of the batch is bundled
    /// against the same asset contents, however the pipeline schedules them.
    pub fn new(pages: &[Page]) -> Self {
        let assets = pages
            .iter()
            .filter_map(|page| {
                AssetKind::of(page)
                    .map(|kind| (page.relative_path().to_string(), (kind, page.clone())))
            })
            .collect();
        Self { assets }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.assets.len()
    }

    #[cfg(test)]
    fn contains(&self, path: &str) -> bool {
        self.assets.contains_key(path.trim_start_matches('/'))
    }

    fn bundle_line(
        &self,
        page: &Page,
        line: &[u8],
        out: &mut Vec<u8>,
    ) -> Result<(), TransformError> {
        let Some(reference) = referenced_asset(line) else {
            out.extend_from_slice(line);
            return Ok(());
        };
        let reference = String::from_utf8_lossy(reference);
        let (kind, asset) = self
            .assets
            .get(reference.trim_start_matches('/'))
            .ok_or_else(|| TransformError::PageNotFound {
                page: page.path().to_string(),
                reference: reference.to_string(),
            })?;

        let (open, close) = kind.wrap();
        out.extend_from_slice(open);
        out.extend_from_slice(asset.content());
        if !asset.content().ends_with(b"\n") {
            out.push(b'\n');
        }
        out.extend_from_slice(close);
        out.extend_from_slice(terminator(line));
        Ok(())
    }
}

impl Transformer for Bundle {
    fn transform(&self, page: Page) -> Result<Page, TransformError> {
        if !page.has_extension("html") {
            return Ok(page);
        }
        let mut out = Vec::with_capacity(page.len());
        for line in page.content().split_inclusive(|&b| b == b'\n') {
            self.bundle_line(&page, line, &mut out)?;
        }
        Ok(page.with_content(out))
    }
}

/// The line ending `line` finishes with: `\r\n`, `\n` or nothing.
fn terminator(line: &[u8]) -> &'static [u8] {
    if line.ends_with(b"\r\n") {
        b"\r\n"
    } else if line.ends_with(b"\n") {
        b"\n"
    } else {
        b""
    }
}

fn referenced_asset(line: &[u8]) -> Option<&[u8]> {
    referenced(line, JS_PREFIX).or_else(|| referenced(line, CSS_PREFIX))
}

/// The path following `prefix` up to the closing quote, leading `/` included.
fn referenced<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    let start = find(line, prefix)? + prefix.len() - 1;
    let rest = &line[start..];
    let end = rest.iter().position(|&b| b == b'"')?;
    Some(&rest[..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(page: &Page) -> &str {
        std::str::from_utf8(page.content()).unwrap()
    }

    fn batch() -> Vec<Page> {
        vec![
            Page::new(
                "/index.html",
                "<html>\n  <link rel=\"stylesheet\" href=\"/app.css\">\n  <script src=\"/app.js\"></script>\n</html>\n",
            ),
            Page::new("/app.css", "body { color: red; }\n"),
            Page::new("app.js", "console.log(1);"),
            Page::new("/logo.png", vec![0x89, b'P', b'N', b'G']),
        ]
    }

    #[test]
    fn index_holds_only_css_and_js() {
        let bundle = Bundle::new(&batch());
        assert_eq!(bundle.len(), 2);
        assert!(bundle.contains("/app.css"));
        assert!(bundle.contains("app.js"));
        assert!(!bundle.contains("/logo.png"));
    }

    #[test]
    fn inlines_css_and_js() {
        let pages = batch();
        let out = Bundle::new(&pages).transform(pages[0].clone()).unwrap();

        assert_eq!(
            text(&out),
            "<html>\n\
             <style>\nbody { color: red; }\n</style>\n\
             <script type='text/javascript'>\nconsole.log(1);\n</script>\n\
             </html>\n"
        );
        assert!(!text(&out).contains("/app.css"));
        assert!(!text(&out).contains("/app.js"));
    }

    #[test]
    fn missing_asset_is_page_not_found() {
        let index = Page::new(
            "/index.html",
            "<link rel=\"stylesheet\" href=\"/missing.css\">\n",
        );
        let err = Bundle::new(&[]).transform(index).unwrap_err();
        assert!(matches!(
            &err,
            TransformError::PageNotFound { page, reference }
                if page == "/index.html" && reference == "/missing.css"
        ));
    }

    #[test]
    fn script_reference_to_non_asset_is_not_found() {
        let pages = batch();
        let index = Page::new("/index.html", "<script src=\"/logo.png\"></script>");
        let result = Bundle::new(&pages).transform(index);
        assert!(matches!(result, Err(TransformError::PageNotFound { .. })));
    }

    #[test]
    fn relative_references_are_left_alone() {
        let html = "<script src=\"app.js\"></script>\n<link rel=\"stylesheet\" href=\"https://cdn/x.css\">\n";
        let index = Page::new("/index.html", html);
        let out = Bundle::new(&batch()).transform(index).unwrap();
        assert_eq!(text(&out), html);
    }

    #[test]
    fn unterminated_reference_is_plain_text() {
        let html = "<script src=\"/app.js\n";
        let out = Bundle::new(&batch())
            .transform(Page::new("/index.html", html))
            .unwrap();
        assert_eq!(text(&out), html);
    }

    #[test]
    fn non_html_pages_pass_through() {
        let pages = batch();
        let css = Bundle::new(&pages).transform(pages[1].clone()).unwrap();
        assert_eq!(css, pages[1]);
    }

    #[test]
    fn line_endings_are_preserved() {
        let html = "<p>a</p>\r\n<p>b</p>";
        let out = Bundle::new(&[])
            .transform(Page::new("/x.html", html))
            .unwrap();
        assert_eq!(text(&out), html);
    }

    #[test]
    fn replaced_line_keeps_its_crlf() {
        let pages = batch();
        let html = "<p>a</p>\r\n<script src=\"/app.js\"></script>\r\n<p>b</p>\r\n";
        let out = Bundle::new(&pages)
            .transform(Page::new("/x.html", html))
            .unwrap();
        assert_eq!(
            text(&out),
            "<p>a</p>\r\n<script type='text/javascript'>\nconsole.log(1);\n</script>\r\n<p>b</p>\r\n"
        );
    }

    #[test]
    fn terminator_of_line() {
        assert_eq!(terminator(b"a\r\n"), b"\r\n");
        assert_eq!(terminator(b"a\n"), b"\n");
        assert_eq!(terminator(b"a"), b"");
    }

    #[test]
    fn last_line_without_newline_gets_no_extra_newline() {
        let pages = batch();
        let out = Bundle::new(&pages)
            .transform(Page::new("/x.html", "<script src=\"/app.js\"></script>"))
            .unwrap();
        assert_eq!(
            text(&out),
            "<script type='text/javascript'>\nconsole.log(1);\n</script>"
        );
    }

    #[test]
    fn referenced_extracts_root_relative_path() {
        assert_eq!(
            referenced(b"  <script src=\"/js/a.js\" defer>", JS_PREFIX),
            Some(&b"/js/a.js"[..])
        );
        assert_eq!(referenced(b"<script src=\"a.js\">", JS_PREFIX), None);
        assert_eq!(referenced(b"", CSS_PREFIX), None);
    }
}
