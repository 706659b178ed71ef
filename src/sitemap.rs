//! `sitemap.xml` generation.
//!
//! Lists every HTML page of a batch, in input order, under the site's base
//! URL. Directory index pages are listed by their directory:
//!
//! | Page | `<loc>` |
//! |---|---|
//! | `/index.html` | `https://example.com/` |
//! | `/blog/index.html` | `https://example.com/blog/` |
//! | `/about.html` | `https://example.com/about.html` |
//!
//! The result is an ordinary [`Page`], so it goes through the same
//! transformers as the rest of the batch when it is written.

use crate::page::Page;
use serde::Serialize;
use thiserror::Error;

pub const SITEMAP_PATH: &str = "/sitemap.xml";
const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Failed to serialize sitemap: {0}")]
    Serialize(String),
}

#[derive(Serialize)]
#[serde(rename = "urlset")]
struct UrlSet<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'a str,
    #[serde(rename = "url")]
    urls: Vec<Url>,
}

#[derive(Serialize)]
struct Url {
    loc: String,
}

/// Build the sitemap page for `pages`.
///
/// `base_url` may or may not end in `/`.
pub fn sitemap(base_url: &str, pages: &[Page]) -> Result<Page, SitemapError> {
    let base = base_url.trim_end_matches('/');
    let urls = pages
        .iter()
        .filter(|page| page.has_extension("html"))
        .map(|page| Url {
            loc: location(base, page.relative_path()),
        })
        .collect();
    let set = UrlSet {
        xmlns: SITEMAP_NAMESPACE,
        urls,
    };
    let body = quick_xml::se::to_string(&set).map_err(|e| SitemapError::Serialize(e.to_string()))?;
    Ok(Page::new(SITEMAP_PATH, format!("{XML_DECLARATION}{body}")))
}

fn location(base: &str, relative: &str) -> String {
    if relative == "index.html" {
        format!("{base}/")
    } else if let Some(dir) = relative.strip_suffix("/index.html") {
        format!("{base}/{dir}/")
    } else {
        format!("{base}/{relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(page: &Page) -> &str {
        std::str::from_utf8(page.content()).unwrap()
    }

    #[test]
    fn lists_html_pages_in_input_order() {
        let pages = vec![
            Page::new("/index.html", ""),
            Page::new("/app.css", ""),
            Page::new("/blog/index.html", ""),
            Page::new("about.html", ""),
        ];
        let map = sitemap("https://example.com/", &pages).unwrap();

        assert_eq!(map.path(), "/sitemap.xml");
        assert_eq!(
            text(&map),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\
             <url><loc>https://example.com/</loc></url>\
             <url><loc>https://example.com/blog/</loc></url>\
             <url><loc>https://example.com/about.html</loc></url>\
             </urlset>"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_optional() {
        let pages = vec![Page::new("/a.html", "")];
        let with = sitemap("https://example.com/", &pages).unwrap();
        let without = sitemap("https://example.com", &pages).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn special_characters_are_escaped() {
        let pages = vec![Page::new("/q&a.html", "")];
        let map = sitemap("https://example.com", &pages).unwrap();
        assert!(text(&map).contains("https://example.com/q&amp;a.html"));
    }

    #[test]
    fn no_html_pages_gives_empty_urlset() {
        let map = sitemap("https://example.com", &[Page::new("/a.css", "")]).unwrap();
        assert!(text(&map).starts_with(XML_DECLARATION));
        assert!(!text(&map).contains("<url>"));
        assert!(text(&map).contains("urlset"));
    }
}
