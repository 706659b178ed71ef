//! Minification by content type.
//!
//! The media type is derived from the page's extension:
//!
//! | Extension | Minifier |
//! |---|---|
//! | `.html`, `.htm` | `minify-html` (inline `<style>` optional) |
//! | `.css` | `minifier::css` |
//! | `.js`, `.mjs` | parsed with `oxc_parser`, printed back by `oxc_codegen` |
//! | `.xml`, `.svg` | `quick-xml` event stream with whitespace collapsed |
//!
//! Pages of any other type, or of a type switched off in
//! [`MinifyConfig`], pass through untouched. That is not an error. Content
//! that a minifier rejects (invalid UTF-8, malformed CSS, JS or XML) is.
//!
//! JavaScript is reprinted from its syntax tree, never rewritten as text, so
//! statement boundaries that rely on automatic semicolon insertion survive.
//! `<script>` blocks inside HTML are left as they are; only inline `<style>`
//! is minified there.
//!
//! XML text keeps its words apart: whitespace runs inside text collapse to a
//! single space, and only text made of nothing but whitespace is dropped.

use super::{TransformError, Transformer};
use crate::config::MinifyConfig;
use crate::page::Page;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesText, Event};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaType {
    Html,
    Css,
    JavaScript,
    Xml,
}

impl MediaType {
    fn of(page: &Page) -> Option<Self> {
        let ext = page.extension()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" | "mjs" => Some(Self::JavaScript),
            "xml" | "svg" => Some(Self::Xml),
            _ => None,
        }
    }
}

/// Minifies HTML, CSS, JS and XML pages.
pub struct Minify {
    config: MinifyConfig,
    html: minify_html::Cfg,
}

impl Minify {
    pub fn new(config: &MinifyConfig) -> Self {
        let mut html = minify_html::Cfg::new();
        html.keep_comments = config.keep_comments;
        html.minify_css = config.minify_inline;
        html.minify_js = false;
        Self {
            config: config.clone(),
            html,
        }
    }

    /// The minifier for this page, if its type is supported and enabled.
    fn media_type(&self, page: &Page) -> Option<MediaType> {
        MediaType::of(page).filter(|media| match media {
            MediaType::Html => self.config.html,
            MediaType::Css => self.config.css,
            MediaType::JavaScript => self.config.js,
            MediaType::Xml => self.config.xml,
        })
    }

    fn minify_xml(&self, page: &Page, text: &str) -> Result<Vec<u8>, TransformError> {
        let mut reader = Reader::from_str(text);
        let mut writer = Writer::new(Vec::with_capacity(text.len()));
        loop {
            match reader.read_event().map_err(|e| failure(page, e))? {
                Event::Eof => break,
                Event::Comment(_) if !self.config.keep_comments => {}
                Event::Text(raw) => {
                    let raw = std::str::from_utf8(&raw).map_err(|e| failure(page, e))?;
                    if raw.bytes().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }
                    let collapsed = BytesText::from_escaped(collapse_whitespace(raw));
                    writer
                        .write_event(Event::Text(collapsed))
                        .map_err(|e| failure(page, e))?;
                }
                event => writer.write_event(event).map_err(|e| failure(page, e))?,
            }
        }
        Ok(writer.into_inner())
    }
}

impl Default for Minify {
    fn default() -> Self {
        Self::new(&MinifyConfig::default())
    }
}

impl Transformer for Minify {
    fn transform(&self, page: Page) -> Result<Page, TransformError> {
        let Some(media) = self.media_type(&page) else {
            return Ok(page);
        };
        let minified = match media {
            MediaType::Html => minify_html::minify(page.content(), &self.html),
            MediaType::Css => {
                let text = utf8(&page)?;
                minifier::css::minify(text)
                    .map_err(|e| failure(&page, e))?
                    .to_string()
                    .into_bytes()
            }
            MediaType::JavaScript => minify_js(&page, utf8(&page)?)?.into_bytes(),
            MediaType::Xml => self.minify_xml(&page, utf8(&page)?)?,
        };
        Ok(page.with_content(minified))
    }
}

/// Parse `text` as an ES module and print it back without whitespace or
/// comments.
fn minify_js(page: &Page, text: &str) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, text, SourceType::mjs()).parse();
    if let Some(err) = parsed.errors.first() {
        return Err(failure(page, err));
    }
    if parsed.panicked {
        return Err(failure(page, "unrecoverable syntax error"));
    }
    let printed = Codegen::new()
        .with_options(CodegenOptions::minify())
        .build(&parsed.program);
    Ok(printed.code)
}

/// Replace every run of ASCII whitespace with one space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn utf8(page: &Page) -> Result<&str, TransformError> {
    std::str::from_utf8(page.content()).map_err(|e| failure(page, e))
}

fn failure(page: &Page, err: impl Display) -> TransformError {
    TransformError::Minify {
        path: page.path().to_string(),
        message: err.to_string(),
    }
}
