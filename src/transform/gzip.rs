//! Gzip compression of every page, whatever its type.
//!
//! Output starts with the gzip magic bytes `1f 8b`, which is what the static
//! file server looks at to decide whether to send `Content-Encoding: gzip`.

use super::{TransformError, Transformer};
use crate::config::GzipConfig;
use crate::page::Page;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Replaces page content with its gzip-compressed form.
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    level: Compression,
}

impl Gzip {
    pub fn new(config: &GzipConfig) -> Self {
        Self {
            level: Compression::new(config.level.min(9)),
        }
    }

    #[cfg(test)]
    fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for Gzip {
    fn default() -> Self {
        Self::new(&GzipConfig::default())
    }
}

impl Transformer for Gzip {
    fn transform(&self, page: Page) -> Result<Page, TransformError> {
        let compress_error = |source| TransformError::Compress {
            path: page.path().to_string(),
            source,
        };
        let mut encoder = GzEncoder::new(Vec::with_capacity(page.len() / 2 + 32), self.level);
        encoder.write_all(page.content()).map_err(compress_error)?;
        let compressed = encoder.finish().map_err(compress_error)?;
        Ok(page.with_content(compressed))
    }
}
