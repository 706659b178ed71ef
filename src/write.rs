//! Transform-and-persist orchestration.
//!
//! [`write`] builds a fresh [`Pipe`] from a transformer list, feeds it every
//! page of the batch and writes each page to disk as soon as it comes out of
//! the last stage:
//!
//! ```text
//! pages ──▶ Pipe[ bundle → minify → gzip ] ──▶ persist ──▶ <destination>/<path>
//!                        │                        │
//!                        └──── errors ◀───────────┘
//! ```
//!
//! ## Errors
//!
//! Nothing fails fast. A page whose transform fails skips the remaining
//! stages and is not written; a page that can't be written doesn't stop the
//! others. Every failure is appended to one shared list, which is returned
//! once the whole batch has been attempted. The list is unordered and one
//! page can in principle contribute more than one entry, so read a non-empty
//! list as "at least one page failed".
//!
//! Each in-flight item carries the path of the input page it came from, so
//! every [`WriteError`] names its page even though the pipe delivers pages
//! out of order.
//!
//! ## Side Effects
//!
//! Parent directories are created as needed and existing files are
//! overwritten. Files from earlier builds that are not part of this batch are
//! left in place.

use crate::config::{GenConfig, PipelineConfig};
use crate::page::Page;
use crate::pipe::{Pipe, PipeError, Stage};
use crate::transform::{self, TransformError, Transformer};
use std::any::Any;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Transform failed for {page}: {source}")]
    Transform {
        page: String,
        #[source]
        source: TransformError,
    },
    #[error("Failed to write {page} to {}: {source}", target.display())]
    Persist {
        page: String,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Refusing to write {page}: path is empty or leaves the destination")]
    UnsafePath { page: String },
    #[error("Pipeline error: {0}")]
    Pipe(#[from] PipeError),
}

impl WriteError {
    /// Path of the input page this error belongs to, if it belongs to one.
    pub fn page(&self) -> Option<&str> {
        match self {
            Self::Transform { page, .. } | Self::Persist { page, .. } | Self::UnsafePath { page } => {
                Some(page)
            }
            Self::Pipe(_) => None,
        }
    }
}

/// A page that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub page: String,
    pub target: PathBuf,
    pub bytes: usize,
}

/// Everything [`write_with_report`] attempted.
///
/// Both lists are in completion order, not input order.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub destination: PathBuf,
    pub written: Vec<Written>,
    pub errors: Vec<WriteError>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A page in flight, tagged with the path it entered the pipe under.
struct Item {
    source: String,
    page: Result<Page, TransformError>,
}

/// Adapts a [`Transformer`] to the pipe. Items that already failed skip it.
///
/// A transformer that panics fails only the page it was given.
struct TransformStage(Arc<dyn Transformer>);

impl Stage<Item> for TransformStage {
    fn handle(&self, item: Item) -> Item {
        let page = item.page.and_then(|page| {
            panic::catch_unwind(AssertUnwindSafe(|| self.0.transform(page)))
                .unwrap_or_else(|payload| Err(TransformError::Failed(panic_message(&*payload))))
        });
        Item {
            source: item.source,
            page,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string payload"
    };
    format!("transformer panicked: {detail}")
}

/// Transform every page in order and persist the results under
/// `destination`. Returns every failure of the batch.
pub fn write(
    destination: &Path,
    pages: Vec<Page>,
    transformers: &[Arc<dyn Transformer>],
) -> Vec<WriteError> {
    write_with_report(destination, pages, transformers, &PipelineConfig::default()).errors
}

/// Persist the pages as they are, without any transform.
pub fn write_only(destination: &Path, pages: Vec<Page>) -> Vec<WriteError> {
    write(destination, pages, &[])
}

/// Bundle, minify and gzip the pages, then persist them.
pub fn write_with_defaults(
    destination: &Path,
    pages: Vec<Page>,
    config: &GenConfig,
) -> Vec<WriteError> {
    let transformers = transform::defaults(&pages, config);
    write_with_report(destination, pages, &transformers, &config.pipeline).errors
}

/// Like [`write`], also returning what was written.
pub fn write_with_report(
    destination: &Path,
    pages: Vec<Page>,
    transformers: &[Arc<dyn Transformer>],
    pipeline: &PipelineConfig,
) -> WriteReport {
    let stages: Vec<Arc<dyn Stage<Item>>> = transformers
        .iter()
        .map(|t| Arc::new(TransformStage(Arc::clone(t))) as Arc<dyn Stage<Item>>)
        .collect();
    let pipe = Pipe::new(stages, pipeline);

    let written = Mutex::new(Vec::with_capacity(pages.len()));
    let errors = Mutex::new(Vec::new());
    let record = |err: WriteError| {
        tracing::warn!(page = err.page().unwrap_or("-"), "{err}");
        errors.lock().unwrap_or_else(PoisonError::into_inner).push(err);
    };

    let items = pages.into_iter().map(|page| Item {
        source: page.path().to_string(),
        page: Ok(page),
    });
    let consumed = pipe.process_and_consume(items, |item| match item.page {
        Ok(page) => match persist(destination, &item.source, &page) {
            Ok(target) => written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Written {
                    page: item.source,
                    target,
                    bytes: page.len(),
                }),
            Err(err) => record(err),
        },
        Err(source) => record(WriteError::Transform {
            page: item.source,
            source,
        }),
    });
    if let Err(err) = consumed {
        record(err.into());
    }

    let report = WriteReport {
        destination: destination.to_path_buf(),
        written: written.into_inner().unwrap_or_else(PoisonError::into_inner),
        errors: errors.into_inner().unwrap_or_else(PoisonError::into_inner),
    };
    tracing::info!(
        destination = %destination.display(),
        written = report.written.len(),
        failed = report.errors.len(),
        "batch written"
    );
    report
}

/// Write one page under `destination`, creating parent directories.
fn persist(destination: &Path, source: &str, page: &Page) -> Result<PathBuf, WriteError> {
    let target = page
        .destination(destination)
        .ok_or_else(|| WriteError::UnsafePath {
            page: source.to_string(),
        })?;
    let persist_error = |source_err| WriteError::Persist {
        page: source.to_string(),
        target: target.clone(),
        source: source_err,
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(persist_error)?;
    }
    fs::write(&target, page.content()).map_err(persist_error)?;
    Ok(target)
}
