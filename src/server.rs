//! Static file server for a written site.
//!
//! Serves files from one directory and sets `Content-Encoding: gzip` on every
//! file that starts with the gzip magic bytes, so a site written with the
//! gzip transform is served as-is, without decompressing or re-compressing.
//!
//! ## Path Resolution
//!
//! ```text
//! GET /                 →  <dir>/index.html
//! GET /blog             →  <dir>/blog/index.html
//! GET /app.css          →  <dir>/app.css
//! GET /../etc/passwd    →  404
//! ```
//!
//! A request path without an extension names a directory and is served its
//! `index.html`. Request paths are percent-decoded (`/my%20page.html` is
//! `my page.html`). Paths that try to leave the directory and files that
//! don't exist are `404 Not Found`. Only `GET` and `HEAD` are allowed.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{self, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}

/// Router serving the files under `directory`.
pub fn router(directory: impl Into<PathBuf>) -> Router {
    Router::new()
        .fallback(serve_file)
        .with_state(Arc::new(directory.into()))
}

/// Listen on every interface at `port` and serve `directory` until the
/// process is stopped.
pub async fn serve(port: u16, directory: PathBuf) -> Result<(), ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(addr = %addr, directory = %directory.display(), "listening");
    axum::serve(listener, router(directory))
        .await
        .map_err(ServerError::Serve)
}

async fn serve_file(State(root): State<Arc<PathBuf>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let Some(path) = resolve(&root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), "unreadable: {err}");
            }
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let gzipped = content.starts_with(&GZIP_MAGIC);
    let mut response = Bytes::from(content).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type(&path)),
    );
    if gzipped {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    response
}

/// Map a request path onto a file under `root`.
///
/// The path is percent-decoded first, so an encoded `..` is caught like a
/// plain one. Paths that don't decode to UTF-8 resolve to nothing.
fn resolve(root: &Path, request: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request).decode_utf8().ok()?;
    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if path.extension().is_none() {
        path.push("index.html");
    }
    Some(path)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
