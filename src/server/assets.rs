//! Static web client assets.

use std::path::{Path, PathBuf};

use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use crate::server::body::{error_response, file_body, HttpResponse};
use crate::utils::{absolutize, is_within};

/// Served for `/` and for directory paths.
const INDEX_FILE: &str = "index.html";

/// Read-only file server over the web client directory.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    root: PathBuf,
}

impl StaticAssets {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: absolutize(root.as_ref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve the asset for a request path.
    pub async fn serve(&self, request_path: &str) -> HttpResponse {
        let Some(mut path) = self.resolve(request_path) else {
            return error_response(StatusCode::FORBIDDEN, "Invalid path");
        };

        if tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            path.push(INDEX_FILE);
        }

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(_) => return error_response(StatusCode::NOT_FOUND, "Not found"),
        };
        let len = match file.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            _ => return error_response(StatusCode::NOT_FOUND, "Not found"),
        };

        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        let mut response = Response::new(file_body(file));
        let headers = response.headers_mut();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
            headers.insert(CONTENT_TYPE, value);
        }
        response
    }

    /// Map a URL path onto the asset directory, or `None` if it escapes.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = request_path.trim_start_matches('/');
        let candidate = absolutize(&self.root.join(relative));
        is_within(&self.root, &candidate).then_some(candidate)
    }
}
