//! Filesystem-backed static asset serving under `/static/`.

use std::path::{Component, Path, PathBuf};

use http::{Response, StatusCode};
use tracing::debug;

use crate::body::ResponseBody;

/// Resolves the requested subpath inside the asset directory, refusing
/// anything that escapes it.
fn resolve(dir: &Path, rest: &str) -> Option<PathBuf> {
    let relative = Path::new(rest);
    let mut resolved = dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            // `..`, a leading `/`, or anything else escaping the directory
            _ => return None,
        }
    }
    Some(resolved)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html;charset=utf-8",
        Some("css") => "text/css;charset=utf-8",
        Some("js") => "text/javascript;charset=utf-8",
        Some("json") => "application/json;charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn not_found() -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::from("404 Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Serves one file below `dir`. Missing files and escaping paths yield 404.
pub async fn serve(dir: &Path, rest: &str) -> Response<ResponseBody> {
    let Some(path) = resolve(dir, rest) else {
        debug!(rest, "rejected static path");
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(contents) => {
            let mut response = Response::new(ResponseBody::once(contents.into()));
            if let Ok(value) = content_type(&path).parse() {
                response.headers_mut().insert(http::header::CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            debug!(path = %path.display(), cause = %e, "static file unavailable");
            not_found()
        }
    }
}
