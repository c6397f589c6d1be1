//! Static file responses for file-string routes.
//!
//! Paths resolve under the configured files root. `..` sequences are
//! stripped before joining, so a route can never reach above the root.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::http::response::json_response;

/// Content type for a file extension (without the dot).
pub fn mime_for_extension(ext: &str) -> String {
    let ext = ext.to_ascii_lowercase();
    let known = match ext.as_str() {
        "json" => "application/json",
        "jsonld" => "application/ld+json",
        "pdf" => "application/pdf",
        "gz" => "application/gzip",
        "zip" => "application/zip",
        "jar" => "application/java-archive",
        "bin" => "application/octet-stream",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "rtf" => "application/rtf",
        "epub" => "application/epub+zip",
        "xhtml" => "application/xhtml+xml",
        "xml" => "application/xml",
        "wasm" => "application/wasm",
        "7z" => "application/x-7z-compressed",
        "tar" => "application/x-tar",
        "sh" => "application/x-sh",
        "aac" => "audio/aac",
        "mp3" => "audio/mpeg",
        "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "weba" => "audio/webm",
        "otf" => "font/otf",
        "ttf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/vnd.microsoft.icon",
        "webp" => "image/webp",
        "ics" => "text/calendar",
        "css" => "text/css",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "js" | "mjs" => "text/javascript",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "mp4" => "video/mp4",
        "mpeg" => "video/mpeg",
        "ogv" => "video/ogg",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "" => "application/octet-stream",
        _ => return format!("application/x-{ext}"),
    };
    known.to_string()
}

/// Strip `..` sequences (and a following `/`) from a requested file name.
pub fn sanitize(filename: &str) -> String {
    filename.replace("../", "").replace("..", "")
}

/// Locate the file a route names, dropping a trailing `?query` when the
/// literal name does not exist.
pub fn resolve_file(root: &Path, filename: &str) -> Option<PathBuf> {
    let clean = sanitize(filename);
    let candidate = root.join(clean.trim_start_matches('/'));
    if candidate.is_file() {
        return Some(candidate);
    }

    let (without_query, _) = clean.split_once('?')?;
    let candidate = root.join(without_query.trim_start_matches('/'));
    candidate.is_file().then_some(candidate)
}

/// Stream a file back, or answer 404 when it does not exist.
pub async fn serve_file(root: &Path, filename: &str, method: &Method) -> Response {
    let Some(path) = resolve_file(root, filename) else {
        tracing::debug!(file = %filename, "File route target missing");
        return json_response(&json!({ "status": 404, "body": "Not found" }), StatusCode::NOT_FOUND);
    };

    let mime = mime_for_extension(
        path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default(),
    );

    let mut request = Request::new(Body::empty());
    if method == Method::HEAD {
        *request.method_mut() = Method::HEAD;
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);
    if let Ok(value) = HeaderValue::from_str(&mime) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}
