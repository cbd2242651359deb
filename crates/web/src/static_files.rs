//! Files served from directories registered with
//! [`RouterBuilder::static_dir`](crate::router::RouterBuilder::static_dir).

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use mime::Mime;
use tracing::{debug, warn};

use crate::responder::TEXT_PLAIN_UTF_8;

/// A file a request path resolved to. It may not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFile {
    path: PathBuf,
    mime: Mime,
}

impl StaticFile {
    /// Resolves `relative` below `dir`.
    ///
    /// A path without extension names a directory and maps to its `index.html`.
    /// Paths escaping `dir` resolve to nothing.
    pub fn resolve(dir: &Path, relative: &str) -> Option<Self> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }

        let mut path = dir.join(relative);
        if path.extension().is_none() {
            path.push("index.html");
        }
        let mime = mime_for(&path);
        Some(Self { path, mime })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    /// Reads the file: `200` with its MIME type, or `404` carrying the error.
    pub async fn serve(&self) -> Response<Bytes> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => {
                debug!(path = %self.path.display(), len = content.len(), "serving static file");
                let mut response = Response::new(Bytes::from(content));
                let headers = response.headers_mut();
                if let Ok(content_type) = HeaderValue::from_str(self.mime.as_ref()) {
                    headers.insert(CONTENT_TYPE, content_type);
                }
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("public"));
                response
            }
            Err(e) => {
                warn!(path = %self.path.display(), cause = %e, "can't read static file");
                let mut response = Response::new(Bytes::from(e.to_string()));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF_8));
                response
            }
        }
    }
}

fn mime_for(path: &Path) -> Mime {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js" | "mjs") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("csv") => mime::TEXT_CSV_UTF_8,
        Some("xml") => mime::TEXT_XML,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("bmp") => mime::IMAGE_BMP,
        Some("svg") => mime::IMAGE_SVG,
        Some("woff") => mime::FONT_WOFF,
        Some("woff2") => mime::FONT_WOFF2,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_map_to_index() {
        let file = StaticFile::resolve(Path::new("public"), "/docs").unwrap();
        assert_eq!(file.path(), Path::new("public/docs/index.html"));
        assert_eq!(file.mime(), &mime::TEXT_HTML_UTF_8);
    }

    #[test]
    fn extension_picks_the_mime_type() {
        let file = StaticFile::resolve(Path::new("public"), "css/site.CSS").unwrap();
        assert_eq!(file.mime(), &mime::TEXT_CSS_UTF_8);
        let file = StaticFile::resolve(Path::new("public"), "blob.bin").unwrap();
        assert_eq!(file.mime(), &mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn parent_segments_are_rejected() {
        assert_eq!(StaticFile::resolve(Path::new("public"), "../secret.txt"), None);
        assert_eq!(StaticFile::resolve(Path::new("public"), "a/../../b.txt"), None);
    }

    #[tokio::test]
    async fn serves_existing_files_with_cache_control() {
        let dir = std::env::temp_dir().join(format!("micro-h2-web-static-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("hello.txt"), "hello static").await.unwrap();

        let response = StaticFile::resolve(&dir, "hello.txt").unwrap().serve().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.headers()[CACHE_CONTROL], "public");
        assert_eq!(response.body(), "hello static");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let response = StaticFile::resolve(Path::new("/definitely/not/here"), "nope.html").unwrap().serve().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.body().is_empty());
    }
}
