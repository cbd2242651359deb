//! Response handling module that converts handler results into HTTP responses.
//!
//! This module provides the [`Responder`] trait which defines how different types
//! can be converted into HTTP responses. It includes implementations for plain text,
//! JSON, HTML, status-code pairs, prebuilt responses, `Option`, `Result` and `()`.

use std::convert::Infallible;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;
use tracing::error;

/// A trait for types that can be converted into HTTP responses.
///
/// Types implementing this trait can be returned directly from request handlers
/// and will be automatically converted into HTTP responses.
pub trait Responder {
    fn response_to(self) -> Response<Bytes>;
}

pub(crate) const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";
const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Serializes the wrapped value as `application/json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

/// A `text/html` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html<T>(pub T);

fn with_content_type(body: Bytes, content_type: &'static str) -> Response<Bytes> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self) -> Response<Bytes> {
        match self {
            Ok(t) => t.response_to(),
            Err(e) => e.response_to(),
        }
    }
}

/// None case returns an empty response.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self) -> Response<Bytes> {
        match self {
            Some(t) => t.response_to(),
            None => Response::new(Bytes::new()),
        }
    }
}

impl Responder for Response<Bytes> {
    fn response_to(self) -> Response<Bytes> {
        self
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self) -> Response<Bytes> {
        let (status, responder) = self;
        let mut response = responder.response_to();
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn response_to(self) -> Response<Bytes> {
        let (responder, status) = self;
        (status, responder).response_to()
    }
}

impl Responder for () {
    fn response_to(self) -> Response<Bytes> {
        Response::new(Bytes::new())
    }
}

impl Responder for &'static str {
    fn response_to(self) -> Response<Bytes> {
        with_content_type(Bytes::from_static(self.as_bytes()), TEXT_PLAIN_UTF_8)
    }
}

impl Responder for String {
    fn response_to(self) -> Response<Bytes> {
        with_content_type(Bytes::from(self), TEXT_PLAIN_UTF_8)
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn response_to(self) -> Response<Bytes> {
        match serde_json::to_vec(&self.0) {
            Ok(body) => with_content_type(Bytes::from(body), APPLICATION_JSON),
            Err(e) => {
                error!(cause = %e, "can't serialize json response");
                (StatusCode::INTERNAL_SERVER_ERROR, ()).response_to()
            }
        }
    }
}

impl<T: Into<String>> Responder for Html<T> {
    fn response_to(self) -> Response<Bytes> {
        with_content_type(Bytes::from(self.0.into()), TEXT_HTML_UTF_8)
    }
}

impl Responder for Infallible {
    fn response_to(self) -> Response<Bytes> {
        match self {}
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;

    use super::*;

    #[test]
    fn text_is_plain_utf8() {
        let response = "hello".response_to();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.body(), "hello");
    }

    #[test]
    fn content_types_agree_with_mime() {
        assert_eq!(TEXT_PLAIN_UTF_8, mime::TEXT_PLAIN_UTF_8.as_ref());
        assert_eq!(TEXT_HTML_UTF_8, mime::TEXT_HTML_UTF_8.as_ref());
        assert_eq!(APPLICATION_JSON, mime::APPLICATION_JSON.as_ref());
    }

    #[test]
    fn json_body_and_content_type() {
        let mut result = BTreeMap::new();
        result.insert("Result", "TEST_RESULT");

        let response = Json(result).response_to();
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body(), r#"{"Result":"TEST_RESULT"}"#);
    }

    #[test]
    fn html_content_type() {
        let page = indoc! {"
            <html>
              <body>hi</body>
            </html>
        "};
        let response = Html(page).response_to();
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(response.body(), page);
    }

    #[test]
    fn status_pairs_override_the_status() {
        let response = (StatusCode::CREATED, "made").response_to();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = ((), StatusCode::NO_CONTENT).response_to();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_empty());
    }

    #[test]
    fn result_uses_either_side() {
        let ok: Result<&'static str, (StatusCode, &'static str)> = Ok("fine");
        assert_eq!(ok.response_to().status(), StatusCode::OK);

        let err: Result<&'static str, (StatusCode, &'static str)> = Err((StatusCode::BAD_REQUEST, "bad"));
        assert_eq!(err.response_to().status(), StatusCode::BAD_REQUEST);
    }
}
