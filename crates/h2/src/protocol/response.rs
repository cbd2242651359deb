use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Response, StatusCode};

use crate::hpack::HeaderField;

use super::request::CONNECTION_SPECIFIC_HEADERS;

/// Flattens a handler's response into `:status` plus regular header fields.
///
/// Connection-specific headers are dropped and `content-length` is filled in
/// for non-empty bodies that do not carry one.
pub fn response_fields(response: &Response<Bytes>) -> Vec<HeaderField> {
    let headers = response.headers();
    let mut fields = Vec::with_capacity(headers.len() + 2);
    fields.push(HeaderField::new(":status", response.status().as_str()));

    for (name, value) in headers {
        if CONNECTION_SPECIFIC_HEADERS.contains(&name.as_str()) {
            continue;
        }
        fields.push(HeaderField::new(name.as_str(), value.as_bytes()));
    }

    if !response.body().is_empty() && !headers.contains_key(CONTENT_LENGTH) {
        fields.push(HeaderField::new(CONTENT_LENGTH.as_str(), response.body().len().to_string()));
    }

    fields
}

/// The response sent when a handler fails or panics.
pub fn internal_server_error() -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_comes_first() {
        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("content-type", "text/plain; charset=utf-8")
            .body(Bytes::new())
            .unwrap();

        assert_eq!(
            response_fields(&response),
            vec![HeaderField::new(":status", "404"), HeaderField::new("content-type", "text/plain; charset=utf-8")]
        );
    }

    #[test]
    fn adds_content_length_and_strips_hop_by_hop() {
        let response = Response::builder()
            .header("connection", "keep-alive")
            .header("transfer-encoding", "chunked")
            .header("x-kept", "yes")
            .body(Bytes::from_static(b"Hello World"))
            .unwrap();

        assert_eq!(
            response_fields(&response),
            vec![
                HeaderField::new(":status", "200"),
                HeaderField::new("x-kept", "yes"),
                HeaderField::new("content-length", "11"),
            ]
        );
    }

    #[test]
    fn explicit_content_length_is_kept() {
        let response = Response::builder().header("content-length", "3").body(Bytes::from_static(b"abc")).unwrap();
        let lengths = response_fields(&response).into_iter().filter(|f| f.name == "content-length").count();
        assert_eq!(lengths, 1);
    }
}
