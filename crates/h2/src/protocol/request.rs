//! Turning a decoded request header list into an [`http::Request`].

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Method, Request, Uri, Version};

use crate::ensure;
use crate::hpack::HeaderField;

use super::message::RequestStream;
use super::{ErrorCode, H2Error};

/// Headers that only make sense hop-by-hop in HTTP/1.1.
pub(crate) const CONNECTION_SPECIFIC_HEADERS: [&str; 5] =
    ["connection", "keep-alive", "proxy-connection", "transfer-encoding", "upgrade"];

#[derive(Default)]
struct Pseudo {
    method: Option<String>,
    scheme: Option<String>,
    authority: Option<String>,
    path: Option<String>,
}

impl RequestStream {
    /// Validates the pseudo-headers and builds the request handed to the handler.
    ///
    /// A malformed request is a stream error; the connection carries on.
    pub fn into_request(self) -> Result<Request<Bytes>, H2Error> {
        let id = self.id;
        let malformed = |reason: String| H2Error::stream(id, ErrorCode::ProtocolError, reason);

        let mut pseudo = Pseudo::default();
        let mut builder = Request::builder().version(Version::HTTP_2);
        let mut regular_seen = false;

        for HeaderField { name: raw_name, value } in self.fields {
            let name = std::str::from_utf8(&raw_name).map_err(|_| malformed(format!("header name {raw_name:?} is not UTF-8")))?;
            if let Some(pseudo_name) = name.strip_prefix(':') {
                ensure!(!regular_seen, malformed(format!("pseudo-header {name} after regular headers")));
                let slot = match pseudo_name {
                    "method" => &mut pseudo.method,
                    "scheme" => &mut pseudo.scheme,
                    "authority" => &mut pseudo.authority,
                    "path" => &mut pseudo.path,
                    _ => return Err(malformed(format!("unknown pseudo-header {name}"))),
                };
                ensure!(slot.is_none(), malformed(format!("duplicate pseudo-header {name}")));
                let text = std::str::from_utf8(&value).map_err(|_| malformed(format!("{name} is not UTF-8")))?;
                *slot = Some(text.to_owned());
                continue;
            }

            regular_seen = true;
            ensure!(!name.bytes().any(|b| b.is_ascii_uppercase()), malformed(format!("uppercase header name {name}")));
            ensure!(!CONNECTION_SPECIFIC_HEADERS.contains(&name), malformed(format!("connection-specific header {name}")));
            ensure!(name != "te" || value == "trailers", malformed(format!("te: {value:?}")));

            let header_name = HeaderName::from_bytes(&raw_name).map_err(|e| malformed(format!("{name}: {e}")))?;
            let header_value = HeaderValue::from_maybe_shared(value).map_err(|e| malformed(format!("{name}: {e}")))?;
            builder = builder.header(header_name, header_value);
        }

        let method = pseudo.method.ok_or_else(|| malformed(":method is missing".into()))?;
        let path = pseudo.path.filter(|p| !p.is_empty()).ok_or_else(|| malformed(":path is missing".into()))?;

        let method = Method::from_bytes(method.as_bytes()).map_err(|e| malformed(format!(":method {method}: {e}")))?;
        let mut uri = Uri::builder().path_and_query(path.as_str());
        if let Some(authority) = pseudo.authority {
            uri = uri.scheme(pseudo.scheme.as_deref().unwrap_or("https")).authority(authority.as_str());
        }
        let uri = uri.build().map_err(|e| malformed(format!(":path {path}: {e}")))?;

        builder.method(method).uri(uri).body(self.body).map_err(|e| malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(fields: &[(&str, &str)], body: &'static [u8]) -> RequestStream {
        RequestStream {
            id: 1,
            fields: fields.iter().map(|(n, v)| HeaderField::new(*n, *v)).collect(),
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn builds_a_full_request() {
        let request = stream(
            &[
                (":method", "POST"),
                (":scheme", "https"),
                (":authority", "localhost:8443"),
                (":path", "/test?x=1"),
                ("content-type", "text/plain"),
            ],
            b"TEST",
        )
        .into_request()
        .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.version(), Version::HTTP_2);
        assert_eq!(request.uri().path(), "/test");
        assert_eq!(request.uri().query(), Some("x=1"));
        assert_eq!(request.uri().authority().unwrap().as_str(), "localhost:8443");
        assert_eq!(request.uri().scheme_str(), Some("https"));
        assert_eq!(request.headers()["content-type"], "text/plain");
        assert_eq!(request.body(), &Bytes::from_static(b"TEST"));
    }

    #[test]
    fn path_only_request() {
        let request = stream(&[(":method", "GET"), (":path", "/")], b"").into_request().unwrap();
        assert_eq!(request.uri(), "/");
    }

    #[test]
    fn obs_text_values_pass_through() {
        let mut request = stream(&[(":method", "GET"), (":path", "/")], b"");
        request.fields.push(HeaderField::new("x-legacy", b"caf\xe9"));

        let request = request.into_request().unwrap();
        assert_eq!(request.headers()["x-legacy"].as_bytes(), b"caf\xe9");
    }

    #[test]
    fn rejects_malformed_requests() {
        let cases: &[&[(&str, &str)]] = &[
            &[(":path", "/")],
            &[(":method", "GET")],
            &[(":method", "GET"), (":path", "")],
            &[(":method", "GET"), (":path", "/"), (":method", "POST")],
            &[(":method", "GET"), ("accept", "*/*"), (":path", "/")],
            &[(":method", "GET"), (":path", "/"), (":protocol", "websocket")],
            &[(":method", "GET"), (":path", "/"), ("Accept", "*/*")],
            &[(":method", "GET"), (":path", "/"), ("connection", "keep-alive")],
            &[(":method", "GET"), (":path", "/"), ("te", "gzip")],
        ];

        for fields in cases {
            let err = stream(fields, b"").into_request().unwrap_err();
            assert!(!err.is_connection_error(), "{fields:?}");
            assert_eq!(err.code(), ErrorCode::ProtocolError, "{fields:?}");
        }
    }
}
