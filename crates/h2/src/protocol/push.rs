//! Server push requests attached to a response.

use bytes::Bytes;
use http::{Method, Request, Uri, Version};

use crate::hpack::HeaderField;

/// One resource a handler wants pushed alongside its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub method: Method,
    pub path: String,
    pub authority: String,
    pub scheme: String,
}

impl PushRequest {
    pub fn get<P: Into<String>, A: Into<String>, S: Into<String>>(path: P, authority: A, scheme: S) -> Self {
        Self { method: Method::GET, path: path.into(), authority: authority.into(), scheme: scheme.into() }
    }

    /// Only safe, cacheable methods may be promised.
    pub fn is_pushable(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// The request header block carried by PUSH_PROMISE.
    pub fn fields(&self) -> Vec<HeaderField> {
        vec![
            HeaderField::new(":method", self.method.as_str()),
            HeaderField::new(":scheme", self.scheme.as_str()),
            HeaderField::new(":authority", self.authority.as_str()),
            HeaderField::new(":path", self.path.as_str()),
        ]
    }

    /// The synthesized request the pushed response is built from.
    pub fn to_request(&self) -> Result<Request<Bytes>, http::Error> {
        let uri = Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(self.path.as_str())
            .build()?;
        Request::builder().method(self.method.clone()).uri(uri).version(Version::HTTP_2).body(Bytes::new())
    }
}

/// Response extension listing the pushes a handler asked for.
///
/// Handlers add to it; the dispatcher removes it before the response is encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushRequests(Vec<PushRequest>);

impl PushRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PushRequest) {
        self.0.push(request);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PushRequest> {
        self.0.iter()
    }
}

impl IntoIterator for PushRequests {
    type Item = PushRequest;
    type IntoIter = std::vec::IntoIter<PushRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
