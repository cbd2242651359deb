//! Path parameters captured by the router, and the query string.
//!
//! The router stores a [`PathParams`] in the request extensions before a handler
//! runs, so handlers read them with [`PathParams::from_request`]. The query string
//! is read through [`QueryExt`].

use std::collections::HashMap;

use http::Request;
use matchit::Params;
use serde::de::DeserializeOwned;

/// Named segments matched by a route such as `/api/{msg}`.
///
/// Values are owned: the request handed to a handler outlives the router lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The parameters the router attached to `request`, or an empty set.
    pub fn from_request<B>(request: &Request<B>) -> &PathParams {
        static EMPTY: PathParams = PathParams { params: Vec::new() };
        request.extensions().get::<PathParams>().unwrap_or(&EMPTY)
    }
}

impl From<Params<'_, '_>> for PathParams {
    fn from(params: Params<'_, '_>) -> Self {
        Self { params: params.iter().map(|(name, value)| (name.to_string(), value.to_string())).collect() }
    }
}

/// Typed access to the request's query string.
pub trait QueryExt {
    /// Deserializes the query string with serde_qs; a request without one reads as empty.
    fn query<T: DeserializeOwned>(&self) -> Result<T, serde_qs::Error>;

    /// The percent-decoded value of one flat query parameter.
    fn query_param(&self, name: &str) -> Option<String> {
        self.query::<HashMap<String, String>>().ok()?.remove(name)
    }
}

impl<B> QueryExt for Request<B> {
    fn query<T: DeserializeOwned>(&self) -> Result<T, serde_qs::Error> {
        serde_qs::from_str(self.uri().query().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[test]
    fn reads_params_from_matchit() {
        let mut router = matchit::Router::new();
        router.insert("/api/{msg}/{id}", ()).unwrap();
        let matched = router.at("/api/hello/7").unwrap();

        let params = PathParams::from(matched.params);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("msg"), Some("hello"));
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn missing_extension_is_empty() {
        let request = Request::new(());
        assert!(PathParams::from_request(&request).is_empty());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Page {
        name: String,
        #[serde(default)]
        size: Option<u32>,
    }

    #[test]
    fn query_deserializes_into_a_struct() {
        let request = Request::builder().uri("/search?name=hello%20world&size=20").body(()).unwrap();
        assert_eq!(request.query::<Page>().unwrap(), Page { name: "hello world".into(), size: Some(20) });
        assert_eq!(request.query_param("name").as_deref(), Some("hello world"));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn missing_query_reads_as_empty() {
        let request = Request::builder().uri("/search").body(()).unwrap();
        assert!(request.query::<Page>().is_err());
        assert!(request.query::<HashMap<String, String>>().unwrap().is_empty());
        assert_eq!(request.query_param("name"), None);
    }
}
