use http::header::HOST;
use http::{Request, Response};
use micro_h2::protocol::{PushRequest, PushRequests};

/// Asks the connection to push a resource along with this response.
///
/// The pushed request is a GET with the scheme and authority of the request
/// being answered. Pushes are dropped silently when the client disabled them.
///
/// ```
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use micro_h2_web::PushExt;
///
/// async fn index(req: Request<Bytes>) -> Response<Bytes> {
///     let mut response = Response::new(Bytes::from_static(b"<link rel=stylesheet href=/site.css>"));
///     response.push(&req, "/site.css");
///     response
/// }
/// ```
pub trait PushExt {
    fn push<B>(&mut self, request: &Request<B>, path: impl Into<String>);
}

impl<T> PushExt for Response<T> {
    fn push<B>(&mut self, request: &Request<B>, path: impl Into<String>) {
        let uri = request.uri();
        let scheme = uri.scheme_str().unwrap_or("https");
        let authority = match uri.authority() {
            Some(authority) => authority.as_str(),
            None => request.headers().get(HOST).and_then(|host| host.to_str().ok()).unwrap_or_default(),
        };

        let push = PushRequest::get(path, authority, scheme);
        match self.extensions_mut().get_mut::<PushRequests>() {
            Some(pushes) => pushes.push(push),
            None => {
                let mut pushes = PushRequests::new();
                pushes.push(push);
                self.extensions_mut().insert(pushes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn push_inherits_scheme_and_authority() {
        let request = Request::builder().uri("http://example.com/").body(Bytes::new()).unwrap();
        let mut response = Response::new(Bytes::new());
        response.push(&request, "/a.css");
        response.push(&request, "/b.js");

        let pushes = response.extensions().get::<PushRequests>().unwrap();
        let pushed: Vec<_> = pushes.iter().collect();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0], &PushRequest::get("/a.css", "example.com", "http"));
        assert_eq!(pushed[1].path, "/b.js");
    }

    #[test]
    fn authority_falls_back_to_host_header() {
        let request = Request::builder().uri("/").header(HOST, "localhost:8443").body(()).unwrap();
        let mut response = Response::new(());
        response.push(&request, "/logo.png");

        let pushes = response.extensions().get::<PushRequests>().unwrap();
        assert_eq!(pushes.iter().next(), Some(&PushRequest::get("/logo.png", "localhost:8443", "https")));
    }
}
