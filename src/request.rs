//! Request and response payload shapes delivered by the host framework's
//! lifecycle notifications.

use http::{header, uri::Scheme, HeaderMap, Method, StatusCode};

use crate::route::RouteData;

/// The inbound request facets exposed by a start notification.
#[derive(Clone, Debug)]
pub struct ServerRequest {
    /// HTTP request method.
    pub method: Method,
    /// URI scheme the request arrived on.
    pub scheme: Scheme,
    /// Host name, without port.
    pub host: String,
    /// Port the request was received on.
    pub port: u16,
    /// Absolute request path.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Request headers, also the carrier for context propagation.
    pub headers: HeaderMap,
    /// Route metadata, when the router matched one.
    pub route: Option<RouteData>,
}

impl ServerRequest {
    /// Creates a request from its address facets, with no headers, query
    /// string or route data.
    pub fn new(
        method: Method,
        scheme: Scheme,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        ServerRequest {
            method,
            scheme,
            host: host.into(),
            port,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            route: None,
        }
    }

    /// The `User-Agent` header value, when present and valid ASCII.
    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
    }
}

/// The outbound response facets exposed by a stop notification.
#[derive(Clone, Debug)]
pub struct ServerResponse {
    /// HTTP response status code.
    pub status: StatusCode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn user_agent_reads_the_header() {
        let mut request = ServerRequest::new(Method::GET, Scheme::HTTP, "localhost", 80, "/");
        assert_eq!(request.user_agent(), None);

        request
            .headers
            .insert(header::USER_AGENT, HeaderValue::from_static("Test"));
        assert_eq!(request.user_agent(), Some("Test"));
    }
}
