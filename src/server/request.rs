use cookie::Cookie;
use http::header::COOKIE;
use http::{HeaderMap, Method, Uri};
use tracing::debug;

use crate::dispatcher::ConvertError;

/// Fully buffered inbound request as handed over by the transport.
pub type HttpRequest = http::Request<Vec<u8>>;

/// Request metadata an input event keeps for its handler: everything but the body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub cookies: Vec<Cookie<'static>>,
}

impl RequestHead {
    #[must_use]
    pub fn from_request(req: &HttpRequest) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            cookies: parse_cookies(req.headers()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// First cookie called `name`.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.value())
    }
}

/// Every cookie from every `Cookie` header, in arrival order.
///
/// Duplicate names are kept: the session layer tries each in turn. Pairs that
/// fail to parse are skipped.
#[must_use]
pub fn parse_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    let mut cookies = Vec::new();
    for value in headers.get_all(COOKIE) {
        let Ok(raw) = value.to_str() else {
            debug!("skipping non-ascii cookie header");
            continue;
        };
        cookies.extend(
            Cookie::split_parse(raw)
                .filter_map(Result::ok)
                .map(Cookie::into_owned),
        );
    }
    cookies
}

/// The request body, provided it fits in `limit` bytes.
///
/// # Errors
///
/// [`ConvertError::BodyTooLarge`] when the body exceeds `limit`. Nothing is
/// truncated.
pub fn read_body(req: &HttpRequest, limit: usize) -> Result<&[u8], ConvertError> {
    let body = req.body();
    if body.len() > limit {
        return Err(ConvertError::BodyTooLarge { limit });
    }
    Ok(body)
}
