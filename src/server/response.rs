use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

/// Anything a session cookie or dispatcher outcome can be written into.
pub trait ResponseWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap;
    fn set_status(&mut self, status: StatusCode);
    fn write_body(&mut self, body: Vec<u8>);
}

/// Response under construction for one request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl HttpResponse {
    /// Write a failure status with its canonical reason as a plain-text body.
    ///
    /// Headers already set (e.g. a fresh `Set-Cookie`) are kept.
    pub fn write_status_text(&mut self, status: StatusCode) {
        self.status = status;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        self.body = status.canonical_reason().unwrap_or("").as_bytes().to_vec();
    }

    #[must_use]
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut res = http::Response::new(self.body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseWriter for HttpResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }
}
