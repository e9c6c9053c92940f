//! HTTP request and response types exchanged with the transport.
//!
//! # Design
//! Requests and responses are plain data. `SnapdClient::build_*` methods
//! produce an `HttpRequest` without touching the socket, and
//! `SnapdClient::parse_response` consumes an `HttpResponse`. Only the
//! `Transport` implementation performs I/O, so every request shape can be
//! asserted on directly in tests.
//!
//! The path is kept relative (`snaps/hello`) together with the API version;
//! `HttpRequest::target` composes the `/v<version>/<path>?<query>` form that
//! goes on the wire.

use crate::multipart::MultipartForm;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// The payload of a request. JSON and multipart bodies are mutually
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Serialized JSON text.
    Json(String),

    /// A `multipart/form-data` payload, encoded on send.
    Multipart(MultipartForm),
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// API version, rendered as the `v<version>` path prefix.
    pub version: String,
    /// Path relative to the version prefix, without a leading slash.
    pub path: String,
    /// Query parameters in insertion order. Keys are unique.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// The request target as sent on the wire: `/v<version>/<path>`, plus
    /// the urlencoded query when there is one.
    pub fn target(&self) -> String {
        let mut target = format!("/v{}/{}", self.version, self.path);

        if !self.query.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();

            target.push('?');
            target.push_str(&query);
        }

        target
    }

    /// Appends a query parameter, replacing an earlier value for `key`.
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn json_body(&self) -> Option<&str> {
        match &self.body {
            Some(RequestBody::Json(json)) => Some(json),
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&MultipartForm> {
        match &self.body {
            Some(RequestBody::Multipart(form)) => Some(form),
            _ => None,
        }
    }
}

/// An HTTP response with its body fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
