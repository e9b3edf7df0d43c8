//! The transport-independent view of one HTTP request.

/// What the dispatcher needs from a request: method, path, raw query
/// string and raw body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRequest {
    pub method: String,
    /// Request path without the query string, still percent-encoded.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub body: Vec<u8>,
}

impl IncomingRequest {
    /// A request for `uri`, where `uri` is a path with an optional `?query`.
    pub fn new(method: impl Into<String>, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        IncomingRequest {
            method: method.into(),
            path,
            query,
            body: Vec::new(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: &str, body: impl Into<Vec<u8>>) -> Self {
        IncomingRequest {
            body: body.into(),
            ..Self::new("POST", uri)
        }
    }

    /// Path and query as received, for log lines.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}
