//! The `{success, responseData}` response envelope and the response
//! stream it is written to.

use std::io;

use async_trait::async_trait;
use serde::Serialize;

/// Content type of every enveloped response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Uniform response body for every dispatched request.
///
/// Failures are signalled only through `success`; the HTTP status stays at
/// the listener's default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,
    pub response_data: serde_json::Value,
}

impl ResponseEnvelope {
    pub fn success(response_data: serde_json::Value) -> Self {
        ResponseEnvelope {
            success: true,
            response_data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ResponseEnvelope {
            success: false,
            response_data: serde_json::Value::String(message.into()),
        }
    }

    /// The serialized envelope. Never fails: if the payload cannot be
    /// serialized, the bytes of a failure envelope naming the error are
    /// returned instead.
    pub fn to_bytes(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = serde_json::Value::String(format!("An error occurred: {}", e));
                format!(r#"{{"success":false,"responseData":{}}}"#, message).into_bytes()
            }
        }
    }
}

/// The output side of one request.
///
/// The dispatcher sets the content type, writes the whole envelope in a
/// single [`write_all`](Self::write_all), and calls [`close`](Self::close)
/// exactly once on every path.
#[async_trait]
pub trait ResponseWriter: Send {
    fn set_content_type(&mut self, content_type: &'static str);

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn close(&mut self);
}

/// A [`ResponseWriter`] that collects the response in memory, for a
/// transport that sends the response once the dispatcher is done.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    content_type: Option<&'static str>,
    body: Vec<u8>,
    closes: usize,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// How many times the stream was closed.
    pub fn close_count(&self) -> usize {
        self.closes
    }

    pub fn is_closed(&self) -> bool {
        self.closes > 0
    }

    /// The written body parsed back into an envelope, if one was written.
    pub fn envelope(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn into_parts(self) -> (Option<&'static str>, Vec<u8>) {
        (self.content_type, self.body)
    }
}

#[async_trait]
impl ResponseWriter for BufferedResponse {
    fn set_content_type(&mut self, content_type: &'static str) {
        self.content_type = Some(content_type);
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closes > 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "response stream already closed",
            ));
        }
        self.body.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}
