//! Path to (controller, operation) resolution.
//!
//! The path is split on `/` with empty segments discarded:
//! - no segments: `Default/Index`
//! - one segment: `Default/{segment}`
//! - two or more: `{first}/{second}`, further segments ignored
//!
//! Segments are percent-decoded.

use percent_encoding::percent_decode_str;

use crate::{DEFAULT_CONTROLLER, DEFAULT_OPERATION};

/// Browsers probe this on every page load; it is answered without dispatch.
const FAVICON: &str = "favicon.ico";

/// The resolved (controller, operation) pair for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub controller: String,
    pub operation: String,
}

impl Route {
    /// Resolve a request path (without its query string).
    pub fn resolve(path: &str) -> Route {
        let mut segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned());

        match (segments.next(), segments.next()) {
            (None, _) => Route::new(DEFAULT_CONTROLLER, DEFAULT_OPERATION),
            (Some(operation), None) => Route::new(DEFAULT_CONTROLLER, operation),
            (Some(controller), Some(operation)) => Route::new(controller, operation),
        }
    }

    pub fn new(controller: impl Into<String>, operation: impl Into<String>) -> Self {
        Route {
            controller: controller.into(),
            operation: operation.into(),
        }
    }

    /// `Default/favicon.ico`, the one route answered with an empty response.
    pub fn is_favicon(&self) -> bool {
        self.controller == DEFAULT_CONTROLLER && self.operation == FAVICON
    }
}
