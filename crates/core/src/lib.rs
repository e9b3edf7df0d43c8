//! resthost-core: routing, parameter binding and dispatch for the resthost
//! REST host.
//!
//! A request path is resolved to a (controller, operation) pair, the
//! operation is looked up in the controller's [`Catalog`], request
//! parameters are coerced into its declared argument types, and the result
//! is written back as a uniform JSON [`ResponseEnvelope`].
//!
//! # Public API
//!
//! - [`Route`] -- path to (controller, operation) resolution
//! - [`Controller`], [`OperationTable`], [`Catalog`] -- the operation catalog seam
//! - [`bind`], [`ParameterMap`] -- request parameter binding
//! - [`Dispatcher`], [`ControllerRegistry`] -- the per-request pipeline
//! - [`EventLog`], [`LogSink`] -- leveled log broadcast with forwarding

/// Controller used when the path names no controller.
pub const DEFAULT_CONTROLLER: &str = "Default";
/// Operation used when the path names no operation.
pub const DEFAULT_OPERATION: &str = "Index";

pub mod binder;
pub mod catalog;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod events;
pub mod request;
pub mod router;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use binder::{bind, ParameterMap};
pub use catalog::{
    Arguments, Catalog, Controller, OperationDescriptor, OperationTable, ParamSpec,
};
pub use dispatcher::{ControllerRegistry, DispatchOutcome, Dispatcher, RegisteredController};
pub use envelope::{BufferedResponse, ResponseEnvelope, ResponseWriter, JSON_CONTENT_TYPE};
pub use error::{BindingError, CatalogError, InvocationError, RegistryError, TypeMismatch};
pub use events::{EventLog, LogEvent, LogLevel, LogSink, RecordingSink};
pub use request::IncomingRequest;
pub use router::Route;
pub use value::{coerce, zero_value, FromValue, ParamType, Value};
