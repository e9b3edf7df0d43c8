//! Error types for catalog construction, registration, binding and invocation.

/// A raw request value could not be converted to its declared type,
/// or the request parameters could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// The raw string is not a valid literal of the declared type.
    #[error("'{raw}' is not a valid {expected}")]
    InvalidValue { raw: String, expected: String },

    /// The raw string is out of range for the declared numeric width.
    #[error("'{raw}' is out of range for {expected}")]
    OutOfRange { raw: String, expected: String },

    /// Coercion failed for a named formal parameter.
    #[error("parameter '{name}': {source}")]
    Parameter {
        name: String,
        #[source]
        source: Box<BindingError>,
    },

    /// The same key appeared in both the query string and the POST body.
    #[error("parameter '{0}' is supplied by both the query string and the request body")]
    DuplicateParameter(String),

    /// The POST body is not UTF-8 text.
    #[error("request body is not valid UTF-8")]
    InvalidBody,
}

impl BindingError {
    /// Attach the formal parameter name to a coercion failure.
    pub fn for_parameter(self, name: &str) -> Self {
        BindingError::Parameter {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}

/// A bound [`Value`](crate::Value) does not fit the Rust type an operation asked for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

/// An operation body failed.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The operation asked for an argument that was never bound.
    #[error("argument '{0}' was not bound")]
    MissingArgument(String),

    /// A bound argument could not be read as the requested type.
    #[error("argument '{name}': {source}")]
    Argument {
        name: String,
        #[source]
        source: TypeMismatch,
    },

    /// The controller was asked for an operation it does not implement.
    #[error("operation '{0}' is not implemented")]
    UnknownOperation(String),

    /// The operation panicked or its task was torn down.
    #[error("operation '{operation}' aborted: {message}")]
    Aborted { operation: String, message: String },

    /// The operation result could not be serialized to JSON.
    #[error("result could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The operation reported a failure of its own.
    #[error("{0}")]
    Failed(String),
}

impl InvocationError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        InvocationError::Failed(message.to_string())
    }
}

/// A controller's operation set is not a valid catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("operation names must not be empty")]
    EmptyOperationName,

    /// Two operations share a name; lookups would be ambiguous.
    #[error("operation '{0}' is declared more than once")]
    DuplicateOperation(String),

    #[error("operation '{operation}' declares parameter '{parameter}' more than once")]
    DuplicateParameter {
        operation: String,
        parameter: String,
    },
}

/// Controller registration failed. Always a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Controller '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("Controller '{0}' not registered")]
    NotRegistered(String),

    #[error("Controller '{controller}' has an invalid operation set: {source}")]
    InvalidCatalog {
        controller: String,
        #[source]
        source: CatalogError,
    },
}
