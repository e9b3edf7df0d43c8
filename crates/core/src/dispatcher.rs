//! The per-request pipeline.
//!
//! ```text
//! Routed ─► ControllerLookup ─► OperationLookup ─► ParameterBinding ─► Invoke ─► Respond ─► Closed
//!               │ miss                │ miss                │ error        │ error
//!               └─────────────────────┴─────────────────────┴──────────────┴──► Respond
//! ```
//!
//! Every request ends with exactly one envelope write and exactly one close,
//! except `Default/favicon.ico`, which is closed without an envelope and
//! without logging. Operations run on their own task so a panic inside one
//! becomes a failure envelope instead of tearing down the connection.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binder::bind;
use crate::catalog::{Catalog, Controller, OperationDescriptor};
use crate::envelope::{ResponseEnvelope, ResponseWriter, JSON_CONTENT_TYPE};
use crate::error::{BindingError, InvocationError, RegistryError};
use crate::events::EventLog;
use crate::request::IncomingRequest;
use crate::router::Route;
use crate::DEFAULT_CONTROLLER;

// ──────────────────────────────────────────────
// ControllerRegistry
// ──────────────────────────────────────────────

/// A registered controller and the catalog built from it.
pub struct RegisteredController {
    pub controller: Arc<dyn Controller>,
    pub catalog: Catalog,
}

/// Controllers of one service, keyed by name.
///
/// Populated during startup and read-only once the service is serving.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, RegisteredController>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `controller` under `name`; a blank name registers the
    /// default controller.
    ///
    /// The operation catalog is built here, so an invalid operation set
    /// fails registration rather than the first request.
    pub fn register(
        &mut self,
        name: &str,
        controller: Arc<dyn Controller>,
    ) -> Result<(), RegistryError> {
        let name = if name.trim().is_empty() {
            DEFAULT_CONTROLLER
        } else {
            name
        };
        if self.controllers.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        let catalog =
            Catalog::build(controller.as_ref()).map_err(|source| RegistryError::InvalidCatalog {
                controller: name.to_string(),
                source,
            })?;
        self.controllers.insert(
            name.to_string(),
            RegisteredController {
                controller,
                catalog,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), RegistryError> {
        self.controllers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredController> {
        self.controllers.get(name)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Registered controllers sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegisteredController)> {
        let mut entries: Vec<_> = self
            .controllers
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

// ──────────────────────────────────────────────
// Dispatcher
// ──────────────────────────────────────────────

/// How a dispatched request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `Default/favicon.ico`: closed with no envelope.
    Favicon,
    Success,
    ControllerNotFound,
    OperationNotFound,
    /// Binding or invocation failed.
    Failed,
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Runs the request pipeline for one service.
pub struct Dispatcher {
    service: String,
    registry: Arc<ControllerRegistry>,
    log: EventLog,
}

impl Dispatcher {
    pub fn new(service: impl Into<String>, registry: Arc<ControllerRegistry>, log: EventLog) -> Self {
        Dispatcher {
            service: service.into(),
            registry,
            log,
        }
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Handle one request, writing the outcome to `writer`.
    ///
    /// Never fails: every error becomes a failure envelope, and a failed
    /// write is logged as a warning. `writer` is closed exactly once.
    pub async fn dispatch<W>(&self, request: &IncomingRequest, writer: &mut W) -> DispatchOutcome
    where
        W: ResponseWriter + ?Sized,
    {
        let route = Route::resolve(&request.path);
        if route.is_favicon() {
            writer.close();
            return DispatchOutcome::Favicon;
        }

        self.log.info(format!(
            "[{}] Received request: {}",
            self.service,
            request.uri()
        ));
        writer.set_content_type(JSON_CONTENT_TYPE);

        let (outcome, envelope) = self.execute(&route, request).await;
        self.respond(&envelope, writer).await;
        writer.close();
        outcome
    }

    async fn execute(
        &self,
        route: &Route,
        request: &IncomingRequest,
    ) -> (DispatchOutcome, ResponseEnvelope) {
        let Some(entry) = self.registry.get(&route.controller) else {
            let message = format!("Controller '{}' does not exist", route.controller);
            self.log.warn(format!("[{}] {}", self.service, message));
            return (
                DispatchOutcome::ControllerNotFound,
                ResponseEnvelope::failure(message),
            );
        };

        let Some(descriptor) = entry.catalog.find_operation(&route.operation) else {
            let message = format!(
                "Controller '{}' does not support method '{}'",
                route.controller, route.operation
            );
            self.log.warn(format!("[{}] {}", self.service, message));
            return (
                DispatchOutcome::OperationNotFound,
                ResponseEnvelope::failure(message),
            );
        };

        match self.invoke(entry, descriptor, request).await {
            Ok(data) => (DispatchOutcome::Success, ResponseEnvelope::success(data)),
            Err(e) => (
                DispatchOutcome::Failed,
                ResponseEnvelope::failure(format!("An error occurred: {}", e)),
            ),
        }
    }

    async fn invoke(
        &self,
        entry: &RegisteredController,
        descriptor: &OperationDescriptor,
        request: &IncomingRequest,
    ) -> Result<serde_json::Value, DispatchError> {
        let args = bind(descriptor, request)?;

        let controller = Arc::clone(&entry.controller);
        let operation = descriptor.name.clone();
        let task = tokio::spawn(async move { controller.invoke(&operation, args).await });

        match task.await {
            Ok(result) => Ok(result?),
            Err(join_error) => Err(InvocationError::Aborted {
                operation: descriptor.name.clone(),
                message: panic_message(join_error),
            }
            .into()),
        }
    }

    async fn respond<W>(&self, envelope: &ResponseEnvelope, writer: &mut W)
    where
        W: ResponseWriter + ?Sized,
    {
        if let Err(e) = writer.write_all(&envelope.to_bytes()).await {
            self.log
                .warn(format!("[{}] Failed to write response: {}", self.service, e));
        }
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
