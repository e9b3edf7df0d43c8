//! resthost-server: HTTP listeners and the multi-service host.
//!
//! A [`WebService`] owns the bound addresses and controllers of one named
//! service and runs its accept loops on `axum` + `tokio`. A [`ServiceHost`]
//! builds services from a [`HostConfig`] and a [`Provisioner`], and
//! aggregates every service's log events into one [`EventLog`](resthost_core::EventLog).

pub mod config;
pub mod host;
pub mod provision;
pub mod service;

pub use config::{read_host_config, ConfigError, ControllerConfig, HostConfig, ServiceConfig};
pub use host::{HostError, ServiceHost};
pub use provision::{ControllerFactory, ProvisionError, Provisioner};
pub use service::{ServiceError, ServiceState, WebService};
