//! The multi-service host.
//!
//! Builds every configured [`WebService`], registers its controllers from
//! the [`Provisioner`], and starts or stops services as a group or by name.
//! Each service logs through a child of the host log, so the sinks given to
//! [`ServiceHost::new`] see everything.

use std::sync::Arc;

use resthost_core::{EventLog, LogSink};

use crate::config::{HostConfig, ServiceConfig};
use crate::provision::Provisioner;
use crate::service::{ServiceError, WebService};

const HOST_SOURCE: &str = "host";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The configuration cannot produce a runnable host.
    #[error("{0}")]
    Configuration(String),

    #[error("Service '{0}' does not exist")]
    UnknownService(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub struct ServiceHost {
    services: Vec<WebService>,
    log: EventLog,
}

impl ServiceHost {
    /// Build every configured service. Nothing is bound until [`start`](Self::start).
    pub fn new(
        config: &HostConfig,
        provisioner: &Provisioner,
        sinks: Vec<Arc<dyn LogSink>>,
    ) -> Result<Self, HostError> {
        let mut host = ServiceHost {
            services: Vec::with_capacity(config.services.len()),
            log: EventLog::new(HOST_SOURCE, sinks),
        };
        for service in &config.services {
            host.create_service(service, provisioner)?;
        }
        Ok(host)
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn services(&self) -> &[WebService] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&WebService> {
        self.services.iter().find(|service| service.name() == name)
    }

    /// Start every service, or only `name`.
    ///
    /// Starting everything is all-or-nothing: if one service fails to
    /// start, the services started before it are stopped again.
    pub async fn start(&mut self, name: Option<&str>) -> Result<(), HostError> {
        if let Some(name) = name {
            let index = self.index_of(name)?;
            return Ok(self.services[index].start().await?);
        }

        for index in 0..self.services.len() {
            if let Err(e) = self.services[index].start().await {
                for started in &mut self.services[..index] {
                    let _ = started.stop();
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Stop every listening service, or only `name`.
    pub fn stop(&mut self, name: Option<&str>) -> Result<(), HostError> {
        if let Some(name) = name {
            let index = self.index_of(name)?;
            return Ok(self.services[index].stop()?);
        }

        for service in self.services.iter_mut().filter(|s| s.is_listening()) {
            service.stop()?;
        }
        Ok(())
    }

    fn create_service(
        &mut self,
        config: &ServiceConfig,
        provisioner: &Provisioner,
    ) -> Result<(), HostError> {
        self.log.info(format!("Creating service '{}'", config.name));
        self.fail_if(
            self.service(&config.name).is_some(),
            format!("Service '{}' already defined", config.name),
        )?;

        let log = EventLog::forward_to(config.name.clone(), &self.log);
        let mut service = WebService::new(config.name.clone(), config.urls.iter().cloned(), log);

        for controller in &config.controllers {
            self.log
                .info(format!("Registering controller '{}'", controller.name));
            let Some(instance) = provisioner.create(&controller.type_name) else {
                return Err(self.configuration_error(format!(
                    "Controller type '{}' not defined",
                    controller.type_name
                )));
            };
            if let Err(e) = service.register_controller(&controller.name, instance) {
                return Err(self.configuration_error(e.to_string()));
            }
        }

        self.services.push(service);
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, HostError> {
        match self.services.iter().position(|s| s.name() == name) {
            Some(index) => Ok(index),
            None => {
                let e = HostError::UnknownService(name.to_string());
                self.log.error(e.to_string());
                Err(e)
            }
        }
    }

    fn fail_if(&self, condition: bool, message: String) -> Result<(), HostError> {
        if condition {
            Err(self.configuration_error(message))
        } else {
            Ok(())
        }
    }

    /// Log at Error level, then hand back the error to return.
    fn configuration_error(&self, message: String) -> HostError {
        self.log.error(message.clone());
        HostError::Configuration(message)
    }
}
