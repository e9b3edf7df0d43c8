//! Compiled-in controller provisioning.
//!
//! The host does not load code at runtime. Controller types are registered
//! here under a type name, and the configuration refers to them by that
//! name; each registration is a factory producing a fresh instance.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use resthost_core::Controller;

/// Builds one controller instance.
pub type ControllerFactory = Box<dyn Fn() -> Arc<dyn Controller> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("Controller type '{0}' already defined")]
    DuplicateType(String),
}

/// Controller factories keyed by type name.
#[derive(Default)]
pub struct Provisioner {
    factories: BTreeMap<String, ControllerFactory>,
}

impl Provisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> Result<(), ProvisionError>
    where
        F: Fn() -> Arc<dyn Controller> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.factories.contains_key(&type_name) {
            return Err(ProvisionError::DuplicateType(type_name));
        }
        self.factories.insert(type_name, Box::new(factory));
        Ok(())
    }

    /// A new instance of `type_name`, if it is registered.
    pub fn create(&self, type_name: &str) -> Option<Arc<dyn Controller>> {
        self.factories.get(type_name).map(|factory| factory())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
