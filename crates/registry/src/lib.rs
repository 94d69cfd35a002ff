//! Collaborator boundary for tether dependency managers.
//!
//! This crate defines everything a dependency manager consumes from the outside world:
//! - [`ProviderId`] / [`ProviderRef`]: opaque provider identity plus ranking
//! - [`ProviderEvent`]: registry notifications delivered over a [`ProviderStream`]
//! - [`ServiceRegistry`]: publish/lookup/acquire contract for services
//! - [`ConfigurationStore`]: typed configuration supply keyed by PID
//! - [`MemoryRegistry`] / [`MemoryConfigurationStore`]: in-process implementations

mod configuration;
mod criteria;
mod error;
mod event;
mod memory;
mod provider;
mod service;

pub use configuration::{Configuration, ConfigurationStore, Properties};
pub use criteria::Criteria;
pub use error::AcquisitionError;
pub use event::{ProviderEvent, ProviderStream};
pub use memory::{MemoryConfigurationStore, MemoryRegistry, ServiceFactory};
pub use provider::{ContextId, ProviderId, ProviderRef, Rank};
pub use service::ServiceRegistry;
