//! Dynamic dependency lifecycle management for components.
//!
//! A [`DependencyManager`] owns the dependency slots of one component
//! instance. Each slot is described by a shared [`DependencyDescriptor`] and
//! tracks one [`RefPair`] per matching provider. Provider events are applied
//! as serialized transitions: selection re-runs, the slot callback receives
//! a [`Delivery`], and the component is started or stopped through its
//! [`Container`] so that start follows every required binding and stop
//! precedes every required unbinding.

mod capability;
mod config;
mod coordinator;
mod descriptor;
mod error;
mod manager;
mod ref_pair;
mod slot;

pub use capability::LazyCapability;
pub use config::{ActivationConfig, ManagerConfig, RetryConfig};
pub use descriptor::{Absence, BindingPolicy, Cardinality, DependencyDescriptor, DependencyKind};
pub use error::{ActivationError, CallbackError, CapabilityUnavailable, ConfigError, DependencyError, ResolutionError};
pub use manager::{ComponentState, Container, DependencyManager, DependencyManagerBuilder};
pub use ref_pair::{PairSource, ProviderSource, RefPair};
pub use slot::{Binding, DefaultSupplier, Delivery, SlotCallback, SlotSnapshot, SlotSpec, SlotState};

/// Name of one component instance, used in logs and container calls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(String);

impl ComponentId {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for ComponentId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ComponentId {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for ComponentId {
	fn from(name: String) -> Self {
		Self(name)
	}
}
