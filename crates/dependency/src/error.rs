use std::time::Duration;

use tether_registry::{AcquisitionError, ProviderId};
use thiserror::Error;

use crate::ComponentId;

/// Failure to materialize a reference pair's value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
	/// The pair was retired before or during materialization.
	#[error("{provider} was already withdrawn")]
	AlreadyDeleted { provider: ProviderId },
	/// The provider could not produce a value. The pair is now marked failed.
	#[error("acquiring {provider} failed")]
	Acquisition {
		provider: ProviderId,
		#[source]
		source: AcquisitionError,
	},
}

impl ResolutionError {
	pub fn provider(&self) -> ProviderId {
		match self {
			Self::AlreadyDeleted { provider } | Self::Acquisition { provider, .. } => *provider,
		}
	}
}

/// A consumer callback rejected a delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("callback failed: {message}")]
pub struct CallbackError {
	message: String,
}

impl CallbackError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// The container refused to activate a component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("activation refused: {reason}")]
pub struct ActivationError {
	reason: String,
}

impl ActivationError {
	pub fn new(reason: impl Into<String>) -> Self {
		Self { reason: reason.into() }
	}

	pub fn reason(&self) -> &str {
		&self.reason
	}
}

/// An optional backing capability is not present.
///
/// This is an expected negative result, not a fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("capability {capability} is unavailable")]
pub struct CapabilityUnavailable {
	pub capability: &'static str,
}

/// Manager configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("reading {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("parsing manager config: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Errors surfaced by the dependency manager API.
#[derive(Error, Debug)]
pub enum DependencyError {
	/// No slot with this name is declared on the component.
	#[error("unknown dependency slot: {0}")]
	UnknownSlot(String),
	/// Two slots share a name.
	#[error("duplicate dependency slot: {0}")]
	DuplicateSlot(String),
	/// A slot substitutes defaults but has no default supplier.
	#[error("dependency slot {0} substitutes defaults but has no default supplier")]
	MissingDefault(String),
	/// The component did not become active in time and was abandoned.
	#[error("component {component} did not activate within {timeout:?}")]
	ActivationTimedOut { component: ComponentId, timeout: Duration },
	/// The component has been disposed.
	#[error("component {0} is disposed")]
	Disposed(ComponentId),
	#[error(transparent)]
	Config(#[from] ConfigError),
}
