use thiserror::Error;

use crate::ProviderId;

/// A provider claimed to be available but could not be materialized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
	/// The provider is no longer registered.
	#[error("{0} is no longer registered")]
	Unregistered(ProviderId),
	/// The provider's factory failed.
	#[error("{provider} failed to produce a service: {reason}")]
	Factory { provider: ProviderId, reason: String },
	/// No configuration exists for the PID.
	#[error("no configuration for pid {0:?}")]
	MissingConfiguration(String),
	/// Configuration properties did not decode into the requested type.
	#[error("configuration {pid:?} could not be decoded: {reason}")]
	Decode { pid: String, reason: String },
}
