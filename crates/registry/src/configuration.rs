use crate::{ProviderId, ProviderStream};

/// Untyped configuration properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One configuration object as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
	pub pid: String,
	/// Provider identity of this configuration object. Stable across updates.
	pub provider: ProviderId,
	/// Bumped on every property update.
	pub revision: u64,
	pub properties: Properties,
}

/// Configuration supply consumed by dependency managers.
///
/// Each stored configuration object behaves as a provider: creation emits
/// `Added`, property updates emit `Modified`, deletion emits `Removed`.
pub trait ConfigurationStore: Send + Sync + 'static {
	/// Returns the current configuration for `pid`, if any.
	fn get_configuration(&self, pid: &str) -> Option<Configuration>;

	/// Subscribes to configuration changes for `pid`, replaying the current object.
	fn subscribe(&self, pid: &str) -> ProviderStream;
}
