use tokio::sync::mpsc;

use crate::{ProviderId, ProviderRef};

/// Registry notification for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
	/// A matching provider was published.
	Added(ProviderRef),
	/// A known provider changed rank or (for configuration objects) properties.
	Modified(ProviderRef),
	/// A provider was withdrawn.
	Removed(ProviderId),
}

impl ProviderEvent {
	/// Returns the provider this event concerns.
	pub fn provider_id(&self) -> ProviderId {
		match self {
			Self::Added(provider) | Self::Modified(provider) => provider.id,
			Self::Removed(id) => *id,
		}
	}

	pub(crate) const fn as_str(&self) -> &'static str {
		match self {
			Self::Added(_) => "added",
			Self::Modified(_) => "modified",
			Self::Removed(_) => "removed",
		}
	}
}

/// Stream of provider notifications for one subscription.
///
/// The stream ends when the publishing registry is dropped.
pub type ProviderStream = mpsc::UnboundedReceiver<ProviderEvent>;
