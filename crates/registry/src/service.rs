use crate::{AcquisitionError, ContextId, Criteria, ProviderId, ProviderStream};

/// Service registry contract consumed by dependency managers.
///
/// Implementations may emit events from any thread. `subscribe` replays every
/// currently registered matching provider as [`ProviderEvent::Added`] before
/// live notifications.
///
/// [`ProviderEvent::Added`]: crate::ProviderEvent::Added
pub trait ServiceRegistry<T>: Send + Sync + 'static {
	/// Subscribes to providers matching `criteria`.
	fn subscribe(&self, criteria: &Criteria) -> ProviderStream;

	/// Materializes the provider's service object for a consumer context.
	fn acquire(&self, provider: ProviderId, context: ContextId) -> Result<T, AcquisitionError>;

	/// Releases one use of the provider previously acquired by `context`.
	fn release(&self, provider: ProviderId, context: ContextId);
}
