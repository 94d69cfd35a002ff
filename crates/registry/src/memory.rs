use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::{
	AcquisitionError, Configuration, ConfigurationStore, ContextId, Criteria, ProviderEvent, ProviderId, ProviderRef, ProviderStream, Properties, Rank,
	ServiceRegistry,
};

/// Factory producing a service object for one consumer context.
pub type ServiceFactory<T> = Arc<dyn Fn(ProviderId, ContextId) -> Result<T, String> + Send + Sync>;

struct Published<T> {
	name: String,
	properties: BTreeMap<String, String>,
	rank: Rank,
	factory: ServiceFactory<T>,
	uses: HashMap<ContextId, usize>,
}

struct Subscriber<K> {
	key: K,
	tx: mpsc::UnboundedSender<ProviderEvent>,
}

fn broadcast<K>(subscribers: &mut Vec<Subscriber<K>>, event: ProviderEvent, interested: impl Fn(&K) -> bool) {
	subscribers.retain(|sub| !interested(&sub.key) || sub.tx.send(event).is_ok());
	tracing::trace!(provider = %event.provider_id(), event = event.as_str(), "registry.memory.broadcast");
}

struct RegistryState<T> {
	providers: BTreeMap<ProviderId, Published<T>>,
	subscribers: Vec<Subscriber<Criteria>>,
}

/// In-process service registry.
///
/// Events are emitted on the thread that performs the registry mutation, in
/// the same order the mutations are applied.
pub struct MemoryRegistry<T> {
	next: AtomicU64,
	state: RwLock<RegistryState<T>>,
}

impl<T> Default for MemoryRegistry<T> {
	fn default() -> Self {
		Self {
			next: AtomicU64::new(1),
			state: RwLock::new(RegistryState {
				providers: BTreeMap::new(),
				subscribers: Vec::new(),
			}),
		}
	}
}

impl<T> MemoryRegistry<T> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Publishes a provider and notifies matching subscribers.
	pub fn register(
		&self,
		name: impl Into<String>,
		properties: BTreeMap<String, String>,
		rank: Rank,
		factory: impl Fn(ProviderId, ContextId) -> Result<T, String> + Send + Sync + 'static,
	) -> ProviderId {
		let id = ProviderId(self.next.fetch_add(1, Ordering::AcqRel));
		let name = name.into();
		let mut state = self.state.write();
		broadcast(&mut state.subscribers, ProviderEvent::Added(ProviderRef::new(id, rank)), |c| c.matches(&name, &properties));
		state.providers.insert(
			id,
			Published {
				name,
				properties,
				rank,
				factory: Arc::new(factory),
				uses: HashMap::new(),
			},
		);
		id
	}

	/// Withdraws a provider. Returns false if it was not registered.
	pub fn unregister(&self, id: ProviderId) -> bool {
		let mut state = self.state.write();
		let Some(published) = state.providers.remove(&id) else {
			return false;
		};
		if !published.uses.is_empty() {
			tracing::debug!(provider = %id, contexts = published.uses.len(), "registry.memory.unregister_in_use");
		}
		broadcast(&mut state.subscribers, ProviderEvent::Removed(id), |c| c.matches(&published.name, &published.properties));
		true
	}

	/// Changes a provider's rank. Returns false if it was not registered.
	pub fn set_rank(&self, id: ProviderId, rank: Rank) -> bool {
		let mut state = self.state.write();
		let RegistryState { providers, subscribers } = &mut *state;
		let Some(published) = providers.get_mut(&id) else {
			return false;
		};
		published.rank = rank;
		broadcast(subscribers, ProviderEvent::Modified(ProviderRef::new(id, rank)), |c| {
			c.matches(&published.name, &published.properties)
		});
		true
	}

	/// Total outstanding uses of a provider across all contexts.
	pub fn use_count(&self, id: ProviderId) -> usize {
		self.state.read().providers.get(&id).map_or(0, |p| p.uses.values().sum())
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.state.read().providers.len()
	}

	/// Returns true if no provider is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T: Send + 'static> ServiceRegistry<T> for MemoryRegistry<T> {
	fn subscribe(&self, criteria: &Criteria) -> ProviderStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut state = self.state.write();
		for (id, published) in &state.providers {
			if criteria.matches(&published.name, &published.properties) {
				let _ = tx.send(ProviderEvent::Added(ProviderRef::new(*id, published.rank)));
			}
		}
		state.subscribers.push(Subscriber { key: criteria.clone(), tx });
		rx
	}

	fn acquire(&self, provider: ProviderId, context: ContextId) -> Result<T, AcquisitionError> {
		let factory = {
			let state = self.state.read();
			let published = state.providers.get(&provider).ok_or(AcquisitionError::Unregistered(provider))?;
			Arc::clone(&published.factory)
		};

		// Factories may block; the registry lock is not held while they run.
		let value = factory(provider, context).map_err(|reason| AcquisitionError::Factory { provider, reason })?;

		let mut state = self.state.write();
		let published = state.providers.get_mut(&provider).ok_or(AcquisitionError::Unregistered(provider))?;
		*published.uses.entry(context).or_default() += 1;
		Ok(value)
	}

	fn release(&self, provider: ProviderId, context: ContextId) {
		let mut state = self.state.write();
		let Some(published) = state.providers.get_mut(&provider) else {
			return;
		};
		if let Some(count) = published.uses.get_mut(&context) {
			*count = count.saturating_sub(1);
			if *count == 0 {
				published.uses.remove(&context);
			}
		}
	}
}

struct StoredConfiguration {
	provider: ProviderId,
	revision: u64,
	properties: Properties,
}

struct StoreState {
	configurations: HashMap<String, StoredConfiguration>,
	subscribers: Vec<Subscriber<String>>,
}

/// In-process configuration store.
pub struct MemoryConfigurationStore {
	next: AtomicU64,
	state: RwLock<StoreState>,
}

impl Default for MemoryConfigurationStore {
	fn default() -> Self {
		Self {
			next: AtomicU64::new(1),
			state: RwLock::new(StoreState {
				configurations: HashMap::new(),
				subscribers: Vec::new(),
			}),
		}
	}
}

impl MemoryConfigurationStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates or updates the configuration for `pid`.
	pub fn put(&self, pid: impl Into<String>, properties: Properties) -> ProviderId {
		let pid = pid.into();
		let mut state = self.state.write();
		let StoreState { configurations, subscribers } = &mut *state;
		let (provider, event) = match configurations.get_mut(&pid) {
			Some(stored) => {
				stored.revision += 1;
				stored.properties = properties;
				(stored.provider, ProviderEvent::Modified(ProviderRef::new(stored.provider, 0)))
			}
			None => {
				let provider = ProviderId(self.next.fetch_add(1, Ordering::AcqRel));
				configurations.insert(
					pid.clone(),
					StoredConfiguration {
						provider,
						revision: 1,
						properties,
					},
				);
				(provider, ProviderEvent::Added(ProviderRef::new(provider, 0)))
			}
		};
		broadcast(subscribers, event, |key| *key == pid);
		provider
	}

	/// Deletes the configuration for `pid`. Returns false if none existed.
	pub fn delete(&self, pid: &str) -> bool {
		let mut state = self.state.write();
		let Some(stored) = state.configurations.remove(pid) else {
			return false;
		};
		broadcast(&mut state.subscribers, ProviderEvent::Removed(stored.provider), |key| key == pid);
		true
	}
}

impl ConfigurationStore for MemoryConfigurationStore {
	fn get_configuration(&self, pid: &str) -> Option<Configuration> {
		self.state.read().configurations.get(pid).map(|stored| Configuration {
			pid: pid.to_string(),
			provider: stored.provider,
			revision: stored.revision,
			properties: stored.properties.clone(),
		})
	}

	fn subscribe(&self, pid: &str) -> ProviderStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut state = self.state.write();
		if let Some(stored) = state.configurations.get(pid) {
			let _ = tx.send(ProviderEvent::Added(ProviderRef::new(stored.provider, 0)));
		}
		state.subscribers.push(Subscriber { key: pid.to_string(), tx });
		rx
	}
}

#[cfg(test)]
mod tests;
