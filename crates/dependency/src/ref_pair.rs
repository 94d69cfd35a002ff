use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tether_registry::{AcquisitionError, ConfigurationStore, ContextId, Properties, ProviderId, ProviderRef, Rank, ServiceRegistry};

use crate::{DependencyKind, ResolutionError};

/// Custom provider kind for [`PairSource::Other`].
pub trait ProviderSource<T>: Send + Sync + 'static {
	fn acquire(&self, provider: ProviderId, context: ContextId) -> Result<T, AcquisitionError>;

	fn release(&self, _provider: ProviderId, _context: ContextId) {}
}

type DecodeFn<T> = fn(&str, Properties) -> Result<T, AcquisitionError>;

/// Kind-specific acquisition and release for reference pairs.
pub enum PairSource<T> {
	/// Services acquired from a registry.
	Service(Arc<dyn ServiceRegistry<T>>),
	/// Configuration objects decoded from a store.
	Configuration {
		store: Arc<dyn ConfigurationStore>,
		pid: String,
		decode: DecodeFn<T>,
	},
	/// Anything else.
	Other(Arc<dyn ProviderSource<T>>),
}

impl<T: 'static> PairSource<T> {
	pub fn service(registry: Arc<dyn ServiceRegistry<T>>) -> Self {
		Self::Service(registry)
	}

	pub fn other(source: Arc<dyn ProviderSource<T>>) -> Self {
		Self::Other(source)
	}

	pub fn kind(&self) -> DependencyKind {
		match self {
			Self::Service(_) => DependencyKind::Service,
			Self::Configuration { .. } => DependencyKind::Configuration,
			Self::Other(_) => DependencyKind::Other,
		}
	}

	fn acquire(&self, provider: ProviderId, context: ContextId) -> Result<T, AcquisitionError> {
		match self {
			Self::Service(registry) => registry.acquire(provider, context),
			Self::Configuration { store, pid, decode } => {
				let config = store.get_configuration(pid).ok_or_else(|| AcquisitionError::MissingConfiguration(pid.clone()))?;
				if config.provider != provider {
					return Err(AcquisitionError::Unregistered(provider));
				}
				decode(pid, config.properties)
			}
			Self::Other(source) => source.acquire(provider, context),
		}
	}

	fn release(&self, provider: ProviderId, context: ContextId) {
		match self {
			Self::Service(registry) => registry.release(provider, context),
			Self::Configuration { .. } => {}
			Self::Other(source) => source.release(provider, context),
		}
	}
}

impl<T: DeserializeOwned> PairSource<T> {
	/// Decodes the configuration stored under `pid` into `T`.
	pub fn configuration(store: Arc<dyn ConfigurationStore>, pid: impl Into<String>) -> Self {
		Self::Configuration {
			store,
			pid: pid.into(),
			decode: decode_properties::<T>,
		}
	}
}

fn decode_properties<T: DeserializeOwned>(pid: &str, properties: Properties) -> Result<T, AcquisitionError> {
	serde_json::from_value(serde_json::Value::Object(properties)).map_err(|err| AcquisitionError::Decode {
		pid: pid.to_string(),
		reason: err.to_string(),
	})
}

/// Binding between one slot of one component instance and one provider.
///
/// Identity is the wrapped provider. The `failed` and `deleted` flags are
/// atomics so readers see a consistent status without the slot lock.
/// `deleted` is one-way.
pub struct RefPair<T> {
	provider: ProviderId,
	rank: AtomicI32,
	failed: AtomicBool,
	deleted: AtomicBool,
	failures: AtomicU32,
	objects: Mutex<HashMap<ContextId, T>>,
	source: Arc<PairSource<T>>,
}

impl<T> std::fmt::Debug for RefPair<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RefPair")
			.field("provider", &self.provider)
			.field("rank", &self.rank.load(Ordering::Relaxed))
			.field("failed", &self.failed.load(Ordering::Relaxed))
			.field("deleted", &self.deleted.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}

impl<T: Clone + 'static> RefPair<T> {
	pub fn new(provider: ProviderRef, source: Arc<PairSource<T>>) -> Self {
		Self {
			provider: provider.id,
			rank: AtomicI32::new(provider.rank),
			failed: AtomicBool::new(false),
			deleted: AtomicBool::new(false),
			failures: AtomicU32::new(0),
			objects: Mutex::new(HashMap::new()),
			source,
		}
	}

	pub fn provider(&self) -> ProviderId {
		self.provider
	}

	pub fn rank(&self) -> Rank {
		self.rank.load(Ordering::Acquire)
	}

	pub fn provider_ref(&self) -> ProviderRef {
		ProviderRef::new(self.provider, self.rank())
	}

	pub(crate) fn set_rank(&self, rank: Rank) {
		self.rank.store(rank, Ordering::Release);
	}

	pub fn kind(&self) -> DependencyKind {
		self.source.kind()
	}

	/// Returns the cached value for `context`, acquiring it on first use.
	///
	/// Acquisition runs without holding the cache lock. A failed acquisition
	/// marks the pair failed. If the pair is deleted while the acquisition is
	/// in flight, the fresh value is released and the deletion is reported.
	pub fn materialize(&self, context: ContextId) -> Result<T, ResolutionError> {
		if self.is_deleted() {
			return Err(ResolutionError::AlreadyDeleted { provider: self.provider });
		}
		if let Some(value) = self.objects.lock().get(&context) {
			return Ok(value.clone());
		}

		let value = match self.source.acquire(self.provider, context) {
			Ok(value) => value,
			Err(source) => {
				self.mark_failed();
				return Err(ResolutionError::Acquisition {
					provider: self.provider,
					source,
				});
			}
		};

		let mut objects = self.objects.lock();
		if self.is_deleted() {
			drop(objects);
			self.source.release(self.provider, context);
			return Err(ResolutionError::AlreadyDeleted { provider: self.provider });
		}
		if let Some(existing) = objects.get(&context) {
			// Another thread won the race for this context.
			let existing = existing.clone();
			drop(objects);
			self.source.release(self.provider, context);
			return Ok(existing);
		}
		objects.insert(context, value.clone());
		Ok(value)
	}

	/// Returns the cached value for `context` without acquiring.
	pub fn cached(&self, context: ContextId) -> Option<T> {
		self.objects.lock().get(&context).cloned()
	}

	/// Releases and returns the cached value for `context`.
	///
	/// Releasing a context twice is a no-op that returns `None`.
	pub fn release(&self, context: ContextId) -> Option<T> {
		let value = self.objects.lock().remove(&context);
		if value.is_some() {
			self.source.release(self.provider, context);
		}
		value
	}

	/// Releases every context's value. Returns how many were released.
	pub fn release_all(&self) -> usize {
		let contexts: Vec<ContextId> = self.objects.lock().drain().map(|(context, _)| context).collect();
		for context in &contexts {
			self.source.release(self.provider, *context);
		}
		contexts.len()
	}

	pub fn mark_failed(&self) {
		self.failed.store(true, Ordering::SeqCst);
		self.failures.fetch_add(1, Ordering::AcqRel);
	}

	/// Clears the failed flag. Has no effect on deleted pairs.
	///
	/// Returns true if the pair was failed and is now eligible again.
	pub fn clear_failed(&self) -> bool {
		if self.is_deleted() {
			return false;
		}
		self.failed.swap(false, Ordering::SeqCst)
	}

	pub fn is_failed(&self) -> bool {
		self.failed.load(Ordering::SeqCst)
	}

	/// How many times this pair has been marked failed.
	pub fn failures(&self) -> u32 {
		self.failures.load(Ordering::Acquire)
	}

	/// Retires the pair. Returns true only for the call that retired it.
	pub fn mark_deleted(&self) -> bool {
		!self.deleted.swap(true, Ordering::SeqCst)
	}

	pub fn is_deleted(&self) -> bool {
		self.deleted.load(Ordering::SeqCst)
	}

	/// Failed, not deleted, and failed fewer than `max_attempts` times.
	pub fn is_eligible_for_retry(&self, max_attempts: u32) -> bool {
		self.is_failed() && !self.is_deleted() && self.failures() < max_attempts
	}

	/// Neither failed nor deleted.
	pub fn is_eligible(&self) -> bool {
		!self.is_deleted() && !self.is_failed()
	}
}
