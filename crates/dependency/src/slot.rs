use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tether_registry::{ConfigurationStore, ContextId, ProviderId, ProviderRef};

use crate::{Absence, CallbackError, Cardinality, DependencyDescriptor, DependencyError, DependencyKind, PairSource, RefPair, ResolutionError};

/// Consumer callback for one slot.
pub type SlotCallback<T> = Arc<dyn Fn(&Delivery<T>) -> Result<(), CallbackError> + Send + Sync>;

/// Builds the value delivered when an optional slot has no provider.
pub type DefaultSupplier<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// One materialized provider value.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<T> {
	pub provider: ProviderRef,
	pub value: T,
}

/// What a slot callback receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
	/// The best eligible provider of a single slot.
	Bound(Binding<T>),
	/// Every eligible provider of a multiple slot, best first.
	Multiple(Vec<Binding<T>>),
	/// No provider; substituted default.
	Default(T),
	/// No provider and nothing substituted.
	Absent,
}

impl<T> Delivery<T> {
	/// The delivered value. Multiple deliveries yield their best entry.
	pub fn value(&self) -> Option<&T> {
		match self {
			Self::Bound(binding) => Some(&binding.value),
			Self::Multiple(bindings) => bindings.first().map(|b| &b.value),
			Self::Default(value) => Some(value),
			Self::Absent => None,
		}
	}

	/// Providers backing this delivery, best first.
	pub fn providers(&self) -> Vec<ProviderId> {
		match self {
			Self::Bound(binding) => vec![binding.provider.id],
			Self::Multiple(bindings) => bindings.iter().map(|b| b.provider.id).collect(),
			Self::Default(_) | Self::Absent => Vec::new(),
		}
	}

	pub fn is_default(&self) -> bool {
		matches!(self, Self::Default(_))
	}

	pub(crate) const fn as_str(&self) -> &'static str {
		match self {
			Self::Bound(_) => "bound",
			Self::Multiple(_) => "multiple",
			Self::Default(_) => "default",
			Self::Absent => "absent",
		}
	}
}

/// Satisfaction state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
	Unsatisfied,
	SatisfiedDefault,
	SatisfiedBound,
	SatisfiedMultiple,
}

impl SlotState {
	pub fn is_satisfied(self) -> bool {
		self != Self::Unsatisfied
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unsatisfied => "unsatisfied",
			Self::SatisfiedDefault => "satisfied_default",
			Self::SatisfiedBound => "satisfied_bound",
			Self::SatisfiedMultiple => "satisfied_multiple",
		}
	}
}

/// Point-in-time diagnostics for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
	pub name: String,
	pub kind: DependencyKind,
	pub required: bool,
	pub state: SlotState,
	pub bound: Vec<ProviderId>,
	pub failed: Vec<ProviderId>,
	pub candidates: usize,
	pub last_error: Option<String>,
}

/// Declares one slot of a component instance.
pub struct SlotSpec<T> {
	descriptor: Arc<DependencyDescriptor>,
	source: Arc<PairSource<T>>,
	callback: SlotCallback<T>,
	default: Option<DefaultSupplier<T>>,
}

impl<T> SlotSpec<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new(
		descriptor: impl Into<Arc<DependencyDescriptor>>,
		source: PairSource<T>,
		callback: impl Fn(&Delivery<T>) -> Result<(), CallbackError> + Send + Sync + 'static,
	) -> Self {
		Self {
			descriptor: descriptor.into(),
			source: Arc::new(source),
			callback: Arc::new(callback),
			default: None,
		}
	}

	/// Sets the default supplier used by [`Absence::Substitute`].
	#[must_use]
	pub fn with_default(mut self, supplier: impl Fn() -> T + Send + Sync + 'static) -> Self {
		self.default = Some(Arc::new(supplier));
		self
	}

	pub fn name(&self) -> &str {
		self.descriptor.name()
	}

	pub(crate) fn into_driver(self) -> Result<Arc<dyn SlotDriver>, DependencyError> {
		if self.descriptor.absence() == Absence::Substitute && self.default.is_none() {
			return Err(DependencyError::MissingDefault(self.descriptor.name().to_string()));
		}
		if self.descriptor.kind() != self.source.kind() {
			tracing::warn!(
				slot = self.descriptor.name(),
				declared = self.descriptor.kind().as_str(),
				source = self.source.kind().as_str(),
				"dependency.slot.kind_mismatch"
			);
		}
		Ok(Arc::new(Slot::new(self)))
	}
}

impl<T> SlotSpec<T>
where
	T: DeserializeOwned + Default + Clone + Send + Sync + 'static,
{
	/// A configuration slot whose default is `T::default()`.
	pub fn configuration(
		descriptor: impl Into<Arc<DependencyDescriptor>>,
		store: Arc<dyn ConfigurationStore>,
		pid: impl Into<String>,
		callback: impl Fn(&Delivery<T>) -> Result<(), CallbackError> + Send + Sync + 'static,
	) -> Self {
		Self::new(descriptor, PairSource::configuration(store, pid), callback).with_default(T::default)
	}
}

/// Lifecycle decision requested by a slot before it commits a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransitionPlan {
	/// Whether the slot is satisfied after the transition.
	pub satisfied: bool,
}

/// Implemented by the manager so slots can stop the component before a
/// transition it cannot survive is committed.
pub(crate) trait LifecycleGate {
	fn prepare(&self, descriptor: &DependencyDescriptor, plan: TransitionPlan);
}

/// Type-erased slot driven by the manager.
pub(crate) trait SlotDriver: Send + Sync {
	fn descriptor(&self) -> &DependencyDescriptor;

	fn state(&self) -> SlotState;

	fn bound_providers(&self) -> Vec<ProviderId>;

	fn snapshot(&self) -> SlotSnapshot;

	/// Records an added or modified provider. Returns the provider if its
	/// cached value was invalidated and must be re-delivered when bound.
	fn insert(&self, provider: ProviderRef, context: ContextId) -> Option<ProviderId>;

	/// Marks a provider's pair deleted. Safe to call outside the coordinator.
	fn withdraw(&self, provider: ProviderId) -> bool;

	/// Moves a withdrawn pair out of the candidate set.
	fn evict(&self, provider: ProviderId) -> bool;

	/// Ungets every evicted pair.
	fn release_retired(&self) -> usize;

	/// Re-runs selection and delivers the result if the binding changed.
	fn reconcile(&self, context: ContextId, gate: &dyn LifecycleGate, refreshed: Option<ProviderId>) -> SlotState;

	fn clear_failed(&self, provider: ProviderId) -> bool;

	/// Clears failed pairs that have failed fewer than `max_attempts` times.
	fn retry_failed(&self, max_attempts: u32) -> usize;

	/// Failed pairs that [`SlotDriver::retry_failed`] would clear.
	fn retryable(&self, max_attempts: u32) -> usize;

	/// Ungets every pair. Used when the component is disposed.
	fn release_all(&self) -> usize;
}

/// What the component was last told about this slot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BindingKey {
	Unbound,
	Bound(Vec<ProviderId>),
}

impl BindingKey {
	fn of<T: Clone + 'static>(pairs: &[Arc<RefPair<T>>]) -> Self {
		if pairs.is_empty() {
			Self::Unbound
		} else {
			Self::Bound(pairs.iter().map(|p| p.provider()).collect())
		}
	}

	fn contains(&self, provider: ProviderId) -> bool {
		matches!(self, Self::Bound(ids) if ids.contains(&provider))
	}
}

struct SlotInner<T> {
	/// Candidate pairs, best first.
	pairs: Vec<Arc<RefPair<T>>>,
	/// Evicted pairs waiting to be ungot.
	retired: Vec<Arc<RefPair<T>>>,
	bound: Vec<Arc<RefPair<T>>>,
	delivered: Option<BindingKey>,
	state: SlotState,
	last_error: Option<String>,
}

impl<T: Clone + 'static> SlotInner<T> {
	fn select(&self, cardinality: Cardinality) -> Vec<Arc<RefPair<T>>> {
		let eligible = self.pairs.iter().filter(|p| p.is_eligible());
		match cardinality {
			Cardinality::Single => eligible.take(1).cloned().collect(),
			Cardinality::Multiple => eligible.cloned().collect(),
		}
	}

	fn resort(&mut self) {
		self.pairs.sort_by(|a, b| a.provider_ref().preference(&b.provider_ref()));
	}

	fn find(&self, provider: ProviderId) -> Option<&Arc<RefPair<T>>> {
		self.pairs.iter().find(|p| p.provider() == provider)
	}
}

/// The last binding the consumer accepted.
struct Committed<T> {
	bound: Vec<Arc<RefPair<T>>>,
	delivered: Option<BindingKey>,
	state: SlotState,
}

impl<T: Clone + 'static> Committed<T> {
	fn of(inner: &SlotInner<T>) -> Self {
		Self {
			bound: inner.bound.clone(),
			delivered: inner.delivered.clone(),
			state: inner.state,
		}
	}

	fn contains(&self, provider: ProviderId) -> bool {
		self.bound.iter().any(|p| p.provider() == provider)
	}

	fn restore(self, inner: &mut SlotInner<T>) {
		inner.bound = self.bound;
		inner.delivered = self.delivered;
		inner.state = self.state;
	}
}

fn live<T: Clone + 'static>(pairs: &[Arc<RefPair<T>>]) -> Vec<ProviderId> {
	pairs.iter().filter(|p| !p.is_deleted()).map(|p| p.provider()).collect()
}

fn same_pairs<T>(lhs: &[Arc<RefPair<T>>], rhs: &[Arc<RefPair<T>>]) -> bool {
	lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| Arc::ptr_eq(a, b))
}

pub(crate) struct Slot<T> {
	descriptor: Arc<DependencyDescriptor>,
	source: Arc<PairSource<T>>,
	callback: SlotCallback<T>,
	default: Option<DefaultSupplier<T>>,
	inner: Mutex<SlotInner<T>>,
}

impl<T> Slot<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn new(spec: SlotSpec<T>) -> Self {
		// Required slots start out as "told nothing is bound", so opening
		// without providers does not produce an empty delivery.
		let delivered = spec.descriptor.is_required().then_some(BindingKey::Unbound);
		Self {
			descriptor: spec.descriptor,
			source: spec.source,
			callback: spec.callback,
			default: spec.default,
			inner: Mutex::new(SlotInner {
				pairs: Vec::new(),
				retired: Vec::new(),
				bound: Vec::new(),
				delivered,
				state: SlotState::Unsatisfied,
				last_error: None,
			}),
		}
	}

	fn state_for(&self, target: &[Arc<RefPair<T>>]) -> SlotState {
		if target.is_empty() {
			return if self.descriptor.is_required() {
				SlotState::Unsatisfied
			} else {
				SlotState::SatisfiedDefault
			};
		}
		match self.descriptor.cardinality() {
			Cardinality::Single => SlotState::SatisfiedBound,
			Cardinality::Multiple => SlotState::SatisfiedMultiple,
		}
	}

	fn delivery_for(&self, mut bindings: Vec<Binding<T>>) -> Delivery<T> {
		if bindings.is_empty() {
			return match (self.descriptor.absence(), &self.default) {
				(Absence::Substitute, Some(supplier)) => Delivery::Default(supplier()),
				_ => Delivery::Absent,
			};
		}
		match self.descriptor.cardinality() {
			Cardinality::Single => Delivery::Bound(bindings.swap_remove(0)),
			Cardinality::Multiple => Delivery::Multiple(bindings),
		}
	}

	fn note_error(&self, message: String) {
		self.inner.lock().last_error = Some(message);
	}

	fn note_resolution_error(&self, err: &ResolutionError) {
		match err {
			ResolutionError::AlreadyDeleted { provider } => {
				tracing::debug!(slot = self.descriptor.name(), provider = %provider, "dependency.slot.revalidate");
			}
			ResolutionError::Acquisition { provider, source } => {
				tracing::warn!(slot = self.descriptor.name(), provider = %provider, error = %source, "dependency.slot.acquire_failed");
				self.note_error(err.to_string());
			}
		}
	}
}

impl<T> SlotDriver for Slot<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn descriptor(&self) -> &DependencyDescriptor {
		&self.descriptor
	}

	fn state(&self) -> SlotState {
		self.inner.lock().state
	}

	/// Bound providers, minus any withdrawn but not yet evicted.
	fn bound_providers(&self) -> Vec<ProviderId> {
		live(&self.inner.lock().bound)
	}

	fn snapshot(&self) -> SlotSnapshot {
		let inner = self.inner.lock();
		SlotSnapshot {
			name: self.descriptor.name().to_string(),
			kind: self.descriptor.kind(),
			required: self.descriptor.is_required(),
			state: inner.state,
			bound: live(&inner.bound),
			failed: inner.pairs.iter().filter(|p| p.is_failed()).map(|p| p.provider()).collect(),
			candidates: inner.pairs.iter().filter(|p| p.is_eligible()).count(),
			last_error: inner.last_error.clone(),
		}
	}

	fn insert(&self, provider: ProviderRef, context: ContextId) -> Option<ProviderId> {
		let mut inner = self.inner.lock();
		if let Some(existing) = inner.find(provider.id).cloned() {
			if existing.is_deleted() {
				return None;
			}
			existing.set_rank(provider.rank);
			inner.resort();
			if existing.kind() == DependencyKind::Configuration {
				drop(inner);
				existing.release(context);
				return Some(provider.id);
			}
			return None;
		}
		if inner.retired.iter().any(|p| p.provider() == provider.id) {
			return None;
		}
		inner.pairs.push(Arc::new(RefPair::new(provider, Arc::clone(&self.source))));
		inner.resort();
		None
	}

	fn withdraw(&self, provider: ProviderId) -> bool {
		let inner = self.inner.lock();
		inner.find(provider).is_some_and(|pair| pair.mark_deleted())
	}

	fn evict(&self, provider: ProviderId) -> bool {
		let mut inner = self.inner.lock();
		let Some(index) = inner.pairs.iter().position(|p| p.provider() == provider) else {
			return false;
		};
		let pair = inner.pairs.remove(index);
		pair.mark_deleted();
		inner.retired.push(pair);
		true
	}

	fn release_retired(&self) -> usize {
		let retired = std::mem::take(&mut self.inner.lock().retired);
		retired.iter().map(|pair| pair.release_all()).sum()
	}

	fn reconcile(&self, context: ContextId, gate: &dyn LifecycleGate, refreshed: Option<ProviderId>) -> SlotState {
		let descriptor = &*self.descriptor;
		let cardinality = descriptor.cardinality();
		// Every retry follows a pair becoming ineligible, so this terminates.
		loop {
			let target = self.inner.lock().select(cardinality);

			// Acquire outside the slot lock; commit re-validates below.
			let mut bindings = Vec::with_capacity(target.len());
			let mut conflicted = false;
			for pair in &target {
				match pair.materialize(context) {
					Ok(value) => bindings.push(Binding {
						provider: pair.provider_ref(),
						value,
					}),
					Err(err) => {
						self.note_resolution_error(&err);
						conflicted = true;
						break;
					}
				}
			}
			if conflicted {
				continue;
			}

			let key = BindingKey::of(&target);
			let (prior, unchanged) = {
				let inner = self.inner.lock();
				let unchanged = inner.delivered.as_ref() == Some(&key) && !refreshed.is_some_and(|id| key.contains(id));
				(Committed::of(&inner), unchanged)
			};
			if unchanged {
				return prior.state;
			}

			gate.prepare(
				descriptor,
				TransitionPlan {
					satisfied: !target.is_empty() || !descriptor.is_required(),
				},
			);

			let state = {
				let mut inner = self.inner.lock();
				if !same_pairs(&inner.select(cardinality), &target) {
					continue;
				}
				let state = self.state_for(&target);
				inner.bound = target.clone();
				inner.delivered = Some(key);
				inner.state = state;
				state
			};

			let delivery = self.delivery_for(bindings);
			match (self.callback)(&delivery) {
				Ok(()) => {
					tracing::debug!(
						slot = descriptor.name(),
						callback = descriptor.callback(),
						delivery = delivery.as_str(),
						providers = ?delivery.providers(),
						state = state.as_str(),
						"dependency.slot.delivered"
					);
					return state;
				}
				Err(err) => {
					tracing::warn!(
						slot = descriptor.name(),
						callback = descriptor.callback(),
						delivery = delivery.as_str(),
						error = %err,
						"dependency.slot.callback_failed"
					);
					let involved: Vec<_> = target.iter().filter(|p| !prior.contains(p.provider()) || refreshed == Some(p.provider())).collect();
					if involved.is_empty() {
						self.note_error(err.to_string());
						return state;
					}
					for pair in involved {
						pair.mark_failed();
					}
					// The consumer kept what it had; falling back to it is silent.
					let mut inner = self.inner.lock();
					inner.last_error = Some(err.to_string());
					prior.restore(&mut inner);
				}
			}
		}
	}

	fn clear_failed(&self, provider: ProviderId) -> bool {
		self.inner.lock().find(provider).is_some_and(|pair| pair.clear_failed())
	}

	fn retry_failed(&self, max_attempts: u32) -> usize {
		let inner = self.inner.lock();
		inner
			.pairs
			.iter()
			.filter(|p| p.is_eligible_for_retry(max_attempts))
			.filter(|p| p.clear_failed())
			.count()
	}

	fn retryable(&self, max_attempts: u32) -> usize {
		let inner = self.inner.lock();
		inner.pairs.iter().filter(|p| p.is_eligible_for_retry(max_attempts)).count()
	}

	fn release_all(&self) -> usize {
		let mut guard = self.inner.lock();
		let inner = &mut *guard;
		let pairs: Vec<_> = inner.pairs.drain(..).chain(inner.retired.drain(..)).collect();
		inner.bound.clear();
		drop(guard);
		pairs.iter().map(|pair| pair.release_all()).sum()
	}
}
