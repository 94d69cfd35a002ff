use std::sync::Arc;

use tether_registry::{ContextId, ProviderEvent, ProviderId, ProviderRef};
use tokio::sync::watch;

use crate::coordinator::StateCoordinator;
use crate::slot::{LifecycleGate, SlotDriver, TransitionPlan};
use crate::{ActivationError, BindingPolicy, ComponentId, DependencyDescriptor, DependencyError, ManagerConfig, SlotSnapshot, SlotSpec, SlotState};

/// Lifecycle state of one component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
	/// Created; dependency resolution has not started.
	Unopened,
	/// Opened but not running: a required slot is unsatisfied or the
	/// container refused activation.
	Inactive,
	/// Started by the container.
	Active,
	/// Torn down. Terminal.
	Disposed,
}

impl ComponentState {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unopened => "unopened",
			Self::Inactive => "inactive",
			Self::Active => "active",
			Self::Disposed => "disposed",
		}
	}
}

impl std::fmt::Display for ComponentState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Component container boundary.
///
/// Both calls are made from inside the component's serialized transitions.
pub trait Container: Send + Sync + 'static {
	/// Starts the component. An error keeps it inactive until the next
	/// stimulus or retry.
	fn request_activate(&self, component: &ComponentId) -> Result<(), ActivationError>;

	fn request_deactivate(&self, component: &ComponentId);
}

struct ManagerCore {
	component: ComponentId,
	context: ContextId,
	config: ManagerConfig,
	container: Arc<dyn Container>,
	slots: Vec<Arc<dyn SlotDriver>>,
	state: watch::Sender<ComponentState>,
}

impl ManagerCore {
	fn state(&self) -> ComponentState {
		*self.state.borrow()
	}

	fn is_open(&self) -> bool {
		matches!(self.state(), ComponentState::Inactive | ComponentState::Active)
	}

	fn set_state(&self, next: ComponentState) {
		let previous = self.state.send_replace(next);
		if previous != next {
			tracing::debug!(component = %self.component, from = previous.as_str(), to = next.as_str(), "dependency.component.state");
		}
	}

	fn open(&self) {
		if self.state() != ComponentState::Unopened {
			return;
		}
		self.set_state(ComponentState::Inactive);
		tracing::debug!(component = %self.component, slots = self.slots.len(), "dependency.component.opened");
		for slot in &self.slots {
			slot.reconcile(self.context, self, None);
		}
		self.evaluate();
	}

	fn handle(&self, index: usize, event: ProviderEvent) {
		if self.state() == ComponentState::Disposed {
			return;
		}
		let slot = &self.slots[index];
		match event {
			ProviderEvent::Added(provider) | ProviderEvent::Modified(provider) => {
				let refreshed = slot.insert(provider, self.context);
				if self.is_open() {
					slot.reconcile(self.context, self, refreshed);
				}
			}
			ProviderEvent::Removed(provider) => {
				slot.evict(provider);
				if self.is_open() {
					slot.reconcile(self.context, self, None);
				}
				slot.release_retired();
			}
		}
		self.evaluate();
	}

	fn retry(&self, only: Option<(usize, ProviderId)>) {
		if self.state() == ComponentState::Disposed {
			return;
		}
		let cleared = match only {
			Some((index, provider)) => usize::from(self.slots[index].clear_failed(provider)),
			None => self.slots.iter().map(|slot| slot.retry_failed(self.config.attempt_limit())).sum(),
		};
		if cleared > 0 {
			tracing::debug!(component = %self.component, cleared, "dependency.component.retry");
		}
		if self.is_open() {
			for slot in &self.slots {
				slot.reconcile(self.context, self, None);
			}
		}
		self.evaluate();
	}

	/// Activates when every required slot is satisfied.
	fn evaluate(&self) {
		if self.state() != ComponentState::Inactive {
			return;
		}
		if let Some(blocking) = self.slots.iter().find(|s| s.descriptor().is_required() && !s.state().is_satisfied()) {
			tracing::trace!(component = %self.component, slot = blocking.descriptor().name(), "dependency.component.waiting");
			return;
		}
		match self.container.request_activate(&self.component) {
			Ok(()) => {
				self.set_state(ComponentState::Active);
				tracing::info!(component = %self.component, "dependency.component.activated");
			}
			Err(err) => {
				tracing::warn!(component = %self.component, error = %err, "dependency.component.activation_refused");
			}
		}
	}

	fn deactivate(&self, slot: &str, reason: &'static str) {
		self.container.request_deactivate(&self.component);
		self.set_state(ComponentState::Inactive);
		tracing::info!(component = %self.component, slot, reason, "dependency.component.deactivated");
	}

	fn dispose(&self) {
		let state = self.state();
		if state == ComponentState::Disposed {
			return;
		}
		if state == ComponentState::Active {
			self.container.request_deactivate(&self.component);
		}
		let released: usize = self.slots.iter().map(|slot| slot.release_all()).sum();
		self.set_state(ComponentState::Disposed);
		tracing::info!(component = %self.component, released, "dependency.component.disposed");
	}
}

impl LifecycleGate for ManagerCore {
	fn prepare(&self, descriptor: &DependencyDescriptor, plan: TransitionPlan) {
		if self.state() != ComponentState::Active {
			return;
		}
		if descriptor.is_required() && !plan.satisfied {
			self.deactivate(descriptor.name(), "unsatisfied");
		} else if descriptor.policy() == BindingPolicy::Static {
			self.deactivate(descriptor.name(), "static_rebind");
		}
	}
}

/// Owns the dependency slots of one component instance and drives its
/// lifecycle from provider events.
///
/// Every stimulus runs as a transition on the instance's state coordinator.
/// A call made while another thread (or a callback of this component) is
/// already running transitions is queued and returns immediately; the effect
/// is applied before the running thread returns.
pub struct DependencyManager {
	core: ManagerCore,
	coordinator: StateCoordinator<ManagerCore>,
}

impl std::fmt::Debug for DependencyManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DependencyManager")
			.field("component", &self.core.component)
			.field("context", &self.core.context)
			.field("state", &self.core.state())
			.finish_non_exhaustive()
	}
}

impl DependencyManager {
	pub fn builder(component: impl Into<ComponentId>, container: Arc<dyn Container>) -> DependencyManagerBuilder {
		DependencyManagerBuilder {
			component: component.into(),
			container,
			context: None,
			config: ManagerConfig::default(),
			slots: Vec::new(),
			error: None,
		}
	}

	pub fn component(&self) -> &ComponentId {
		&self.core.component
	}

	/// Context under which this instance materializes provider objects.
	pub fn context(&self) -> ContextId {
		self.core.context
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.core.config
	}

	fn submit(&self, transition: impl FnOnce(&ManagerCore) + Send + 'static) {
		self.coordinator.execute(&self.core, Box::new(transition));
	}

	fn slot_index(&self, slot: &str) -> Result<usize, DependencyError> {
		self.core
			.slots
			.iter()
			.position(|s| s.descriptor().name() == slot)
			.ok_or_else(|| DependencyError::UnknownSlot(slot.to_string()))
	}

	fn slot(&self, slot: &str) -> Result<&Arc<dyn SlotDriver>, DependencyError> {
		self.slot_index(slot).map(|index| &self.core.slots[index])
	}

	/// Starts dependency resolution.
	///
	/// Every slot is reconciled against the providers recorded so far, then
	/// the component is activated if all required slots are satisfied.
	pub fn open(&self) {
		self.submit(ManagerCore::open);
	}

	/// Applies one registry notification to a slot.
	///
	/// Removals mark the provider's pair deleted on the calling thread before
	/// the transition is queued, so no later transition can bind it. Events
	/// for a disposed component are dropped and reported as
	/// [`DependencyError::Disposed`].
	pub fn on_dependency_changed(&self, slot: &str, event: ProviderEvent) -> Result<(), DependencyError> {
		let index = self.slot_index(slot)?;
		if self.core.state() == ComponentState::Disposed {
			return Err(DependencyError::Disposed(self.core.component.clone()));
		}
		tracing::trace!(component = %self.core.component, slot, provider = %event.provider_id(), ?event, "dependency.component.event");
		if let ProviderEvent::Removed(provider) = event {
			self.core.slots[index].withdraw(provider);
		}
		self.submit(move |core| core.handle(index, event));
		Ok(())
	}

	pub fn provider_added(&self, slot: &str, provider: ProviderRef) -> Result<(), DependencyError> {
		self.on_dependency_changed(slot, ProviderEvent::Added(provider))
	}

	pub fn provider_modified(&self, slot: &str, provider: ProviderRef) -> Result<(), DependencyError> {
		self.on_dependency_changed(slot, ProviderEvent::Modified(provider))
	}

	pub fn provider_removed(&self, slot: &str, provider: ProviderId) -> Result<(), DependencyError> {
		self.on_dependency_changed(slot, ProviderEvent::Removed(provider))
	}

	/// Clears failed pairs below the configured attempt limit, reconciles
	/// every slot, and re-attempts activation.
	pub fn retry_failed(&self) {
		self.submit(|core| core.retry(None));
	}

	/// Clears one pair's failed flag regardless of the attempt limit.
	pub fn clear_failed(&self, slot: &str, provider: ProviderId) -> Result<(), DependencyError> {
		let index = self.slot_index(slot)?;
		self.submit(move |core| core.retry(Some((index, provider))));
		Ok(())
	}

	/// Stops the component if active, ungets every pair, and enters
	/// [`ComponentState::Disposed`].
	pub fn dispose(&self) {
		self.submit(ManagerCore::dispose);
	}

	/// Disposes a component whose activation was given up on.
	pub fn abandon(&self) {
		tracing::warn!(component = %self.core.component, state = self.core.state().as_str(), "dependency.component.abandoned");
		self.dispose();
	}

	pub fn state(&self) -> ComponentState {
		self.core.state()
	}

	pub fn subscribe_state(&self) -> watch::Receiver<ComponentState> {
		self.core.state.subscribe()
	}

	pub fn slot_state(&self, slot: &str) -> Result<SlotState, DependencyError> {
		self.slot(slot).map(|s| s.state())
	}

	/// Providers currently delivered to a slot, best first.
	pub fn bound_providers(&self, slot: &str) -> Result<Vec<ProviderId>, DependencyError> {
		self.slot(slot).map(|s| s.bound_providers())
	}

	pub fn descriptor(&self, slot: &str) -> Result<&DependencyDescriptor, DependencyError> {
		self.slot(slot).map(|s| s.descriptor())
	}

	/// Slot names in declaration order.
	pub fn slot_names(&self) -> impl Iterator<Item = &str> {
		self.core.slots.iter().map(|s| s.descriptor().name())
	}

	/// Failed pairs, across all slots, that [`Self::retry_failed`] would
	/// still clear under `[retry] max_attempts`.
	pub fn retryable_failures(&self) -> usize {
		let limit = self.core.config.attempt_limit();
		self.core.slots.iter().map(|s| s.retryable(limit)).sum()
	}

	pub fn snapshots(&self) -> Vec<SlotSnapshot> {
		self.core.slots.iter().map(|s| s.snapshot()).collect()
	}

	/// True when every required slot is satisfied.
	pub fn is_satisfied(&self) -> bool {
		self.core
			.slots
			.iter()
			.all(|s| !s.descriptor().is_required() || s.state().is_satisfied())
	}
}

/// Collects the slots of a [`DependencyManager`].
pub struct DependencyManagerBuilder {
	component: ComponentId,
	container: Arc<dyn Container>,
	context: Option<ContextId>,
	config: ManagerConfig,
	slots: Vec<Arc<dyn SlotDriver>>,
	error: Option<DependencyError>,
}

impl DependencyManagerBuilder {
	/// Uses an explicit context instead of allocating a fresh one.
	#[must_use]
	pub fn context(mut self, context: ContextId) -> Self {
		self.context = Some(context);
		self
	}

	#[must_use]
	pub fn config(mut self, config: ManagerConfig) -> Self {
		self.config = config;
		self
	}

	/// Declares a slot. The first invalid declaration is reported by
	/// [`build`](Self::build).
	#[must_use]
	pub fn slot<T>(mut self, spec: SlotSpec<T>) -> Self
	where
		T: Clone + Send + Sync + 'static,
	{
		if self.error.is_some() {
			return self;
		}
		if self.slots.iter().any(|s| s.descriptor().name() == spec.name()) {
			self.error = Some(DependencyError::DuplicateSlot(spec.name().to_string()));
			return self;
		}
		match spec.into_driver() {
			Ok(driver) => self.slots.push(driver),
			Err(err) => self.error = Some(err),
		}
		self
	}

	pub fn build(self) -> Result<Arc<DependencyManager>, DependencyError> {
		if let Some(err) = self.error {
			return Err(err);
		}
		let context = self.context.unwrap_or_else(ContextId::next);
		tracing::debug!(component = %self.component, %context, slots = self.slots.len(), "dependency.component.created");
		Ok(Arc::new(DependencyManager {
			core: ManagerCore {
				component: self.component,
				context,
				config: self.config,
				container: self.container,
				slots: self.slots,
				state: watch::Sender::new(ComponentState::Unopened),
			},
			coordinator: StateCoordinator::new(),
		}))
	}
}
