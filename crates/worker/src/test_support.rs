use std::sync::Arc;

use tether_dependency::{ActivationError, ComponentId, Container, DependencyDescriptor, DependencyManager, Delivery, ManagerConfig, PairSource, SlotSpec};
use tether_registry::MemoryRegistry;

pub(crate) struct NoopContainer;

impl Container for NoopContainer {
	fn request_activate(&self, _component: &ComponentId) -> Result<(), ActivationError> {
		Ok(())
	}

	fn request_deactivate(&self, _component: &ComponentId) {}
}

/// A manager with one required service slot and an inert callback.
pub(crate) fn service_manager(component: &str, slot: &str, registry: &Arc<MemoryRegistry<String>>, config: ManagerConfig) -> Arc<DependencyManager> {
	DependencyManager::builder(component, Arc::new(NoopContainer))
		.config(config)
		.slot(SlotSpec::new(
			DependencyDescriptor::service(slot),
			PairSource::service(registry.clone()),
			|_: &Delivery<String>| Ok(()),
		))
		.build()
		.unwrap()
}
