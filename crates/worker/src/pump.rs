use std::sync::Arc;

use tether_dependency::{DependencyError, DependencyManager};
use tether_registry::{ConfigurationStore, Criteria, ProviderStream, ServiceRegistry};
use tokio_util::sync::CancellationToken;

use crate::{DriverHandle, TaskClass};

/// Why an event pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
	/// The publisher dropped the stream.
	StreamClosed,
	Cancelled,
	/// The manager was disposed.
	Disposed,
	/// The manager has no slot with the pump's name.
	UnknownSlot,
}

/// Final accounting of one event pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
	pub exit: PumpExit,
	/// Events applied to the manager.
	pub forwarded: u64,
}

/// Forwards every event of `stream` into `slot` of `manager`.
///
/// Manager transitions, and therefore slot callbacks and provider
/// factories, run on the pump task.
pub fn spawn_pump(manager: Arc<DependencyManager>, slot: impl Into<String>, stream: ProviderStream) -> DriverHandle<PumpReport> {
	let slot = slot.into();
	let name = format!("{}/{slot}", manager.component());
	let cancel = CancellationToken::new();
	let task = crate::spawn(TaskClass::EventPump, &name, run_pump(manager, slot, stream, cancel.clone()));
	DriverHandle::new(name, TaskClass::EventPump, cancel, task)
}

/// Subscribes `slot` to the providers of `registry` matching `criteria`.
pub fn pump_services<T, R>(manager: Arc<DependencyManager>, slot: impl Into<String>, registry: &R, criteria: &Criteria) -> DriverHandle<PumpReport>
where
	R: ServiceRegistry<T> + ?Sized,
{
	spawn_pump(manager, slot, registry.subscribe(criteria))
}

/// Subscribes `slot` to the configuration object stored under `pid`.
pub fn pump_configuration<S>(manager: Arc<DependencyManager>, slot: impl Into<String>, store: &S, pid: &str) -> DriverHandle<PumpReport>
where
	S: ConfigurationStore + ?Sized,
{
	spawn_pump(manager, slot, store.subscribe(pid))
}

async fn run_pump(manager: Arc<DependencyManager>, slot: String, mut stream: ProviderStream, cancel: CancellationToken) -> PumpReport {
	let mut forwarded = 0;
	let exit = loop {
		let event = tokio::select! {
			biased;
			_ = cancel.cancelled() => break PumpExit::Cancelled,
			event = stream.recv() => match event {
				Some(event) => event,
				None => break PumpExit::StreamClosed,
			},
		};
		match manager.on_dependency_changed(&slot, event) {
			Ok(()) => forwarded += 1,
			Err(DependencyError::Disposed(_)) => break PumpExit::Disposed,
			Err(err) => {
				tracing::warn!(component = %manager.component(), slot = %slot, error = %err, "worker.pump.rejected");
				break PumpExit::UnknownSlot;
			}
		}
	};
	tracing::debug!(component = %manager.component(), slot = %slot, ?exit, forwarded, "worker.pump.exit");
	PumpReport { exit, forwarded }
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;
	use std::time::Duration;

	use tether_dependency::{ComponentState, ManagerConfig};
	use tether_registry::{MemoryRegistry, ProviderEvent, ProviderId, ProviderRef};
	use tokio::sync::mpsc;

	use super::*;
	use crate::test_support::service_manager;

	fn manager(registry: &Arc<MemoryRegistry<String>>) -> Arc<DependencyManager> {
		service_manager("pumped", "log", registry, ManagerConfig::default())
	}

	async fn settle(manager: &DependencyManager, want: ComponentState) {
		let mut states = manager.subscribe_state();
		tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == want))
			.await
			.expect("state not reached")
			.unwrap();
	}

	#[tokio::test]
	async fn registry_events_drive_the_manager() {
		let registry = Arc::new(MemoryRegistry::new());
		let manager = manager(&registry);
		manager.open();
		let pump = pump_services(Arc::clone(&manager), "log", registry.as_ref(), &Criteria::service("log"));
		assert_eq!(pump.class(), TaskClass::EventPump);
		assert_eq!(pump.name(), "pumped/log");

		let id = registry.register("log", BTreeMap::new(), 0, |_, _| Ok("sink".to_string()));
		settle(&manager, ComponentState::Active).await;
		assert_eq!(manager.bound_providers("log").unwrap(), [id]);

		assert!(registry.unregister(id));
		settle(&manager, ComponentState::Inactive).await;

		let report = pump.shutdown().await.unwrap();
		assert_eq!(
			report,
			PumpReport {
				exit: PumpExit::Cancelled,
				forwarded: 2
			}
		);
	}

	#[tokio::test]
	async fn closed_stream_ends_the_pump() {
		let registry = Arc::new(MemoryRegistry::new());
		let manager = manager(&registry);
		let (tx, rx) = mpsc::unbounded_channel();
		let pump = spawn_pump(manager, "log", rx);
		tx.send(ProviderEvent::Added(ProviderRef::new(ProviderId(40), 0))).unwrap();
		drop(tx);
		let report = pump.join().await.unwrap();
		assert_eq!(report.exit, PumpExit::StreamClosed);
		assert_eq!(report.forwarded, 1);
	}

	#[tokio::test]
	async fn disposal_and_unknown_slots_end_the_pump() {
		let registry = Arc::new(MemoryRegistry::new());
		let manager = manager(&registry);
		manager.dispose();
		let (tx, rx) = mpsc::unbounded_channel();
		let pump = spawn_pump(Arc::clone(&manager), "log", rx);
		tx.send(ProviderEvent::Removed(ProviderId(1))).unwrap();
		assert_eq!(pump.join().await.unwrap().exit, PumpExit::Disposed);

		let (tx, rx) = mpsc::unbounded_channel();
		let pump = spawn_pump(manager, "missing", rx);
		tx.send(ProviderEvent::Removed(ProviderId(1))).unwrap();
		assert_eq!(pump.join().await.unwrap().exit, PumpExit::UnknownSlot);
	}
}
