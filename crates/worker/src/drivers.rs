use std::sync::Arc;

use tether_dependency::DependencyManager;
use tether_registry::{ConfigurationStore, Criteria, ServiceRegistry};

use crate::{DriverError, DriverHandle, PumpReport, RetryReport, TaskClass};

/// Status snapshot for one driver task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRecord {
	pub name: String,
	pub class: TaskClass,
	pub finished: bool,
}

/// Outcome of [`ComponentDrivers::shutdown`].
#[derive(Debug, Default)]
pub struct DriversReport {
	pub pumps: Vec<Result<PumpReport, DriverError>>,
	pub retry: Option<Result<RetryReport, DriverError>>,
}

/// Every driver task wired to one component's manager.
pub struct ComponentDrivers {
	manager: Arc<DependencyManager>,
	pumps: Vec<DriverHandle<PumpReport>>,
	retry: Option<DriverHandle<RetryReport>>,
}

impl ComponentDrivers {
	pub fn new(manager: Arc<DependencyManager>) -> Self {
		Self {
			manager,
			pumps: Vec::new(),
			retry: None,
		}
	}

	pub fn manager(&self) -> &Arc<DependencyManager> {
		&self.manager
	}

	/// Pumps registry events for `criteria` into `slot`.
	pub fn services<T, R>(&mut self, slot: &str, registry: &R, criteria: &Criteria) -> &mut Self
	where
		R: ServiceRegistry<T> + ?Sized,
	{
		self.pumps.push(crate::pump_services(Arc::clone(&self.manager), slot, registry, criteria));
		self
	}

	/// Pumps configuration events for `pid` into `slot`.
	pub fn configuration<S>(&mut self, slot: &str, store: &S, pid: &str) -> &mut Self
	where
		S: ConfigurationStore + ?Sized,
	{
		self.pumps.push(crate::pump_configuration(Arc::clone(&self.manager), slot, store, pid));
		self
	}

	/// Starts the configured retry loop unless one is running or it is disabled.
	pub fn with_retry(&mut self) -> &mut Self {
		if self.retry.is_none() {
			self.retry = crate::spawn_retry(Arc::clone(&self.manager));
		}
		self
	}

	/// Returns snapshots sorted by name.
	pub fn snapshots(&self) -> Vec<DriverRecord> {
		let pumps = self.pumps.iter().map(|h| (h.name(), h.class(), h.is_finished()));
		let retry = self.retry.iter().map(|h| (h.name(), h.class(), h.is_finished()));
		let mut records: Vec<_> = pumps
			.chain(retry)
			.map(|(name, class, finished)| DriverRecord {
				name: name.to_string(),
				class,
				finished,
			})
			.collect();
		records.sort_by(|a, b| a.name.cmp(&b.name));
		records
	}

	/// Cancels every driver and waits for their reports. The manager is left
	/// as it is; dispose it separately.
	pub async fn shutdown(self) -> DriversReport {
		for pump in &self.pumps {
			pump.cancel();
		}
		if let Some(retry) = &self.retry {
			retry.cancel();
		}
		let mut report = DriversReport::default();
		for pump in self.pumps {
			report.pumps.push(pump.join().await);
		}
		if let Some(retry) = self.retry {
			report.retry = Some(retry.join().await);
		}
		tracing::debug!(component = %self.manager.component(), pumps = report.pumps.len(), "worker.drivers.shutdown");
		report
	}
}
