use std::sync::Arc;
use std::time::Duration;

use tether_dependency::{ComponentState, DependencyManager};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{DriverHandle, TaskClass};

/// Why a retry loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryExit {
	Cancelled,
	Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryReport {
	pub exit: RetryExit,
	/// Rounds in which the manager was asked to retry.
	pub rounds: u64,
}

/// Starts the automatic retry loop configured on the manager.
///
/// Returns `None` when `[retry] interval_ms` is `0`.
pub fn spawn_retry(manager: Arc<DependencyManager>) -> Option<DriverHandle<RetryReport>> {
	let interval = manager.config().retry_interval()?;
	Some(spawn_retry_every(manager, interval))
}

/// Retries failed pairs and refused activations every `interval`.
///
/// A round is skipped unless activation was refused or some failed pair is
/// still below `[retry] max_attempts`.
pub fn spawn_retry_every(manager: Arc<DependencyManager>, interval: Duration) -> DriverHandle<RetryReport> {
	let name = format!("{}/retry", manager.component());
	let cancel = CancellationToken::new();
	let task = crate::spawn(TaskClass::Retry, &name, run_retry(manager, interval, cancel.clone()));
	DriverHandle::new(name, TaskClass::Retry, cancel, task)
}

/// A refused activation, or a failed pair still under the attempt limit.
fn needs_retry(manager: &DependencyManager) -> bool {
	(manager.state() == ComponentState::Inactive && manager.is_satisfied()) || manager.retryable_failures() > 0
}

async fn run_retry(manager: Arc<DependencyManager>, interval: Duration, cancel: CancellationToken) -> RetryReport {
	let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	let mut rounds = 0;
	let exit = loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break RetryExit::Cancelled,
			_ = ticker.tick() => {}
		}
		if manager.state() == ComponentState::Disposed {
			break RetryExit::Disposed;
		}
		if needs_retry(&manager) {
			rounds += 1;
			tracing::trace!(component = %manager.component(), round = rounds, "worker.retry.round");
			manager.retry_failed();
		}
	};
	tracing::debug!(component = %manager.component(), ?exit, rounds, "worker.retry.exit");
	RetryReport { exit, rounds }
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use tether_dependency::ManagerConfig;
	use tether_registry::{MemoryRegistry, ProviderRef};

	use super::*;
	use crate::test_support::service_manager;

	fn manager(registry: &Arc<MemoryRegistry<String>>, config: ManagerConfig) -> Arc<DependencyManager> {
		service_manager("flaky", "db", registry, config)
	}

	#[test]
	fn disabled_interval_spawns_nothing() {
		let registry = Arc::new(MemoryRegistry::new());
		let config = ManagerConfig::from_toml_str("[retry]\ninterval_ms = 0\n").unwrap();
		assert!(spawn_retry(manager(&registry, config)).is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn retries_until_the_provider_recovers() {
		let registry = Arc::new(MemoryRegistry::new());
		let failures_left = Arc::new(AtomicUsize::new(2));
		let left = Arc::clone(&failures_left);
		let id = registry.register("db", BTreeMap::new(), 0, move |_, _| {
			if left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
				return Err(String::from("connection refused"));
			}
			Ok("db".to_string())
		});

		let config = ManagerConfig::from_toml_str("[retry]\ninterval_ms = 100\nmax_attempts = 0\n").unwrap();
		let manager = manager(&registry, config);
		manager.provider_added("db", ProviderRef::new(id, 0)).unwrap();
		manager.open();
		assert_eq!(manager.state(), ComponentState::Inactive);

		let retry = spawn_retry(Arc::clone(&manager)).unwrap();
		let mut states = manager.subscribe_state();
		tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == ComponentState::Active))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(failures_left.load(Ordering::SeqCst), 0);

		let report = retry.shutdown().await.unwrap();
		assert_eq!(report.exit, RetryExit::Cancelled);
		assert_eq!(report.rounds, 2);
	}

	#[tokio::test(start_paused = true)]
	async fn exhausted_pairs_stop_further_rounds() {
		let registry = Arc::new(MemoryRegistry::new());
		let attempts = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&attempts);
		let id = registry.register("db", BTreeMap::new(), 0, move |_, _| {
			counter.fetch_add(1, Ordering::SeqCst);
			Err(String::from("connection refused"))
		});

		let config = ManagerConfig::from_toml_str("[retry]
interval_ms = 100
max_attempts = 2
").unwrap();
		let manager = manager(&registry, config);
		manager.provider_added("db", ProviderRef::new(id, 0)).unwrap();
		manager.open();
		assert_eq!(manager.retryable_failures(), 1);

		let retry = spawn_retry(Arc::clone(&manager)).unwrap();
		tokio::time::sleep(Duration::from_secs(1)).await;
		assert_eq!(attempts.load(Ordering::SeqCst), 2);
		assert_eq!(manager.retryable_failures(), 0);
		assert_eq!(manager.state(), ComponentState::Inactive);

		let report = retry.shutdown().await.unwrap();
		assert_eq!(report.rounds, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn stops_after_disposal() {
		let registry = Arc::new(MemoryRegistry::new());
		let manager = manager(&registry, ManagerConfig::default());
		let retry = spawn_retry_every(Arc::clone(&manager), Duration::from_millis(10));
		manager.dispose();
		assert_eq!(retry.join().await.unwrap().exit, RetryExit::Disposed);
	}
}
