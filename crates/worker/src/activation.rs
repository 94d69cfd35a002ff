use std::time::Duration;

use tether_dependency::{ComponentState, DependencyError, DependencyManager};

use crate::TaskClass;

/// Opens `manager` and waits until the component is active.
///
/// If the deadline passes first the manager is abandoned, which releases
/// every pair bound so far, and [`DependencyError::ActivationTimedOut`] is
/// returned.
pub async fn activate_within(manager: &DependencyManager, timeout: Duration) -> Result<(), DependencyError> {
	let mut states = manager.subscribe_state();
	tracing::debug!(
		component = %manager.component(),
		worker_class = TaskClass::Activation.as_str(),
		?timeout,
		"worker.activation.begin"
	);
	manager.open();

	let settled = tokio::time::timeout(timeout, async {
		states
			.wait_for(|state| matches!(state, ComponentState::Active | ComponentState::Disposed))
			.await
			.map(|state| *state)
	})
	.await;

	match settled {
		Ok(Ok(ComponentState::Active)) => {
			tracing::debug!(component = %manager.component(), "worker.activation.ready");
			Ok(())
		}
		Ok(_) => Err(DependencyError::Disposed(manager.component().clone())),
		Err(_) => {
			tracing::warn!(component = %manager.component(), ?timeout, "worker.activation.timed_out");
			manager.abandon();
			Err(DependencyError::ActivationTimedOut {
				component: manager.component().clone(),
				timeout,
			})
		}
	}
}

/// [`activate_within`] using the manager's configured activation timeout.
pub async fn activate(manager: &DependencyManager) -> Result<(), DependencyError> {
	activate_within(manager, manager.config().activation_timeout()).await
}
