use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::TaskClass;

/// A driver task ended without producing its report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
	#[error("driver {name} panicked")]
	Panicked { name: String },
	#[error("driver {name} was aborted")]
	Aborted { name: String },
}

/// Owner of one spawned driver task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct DriverHandle<R> {
	name: String,
	class: TaskClass,
	cancel: CancellationToken,
	task: Option<JoinHandle<R>>,
}

impl<R> DriverHandle<R> {
	pub(crate) fn new(name: String, class: TaskClass, cancel: CancellationToken, task: JoinHandle<R>) -> Self {
		Self {
			name,
			class,
			cancel,
			task: Some(task),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn class(&self) -> TaskClass {
		self.class
	}

	/// Requests cancellation without waiting.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn is_finished(&self) -> bool {
		self.task.as_ref().is_none_or(JoinHandle::is_finished)
	}

	/// Waits for the task and returns its report.
	pub async fn join(mut self) -> Result<R, DriverError> {
		let Some(task) = self.task.take() else {
			return Err(DriverError::Aborted { name: self.name.clone() });
		};
		match task.await {
			Ok(report) => Ok(report),
			Err(err) if err.is_panic() => {
				tracing::warn!(driver = %self.name, class = self.class.as_str(), "worker.driver.panicked");
				Err(DriverError::Panicked { name: self.name.clone() })
			}
			Err(_) => Err(DriverError::Aborted { name: self.name.clone() }),
		}
	}

	/// Cancels the task and waits for its report.
	pub async fn shutdown(self) -> Result<R, DriverError> {
		self.cancel();
		self.join().await
	}
}

impl<R> Drop for DriverHandle<R> {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}
