use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// One serialized transition.
pub(crate) type Transition<C> = Box<dyn FnOnce(&C) + Send>;

/// Serializes state transitions for one component instance.
///
/// The first thread to submit becomes the runner and drains the queue in
/// submission order; other submitters enqueue and return. Submissions made
/// from inside a running transition (for example from a component callback)
/// are queued behind it instead of running re-entrantly, so transitions are
/// never interleaved.
pub(crate) struct StateCoordinator<C> {
	queue: Mutex<VecDeque<Transition<C>>>,
	running: AtomicBool,
}

/// Clears the runner flag even if a transition panics.
struct RunnerGuard<'a>(&'a AtomicBool);

impl Drop for RunnerGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl<C> StateCoordinator<C> {
	pub(crate) fn new() -> Self {
		Self {
			queue: Mutex::new(VecDeque::new()),
			running: AtomicBool::new(false),
		}
	}

	/// Submits a transition and drains the queue if no runner is active.
	pub(crate) fn execute(&self, target: &C, transition: Transition<C>) {
		self.queue.lock().push_back(transition);
		loop {
			if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
				return;
			}
			{
				let _guard = RunnerGuard(&self.running);
				loop {
					let next = self.queue.lock().pop_front();
					let Some(next) = next else {
						break;
					};
					next(target);
				}
			}
			// A submitter may have enqueued after the last pop but before the
			// runner flag cleared; it returned early, so pick its work up.
			if self.queue.lock().is_empty() {
				return;
			}
		}
	}

	/// Number of queued transitions.
	#[cfg(test)]
	pub(crate) fn pending(&self) -> usize {
		self.queue.lock().len()
	}
}
