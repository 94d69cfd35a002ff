use std::sync::Arc;

use parking_lot::Mutex;

use crate::CapabilityUnavailable;

type Probe = Box<dyn Fn() -> bool + Send + Sync>;
type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Optional backing capability constructed on first use.
///
/// The probe must be side-effect free; it is consulted on every call until
/// the capability has been constructed. Construction happens at most once
/// until [`shutdown`](Self::shutdown).
pub struct LazyCapability<T> {
	name: &'static str,
	probe: Probe,
	factory: Factory<T>,
	instance: Mutex<Option<Arc<T>>>,
}

impl<T> LazyCapability<T> {
	pub fn new(name: &'static str, probe: impl Fn() -> bool + Send + Sync + 'static, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
		Self {
			name,
			probe: Box::new(probe),
			factory: Box::new(factory),
			instance: Mutex::new(None),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Whether the backing capability is present. Never constructs it.
	pub fn is_available(&self) -> bool {
		self.instance.lock().is_some() || (self.probe)()
	}

	/// Returns the shared instance, constructing it on the first call.
	pub fn get(&self) -> Result<Arc<T>, CapabilityUnavailable> {
		let mut instance = self.instance.lock();
		if let Some(existing) = instance.as_ref() {
			return Ok(Arc::clone(existing));
		}
		if !(self.probe)() {
			tracing::debug!(capability = self.name, "dependency.capability.unavailable");
			return Err(CapabilityUnavailable { capability: self.name });
		}
		let created = Arc::new((self.factory)());
		*instance = Some(Arc::clone(&created));
		tracing::info!(capability = self.name, "dependency.capability.constructed");
		Ok(created)
	}

	pub fn is_constructed(&self) -> bool {
		self.instance.lock().is_some()
	}

	/// Drops the memoized instance and hands it back for teardown.
	pub fn shutdown(&self) -> Option<Arc<T>> {
		let instance = self.instance.lock().take();
		if instance.is_some() {
			tracing::info!(capability = self.name, "dependency.capability.shutdown");
		}
		instance
	}
}

impl<T> std::fmt::Debug for LazyCapability<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LazyCapability")
			.field("name", &self.name)
			.field("constructed", &self.is_constructed())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

	use super::*;

	struct Scheduler {
		id: usize,
	}

	fn capability(present: Arc<AtomicBool>, built: Arc<AtomicUsize>) -> LazyCapability<Scheduler> {
		LazyCapability::new(
			"scheduler",
			move || present.load(Ordering::SeqCst),
			move || Scheduler {
				id: built.fetch_add(1, Ordering::SeqCst),
			},
		)
	}

	#[test]
	fn unavailable_probe_has_no_side_effects() {
		let present = Arc::new(AtomicBool::new(false));
		let built = Arc::new(AtomicUsize::new(0));
		let cap = capability(present, Arc::clone(&built));

		assert!(!cap.is_available());
		assert_eq!(cap.get().err(), Some(CapabilityUnavailable { capability: "scheduler" }));
		assert!(!cap.is_constructed());
		assert_eq!(built.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn constructs_once_when_available() {
		let present = Arc::new(AtomicBool::new(false));
		let built = Arc::new(AtomicUsize::new(0));
		let cap = capability(Arc::clone(&present), Arc::clone(&built));
		assert!(cap.get().is_err());

		present.store(true, Ordering::SeqCst);
		assert!(cap.is_available());
		let first = cap.get().unwrap();
		let second = cap.get().unwrap();
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(first.id, 0);
		assert_eq!(built.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn concurrent_first_use_constructs_once() {
		let built = Arc::new(AtomicUsize::new(0));
		let cap = Arc::new(capability(Arc::new(AtomicBool::new(true)), Arc::clone(&built)));
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let cap = Arc::clone(&cap);
				std::thread::spawn(move || cap.get().unwrap().id)
			})
			.collect();
		for handle in handles {
			assert_eq!(handle.join().unwrap(), 0);
		}
		assert_eq!(built.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn shutdown_releases_and_allows_reconstruction() {
		let built = Arc::new(AtomicUsize::new(0));
		let cap = capability(Arc::new(AtomicBool::new(true)), Arc::clone(&built));
		let first = cap.get().unwrap();

		let released = cap.shutdown().unwrap();
		assert!(Arc::ptr_eq(&first, &released));
		assert!(cap.shutdown().is_none());
		assert!(!cap.is_constructed());

		assert_eq!(cap.get().unwrap().id, 1);
	}
}
