use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

use crate::TaskClass;

/// Current runtime if there is one, otherwise a lazily built shared runtime
/// so drivers can be started from synchronous container code.
fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("tether-worker-global")
			.build()
			.expect("failed to build tether-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns a driver task tagged with its class.
pub fn spawn<F>(class: TaskClass, name: &str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), driver = name, "worker.spawn");
	runtime_handle().spawn(fut)
}
