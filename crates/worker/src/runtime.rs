use std::sync::LazyLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Runtime used when a host calls in from a thread Tokio does not know about.
static FALLBACK: LazyLock<Runtime> = LazyLock::new(|| {
	Builder::new_multi_thread()
		.worker_threads(1)
		.enable_time()
		.thread_name("linkguard-timers")
		.build()
		.expect("linkguard fallback runtime")
});

/// The caller's runtime when there is one, the shared fallback otherwise.
pub(crate) fn handle() -> Handle {
	Handle::try_current().unwrap_or_else(|_| FALLBACK.handle().clone())
}

/// Runs blocking work (HTTP delivery, file I/O) off the caller's thread.
///
/// The result is only observable through the returned handle; dropping it
/// detaches the work.
pub fn offload<F, R>(what: &'static str, work: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(what, "worker.offload");
	handle().spawn_blocking(work)
}
