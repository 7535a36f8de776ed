//! The scheduled-delay collaborator trait, plus a `tokio`-backed default
//! implementation.

// std
use std::{future::Future, pin::Pin, time::Duration};
// crates.io
use tokio::task::AbortHandle;

/// A handle to a pending scheduled task. Dropping it does not cancel the
/// task; call [`CancelHandle::cancel`] explicitly.
pub struct CancelHandle {
	abort: AbortHandle,
}
impl CancelHandle {
	/// Wrap a raw [`AbortHandle`]; exposed so alternative [`Scheduler`]
	/// implementations (e.g. test fakes) outside this crate can build their
	/// own handles.
	pub fn from_abort_handle(abort: AbortHandle) -> Self {
		Self { abort }
	}

	/// Cancel the pending task. Idempotent; cancelling an already-fired or
	/// already-cancelled task is a no-op.
	pub fn cancel(&self) {
		self.abort.abort();
	}
}

/// Executes a zero-argument task after a delay, and supports cancelling it
/// before it fires.
pub trait Scheduler
where
	Self: Send + Sync,
{
	/// Schedule `task` to run after `delay`, returning a handle that can
	/// cancel it.
	fn schedule(
		&self,
		delay: Duration,
		task: Pin<Box<dyn Future<Output = ()> + Send>>,
	) -> CancelHandle;
}

/// Default [`Scheduler`], backed by `tokio::time::sleep` inside a spawned
/// task.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;
impl Scheduler for TokioScheduler {
	fn schedule(
		&self,
		delay: Duration,
		task: Pin<Box<dyn Future<Output = ()> + Send>>,
	) -> CancelHandle {
		let handle = tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			task.await;
		});

		CancelHandle { abort: handle.abort_handle() }
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	};

	use super::*;

	#[tokio::test]
	async fn scheduled_task_should_run_after_delay() {
		let ran = Arc::new(AtomicBool::new(false));
		let ran2 = ran.clone();

		TokioScheduler.schedule(
			Duration::from_millis(1),
			Box::pin(async move {
				ran2.store(true, Ordering::SeqCst);
			}),
		);

		tokio::time::sleep(Duration::from_millis(50)).await;

		assert!(ran.load(Ordering::SeqCst));
	}

	#[tokio::test]
	async fn cancel_should_prevent_task_from_running() {
		let ran = Arc::new(AtomicBool::new(false));
		let ran2 = ran.clone();

		let handle = TokioScheduler.schedule(
			Duration::from_millis(50),
			Box::pin(async move {
				ran2.store(true, Ordering::SeqCst);
			}),
		);

		handle.cancel();

		tokio::time::sleep(Duration::from_millis(100)).await;

		assert!(!ran.load(Ordering::SeqCst));
	}
}
