//! The listener callback surface and the dispatch-executor abstraction that
//! runs it.

// std
use std::{
	future::{Future, ready},
	pin::Pin,
};
// crates.io
use tokio::sync::mpsc;
// self
use crate::{error::FailureCause, event::Event};

/// Receives lifecycle and data callbacks from one
/// [`crate::source::EventSource`].
///
/// Every method has a no-op default body, mirroring the donor's
/// `EventHandler` trait: implementors override only the hooks they need.
/// Methods never return a `Result` — "exceptions" from a callback are
/// caught at the dispatch boundary (see [`crate::source::EventSource`]'s
/// dispatch loop), logged, and never abort the stream.
pub trait Listener
where
	Self: Send + Sync,
{
	/// A connection was established; fires exactly once per successful
	/// connect.
	fn on_open(&self) {}

	/// A complete event was parsed and is ready for delivery.
	fn on_event(&self, #[allow(unused)] event: &Event) {}

	/// A failure occurred; `cause.retryable` tells the listener whether a
	/// reconnect has been scheduled.
	fn on_failure(&self, #[allow(unused)] cause: &FailureCause) {}

	/// The subscription has terminated permanently; fires exactly once,
	/// last among all callbacks.
	fn on_closed(&self) {}
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Runs listener-dispatch jobs, decoupling where a callback executes from
/// the I/O reactor that produced it.
pub trait CallbackExecutor
where
	Self: Send + Sync,
{
	/// Submit `job` for execution. Implementations must preserve submission
	/// order for jobs belonging to the same subscription.
	fn dispatch(&self, job: BoxFuture) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Runs every job to completion on the calling task. Cannot overflow since
/// it never queues; this is the default executor.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;
impl CallbackExecutor for Inline {
	fn dispatch(&self, job: BoxFuture) -> Pin<Box<dyn Future<Output = ()> + Send>> {
		job
	}
}

/// Hands each job to a single dedicated worker task that runs them one at a
/// time, in submission order, off the calling (I/O reactor) task.
///
/// `dispatch` returns as soon as the job is enqueued, not once it has run —
/// the I/O reactor never waits on a callback. When bounded, a full queue
/// drops the incoming job (logging a warning) rather than blocking the
/// submitter; this is the "propagate failure on overflow" policy, not
/// "block the sender."
#[derive(Clone, Debug)]
pub struct TokioSpawn {
	sender: QueueSender,
}

#[derive(Clone, Debug)]
enum QueueSender {
	Unbounded(mpsc::UnboundedSender<BoxFuture>),
	Bounded(mpsc::Sender<BoxFuture>),
}
impl TokioSpawn {
	/// A worker queue with no capacity limit; `dispatch` never drops a job.
	pub fn unbounded() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();

		tokio::spawn(run_worker_unbounded(rx));

		Self { sender: QueueSender::Unbounded(tx) }
	}

	/// A worker queue holding at most `capacity` pending jobs; once full,
	/// `dispatch` drops the incoming job instead of blocking.
	pub fn bounded(capacity: usize) -> Self {
		let (tx, rx) = mpsc::channel(capacity);

		tokio::spawn(run_worker_bounded(rx));

		Self { sender: QueueSender::Bounded(tx) }
	}
}
impl Default for TokioSpawn {
	fn default() -> Self {
		Self::unbounded()
	}
}
impl CallbackExecutor for TokioSpawn {
	fn dispatch(&self, job: BoxFuture) -> Pin<Box<dyn Future<Output = ()> + Send>> {
		match &self.sender {
			QueueSender::Unbounded(tx) =>
				if tx.send(job).is_err() {
					tracing::error!("callback worker task is gone; dropping callback");
				},
			QueueSender::Bounded(tx) =>
				if let Err(error) = tx.try_send(job) {
					tracing::warn!(%error, "callback queue is full; dropping callback");
				},
		}

		Box::pin(ready(()))
	}
}

async fn run_worker_unbounded(mut rx: mpsc::UnboundedReceiver<BoxFuture>) {
	while let Some(job) = rx.recv().await {
		job.await;
	}
}

async fn run_worker_bounded(mut rx: mpsc::Receiver<BoxFuture>) {
	while let Some(job) = rx.recv().await {
		job.await;
	}
}

#[cfg(test)]
mod tests {
	use std::{
		sync::{
			Arc,
			atomic::{AtomicUsize, Ordering},
		},
		time::Duration,
	};

	use tokio::sync::Notify;

	use super::*;

	async fn wait_until(mut check: impl FnMut() -> bool) {
		for _ in 0..200 {
			if check() {
				return;
			}

			tokio::time::sleep(Duration::from_millis(5)).await;
		}

		panic!("condition never became true");
	}

	#[tokio::test]
	async fn inline_should_run_job_synchronously() {
		let ran = Arc::new(AtomicUsize::new(0));
		let ran2 = ran.clone();

		Inline.dispatch(Box::pin(async move {
			ran2.fetch_add(1, Ordering::SeqCst);
		}))
		.await;

		assert_eq!(ran.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn tokio_spawn_should_eventually_run_the_job() {
		let ran = Arc::new(AtomicUsize::new(0));
		let ran2 = ran.clone();
		let exec = TokioSpawn::bounded(1);

		exec.dispatch(Box::pin(async move {
			ran2.fetch_add(1, Ordering::SeqCst);
		}))
		.await;

		wait_until(|| ran.load(Ordering::SeqCst) == 1).await;
	}

	#[tokio::test]
	async fn dispatch_should_return_before_the_job_completes() {
		let gate = Arc::new(Notify::new());
		let gate2 = gate.clone();
		let exec = TokioSpawn::unbounded();

		// If `dispatch` waited for the job to run, this would hang forever:
		// the job can't proceed until `notify_one` below runs, which only
		// happens after `dispatch` has already returned.
		exec.dispatch(Box::pin(async move {
			gate2.notified().await;
		}))
		.await;

		gate.notify_one();
	}

	#[tokio::test]
	async fn bounded_queue_should_drop_overflow_without_blocking() {
		let gate = Arc::new(Notify::new());
		let ran = Arc::new(AtomicUsize::new(0));
		let exec = TokioSpawn::bounded(1);

		let blocker = gate.clone();

		// Occupies the worker task until released, below.
		exec.dispatch(Box::pin(async move {
			blocker.notified().await;
		}))
		.await;

		let ran2 = ran.clone();

		// Fills the one-slot queue behind the blocked worker.
		exec.dispatch(Box::pin(async move {
			ran2.fetch_add(1, Ordering::SeqCst);
		}))
		.await;

		let ran3 = ran.clone();

		// The queue is full; this job is dropped rather than blocking here.
		exec.dispatch(Box::pin(async move {
			ran3.fetch_add(1, Ordering::SeqCst);
		}))
		.await;

		gate.notify_one();

		wait_until(|| ran.load(Ordering::SeqCst) >= 1).await;

		// Only the queued job ran; the overflow job never did.
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(ran.load(Ordering::SeqCst), 1);
	}

	struct NoopListener;
	impl Listener for NoopListener {}

	#[test]
	fn default_listener_methods_should_be_callable() {
		let l = NoopListener;

		l.on_open();
		l.on_closed();
	}
}
