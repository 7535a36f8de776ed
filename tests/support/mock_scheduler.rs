//! A [`Scheduler`] fake that runs every scheduled task almost immediately,
//! so reconnect-path tests don't wait out real backoff delays.

use std::{future::Future, pin::Pin, time::Duration};

use sse_client::scheduler::{CancelHandle, Scheduler};

#[derive(Clone, Copy, Debug, Default)]
pub struct InstantScheduler;
impl Scheduler for InstantScheduler {
	fn schedule(
		&self,
		_delay: Duration,
		task: Pin<Box<dyn Future<Output = ()> + Send>>,
	) -> CancelHandle {
		let handle = tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(1)).await;
			task.await;
		});

		CancelHandle::from_abort_handle(handle.abort_handle())
	}
}
