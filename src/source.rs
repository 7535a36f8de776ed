//! The public per-subscription handle.

// std
use std::{
	panic::{AssertUnwindSafe, catch_unwind},
	sync::{Arc, Mutex},
};
// crates.io
use futures::StreamExt;
use reqwew::reqwest::StatusCode;
// self
use crate::{
	config::EventSourceConfig,
	consumer::{EntityConsumer, ParserStrategy, validate_content_type},
	error::{Error, Result},
	event::Event,
	header::{self, HeaderMap},
	listener::{CallbackExecutor, Listener},
	parser::{Parser, ParserSink},
	reconnect::{Decision, ReconnectController},
	scheduler::Scheduler,
	transport::{Request, Transport},
};

/// Buffers the dispatch-worthy output of one [`Parser::feed_line`] call so
/// it can be awaited through the callback executor afterward; the parser
/// itself never suspends.
#[derive(Default)]
struct BufferingSink {
	events: Vec<Event>,
	retry_hints: Vec<u64>,
}
impl ParserSink for BufferingSink {
	fn on_event(&mut self, event: Event) {
		self.events.push(event);
	}

	fn on_retry_change(&mut self, ms: u64) {
		self.retry_hints.push(ms);
	}
}

struct EventSourceInner {
	uri: String,
	listener: Arc<dyn Listener>,
	headers: Mutex<HeaderMap>,
	parser_strategy: ParserStrategy,
	transport: Arc<dyn Transport>,
	scheduler: Arc<dyn Scheduler>,
	callback_executor: Arc<dyn CallbackExecutor>,
	reconnect: ReconnectController,
	last_event_id: Mutex<Option<String>>,
}

/// A single subscription to a `text/event-stream` URI.
///
/// Cheaply [`Clone`]able; every clone refers to the same underlying
/// subscription, so `start()`/`cancel()`/header mutators may be called
/// from any clone without `&mut self`.
#[derive(Clone)]
pub struct EventSource {
	inner: Arc<EventSourceInner>,
}
impl EventSource {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		uri: String,
		listener: Arc<dyn Listener>,
		headers: HeaderMap,
		config: EventSourceConfig,
		parser_strategy: ParserStrategy,
		transport: Arc<dyn Transport>,
		scheduler: Arc<dyn Scheduler>,
		callback_executor: Arc<dyn CallbackExecutor>,
	) -> Self {
		Self {
			inner: Arc::new(EventSourceInner {
				uri,
				listener,
				headers: Mutex::new(headers),
				reconnect: ReconnectController::new(config),
				parser_strategy,
				transport,
				scheduler,
				callback_executor,
				last_event_id: Mutex::new(None),
			}),
		}
	}

	/// Begin connecting. Idempotent: calling it again after the first call
	/// has no effect.
	pub fn start(&self) {
		if !self.inner.reconnect.try_start() {
			return;
		}

		let inner = self.inner.clone();
		let join = tokio::spawn(run_loop(inner));

		self.inner.reconnect.set_task_handle(join.abort_handle());
	}

	/// Terminate the subscription immediately. Idempotent; cancelling a
	/// subscription that is already closed is a no-op.
	pub fn cancel(&self) {
		if self.inner.reconnect.cancel() {
			let listener = self.inner.listener.clone();
			let executor = self.inner.callback_executor.clone();

			tokio::spawn(async move {
				dispatch(&executor, move || listener.on_closed()).await;
			});
		}
	}

	/// The last dispatched event id, or whatever was last set via
	/// [`EventSource::set_last_event_id`].
	pub fn last_event_id(&self) -> Option<String> {
		self.inner.last_event_id.lock().unwrap().clone()
	}

	/// Overwrite the persisted last-event id. Passing `None` clears it, so
	/// subsequent requests omit the `Last-Event-ID` header.
	pub fn set_last_event_id(&self, id: Option<String>) {
		*self.inner.last_event_id.lock().unwrap() = id;
	}

	/// Set (or replace) a header sent with every request this subscription
	/// makes, including reconnects.
	pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
		self.inner.headers.lock().unwrap().insert(name, value);
	}

	/// Remove a previously-set header.
	pub fn remove_header(&self, name: &str) {
		self.inner.headers.lock().unwrap().remove(name);
	}

	/// A snapshot of the headers currently configured for this
	/// subscription (excluding `Last-Event-ID`, which is computed fresh per
	/// request).
	pub fn headers_snapshot(&self) -> HeaderMap {
		self.inner.headers.lock().unwrap().clone()
	}

	/// Whether the subscription currently has an open response; `false`
	/// during `Connecting`, `Waiting`, `Failed`, and `Closed`.
	pub fn is_connected(&self) -> bool {
		self.inner.reconnect.is_open()
	}
}

async fn dispatch(executor: &Arc<dyn CallbackExecutor>, job: impl FnOnce() + Send + 'static) {
	let fut = Box::pin(async move {
		if catch_unwind(AssertUnwindSafe(job)).is_err() {
			tracing::error!("listener callback panicked; continuing stream");
		}
	});

	executor.dispatch(fut).await;
}

fn build_request(inner: &EventSourceInner) -> Request {
	let mut headers = inner.headers.lock().unwrap().clone();

	headers.insert_if_absent(header::ACCEPT, "text/event-stream");
	headers.insert_if_absent(header::CACHE_CONTROL, "no-cache");

	if let Some(id) = inner.last_event_id.lock().unwrap().as_deref() {
		headers.insert(header::LAST_EVENT_ID, id);
	}

	Request { uri: inner.uri.clone(), headers }
}

/// Parse an RFC 7231 `Retry-After` header value (integer seconds or an
/// HTTP-date) into a millisecond delay relative to now. Malformed values
/// are ignored per spec.
fn parse_retry_after_ms(value: &str) -> Option<u64> {
	if let Ok(secs) = value.trim().parse::<u64>() {
		return secs.checked_mul(1000);
	}

	let target = httpdate::parse_http_date(value).ok()?;
	let now = std::time::SystemTime::now();

	target.duration_since(now).ok().map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
}

/// Hand the reconnect delay to the [`Scheduler`] collaborator and await its
/// completion via a oneshot channel; the outer per-subscription task abort
/// already covers cancellation, so the scheduler's own cancel handle is not
/// separately tracked here.
async fn wait_for_scheduler(scheduler: &Arc<dyn Scheduler>, delay_ms: u64) {
	let (tx, rx) = tokio::sync::oneshot::channel();
	let _handle = scheduler.schedule(
		std::time::Duration::from_millis(delay_ms),
		Box::pin(async move {
			let _ = tx.send(());
		}),
	);

	let _ = rx.await;
}

async fn run_loop(inner: Arc<EventSourceInner>) {
	loop {
		let mut parser = Parser::with_last_event_id(inner.last_event_id.lock().unwrap().clone());
		let mut consumer = EntityConsumer::new(inner.parser_strategy);
		let request = build_request(&inner);

		let outcome = connect_and_stream(&inner, request, &mut parser, &mut consumer).await;

		let (error, retryable) = match outcome {
			Ok(()) => (Error::any("stream ended"), true),
			Err(e @ Error::ContentTypeMismatch(_)) => (e, false),
			Err(e @ Error::HttpStatus(status))
				if !status.is_server_error() && !inner.reconnect.has_server_hint() =>
				(e, false),
			Err(e) => (e, true),
		};

		let (cause, decision) = inner.reconnect.on_failure(error, retryable);
		let listener = inner.listener.clone();

		dispatch(&inner.callback_executor, move || listener.on_failure(&cause)).await;

		match decision {
			Decision::Reconnect { delay_ms } => {
				tracing::info!(delay_ms, "reconnect scheduled");

				wait_for_scheduler(&inner.scheduler, delay_ms).await;

				if !inner.reconnect.try_resume_connecting() {
					return;
				}
			},
			Decision::Close => {
				let listener = inner.listener.clone();

				dispatch(&inner.callback_executor, move || listener.on_closed()).await;

				return;
			},
		}
	}
}

async fn connect_and_stream(
	inner: &Arc<EventSourceInner>,
	request: Request,
	parser: &mut Parser,
	consumer: &mut EntityConsumer,
) -> Result<()> {
	tracing::debug!(uri = %request.uri, "connecting");

	let handle = inner.transport.submit(request).await?;

	if handle.status() != StatusCode::OK {
		if let Some(ms) = handle.header("retry-after").and_then(parse_retry_after_ms) {
			inner.reconnect.set_server_hint_ms(ms);
		}

		return Err(Error::HttpStatus(handle.status()));
	}

	if let Some(content_type) = handle.header("content-type") {
		validate_content_type(content_type)?;
	}

	let mut stream = handle.into_byte_stream();
	let mut opened = false;

	while let Some(chunk) = stream.next().await {
		let chunk = chunk?;
		let consumed = consumer.consume(&chunk)?;

		if consumed.opened && !opened {
			opened = true;

			inner.reconnect.on_open();

			let listener = inner.listener.clone();

			dispatch(&inner.callback_executor, move || listener.on_open()).await;
		}

		for line in consumed.lines {
			let mut sink = BufferingSink::default();

			parser.feed_line(&line, &mut sink);

			for ms in sink.retry_hints {
				inner.reconnect.set_server_hint_ms(ms);
			}

			dispatch_events(inner, sink.events).await;
		}
	}

	let consumed = consumer.stream_end();
	let mut sink = BufferingSink::default();

	for line in consumed.lines {
		parser.feed_line(&line, &mut sink);
	}

	dispatch_events(inner, sink.events).await;

	Ok(())
}

async fn dispatch_events(inner: &Arc<EventSourceInner>, events: Vec<Event>) {
	for event in events {
		*inner.last_event_id.lock().unwrap() = event.id.clone();

		let listener = inner.listener.clone();
		let event = Arc::new(event);

		dispatch(&inner.callback_executor, move || listener.on_event(&event)).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retry_after_seconds_should_parse() {
		assert_eq!(parse_retry_after_ms("120"), Some(120_000));
	}

	#[test]
	fn retry_after_malformed_should_be_ignored() {
		assert_eq!(parse_retry_after_ms("not-a-date"), None);
	}
}
