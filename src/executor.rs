//! Process-wide factory that opens [`crate::source::EventSource`]
//! subscriptions, owning or borrowing the shared transport and scheduler.

// std
use std::sync::{Arc, OnceLock};
// self
use crate::{
	config::EventSourceConfig,
	consumer::ParserStrategy,
	header::HeaderMap,
	listener::{CallbackExecutor, Inline, Listener},
	scheduler::{Scheduler, TokioScheduler},
	source::EventSource,
	transport::{ReqwestTransport, Transport},
};

/// Whether an [`SseExecutor`] owns a collaborator (and must shut it down on
/// [`SseExecutor::close`]) or merely borrows it from the caller (in which
/// case `close()` leaves it alone).
pub enum Ownership<T: ?Sized> {
	/// Constructed internally; `close()` shuts it down.
	Owned(Arc<T>),
	/// Supplied by the caller; `close()` is a no-op for it.
	Borrowed(Arc<T>),
}
impl<T: ?Sized> Ownership<T> {
	fn handle(&self) -> Arc<T> {
		match self {
			Self::Owned(t) | Self::Borrowed(t) => t.clone(),
		}
	}

	fn is_owned(&self) -> bool {
		matches!(self, Self::Owned(_))
	}
}

static SHARED_TRANSPORT: OnceLock<Arc<ReqwestTransport>> = OnceLock::new();

/// The process-wide default transport, lazily constructed on first use.
/// An executor that falls back to this instance must not close it — it is
/// shared by every caller in the process that didn't supply its own.
pub fn shared_transport() -> Arc<ReqwestTransport> {
	SHARED_TRANSPORT.get_or_init(|| Arc::new(ReqwestTransport::new())).clone()
}

/// Per-call overrides for [`SseExecutor::open`]; any field left `None`
/// inherits the executor's default.
#[derive(Default)]
pub struct OpenOptions {
	headers: Option<HeaderMap>,
	config: Option<EventSourceConfig>,
	parser_strategy: Option<ParserStrategy>,
	callback_executor: Option<Arc<dyn CallbackExecutor>>,
}
impl OpenOptions {
	/// Start from defaults, overriding nothing.
	pub fn new() -> Self {
		Self::default()
	}

	/// Override the headers sent with every request of this subscription.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = Some(headers);

		self
	}

	/// Override the per-subscription config (backoff, max reconnects).
	pub fn config(mut self, config: EventSourceConfig) -> Self {
		self.config = Some(config);

		self
	}

	/// Override the entity-consumer framing strategy.
	pub fn parser_strategy(mut self, strategy: ParserStrategy) -> Self {
		self.parser_strategy = Some(strategy);

		self
	}

	/// Override the callback executor used to dispatch listener methods.
	pub fn callback_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
		self.callback_executor = Some(executor);

		self
	}
}

/// Fluent builder for [`SseExecutor`], mirroring the donor's
/// `AgentBuilder`.
pub struct SseExecutorBuilder {
	transport: Option<Ownership<dyn Transport>>,
	scheduler: Option<Ownership<dyn Scheduler>>,
	headers: HeaderMap,
	config: EventSourceConfig,
	parser_strategy: ParserStrategy,
	callback_executor: Arc<dyn CallbackExecutor>,
}
impl SseExecutorBuilder {
	/// Start from the executor's built-in defaults.
	pub fn new() -> Self {
		Self {
			transport: None,
			scheduler: None,
			headers: HeaderMap::new(),
			config: EventSourceConfig::default(),
			parser_strategy: ParserStrategy::default(),
			callback_executor: Arc::new(Inline),
		}
	}

	/// Supply a transport the executor borrows; `close()` will not shut it
	/// down.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(Ownership::Borrowed(transport));

		self
	}

	/// Supply a scheduler the executor borrows; `close()` will not shut it
	/// down.
	pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
		self.scheduler = Some(Ownership::Borrowed(scheduler));

		self
	}

	/// Default headers injected into every subscription opened by this
	/// executor, unless overridden per call.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Default per-subscription config.
	pub fn config(mut self, config: EventSourceConfig) -> Self {
		self.config = config;

		self
	}

	/// Default entity-consumer framing strategy.
	pub fn parser_strategy(mut self, strategy: ParserStrategy) -> Self {
		self.parser_strategy = strategy;

		self
	}

	/// Default callback executor.
	pub fn callback_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
		self.callback_executor = executor;

		self
	}

	/// Finish building. A transport not supplied via
	/// [`SseExecutorBuilder::transport`] falls back to
	/// [`shared_transport`] (`Borrowed`, never closed by this executor); a
	/// scheduler not supplied falls back to an owned [`TokioScheduler`].
	pub fn build(self) -> SseExecutor {
		let transport = self.transport.unwrap_or_else(|| Ownership::Borrowed(shared_transport()));
		let scheduler =
			self.scheduler.unwrap_or_else(|| Ownership::Owned(Arc::new(TokioScheduler)));

		SseExecutor {
			transport,
			scheduler,
			default_headers: self.headers,
			default_config: self.config,
			default_parser_strategy: self.parser_strategy,
			default_callback_executor: self.callback_executor,
		}
	}
}
impl Default for SseExecutorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Process-wide (or per-caller) factory that opens subscriptions, sharing
/// the transport and scheduler across every [`crate::source::EventSource`]
/// it creates.
pub struct SseExecutor {
	transport: Ownership<dyn Transport>,
	scheduler: Ownership<dyn Scheduler>,
	default_headers: HeaderMap,
	default_config: EventSourceConfig,
	default_parser_strategy: ParserStrategy,
	default_callback_executor: Arc<dyn CallbackExecutor>,
}
impl SseExecutor {
	/// Start building an executor.
	pub fn builder() -> SseExecutorBuilder {
		SseExecutorBuilder::new()
	}

	/// Open a new subscription to `uri`. Any `options` field left
	/// unspecified inherits this executor's default.
	pub fn open(
		&self,
		uri: impl Into<String>,
		listener: Arc<dyn Listener>,
		options: OpenOptions,
	) -> EventSource {
		let headers = match options.headers {
			Some(caller_headers) => caller_headers.merge_preferring_self(&self.default_headers),
			None => self.default_headers.clone(),
		};
		let config = options.config.unwrap_or_else(|| self.default_config.clone());
		let parser_strategy = options.parser_strategy.unwrap_or(self.default_parser_strategy);
		let callback_executor =
			options.callback_executor.unwrap_or_else(|| self.default_callback_executor.clone());

		EventSource::new(
			uri.into(),
			listener,
			headers,
			config,
			parser_strategy,
			self.transport.handle(),
			self.scheduler.handle(),
			callback_executor,
		)
	}

	/// Shut down collaborators this executor owns. Borrowed collaborators
	/// (including the process-wide shared transport) are left untouched;
	/// the caller retains ownership of those.
	pub fn close(&self) {
		tracing::info!(
			transport_owned = self.transport.is_owned(),
			scheduler_owned = self.scheduler.is_owned(),
			"closing executor"
		);
		// Owned collaborators are plain `Arc`s with no explicit shutdown hook in
		// this crate's trait surface; dropping the executor's last reference
		// (which callers do by dropping the `SseExecutor`) is sufficient. This
		// method exists so the ownership distinction is observable and so a
		// future collaborator that does need an explicit shutdown call has a
		// single place to add it.
	}
}
