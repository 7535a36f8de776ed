//! The reconnect state machine: attempt counting, server-hint honoring,
//! and the cancel-race-safe transition to `Closed`.

// std
use std::sync::Mutex;
// crates.io
use tokio::task::AbortHandle;
// self
use crate::{
	config::EventSourceConfig,
	error::{Error, FailureCause},
};

/// An [`crate::source::EventSource`]'s lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	/// Never started.
	Idle,
	/// A connect attempt is in flight.
	Connecting,
	/// Receiving events.
	Open,
	/// The in-flight attempt or stream just failed; about to decide
	/// reconnect vs. close.
	Failed,
	/// Waiting out a scheduled reconnect delay.
	Waiting,
	/// Terminal; `on_closed` has fired or is about to.
	Closed,
}

/// What the controller decided after a failure.
#[derive(Debug)]
pub enum Decision {
	/// Reconnect after `delay_ms`, carrying `server_hint_ms` into
	/// [`crate::backoff::Backoff::next_delay_ms`] (already applied here).
	Reconnect {
		/// The delay before the next connect attempt, in milliseconds.
		delay_ms: u64,
	},
	/// No further attempts; the caller must emit exactly one `on_closed`.
	Close,
}

struct ControllerState {
	state: State,
	attempt: u32,
	previous_delay_ms: u64,
	server_hint_ms: Option<u64>,
	task_handle: Option<AbortHandle>,
}
impl Default for ControllerState {
	fn default() -> Self {
		Self {
			state: State::Idle,
			attempt: 0,
			previous_delay_ms: 0,
			server_hint_ms: None,
			task_handle: None,
		}
	}
}

/// Drives one [`crate::source::EventSource`]'s state machine. All state
/// lives behind one mutex so `cancel()` and the reconnect-task's
/// check-before-connect race resolve atomically.
pub struct ReconnectController {
	state: Mutex<ControllerState>,
	config: EventSourceConfig,
}
impl ReconnectController {
	/// Build a controller with the given per-source configuration.
	pub fn new(config: EventSourceConfig) -> Self {
		Self { state: Mutex::new(ControllerState::default()), config }
	}

	/// The current state, for [`crate::source::EventSource::is_connected`]
	/// and diagnostics.
	pub fn state(&self) -> State {
		self.state.lock().unwrap().state
	}

	/// `start()`: Idle → Connecting. No-op (returns `false`) from any other
	/// state, making `start()` idempotent.
	pub fn try_start(&self) -> bool {
		let mut s = self.state.lock().unwrap();

		if s.state == State::Idle {
			s.state = State::Connecting;

			true
		} else {
			false
		}
	}

	/// Record the abort handle of the task currently representing this
	/// source's in-flight work (connect attempt or scheduled delay), so
	/// `cancel()` can terminate it.
	pub fn set_task_handle(&self, handle: AbortHandle) {
		self.state.lock().unwrap().task_handle = Some(handle);
	}

	/// A connect attempt succeeded and the first byte arrived: → Open,
	/// attempt counter and server hint reset.
	pub fn on_open(&self) {
		let mut s = self.state.lock().unwrap();

		s.state = State::Open;
		s.attempt = 0;
		s.server_hint_ms = None;
	}

	/// Record a server-suggested reconnect delay (from a `retry:` field or
	/// `Retry-After` header); the most recent value wins.
	pub fn set_server_hint_ms(&self, ms: u64) {
		self.state.lock().unwrap().server_hint_ms = Some(ms);
	}

	/// Whether a server hint is currently on file, used to upgrade an
	/// otherwise non-retryable 4xx into a retryable one when it carried a
	/// `Retry-After` header.
	pub fn has_server_hint(&self) -> bool {
		self.state.lock().unwrap().server_hint_ms.is_some()
	}

	/// The stream ended or an attempt failed. Transitions to `Waiting` with
	/// a `Decision::Reconnect`, or to `Closed` with `Decision::Close`.
	///
	/// `error` and `retryable` are only used to build the `FailureCause`
	/// passed to the listener by the caller; the transition itself is
	/// driven by `max_reconnects` and `Backoff::should_reconnect`.
	pub fn on_failure(&self, error: Error, retryable: bool) -> (FailureCause, Decision) {
		let mut s = self.state.lock().unwrap();

		if s.state == State::Closed {
			// A cancel() won the race; report as non-retryable and stay closed.
			return (FailureCause::new(error, false), Decision::Close);
		}

		s.state = State::Failed;
		s.attempt += 1;

		let attempt_allowed = self.config.max_reconnects.allows(s.attempt);
		let should_reconnect = retryable
			&& attempt_allowed
			&& self.config.backoff.should_reconnect(s.attempt, s.previous_delay_ms, s.server_hint_ms);

		if !should_reconnect {
			s.state = State::Closed;

			return (FailureCause::new(error, false), Decision::Close);
		}

		let delay_ms =
			self.config.backoff.next_delay_ms(s.attempt, s.previous_delay_ms, s.server_hint_ms);

		s.previous_delay_ms = delay_ms;
		s.state = State::Waiting;

		(FailureCause::new(error, true), Decision::Reconnect { delay_ms })
	}

	/// The scheduled delay elapsed; about to re-issue the request.
	/// Returns `false` if a concurrent `cancel()` already closed the
	/// source, in which case the caller must not connect.
	pub fn try_resume_connecting(&self) -> bool {
		let mut s = self.state.lock().unwrap();

		if s.state == State::Closed {
			false
		} else {
			s.state = State::Connecting;

			true
		}
	}

	/// `cancel()`: idempotent, racy-safe. Returns `true` the first time it
	/// transitions to `Closed` (the caller must emit `on_closed` exactly
	/// once, and only on that transition).
	pub fn cancel(&self) -> bool {
		let mut s = self.state.lock().unwrap();

		if s.state == State::Closed {
			return false;
		}

		if let Some(handle) = s.task_handle.take() {
			handle.abort();
		}

		s.state = State::Closed;

		true
	}

	/// Whether the source currently reports as connected
	/// ([`crate::source::EventSource::is_connected`] reports `Open` only).
	pub fn is_open(&self) -> bool {
		self.state.lock().unwrap().state == State::Open
	}
}

#[cfg(test)]
mod tests {
	use crate::{backoff::NoBackoffStrategy, config::MaxReconnects};

	use super::*;

	fn config_unlimited() -> EventSourceConfig {
		EventSourceConfig::default()
	}

	#[test]
	fn start_should_be_idempotent() {
		let c = ReconnectController::new(config_unlimited());

		assert!(c.try_start());
		assert!(!c.try_start());
		assert_eq!(c.state(), State::Connecting);
	}

	#[test]
	fn on_open_should_reset_attempt_and_hint() {
		let c = ReconnectController::new(config_unlimited());

		c.try_start();
		c.on_open();

		assert_eq!(c.state(), State::Open);
		assert!(c.is_open());
	}

	#[test]
	fn max_reconnects_zero_should_close_on_first_failure() {
		let mut cfg = config_unlimited();

		cfg.max_reconnects = MaxReconnects::Never;

		let c = ReconnectController::new(cfg);

		c.try_start();
		c.on_open();

		let (cause, decision) = c.on_failure(Error::any("boom"), true);

		assert!(!cause.retryable);
		assert!(matches!(decision, Decision::Close));
		assert_eq!(c.state(), State::Closed);
	}

	#[test]
	fn no_backoff_strategy_should_close_immediately() {
		let cfg = EventSourceConfig {
			backoff: std::sync::Arc::new(NoBackoffStrategy),
			max_reconnects: MaxReconnects::Unlimited,
		};
		let c = ReconnectController::new(cfg);

		c.try_start();
		c.on_open();

		let (_, decision) = c.on_failure(Error::any("boom"), true);

		assert!(matches!(decision, Decision::Close));
	}

	#[test]
	fn cancel_should_be_idempotent_and_report_only_first_transition() {
		let c = ReconnectController::new(config_unlimited());

		c.try_start();

		assert!(c.cancel());
		assert!(!c.cancel());
		assert_eq!(c.state(), State::Closed);
	}

	#[test]
	fn cancel_during_waiting_should_make_resume_fail() {
		let c = ReconnectController::new(config_unlimited());

		c.try_start();
		c.on_open();
		c.on_failure(Error::any("boom"), true);

		assert_eq!(c.state(), State::Waiting);

		c.cancel();

		assert!(!c.try_resume_connecting());
		assert_eq!(c.state(), State::Closed);
	}

	#[test]
	fn non_retryable_failure_should_close_regardless_of_backoff() {
		let c = ReconnectController::new(config_unlimited());

		c.try_start();
		c.on_open();

		let (cause, decision) = c.on_failure(Error::ContentTypeMismatch("text/plain".into()), false);

		assert!(!cause.retryable);
		assert!(matches!(decision, Decision::Close));
	}
}
