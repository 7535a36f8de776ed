#![allow(missing_docs)]

// std
use std::time::Duration;
// crates.io
use reqwew::reqwest;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Any(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	#[error(transparent)]
	Scheduler(#[from] tokio::task::JoinError),

	#[error("unexpected content-type: {0}")]
	ContentTypeMismatch(String),
	#[error("http status {0}")]
	HttpStatus(reqwest::StatusCode),
	#[error("retry value overflowed a u64")]
	RetryOverflow,
	#[error("timeout after {0:?}")]
	Timeout(Duration),
}
impl Error {
	pub fn any<T>(any: T) -> Self
	where
		T: Into<String>,
	{
		Self::Any(any.into())
	}
}

/// The cause passed to [`crate::listener::Listener::on_failure`], carrying
/// both the underlying error and whether the controller will attempt to
/// reconnect.
#[derive(Debug)]
pub struct FailureCause {
	/// The error that triggered the failure.
	pub error: Error,
	/// Whether the controller will reconnect after this failure.
	pub retryable: bool,
}
impl FailureCause {
	pub(crate) fn new(error: Error, retryable: bool) -> Self {
		Self { error, retryable }
	}
}
