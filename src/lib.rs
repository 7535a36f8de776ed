//! Client-side Server-Sent Events subscriptions with transparent reconnect.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod backoff;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod executor;
pub mod header;
pub mod listener;
pub mod parser;
pub mod reconnect;
pub mod scheduler;
pub mod source;
pub mod transport;

pub mod prelude {
	#![allow(missing_docs)]

	pub use crate::{
		backoff::*,
		config::*,
		consumer::{ConsumeOutcome, EntityConsumer, ParserStrategy},
		error::*,
		event::*,
		executor::{OpenOptions, Ownership, SseExecutor, SseExecutorBuilder, shared_transport},
		header::HeaderMap,
		listener::*,
		reconnect::{Decision, State as ReconnectState},
		scheduler::*,
		source::EventSource,
		transport::*,
	};
}
