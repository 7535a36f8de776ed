//! Immutable, builder-constructed configuration for an
//! [`crate::source::EventSource`].

// std
use std::sync::Arc;
// self
use crate::backoff::{Backoff, ExponentialJitterBackoff};

/// How many reconnect attempts an [`crate::reconnect::ReconnectController`]
/// may make after the initial connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaxReconnects {
	/// Retry forever.
	Unlimited,
	/// Never retry; the first failure closes the subscription.
	Never,
	/// Retry up to this many times after the initial connect.
	Limited(u32),
}
impl MaxReconnects {
	/// Construct from the spec's `{-1, 0, positive}` integer encoding.
	pub fn from_i64(n: i64) -> Self {
		match n {
			i64::MIN..=-1 => Self::Unlimited,
			0 => Self::Never,
			n => Self::Limited(n as u32),
		}
	}

	pub(crate) fn allows(self, attempt: u32) -> bool {
		match self {
			Self::Unlimited => true,
			Self::Never => false,
			Self::Limited(n) => attempt <= n,
		}
	}
}
impl Default for MaxReconnects {
	fn default() -> Self {
		Self::Unlimited
	}
}

/// Per-[`crate::source::EventSource`] configuration: the backoff strategy
/// and the reconnect-attempt ceiling.
#[derive(Clone, Debug)]
pub struct EventSourceConfig {
	/// The strategy consulted on every failure.
	pub backoff: Arc<dyn Backoff>,
	/// The reconnect-attempt ceiling.
	pub max_reconnects: MaxReconnects,
}
impl Default for EventSourceConfig {
	fn default() -> Self {
		Self {
			backoff: Arc::new(ExponentialJitterBackoff::default()),
			max_reconnects: MaxReconnects::default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn negative_one_should_mean_unlimited() {
		assert_eq!(MaxReconnects::from_i64(-1), MaxReconnects::Unlimited);
		assert!(MaxReconnects::Unlimited.allows(1_000_000));
	}

	#[test]
	fn zero_should_mean_never() {
		assert_eq!(MaxReconnects::from_i64(0), MaxReconnects::Never);
		assert!(!MaxReconnects::Never.allows(1));
	}

	#[test]
	fn positive_should_be_a_ceiling() {
		let m = MaxReconnects::from_i64(3);

		assert!(m.allows(3));
		assert!(!m.allows(4));
	}
}
