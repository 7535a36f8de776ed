//! Pluggable reconnect-delay strategies.

// std
use std::fmt::Debug;
// crates.io
use rand::Rng;

/// Decides whether and when a [`crate::reconnect::ReconnectController`]
/// should re-issue a request after a failure.
pub trait Backoff
where
	Self: Debug + Send + Sync,
{
	/// Whether a reconnect attempt should be made at all.
	fn should_reconnect(
		&self,
		attempt: u32,
		previous_delay_ms: u64,
		server_hint_ms: Option<u64>,
	) -> bool;

	/// The delay, in milliseconds, before the next reconnect attempt.
	fn next_delay_ms(&self, attempt: u32, previous_delay_ms: u64, server_hint_ms: Option<u64>)
	-> u64;
}

/// Exponential backoff with full jitter and a server-hint override.
///
/// `next_delay_ms` computes an uncapped target of
/// `min(base_ms * factor^(attempt - 1), max_ms)`, then draws a uniform
/// sample in `[min_floor_ms, target]`. A server hint, when present,
/// substitutes for the computed target before the floor/ceiling clamp.
#[derive(Clone, Debug)]
pub struct ExponentialJitterBackoff {
	/// The delay for the first reconnect attempt, before jitter.
	pub base_ms: u64,
	/// The upper bound no delay may exceed.
	pub max_ms: u64,
	/// The multiplier applied per attempt; must be `>= 1.0`.
	pub factor: f64,
	/// The lower bound no delay may fall below.
	pub min_floor_ms: u64,
}
impl Default for ExponentialJitterBackoff {
	fn default() -> Self {
		Self { base_ms: 1000, max_ms: 30_000, factor: 2.0, min_floor_ms: 250 }
	}
}
impl Backoff for ExponentialJitterBackoff {
	fn should_reconnect(&self, _: u32, _: u64, _: Option<u64>) -> bool {
		true
	}

	fn next_delay_ms(
		&self,
		attempt: u32,
		_previous_delay_ms: u64,
		server_hint_ms: Option<u64>,
	) -> u64 {
		let target = match server_hint_ms {
			Some(hint) => hint,
			None => {
				let exponent = attempt.saturating_sub(1);
				let uncapped = self.base_ms as f64 * self.factor.powi(exponent as i32);

				(uncapped.min(self.max_ms as f64)) as u64
			},
		};
		let target = target.clamp(self.min_floor_ms, self.max_ms);

		if target <= self.min_floor_ms {
			return self.min_floor_ms;
		}

		rand::rng().random_range(self.min_floor_ms..=target)
	}
}

/// A constant reconnect delay, honoring a server hint when present.
#[derive(Clone, Debug)]
pub struct FixedBackoffStrategy {
	/// The fixed delay used absent a server hint.
	pub delay_ms: u64,
}
impl Default for FixedBackoffStrategy {
	fn default() -> Self {
		Self { delay_ms: 1000 }
	}
}
impl Backoff for FixedBackoffStrategy {
	fn should_reconnect(&self, _: u32, _: u64, _: Option<u64>) -> bool {
		true
	}

	fn next_delay_ms(&self, _attempt: u32, _previous_delay_ms: u64, server_hint_ms: Option<u64>) -> u64 {
		server_hint_ms.unwrap_or(self.delay_ms)
	}
}

/// A strategy that never reconnects.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBackoffStrategy;
impl Backoff for NoBackoffStrategy {
	fn should_reconnect(&self, _: u32, _: u64, _: Option<u64>) -> bool {
		false
	}

	fn next_delay_ms(&self, _: u32, _: u64, _: Option<u64>) -> u64 {
		0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exponential_jitter_should_clamp_to_floor() {
		let b = ExponentialJitterBackoff { base_ms: 1000, max_ms: 30_000, factor: 2.0, min_floor_ms: 250 };
		let delay = b.next_delay_ms(5, 0, Some(40));

		assert_eq!(delay, 250);
	}

	#[test]
	fn exponential_jitter_should_clamp_to_ceiling() {
		let b = ExponentialJitterBackoff { base_ms: 1000, max_ms: 30_000, factor: 2.0, min_floor_ms: 250 };
		let delay = b.next_delay_ms(5, 0, Some(999_999));

		assert_eq!(delay, 30_000);
	}

	#[test]
	fn exponential_jitter_should_stay_within_uncapped_bound_absent_hint() {
		let b = ExponentialJitterBackoff { base_ms: 1000, max_ms: 30_000, factor: 2.0, min_floor_ms: 250 };

		for _ in 0..100 {
			let delay = b.next_delay_ms(4, 0, None);

			assert!((250..=8000).contains(&delay), "delay {delay} out of range");
		}
	}

	#[test]
	fn fixed_backoff_should_honor_server_hint() {
		let b = FixedBackoffStrategy { delay_ms: 1000 };

		assert_eq!(b.next_delay_ms(1, 0, Some(42)), 42);
		assert_eq!(b.next_delay_ms(1, 0, None), 1000);
	}

	#[test]
	fn no_backoff_should_never_reconnect() {
		let b = NoBackoffStrategy;

		assert!(!b.should_reconnect(1, 0, None));
	}
}
