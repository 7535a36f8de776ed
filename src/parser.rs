//! The SSE framing parser: turns complete lines into events, comments, and
//! retry hints.
//!
//! [`Parser`] is deliberately generic over its sink rather than boxing a
//! trait object: `feed_line` sits on the hottest path in the subsystem, and
//! monomorphizing lets the compiler inline the dispatch instead of paying an
//! indirect call per line.

// self
use crate::event::Event;

const FIELD_DATA: &str = "data";
const FIELD_EVENT: &str = "event";
const FIELD_ID: &str = "id";
const FIELD_RETRY: &str = "retry";

/// Receives the output of [`Parser::feed_line`].
///
/// All methods have no-op default bodies so callers only implement what
/// they need, mirroring an event-handler trait with optional hooks.
pub trait ParserSink {
	/// A complete record was dispatched.
	fn on_event(&mut self, #[allow(unused)] event: Event) {}

	/// A comment line (`:...`) was seen.
	fn on_comment(&mut self, #[allow(unused)] text: &str) {}

	/// A `retry:` field carried a valid delay, in milliseconds.
	fn on_retry_change(&mut self, #[allow(unused)] ms: u64) {}
}

/// Streaming SSE record parser.
///
/// Holds the mutable state a single subscription accumulates across
/// `feed_line` calls: the in-progress `data` buffer, the current record's
/// `event` type, and the persistent last-event id.
#[derive(Debug, Default)]
pub struct Parser {
	data: String,
	event_type: Option<String>,
	id: Option<String>,
}
impl Parser {
	/// Create a parser with no prior state.
	pub fn new() -> Self {
		Self::default()
	}

	/// Seed the parser with a previously-persisted last-event id, e.g. after
	/// a reconnect that restored `Last-Event-ID` from the caller.
	pub fn with_last_event_id(id: Option<String>) -> Self {
		Self { id, ..Self::default() }
	}

	/// The current persistent last-event id.
	pub fn last_event_id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	/// Overwrite the persistent last-event id, e.g. via
	/// [`crate::source::EventSource::set_last_event_id`].
	pub fn set_last_event_id(&mut self, id: Option<String>) {
		self.id = id;
	}

	/// Feed one logical line (CR already stripped by the caller's framer) to
	/// the parser, dispatching to `sink` as records complete.
	pub fn feed_line<S>(&mut self, line: &str, sink: &mut S)
	where
		S: ParserSink,
	{
		if line.is_empty() {
			self.dispatch(sink);
			return;
		}

		if let Some(rest) = line.strip_prefix(':') {
			let text = rest.strip_prefix(' ').unwrap_or(rest);

			sink.on_comment(text);
			return;
		}

		let (name, value) = match line.find(':') {
			Some(idx) => {
				let value = &line[idx + 1..];

				(&line[..idx], value.strip_prefix(' ').unwrap_or(value))
			},
			None => (line, ""),
		};

		if name == FIELD_DATA {
			self.data.push_str(value);
			self.data.push('\n');
		} else if name == FIELD_EVENT {
			self.event_type = Some(value.to_owned());
		} else if name == FIELD_ID {
			if !value.contains('\0') {
				self.id = Some(value.to_owned());
			}
		} else if name == FIELD_RETRY {
			if let Some(ms) = parse_retry_digits(value) {
				sink.on_retry_change(ms);
			}
		}
		// Unknown field names are ignored.
	}

	fn dispatch<S>(&mut self, sink: &mut S)
	where
		S: ParserSink,
	{
		if self.data.is_empty() {
			self.event_type = None;
			return;
		}

		self.data.pop(); // strip the trailing '\n' added during accumulation

		let data = std::mem::take(&mut self.data);
		let event_type = self.event_type.take();

		sink.on_event(Event::new(self.id.clone(), event_type, data));
	}
}

/// Parse a `retry:` field value as a non-negative decimal `u64`, guarding
/// against overflow rather than wrapping. Returns `None` for empty,
/// non-digit, or overflowing input.
fn parse_retry_digits(value: &str) -> Option<u64> {
	if value.is_empty() {
		return None;
	}

	let mut acc: u64 = 0;

	for b in value.bytes() {
		if !b.is_ascii_digit() {
			return None;
		}

		acc = acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
	}

	Some(acc)
}
