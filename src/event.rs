//! The dispatched [`Event`] type and the default event type literal.

/// The event type used when a record carries no `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A fully-formed Server-Sent Event, ready for listener dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
	/// The event's identifier, if the record (or an earlier one) set it.
	pub id: Option<String>,
	/// The event's type; defaults to [`DEFAULT_EVENT_TYPE`].
	pub event_type: String,
	/// The concatenated `data:` payload, with the trailing newline stripped.
	pub data: String,
}
impl Event {
	pub(crate) fn new(id: Option<String>, event_type: Option<String>, data: String) -> Self {
		Self { id, event_type: event_type.unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_owned()), data }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_event_type_should_be_used_when_absent() {
		let e = Event::new(None, None, "hi".into());

		assert_eq!(e.event_type, DEFAULT_EVENT_TYPE);
	}

	#[test]
	fn explicit_event_type_should_be_kept() {
		let e = Event::new(Some("1".into()), Some("ping".into()), "hi".into());

		assert_eq!(e.id.as_deref(), Some("1"));
		assert_eq!(e.event_type, "ping");
	}
}
