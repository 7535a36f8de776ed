//! Case-insensitive, insertion-ordered header map.

// crates.io
use indexmap::IndexMap;

/// `Accept` is always sent unless the caller overrides it.
pub const ACCEPT: &str = "Accept";
/// `Cache-Control` is always sent unless the caller overrides it.
pub const CACHE_CONTROL: &str = "Cache-Control";
/// `Last-Event-ID` is injected whenever a persisted id exists.
pub const LAST_EVENT_ID: &str = "Last-Event-ID";

/// A case-insensitive header name/value map that preserves insertion order
/// for stable outbound serialization.
///
/// Lookups are keyed on an ASCII-lowercased copy of the name; the
/// originally-supplied casing is retained for the value returned by
/// [`HeaderMap::iter`].
#[derive(Clone, Debug, Default)]
pub struct HeaderMap {
	entries: IndexMap<String, (String, String)>,
}
impl HeaderMap {
	/// Create an empty header map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace a header, preserving the position of an existing
	/// entry with the same (case-insensitive) name.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let key = name.to_ascii_lowercase();

		match self.entries.get_mut(&key) {
			Some(entry) => *entry = (name, value.into()),
			None => {
				self.entries.insert(key, (name, value.into()));
			},
		}
	}

	/// Insert a header only if one with the same (case-insensitive) name is
	/// not already present.
	pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let key = name.to_ascii_lowercase();

		self.entries.entry(key).or_insert_with(|| (name, value.into()));
	}

	/// Remove a header by name, case-insensitively.
	pub fn remove(&mut self, name: &str) {
		self.entries.shift_remove(&name.to_ascii_lowercase());
	}

	/// Look up a header's value, case-insensitively.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.entries.get(&name.to_ascii_lowercase()).map(|(_, v)| v.as_str())
	}

	/// Iterate headers in insertion order as `(name, value)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.values().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Merge `other` into `self`, with entries already in `self` taking
	/// precedence on name conflicts (used to apply caller overrides onto
	/// executor defaults).
	pub fn merge_preferring_self(mut self, other: &HeaderMap) -> Self {
		for (name, value) in other.iter() {
			self.insert_if_absent(name, value);
		}

		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookup_should_be_case_insensitive() {
		let mut h = HeaderMap::new();

		h.insert("Content-Type", "text/plain");

		assert_eq!(h.get("content-type"), Some("text/plain"));
		assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
	}

	#[test]
	fn insert_should_preserve_original_position_on_replace() {
		let mut h = HeaderMap::new();

		h.insert("A", "1");
		h.insert("B", "2");
		h.insert("a", "3");

		let collected = h.iter().collect::<Vec<_>>();

		assert_eq!(collected, vec![("a", "3"), ("B", "2")]);
	}

	#[test]
	fn caller_headers_take_precedence_on_merge() {
		let mut caller = HeaderMap::new();

		caller.insert("Accept", "application/custom");

		let mut defaults = HeaderMap::new();

		defaults.insert("Accept", "text/event-stream");
		defaults.insert("Cache-Control", "no-cache");

		let merged = caller.merge_preferring_self(&defaults);

		assert_eq!(merged.get("Accept"), Some("application/custom"));
		assert_eq!(merged.get("Cache-Control"), Some("no-cache"));
	}
}
