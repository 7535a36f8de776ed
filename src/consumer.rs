//! Buffers and line-frames incoming response bytes ahead of the
//! [`crate::parser::Parser`].
//!
//! Two interchangeable strategies are offered, selected once at
//! [`crate::source::EventSource`] construction: a byte-oriented framer that
//! defers UTF-8 decoding to individual lines, and a char-oriented framer
//! that decodes eagerly and rejects invalid UTF-8 up front. Both share one
//! [`BomState`] helper so BOM stripping behaves identically across chunk
//! boundaries regardless of which strategy is active.

// crates.io
use tokio_util::bytes::Bytes;
// self
use crate::error::{Error, Result};

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const CONTENT_TYPE: &str = "text/event-stream";

/// Selects which [`EntityConsumer`] framer an [`crate::source::EventSource`]
/// uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParserStrategy {
	/// Decode UTF-8 eagerly, reject invalid byte sequences immediately.
	#[default]
	Char,
	/// Operate on raw bytes; decode individual lines lazily.
	Byte,
}

/// Result of feeding a chunk (or the end-of-stream signal) to an
/// [`EntityConsumer`].
#[derive(Debug, Default)]
pub struct ConsumeOutcome {
	/// Whether this call observed the first non-BOM byte of the stream,
	/// i.e. whether `on_open` should fire now.
	pub opened: bool,
	/// Complete logical lines extracted by this call, in wire order.
	pub lines: Vec<String>,
}

/// Shared byte-level BOM stripper. A leading `EF BB BF` is consumed exactly
/// once, tolerating the 3 bytes arriving split across separate `feed`
/// calls.
#[derive(Debug, Default)]
struct BomState {
	resolved: bool,
	scratch: Vec<u8>,
}
impl BomState {
	/// Feed `input`, returning the bytes that should be treated as stream
	/// content (with any BOM prefix removed) once resolution completes, or
	/// `None` if still buffering to decide.
	fn feed(&mut self, input: &[u8]) -> Option<Vec<u8>> {
		if self.resolved {
			return Some(input.to_vec());
		}

		self.scratch.extend_from_slice(input);

		if self.scratch.len() < BOM.len() {
			return None;
		}

		self.resolved = true;

		if self.scratch.starts_with(&BOM) {
			Some(self.scratch.split_off(BOM.len()))
		} else {
			Some(std::mem::take(&mut self.scratch))
		}
	}

	/// Flush whatever is pending when the stream ends before resolution
	/// could complete (fewer than 3 bytes ever arrived).
	fn flush(&mut self) -> Vec<u8> {
		self.resolved = true;

		std::mem::take(&mut self.scratch)
	}
}

/// Validate a response's `Content-Type` against the wire format contract:
/// parameters (e.g. `; charset=utf-8`) are ignored, any other base type is a
/// fatal, non-retryable error.
pub fn validate_content_type(content_type: &str) -> Result<()> {
	let base = content_type.split(';').next().unwrap_or("").trim();

	if base.eq_ignore_ascii_case(CONTENT_TYPE) {
		Ok(())
	} else {
		Err(Error::ContentTypeMismatch(content_type.to_owned()))
	}
}

/// Scan `buf` for logical line boundaries (`\n`, `\r\n`, or isolated `\r`),
/// draining consumed bytes and returning the lines found. When `flushing`
/// is true (stream end), a trailing lone `\r` is also treated as a
/// terminator; otherwise it is held back in case the next chunk supplies
/// the paired `\n`.
fn scan_lines(buf: &mut Vec<u8>, flushing: bool) -> Vec<Vec<u8>> {
	let mut lines = Vec::new();
	let mut start = 0;
	let mut i = 0;

	while i < buf.len() {
		match buf[i] {
			b'\n' => {
				lines.push(buf[start..i].to_vec());
				i += 1;
				start = i;
			},
			b'\r' =>
				if i + 1 < buf.len() {
					let skip = if buf[i + 1] == b'\n' { 2 } else { 1 };

					lines.push(buf[start..i].to_vec());
					i += skip;
					start = i;
				} else if flushing {
					lines.push(buf[start..i].to_vec());
					i += 1;
					start = i;
				} else {
					break;
				},
			_ => i += 1,
		}
	}

	buf.drain(0..start);

	lines
}

fn decode_line(bytes: Vec<u8>) -> String {
	String::from_utf8(bytes)
		.unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Byte-oriented framer: operates directly on raw chunks, decoding each
/// extracted line to UTF-8 only when it is handed back to the caller.
#[derive(Debug, Default)]
struct ByteFramer {
	bom: BomState,
	buf: Vec<u8>,
	opened: bool,
}
impl ByteFramer {
	fn consume(&mut self, chunk: &[u8]) -> ConsumeOutcome {
		let Some(content) = self.bom.feed(chunk) else {
			return ConsumeOutcome::default();
		};

		self.buf.extend_from_slice(&content);

		let opened = !self.opened && !self.buf.is_empty();

		self.opened |= opened;

		let lines = scan_lines(&mut self.buf, false).into_iter().map(decode_line).collect();

		ConsumeOutcome { opened, lines }
	}

	fn stream_end(&mut self) -> ConsumeOutcome {
		let flushed = self.bom.flush();

		self.buf.extend_from_slice(&flushed);

		let opened = !self.opened && !self.buf.is_empty();

		self.opened |= opened;

		let lines = scan_lines(&mut self.buf, true).into_iter().map(decode_line).collect();

		self.buf.clear();

		ConsumeOutcome { opened, lines }
	}
}

/// Char-oriented framer: decodes every chunk to valid UTF-8 up front,
/// holding back an incomplete trailing multi-byte sequence for the next
/// call. Invalid UTF-8 is a hard parse failure.
#[derive(Debug, Default)]
struct CharFramer {
	bom: BomState,
	pending_bytes: Vec<u8>,
	line_buf: Vec<u8>,
	opened: bool,
}
impl CharFramer {
	fn consume(&mut self, chunk: &[u8]) -> Result<ConsumeOutcome> {
		let Some(content) = self.bom.feed(chunk) else {
			return Ok(ConsumeOutcome::default());
		};

		self.pending_bytes.extend_from_slice(&content);

		let valid_len = match std::str::from_utf8(&self.pending_bytes) {
			Ok(s) => s.len(),
			Err(e) => match e.error_len() {
				// An incomplete sequence at the tail: keep it for the next chunk.
				None => e.valid_up_to(),
				// A genuinely invalid sequence: fatal.
				Some(_) => return Err(Error::any("invalid utf-8 in text/event-stream response")),
			},
		};
		let decoded = self.pending_bytes.drain(..valid_len).collect::<Vec<_>>();

		self.line_buf.extend_from_slice(&decoded);

		let opened = !self.opened && !decoded.is_empty();

		self.opened |= opened;

		let lines = scan_lines(&mut self.line_buf, false).into_iter().map(decode_line).collect();

		Ok(ConsumeOutcome { opened, lines })
	}

	fn stream_end(&mut self) -> ConsumeOutcome {
		let flushed = self.bom.flush();

		self.line_buf.extend_from_slice(&flushed);

		let opened = !self.opened && !self.line_buf.is_empty();

		self.opened |= opened;

		// A dangling incomplete multi-byte sequence at EOF is discarded, not an error.
		self.pending_bytes.clear();

		let lines = scan_lines(&mut self.line_buf, true).into_iter().map(decode_line).collect();

		self.line_buf.clear();

		ConsumeOutcome { opened, lines }
	}
}

/// Front-end that buffers and line-frames an incoming `text/event-stream`
/// body, composed over one of two interchangeable strategies.
#[derive(Debug)]
pub enum EntityConsumer {
	/// See [`CharFramer`].
	Char(CharFramer),
	/// See [`ByteFramer`].
	Byte(ByteFramer),
}
impl EntityConsumer {
	/// Construct a fresh consumer for the given strategy.
	pub fn new(strategy: ParserStrategy) -> Self {
		match strategy {
			ParserStrategy::Char => Self::Char(CharFramer::default()),
			ParserStrategy::Byte => Self::Byte(ByteFramer::default()),
		}
	}

	/// Feed a chunk of response bytes, extracting any complete lines.
	pub fn consume(&mut self, chunk: &Bytes) -> Result<ConsumeOutcome> {
		match self {
			Self::Char(f) => f.consume(chunk),
			Self::Byte(f) => Ok(f.consume(chunk)),
		}
	}

	/// Signal stream end, flushing a trailing complete line if one is
	/// pending; an incomplete trailing fragment is discarded.
	pub fn stream_end(&mut self) -> ConsumeOutcome {
		match self {
			Self::Char(f) => f.stream_end(),
			Self::Byte(f) => f.stream_end(),
		}
	}
}
