//! A scripted [`Transport`] fake: each call to `submit` pops the next
//! queued response and streams its chunks over a channel, so reconnect and
//! cancellation scenarios can be driven deterministically without sockets.

use std::{
	collections::VecDeque,
	future::Future,
	pin::Pin,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use sse_client::{
	error::{Error, Result},
	transport::{ByteStream, Request, ResponseHandle, Transport},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::bytes::Bytes;

/// One scripted response: a status, a few headers, and the body chunks to
/// deliver before the stream ends.
pub struct ScriptedResponse {
	pub status: reqwew::reqwest::StatusCode,
	pub headers: Vec<(String, String)>,
	pub chunks: Vec<&'static [u8]>,
}
impl ScriptedResponse {
	pub fn ok(chunks: Vec<&'static [u8]>) -> Self {
		Self {
			status: reqwew::reqwest::StatusCode::OK,
			headers: vec![("content-type".into(), "text/event-stream".into())],
			chunks,
		}
	}
}

pub struct MockTransport {
	script: Mutex<VecDeque<ScriptedResponse>>,
	submit_count: AtomicUsize,
	last_request: Mutex<Option<Request>>,
}
impl MockTransport {
	pub fn new(script: Vec<ScriptedResponse>) -> Self {
		Self {
			script: Mutex::new(script.into_iter().collect()),
			submit_count: AtomicUsize::new(0),
			last_request: Mutex::new(None),
		}
	}

	pub fn submit_count(&self) -> usize {
		self.submit_count.load(Ordering::SeqCst)
	}

	pub fn last_request_last_event_id(&self) -> Option<String> {
		self.last_request
			.lock()
			.unwrap()
			.as_ref()
			.and_then(|r| r.headers.get("Last-Event-ID"))
			.map(str::to_owned)
	}
}

struct MockResponseHandle {
	status: reqwew::reqwest::StatusCode,
	headers: Vec<(String, String)>,
	chunks: Vec<&'static [u8]>,
}
impl ResponseHandle for MockResponseHandle {
	fn status(&self) -> reqwew::reqwest::StatusCode {
		self.status
	}

	fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	fn into_byte_stream(self: Box<Self>) -> ByteStream {
		let (tx, rx) = mpsc::channel(self.chunks.len().max(1));

		tokio::spawn(async move {
			for chunk in self.chunks {
				if tx.send(Ok(Bytes::from_static(chunk))).await.is_err() {
					return;
				}
			}
		});

		Box::pin(ReceiverStream::new(rx))
	}
}

impl Transport for MockTransport {
	fn submit(
		&self,
		request: Request,
	) -> Pin<Box<dyn Send + Future<Output = Result<Box<dyn ResponseHandle>>> + '_>> {
		Box::pin(async move {
			self.submit_count.fetch_add(1, Ordering::SeqCst);
			*self.last_request.lock().unwrap() = Some(request);

			let scripted = self.script.lock().unwrap().pop_front();

			match scripted {
				Some(s) => Ok(Box::new(MockResponseHandle { status: s.status, headers: s.headers, chunks: s.chunks })
					as Box<dyn ResponseHandle>),
				None => Err(Error::any("mock transport script exhausted")),
			}
		})
	}
}
