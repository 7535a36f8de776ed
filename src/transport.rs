//! The async HTTP transport collaborator trait, plus a `reqwew`/`reqwest`
//! backed default implementation.

// std
use std::{future::Future, io::Error as IoError, pin::Pin};
// crates.io
use futures::{Stream, TryStreamExt};
use reqwew::{
	Http,
	reqwest::{Client as ReqwestClient, Method, StatusCode},
};
use tokio_util::bytes::Bytes;
// self
use crate::{error::Result, header::HeaderMap};

/// One outbound request: a target URI and the headers to send with it.
///
/// The subsystem only ever issues header-only `GET` requests against a
/// `text/event-stream` endpoint; there is no request body.
#[derive(Clone, Debug)]
pub struct Request {
	/// The full request URI.
	pub uri: String,
	/// Headers to send, in insertion order.
	pub headers: HeaderMap,
}

/// A `Result<Bytes, Error>` stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Send + Stream<Item = Result<Bytes>>>>;

/// A submitted request's response, before its body has been consumed.
pub trait ResponseHandle
where
	Self: Send,
{
	/// The HTTP status code.
	fn status(&self) -> StatusCode;

	/// Look up a response header, case-insensitively.
	fn header(&self, name: &str) -> Option<&str>;

	/// Consume the handle, yielding the response body as a byte stream.
	fn into_byte_stream(self: Box<Self>) -> ByteStream;
}

/// The async HTTP client the subsystem consumes. Implemented once by
/// [`ReqwestTransport`]; swappable for tests via a fake.
///
/// Held as `Arc<dyn Transport>` throughout the crate, so `submit` returns a
/// boxed future rather than an RPITIT: an `impl Trait` return type is not
/// object-safe, and this trait must be.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Issue `request`, returning a handle once response headers (not body)
	/// have arrived.
	fn submit(
		&self,
		request: Request,
	) -> Pin<Box<dyn Send + Future<Output = Result<Box<dyn ResponseHandle>>> + '_>>;
}

struct ReqwestResponseHandle {
	status: StatusCode,
	headers: reqwew::reqwest::header::HeaderMap,
	response: reqwew::reqwest::Response,
}
impl ResponseHandle for ReqwestResponseHandle {
	fn status(&self) -> StatusCode {
		self.status
	}

	fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name)?.to_str().ok()
	}

	fn into_byte_stream(self: Box<Self>) -> ByteStream {
		let stream = self.response.bytes_stream().map_err(|e| IoError::other(e).into());

		Box::pin(stream)
	}
}

/// Default [`Transport`] implementation, wrapping `reqwew`'s
/// [`ReqwestClient`] the same way the donor's `Api` does.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
}
impl ReqwestTransport {
	/// Build a transport with a freshly-constructed [`ReqwestClient`].
	pub fn new() -> Self {
		Self {
			client: ReqwestClient::builder().user_agent("sse-client").build().expect("build must succeed; qed"),
		}
	}
}
impl Default for ReqwestTransport {
	fn default() -> Self {
		Self::new()
	}
}
impl Transport for ReqwestTransport {
	fn submit(
		&self,
		request: Request,
	) -> Pin<Box<dyn Send + Future<Output = Result<Box<dyn ResponseHandle>>> + '_>> {
		Box::pin(async move {
			let mut req = self.client.request(Method::GET, &request.uri);

			for (name, value) in request.headers.iter() {
				req = req.header(name, value);
			}

			let response = self.client.request_with_retries(req.build()?, 0, 0).await?;
			let status = response.status();
			let headers = response.headers().clone();

			Ok(Box::new(ReqwestResponseHandle { status, headers, response }) as Box<dyn ResponseHandle>)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_is_send_and_sync() {
		fn assert_send_sync<T: Send + Sync>() {}

		assert_send_sync::<ReqwestTransport>();
	}
}
