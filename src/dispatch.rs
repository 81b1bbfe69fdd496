//! The dispatcher seam (spec.md §6): the one place this crate hands a
//! completed request to code it doesn't own.
//!
//! Modeled on `carllerche-h2/src/server.rs`'s split between the thing the
//! application touches (`Stream`/`Body`/`ReleaseCapacity`) and the thing
//! that calls back into the connection (`send_output` via the cloned
//! sender). Unlike the teacher, which yields completed requests as a
//! `futures::Stream` the caller polls, this crate exposes a pull-free
//! `Dispatcher` trait: the connection-driving task calls `dispatch` and
//! moves on, since spec.md §5 requires the connection task never to block
//! on handler execution.

use bytes::Bytes;
use http::{HeaderMap, Request, Response};

use crate::frame::StreamId;

/// A fully assembled request, handed to the dispatcher once a stream
/// reaches `HALF_CLOSED_REMOTE` (spec.md §4.5/§5).
pub struct StreamRequest {
    pub stream_id: StreamId,
    pub request: Request<Bytes>,
}

/// The object a handler uses to produce a response: set the status and
/// headers once, then write body chunks, then finish. Implementations
/// back this with the stream's output assembly and the connection's
/// `send_output`.
pub trait ResponseSink: Send {
    /// Sends response headers. May only be called once, before any body
    /// write.
    fn send_response(&mut self, response: Response<()>, end_of_stream: bool);

    /// Appends a chunk of response body.
    fn send_data(&mut self, data: Bytes, end_of_stream: bool);

    /// Aborts the response, e.g. because the handler failed after
    /// partially emitting headers (spec.md §7's handler-error policy).
    fn send_reset(&mut self, reason: crate::frame::Reason);
}

/// Submits a completed request to the handler executor and returns a sink
/// the handler (running on whatever executor implements this trait) can
/// write a response through.
///
/// `Connection::handle_input` calls `dispatch` once per completed request
/// and immediately continues processing the next frame -- the handler
/// itself runs concurrently with the connection (spec.md §5).
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: StreamRequest, response_sink: Box<dyn ResponseSink>);
}

/// Builds an `http::Request<Bytes>` from the pseudo-header/regular-header
/// split the header codec produces and the accumulated request body.
pub fn build_request(
    pseudo: &crate::frame::Pseudo,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Request<Bytes>, crate::error::FrameError> {
    let method = pseudo
        .method
        .clone()
        .ok_or(crate::error::FrameError::MalformedHeaders("missing :method"))?;
    let path = pseudo
        .path
        .clone()
        .ok_or(crate::error::FrameError::MalformedHeaders("missing :path"))?;

    let mut builder = Request::builder().method(method).uri(path);

    if let Some(authority) = pseudo.authority.as_deref() {
        builder = builder.header(http::header::HOST, authority);
    }

    let mut request = builder
        .body(body)
        .map_err(|_| crate::error::FrameError::MalformedHeaders("failed to build request"))?;
    *request.headers_mut() = headers;

    Ok(request)
}
