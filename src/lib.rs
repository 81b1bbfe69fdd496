//! An HTTP/2 connection core (RFC 9113): frame codec, connection and
//! stream state machines, two-level flow control, and a narrow dispatcher
//! seam an embedder wires up to its own request handler executor.
//!
//! Grounded in `carllerche-h2`'s crate layout (`frame`, `codec`, `proto`,
//! `server`), reworked around `async`/`await` and the object-reuse pooling
//! this crate's connection lifecycle requires.

mod codec;
mod config;
mod dispatch;
mod error;
mod frame;
mod hpack_codec;
mod io;
mod proto;
mod reuse;
mod server;
mod settings;

pub use crate::config::{Config, ConfigBuilder};
pub use crate::dispatch::{Dispatcher, ResponseSink, StreamRequest};
pub use crate::error::{Error, FrameError, RecvError};
pub use crate::frame::Reason;
pub use crate::proto::{Connection, InputOutcome, OutputSender};
pub use crate::server::{serve_connection, Builder};
