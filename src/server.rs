//! The server-facing embedding surface: binds an accepted socket to a
//! `Connection` and drives it to completion (spec.md §6).
//!
//! Grounded in `carllerche-h2/src/server.rs`'s `Handshake`/`Server`/`Builder`
//! trio, collapsed from a `futures` 0.1 `Future`/`Stream` pair into a single
//! async function plus a builder: this crate's `Connection` already owns
//! preface reading and the SETTINGS handshake (spec.md §6), so there is no
//! separate `Handshake` future the caller has to poll to completion before
//! a connection value exists.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::config::{Config, ConfigBuilder};
use crate::dispatch::Dispatcher;
use crate::proto::{Connection, InputOutcome};

/// Fluent constructor for server connection parameters, mirroring
/// `carllerche-h2::server::Builder`'s setter style.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: ConfigBuilder,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.config = self.config.initial_window_size(size);
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.config = self.config.max_frame_size(size);
        self
    }

    /// Servers can only limit the number of streams the client may open
    /// (spec.md §3).
    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.config = self.config.max_concurrent_streams(max);
        self
    }

    pub fn max_header_list_size(mut self, size: usize) -> Self {
        self.config = self.config.max_header_list_size(size);
        self
    }

    pub fn header_table_size(mut self, size: u32) -> Self {
        self.config = self.config.header_table_size(size);
        self
    }

    /// Drives `io` to completion as an HTTP/2 server connection, handing
    /// every completed request to `dispatcher` (spec.md §6).
    pub async fn serve<T, D>(self, io: T, dispatcher: Arc<D>)
    where
        T: AsyncRead + AsyncWrite + Unpin,
        D: Dispatcher + 'static,
    {
        serve_connection(io, self.config.build(), dispatcher).await
    }
}

/// Binds `io` and runs the connection loop until the peer disconnects or a
/// connection error closes it (spec.md §6's `handle_input` contract).
pub async fn serve_connection<T, D>(io: T, config: Config, dispatcher: Arc<D>)
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: Dispatcher + 'static,
{
    let mut connection: Connection<T, D> = Connection::new(config, dispatcher);
    connection.reset(io, || debug!("connection closed"));

    loop {
        match connection.handle_input().await {
            InputOutcome::AllDataHandled | InputOutcome::DataStillToHandle => continue,
            InputOutcome::CloseConnection => break,
        }
    }
}
