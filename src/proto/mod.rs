//! The connection-driving state machine: frame dispatch, stream table,
//! and two-level flow control (spec.md §4.5/§4.6/§4.7).

mod connection;
pub(crate) mod flow_control;
pub(crate) mod stream;
mod streams;

pub use self::connection::{Connection, InputOutcome, OutputSender, PREFACE};
