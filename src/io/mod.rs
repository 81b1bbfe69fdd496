//! Buffered byte staging (spec.md §4.1/§4.2).
//!
//! New modules -- the teacher drives I/O through `tokio_io::codec`/`Framed`
//! combinators rather than an explicit staging buffer -- grounded in the
//! general shape of `carllerche-h2/src/codec/framed_read.rs`'s internal
//! `BytesMut` accumulation, generalized into the fixed-capacity
//! mark/peek/skip/read contract spec.md asks for.

mod input_buffer;
mod output_buffer;

pub use self::input_buffer::InputBuffer;
pub use self::output_buffer::{BufferOverflow, OutputBuffer};
