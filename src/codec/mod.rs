//! The frame codec layer: decode drives off an `InputBuffer`
//! (`framed_read`), encode drives an `OutputBuffer` (`framed_write`).

mod framed_read;
mod framed_write;

pub use self::framed_read::FrameDecoder;
pub use self::framed_write::FrameEncoder;
