//! Two-level flow control: a connection window and one window per stream
//! (spec.md §4.7).
//!
//! Grounded in `carllerche-h2/src/proto/streams/flow_control.rs`'s
//! `FlowControl` type, generalized so a single type serves both the
//! connection-level window and every stream's window.

use crate::error::FrameError;
use crate::frame::WindowUpdate as WindowUpdateFrame;

pub const MAX_WINDOW_SIZE: i64 = (1 << 31) - 1;

/// A signed flow-control window. `window_size` is the credit the peer has
/// granted us (or that we've granted the peer, depending on direction);
/// DATA we send/receive consumes it, WINDOW_UPDATE grows it.
#[derive(Debug, Clone, Copy)]
pub struct FlowControl {
    window_size: i64,
    initial_window: u32,
}

impl FlowControl {
    pub fn new(initial: u32) -> FlowControl {
        FlowControl {
            window_size: initial as i64,
            initial_window: initial,
        }
    }

    pub fn window_size(&self) -> i64 {
        self.window_size
    }

    /// The window size this instance was constructed with -- the basis for
    /// deciding when a receive-side window needs replenishing (spec.md
    /// §4.7).
    pub fn initial_window(&self) -> u32 {
        self.initial_window
    }

    pub fn available(&self) -> usize {
        if self.window_size < 0 {
            0
        } else {
            self.window_size as usize
        }
    }

    /// Applies a WINDOW_UPDATE increment. Spec.md §4.7: an increment of 0
    /// is a protocol error; a resulting window over 2^31-1 is a flow
    /// control error. The caller (connection/stream dispatch) decides
    /// whether that becomes a stream or connection error based on the
    /// frame's stream id.
    pub fn apply_increment(&mut self, increment: u32) -> Result<(), FrameError> {
        if increment == 0 {
            return Err(FrameError::ZeroIncrement);
        }

        let new_size = self.window_size + increment as i64;
        if new_size > MAX_WINDOW_SIZE {
            return Err(FrameError::WindowOverflow);
        }

        self.window_size = new_size;
        Ok(())
    }

    pub fn apply_frame(&mut self, frame: &WindowUpdateFrame) -> Result<(), FrameError> {
        self.apply_increment(frame.size_increment())
    }

    /// Adjusts the window by a signed delta -- used when a SETTINGS frame
    /// changes INITIAL_WINDOW_SIZE and every open stream's window shifts
    /// by the same amount (spec.md §4.7).
    pub fn apply_settings_delta(&mut self, delta: i64) -> Result<(), FrameError> {
        let new_size = self.window_size + delta;
        if new_size > MAX_WINDOW_SIZE {
            return Err(FrameError::WindowOverflow);
        }
        self.window_size = new_size;
        Ok(())
    }

    /// Consumes `len` bytes of window capacity, e.g. after sending (or
    /// receiving) that many bytes of DATA. The caller must have already
    /// checked `available() >= len`.
    pub fn consume(&mut self, len: usize) {
        assert!(self.available() >= len, "flow control window underflow");
        self.window_size -= len as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{StreamId, WindowUpdate};

    #[test]
    fn zero_increment_is_rejected() {
        let mut flow = FlowControl::new(100);
        assert!(matches!(flow.apply_increment(0), Err(FrameError::ZeroIncrement)));
        assert_eq!(flow.window_size(), 100);
    }

    #[test]
    fn increment_past_max_window_size_is_rejected() {
        let mut flow = FlowControl::new(MAX_WINDOW_SIZE as u32);
        assert!(matches!(flow.apply_increment(1), Err(FrameError::WindowOverflow)));
    }

    #[test]
    fn two_increments_summing_to_overflow_are_rejected_on_the_second() {
        let mut flow = FlowControl::new(0);
        let half = 1u32 << 30;
        flow.apply_increment(half).unwrap();
        assert!(matches!(flow.apply_increment(half), Err(FrameError::WindowOverflow)));
    }

    #[test]
    fn consume_reduces_available_and_can_go_negative_in_window_size() {
        let mut flow = FlowControl::new(10);
        flow.consume(10);
        assert_eq!(flow.available(), 0);
        assert_eq!(flow.window_size(), 0);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn consuming_more_than_available_panics() {
        let mut flow = FlowControl::new(5);
        flow.consume(6);
    }

    #[test]
    fn settings_delta_shrinks_or_grows_the_window() {
        let mut flow = FlowControl::new(1000);
        flow.apply_settings_delta(-500).unwrap();
        assert_eq!(flow.window_size(), 500);
        flow.apply_settings_delta(500).unwrap();
        assert_eq!(flow.window_size(), 1000);
    }

    #[test]
    fn apply_frame_reads_the_increment_off_the_wire_frame() {
        let mut flow = FlowControl::new(0);
        let update = WindowUpdate::new(StreamId::new(1), 42);
        flow.apply_frame(&update).unwrap();
        assert_eq!(flow.window_size(), 42);
    }
}
