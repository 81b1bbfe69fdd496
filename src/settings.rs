//! The typed SETTINGS record (spec.md §3), distinct from `frame::Settings`
//! (the wire-level view of a single frame's parameter list).
//!
//! Grounded in `carllerche-h2/src/proto/streams.rs`'s `Config` struct and
//! the real `h2` crate's `proto::Settings`.

use crate::error::FrameError;
use crate::frame::{self, Parameter};

/// A fully validated, merged view of the six SETTINGS parameters. Two
/// instances live on a connection: the server's own advertised settings
/// (fixed after construction) and the client's settings (mutated whenever
/// a non-ACK SETTINGS frame arrives).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    header_table_size: u32,
    enable_push: bool,
    max_concurrent_streams: Option<u32>,
    initial_window_size: u32,
    max_frame_size: u32,
    max_header_list_size: Option<u32>,
}

impl Settings {
    pub fn header_table_size(&self) -> u32 {
        self.header_table_size
    }

    pub fn enable_push(&self) -> bool {
        self.enable_push
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    pub fn max_header_list_size(&self) -> Option<u32> {
        self.max_header_list_size
    }

    pub fn set_header_table_size(&mut self, v: u32) {
        self.header_table_size = v;
    }

    pub fn set_enable_push(&mut self, v: bool) {
        self.enable_push = v;
    }

    pub fn set_max_concurrent_streams(&mut self, v: Option<u32>) {
        self.max_concurrent_streams = v;
    }

    pub fn set_initial_window_size(&mut self, v: u32) {
        self.initial_window_size = v;
    }

    pub fn set_max_frame_size(&mut self, v: u32) {
        self.max_frame_size = v;
    }

    pub fn set_max_header_list_size(&mut self, v: Option<u32>) {
        self.max_header_list_size = v;
    }

    /// Applies a wire-level SETTINGS frame's parameters on top of the
    /// current values, validating each one (spec.md §3 range table). The
    /// server's own `ENABLE_PUSH` may never be advertised as anything but
    /// `0` (spec.md §1's server-push non-goal).
    pub fn apply(&mut self, frame: &frame::Settings) -> Result<(), FrameError> {
        for (param, value) in frame.iter() {
            match param {
                Parameter::HeaderTableSize => self.header_table_size = value,
                Parameter::EnablePush => {
                    if value > 1 {
                        return Err(FrameError::InvalidSettingValue);
                    }
                    self.enable_push = value == 1;
                }
                Parameter::MaxConcurrentStreams => self.max_concurrent_streams = Some(value),
                Parameter::InitialWindowSize => self.initial_window_size = value,
                Parameter::MaxFrameSize => self.max_frame_size = value,
                Parameter::MaxHeaderListSize => self.max_header_list_size = Some(value),
            }
        }
        Ok(())
    }

    /// Encodes this record as a wire-level SETTINGS frame, e.g. to send
    /// the server's initial settings during the handshake.
    pub fn to_frame(&self) -> frame::Settings {
        let mut f = frame::Settings::new();
        f.set(Parameter::HeaderTableSize, self.header_table_size);
        f.set(Parameter::EnablePush, self.enable_push as u32);
        if let Some(max) = self.max_concurrent_streams {
            f.set(Parameter::MaxConcurrentStreams, max);
        }
        f.set(Parameter::InitialWindowSize, self.initial_window_size);
        f.set(Parameter::MaxFrameSize, self.max_frame_size);
        if let Some(max) = self.max_header_list_size {
            f.set(Parameter::MaxHeaderListSize, max);
        }
        f
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            header_table_size: frame::DEFAULT_SETTINGS_HEADER_TABLE_SIZE,
            enable_push: false,
            max_concurrent_streams: None,
            initial_window_size: frame::DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: frame::SETTINGS_DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
        }
    }
}
