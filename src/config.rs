//! Connection construction parameters (ambient addition -- the distilled
//! spec leaves these as "configured"; this crate names them explicitly).
//!
//! Builder pattern grounded in `carllerche-h2::server::Builder`
//! (`src/server.rs`).

use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) settings: Settings,
    pub(crate) input_buffer_capacity: usize,
    pub(crate) output_buffer_capacity: usize,
    pub(crate) stream_pool_capacity: usize,
    pub(crate) output_buffer_pool_capacity: usize,
    pub(crate) max_header_list_size: usize,
    pub(crate) stream_timeout: Option<std::time::Duration>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

/// Builder mirroring `carllerche-h2::server::Builder`'s fluent setter
/// style.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    settings: Settings,
    input_buffer_capacity: usize,
    output_buffer_capacity: usize,
    stream_pool_capacity: usize,
    output_buffer_pool_capacity: usize,
    max_header_list_size: usize,
    stream_timeout: Option<std::time::Duration>,
}

const DEFAULT_INPUT_BUFFER_CAPACITY: usize = 64 * 1024;
const DEFAULT_OUTPUT_BUFFER_CAPACITY: usize = 64 * 1024;
const DEFAULT_STREAM_POOL_CAPACITY: usize = 256;
const DEFAULT_OUTPUT_BUFFER_POOL_CAPACITY: usize = 64;
const DEFAULT_MAX_HEADER_LIST_SIZE: usize = 16 << 20;

impl ConfigBuilder {
    pub fn new() -> ConfigBuilder {
        ConfigBuilder {
            settings: Settings::default(),
            input_buffer_capacity: DEFAULT_INPUT_BUFFER_CAPACITY,
            output_buffer_capacity: DEFAULT_OUTPUT_BUFFER_CAPACITY,
            stream_pool_capacity: DEFAULT_STREAM_POOL_CAPACITY,
            output_buffer_pool_capacity: DEFAULT_OUTPUT_BUFFER_POOL_CAPACITY,
            max_header_list_size: DEFAULT_MAX_HEADER_LIST_SIZE,
            stream_timeout: None,
        }
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.settings.set_max_concurrent_streams(Some(max));
        self
    }

    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.settings.set_initial_window_size(size);
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.settings.set_max_frame_size(size);
        self
    }

    pub fn header_table_size(mut self, size: u32) -> Self {
        self.settings.set_header_table_size(size);
        self
    }

    pub fn input_buffer_capacity(mut self, capacity: usize) -> Self {
        self.input_buffer_capacity = capacity;
        self
    }

    pub fn output_buffer_capacity(mut self, capacity: usize) -> Self {
        self.output_buffer_capacity = capacity;
        self
    }

    pub fn stream_pool_capacity(mut self, capacity: usize) -> Self {
        self.stream_pool_capacity = capacity;
        self
    }

    pub fn output_buffer_pool_capacity(mut self, capacity: usize) -> Self {
        self.output_buffer_pool_capacity = capacity;
        self
    }

    pub fn max_header_list_size(mut self, size: usize) -> Self {
        self.max_header_list_size = size;
        self.settings.set_max_header_list_size(Some(size as u32));
        self
    }

    pub fn stream_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        Config {
            settings: self.settings,
            input_buffer_capacity: self.input_buffer_capacity,
            output_buffer_capacity: self.output_buffer_capacity,
            stream_pool_capacity: self.stream_pool_capacity,
            output_buffer_pool_capacity: self.output_buffer_pool_capacity,
            max_header_list_size: self.max_header_list_size,
            stream_timeout: self.stream_timeout,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder::new()
    }
}
