/// Raised when a write would exceed capacity and no `on_full` callback is
/// set to drain the buffer (spec.md §4.2).
#[derive(Debug, thiserror::Error)]
#[error("output buffer overflow")]
pub struct BufferOverflow;

/// A fixed-capacity write staging area (spec.md §4.2). `on_full` is invoked
/// when a write would exceed the remaining space; it is expected to drain
/// the buffer (e.g. flush it to the socket), after which the buffer is
/// reset automatically. `on_close` is invoked once, the first time the
/// buffer is closed.
pub struct OutputBuffer {
    buf: Vec<u8>,
    capacity: usize,
    on_full: Option<Box<dyn FnMut(&[u8]) + Send>>,
    on_close: Option<Box<dyn FnMut() + Send>>,
    closed: bool,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> OutputBuffer {
        OutputBuffer {
            buf: Vec::with_capacity(capacity),
            capacity,
            on_full: None,
            on_close: None,
            closed: false,
        }
    }

    pub fn set_on_full<F>(&mut self, f: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.on_full = Some(Box::new(f));
    }

    pub fn set_on_close<F>(&mut self, f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_close = Some(Box::new(f));
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Some(cb) = self.on_close.as_mut() {
                cb();
            }
        }
    }

    fn ensure_capacity(&mut self, n: usize) -> Result<(), BufferOverflow> {
        if self.buf.len() + n <= self.capacity {
            return Ok(());
        }

        if let Some(cb) = self.on_full.as_mut() {
            cb(&self.buf);
            self.buf.clear();
        }

        if self.buf.len() + n > self.capacity {
            return Err(BufferOverflow);
        }

        Ok(())
    }

    pub fn write_byte(&mut self, v: u8) -> Result<(), BufferOverflow> {
        self.ensure_capacity(1)?;
        self.buf.push(v);
        Ok(())
    }

    pub fn write_16_bit(&mut self, v: u16) -> Result<(), BufferOverflow> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_24_bit(&mut self, v: u32) -> Result<(), BufferOverflow> {
        let b = v.to_be_bytes();
        self.write_bytes(&b[1..4])
    }

    pub fn write_32_bit(&mut self, v: u32) -> Result<(), BufferOverflow> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_64_bit_long(&mut self, v: u64) -> Result<(), BufferOverflow> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_bytes(&mut self, src: &[u8]) -> Result<(), BufferOverflow> {
        self.ensure_capacity(src.len())?;
        self.buf.extend_from_slice(src);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
