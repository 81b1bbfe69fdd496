use std::io;

use tokio::io::AsyncReadExt;

/// A fixed-capacity byte staging area with a read position, an end
/// position (limit), and an optional mark (spec.md §4.1).
///
/// Reading past `limit` is a programming error: per spec it must "fail
/// fast, never block, never return a sentinel", so the read methods here
/// panic rather than return a `Result` for that case -- a real connection
/// only calls them after `available()` has confirmed the bytes are there.
pub struct InputBuffer {
    buf: Vec<u8>,
    capacity: usize,
    position: usize,
    limit: usize,
    mark: Option<usize>,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> InputBuffer {
        InputBuffer {
            buf: vec![0; capacity],
            capacity,
            position: 0,
            limit: 0,
            mark: None,
        }
    }

    pub fn available(&self, n: usize) -> bool {
        self.limit - self.position >= n
    }

    pub fn mark(&mut self) {
        self.mark = Some(self.position);
    }

    /// Resets the position back to the mark, returning how many bytes had
    /// been consumed since marking. Panics if no mark was set.
    pub fn reset_to_mark(&mut self) -> usize {
        let mark = self.mark.take().expect("reset_to_mark called without a mark");
        let consumed = self.position - mark;
        self.position = mark;
        consumed
    }

    pub fn skip(&mut self, n: usize) {
        assert!(self.available(n), "skip past limit");
        self.position += n;
    }

    pub fn peek_byte(&self) -> u8 {
        assert!(self.available(1), "peek past limit");
        self.buf[self.position]
    }

    pub fn read_byte(&mut self) -> u8 {
        let v = self.peek_byte();
        self.position += 1;
        v
    }

    pub fn peek_16_bit(&self) -> u16 {
        self.peek_n(2) as u16
    }

    pub fn read_16_bit(&mut self) -> u16 {
        let v = self.peek_16_bit();
        self.position += 2;
        v
    }

    pub fn peek_24_bit(&self) -> u32 {
        self.peek_n(3) as u32
    }

    pub fn read_24_bit(&mut self) -> u32 {
        let v = self.peek_24_bit();
        self.position += 3;
        v
    }

    /// Reads a 32-bit big-endian integer with the reserved high bit
    /// cleared (used for stream identifiers, spec.md §6).
    pub fn peek_31_bit(&self) -> u32 {
        (self.peek_32_bit()) & !(1 << 31)
    }

    pub fn read_31_bit(&mut self) -> u32 {
        let v = self.peek_31_bit();
        self.position += 4;
        v
    }

    pub fn peek_32_bit(&self) -> u32 {
        self.peek_n(4) as u32
    }

    pub fn read_32_bit(&mut self) -> u32 {
        let v = self.peek_32_bit();
        self.position += 4;
        v
    }

    pub fn peek_64_bit_long(&self) -> u64 {
        self.peek_n(8)
    }

    pub fn read_64_bit_long(&mut self) -> u64 {
        let v = self.peek_64_bit_long();
        self.position += 8;
        v
    }

    pub fn read_bytes(&mut self, dst: &mut [u8]) {
        assert!(self.available(dst.len()), "read_bytes past limit");
        let n = dst.len();
        dst.copy_from_slice(&self.buf[self.position..self.position + n]);
        self.position += n;
    }

    pub fn read_string(&mut self, n: usize) -> String {
        assert!(self.available(n), "read_string past limit");
        let s = String::from_utf8_lossy(&self.buf[self.position..self.position + n]).into_owned();
        self.position += n;
        s
    }

    fn peek_n(&self, n: usize) -> u64 {
        assert!(self.available(n), "peek past limit");
        let mut v: u64 = 0;
        for i in 0..n {
            v = (v << 8) | self.buf[self.position + i] as u64;
        }
        v
    }

    /// Compacts the buffer (shifting unread bytes, or bytes since the mark
    /// if one is set, to offset 0) if necessary, then reads from `channel`
    /// into the free region. Returns `Ok(true)` when the buffer filled to
    /// capacity, signalling the caller that a full frame may still be
    /// waiting to be parsed once more bytes arrive.
    pub async fn add_data<R>(&mut self, channel: &mut R) -> io::Result<bool>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        if self.limit == self.capacity {
            self.compact();
        }

        if self.limit == self.capacity {
            return Ok(true);
        }

        let n = channel.read(&mut self.buf[self.limit..self.capacity]).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "channel closed"));
        }
        self.limit += n;

        Ok(self.limit == self.capacity)
    }

    fn compact(&mut self) {
        let start = self.mark.unwrap_or(self.position);
        if start == 0 {
            return;
        }
        self.buf.copy_within(start..self.limit, 0);
        self.position -= start;
        self.limit -= start;
        if let Some(m) = self.mark.as_mut() {
            *m -= start;
        }
    }
}
