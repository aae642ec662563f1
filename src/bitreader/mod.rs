//! Sequential MSB-first bit reader over a positional byte source.
//!
//! Unread bits live in the most significant end of a 64-bit window.
//! Refills shift fresh bytes in below them; nothing is ever zero-filled,
//! a short source surfaces as [`PsError::UnexpectedEndOfData`].

mod source;

pub use source::{ByteSource, FileSource};

use crate::error::{PsError, Result};

const WINDOW_BITS: u32 = 64;

pub struct BitReader<S> {
    source: S,
    size: u64,
    /// Next source byte not yet pulled into the window.
    cursor: u64,
    window: u64,
    /// Valid bits at the top of `window`.
    remaining: u32,
}

impl<S: ByteSource> BitReader<S> {
    pub fn new(source: S) -> Self {
        let size = source.size();
        Self { source, size, cursor: 0, window: 0, remaining: 0 }
    }

    /// Starts reading at byte `offset` instead of the beginning.
    pub fn at(source: S, offset: u64) -> Result<Self> {
        let mut reader = Self::new(source);
        if offset > reader.size {
            return Err(PsError::UnexpectedEndOfData { offset: reader.size });
        }
        reader.cursor = offset;
        Ok(reader)
    }

    /// Returns the next `n` bits without consuming them.
    pub fn peek(&mut self, n: u32) -> Result<u64> {
        if n > WINDOW_BITS {
            return Err(PsError::RequestTooLong(n));
        }
        if n == 0 {
            return Ok(0);
        }
        if self.remaining < n {
            self.fill()?;
        }
        if self.remaining >= n {
            return Ok(self.window >> (WINDOW_BITS - n));
        }

        // Misaligned window cannot hold n bits: borrow the tail from the
        // next source byte without moving the cursor.
        let missing = n - self.remaining;
        if missing > 8 || self.cursor >= self.size {
            return Err(self.end_of_data());
        }
        let mut next = [0u8; 1];
        self.source
            .read_exact_at(&mut next, self.cursor)
            .map_err(|e| self.map_io(e))?;
        let head = if self.remaining == 0 { 0 } else { self.window >> (WINDOW_BITS - self.remaining) };
        Ok((head << missing) | (u64::from(next[0]) >> (8 - missing)))
    }

    /// Returns the next `n` bits and advances past them.
    pub fn read(&mut self, n: u32) -> Result<u64> {
        let value = self.peek(n)?;
        self.consume(n)?;
        Ok(value)
    }

    /// Discards `n` bits; whole bytes past the window are skipped on the
    /// cursor without being read.
    pub fn skip_bits(&mut self, n: u64) -> Result<()> {
        let from_window = n.min(u64::from(self.remaining));
        self.consume(from_window as u32)?;
        let rest = n - from_window;
        if rest == 0 {
            return Ok(());
        }

        // window is empty here, so the cursor is the exact position
        let whole = rest / 8;
        if whole > self.size - self.cursor {
            self.cursor = self.size;
            return Err(self.end_of_data());
        }
        self.cursor += whole;
        self.consume((rest % 8) as u32)
    }

    pub fn skip_bytes(&mut self, n: u64) -> Result<()> {
        let bits = n
            .checked_mul(8)
            .ok_or(PsError::UnexpectedEndOfData { offset: self.size })?;
        self.skip_bits(bits)
    }

    /// Byte-aligned bulk read: buffered bytes are served from the window,
    /// the rest comes straight from the source.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.is_aligned() {
            return Err(PsError::Misaligned { pending: self.remaining % 8 });
        }
        let mut filled = 0;
        while self.remaining >= 8 && filled < buf.len() {
            buf[filled] = self.read(8)? as u8;
            filled += 1;
        }
        let rest = &mut buf[filled..];
        if rest.is_empty() {
            return Ok(());
        }
        self.source
            .read_exact_at(rest, self.cursor)
            .map_err(|e| self.map_io(e))?;
        self.cursor += rest.len() as u64;
        Ok(())
    }

    /// Byte holding the next unread bit.
    ///
    /// Equals `cursor - remaining / 8` whenever the reader is aligned;
    /// mid-byte it truncates to the partially consumed byte.
    pub fn offset(&self) -> u64 {
        self.bit_position() / 8
    }

    pub fn bit_position(&self) -> u64 {
        self.cursor * 8 - u64::from(self.remaining)
    }

    pub fn is_aligned(&self) -> bool {
        self.remaining % 8 == 0
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_exhausted(&self) -> bool {
        self.bit_position() >= self.size * 8
    }

    /// Non-consuming random access, used for lookahead validation.
    pub fn read_at(&self, buf: &mut [u8], pos: u64) -> Result<usize> {
        Ok(self.source.read_at(buf, pos)?)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Pulls as many whole bytes as fit below the valid bits.
    fn fill(&mut self) -> Result<()> {
        let free = ((WINDOW_BITS - self.remaining) / 8) as u64;
        let want = free.min(self.size - self.cursor) as usize;
        if want == 0 {
            return Ok(());
        }
        let mut raw = [0u8; 8];
        self.source
            .read_exact_at(&mut raw[..want], self.cursor)
            .map_err(|e| self.map_io(e))?;
        for byte in &raw[..want] {
            let shift = WINDOW_BITS - 8 - self.remaining;
            self.window |= u64::from(*byte) << shift;
            self.remaining += 8;
        }
        self.cursor += want as u64;
        Ok(())
    }

    fn consume(&mut self, n: u32) -> Result<()> {
        if n <= self.remaining {
            self.window = self.window.checked_shl(n).unwrap_or(0);
            self.remaining -= n;
            return Ok(());
        }
        let rest = n - self.remaining;
        self.window = 0;
        self.remaining = 0;
        self.fill()?;
        if self.remaining < rest {
            return Err(self.end_of_data());
        }
        self.window = self.window.checked_shl(rest).unwrap_or(0);
        self.remaining -= rest;
        Ok(())
    }

    fn end_of_data(&self) -> PsError {
        PsError::UnexpectedEndOfData { offset: self.offset() }
    }

    fn map_io(&self, err: std::io::Error) -> PsError {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            self.end_of_data()
        } else {
            PsError::Io(err)
        }
    }
}
