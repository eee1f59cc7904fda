//! Bit-level I/O for the symbol codec
//!
//! MSB-first packing over a growable byte buffer on the write side and a
//! borrowed slice on the read side. All reads are bounds-checked and fail
//! with a codec error instead of panicking on truncated input.

use crate::error::{Error, Result};

/// Bit-level writer packing variable-width values into a byte vector
pub struct BitWriter {
    buf: Vec<u8>,
    /// Number of bits already committed to `buf`
    bit_len: usize,
}

impl BitWriter {
    /// Create a writer with a pre-sized backing buffer
    pub fn with_capacity(bytes: usize) -> Self {
        BitWriter {
            buf: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Append the raw bytes of an already-aligned prefix (e.g. a header)
    ///
    /// Must be called before any bit-level writes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bit_len % 8, 0);
        self.buf.extend_from_slice(bytes);
        self.bit_len += bytes.len() * 8;
    }

    /// Write the lowest `width` bits of `value`, MSB first
    pub fn write_bits(&mut self, value: u32, width: u8) {
        debug_assert!(width >= 1 && width <= 32);

        for i in (0..width).rev() {
            let bit = ((value >> i) & 1) as u8;
            if self.bit_len % 8 == 0 {
                self.buf.push(0);
            }
            if bit != 0 {
                let byte_idx = self.bit_len / 8;
                self.buf[byte_idx] |= 1 << (7 - self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }

    /// Write a single bit
    pub fn write_bit(&mut self, bit: u32) {
        self.write_bits(bit & 1, 1);
    }

    /// Pad the final partial byte with zeros and return the buffer
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bit-level reader over a borrowed byte slice
pub struct BitReader<'a> {
    buf: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, bit_pos: 0 }
    }

    /// Remaining unread bits
    pub fn remaining_bits(&self) -> usize {
        (self.buf.len() * 8).saturating_sub(self.bit_pos)
    }

    /// Read `width` bits into a u32, MSB first
    pub fn read_bits(&mut self, width: u8) -> Result<u32> {
        debug_assert!(width >= 1 && width <= 32);

        if self.remaining_bits() < width as usize {
            return Err(Error::codec("unexpected end of codestream"));
        }

        let mut value = 0u32;
        for _ in 0..width {
            let byte_idx = self.bit_pos / 8;
            let bit_idx = self.bit_pos % 8;
            let bit = (self.buf[byte_idx] >> (7 - bit_idx)) & 1;
            value = (value << 1) | u32::from(bit);
            self.bit_pos += 1;
        }

        Ok(value)
    }

    /// Read a single bit
    pub fn read_bit(&mut self) -> Result<u32> {
        self.read_bits(1)
    }
}
