/*! A bit cursor over an in-memory DEFLATE payload.

RFC 1951 packs data elements starting with the least-significant bit of each
byte, and multi-bit integers are assembled with the first bit read landing in
bit 0 of the result. `bitstream_io` in little-endian mode does exactly this;
the wrapper here adds an explicit bit position so that running off the end of
the buffer is reported as `OutOfData` with the bit offset. */

use bitstream_io::{BitRead, LittleEndian};

use crate::deflate::decoder::DeflateReadError;

/// The widest integer a single `read_bits` call may return
pub const MAX_READ_BITS: u32 = 16;

pub struct BitReader<'a> {
  inner: bitstream_io::BitReader<&'a [u8], LittleEndian>,
  bit_position: u64,
  bit_len: u64,
}

impl<'a> BitReader<'a> {
  pub fn new(buffer: &'a [u8]) -> Self {
    Self {
      inner: bitstream_io::BitReader::new(buffer),
      bit_position: 0,
      bit_len: buffer.len() as u64 * 8,
    }
  }

  /// Number of bits consumed so far. Never decreases.
  pub fn bit_position(&self) -> u64 {
    self.bit_position
  }

  pub fn bits_remaining(&self) -> u64 {
    self.bit_len - self.bit_position
  }

  fn reserve(&mut self, nbits: u64) -> Result<(), DeflateReadError> {
    if nbits > self.bits_remaining() {
      return Err(DeflateReadError::OutOfData(self.bit_position));
    }
    self.bit_position += nbits;
    Ok(())
  }

  pub fn read_bit(&mut self) -> Result<bool, DeflateReadError> {
    self.reserve(1)?;
    self.inner.read_bit().map_err(|e| self.map_io(e))
  }

  /// Read `n` bits as a little-endian integer: the first bit read becomes the
  /// least-significant bit of the result.
  pub fn read_bits(&mut self, n: u32) -> Result<u32, DeflateReadError> {
    debug_assert!(n <= MAX_READ_BITS, "read_bits called with n = {}", n);
    if n == 0 {
      return Ok(0);
    }
    self.reserve(n as u64)?;
    self.inner.read::<u32>(n).map_err(|e| self.map_io(e))
  }

  /// Skip to the next byte boundary. A no-op if already aligned.
  pub fn byte_align(&mut self) {
    let partial = self.bit_position % 8;
    if partial != 0 {
      self.bit_position += 8 - partial;
    }
    self.inner.byte_align();
  }

  /// Fill `buf` with whole bytes. The cursor must already be byte-aligned.
  pub fn read_aligned_bytes(&mut self, buf: &mut [u8]) -> Result<(), DeflateReadError> {
    debug_assert_eq!(self.bit_position % 8, 0);
    self.reserve(buf.len() as u64 * 8)?;
    self.inner.read_bytes(buf).map_err(|e| self.map_io(e))
  }

  /// A byte slice can only fail by running dry, and `reserve` checks that
  /// first, so any error from the inner reader is reported as `OutOfData`.
  fn map_io<E>(&self, _: E) -> DeflateReadError {
    DeflateReadError::OutOfData(self.bit_position)
  }
}
