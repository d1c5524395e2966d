//! Helpers for assembling DEFLATE bitstreams by hand in tests.

use bitstream_io::{BitWrite, BitWriter, LittleEndian};

pub struct TestStream {
  w: BitWriter<Vec<u8>, LittleEndian>,
}

impl TestStream {
  pub fn new() -> Self {
    Self {
      w: BitWriter::new(Vec::new()),
    }
  }

  /// Write the low `n` bits of `value`, least significant first
  pub fn bits(&mut self, n: u32, value: u32) -> &mut Self {
    if n > 0 {
      self.w.write(n, value).unwrap();
    }
    self
  }

  /// Write a Huffman codeword given as 0-1 values, first bit first
  pub fn code(&mut self, code: &[u8]) -> &mut Self {
    for b in code {
      self.w.write_bit(*b == 1).unwrap();
    }
    self
  }

  pub fn align(&mut self) -> &mut Self {
    self.w.byte_align().unwrap();
    self
  }

  pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
    for b in data {
      self.w.write(8, *b).unwrap();
    }
    self
  }

  pub fn finish(mut self) -> Vec<u8> {
    self.w.byte_align().unwrap();
    self.w.into_writer()
  }
}

/// A complete stored-block stream carrying `data` in a single final block
pub fn stored_stream(data: &[u8]) -> Vec<u8> {
  let len = data.len() as u32;
  let mut strm = TestStream::new();
  strm
    .bits(1, 1)
    .bits(2, 0)
    .align()
    .bits(16, len)
    .bits(16, !len & 0xffff)
    .bytes(data);
  strm.finish()
}
