use std::convert::TryFrom;

use lazy_static::lazy_static;
use log::{debug, trace};
use thiserror::Error;

use super::codepoints::{dist_codepoint, length_codepoint, EOB_CODE};
use super::deflate_header::read_header;
use super::{BlockType, CodeTables};
use crate::bitreader::BitReader;
use crate::error::ErrorCategory;
use crate::huff_tree::HuffmanTable;

#[derive(Error, Debug)]
pub enum DeflateReadError {
  #[error("Block type 3 is reserved")]
  ReservedBlockType,
  #[error("Code lengths over-subscribe the code space at length {0}")]
  OverSubscribedTree(u8),
  #[error("No code of at most 15 bits matched (at bit {0})")]
  IncompleteCode(u64),
  #[error("Code length {0} exceeds the 15-bit maximum")]
  InvalidCodeLength(u8),
  #[error("Invalid length symbol: {0}")]
  InvalidLengthCode(u16),
  #[error("Invalid distance symbol: {0}")]
  InvalidDistanceCode(u16),
  #[error("Dynamic header declares {0} length/literal codes (max 286)")]
  TooManyLengthCodes(usize),
  #[error("Dynamic header declares {0} distance codes (max 30)")]
  TooManyDistanceCodes(usize),
  #[error("Code length repeat would write {attempted} lengths, but only {declared} were declared")]
  TooManyLengths { declared: usize, attempted: usize },
  #[error("Asked to repeat the previous code length, but there is none")]
  RepeatWithoutPrevious,
  #[error("Dynamic block has no code for end-of-block")]
  MissingEndOfBlockCode,
  #[error("Unexpected end of DEFLATE data at bit {0}")]
  OutOfData(u64),
  #[error("The LEN and NLEN fields of an uncompressed block mismatched: {0}, {1}")]
  LenNlenMismatch(u16, u16),
  #[error("Tried to go back {0} bytes, but the output is only {1} large")]
  BackrefPastStart(u16, usize),
  #[error("Decompressed data would exceed {0} bytes")]
  OutputTooLarge(usize),
  #[error("Stream ended after {actual} bytes, expected {expected}")]
  OutputTooShort { expected: usize, actual: usize },
}

impl DeflateReadError {
  pub fn category(&self) -> ErrorCategory {
    ErrorCategory::Corruption
  }
}

lazy_static! {
  /// The tables of RFC 1951 section 3.2.6, built once and shared by every
  /// fixed block.
  pub static ref FIXED_TABLES: CodeTables = {
    let mut lenlit = [0u8; 288];
    lenlit[..144].iter_mut().for_each(|l| *l = 8);
    lenlit[144..256].iter_mut().for_each(|l| *l = 9);
    lenlit[256..280].iter_mut().for_each(|l| *l = 7);
    lenlit[280..].iter_mut().for_each(|l| *l = 8);
    let dist = [5u8; 30];
    CodeTables {
      lenlit: HuffmanTable::from_lengths(&lenlit).expect("fixed length/literal code is complete"),
      dist: HuffmanTable::from_lengths(&dist).expect("fixed distance code is valid"),
    }
  };
}

/// Decompress a raw DEFLATE stream that is known to expand to exactly
/// `expected_len` bytes.
pub fn inflate(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>, DeflateReadError> {
  Inflater::new(compressed, expected_len).run()
}

/// One decompression session. Owns its bit cursor and output, so nothing is
/// shared between two calls.
pub struct Inflater<'a> {
  bit_src: BitReader<'a>,
  output: Vec<u8>,
  expected_len: usize,
  blocks: usize,
}

impl<'a> Inflater<'a> {
  pub fn new(compressed: &'a [u8], expected_len: usize) -> Self {
    Self {
      bit_src: BitReader::new(compressed),
      output: Vec::with_capacity(expected_len.min(compressed.len().saturating_mul(4))),
      expected_len,
      blocks: 0,
    }
  }

  /// Decode blocks until the expected number of bytes has been produced
  pub fn run(mut self) -> Result<Vec<u8>, DeflateReadError> {
    while self.output.len() < self.expected_len {
      let bfinal = self.bit_src.read_bit()?;
      let btype = self.bit_src.read_bits(2)? as u8;
      let btype = BlockType::try_from(btype).map_err(|_| DeflateReadError::ReservedBlockType)?;
      debug!(
        "block {}: bfinal = {}, type = {:?}, output so far = {}",
        self.blocks, bfinal, btype, self.output.len()
      );
      self.blocks += 1;

      match btype {
        BlockType::Stored => self.stored_block()?,
        BlockType::Fixed => self.compressed_block(&FIXED_TABLES)?,
        BlockType::Dynamic => {
          let tables = read_header(&mut self.bit_src)?;
          self.compressed_block(&tables)?
        }
        BlockType::Reserved => return Err(DeflateReadError::ReservedBlockType),
      }

      if bfinal && self.output.len() < self.expected_len {
        return Err(DeflateReadError::OutputTooShort {
          expected: self.expected_len,
          actual: self.output.len(),
        });
      }
    }
    debug!(
      "inflated {} bytes from {} blocks, {} bits consumed",
      self.output.len(),
      self.blocks,
      self.bit_src.bit_position()
    );
    Ok(self.output)
  }

  fn stored_block(&mut self) -> Result<(), DeflateReadError> {
    // According to 1951, we need to skip any remaining bits in the partial byte
    self.bit_src.byte_align();
    let len = self.bit_src.read_bits(16)? as u16;
    let nlen = self.bit_src.read_bits(16)? as u16;
    if len != !nlen {
      return Err(DeflateReadError::LenNlenMismatch(len, nlen));
    }
    trace!("stored block of {} bytes", len);

    let start = self.output.len();
    if start + len as usize > self.expected_len {
      return Err(DeflateReadError::OutputTooLarge(self.expected_len));
    }
    self.output.resize(start + len as usize, 0);
    self.bit_src.read_aligned_bytes(&mut self.output[start..])
  }

  /// Decode symbols with the given tables until end-of-block, or until the
  /// output reaches its expected length.
  fn compressed_block(&mut self, tables: &CodeTables) -> Result<(), DeflateReadError> {
    while self.output.len() < self.expected_len {
      let sym = tables.lenlit.decode_symbol(&mut self.bit_src)?;
      if sym < EOB_CODE {
        self.output.push(sym as u8);
      } else if sym == EOB_CODE {
        return Ok(());
      } else {
        let length = length_codepoint(sym)?.read_value(&mut self.bit_src)?;
        let dist_sym = tables.dist.decode_symbol(&mut self.bit_src)?;
        let distance = dist_codepoint(dist_sym)?.read_value(&mut self.bit_src)?;
        expand_backref(length, distance, &mut self.output, self.expected_len)?;
      }
    }
    Ok(())
  }
}

/// Expand a backref at the end of the data. Bytes are copied one at a time so
/// that a distance shorter than the length repeats the freshly written bytes.
pub fn expand_backref(
  length: u16,
  distance: u16,
  data: &mut Vec<u8>,
  limit: usize,
) -> Result<(), DeflateReadError> {
  let distance_u = distance as usize;
  if distance_u == 0 || distance_u > data.len() {
    return Err(DeflateReadError::BackrefPastStart(distance, data.len()));
  }
  if data.len() + length as usize > limit {
    return Err(DeflateReadError::OutputTooLarge(limit));
  }
  for _ in 0..length {
    let target = data[data.len() - distance_u];
    data.push(target);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_util::{stored_stream, TestStream};
  use quickcheck_macros::quickcheck;

  fn fixed_code(sym: u16) -> Vec<u8> {
    FIXED_TABLES.lenlit.codes()[sym as usize].1.clone()
  }

  fn fixed_dist_code(sym: u16) -> Vec<u8> {
    FIXED_TABLES.dist.codes()[sym as usize].1.clone()
  }

  #[test]
  fn hello_fixed() {
    let data = [0xf3, 0x48, 0xcd, 0xc9, 0xc9, 0xe7, 0x2, 0x0u8];
    let decoded = inflate(&data, 6).unwrap();
    assert_eq!(decoded, b"Hello\n");
  }

  #[test]
  fn hello_with_backrefs() {
    let data = [
      0xcb, 0x48, 0xcd, 0xc9, 0xc9, 0xcf, 0x80, 0x13, 0x5c, 0x19, 0xa3, 0x7c, 0xaa, 0xf2, 0x01,
    ];
    let correct_answer = "hellohellohello\n".repeat(22);
    let decoded = inflate(&data, correct_answer.len()).unwrap();
    assert_eq!(decoded, correct_answer.as_bytes());
  }

  #[test]
  fn dynamic_block() {
    // zlib level 9, raw DEFLATE, single dynamic block
    let data = [
      0xb5, 0xcb, 0xd1, 0x01, 0x80, 0x10, 0x14, 0x46, 0xe1, 0x55, 0xfe, 0x16, 0x68, 0x96, 0x1e,
      0x2c, 0x40, 0x11, 0x15, 0x37, 0x84, 0x98, 0xbe, 0xbb, 0x44, 0xcf, 0xe7, 0x3b, 0xc2, 0x6a,
      0xc4, 0xe2, 0xd6, 0x13, 0x2a, 0x51, 0x0b, 0x30, 0xf4, 0xe2, 0x28, 0xfe, 0xce, 0xa0, 0xaa,
      0x13, 0x1e, 0xce, 0x97, 0x1c, 0x1d, 0x1b, 0xed, 0x33, 0xc4, 0x6f, 0x78, 0x91, 0xec, 0x7c,
      0x87, 0x62, 0xd4, 0xdc, 0x63, 0x61, 0x5c, 0xd5, 0x9c, 0x86, 0x0e, 0xb8, 0x5c, 0x2c, 0x94,
      0xf8, 0xdd, 0xf3, 0xf4, 0x01,
    ];
    let mut expected = "The quick brown fox jumps over the lazy dog. ".repeat(3);
    expected.push_str("Pack my box with five dozen liquor jugs!");
    let decoded = inflate(&data, expected.len()).unwrap();
    assert_eq!(decoded, expected.as_bytes());
  }

  #[test]
  fn stored_block_of_every_byte() {
    let payload: Vec<u8> = (0..=255u8).collect();
    let data = stored_stream(&payload);
    assert_eq!(&data[..5], &[0x01, 0x00, 0x01, 0xff, 0xfe]);
    assert_eq!(inflate(&data, 256).unwrap(), payload);
  }

  #[test]
  fn stored_block_len_mismatch() {
    let mut data = stored_stream(b"abc");
    data[3] ^= 0x01;
    assert!(matches!(
      inflate(&data, 3),
      Err(DeflateReadError::LenNlenMismatch(3, _))
    ));
  }

  #[test]
  fn fixed_block_run_of_a() {
    let mut strm = TestStream::new();
    strm.bits(1, 1).bits(2, 1);
    strm.code(&fixed_code(b'A' as u16));
    strm.code(&fixed_code(263)); // length 9
    strm.code(&fixed_dist_code(0)); // distance 1
    strm.code(&fixed_code(EOB_CODE));
    let data = strm.finish();
    assert_eq!(inflate(&data, 10).unwrap(), b"AAAAAAAAAA");
  }

  #[test]
  fn overlapping_copy_is_bytewise() {
    let mut data = b"ab".to_vec();
    expand_backref(5, 2, &mut data, 100).unwrap();
    assert_eq!(&data[2..], b"ababa");
    assert_eq!(data, b"abababa");
  }

  #[test]
  fn backref_before_start() {
    let mut data = b"ab".to_vec();
    assert!(matches!(
      expand_backref(3, 3, &mut data, 100),
      Err(DeflateReadError::BackrefPastStart(3, 2))
    ));
  }

  #[test]
  fn backref_past_limit() {
    let mut data = b"ab".to_vec();
    assert!(matches!(
      expand_backref(10, 1, &mut data, 8),
      Err(DeflateReadError::OutputTooLarge(8))
    ));
  }

  #[test]
  fn reserved_block_type() {
    let mut strm = TestStream::new();
    strm.bits(1, 1).bits(2, 3).bits(8, 0);
    assert!(matches!(
      inflate(&strm.finish(), 1),
      Err(DeflateReadError::ReservedBlockType)
    ));
  }

  #[test]
  fn invalid_length_symbol() {
    // 286 has a fixed code but no meaning
    let mut strm = TestStream::new();
    strm.bits(1, 1).bits(2, 1).code(&fixed_code(286)).bits(16, 0);
    assert!(matches!(
      inflate(&strm.finish(), 4),
      Err(DeflateReadError::InvalidLengthCode(286))
    ));
  }

  #[test]
  fn invalid_distance_symbol() {
    // Distance codes 30 and 31 exist in the fixed code space but are unused
    let mut strm = TestStream::new();
    strm.bits(1, 1).bits(2, 1);
    strm.code(&fixed_code(b'x' as u16)).code(&fixed_code(257));
    strm.code(&[1, 1, 1, 1, 0]).bits(16, 0);
    assert!(matches!(
      inflate(&strm.finish(), 8),
      Err(DeflateReadError::IncompleteCode(_))
    ));
  }

  #[test]
  fn truncated_stream() {
    let data = stored_stream(b"hello");
    assert!(matches!(
      inflate(&data[..data.len() - 2], 5),
      Err(DeflateReadError::OutOfData(_))
    ));
    assert!(matches!(inflate(&[], 1), Err(DeflateReadError::OutOfData(0))));
  }

  #[test]
  fn final_block_ending_early() {
    let data = stored_stream(b"hello");
    assert!(matches!(
      inflate(&data, 6),
      Err(DeflateReadError::OutputTooShort {
        expected: 6,
        actual: 5
      })
    ));
  }

  #[test]
  fn stored_block_larger_than_expected() {
    let data = stored_stream(b"hello");
    assert!(matches!(
      inflate(&data, 4),
      Err(DeflateReadError::OutputTooLarge(4))
    ));
  }

  #[test]
  fn zero_length_reads_nothing() {
    assert_eq!(inflate(&[], 0).unwrap(), Vec::<u8>::new());
  }

  #[test]
  fn multiple_block_types_share_the_window() {
    // A stored block followed by a fixed block that refers back into it
    let mut strm = TestStream::new();
    strm.bits(1, 0).bits(2, 0).align().bits(16, 3).bits(16, !3 & 0xffff);
    strm.bytes(b"xyz");
    strm.bits(1, 1).bits(2, 1);
    strm.code(&fixed_code(258)).code(&fixed_dist_code(2)); // length 4, distance 3
    strm.code(&fixed_code(EOB_CODE));
    let data = strm.finish();
    assert_eq!(inflate(&data, 7).unwrap(), b"xyzxyzx");
  }

  #[test]
  fn capacity_follows_input_size() {
    let data = stored_stream(b"abc");
    let inflater = Inflater::new(&data, 1 << 30);
    assert!(inflater.output.capacity() <= data.len() * 4);
    assert!(matches!(
      Inflater::new(&data, 1 << 30).run(),
      Err(DeflateReadError::OutputTooShort { actual: 3, .. })
    ));
    assert!(matches!(inflate(&[], 1 << 30), Err(DeflateReadError::OutOfData(0))));
  }

  #[test]
  fn stops_once_expected_length_is_reached() {
    // Trailing garbage after the last needed symbol is never read
    let mut strm = TestStream::new();
    strm.bits(1, 1).bits(2, 1);
    strm.code(&fixed_code(b'o' as u16)).code(&fixed_code(b'k' as u16));
    let mut data = strm.finish();
    data.extend_from_slice(&[0xff, 0xff]);
    assert_eq!(inflate(&data, 2).unwrap(), b"ok");
  }

  #[quickcheck]
  fn stored_roundtrip(payload: Vec<u8>) -> bool {
    inflate(&stored_stream(&payload), payload.len()).ok() == Some(payload)
  }

  #[quickcheck]
  fn fixed_literal_roundtrip(payload: Vec<u8>) -> bool {
    let codes = FIXED_TABLES.lenlit.codes();
    let mut strm = TestStream::new();
    strm.bits(1, 1).bits(2, 1);
    for b in payload.iter() {
      strm.code(&codes[*b as usize].1);
    }
    strm.code(&codes[EOB_CODE as usize].1);
    inflate(&strm.finish(), payload.len()).ok() == Some(payload)
  }
}
