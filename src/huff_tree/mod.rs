/*! Canonical Huffman tables for DEFLATE-style codes.

Huffman codes in DEFLATE carry two additional constraints:
 - Symbols with the same length are listed in lexicographical order
 - Shorter codes lexicographically precede longer codes.

This makes it possible to specify a code by listing only the code length of
each symbol, and to decode it without ever materialising a tree: all that is
needed is the number of codes of each length and the symbols sorted by
(length, value). Decoding then proceeds arithmetically, one bit at a time.
*/

use log::trace;

use crate::bitreader::BitReader;
use crate::deflate::decoder::DeflateReadError;

/// The longest code length DEFLATE allows
pub const MAX_BITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
  /// Number of symbols with each code length. Index 0 counts absent symbols.
  count: [u16; MAX_BITS + 1],
  /// Symbols ordered by (code length, symbol value)
  symbol: Vec<u16>,
}

impl HuffmanTable {
  /// Build a table from the code length of every symbol in the alphabet. A
  /// length of zero means the symbol does not occur.
  ///
  /// Incomplete codes are accepted (RFC 1951 permits a single one-bit distance
  /// code, for instance); over-subscribed ones are not.
  pub fn from_lengths(lengths: &[u8]) -> Result<Self, DeflateReadError> {
    let mut count = [0u16; MAX_BITS + 1];
    for &len in lengths {
      if len as usize > MAX_BITS {
        return Err(DeflateReadError::InvalidCodeLength(len));
      }
      count[len as usize] += 1;
    }

    // One code of length zero to start with; every extra bit doubles the
    // number of available codes.
    let mut left: i32 = 1;
    for len in 1..=MAX_BITS {
      left <<= 1;
      left -= count[len] as i32;
      if left < 0 {
        return Err(DeflateReadError::OverSubscribedTree(len as u8));
      }
    }

    let mut offsets = [0usize; MAX_BITS + 1];
    for len in 1..MAX_BITS {
      offsets[len + 1] = offsets[len] + count[len] as usize;
    }

    let used = lengths.len() - count[0] as usize;
    let mut symbol = vec![0u16; used];
    for (sym, &len) in lengths.iter().enumerate() {
      if len != 0 {
        symbol[offsets[len as usize]] = sym as u16;
        offsets[len as usize] += 1;
      }
    }

    trace!(
      "built huffman table: {} symbols, {} used, counts {:?}",
      lengths.len(),
      used,
      &count[1..]
    );
    Ok(Self { count, symbol })
  }

  /// Decode one symbol, reading at most `MAX_BITS` bits.
  pub fn decode_symbol(&self, bit_src: &mut BitReader) -> Result<u16, DeflateReadError> {
    let mut code: i32 = 0; // bits read so far, first bit most significant
    let mut first: i32 = 0; // first code of the current length
    let mut index: i32 = 0; // position of that code's symbol in `symbol`
    for len in 1..=MAX_BITS {
      code |= bit_src.read_bit()? as i32;
      let count = self.count[len] as i32;
      if code - count < first {
        return Ok(self.symbol[(index + (code - first)) as usize]);
      }
      index += count;
      first += count;
      first <<= 1;
      code <<= 1;
    }
    Err(DeflateReadError::IncompleteCode(bit_src.bit_position()))
  }

  /// How many symbols have a code of the given length
  pub fn count(&self, len: usize) -> u16 {
    self.count.get(len).copied().unwrap_or(0)
  }

  /// The used symbols in canonical order
  pub fn symbols(&self) -> &[u16] {
    &self.symbol
  }

  pub fn is_empty(&self) -> bool {
    self.symbol.is_empty()
  }

  /** The canonical codeword of every used symbol, sorted by symbol value.
  Codewords are given as a sequence of 0-1 values in the order they appear in
  the bitstream (most significant bit of the code first). */
  pub fn codes(&self) -> Vec<(u16, Vec<u8>)> {
    // Compute the smallest code for each codelength
    let mut next_code = [0u32; MAX_BITS + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_BITS {
      let shorter = if bits == 1 { 0 } else { self.count[bits - 1] as u32 };
      code = (code + shorter) << 1;
      next_code[bits] = code;
    }

    let mut result = Vec::with_capacity(self.symbol.len());
    let mut idx = 0usize;
    for len in 1..=MAX_BITS {
      for _ in 0..self.count[len] {
        result.push((self.symbol[idx], to_bits(len, next_code[len])));
        next_code[len] += 1;
        idx += 1;
      }
    }
    result.sort_by_key(|(sym, _)| *sym);
    result
  }
}

/// Convert the lower `nbits` bits of `source` into a vector of 0-1 values,
/// most significant bit first.
fn to_bits(nbits: usize, source: u32) -> Vec<u8> {
  (0..nbits)
    .rev()
    .map(|shift| ((source >> shift) & 1) as u8)
    .collect()
}
