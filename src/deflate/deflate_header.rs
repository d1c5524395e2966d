/*! A dynamically-encoded DEFLATE stream block is preceded by a header which
contains the following information:

  - 5 bits: HLIT, # of length/literal codes - 257
  - 5 bits: HDIST, # of distance codes - 1
  - 4 bits: HCLEN, # of Code Length codes - 4
  - (HCLEN + 4) * 3 bits of code lengths for the code alphabet specified by HCLEN,
    given in the order 16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15

  HLIT + 257 code lengths, encoded using the code length alphabet
  HDIST + 1 distance lengths, encoded with the code length alphabet
  From these code lengths, it is possible to construct the canonical Huffman
  codes used for the distance and length/lit tables, and thus to decode the
  DEFLATE payload.
*/

/* From RFC 1951:

      0 - 15: Represent code lengths of 0 - 15
          16: Copy the previous code length 3 - 6 times.
              The next 2 bits indicate repeat length
                    (0 = 3, ... , 3 = 6)
                 Example:  Codes 8, 16 (+2 bits 11),
                           16 (+2 bits 10) will expand to
                           12 code lengths of 8 (1 + 6 + 5)
          17: Repeat a code length of 0 for 3 - 10 times.
              (3 bits of length)
          18: Repeat a code length of 0 for 11 - 138 times
              (7 bits of length)
*/

use log::debug;

use crate::bitreader::BitReader;
use crate::deflate::codepoints::EOB_CODE;
use crate::deflate::decoder::DeflateReadError;
use crate::deflate::CodeTables;
use crate::huff_tree::HuffmanTable;

/// The order in which the code length code lengths are transmitted
pub const RAW_CODE_ORDER: [usize; 19] = [
  16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

pub const MAX_LENLIT_CODES: usize = 286;
pub const MAX_DIST_CODES: usize = 30;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum CodeLengthCodepoint {
  Length(u8),       // A Number of bits, 0-15
  ValueRepeat(u8),  // Valid values: 3-6
  ShortZeroRep(u8), // Valid values: 3-10
  LongZeroRep(u8),  // Valid values: 11-138
}

impl CodeLengthCodepoint {
  fn read_from_bitstream(
    bit_src: &mut BitReader,
    codelength_table: &HuffmanTable,
  ) -> Result<Self, DeflateReadError> {
    let codept = codelength_table.decode_symbol(bit_src)?;
    let res = match codept {
      0..=15 => Self::Length(codept as u8),
      16 => Self::ValueRepeat(3 + bit_src.read_bits(2)? as u8),
      17 => Self::ShortZeroRep(3 + bit_src.read_bits(3)? as u8),
      // The code length table only has 19 symbols, so this is 18
      _ => Self::LongZeroRep(11 + bit_src.read_bits(7)? as u8),
    };
    Ok(res)
  }
}

/// Read a DEFLATE dynamic block header from stream and return the length/lit
/// and distance tables
pub fn read_header(bit_src: &mut BitReader) -> Result<CodeTables, DeflateReadError> {
  let num_lenlit = bit_src.read_bits(5)? as usize + 257;
  let num_dists = bit_src.read_bits(5)? as usize + 1;
  let num_codelens = bit_src.read_bits(4)? as usize + 4;
  debug!(
    "dynamic header: hlit = {}, hdist = {}, hclen = {}",
    num_lenlit, num_dists, num_codelens
  );
  if num_lenlit > MAX_LENLIT_CODES {
    return Err(DeflateReadError::TooManyLengthCodes(num_lenlit));
  }
  if num_dists > MAX_DIST_CODES {
    return Err(DeflateReadError::TooManyDistanceCodes(num_dists));
  }

  let size_code_table = read_size_codes(bit_src, num_codelens)?;
  let lengths = decode_code_lengths(bit_src, &size_code_table, num_lenlit + num_dists)?;

  if lengths[EOB_CODE as usize] == 0 {
    return Err(DeflateReadError::MissingEndOfBlockCode);
  }

  let (lenlit_lengths, dist_lengths) = lengths.split_at(num_lenlit);
  Ok(CodeTables {
    lenlit: HuffmanTable::from_lengths(lenlit_lengths)?,
    dist: HuffmanTable::from_lengths(dist_lengths)?,
  })
}

/// Unpack the HCLEN + 4 three-bit lengths, returning a table that can be used
/// to decode the code lengths of the primary DEFLATE tables. Entries not
/// transmitted have length zero.
fn read_size_codes(
  bit_src: &mut BitReader,
  num_codes: usize,
) -> Result<HuffmanTable, DeflateReadError> {
  let mut codecodelen = [0u8; 19];
  for &code in &RAW_CODE_ORDER[..num_codes] {
    codecodelen[code] = bit_src.read_bits(3)? as u8;
  }
  HuffmanTable::from_lengths(&codecodelen)
}

/// Decode exactly `num_symbols` run-length compressed code lengths
fn decode_code_lengths(
  bit_src: &mut BitReader,
  size_table: &HuffmanTable,
  num_symbols: usize,
) -> Result<Vec<u8>, DeflateReadError> {
  let mut lengths = Vec::with_capacity(num_symbols);
  while lengths.len() < num_symbols {
    let (value, rep) = match CodeLengthCodepoint::read_from_bitstream(bit_src, size_table)? {
      CodeLengthCodepoint::Length(x) => (x, 1),
      CodeLengthCodepoint::ValueRepeat(n) => match lengths.last() {
        Some(&prev) => (prev, n as usize),
        None => return Err(DeflateReadError::RepeatWithoutPrevious),
      },
      CodeLengthCodepoint::ShortZeroRep(n) | CodeLengthCodepoint::LongZeroRep(n) => (0, n as usize),
    };
    if lengths.len() + rep > num_symbols {
      return Err(DeflateReadError::TooManyLengths {
        declared: num_symbols,
        attempted: lengths.len() + rep,
      });
    }
    lengths.resize(lengths.len() + rep, value);
  }
  Ok(lengths)
}
