/*! Codepoints are used by RFC 1951 to encode distances and lengths. Each codepoint
consists of a value, encoded using the appropriate Huffman table, possibly followed
by a number of literal bits that are used to disambiguate the codepoint. */

/* The code table from RFC 1951 is reproduced below to avoid extra ALT-TABs

             Extra               Extra               Extra
        Code Bits Length(s) Code Bits Lengths   Code Bits Length(s)
        ---- ---- ------     ---- ---- -------   ---- ---- -------
         257   0     3       267   1   15,16     277   4   67-82
         258   0     4       268   1   17,18     278   4   83-98
         259   0     5       269   2   19-22     279   4   99-114
         260   0     6       270   2   23-26     280   4  115-130
         261   0     7       271   2   27-30     281   5  131-162
         262   0     8       272   2   31-34     282   5  163-194
         263   0     9       273   3   35-42     283   5  195-226
         264   0    10       274   3   43-50     284   5  227-257
         265   1  11,12      275   3   51-58     285   0    258
         266   1  13,14      276   3   59-66

              Extra           Extra               Extra
         Code Bits Dist  Code Bits   Dist     Code Bits Distance
         ---- ---- ----  ---- ----  ------    ---- ---- --------
           0   0    1     10   4     33-48    20    9   1025-1536
           1   0    2     11   4     49-64    21    9   1537-2048
           2   0    3     12   5     65-96    22   10   2049-3072
           3   0    4     13   5     97-128   23   10   3073-4096
           4   1   5,6    14   6    129-192   24   11   4097-6144
           5   1   7,8    15   6    193-256   25   11   6145-8192
           6   2   9-12   16   7    257-384   26   12  8193-12288
           7   2  13-16   17   7    385-512   27   12 12289-16384
           8   3  17-24   18   8    513-768   28   13 16385-24576
           9   3  25-32   19   8   769-1024   29   13 24577-32768
*/

use crate::bitreader::BitReader;
use crate::deflate::decoder::DeflateReadError;

pub const EOB_CODE: u16 = 256;
pub const MIN_LENGTH_CODE: u16 = 257;
pub const MAX_LENGTH_CODE: u16 = 285;
pub const MAX_DIST_CODE: u16 = 29;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Codepoint {
  nbits: u8,
  lo: u16,
}

impl Codepoint {
  pub const fn new(nbits: u8, lo: u16) -> Self {
    Self { nbits, lo }
  }

  pub fn extra_bits(&self) -> u8 {
    self.nbits
  }

  pub fn base(&self) -> u16 {
    self.lo
  }

  /// Read the extra bits for this codepoint and add them to its base value
  pub fn read_value(&self, bit_src: &mut BitReader) -> Result<u16, DeflateReadError> {
    let extra = bit_src.read_bits(self.nbits as u32)? as u16;
    Ok(self.lo + extra)
  }
}

const fn cp(nbits: u8, lo: u16) -> Codepoint {
  Codepoint::new(nbits, lo)
}

/// Length codepoints for symbols 257..=285
pub const LENGTH_CODEPOINTS: [Codepoint; 29] = [
  cp(0, 3),
  cp(0, 4),
  cp(0, 5),
  cp(0, 6),
  cp(0, 7),
  cp(0, 8),
  cp(0, 9),
  cp(0, 10),
  cp(1, 11),
  cp(1, 13),
  cp(1, 15),
  cp(1, 17),
  cp(2, 19),
  cp(2, 23),
  cp(2, 27),
  cp(2, 31),
  cp(3, 35),
  cp(3, 43),
  cp(3, 51),
  cp(3, 59),
  cp(4, 67),
  cp(4, 83),
  cp(4, 99),
  cp(4, 115),
  cp(5, 131),
  cp(5, 163),
  cp(5, 195),
  cp(5, 227),
  cp(0, 258),
];

/// Distance codepoints for symbols 0..=29
pub const DIST_CODEPOINTS: [Codepoint; 30] = [
  cp(0, 1),
  cp(0, 2),
  cp(0, 3),
  cp(0, 4),
  cp(1, 5),
  cp(1, 7),
  cp(2, 9),
  cp(2, 13),
  cp(3, 17),
  cp(3, 25),
  cp(4, 33),
  cp(4, 49),
  cp(5, 65),
  cp(5, 97),
  cp(6, 129),
  cp(6, 193),
  cp(7, 257),
  cp(7, 385),
  cp(8, 513),
  cp(8, 769),
  cp(9, 1025),
  cp(9, 1537),
  cp(10, 2049),
  cp(10, 3073),
  cp(11, 4097),
  cp(11, 6145),
  cp(12, 8193),
  cp(12, 12289),
  cp(13, 16385),
  cp(13, 24577),
];

/// Look up the length codepoint for a literal/length symbol above 256
pub fn length_codepoint(sym: u16) -> Result<&'static Codepoint, DeflateReadError> {
  sym
    .checked_sub(MIN_LENGTH_CODE)
    .and_then(|i| LENGTH_CODEPOINTS.get(i as usize))
    .ok_or(DeflateReadError::InvalidLengthCode(sym))
}

pub fn dist_codepoint(sym: u16) -> Result<&'static Codepoint, DeflateReadError> {
  DIST_CODEPOINTS
    .get(sym as usize)
    .ok_or(DeflateReadError::InvalidDistanceCode(sym))
}
