/*! A decoder for the DEFLATE format as specified in RFC 1951
(https://tools.ietf.org/html/rfc1951).

Decompression works directly on a byte slice: the whole compressed payload is
in memory, and the caller knows how many bytes it expands to. The output
buffer doubles as the LZ77 window. */

pub mod codepoints;
pub mod decoder;
pub mod deflate_header;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::huff_tree::HuffmanTable;

pub use decoder::{inflate, DeflateReadError, Inflater};

/// The BTYPE field of a block header
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum BlockType {
  Stored = 0b00,
  Fixed = 0b01,
  Dynamic = 0b10,
  Reserved = 0b11,
}

/// The literal/length and distance tables a compressed block is decoded with
#[derive(Debug, Clone)]
pub struct CodeTables {
  pub lenlit: HuffmanTable,
  pub dist: HuffmanTable,
}
