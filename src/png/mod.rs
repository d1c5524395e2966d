pub mod byte;
pub mod reader;

use std::fmt;
use std::ops::Range;

use std::convert::TryInto;

use bitflags::bitflags;
use crc32fast::Hasher;
use serde::{Serialize, Serializer};

use reader::PngReadError;

/* Structure from the PNG specification

   +---+---+---+---+---+---+---+---+
   | 89| P | N | G | CR| LF|^Z | LF|   signature
   +---+---+---+---+---+---+---+---+

followed by any number of chunks:

   +---+---+---+---+---+---+---+---+=================+---+---+---+---+
   |    LENGTH     |      TYPE     |...LENGTH bytes..|      CRC      |
   +---+---+---+---+---+---+---+---+=================+---+---+---+---+

IHDR must come first and carries 13 bytes:

   +---+---+---+---+---+---+---+---+---+---+---+---+---+
   |     WIDTH     |    HEIGHT     |BD |CT |CM |FM |IM |
   +---+---+---+---+---+---+---+---+---+---+---+---+---+
*/

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
pub const IHDR_LEN: u32 = 13;

bitflags! {
    /** The bitfields of the IHDR color type byte */
    #[derive(Default)]
    pub struct ColorType: u8 {
        const PALETTE = 0b1 << 0;
        const COLOR   = 0b1 << 1;
        const ALPHA   = 0b1 << 2;
    }
}

/// A four-letter chunk tag such as `IHDR`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
  pub const IHDR: ChunkType = ChunkType(*b"IHDR");
  pub const IDAT: ChunkType = ChunkType(*b"IDAT");
  pub const IEND: ChunkType = ChunkType(*b"IEND");

  /// Chunk tags are restricted to ASCII letters
  pub fn is_valid(&self) -> bool {
    self.0.iter().all(|b| b.is_ascii_alphabetic())
  }

  /// Critical chunks have an uppercase first letter
  pub fn is_critical(&self) -> bool {
    self.0[0].is_ascii_uppercase()
  }
}

impl fmt::Display for ChunkType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in self.0.iter() {
      if b.is_ascii_graphic() {
        write!(f, "{}", *b as char)?;
      } else {
        write!(f, "\\x{:02x}", b)?;
      }
    }
    Ok(())
  }
}

impl fmt::Debug for ChunkType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ChunkType({})", self)
  }
}

impl Serialize for ChunkType {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// One chunk of the file. The payload is not copied: `data_offset` indexes into
/// the buffer the chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
  pub length: u32,
  pub chunk_type: ChunkType,
  pub data_offset: usize,
  pub crc: u32,
}

impl Chunk {
  pub fn data_range(&self) -> Range<usize> {
    self.data_offset..self.data_offset + self.length as usize
  }

  /// The payload of this chunk within `buffer`, the buffer it was parsed from
  pub fn data<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
    &buffer[self.data_range()]
  }

  /// CRC-32 over the chunk type and data, as stored in the chunk trailer
  pub fn compute_crc(&self, buffer: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&self.chunk_type.0);
    hasher.update(self.data(buffer));
    hasher.finalize()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ihdr {
  pub width: u32,
  pub height: u32,
  pub bit_depth: u8,
  pub color_type: u8,
  pub compression_method: u8,
  pub filter_method: u8,
  pub interlace_method: u8,
}

impl Ihdr {
  /// Unpack the IHDR payload. Multi-byte fields are big-endian.
  pub fn parse(data: &[u8]) -> Result<Self, PngReadError> {
    let data: &[u8; IHDR_LEN as usize] = data
      .try_into()
      .map_err(|_| PngReadError::BadIhdrLength(data.len() as u32))?;
    let ihdr = Self {
      width: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
      height: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
      bit_depth: data[8],
      color_type: data[9],
      compression_method: data[10],
      filter_method: data[11],
      interlace_method: data[12],
    };
    if ihdr.width == 0 || ihdr.height == 0 {
      return Err(PngReadError::InvalidDimensions(ihdr.width, ihdr.height));
    }
    Ok(ihdr)
  }

  /// Accept only 8-bit, non-interlaced truecolor with or without alpha
  pub fn check_supported(&self) -> Result<(), PngReadError> {
    let flags =
      ColorType::from_bits(self.color_type).ok_or(PngReadError::InvalidColorType(self.color_type))?;
    if flags.contains(ColorType::PALETTE) {
      return Err(PngReadError::PaletteUnsupported);
    }
    if !flags.contains(ColorType::COLOR) {
      return Err(PngReadError::GreyscaleUnsupported);
    }
    if self.bit_depth != 8 {
      return Err(PngReadError::BitDepthUnsupported(self.bit_depth));
    }
    if self.compression_method != 0 {
      return Err(PngReadError::CompressionMethodUnsupported(
        self.compression_method,
      ));
    }
    if self.filter_method != 0 {
      return Err(PngReadError::FilterMethodUnsupported(self.filter_method));
    }
    if self.interlace_method != 0 {
      return Err(PngReadError::InterlaceUnsupported(self.interlace_method));
    }
    Ok(())
  }

  pub fn color_flags(&self) -> ColorType {
    ColorType::from_bits_truncate(self.color_type)
  }

  /// Samples per pixel for the truecolor types this decoder handles
  pub fn channels(&self) -> usize {
    if self.color_flags().contains(ColorType::ALPHA) {
      4
    } else {
      3
    }
  }

  /// Bytes of filtered scanline data the image decompresses to: every row is
  /// one filter-type byte followed by `width * channels` samples.
  pub fn scanline_data_len(&self) -> u128 {
    let row = 1 + self.width as u128 * self.channels() as u128;
    row * self.height as u128
  }

  pub fn fmt_header<W: fmt::Write>(&self, f: &mut W) -> fmt::Result {
    write!(
      f,
      r#"IHDR:
   +---------+---------+----+----+----+----+----+
   |  WIDTH  | HEIGHT  | BD | CT | CM | FM | IM |
   +---------+---------+----+----+----+----+----+
    {:>8}  {:>8}  {:>3}  {:>3}  {:>3}  {:>3}  {:>3}
"#,
      self.width,
      self.height,
      self.bit_depth,
      self.color_type,
      self.compression_method,
      self.filter_method,
      self.interlace_method
    )
  }
}

impl fmt::Display for Ihdr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.fmt_header(f)
  }
}

/// A summary of a parsed file, for display and JSON dumps
#[derive(Debug, Clone, Serialize)]
pub struct PngInfo {
  pub ihdr: Ihdr,
  pub chunks: Vec<Chunk>,
  pub idat_chunks: Vec<usize>,
  pub file_size: usize,
}

impl PngInfo {
  pub fn fmt_chunks<W: fmt::Write>(&self, f: &mut W) -> fmt::Result {
    writeln!(f, "Chunks:")?;
    for (i, chunk) in self.chunks.iter().enumerate() {
      writeln!(
        f,
        "  {:>3}: {} length {:>8} at {:>8} crc {:08x}{}",
        i,
        chunk.chunk_type,
        chunk.length,
        chunk.data_offset,
        chunk.crc,
        if chunk.chunk_type.is_critical() {
          ""
        } else {
          " (ancillary)"
        }
      )?;
    }
    Ok(())
  }
}

impl fmt::Display for PngInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "PNG file of {} bytes", self.file_size)?;
    self.ihdr.fmt_header(f)?;
    self.fmt_chunks(f)
  }
}
