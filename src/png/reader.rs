use std::borrow::Cow;
use std::fmt;

use log::{debug, warn};
use thiserror::Error;

use super::byte::fmt_hex_dump;
use super::{Chunk, ChunkType, Ihdr, PngInfo, PNG_SIGNATURE};
use crate::config::DecoderConfig;
use crate::deflate::inflate;
use crate::error::{DecodeError, ErrorCategory};
use crate::zlib::ZlibStream;

/// Length, type and CRC fields around each chunk's payload
const CHUNK_OVERHEAD: usize = 12;

#[derive(Error, Debug)]
pub enum PngReadError {
  #[error("PNG signature does not match")]
  BadSignature,
  #[error("Chunk at offset {offset} has a non-alphabetic type {chunk_type}")]
  BadChunkType { offset: usize, chunk_type: ChunkType },
  #[error("Chunk at offset {offset} declares {length} bytes, past the end of the file")]
  TruncatedChunk { offset: usize, length: u32 },
  #[error("First chunk is not IHDR")]
  MissingIHDR,
  #[error("IDAT chunk appears before IHDR")]
  IdatBeforeIhdr,
  #[error("More than one IHDR chunk (second at chunk {0})")]
  DuplicateIHDR(usize),
  #[error("File contains no IDAT chunks")]
  MissingIDAT,
  #[error("IHDR must be 13 bytes, found {0}")]
  BadIhdrLength(u32),
  #[error("Image dimensions {0}x{1} are invalid")]
  InvalidDimensions(u32, u32),
  #[error("Color type {0} is not defined")]
  InvalidColorType(u8),
  #[error("CRC mismatch in {chunk_type} chunk: stored {expected:08x}, computed {actual:08x}")]
  ChunkCrcMismatch {
    chunk_type: ChunkType,
    expected: u32,
    actual: u32,
  },
  #[error("Palette images are not supported")]
  PaletteUnsupported,
  #[error("Greyscale images are not supported")]
  GreyscaleUnsupported,
  #[error("Bit depth {0} is not supported")]
  BitDepthUnsupported(u8),
  #[error("Compression method {0} is not supported")]
  CompressionMethodUnsupported(u8),
  #[error("Filter method {0} is not supported")]
  FilterMethodUnsupported(u8),
  #[error("Interlace method {0} is not supported")]
  InterlaceUnsupported(u8),
  #[error("Image needs {required} bytes of scanline data, limit is {limit}")]
  ImageTooLarge { required: u128, limit: usize },
}

impl PngReadError {
  pub fn category(&self) -> ErrorCategory {
    use PngReadError::*;
    match self {
      PaletteUnsupported
      | GreyscaleUnsupported
      | BitDepthUnsupported(_)
      | CompressionMethodUnsupported(_)
      | FilterMethodUnsupported(_)
      | InterlaceUnsupported(_)
      | ImageTooLarge { .. } => ErrorCategory::Unsupported,
      _ => ErrorCategory::Structural,
    }
  }
}

pub fn validate_signature(data: &[u8]) -> Result<(), PngReadError> {
  if data.len() < PNG_SIGNATURE.len() || data[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
    return Err(PngReadError::BadSignature);
  }
  Ok(())
}

fn read_u32_be(data: &[u8], pos: usize) -> u32 {
  u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/** Walk the chunks that follow the signature until fewer than four bytes
remain. Payloads are recorded as offsets into `data`. */
pub fn walk_chunks(data: &[u8], verify_crc: bool) -> Result<Vec<Chunk>, PngReadError> {
  let mut chunks = Vec::new();
  let mut pos = PNG_SIGNATURE.len();
  let mut seen_iend = false;

  while data.len().saturating_sub(pos) >= 4 {
    let length = read_u32_be(data, pos);
    let truncated = PngReadError::TruncatedChunk {
      offset: pos,
      length,
    };
    if data.len() - pos < 8 {
      return Err(truncated);
    }

    let chunk_type = ChunkType([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
    if !chunk_type.is_valid() {
      return Err(PngReadError::BadChunkType {
        offset: pos,
        chunk_type,
      });
    }

    let end = (length as usize)
      .checked_add(CHUNK_OVERHEAD)
      .and_then(|n| n.checked_add(pos))
      .filter(|&end| end <= data.len())
      .ok_or(truncated)?;

    let chunk = Chunk {
      length,
      chunk_type,
      data_offset: pos + 8,
      crc: read_u32_be(data, end - 4),
    };
    debug!(
      "chunk {} at {}: length {}, crc {:08x}",
      chunk_type, pos, length, chunk.crc
    );
    if seen_iend {
      warn!("chunk {} at {} follows IEND", chunk_type, pos);
    }

    if verify_crc {
      let actual = chunk.compute_crc(data);
      if actual != chunk.crc {
        return Err(PngReadError::ChunkCrcMismatch {
          chunk_type,
          expected: chunk.crc,
          actual,
        });
      }
    }

    seen_iend |= chunk_type == ChunkType::IEND;
    chunks.push(chunk);
    pos = end;
  }

  Ok(chunks)
}

/// A PNG file whose chunk structure has been checked. Borrows the file buffer.
#[derive(Debug, Clone)]
pub struct PngFile<'a> {
  data: &'a [u8],
  chunks: Vec<Chunk>,
  idat_chunks: Vec<usize>,
  ihdr: Ihdr,
}

impl<'a> PngFile<'a> {
  pub fn parse(data: &'a [u8], config: &DecoderConfig) -> Result<Self, PngReadError> {
    validate_signature(data)?;
    let chunks = walk_chunks(data, config.verify_crc)?;

    let first = chunks.first().ok_or(PngReadError::MissingIHDR)?;
    match first.chunk_type {
      ChunkType::IHDR => {}
      ChunkType::IDAT => return Err(PngReadError::IdatBeforeIhdr),
      _ => return Err(PngReadError::MissingIHDR),
    }
    let ihdr = Ihdr::parse(first.data(data))?;

    let mut idat_chunks = Vec::new();
    for (i, chunk) in chunks.iter().enumerate().skip(1) {
      match chunk.chunk_type {
        ChunkType::IHDR => return Err(PngReadError::DuplicateIHDR(i)),
        ChunkType::IDAT => {
          if let Some(&prev) = idat_chunks.last() {
            if prev + 1 != i {
              warn!("IDAT chunk {} is not adjacent to the previous IDAT", i);
            }
          }
          idat_chunks.push(i);
        }
        _ => {}
      }
    }
    if idat_chunks.is_empty() {
      return Err(PngReadError::MissingIDAT);
    }

    debug!(
      "{}x{} image, {} chunks, {} IDAT",
      ihdr.width,
      ihdr.height,
      chunks.len(),
      idat_chunks.len()
    );

    Ok(Self {
      data,
      chunks,
      idat_chunks,
      ihdr,
    })
  }

  pub fn ihdr(&self) -> &Ihdr {
    &self.ihdr
  }

  pub fn chunks(&self) -> &[Chunk] {
    &self.chunks
  }

  /// Indices into `chunks()` of the IDAT chunks, in file order
  pub fn idat_chunks(&self) -> &[usize] {
    &self.idat_chunks
  }

  pub fn chunk_data(&self, chunk: &Chunk) -> &'a [u8] {
    chunk.data(self.data)
  }

  /// The zlib stream carried by the IDAT chunks. A single IDAT is borrowed
  /// from the file buffer, several are concatenated.
  pub fn idat_payload(&self) -> Cow<'a, [u8]> {
    if let [only] = self.idat_chunks[..] {
      return Cow::Borrowed(self.chunk_data(&self.chunks[only]));
    }
    let total = self
      .idat_chunks
      .iter()
      .map(|&i| self.chunks[i].length as usize)
      .sum();
    let mut payload = Vec::with_capacity(total);
    for &i in self.idat_chunks.iter() {
      payload.extend_from_slice(self.chunk_data(&self.chunks[i]));
    }
    Cow::Owned(payload)
  }

  /// Exact decompressed size implied by IHDR, refused if above `limit`
  pub fn expected_data_len(&self, limit: usize) -> Result<usize, PngReadError> {
    let required = self.ihdr.scanline_data_len();
    if required > limit as u128 {
      return Err(PngReadError::ImageTooLarge { required, limit });
    }
    Ok(required as usize)
  }

  pub fn info(&self) -> PngInfo {
    PngInfo {
      ihdr: self.ihdr,
      chunks: self.chunks.clone(),
      idat_chunks: self.idat_chunks.clone(),
      file_size: self.data.len(),
    }
  }

  /// Inflate the IDAT stream into raw (still filtered) scanline bytes
  pub fn decode(&self, config: &DecoderConfig) -> Result<Vec<u8>, DecodeError> {
    self.ihdr.check_supported()?;
    let expected = self.expected_data_len(config.max_output_bytes)?;
    let payload = self.idat_payload();
    let strm = ZlibStream::split(&payload)?;
    let data = inflate(strm.deflate_data, expected)?;
    debug!(
      "inflated {} bytes of IDAT into {} bytes",
      payload.len(),
      data.len()
    );
    Ok(data)
  }
}

impl fmt::Display for PngFile<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.info())?;
    writeln!(f, "IDAT payload:")?;
    fmt_hex_dump(f, &self.idat_payload(), 20)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::png::IHDR_LEN;

  fn chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tag);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
  }

  fn ihdr_bytes(width: u32, height: u32, color_type: u8) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&width.to_be_bytes());
    v.extend_from_slice(&height.to_be_bytes());
    v.extend_from_slice(&[8, color_type, 0, 0, 0]);
    v
  }

  // 2x2 RGB, rows [0, 255,0,0, 0,255,0] and [0, 0,0,255, 255,255,255]
  const ZLIB_2X2: [u8; 18] = [
    0x78, 0xda, 0x63, 0xf8, 0xcf, 0xc0, 0xc0, 0x00, 0xc2, 0x0c, 0xff, 0x81, 0x00, 0x00, 0x1f,
    0xee, 0x05, 0xfb,
  ];

  fn png_2x2(idat_split: usize) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    chunk(&mut out, b"IHDR", &ihdr_bytes(2, 2, 2));
    let (a, b) = ZLIB_2X2.split_at(idat_split);
    chunk(&mut out, b"IDAT", a);
    if !b.is_empty() {
      chunk(&mut out, b"IDAT", b);
    }
    chunk(&mut out, b"IEND", &[]);
    out
  }

  #[test]
  fn signature() {
    assert!(validate_signature(&PNG_SIGNATURE).is_ok());
    assert!(matches!(
      validate_signature(b"\x89PNG\r\n\x1a"),
      Err(PngReadError::BadSignature)
    ));
    assert!(matches!(
      validate_signature(b"GIF89a\x00\x00\x00"),
      Err(PngReadError::BadSignature)
    ));
  }

  #[test]
  fn walks_chunks_by_offset() {
    let data = png_2x2(ZLIB_2X2.len());
    let chunks = walk_chunks(&data, true).unwrap();
    let types: Vec<_> = chunks.iter().map(|c| c.chunk_type).collect();
    assert_eq!(types, vec![ChunkType::IHDR, ChunkType::IDAT, ChunkType::IEND]);
    assert_eq!(chunks[0].data_offset, 16);
    assert_eq!(chunks[0].length, IHDR_LEN);
    assert_eq!(chunks[1].data(&data), &ZLIB_2X2[..]);
    assert_eq!(chunks[2].crc, 0xae426082);
  }

  #[test]
  fn truncated_chunk_length() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&100u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&[0; 20]);
    assert!(matches!(
      walk_chunks(&data, false),
      Err(PngReadError::TruncatedChunk {
        offset: 8,
        length: 100
      })
    ));

    // A length near u32::MAX must not wrap around
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&u32::MAX.to_be_bytes());
    data.extend_from_slice(b"IDAT");
    assert!(matches!(
      walk_chunks(&data, false),
      Err(PngReadError::TruncatedChunk { .. })
    ));
  }

  #[test]
  fn header_cut_short() {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&[0, 0, 0, 0, b'I', b'E']);
    assert!(matches!(
      walk_chunks(&data, false),
      Err(PngReadError::TruncatedChunk { offset: 8, .. })
    ));
  }

  #[test]
  fn few_trailing_bytes_end_the_walk() {
    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"tEXt", b"hi");
    data.extend_from_slice(&[0, 0, 0]);
    assert_eq!(walk_chunks(&data, true).unwrap().len(), 1);
  }

  #[test]
  fn walk_continues_past_iend() {
    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"IEND", &[]);
    chunk(&mut data, b"tEXt", b"late");
    let chunks = walk_chunks(&data, true).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].chunk_type, ChunkType(*b"tEXt"));
  }

  #[test]
  fn bad_chunk_after_iend() {
    // The type tag is checked before the declared length
    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"IEND", &[]);
    data.extend_from_slice(&1000u32.to_be_bytes());
    data.extend_from_slice(b"1_?!");
    assert!(matches!(
      walk_chunks(&data, true),
      Err(PngReadError::BadChunkType { offset: 20, .. })
    ));
  }

  #[test]
  fn bad_chunk_type() {
    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"I_DR", &[]);
    let err = walk_chunks(&data, true).unwrap_err();
    assert!(matches!(err, PngReadError::BadChunkType { offset: 8, .. }));
    assert_eq!(err.category(), ErrorCategory::Structural);
  }

  #[test]
  fn crc_mismatch() {
    let mut data = png_2x2(ZLIB_2X2.len());
    // Flip a bit in the IHDR width
    data[16 + 3] ^= 0x04;
    assert!(matches!(
      walk_chunks(&data, true),
      Err(PngReadError::ChunkCrcMismatch {
        chunk_type: ChunkType::IHDR,
        ..
      })
    ));
    assert!(walk_chunks(&data, false).is_ok());
  }

  #[test]
  fn ihdr_must_come_first() {
    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"tEXt", b"comment");
    chunk(&mut data, b"IHDR", &ihdr_bytes(2, 2, 2));
    let config = DecoderConfig::default();
    assert!(matches!(
      PngFile::parse(&data, &config),
      Err(PngReadError::MissingIHDR)
    ));

    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"IDAT", &ZLIB_2X2);
    chunk(&mut data, b"IHDR", &ihdr_bytes(2, 2, 2));
    assert!(matches!(
      PngFile::parse(&data, &config),
      Err(PngReadError::IdatBeforeIhdr)
    ));

    assert!(matches!(
      PngFile::parse(&PNG_SIGNATURE, &config),
      Err(PngReadError::MissingIHDR)
    ));
  }

  #[test]
  fn duplicate_ihdr_and_missing_idat() {
    let config = DecoderConfig::default();
    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"IHDR", &ihdr_bytes(2, 2, 2));
    chunk(&mut data, b"IHDR", &ihdr_bytes(2, 2, 2));
    assert!(matches!(
      PngFile::parse(&data, &config),
      Err(PngReadError::DuplicateIHDR(1))
    ));

    let mut data = PNG_SIGNATURE.to_vec();
    chunk(&mut data, b"IHDR", &ihdr_bytes(2, 2, 2));
    chunk(&mut data, b"IEND", &[]);
    assert!(matches!(
      PngFile::parse(&data, &config),
      Err(PngReadError::MissingIDAT)
    ));
  }

  #[test]
  fn single_idat_is_borrowed() {
    let data = png_2x2(ZLIB_2X2.len());
    let png = PngFile::parse(&data, &DecoderConfig::default()).unwrap();
    assert_eq!(png.idat_chunks(), &[1]);
    assert!(matches!(png.idat_payload(), Cow::Borrowed(_)));
    assert_eq!(&*png.idat_payload(), &ZLIB_2X2[..]);
  }

  #[test]
  fn split_idat_is_joined() {
    let data = png_2x2(5);
    let png = PngFile::parse(&data, &DecoderConfig::default()).unwrap();
    assert_eq!(png.idat_chunks(), &[1, 2]);
    assert!(matches!(png.idat_payload(), Cow::Owned(_)));
    assert_eq!(&*png.idat_payload(), &ZLIB_2X2[..]);
  }

  #[test]
  fn decode_small_image() {
    let data = png_2x2(7);
    let config = DecoderConfig::default();
    let png = PngFile::parse(&data, &config).unwrap();
    assert_eq!(png.expected_data_len(config.max_output_bytes).unwrap(), 14);
    assert_eq!(
      png.decode(&config).unwrap(),
      vec![0, 255, 0, 0, 0, 255, 0, 0, 0, 0, 255, 255, 255, 255]
    );
  }

  #[test]
  fn image_over_limit() {
    let data = png_2x2(ZLIB_2X2.len());
    let config = DecoderConfig {
      max_output_bytes: 13,
      ..DecoderConfig::default()
    };
    let png = PngFile::parse(&data, &config).unwrap();
    let err = png.decode(&config).unwrap_err();
    assert!(matches!(
      err,
      DecodeError::Png(PngReadError::ImageTooLarge {
        required: 14,
        limit: 13
      })
    ));
    assert_eq!(err.category(), ErrorCategory::Unsupported);
  }

  #[test]
  fn display_lists_chunks() {
    let data = png_2x2(ZLIB_2X2.len());
    let png = PngFile::parse(&data, &DecoderConfig::default()).unwrap();
    let text = png.to_string();
    assert!(text.contains("IHDR"));
    assert!(text.contains("IEND"));
    assert!(text.contains("78 DA 63"));
  }
}
