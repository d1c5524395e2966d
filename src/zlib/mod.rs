/*! The zlib wrapper (RFC 1950) around the DEFLATE data carried in IDAT chunks.

   +---+---+=====================+---+---+---+---+
   |CMF|FLG|...compressed data...|    ADLER32    |
   +---+---+=====================+---+---+---+---+

CMF holds the compression method (bits 0-3, must be 8) and CINFO (bits 4-7,
log2 of the window size minus 8). FLG holds FCHECK (bits 0-4), FDICT (bit 5)
and FLEVEL (bits 6-7). CMF * 256 + FLG must be a multiple of 31.
*/

use std::convert::TryFrom;

use bitflags::bitflags;
use log::{debug, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorCategory;

pub const DEFLATE_METHOD: u8 = 8;
pub const MAX_CINFO: u8 = 7;
pub const HEADER_LEN: usize = 2;
pub const ADLER32_LEN: usize = 4;

bitflags! {
    /** The single flag bit of FLG in RFC 1950. FCHECK and FLEVEL are value
    fields and are read separately. */
    #[derive(Default)]
    pub struct ZlibFlags: u8 {
        const FDICT = 0b1 << 5;
    }
}

/// FLEVEL: how hard the compressor tried. Informational only.
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone, Serialize)]
#[repr(u8)]
pub enum CompressionLevel {
  Fastest = 0,
  Fast = 1,
  Default = 2,
  Maximum = 3,
}

#[derive(Error, Debug)]
pub enum ZlibReadError {
  #[error("zlib stream is only {0} bytes long")]
  Truncated(usize),
  #[error("zlib compression method invalid. Expected 8, got {0}")]
  UnsupportedZlibMethod(u8),
  #[error("zlib window size 2^({0} + 8) exceeds 32K")]
  InvalidWindowSize(u8),
  #[error("zlib FCHECK failed: CMF = {:02x}, FLG = {:02x}", .0, .1)]
  BadFcheck(u8, u8),
  #[error("zlib stream requires a preset dictionary, which is not supported")]
  PresetDictionaryUnsupported,
}

impl ZlibReadError {
  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::UnsupportedZlibMethod(_) | Self::PresetDictionaryUnsupported => {
        ErrorCategory::Unsupported
      }
      Self::Truncated(_) | Self::InvalidWindowSize(_) | Self::BadFcheck(_, _) => {
        ErrorCategory::Corruption
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZlibHeader {
  pub cmf: u8,
  pub flg: u8,
  /// LZ77 window size in bytes
  pub window_size: u32,
  pub level: CompressionLevel,
}

impl ZlibHeader {
  pub fn parse(cmf: u8, flg: u8) -> Result<Self, ZlibReadError> {
    let method = cmf & 0x0f;
    if method != DEFLATE_METHOD {
      return Err(ZlibReadError::UnsupportedZlibMethod(method));
    }
    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
      return Err(ZlibReadError::BadFcheck(cmf, flg));
    }
    let cinfo = cmf >> 4;
    if cinfo > MAX_CINFO {
      return Err(ZlibReadError::InvalidWindowSize(cinfo));
    }
    if ZlibFlags::from_bits_truncate(flg).contains(ZlibFlags::FDICT) {
      return Err(ZlibReadError::PresetDictionaryUnsupported);
    }
    // Two bits can only hold 0-3, all of which are levels
    let level = CompressionLevel::try_from(flg >> 6).unwrap_or(CompressionLevel::Default);

    Ok(Self {
      cmf,
      flg,
      window_size: 1 << (cinfo as u32 + 8),
      level,
    })
  }
}

/// A zlib stream split into its parts. The DEFLATE data borrows from the input.
#[derive(Debug, Clone)]
pub struct ZlibStream<'a> {
  pub header: ZlibHeader,
  pub deflate_data: &'a [u8],
  /// The ADLER32 trailer, if present. Not verified.
  pub adler32: Option<u32>,
}

impl<'a> ZlibStream<'a> {
  /// Validate the two header bytes and strip them and the ADLER32 trailer
  pub fn split(data: &'a [u8]) -> Result<Self, ZlibReadError> {
    if data.len() < HEADER_LEN {
      return Err(ZlibReadError::Truncated(data.len()));
    }
    let header = ZlibHeader::parse(data[0], data[1])?;
    debug!(
      "zlib header: window = {}, level = {:?}",
      header.window_size, header.level
    );

    let body = &data[HEADER_LEN..];
    let (deflate_data, adler32) = if body.len() >= ADLER32_LEN {
      let (deflate_data, trailer) = body.split_at(body.len() - ADLER32_LEN);
      let adler32 = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
      (deflate_data, Some(adler32))
    } else {
      warn!("zlib stream has no room for an ADLER32 trailer");
      (body, None)
    };

    Ok(Self {
      header,
      deflate_data,
      adler32,
    })
  }
}
