use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::deflate::DeflateReadError;
use crate::png::reader::PngReadError;
use crate::zlib::ZlibReadError;

/// Why a decode failed, at the level a caller would explain it to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
  /// The file is not a conforming PNG
  Structural,
  /// A valid PNG that uses a feature this decoder does not handle
  Unsupported,
  /// The compressed payload breaks the rules of zlib or DEFLATE
  Corruption,
}

impl fmt::Display for ErrorCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Structural => "malformed PNG",
      Self::Unsupported => "unsupported PNG",
      Self::Corruption => "corrupt image data",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error(transparent)]
  Png(#[from] PngReadError),
  #[error(transparent)]
  Zlib(#[from] ZlibReadError),
  #[error(transparent)]
  Deflate(#[from] DeflateReadError),
}

impl DecodeError {
  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::Png(e) => e.category(),
      Self::Zlib(e) => e.category(),
      Self::Deflate(e) => e.category(),
    }
  }
}
