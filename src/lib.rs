/*! Decode a PNG file down to its raw, decompressed scanline data.

The pipeline checks the signature, walks the chunks, joins the IDAT payload,
validates the zlib header and inflates the DEFLATE stream. Scanline filters are
not reversed: each row of the output still starts with its filter-type byte. */

pub mod bitreader;
pub mod config;
pub mod deflate;
pub mod error;
pub mod huff_tree;
pub mod logging;
pub mod png;
pub mod zlib;

#[cfg(test)]
mod test_util;

pub use config::DecoderConfig;
pub use error::{DecodeError, ErrorCategory};
pub use png::reader::{PngFile, PngReadError};
pub use png::Ihdr;

/// Decode `bytes` with the default configuration
pub fn decode_png(bytes: &[u8]) -> Result<(Ihdr, Vec<u8>), DecodeError> {
  decode_png_with_config(bytes, &DecoderConfig::default())
}

pub fn decode_png_with_config(
  bytes: &[u8],
  config: &DecoderConfig,
) -> Result<(Ihdr, Vec<u8>), DecodeError> {
  let png = PngFile::parse(bytes, config)?;
  let data = png.decode(config)?;
  Ok((*png.ihdr(), data))
}
