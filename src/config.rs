use serde::{Deserialize, Serialize};

/// Refuse images whose raw scanline data would exceed this many bytes
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
  /// Check each chunk's CRC-32 against its type and data
  pub verify_crc: bool,
  /// Upper bound on decompressed output, on top of the exact size implied by IHDR
  pub max_output_bytes: usize,
}

impl Default for DecoderConfig {
  fn default() -> Self {
    Self {
      verify_crc: true,
      max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
    }
  }
}

impl DecoderConfig {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_take_defaults() {
    let config = DecoderConfig::from_json(r#"{"verify_crc": false}"#).unwrap();
    assert!(!config.verify_crc);
    assert_eq!(config.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);

    let empty = DecoderConfig::from_json("{}").unwrap();
    assert_eq!(empty, DecoderConfig::default());
  }

  #[test]
  fn bad_json_is_an_error() {
    assert!(DecoderConfig::from_json(r#"{"verify_crc": "yes"}"#).is_err());
  }
}
