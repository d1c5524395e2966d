use std::fmt;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// A byte that prints as two uppercase hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngByte(pub u8);

impl PngByte {
  pub fn upper_nibble_hex(self) -> char {
    HEX_DIGITS[(self.0 >> 4) as usize] as char
  }

  pub fn lower_nibble_hex(self) -> char {
    HEX_DIGITS[(self.0 & 0x0f) as usize] as char
  }
}

impl From<u8> for PngByte {
  fn from(b: u8) -> Self {
    PngByte(b)
  }
}

impl fmt::Display for PngByte {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.upper_nibble_hex(), self.lower_nibble_hex())
  }
}

/// Write `data` as space-separated hex bytes, `width` to a line
pub fn fmt_hex_dump<W: fmt::Write>(f: &mut W, data: &[u8], width: usize) -> fmt::Result {
  let width = width.max(1);
  for row in data.chunks(width) {
    let mut first = true;
    for &b in row {
      if !first {
        f.write_char(' ')?;
      }
      write!(f, "{}", PngByte(b))?;
      first = false;
    }
    writeln!(f)?;
  }
  Ok(())
}
