//! ISO 639 language codes as carried by presentation payloads.
//!
//! The wire packs three 5-bit characters per code: `a`..`z` map to 1..26,
//! 0 is NUL padding for two-letter codes.

use crate::utils::errors::ModelError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LangCode([u8; 3]);

impl LangCode {
    /// Parse a two- or three-letter ASCII code; case-insensitive.
    pub fn new(code: &str) -> Result<Self, ModelError> {
        let bytes = code.as_bytes();
        if !(2..=3).contains(&bytes.len()) || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(ModelError::OutOfRange {
                what: "language code length",
                value: bytes.len() as f64,
                min: 2.0,
                max: 3.0,
            });
        }
        let mut chars = [0u8; 3];
        for (dst, src) in chars.iter_mut().zip(bytes) {
            *dst = src.to_ascii_lowercase();
        }
        Ok(Self(chars))
    }

    pub(crate) fn from_chars(chars: [u8; 3]) -> Self {
        Self(chars)
    }

    pub fn chars(&self) -> [u8; 3] {
        self.0
    }

    /// Encode one character as its 5-bit wire code.
    pub fn encode_char(c: u8) -> u8 {
        if c == 0 { 0 } else { c - b'a' + 1 }
    }

    /// Decode a 5-bit wire code; 27..=31 are reserved, checked by the reader.
    pub fn decode_char(code: u8) -> u8 {
        if code == 0 { 0 } else { code + b'a' - 1 }
    }
}

impl std::fmt::Display for LangCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &c in self.0.iter().filter(|&&c| c != 0) {
            write!(f, "{}", c as char)?;
        }
        Ok(())
    }
}
