//! KLV local-set reader: tag walk, BER lengths, field validation helpers.

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::{KlvError, PayloadStatus};

/// One decoded local frame: tag byte plus its value slice.
#[derive(Debug)]
pub(super) struct LocalFrame<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Iterates the local frames of one KLV buffer.
#[derive(Debug)]
pub(super) struct FrameWalker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameWalker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn next_frame(&mut self) -> Result<Option<LocalFrame<'a>>, KlvError> {
        if self.pos == self.buf.len() {
            return Ok(None);
        }
        let tag = self.buf[self.pos];
        self.pos += 1;
        let length = self.read_ber()?;
        let remaining = self.buf.len() - self.pos;
        if length > remaining {
            return Err(KlvError::LengthOverrun { length, remaining });
        }
        let value = &self.buf[self.pos..self.pos + length];
        self.pos += length;
        Ok(Some(LocalFrame { tag, value }))
    }

    fn read_ber(&mut self) -> Result<usize, KlvError> {
        let first = *self.buf.get(self.pos).ok_or(KlvError::TruncatedLength)?;
        self.pos += 1;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 || self.pos + count > self.buf.len() {
            return Err(KlvError::TruncatedLength);
        }
        let mut length = 0usize;
        for _ in 0..count {
            length = (length << 8) | self.buf[self.pos] as usize;
            self.pos += 1;
        }
        Ok(length)
    }
}

/// Read one fixed-width field and validate it through `check`, reporting
/// failures with the field's semantic name and the offending value.
pub(super) fn read_checked<T>(
    bs: &mut BsIoSliceReader<'_>,
    bits: u32,
    payload: &'static str,
    field: &'static str,
    check: impl FnOnce(u64) -> Result<T, PayloadStatus>,
) -> Result<T, KlvError> {
    let value: u64 = bs.get_n(bits)?;
    check(value).map_err(|status| KlvError::Field {
        payload,
        field,
        value,
        status,
    })
}

/// Validator for fields where zero is the reserved "unset" code.
pub(super) fn nonzero(value: u64) -> Result<u64, PayloadStatus> {
    if value == 0 {
        Err(PayloadStatus::ValueReserved)
    } else {
        Ok(value)
    }
}
