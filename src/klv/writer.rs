//! KLV local-set writer.
//!
//! Wraps one caller-supplied byte buffer. Payload values are built
//! out-of-place (see [`crate::utils::bitstream_io::BsIoVecWriter`]) and
//! committed here with their local tag and a BER length, so a payload that
//! does not fit leaves the buffer untouched.

use crate::utils::errors::KlvError;

/// Space reserved per payload for the local tag byte plus the largest BER
/// length form a payload can need (0x82, two length bytes).
pub(super) const LOCAL_OVERHEAD: usize = 4;

/// Outcome of one payload-kind write pass.
///
/// `No` is backpressure, not an error: records remain that did not fit in
/// this buffer, and the caller may continue into a fresh buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Yes,
    No,
}

#[derive(Debug)]
pub struct KlvWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> KlvWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn space(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes available to a payload value after framing overhead.
    pub fn value_space(&self) -> usize {
        self.space().saturating_sub(LOCAL_OVERHEAD)
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Append one framed payload: local tag, BER length, value bytes.
    /// Callers size the value against [`value_space`](Self::value_space)
    /// first, so a failure here means the buffer cannot frame anything.
    pub fn commit_local(&mut self, tag: u8, value: &[u8]) -> Result<(), KlvError> {
        let need = 1 + ber_length_size(value.len()) + value.len();
        if self.space() < need {
            return Err(KlvError::BufferTooSmall);
        }
        self.buf[self.pos] = tag;
        self.pos += 1;
        self.put_ber(value.len());
        self.buf[self.pos..self.pos + value.len()].copy_from_slice(value);
        self.pos += value.len();
        Ok(())
    }

    fn put_ber(&mut self, len: usize) {
        if len < 128 {
            self.buf[self.pos] = len as u8;
            self.pos += 1;
        } else if len < 0x100 {
            self.buf[self.pos] = 0x81;
            self.buf[self.pos + 1] = len as u8;
            self.pos += 2;
        } else {
            debug_assert!(len < 0x10000);
            self.buf[self.pos] = 0x82;
            self.buf[self.pos + 1] = (len >> 8) as u8;
            self.buf[self.pos + 2] = len as u8;
            self.pos += 3;
        }
    }
}

/// Size of the BER encoding for one payload length.
pub(super) fn ber_length_size(len: usize) -> usize {
    if len < 128 {
        1
    } else if len < 0x100 {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_short_and_long_forms() -> anyhow::Result<()> {
        let mut buf = [0u8; 600];
        let mut w = KlvWriter::new(&mut buf);
        w.commit_local(0x04, &[1, 0])?;
        assert_eq!(w.position(), 4);

        let big = vec![0xAA; 200];
        w.commit_local(0x05, &big)?;
        let pos = w.position();
        assert_eq!(pos, 4 + 1 + 2 + 200);
        assert_eq!(&buf[..4], &[0x04, 0x02, 1, 0]);
        assert_eq!(&buf[4..7], &[0x05, 0x81, 200]);
        Ok(())
    }

    #[test]
    fn commit_rejects_overflow() {
        let mut buf = [0u8; 4];
        let mut w = KlvWriter::new(&mut buf);
        assert!(matches!(
            w.commit_local(0x05, &[0; 8]),
            Err(KlvError::BufferTooSmall)
        ));
        assert!(w.is_empty());
    }
}
