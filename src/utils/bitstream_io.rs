//! Bitstream I/O utilities for KLV payload packing.
//!
//! Thin wrappers over `bitstream_io` readers and writers. All PMD payload
//! fields are packed most-significant-bit-first, so both sides run big
//! endian. The reader tracks the payload length so that short-buffer
//! conditions surface as `UnexpectedEof` with a bit position instead of a
//! bare I/O error.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter, UnsignedInteger};

pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

impl<R: io::Read + io::Seek> std::fmt::Debug for BitstreamIoReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitstreamIoReader")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    /// Read `len` whole bytes into `buf`, starting at the current bit position.
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.get_n(8)?;
        }
        Ok(())
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        let pos = self.bs.position_in_bits()?;
        Ok(self.len.saturating_sub(pos))
    }

    #[inline(always)]
    pub fn is_empty(&mut self) -> io::Result<bool> {
        self.available().map(|n| n == 0)
    }

    #[inline(always)]
    pub fn seek(&mut self, offset: i64) -> io::Result<u64> {
        if (offset < 0 && self.position()? as i64 + offset >= 0)
            || (offset >= 0 && self.available()? as i64 >= offset)
        {
            return self.bs.seek_bits(SeekFrom::Current(offset));
        }

        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "seek({}): out of bounds bits at {}",
                offset,
                self.position()?
            ),
        ))
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        Self::new(io::Cursor::new(buf), len)
    }
}

/// Accumulates bit-packed payload data before it is committed to an output
/// buffer. Payloads are small, so building them out-of-place keeps the
/// "no room, retry next buffer" path trivial: nothing has touched the
/// destination yet.
pub struct BsIoVecWriter {
    bs: BitWriter<Vec<u8>, BigEndian>,
    bits: u64,
}

impl std::fmt::Debug for BsIoVecWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BsIoVecWriter")
            .field("bits", &self.bits)
            .finish_non_exhaustive()
    }
}

impl Default for BsIoVecWriter {
    fn default() -> Self {
        Self {
            bs: BitWriter::new(Vec::new()),
            bits: 0,
        }
    }
}

impl BsIoVecWriter {
    #[inline(always)]
    pub fn put(&mut self, bit: bool) -> io::Result<()> {
        self.bits += 1;
        self.bs.write_bit(bit)
    }

    #[inline(always)]
    pub fn put_n<I: UnsignedInteger>(&mut self, n: u32, value: I) -> io::Result<()> {
        self.bits += n as u64;
        self.bs.write_unsigned_var(n, value)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &b in bytes {
            self.put_n(8, b)?;
        }
        Ok(())
    }

    /// Bits written so far, including any not yet flushed to a full byte.
    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.bits
    }

    pub fn byte_align(&mut self) -> io::Result<()> {
        self.bits = (self.bits + 7) & !7;
        self.bs.byte_align()
    }

    /// Zero-pads to a byte boundary and returns the packed bytes.
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        self.bs.byte_align()?;
        Ok(self.bs.into_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::{BsIoSliceReader, BsIoVecWriter};
    use anyhow::Result;

    #[test]
    fn msb_first_round_trip() -> Result<()> {
        let mut w = BsIoVecWriter::default();
        w.put_n(4, 0u8)?;
        w.put_n(4, 0u8)?;
        w.put_n(4, 6u8)?;
        w.put_n(5, 2u8)?;
        w.put_n(3, 3u8)?;
        let bytes = w.finish()?;
        assert_eq!(bytes, vec![0x00, 0x61, 0x30]);

        let mut r = BsIoSliceReader::from_slice(&bytes);
        assert_eq!(r.get_n::<u8>(4)?, 0);
        assert_eq!(r.get_n::<u8>(4)?, 0);
        assert_eq!(r.get_n::<u8>(4)?, 6);
        assert_eq!(r.get_n::<u8>(5)?, 2);
        assert_eq!(r.get_n::<u8>(3)?, 3);
        Ok(())
    }

    #[test]
    fn eof_is_reported_with_position() {
        let bytes = [0xFFu8];
        let mut r = BsIoSliceReader::from_slice(&bytes);
        assert!(r.get_n::<u16>(12).is_err());
    }
}
