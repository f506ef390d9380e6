//! Payload source and delivery sink.
//!
//! The input is a seekable stream of ASCII `'0'`/`'1'` characters read
//! in fixed-size chunks; chunk `i` starts at character
//! `i * payload_bytes * 8`. The output sink receives one line per
//! delivered frame, `"<seq>. <payload>"`.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::bits::BitBuf;
use crate::error::{Error, Result};
use crate::frame::MAX_PAYLOAD_BYTES;

/// Fixed-size chunk reader over a bit-character stream.
pub struct ChunkSource<R: Read + Seek> {
    inner: R,
    payload_bytes: usize,
}

impl<R: Read + Seek> ChunkSource<R> {
    /// Creates a source producing chunks of `payload_bytes * 8` bits.
    pub fn new(inner: R, payload_bytes: usize) -> Result<Self> {
        if payload_bytes == 0 || payload_bytes > MAX_PAYLOAD_BYTES {
            return Err(Error::InvalidArgument(format!(
                "payload size must be within 1..={MAX_PAYLOAD_BYTES} bytes, got {payload_bytes}"
            )));
        }
        Ok(Self { inner, payload_bytes })
    }

    /// Configured chunk size in bits.
    pub const fn chunk_bits(&self) -> usize {
        self.payload_bytes * 8
    }

    /// Reads chunk `index`, returning `None` at end of input. The final
    /// chunk may be shorter but must still be a whole number of bytes.
    pub fn read_chunk(&mut self, index: u64) -> Result<Option<BitBuf>> {
        let chunk_bits = self.chunk_bits();
        self.inner.seek(SeekFrom::Start(index * chunk_bits as u64))?;

        let mut raw = vec![0u8; chunk_bits];
        let mut filled = 0;
        while filled < raw.len() {
            let n = self.inner.read(&mut raw[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled % 8 != 0 {
            return Err(Error::InvalidArgument(format!(
                "input ends with a ragged chunk of {filled} bits"
            )));
        }

        let text = std::str::from_utf8(&raw[..filled]).map_err(|_| {
            Error::InvalidArgument("input is not an ASCII bit stream".into())
        })?;
        BitBuf::parse(text).map(Some)
    }
}

/// Ordered line sink for delivered payloads.
pub struct DeliverySink<W: Write> {
    out: W,
    delivered: u64,
}

impl<W: Write> DeliverySink<W> {
    /// Wraps a writer.
    pub fn new(out: W) -> Self {
        Self { out, delivered: 0 }
    }

    /// Appends one delivered payload line.
    pub fn deliver(&mut self, seq: u64, payload: &BitBuf) -> Result<()> {
        writeln!(self.out, "{seq}. {payload}")?;
        self.out.flush()?;
        self.delivered += 1;
        Ok(())
    }

    /// Number of lines delivered so far.
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }
}
