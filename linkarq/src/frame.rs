//! Frame definitions and wire serialization.
//!
//! Two frame types cross the link: data frames carrying a bit-string
//! payload guarded by a 32-bit FCS, and fixed-size acknowledgement
//! frames flowing back to the sender.
//!
//! # Data frame format (big-endian)
//!
//! ```text
//! 0                   1
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Source Address        |
//! |          (6 bytes)            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       Destination Address     |
//! |          (6 bytes)            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Length (2)     | Seq (1) |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Payload (Length bytes) ...  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          FCS (4 bytes)        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Payload bits are packed MSB-first, eight per byte; the total frame
//! size is `19 + Length`. An acknowledgement frame is 13 bytes: source
//! and destination addresses followed by one sequence byte. Stop-and-Wait
//! and Go-Back-N read that byte unsigned; Selective Repeat reads it
//! signed, with negative values `-n-1` carrying a NACK for sequence `n`.

use std::fmt;

use crate::bits::BitBuf;
use crate::error::{Error, Result};
use crate::fcs::{FcsScheme, FCS_BITS};

/// Size of a station address in bytes.
pub const ADDR_SIZE: usize = 6;

/// Size of the data frame header in bytes.
pub const DATA_HEADER_SIZE: usize = 15;

/// Size of the serialized FCS in bytes.
pub const FCS_SIZE: usize = FCS_BITS / 8;

/// Size of an acknowledgement frame in bytes.
pub const ACK_FRAME_SIZE: usize = 13;

/// Upper bound on the payload a frame header may advertise.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// A MAC-style station address, compared by equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDR_SIZE]);

impl Address {
    /// Creates an address from its six octets.
    pub const fn new(octets: [u8; ADDR_SIZE]) -> Self {
        Self(octets)
    }

    /// Returns the raw octets.
    pub const fn octets(self) -> [u8; ADDR_SIZE] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A data frame in flight between sender and receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Originating station.
    pub src: Address,

    /// Destination station.
    pub dst: Address,

    /// Payload size in bytes, as carried on the wire.
    pub length: u16,

    /// Sequence number modulo 256.
    pub seq_no: u8,

    /// Payload bits, always a multiple of eight.
    pub payload: BitBuf,

    /// Frame check sequence over the payload.
    pub fcs: u32,
}

impl DataFrame {
    /// Builds a frame for `payload`, deriving the length field and the
    /// FCS under `scheme`.
    pub fn new(
        src: Address,
        dst: Address,
        seq_no: u8,
        payload: BitBuf,
        scheme: FcsScheme,
    ) -> Result<Self> {
        if payload.is_empty() || payload.len() % 8 != 0 {
            return Err(Error::InvalidArgument(format!(
                "payload must be a positive multiple of 8 bits, got {}",
                payload.len()
            )));
        }
        let bytes = payload.len() / 8;
        if bytes > MAX_PAYLOAD_BYTES {
            return Err(Error::PayloadTooLarge { bytes });
        }
        let fcs = scheme.generate(&payload);
        Ok(Self { src, dst, length: bytes as u16, seq_no, payload, fcs })
    }

    /// Returns true if the FCS is consistent with the payload.
    pub fn verify(&self, scheme: FcsScheme) -> bool {
        scheme.validate(&self.payload, self.fcs)
    }

    /// Total serialized size in bytes.
    pub fn wire_size(&self) -> usize {
        DATA_HEADER_SIZE + self.length as usize + FCS_SIZE
    }

    /// Serializes the frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_size());
        buf.extend_from_slice(&self.src.octets());
        buf.extend_from_slice(&self.dst.octets());
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.push(self.seq_no);
        buf.extend_from_slice(self.payload.as_bytes());
        buf.extend_from_slice(&self.fcs.to_be_bytes());
        buf
    }

    /// Deserializes a frame from a complete buffer.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATA_HEADER_SIZE + FCS_SIZE {
            return Err(Error::MalformedFrame("data frame shorter than header"));
        }
        let mut src = [0u8; ADDR_SIZE];
        let mut dst = [0u8; ADDR_SIZE];
        src.copy_from_slice(&buf[0..6]);
        dst.copy_from_slice(&buf[6..12]);
        let length = u16::from_be_bytes([buf[12], buf[13]]);
        let seq_no = buf[14];

        if buf.len() != DATA_HEADER_SIZE + length as usize + FCS_SIZE {
            return Err(Error::MalformedFrame("length field disagrees with frame size"));
        }
        let payload_end = DATA_HEADER_SIZE + length as usize;
        let payload = BitBuf::from_bytes(&buf[DATA_HEADER_SIZE..payload_end]);
        let mut fcs_bytes = [0u8; FCS_SIZE];
        fcs_bytes.copy_from_slice(&buf[payload_end..]);

        Ok(Self {
            src: Address::new(src),
            dst: Address::new(dst),
            length,
            seq_no,
            payload,
            fcs: u32::from_be_bytes(fcs_bytes),
        })
    }
}

/// The sequence byte of an acknowledgement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    /// Positive acknowledgement of a sequence number.
    Positive(u8),

    /// Negative acknowledgement requesting retransmission of a
    /// sequence number; only values below 128 are encodable.
    Negative(u8),
}

/// How the acknowledgement sequence byte is interpreted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqEncoding {
    /// The full byte is a positive sequence number.
    Unsigned,

    /// Two's-complement: negative values `-n-1` encode a NACK for `n`.
    Signed,
}

impl Acknowledgment {
    fn to_byte(self) -> Result<u8> {
        match self {
            Self::Positive(seq) => Ok(seq),
            // -(n + 1) in two's complement is the bitwise complement of n.
            Self::Negative(seq) if seq < 0x80 => Ok(!seq),
            Self::Negative(seq) => Err(Error::InvalidArgument(format!(
                "NACK sequence {seq} does not fit the signed encoding"
            ))),
        }
    }

    fn from_byte(byte: u8, encoding: SeqEncoding) -> Self {
        match encoding {
            SeqEncoding::Unsigned => Self::Positive(byte),
            SeqEncoding::Signed if byte < 0x80 => Self::Positive(byte),
            SeqEncoding::Signed => Self::Negative(!byte),
        }
    }
}

/// An acknowledgement frame flowing from receiver to sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame {
    /// Originating station.
    pub src: Address,

    /// Destination station.
    pub dst: Address,

    /// The acknowledgement carried by the sequence byte.
    pub ack: Acknowledgment,
}

impl AckFrame {
    /// Serializes the frame into its fixed 13 bytes.
    pub fn to_bytes(&self) -> Result<[u8; ACK_FRAME_SIZE]> {
        let mut buf = [0u8; ACK_FRAME_SIZE];
        buf[0..6].copy_from_slice(&self.src.octets());
        buf[6..12].copy_from_slice(&self.dst.octets());
        buf[12] = self.ack.to_byte()?;
        Ok(buf)
    }

    /// Deserializes an acknowledgement, interpreting the sequence byte
    /// under `encoding`.
    pub fn from_bytes(buf: &[u8], encoding: SeqEncoding) -> Result<Self> {
        if buf.len() != ACK_FRAME_SIZE {
            return Err(Error::MalformedFrame("acknowledgement frame must be 13 bytes"));
        }
        let mut src = [0u8; ADDR_SIZE];
        let mut dst = [0u8; ADDR_SIZE];
        src.copy_from_slice(&buf[0..6]);
        dst.copy_from_slice(&buf[6..12]);
        Ok(Self {
            src: Address::new(src),
            dst: Address::new(dst),
            ack: Acknowledgment::from_byte(buf[12], encoding),
        })
    }
}
