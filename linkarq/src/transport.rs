//! Transport abstraction over an ordered byte stream.
//!
//! The ARQ machinery only needs four operations from the underlying
//! medium: write a frame's bytes, read an exact number of bytes, clone
//! a handle for a reader thread, and shut the outbound direction down.
//! `TcpLink` provides them over a connected socket; `MemLink` is an
//! in-process duplex used by the test suite.
//!
//! Frames are recovered with exact-sized reads driven by the data frame
//! header: 15 header bytes first, then `length + 4` payload and FCS
//! bytes. Acknowledgements are a fixed 13 bytes. This keeps framing
//! intact even when the stream coalesces several frames into one
//! segment.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, Result};
use crate::frame::{
    AckFrame, DataFrame, SeqEncoding, ACK_FRAME_SIZE, DATA_HEADER_SIZE, FCS_SIZE,
    MAX_PAYLOAD_BYTES,
};
use crate::timer::lock;

/// An ordered, reliable byte link between the two endpoints.
pub trait Link: Send {
    /// Writes a complete frame to the peer.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Reads exactly `buf.len()` bytes from the peer.
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Creates a second handle to the same link, typically for a
    /// dedicated reader thread.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;

    /// Half-closes the link: no more writes from this side. The peer
    /// observes end-of-stream once buffered bytes are drained.
    fn shutdown(&mut self) -> Result<()>;
}

/// A [`Link`] over a connected TCP stream.
pub struct TcpLink {
    stream: TcpStream,
}

impl TcpLink {
    /// Wraps a connected stream. Nagle's algorithm is disabled so small
    /// frames and acks are not delayed behind each other.
    pub fn new(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self { stream }
    }
}

impl Link for TcpLink {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(Self { stream: self.stream.try_clone()? })
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Write) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// One direction of an in-memory duplex.
struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    closed: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(PipeState::default()), readable: Condvar::new() })
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(Error::LinkClosed);
        }
        state.bytes.extend(bytes);
        self.readable.notify_all();
        Ok(())
    }

    fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        let mut state = lock(&self.state);
        loop {
            if state.bytes.len() >= buf.len() {
                for slot in buf.iter_mut() {
                    *slot = state.bytes.pop_front().unwrap_or(0);
                }
                return Ok(());
            }
            if state.closed {
                return Err(Error::LinkClosed);
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        self.readable.notify_all();
    }
}

/// An in-process [`Link`]; see [`memory_pair`].
#[derive(Clone)]
pub struct MemLink {
    outbound: Arc<Pipe>,
    inbound: Arc<Pipe>,
}

/// Creates a connected pair of in-memory links. Bytes written on one
/// handle become readable on the other; reads block until enough bytes
/// arrive or the writing side shuts down.
pub fn memory_pair() -> (MemLink, MemLink) {
    let forward = Pipe::new();
    let backward = Pipe::new();
    (
        MemLink { outbound: Arc::clone(&forward), inbound: Arc::clone(&backward) },
        MemLink { outbound: backward, inbound: forward },
    )
}

impl Link for MemLink {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.outbound.write(frame)
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inbound.read_exact(buf)
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.outbound.close();
        Ok(())
    }
}

/// Writes a data frame to the link.
pub fn write_data_frame<L: Link>(link: &mut L, frame: &DataFrame) -> Result<()> {
    link.send(&frame.to_bytes())
}

/// Reads one data frame, sized by its own header.
pub fn read_data_frame<L: Link>(link: &mut L) -> Result<DataFrame> {
    let mut header = [0u8; DATA_HEADER_SIZE];
    link.recv_exact(&mut header)?;

    let length = u16::from_be_bytes([header[12], header[13]]) as usize;
    if length > MAX_PAYLOAD_BYTES {
        return Err(Error::PayloadTooLarge { bytes: length });
    }

    let mut frame = Vec::with_capacity(DATA_HEADER_SIZE + length + FCS_SIZE);
    frame.extend_from_slice(&header);
    frame.resize(DATA_HEADER_SIZE + length + FCS_SIZE, 0);
    link.recv_exact(&mut frame[DATA_HEADER_SIZE..])?;

    DataFrame::from_bytes(&frame)
}

/// Writes an acknowledgement frame to the link.
pub fn write_ack_frame<L: Link>(link: &mut L, frame: &AckFrame) -> Result<()> {
    link.send(&frame.to_bytes()?)
}

/// Reads one acknowledgement frame.
pub fn read_ack_frame<L: Link>(link: &mut L, encoding: SeqEncoding) -> Result<AckFrame> {
    let mut buf = [0u8; ACK_FRAME_SIZE];
    link.recv_exact(&mut buf)?;
    AckFrame::from_bytes(&buf, encoding)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::bits::BitBuf;
    use crate::config::{DEFAULT_RECEIVER_ADDRESS, DEFAULT_SENDER_ADDRESS};
    use crate::fcs::FcsScheme;
    use crate::frame::Acknowledgment;

    #[test]
    fn memory_pair_moves_bytes_both_ways() {
        let (mut a, mut b) = memory_pair();
        a.send(b"ping").unwrap();
        b.send(b"pong").unwrap();

        let mut buf = [0u8; 4];
        b.recv_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        a.recv_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn shutdown_drains_before_reporting_closed() {
        let (mut a, mut b) = memory_pair();
        a.send(b"tail").unwrap();
        a.shutdown().unwrap();

        let mut buf = [0u8; 4];
        b.recv_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"tail");
        assert!(b.recv_exact(&mut [0u8; 1]).is_err());
    }

    #[test]
    fn recv_blocks_until_bytes_arrive() {
        let (mut a, mut b) = memory_pair();
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 2];
            b.recv_exact(&mut buf).map(|_| buf)
        });
        a.send(&[0xAB]).unwrap();
        a.send(&[0xCD]).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), [0xAB, 0xCD]);
    }

    #[test]
    fn data_frames_survive_coalescing() {
        let (mut a, mut b) = memory_pair();
        let first = DataFrame::new(
            DEFAULT_SENDER_ADDRESS,
            DEFAULT_RECEIVER_ADDRESS,
            0,
            BitBuf::from_bytes(&[0x11, 0x22]),
            FcsScheme::Crc32,
        )
        .unwrap();
        let second = DataFrame::new(
            DEFAULT_SENDER_ADDRESS,
            DEFAULT_RECEIVER_ADDRESS,
            1,
            BitBuf::from_bytes(&[0x33]),
            FcsScheme::Crc32,
        )
        .unwrap();

        // Both frames land in the stream back to back.
        let mut bytes = first.to_bytes();
        bytes.extend(second.to_bytes());
        a.send(&bytes).unwrap();

        assert_eq!(read_data_frame(&mut b).unwrap(), first);
        assert_eq!(read_data_frame(&mut b).unwrap(), second);
    }

    #[test]
    fn ack_frames_round_trip_over_the_link() {
        let (mut a, mut b) = memory_pair();
        let ack = AckFrame {
            src: DEFAULT_RECEIVER_ADDRESS,
            dst: DEFAULT_SENDER_ADDRESS,
            ack: Acknowledgment::Negative(2),
        };
        write_ack_frame(&mut a, &ack).unwrap();
        assert_eq!(read_ack_frame(&mut b, SeqEncoding::Signed).unwrap(), ack);
    }

    #[test]
    fn oversized_length_field_is_rejected() {
        let (mut a, mut b) = memory_pair();
        let mut header = [0u8; DATA_HEADER_SIZE];
        header[12] = 0xFF;
        header[13] = 0xFF;
        a.send(&header).unwrap();
        assert!(matches!(
            read_data_frame(&mut b),
            Err(Error::PayloadTooLarge { .. })
        ));
    }
}
