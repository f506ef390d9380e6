//! Selective Repeat receiver.
//!
//! Out-of-order frames within the window are buffered at offset
//! `(seq - expected) mod W` instead of discarded. The in-order frame is
//! acknowledged and the contiguous run at the front of the buffer is
//! flushed to the sink; gaps below an out-of-order arrival are answered
//! with NACKs so the sender can resend exactly the missing frames.
//! Acknowledgements carry the sequence modulo 128 to fit the signed
//! NACK encoding.

use std::collections::VecDeque;
use std::io::Write;

use log::{debug, warn};

use super::{FrameIntake, ReceiverSummary};
use crate::error::Result;
use crate::fcs::FcsScheme;
use crate::frame::{Acknowledgment, Address, DataFrame};
use crate::source::DeliverySink;
use crate::transport::Link;

const ACK_MODULUS: u64 = 128;

/// Selective Repeat receiver session.
pub struct SelectiveRepeatReceiver<L: Link, W: Write> {
    intake: FrameIntake<L>,
    sink: DeliverySink<W>,
    /// Reorder buffer of `window` slots; slot 0 is `expected`.
    buffer: VecDeque<Option<DataFrame>>,
    /// Next in-order sequence number.
    expected: u64,
    window: usize,
    payload_bytes: Option<usize>,
}

impl<L: Link, W: Write> SelectiveRepeatReceiver<L, W> {
    /// Creates the session with a reorder buffer of `window` slots.
    pub fn new(link: L, scheme: FcsScheme, local: Address, sink: W, window: usize) -> Self {
        let window = window.max(1);
        Self {
            intake: FrameIntake::new(link, scheme, local),
            sink: DeliverySink::new(sink),
            buffer: VecDeque::from(vec![None; window]),
            expected: 0,
            window,
            payload_bytes: None,
        }
    }

    /// Receives until the peer closes the link.
    pub fn run(mut self) -> Result<ReceiverSummary> {
        let outcome = self.receive_all();
        self.intake.close();
        outcome?;
        Ok(ReceiverSummary {
            delivered: self.sink.delivered(),
            payload_bytes: self.payload_bytes,
        })
    }

    fn receive_all(&mut self) -> Result<()> {
        while let Some(frame) = self.intake.next_frame()? {
            let valid = frame.verify(self.intake.scheme());
            let offset = frame.seq_no.wrapping_sub((self.expected % 256) as u8) as usize;

            if offset == 0 {
                if valid {
                    self.intake.send_ack(
                        frame.src,
                        Acknowledgment::Positive((self.expected % ACK_MODULUS) as u8),
                    )?;
                    self.payload_bytes.get_or_insert(frame.length as usize);
                    self.buffer[0] = Some(frame);
                    self.flush()?;
                } else {
                    debug!("frame {} rejected (FCS mismatch)", frame.seq_no);
                    self.nack(frame.src, self.expected)?;
                }
            } else if offset < self.window {
                let src = frame.src;
                let arrived = self.expected + offset as u64;
                // Chase the gaps below this arrival.
                for gap in 0..offset {
                    if self.buffer[gap].is_none() {
                        self.nack(src, self.expected + gap as u64)?;
                    }
                }
                if self.buffer[offset].is_none() {
                    if valid {
                        debug!("frame {arrived} buffered out of order");
                        self.buffer[offset] = Some(frame);
                    } else {
                        debug!("frame {arrived} rejected (FCS mismatch)");
                        self.nack(src, arrived)?;
                    }
                }
            } else if offset >= 128 {
                debug!("duplicate frame {}", frame.seq_no);
                if self.expected > 0 {
                    self.intake.send_ack(
                        frame.src,
                        Acknowledgment::Positive(((self.expected - 1) % ACK_MODULUS) as u8),
                    )?;
                }
            } else {
                warn!(
                    "frame {} beyond the receive window (expected {}), ignored",
                    frame.seq_no, self.expected
                );
            }
        }
        Ok(())
    }

    /// Delivers the contiguous run at the front of the buffer.
    fn flush(&mut self) -> Result<()> {
        while matches!(self.buffer.front(), Some(Some(_))) {
            if let Some(Some(frame)) = self.buffer.pop_front() {
                self.buffer.push_back(None);
                self.sink.deliver(self.expected, &frame.payload)?;
                self.expected += 1;
            }
        }
        Ok(())
    }

    fn nack(&mut self, dst: Address, seq: u64) -> Result<()> {
        self.intake
            .send_ack(dst, Acknowledgment::Negative((seq % ACK_MODULUS) as u8))
    }
}
