//! Go-Back-N receiver.
//!
//! Accepts only the next in-order sequence number. An accepted frame is
//! delivered and acknowledged cumulatively; anything else, out of order
//! or corrupted, is dropped and answered with a duplicate cumulative
//! acknowledgement of the last accepted frame so the sender can resync.

use std::io::Write;

use log::debug;

use super::{FrameIntake, ReceiverSummary};
use crate::error::Result;
use crate::fcs::FcsScheme;
use crate::frame::{Acknowledgment, Address};
use crate::source::DeliverySink;
use crate::transport::Link;

/// Go-Back-N receiver session.
pub struct GoBackNReceiver<L: Link, W: Write> {
    intake: FrameIntake<L>,
    sink: DeliverySink<W>,
    /// Next in-order sequence number.
    expected: u64,
    payload_bytes: Option<usize>,
}

impl<L: Link, W: Write> GoBackNReceiver<L, W> {
    /// Creates the session.
    pub fn new(link: L, scheme: FcsScheme, local: Address, sink: W) -> Self {
        Self {
            intake: FrameIntake::new(link, scheme, local),
            sink: DeliverySink::new(sink),
            expected: 0,
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
            if valid && frame.seq_no == (self.expected % 256) as u8 {
                self.payload_bytes.get_or_insert(frame.length as usize);
                self.sink.deliver(self.expected, &frame.payload)?;
                self.intake
                    .send_ack(frame.src, Acknowledgment::Positive((self.expected % 256) as u8))?;
                self.expected += 1;
                continue;
            }

            if valid {
                debug!("frame {} out of order, expected {}", frame.seq_no, self.expected);
            } else {
                debug!("frame {} rejected (FCS mismatch)", frame.seq_no);
            }
            // Duplicate cumulative ack; nothing has been accepted yet
            // before the first frame, so there is nothing to ack.
            if self.expected > 0 {
                self.intake.send_ack(
                    frame.src,
                    Acknowledgment::Positive(((self.expected - 1) % 256) as u8),
                )?;
            }
        }
        Ok(())
    }
}
