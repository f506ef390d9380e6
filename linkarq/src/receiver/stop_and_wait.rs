//! Stop-and-Wait receiver.
//!
//! Every frame with a valid FCS is delivered under a monotonic counter
//! and acknowledged; the acknowledgement sequence is fixed at zero
//! because the sender does not inspect it. Corrupted frames are dropped
//! silently and recovered by the sender's timeout.

use std::io::Write;

use log::debug;

use super::{FrameIntake, ReceiverSummary};
use crate::error::Result;
use crate::fcs::FcsScheme;
use crate::frame::{Acknowledgment, Address};
use crate::source::DeliverySink;
use crate::transport::Link;

/// Stop-and-Wait receiver session.
pub struct StopAndWaitReceiver<L: Link, W: Write> {
    intake: FrameIntake<L>,
    sink: DeliverySink<W>,
    counter: u64,
    payload_bytes: Option<usize>,
}

impl<L: Link, W: Write> StopAndWaitReceiver<L, W> {
    /// Creates the session.
    pub fn new(link: L, scheme: FcsScheme, local: Address, sink: W) -> Self {
        Self {
            intake: FrameIntake::new(link, scheme, local),
            sink: DeliverySink::new(sink),
            counter: 0,
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
            if !frame.verify(self.intake.scheme()) {
                debug!("frame {} rejected (FCS mismatch)", frame.seq_no);
                continue;
            }
            self.payload_bytes.get_or_insert(frame.length as usize);
            self.sink.deliver(self.counter, &frame.payload)?;
            self.intake.send_ack(frame.src, Acknowledgment::Positive(0))?;
            self.counter += 1;
        }
        Ok(())
    }
}
