//! Receiver state machines.
//!
//! Each receiver reconstructs data frames from the link, rejects the
//! session on a destination-address mismatch, validates the FCS under
//! the configured scheme, and delivers payloads to its sink in strictly
//! ascending sequence order, each exactly once. Acknowledgement frames
//! flow back with the local station as source.

pub mod go_back_n;
pub mod selective_repeat;
pub mod stop_and_wait;

pub use go_back_n::GoBackNReceiver;
pub use selective_repeat::SelectiveRepeatReceiver;
pub use stop_and_wait::StopAndWaitReceiver;

use std::io::Write;

use crate::config::Protocol;
use crate::error::{Error, Result};
use crate::fcs::FcsScheme;
use crate::frame::{AckFrame, Acknowledgment, Address, DataFrame};
use crate::transport::{self, Link};

/// Summary of one receive session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiverSummary {
    /// Frames delivered to the sink.
    pub delivered: u64,

    /// Payload size fixed from the first accepted frame's header.
    pub payload_bytes: Option<usize>,
}

/// Runs one complete receive session under the chosen protocol.
pub fn run_session<L, W>(
    protocol: Protocol,
    link: L,
    sink: W,
    scheme: FcsScheme,
    local: Address,
    window: usize,
) -> Result<ReceiverSummary>
where
    L: Link,
    W: Write,
{
    match protocol {
        Protocol::StopAndWait => StopAndWaitReceiver::new(link, scheme, local, sink).run(),
        Protocol::GoBackN => GoBackNReceiver::new(link, scheme, local, sink).run(),
        Protocol::SelectiveRepeat => {
            SelectiveRepeatReceiver::new(link, scheme, local, sink, window).run()
        }
    }
}

/// Frame intake shared by the three receivers: exact-size reads,
/// address screening, and acknowledgement emission.
pub(crate) struct FrameIntake<L: Link> {
    link: L,
    scheme: FcsScheme,
    local: Address,
}

impl<L: Link> FrameIntake<L> {
    pub(crate) fn new(link: L, scheme: FcsScheme, local: Address) -> Self {
        Self { link, scheme, local }
    }

    pub(crate) const fn scheme(&self) -> FcsScheme {
        self.scheme
    }

    /// Reads the next data frame. Returns `None` once the peer is gone;
    /// a frame addressed to another station ends the session with an
    /// error.
    pub(crate) fn next_frame(&mut self) -> Result<Option<DataFrame>> {
        match transport::read_data_frame(&mut self.link) {
            Ok(frame) if frame.dst != self.local => Err(Error::AddressMismatch {
                expected: self.local,
                actual: frame.dst,
            }),
            Ok(frame) => Ok(Some(frame)),
            Err(err) if err.is_disconnect() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Sends an acknowledgement back to `dst`.
    pub(crate) fn send_ack(&mut self, dst: Address, ack: Acknowledgment) -> Result<()> {
        transport::write_ack_frame(&mut self.link, &AckFrame { src: self.local, dst, ack })
    }

    /// Half-closes the link at session end.
    pub(crate) fn close(&mut self) {
        let _ = self.link.shutdown();
    }
}
