//! Sender state machines.
//!
//! Three interchangeable senders drive a transfer: Stop-and-Wait,
//! Go-Back-N, and Selective Repeat. All of them read fixed-size chunks
//! from a [`ChunkSource`], frame each chunk with an FCS, pass the frame
//! through the [`LossyChannel`], and write whatever survives to the
//! [`Link`]; they differ in how many frames may be in flight and how
//! losses are recovered.

pub mod go_back_n;
pub mod selective_repeat;
pub mod stop_and_wait;

pub use go_back_n::GoBackNSender;
pub use selective_repeat::SelectiveRepeatSender;
pub use stop_and_wait::StopAndWaitSender;

use std::io::{Read, Seek};

use crate::bits::BitBuf;
use crate::channel::LossyChannel;
use crate::config::{Protocol, SessionConfig};
use crate::error::Result;
use crate::frame::DataFrame;
use crate::journal::{Journal, JournalStats};
use crate::source::ChunkSource;
use crate::transport::Link;

/// Runs one complete sender session under the chosen protocol,
/// returning the journal counters once every frame is acknowledged.
pub fn run_session<L, R>(
    protocol: Protocol,
    link: L,
    source: ChunkSource<R>,
    channel: LossyChannel,
    journal: Journal,
    config: SessionConfig,
) -> Result<JournalStats>
where
    L: Link + 'static,
    R: Read + Seek,
{
    match protocol {
        Protocol::StopAndWait => {
            StopAndWaitSender::new(link, source, channel, journal, config).run()
        }
        Protocol::GoBackN => GoBackNSender::new(link, source, channel, journal, config).run(),
        Protocol::SelectiveRepeat => {
            SelectiveRepeatSender::new(link, source, channel, journal, config).run()
        }
    }
}

/// Frames one chunk: the wire carries the sequence number modulo 256.
pub(crate) fn build_frame(
    config: &SessionConfig,
    seq: u64,
    payload: BitBuf,
) -> Result<DataFrame> {
    DataFrame::new(
        config.local_addr,
        config.peer_addr,
        (seq % 256) as u8,
        payload,
        config.scheme,
    )
}
