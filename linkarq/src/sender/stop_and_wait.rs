//! Stop-and-Wait sender.
//!
//! One frame in flight at a time. The frame is pushed through the
//! channel; a channel drop is retried locally after a fixed back-off
//! without touching the transport, while a delivered frame starts an
//! ACK wait. Any acknowledgement advances the transfer; its sequence
//! number is not inspected. A timeout retransmits the same frame.

use std::io::{Read, Seek};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;

use log::{debug, info};

use super::build_frame;
use crate::channel::LossyChannel;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::{DataFrame, SeqEncoding};
use crate::journal::{Journal, JournalStats};
use crate::source::ChunkSource;
use crate::transport::{self, Link};

/// Stop-and-Wait sender session.
pub struct StopAndWaitSender<L: Link, R: Read + Seek> {
    link: L,
    source: ChunkSource<R>,
    channel: LossyChannel,
    journal: Journal,
    config: SessionConfig,
}

impl<L: Link + 'static, R: Read + Seek> StopAndWaitSender<L, R> {
    /// Creates the session.
    pub fn new(
        link: L,
        source: ChunkSource<R>,
        channel: LossyChannel,
        journal: Journal,
        config: SessionConfig,
    ) -> Self {
        Self { link, source, channel, journal, config }
    }

    /// Transfers the whole input, returning the journal counters.
    pub fn run(mut self) -> Result<JournalStats> {
        let reader_link = self.link.try_clone()?;
        let (ack_tx, ack_rx) = mpsc::channel();
        let reader = thread::spawn(move || ack_reader(reader_link, ack_tx));

        let outcome = self.transfer(&ack_rx);

        let _ = self.link.shutdown();
        drop(ack_rx);
        let _ = reader.join();

        outcome?;
        Ok(self.journal.stats())
    }

    fn transfer(&mut self, acks: &Receiver<()>) -> Result<()> {
        let mut seq = 0u64;
        while let Some(payload) = self.source.read_chunk(seq)? {
            let frame = build_frame(&self.config, seq, payload)?;
            self.await_delivery(seq, &frame, acks)?;
            seq += 1;
        }
        info!("input exhausted after {seq} frames");
        Ok(())
    }

    /// Retries one frame until an acknowledgement arrives.
    fn await_delivery(&mut self, seq: u64, frame: &DataFrame, acks: &Receiver<()>) -> Result<()> {
        let mut first = true;
        loop {
            let attempt = self.channel.transmit(frame);
            if first {
                self.journal.sent(seq);
                first = false;
            } else {
                self.journal.resent(seq);
            }

            let Some(wire) = attempt else {
                debug!("frame {seq} lost in the channel, retrying after back-off");
                thread::sleep(self.config.backoff);
                continue;
            };

            transport::write_data_frame(&mut self.link, &wire)?;
            debug!("frame {seq} on the wire, waiting for ACK");
            match acks.recv_timeout(self.config.timeout) {
                Ok(()) => {
                    self.journal.ack(seq);
                    return Ok(());
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!("ACK timeout for frame {seq}, retransmitting");
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::LinkClosed),
            }
        }
    }
}

fn ack_reader<L: Link>(mut link: L, acks: Sender<()>) {
    loop {
        match transport::read_ack_frame(&mut link, SeqEncoding::Unsigned) {
            Ok(_) => {
                if acks.send(()).is_err() {
                    return;
                }
            }
            Err(_) => return,
        }
    }
}
