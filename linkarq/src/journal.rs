//! Per-session action journal.
//!
//! Senders keep an append-only text record of every protocol action,
//! one line per event: `"<seq>. Sent"`, `"<seq>. Resent"`,
//! `"ACK <seq> received"`, `"NACK <seq> received"`. Running counters are
//! kept alongside so tests and session summaries need not re-parse the
//! file.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::warn;

use crate::error::Result;

/// Counters accumulated over one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JournalStats {
    /// First transmissions.
    pub sent: u64,

    /// Retransmissions.
    pub resent: u64,

    /// Positive acknowledgements observed.
    pub acks: u64,

    /// Negative acknowledgements observed.
    pub nacks: u64,
}

impl JournalStats {
    /// Total channel attempts, first sends plus retries.
    pub const fn attempts(&self) -> u64 {
        self.sent + self.resent
    }
}

/// Append-only action log for a single session.
pub struct Journal {
    out: Option<Box<dyn Write + Send>>,
    stats: JournalStats,
}

impl Journal {
    /// Journals into an arbitrary writer.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Some(out), stats: JournalStats::default() }
    }

    /// Creates (truncating) the journal file at `path`.
    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Box::new(File::create(path)?)))
    }

    /// A journal that only keeps counters.
    pub fn disabled() -> Self {
        Self { out: None, stats: JournalStats::default() }
    }

    /// Records the first transmission of a frame.
    pub fn sent(&mut self, seq: u64) {
        self.stats.sent += 1;
        self.record(format_args!("{seq}. Sent"));
    }

    /// Records a retransmission.
    pub fn resent(&mut self, seq: u64) {
        self.stats.resent += 1;
        self.record(format_args!("{seq}. Resent"));
    }

    /// Records a positive acknowledgement.
    pub fn ack(&mut self, seq: u64) {
        self.stats.acks += 1;
        self.record(format_args!("ACK {seq} received"));
    }

    /// Records a negative acknowledgement.
    pub fn nack(&mut self, seq: u64) {
        self.stats.nacks += 1;
        self.record(format_args!("NACK {seq} received"));
    }

    /// Returns the counters accumulated so far.
    pub const fn stats(&self) -> JournalStats {
        self.stats
    }

    fn record(&mut self, line: fmt::Arguments<'_>) {
        if let Some(out) = self.out.as_mut() {
            if writeln!(out, "{line}").and_then(|()| out.flush()).is_err() {
                warn!("journal write failed, dropping record {line}");
            }
        }
    }
}
