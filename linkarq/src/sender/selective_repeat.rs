//! Selective Repeat sender.
//!
//! Every outstanding frame carries its own retransmit deadline, held in
//! a sorted map guarded by one mutex. A producer fills the window, a
//! deadline scanner sleeps until the earliest deadline and resends only
//! the expired frames, and an ACK listener multiplexes positive and
//! negative acknowledgements: a positive ack retires every frame up to
//! the acked sequence, a NACK triggers an immediate resend of that one
//! frame.

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::build_frame;
use crate::channel::LossyChannel;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::frame::{Acknowledgment, DataFrame, SeqEncoding};
use crate::journal::{Journal, JournalStats};
use crate::source::ChunkSource;
use crate::timer::lock;
use crate::transport::{self, Link};

/// Acknowledgements carry the sequence modulo 128 so NACKs fit the
/// signed byte; the window is far smaller, so resolution is unambiguous.
const ACK_MODULUS: u64 = 128;

struct Pending {
    frame: DataFrame,
    deadline: Instant,
}

struct Shared<L: Link> {
    link: L,
    channel: LossyChannel,
    journal: Journal,
    /// Outstanding frames by sequence number.
    window: BTreeMap<u64, Pending>,
    done: bool,
}

struct SessionState<L: Link> {
    shared: Mutex<Shared<L>>,
    progress: Condvar,
}

impl<L: Link> SessionState<L> {
    /// Resends one outstanding frame and pushes its deadline out.
    /// Returns false if the link is gone.
    fn resend(shared: &mut Shared<L>, seq: u64, timeout: Duration) -> bool {
        let Shared { link, channel, journal, window, .. } = shared;
        let Some(pending) = window.get_mut(&seq) else {
            return true;
        };
        if let Some(wire) = channel.transmit(&pending.frame) {
            if transport::write_data_frame(link, &wire).is_err() {
                return false;
            }
        }
        journal.resent(seq);
        pending.deadline = Instant::now() + timeout;
        true
    }
}

/// Selective Repeat sender session.
pub struct SelectiveRepeatSender<L: Link, R: Read + Seek> {
    source: ChunkSource<R>,
    state: Arc<SessionState<L>>,
    config: SessionConfig,
}

impl<L: Link + 'static, R: Read + Seek> SelectiveRepeatSender<L, R> {
    /// Creates the session.
    pub fn new(
        link: L,
        source: ChunkSource<R>,
        channel: LossyChannel,
        journal: Journal,
        config: SessionConfig,
    ) -> Self {
        let state = Arc::new(SessionState {
            shared: Mutex::new(Shared {
                link,
                channel,
                journal,
                window: BTreeMap::new(),
                done: false,
            }),
            progress: Condvar::new(),
        });
        Self { source, state, config }
    }

    /// Transfers the whole input, returning the journal counters.
    pub fn run(mut self) -> Result<JournalStats> {
        let reader_link = lock(&self.state.shared).link.try_clone()?;
        let timeout = self.config.timeout;

        let scanner = {
            let state = Arc::clone(&self.state);
            thread::spawn(move || deadline_scanner(&state, timeout))
        };
        let listener = {
            let state = Arc::clone(&self.state);
            thread::spawn(move || ack_listener(reader_link, &state, timeout))
        };

        let outcome = self.produce();

        {
            let mut shared = lock(&self.state.shared);
            shared.done = true;
            let _ = shared.link.shutdown();
        }
        self.state.progress.notify_all();
        let _ = scanner.join();
        let _ = listener.join();

        let stats = lock(&self.state.shared).journal.stats();
        outcome?;
        Ok(stats)
    }

    fn produce(&mut self) -> Result<()> {
        let window = self.config.window;
        let mut seq = 0u64;
        loop {
            {
                let mut shared = lock(&self.state.shared);
                while shared.window.len() >= window && !shared.done {
                    shared = self
                        .state
                        .progress
                        .wait(shared)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                if shared.done {
                    return Err(Error::LinkClosed);
                }
            }

            let Some(payload) = self.source.read_chunk(seq)? else {
                break;
            };
            let frame = build_frame(&self.config, seq, payload)?;

            let mut shared = lock(&self.state.shared);
            if shared.done {
                return Err(Error::LinkClosed);
            }
            if let Some(wire) = shared.channel.transmit(&frame) {
                transport::write_data_frame(&mut shared.link, &wire)?;
            }
            shared.journal.sent(seq);
            shared
                .window
                .insert(seq, Pending { frame, deadline: Instant::now() + self.config.timeout });
            self.state.progress.notify_all();
            seq += 1;
        }
        info!("input exhausted after {seq} frames, draining window");

        let mut shared = lock(&self.state.shared);
        while !shared.window.is_empty() && !shared.done {
            shared = self
                .state
                .progress
                .wait(shared)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if shared.done { Err(Error::LinkClosed) } else { Ok(()) }
    }
}

/// Sleeps until the earliest per-frame deadline and resends whatever
/// has expired.
fn deadline_scanner<L: Link>(state: &SessionState<L>, timeout: Duration) {
    loop {
        let mut shared = lock(&state.shared);
        if shared.done {
            return;
        }

        let now = Instant::now();
        let next_deadline = shared.window.values().map(|p| p.deadline).min();
        match next_deadline {
            None => {
                drop(
                    state
                        .progress
                        .wait(shared)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
            Some(deadline) if deadline > now => {
                drop(
                    state
                        .progress
                        .wait_timeout(shared, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
            Some(_) => {
                let expired: Vec<u64> = shared
                    .window
                    .iter()
                    .filter(|(_, pending)| pending.deadline <= now)
                    .map(|(&seq, _)| seq)
                    .collect();
                for seq in expired {
                    debug!("per-frame timeout for {seq}");
                    if !SessionState::resend(&mut shared, seq, timeout) {
                        shared.done = true;
                        state.progress.notify_all();
                        return;
                    }
                }
            }
        }
    }
}

fn ack_listener<L: Link>(mut link: L, state: &SessionState<L>, timeout: Duration) {
    loop {
        let ack = match transport::read_ack_frame(&mut link, SeqEncoding::Signed) {
            Ok(ack) => ack,
            Err(_) => return,
        };

        let mut shared = lock(&state.shared);
        if shared.done {
            return;
        }
        match ack.ack {
            Acknowledgment::Positive(byte) => {
                let Some(target) = resolve(&shared, byte) else {
                    debug!("ACK {byte} matches nothing outstanding");
                    continue;
                };
                shared.journal.ack(target);
                // Positive acks are cumulative: everything up to the
                // acked sequence is retired.
                let keep = shared.window.split_off(&(target + 1));
                shared.window = keep;
                state.progress.notify_all();
            }
            Acknowledgment::Negative(byte) => {
                let Some(target) = resolve(&shared, byte) else {
                    debug!("NACK {byte} matches nothing outstanding");
                    continue;
                };
                shared.journal.nack(target);
                if !SessionState::resend(&mut shared, target, timeout) {
                    shared.done = true;
                    state.progress.notify_all();
                    return;
                }
                state.progress.notify_all();
            }
        }
    }
}

/// Maps a 7-bit wire sequence back to the outstanding frame it names.
fn resolve<L: Link>(shared: &Shared<L>, byte: u8) -> Option<u64> {
    shared
        .window
        .keys()
        .copied()
        .find(|seq| (seq % ACK_MODULUS) as u8 == byte)
}
