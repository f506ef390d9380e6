//! Go-Back-N sender.
//!
//! A sliding window `[base, next)` of at most `W` unacknowledged frames
//! with cumulative acknowledgements and a single retransmit timer. The
//! window state lives behind one mutex shared by three parties: the
//! producer filling the window, the ACK listener advancing `base`, and
//! the timer callback retransmitting the whole window on expiry.

use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info};

use super::build_frame;
use crate::channel::LossyChannel;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::frame::{Acknowledgment, DataFrame, SeqEncoding};
use crate::journal::{Journal, JournalStats};
use crate::source::ChunkSource;
use crate::timer::{lock, OneShotTimer};
use crate::transport::{self, Link};

struct Shared<L: Link> {
    link: L,
    channel: LossyChannel,
    journal: Journal,
    /// Oldest unacknowledged sequence number.
    base: u64,
    /// Next sequence number to assign.
    next: u64,
    /// Unacknowledged frames, front at `base`.
    buffer: VecDeque<DataFrame>,
    eof: bool,
    done: bool,
}

struct SessionState<L: Link> {
    shared: Mutex<Shared<L>>,
    window_open: Condvar,
}

/// Go-Back-N sender session.
pub struct GoBackNSender<L: Link, R: Read + Seek> {
    source: ChunkSource<R>,
    state: Arc<SessionState<L>>,
    config: SessionConfig,
}

impl<L: Link + 'static, R: Read + Seek> GoBackNSender<L, R> {
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
                base: 0,
                next: 0,
                buffer: VecDeque::new(),
                eof: false,
                done: false,
            }),
            window_open: Condvar::new(),
        });
        Self { source, state, config }
    }

    /// Transfers the whole input, returning the journal counters.
    pub fn run(mut self) -> Result<JournalStats> {
        let reader_link = lock(&self.state.shared).link.try_clone()?;
        let timeout = self.config.timeout;

        let timer = {
            let state = Arc::clone(&self.state);
            Arc::new(OneShotTimer::spawn(move || retransmit_window(&state, timeout)))
        };
        let listener = {
            let state = Arc::clone(&self.state);
            let timer = Arc::clone(&timer);
            thread::spawn(move || ack_listener(reader_link, &state, &timer, timeout))
        };

        let outcome = self.fill_window(&timer);

        timer.cancel();
        {
            let mut shared = lock(&self.state.shared);
            shared.done = true;
            let _ = shared.link.shutdown();
        }
        self.state.window_open.notify_all();
        let _ = listener.join();
        drop(timer);

        let stats = lock(&self.state.shared).journal.stats();
        outcome?;
        Ok(stats)
    }

    fn fill_window(&mut self, timer: &OneShotTimer) -> Result<()> {
        let window = self.config.window as u64;
        loop {
            let mut shared = lock(&self.state.shared);
            while !shared.eof && shared.next < shared.base + window {
                let seq = shared.next;
                match self.source.read_chunk(seq)? {
                    None => {
                        shared.eof = true;
                        info!("input exhausted at frame {seq}");
                    }
                    Some(payload) => {
                        let frame = build_frame(&self.config, seq, payload)?;
                        if let Some(wire) = shared.channel.transmit(&frame) {
                            transport::write_data_frame(&mut shared.link, &wire)?;
                        }
                        shared.journal.sent(seq);
                        if shared.base == shared.next {
                            timer.start(self.config.timeout);
                        }
                        shared.buffer.push_back(frame);
                        shared.next += 1;
                    }
                }
            }

            if shared.eof && shared.base == shared.next {
                return Ok(());
            }
            drop(
                self.state
                    .window_open
                    .wait(shared)
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
    }
}

/// Timer callback: resend everything in `[base, next)` and rearm.
fn retransmit_window<L: Link>(state: &SessionState<L>, timeout: Duration) -> Option<Duration> {
    let mut shared = lock(&state.shared);
    if shared.done || shared.buffer.is_empty() {
        return None;
    }
    debug!(
        "timeout: retransmitting frames {}..{}",
        shared.base, shared.next
    );

    let Shared { link, channel, journal, buffer, base, .. } = &mut *shared;
    for (offset, frame) in buffer.iter().enumerate() {
        let seq = *base + offset as u64;
        if let Some(wire) = channel.transmit(frame) {
            if transport::write_data_frame(link, &wire).is_err() {
                return None;
            }
        }
        journal.resent(seq);
    }
    Some(timeout)
}

fn ack_listener<L: Link>(
    mut link: L,
    state: &SessionState<L>,
    timer: &OneShotTimer,
    timeout: Duration,
) {
    loop {
        let ack = match transport::read_ack_frame(&mut link, SeqEncoding::Unsigned) {
            Ok(ack) => ack,
            Err(_) => return,
        };
        let Acknowledgment::Positive(seq_byte) = ack.ack else {
            continue;
        };

        let mut shared = lock(&state.shared);
        if shared.done {
            return;
        }

        // Resolve the wire byte against the window; anything outside
        // [base, next) is a stale duplicate.
        let span = shared.next - shared.base;
        let offset = u64::from(seq_byte.wrapping_sub(shared.base as u8));
        if span == 0 || offset >= span {
            debug!("stale ACK {seq_byte} ignored");
            continue;
        }

        let acked = shared.base + offset;
        shared.journal.ack(acked);
        for _ in 0..=offset {
            shared.buffer.pop_front();
        }
        shared.base = acked + 1;
        if shared.base == shared.next {
            timer.cancel();
        } else {
            timer.start(timeout);
        }
        state.window_open.notify_all();
    }
}
