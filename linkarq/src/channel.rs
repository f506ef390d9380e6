//! Simulated lossy medium.
//!
//! Every outgoing data frame passes through the channel before touching
//! the transport. The channel drops the frame with probability `p_loss`,
//! otherwise corrupts `payload ∥ fcs` with probability `p_error` using a
//! uniformly chosen injection kind. Each transmission is independent.

use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};
use crate::fcs::FCS_BITS;
use crate::frame::DataFrame;
use crate::inject::{self, ErrorKind};

/// Default probability that a frame is dropped outright.
pub const DEFAULT_LOSS_PROBABILITY: f64 = 0.3;

/// Default probability that a surviving frame is corrupted.
pub const DEFAULT_ERROR_PROBABILITY: f64 = 0.3;

/// A stateless lossy channel between sender and transport.
pub struct LossyChannel {
    loss_prob: f64,
    error_prob: f64,
    rng: ChaCha8Rng,
}

impl LossyChannel {
    /// Creates a channel with an entropy-seeded RNG.
    pub fn new(loss_prob: f64, error_prob: f64) -> Result<Self> {
        Self::with_rng(loss_prob, error_prob, ChaCha8Rng::from_entropy())
    }

    /// Creates a channel with a deterministic RNG for reproducible runs.
    pub fn seeded(loss_prob: f64, error_prob: f64, seed: u64) -> Result<Self> {
        Self::with_rng(loss_prob, error_prob, ChaCha8Rng::seed_from_u64(seed))
    }

    /// A channel that never drops or corrupts anything.
    pub fn lossless() -> Self {
        Self {
            loss_prob: 0.0,
            error_prob: 0.0,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    fn with_rng(loss_prob: f64, error_prob: f64, rng: ChaCha8Rng) -> Result<Self> {
        for p in [loss_prob, error_prob] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidProbability(p));
            }
        }
        Ok(Self { loss_prob, error_prob, rng })
    }

    /// Passes a frame through the medium.
    ///
    /// Returns `None` when the frame is lost, otherwise the frame as it
    /// arrives on the far side, possibly with corrupted payload or FCS.
    /// Addresses, length, and sequence number are never damaged.
    pub fn transmit(&mut self, frame: &DataFrame) -> Option<DataFrame> {
        if self.rng.gen_bool(self.loss_prob) {
            debug!("channel dropped frame {}", frame.seq_no);
            return None;
        }
        if self.rng.gen_bool(self.error_prob) {
            return Some(self.corrupt(frame));
        }
        Some(frame.clone())
    }

    fn corrupt(&mut self, frame: &DataFrame) -> DataFrame {
        let mut combined = frame.payload.clone();
        combined.push_u32(frame.fcs);

        let kind = match self.rng.gen_range(0..4) {
            0 => ErrorKind::Single,
            1 => ErrorKind::Double,
            2 => ErrorKind::Odd,
            _ => ErrorKind::Burst,
        };
        let burst_length = (kind == ErrorKind::Burst).then(|| {
            if combined.len() < 2 {
                1
            } else {
                self.rng.gen_range(2..=combined.len())
            }
        });

        debug!("channel injecting {kind:?} error into frame {}", frame.seq_no);
        if let Err(err) = inject::inject_random(&mut combined, kind, burst_length, &mut self.rng) {
            warn!("error injection failed, frame {} passes clean: {err}", frame.seq_no);
            return frame.clone();
        }

        let fcs = combined.split_off(combined.len() - FCS_BITS).to_u32();
        DataFrame { payload: combined, fcs, ..frame.clone() }
    }
}
