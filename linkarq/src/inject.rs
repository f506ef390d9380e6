//! Bit-error injection primitives.
//!
//! Deterministic flips for unit testing the codecs plus a random
//! sampler used by the lossy channel. Single, double, and odd-count
//! errors land in the first 32 bits of the target string; burst errors
//! may span the whole string.

use rand::Rng;

use crate::bits::BitBuf;
use crate::error::{Error, Result};

/// Span of the target eligible for isolated (non-burst) flips.
const ISOLATED_SPAN: usize = 32;

/// Shape of an injected error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// One flipped bit.
    Single,

    /// Two flipped bits at distinct indices.
    Double,

    /// An odd number of flipped bits.
    Odd,

    /// A run of consecutive flipped bits.
    Burst,
}

fn check_isolated_index(code: &BitBuf, index: usize) -> Result<()> {
    if index >= ISOLATED_SPAN || index >= code.len() {
        return Err(Error::InvalidArgument(format!(
            "bit index {index} out of range (limit {})",
            ISOLATED_SPAN.min(code.len())
        )));
    }
    Ok(())
}

/// Flips the single bit at `index`.
pub fn inject_single(code: &mut BitBuf, index: usize) -> Result<()> {
    check_isolated_index(code, index)?;
    code.flip(index);
    Ok(())
}

/// Flips two bits at distinct indices.
pub fn inject_double(code: &mut BitBuf, first: usize, second: usize) -> Result<()> {
    check_isolated_index(code, first)?;
    check_isolated_index(code, second)?;
    if first == second {
        return Err(Error::InvalidArgument(
            "double error requires two distinct indices".into(),
        ));
    }
    code.flip(first);
    code.flip(second);
    Ok(())
}

/// Flips an odd number of bits at the supplied indices.
pub fn inject_odd(code: &mut BitBuf, indices: &[usize]) -> Result<()> {
    if indices.len() % 2 == 0 {
        return Err(Error::InvalidArgument(format!(
            "odd error requires an odd index count, got {}",
            indices.len()
        )));
    }
    for &index in indices {
        check_isolated_index(code, index)?;
    }
    for &index in indices {
        code.flip(index);
    }
    Ok(())
}

/// Flips `burst_length` consecutive bits starting at `start`.
pub fn inject_burst(code: &mut BitBuf, start: usize, burst_length: usize) -> Result<()> {
    if burst_length == 0 {
        return Err(Error::InvalidArgument("burst length must be positive".into()));
    }
    if start + burst_length > code.len() {
        return Err(Error::InvalidArgument(format!(
            "burst of {burst_length} bits at {start} exceeds {} bits",
            code.len()
        )));
    }
    for index in start..start + burst_length {
        code.flip(index);
    }
    Ok(())
}

/// Injects a randomly placed error of the given kind.
///
/// `burst_length` is required for [`ErrorKind::Burst`] and ignored
/// otherwise. The caller supplies the RNG so simulations can be seeded.
pub fn inject_random<R: Rng>(
    code: &mut BitBuf,
    kind: ErrorKind,
    burst_length: Option<usize>,
    rng: &mut R,
) -> Result<()> {
    match kind {
        ErrorKind::Single => inject_single(code, rng.gen_range(0..ISOLATED_SPAN)),
        ErrorKind::Double => {
            let first = rng.gen_range(0..ISOLATED_SPAN);
            let mut second = rng.gen_range(0..ISOLATED_SPAN);
            while second == first {
                second = rng.gen_range(0..ISOLATED_SPAN);
            }
            inject_double(code, first, second)
        }
        ErrorKind::Odd => {
            let mut count = rng.gen_range(1..=ISOLATED_SPAN);
            while count % 2 == 0 {
                count = rng.gen_range(1..=ISOLATED_SPAN);
            }
            let indices = rand::seq::index::sample(rng, ISOLATED_SPAN, count).into_vec();
            inject_odd(code, &indices)
        }
        ErrorKind::Burst => {
            let burst_length = burst_length.ok_or_else(|| {
                Error::InvalidArgument("burst length must be provided for burst errors".into())
            })?;
            if burst_length == 0 || burst_length > code.len() {
                return Err(Error::InvalidArgument(format!(
                    "burst length {burst_length} does not fit in {} bits",
                    code.len()
                )));
            }
            let max_start = code.len() - burst_length;
            let start = if max_start == 0 { 0 } else { rng.gen_range(0..=max_start) };
            inject_burst(code, start, burst_length)
        }
    }
}
