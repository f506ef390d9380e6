//! CRC-32 by modulo-2 polynomial division.
//!
//! The dataword is treated as a polynomial over GF(2), multiplied by
//! `x^32`, and divided by the degree-32 generator; the remainder is the
//! FCS. A received codeword `data ∥ fcs` is valid iff it divides evenly.
//! The division runs bit-serially over the packed buffer, so it matches
//! the textbook long division exactly for any bit length.

use std::iter;

use super::FCS_BITS;
use crate::bits::BitBuf;

/// Low 32 bits of the 33-bit generator polynomial
/// `100000100110000010001110110110111`.
const GENERATOR: u32 = 0x04C1_1DB7;

/// Computes the CRC-32 FCS of `data`.
pub fn generate(data: &BitBuf) -> u32 {
    remainder(data.bits().chain(iter::repeat(false).take(FCS_BITS)))
}

/// Returns true if `data ∥ fcs` leaves no remainder under the generator.
pub fn validate(data: &BitBuf, fcs: u32) -> bool {
    remainder(data.bits().chain(word_bits(fcs))) == 0
}

fn word_bits(word: u32) -> impl Iterator<Item = bool> {
    (0..FCS_BITS).rev().map(move |i| (word >> i) & 1 == 1)
}

/// Long division of the incoming bit stream by the generator. The
/// register holds the running 32-bit partial remainder; the generator's
/// leading term cancels against the bit shifted out of position 31.
fn remainder(bits: impl Iterator<Item = bool>) -> u32 {
    let mut rem = 0u32;
    for bit in bits {
        let overflow = rem & 0x8000_0000 != 0;
        rem = (rem << 1) | u32::from(bit);
        if overflow {
            rem ^= GENERATOR;
        }
    }
    rem
}
