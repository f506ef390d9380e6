//! Link-layer reliable delivery over a lossy byte channel.
//!
//! The crate transfers a stream of bit-string payloads between two
//! endpoints across a medium that drops and corrupts frames, using one
//! of three interchangeable ARQ protocols: Stop-and-Wait, Go-Back-N, or
//! Selective Repeat. Frames carry a 32-bit FCS computed by CRC-32 or a
//! one's-complement checksum; a simulated [`channel::LossyChannel`]
//! injects loss and bit errors between the sender and the transport.

pub mod bits;
pub mod channel;
pub mod config;
pub mod error;
pub mod fcs;
pub mod frame;
pub mod inject;
pub mod journal;
pub mod receiver;
pub mod sender;
pub mod source;
pub mod timer;
pub mod transport;
pub mod validate;

pub use config::{Protocol, SessionConfig};
pub use error::{Error, Result};
pub use fcs::FcsScheme;
pub use frame::{AckFrame, Address, DataFrame};
pub use transport::Link;
