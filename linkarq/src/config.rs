//! Session configuration and protocol selection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fcs::FcsScheme;
use crate::frame::Address;

/// Default rendezvous endpoint for the sender and receiver binaries.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:12345";

/// Default station address of the sending endpoint.
pub const DEFAULT_SENDER_ADDRESS: Address =
    Address::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

/// Default station address of the receiving endpoint.
pub const DEFAULT_RECEIVER_ADDRESS: Address =
    Address::new([0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);

/// Back-off applied by Stop-and-Wait when the channel swallows a frame.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// The ARQ protocol run by a matched sender/receiver pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// One frame in flight, acknowledged before the next.
    StopAndWait,

    /// Sliding window with cumulative acks and full-window retransmit.
    GoBackN,

    /// Sliding window with per-frame retransmission and NACKs.
    SelectiveRepeat,
}

impl Protocol {
    /// Window size used when none is configured.
    pub const fn default_window(self) -> usize {
        match self {
            Self::StopAndWait => 1,
            Self::GoBackN => 4,
            Self::SelectiveRepeat => 4,
        }
    }

    /// Retransmission timeout used when none is configured.
    pub const fn default_timeout(self) -> Duration {
        match self {
            Self::StopAndWait | Self::GoBackN => Duration::from_secs(2),
            Self::SelectiveRepeat => Duration::from_secs(4),
        }
    }

    /// The canonical protocol name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopAndWait => "StopAndWait",
            Self::GoBackN => "GoBackN",
            Self::SelectiveRepeat => "SelectiveRepeat",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("StopAndWait") || s == "1" {
            Ok(Self::StopAndWait)
        } else if s.eq_ignore_ascii_case("GoBackN") || s == "2" {
            Ok(Self::GoBackN)
        } else if s.eq_ignore_ascii_case("SelectiveRepeat") || s == "3" {
            Ok(Self::SelectiveRepeat)
        } else {
            Err(Error::UnknownProtocol(s.to_string()))
        }
    }
}

/// Tunables shared by all sender and receiver state machines.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Error-detection technique applied to every data frame.
    pub scheme: FcsScheme,

    /// Configured payload size per frame in bytes.
    pub payload_bytes: usize,

    /// Window size `W`; frames in flight never exceed it.
    pub window: usize,

    /// Retransmission timeout.
    pub timeout: Duration,

    /// Stop-and-Wait retry delay after a channel drop.
    pub backoff: Duration,

    /// Local station address.
    pub local_addr: Address,

    /// Peer station address.
    pub peer_addr: Address,
}

impl SessionConfig {
    /// Creates a configuration with the protocol's default window and
    /// timeout and the default station addresses.
    pub fn for_protocol(protocol: Protocol, scheme: FcsScheme, payload_bytes: usize) -> Self {
        Self {
            scheme,
            payload_bytes,
            window: protocol.default_window(),
            timeout: protocol.default_timeout(),
            backoff: DEFAULT_BACKOFF,
            local_addr: DEFAULT_SENDER_ADDRESS,
            peer_addr: DEFAULT_RECEIVER_ADDRESS,
        }
    }

    /// Overrides the window size. Windows are kept well below the wire
    /// sequence modulus so acknowledgements resolve unambiguously.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.clamp(1, 64);
        self
    }

    /// Overrides the retransmission timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the Stop-and-Wait channel-drop back-off.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overrides both station addresses.
    pub fn with_addresses(mut self, local: Address, peer: Address) -> Self {
        self.local_addr = local;
        self.peer_addr = peer;
        self
    }
}
