//! Issuer side of the bridge
//!
//! Encodes commands into single-argument OSC messages, sends them to the host
//! one at a time and correlates each with the next reply.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub mod codec;
pub mod command;
pub mod correlator;
pub mod error;
pub mod zorder;

pub use command::{Address, Command, LayerDescriptor, Response, Status};
pub use correlator::{Bridge, BridgeStats, BridgeStatus};
pub use error::{BridgeError, BridgeResult, CodecError};

/// Default port for issuer → host traffic
pub const TO_HOST_PORT: u16 = 7400;

/// Default port for host → issuer traffic
pub const FROM_HOST_PORT: u16 = 7401;

/// Default spacing between host batch replay ticks, in milliseconds
pub const REPLAY_SPACING_MS: u64 = 20;

/// Configuration for the issuer-side bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Loopback address of the host
    pub host: IpAddr,

    /// Port the host listens on
    pub to_host_port: u16,

    /// Port replies arrive on
    pub from_host_port: u16,

    /// Reply budget per request, in milliseconds
    pub timeout_ms: u64,

    /// Host-side spacing between batch replay ticks, in milliseconds.
    ///
    /// Must match the host's `tick_delay_ms`; a smaller value makes large
    /// batches time out while the host is still replaying.
    pub replay_spacing_ms: u64,

    /// Stamp a `seq` field on payloads so stale replies can be dropped
    pub sequence_ids: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            to_host_port: TO_HOST_PORT,
            from_host_port: FROM_HOST_PORT,
            timeout_ms: 5000,
            replay_spacing_ms: REPLAY_SPACING_MS,
            sequence_ids: true,
        }
    }
}

impl BridgeConfig {
    /// Address requests are sent to
    pub fn target(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.to_host_port)
    }

    /// Reply budget
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Host replay spacing
    pub fn replay_spacing(&self) -> Duration {
        Duration::from_millis(self.replay_spacing_ms)
    }
}
