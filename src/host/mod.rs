//! Host side of the bridge
//!
//! Receives commands, applies them to the host object model through an
//! explicit session, and replays batches one object per tick.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod replay;
pub mod session;

pub use daemon::HostDaemon;
pub use dispatcher::{Dispatcher, Outcome};
pub use error::{DispatchError, HostError};
pub use model::{Host, MemoryHost};
pub use session::Session;

use crate::bridge::{FROM_HOST_PORT, REPLAY_SPACING_MS, TO_HOST_PORT};

/// Configuration for the host daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address commands arrive on
    pub listen: SocketAddr,

    /// Address replies are sent to
    pub reply_to: SocketAddr,

    /// Spacing between batch replay ticks, in milliseconds.
    ///
    /// Issuers size batch timeouts from their `replay_spacing_ms`, so the two
    /// should agree.
    pub tick_delay_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, TO_HOST_PORT)),
            reply_to: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, FROM_HOST_PORT)),
            tick_delay_ms: REPLAY_SPACING_MS,
        }
    }
}

impl HostConfig {
    /// Replay tick spacing
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }
}
