//! Patchwire – remote patch construction over an OSC command bridge
//!
//! This crate lets an external command issuer build and wire a patch inside a
//! running visual-programming host:
//! - A request/response correlator over a connectionless, unordered UDP link
//! - A single-string OSC encoding that survives the host's argument splitting
//! - Z-ordered batch construction replayed one object per tick on the host
//! - A host-side dispatcher with an explicit session (registry + target context)
//! - A line-delimited JSON tool surface for the issuer's own caller

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Issuer-side bridge: codec, command types, correlator and Z-order sorter
pub mod bridge;

/// JSON configuration files
pub mod config;

/// Host-side dispatcher, session, batch replay and daemon loop
pub mod host;

/// Line-delimited JSON tool surface over the bridge
pub mod service;

// Re-export key types for convenience
pub use bridge::{Bridge, BridgeConfig};
pub use host::{HostConfig, HostDaemon};

/// Current version of the patchwire crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// OSC address namespace shared with the host daemon
pub const ADDRESS_PREFIX: &str = "/lofi";
