//! host-remote IPAM plugin
//!
//! A CNI IPAM plugin that owns no address pool of its own:
//! - ADD registers the interface with a remote allocation server and returns
//!   the address and gateway it hands out
//! - DEL tells the server to release that address
//! - CHECK succeeds without contacting the server

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod plugin;
pub mod types;

// Re-export commonly used items
pub use client::{AllocationClient, Mode};
pub use commands::{cmd_add, cmd_check, cmd_del, run_cni};
pub use config::{IPAMConfig, NetConf};
pub use error::{ClientError, Error};
pub use plugin::HostRemotePlugin;
