//! Host-side setup helpers for the demos
//!
//! Thin wrappers around the `ip` command used to configure the kernel end of
//! the TAP devices the router is attached to.

pub mod network;

pub use network::*;
