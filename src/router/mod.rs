//! The router: two ports, their address caches and the pending-send queue
//!
//! All mutable state lives in `Router`, which is shared by reference between
//! the dispatcher thread and the flush thread:
//! - `forward`: per-frame decisions and the flush of resolved entries
//! - `dispatcher`: the receive loop and the flush loop
//! - `arp_cache`: per-interface address resolution tables
//! - `send_queue`: notifications of newly resolved entries
//!
//! Locks are always taken cache first, queue second.

pub mod arp_cache;
pub mod dispatcher;
pub mod forward;
pub mod send_queue;

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RouterConfig;
use crate::error::Result;
use crate::iface::Interface;

pub use arp_cache::{ArpCache, ArpTable, EntryState, PendingPacket};
pub use forward::Verdict;
pub use send_queue::{Notification, SendQueue};

pub struct Router {
    interfaces: [Interface; 2],
    caches: [ArpCache; 2],
    send_queue: SendQueue,
    next_router: Ipv4Addr,
    debug: bool,
    shutdown: Arc<AtomicBool>,
}

impl Router {
    /// Open both ports described by `config`
    pub fn new(config: &RouterConfig) -> Result<Self> {
        let first = Interface::open(&config.devices[0], config.promiscuous)?;
        let second = Interface::open(&config.devices[1], config.promiscuous)?;
        Ok(Self::with_interfaces([first, second], config.next_router).with_debug(config.debug))
    }

    /// Build a router over already opened ports
    pub fn with_interfaces(interfaces: [Interface; 2], next_router: Ipv4Addr) -> Self {
        Router {
            interfaces,
            caches: [ArpCache::new(), ArpCache::new()],
            send_queue: SendQueue::new(),
            next_router,
            debug: false,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Dump every received frame at debug level
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Use an externally owned shutdown flag, e.g. one raised by a signal handler
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Ask both loops to return
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn interface(&self, device: usize) -> &Interface {
        &self.interfaces[device]
    }

    pub fn interfaces(&self) -> &[Interface; 2] {
        &self.interfaces
    }

    pub fn cache(&self, device: usize) -> &ArpCache {
        &self.caches[device]
    }

    pub fn send_queue(&self) -> &SendQueue {
        &self.send_queue
    }

    pub fn next_router(&self) -> Ipv4Addr {
        self.next_router
    }
}
