//! Router ports
//!
//! This module provides the two interfaces the router forwards between:
//! - Interface addressing (hardware address, IPv4 address, subnet)
//! - Frame I/O over AF_PACKET raw sockets or TAP devices
//! - Address discovery for kernel interfaces

pub mod raw;
pub mod tap;

use std::io;
use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::sync::Arc;

use tracing::info;

use crate::config::InterfaceSpec;
use crate::error::Result;
use crate::network::ethernet::MacAddr;

pub use raw::{interface_info, InterfaceInfo, RawSocket};
pub use tap::TapDevice;

/// Something that moves whole Ethernet frames in and out of the router
///
/// `recv` and `send` must not block: the dispatcher polls `raw_fd` for
/// readiness and treats `WouldBlock` as "nothing to read".
pub trait FrameIo: Send + Sync {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn send(&self, frame: &[u8]) -> io::Result<usize>;
    fn raw_fd(&self) -> RawFd;
}

impl<T: FrameIo + ?Sized> FrameIo for Arc<T> {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }

    fn send(&self, frame: &[u8]) -> io::Result<usize> {
        (**self).send(frame)
    }

    fn raw_fd(&self) -> RawFd {
        (**self).raw_fd()
    }
}

/// One router port
pub struct Interface {
    pub name: String,
    pub hwaddr: MacAddr,
    /// Local IPv4 address
    pub addr: Ipv4Addr,
    /// Network mask
    pub netmask: Ipv4Addr,
    /// `addr & netmask`
    pub subnet: Ipv4Addr,
    /// Answer ARP requests for `addr` and accept broadcast ARP requests
    pub answers_arp: bool,
    io: Box<dyn FrameIo>,
}

impl Interface {
    /// Create an interface with the specified addresses over `io`
    pub fn new(
        name: impl Into<String>,
        hwaddr: MacAddr,
        addr: Ipv4Addr,
        netmask: Ipv4Addr,
        io: Box<dyn FrameIo>,
    ) -> Self {
        Interface {
            name: name.into(),
            hwaddr,
            addr,
            netmask,
            subnet: Ipv4Addr::from(u32::from(addr) & u32::from(netmask)),
            answers_arp: false,
            io,
        }
    }

    /// Enable answering ARP requests for our own address
    pub fn answering_arp(mut self, answers_arp: bool) -> Self {
        self.answers_arp = answers_arp;
        self
    }

    /// Open the port described by `spec`
    pub fn open(spec: &InterfaceSpec, promiscuous: bool) -> Result<Self> {
        let iface = match spec {
            InterfaceSpec::Raw { name } => {
                let info = interface_info(name)?;
                let socket = RawSocket::open(name, promiscuous)?;
                Interface::new(name.as_str(), info.hwaddr, info.addr, info.netmask, Box::new(socket))
            }
            InterfaceSpec::Tap {
                name,
                hwaddr,
                addr,
                netmask,
            } => {
                let tap = TapDevice::open(name)?;
                Interface::new(tap.name().to_string(), *hwaddr, *addr, *netmask, Box::new(tap))
                    .answering_arp(true)
            }
        };

        info!(
            device = %iface.name,
            hwaddr = %iface.hwaddr,
            addr = %iface.addr,
            subnet = %iface.subnet,
            netmask = %iface.netmask,
            "Interface ready"
        );
        Ok(iface)
    }

    /// Check if address is in the same network
    pub fn is_same_network(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & u32::from(self.netmask) == u32::from(self.subnet)
    }

    /// Whether a frame addressed to `dst` is meant for this port
    pub fn accepts(&self, dst: MacAddr, is_arp: bool) -> bool {
        dst == self.hwaddr || (self.answers_arp && is_arp && dst.is_broadcast())
    }

    pub fn send(&self, frame: &[u8]) -> io::Result<usize> {
        self.io.send(frame)
    }

    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.io.recv(buf)
    }

    pub fn raw_fd(&self) -> RawFd {
        self.io.raw_fd()
    }
}

impl std::fmt::Debug for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("hwaddr", &self.hwaddr)
            .field("addr", &self.addr)
            .field("netmask", &self.netmask)
            .field("answers_arp", &self.answers_arp)
            .finish_non_exhaustive()
    }
}
