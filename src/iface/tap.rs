//! TAP devices as router ports
//!
//! A TAP device hands the router whole Ethernet frames written by the host
//! kernel, which makes it possible to run the router without dedicated NICs.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use tracing::info;
use tun_tap::{Iface, Mode};

use crate::error::{Result, RouterError};
use crate::iface::FrameIo;

pub struct TapDevice {
    iface: Iface,
}

impl TapDevice {
    /// Create (or attach to) the TAP device `name` in non-blocking mode
    pub fn open(name: &str) -> Result<Self> {
        let tap_err = |source| RouterError::Tap {
            name: name.to_string(),
            source,
        };

        let iface = Iface::without_packet_info(name, Mode::Tap).map_err(tap_err)?;
        iface.set_non_blocking().map_err(tap_err)?;
        info!(name = iface.name(), "TAP device created");
        Ok(TapDevice { iface })
    }

    /// Kernel name of the device, which may differ from the requested one
    pub fn name(&self) -> &str {
        self.iface.name()
    }
}

impl FrameIo for TapDevice {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.iface.recv(buf)
    }

    fn send(&self, frame: &[u8]) -> io::Result<usize> {
        self.iface.send(frame)
    }

    fn raw_fd(&self) -> RawFd {
        self.iface.as_raw_fd()
    }
}
