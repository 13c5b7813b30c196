//! AF_PACKET raw sockets and interface address discovery

use std::ffi::CString;
use std::io::{self, Read, Write};
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::error::{Result, RouterError};
use crate::iface::FrameIo;
use crate::network::ethernet::MacAddr;

/// Addresses of a kernel interface as reported by ioctl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub hwaddr: MacAddr,
    pub addr: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// Link-layer socket receiving every frame seen on one interface
pub struct RawSocket {
    name: String,
    socket: Socket,
}

impl RawSocket {
    /// Open a non-blocking AF_PACKET socket bound to `name`
    ///
    /// With `promiscuous` set the interface also delivers frames addressed to
    /// other stations.
    pub fn open(name: &str, promiscuous: bool) -> Result<Self> {
        let socket_err = |source| RouterError::Socket {
            name: name.to_string(),
            source,
        };

        let if_index = if_index(name)?;
        let eth_p_all = (libc::ETH_P_ALL as u16).to_be();
        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(eth_p_all as i32)),
        )
        .map_err(socket_err)?;

        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = eth_p_all;
        addr.sll_ifindex = if_index as i32;

        let ret = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(socket_err(io::Error::last_os_error()));
        }

        if promiscuous {
            let mreq = libc::packet_mreq {
                mr_ifindex: if_index as i32,
                mr_type: libc::PACKET_MR_PROMISC as u16,
                mr_alen: 0,
                mr_address: [0; 8],
            };
            let ret = unsafe {
                libc::setsockopt(
                    socket.as_raw_fd(),
                    libc::SOL_PACKET,
                    libc::PACKET_ADD_MEMBERSHIP,
                    &mreq as *const libc::packet_mreq as *const libc::c_void,
                    std::mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
                )
            };
            if ret < 0 {
                return Err(socket_err(io::Error::last_os_error()));
            }
        }

        socket.set_nonblocking(true).map_err(socket_err)?;
        debug!(name, if_index, promiscuous, "Bound AF_PACKET socket to interface");

        Ok(RawSocket {
            name: name.to_string(),
            socket,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FrameIo for RawSocket {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.socket).read(buf)
    }

    fn send(&self, frame: &[u8]) -> io::Result<usize> {
        (&self.socket).write(frame)
    }

    fn raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

fn if_index(name: &str) -> Result<u32> {
    let c_name = CString::new(name).map_err(|_| RouterError::Socket {
        name: name.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "Invalid interface name"),
    })?;

    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(RouterError::Socket {
            name: name.to_string(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(index)
}

fn ifreq_for(name: &str) -> Result<libc::ifreq> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > 15 {
        return Err(RouterError::NameTooLong(name.to_string()));
    }

    let mut ifreq: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, src) in ifreq.ifr_name.iter_mut().zip(name_bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(ifreq)
}

fn sockaddr_ipv4(addr: &libc::sockaddr) -> Option<Ipv4Addr> {
    if addr.sa_family != libc::AF_INET as libc::sa_family_t {
        return None;
    }
    let sin = unsafe { &*(addr as *const libc::sockaddr as *const libc::sockaddr_in) };
    Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
}

/// Query hardware address, IPv4 address and netmask of a kernel interface
pub fn interface_info(name: &str) -> Result<InterfaceInfo> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(|source| RouterError::Socket {
        name: name.to_string(),
        source,
    })?;

    let query = |request: libc::Ioctl, what: &'static str| -> Result<libc::ifreq> {
        let mut ifreq = ifreq_for(name)?;
        let ret = unsafe { libc::ioctl(sock.as_raw_fd(), request, &mut ifreq) };
        if ret < 0 {
            return Err(RouterError::InterfaceInfo {
                name: name.to_string(),
                what,
                source: io::Error::last_os_error(),
            });
        }
        Ok(ifreq)
    };

    let ifreq = query(libc::SIOCGIFHWADDR as libc::Ioctl, "hardware address")?;
    let mut hwaddr = [0u8; 6];
    let sa_data = unsafe { ifreq.ifr_ifru.ifru_hwaddr.sa_data };
    for (dst, src) in hwaddr.iter_mut().zip(sa_data.iter()) {
        *dst = *src as u8;
    }

    let ifreq = query(libc::SIOCGIFADDR as libc::Ioctl, "address")?;
    let addr = sockaddr_ipv4(unsafe { &ifreq.ifr_ifru.ifru_addr })
        .ok_or_else(|| RouterError::NotIpv4(name.to_string()))?;

    let ifreq = query(libc::SIOCGIFNETMASK as libc::Ioctl, "netmask")?;
    let netmask = sockaddr_ipv4(unsafe { &ifreq.ifr_ifru.ifru_netmask })
        .ok_or_else(|| RouterError::NotIpv4(name.to_string()))?;

    Ok(InterfaceInfo {
        hwaddr: MacAddr(hwaddr),
        addr,
        netmask,
    })
}
