//! Router configuration
//!
//! Each router port is described by an `InterfaceSpec`:
//! - `eth0`: a kernel interface driven through a raw socket, addresses discovered via ioctl
//! - `tap:NAME,MAC,ADDR/PREFIX`: a TAP device with explicitly given addresses

use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::RouterError;
use crate::network::ethernet::MacAddr;

/// Default gateway used for destinations outside both attached subnets
pub const DEFAULT_NEXT_ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSpec {
    Raw {
        name: String,
    },
    Tap {
        name: String,
        hwaddr: MacAddr,
        addr: Ipv4Addr,
        netmask: Ipv4Addr,
    },
}

impl InterfaceSpec {
    pub fn name(&self) -> &str {
        match self {
            InterfaceSpec::Raw { name } | InterfaceSpec::Tap { name, .. } => name,
        }
    }
}

impl FromStr for InterfaceSpec {
    type Err = RouterError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| RouterError::InvalidSpec {
            spec: spec.to_string(),
            reason,
        };

        let Some(tap) = spec.strip_prefix("tap:") else {
            if spec.is_empty() || spec.len() > 15 || spec.contains([',', '/', ':']) {
                return Err(invalid("expected an interface name".to_string()));
            }
            return Ok(InterfaceSpec::Raw {
                name: spec.to_string(),
            });
        };

        let parts: Vec<&str> = tap.split(',').collect();
        let [name, mac, cidr] = parts[..] else {
            return Err(invalid("expected tap:NAME,MAC,ADDR/PREFIX".to_string()));
        };
        if name.is_empty() || name.len() > 15 {
            return Err(invalid(format!("bad device name '{}'", name)));
        }
        let hwaddr = mac.parse::<MacAddr>().map_err(invalid)?;
        let (addr, netmask) = parse_ip_cidr(cidr).map_err(invalid)?;

        Ok(InterfaceSpec::Tap {
            name: name.to_string(),
            hwaddr,
            addr,
            netmask,
        })
    }
}

/// Split `a.b.c.d/len` into the address and its netmask
pub fn parse_ip_cidr(ip_cidr: &str) -> Result<(Ipv4Addr, Ipv4Addr), String> {
    let (ip, prefix) = ip_cidr
        .split_once('/')
        .ok_or_else(|| format!("invalid CIDR '{}'", ip_cidr))?;

    let addr = ip
        .parse::<Ipv4Addr>()
        .map_err(|_| format!("invalid IP address '{}'", ip))?;
    let prefix_len = prefix
        .parse::<u8>()
        .ok()
        .filter(|len| *len <= 32)
        .ok_or_else(|| format!("invalid network prefix length '{}'", prefix))?;

    let netmask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
    Ok((addr, Ipv4Addr::from(netmask)))
}

/// Everything needed to start a router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub devices: [InterfaceSpec; 2],
    pub next_router: Ipv4Addr,
    pub debug: bool,
    pub promiscuous: bool,
}

impl RouterConfig {
    pub fn new(devices: [InterfaceSpec; 2]) -> Self {
        RouterConfig {
            devices,
            next_router: DEFAULT_NEXT_ROUTER,
            debug: false,
            promiscuous: false,
        }
    }
}
