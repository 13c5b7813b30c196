use std::io;
use std::net::Ipv4Addr;
use std::process::Command;

use tracing::info;

fn ip(args: &[&str]) -> io::Result<()> {
    let status = Command::new("ip").args(args).status()?;
    if !status.success() {
        return Err(io::Error::other(format!("ip {} failed: {}", args.join(" "), status)));
    }
    Ok(())
}

/// Bring interface up: ip link set up dev <iface_name>
pub fn link_up(iface_name: &str) -> io::Result<()> {
    ip(&["link", "set", "up", "dev", iface_name])
}

/// Assign the host side of a TAP device an address and bring it up
pub fn configure_interface(iface_name: &str, ip_cidr: &str) -> io::Result<()> {
    // Configure IP address: ip addr add <ip_cidr> dev <iface_name>
    ip(&["addr", "add", ip_cidr, "dev", iface_name])?;
    link_up(iface_name)?;

    info!(iface_name, ip_cidr, "Interface configured and brought up");
    Ok(())
}

/// Route `dest_cidr` through `gateway` on `iface_name`
pub fn add_route(dest_cidr: &str, gateway: Ipv4Addr, iface_name: &str) -> io::Result<()> {
    ip(&["route", "add", dest_cidr, "via", &gateway.to_string(), "dev", iface_name])?;
    info!(dest_cidr, %gateway, iface_name, "Route added");
    Ok(())
}
