//! Router between two TAP devices
//!
//! Creates `rtap0` (10.0.0.1/24) and `rtap1` (10.0.1.1/24), gives the host
//! side of `rtap0` the address 10.0.0.254 and routes 10.0.1.0/24 through the
//! router. `rtap1` is only brought up, so nothing answers behind it and the
//! router's ARP requests can be watched there.
//!
//! To run this example:
//!
//! ```sh
//! cargo run --example tap_router
//! ```
//!
//! Then, from another shell:
//!
//! ```sh
//! ping -t 1 10.0.1.9      # "Time to live exceeded" from 10.0.0.1
//! ping 10.0.1.9           # forwarded, queued until 10.0.1.9 is resolved
//! tcpdump -eni rtap1 arp  # the router asking for 10.0.1.9
//! ```
//!
//! Note: Root/sudo privileges are required to create and configure TAP devices.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use toy_router::{InterfaceSpec, Router, RouterConfig};

mod utils;
use utils::network::{add_route, configure_interface, link_up};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("toy_router=debug".parse()?))
        .init();

    let mut config = RouterConfig::new([
        "tap:rtap0,02:00:00:00:00:01,10.0.0.1/24".parse::<InterfaceSpec>()?,
        "tap:rtap1,02:00:00:00:01:01,10.0.1.1/24".parse::<InterfaceSpec>()?,
    ]);
    config.next_router = "10.0.1.250".parse()?;
    config.debug = true;

    let router = Router::new(&config)?;
    let (first, second) = (&router.interface(0).name, &router.interface(1).name);

    configure_interface(first, "10.0.0.254/24")?;
    link_up(second)?;
    add_route("10.0.1.0/24", router.interface(0).addr, first)?;

    router.run()?;
    Ok(())
}
