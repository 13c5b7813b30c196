//! toy-router - forwards IPv4 between two Ethernet interfaces.
//!
//! ```sh
//! sudo toy-router eth0 eth1 --next-router 10.0.1.250
//! sudo toy-router tap:tap0,02:00:00:00:00:01,10.0.0.1/24 tap:tap1,02:00:00:00:01:01,10.0.1.1/24
//! ```

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::{signal, SigHandler, Signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use toy_router::config::{InterfaceSpec, RouterConfig, DEFAULT_NEXT_ROUTER};
use toy_router::Router;

/// Minimal two-interface IPv4 router.
#[derive(Parser)]
#[command(name = "toy-router")]
#[command(version)]
#[command(about = "Minimal two-interface IPv4 router")]
struct Args {
    /// First interface: a kernel interface name or tap:NAME,MAC,ADDR/PREFIX
    first: InterfaceSpec,

    /// Second interface, same format as the first
    second: InterfaceSpec,

    /// Gateway for destinations outside both attached subnets
    #[arg(long, default_value_t = DEFAULT_NEXT_ROUTER)]
    next_router: Ipv4Addr,

    /// Log every forwarding decision and dump received frames
    #[arg(long)]
    debug: bool,

    /// Put raw-socket interfaces into promiscuous mode
    #[arg(long)]
    promiscuous: bool,
}

static SHUTDOWN: OnceLock<Arc<AtomicBool>> = OnceLock::new();

extern "C" fn shutdown_handler(_: i32) {
    if let Some(flag) = SHUTDOWN.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

fn setup_signal_handlers(flag: Arc<AtomicBool>) -> Result<()> {
    let _ = SHUTDOWN.set(flag);
    unsafe {
        for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT] {
            signal(sig, SigHandler::Handler(shutdown_handler))
                .with_context(|| format!("Failed to install {:?} handler", sig))?;
        }
        signal(Signal::SIGPIPE, SigHandler::SigIgn).context("Failed to ignore SIGPIPE")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let directive = if args.debug { "toy_router=debug" } else { "toy_router=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let config = RouterConfig {
        devices: [args.first, args.second],
        next_router: args.next_router,
        debug: args.debug,
        promiscuous: args.promiscuous,
    };
    info!(next_router = %config.next_router, "toy-router v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let router = Router::new(&config)
        .context("Failed to open interfaces (root privileges are required)")?
        .with_shutdown(shutdown);
    router.run()?;

    info!("Shutdown complete");
    Ok(())
}
