//! Receive loop and flush loop
//!
//! `Router::run` starts the flush loop on its own thread and runs the
//! receive loop on the calling one until the shutdown flag is raised. Both
//! loops wake up periodically to check the flag.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::error::{ForwardError, Result, RouterError};
use crate::packet;
use crate::router::Router;

/// How long the receive loop blocks in poll
pub const POLL_TIMEOUT_MS: i32 = 100;
/// How long the flush loop waits for a notification
pub const FLUSH_WAIT: Duration = Duration::from_secs(1);
/// Receive buffer size; larger frames are truncated by the kernel
pub const RECV_BUFFER_LEN: usize = 2048;

impl Router {
    /// Forward frames until `stop` is called or a port hangs up
    ///
    /// Datagrams still waiting for resolution when the loops exit are dropped.
    pub fn run(&self) -> Result<()> {
        info!(
            first = %self.interface(0).name,
            second = %self.interface(1).name,
            next_router = %self.next_router(),
            "Router started"
        );

        let result = thread::scope(|scope| {
            let flusher = thread::Builder::new()
                .name("flush".to_string())
                .spawn_scoped(scope, || self.flush_loop())
                .map_err(RouterError::Thread)?;

            let result = self.dispatch_loop();
            self.stop();
            if flusher.join().is_err() {
                error!("Flush thread panicked");
            }
            result
        });

        info!("Router stopped");
        result
    }

    fn dispatch_loop(&self) -> Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        let mut fds = [
            libc::pollfd {
                fd: self.interface(0).raw_fd(),
                events: libc::POLLIN | libc::POLLERR,
                revents: 0,
            },
            libc::pollfd {
                fd: self.interface(1).raw_fd(),
                events: libc::POLLIN | libc::POLLERR,
                revents: 0,
            },
        ];

        while !self.is_stopped() {
            for fd in fds.iter_mut() {
                fd.revents = 0;
            }

            // Poll with a timeout so the shutdown flag is noticed
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_TIMEOUT_MS) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %err, "poll failed");
                return Err(RouterError::Poll(err));
            }
            if ret == 0 {
                continue;
            }

            for (device, fd) in fds.iter().enumerate() {
                if fd.revents & (libc::POLLIN | libc::POLLERR) != 0 {
                    self.receive(device, &mut buf);
                }
                // Reported on every poll from now on; the port is gone
                if fd.revents & (libc::POLLHUP | libc::POLLNVAL) != 0 {
                    let name = self.interface(device).name.clone();
                    error!(device = %name, revents = fd.revents, "Interface hung up");
                    return Err(RouterError::Hangup(name));
                }
            }
        }
        Ok(())
    }

    fn receive(&self, device: usize, buf: &mut [u8]) {
        let iface = self.interface(device);
        let len = match iface.recv(buf) {
            Ok(0) => return,
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) => {
                error!(device = %iface.name, error = %e, "recv failed");
                return;
            }
        };
        let frame = &buf[..len];

        if self.debug {
            match packet::inspect(frame) {
                Ok(inspection) => debug!(device = %iface.name, len, "{}", inspection),
                Err(e) => debug!(device = %iface.name, len, error = %e, "undecodable frame"),
            }
        }

        match self.handle_frame(device, frame, Instant::now()) {
            Ok(verdict) => trace!(device = %iface.name, ?verdict, "Handled frame"),
            Err(ForwardError::NotForUs(dst)) => trace!(device = %iface.name, %dst, "Not for us"),
            Err(e @ ForwardError::ChecksumMismatch(_)) => warn!(device = %iface.name, error = %e, "Dropped frame"),
            Err(e) => debug!(device = %iface.name, error = %e, "Dropped frame"),
        }
    }

    fn flush_loop(&self) {
        debug!("Flush loop started");
        while !self.is_stopped() {
            if let Some(notification) = self.send_queue().pop_timeout(FLUSH_WAIT) {
                let sent = self.flush(notification) + self.flush_ready();
                debug!(sent, "Flushed resolved entries");
            }
        }
        debug!("Flush loop stopped");
    }
}
