//! Resolution notifications handed from the dispatcher to the flush loop
//!
//! A notification names a cache slot whose pending datagrams can now be sent.
//! At most one notification per (device, slot) is outstanding at a time.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Notification {
    /// Index of the outgoing interface
    pub device: usize,
    pub slot: usize,
    /// Address the slot held when the notification was raised
    pub addr: Ipv4Addr,
}

pub struct SendQueue {
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    outstanding: Mutex<HashSet<(usize, usize)>>,
}

impl SendQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        SendQueue {
            tx,
            rx,
            outstanding: Mutex::new(HashSet::new()),
        }
    }

    /// Queue a notification and wake the consumer
    ///
    /// Returns false if one for the same slot is already waiting.
    pub fn push(&self, notification: Notification) -> bool {
        let mut outstanding = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (notification.device, notification.slot);
        if !outstanding.insert(key) {
            return false;
        }
        if self.tx.send(notification).is_err() {
            outstanding.remove(&key);
            return false;
        }
        true
    }

    /// Wait at most `timeout` for the next notification
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Notification> {
        let notification = self.rx.recv_timeout(timeout).ok()?;
        self.complete(&notification);
        Some(notification)
    }

    /// Take the next notification if one is ready
    pub fn try_pop(&self) -> Option<Notification> {
        let notification = self.rx.try_recv().ok()?;
        self.complete(&notification);
        Some(notification)
    }

    /// Number of notifications waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    fn complete(&self, notification: &Notification) {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(notification.device, notification.slot));
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}
