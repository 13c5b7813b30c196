//! Per-interface address resolution cache
//!
//! A growable table of slots scanned linearly on every lookup. Each slot maps
//! an IPv4 address to a hardware address and holds the datagrams waiting for
//! that address to be resolved. The scan doubles as the aging sweep:
//! - Resolved entries idle for more than 60 s are reclaimed
//! - Negative entries (request sent, no answer yet) are reclaimed after 1 s
//!
//! Reclaiming an entry drops its pending datagrams.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::network::ethernet::MacAddr;

pub const RESOLVED_TIMEOUT: Duration = Duration::from_secs(60);
pub const NEGATIVE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Free,
    Resolved,
    Negative,
}

/// A frame waiting for its next hop to be resolved
///
/// The frame bytes are kept exactly as received; `ttl` is the value to
/// write when the frame is finally sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPacket {
    pub frame: Vec<u8>,
    pub ttl: u8,
    pub queued_at: Instant,
}

#[derive(Debug)]
pub struct ArpEntry {
    pub state: EntryState,
    pub addr: Ipv4Addr,
    /// Valid only while `state` is `Resolved`
    pub hwaddr: MacAddr,
    pub last_update: Instant,
    pub pending: VecDeque<PendingPacket>,
}

impl ArpEntry {
    fn expired(&self, now: Instant) -> bool {
        let idle = now.saturating_duration_since(self.last_update);
        match self.state {
            EntryState::Free => false,
            EntryState::Resolved => idle > RESOLVED_TIMEOUT,
            EntryState::Negative => idle > NEGATIVE_TIMEOUT,
        }
    }

    fn reclaim(&mut self) {
        self.state = EntryState::Free;
        self.hwaddr = MacAddr::ZERO;
        self.pending.clear();
    }
}

/// Outcome of `ArpTable::lookup_or_create`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub slot: usize,
    pub state: EntryState,
    pub hwaddr: MacAddr,
    /// The entry did not exist before this call
    pub created: bool,
    /// Datagrams queued on the entry
    pub pending: usize,
}

#[derive(Debug, Default)]
pub struct ArpTable {
    slots: Vec<ArpEntry>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the entry for `addr`, creating it when missing
    ///
    /// With `observed` set the entry becomes Resolved to that address (an ARP
    /// message from `addr` was seen). Without it the call is a query: a live
    /// entry is returned as is, a Resolved hit having its timestamp refreshed,
    /// and a missing one is created Negative.
    pub fn lookup_or_create(&mut self, addr: Ipv4Addr, observed: Option<MacAddr>, now: Instant) -> Lookup {
        let mut free = None;
        let mut matched = None;

        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if entry.state != EntryState::Free && entry.addr == addr {
                if observed.is_some() || !entry.expired(now) {
                    matched = Some(slot);
                    continue;
                }
            }
            if entry.expired(now) {
                debug!(slot, addr = %entry.addr, dropped = entry.pending.len(), "Aged out ARP entry");
                entry.reclaim();
            }
            if entry.state == EntryState::Free && free.is_none() {
                free = Some(slot);
            }
        }

        if let Some(slot) = matched {
            let entry = &mut self.slots[slot];
            match observed {
                Some(hwaddr) => {
                    entry.state = EntryState::Resolved;
                    entry.hwaddr = hwaddr;
                    entry.last_update = now;
                }
                None if entry.state == EntryState::Resolved => entry.last_update = now,
                None => {}
            }
            return Self::describe(slot, entry, false);
        }

        let (state, hwaddr) = match observed {
            Some(hwaddr) => (EntryState::Resolved, hwaddr),
            None => (EntryState::Negative, MacAddr::ZERO),
        };
        let fresh = ArpEntry {
            state,
            addr,
            hwaddr,
            last_update: now,
            pending: VecDeque::new(),
        };
        let slot = match free {
            Some(slot) => {
                self.slots[slot] = fresh;
                slot
            }
            None => {
                self.slots.push(fresh);
                self.slots.len() - 1
            }
        };
        Self::describe(slot, &self.slots[slot], true)
    }

    fn describe(slot: usize, entry: &ArpEntry, created: bool) -> Lookup {
        Lookup {
            slot,
            state: entry.state,
            hwaddr: entry.hwaddr,
            created,
            pending: entry.pending.len(),
        }
    }

    /// Queue a datagram on an entry returned by `lookup_or_create`
    pub fn enqueue(&mut self, slot: usize, packet: PendingPacket) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.pending.push_back(packet);
        }
    }

    /// Take the oldest datagram queued for `addr` in `slot`, with the
    /// hardware address to send it to
    ///
    /// Returns `None` when the queue is empty or when the slot no longer
    /// holds a resolved entry for `addr`.
    pub fn take_pending(&mut self, slot: usize, addr: Ipv4Addr) -> Option<(PendingPacket, MacAddr)> {
        let entry = self.slots.get_mut(slot)?;
        if entry.state != EntryState::Resolved || entry.addr != addr {
            return None;
        }
        let packet = entry.pending.pop_front()?;
        Some((packet, entry.hwaddr))
    }

    pub fn entry(&self, slot: usize) -> Option<&ArpEntry> {
        self.slots.get(slot)
    }

    /// Live (non-Free) entry for `addr`, without touching timestamps
    pub fn get(&self, addr: Ipv4Addr) -> Option<&ArpEntry> {
        self.slots
            .iter()
            .find(|entry| entry.state != EntryState::Free && entry.addr == addr)
    }

    /// Number of slots ever allocated
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// The table of one interface, shared by the dispatcher and the flush loop
#[derive(Debug, Default)]
pub struct ArpCache {
    table: Mutex<ArpTable>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ArpTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
