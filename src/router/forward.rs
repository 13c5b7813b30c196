//! Forwarding decisions
//!
//! A received frame goes through decode, checksum validation, the TTL check,
//! route selection and next-hop resolution. It then ends up sent right away,
//! queued until its next hop is resolved, or dropped. Frames are never
//! modified in the receive buffer: forwarded copies are rewritten (addresses,
//! TTL, header checksum) just before they are sent.

use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::ForwardError;
use crate::network::arp::ArpPacket;
use crate::network::ethernet::{rewrite_addresses, EthernetHeader, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use crate::network::icmp::build_time_exceeded;
use crate::network::ipv4::{rewrite_ttl, Ipv4Packet};
use crate::router::arp_cache::{EntryState, PendingPacket};
use crate::router::send_queue::Notification;
use crate::router::Router;

/// What happened to a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// ARP message whose sender was recorded; `answered` if we replied to it
    ArpLearned { addr: Ipv4Addr, answered: bool },
    /// Sent out of `device` to a known next hop
    Forwarded { device: usize, next_hop: Ipv4Addr },
    /// Waiting for `next_hop` to be resolved on `device`
    Queued {
        device: usize,
        next_hop: Ipv4Addr,
        arp_request_sent: bool,
    },
    /// TTL ran out; an ICMP Time Exceeded went back to the sender
    TimeExceeded,
    /// Addressed to the router itself
    LocalDelivery,
    /// Neither IPv4 nor an ARP request or reply; carries the ethertype
    Ignored(u16),
}

impl Router {
    /// Run one received frame through the forwarding state machine
    ///
    /// `now` drives cache aging. Errors mean the frame was dropped without
    /// touching any state.
    pub fn handle_frame(&self, device: usize, frame: &[u8], now: Instant) -> Result<Verdict, ForwardError> {
        let iface = self.interface(device);
        let (eth, rest) = EthernetHeader::parse(frame)?;
        if !iface.accepts(eth.dst, eth.ethertype == ETHERTYPE_ARP) {
            return Err(ForwardError::NotForUs(eth.dst));
        }

        match eth.ethertype {
            ETHERTYPE_ARP => self.handle_arp(device, rest, now),
            ETHERTYPE_IPV4 => self.handle_ipv4(device, &eth, frame, rest, now),
            other => Ok(Verdict::Ignored(other)),
        }
    }

    fn handle_arp(&self, device: usize, data: &[u8], now: Instant) -> Result<Verdict, ForwardError> {
        let arp = ArpPacket::parse(data)?;
        let iface = self.interface(device);
        debug!(
            device = %iface.name,
            op = arp.op,
            sender = %arp.sender_ip,
            hwaddr = %arp.sender_mac,
            target = %arp.target_ip,
            "ARP"
        );
        if !arp.is_request() && !arp.is_reply() {
            return Ok(Verdict::Ignored(ETHERTYPE_ARP));
        }

        if !arp.sender_ip.is_unspecified() {
            self.learn(device, arp.sender_ip, arp.sender_mac, now);
        }

        let answered = iface.answers_arp && arp.is_request() && arp.target_ip == iface.addr;
        if answered {
            let reply = arp.reply_from(iface.hwaddr);
            self.transmit(device, &reply.to_frame(arp.sender_mac), "ARP reply");
        }

        Ok(Verdict::ArpLearned {
            addr: arp.sender_ip,
            answered,
        })
    }

    /// Record an observed address and wake the flush loop if datagrams wait on it
    fn learn(&self, device: usize, addr: Ipv4Addr, hwaddr: MacAddr, now: Instant) {
        let mut table = self.cache(device).lock();
        let lookup = table.lookup_or_create(addr, Some(hwaddr), now);
        if lookup.pending > 0 {
            let queued = self.send_queue().push(Notification {
                device,
                slot: lookup.slot,
                addr,
            });
            debug!(device, slot = lookup.slot, %addr, pending = lookup.pending, queued, "Resolved pending entry");
        }
    }

    fn handle_ipv4(
        &self,
        device: usize,
        eth: &EthernetHeader,
        frame: &[u8],
        data: &[u8],
        now: Instant,
    ) -> Result<Verdict, ForwardError> {
        let packet = Ipv4Packet::parse(data)?;
        let header = &packet.header;
        if !packet.checksum_ok() {
            return Err(ForwardError::ChecksumMismatch(header.src_addr));
        }

        let iface = self.interface(device);
        if header.ttl <= 1 {
            debug!(device = %iface.name, src = %header.src_addr, dst = %header.dst_addr, "TTL exceeded");
            let reply = build_time_exceeded(iface.hwaddr, iface.addr, eth.src, &packet);
            self.transmit(device, &reply, "ICMP time exceeded");
            return Ok(Verdict::TimeExceeded);
        }

        let dst = header.dst_addr;
        if self.interfaces().iter().any(|iface| iface.addr == dst) {
            debug!(device = %iface.name, src = %header.src_addr, %dst, "Local delivery");
            return Ok(Verdict::LocalDelivery);
        }

        let out = 1 - device;
        let out_iface = self.interface(out);
        let next_hop = if out_iface.is_same_network(dst) {
            dst
        } else {
            self.next_router()
        };
        let ttl = header.ttl - 1;

        let mut table = self.cache(out).lock();
        let lookup = table.lookup_or_create(next_hop, None, now);
        if lookup.state == EntryState::Resolved && lookup.pending == 0 {
            drop(table);
            self.send_rewritten(out, frame.to_vec(), lookup.hwaddr, ttl);
            return Ok(Verdict::Forwarded { device: out, next_hop });
        }

        table.enqueue(
            lookup.slot,
            PendingPacket {
                frame: frame.to_vec(),
                ttl,
                queued_at: now,
            },
        );
        drop(table);
        debug!(device = %out_iface.name, %next_hop, slot = lookup.slot, "Queued until resolved");

        if lookup.created {
            let request = ArpPacket::request(out_iface.hwaddr, out_iface.addr, next_hop);
            self.transmit(out, &request.to_frame(MacAddr::BROADCAST), "ARP request");
        }

        Ok(Verdict::Queued {
            device: out,
            next_hop,
            arp_request_sent: lookup.created,
        })
    }

    /// Send every datagram queued on the entry named by `notification`
    ///
    /// Returns how many were sent. A notification whose slot has since been
    /// reclaimed or reused for another address sends nothing.
    pub fn flush(&self, notification: Notification) -> usize {
        let Notification { device, slot, addr } = notification;
        let mut sent = 0;
        loop {
            let next = self.cache(device).lock().take_pending(slot, addr);
            let Some((packet, hwaddr)) = next else {
                break;
            };
            debug!(
                device,
                slot,
                %addr,
                waited_ms = packet.queued_at.elapsed().as_millis() as u64,
                "Flushing queued datagram"
            );
            self.send_rewritten(device, packet.frame, hwaddr, packet.ttl);
            sent += 1;
        }

        if sent == 0 {
            debug!(device, slot, %addr, "Nothing to flush");
        }
        sent
    }

    /// Flush every notification that is ready without waiting
    pub fn flush_ready(&self) -> usize {
        let mut sent = 0;
        while let Some(notification) = self.send_queue().try_pop() {
            sent += self.flush(notification);
        }
        sent
    }

    fn send_rewritten(&self, device: usize, mut frame: Vec<u8>, hwaddr: MacAddr, ttl: u8) {
        rewrite_addresses(&mut frame, hwaddr, self.interface(device).hwaddr);
        rewrite_ttl(&mut frame, ttl);
        self.transmit(device, &frame, "forward");
    }

    fn transmit(&self, device: usize, frame: &[u8], what: &str) {
        let iface = self.interface(device);
        match iface.send(frame) {
            Ok(len) => debug!(device = %iface.name, len, what, "Sent"),
            Err(e) => warn!(device = %iface.name, error = %e, what, "Send failed"),
        }
    }
}
