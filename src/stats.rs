//! Cumulative traffic counters and the top-sources table.
//!
//! The sources table has a fixed capacity. Once it is full, addresses that
//! are not already present are no longer admitted, so the table holds the
//! first distinct sources seen rather than the globally most frequent ones.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::config::TOP_SOURCES_CAPACITY;
use crate::models::{Packet, Protocol};

/// One row of the top-sources table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub addr: Ipv4Addr,
    pub count: u64,
}

/// Per-protocol packet counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProtocolCounts {
    pub tcp: u64,
    pub udp: u64,
    pub icmp: u64,
    pub other: u64,
}

impl ProtocolCounts {
    pub fn total(&self) -> u64 {
        self.tcp + self.udp + self.icmp + self.other
    }

    pub fn get(&self, protocol: Protocol) -> u64 {
        match protocol {
            Protocol::Tcp => self.tcp,
            Protocol::Udp => self.udp,
            Protocol::Icmp => self.icmp,
            Protocol::Unknown => self.other,
        }
    }
}

/// Point-in-time copy of the statistics, ranked for display or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub protocols: ProtocolCounts,
    pub top_sources: Vec<SourceCount>,
}

impl StatsSnapshot {
    /// Share of all packets carried by `protocol`, in percent.
    pub fn percent(&self, protocol: Protocol) -> f64 {
        if self.total_packets == 0 {
            return 0.0;
        }
        self.protocols.get(protocol) as f64 * 100.0 / self.total_packets as f64
    }
}

#[derive(Debug)]
pub struct StatsAggregator {
    total_packets: u64,
    total_bytes: u64,
    protocols: ProtocolCounts,
    // Slot order is insertion order; slots are never freed.
    top_sources: Vec<SourceCount>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        StatsAggregator {
            total_packets: 0,
            total_bytes: 0,
            protocols: ProtocolCounts::default(),
            top_sources: Vec::with_capacity(TOP_SOURCES_CAPACITY),
        }
    }

    pub fn record(&mut self, packet: &Packet<'_>) {
        self.total_packets += 1;
        self.total_bytes += packet.size as u64;

        match packet.protocol {
            Protocol::Tcp => self.protocols.tcp += 1,
            Protocol::Udp => self.protocols.udp += 1,
            Protocol::Icmp => self.protocols.icmp += 1,
            Protocol::Unknown => self.protocols.other += 1,
        }

        if let Some(addr) = packet.src_ip {
            self.track_source(addr);
        }
    }

    fn track_source(&mut self, addr: Ipv4Addr) {
        if let Some(entry) = self.top_sources.iter_mut().find(|e| e.addr == addr) {
            entry.count += 1;
        } else if self.top_sources.len() < TOP_SOURCES_CAPACITY {
            self.top_sources.push(SourceCount { addr, count: 1 });
        }
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn protocols(&self) -> ProtocolCounts {
        self.protocols
    }

    /// Occupied source entries in slot order.
    pub fn sources(&self) -> &[SourceCount] {
        &self.top_sources
    }

    /// Source entries sorted by descending count. Ties keep slot order.
    pub fn ranked_snapshot(&self) -> Vec<SourceCount> {
        let mut ranked = self.top_sources.clone();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_packets: self.total_packets,
            total_bytes: self.total_bytes,
            protocols: self.protocols,
            top_sources: self.ranked_snapshot(),
        }
    }
}
