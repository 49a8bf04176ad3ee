// Decoded frame representation shared by the parser, stats and output sinks.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

/// 6-byte link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Capture time with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub secs: i64,
    pub micros: u32,
}

impl Timestamp {
    pub fn new(secs: i64, micros: i64) -> Self {
        Self {
            secs,
            micros: micros.clamp(0, 999_999) as u32,
        }
    }
}

/// Network-layer protocol tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Unknown,
}

impl Protocol {
    pub const ICMP_NUMBER: u8 = 1;
    pub const TCP_NUMBER: u8 = 6;
    pub const UDP_NUMBER: u8 = 17;

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport source/destination ports (TCP and UDP only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub src: u16,
    pub dst: u16,
}

/// The six classic TCP control bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub rst: bool,
    pub psh: bool,
    pub urg: bool,
}

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;

    /// Build from byte 13 of the TCP header.
    pub fn from_byte(bits: u8) -> Self {
        Self {
            syn: bits & Self::SYN != 0,
            ack: bits & Self::ACK != 0,
            fin: bits & Self::FIN != 0,
            rst: bits & Self::RST != 0,
            psh: bits & Self::PSH != 0,
            urg: bits & Self::URG != 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let named = [
            (self.syn, "SYN"),
            (self.ack, "ACK"),
            (self.fin, "FIN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.urg, "URG"),
        ];
        let mut first = true;
        for (set, name) in named {
            if !set {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Bytes of one link-layer frame as handed over by a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub timestamp: Timestamp,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, timestamp: Timestamp) -> Self {
        Self { data, timestamp }
    }
}

/// One decoded frame. Borrows its payload view from the captured bytes, so it
/// cannot outlive the frame it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet<'a> {
    pub timestamp: Timestamp,
    /// Number of bytes captured for this frame.
    pub size: usize,
    pub src_mac: Option<MacAddr>,
    pub dst_mac: Option<MacAddr>,
    pub ether_type: Option<u16>,
    pub protocol: Protocol,
    pub src_ip: Option<Ipv4Addr>,
    pub dst_ip: Option<Ipv4Addr>,
    /// Present only for TCP and UDP.
    pub ports: Option<PortPair>,
    /// Present only for TCP.
    pub tcp_flags: Option<TcpFlags>,
    /// At most `MAX_PAYLOAD_SIZE` bytes of transport payload.
    pub payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// A packet with nothing decoded beyond its size and timestamp.
    pub fn unknown(timestamp: Timestamp, size: usize) -> Self {
        Self {
            timestamp,
            size,
            src_mac: None,
            dst_mac: None,
            ether_type: None,
            protocol: Protocol::Unknown,
            src_ip: None,
            dst_ip: None,
            ports: None,
            tcp_flags: None,
            payload: &[],
        }
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    pub fn src_port(&self) -> u16 {
        self.ports.map_or(0, |p| p.src)
    }

    pub fn dst_port(&self) -> u16 {
        self.ports.map_or(0, |p| p.dst)
    }
}
