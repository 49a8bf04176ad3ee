//! Ethernet / IPv4 / TCP / UDP frame decoder.
//!
//! Every input is treated as hostile. Each layer checks the bytes it needs
//! against what is left of the frame before reading a single field, and a
//! header-length field that points past the end of the capture ends the
//! descent. The result is always a [`Packet`]: a short or malformed frame is
//! tagged [`Protocol::Unknown`] and keeps whatever prefix fields were read
//! before the problem.

use std::net::Ipv4Addr;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::models::{MacAddr, Packet, PortPair, Protocol, RawFrame, TcpFlags, Timestamp};

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERTYPE_IPV4: u16 = 0x0800;

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const TCP_MIN_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

/// Valid range of the IPv4 IHL and TCP data offset fields, in 32-bit words.
const HEADER_WORDS: std::ops::RangeInclusive<usize> = 5..=15;

// Bounds-checked field readers. Each one asks the slice for exactly the bytes
// it needs and yields `None` instead of reading past the end.

fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

fn read_u16_be(buf: &[u8], offset: usize) -> Option<u16> {
    read_array::<2>(buf, offset).map(u16::from_be_bytes)
}

fn read_ipv4(buf: &[u8], offset: usize) -> Option<Ipv4Addr> {
    read_array::<4>(buf, offset).map(Ipv4Addr::from)
}

fn read_mac(buf: &[u8], offset: usize) -> Option<MacAddr> {
    read_array::<6>(buf, offset).map(MacAddr)
}

/// Converts a 4-bit word count into a header length, rejecting counts below 5.
fn header_len_from_words(words: u8) -> Option<usize> {
    let words = usize::from(words & 0x0f);
    HEADER_WORDS.contains(&words).then_some(words * 4)
}

fn cap_payload(bytes: &[u8]) -> &[u8] {
    &bytes[..bytes.len().min(MAX_PAYLOAD_SIZE)]
}

#[derive(Debug, Clone, Copy)]
struct EthernetHeader {
    dst: MacAddr,
    src: MacAddr,
    ether_type: u16,
}

impl EthernetHeader {
    fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        Some(Self {
            dst: read_mac(frame, 0)?,
            src: read_mac(frame, 6)?,
            ether_type: read_u16_be(frame, 12)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Ipv4Header {
    header_len: usize,
    protocol: u8,
    src: Ipv4Addr,
    dst: Ipv4Addr,
}

impl Ipv4Header {
    /// `data` starts at the first byte of the IP header.
    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return None;
        }
        let header_len = header_len_from_words(read_u8(data, 0)?)?;
        if header_len > data.len() {
            return None;
        }
        Some(Self {
            header_len,
            protocol: read_u8(data, 9)?,
            src: read_ipv4(data, 12)?,
            dst: read_ipv4(data, 16)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct TcpHeader {
    ports: PortPair,
    header_len: usize,
    flags: TcpFlags,
}

impl TcpHeader {
    /// `data` starts at the first byte of the TCP header.
    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < TCP_MIN_HEADER_LEN {
            return None;
        }
        let header_len = header_len_from_words(read_u8(data, 12)? >> 4)?;
        if header_len > data.len() {
            return None;
        }
        Some(Self {
            ports: PortPair {
                src: read_u16_be(data, 0)?,
                dst: read_u16_be(data, 2)?,
            },
            header_len,
            flags: TcpFlags::from_byte(read_u8(data, 13)?),
        })
    }
}

fn parse_udp_ports(data: &[u8]) -> Option<PortPair> {
    if data.len() < UDP_HEADER_LEN {
        return None;
    }
    Some(PortPair {
        src: read_u16_be(data, 0)?,
        dst: read_u16_be(data, 2)?,
    })
}

/// Decode one captured frame.
///
/// Never fails and never reads outside `data`. The returned packet's payload
/// is a sub-slice of `data`.
pub fn decode(data: &[u8], timestamp: Timestamp) -> Packet<'_> {
    let mut packet = Packet::unknown(timestamp, data.len());

    let Some(eth) = EthernetHeader::parse(data) else {
        return packet;
    };
    packet.src_mac = Some(eth.src);
    packet.dst_mac = Some(eth.dst);
    packet.ether_type = Some(eth.ether_type);
    if eth.ether_type != ETHERTYPE_IPV4 {
        return packet;
    }

    let ip_data = &data[ETHERNET_HEADER_LEN..];
    let Some(ip) = Ipv4Header::parse(ip_data) else {
        return packet;
    };
    packet.src_ip = Some(ip.src);
    packet.dst_ip = Some(ip.dst);

    let transport = &ip_data[ip.header_len..];
    match ip.protocol {
        Protocol::TCP_NUMBER => {
            if let Some(tcp) = TcpHeader::parse(transport) {
                packet.protocol = Protocol::Tcp;
                packet.ports = Some(tcp.ports);
                packet.tcp_flags = Some(tcp.flags);
                packet.payload = cap_payload(&transport[tcp.header_len..]);
            }
        }
        Protocol::UDP_NUMBER => {
            if let Some(ports) = parse_udp_ports(transport) {
                packet.protocol = Protocol::Udp;
                packet.ports = Some(ports);
                packet.payload = cap_payload(&transport[UDP_HEADER_LEN..]);
            }
        }
        Protocol::ICMP_NUMBER => packet.protocol = Protocol::Icmp,
        _ => {}
    }

    packet
}

/// Decode a frame handed over by a capture source.
pub fn decode_frame(frame: &RawFrame) -> Packet<'_> {
    decode(&frame.data, frame.timestamp)
}
