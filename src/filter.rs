//! Packet filter placeholder.
//!
//! The filter expression is accepted and kept verbatim but has no grammar:
//! every packet matches. Real BPF-style filtering would be its own subsystem.

use crate::models::Packet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFilter {
    expression: Option<String>,
}

impl PacketFilter {
    pub fn new(expression: Option<String>) -> Self {
        Self { expression }
    }

    /// A filter with no expression.
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub fn matches(&self, _packet: &Packet<'_>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Protocol, Timestamp};

    #[test]
    fn test_expression_is_kept_verbatim() {
        let filter = PacketFilter::new(Some("tcp and port 22".into()));
        assert_eq!(filter.expression(), Some("tcp and port 22"));
        assert_eq!(PacketFilter::match_all().expression(), None);
    }

    #[test]
    fn test_every_packet_matches() {
        let filter = PacketFilter::new(Some("udp".into()));
        let mut pkt = Packet::unknown(Timestamp::default(), 60);
        assert!(filter.matches(&pkt));
        pkt.protocol = Protocol::Tcp;
        assert!(filter.matches(&pkt));
    }
}
