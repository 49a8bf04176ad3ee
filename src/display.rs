//! Terminal output: a scrolling packet list, a statistics screen and a
//! top-sources bar graph. Everything goes through a generic writer so the
//! rendering can be checked without a terminal.

use std::io::{self, Stdout, Write};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use chrono::{Local, TimeZone};

use crate::config::{DisplayOptions, ViewMode, STATS_REFRESH_INTERVAL_MS};
use crate::models::{Packet, Protocol};
use crate::stats::StatsSnapshot;

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";
const BOLD: &str = "\x1b[1m";

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const CURSOR_HOME: &str = "\x1b[H";

const GRAPH_WIDTH: u64 = 50;
const PREVIEW_BYTES: usize = 16;

/// Human-readable byte count: `1.50 KB`, `3.00 MB`, ...
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

/// Classic 16-bytes-per-row dump: offset, hex (split after 8 bytes), ASCII.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:04x}: ", row * 16));
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => out.push_str(&format!("{b:02x} ")),
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for i in 0..16 {
            out.push(match chunk.get(i) {
                Some(&b) if b.is_ascii_graphic() || b == b' ' => b as char,
                Some(_) => '.',
                None => ' ',
            });
        }
        out.push_str("|\n");
    }
    out
}

fn protocol_style(protocol: Protocol) -> (&'static str, &'static str) {
    match protocol {
        Protocol::Tcp => (BLUE, "TCP"),
        Protocol::Udp => (GREEN, "UDP"),
        Protocol::Icmp => (YELLOW, "ICMP"),
        Protocol::Unknown => (WHITE, "???"),
    }
}

fn addr_or_dash(addr: Option<Ipv4Addr>) -> String {
    addr.map_or_else(|| "-".to_string(), |a| a.to_string())
}

pub struct Display<W: Write> {
    out: W,
    options: DisplayOptions,
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
}

impl Display<Stdout> {
    pub fn stdout(options: DisplayOptions) -> Self {
        Self::new(io::stdout(), options)
    }
}

impl<W: Write> Display<W> {
    pub fn new(out: W, options: DisplayOptions) -> Self {
        Self {
            out,
            options,
            refresh_interval: Duration::from_millis(STATS_REFRESH_INTERVAL_MS),
            last_refresh: None,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn options(&self) -> DisplayOptions {
        self.options
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.options.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn control(&mut self, sequence: &str) -> io::Result<()> {
        if self.options.color {
            self.out.write_all(sequence.as_bytes())?;
        }
        Ok(())
    }

    pub fn banner(&mut self, interface: &str) -> io::Result<()> {
        self.control(CLEAR_SCREEN)?;
        let title = self.paint(BOLD, "Zim - Network Packet Sniffer & Analyzer");
        writeln!(self.out, "{title} v{}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "----------------------------------------")?;
        writeln!(self.out, "Using interface: {interface}")?;
        writeln!(self.out, "Press Ctrl+C to stop\n")?;
        self.out.flush()
    }

    /// One summary line for `packet`, with the time rendered in `tz`.
    pub fn packet_line<Tz: TimeZone>(&self, packet: &Packet<'_>, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let time = tz
            .timestamp_opt(packet.timestamp.secs, 0)
            .earliest()
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let (color, proto) = protocol_style(packet.protocol);
        format!(
            "{} {} {}:{} -> {}:{} {} bytes",
            self.paint(CYAN, &format!("[{time}]")),
            self.paint(color, proto),
            self.paint(BOLD, &addr_or_dash(packet.src_ip)),
            packet.src_port(),
            addr_or_dash(packet.dst_ip),
            packet.dst_port(),
            packet.size,
        )
    }

    /// Extra lines shown in detailed view.
    pub fn packet_details(&self, packet: &Packet<'_>) -> String {
        let mut out = String::new();
        if let (Some(src), Some(dst)) = (packet.src_mac, packet.dst_mac) {
            out.push_str(&format!("  MAC: {src} -> {dst}\n"));
        }
        if let Some(flags) = packet.tcp_flags {
            out.push_str(&format!("  Flags: {flags}\n"));
        }
        if packet.payload_size() > 0 {
            if self.options.hexdump {
                out.push_str(&format!("  Payload ({} bytes):\n", packet.payload_size()));
                out.push_str(&hex_dump(packet.payload));
            } else {
                let preview: Vec<String> = packet
                    .payload
                    .iter()
                    .take(PREVIEW_BYTES)
                    .map(|b| format!("{b:02X}"))
                    .collect();
                out.push_str(&format!(
                    "  Payload ({} bytes): {}\n",
                    packet.payload_size(),
                    preview.join(" ")
                ));
            }
        }
        out
    }

    /// Print a packet in the list view. Other views ignore individual packets.
    pub fn show_packet(&mut self, packet: &Packet<'_>) -> io::Result<()> {
        if self.options.view != ViewMode::Packets {
            return Ok(());
        }
        let line = self.packet_line(packet, &Local);
        writeln!(self.out, "{line}")?;
        if self.options.detailed {
            let details = self.packet_details(packet);
            write!(self.out, "{details}")?;
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn render_stats(&mut self, snapshot: &StatsSnapshot) -> io::Result<()> {
        let header = self.paint(BOLD, "======== Network Statistics ========");
        writeln!(self.out, "{header}\n")?;
        let total = self.paint(BOLD, &snapshot.total_packets.to_string());
        writeln!(self.out, "Total Packets: {total}")?;
        writeln!(
            self.out,
            "Total Bytes: {} ({})\n",
            snapshot.total_bytes,
            format_bytes(snapshot.total_bytes)
        )?;
        writeln!(self.out, "Protocol Breakdown:")?;
        for (color, label, protocol) in [
            (BLUE, "TCP:", Protocol::Tcp),
            (GREEN, "UDP:", Protocol::Udp),
            (YELLOW, "ICMP:", Protocol::Icmp),
            (WHITE, "Other:", Protocol::Unknown),
        ] {
            let label = self.paint(color, label);
            writeln!(
                self.out,
                "  {} {} ({:.1}%)",
                label,
                snapshot.protocols.get(protocol),
                snapshot.percent(protocol)
            )?;
        }
        Ok(())
    }

    pub fn render_graph(&mut self, snapshot: &StatsSnapshot) -> io::Result<()> {
        let header = self.paint(BOLD, "======== Top IP Sources ========");
        writeln!(self.out, "{header}\n")?;

        let max = snapshot.top_sources.iter().map(|s| s.count).max().unwrap_or(0);
        if max == 0 {
            return writeln!(self.out, "No data available yet.");
        }
        for source in &snapshot.top_sources {
            let width = (source.count.saturating_mul(GRAPH_WIDTH) / max).max(1) as usize;
            writeln!(
                self.out,
                "{:<15} [{:5}] {}",
                source.addr.to_string(),
                source.count,
                "\u{2588}".repeat(width)
            )?;
        }
        Ok(())
    }

    /// Redraw the statistics or graph screen, at most once per refresh interval.
    pub fn refresh(&mut self, snapshot: &StatsSnapshot) -> io::Result<()> {
        if self.options.view == ViewMode::Packets {
            return Ok(());
        }
        if let Some(last) = self.last_refresh {
            if last.elapsed() < self.refresh_interval {
                return Ok(());
            }
        }
        self.last_refresh = Some(Instant::now());

        self.control(CURSOR_HOME)?;
        let view = self.options.view;
        match view {
            ViewMode::Stats => self.render_stats(snapshot)?,
            ViewMode::Graph => self.render_graph(snapshot)?,
            ViewMode::Packets => {}
        }
        self.out.flush()
    }

    /// Final report printed when capture stops.
    pub fn summary(&mut self, snapshot: &StatsSnapshot, processed: u64) -> io::Result<()> {
        writeln!(self.out)?;
        self.render_stats(snapshot)?;
        writeln!(self.out)?;
        self.render_graph(snapshot)?;
        let done = self.paint(GREEN, "Capture complete.");
        writeln!(self.out, "\n{done} Processed {processed} packets.")?;
        self.out.flush()
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        let text = self.paint(RED, message);
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MacAddr, PortPair, TcpFlags, Timestamp};
    use crate::stats::{ProtocolCounts, SourceCount};
    use chrono::Utc;

    fn plain(view: ViewMode, detailed: bool) -> DisplayOptions {
        DisplayOptions {
            view,
            detailed,
            hexdump: false,
            color: false,
        }
    }

    fn tcp_packet(payload: &[u8]) -> Packet<'_> {
        let mut pkt = Packet::unknown(Timestamp::new(3_723, 0), 66);
        pkt.protocol = Protocol::Tcp;
        pkt.src_mac = Some(MacAddr([0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22]));
        pkt.dst_mac = Some(MacAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));
        pkt.src_ip = Some(Ipv4Addr::new(10, 1, 1, 1));
        pkt.dst_ip = Some(Ipv4Addr::new(10, 1, 1, 2));
        pkt.ports = Some(PortPair { src: 22, dst: 60000 });
        pkt.tcp_flags = Some(TcpFlags::from_byte(TcpFlags::SYN | TcpFlags::ACK));
        pkt.payload = payload;
        pkt
    }

    fn snapshot(sources: Vec<SourceCount>) -> StatsSnapshot {
        StatsSnapshot {
            total_packets: 4,
            total_bytes: 2048,
            protocols: ProtocolCounts {
                tcp: 2,
                udp: 1,
                icmp: 0,
                other: 1,
            },
            top_sources: sources,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_bytes(u64::MAX), "16777216.00 TB");
    }

    #[test]
    fn test_hex_dump_layout() {
        let dump = hex_dump(b"GET / HTTP/1.1\r\nHost");
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0000: 47 45 54 20 2f 20 48 54  54 50 2f 31 2e 31 0d 0a  |GET / HTTP/1.1..|"
        );
        assert!(lines[1].starts_with("0010: 48 6f 73 74 "));
        assert!(lines[1].ends_with("|Host            |"));
    }

    #[test]
    fn test_packet_line_plain() {
        let display = Display::new(Vec::new(), plain(ViewMode::Packets, false));
        let line = display.packet_line(&tcp_packet(&[]), &Utc);
        assert_eq!(line, "[01:02:03] TCP 10.1.1.1:22 -> 10.1.1.2:60000 66 bytes");
    }

    #[test]
    fn test_packet_line_unknown_protocol() {
        let display = Display::new(Vec::new(), plain(ViewMode::Packets, false));
        let pkt = Packet::unknown(Timestamp::new(0, 0), 10);
        let line = display.packet_line(&pkt, &Utc);
        assert_eq!(line, "[00:00:00] ??? -:0 -> -:0 10 bytes");
    }

    #[test]
    fn test_packet_line_colored() {
        let options = DisplayOptions {
            color: true,
            ..plain(ViewMode::Packets, false)
        };
        let display = Display::new(Vec::new(), options);
        let line = display.packet_line(&tcp_packet(&[]), &Utc);
        assert!(line.contains(&format!("{BLUE}TCP{RESET}")));
    }

    #[test]
    fn test_details_show_macs_flags_and_preview() {
        let display = Display::new(Vec::new(), plain(ViewMode::Packets, true));
        let payload: Vec<u8> = (0u8..20).collect();
        let details = display.packet_details(&tcp_packet(&payload));
        assert!(details.contains("MAC: AA:BB:CC:00:11:22 -> 01:02:03:04:05:06"));
        assert!(details.contains("Flags: SYN ACK"));
        assert!(details.contains(
            "Payload (20 bytes): 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\n"
        ));
    }

    #[test]
    fn test_details_hexdump() {
        let options = DisplayOptions {
            hexdump: true,
            ..plain(ViewMode::Packets, true)
        };
        let display = Display::new(Vec::new(), options);
        let details = display.packet_details(&tcp_packet(b"abc"));
        assert!(details.contains("0000: 61 62 63"));
    }

    #[test]
    fn test_show_packet_only_in_list_view() {
        let mut list = Display::new(Vec::new(), plain(ViewMode::Packets, false));
        list.show_packet(&tcp_packet(&[])).unwrap();
        assert_eq!(String::from_utf8(list.into_inner()).unwrap().lines().count(), 1);

        let mut stats = Display::new(Vec::new(), plain(ViewMode::Stats, false));
        stats.show_packet(&tcp_packet(&[])).unwrap();
        assert!(stats.into_inner().is_empty());
    }

    #[test]
    fn test_render_stats() {
        let mut display = Display::new(Vec::new(), plain(ViewMode::Stats, false));
        display.render_stats(&snapshot(vec![])).unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert!(text.contains("Total Packets: 4"));
        assert!(text.contains("Total Bytes: 2048 (2.00 KB)"));
        assert!(text.contains("  TCP: 2 (50.0%)"));
        assert!(text.contains("  UDP: 1 (25.0%)"));
        assert!(text.contains("  ICMP: 0 (0.0%)"));
        assert!(text.contains("  Other: 1 (25.0%)"));
    }

    #[test]
    fn test_render_graph_scales_bars() {
        let mut display = Display::new(Vec::new(), plain(ViewMode::Graph, false));
        display
            .render_graph(&snapshot(vec![
                SourceCount { addr: Ipv4Addr::new(10, 0, 0, 1), count: 100 },
                SourceCount { addr: Ipv4Addr::new(10, 0, 0, 2), count: 50 },
                SourceCount { addr: Ipv4Addr::new(10, 0, 0, 3), count: 1 },
            ]))
            .unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        let bars: Vec<usize> = text
            .lines()
            .filter(|l| l.starts_with("10.0.0."))
            .map(|l| l.chars().filter(|&c| c == '\u{2588}').count())
            .collect();
        assert_eq!(bars, vec![50, 25, 1]);
        assert!(text.contains("10.0.0.1        [  100] "));
    }

    #[test]
    fn test_render_graph_empty() {
        let mut display = Display::new(Vec::new(), plain(ViewMode::Graph, false));
        display.render_graph(&snapshot(vec![])).unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert!(text.contains("No data available yet."));
    }

    #[test]
    fn test_refresh_is_throttled() {
        let mut display = Display::new(Vec::new(), plain(ViewMode::Stats, false))
            .with_refresh_interval(Duration::from_secs(3600));
        display.refresh(&snapshot(vec![])).unwrap();
        display.refresh(&snapshot(vec![])).unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(text.matches("Network Statistics").count(), 1);
    }

    #[test]
    fn test_refresh_noop_in_list_view() {
        let mut display = Display::new(Vec::new(), plain(ViewMode::Packets, false));
        display.refresh(&snapshot(vec![])).unwrap();
        assert!(display.into_inner().is_empty());
    }

    #[test]
    fn test_summary_reports_processed() {
        let mut display = Display::new(Vec::new(), plain(ViewMode::Packets, false));
        display.summary(&snapshot(vec![]), 4).unwrap();
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert!(text.contains("Capture complete. Processed 4 packets."));
        assert!(text.contains("Top IP Sources"));
    }
}
