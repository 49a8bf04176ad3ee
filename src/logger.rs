//! CSV packet log.
//!
//! One header line, then one record per packet:
//! `YYYY-MM-DD HH:MM:SS.uuuuuu,PROTO,src_ip,src_port,dst_ip,dst_port,size`.
//! Records are flushed as they are written so the file can be tailed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::Path;

use chrono::{Local, TimeZone};

use crate::error::LogError;
use crate::models::{Packet, Timestamp};

pub const CSV_HEADER: &str =
    "Timestamp,Protocol,Source IP,Source Port,Destination IP,Destination Port,Size\n";

/// `YYYY-MM-DD HH:MM:SS.uuuuuu` in the given time zone.
pub fn format_timestamp<Tz: TimeZone>(ts: Timestamp, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let seconds = match tz.timestamp_opt(ts.secs, 0).earliest() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "0000-00-00 00:00:00".to_string(),
    };
    format!("{seconds}.{:06}", ts.micros)
}

fn format_addr(addr: Option<Ipv4Addr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_default()
}

/// One CSV record, newline included.
pub fn format_record<Tz: TimeZone>(packet: &Packet<'_>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{},{},{},{},{},{},{}\n",
        format_timestamp(packet.timestamp, tz),
        packet.protocol.as_str(),
        format_addr(packet.src_ip),
        packet.src_port(),
        format_addr(packet.dst_ip),
        packet.dst_port(),
        packet.size,
    )
}

pub struct CsvLogger<W: Write> {
    out: W,
}

impl CsvLogger<BufWriter<File>> {
    /// Create (truncate) `path` and write the header line.
    pub fn create(path: &Path) -> Result<Self, LogError> {
        let file = File::create(path).map_err(|source| LogError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvLogger<W> {
    pub fn new(mut out: W) -> Result<Self, LogError> {
        out.write_all(CSV_HEADER.as_bytes())?;
        out.flush()?;
        Ok(Self { out })
    }

    pub fn log_packet(&mut self, packet: &Packet<'_>) -> Result<(), LogError> {
        self.out
            .write_all(format_record(packet, &Local).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
