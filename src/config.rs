//! Command-line surface and validated runtime configuration.
//!
//! `Cli` is what clap parses; `ZimConfig` is what the rest of the program
//! consumes after [`ZimConfig::from_cli`] has checked it.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;

/// Largest frame the capture handle will hand over.
pub const MAX_PACKET_SIZE: usize = 65536;

/// Cap on the payload view carried by a decoded packet.
pub const MAX_PAYLOAD_SIZE: usize = 1500;

/// Number of distinct source addresses tracked for the top-sources table.
pub const TOP_SOURCES_CAPACITY: usize = 10;

pub const MAX_INTERFACE_LEN: usize = 32;
pub const MAX_FILTER_LEN: usize = 256;

/// Sleep between loop iterations (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Minimum time between redraws of the statistics and graph views (milliseconds).
pub const STATS_REFRESH_INTERVAL_MS: u64 = 1000;

/// Which screen the display renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ViewMode {
    /// Scrolling list of captured packets.
    #[default]
    Packets,
    /// Packet counts and protocol breakdown.
    Stats,
    /// Bar graph of the top source addresses.
    Graph,
}

#[derive(Debug, Parser)]
#[command(name = "zim", version, about = "Network Packet Sniffer & Analyzer")]
pub struct Cli {
    /// Network interface (default: first non-loopback interface that is up)
    #[arg(short = 'i', long, env = "ZIM_INTERFACE")]
    pub interface: Option<String>,

    /// Filter expression (accepted, currently matches every packet)
    #[arg(short = 'f', long)]
    pub filter: Option<String>,

    /// Log packets to this CSV file
    #[arg(short = 'l', long = "log-file", env = "ZIM_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Stop after this many packets (0 = capture indefinitely)
    #[arg(short = 'c', long, default_value_t = 0)]
    pub count: u64,

    /// Put the interface in promiscuous mode
    #[arg(short = 'p', long)]
    pub promiscuous: bool,

    /// Fail instead of falling back when promiscuous mode cannot be enabled
    #[arg(long)]
    pub require_promiscuous: bool,

    /// Show MAC addresses, TCP flags and a payload preview for each packet
    #[arg(short = 'd', long)]
    pub detailed: bool,

    /// In detailed view, dump the whole payload preview as hex/ASCII
    #[arg(long)]
    pub hexdump: bool,

    /// Initial display view
    #[arg(long, value_enum, default_value_t = ViewMode::Packets)]
    pub view: ViewMode,

    /// Disable ANSI colors
    #[arg(long)]
    pub no_color: bool,

    /// Sleep between capture polls, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Capture snapshot length in bytes
    #[arg(long, default_value_t = MAX_PACKET_SIZE)]
    pub snaplen: usize,

    /// Print the final statistics as JSON on exit
    #[arg(long)]
    pub summary_json: bool,
}

/// Display options handed to [`crate::display::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub view: ViewMode,
    pub detailed: bool,
    pub hexdump: bool,
    pub color: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            view: ViewMode::Packets,
            detailed: false,
            hexdump: false,
            color: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZimConfig {
    /// `None` means pick a default interface at startup.
    pub interface: Option<String>,
    pub filter: Option<String>,
    pub log_file: Option<PathBuf>,
    /// 0 = unbounded.
    pub packet_count: u64,
    pub promiscuous: bool,
    pub require_promiscuous: bool,
    pub snaplen: usize,
    pub poll_interval: Duration,
    pub display: DisplayOptions,
    pub summary_json: bool,
}

impl ZimConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if let Some(name) = cli.interface.as_deref() {
            validate_interface(name)?;
        }

        if let Some(filter) = cli.filter.as_deref() {
            if filter.len() >= MAX_FILTER_LEN {
                return Err(ConfigError::FilterTooLong {
                    len: filter.len(),
                    max: MAX_FILTER_LEN - 1,
                });
            }
        }

        if let Some(path) = cli.log_file.as_ref() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyLogPath);
            }
        }

        if cli.require_promiscuous && !cli.promiscuous {
            return Err(ConfigError::PromiscuousRequiredButDisabled);
        }

        if cli.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        if !(MAX_PAYLOAD_SIZE..=MAX_PACKET_SIZE).contains(&cli.snaplen) {
            return Err(ConfigError::SnaplenOutOfRange {
                snaplen: cli.snaplen,
                min: MAX_PAYLOAD_SIZE,
                max: MAX_PACKET_SIZE,
            });
        }

        // An empty filter is the same as no filter.
        let filter = cli.filter.filter(|f| !f.is_empty());

        Ok(Self {
            interface: cli.interface,
            filter,
            log_file: cli.log_file,
            packet_count: cli.count,
            promiscuous: cli.promiscuous,
            require_promiscuous: cli.require_promiscuous,
            snaplen: cli.snaplen,
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            display: DisplayOptions {
                view: cli.view,
                detailed: cli.detailed,
                hexdump: cli.hexdump,
                color: !cli.no_color,
            },
            summary_json: cli.summary_json,
        })
    }

    /// `None` when the capture is unbounded.
    pub fn packet_limit(&self) -> Option<u64> {
        (self.packet_count > 0).then_some(self.packet_count)
    }
}

pub fn validate_interface(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyInterface);
    }
    if name.len() >= MAX_INTERFACE_LEN {
        return Err(ConfigError::InterfaceTooLong {
            name: name.to_string(),
            max: MAX_INTERFACE_LEN - 1,
        });
    }
    Ok(())
}
