//! Error types for the fatal paths: startup configuration, capture and the CSV log.
//!
//! Decoding has no error type. A malformed frame is a valid `Packet` with
//! protocol `Unknown`, never a failure.

use std::path::PathBuf;

/// Failures of the raw capture handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The requested interface does not exist.
    #[error("interface not found: {0}")]
    NotFound(String),

    /// The process lacks the privileges to open a raw capture.
    #[error("permission denied: {0} (try running as root or with CAP_NET_RAW)")]
    PermissionDenied(String),

    /// Any other failure from the capture layer.
    #[error("capture I/O error: {0}")]
    Io(String),
}

impl CaptureError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::NotFound(_) => "NotFound",
            CaptureError::PermissionDenied(_) => "PermissionDenied",
            CaptureError::Io(_) => "Io",
        }
    }

    /// Sort a libpcap error message into the three capture failure kinds.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("no such device")
            || lower.contains("doesn't exist")
            || lower.contains("does not exist")
        {
            CaptureError::NotFound(message)
        } else if lower.contains("permission") || lower.contains("not permitted") {
            CaptureError::PermissionDenied(message)
        } else {
            CaptureError::Io(message)
        }
    }
}

impl From<pcap::Error> for CaptureError {
    fn from(err: pcap::Error) -> Self {
        CaptureError::classify(err.to_string())
    }
}

/// Problems with the configuration, detected before capture starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("interface name must not be empty")]
    EmptyInterface,

    #[error("interface name {name:?} is longer than {max} characters")]
    InterfaceTooLong { name: String, max: usize },

    #[error("filter expression is {len} bytes, at most {max} are allowed")]
    FilterTooLong { len: usize, max: usize },

    #[error("log file path must not be empty")]
    EmptyLogPath,

    #[error("--require-promiscuous needs --promiscuous")]
    PromiscuousRequiredButDisabled,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("snaplen {snaplen} outside the supported range {min}..={max}")]
    SnaplenOutOfRange { snaplen: usize, min: usize, max: usize },

    #[error("could not find a default interface: {0}")]
    NoDefaultInterface(String),
}

/// The CSV packet log could not be opened or written.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("could not create log file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write packet log: {0}")]
    Write(#[from] std::io::Error),
}
