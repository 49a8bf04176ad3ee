// src/sniff.rs
//! Raw link-layer capture over libpcap.
//!
//! This layer only moves bytes: it opens the interface, hands over frames one
//! at a time without blocking, and reports failures. Decoding lives in
//! [`crate::parser`].

use pcap::{Active, Capture, Device, Linktype};

use crate::config::MAX_PACKET_SIZE;
use crate::error::CaptureError;
use crate::models::{RawFrame, Timestamp};

/// Read timeout handed to libpcap (milliseconds). The handle is non-blocking,
/// so this only bounds how long the kernel buffers before a delivery.
const READ_TIMEOUT_MS: i32 = 100;

/// Anything that can hand over raw frames without blocking.
pub trait FrameSource {
    /// `Ok(None)` means no frame is available right now.
    fn receive(&mut self) -> Result<Option<RawFrame>, CaptureError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub interface: String,
    pub promiscuous: bool,
    /// Fail instead of falling back to non-promiscuous capture.
    pub require_promiscuous: bool,
    pub snaplen: usize,
}

impl CaptureOptions {
    pub fn new(interface: impl Into<String>, promiscuous: bool) -> Self {
        Self {
            interface: interface.into(),
            promiscuous,
            require_promiscuous: false,
            snaplen: MAX_PACKET_SIZE,
        }
    }
}

/// Counters reported by libpcap for an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureCounters {
    pub received: u32,
    pub dropped: u32,
    pub if_dropped: u32,
}

/// An open, non-blocking receive handle bound to one interface.
pub struct RawCapture {
    cap: Capture<Active>,
    interface: String,
    promiscuous: bool,
}

impl RawCapture {
    pub fn open(interface: &str, promiscuous: bool) -> Result<Self, CaptureError> {
        Self::open_with(&CaptureOptions::new(interface, promiscuous))
    }

    pub fn open_with(options: &CaptureOptions) -> Result<Self, CaptureError> {
        ensure_device_exists(&options.interface)?;

        let (cap, promiscuous) = match create_capture(options, options.promiscuous) {
            Ok(cap) => (cap, options.promiscuous),
            Err(e) if options.promiscuous && !options.require_promiscuous => {
                tracing::warn!(
                    interface = %options.interface,
                    "could not enable promiscuous mode ({e}), capturing in normal mode"
                );
                (create_capture(options, false)?, false)
            }
            Err(e) => return Err(e),
        };
        let cap = configure_capture(cap)?;

        if promiscuous {
            tracing::info!(interface = %options.interface, "promiscuous mode enabled");
        }

        Ok(Self {
            cap,
            interface: options.interface.clone(),
            promiscuous,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Whether the handle actually runs in promiscuous mode.
    pub fn is_promiscuous(&self) -> bool {
        self.promiscuous
    }

    pub fn receive(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        match self.cap.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                let timestamp = Timestamp::new(ts.tv_sec as i64, ts.tv_usec as i64);
                Ok(Some(RawFrame::new(packet.data.to_vec(), timestamp)))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn counters(&mut self) -> Result<CaptureCounters, CaptureError> {
        let stat = self.cap.stats()?;
        Ok(CaptureCounters {
            received: stat.received,
            dropped: stat.dropped,
            if_dropped: stat.if_dropped,
        })
    }

    /// Release the handle.
    pub fn close(mut self) {
        match self.counters() {
            Ok(c) => tracing::info!(
                interface = %self.interface,
                received = c.received,
                dropped = c.dropped,
                if_dropped = c.if_dropped,
                "capture closed"
            ),
            Err(e) => tracing::debug!("capture counters unavailable: {e}"),
        }
    }
}

impl FrameSource for RawCapture {
    fn receive(&mut self) -> Result<Option<RawFrame>, CaptureError> {
        RawCapture::receive(self)
    }
}

fn ensure_device_exists(name: &str) -> Result<(), CaptureError> {
    match Device::list() {
        Ok(devices) if devices.iter().any(|d| d.name == name) => Ok(()),
        Ok(_) => Err(CaptureError::NotFound(name.to_string())),
        Err(e) => {
            // Let the open call produce the real error.
            tracing::debug!("device listing failed: {e}");
            Ok(())
        }
    }
}

fn create_capture(options: &CaptureOptions, promiscuous: bool) -> Result<Capture<Active>, CaptureError> {
    let snaplen = i32::try_from(options.snaplen).unwrap_or(i32::MAX);
    let cap = Capture::from_device(options.interface.as_str())?
        .promisc(promiscuous)
        .snaplen(snaplen)
        .timeout(READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()?;
    Ok(cap)
}

fn configure_capture(cap: Capture<Active>) -> Result<Capture<Active>, CaptureError> {
    let cap = cap.setnonblock()?;
    let link = cap.get_datalink();
    if link != Linktype::ETHERNET {
        tracing::warn!(
            "datalink is {:?}, not Ethernet; frames will decode as UNKNOWN",
            link
        );
    }
    Ok(cap)
}

/// What interface auto-selection needs to know about a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub loopback: bool,
    pub up: bool,
}

/// First interface that is up and not a loopback.
pub fn pick_default_interface(candidates: &[InterfaceInfo]) -> Option<&str> {
    candidates
        .iter()
        .find(|i| i.up && !i.loopback && i.name != "lo")
        .map(|i| i.name.as_str())
}

pub fn find_default_interface() -> Result<Option<String>, CaptureError> {
    let candidates: Vec<InterfaceInfo> = Device::list()?
        .into_iter()
        .map(|d| InterfaceInfo {
            loopback: d.flags.is_loopback(),
            up: d.flags.is_up(),
            name: d.name,
        })
        .collect();

    if let Some(name) = pick_default_interface(&candidates) {
        return Ok(Some(name.to_string()));
    }
    Ok(Device::lookup()?.map(|d| d.name))
}
