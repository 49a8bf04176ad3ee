//! Zim: a terminal packet sniffer.
//!
//! Raw frames come from a [`sniff::FrameSource`], are decoded by
//! [`parser::decode`] into [`models::Packet`] values, counted by
//! [`stats::StatsAggregator`] and handed to output sinks (terminal display,
//! CSV log) by the single-threaded [`pipeline::Pipeline`].

pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod logger;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod sniff;
pub mod stats;
