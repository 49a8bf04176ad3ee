use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use zim::config::{Cli, ZimConfig};
use zim::display::Display;
use zim::error::ConfigError;
use zim::filter::PacketFilter;
use zim::logger::CsvLogger;
use zim::pipeline::{Pipeline, StopReason};
use zim::sniff::{self, CaptureOptions, RawCapture};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zim=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_interface(config: &ZimConfig) -> anyhow::Result<String> {
    if let Some(name) = config.interface.clone() {
        return Ok(name);
    }
    let found = sniff::find_default_interface()
        .map_err(|e| ConfigError::NoDefaultInterface(e.to_string()))?;
    let name = found
        .ok_or_else(|| ConfigError::NoDefaultInterface("no interface is up".into()))?;
    tracing::info!(interface = %name, "no interface given, using default");
    Ok(name)
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ZimConfig::from_cli(Cli::parse())?;
    let interface = resolve_interface(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    let mut display = Display::stdout(config.display);
    display.banner(&interface)?;

    let logger = match config.log_file.as_deref() {
        Some(path) => {
            let logger = CsvLogger::create(path)?;
            tracing::info!(path = %path.display(), "logging packets to CSV");
            Some(logger)
        }
        None => None,
    };

    let filter = PacketFilter::new(config.filter.clone());
    if let Some(expr) = filter.expression() {
        tracing::info!(filter = expr, "filter accepted (all packets match)");
    }

    let capture = RawCapture::open_with(&CaptureOptions {
        interface: interface.clone(),
        promiscuous: config.promiscuous,
        require_promiscuous: config.require_promiscuous,
        snaplen: config.snaplen,
    })
    .with_context(|| format!("failed to open capture on {interface}"))?;
    tracing::info!(interface = %interface, "starting packet capture");

    let mut pipeline = Pipeline::new(capture, Arc::clone(&running))
        .with_filter(filter)
        .with_limit(config.packet_limit())
        .with_poll_interval(config.poll_interval)
        .add_sink(Box::new(display));
    if let Some(logger) = logger {
        pipeline = pipeline.add_sink(Box::new(logger));
    }

    let result = pipeline.run();
    pipeline.finish();

    if config.summary_json {
        println!("{}", serde_json::to_string_pretty(&pipeline.stats().snapshot())?);
    }

    let processed = pipeline.processed();
    pipeline.into_source().close();

    let summary = result.context("capture failed")?;
    match summary.stop_reason {
        StopReason::LimitReached => tracing::info!(processed, "packet limit reached"),
        StopReason::Shutdown => tracing::info!(processed, "shutting down"),
    }
    Ok(())
}
