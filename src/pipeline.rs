//! The capture loop: poll a frame source, decode, record, hand off to sinks.
//!
//! Single-threaded. The loop owns the statistics and the source; nothing is
//! shared except the shutdown flag, which is checked at the top of every
//! iteration so a frame that is being decoded always completes.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::display::Display;
use crate::error::CaptureError;
use crate::filter::PacketFilter;
use crate::logger::CsvLogger;
use crate::models::Packet;
use crate::parser;
use crate::sniff::FrameSource;
use crate::stats::StatsAggregator;

/// Receives every decoded packet plus periodic access to the statistics.
pub trait PacketSink {
    fn name(&self) -> &'static str;

    fn on_packet(&mut self, packet: &Packet<'_>) -> anyhow::Result<()>;

    /// Called once per loop iteration, after any packet handling.
    fn on_tick(&mut self, _stats: &StatsAggregator) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when the loop has stopped.
    fn on_finish(&mut self, _stats: &StatsAggregator, _processed: u64) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<W: Write> PacketSink for Display<W> {
    fn name(&self) -> &'static str {
        "display"
    }

    fn on_packet(&mut self, packet: &Packet<'_>) -> anyhow::Result<()> {
        self.show_packet(packet)?;
        Ok(())
    }

    fn on_tick(&mut self, stats: &StatsAggregator) -> anyhow::Result<()> {
        self.refresh(&stats.snapshot())?;
        Ok(())
    }

    fn on_finish(&mut self, stats: &StatsAggregator, processed: u64) -> anyhow::Result<()> {
        self.summary(&stats.snapshot(), processed)?;
        Ok(())
    }
}

impl<W: Write> PacketSink for CsvLogger<W> {
    fn name(&self) -> &'static str {
        "csv-log"
    }

    fn on_packet(&mut self, packet: &Packet<'_>) -> anyhow::Result<()> {
        self.log_packet(packet)?;
        Ok(())
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No frame was available.
    Idle,
    /// A frame was decoded, recorded and handed to the sinks.
    Processed,
    /// A frame was decoded and counted, but the filter rejected it.
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub stop_reason: StopReason,
}

pub struct Pipeline<S: FrameSource> {
    source: S,
    stats: StatsAggregator,
    filter: PacketFilter,
    sinks: Vec<Box<dyn PacketSink>>,
    limit: Option<u64>,
    processed: u64,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl<S: FrameSource> Pipeline<S> {
    pub fn new(source: S, running: Arc<AtomicBool>) -> Self {
        Self {
            source,
            stats: StatsAggregator::new(),
            filter: PacketFilter::match_all(),
            sinks: Vec::new(),
            limit: None,
            processed: 0,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            running,
        }
    }

    pub fn with_filter(mut self, filter: PacketFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Stop after `limit` packets; `None` runs until shutdown.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn add_sink(mut self, sink: Box<dyn PacketSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn into_source(self) -> S {
        self.source
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.processed >= limit)
    }

    /// One loop iteration without the trailing sleep.
    pub fn step(&mut self) -> Result<StepOutcome, CaptureError> {
        let outcome = match self.source.receive()? {
            None => StepOutcome::Idle,
            Some(frame) => {
                let packet = parser::decode_frame(&frame);
                self.stats.record(&packet);
                if self.filter.matches(&packet) {
                    self.processed += 1;
                    for sink in self.sinks.iter_mut() {
                        if let Err(e) = sink.on_packet(&packet) {
                            tracing::warn!(sink = sink.name(), "packet output failed: {e:#}");
                        }
                    }
                    StepOutcome::Processed
                } else {
                    StepOutcome::Filtered
                }
            }
        };

        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.on_tick(&self.stats) {
                tracing::warn!(sink = sink.name(), "refresh failed: {e:#}");
            }
        }
        Ok(outcome)
    }

    /// Loop until shutdown is requested or the packet limit is reached.
    ///
    /// A capture error ends the loop and is returned as is.
    pub fn run(&mut self) -> Result<RunSummary, CaptureError> {
        let stop_reason = loop {
            if !self.running.load(Ordering::SeqCst) {
                break StopReason::Shutdown;
            }
            self.step()?;
            if self.limit_reached() {
                break StopReason::LimitReached;
            }
            thread::sleep(self.poll_interval);
        };

        tracing::debug!(processed = self.processed, ?stop_reason, "capture loop stopped");
        Ok(RunSummary {
            processed: self.processed,
            stop_reason,
        })
    }

    /// Let every sink print or flush its final output.
    pub fn finish(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.on_finish(&self.stats, self.processed) {
                tracing::warn!(sink = sink.name(), "final output failed: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Protocol, RawFrame, Timestamp};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays scripted receive results, then reports empty forever.
    struct ScriptedSource {
        script: VecDeque<Result<Option<RawFrame>, CaptureError>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<RawFrame>, CaptureError>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn receive(&mut self) -> Result<Option<RawFrame>, CaptureError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct Recorded {
        protocols: Vec<Protocol>,
        ticks: usize,
        finished: Option<u64>,
    }

    struct RecordingSink(Rc<RefCell<Recorded>>);

    impl PacketSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn on_packet(&mut self, packet: &Packet<'_>) -> anyhow::Result<()> {
            self.0.borrow_mut().protocols.push(packet.protocol);
            Ok(())
        }

        fn on_tick(&mut self, _stats: &StatsAggregator) -> anyhow::Result<()> {
            self.0.borrow_mut().ticks += 1;
            Ok(())
        }

        fn on_finish(&mut self, _stats: &StatsAggregator, processed: u64) -> anyhow::Result<()> {
            self.0.borrow_mut().finished = Some(processed);
            Ok(())
        }
    }

    struct FailingSink;

    impl PacketSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn on_packet(&mut self, _packet: &Packet<'_>) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn frame(len: usize) -> Result<Option<RawFrame>, CaptureError> {
        Ok(Some(RawFrame::new(vec![0u8; len], Timestamp::default())))
    }

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[test]
    fn test_step_idle_when_source_empty() {
        let mut pipeline = Pipeline::new(ScriptedSource::new(vec![Ok(None)]), running());
        assert_eq!(pipeline.step().unwrap(), StepOutcome::Idle);
        assert_eq!(pipeline.stats().total_packets(), 0);
    }

    #[test]
    fn test_step_records_and_notifies_sinks() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut pipeline = Pipeline::new(ScriptedSource::new(vec![frame(5), Ok(None)]), running())
            .add_sink(Box::new(RecordingSink(Rc::clone(&recorded))));

        assert_eq!(pipeline.step().unwrap(), StepOutcome::Processed);
        assert_eq!(pipeline.step().unwrap(), StepOutcome::Idle);

        assert_eq!(pipeline.stats().total_packets(), 1);
        assert_eq!(pipeline.stats().total_bytes(), 5);
        let recorded = recorded.borrow();
        assert_eq!(recorded.protocols, vec![Protocol::Unknown]);
        assert_eq!(recorded.ticks, 2);
    }

    #[test]
    fn test_run_stops_at_limit() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let script = vec![frame(60), Ok(None), frame(60), frame(60), frame(60)];
        let mut pipeline = Pipeline::new(ScriptedSource::new(script), running())
            .with_limit(Some(3))
            .with_poll_interval(Duration::ZERO)
            .add_sink(Box::new(RecordingSink(Rc::clone(&recorded))));

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::LimitReached);
        assert_eq!(summary.processed, 3);
        assert_eq!(pipeline.stats().total_packets(), 3);

        pipeline.finish();
        assert_eq!(recorded.borrow().finished, Some(3));
    }

    #[test]
    fn test_run_honours_shutdown_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut pipeline = Pipeline::new(ScriptedSource::new(vec![frame(60)]), flag);
        let summary = pipeline.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(summary.processed, 0);
        assert_eq!(pipeline.stats().total_packets(), 0);
    }

    #[test]
    fn test_run_returns_hard_capture_error() {
        let script = vec![frame(60), Err(CaptureError::Io("Network is down".into()))];
        let mut pipeline = Pipeline::new(ScriptedSource::new(script), running())
            .with_poll_interval(Duration::ZERO);
        let err = pipeline.run().unwrap_err();
        assert_eq!(err.kind(), "Io");
        assert_eq!(pipeline.processed(), 1);
    }

    #[test]
    fn test_sink_failure_does_not_stop_loop() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut pipeline = Pipeline::new(ScriptedSource::new(vec![frame(60), frame(60)]), running())
            .with_limit(Some(2))
            .with_poll_interval(Duration::ZERO)
            .add_sink(Box::new(FailingSink))
            .add_sink(Box::new(RecordingSink(Rc::clone(&recorded))));

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(recorded.borrow().protocols.len(), 2);
    }

    #[test]
    fn test_logger_sink_writes_records() {
        let logger = CsvLogger::new(Vec::new()).unwrap();
        let mut sink: Box<dyn PacketSink> = Box::new(logger);
        let pkt = Packet::unknown(Timestamp::default(), 3);
        sink.on_packet(&pkt).unwrap();
        assert_eq!(sink.name(), "csv-log");
    }
}
