//! One per-file event source.
//!
//! An [`EventSource`] advances through a capture file one event at a time.
//! Every decoded event is applied to the source's own [`Market`] before any
//! filtering, so the book also absorbs the events the roll selector drops;
//! only then is the event offered for merging. A decode error mid-stream is
//! logged and the source treated as exhausted from that point on, so one
//! truncated file only shortens its own contribution.
use crate::book::Market;
use crate::codec::FrameReader;
use crate::record::{Action, Event, RecordFrame, SessionHeader};
use crate::roll::RollSelector;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

/// An event that passed roll selection, carrying its output label.
#[derive(Debug, Clone)]
pub struct LabeledEvent {
    pub event: Event,
    pub label: String,
}

pub struct EventSource {
    path: PathBuf,
    header: SessionHeader,
    reader: FrameReader<BufReader<File>>,
    market: Market,
    selector: RollSelector,
    trades_only: bool,
    exhausted: bool,
}

impl EventSource {
    pub fn new(
        path: PathBuf,
        header: SessionHeader,
        reader: FrameReader<BufReader<File>>,
        selector: RollSelector,
        trades_only: bool,
    ) -> Self {
        Self {
            path,
            header,
            reader,
            market: Market::new(),
            selector,
            trades_only,
            exhausted: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Pull the next selected event, or `None` once the file is done.
    ///
    /// Events are read, applied to the market, and roll-selected in a loop
    /// until one passes or the file ends. Exhaustion is permanent.
    pub fn next_event(&mut self) -> Option<LabeledEvent> {
        while !self.exhausted {
            let frame = match self.reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.exhausted = true;
                    return None;
                }
                Err(e) => {
                    // Truncates this source's contribution to the merge.
                    warn!(
                        path = %self.path.display(),
                        frames = self.reader.frames_read(),
                        error = %format!("{e:#}"),
                        "source unreadable, treating as exhausted"
                    );
                    self.exhausted = true;
                    return None;
                }
            };
            let event = match frame {
                RecordFrame::Event(event) => event,
                RecordFrame::Header(_) => {
                    warn!(path = %self.path.display(), "stray header frame mid-file, skipped");
                    continue;
                }
            };

            self.market.apply(&event);
            if self.trades_only && event.action != Action::Trade {
                continue;
            }
            if let Some(label) = self.selector.select(&event) {
                return Some(LabeledEvent { event, label });
            }
        }
        None
    }
}

/// Verify that every source of one nominal session reports the same
/// `(start_ts, end_ts)` bounds, and return them.
///
/// A mismatch means the capture folders disagree about what this file is; it
/// is fatal for the file, not for the batch.
pub fn check_session_bounds(sources: &[EventSource]) -> Result<(u64, u64)> {
    let first = sources.first().context("file present in no source folder")?;
    let bounds = (first.header().start_ts, first.header().end_ts);
    for src in &sources[1..] {
        let h = src.header();
        if (h.start_ts, h.end_ts) != bounds {
            bail!(
                "session bounds mismatch: {} reports ({}, {}), {} reports ({}, {})",
                src.path().display(),
                h.start_ts,
                h.end_ts,
                first.path().display(),
                bounds.0,
                bounds.1
            );
        }
    }
    Ok(bounds)
}
