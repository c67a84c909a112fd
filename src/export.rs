//! CSV export of the merged stream.
//!
//! One output file per processed capture name: a leading
//! `session,<start_ts>,<end_ts>` metadata record, the column header, then one
//! row per merged event. Top-of-book is read from the market of the source
//! that yielded the event; a query miss skips that row with a diagnostic and
//! the run keeps going.
use crate::merge::Multiplexer;
use crate::record::FIXED_PRICE_SCALE;
use anyhow::Result;
use std::io::Write;
use tracing::warn;

/// Column set, stable per run.
pub const COLUMNS: [&str; 14] = [
    "instrument",
    "ts_event",
    "ts_recv",
    "elapsed_s",
    "order_id",
    "action",
    "side",
    "size",
    "price",
    "bid_sz",
    "bid_px",
    "ask_sz",
    "ask_px",
    "is_last",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Rows written.
    pub rows: u64,
    /// Rows skipped because top-of-book was unavailable.
    pub skipped: u64,
}

fn human_price(price: i64) -> String {
    format!("{}", price as f64 / FIXED_PRICE_SCALE as f64)
}

fn elapsed_secs(ts_event: u64, start_ts: u64) -> String {
    let delta_ns = ts_event as i64 - start_ts as i64;
    format!("{:.9}", delta_ns as f64 * 1e-9)
}

/// Drain the multiplexer into `out`.
pub fn export_file<W: Write>(
    mux: &mut Multiplexer,
    out: W,
    start_ts: u64,
    end_ts: u64,
) -> Result<ExportStats> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);
    wtr.write_record(["session".to_string(), start_ts.to_string(), end_ts.to_string()])?;
    wtr.write_record(COLUMNS)?;

    let mut stats = ExportStats::default();
    while let Some(merged) = mux.next() {
        let event = &merged.event;
        let top = match mux.market(merged.source).top_of_book(event.instrument_id) {
            Some(top) => top,
            None => {
                warn!(
                    instrument_id = event.instrument_id,
                    ts_event = event.ts_event,
                    "no book state for instrument, row skipped"
                );
                stats.skipped += 1;
                continue;
            }
        };

        let (bid_sz, bid_px) = match top.bid {
            Some(q) => (q.size.to_string(), human_price(q.price)),
            None => (String::new(), String::new()),
        };
        let (ask_sz, ask_px) = match top.ask {
            Some(q) => (q.size.to_string(), human_price(q.price)),
            None => (String::new(), String::new()),
        };

        wtr.write_record([
            merged.label.clone(),
            event.ts_event.to_string(),
            event.ts_recv.to_string(),
            elapsed_secs(event.ts_event, start_ts),
            event.order_id.to_string(),
            event.action.as_char().to_string(),
            event.side.as_char().to_string(),
            event.size.to_string(),
            human_price(event.price),
            bid_sz,
            bid_px,
            ask_sz,
            ask_px,
            event.is_last().to_string(),
        ])?;
        stats.rows += 1;
    }
    wtr.flush()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_scaling_to_human_units() {
        assert_eq!(human_price(5 * FIXED_PRICE_SCALE), "5");
        assert_eq!(human_price(5_500_000_000 + 5 * FIXED_PRICE_SCALE), "10.5");
        assert_eq!(human_price(-FIXED_PRICE_SCALE / 4), "-0.25");
    }

    #[test]
    fn elapsed_is_signed_seconds_from_session_start() {
        assert_eq!(elapsed_secs(2_500_000_000, 1_000_000_000), "1.500000000");
        assert_eq!(elapsed_secs(500_000_000, 1_000_000_000), "-0.500000000");
    }
}
