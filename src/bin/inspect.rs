use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tape_merge::book::{Market, Quote};
use tape_merge::codec::open_capture;
use tape_merge::record::{Action, RecordFrame, FIXED_PRICE_SCALE};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(about = "Play one capture file and reconstruct its books")]
struct Args {
    /// Input capture file (.bin)
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Dump top-of-book after each completed atomic update
    #[arg(long, default_value_t = false)]
    dump: bool,

    /// Print trade events as they are read
    #[arg(long, default_value_t = false)]
    print_trades: bool,
}

fn fmt_ts(ns: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ns as i128)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ns.to_string())
}

fn fmt_quote(q: Option<Quote>) -> String {
    match q {
        Some(q) => format!(
            "{:>7} x {:>10.2}",
            q.size,
            q.price as f64 / FIXED_PRICE_SCALE as f64
        ),
        None => "-".to_string(),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (header, mut reader) = open_capture(&args.input)?;
    eprintln!(
        "Session: dataset={} start={} end={} symbols={}",
        header.dataset,
        fmt_ts(header.start_ts),
        fmt_ts(header.end_ts),
        header.symbols.len()
    );

    let mut market = Market::new();
    let mut events = 0usize;
    while let Some(frame) = reader.next_frame()? {
        let event = match frame {
            RecordFrame::Event(e) => e,
            RecordFrame::Header(_) => continue,
        };
        market.apply(&event);
        events += 1;

        if args.print_trades && event.action == Action::Trade {
            println!(
                "TRADE {} instrument={} side={} size={} price={}",
                fmt_ts(event.ts_event),
                event.instrument_id,
                event.side.as_char(),
                event.size,
                event.price as f64 / FIXED_PRICE_SCALE as f64
            );
        }

        if args.dump && event.is_last() {
            if let Some(top) = market.top_of_book(event.instrument_id) {
                println!(
                    "{} instrument={} | bid {} | ask {}",
                    fmt_ts(event.ts_recv),
                    event.instrument_id,
                    fmt_quote(top.bid),
                    fmt_quote(top.ask)
                );
            }
        }
    }
    eprintln!("Read {} events.", events);
    Ok(())
}
