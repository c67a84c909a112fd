//! Capture replay, merge and export library.
//!
//! This crate turns per-feed capture files of one trading session into a
//! single globally time-ordered CSV export:
//!
//! - `record`: on-disk schema (events, session headers, symbology)
//! - `codec`: length-prefixed CRC-checked bincode framing
//! - `book`: per-instrument order book with top-of-book aggregation
//! - `roll`: contract-roll selection and cached symbol resolution
//! - `source`: lazy per-file event pull with partial-file tolerance
//! - `merge`: the chronological N-way merge over the sources
//! - `export`: one CSV row per merged event with best bid/offer snapshots
//!
//! The binaries (`src/main.rs` batch exporter and `src/bin/inspect.rs`
//! single-file player) are thin drivers over these modules.
pub mod book;
pub mod codec;
pub mod export;
pub mod merge;
pub mod record;
pub mod roll;
pub mod source;
