use serde::{Deserialize, Serialize};

/// Order prices are signed integers where 1 unit = 1e-9, so dividing by this
/// scale yields the human-readable price.
pub const FIXED_PRICE_SCALE: i64 = 1_000_000_000;

/// Bits carried in [`Event::flags`].
pub mod flags {
    /// Marks the last event of an atomic book update.
    pub const LAST: u8 = 1 << 7;
}

/// Book action carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Add,
    Cancel,
    Modify,
    Clear,
    Trade,
    Fill,
    None,
}

impl Action {
    /// Single-letter code used in exported rows.
    pub fn as_char(self) -> char {
        match self {
            Action::Add => 'A',
            Action::Cancel => 'C',
            Action::Modify => 'M',
            Action::Clear => 'R',
            Action::Trade => 'T',
            Action::Fill => 'F',
            Action::None => 'N',
        }
    }
}

/// Side of the book an event refers to, or the aggressor side for trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
    None,
}

impl Side {
    pub fn as_char(self) -> char {
        match self {
            Side::Bid => 'B',
            Side::Ask => 'A',
            Side::None => 'N',
        }
    }
}

/// One decoded order event.
///
/// `ts_recv` is the capture-receipt timestamp and `ts_event` the exchange
/// timestamp, both nanoseconds since the UNIX epoch. Files store events in
/// non-decreasing `(ts_recv, ts_event)` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub instrument_id: u32,
    pub ts_recv: u64,
    pub ts_event: u64,
    pub action: Action,
    pub side: Side,
    pub size: u32,
    /// Fixed-point price, 1e-9 units. See [`FIXED_PRICE_SCALE`].
    pub price: i64,
    pub order_id: u64,
    pub flags: u8,
}

impl Event {
    /// True when this event closes an atomic book update.
    pub fn is_last(&self) -> bool {
        self.flags & flags::LAST != 0
    }
}

/// Maps an instrument id to its human-readable symbol over a validity
/// interval in session time (`start_ts` inclusive, `end_ts` exclusive, ns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub instrument_id: u32,
    pub symbol: String,
    pub start_ts: u64,
    pub end_ts: u64,
}

/// Leading frame of every capture file.
///
/// `start_ts`/`end_ts` are the session bounds; sources recorded for the same
/// nominal session must agree on them. `symbols` carries the symbology known
/// at capture time, enough to resolve every instrument id in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub version: u16,
    pub dataset: String,
    pub start_ts: u64,
    pub end_ts: u64,
    pub symbols: Vec<SymbolMapping>,
}

/// On-disk frame: a header first, then events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordFrame {
    Header(SessionHeader),
    Event(Event),
}
