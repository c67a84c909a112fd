//! Contract-roll selection and symbol resolution.
//!
//! Near-identical futures contracts roll from one expiry to the next during a
//! session. [`RollWindow`] keeps an event iff its exchange timestamp and
//! resolved symbol land on the active side of the cutoff; kept events are
//! relabeled with the expiry suffix stripped so both epochs export as one
//! continuous series (`ESU4`/`ESZ4` -> `ES`).
//!
//! Symbol resolution is backed by the session header's symbology and memoized
//! per instrument id, including misses, for the lifetime of one file run. An
//! unresolvable id is a filter condition, not an error.
use crate::record::{Event, SessionHeader, SymbolMapping};
use std::collections::HashMap;

const NS_PER_SEC: i64 = 1_000_000_000;

/// Two-epoch roll policy: one cutoff, one allow-list per epoch.
#[derive(Debug, Clone)]
pub struct RollWindow {
    /// Roll cutoff, UNIX epoch seconds. Events at exactly the cutoff belong
    /// to the post epoch.
    pub cutoff_secs: i64,
    /// Contracts active before the cutoff.
    pub pre: Vec<String>,
    /// Contracts active from the cutoff on.
    pub post: Vec<String>,
}

impl RollWindow {
    fn admits(&self, symbol: &str, ts_event: u64) -> bool {
        let active = if (ts_event as i64) < self.cutoff_secs.saturating_mul(NS_PER_SEC) {
            &self.pre
        } else {
            &self.post
        };
        active.iter().any(|s| s == symbol)
    }
}

/// Per-run resolution cache over the header's symbology.
///
/// Each instrument id is resolved at most once per file run and the result
/// reused, so resolution cost and any date ambiguity across the roll are paid
/// a single time.
#[derive(Debug, Default)]
pub struct SymbolCache {
    mappings: HashMap<u32, Vec<SymbolMapping>>,
    resolved: HashMap<u32, Option<String>>,
}

impl SymbolCache {
    pub fn from_header(header: &SessionHeader) -> Self {
        let mut mappings: HashMap<u32, Vec<SymbolMapping>> = HashMap::new();
        for m in &header.symbols {
            mappings.entry(m.instrument_id).or_default().push(m.clone());
        }
        Self {
            mappings,
            resolved: HashMap::new(),
        }
    }

    /// Resolve an instrument id at the given exchange timestamp.
    pub fn resolve(&mut self, instrument_id: u32, ts_event: u64) -> Option<&str> {
        let mappings = &self.mappings;
        self.resolved
            .entry(instrument_id)
            .or_insert_with(|| {
                mappings.get(&instrument_id).and_then(|intervals| {
                    intervals
                        .iter()
                        .find(|m| m.start_ts <= ts_event && ts_event < m.end_ts)
                        .map(|m| m.symbol.clone())
                })
            })
            .as_deref()
    }
}

/// Drop the trailing 2-character expiry suffix (`MESZ4` -> `MES`).
fn strip_expiry(symbol: &str) -> &str {
    if symbol.len() > 2 {
        &symbol[..symbol.len() - 2]
    } else {
        symbol
    }
}

/// Per-event inclusion decision plus output labeling.
#[derive(Debug)]
pub struct RollSelector {
    cache: SymbolCache,
    window: Option<RollWindow>,
}

impl RollSelector {
    pub fn new(cache: SymbolCache, window: Option<RollWindow>) -> Self {
        Self { cache, window }
    }

    /// Keep or drop one event.
    ///
    /// `None` drops it: either the instrument id has no symbol for this
    /// session, or the contract is not active on this side of the cutoff.
    /// Without a configured window every resolvable event is kept under its
    /// full symbol.
    pub fn select(&mut self, event: &Event) -> Option<String> {
        let symbol = self.cache.resolve(event.instrument_id, event.ts_event)?;
        match &self.window {
            None => Some(symbol.to_string()),
            Some(window) => {
                if window.admits(symbol, event.ts_event) {
                    Some(strip_expiry(symbol).to_string())
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Action, Side};

    const CUTOFF: i64 = 1_726_916_400;

    fn header() -> SessionHeader {
        SessionHeader {
            version: 1,
            dataset: "GLBX.MDP3".into(),
            start_ts: 0,
            end_ts: u64::MAX,
            symbols: vec![
                SymbolMapping {
                    instrument_id: 1,
                    symbol: "ESU4".into(),
                    start_ts: 0,
                    end_ts: u64::MAX,
                },
                SymbolMapping {
                    instrument_id: 2,
                    symbol: "ESZ4".into(),
                    start_ts: 0,
                    end_ts: u64::MAX,
                },
            ],
        }
    }

    fn window() -> RollWindow {
        RollWindow {
            cutoff_secs: CUTOFF,
            pre: vec!["MESU4".into(), "ESU4".into()],
            post: vec!["MESZ4".into(), "ESZ4".into()],
        }
    }

    fn ev(instrument_id: u32, ts_event: u64) -> Event {
        Event {
            instrument_id,
            ts_recv: ts_event,
            ts_event,
            action: Action::Trade,
            side: Side::Bid,
            size: 1,
            price: 0,
            order_id: 0,
            flags: 0,
        }
    }

    fn ns(secs: i64) -> u64 {
        (secs * 1_000_000_000) as u64
    }

    #[test]
    fn pre_contract_kept_before_cutoff_and_stripped() {
        let mut sel = RollSelector::new(SymbolCache::from_header(&header()), Some(window()));
        assert_eq!(sel.select(&ev(1, ns(CUTOFF - 1))).as_deref(), Some("ES"));
    }

    #[test]
    fn pre_contract_dropped_after_cutoff() {
        let mut sel = RollSelector::new(SymbolCache::from_header(&header()), Some(window()));
        assert!(sel.select(&ev(1, ns(CUTOFF + 1))).is_none());
    }

    #[test]
    fn post_contract_kept_after_cutoff() {
        let mut sel = RollSelector::new(SymbolCache::from_header(&header()), Some(window()));
        assert_eq!(sel.select(&ev(2, ns(CUTOFF + 1))).as_deref(), Some("ES"));
    }

    #[test]
    fn event_exactly_at_cutoff_belongs_to_post_epoch() {
        let mut sel = RollSelector::new(SymbolCache::from_header(&header()), Some(window()));
        assert!(sel.select(&ev(1, ns(CUTOFF))).is_none());
        assert_eq!(sel.select(&ev(2, ns(CUTOFF))).as_deref(), Some("ES"));
    }

    #[test]
    fn unresolved_instrument_is_dropped_not_an_error() {
        let mut sel = RollSelector::new(SymbolCache::from_header(&header()), Some(window()));
        assert!(sel.select(&ev(99, ns(CUTOFF - 1))).is_none());
    }

    #[test]
    fn no_window_keeps_full_symbol() {
        let mut sel = RollSelector::new(SymbolCache::from_header(&header()), None);
        assert_eq!(sel.select(&ev(1, ns(CUTOFF + 5))).as_deref(), Some("ESU4"));
    }

    #[test]
    fn resolution_is_cached_per_id() {
        let mut cache = SymbolCache::from_header(&header());
        // First lookup pins the symbol; later timestamps outside the mapping
        // interval still return the cached result.
        assert_eq!(cache.resolve(1, 10), Some("ESU4"));
        assert_eq!(cache.resolve(1, 20), Some("ESU4"));
        assert_eq!(cache.resolve(99, 10), None);
        assert_eq!(cache.resolve(99, 20), None);
    }
}
