//! Order-by-order market state.
//!
//! [`Market`] keeps one book per instrument, keyed by `order_id`, and
//! aggregates resting orders into price levels so that [`Market::top_of_book`]
//! answers in O(1) map lookups. Events are applied in the order the caller
//! hands them over; applying an event and then querying top-of-book for the
//! same instrument reflects that event (self-inclusive snapshots).
use crate::record::{Action, Event, Side};
use std::collections::{BTreeMap, HashMap};

/// One side of the top of book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Fixed-point price, 1e-9 units.
    pub price: i64,
    /// Total resting size at that price.
    pub size: u64,
}

/// Best bid and offer for one instrument; either side may be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopOfBook {
    pub bid: Option<Quote>,
    pub ask: Option<Quote>,
}

#[derive(Debug, Clone, Copy)]
struct Order {
    side: Side,
    price: i64,
    size: u32,
}

/// Per-instrument book: resting orders plus size-aggregated price levels.
#[derive(Debug, Default)]
struct Book {
    orders: HashMap<u64, Order>,
    bids: BTreeMap<i64, u64>,
    asks: BTreeMap<i64, u64>,
}

impl Book {
    fn levels_mut(&mut self, side: Side) -> Option<&mut BTreeMap<i64, u64>> {
        match side {
            Side::Bid => Some(&mut self.bids),
            Side::Ask => Some(&mut self.asks),
            Side::None => None,
        }
    }

    fn add_to_level(&mut self, side: Side, price: i64, size: u32) {
        if let Some(levels) = self.levels_mut(side) {
            *levels.entry(price).or_insert(0) += u64::from(size);
        }
    }

    fn remove_from_level(&mut self, side: Side, price: i64, size: u32) {
        if let Some(levels) = self.levels_mut(side) {
            if let Some(total) = levels.get_mut(&price) {
                *total = total.saturating_sub(u64::from(size));
                if *total == 0 {
                    levels.remove(&price);
                }
            }
        }
    }

    fn insert(&mut self, order_id: u64, order: Order) {
        // A reused order id replaces the previous resting order.
        if let Some(prev) = self.orders.insert(order_id, order) {
            self.remove_from_level(prev.side, prev.price, prev.size);
        }
        self.add_to_level(order.side, order.price, order.size);
    }

    fn reduce(&mut self, order_id: u64, by: u32) {
        if let Some(order) = self.orders.get_mut(&order_id) {
            let removed = by.min(order.size);
            order.size -= removed;
            let (side, price) = (order.side, order.price);
            let gone = order.size == 0;
            if gone {
                self.orders.remove(&order_id);
            }
            self.remove_from_level(side, price, removed);
        }
    }

    fn clear(&mut self) {
        self.orders.clear();
        self.bids.clear();
        self.asks.clear();
    }

    fn top(&self) -> TopOfBook {
        TopOfBook {
            bid: self
                .bids
                .iter()
                .next_back()
                .map(|(&price, &size)| Quote { price, size }),
            ask: self
                .asks
                .iter()
                .next()
                .map(|(&price, &size)| Quote { price, size }),
        }
    }
}

/// All instruments seen on one feed.
#[derive(Debug, Default)]
pub struct Market {
    books: HashMap<u32, Book>,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event to the instrument's book.
    ///
    /// Trades and `Action::None` never move the book; they only mark the
    /// instrument as seen. `Modify` of an unknown order id inserts it, which
    /// covers orders resting since before the capture started.
    pub fn apply(&mut self, event: &Event) {
        let book = self.books.entry(event.instrument_id).or_default();
        match event.action {
            Action::Add => {
                if event.side != Side::None {
                    book.insert(
                        event.order_id,
                        Order {
                            side: event.side,
                            price: event.price,
                            size: event.size,
                        },
                    );
                }
            }
            Action::Cancel | Action::Fill => book.reduce(event.order_id, event.size),
            Action::Modify => {
                if event.side != Side::None {
                    book.insert(
                        event.order_id,
                        Order {
                            side: event.side,
                            price: event.price,
                            size: event.size,
                        },
                    );
                }
            }
            Action::Clear => book.clear(),
            Action::Trade | Action::None => {}
        }
    }

    /// Current best bid/offer, or `None` if the instrument was never applied.
    pub fn top_of_book(&self, instrument_id: u32) -> Option<TopOfBook> {
        self.books.get(&instrument_id).map(Book::top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FIXED_PRICE_SCALE;

    fn ev(action: Action, side: Side, order_id: u64, price: i64, size: u32) -> Event {
        Event {
            instrument_id: 1,
            ts_recv: 0,
            ts_event: 0,
            action,
            side,
            size,
            price: price * FIXED_PRICE_SCALE,
            order_id,
            flags: 0,
        }
    }

    #[test]
    fn add_becomes_best_bid_self_inclusive() {
        let mut market = Market::new();
        market.apply(&ev(Action::Add, Side::Bid, 1, 100, 5));
        market.apply(&ev(Action::Add, Side::Bid, 2, 101, 3));

        let top = market.top_of_book(1).unwrap();
        let bid = top.bid.unwrap();
        assert_eq!(bid.price, 101 * FIXED_PRICE_SCALE);
        assert_eq!(bid.size, 3);
        assert!(top.ask.is_none());
    }

    #[test]
    fn level_aggregates_across_orders() {
        let mut market = Market::new();
        market.apply(&ev(Action::Add, Side::Ask, 1, 102, 4));
        market.apply(&ev(Action::Add, Side::Ask, 2, 102, 6));

        let ask = market.top_of_book(1).unwrap().ask.unwrap();
        assert_eq!(ask.size, 10);

        market.apply(&ev(Action::Cancel, Side::Ask, 1, 102, 4));
        let ask = market.top_of_book(1).unwrap().ask.unwrap();
        assert_eq!(ask.size, 6);
    }

    #[test]
    fn partial_cancel_keeps_order() {
        let mut market = Market::new();
        market.apply(&ev(Action::Add, Side::Bid, 1, 100, 10));
        market.apply(&ev(Action::Cancel, Side::Bid, 1, 100, 4));

        let bid = market.top_of_book(1).unwrap().bid.unwrap();
        assert_eq!(bid.size, 6);

        market.apply(&ev(Action::Fill, Side::Bid, 1, 100, 6));
        assert!(market.top_of_book(1).unwrap().bid.is_none());
    }

    #[test]
    fn modify_moves_price_level() {
        let mut market = Market::new();
        market.apply(&ev(Action::Add, Side::Bid, 1, 100, 5));
        market.apply(&ev(Action::Modify, Side::Bid, 1, 99, 5));

        let bid = market.top_of_book(1).unwrap().bid.unwrap();
        assert_eq!(bid.price, 99 * FIXED_PRICE_SCALE);
    }

    #[test]
    fn clear_empties_instrument() {
        let mut market = Market::new();
        market.apply(&ev(Action::Add, Side::Bid, 1, 100, 5));
        market.apply(&ev(Action::Clear, Side::None, 0, 0, 0));

        let top = market.top_of_book(1).unwrap();
        assert!(top.bid.is_none() && top.ask.is_none());
    }

    #[test]
    fn trade_marks_seen_but_leaves_book() {
        let mut market = Market::new();
        assert!(market.top_of_book(1).is_none());
        market.apply(&ev(Action::Trade, Side::Ask, 0, 100, 1));
        let top = market.top_of_book(1).unwrap();
        assert!(top.bid.is_none() && top.ask.is_none());
        assert!(market.top_of_book(99).is_none());
    }
}
