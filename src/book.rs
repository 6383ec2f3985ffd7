//! Book Store: dual-venue top-of-book state and derived spreads.

use crate::types::{Quote, Venue};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One venue's order book: price -> size. Zero-sized entries are deletions.
#[derive(Debug, Default)]
struct VenueBook {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    top: Option<Quote>,
}

impl VenueBook {
    fn replace_snapshot(&mut self, bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) {
        self.bids.clear();
        self.asks.clear();
        for (p, s) in bids {
            if !s.is_zero() {
                self.bids.insert(p, s);
            }
        }
        for (p, s) in asks {
            if !s.is_zero() {
                self.asks.insert(p, s);
            }
        }
        self.recompute_top();
    }

    fn apply_diff(&mut self, bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) {
        for (p, s) in bids {
            if s.is_zero() {
                self.bids.remove(&p);
            } else {
                self.bids.insert(p, s);
            }
        }
        for (p, s) in asks {
            if s.is_zero() {
                self.asks.remove(&p);
            } else {
                self.asks.insert(p, s);
            }
        }
        self.recompute_top();
    }

    fn recompute_top(&mut self) {
        let best_bid = self.bids.keys().next_back().copied();
        let best_ask = self.asks.keys().next().copied();
        self.top = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) if bid < ask => {
                let bid_size = self.bids.get(&bid).copied();
                let ask_size = self.asks.get(&ask).copied();
                let mut q = Quote::new(bid, ask);
                q.bid_size = bid_size;
                q.ask_size = ask_size;
                Some(q)
            }
            _ => None,
        };
    }

    fn set_top(&mut self, quote: Quote) {
        self.top = if quote.is_valid() { Some(quote) } else { None };
    }
}

/// Shared dual-venue book state. Each venue is guarded by its own lock so
/// that a write on one venue never blocks a reader on the other.
pub struct BookStore {
    f: RwLock<VenueBook>,
    l: RwLock<VenueBook>,
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookStore {
    pub fn new() -> Self {
        Self {
            f: RwLock::new(VenueBook::default()),
            l: RwLock::new(VenueBook::default()),
        }
    }

    fn side(&self, venue: Venue) -> &RwLock<VenueBook> {
        match venue {
            Venue::F => &self.f,
            Venue::L => &self.l,
        }
    }

    pub fn apply_snapshot(
        &self,
        venue: Venue,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
    ) {
        self.side(venue).write().replace_snapshot(bids, asks);
    }

    pub fn apply_diff(
        &self,
        venue: Venue,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
    ) {
        self.side(venue).write().apply_diff(bids, asks);
    }

    /// Direct top-of-book update, used by feeds that only publish BBO.
    pub fn apply_top(&self, venue: Venue, quote: Quote) {
        self.side(venue).write().set_top(quote);
    }

    pub fn top(&self, venue: Venue) -> Option<Quote> {
        self.side(venue).read().top
    }

    pub fn ready(&self) -> bool {
        self.top(Venue::F).is_some() && self.top(Venue::L).is_some()
    }

    /// `(long_spread, short_spread)`, or `None` if either venue lacks a top.
    ///
    /// `long_spread = L.bid - F.ask` (buy F, sell L); `short_spread = F.bid - L.ask`.
    pub fn spreads(&self) -> Option<(Decimal, Decimal)> {
        let f = self.top(Venue::F)?;
        let l = self.top(Venue::L)?;
        Some((l.bid - f.ask, f.bid - l.ask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn top_of_book_matches_max_bid_min_ask() {
        let store = BookStore::new();
        store.apply_snapshot(
            Venue::F,
            vec![(dec!(99.9), dec!(1)), (dec!(100.0), dec!(2))],
            vec![(dec!(100.2), dec!(1)), (dec!(100.3), dec!(2))],
        );
        let top = store.top(Venue::F).unwrap();
        assert_eq!(top.bid, dec!(100.0));
        assert_eq!(top.ask, dec!(100.2));
    }

    #[test]
    fn zero_size_diff_deletes_level() {
        let store = BookStore::new();
        store.apply_snapshot(
            Venue::F,
            vec![(dec!(100.0), dec!(1))],
            vec![(dec!(100.2), dec!(1))],
        );
        store.apply_diff(Venue::F, vec![(dec!(100.0), dec!(0))], vec![]);
        assert!(store.top(Venue::F).is_none());
    }

    #[test]
    fn spreads_require_both_venues_ready() {
        let store = BookStore::new();
        assert!(store.spreads().is_none());
        store.apply_snapshot(
            Venue::F,
            vec![(dec!(100.0), dec!(1))],
            vec![(dec!(100.2), dec!(1))],
        );
        assert!(store.spreads().is_none());
        store.apply_snapshot(
            Venue::L,
            vec![(dec!(110.1), dec!(1))],
            vec![(dec!(110.3), dec!(1))],
        );
        let (long_spread, short_spread) = store.spreads().unwrap();
        assert_eq!(long_spread, dec!(110.1) - dec!(100.2));
        assert_eq!(short_spread, dec!(100.0) - dec!(110.3));
    }

    #[test]
    fn crossed_top_is_rejected() {
        let store = BookStore::new();
        store.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.0)));
        assert!(store.top(Venue::F).is_none());
    }
}
