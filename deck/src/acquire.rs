//! Acquisition state machine.
//!
//! The reader hardware gives no "column strobe": only a dense train of
//! odometer edges and a presence signal that falls while a card blocks the
//! sensor. Column boundaries are derived by decimation — skip a pre-roll of
//! edges after insertion (the mechanical lead between the presence sensor
//! and the first data row), then sample the row lines on the last edge of
//! every per-column group, which lands the sample mid-column instead of on
//! a bouncing transition. Both counts encode the gear ratio between the
//! odometer and the column pitch; they are calibration values, not protocol.
//!
//! The machine is fed tagged events by the interrupt glue and never touches
//! hardware. The caller must deliver events serialized; see the firmware's
//! task priorities.

use crate::store::{DeckWriter, RowPattern, Slot, COLUMNS};

/// Decimation and plausibility constants.
///
/// A full card is expected to take 4 + 8 * 80 = 644 edges; `anomaly_ticks`
/// sits comfortably beyond that.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Edges skipped between insertion and the first column sample.
    pub pre_roll: u32,
    /// Edges per column; the sample is taken on the last one.
    pub per_column: u32,
    /// Tick count at which a "possible missed edge" advisory is emitted.
    pub anomaly_ticks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            pre_roll: 4,
            per_column: 8,
            anomaly_ticks: 700,
        }
    }
}

/// A sensor event, one variant per logical signal.
///
/// The timebase variant carries the row-line snapshot taken at the edge so
/// the machine stays free of hardware access.
#[derive(Debug, Clone, Copy)]
pub enum Edge {
    /// Presence signal fell: a card started blocking the sensor.
    PresenceFell,
    /// Presence signal rose: the card cleared the sensor.
    PresenceRose,
    /// One odometer pulse, with the current row-line state.
    Timebase(RowPattern),
}

/// The acquisition state machine. One instance per device lifetime.
///
/// Owns the unique deck writer: every store mutation flows through here.
pub struct Acquisition<'a, const N: usize> {
    timing: Timing,
    writer: DeckWriter<'a, N>,
    inserted: bool,
    column: usize,
    edge_budget: u32,
    ticks: u32,
    slot: Option<Slot>,
    anomaly: bool,
}

impl<'a, const N: usize> Acquisition<'a, N> {
    pub fn new(writer: DeckWriter<'a, N>, timing: Timing) -> Self {
        Self {
            timing,
            writer,
            inserted: false,
            column: 0,
            edge_budget: 0,
            ticks: 0,
            slot: None,
            anomaly: false,
        }
    }

    /// Dispatch one serialized sensor event.
    pub fn handle(&mut self, edge: Edge) {
        match edge {
            Edge::PresenceFell => self.presence_fell(),
            Edge::PresenceRose => self.presence_rose(),
            Edge::Timebase(rows) => self.timebase(rows),
        }
    }

    /// Whether a card is currently under the sensor.
    pub fn card_present(&self) -> bool {
        self.inserted
    }

    /// Columns sampled for the in-progress card.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Free-running timebase count (reset when a card leaves).
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Whether the current session tripped the missed-edge advisory.
    pub fn anomaly(&self) -> bool {
        self.anomaly
    }

    fn presence_fell(&mut self) {
        // The signal is only trusted on the polarity the state expects; a
        // second fall while a card is already under the sensor is noise.
        if self.inserted {
            return;
        }
        self.inserted = true;
        self.column = 0;
        self.edge_budget = self.timing.pre_roll;
        self.anomaly = false;
        // On exhaustion the card transits unsampled; presence tracking must
        // still follow the physical signal.
        self.slot = self.writer.append_start(self.ticks);
    }

    fn presence_rose(&mut self) {
        if !self.inserted {
            return;
        }
        self.inserted = false;
        if let Some(slot) = self.slot.take() {
            self.writer.complete(slot, self.ticks);
        }
        self.ticks = 0;
    }

    fn timebase(&mut self, rows: RowPattern) {
        // Counted unconditionally: travel is measured even with no card
        // under the sensor, and an anomalously long card shows up as a
        // large end_tick.
        self.ticks = self.ticks.wrapping_add(1);
        if !self.inserted {
            return;
        }

        if self.ticks == self.timing.anomaly_ticks {
            // Advisory only; columns captured so far stay valid.
            match &self.slot {
                Some(slot) => log::warn!(
                    "possible missed edge: {} ticks into card {}",
                    self.ticks,
                    slot.index() + 1,
                ),
                None => log::warn!(
                    "possible missed edge: {} ticks into unrecorded card",
                    self.ticks,
                ),
            }
            self.anomaly = true;
        }

        if self.column >= COLUMNS {
            // Sampling for this card is done; discard edges until the next
            // insertion rearms the budget.
            self.edge_budget = 0;
        }
        if self.edge_budget == 0 {
            return;
        }
        self.edge_budget -= 1;
        if self.edge_budget == 0 {
            if let Some(slot) = &self.slot {
                self.writer.write_column(slot, self.column, rows);
            }
            self.column += 1;
            self.edge_budget = self.timing.per_column;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeckStore;

    fn pattern(raw: u16) -> RowPattern {
        RowPattern::new(raw)
    }

    fn feed_edges<const N: usize>(acq: &mut Acquisition<'_, N>, n: u32, rows: RowPattern) {
        for _ in 0..n {
            acq.handle(Edge::Timebase(rows));
        }
    }

    #[test]
    fn idle_edges_do_not_sample() {
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        feed_edges(&mut acq, 1000, pattern(0x1BFF));
        assert_eq!(acq.column(), 0);
        assert_eq!(acq.ticks(), 1000);
        assert_eq!(reader.completed(), 0);
    }

    #[test]
    fn full_card_scenario() {
        // PRE_ROLL=4, PER_COLUMN=8: 644 edges fill all 80 columns.
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 644, pattern(0x1ABC));
        assert_eq!(acq.column(), 80);
        acq.handle(Edge::PresenceRose);

        assert_eq!(reader.completed(), 1);
        let card = reader.card(0).unwrap();
        assert_eq!(card.start_tick, 0);
        assert_eq!(card.end_tick, 644);
        assert!(card.columns.iter().all(|c| *c == pattern(0x1ABC)));
        // Tick counter restarts for the next card.
        assert_eq!(acq.ticks(), 0);
    }

    #[test]
    fn column_index_is_bounded() {
        let store = DeckStore::<4>::new();
        let (writer, _reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        acq.handle(Edge::PresenceFell);
        let mut last = 0;
        for _ in 0..2000 {
            acq.handle(Edge::Timebase(pattern(0)));
            assert!(acq.column() >= last);
            assert!(acq.column() <= COLUMNS);
            last = acq.column();
        }
        assert_eq!(acq.column(), COLUMNS);
    }

    #[test]
    fn duplicate_presence_edges_are_ignored() {
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        // Rise while idle: noise.
        acq.handle(Edge::PresenceRose);
        assert!(!acq.card_present());

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 20, pattern(0x0001));
        let column = acq.column();
        let ticks = acq.ticks();

        // Second fall while active: no state change.
        acq.handle(Edge::PresenceFell);
        assert_eq!(acq.column(), column);
        assert_eq!(acq.ticks(), ticks);
        assert!(acq.card_present());

        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.completed(), 1);
    }

    #[test]
    fn fall_rearms_leftover_state() {
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        // First card runs past 80 columns, leaving a zeroed budget behind.
        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 800, pattern(0x0002));
        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.completed(), 1);

        // The next insertion starts from scratch.
        acq.handle(Edge::PresenceFell);
        assert_eq!(acq.column(), 0);
        feed_edges(&mut acq, 4 + 8, pattern(0x0200));
        assert_eq!(acq.column(), 1);
        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.card(1).unwrap().columns[0], pattern(0x0200));
    }

    #[test]
    fn short_transit_captures_nothing() {
        // Pulled back out before the pre-roll elapsed.
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 3, pattern(0x1BFF));
        acq.handle(Edge::PresenceRose);

        assert_eq!(reader.completed(), 1);
        let card = reader.card(0).unwrap();
        assert_eq!(card.end_tick, 3);
        assert!(card.columns.iter().all(|c| *c == RowPattern::default()));
    }

    #[test]
    fn exhausted_table_drops_card() {
        let store = DeckStore::<1>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 644, pattern(0x0004));
        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.completed(), 1);

        // Table is full: the next card transits without a record.
        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 644, pattern(0x0008));
        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.completed(), 1);
        assert_eq!(reader.card(0).unwrap().columns[0], pattern(0x0004));
    }

    #[test]
    fn anomaly_advisory_fires_once_and_preserves_data() {
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 699, pattern(0x0010));
        assert!(!acq.anomaly());
        acq.handle(Edge::Timebase(pattern(0x0010)));
        assert!(acq.anomaly());
        acq.handle(Edge::Timebase(pattern(0x0010)));

        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.completed(), 1);
        let card = reader.card(0).unwrap();
        assert_eq!(card.end_tick, 701);
        assert!(card.columns.iter().all(|c| *c == pattern(0x0010)));
    }

    #[test]
    fn anomaly_on_unrecorded_card_keeps_state() {
        // Table already full: the long transit has no slot, but the
        // advisory path must still run without touching stored data.
        let store = DeckStore::<1>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, Timing::default());

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 644, pattern(0x0100));
        acq.handle(Edge::PresenceRose);
        assert_eq!(reader.completed(), 1);

        acq.handle(Edge::PresenceFell);
        feed_edges(&mut acq, 701, pattern(0x0002));
        assert!(acq.anomaly());
        acq.handle(Edge::PresenceRose);

        assert_eq!(reader.completed(), 1);
        assert!(reader
            .card(0)
            .unwrap()
            .columns
            .iter()
            .all(|c| *c == pattern(0x0100)));
    }

    #[test]
    fn tunable_timing_is_honored() {
        let timing = Timing {
            pre_roll: 2,
            per_column: 3,
            anomaly_ticks: 50,
        };
        let store = DeckStore::<4>::new();
        let (writer, reader) = store.split().unwrap();
        let mut acq = Acquisition::new(writer, timing);

        acq.handle(Edge::PresenceFell);
        // Pre-roll of 2: the first sample lands on edge 2, the second
        // three edges later on edge 5.
        acq.handle(Edge::Timebase(pattern(0x0020)));
        assert_eq!(acq.column(), 0);
        acq.handle(Edge::Timebase(pattern(0x0020)));
        assert_eq!(acq.column(), 1);
        feed_edges(&mut acq, 2, pattern(0x0040));
        assert_eq!(acq.column(), 1);
        acq.handle(Edge::Timebase(pattern(0x0040)));
        assert_eq!(acq.column(), 2);
        acq.handle(Edge::PresenceRose);
        let card = reader.card(0).unwrap();
        assert_eq!(card.columns[0], pattern(0x0020));
        assert_eq!(card.columns[1], pattern(0x0040));
    }
}
