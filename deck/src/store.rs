//! Fixed-capacity arena of captured cards.
//!
//! The store is an append-only table with exactly one writer (the
//! acquisition state machine, running in interrupt context) and any number
//! of readers (the command console, running in the idle loop). There is no
//! lock: the writer only ever touches the one open slot, readers only ever
//! see slots below the completed count, and publication is a release store
//! of that count. A blocking mutex here would invert priorities against the
//! interrupt context.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Number of columns on a standard punched card.
pub const COLUMNS: usize = 80;

/// Snapshot of the row sense lines for one column.
///
/// Rows 12 and 11 occupy bits 12 and 11, digit rows 0 through 9 occupy bits
/// 0 through 9. Bit 10 carries no sense line and is always clear; the mask
/// enforces that on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowPattern(u16);

impl RowPattern {
    /// Bits backed by a physical sense line.
    pub const MASK: u16 = 0x1BFF;

    /// Row print order: 12-edge first, then 11, then the digit rows.
    pub const ROW_ORDER: [u8; 12] = [12, 11, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9];

    /// Mask a raw port read down to the sense lines.
    pub const fn new(raw: u16) -> Self {
        Self(raw & Self::MASK)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Whether the given row (bit position) is punched.
    pub const fn punched(self, row: u8) -> bool {
        self.0 & (1 << row) != 0
    }
}

/// One captured card.
///
/// `start_tick` and `end_tick` are the timebase count at insertion and
/// removal. Unsampled columns (a card pulled before its pre-roll elapsed,
/// or one shorter than 80 columns of travel) stay blank.
#[derive(Debug, Clone)]
pub struct CardRecord {
    pub start_tick: u32,
    pub end_tick: u32,
    pub columns: [RowPattern; COLUMNS],
}

impl CardRecord {
    pub const EMPTY: Self = Self {
        start_tick: 0,
        end_tick: 0,
        columns: [RowPattern::new(0); COLUMNS],
    };

    /// Timebase edges that elapsed while this card was under the sensor.
    pub fn transit_ticks(&self) -> u32 {
        self.end_tick.wrapping_sub(self.start_tick)
    }
}

/// Writer-side handle to the one in-progress record.
///
/// Deliberately neither `Copy` nor `Clone`: `complete` consumes it, so a
/// finalized slot cannot be written again.
pub struct Slot(usize);

impl Slot {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only table of up to `N` captured cards.
///
/// Statically allocated by the firmware; `split` hands out the single
/// writer and a copyable reader.
pub struct DeckStore<const N: usize> {
    cards: UnsafeCell<[CardRecord; N]>,
    completed: AtomicUsize,
    taken: AtomicBool,
}

// SAFETY: interior mutability is confined to the open slot (index
// `completed`), reachable only through the unique `DeckWriter`. Readers
// access indices strictly below `completed`, synchronized by the
// release/acquire pair on that counter.
unsafe impl<const N: usize> Sync for DeckStore<N> {}

impl<const N: usize> DeckStore<N> {
    pub const fn new() -> Self {
        Self {
            cards: UnsafeCell::new([CardRecord::EMPTY; N]),
            completed: AtomicUsize::new(0),
            taken: AtomicBool::new(false),
        }
    }

    /// Split the store into its unique writer and a reader.
    ///
    /// Returns `None` on any call but the first.
    pub fn split(&self) -> Option<(DeckWriter<'_, N>, DeckReader<'_, N>)> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((DeckWriter { store: self }, DeckReader { store: self }))
    }

    fn card_ptr(&self, index: usize) -> *mut CardRecord {
        debug_assert!(index < N);
        // Element-wise raw access: no reference to the whole array is ever
        // formed, so concurrent shared references to completed elements
        // remain valid.
        unsafe { (self.cards.get() as *mut CardRecord).add(index) }
    }
}

impl<const N: usize> Default for DeckStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique writer handle. Held by the acquisition state machine.
pub struct DeckWriter<'a, const N: usize> {
    store: &'a DeckStore<N>,
}

impl<'a, const N: usize> DeckWriter<'a, N> {
    /// Open the next slot, recording the insertion tick.
    ///
    /// Returns `None` when the table is exhausted; the caller drops the
    /// card rather than corrupting a stored one.
    pub fn append_start(&mut self, start_tick: u32) -> Option<Slot> {
        let index = self.store.completed.load(Ordering::Relaxed);
        if index >= N {
            log::warn!("capture table full ({} cards), dropping card", N);
            return None;
        }
        // SAFETY: `index` is the open slot; no reader may observe it until
        // `complete` publishes it.
        unsafe {
            *self.store.card_ptr(index) = CardRecord {
                start_tick,
                ..CardRecord::EMPTY
            };
        }
        Some(Slot(index))
    }

    /// Store one column sample in the open slot.
    ///
    /// The column index is trusted: the sole caller is the state machine,
    /// whose own counter never exceeds [`COLUMNS`].
    pub fn write_column(&mut self, slot: &Slot, column: usize, value: RowPattern) {
        debug_assert_eq!(slot.0, self.store.completed.load(Ordering::Relaxed));
        debug_assert!(column < COLUMNS);
        // SAFETY: `slot` proves the index is open and unpublished.
        unsafe {
            (*self.store.card_ptr(slot.0)).columns[column] = value;
        }
    }

    /// Finalize the open slot and make it visible to readers.
    pub fn complete(&mut self, slot: Slot, end_tick: u32) {
        // SAFETY: as in `write_column`; the release store below is the
        // publication point.
        unsafe {
            (*self.store.card_ptr(slot.0)).end_tick = end_tick;
        }
        self.store.completed.store(slot.0 + 1, Ordering::Release);
    }
}

/// Read view over the completed records.
pub struct DeckReader<'a, const N: usize> {
    store: &'a DeckStore<N>,
}

impl<'a, const N: usize> Clone for DeckReader<'a, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, const N: usize> Copy for DeckReader<'a, N> {}

impl<'a, const N: usize> DeckReader<'a, N> {
    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of finalized cards.
    pub fn completed(&self) -> usize {
        self.store.completed.load(Ordering::Acquire)
    }

    /// A finalized card, or `None` at and beyond the open slot.
    pub fn card(&self, index: usize) -> Option<&'a CardRecord> {
        if index >= self.completed() {
            return None;
        }
        // SAFETY: `index` is below the acquired completed count, so the
        // record is finalized and will never be written again.
        Some(unsafe { &*self.store.card_ptr(index) })
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a CardRecord> {
        let this = *self;
        (0..this.completed()).filter_map(move |i| this.card(i))
    }
}
