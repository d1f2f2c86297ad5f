//! Capture logic for an 80-column punched-card reader.
//!
//! Everything in this crate is hardware-independent: the acquisition state
//! machine consumes tagged sensor edges, the store is a fixed arena of
//! captured cards, and rendering is plain `core::fmt`. The firmware crate
//! owns the pins and interrupt vectors and feeds events in; all of the
//! timing and bookkeeping here runs identically on the host, where it is
//! tested.
#![no_std]

#[cfg(test)]
extern crate std;

pub mod acquire;
pub mod feeder;
pub mod render;
pub mod store;

pub use acquire::{Acquisition, Edge, Timing};
pub use store::{CardRecord, DeckReader, DeckStore, DeckWriter, RowPattern, Slot, COLUMNS};
