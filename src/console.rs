//! Command console, served from the idle loop.
//!
//! A read-only consumer of the capture table: it holds the deck reader and
//! the USB serial transport, polls for single command bytes with zero
//! timeout, and renders completed cards on demand. It never sees the
//! in-progress slot; the reader's completed count bounds everything it can
//! touch, so no locking against the acquisition interrupts is needed.
//!
//! All byte movement goes through the transport's [`embedded_io`] traits;
//! rendering goes through [`render::FmtSink`].
//!
//! Commands:
//! * space — dump every completed card as 12 rows of `*`/`_` cells
//! * `a`/`A` — dump every completed card as 80 hex column values

use embedded_io::Read;

use deck::render::{self, FmtSink};
use deck::DeckReader;

use crate::hardware::SerialInterface;

pub struct Console<const N: usize> {
    serial: SerialInterface,
    reader: DeckReader<'static, N>,
}

impl<const N: usize> Console<N> {
    pub fn new(serial: SerialInterface, reader: DeckReader<'static, N>) -> Self {
        Self { serial, reader }
    }

    pub fn usb_is_suspended(&self) -> bool {
        self.serial.usb_is_suspended()
    }

    /// Service USB and dispatch at most one command byte.
    pub fn poll(&mut self) {
        self.serial.process();
        let mut buf = [0u8; 1];
        if let Ok(1..) = self.serial.read(&mut buf) {
            self.dispatch(buf[0]);
        }
    }

    fn dispatch(&mut self, byte: u8) {
        let reader = self.reader;
        let mut sink = FmtSink(&mut self.serial);
        // A dump aborted by a wedged host is dropped; the transport's
        // bounded write already gave up.
        match byte {
            b' ' => {
                let _ = render::write_deck_art(&mut sink, &reader);
            }
            b'a' | b'A' => {
                let _ = render::write_deck_hex(&mut sink, &reader);
            }
            _ => {}
        }
    }
}
