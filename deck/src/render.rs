//! Text rendering of captured cards for the command console.
//!
//! Two views: card "art" (12 rows of 80 `*`/`_` cells, rows in physical
//! order 12, 11, 0..9) and a hex dump (80 four-digit values per card).
//! Everything goes through `core::fmt::Write` so the console can point any
//! byte sink at it.

use core::fmt::{self, Write};

use crate::store::{CardRecord, DeckReader, RowPattern, COLUMNS};

/// `core::fmt::Write` adapter over an [`embedded_io::Write`] byte sink.
///
/// A transport error (or a bounded-blocking transport giving up) surfaces
/// as `fmt::Error` and aborts the dump; the remainder is dropped.
pub struct FmtSink<W>(pub W);

impl<W: embedded_io::Write> fmt::Write for FmtSink<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// One card as punch-cell art.
pub fn write_card_art<W: Write>(w: &mut W, number: usize, card: &CardRecord) -> fmt::Result {
    writeln!(w, "Card n. {}", number)?;
    for row in RowPattern::ROW_ORDER {
        for column in 0..COLUMNS {
            w.write_char(if card.columns[column].punched(row) {
                '*'
            } else {
                '_'
            })?;
        }
        w.write_char('\n')?;
    }
    writeln!(w)?;
    writeln!(w)
}

/// One card as 80 hex column values.
pub fn write_card_hex<W: Write>(w: &mut W, number: usize, card: &CardRecord) -> fmt::Result {
    writeln!(w, "Card n. {}", number)?;
    for column in &card.columns {
        write!(w, "{:04X} ", column.raw())?;
    }
    writeln!(w)
}

/// Every completed card as art, with the trailing count.
pub fn write_deck_art<W: Write, const N: usize>(
    w: &mut W,
    reader: &DeckReader<'_, N>,
) -> fmt::Result {
    for (i, card) in reader.iter().enumerate() {
        write_card_art(w, i + 1, card)?;
    }
    writeln!(w, "Total cards: {}", reader.completed())?;
    writeln!(w)?;
    writeln!(w)
}

/// Every completed card as hex, with the trailing count.
pub fn write_deck_hex<W: Write, const N: usize>(
    w: &mut W,
    reader: &DeckReader<'_, N>,
) -> fmt::Result {
    for (i, card) in reader.iter().enumerate() {
        write_card_hex(w, i + 1, card)?;
    }
    writeln!(w, "Total cards: {}", reader.completed())?;
    writeln!(w)?;
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeckStore;
    use std::string::String;

    fn fill_one_card(store: &DeckStore<2>, raw: u16) -> DeckReader<'_, 2> {
        let (mut writer, reader) = store.split().unwrap();
        let slot = writer.append_start(0).unwrap();
        for column in 0..COLUMNS {
            writer.write_column(&slot, column, RowPattern::new(raw));
        }
        writer.complete(slot, 644);
        reader
    }

    #[test]
    fn art_rows_follow_physical_order() {
        // Row 12 and digit row 3 punched everywhere.
        let store = DeckStore::new();
        let reader = fill_one_card(&store, (1 << 12) | (1 << 3));
        let mut out = String::new();
        write_card_art(&mut out, 1, reader.card(0).unwrap()).unwrap();

        let lines: std::vec::Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Card n. 1");
        // Row 12 is printed first, then 11, then digits 0..9.
        assert_eq!(lines[1], "*".repeat(80));
        assert_eq!(lines[2], "_".repeat(80));
        // Digit row 3 is the fourth digit line.
        assert_eq!(lines[6], "*".repeat(80));
        assert_eq!(lines[4], "_".repeat(80));
        // Header, 12 rows, two blank separators.
        assert_eq!(lines.len(), 15);
    }

    #[test]
    fn hex_dump_formats_each_column() {
        let store = DeckStore::new();
        let reader = fill_one_card(&store, 0x1ABC);
        let mut out = String::new();
        write_deck_hex(&mut out, &reader).unwrap();

        assert!(out.starts_with("Card n. 1\n"));
        assert!(out.contains("1ABC 1ABC"));
        assert!(out.contains("Total cards: 1"));
        let hex_line = out.lines().nth(1).unwrap();
        assert_eq!(hex_line.split_whitespace().count(), 80);
    }

    #[test]
    fn empty_deck_reports_zero() {
        let store = DeckStore::<2>::new();
        let (_writer, reader) = store.split().unwrap();
        let mut out = String::new();
        write_deck_art(&mut out, &reader).unwrap();
        assert!(out.starts_with("Total cards: 0"));
    }

    /// Byte sink that accepts `limit` bytes, then fails.
    struct ChokedSink {
        bytes: std::vec::Vec<u8>,
        limit: usize,
    }

    #[derive(Debug)]
    struct Full;

    impl embedded_io::Error for Full {
        fn kind(&self) -> embedded_io::ErrorKind {
            embedded_io::ErrorKind::Other
        }
    }

    impl embedded_io::ErrorType for ChokedSink {
        type Error = Full;
    }

    impl embedded_io::Write for ChokedSink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Full> {
            if self.bytes.len() >= self.limit {
                return Err(Full);
            }
            let n = buf.len().min(self.limit - self.bytes.len());
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Full> {
            Ok(())
        }
    }

    #[test]
    fn fmt_sink_renders_through_byte_writer() {
        let store = DeckStore::new();
        let reader = fill_one_card(&store, 0x0001);
        let mut sink = FmtSink(ChokedSink {
            bytes: std::vec::Vec::new(),
            limit: usize::MAX,
        });
        write_deck_hex(&mut sink, &reader).unwrap();
        let out = std::str::from_utf8(&sink.0.bytes).unwrap();
        assert!(out.starts_with("Card n. 1\n"));
        assert!(out.contains("Total cards: 1"));
    }

    #[test]
    fn fmt_sink_propagates_transport_failure() {
        let store = DeckStore::new();
        let reader = fill_one_card(&store, 0x0001);
        let mut sink = FmtSink(ChokedSink {
            bytes: std::vec::Vec::new(),
            limit: 16,
        });
        assert!(write_deck_hex(&mut sink, &reader).is_err());
        // Whatever was accepted before the failure went through intact.
        assert_eq!(&sink.0.bytes[..9], b"Card n. 1");
    }
}
