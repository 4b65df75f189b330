//! Property-based invariant tests for the input decoder.
//!
//! Verifies:
//! 1. The decoder never panics on arbitrary byte soup, even with timeout
//!    finalization interleaved, and always ends in a drainable state.
//! 2. Chunking invariance: splitting a byte stream at any point produces
//!    the same events as feeding it whole.
//! 3. Printable ASCII in ground state maps one byte to one unmodified key.
//! 4. Bracketed pastes round-trip their content.
//! 5. SGR mouse reports round-trip their coordinates (1-based wire,
//!    0-based events).
//! 6. Draining events is idempotent.

use proptest::prelude::*;
use vtio_core::event::{Event, Key, KeyEvent};
use vtio_core::geometry::Point;
use vtio_core::input_parser::InputParser;

fn arb_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..512)
}

fn arb_printable() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0x20u8..=0x7e, 1..64)
}

proptest! {
    #[test]
    fn never_panics_on_arbitrary_input(bytes in arb_bytes(), finalize_at in 0usize..512) {
        let mut parser = InputParser::new();
        for (i, chunk) in bytes.chunks(7).enumerate() {
            parser.feed(chunk);
            if i == finalize_at {
                parser.finalize_pending();
            }
        }
        parser.finalize_pending();
        let _ = parser.take_events();
    }

    #[test]
    fn chunking_does_not_change_events(bytes in arb_bytes(), split in 0usize..512) {
        let mut whole = InputParser::new();
        whole.feed(&bytes);

        let mut split_parser = InputParser::new();
        let mid = split.min(bytes.len());
        split_parser.feed(&bytes[..mid]);
        split_parser.feed(&bytes[mid..]);

        prop_assert_eq!(whole.take_events(), split_parser.take_events());
    }

    #[test]
    fn printable_bytes_are_unmodified_keys(bytes in arb_printable()) {
        let mut parser = InputParser::new();
        parser.feed(&bytes);
        let events = parser.take_events();
        prop_assert_eq!(events.len(), bytes.len());
        for (event, byte) in events.iter().zip(&bytes) {
            prop_assert_eq!(
                event,
                &Event::Key(KeyEvent::new(Key::Char(*byte as char)))
            );
        }
    }

    #[test]
    fn bracketed_paste_round_trips(content in "[ -~]{0,128}") {
        let mut parser = InputParser::new();
        let mut bytes = b"\x1b[200~".to_vec();
        bytes.extend_from_slice(content.as_bytes());
        bytes.extend_from_slice(b"\x1b[201~");
        parser.feed(&bytes);

        let events = parser.take_events();
        prop_assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Paste(paste) => prop_assert_eq!(&paste.text, &content),
            other => prop_assert!(false, "expected paste, got {:?}", other),
        }
    }

    #[test]
    fn sgr_mouse_round_trips_coordinates(
        info in prop_oneof![Just(0u16), Just(1), Just(2), Just(32), Just(64), Just(65)],
        x in 1u16..=500,
        y in 1u16..=500,
    ) {
        let mut parser = InputParser::new();
        parser.feed(format!("\x1b[<{info};{x};{y}M").as_bytes());
        let events = parser.take_events();
        prop_assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Mouse(mouse) => {
                prop_assert_eq!(mouse.pos, Point::new(x - 1, y - 1));
            }
            other => prop_assert!(false, "expected mouse, got {:?}", other),
        }
    }

    #[test]
    fn draining_is_idempotent(bytes in arb_bytes()) {
        let mut parser = InputParser::new();
        parser.feed(&bytes);
        let _ = parser.take_events();
        prop_assert!(parser.take_events().is_empty());
    }
}
