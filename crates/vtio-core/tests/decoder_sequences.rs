//! End-to-end decoder checks over the public API: canonical VT100 input
//! sequences in, canonical events out.

use vtio_core::event::{
    Event, Key, KeyEvent, Modifiers, MouseButton, MouseEventKind, PasteEvent,
};
use vtio_core::geometry::Point;
use vtio_core::input_parser::InputParser;
use vtio_core::output::OutputBuffer;

#[test]
fn every_printable_ascii_byte_is_one_unmodified_key() {
    let mut parser = InputParser::new();
    for byte in 0x20u8..=0x7e {
        parser.feed(&[byte]);
        let events = parser.take_events();
        assert_eq!(
            events,
            vec![Event::Key(KeyEvent::new(Key::Char(byte as char)))],
            "byte 0x{byte:02x}"
        );
        assert!(parser.is_idle());
    }
}

#[test]
fn csi_up_arrow() {
    let mut parser = InputParser::new();
    parser.feed(b"\x1b[A");
    assert_eq!(
        parser.take_events(),
        vec![Event::Key(KeyEvent::new(Key::Up))]
    );
    assert!(parser.is_idle());
}

#[test]
fn sgr_left_click_at_ten_five() {
    let mut parser = InputParser::new();
    parser.feed(b"\x1b[<0;10;5M");
    let events = parser.take_events();
    let Event::Mouse(event) = &events[0] else {
        panic!("expected mouse event, got {events:?}");
    };
    assert_eq!(event.pos, Point::new(9, 4));
    assert_eq!(event.button, MouseButton::Left);
    assert_eq!(event.kind, MouseEventKind::Down);
    assert_eq!((event.dx, event.dy), (9, 4));
}

#[test]
fn paste_with_literal_tilde_inside() {
    let mut parser = InputParser::new();
    parser.feed(b"\x1b[200~hello~\x1b[201~");
    assert_eq!(
        parser.take_events(),
        vec![Event::Paste(PasteEvent::new("hello~"))]
    );
}

#[test]
fn cursor_position_reply_consumes_pending_request() {
    let mut parser = InputParser::new();
    parser.note_dsr_request();
    assert!(parser.expect_dsr());

    parser.feed(b"\x1b[5;3R");
    assert_eq!(
        parser.take_events(),
        vec![Event::CursorPositionReport(Point::new(2, 4))]
    );
    assert!(!parser.expect_dsr());
}

#[test]
fn lone_escape_resolves_to_escape_key_on_timeout() {
    let mut parser = InputParser::new();
    parser.feed(&[0x1b]);
    assert!(!parser.is_idle());
    assert!(parser.take_events().is_empty());

    parser.finalize_pending();
    assert_eq!(
        parser.take_events(),
        vec![Event::Key(KeyEvent::new(Key::Escape))]
    );
}

#[test]
fn cursor_position_round_trip() {
    // Encode a cursor move to (3, 4)…
    let mut out = OutputBuffer::new();
    out.cursor_position(Point::new(3, 4));
    let mut encoded = Vec::new();
    out.flush_to(&mut encoded).unwrap();
    assert_eq!(encoded, b"\x1b[5;4H");

    // …and decoding the same 1-based coordinate pair as a cursor-position
    // reply reproduces (3, 4).
    let mut parser = InputParser::new();
    parser.note_dsr_request();
    parser.feed(b"\x1b[5;4R");
    assert_eq!(
        parser.take_events(),
        vec![Event::CursorPositionReport(Point::new(3, 4))]
    );
}

#[test]
fn draining_events_twice_yields_nothing_new() {
    let mut parser = InputParser::new();
    parser.feed(b"abc");
    assert_eq!(parser.take_events().len(), 3);
    assert!(parser.take_events().is_empty());
}

#[test]
fn alt_modified_keys() {
    let mut parser = InputParser::new();
    parser.feed(b"\x1bq");
    assert_eq!(
        parser.take_events(),
        vec![Event::Key(
            KeyEvent::new(Key::Char('q')).with_modifiers(Modifiers::ALT)
        )]
    );
}

#[test]
fn interleaved_keys_and_sequences_keep_arrival_order() {
    let mut parser = InputParser::new();
    parser.feed(b"a\x1b[Bz\x1b[5~");
    assert_eq!(
        parser.take_events(),
        vec![
            Event::Key(KeyEvent::new(Key::Char('a'))),
            Event::Key(KeyEvent::new(Key::Down)),
            Event::Key(KeyEvent::new(Key::Char('z'))),
            Event::Key(KeyEvent::new(Key::PageUp)),
        ]
    );
}
