#![forbid(unsafe_code)]

//! Escape-sequence decoder state machine.
//!
//! Turns the raw byte stream arriving from a terminal in raw mode into
//! [`Event`] values. VT100 input is prefix-ambiguous: a lone ESC byte is a
//! complete key press *or* the start of a longer sequence, and only a
//! terminating byte or a timeout decides which. The parser therefore never
//! blocks: it consumes whatever bytes it is given, and the platform loop
//! calls [`InputParser::finalize_pending`] when the escape timeout elapses
//! with the machine outside ground state.
//!
//! Device-status-report replies (cursor position, colors, device
//! attributes, pixel geometry) share their framing with ordinary input.
//! They are only interpreted as replies while a request recorded through
//! [`InputParser::note_dsr_request`] is pending and fresh; stale requests
//! are pruned so a late reply cannot be misrouted.
//!
//! # Buffer limits
//!
//! Accumulating states enforce length caps so hostile input cannot grow
//! buffers without bound: oversized escapes finalize early (surfacing as
//! [`UnknownEscape`]) and oversized pastes flush their accumulated text.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::event::{
    ColorReport, ColorReportKind, DeviceAttributesReport, Event, Key, KeyEvent, Modifiers,
    MouseButton, MouseEvent, MouseEventKind, PasteEvent, PixelGeometryKind, PixelGeometryReport,
    Rgb, UnknownEscape,
};
use crate::geometry::{Point, Size};
use crate::key_table;

/// Delay before an unfinished escape sequence is finalized as-is.
///
/// Long enough that a terminal sends a complete sequence in one burst,
/// short enough not to add perceptible lag to a bare Escape press.
pub const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// How long a device-status-report request stays eligible for reply
/// matching before it is silently discarded.
pub const DSR_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Length cap for escape-sequence accumulation.
const MAX_ESCAPE_LEN: usize = 4096;

/// Length cap for paste accumulation.
const MAX_PASTE_LEN: usize = 1024 * 1024;

const ESC: u8 = 0x1b;
const BRACKETED_PASTE_START: &[u8] = b"\x1b[200~";
const BRACKETED_PASTE_END: &[u8] = b"\x1b[201~";
const FOCUS_IN: &[u8] = b"\x1b[I";
const FOCUS_OUT: &[u8] = b"\x1b[O";

/// Parser state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    /// Default state.
    #[default]
    Ground,
    /// Saw ESC.
    Escape,
    /// Saw `ESC [`.
    Csi,
    /// Saw `ESC ]`; accumulate until the `ESC \` string terminator.
    Osc,
    /// Collecting `[0-9;]*` control-sequence parameters.
    Params,
    /// Inside a bracketed-paste block.
    Paste,
    /// The next byte, whatever it is, completes the sequence.
    ExecuteNext,
    /// Collecting a UTF-8 multi-byte character.
    Utf8 {
        /// Bytes collected so far.
        collected: u8,
        /// Total bytes expected.
        expected: u8,
    },
}

/// VT100 input decoder.
///
/// One instance owns all parser state: the escape and paste buffers, the
/// pending-event buffer, the DSR request queue, and the last reported
/// mouse position. Feed it bytes, then drain events:
///
/// ```
/// use vtio_core::input_parser::InputParser;
///
/// let mut parser = InputParser::new();
/// parser.feed(b"\x1b[A"); // Up arrow
/// assert_eq!(parser.take_events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InputParser {
    /// Current state-machine state.
    state: ParserState,
    /// Accumulates escape-sequence bytes.
    escape_buffer: Vec<u8>,
    /// Accumulates bracketed-paste content.
    paste_buffer: Vec<u8>,
    /// Accumulates a UTF-8 multi-byte character.
    utf8_buffer: [u8; 4],
    /// Events produced but not yet drained.
    events: Vec<Event>,
    /// Timestamps of outstanding device-status-report requests, oldest
    /// first.
    dsr_requests: VecDeque<Instant>,
    /// Last reported mouse position, for delta computation.
    last_mouse: Point,
}

impl InputParser {
    /// Create a new parser in ground state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            escape_buffer: Vec::with_capacity(64),
            ..Self::default()
        }
    }

    /// Run the state machine over a batch of input bytes.
    ///
    /// Events accumulate in the internal buffer in byte-arrival order;
    /// drain them with [`take_events`](Self::take_events). If this leaves
    /// the parser outside ground state ([`is_idle`](Self::is_idle) is
    /// false), the caller should arm a timer for [`ESCAPE_TIMEOUT`] and
    /// call [`finalize_pending`](Self::finalize_pending) when it fires
    /// without further input.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.feed_byte(byte);
        }
    }

    /// Whether the state machine is in ground state with nothing pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::Ground
    }

    /// Whether undrained events are buffered.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Drain the event buffer, leaving it empty.
    #[must_use]
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Append an externally produced event (resize notifications from the
    /// platform adapter).
    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Record that a device-status-report request was just written to the
    /// terminal. Replies are matched strictly FIFO against these entries.
    pub fn note_dsr_request(&mut self) {
        self.note_dsr_request_at(Instant::now());
    }

    fn note_dsr_request_at(&mut self, at: Instant) {
        self.dsr_requests.push_back(at);
    }

    /// Whether a device-status-report reply is still expected.
    #[must_use]
    pub fn expect_dsr(&self) -> bool {
        !self.dsr_requests.is_empty()
    }

    /// Finalize whatever is in flight after the escape timeout elapsed.
    ///
    /// In paste state the accumulated text is emitted as a (possibly
    /// truncated) paste, first stripping a trailing partial occurrence of
    /// the end marker. A partial UTF-8 character is discarded. Any other
    /// non-ground state finalizes its escape buffer through the normal
    /// classification path.
    pub fn finalize_pending(&mut self) {
        match self.state {
            ParserState::Ground => {}
            ParserState::Paste => {
                self.state = ParserState::Ground;
                let mut paste = std::mem::take(&mut self.paste_buffer);
                if let Some(idx) = paste.iter().rposition(|&b| b == ESC) {
                    if BRACKETED_PASTE_END.starts_with(&paste[idx..]) {
                        paste.truncate(idx);
                    }
                }
                crate::trace!("paste finalized by timeout ({} bytes)", paste.len());
                self.events.push(Event::Paste(PasteEvent::new(
                    String::from_utf8_lossy(&paste).into_owned(),
                )));
            }
            ParserState::Utf8 { .. } => {
                self.state = ParserState::Ground;
            }
            _ => self.execute(),
        }
    }

    /// Advance the state machine by one byte.
    fn feed_byte(&mut self, byte: u8) {
        match self.state {
            // OSC must come first: ESC inside an OSC body is half of the
            // string terminator, not the start of a new sequence.
            ParserState::Osc => {
                self.escape_buffer.push(byte);
                if byte == b'\\' && self.escape_buffer.ends_with(b"\x1b\\") {
                    self.execute();
                } else if self.escape_buffer.len() >= MAX_ESCAPE_LEN {
                    self.execute();
                }
            }
            ParserState::Paste => {
                self.paste_buffer.push(byte);
                if byte == b'~' && self.paste_buffer.ends_with(BRACKETED_PASTE_END) {
                    let content_len = self.paste_buffer.len() - BRACKETED_PASTE_END.len();
                    self.paste_buffer.truncate(content_len);
                    let paste = std::mem::take(&mut self.paste_buffer);
                    self.events.push(Event::Paste(PasteEvent::new(
                        String::from_utf8_lossy(&paste).into_owned(),
                    )));
                    self.state = ParserState::Ground;
                } else if self.paste_buffer.len() >= MAX_PASTE_LEN {
                    // Flush what we have; the tail of the paste will be
                    // parsed as ordinary input.
                    let paste = std::mem::take(&mut self.paste_buffer);
                    self.events.push(Event::Paste(PasteEvent::new(
                        String::from_utf8_lossy(&paste).into_owned(),
                    )));
                    self.state = ParserState::Ground;
                }
            }
            // ESC anywhere else starts a fresh escape, canceling whatever
            // was in progress.
            _ if byte == ESC => {
                self.escape_buffer.clear();
                self.escape_buffer.push(byte);
                self.state = ParserState::Escape;
            }
            ParserState::ExecuteNext => {
                self.escape_buffer.push(byte);
                self.execute();
            }
            ParserState::Ground => self.feed_ground(byte),
            ParserState::Utf8 { collected, expected } => self.feed_utf8(byte, collected, expected),
            ParserState::Escape => {
                self.escape_buffer.push(byte);
                match byte {
                    b'[' => self.state = ParserState::Csi,
                    b'O' => self.state = ParserState::ExecuteNext,
                    b']' => self.state = ParserState::Osc,
                    _ => self.execute(),
                }
            }
            ParserState::Csi => {
                self.escape_buffer.push(byte);
                match byte {
                    // Linux-console function keys arrive as ESC [ [ x.
                    b'[' => self.state = ParserState::ExecuteNext,
                    // Private-parameter prefixes: SGR mouse (`<`) and the
                    // device-attributes reply form (`?`).
                    b'<' | b'=' | b'>' | b'?' => self.state = ParserState::Params,
                    b'0'..=b'9' | b';' => self.state = ParserState::Params,
                    _ => self.execute(),
                }
            }
            ParserState::Params => {
                self.escape_buffer.push(byte);
                match byte {
                    b'0'..=b'9' | b';' => {
                        if self.escape_buffer.len() >= MAX_ESCAPE_LEN {
                            self.execute();
                        }
                    }
                    _ => self.execute(),
                }
            }
        }
    }

    /// Ground state: printable ASCII is a key, control bytes finalize as
    /// one-byte sequences, UTF-8 lead bytes start accumulation.
    fn feed_ground(&mut self, byte: u8) {
        match byte {
            0x20..=0x7e => {
                self.events
                    .push(Event::Key(KeyEvent::new(Key::Char(byte as char))));
            }
            0x00..=0x1f | 0x7f | 0x9b => {
                self.escape_buffer.clear();
                self.escape_buffer.push(byte);
                self.execute();
            }
            0xc0..=0xdf => {
                self.utf8_buffer[0] = byte;
                self.state = ParserState::Utf8 {
                    collected: 1,
                    expected: 2,
                };
            }
            0xe0..=0xef => {
                self.utf8_buffer[0] = byte;
                self.state = ParserState::Utf8 {
                    collected: 1,
                    expected: 3,
                };
            }
            0xf0..=0xf7 => {
                self.utf8_buffer[0] = byte;
                self.state = ParserState::Utf8 {
                    collected: 1,
                    expected: 4,
                };
            }
            // Stray continuation or invalid lead bytes are dropped.
            _ => {}
        }
    }

    /// Collect UTF-8 continuation bytes; emit the character when complete.
    fn feed_utf8(&mut self, byte: u8, collected: u8, expected: u8) {
        if byte & 0xc0 != 0x80 {
            // Invalid continuation; drop the partial character.
            self.state = ParserState::Ground;
            return;
        }

        self.utf8_buffer[collected as usize] = byte;
        let collected = collected + 1;
        if collected == expected {
            self.state = ParserState::Ground;
            if let Ok(s) = std::str::from_utf8(&self.utf8_buffer[..expected as usize]) {
                if let Some(c) = s.chars().next() {
                    self.events.push(Event::Key(KeyEvent::new(Key::Char(c))));
                }
            }
        } else {
            self.state = ParserState::Utf8 {
                collected,
                expected,
            };
        }
    }

    /// Finalize the escape buffer into an event.
    fn execute(&mut self) {
        self.state = ParserState::Ground;
        let escape = std::mem::take(&mut self.escape_buffer);

        self.prune_dsr_requests(Instant::now());
        if !self.dsr_requests.is_empty() && self.execute_dsr_reply(&escape) {
            return;
        }

        if escape == BRACKETED_PASTE_START {
            self.state = ParserState::Paste;
            self.paste_buffer.clear();
        } else if escape == FOCUS_IN {
            self.events
                .push(Event::Focus(crate::event::FocusChange::Gained));
        } else if escape == FOCUS_OUT {
            self.events
                .push(Event::Focus(crate::event::FocusChange::Lost));
        } else if let Some(event) = self.decode_sgr_mouse(&escape) {
            self.events.push(event);
        } else if let Some(key) = key_table::lookup(&escape) {
            self.events.push(Event::Key(key));
        } else if escape.len() == 2 && escape[0] == ESC && (0x20..=0x7e).contains(&escape[1]) {
            self.events.push(Event::Key(
                KeyEvent::new(Key::Char(escape[1] as char)).with_modifiers(Modifiers::ALT),
            ));
        } else {
            crate::debug!("unrecognized escape sequence: {:?}", escape);
            self.events
                .push(Event::UnknownEscape(UnknownEscape::from_bytes(&escape)));
        }
    }

    /// Discard DSR requests that have gone unanswered past their timeout.
    fn prune_dsr_requests(&mut self, now: Instant) {
        while let Some(front) = self.dsr_requests.front() {
            if now.saturating_duration_since(*front) >= DSR_REQUEST_TIMEOUT {
                self.dsr_requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Try to interpret `escape` as a reply to the oldest pending request.
    ///
    /// Returns true (and consumes one queue entry) on a match; reply
    /// matching takes priority over generic classification while any
    /// request is outstanding.
    fn execute_dsr_reply(&mut self, escape: &[u8]) -> bool {
        let event = if let Some(pos) = parse_cursor_position_report(escape) {
            Event::CursorPositionReport(pos)
        } else if let Some(report) = parse_color_report(escape) {
            Event::ColorReport(report)
        } else if let Some(report) = parse_device_attributes_report(escape) {
            Event::DeviceAttributesReport(report)
        } else if let Some(report) = parse_pixel_geometry_report(escape) {
            Event::PixelGeometryReport(report)
        } else {
            return false;
        };

        self.dsr_requests.pop_front();
        self.events.push(event);
        true
    }

    /// Decode an SGR mouse report: `ESC [ < info ; x ; y (M|m)`.
    fn decode_sgr_mouse(&mut self, escape: &[u8]) -> Option<Event> {
        let rest = escape.strip_prefix(b"\x1b[<")?;
        let (&final_byte, params) = rest.split_last()?;
        if final_byte != b'M' && final_byte != b'm' {
            return None;
        }

        let s = std::str::from_utf8(params).ok()?;
        let mut parts = s.split(';');
        let info: u16 = parts.next()?.parse().ok()?;
        let x: u16 = parts.next()?.parse().ok()?;
        let y: u16 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        // Wire coordinates are 1-based.
        let pos = Point::new(x.saturating_sub(1), y.saturating_sub(1));
        let dx = i32::from(pos.x) - i32::from(self.last_mouse.x);
        let dy = i32::from(pos.y) - i32::from(self.last_mouse.y);
        self.last_mouse = pos;

        let mut button = match info % 4 {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::None,
        };

        let kind = if info & 64 != 0 {
            button = MouseButton::None;
            if info & 1 != 0 {
                MouseEventKind::ScrollDown
            } else {
                MouseEventKind::ScrollUp
            }
        } else if info & 32 != 0 {
            MouseEventKind::Move
        } else if final_byte == b'm' {
            MouseEventKind::Up
        } else if button == MouseButton::None {
            MouseEventKind::Move
        } else {
            MouseEventKind::Down
        };

        let mut modifiers = Modifiers::NONE;
        if info & 4 != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if info & 8 != 0 {
            modifiers |= Modifiers::ALT;
        }
        if info & 16 != 0 {
            modifiers |= Modifiers::CTRL;
        }

        Some(Event::Mouse(MouseEvent {
            pos,
            button,
            kind,
            modifiers,
            dx,
            dy,
            nclicks: 0,
        }))
    }
}

/// Parse a cursor-position report: `ESC [ row ; col R`, 1-based.
fn parse_cursor_position_report(escape: &[u8]) -> Option<Point> {
    let body = escape.strip_prefix(b"\x1b[")?.strip_suffix(b"R")?;
    let s = std::str::from_utf8(body).ok()?;
    let (row, col) = s.split_once(';')?;
    let row: u16 = row.parse().ok()?;
    let col: u16 = col.parse().ok()?;
    Some(Point::new(col.saturating_sub(1), row.saturating_sub(1)))
}

/// Parse a color report: `ESC ] 1 (0|1) ; rgb:RRRR/GGGG/BBBB ESC \`.
fn parse_color_report(escape: &[u8]) -> Option<ColorReport> {
    let body = escape.strip_prefix(b"\x1b]1")?.strip_suffix(b"\x1b\\")?;
    let kind = match body.first()? {
        b'0' => ColorReportKind::Foreground,
        b'1' => ColorReportKind::Background,
        _ => return None,
    };
    let components = body[1..].strip_prefix(b";rgb:")?;

    let mut parts = components.split(|&b| b == b'/');
    let r = parse_color_component(parts.next()?)?;
    let g = parse_color_component(parts.next()?)?;
    let b = parse_color_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }

    Some(ColorReport {
        kind,
        color: Rgb::new(r, g, b),
    })
}

/// Parse one 16-bit hex color component, keeping the top byte.
fn parse_color_component(component: &[u8]) -> Option<u8> {
    if component.len() != 4 {
        return None;
    }
    let s = std::str::from_utf8(&component[..2]).ok()?;
    u8::from_str_radix(s, 16).ok()
}

/// Parse a primary device-attributes report: `ESC [ ? n ; … c`.
fn parse_device_attributes_report(escape: &[u8]) -> Option<DeviceAttributesReport> {
    let body = escape.strip_prefix(b"\x1b[?")?.strip_suffix(b"c")?;
    if body.is_empty() {
        return None;
    }
    let s = std::str::from_utf8(body).ok()?;
    let attributes = s
        .split(';')
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    Some(DeviceAttributesReport { attributes })
}

/// Parse a pixel-geometry report: `ESC [ (4|6) ; height ; width t`.
fn parse_pixel_geometry_report(escape: &[u8]) -> Option<PixelGeometryReport> {
    let body = escape.strip_prefix(b"\x1b[")?.strip_suffix(b"t")?;
    let s = std::str::from_utf8(body).ok()?;
    let mut parts = s.split(';');
    let kind = match parts.next()? {
        "4" => PixelGeometryKind::Terminal,
        "6" => PixelGeometryKind::Cell,
        _ => return None,
    };
    let height: u16 = parts.next()?.parse().ok()?;
    let width: u16 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(PixelGeometryReport {
        kind,
        geometry: Size::new(width, height),
    })
}
