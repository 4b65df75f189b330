#![forbid(unsafe_code)]

//! Control-sequence output encoding.
//!
//! [`OutputBuffer`] accumulates fully-formed escape sequences and plain
//! text, then flushes everything in one write. Batching keeps partial
//! sequences from reaching the terminal and reduces syscall overhead.
//!
//! Every command appends exactly the bytes documented on it; numeric
//! arguments are emitted as given, with out-of-range values passed through
//! for the terminal to interpret.

use std::io::{self, Write};

use crate::geometry::Point;

const ALT_SCREEN_ENTER: &[u8] = b"\x1b[?1049h\x1b[H";
const ALT_SCREEN_LEAVE: &[u8] = b"\x1b[?1049l";

// VT200, any-event, SGR-extended, and urxvt-extended mouse reporting.
const MOUSE_ENABLE: &[u8] = b"\x1b[?1000h\x1b[?1003h\x1b[?1006h\x1b[?1015h";
const MOUSE_DISABLE: &[u8] = b"\x1b[?1000l\x1b[?1003l\x1b[?1015l\x1b[?1006l";

const BRACKETED_PASTE_ENABLE: &[u8] = b"\x1b[?2004h";
const BRACKETED_PASTE_DISABLE: &[u8] = b"\x1b[?2004l";

const FOCUS_ENABLE: &[u8] = b"\x1b[?1004h";
const FOCUS_DISABLE: &[u8] = b"\x1b[?1004l";

const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
const CURSOR_HIDE: &[u8] = b"\x1b[?25l";

const CURSOR_SAVE: &[u8] = b"\x1b7";
const CURSOR_RESTORE: &[u8] = b"\x1b8";

const RESET_ATTRIBUTES: &[u8] = b"\x1b[0m";

const CURSOR_POSITION_QUERY: &[u8] = b"\x1b[6n";
const FOREGROUND_COLOR_QUERY: &[u8] = b"\x1b]10;?\x1b\\";
const BACKGROUND_COLOR_QUERY: &[u8] = b"\x1b]11;?\x1b\\";
const DEVICE_ATTRIBUTES_QUERY: &[u8] = b"\x1b[c";
const CELL_GEOMETRY_QUERY: &[u8] = b"\x1b[16t";
const TERMINAL_GEOMETRY_QUERY: &[u8] = b"\x1b[14t";

/// Which part of the screen [`OutputBuffer::erase_in_display`] clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseInDisplay {
    /// From the cursor to the end of the screen.
    #[default]
    ToEnd = 0,
    /// From the cursor to the beginning of the screen.
    ToStart = 1,
    /// The entire screen.
    All = 2,
    /// The entire screen plus the scrollback buffer.
    Scrollback = 3,
}

/// Which part of the line [`OutputBuffer::erase_in_line`] clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseInLine {
    /// From the cursor to the end of the line.
    #[default]
    ToEnd = 0,
    /// From the cursor to the beginning of the line.
    ToStart = 1,
    /// The entire line.
    All = 2,
}

/// Graphic-rendition parameters for [`OutputBuffer::sgr`].
///
/// All attributes default to off; colors are only emitted when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SgrAttributes {
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub reverse: bool,
    pub strikethrough: bool,
    pub overline: bool,
    /// 24-bit foreground color.
    pub foreground: Option<(u8, u8, u8)>,
    /// 24-bit background color.
    pub background: Option<(u8, u8, u8)>,
}

/// Accumulates outgoing terminal bytes until flushed.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    /// Create an empty output buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(1024),
        }
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append raw text.
    pub fn write(&mut self, data: &str) {
        self.data.extend_from_slice(data.as_bytes());
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write the buffered bytes to `writer` in one call and clear the
    /// buffer. A no-op when nothing is buffered.
    pub fn flush_to<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        writer.write_all(&self.data)?;
        writer.flush()?;
        self.data.clear();
        Ok(())
    }

    /// Flush the buffer to stdout.
    pub fn flush(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.flush_to(&mut stdout)
    }

    // ── Cursor movement ──────────────────────────────────────────────

    /// Move to the next line, scrolling up at the bottom of the screen
    /// (`LF`, repeated `n` times).
    pub fn line_feed(&mut self, n: u16) {
        for _ in 0..n {
            self.data.push(b'\n');
        }
    }

    /// Move the cursor up `n` rows (`CSI n A`).
    pub fn cursor_up(&mut self, n: u16) {
        self.csi_number(n, b'A');
    }

    /// Move the cursor down `n` rows (`CSI n B`).
    pub fn cursor_down(&mut self, n: u16) {
        self.csi_number(n, b'B');
    }

    /// Move the cursor right `n` columns (`CSI n C`).
    pub fn cursor_forward(&mut self, n: u16) {
        self.csi_number(n, b'C');
    }

    /// Move the cursor left `n` columns (`CSI n D`).
    pub fn cursor_back(&mut self, n: u16) {
        self.csi_number(n, b'D');
    }

    /// Move the cursor to the beginning of the line `n` rows down
    /// (`CSI n E`).
    pub fn cursor_next_line(&mut self, n: u16) {
        self.csi_number(n, b'E');
    }

    /// Move the cursor to the beginning of the line `n` rows up
    /// (`CSI n F`).
    pub fn cursor_previous_line(&mut self, n: u16) {
        self.csi_number(n, b'F');
    }

    /// Move the cursor to column `n` (`CSI n G`, 1-based).
    pub fn cursor_horizontal_absolute(&mut self, n: u16) {
        self.csi_number(n, b'G');
    }

    /// Move the cursor to `pos` (`CSI row ; col H`; `pos` is 0-based, the
    /// wire form 1-based).
    pub fn cursor_position(&mut self, pos: Point) {
        let row = u32::from(pos.y) + 1;
        let col = u32::from(pos.x) + 1;
        self.write(&format!("\x1b[{row};{col}H"));
    }

    /// Save the current cursor position (`ESC 7`).
    pub fn save_current_cursor_position(&mut self) {
        self.write_bytes(CURSOR_SAVE);
    }

    /// Restore the saved cursor position (`ESC 8`).
    pub fn restore_saved_cursor_position(&mut self) {
        self.write_bytes(CURSOR_RESTORE);
    }

    // ── Erasing and scrolling ────────────────────────────────────────

    /// Clear part of the screen (`CSI n J`).
    pub fn erase_in_display(&mut self, region: EraseInDisplay) {
        self.csi_number(region as u16, b'J');
    }

    /// Erase part of the current line (`CSI n K`).
    pub fn erase_in_line(&mut self, region: EraseInLine) {
        self.csi_number(region as u16, b'K');
    }

    /// Scroll the screen up `n` rows (`CSI n S`).
    pub fn scroll_up(&mut self, n: u16) {
        self.csi_number(n, b'S');
    }

    /// Scroll the screen down `n` rows (`CSI n T`).
    pub fn scroll_down(&mut self, n: u16) {
        self.csi_number(n, b'T');
    }

    // ── Styling ──────────────────────────────────────────────────────

    /// Reset character attributes (`CSI 0 m`).
    pub fn reset_attributes(&mut self) {
        self.write_bytes(RESET_ATTRIBUTES);
    }

    /// Select graphic-rendition parameters, followed by 24-bit colors
    /// when set (`CSI … m`, `CSI 38;2;r;g;b m`, `CSI 48;2;r;g;b m`).
    pub fn sgr(&mut self, attrs: &SgrAttributes) {
        let styles = [
            (attrs.bold, "1"),
            (attrs.faint, "2"),
            (attrs.italic, "3"),
            (attrs.underline, "4"),
            (attrs.blink, "5"),
            (attrs.reverse, "7"),
            (attrs.strikethrough, "9"),
            (attrs.overline, "53"),
        ];
        let args: Vec<&str> = styles
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, param)| *param)
            .collect();
        self.write(&format!("\x1b[{}m", args.join(";")));

        if let Some((r, g, b)) = attrs.foreground {
            self.write(&format!("\x1b[38;2;{r};{g};{b}m"));
        }
        if let Some((r, g, b)) = attrs.background {
            self.write(&format!("\x1b[48;2;{r};{g};{b}m"));
        }
    }

    // ── Screen modes ─────────────────────────────────────────────────

    /// Set the terminal title (`OSC 2 ; title BEL`).
    pub fn set_title(&mut self, title: &str) {
        self.write(&format!("\x1b]2;{title}\x07"));
    }

    /// Switch to the alternate screen buffer and home the cursor.
    pub fn enter_alternate_screen(&mut self) {
        self.write_bytes(ALT_SCREEN_ENTER);
    }

    /// Return to the main screen buffer.
    pub fn exit_alternate_screen(&mut self) {
        self.write_bytes(ALT_SCREEN_LEAVE);
    }

    /// Enable mouse reporting (VT200 + any-event + SGR + urxvt modes).
    pub fn enable_mouse_support(&mut self) {
        self.write_bytes(MOUSE_ENABLE);
    }

    /// Disable mouse reporting.
    pub fn disable_mouse_support(&mut self) {
        self.write_bytes(MOUSE_DISABLE);
    }

    /// Enable bracketed paste.
    pub fn enable_bracketed_paste(&mut self) {
        self.write_bytes(BRACKETED_PASTE_ENABLE);
    }

    /// Disable bracketed paste.
    pub fn disable_bracketed_paste(&mut self) {
        self.write_bytes(BRACKETED_PASTE_DISABLE);
    }

    /// Enable focus-change reporting.
    pub fn enable_reporting_focus(&mut self) {
        self.write_bytes(FOCUS_ENABLE);
    }

    /// Disable focus-change reporting.
    pub fn disable_reporting_focus(&mut self) {
        self.write_bytes(FOCUS_DISABLE);
    }

    /// Show the cursor.
    pub fn show_cursor(&mut self) {
        self.write_bytes(CURSOR_SHOW);
    }

    /// Hide the cursor.
    pub fn hide_cursor(&mut self) {
        self.write_bytes(CURSOR_HIDE);
    }

    // ── Device-status-report requests ────────────────────────────────
    //
    // The request bytes only; callers pair each with
    // `InputParser::note_dsr_request` and an immediate flush so the reply
    // window starts when the query actually reaches the terminal.

    /// Ask the terminal for the cursor position (`CSI 6 n`).
    pub fn request_cursor_position_report(&mut self) {
        self.write_bytes(CURSOR_POSITION_QUERY);
    }

    /// Ask the terminal for its default foreground color (`OSC 10 ; ?`).
    pub fn request_foreground_color(&mut self) {
        self.write_bytes(FOREGROUND_COLOR_QUERY);
    }

    /// Ask the terminal for its default background color (`OSC 11 ; ?`).
    pub fn request_background_color(&mut self) {
        self.write_bytes(BACKGROUND_COLOR_QUERY);
    }

    /// Ask the terminal for its primary device attributes (`CSI c`).
    pub fn request_device_attributes(&mut self) {
        self.write_bytes(DEVICE_ATTRIBUTES_QUERY);
    }

    /// Ask the terminal for the pixel size of one cell (`CSI 16 t`).
    pub fn request_cell_geometry(&mut self) {
        self.write_bytes(CELL_GEOMETRY_QUERY);
    }

    /// Ask the terminal for the pixel size of the text area (`CSI 14 t`).
    pub fn request_terminal_geometry(&mut self) {
        self.write_bytes(TERMINAL_GEOMETRY_QUERY);
    }

    /// Append `CSI <n> <final>`.
    fn csi_number(&mut self, n: u16, final_byte: u8) {
        self.write(&format!("\x1b[{n}"));
        self.data.push(final_byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drained(buffer: &mut OutputBuffer) -> Vec<u8> {
        let mut sink = Vec::new();
        buffer.flush_to(&mut sink).unwrap();
        sink
    }

    #[test]
    fn cursor_movement_sequences() {
        let mut out = OutputBuffer::new();
        out.cursor_up(2);
        out.cursor_down(1);
        out.cursor_forward(10);
        out.cursor_back(3);
        assert_eq!(drained(&mut out), b"\x1b[2A\x1b[1B\x1b[10C\x1b[3D");
    }

    #[test]
    fn cursor_position_is_one_based_on_the_wire() {
        let mut out = OutputBuffer::new();
        out.cursor_position(Point::new(3, 4));
        assert_eq!(drained(&mut out), b"\x1b[5;4H");
    }

    #[test]
    fn erase_sequences() {
        let mut out = OutputBuffer::new();
        out.erase_in_display(EraseInDisplay::All);
        out.erase_in_line(EraseInLine::ToEnd);
        assert_eq!(drained(&mut out), b"\x1b[2J\x1b[0K");
    }

    #[test]
    fn scroll_and_saved_cursor() {
        let mut out = OutputBuffer::new();
        out.scroll_up(5);
        out.scroll_down(1);
        out.save_current_cursor_position();
        out.restore_saved_cursor_position();
        assert_eq!(drained(&mut out), b"\x1b[5S\x1b[1T\x1b7\x1b8");
    }

    #[test]
    fn sgr_attributes_and_colors() {
        let mut out = OutputBuffer::new();
        out.sgr(&SgrAttributes {
            bold: true,
            underline: true,
            foreground: Some((255, 128, 0)),
            ..Default::default()
        });
        assert_eq!(drained(&mut out), b"\x1b[1;4m\x1b[38;2;255;128;0m".as_slice());
    }

    #[test]
    fn sgr_background_color() {
        let mut out = OutputBuffer::new();
        out.sgr(&SgrAttributes {
            background: Some((1, 2, 3)),
            ..Default::default()
        });
        assert_eq!(drained(&mut out), b"\x1b[m\x1b[48;2;1;2;3m".as_slice());
    }

    #[test]
    fn mode_toggles() {
        let mut out = OutputBuffer::new();
        out.enable_bracketed_paste();
        out.enable_reporting_focus();
        out.hide_cursor();
        assert_eq!(drained(&mut out), b"\x1b[?2004h\x1b[?1004h\x1b[?25l");
    }

    #[test]
    fn mouse_support_covers_all_protocols() {
        let mut out = OutputBuffer::new();
        out.enable_mouse_support();
        let bytes = drained(&mut out);
        for mode in [b"1000h".as_slice(), b"1003h", b"1006h", b"1015h"] {
            assert!(
                bytes.windows(mode.len()).any(|w| w == mode),
                "missing mouse mode {}",
                String::from_utf8_lossy(mode)
            );
        }
    }

    #[test]
    fn alternate_screen_homes_cursor() {
        let mut out = OutputBuffer::new();
        out.enter_alternate_screen();
        out.exit_alternate_screen();
        assert_eq!(drained(&mut out), b"\x1b[?1049h\x1b[H\x1b[?1049l");
    }

    #[test]
    fn title_uses_osc_2() {
        let mut out = OutputBuffer::new();
        out.set_title("vtio demo");
        assert_eq!(drained(&mut out), b"\x1b]2;vtio demo\x07");
    }

    #[test]
    fn dsr_request_sequences() {
        let mut out = OutputBuffer::new();
        out.request_cursor_position_report();
        out.request_foreground_color();
        out.request_background_color();
        out.request_device_attributes();
        out.request_cell_geometry();
        out.request_terminal_geometry();
        assert_eq!(
            drained(&mut out),
            b"\x1b[6n\x1b]10;?\x1b\\\x1b]11;?\x1b\\\x1b[c\x1b[16t\x1b[14t".as_slice()
        );
    }

    #[test]
    fn flush_is_noop_when_empty() {
        let mut out = OutputBuffer::new();
        let mut sink = Vec::new();
        out.flush_to(&mut sink).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn flush_clears_the_buffer() {
        let mut out = OutputBuffer::new();
        out.write("hello");
        assert_eq!(out.len(), 5);
        let _ = drained(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn line_feed_repeats() {
        let mut out = OutputBuffer::new();
        out.line_feed(3);
        assert_eq!(drained(&mut out), b"\n\n\n");
    }
}
