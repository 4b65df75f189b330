#![forbid(unsafe_code)]

//! The terminal facade: one object composing a platform console, the
//! escape decoder, and the output encoder.
//!
//! [`raw_mode`](Terminal::raw_mode) should be called before any other
//! operation; [`restore_console`](Terminal::restore_console) returns the
//! terminal to its original mode. Once
//! [`attach`](Terminal::attach) is called, decoded input events are
//! passed to the handler in arrival-order batches until
//! [`unattach`](Terminal::unattach); without a handler, drain them with
//! [`events`](Terminal::events). Output commands accumulate in a buffer
//! that [`flush`](Terminal::flush) writes out atomically.
//!
//! # Usage
//!
//! ```no_run
//! use vtio_tty::platform_terminal;
//!
//! let mut terminal = platform_terminal()?;
//! terminal.raw_mode()?;
//! terminal.enter_alternate_screen();
//! terminal.enable_mouse_support();
//! terminal.flush()?;
//!
//! terminal.attach(|events| {
//!     for event in events {
//!         eprintln!("{event:?}");
//!     }
//! })?;
//!
//! // …application runs…
//!
//! terminal.unattach();
//! terminal.exit_alternate_screen();
//! terminal.flush()?;
//! terminal.restore_console()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, IsTerminal};
use std::sync::{Arc, Mutex};

use vtio_core::event::Event;
use vtio_core::geometry::{Point, Size};
use vtio_core::input_parser::InputParser;
use vtio_core::output::{EraseInDisplay, EraseInLine, OutputBuffer, SgrAttributes};
use vtio_core::platform::{lock_parser, Console, SharedParser};

use crate::NativeConsole;

/// The facade over the platform-selected console.
pub type PlatformTerminal = Terminal<NativeConsole>;

/// Return a terminal for the current platform.
///
/// # Errors
///
/// Fails when stdin is not an interactive terminal.
pub fn platform_terminal() -> io::Result<PlatformTerminal> {
    if !io::stdin().is_terminal() {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "terminal is non-interactive",
        ));
    }
    Ok(Terminal::new(NativeConsole::new()))
}

/// A VT100 terminal: raw-mode control, decoded input events, and
/// buffered control-sequence output.
pub struct Terminal<C: Console> {
    console: C,
    parser: SharedParser,
    out: OutputBuffer,
    raw_mode_active: bool,
    attached: bool,
    in_alternate_screen: bool,
}

impl<C: Console> Terminal<C> {
    /// Wrap a platform console.
    #[must_use]
    pub fn new(console: C) -> Self {
        Self {
            console,
            parser: Arc::new(Mutex::new(InputParser::new())),
            out: OutputBuffer::new(),
            raw_mode_active: false,
            attached: false,
            in_alternate_screen: false,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Put the terminal into raw mode, saving its current settings.
    pub fn raw_mode(&mut self) -> io::Result<()> {
        self.console.raw_mode()?;
        self.raw_mode_active = true;
        Ok(())
    }

    /// Restore the settings saved by [`raw_mode`](Self::raw_mode).
    pub fn restore_console(&mut self) -> io::Result<()> {
        self.console.restore_console()?;
        self.raw_mode_active = false;
        Ok(())
    }

    /// Start generating events from terminal input, delivering each batch
    /// to `handler` on the input-loop thread.
    pub fn attach(&mut self, handler: impl FnMut(Vec<Event>) + Send + 'static) -> io::Result<()> {
        // Stale events from before the handler existed are discarded.
        let _ = lock_parser(&self.parser).take_events();
        self.console
            .attach(Arc::clone(&self.parser), Box::new(handler))?;
        self.attached = true;
        Ok(())
    }

    /// Stop generating events. No handler invocation happens after this
    /// returns.
    pub fn unattach(&mut self) {
        self.console.unattach();
        self.attached = false;
    }

    /// Drain and return buffered input events.
    #[must_use]
    pub fn events(&mut self) -> Vec<Event> {
        lock_parser(&self.parser).take_events()
    }

    /// Current terminal dimensions.
    pub fn size(&self) -> io::Result<Size> {
        self.console.size()
    }

    /// Whether a device-status-report reply is still expected.
    #[must_use]
    pub fn expect_dsr(&self) -> bool {
        lock_parser(&self.parser).expect_dsr()
    }

    /// Whether the alternate screen buffer is active.
    #[must_use]
    pub fn in_alternate_screen(&self) -> bool {
        self.in_alternate_screen
    }

    // ── Output ───────────────────────────────────────────────────────

    /// Append `data` to the output buffer.
    pub fn write(&mut self, data: &str) {
        self.out.write(data);
    }

    /// Write the output buffer to the terminal and flush it.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Set the terminal title.
    pub fn set_title(&mut self, title: &str) {
        self.out.set_title(title);
    }

    /// Enter the alternate screen buffer.
    pub fn enter_alternate_screen(&mut self) {
        self.out.enter_alternate_screen();
        self.in_alternate_screen = true;
    }

    /// Exit the alternate screen buffer.
    pub fn exit_alternate_screen(&mut self) {
        self.out.exit_alternate_screen();
        self.in_alternate_screen = false;
    }

    /// Enable mouse reporting.
    pub fn enable_mouse_support(&mut self) {
        self.out.enable_mouse_support();
    }

    /// Disable mouse reporting.
    pub fn disable_mouse_support(&mut self) {
        self.out.disable_mouse_support();
    }

    /// Enable bracketed paste.
    pub fn enable_bracketed_paste(&mut self) {
        self.out.enable_bracketed_paste();
    }

    /// Disable bracketed paste.
    pub fn disable_bracketed_paste(&mut self) {
        self.out.disable_bracketed_paste();
    }

    /// Enable focus-change reporting.
    pub fn enable_reporting_focus(&mut self) {
        self.out.enable_reporting_focus();
    }

    /// Disable focus-change reporting.
    pub fn disable_reporting_focus(&mut self) {
        self.out.disable_reporting_focus();
    }

    /// Show the cursor.
    pub fn show_cursor(&mut self) {
        self.out.show_cursor();
    }

    /// Hide the cursor.
    pub fn hide_cursor(&mut self) {
        self.out.hide_cursor();
    }

    /// Move to the next line, scrolling up at the bottom of the screen.
    pub fn line_feed(&mut self, n: u16) {
        self.out.line_feed(n);
    }

    /// Move the cursor up `n` rows.
    pub fn cursor_up(&mut self, n: u16) {
        self.out.cursor_up(n);
    }

    /// Move the cursor down `n` rows.
    pub fn cursor_down(&mut self, n: u16) {
        self.out.cursor_down(n);
    }

    /// Move the cursor right `n` columns.
    pub fn cursor_forward(&mut self, n: u16) {
        self.out.cursor_forward(n);
    }

    /// Move the cursor left `n` columns.
    pub fn cursor_back(&mut self, n: u16) {
        self.out.cursor_back(n);
    }

    /// Move the cursor to the beginning of the line `n` rows down.
    pub fn cursor_next_line(&mut self, n: u16) {
        self.out.cursor_next_line(n);
    }

    /// Move the cursor to the beginning of the line `n` rows up.
    pub fn cursor_previous_line(&mut self, n: u16) {
        self.out.cursor_previous_line(n);
    }

    /// Move the cursor to column `n`.
    pub fn cursor_horizontal_absolute(&mut self, n: u16) {
        self.out.cursor_horizontal_absolute(n);
    }

    /// Move the cursor to `pos`.
    pub fn cursor_position(&mut self, pos: Point) {
        self.out.cursor_position(pos);
    }

    /// Clear part of the screen.
    pub fn erase_in_display(&mut self, region: EraseInDisplay) {
        self.out.erase_in_display(region);
    }

    /// Erase part of the current line.
    pub fn erase_in_line(&mut self, region: EraseInLine) {
        self.out.erase_in_line(region);
    }

    /// Scroll the screen up `n` rows.
    pub fn scroll_up(&mut self, n: u16) {
        self.out.scroll_up(n);
    }

    /// Scroll the screen down `n` rows.
    pub fn scroll_down(&mut self, n: u16) {
        self.out.scroll_down(n);
    }

    /// Save the current cursor position.
    pub fn save_current_cursor_position(&mut self) {
        self.out.save_current_cursor_position();
    }

    /// Restore the saved cursor position.
    pub fn restore_saved_cursor_position(&mut self) {
        self.out.restore_saved_cursor_position();
    }

    /// Reset character attributes.
    pub fn reset_attributes(&mut self) {
        self.out.reset_attributes();
    }

    /// Select graphic-rendition parameters.
    pub fn sgr(&mut self, attrs: &SgrAttributes) {
        self.out.sgr(attrs);
    }

    // ── Device-status-report requests ────────────────────────────────

    /// Ask the terminal to report the cursor position.
    pub fn request_cursor_position_report(&mut self) -> io::Result<()> {
        self.request_dsr(OutputBuffer::request_cursor_position_report)
    }

    /// Ask the terminal to report its default foreground color.
    pub fn request_foreground_color(&mut self) -> io::Result<()> {
        self.request_dsr(OutputBuffer::request_foreground_color)
    }

    /// Ask the terminal to report its default background color.
    pub fn request_background_color(&mut self) -> io::Result<()> {
        self.request_dsr(OutputBuffer::request_background_color)
    }

    /// Ask the terminal to report its device attributes.
    pub fn request_device_attributes(&mut self) -> io::Result<()> {
        self.request_dsr(OutputBuffer::request_device_attributes)
    }

    /// Ask the terminal to report the pixel geometry of one cell.
    pub fn request_cell_geometry(&mut self) -> io::Result<()> {
        self.request_dsr(OutputBuffer::request_cell_geometry)
    }

    /// Ask the terminal to report the pixel geometry of the text area.
    pub fn request_terminal_geometry(&mut self) -> io::Result<()> {
        self.request_dsr(OutputBuffer::request_terminal_geometry)
    }

    /// Stamp the reply queue, buffer the request bytes, and flush
    /// immediately so the reply window starts when the query is on the
    /// wire.
    fn request_dsr(&mut self, write_request: fn(&mut OutputBuffer)) -> io::Result<()> {
        lock_parser(&self.parser).note_dsr_request();
        write_request(&mut self.out);
        self.flush()
    }
}

impl<C: Console> Drop for Terminal<C> {
    fn drop(&mut self) {
        // Fields restore in reverse order of setup: stop the input loop,
        // then give the console back its saved settings.
        if self.attached {
            self.console.unattach();
        }
        if self.raw_mode_active {
            let _ = self.console.restore_console();
        }
    }
}
