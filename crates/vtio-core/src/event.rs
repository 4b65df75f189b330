#![forbid(unsafe_code)]

//! Canonical input/event types.
//!
//! Everything the decoder can produce is a variant of [`Event`], so
//! consumers get compiler-checked exhaustive matching. All types derive
//! `Clone`, `PartialEq`, and `Eq` for use in tests and pattern matching.
//!
//! # Design Notes
//!
//! - Mouse and cursor coordinates are 0-indexed (the wire protocol is
//!   1-indexed).
//! - `Modifiers` use bitflags for easy combination.
//! - Device-status-report replies are ordinary events; the decoder only
//!   emits them while a matching request is pending.

use std::collections::BTreeSet;

use bitflags::bitflags;

use crate::geometry::{Point, Size};

/// Canonical input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard key press.
    Key(KeyEvent),

    /// A mouse button, motion, or scroll event.
    Mouse(MouseEvent),

    /// Text delivered through bracketed paste.
    Paste(PasteEvent),

    /// Terminal focus gained or lost.
    Focus(FocusChange),

    /// Terminal was resized.
    Resize(Size),

    /// Reply to a cursor-position request.
    CursorPositionReport(Point),

    /// Reply to a foreground/background color request.
    ColorReport(ColorReport),

    /// Reply to a primary device-attributes request.
    DeviceAttributesReport(DeviceAttributesReport),

    /// Reply to a cell/terminal pixel-geometry request.
    PixelGeometryReport(PixelGeometryReport),

    /// An escape sequence no rule recognized; raw text preserved for
    /// diagnostics.
    UnknownEscape(UnknownEscape),
}

/// A keyboard key.
///
/// Closed enumeration: a printable character or a named special key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A character key.
    Char(char),
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up key.
    PageUp,
    /// Page Down key.
    PageDown,
    /// Insert key.
    Insert,
    /// Delete key.
    Delete,
    /// Backspace key.
    Backspace,
    /// Enter/Return key.
    Enter,
    /// Escape key.
    Escape,
    /// Tab key.
    Tab,
    /// Function key (F1-F24).
    F(u8),
    /// Dedicated scroll-up key.
    ScrollUp,
    /// Dedicated scroll-down key.
    ScrollDown,
}

bitflags! {
    /// Modifier keys held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b000;
        /// Shift key.
        const SHIFT = 0b001;
        /// Alt/Option key.
        const ALT   = 0b010;
        /// Control key.
        const CTRL  = 0b100;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The pressed key.
    pub key: Key,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a key event with no modifiers.
    #[must_use]
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.key, Key::Char(ch) if ch == c)
    }

    /// Check if Ctrl is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button.
    Left,
    /// Middle mouse button.
    Middle,
    /// Right mouse button.
    Right,
    /// No button (motion or scroll).
    None,
}

/// The type of mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    /// Button pressed.
    Down,
    /// Pointer moved (with or without a held button).
    Move,
    /// Button released.
    Up,
    /// Wheel scrolled down.
    ScrollDown,
    /// Wheel scrolled up.
    ScrollUp,
}

/// A mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Pointer position (0-indexed).
    pub pos: Point,
    /// The button involved, if any.
    pub button: MouseButton,
    /// What happened.
    pub kind: MouseEventKind,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
    /// Column delta from the previously reported position.
    pub dx: i32,
    /// Row delta from the previously reported position.
    pub dy: i32,
    /// Consecutive same-button down events. Always 0 at this layer;
    /// click counting is a consumer policy.
    pub nclicks: u8,
}

impl MouseEvent {
    /// Check if Ctrl is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }
}

/// A bracketed-paste event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteEvent {
    /// The pasted text, end marker stripped.
    pub text: String,
}

impl PasteEvent {
    /// Create a paste event.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Direction of a focus change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusChange {
    /// The terminal gained focus.
    Gained,
    /// The terminal lost focus.
    Lost,
}

/// A 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a color from components.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Which color a [`ColorReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorReportKind {
    /// Default foreground color (OSC 10).
    Foreground,
    /// Default background color (OSC 11).
    Background,
}

/// Reply to a foreground/background color request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorReport {
    /// Whether this describes the foreground or background.
    pub kind: ColorReportKind,
    /// The reported color, truncated to 8 bits per component.
    pub color: Rgb,
}

/// Reply to a primary device-attributes request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttributesReport {
    /// The attribute codes the terminal reported.
    pub attributes: BTreeSet<u16>,
}

/// Which geometry a [`PixelGeometryReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelGeometryKind {
    /// Pixel size of one character cell.
    Cell,
    /// Pixel size of the whole text area.
    Terminal,
}

/// Reply to a pixel-geometry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelGeometryReport {
    /// Whether this describes a cell or the terminal.
    pub kind: PixelGeometryKind,
    /// The reported geometry in pixels.
    pub geometry: Size,
}

/// An escape sequence no classification rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEscape {
    /// The raw sequence, lossily decoded for display.
    pub sequence: String,
}

impl UnknownEscape {
    /// Create an unknown-escape event from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            sequence: String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}
