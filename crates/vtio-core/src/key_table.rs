#![forbid(unsafe_code)]

//! Fixed escape-sequence → key classification.
//!
//! Maps complete escape strings (and bare control bytes) to named keys:
//! CSI cursor/navigation keys with xterm modifier parameters, `CSI n ~`
//! keycodes, SS3 function keys, and the Linux-console `ESC [ [` variant.
//! Sequences outside this table fall through to the caller's Alt+char and
//! unknown-escape handling.

use crate::event::{Key, KeyEvent, Modifiers};

const ESC: u8 = 0x1b;

/// Look up a complete escape sequence in the fixed key table.
pub(crate) fn lookup(escape: &[u8]) -> Option<KeyEvent> {
    match escape {
        [byte] => lookup_control(*byte),
        [ESC, b'O', byte] => lookup_ss3(*byte),
        [ESC, b'[', b'[', byte] => lookup_linux_console(*byte),
        [ESC, b'[', body @ .., final_byte] => lookup_csi(body, *final_byte),
        _ => None,
    }
}

/// Bare control bytes arriving outside any escape sequence.
fn lookup_control(byte: u8) -> Option<KeyEvent> {
    let event = match byte {
        // NUL is what Ctrl+Space produces.
        0x00 => KeyEvent::new(Key::Char(' ')).with_modifiers(Modifiers::CTRL),
        0x09 => KeyEvent::new(Key::Tab),
        0x0a | 0x0d => KeyEvent::new(Key::Enter),
        0x1b => KeyEvent::new(Key::Escape),
        0x7f => KeyEvent::new(Key::Backspace),
        0x01..=0x1a => {
            let c = (byte - 0x01 + b'a') as char;
            KeyEvent::new(Key::Char(c)).with_modifiers(Modifiers::CTRL)
        }
        0x1c..=0x1f => {
            let c = (byte - 0x1c + b'\\') as char;
            KeyEvent::new(Key::Char(c)).with_modifiers(Modifiers::CTRL)
        }
        _ => return None,
    };
    Some(event)
}

/// SS3 (`ESC O`) sequences: F1-F4 and application-cursor-mode keys.
fn lookup_ss3(byte: u8) -> Option<KeyEvent> {
    let key = match byte {
        b'P' => Key::F(1),
        b'Q' => Key::F(2),
        b'R' => Key::F(3),
        b'S' => Key::F(4),
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        // Keypad enter.
        b'M' => Key::Enter,
        _ => return None,
    };
    Some(KeyEvent::new(key))
}

/// Linux-console `ESC [ [` function keys.
fn lookup_linux_console(byte: u8) -> Option<KeyEvent> {
    let key = match byte {
        b'A' => Key::F(1),
        b'B' => Key::F(2),
        b'C' => Key::F(3),
        b'D' => Key::F(4),
        b'E' => Key::F(5),
        _ => return None,
    };
    Some(KeyEvent::new(key))
}

/// CSI sequences with a named-key final byte, `body` being the parameter
/// bytes between `ESC [` and the final.
fn lookup_csi(body: &[u8], final_byte: u8) -> Option<KeyEvent> {
    match final_byte {
        b'A' => Some(KeyEvent::new(Key::Up).with_modifiers(modifier_param(body))),
        b'B' => Some(KeyEvent::new(Key::Down).with_modifiers(modifier_param(body))),
        b'C' => Some(KeyEvent::new(Key::Right).with_modifiers(modifier_param(body))),
        b'D' => Some(KeyEvent::new(Key::Left).with_modifiers(modifier_param(body))),
        b'H' => Some(KeyEvent::new(Key::Home).with_modifiers(modifier_param(body))),
        b'F' => Some(KeyEvent::new(Key::End).with_modifiers(modifier_param(body))),
        b'Z' => Some(KeyEvent::new(Key::Tab).with_modifiers(Modifiers::SHIFT)),
        b'~' => lookup_csi_tilde(body),
        _ => None,
    }
}

/// `CSI n (; m)? ~` keycodes per the xterm legacy table.
fn lookup_csi_tilde(body: &[u8]) -> Option<KeyEvent> {
    let code = first_param(body)?;
    let key = match code {
        1 | 7 => Key::Home,
        2 => Key::Insert,
        3 => Key::Delete,
        4 | 8 => Key::End,
        5 => Key::PageUp,
        6 => Key::PageDown,
        11 => Key::F(1),
        12 => Key::F(2),
        13 => Key::F(3),
        14 => Key::F(4),
        15 => Key::F(5),
        17 => Key::F(6),
        18 => Key::F(7),
        19 => Key::F(8),
        20 => Key::F(9),
        21 => Key::F(10),
        23 => Key::F(11),
        24 => Key::F(12),
        25 => Key::F(13),
        26 => Key::F(14),
        28 => Key::F(15),
        29 => Key::F(16),
        31 => Key::F(17),
        32 => Key::F(18),
        33 => Key::F(19),
        34 => Key::F(20),
        _ => return None,
    };
    Some(KeyEvent::new(key).with_modifiers(modifier_param(body)))
}

/// Parse the first numeric CSI parameter.
fn first_param(body: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(body).ok()?;
    s.split(';').next()?.parse().ok()
}

/// Parse the second (modifier) CSI parameter, defaulting to none.
fn modifier_param(body: &[u8]) -> Modifiers {
    let Ok(s) = std::str::from_utf8(body) else {
        return Modifiers::NONE;
    };
    let value: u32 = s
        .split(';')
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    modifiers_from_xterm(value)
}

/// Decode the xterm modifier encoding: `value = 1 + modifier_bits` with
/// Shift=1, Alt=2, Ctrl=4.
pub(crate) fn modifiers_from_xterm(value: u32) -> Modifiers {
    let bits = value.saturating_sub(1);
    let mut mods = Modifiers::NONE;
    if bits & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows() {
        assert_eq!(lookup(b"\x1b[A"), Some(KeyEvent::new(Key::Up)));
        assert_eq!(lookup(b"\x1b[B"), Some(KeyEvent::new(Key::Down)));
        assert_eq!(lookup(b"\x1b[C"), Some(KeyEvent::new(Key::Right)));
        assert_eq!(lookup(b"\x1b[D"), Some(KeyEvent::new(Key::Left)));
    }

    #[test]
    fn modified_arrows() {
        assert_eq!(
            lookup(b"\x1b[1;5A"),
            Some(KeyEvent::new(Key::Up).with_modifiers(Modifiers::CTRL))
        );
        assert_eq!(
            lookup(b"\x1b[1;2D"),
            Some(KeyEvent::new(Key::Left).with_modifiers(Modifiers::SHIFT))
        );
        assert_eq!(
            lookup(b"\x1b[1;8C"),
            Some(
                KeyEvent::new(Key::Right)
                    .with_modifiers(Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL)
            )
        );
    }

    #[test]
    fn navigation_tilde_codes() {
        assert_eq!(lookup(b"\x1b[2~"), Some(KeyEvent::new(Key::Insert)));
        assert_eq!(lookup(b"\x1b[3~"), Some(KeyEvent::new(Key::Delete)));
        assert_eq!(lookup(b"\x1b[5~"), Some(KeyEvent::new(Key::PageUp)));
        assert_eq!(lookup(b"\x1b[6~"), Some(KeyEvent::new(Key::PageDown)));
        assert_eq!(lookup(b"\x1b[1~"), Some(KeyEvent::new(Key::Home)));
        assert_eq!(lookup(b"\x1b[8~"), Some(KeyEvent::new(Key::End)));
    }

    #[test]
    fn function_keys() {
        assert_eq!(lookup(b"\x1bOP"), Some(KeyEvent::new(Key::F(1))));
        assert_eq!(lookup(b"\x1bOS"), Some(KeyEvent::new(Key::F(4))));
        assert_eq!(lookup(b"\x1b[15~"), Some(KeyEvent::new(Key::F(5))));
        assert_eq!(lookup(b"\x1b[24~"), Some(KeyEvent::new(Key::F(12))));
        assert_eq!(lookup(b"\x1b[34~"), Some(KeyEvent::new(Key::F(20))));
        assert_eq!(
            lookup(b"\x1b[15;2~"),
            Some(KeyEvent::new(Key::F(5)).with_modifiers(Modifiers::SHIFT))
        );
    }

    #[test]
    fn linux_console_function_keys() {
        assert_eq!(lookup(b"\x1b[[A"), Some(KeyEvent::new(Key::F(1))));
        assert_eq!(lookup(b"\x1b[[E"), Some(KeyEvent::new(Key::F(5))));
    }

    #[test]
    fn shift_tab() {
        assert_eq!(
            lookup(b"\x1b[Z"),
            Some(KeyEvent::new(Key::Tab).with_modifiers(Modifiers::SHIFT))
        );
    }

    #[test]
    fn control_bytes() {
        assert_eq!(lookup(&[0x09]), Some(KeyEvent::new(Key::Tab)));
        assert_eq!(lookup(&[0x0d]), Some(KeyEvent::new(Key::Enter)));
        assert_eq!(lookup(&[0x1b]), Some(KeyEvent::new(Key::Escape)));
        assert_eq!(lookup(&[0x7f]), Some(KeyEvent::new(Key::Backspace)));
        assert_eq!(
            lookup(&[0x01]),
            Some(KeyEvent::new(Key::Char('a')).with_modifiers(Modifiers::CTRL))
        );
        assert_eq!(
            lookup(&[0x1a]),
            Some(KeyEvent::new(Key::Char('z')).with_modifiers(Modifiers::CTRL))
        );
        assert_eq!(
            lookup(&[0x00]),
            Some(KeyEvent::new(Key::Char(' ')).with_modifiers(Modifiers::CTRL))
        );
        assert_eq!(
            lookup(&[0x1f]),
            Some(KeyEvent::new(Key::Char('_')).with_modifiers(Modifiers::CTRL))
        );
    }

    #[test]
    fn unmapped_sequences() {
        assert_eq!(lookup(b"\x1b[999~"), None);
        assert_eq!(lookup(b"\x1bOz"), None);
        assert_eq!(lookup(b"\x1b["), None);
        assert_eq!(lookup(&[0x9b]), None);
    }

    #[test]
    fn xterm_modifier_decoding() {
        assert_eq!(modifiers_from_xterm(1), Modifiers::NONE);
        assert_eq!(modifiers_from_xterm(2), Modifiers::SHIFT);
        assert_eq!(modifiers_from_xterm(3), Modifiers::ALT);
        assert_eq!(modifiers_from_xterm(5), Modifiers::CTRL);
        assert_eq!(
            modifiers_from_xterm(8),
            Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL
        );
    }
}
