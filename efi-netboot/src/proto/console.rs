// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text console used by the boot prompt, the boot menu and PXE messages.

use crate::Result;
use core::fmt;
use efi_netboot_raw::protocol::console::InputKey;

pub use efi_netboot_raw::protocol::console::{ScanCode, ctrl};

/// A key read from the console (high-level version)
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Key {
    /// The key is associated with a printable Unicode character
    Printable(char),

    /// The key is special (arrow, function, multimedia...)
    Special(ScanCode),
}

impl Key {
    /// Returns true if the key is the control character `code`.
    #[must_use]
    pub fn is_ctrl(self, code: u16) -> bool {
        matches!(self, Self::Printable(c) if u32::from(c) == u32::from(code))
    }
}

impl From<InputKey> for Key {
    fn from(k: InputKey) -> Self {
        if ScanCode(k.scan_code) == ScanCode::NULL {
            Self::Printable(char::from_u32(u32::from(k.unicode_char)).unwrap_or('\u{fffd}'))
        } else {
            Self::Special(ScanCode(k.scan_code))
        }
    }
}

/// Interactive text console.
pub trait Console: fmt::Write {
    /// Reads a pending keystroke without waiting.
    fn read_key(&mut self) -> Result<Option<Key>>;

    /// Current cursor position as `(column, row)`.
    fn cursor_position(&self) -> (usize, usize);

    /// Moves the cursor.
    fn set_cursor_position(&mut self, column: usize, row: usize) -> Result;

    /// Switches between the normal and the highlighted text attribute.
    fn set_highlight(&mut self, highlight: bool) -> Result;
}
