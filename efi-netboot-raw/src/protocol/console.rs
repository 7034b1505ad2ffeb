// SPDX-License-Identifier: MIT OR Apache-2.0

/// Raw key as delivered by a firmware text-input device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: u16,
}

newtype_enum! {
/// A keyboard scan code
///
/// Codes 0x8000 -> 0xFFFF are reserved for OEM extensibility, therefore this
/// is _not_ safe to model as a Rust enum.
pub enum ScanCode: u16 => #[allow(missing_docs)] {
    /// Null scan code, indicates that the Unicode character should be used.
    NULL        = 0x00,
    /// Move cursor up 1 row.
    UP          = 0x01,
    /// Move cursor down 1 row.
    DOWN        = 0x02,
    /// Move cursor right 1 column.
    RIGHT       = 0x03,
    /// Move cursor left 1 column.
    LEFT        = 0x04,
    HOME        = 0x05,
    END         = 0x06,
    INSERT      = 0x07,
    DELETE      = 0x08,
    PAGE_UP     = 0x09,
    PAGE_DOWN   = 0x0A,
    FUNCTION_1  = 0x0B,
    FUNCTION_8  = 0x12,
    ESCAPE      = 0x17,
}}

/// Control characters the boot prompt and menu react to.
pub mod ctrl {
    pub const CTRL_C: u16 = 0x03;
    pub const CTRL_D: u16 = 0x04;
    pub const BACKSPACE: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const CTRL_J: u16 = 0x0A;
    pub const CTRL_M: u16 = 0x0D;
    pub const CTRL_U: u16 = 0x15;
    pub const SPACE: u16 = 0x20;
}
