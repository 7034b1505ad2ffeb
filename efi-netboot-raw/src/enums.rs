// SPDX-License-Identifier: MIT OR Apache-2.0

//! This module provides tooling that facilitates dealing with C-style enums.
//!
//! Firmware interfaces and network protocols routinely hand back values that
//! are not part of the set of variants known at compile time (vendor status
//! codes, unknown RNDIS message types, reserved DHCP options). Storing such a
//! value in a Rust `enum` would be undefined behavior, so these enums are
//! modeled as integer newtypes with a set of associated constants instead.

/// Interface a C-style enum as an integer newtype.
///
/// This macro implements Debug for you, the way you would expect it to work on
/// Rust enums (printing the variant name instead of its integer value). It also
/// derives Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash and Default, and
/// marks the type `#[repr(transparent)]`.
///
/// ```
/// # use efi_netboot_raw::newtype_enum;
/// newtype_enum! {
///     pub enum UnixBool: i32 => #[allow(missing_docs)] {
///         FALSE          =  0,
///         TRUE           =  1,
///         /// Nobody expects the Unix inquisition!
///         FILE_NOT_FOUND = -1,
///     }
/// }
/// ```
#[macro_export]
macro_rules! newtype_enum {
    (
        $(#[$type_attrs:meta])*
        $visibility:vis enum $type:ident : $base_integer:ty => $(#[$impl_attrs:meta])* {
            $(
                $(#[$variant_attrs:meta])*
                $variant:ident = $value:expr,
            )*
        }
    ) => {
        $(#[$type_attrs])*
        #[repr(transparent)]
        #[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        $visibility struct $type(pub $base_integer);

        $(#[$impl_attrs])*
        #[allow(unused)]
        impl $type {
            $(
                $(#[$variant_attrs])*
                pub const $variant: $type = $type($value);
            )*
        }

        impl core::fmt::Debug for $type {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                match *self {
                    // Display variants by their name, like Rust enums do
                    $(
                        $type::$variant => write!(f, stringify!($variant)),
                    )*

                    // Display unknown variants in tuple struct format
                    $type(unknown) => {
                        write!(f, "{}({})", stringify!($type), unknown)
                    }
                }
            }
        }
    }
}
