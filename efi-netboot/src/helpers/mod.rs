// SPDX-License-Identifier: MIT OR Apache-2.0

//! This module provides miscellaneous opinionated but optional helpers to
//! better integrate the drivers with the Rust ecosystem.
//!
//! For now, this includes an implementation of [`Log`] (feature `logger`)
//! which writes decorated lines to any [`core::fmt::Write`] console.
//!
//! **PLEASE NOTE** that these helpers are meant for the pre exit boot service
//! epoch.
//!
//! [`Log`]: log::Log

#[cfg(feature = "logger")]
pub mod logger;
