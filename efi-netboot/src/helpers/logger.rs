// SPDX-License-Identifier: MIT OR Apache-2.0

//! This optional feature adds support for the `log` crate, providing
//! a custom logger implementation which writes to a firmware console.
//!
//! The main export of this module is the `Logger` structure,
//! which implements the `log` crate's trait `Log`.
//!
//! # Implementation details
//!
//! The implementation is not the most efficient, since there is no buffering
//! done. Every record is written straight through to the console.

use crate::{Result, Status};
use core::fmt::{self, Write};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// Set up logging
///
/// Installs `logger` as the global logger, connects it to `output` and sets
/// the maximum level to the level selected through the `log` crate's
/// features.
///
/// # Safety
///
/// `output` must stay valid until [`Logger::disable`] is called, and you
/// must arrange for that to happen before boot services are exited.
pub unsafe fn init<W: Write + 'static>(logger: &'static Logger<W>, output: *mut W) -> Result {
    unsafe { logger.set_output(output) };

    // Can only fail if a logger is already installed.
    log::set_logger(logger).map_err(|_| Status::ALREADY_STARTED)?;

    log::set_max_level(log::STATIC_MAX_LEVEL);
    Ok(())
}

/// Logging implementation which writes to a console.
///
/// If this logger is used as a global logger, you must disable it using the
/// `disable` method before exiting UEFI boot services in order to prevent
/// undefined behaviour from inadvertent logging.
#[derive(Debug)]
pub struct Logger<W> {
    writer: AtomicPtr<W>,
}

impl<W> Logger<W> {
    /// Creates a new logger.
    ///
    /// The logger is initially disabled. Call [`set_output`] to enable it.
    ///
    /// [`set_output`]: Self::set_output
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Get the output pointer (may be null).
    #[must_use]
    fn output(&self) -> *mut W {
        self.writer.load(Ordering::Acquire)
    }

    /// Set the console to which the logger will write.
    ///
    /// If a null pointer is passed for `output`, this method is equivalent to
    /// calling [`disable`].
    ///
    /// # Safety
    ///
    /// The `output` pointer must either be null or point to a valid console.
    /// That object must remain valid until the logger is either disabled, or
    /// `set_output` is called with a different `output`.
    ///
    /// [`disable`]: Self::disable
    pub unsafe fn set_output(&self, output: *mut W) {
        self.writer.store(output, Ordering::Release);
    }

    /// Disable the logger.
    pub fn disable(&self) {
        unsafe { self.set_output(ptr::null_mut()) }
    }
}

impl<W> Default for Logger<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> log::Log for Logger<W> {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Some(writer) = unsafe { self.output().as_mut() } {
            // Errors are dropped: there is nowhere left to report them.
            let _ = DecoratedLog::write(
                writer,
                record.level(),
                record.args(),
                record.file().unwrap_or("<unknown file>"),
                record.line().unwrap_or(0),
            );
        }
    }

    fn flush(&self) {
        // This simple logger does not buffer output.
    }
}

// The logger is not thread-safe, but the UEFI boot environment only uses one processor.
unsafe impl<W> Sync for Logger<W> {}
unsafe impl<W> Send for Logger<W> {}

/// Writer wrapper which prints a log level in front of every line of text
///
/// `fmt::Arguments` can only be handed to an `fmt::Write` implementation, and
/// without allocating there is no way to post-process the formatted string.
/// So the decoration is injected in the middle of the `fmt::Write` machinery
/// by intercepting the strings it sends to the writer.
struct DecoratedLog<'writer, 'a, W: fmt::Write> {
    writer: &'writer mut W,
    log_level: log::Level,
    at_line_start: bool,
    file: &'a str,
    line: u32,
}

impl<'writer, 'a, W: fmt::Write> DecoratedLog<'writer, 'a, W> {
    // Call this method to print a level-annotated log
    fn write(
        writer: &'writer mut W,
        log_level: log::Level,
        args: &fmt::Arguments,
        file: &'a str,
        line: u32,
    ) -> fmt::Result {
        let mut decorated_writer = Self {
            writer,
            log_level,
            at_line_start: true,
            file,
            line,
        };
        writeln!(decorated_writer, "{}", *args)
    }
}

impl<W: fmt::Write> fmt::Write for DecoratedLog<'_, '_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.lines();

        // The input may start in the middle of an output line; only decorate
        // real line starts.
        let first = lines.next().unwrap_or("");
        if self.at_line_start {
            write!(
                self.writer,
                "[{:>5}]: {:>12}@{:03}: ",
                self.log_level, self.file, self.line
            )?;
            self.at_line_start = false;
        }
        write!(self.writer, "{first}")?;

        for line in lines {
            let level = self.log_level;
            write!(self.writer, "\n{level}: {line}")?;
        }

        // `lines()` swallows a trailing newline: emit it and re-arm the
        // decoration for the next line.
        if let Some('\n') = s.chars().next_back() {
            writeln!(self.writer)?;
            self.at_line_start = true;
        }
        Ok(())
    }
}
