// SPDX-License-Identifier: MIT OR Apache-2.0

//! The console logger installed as the global `log` backend.

#![cfg(feature = "logger")]

use efi_netboot::Status;
use efi_netboot::helpers::logger::{self, Logger};

static LOGGER: Logger<String> = Logger::new();

#[test]
fn global_logger_decorates_and_disables() {
    let console: *mut String = Box::leak(Box::new(String::new()));
    unsafe { logger::init(&LOGGER, console) }.unwrap();

    let line = line!() + 1;
    log::info!("Station IP address is {}", "10.0.0.5");
    log::warn!("PXE: offer ignored\nno boot file");

    // A second global logger cannot be installed.
    let other: &'static Logger<String> = Box::leak(Box::new(Logger::new()));
    let status = unsafe { logger::init(other, console) }.unwrap_err().status();
    assert_eq!(status, Status::ALREADY_STARTED);

    LOGGER.disable();
    log::error!("not written");

    let output = unsafe { &*console };
    let expected = format!(
        "[ INFO]: {:>12}@{:03}: Station IP address is 10.0.0.5\n\
         [ WARN]: {:>12}@{:03}: PXE: offer ignored\nWARN: no boot file\n",
        file!(),
        line,
        file!(),
        line + 1,
    );
    assert_eq!(*output, expected);
}
