// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boot prompt, boot menu and boot file discovery.

use alloc::string::String;
use alloc::vec::Vec;

use efi_netboot_raw::protocol::network::dhcp4::PxeVendorTag;
use efi_netboot_raw::protocol::network::pxe::{BOOT_LAYER_INITIAL, BootType, DiscoverControl};
use log::{debug, info, warn};

use super::BaseCode;
use super::offer::{CachedOffer, OfferType};
use super::vendor::BootMenuItem;
use crate::boot::Stall;
use crate::proto::console::{Console, Key, ScanCode, ctrl};
use crate::{Result, Status};

/// Polling period of the console, in microseconds.
const KEY_POLL_INTERVAL: usize = 10_000;
const POLLS_PER_SECOND: usize = 100;
/// Prompt timeout meaning "do not wait, show the menu".
const PROMPT_WAIT_FOREVER: u8 = 255;
/// Characters of a menu item description that are shown.
const MAX_DESCRIPTION_LEN: usize = 70;

/// How the boot prompt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The user asked for the boot menu.
    Selected,
    /// Nobody pressed a key; the default menu item is used.
    TimedOut,
    /// No prompt applies to the cached offer.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MenuInput {
    Abort,
    Select,
    Down,
    Up,
    First,
    Last,
}

fn menu_input(key: Key) -> Option<MenuInput> {
    match key {
        Key::Printable(c) => match u16::try_from(u32::from(c)).ok()? {
            ctrl::CTRL_C => Some(MenuInput::Abort),
            ctrl::CTRL_J | ctrl::CTRL_M => Some(MenuInput::Select),
            ctrl::TAB | ctrl::SPACE => Some(MenuInput::Down),
            ctrl::BACKSPACE => Some(MenuInput::Up),
            _ => match c {
                'd' | 'D' => Some(MenuInput::Down),
                'u' | 'U' => Some(MenuInput::Up),
                _ => None,
            },
        },
        Key::Special(ScanCode::ESCAPE) => Some(MenuInput::Abort),
        Key::Special(ScanCode::DOWN | ScanCode::RIGHT) => Some(MenuInput::Down),
        Key::Special(ScanCode::UP | ScanCode::LEFT) => Some(MenuInput::Up),
        Key::Special(ScanCode::PAGE_UP | ScanCode::HOME) => Some(MenuInput::First),
        Key::Special(ScanCode::PAGE_DOWN | ScanCode::END) => Some(MenuInput::Last),
        Key::Special(_) => None,
    }
}

/// Keys answering the boot prompt: `Ok` opens the menu.
fn prompt_input(key: Key) -> Option<Result> {
    match key {
        Key::Special(ScanCode::FUNCTION_8) => Some(Ok(())),
        Key::Special(ScanCode::ESCAPE) => Some(Err(Status::ABORTED.into())),
        k if k.is_ctrl(ctrl::CTRL_C) => Some(Err(Status::ABORTED.into())),
        k if k.is_ctrl(ctrl::CTRL_M) => Some(Ok(())),
        Key::Printable('m' | 'M') => Some(Ok(())),
        _ => None,
    }
}

fn description(item: &BootMenuItem) -> String {
    let text = &item.description[..item.description.len().min(MAX_DESCRIPTION_LEN)];
    String::from_utf8_lossy(text).into_owned()
}

/// Console message for a failed network boot.
#[must_use]
pub fn pxe_error_message(status: Status) -> &'static str {
    match status {
        Status::BUFFER_TOO_SMALL => "PXE-E05: Buffer size is smaller than the requested file.",
        Status::DEVICE_ERROR => "PXE-E07: Network device error.",
        Status::OUT_OF_RESOURCES => "PXE-E09: Could not allocate I/O buffers.",
        Status::NO_MEDIA => "PXE-E12: Could not detect network connection.",
        Status::NO_RESPONSE => "PXE-E16: No valid offer received.",
        Status::TIMEOUT => "PXE-E18: Server response timeout.",
        Status::ABORTED => "PXE-E21: Remote boot cancelled.",
        Status::ICMP_ERROR => "PXE-E22: Client received ICMP error from server.",
        Status::TFTP_ERROR => "PXE-E23: Client received TFTP error from server.",
        Status::NOT_FOUND => "PXE-E53: No boot filename received.",
        _ => "PXE-E99: Unexpected network error.",
    }
}

impl<C: Console, S: Stall> BaseCode<C, S> {
    /// Waits for a key once the DHCP exchange is done.
    ///
    /// The prompt only exists for PXE 1.0 offers with a menu prompt, and
    /// not when the server told the client to use the boot file name it
    /// sent. F8 or `M` open the menu; Esc or Ctrl-C abort the boot.
    pub fn select_boot_prompt(&mut self) -> Result<PromptOutcome> {
        if self.mode.using_ipv6 {
            return Ok(PromptOutcome::Skipped);
        }
        let Some(source) = self.v4.offer_source() else {
            return Ok(PromptOutcome::Skipped);
        };
        if !matches!(source.offer_type(), OfferType::DhcpPxe10 | OfferType::ProxyPxe10) {
            return Ok(PromptOutcome::Skipped);
        }
        let vendor = source.vendor();
        if vendor.discover_control.contains(DiscoverControl::USE_BOOT_FILE_NAME)
            && source.has_boot_file()
        {
            return Ok(PromptOutcome::Skipped);
        }
        let Some(prompt) = vendor.menu_prompt.clone() else {
            return Ok(PromptOutcome::TimedOut);
        };
        match prompt.timeout {
            0 => return Ok(PromptOutcome::TimedOut),
            PROMPT_WAIT_FOREVER => return Ok(PromptOutcome::Selected),
            _ => {}
        }

        let text = String::from_utf8_lossy(&prompt.text).into_owned();
        let (column, row) = self.console.cursor_position();
        self.print(format_args!("{text} "));

        let mut outcome = PromptOutcome::TimedOut;
        'countdown: for remaining in (1..=prompt.timeout).rev() {
            self.console.set_cursor_position(column + text.len() + 1, row)?;
            self.print(format_args!("({remaining}) "));
            for _ in 0..POLLS_PER_SECOND {
                if let Some(key) = self.console.read_key()? {
                    match prompt_input(key) {
                        Some(Ok(())) => {
                            outcome = PromptOutcome::Selected;
                            break 'countdown;
                        }
                        Some(Err(err)) => {
                            info!("PXE: boot prompt cancelled");
                            self.console.set_cursor_position(0, row + 1)?;
                            return Err(err);
                        }
                        None => {}
                    }
                }
                self.stall.stall(KEY_POLL_INTERVAL);
            }
        }
        self.console.set_cursor_position(0, row + 1)?;
        debug!("PXE: boot prompt {outcome:?}");
        Ok(outcome)
    }

    /// Shows the boot menu of the cached offer and returns the server type
    /// of the chosen item, or of the first item with `use_default`.
    pub fn select_boot_menu(&mut self, use_default: bool) -> Result<BootType> {
        let vendor = self
            .v4
            .offer_source()
            .filter(|_| !self.mode.using_ipv6)
            .map(|source| source.vendor())
            .ok_or(Status::NOT_FOUND)?;
        if !vendor.has(PxeVendorTag::BOOT_MENU) {
            return Err(Status::NOT_FOUND.into());
        }
        let items: Vec<(BootType, String)> = vendor
            .boot_menu
            .iter()
            .map(|item| (item.boot_type, description(item)))
            .collect();
        let Some(&(default, _)) = items.first() else {
            return Err(Status::DEVICE_ERROR.into());
        };
        if use_default {
            return Ok(default);
        }

        self.print(format_args!("\n"));
        for (_, text) in &items {
            self.print(format_args!("{text} \n"));
        }
        let (_, row) = self.console.cursor_position();
        let top = row.saturating_sub(items.len());
        let last = items.len() - 1;

        let mut selected = 0;
        loop {
            self.console.set_highlight(true)?;
            self.console.set_cursor_position(0, top + selected)?;
            self.print(format_args!("{}\r", items[selected].1));
            self.console.set_highlight(false)?;

            let key = loop {
                if let Some(key) = self.console.read_key()? {
                    break key;
                }
                self.stall.stall(KEY_POLL_INTERVAL);
            };
            let Some(input) = menu_input(key) else {
                continue;
            };

            self.console.set_cursor_position(0, top + selected)?;
            self.print(format_args!("{}\r", items[selected].1));
            match input {
                MenuInput::Abort => {
                    info!("PXE: boot menu cancelled");
                    return Err(Status::ABORTED.into());
                }
                MenuInput::Select => break,
                MenuInput::Down => selected = (selected + 1).min(last),
                MenuInput::Up => selected = selected.saturating_sub(1),
                MenuInput::First => selected = 0,
                MenuInput::Last => selected = last,
            }
        }
        self.console.set_cursor_position(0, top + items.len())?;
        info!("PXE: boot menu item {selected} chosen");
        Ok(items[selected].0)
    }

    /// Finds the file to boot: runs DHCP, the boot prompt and menu, boot
    /// server discovery, and reads the boot information.
    ///
    /// The result is available through [`Self::boot_file`] and used by
    /// [`Self::load_file`].
    pub fn discover_boot_file(&mut self) -> Result {
        self.require_started()?;
        self.boot_file = None;
        self.dhcp(true)?;

        let menu = match self.select_boot_prompt()? {
            PromptOutcome::Selected => Some(self.select_boot_menu(false)),
            PromptOutcome::TimedOut => Some(self.select_boot_menu(true)),
            PromptOutcome::Skipped => None,
        };
        match menu {
            Some(Ok(BootType::BOOTSTRAP)) => {
                info!("PXE: local boot selected");
                return Err(Status::ABORTED.into());
            }
            Some(Ok(boot_type)) => {
                let mut layer = BOOT_LAYER_INITIAL;
                self.discover(boot_type, &mut layer, false, None)?;
                if self.mode.pxe_reply_received && !self.mode.proxy_offer_received {
                    self.mode.packets.proxy_offer.clone_from(&self.mode.packets.pxe_reply);
                    self.v4.proxy_offer.clone_from(&self.v4.pxe_reply);
                    self.mode.proxy_offer_received = true;
                }
            }
            Some(Err(err)) if err.status() == Status::ABORTED => return Err(err),
            Some(Err(err)) => debug!("PXE: no boot menu: {:?}", err.status()),
            None => {}
        }

        let file = if self.mode.using_ipv6 {
            self.dhcp6_boot_info()
        } else {
            self.dhcp4_boot_info()
        };
        let file = file.inspect_err(|err| warn!("PXE: no boot file: {:?}", err.status()))?;

        self.print(format_args!("\n  Server IP address is {}", file.server));
        self.print(format_args!("\n  NBP filename is {}", file.name));
        if file.size > 0 {
            self.print(format_args!("\n  NBP filesize is {} Bytes\n", file.size));
        } else {
            self.print(format_args!("\n  NBP filesize is Not Detected\n"));
        }
        info!("PXE: boot file {} on {} ({} bytes)", file.name, file.server, file.size);
        self.boot_file = Some(file);
        Ok(())
    }
}
