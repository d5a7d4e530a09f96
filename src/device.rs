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

//! The single owned context gluing the OTP applet, Management applet,
//! and HID frame adapter to one HAL implementation. No part of this
//! crate keeps state in a `static` or a process-wide singleton; callers
//! (an APDU dispatcher, a HID driver, a button ISR) all go through one
//! `Device<H>`.

use crate::apdu::{Apdu, Response};
use crate::config::{Capabilities, MANAGEMENT_AID, OTP_AID};
use crate::hal::Hal;
use crate::hid::{HidAdapter, OutboundReport};
use crate::management::{self, ManagementApplet};
use crate::otp::applet::ButtonPressOutcome;
use crate::otp::{OtpApplet, INS_OTP};
use crate::status::StatusWord;

/// Which applet is currently selected, mirroring ISO 7816 applet
/// selection state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum Selected {
    #[default]
    None,
    Otp,
    Management,
}

/// Owns every piece of mutable applet state plus the HAL implementation
/// driving it.
pub struct Device<H: Hal> {
    pub hal: H,
    otp: OtpApplet,
    management: ManagementApplet,
    hid: HidAdapter,
    selected: Selected,
}

impl<H: Hal> Device<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            otp: OtpApplet::new(),
            management: ManagementApplet::new(),
            hid: HidAdapter::new(),
            selected: Selected::None,
        }
    }

    /// ISO 7816 `SELECT` by AID. Returns the selection response bytes
    /// written into `response`.
    pub fn select(&mut self, aid: &[u8], response: &mut Response) {
        if aid == OTP_AID {
            if !management::cap_supported(&mut self.hal, Capabilities::OTP) {
                response.set_status(StatusWord::InsNotSupported);
                return;
            }
            self.selected = Selected::Otp;
            self.otp.on_select(&mut self.hal);
            response.set_status(StatusWord::Ok);
        } else if aid == MANAGEMENT_AID {
            self.selected = Selected::Management;
            let mut text = [0u8; 5];
            let n = self.management.select_response(&mut text);
            response.push(&text[..n]);
            response.set_status(StatusWord::Ok);
        } else {
            response.set_status(StatusWord::InsNotSupported);
        }
    }

    /// Dispatches a command APDU to whichever applet is currently
    /// selected.
    pub fn process_apdu(&mut self, apdu: &Apdu, response: &mut Response) {
        if apdu.cla != 0x00 {
            response.set_status(StatusWord::ClaNotSupported);
            return;
        }
        match self.selected {
            Selected::Otp => {
                if apdu.ins != INS_OTP {
                    response.set_status(StatusWord::InsNotSupported);
                    return;
                }
                if !management::cap_supported(&mut self.hal, Capabilities::OTP) {
                    response.set_status(StatusWord::InsNotSupported);
                    return;
                }
                self.otp.dispatch(&mut self.hal, apdu, false, response);
            }
            Selected::Management => self.management.dispatch(&mut self.hal, apdu, response),
            Selected::None => response.set_status(StatusWord::InsNotSupported),
        }
    }

    /// Delivers a physical button press for `slot` (1 or 2) to the OTP
    /// applet, typing the resulting OTP/code via the keyboard sink.
    pub fn button_pressed(&mut self, slot: u8) -> ButtonPressOutcome {
        self.otp.button_pressed(&mut self.hal, slot)
    }

    /// Advances a challenge/response operation left waiting on a button
    /// press. Returns `true` once resolved.
    pub fn poll_pending_challenge(&mut self, response: &mut Response) -> bool {
        self.otp.poll_pending(&mut self.hal, response)
    }

    /// Feeds one inbound HID `SET_REPORT` payload. On a fully reassembled,
    /// CRC-valid frame, dispatches it to the OTP applet and arms the
    /// reply for subsequent `GET_REPORT` polls.
    pub fn hid_set_report(&mut self, report: &[u8; 8]) {
        let Some(command) = self.hid.on_set_report(report) else {
            return;
        };
        let apdu = Apdu::new(0x00, INS_OTP, command.slot, 0x00, &command.data);
        let mut buf = [0u8; 64];
        let mut response = Response::new(&mut buf, StatusWord::Ok);
        self.otp.dispatch(&mut self.hal, &apdu, true, &mut response);
        if response.status.is_ok() && !response.data().is_empty() {
            self.hid.arm_reply(response.data());
        }
    }

    /// Services one outbound HID `GET_REPORT` poll.
    pub fn hid_get_report(&mut self, out: &mut [u8; 8]) {
        match self.hid.on_get_report(out) {
            OutboundReport::Fragment | OutboundReport::EndOfStream => {}
            OutboundReport::NeedsStatus => {
                let (block, len) = self.otp.status_block(&mut self.hal, true);
                out.copy_from_slice(&block[..8]);
                debug_assert!(len <= 8);
            }
        }
    }
}
