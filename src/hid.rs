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

//! Reassembles 8-byte HID feature reports into 64-byte OTP command frames
//! and re-fragments responses back into reports.

use crate::crc::crc16;

const FRAME_LEN: usize = 70;
const REPORT_LEN: usize = 8;
const REPORT_PAYLOAD_LEN: usize = 7;
const COMMAND_LEN: usize = 64;
const RESET_MARKER: u8 = 0xFF;
const INBOUND_FLAG: u8 = 0x80;
const OUTBOUND_FLAG: u8 = 0x40;
const SEQ_MASK: u8 = 0x1F;
const LAST_SEQ: u8 = 9;

/// A fully reassembled, CRC-verified inbound HID command frame.
pub struct HidCommand {
    pub slot: u8,
    pub data: [u8; COMMAND_LEN],
}

/// What [`HidAdapter::on_get_report`] did with `out`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutboundReport {
    /// `out` was filled with a fragment of an armed reply.
    Fragment,
    /// `out` was filled with the end-of-stream sentinel.
    EndOfStream,
    /// `out` was not touched; the caller must fill it with the current
    /// status block (there is nothing queued to send).
    NeedsStatus,
}

/// The 8-byte HID report reassembly/fragmentation state machine.
pub struct HidAdapter {
    rx_frame: [u8; FRAME_LEN],
    tx_frame: [u8; FRAME_LEN],
    send_remaining: usize,
    curr_seq: u8,
    exp_seq: u8,
}

impl Default for HidAdapter {
    fn default() -> Self {
        Self {
            rx_frame: [0u8; FRAME_LEN],
            tx_frame: [0u8; FRAME_LEN],
            send_remaining: 0,
            curr_seq: 0,
            exp_seq: 0,
        }
    }
}

impl HidAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound 8-byte `SET_REPORT` payload. Returns `Some` once
    /// the tenth fragment completes a frame whose CRC checks out.
    pub fn on_set_report(&mut self, report: &[u8; REPORT_LEN]) -> Option<HidCommand> {
        let control = report[REPORT_PAYLOAD_LEN];
        if control == RESET_MARKER {
            self.reset();
            return None;
        }
        if control & INBOUND_FLAG == 0 {
            return None;
        }
        let seq = control & SEQ_MASK;
        if seq >= 10 {
            return None;
        }
        if seq == 0 {
            self.rx_frame = [0u8; FRAME_LEN];
        }
        let offset = seq as usize * REPORT_PAYLOAD_LEN;
        self.rx_frame[offset..offset + REPORT_PAYLOAD_LEN].copy_from_slice(&report[..REPORT_PAYLOAD_LEN]);
        if seq != LAST_SEQ {
            return None;
        }

        let residual = crc16(&self.rx_frame[..COMMAND_LEN]);
        let received_crc = u16::from_le_bytes([self.rx_frame[65], self.rx_frame[66]]);
        if residual != received_crc {
            log::warn!("hid: dropping frame with bad CRC");
            return None;
        }
        let slot = self.rx_frame[64];
        let mut data = [0u8; COMMAND_LEN];
        data.copy_from_slice(&self.rx_frame[..COMMAND_LEN]);
        Some(HidCommand { slot, data })
    }

    /// Arms a reply to be drained by subsequent `on_get_report` polls:
    /// appends the residue CRC to `data` and resets the fragment cursor.
    pub fn arm_reply(&mut self, data: &[u8]) {
        let mut frame_len = data.len();
        self.tx_frame = [0u8; FRAME_LEN];
        self.tx_frame[..frame_len].copy_from_slice(data);
        let crc = !crc16(&self.tx_frame[..frame_len]);
        self.tx_frame[frame_len..frame_len + 2].copy_from_slice(&crc.to_le_bytes());
        frame_len += 2;
        self.send_remaining = frame_len;
        self.exp_seq = ((frame_len + REPORT_PAYLOAD_LEN - 1) / REPORT_PAYLOAD_LEN) as u8;
        self.curr_seq = 0;
    }

    /// Services one outbound `GET_REPORT` poll.
    pub fn on_get_report(&mut self, out: &mut [u8; REPORT_LEN]) -> OutboundReport {
        if self.send_remaining > 0 {
            let seq = self.curr_seq;
            self.curr_seq += 1;
            let offset = seq as usize * REPORT_PAYLOAD_LEN;
            let chunk = self.send_remaining.min(REPORT_PAYLOAD_LEN);
            *out = [0u8; REPORT_LEN];
            out[..chunk].copy_from_slice(&self.tx_frame[offset..offset + chunk]);
            out[REPORT_PAYLOAD_LEN] = OUTBOUND_FLAG | seq;
            self.send_remaining -= chunk;
            OutboundReport::Fragment
        } else if self.exp_seq > 0 && self.curr_seq == self.exp_seq {
            *out = [0u8; REPORT_LEN];
            out[REPORT_PAYLOAD_LEN] = OUTBOUND_FLAG;
            self.curr_seq = 0;
            self.exp_seq = 0;
            OutboundReport::EndOfStream
        } else {
            OutboundReport::NeedsStatus
        }
    }

    fn reset(&mut self) {
        self.send_remaining = 0;
        self.curr_seq = 0;
        self.exp_seq = 0;
        self.tx_frame = [0u8; FRAME_LEN];
    }
}
