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

//! Slot lifecycle (configure/update/swap), challenge/response, and
//! button-triggered OTP emission. Owned by [`crate::device::Device`];
//! nothing in here is a global or a static.

use crate::apdu::{Apdu, Response};
use crate::crc::{crc16, modhex_encode};
use crate::hal::{
    Aes128, ButtonPoll, ButtonSource, FileId, Hal, HmacSha1, KeyboardSink, MonotonicClock, Rng,
    SlotStore,
};
use crate::otp::hotp;
use crate::otp::record::{
    is_all_zero, is_valid_candidate, CfgFlags, CounterArea, SlotRecord, TktFlags, ACC_CODE_SIZE,
    COUNTER_AREA_LEN, RECORD_LEN, STATIC_TICKET_LEN, STORED_LEN,
};
use crate::status::StatusWord;

pub const INS_OTP: u8 = 0x01;

const P1_CONFIGURE_1: u8 = 0x01;
const P1_CONFIGURE_2: u8 = 0x03;
const P1_UPDATE_1: u8 = 0x04;
const P1_UPDATE_2: u8 = 0x05;
const P1_SWAP: u8 = 0x06;
const P1_GET_SERIAL: u8 = 0x10;
const P1_GET_CONFIG: u8 = 0x13;
const P1_CHAL_YUBICO_1: u8 = 0x20;
const P1_CHAL_YUBICO_2: u8 = 0x28;
const P1_CHAL_HMAC_1: u8 = 0x30;
const P1_CHAL_HMAC_2: u8 = 0x38;

const CONFIG1_VALID: u8 = 0x01;
const CONFIG2_VALID: u8 = 0x02;
const CONFIG1_TOUCH: u8 = 0x04;
const CONFIG2_TOUCH: u8 = 0x08;

/// Outcome of a button press delivered to [`OtpApplet::button_pressed`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ButtonPressOutcome {
    Emitted,
    EmptySlot,
    ChallengeResponseSlot,
    CapabilityDisabled,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ChallengeMode {
    Hmac,
    Yubico,
}

struct PendingChallenge {
    slot: u8,
    mode: ChallengeMode,
    data: [u8; 64],
}

/// The OTP applet's mutable state: two slots (held in persistent storage,
/// addressed by `FileId`), plus the small amount of state that must
/// survive across APDUs but not across power cycles.
pub struct OtpApplet {
    config_seq: u8,
    status_byte: u8,
    session_counter: [u8; 2],
    scanned: bool,
    pending: Option<PendingChallenge>,
}

impl Default for OtpApplet {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpApplet {
    pub fn new() -> Self {
        Self {
            config_seq: 0,
            status_byte: 0,
            session_counter: [0, 0],
            scanned: false,
            pending: None,
        }
    }

    fn file_id(slot: u8) -> FileId {
        if slot == 1 {
            FileId::Slot1
        } else {
            FileId::Slot2
        }
    }

    fn read_slot<H: Hal>(hal: &mut H, slot: u8) -> Option<(SlotRecord, CounterArea)> {
        let id = Self::file_id(slot);
        if !hal.store().has_data(id) {
            return None;
        }
        let mut buf = [0u8; STORED_LEN];
        let n = hal.store().read(id, &mut buf);
        if n < STORED_LEN {
            return None;
        }
        let mut record_bytes = [0u8; RECORD_LEN];
        record_bytes.copy_from_slice(&buf[..RECORD_LEN]);
        let mut counter_bytes = [0u8; COUNTER_AREA_LEN];
        counter_bytes.copy_from_slice(&buf[RECORD_LEN..STORED_LEN]);
        Some((SlotRecord::from_bytes(&record_bytes), CounterArea(counter_bytes)))
    }

    fn write_slot<H: Hal>(hal: &mut H, slot: u8, record: &SlotRecord, counter: &CounterArea) {
        let mut buf = [0u8; STORED_LEN];
        buf[..RECORD_LEN].copy_from_slice(&record.to_bytes());
        buf[RECORD_LEN..].copy_from_slice(&counter.0);
        hal.store().write(Self::file_id(slot), &buf);
        hal.store().flush();
    }

    /// Reconciles `config_seq` with whichever slots currently hold data.
    /// Call once when the applet is selected.
    pub fn on_select<H: Hal>(&mut self, hal: &mut H) {
        let any_data = hal.store().has_data(FileId::Slot1) || hal.store().has_data(FileId::Slot2);
        self.config_seq = if any_data { 1 } else { 0 };
    }

    /// One-shot power-up scan: every Yubico-OTP-mode slot gets its use
    /// counter bumped, so a power cycle alone advances it even without an
    /// emission.
    pub fn init_once<H: Hal>(&mut self, hal: &mut H) {
        if self.scanned {
            return;
        }
        for slot in [1u8, 2u8] {
            if let Some((record, mut counter)) = Self::read_slot(hal, slot) {
                if record.is_yubico_otp() {
                    let next = counter.use_counter().wrapping_add(1);
                    if next <= 0x7fff {
                        counter.set_use_counter(next);
                        Self::write_slot(hal, slot, &record, &counter);
                    }
                }
            }
        }
        self.scanned = true;
    }

    /// Dispatches an OTP-applet command APDU (`INS_OTP`, P2 = 0). Writes
    /// the response body and status word into `response`.
    ///
    /// `is_otp` distinguishes the HID-triggered call path (`true`) from
    /// ordinary smartcard APDU dispatch (`false`); it only affects the
    /// shape of the status block (see [`OtpApplet::status_block`]).
    pub fn dispatch<H: Hal>(&mut self, hal: &mut H, apdu: &Apdu, is_otp: bool, response: &mut Response) {
        if apdu.p2 != 0x00 {
            response.set_status(StatusWord::IncorrectP1P2);
            return;
        }
        match apdu.p1 {
            P1_CONFIGURE_1 => self.configure(hal, 1, apdu.data, is_otp, response),
            P1_CONFIGURE_2 => self.configure(hal, 2, apdu.data, is_otp, response),
            P1_UPDATE_1 => self.update(hal, 1, apdu.data, is_otp, response),
            P1_UPDATE_2 => self.update(hal, 2, apdu.data, is_otp, response),
            P1_SWAP => self.swap(hal, is_otp, response),
            P1_GET_SERIAL => {
                let mut serial = hal.serial();
                serial[0] &= !0xFC;
                response.push(&serial);
                response.set_status(StatusWord::Ok);
            }
            P1_GET_CONFIG => {
                crate::management::build_config(hal, response);
                response.set_status(StatusWord::Ok);
            }
            P1_CHAL_YUBICO_1 => self.challenge(hal, 1, ChallengeMode::Yubico, apdu.data, response),
            P1_CHAL_YUBICO_2 => self.challenge(hal, 2, ChallengeMode::Yubico, apdu.data, response),
            P1_CHAL_HMAC_1 => self.challenge(hal, 1, ChallengeMode::Hmac, apdu.data, response),
            P1_CHAL_HMAC_2 => self.challenge(hal, 2, ChallengeMode::Hmac, apdu.data, response),
            _ => response.set_status(StatusWord::Ok),
        }
    }

    fn configure<H: Hal>(&mut self, hal: &mut H, slot: u8, data: &[u8], is_otp: bool, response: &mut Response) {
        if data.len() < RECORD_LEN {
            response.set_status(StatusWord::WrongData);
            return;
        }
        let mut candidate = [0u8; RECORD_LEN];
        candidate.copy_from_slice(&data[..RECORD_LEN]);

        if let Some((_, _)) = Self::read_slot(hal, slot) {
            let mut buf = [0u8; STORED_LEN];
            hal.store().read(Self::file_id(slot), &mut buf);
            let stored_acc = &buf[38..44];
            let incoming_acc = data.get(RECORD_LEN..RECORD_LEN + ACC_CODE_SIZE).unwrap_or(&[0u8; ACC_CODE_SIZE]);
            if stored_acc != incoming_acc {
                log::warn!("otp: configure slot {slot}: access code mismatch");
                response.set_status(StatusWord::SecurityStatusNotSatisfied);
                return;
            }
        }

        if is_all_zero(&candidate) {
            hal.store().delete(Self::file_id(slot));
            hal.store().flush();
            self.config_seq = self.config_seq.wrapping_add(1);
            log::debug!("otp: slot {slot} deleted via empty configure");
            self.write_status(hal, is_otp, response);
            return;
        }

        if !is_valid_candidate(&candidate) {
            response.set_status(StatusWord::WrongData);
            return;
        }

        let record = SlotRecord::from_bytes(&candidate);
        Self::write_slot(hal, slot, &record, &CounterArea::zero());
        self.config_seq = self.config_seq.wrapping_add(1);
        log::debug!("otp: slot {slot} configured");
        self.write_status(hal, is_otp, response);
    }

    fn update<H: Hal>(&mut self, hal: &mut H, slot: u8, data: &[u8], is_otp: bool, response: &mut Response) {
        if data.len() < RECORD_LEN {
            response.set_status(StatusWord::WrongData);
            return;
        }
        let mut candidate = [0u8; RECORD_LEN];
        candidate.copy_from_slice(&data[..RECORD_LEN]);
        if !is_valid_candidate(&candidate) {
            response.set_status(StatusWord::WrongData);
            return;
        }
        let candidate_record = SlotRecord::from_bytes(&candidate);

        if let Some((stored, counter)) = Self::read_slot(hal, slot) {
            let incoming_acc = data.get(RECORD_LEN..RECORD_LEN + ACC_CODE_SIZE).unwrap_or(&[0u8; ACC_CODE_SIZE]);
            if stored.acc_code != *incoming_acc {
                log::warn!("otp: update slot {slot}: access code mismatch");
                response.set_status(StatusWord::SecurityStatusNotSatisfied);
                return;
            }
            let merged = stored.merge_update(&candidate_record);
            Self::write_slot(hal, slot, &merged, &counter);
            self.config_seq = self.config_seq.wrapping_add(1);
            log::debug!("otp: slot {slot} updated");
        }
        self.write_status(hal, is_otp, response);
    }

    fn swap<H: Hal>(&mut self, hal: &mut H, is_otp: bool, response: &mut Response) {
        let mut buf1 = [0u8; STORED_LEN];
        let mut buf2 = [0u8; STORED_LEN];
        let has1 = hal.store().has_data(FileId::Slot1);
        let has2 = hal.store().has_data(FileId::Slot2);
        if has1 {
            hal.store().read(FileId::Slot1, &mut buf1);
        }
        if has2 {
            hal.store().read(FileId::Slot2, &mut buf2);
        }
        match (has1, has2) {
            (true, true) => {
                hal.store().write(FileId::Slot1, &buf2);
                hal.store().write(FileId::Slot2, &buf1);
            }
            (true, false) => {
                hal.store().write(FileId::Slot2, &buf1);
                hal.store().delete(FileId::Slot1);
            }
            (false, true) => {
                hal.store().write(FileId::Slot1, &buf2);
                hal.store().delete(FileId::Slot2);
            }
            (false, false) => {}
        }
        hal.store().flush();
        self.config_seq = self.config_seq.wrapping_add(1);
        log::debug!("otp: slots swapped");
        self.write_status(hal, is_otp, response);
    }

    fn challenge<H: Hal>(&mut self, hal: &mut H, slot: u8, mode: ChallengeMode, data: &[u8], response: &mut Response) {
        let record = match Self::read_slot(hal, slot) {
            Some((record, _)) if record.is_challenge_response() => record,
            _ => {
                response.set_status(StatusWord::WrongData);
                return;
            }
        };

        if record.cfg_flags.contains(CfgFlags::CHAL_BTN_TRIG) {
            self.status_byte = 0x20;
            match hal.button().poll() {
                ButtonPoll::Pressed => {
                    self.status_byte = 0x10;
                }
                ButtonPoll::Pending => {
                    let mut stored_data = [0u8; 64];
                    let len = data.len().min(64);
                    stored_data[..len].copy_from_slice(&data[..len]);
                    self.pending = Some(PendingChallenge { slot, mode, data: stored_data });
                    response.set_status(StatusWord::Ok);
                    return;
                }
                ButtonPoll::Declined => {
                    self.status_byte = 0x00;
                    response.set_status(StatusWord::ConditionsNotSatisfied);
                    return;
                }
            }
        }

        self.complete_challenge(hal, slot, mode, &record, data, response);
    }

    /// Re-polls a button wait left pending by [`OtpApplet::challenge`].
    /// Returns `true` once the operation has resolved (either completed or
    /// been declined); `false` means the caller should poll again later.
    pub fn poll_pending<H: Hal>(&mut self, hal: &mut H, response: &mut Response) -> bool {
        let Some(pending) = self.pending.take() else {
            return true;
        };
        match hal.button().poll() {
            ButtonPoll::Pending => {
                self.pending = Some(pending);
                response.set_status(StatusWord::Ok);
                false
            }
            ButtonPoll::Declined => {
                self.status_byte = 0x00;
                response.set_status(StatusWord::ConditionsNotSatisfied);
                true
            }
            ButtonPoll::Pressed => {
                self.status_byte = 0x10;
                if let Some((record, _)) = Self::read_slot(hal, pending.slot) {
                    self.complete_challenge(hal, pending.slot, pending.mode, &record, &pending.data, response);
                } else {
                    response.set_status(StatusWord::WrongData);
                }
                true
            }
        }
    }

    fn complete_challenge<H: Hal>(
        &mut self,
        hal: &mut H,
        _slot: u8,
        mode: ChallengeMode,
        record: &SlotRecord,
        data: &[u8],
        response: &mut Response,
    ) {
        match mode {
            ChallengeMode::Hmac => {
                if !record.cfg_flags.contains(CfgFlags::CHAL_HMAC) {
                    response.set_status(StatusWord::WrongData);
                    return;
                }
                let mut key = [0u8; 22];
                key[..16].copy_from_slice(&record.aes_key);
                key[16..].copy_from_slice(&record.uid);
                let mut chal_len = data.len().min(64);
                if record.cfg_flags.contains(CfgFlags::HMAC_LT64) && chal_len == 64 {
                    let terminator = data[63];
                    while chal_len > 0 && data[chal_len - 1] == terminator {
                        chal_len -= 1;
                    }
                }
                let mut mac = [0u8; 20];
                hal.hmac().authenticate(&key, &data[..chal_len], &mut mac);
                response.push(&mac);
            }
            ChallengeMode::Yubico => {
                if !record.cfg_flags.contains(CfgFlags::CHAL_YUBICO) {
                    response.set_status(StatusWord::WrongData);
                    return;
                }
                let mut block = [0u8; 16];
                let n = data.len().min(6);
                block[..n].copy_from_slice(&data[..n]);
                let serial_ascii = serial_decimal(hal.serial());
                block[6..16].copy_from_slice(&serial_ascii);
                hal.aes().encrypt_block(&record.aes_key, &mut block);
                response.push(&block);
            }
        }
        self.status_byte = 0x00;
        response.set_status(StatusWord::Ok);
    }

    /// The button-triggered OTP emission path: typed into the keyboard
    /// buffer rather than returned as APDU response data.
    pub fn button_pressed<H: Hal>(&mut self, hal: &mut H, slot: u8) -> ButtonPressOutcome {
        if !crate::management::cap_supported(hal, crate::config::Capabilities::OTP) {
            return ButtonPressOutcome::CapabilityDisabled;
        }
        self.init_once(hal);
        let Some((record, counter)) = Self::read_slot(hal, slot) else {
            return ButtonPressOutcome::EmptySlot;
        };
        if record.cfg_flags.contains(CfgFlags::CHAL_YUBICO) && record.is_challenge_response() {
            return ButtonPressOutcome::ChallengeResponseSlot;
        }
        if record.is_oath_hotp() {
            self.emit_oath_hotp(hal, slot, &record, counter);
        } else if record.is_static_ticket() {
            self.emit_static_ticket(hal, &record);
        } else {
            self.emit_yubico_otp(hal, slot, &record, counter);
        }
        ButtonPressOutcome::Emitted
    }

    fn emit_oath_hotp<H: Hal>(&mut self, hal: &mut H, slot: u8, record: &SlotRecord, mut counter: CounterArea) {
        let key = hotp::hotp_key(&record.aes_key);
        let mut imf = counter.moving_factor();
        if imf == 0 {
            imf = u16::from_be_bytes([record.uid[4], record.uid[5]]) as u64;
        }
        let digits8 = record.cfg_flags.contains(CfgFlags::OATH_HOTP8);
        let value = hotp::hotp_value(hal.hmac(), &key, imf, digits8);
        let digits = if digits8 { 8 } else { 6 };
        let mut text = [0u8; 8];
        hotp::format_decimal(value, digits, &mut text[..digits]);
        hal.keyboard().push_bytes(&text[..digits]);

        counter.set_moving_factor(imf + 1);
        Self::write_slot(hal, slot, record, &counter);

        if record.tkt_flags.contains(TktFlags::APPEND_CR) {
            hal.keyboard().push_bytes(b"\r");
        }
    }

    fn emit_static_ticket<H: Hal>(&mut self, hal: &mut H, record: &SlotRecord) {
        let mut fixed = [0u8; STATIC_TICKET_LEN];
        fixed[..16].copy_from_slice(&record.fixed_data);
        fixed[16..22].copy_from_slice(&record.uid);
        fixed[22..].copy_from_slice(&record.aes_key);
        hal.keyboard().push_bytes(&fixed);
        if record.tkt_flags.contains(TktFlags::APPEND_CR) {
            hal.keyboard().push_key(0x28);
        }
    }

    fn emit_yubico_otp<H: Hal>(&mut self, hal: &mut H, slot: u8, record: &SlotRecord, mut counter: CounterArea) {
        let mut update_counter = false;
        let mut use_counter = counter.use_counter();
        if use_counter == 0 {
            update_counter = true;
            use_counter = 1;
        }
        let ts = (hal.clock().millis() / 2000) as u32;

        // The 16-byte block that gets AES-encrypted: uid, little-endian
        // counter, a 3-byte timestamp, the volatile session counter, two
        // random bytes, and a residue CRC over the first 14 bytes.
        let mut plaintext = [0u8; 16];
        plaintext[0..6].copy_from_slice(&record.uid);
        plaintext[6..8].copy_from_slice(&use_counter.to_le_bytes());
        plaintext[8] = ts as u8;
        plaintext[9] = (ts >> 8) as u8;
        plaintext[10] = (ts >> 16) as u8;
        plaintext[11] = self.session_counter[(slot - 1) as usize];
        let mut rand = [0u8; 2];
        hal.rng().fill_bytes(&mut rand);
        plaintext[12..14].copy_from_slice(&rand);
        let crc = !crc16(&plaintext[0..14]);
        plaintext[14..16].copy_from_slice(&crc.to_le_bytes());

        let mut block = plaintext;
        hal.aes().encrypt_block(&record.aes_key, &mut block);

        // The public prefix (unencrypted) followed by the encrypted block.
        let mut otpk = [0u8; 22];
        otpk[..6].copy_from_slice(&record.fixed_data[..6]);
        otpk[6..].copy_from_slice(&block);

        let mut otp_out = [0u8; 44];
        modhex_encode(&otpk, &mut otp_out);
        hal.keyboard().push_bytes(&otp_out);
        if record.tkt_flags.contains(TktFlags::APPEND_CR) {
            hal.keyboard().push_bytes(b"\r");
        }

        let idx = (slot - 1) as usize;
        self.session_counter[idx] = self.session_counter[idx].wrapping_add(1);
        if self.session_counter[idx] == 0 && use_counter <= 0x7fff {
            use_counter += 1;
            if use_counter <= 0x7fff {
                update_counter = true;
            }
        }
        if update_counter {
            counter.set_use_counter(use_counter);
            Self::write_slot(hal, slot, record, &counter);
        }
    }

    /// Writes the status block into `response` and sets `StatusWord::Ok`.
    /// Over the HID path (`is_otp`) the status block is never framed as a
    /// reply here; the host only learns it by polling `GET_REPORT`.
    fn write_status<H: Hal>(&self, hal: &mut H, is_otp: bool, response: &mut Response) {
        if !is_otp {
            let (buf, len) = self.status_block(hal, is_otp);
            response.push(&buf[..len]);
        }
        response.set_status(StatusWord::Ok);
    }

    /// Builds the status block. The HID-triggered path (`is_otp`) reports
    /// a full 8-byte report with a reserved leading zero; the plain APDU
    /// path reports 7 bytes with no leading byte.
    pub fn status_block<H: Hal>(&self, hal: &mut H, is_otp: bool) -> ([u8; 8], usize) {
        let mut buf = [0u8; 8];
        let offset = if is_otp { 1 } else { 0 };
        buf[offset] = crate::config::VERSION_MAJOR;
        buf[offset + 1] = crate::config::VERSION_MINOR;
        buf[offset + 2] = 0;
        buf[offset + 3] = self.config_seq;
        buf[offset + 4] = self.opts(hal);
        buf[offset + 5] = 0;
        buf[offset + 6] = self.status_byte;
        (buf, offset + 7)
    }

    fn opts<H: Hal>(&self, hal: &mut H) -> u8 {
        let mut opts = 0u8;
        if let Some((record, _)) = Self::read_slot(hal, 1) {
            opts |= CONFIG1_VALID;
            if !record.is_challenge_response() || record.cfg_flags.contains(CfgFlags::CHAL_BTN_TRIG) {
                opts |= CONFIG1_TOUCH;
            }
        }
        if let Some((record, _)) = Self::read_slot(hal, 2) {
            opts |= CONFIG2_VALID;
            if !record.is_challenge_response() || record.cfg_flags.contains(CfgFlags::CHAL_BTN_TRIG) {
                opts |= CONFIG2_TOUCH;
            }
        }
        opts
    }
}

/// The device serial formatted as a 10-digit (zero-padded) ASCII string,
/// the form the Yubico-OTP challenge block expects.
fn serial_decimal(serial: [u8; 4]) -> [u8; 10] {
    let value = u32::from_be_bytes(serial);
    let mut out = [0u8; 10];
    let mut v = value;
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (v % 10) as u8;
        v /= 10;
    }
    out
}
