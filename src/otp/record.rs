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

//! The 58-byte slot record and the 8-byte counter area appended to it in
//! persistent storage. Serialized explicitly, never via `#[repr(packed)]`,
//! so the layout survives independently of target alignment.

use crate::crc::{crc16, RESIDUE_OK};

pub const FIXED_SIZE: usize = 16;
pub const UID_SIZE: usize = 6;
pub const KEY_SIZE: usize = 16;
pub const ACC_CODE_SIZE: usize = 6;
/// `fixed_data || uid || aes_key`, the length a static ticket emits.
pub const STATIC_TICKET_LEN: usize = FIXED_SIZE + UID_SIZE + KEY_SIZE;

/// The on-the-wire and on-flash size of a slot record, CRC included.
pub const RECORD_LEN: usize = 58;
/// Bytes appended in storage beyond the record: the use counter (Yubico
/// mode) or moving factor (OATH-HOTP mode).
pub const COUNTER_AREA_LEN: usize = 8;
/// Total persisted size of one slot.
pub const STORED_LEN: usize = RECORD_LEN + COUNTER_AREA_LEN;

bitflags::bitflags! {
    /// `ext_flags`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ExtFlags: u8 {
        const SERIAL_BTN_VISIBLE = 0x01;
        const SERIAL_USB_VISIBLE = 0x02;
        const SERIAL_API_VISIBLE = 0x04;
        const USE_NUMERIC_KEYPAD = 0x08;
        const FAST_TRIG = 0x10;
        const ALLOW_UPDATE = 0x20;
        const DORMANT = 0x40;
        const LED_INV = 0x80;
    }
}

impl ExtFlags {
    /// Bits an update may change; everything else is carried over from the
    /// stored record.
    pub const UPDATE_MASK: Self = Self::SERIAL_BTN_VISIBLE
        .union(Self::SERIAL_USB_VISIBLE)
        .union(Self::SERIAL_API_VISIBLE)
        .union(Self::USE_NUMERIC_KEYPAD)
        .union(Self::FAST_TRIG)
        .union(Self::ALLOW_UPDATE)
        .union(Self::DORMANT)
        .union(Self::LED_INV);
}

bitflags::bitflags! {
    /// `tkt_flags`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct TktFlags: u8 {
        const TAB_FIRST = 0x01;
        const APPEND_TAB1 = 0x02;
        const APPEND_TAB2 = 0x04;
        const APPEND_DELAY1 = 0x08;
        const APPEND_DELAY2 = 0x10;
        const APPEND_CR = 0x20;
        /// Shared bit: OATH-HOTP mode, or (combined with `cfg_flags`)
        /// challenge/response enabled.
        const OATH_HOTP = 0x40;
        const CHAL_RESP = 0x40;
        /// Recognized and round-tripped; never itself enforced (see the
        /// donor source's own note that it is not checked on the update
        /// path beyond access-code gating).
        const PROTECT_CFG2 = 0x80;
    }
}

impl TktFlags {
    pub const UPDATE_MASK: Self = Self::TAB_FIRST
        .union(Self::APPEND_TAB1)
        .union(Self::APPEND_TAB2)
        .union(Self::APPEND_DELAY1)
        .union(Self::APPEND_DELAY2)
        .union(Self::APPEND_CR);
}

bitflags::bitflags! {
    /// `cfg_flags`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct CfgFlags: u8 {
        const SEND_REF = 0x01;
        const OATH_HOTP8 = 0x02;
        const SHORT_TICKET = 0x02;
        const PACING_10MS = 0x04;
        const HMAC_LT64 = 0x04;
        const PACING_20MS = 0x08;
        const CHAL_BTN_TRIG = 0x08;
        const OATH_FIXED_MODHEX1 = 0x10;
        const STRONG_PW1 = 0x10;
        const STATIC_TICKET = 0x20;
        const CHAL_YUBICO = 0x20;
        const OATH_FIXED_MODHEX2 = 0x40;
        const STRONG_PW2 = 0x40;
        const CHAL_HMAC = 0x22;
        const MAN_UPDATE = 0x80;
    }
}

impl CfgFlags {
    /// Mutable on update for non-challenge slots only.
    pub const UPDATE_MASK: Self = Self::PACING_10MS.union(Self::PACING_20MS);
}

/// A fully parsed 58-byte slot record.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotRecord {
    pub fixed_data: [u8; FIXED_SIZE],
    pub uid: [u8; UID_SIZE],
    pub aes_key: [u8; KEY_SIZE],
    pub acc_code: [u8; ACC_CODE_SIZE],
    pub fixed_size: u8,
    pub ext_flags: ExtFlags,
    pub tkt_flags: TktFlags,
    pub cfg_flags: CfgFlags,
}

impl SlotRecord {
    /// Parses a 58-byte buffer into a record without validating its CRC or
    /// `rfu` bytes; callers check those with [`is_valid_candidate`] first.
    pub fn from_bytes(buf: &[u8; RECORD_LEN]) -> Self {
        let mut fixed_data = [0u8; FIXED_SIZE];
        fixed_data.copy_from_slice(&buf[0..16]);
        let mut uid = [0u8; UID_SIZE];
        uid.copy_from_slice(&buf[16..22]);
        let mut aes_key = [0u8; KEY_SIZE];
        aes_key.copy_from_slice(&buf[22..38]);
        let mut acc_code = [0u8; ACC_CODE_SIZE];
        acc_code.copy_from_slice(&buf[38..44]);
        Self {
            fixed_data,
            uid,
            aes_key,
            acc_code,
            fixed_size: buf[44],
            ext_flags: ExtFlags::from_bits_truncate(buf[45]),
            tkt_flags: TktFlags::from_bits_truncate(buf[46]),
            cfg_flags: CfgFlags::from_bits_truncate(buf[47]),
        }
    }

    /// Serializes back into the 58-byte wire form, recomputing the CRC
    /// field so the result always validates.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..16].copy_from_slice(&self.fixed_data);
        buf[16..22].copy_from_slice(&self.uid);
        buf[22..38].copy_from_slice(&self.aes_key);
        buf[38..44].copy_from_slice(&self.acc_code);
        buf[44] = self.fixed_size;
        buf[45] = self.ext_flags.bits();
        buf[46] = self.tkt_flags.bits();
        buf[47] = self.cfg_flags.bits();
        // buf[48..50] (rfu) stay zero.
        let crc = !crc16(&buf[..56]);
        buf[56] = crc as u8;
        buf[57] = (crc >> 8) as u8;
        buf
    }

    /// Applies the update-merge rule: immutable fields come from `self`
    /// (the stored record), mutable flag bits come from `candidate`
    /// wherever their field's update mask allows it.
    pub fn merge_update(&self, candidate: &SlotRecord) -> SlotRecord {
        let is_challenge = self.tkt_flags.contains(TktFlags::CHAL_RESP);
        let cfg_flags = if is_challenge {
            self.cfg_flags
        } else {
            (self.cfg_flags & !CfgFlags::UPDATE_MASK) | (candidate.cfg_flags & CfgFlags::UPDATE_MASK)
        };
        SlotRecord {
            fixed_data: self.fixed_data,
            uid: self.uid,
            aes_key: self.aes_key,
            acc_code: candidate.acc_code,
            fixed_size: self.fixed_size,
            ext_flags: (self.ext_flags & !ExtFlags::UPDATE_MASK) | (candidate.ext_flags & ExtFlags::UPDATE_MASK),
            tkt_flags: (self.tkt_flags & !TktFlags::UPDATE_MASK) | (candidate.tkt_flags & TktFlags::UPDATE_MASK),
            cfg_flags,
        }
    }

    pub fn is_oath_hotp(&self) -> bool {
        self.tkt_flags.contains(TktFlags::OATH_HOTP)
    }

    pub fn is_challenge_response(&self) -> bool {
        self.tkt_flags.contains(TktFlags::CHAL_RESP)
    }

    pub fn is_static_ticket(&self) -> bool {
        self.cfg_flags.contains(CfgFlags::SHORT_TICKET) || self.cfg_flags.contains(CfgFlags::STATIC_TICKET)
    }

    /// `true` for the default emission mode: neither OATH-HOTP, static
    /// ticket, nor challenge/response.
    pub fn is_yubico_otp(&self) -> bool {
        !self.is_oath_hotp() && !self.is_static_ticket() && !self.is_challenge_response()
    }
}

/// Validates a raw 58-byte candidate: `rfu` must be zero and the CRC
/// residue must check out.
pub fn is_valid_candidate(buf: &[u8; RECORD_LEN]) -> bool {
    buf[48] == 0 && buf[49] == 0 && crc16(buf) == RESIDUE_OK
}

/// `true` if every byte of the candidate is zero, the configure-time
/// signal to delete a slot.
pub fn is_all_zero(buf: &[u8; RECORD_LEN]) -> bool {
    buf.iter().all(|&b| b == 0)
}

/// The 8-byte counter area appended to a stored slot: either a 16-bit
/// Yubico use counter or a 64-bit OATH-HOTP moving factor, depending on
/// the record's mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CounterArea(pub [u8; COUNTER_AREA_LEN]);

impl CounterArea {
    pub fn zero() -> Self {
        Self([0u8; COUNTER_AREA_LEN])
    }

    /// Reads the first two bytes as a big-endian Yubico use counter.
    pub fn use_counter(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn set_use_counter(&mut self, value: u16) {
        self.0[0..2].copy_from_slice(&value.to_be_bytes());
    }

    /// Reads all eight bytes as a big-endian OATH-HOTP moving factor.
    pub fn moving_factor(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn set_moving_factor(&mut self, value: u64) {
        self.0 = value.to_be_bytes();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> SlotRecord {
        let mut fixed_data = [0u8; FIXED_SIZE];
        for (i, b) in fixed_data.iter_mut().enumerate() {
            *b = 0x10 + i as u8;
        }
        SlotRecord {
            fixed_data,
            uid: [1, 2, 3, 4, 5, 6],
            aes_key: [0u8; KEY_SIZE],
            acc_code: [0u8; ACC_CODE_SIZE],
            fixed_size: 6,
            ext_flags: ExtFlags::empty(),
            tkt_flags: TktFlags::APPEND_CR,
            cfg_flags: CfgFlags::empty(),
        }
    }

    #[test]
    fn round_trips_through_wire_form() {
        let record = sample();
        let bytes = record.to_bytes();
        assert!(is_valid_candidate(&bytes));
        let parsed = SlotRecord::from_bytes(&bytes);
        assert_eq!(parsed.fixed_data, record.fixed_data);
        assert_eq!(parsed.uid, record.uid);
        assert_eq!(parsed.tkt_flags, record.tkt_flags);
    }

    #[test]
    fn all_zero_candidate_is_detected() {
        let buf = [0u8; RECORD_LEN];
        assert!(is_all_zero(&buf));
    }

    #[test]
    fn nonzero_rfu_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[48] = 1;
        assert!(!is_valid_candidate(&bytes));
    }

    #[test]
    fn merge_update_preserves_immutable_fields() {
        let stored = sample();
        let mut candidate = sample();
        candidate.fixed_data = [0xFF; FIXED_SIZE];
        candidate.uid = [0xFF; UID_SIZE];
        candidate.aes_key = [0xFF; KEY_SIZE];
        candidate.tkt_flags = TktFlags::APPEND_TAB1;
        let merged = stored.merge_update(&candidate);
        assert_eq!(merged.fixed_data, stored.fixed_data);
        assert_eq!(merged.uid, stored.uid);
        assert_eq!(merged.aes_key, stored.aes_key);
        assert_eq!(merged.tkt_flags, TktFlags::APPEND_TAB1);
    }

    #[test]
    fn merge_update_preserves_cfg_flags_verbatim_for_challenge_slots() {
        let mut stored = sample();
        stored.tkt_flags = TktFlags::CHAL_RESP;
        stored.cfg_flags = CfgFlags::CHAL_YUBICO;
        let mut candidate = sample();
        candidate.cfg_flags = CfgFlags::PACING_10MS;
        let merged = stored.merge_update(&candidate);
        assert_eq!(merged.cfg_flags, CfgFlags::CHAL_YUBICO);
    }

    #[test]
    fn counter_area_round_trips_both_interpretations() {
        let mut area = CounterArea::zero();
        area.set_use_counter(0x1234);
        assert_eq!(area.use_counter(), 0x1234);

        let mut area = CounterArea::zero();
        area.set_moving_factor(0x0102030405060708);
        assert_eq!(area.moving_factor(), 0x0102030405060708);
    }

    proptest::proptest! {
        #[test]
        fn any_record_with_valid_crc_round_trips(
            fixed_data in proptest::collection::vec(proptest::prelude::any::<u8>(), 16..=16),
            uid in proptest::collection::vec(proptest::prelude::any::<u8>(), 6..=6),
            ext in proptest::prelude::any::<u8>(),
        ) {
            let mut record = sample();
            record.fixed_data.copy_from_slice(&fixed_data);
            record.uid.copy_from_slice(&uid);
            record.ext_flags = ExtFlags::from_bits_truncate(ext);
            let bytes = record.to_bytes();
            proptest::prop_assert!(is_valid_candidate(&bytes));
            let parsed = SlotRecord::from_bytes(&bytes);
            proptest::prop_assert_eq!(parsed.fixed_data, record.fixed_data);
            proptest::prop_assert_eq!(parsed.ext_flags, record.ext_flags);
        }
    }
}
