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

//! End-to-end scenarios driven entirely through `Device`'s public surface:
//! APDU dispatch, button presses, and HID report exchange.

use aes::cipher::{BlockDecrypt, KeyInit};

use otp_applet::apdu::{Apdu, Response};
use otp_applet::config::{Capabilities, ALWAYS_SUPPORTED, MANAGEMENT_AID, OTP_AID};
use otp_applet::crc::{crc16, modhex_decode, RESIDUE_OK};
use otp_applet::device::Device;
use otp_applet::hal::software::SoftwareHal;
use otp_applet::hal::{FileId, Hal, HmacSha1, SlotStore};
use otp_applet::otp::record::{CfgFlags, CounterArea, ExtFlags, SlotRecord, TktFlags, RECORD_LEN};
use otp_applet::otp::{hotp, INS_OTP};
use otp_applet::status::StatusWord;

const P1_CONFIGURE_1: u8 = 0x01;
const P1_CONFIGURE_2: u8 = 0x03;
const P1_CHAL_HMAC_2: u8 = 0x38;

fn decrypt_block(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = aes::Aes128::new_from_slice(key).unwrap();
    let mut generic = *block;
    let block_ref = aes::Block::from_mut_slice(&mut generic);
    cipher.decrypt_block(block_ref);
    generic
}

fn configure(device: &mut Device<SoftwareHal>, slot: u8, record: &SlotRecord) {
    let p1 = if slot == 1 { P1_CONFIGURE_1 } else { P1_CONFIGURE_2 };
    let bytes = record.to_bytes();
    let mut buf = [0u8; 64];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    let apdu = Apdu::new(0x00, INS_OTP, p1, 0x00, &bytes);
    device.process_apdu(&apdu, &mut response);
    assert!(response.status.is_ok(), "configure slot {slot} failed");
}

fn select_otp(device: &mut Device<SoftwareHal>) {
    let mut buf = [0u8; 8];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    device.select(OTP_AID, &mut response);
    assert!(response.status.is_ok());
}

fn decode_emitted_otp(typed: &[u8]) -> [u8; 22] {
    assert_eq!(typed.len(), 45, "44 modhex chars + CR");
    assert_eq!(typed[44], b'\r');
    let mut otpk = [0u8; 22];
    modhex_decode(&typed[..44], &mut otpk).expect("valid modhex");
    otpk
}

// S1: configure slot 1, press the button once, and check the decrypted
// plaintext embeds the configured uid, a use counter of 1, and a session
// counter of 0.
#[test]
fn s1_button_press_emits_expected_plaintext_layout() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);

    let mut fixed_data = [0u8; 16];
    fixed_data[0..6].copy_from_slice(&[0x10, 0x11, 0x12, 0x13, 0x14, 0x15]);
    let mut aes_key = [0u8; 16];
    for (i, b) in aes_key.iter_mut().enumerate() {
        *b = i as u8;
    }
    let record = SlotRecord {
        fixed_data,
        uid: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
        aes_key,
        acc_code: [0u8; 6],
        fixed_size: 6,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::APPEND_CR,
        cfg_flags: CfgFlags::empty(),
    };
    configure(&mut device, 1, &record);

    let outcome = device.button_pressed(1);
    assert_eq!(outcome, otp_applet::otp::applet::ButtonPressOutcome::Emitted);

    let typed = device.hal.keyboard.typed().to_vec();
    let otpk = decode_emitted_otp(&typed);
    assert_eq!(&otpk[..6], &fixed_data[..6]);

    let mut block = [0u8; 16];
    block.copy_from_slice(&otpk[6..]);
    let plaintext = decrypt_block(&record.aes_key, &block);
    assert_eq!(&plaintext[0..6], &record.uid[..]);
    assert_eq!(u16::from_le_bytes([plaintext[6], plaintext[7]]), 1);
    assert_eq!(plaintext[11], 0x00);
}

// S2: a fresh `Device` sharing the same store stands in for a power cycle.
// The one-shot power-up scan bumps the use counter again before the
// button-press path reads it.
#[test]
fn s2_power_cycle_then_button_press_bumps_counter_again() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);

    let mut fixed_data = [0u8; 16];
    fixed_data[0..6].copy_from_slice(&[0x10, 0x11, 0x12, 0x13, 0x14, 0x15]);
    let record = SlotRecord {
        fixed_data,
        uid: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
        aes_key: [0u8; 16],
        acc_code: [0u8; 6],
        fixed_size: 6,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::APPEND_CR,
        cfg_flags: CfgFlags::empty(),
    };
    configure(&mut device, 1, &record);
    device.button_pressed(1);

    let hal = device.hal;
    let mut device = Device::new(hal);
    select_otp(&mut device);
    device.button_pressed(1);

    let typed = device.hal.keyboard.typed().to_vec();
    let otpk = decode_emitted_otp(&typed);
    let mut block = [0u8; 16];
    block.copy_from_slice(&otpk[6..]);
    let plaintext = decrypt_block(&record.aes_key, &block);
    assert_eq!(u16::from_le_bytes([plaintext[6], plaintext[7]]), 2);
}

// S3: slot 2 configured for HMAC challenge/response with an all-zero key
// and uid reproduces the known HMAC-SHA1(zero-key, zero-message) vector.
#[test]
fn s3_hmac_challenge_response_matches_known_vector() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);

    let record = SlotRecord {
        fixed_data: [0u8; 16],
        uid: [0u8; 6],
        aes_key: [0u8; 16],
        acc_code: [0u8; 6],
        fixed_size: 0,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::CHAL_RESP,
        cfg_flags: CfgFlags::CHAL_HMAC,
    };
    configure(&mut device, 2, &record);

    let data = [0u8; 64];
    let mut buf = [0u8; 32];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    let apdu = Apdu::new(0x00, INS_OTP, P1_CHAL_HMAC_2, 0x00, &data);
    device.process_apdu(&apdu, &mut response);
    assert!(response.status.is_ok());
    assert_eq!(
        response.data(),
        &[
            0xfb, 0xdb, 0x1d, 0x1b, 0x18, 0xaa, 0x6c, 0x08, 0x32, 0x4b, 0x7d, 0x64, 0xb7, 0x1f,
            0xb7, 0x63, 0x70, 0x69, 0x0e, 0x1d
        ]
    );
}

// S4: an OATH-HOTP slot emits the RFC 4226 dynamically truncated code for
// the key `0x01 0x00 || aes_key`, starting from IMF 0 (uid is zero, so the
// uid-derived initial IMF fallback does not kick in).
#[test]
fn s4_oath_hotp_emits_expected_six_digit_code() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);

    let mut aes_key = [0u8; 16];
    for (i, b) in aes_key.iter_mut().enumerate() {
        *b = 0xA0 + i as u8;
    }
    let record = SlotRecord {
        fixed_data: [0u8; 16],
        uid: [0u8; 6],
        aes_key,
        acc_code: [0u8; 6],
        fixed_size: 0,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::OATH_HOTP,
        cfg_flags: CfgFlags::empty(),
    };
    configure(&mut device, 1, &record);

    let key = hotp::hotp_key(&aes_key);
    assert_eq!(&key[..2], &[0x01, 0x00][..]);
    let hmac = otp_applet::hal::software::SoftwareHmacSha1;
    let expected_value = hotp::hotp_value(&hmac, &key, 0, false);
    let mut expected_text = [0u8; 6];
    hotp::format_decimal(expected_value, 6, &mut expected_text);

    device.button_pressed(1);
    let typed = device.hal.keyboard.typed();
    assert_eq!(&typed[..6], &expected_text[..]);
}

// S5: a virgin device's Management config blob starts with a total length
// byte, then TAG_USB_SUPPORTED advertising at least the always-supported
// capabilities.
#[test]
fn s5_management_config_on_virgin_device() {
    let mut device = Device::new(SoftwareHal::new());
    let mut buf = [0u8; 16];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    device.select(MANAGEMENT_AID, &mut response);
    assert_eq!(response.data(), b"1.0.0");

    let mut buf = [0u8; 64];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    let apdu = Apdu::new(0x00, otp_applet::management::INS_READ_CONFIG, 0x00, 0x00, &[]);
    device.process_apdu(&apdu, &mut response);
    assert!(response.status.is_ok());

    let data = response.data();
    assert_eq!(data[0] as usize, data.len() - 1);
    assert_eq!(data[1], 0x01); // TAG_USB_SUPPORTED
    assert_eq!(data[2], 2);
    let caps = Capabilities::from_bits_truncate(u16::from_be_bytes([data[3], data[4]]));
    assert!(caps.contains(ALWAYS_SUPPORTED));
}

// S6: a HID reset followed by ten reports whose CRC does not validate
// produces no reply; the next GET_REPORT poll falls back to the status
// block.
#[test]
fn s6_hid_bad_crc_frame_yields_no_reply_then_status() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);

    let mut reset = [0u8; 8];
    reset[7] = 0xFF;
    device.hid_set_report(&reset);

    let mut frame = [0u8; 70];
    frame[64] = 1; // slot id
    frame[65] = 0xDE;
    frame[66] = 0xAD; // deliberately wrong CRC
    for seq in 0..10u8 {
        let offset = seq as usize * 7;
        let mut report = [0u8; 8];
        report[..7].copy_from_slice(&frame[offset..offset + 7]);
        report[7] = 0x80 | seq;
        device.hid_set_report(&report);
    }

    let mut out = [0u8; 8];
    device.hid_get_report(&mut out);
    // A status block (HID form) never sets the low "outbound fragment" bit
    // pattern used by armed replies; byte 6 carries the status byte, which
    // starts at zero for an idle applet.
    assert_eq!(out[6], 0x00);
}

// Invariant 2: across N button presses on a Yubico-OTP slot with no
// wraparound, the embedded use counter never decreases and the session
// counter strictly increases.
#[test]
fn invariant_yubico_counters_advance_monotonically() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);
    let record = SlotRecord {
        fixed_data: [0u8; 16],
        uid: [1, 2, 3, 4, 5, 6],
        aes_key: [0u8; 16],
        acc_code: [0u8; 6],
        fixed_size: 0,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::empty(),
        cfg_flags: CfgFlags::empty(),
    };
    configure(&mut device, 1, &record);

    let mut last_counter = 0u16;
    for expected_session in 0..5u8 {
        device.hal.keyboard.clear();
        device.button_pressed(1);
        let typed = device.hal.keyboard.typed().to_vec();
        let mut otpk = [0u8; 22];
        modhex_decode(&typed[..44], &mut otpk).unwrap();
        let mut block = [0u8; 16];
        block.copy_from_slice(&otpk[6..]);
        let plaintext = decrypt_block(&record.aes_key, &block);
        let counter = u16::from_le_bytes([plaintext[6], plaintext[7]]);
        assert!(counter >= last_counter);
        last_counter = counter;
        assert_eq!(plaintext[11], expected_session);
    }
}

// Invariant 3: emitting K OATH-HOTP codes advances the persisted moving
// factor by exactly K.
#[test]
fn invariant_oath_hotp_imf_advances_by_emission_count() {
    const K: u64 = 4;
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);
    let record = SlotRecord {
        fixed_data: [0u8; 16],
        uid: [0u8; 6],
        aes_key: [0xAB; 16],
        acc_code: [0u8; 6],
        fixed_size: 0,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::OATH_HOTP,
        cfg_flags: CfgFlags::empty(),
    };
    configure(&mut device, 2, &record);

    for _ in 0..K {
        device.button_pressed(2);
    }

    let mut stored = [0u8; 66];
    device.hal.store().read(FileId::Slot2, &mut stored);
    let mut counter_bytes = [0u8; 8];
    counter_bytes.copy_from_slice(&stored[RECORD_LEN..RECORD_LEN + 8]);
    assert_eq!(CounterArea(counter_bytes).moving_factor(), K);
}

// Invariant 4: the plaintext block behind any emitted Yubico OTP is a valid
// CRC-residue record on its own (the trailing two bytes are the
// complemented CRC of the first fourteen).
#[test]
fn invariant_emitted_otp_plaintext_carries_a_valid_crc_residue() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);
    let record = SlotRecord {
        fixed_data: [0x42u8; 16],
        uid: [9, 8, 7, 6, 5, 4],
        aes_key: [0x24u8; 16],
        acc_code: [0u8; 6],
        fixed_size: 0,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::empty(),
        cfg_flags: CfgFlags::empty(),
    };
    configure(&mut device, 1, &record);
    device.button_pressed(1);

    let typed = device.hal.keyboard.typed();
    let mut otpk = [0u8; 22];
    modhex_decode(&typed[..44], &mut otpk).unwrap();
    let mut block = [0u8; 16];
    block.copy_from_slice(&otpk[6..]);
    let plaintext = decrypt_block(&record.aes_key, &block);
    assert_eq!(crc16(&plaintext), RESIDUE_OK);
}

// Invariant 5: HMAC challenge/response over a full 64-byte challenge
// reproduces HMAC-SHA1(aes_key||uid, challenge) directly; with HMAC_LT64
// set and a challenge padded with a repeated terminator byte, the
// effective message drops the trailing run of that byte.
#[test]
fn invariant_hmac_challenge_matches_key_and_respects_lt64_trim() {
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);
    let aes_key = [0x11u8; 16];
    let uid = [0x22u8; 6];
    let record = SlotRecord {
        fixed_data: [0u8; 16],
        uid,
        aes_key,
        acc_code: [0u8; 6],
        fixed_size: 0,
        ext_flags: ExtFlags::empty(),
        tkt_flags: TktFlags::CHAL_RESP,
        cfg_flags: CfgFlags::CHAL_HMAC,
    };
    configure(&mut device, 2, &record);

    let challenge = [0x5Au8; 64];
    let mut buf = [0u8; 32];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    let apdu = Apdu::new(0x00, INS_OTP, P1_CHAL_HMAC_2, 0x00, &challenge);
    device.process_apdu(&apdu, &mut response);

    let mut key = [0u8; 22];
    key[..16].copy_from_slice(&aes_key);
    key[16..].copy_from_slice(&uid);
    let hmac = otp_applet::hal::software::SoftwareHmacSha1;
    let mut expected = [0u8; 20];
    hmac.authenticate(&key, &challenge, &mut expected);
    assert_eq!(response.data(), &expected);

    // HMAC_LT64 + a challenge padded with a repeated terminator byte.
    let mut device = Device::new(SoftwareHal::new());
    select_otp(&mut device);
    let lt64_record = SlotRecord {
        cfg_flags: CfgFlags::CHAL_HMAC | CfgFlags::HMAC_LT64,
        ..record
    };
    configure(&mut device, 2, &lt64_record);

    let mut padded = [0u8; 64];
    padded[..10].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    for b in padded[10..].iter_mut() {
        *b = 0x00;
    }
    let mut buf = [0u8; 32];
    let mut response = Response::new(&mut buf, StatusWord::Ok);
    let apdu = Apdu::new(0x00, INS_OTP, P1_CHAL_HMAC_2, 0x00, &padded);
    device.process_apdu(&apdu, &mut response);

    let mut expected = [0u8; 20];
    hmac.authenticate(&key, &padded[..10], &mut expected);
    assert_eq!(response.data(), &expected);
}
