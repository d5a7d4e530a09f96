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

//! RFC 4226-style dynamic truncation for OATH-HOTP codes.

use crate::hal::HmacSha1;

/// The key this crate's OATH-HOTP mode feeds to HMAC-SHA1: a fixed
/// `0x01 0x00` prefix (the donor firmware leaves the second byte
/// uninitialized; this crate pins it to zero) followed by the slot's
/// 16-byte AES key.
pub fn hotp_key(aes_key: &[u8; 16]) -> [u8; 18] {
    let mut key = [0u8; 18];
    key[0] = 0x01;
    key[1] = 0x00;
    key[2..].copy_from_slice(aes_key);
    key
}

/// Computes a dynamically truncated HOTP value for moving factor `imf`,
/// then reduces it modulo `10^digits` (6 or 8).
pub fn hotp_value<H: HmacSha1>(hmac: &H, key: &[u8; 18], imf: u64, digits8: bool) -> u32 {
    let challenge = imf.to_be_bytes();
    let mut mac = [0u8; 20];
    hmac.authenticate(key, &challenge, &mut mac);
    let modulus = if digits8 { 100_000_000 } else { 1_000_000 };
    dynamic_truncate(&mac) % modulus
}

/// RFC 4226 §5.3 dynamic truncation: the low nibble of the last MAC byte
/// selects a 4-byte offset, whose big-endian value with the top bit
/// cleared is the truncated binary code.
fn dynamic_truncate(mac: &[u8; 20]) -> u32 {
    let offset = (mac[19] & 0x0f) as usize;
    let bytes = [mac[offset], mac[offset + 1], mac[offset + 2], mac[offset + 3]];
    u32::from_be_bytes(bytes) & 0x7fff_ffff
}

/// Formats `value` as a zero-padded decimal string of exactly `digits`
/// characters (6 or 8), written into `out` which must be sized to match.
pub fn format_decimal(value: u32, digits: usize, out: &mut [u8]) {
    assert_eq!(out.len(), digits);
    let mut v = value;
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (v % 10) as u8;
        v /= 10;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FixedHmac;
    impl HmacSha1 for FixedHmac {
        fn authenticate(&self, _key: &[u8], _message: &[u8], out: &mut [u8; 20]) {
            // RFC 4226 Appendix D, secret "12345678901234567890", count 0.
            *out = [
                0xcc, 0x93, 0xcf, 0x18, 0x50, 0x8d, 0x94, 0x93, 0x4c, 0x64, 0xb6, 0x5d, 0x8b, 0xa7,
                0x66, 0x7f, 0xb7, 0xcd, 0xe4, 0xb0,
            ];
        }
    }

    #[test]
    fn matches_rfc4226_test_vector_count_0() {
        let value = dynamic_truncate(&[
            0xcc, 0x93, 0xcf, 0x18, 0x50, 0x8d, 0x94, 0x93, 0x4c, 0x64, 0xb6, 0x5d, 0x8b, 0xa7,
            0x66, 0x7f, 0xb7, 0xcd, 0xe4, 0xb0,
        ]);
        assert_eq!(value, 1284755224);
        assert_eq!(value % 1_000_000, 755224);
    }

    #[test]
    fn hotp_key_pins_reserved_byte_to_zero() {
        let key = hotp_key(&[0xAB; 16]);
        assert_eq!(key[0], 0x01);
        assert_eq!(key[1], 0x00);
        assert_eq!(&key[2..], &[0xAB; 16]);
    }

    #[test]
    fn format_decimal_zero_pads() {
        let mut out = [0u8; 6];
        format_decimal(42, 6, &mut out);
        assert_eq!(&out, b"000042");
    }

    #[test]
    fn eight_digit_modulus_uses_full_width() {
        let hmac = FixedHmac;
        let key = hotp_key(&[0u8; 16]);
        let value = hotp_value(&hmac, &key, 0, true);
        assert_eq!(value, 84755224);
    }
}
