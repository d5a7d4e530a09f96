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

//! CRC-16/X.25 (reflected, poly 0x8408) and the modhex encoding used to
//! render Yubico-style OTPs as keyboard-safe ASCII.

/// The residue a buffer's CRC must equal once its own little-endian
/// complemented CRC has been appended to it. Used to validate slot records
/// and HID command frames without recomputing and comparing a stored field.
pub const RESIDUE_OK: u16 = 0xF0B8;

/// Computes the CRC-16/X.25 checksum of `data`: seed 0xFFFF, polynomial
/// 0x8408 applied to the reflected bitstream, no final XOR.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            let lsb = crc & 1;
            crc >>= 1;
            if lsb == 1 {
                crc ^= 0x8408;
            }
        }
    }
    crc
}

/// Returns `true` if `data` ends in a little-endian CRC field that makes
/// the whole buffer's CRC equal [`RESIDUE_OK`].
pub fn verify_residue(data: &[u8]) -> bool {
    crc16(data) == RESIDUE_OK
}

/// The modhex alphabet: digit `n` maps to `MODHEX[n]`, chosen by Yubico so
/// that the emitted characters occupy the same position on every keyboard
/// layout regardless of shift/alt-gr state.
pub const MODHEX: [u8; 16] = *b"cbdefghijklnrtuv";

/// Encodes `input` as modhex into `out`, which must be exactly
/// `2 * input.len()` bytes long. Each input byte becomes two output
/// characters, high nibble first.
///
/// # Panics
/// Panics if `out.len() != 2 * input.len()`.
pub fn modhex_encode(input: &[u8], out: &mut [u8]) {
    assert_eq!(out.len(), input.len() * 2);
    for (i, &byte) in input.iter().enumerate() {
        out[2 * i] = MODHEX[(byte >> 4) as usize];
        out[2 * i + 1] = MODHEX[(byte & 0xf) as usize];
    }
}

/// Decodes a modhex string back into bytes, writing `input.len() / 2` bytes
/// into `out`. Returns `Err(())` if `input` has odd length or contains a
/// character outside the modhex alphabet.
pub fn modhex_decode(input: &[u8], out: &mut [u8]) -> Result<(), ()> {
    if input.len() % 2 != 0 || out.len() != input.len() / 2 {
        return Err(());
    }
    for (i, pair) in input.chunks_exact(2).enumerate() {
        let hi = modhex_nibble(pair[0])?;
        let lo = modhex_nibble(pair[1])?;
        out[i] = (hi << 4) | lo;
    }
    Ok(())
}

fn modhex_nibble(c: u8) -> Result<u8, ()> {
    MODHEX
        .iter()
        .position(|&m| m == c)
        .map(|p| p as u8)
        .ok_or(())
}
