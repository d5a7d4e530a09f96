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

//! ISO 7816 status words, expressed as a closed enum rather than a raw
//! `u16` so a mismatched `SW1 SW2` pair can't be constructed by accident.

/// The two-byte `SW1 SW2` trailer every APDU response ends with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum StatusWord {
    /// `0x9000`. Command completed normally.
    Ok,
    /// `0x6A80`. Bad CRC, non-zero RFU, or data otherwise malformed.
    WrongData,
    /// `0x6982`. Access code did not match the stored value.
    SecurityStatusNotSatisfied,
    /// `0x6985`. A required user gesture (button press) was declined.
    ConditionsNotSatisfied,
    /// `0x6A86`. P1/P2 combination is not valid for this instruction.
    IncorrectP1P2,
    /// `0x6D00`. Instruction byte is not supported by the selected applet.
    InsNotSupported,
    /// `0x6E00`. Class byte is not supported.
    ClaNotSupported,
}

impl StatusWord {
    /// Returns the `SW1 SW2` wire encoding.
    pub fn to_bytes(self) -> [u8; 2] {
        let word: u16 = match self {
            StatusWord::Ok => 0x9000,
            StatusWord::WrongData => 0x6A80,
            StatusWord::SecurityStatusNotSatisfied => 0x6982,
            StatusWord::ConditionsNotSatisfied => 0x6985,
            StatusWord::IncorrectP1P2 => 0x6A86,
            StatusWord::InsNotSupported => 0x6D00,
            StatusWord::ClaNotSupported => 0x6E00,
        };
        [(word >> 8) as u8, word as u8]
    }

    /// Parses a wire-encoded status word, returning `None` for any value
    /// not in the closed set this applet emits.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        let word = u16::from_be_bytes(bytes);
        Some(match word {
            0x9000 => StatusWord::Ok,
            0x6A80 => StatusWord::WrongData,
            0x6982 => StatusWord::SecurityStatusNotSatisfied,
            0x6985 => StatusWord::ConditionsNotSatisfied,
            0x6A86 => StatusWord::IncorrectP1P2,
            0x6D00 => StatusWord::InsNotSupported,
            0x6E00 => StatusWord::ClaNotSupported,
            _ => return None,
        })
    }

    /// `true` for [`StatusWord::Ok`].
    pub fn is_ok(self) -> bool {
        matches!(self, StatusWord::Ok)
    }
}
