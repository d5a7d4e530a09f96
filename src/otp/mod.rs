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

//! The OTP applet: slot configuration lifecycle, modhex OTP emission,
//! OATH-HOTP, and Yubico/HMAC challenge-response.

pub mod applet;
pub mod hotp;
pub mod record;

pub use applet::{ButtonPressOutcome, OtpApplet, INS_OTP};
pub use record::SlotRecord;
