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

//! Firmware-resident Yubico-style OTP and Management applets, bridged from
//! a smartcard-style APDU transport to a USB HID keyboard interface.
//!
//! The crate is split the way the token itself is: low-level wire helpers
//! ([`crc`], [`apdu`], [`status`]), the hardware seam ([`hal`]), the two
//! applets ([`otp`], [`management`]), the HID framing layer ([`hid`]), and
//! the [`device`] module that owns all mutable state behind one context.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod apdu;
pub mod config;
pub mod crc;
pub mod device;
pub mod hal;
pub mod hid;
pub mod management;
pub mod otp;
pub mod status;

pub use apdu::Apdu;
pub use device::Device;
pub use status::StatusWord;
