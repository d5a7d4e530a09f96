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

//! Compile-time device identity: firmware version, applet AIDs, and the
//! capability bitmap advertised by the Management applet.

/// Firmware major version, reported in the status block and the
/// Management applet's `TAG_VERSION`/selection response.
pub const VERSION_MAJOR: u8 = 1;

/// Firmware minor version.
pub const VERSION_MINOR: u8 = 0;

/// The Management applet's AID.
pub const MANAGEMENT_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x05, 0x27, 0x47, 0x11, 0x17];

/// The OTP applet's AID.
pub const OTP_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x05, 0x27, 0x20, 0x01];

bitflags::bitflags! {
    /// Transport/applet capability bitmap carried by `TAG_USB_SUPPORTED`
    /// and `TAG_USB_ENABLED` in the Management blob.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Capabilities: u16 {
        const FIDO2 = 0x0001;
        const OTP = 0x0002;
        const U2F = 0x0004;
        const OATH = 0x0008;
        const OPENPGP = 0x0010;
        const PIV = 0x0020;
    }
}

/// Capabilities always reported as supported by this device, regardless of
/// which other applets happen to be registered.
pub const ALWAYS_SUPPORTED: Capabilities = Capabilities::FIDO2
    .union(Capabilities::OTP)
    .union(Capabilities::U2F)
    .union(Capabilities::OATH);

/// Device flag reported under `TAG_DEVICE_FLAGS`: the device supports a
/// CCID eject gesture.
pub const FLAG_EJECT: u8 = 0x80;

/// Form factor reported under `TAG_FORM_FACTOR`.
pub const FORM_FACTOR_USB_A_KEYCHAIN: u8 = 0x01;
