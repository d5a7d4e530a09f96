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

//! Traits a board support crate must implement to host this applet.
//!
//! Every collaborator the specification calls "out of scope" (persistent
//! storage, RNG, AES, HMAC-SHA1, a monotonic clock, the button, the
//! keyboard buffer) is expressed here as a trait, the way the donor
//! firmware exposes its SHA engine through `DigestEngine` and its flash
//! counter through `NvCounter`: the applet logic is generic over the
//! hardware, never coupled to a specific chip.

#[cfg(feature = "software-crypto")]
pub mod software;

/// Identifies one of the three logical files this applet persists.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileId {
    /// `EF_OTP_SLOT1`: 66 bytes (58-byte record + 8-byte counter area).
    Slot1,
    /// `EF_OTP_SLOT2`: 66 bytes (58-byte record + 8-byte counter area).
    Slot2,
    /// `EF_DEV_CONF`: variable-length Management TLV blob.
    DeviceConfig,
}

/// The persistent key-value store backing `EF_OTP_SLOT1`, `EF_OTP_SLOT2`
/// and `EF_DEV_CONF`. Maps directly onto the donor firmware's
/// `file_has_data`/`file_get_data`/`file_put_data`/`delete_file`/
/// `file_new` collaborators.
pub trait SlotStore {
    /// Returns `true` if `id` currently holds data.
    fn has_data(&self, id: FileId) -> bool;

    /// Copies the current contents of `id` into `out`, returning the
    /// number of bytes written. Returns `0` if `id` has no data.
    ///
    /// # Panics
    /// May panic if `out` is too small to hold the file's contents; callers
    /// size `out` from the known maximum for each `FileId`.
    fn read(&self, id: FileId, out: &mut [u8]) -> usize;

    /// Replaces the contents of `id` with `data`.
    fn write(&mut self, id: FileId, data: &[u8]);

    /// Deletes `id`, if present.
    fn delete(&mut self, id: FileId);

    /// Commits pending writes durably. Stands in for
    /// `low_flash_available`; a board support crate that writes through
    /// immediately may implement this as a no-op.
    fn flush(&mut self) {}
}

/// A source of random bytes, used to fill the two "random" bytes of a
/// Yubico-OTP plaintext block.
pub trait Rng {
    /// Fills `out` with random bytes.
    fn fill_bytes(&mut self, out: &mut [u8]);
}

/// A hardware (or software, for tests) AES-128 engine operated in ECB mode
/// one block at a time, as both Yubico-OTP emission and Yubico
/// challenge/response require.
pub trait Aes128 {
    /// Encrypts `block` in place under `key`.
    fn encrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]);
}

/// An HMAC-SHA1 engine, used by both HMAC challenge/response and
/// OATH-HOTP (which runs HMAC-SHA1 over the moving factor and truncates
/// the result per RFC 4226).
pub trait HmacSha1 {
    /// Computes HMAC-SHA1(`key`, `message`) into `out`.
    fn authenticate(&self, key: &[u8], message: &[u8], out: &mut [u8; 20]);
}

/// A free-running millisecond clock, used to timestamp Yubico-OTP
/// emissions.
pub trait MonotonicClock {
    /// Milliseconds elapsed since an arbitrary but stable epoch (typically
    /// boot).
    fn millis(&self) -> u64;
}

/// Result of polling the physical button during a challenge/response that
/// requires `CHAL_BTN_TRIG`.
///
/// Modeled as explicit poll results rather than a blocking `wait_button()`
/// call, per the design note that cooperative suspension should be a state
/// in the applet's own state machine, not a call that blocks the single
/// executor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ButtonPoll {
    /// The button has not yet been pressed or declined; caller should
    /// re-poll later and must observe `status_byte == 0x20` in the
    /// meantime.
    Pending,
    /// The user pressed the button; the operation may proceed.
    Pressed,
    /// The user declined (or a collaborator-defined timeout elapsed); the
    /// operation must be aborted with `SW_CONDITIONS_NOT_SATISFIED`.
    Declined,
}

/// The physical button collaborator.
pub trait ButtonSource {
    /// Polls the current button state for a challenge/response wait.
    fn poll(&mut self) -> ButtonPoll;
}

/// The keyboard HID output path. Stands in for `add_keyboard_buffer` /
/// `append_keyboard_buffer`.
pub trait KeyboardSink {
    /// Queues `bytes` for typing as literal keystrokes (ASCII characters).
    fn push_bytes(&mut self, bytes: &[u8]);

    /// Queues a single raw HID keycode (used for the static-ticket
    /// terminator `0x28`, which is not an ASCII character).
    fn push_key(&mut self, keycode: u8);
}

/// Aggregates one of each collaborator trait so [`crate::device::Device`]
/// only needs a single generic parameter, the way the donor firmware's
/// chip struct bundles multiple HIL traits behind one object.
pub trait Hal {
    type Store: SlotStore;
    type Rng: Rng;
    type Aes: Aes128;
    type Hmac: HmacSha1;
    type Clock: MonotonicClock;
    type Button: ButtonSource;
    type Keyboard: KeyboardSink;

    fn store(&mut self) -> &mut Self::Store;
    fn rng(&mut self) -> &mut Self::Rng;
    fn aes(&self) -> &Self::Aes;
    fn hmac(&self) -> &Self::Hmac;
    fn clock(&self) -> &Self::Clock;
    fn button(&mut self) -> &mut Self::Button;
    fn keyboard(&mut self) -> &mut Self::Keyboard;
    fn serial(&self) -> [u8; 4];
}
