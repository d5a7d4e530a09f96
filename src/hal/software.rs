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

//! Host-side HAL backend used by this crate's own tests and by desktop
//! tooling that wants to drive the applet without real silicon. Not meant
//! for production firmware: a board support crate should implement
//! [`crate::hal`] directly against its crypto blocks and flash controller.

use aes::cipher::{BlockEncrypt, KeyInit};
use hmac::Mac;

use super::{Aes128, ButtonPoll, ButtonSource, FileId, Hal, HmacSha1, KeyboardSink, MonotonicClock, Rng, SlotStore};

const SLOT_CAPACITY: usize = 66;
const DEVICE_CONFIG_CAPACITY: usize = 256;

/// An in-memory [`SlotStore`]. Each slot is a fixed-capacity buffer with a
/// separate "present" flag, since the two OTP slots and the Management
/// blob have known maximum sizes and this crate avoids heap allocation.
#[derive(Default)]
pub struct InMemoryStore {
    slot1: Option<([u8; SLOT_CAPACITY], usize)>,
    slot2: Option<([u8; SLOT_CAPACITY], usize)>,
    device_config: Option<([u8; DEVICE_CONFIG_CAPACITY], usize)>,
    pub flush_count: u32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, id: FileId) -> &mut Option<([u8; SLOT_CAPACITY], usize)> {
        match id {
            FileId::Slot1 => &mut self.slot1,
            FileId::Slot2 => &mut self.slot2,
            FileId::DeviceConfig => unreachable!("device config uses its own buffer"),
        }
    }
}

impl SlotStore for InMemoryStore {
    fn has_data(&self, id: FileId) -> bool {
        match id {
            FileId::Slot1 => self.slot1.is_some(),
            FileId::Slot2 => self.slot2.is_some(),
            FileId::DeviceConfig => self.device_config.is_some(),
        }
    }

    fn read(&self, id: FileId, out: &mut [u8]) -> usize {
        let (buf, len): (&[u8], usize) = match id {
            FileId::Slot1 => match &self.slot1 {
                Some(v) => (&v.0[..], v.1),
                None => return 0,
            },
            FileId::Slot2 => match &self.slot2 {
                Some(v) => (&v.0[..], v.1),
                None => return 0,
            },
            FileId::DeviceConfig => match &self.device_config {
                Some(v) => (&v.0[..], v.1),
                None => return 0,
            },
        };
        out[..len].copy_from_slice(&buf[..len]);
        len
    }

    fn write(&mut self, id: FileId, data: &[u8]) {
        match id {
            FileId::DeviceConfig => {
                let mut buf = [0u8; DEVICE_CONFIG_CAPACITY];
                buf[..data.len()].copy_from_slice(data);
                self.device_config = Some((buf, data.len()));
            }
            _ => {
                let mut buf = [0u8; SLOT_CAPACITY];
                buf[..data.len()].copy_from_slice(data);
                *self.slot_mut(id) = Some((buf, data.len()));
            }
        }
    }

    fn delete(&mut self, id: FileId) {
        match id {
            FileId::Slot1 => self.slot1 = None,
            FileId::Slot2 => self.slot2 = None,
            FileId::DeviceConfig => self.device_config = None,
        }
    }

    fn flush(&mut self) {
        self.flush_count += 1;
    }
}

/// A small xorshift PRNG. Deterministic given a seed, which is what tests
/// want; a real board would wire this trait to a hardware TRNG instead.
pub struct XorShiftRng {
    state: u32,
}

impl XorShiftRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E3779B9 } else { seed },
        }
    }
}

impl Rng for XorShiftRng {
    fn fill_bytes(&mut self, out: &mut [u8]) {
        for chunk in out.chunks_mut(1) {
            self.state ^= self.state << 13;
            self.state ^= self.state >> 17;
            self.state ^= self.state << 5;
            chunk[0] = self.state as u8;
        }
    }
}

/// Software AES-128-ECB via RustCrypto's `aes` crate.
pub struct SoftwareAes;

impl Aes128 for SoftwareAes {
    fn encrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]) {
        let cipher = aes::Aes128::new_from_slice(key).expect("16-byte key");
        let generic_block = aes::Block::from_mut_slice(block);
        cipher.encrypt_block(generic_block);
    }
}

/// Software HMAC-SHA1 via RustCrypto's `hmac`/`sha1` crates.
pub struct SoftwareHmacSha1;

impl HmacSha1 for SoftwareHmacSha1 {
    fn authenticate(&self, key: &[u8], message: &[u8], out: &mut [u8; 20]) {
        let mut mac = <hmac::Hmac<sha1::Sha1> as KeyInit>::new_from_slice(key)
            .expect("HMAC accepts any key length");
        mac.update(message);
        let result = mac.finalize().into_bytes();
        out.copy_from_slice(&result);
    }
}

/// A manually-advanced clock for deterministic timestamp tests.
#[derive(Default)]
pub struct ManualClock {
    pub now_millis: u64,
}

impl MonotonicClock for ManualClock {
    fn millis(&self) -> u64 {
        self.now_millis
    }
}

/// A button whose outcome the test sets in advance.
pub struct ScriptedButton {
    pub outcome: ButtonPoll,
}

impl Default for ScriptedButton {
    fn default() -> Self {
        Self {
            outcome: ButtonPoll::Pressed,
        }
    }
}

impl ButtonSource for ScriptedButton {
    fn poll(&mut self) -> ButtonPoll {
        self.outcome
    }
}

/// A keyboard sink that records everything typed, for test assertions.
pub struct CapturingKeyboard {
    buf: [u8; 128],
    len: usize,
}

impl Default for CapturingKeyboard {
    fn default() -> Self {
        Self {
            buf: [0u8; 128],
            len: 0,
        }
    }
}

impl CapturingKeyboard {
    pub fn typed(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl KeyboardSink for CapturingKeyboard {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    fn push_key(&mut self, keycode: u8) {
        self.buf[self.len] = keycode;
        self.len += 1;
    }
}

/// A complete host-side [`Hal`] wiring every software collaborator above
/// together, plus a fixed test serial number.
pub struct SoftwareHal {
    pub store: InMemoryStore,
    pub rng: XorShiftRng,
    pub aes: SoftwareAes,
    pub hmac: SoftwareHmacSha1,
    pub clock: ManualClock,
    pub button: ScriptedButton,
    pub keyboard: CapturingKeyboard,
    pub serial: [u8; 4],
}

impl SoftwareHal {
    pub fn new() -> Self {
        Self {
            store: InMemoryStore::new(),
            rng: XorShiftRng::new(1),
            aes: SoftwareAes,
            hmac: SoftwareHmacSha1,
            clock: ManualClock::default(),
            button: ScriptedButton::default(),
            keyboard: CapturingKeyboard::default(),
            serial: [0x00, 0x01, 0x02, 0x03],
        }
    }
}

impl Default for SoftwareHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for SoftwareHal {
    type Store = InMemoryStore;
    type Rng = XorShiftRng;
    type Aes = SoftwareAes;
    type Hmac = SoftwareHmacSha1;
    type Clock = ManualClock;
    type Button = ScriptedButton;
    type Keyboard = CapturingKeyboard;

    fn store(&mut self) -> &mut Self::Store {
        &mut self.store
    }

    fn rng(&mut self) -> &mut Self::Rng {
        &mut self.rng
    }

    fn aes(&self) -> &Self::Aes {
        &self.aes
    }

    fn hmac(&self) -> &Self::Hmac {
        &self.hmac
    }

    fn clock(&self) -> &Self::Clock {
        &self.clock
    }

    fn button(&mut self) -> &mut Self::Button {
        &mut self.button
    }

    fn keyboard(&mut self) -> &mut Self::Keyboard {
        &mut self.keyboard
    }

    fn serial(&self) -> [u8; 4] {
        self.serial
    }
}
