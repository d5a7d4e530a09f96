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

//! The command/response envelope both applets dispatch on.

use crate::status::StatusWord;

/// The maximum command data a single APDU can carry. The HID framing layer
/// guarantees frames never exceed this, since a short APDU's `Lc` is a
/// single byte.
pub const MAX_COMMAND_DATA: usize = 255;

/// A parsed ISO 7816-4 command APDU (short form; this applet never sees
/// extended-length APDUs, since HID transport frames are capped well
/// below 65536 bytes).
#[derive(Clone, Copy, Debug)]
pub struct Apdu<'a> {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: &'a [u8],
}

impl<'a> Apdu<'a> {
    /// Builds an APDU from its header bytes and command data.
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8, data: &'a [u8]) -> Self {
        Self { cla, ins, p1, p2, data }
    }

    /// `Lc`: the number of command data bytes.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// A response APDU: response data plus the trailing status word. The
/// caller owns the backing buffer; this type borrows into it so applet
/// logic never allocates.
pub struct Response<'a> {
    data: &'a mut [u8],
    len: usize,
    pub status: StatusWord,
}

impl<'a> Response<'a> {
    /// Wraps `buf` as an empty response that will report `status`.
    pub fn new(buf: &'a mut [u8], status: StatusWord) -> Self {
        Self { data: buf, len: 0, status }
    }

    /// Appends `bytes` to the response data.
    ///
    /// # Panics
    /// Panics if the backing buffer is too small; callers size response
    /// buffers from the known maximum for each command.
    pub fn push(&mut self, bytes: &[u8]) {
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// The response data written so far.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Sets the status word, overriding whatever [`Response::new`] set.
    pub fn set_status(&mut self, status: StatusWord) {
        self.status = status;
    }
}
