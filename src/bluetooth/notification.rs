// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Link state and the notifications a controller delivers to the session.

use std::fmt;
use tracing::warn;

/// State of the Bluetooth link, owned by the connection controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Doing nothing.
    #[default]
    None,
    /// Listening for incoming connections.
    Listen,
    /// Initiating an outgoing connection.
    Connecting,
    /// Connected to a remote device.
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "NONE",
            ConnectionState::Listen => "LISTEN",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered from the connection controller to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The link moved to a new state.
    StateChanged(ConnectionState),
    /// Bytes read from the remote device. Only the first `length` bytes of
    /// `bytes` are valid; the rest is stale read-buffer content.
    DataReceived { bytes: Vec<u8>, length: usize },
    /// Bytes that were written to the remote device.
    DataSent(Vec<u8>),
    /// Name of the device on the other end of the link.
    PeerIdentified(String),
    /// Message to show to the user as is.
    Toast(String),
}

impl Notification {
    /// Build a `DataReceived` covering the whole buffer.
    pub fn received(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let length = bytes.len();
        Notification::DataReceived { bytes, length }
    }
}

/// Decode the valid prefix of a read buffer as text.
///
/// A `length` past the end of the buffer is clamped to the buffer size.
pub fn decode_prefix(bytes: &[u8], length: usize) -> String {
    let valid = if length > bytes.len() {
        warn!(
            "Read length {} exceeds buffer of {} bytes, clamping",
            length,
            bytes.len()
        );
        bytes.len()
    } else {
        length
    };
    String::from_utf8_lossy(&bytes[..valid]).into_owned()
}
