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

//! Session state owned by the coordinator.

use chrono::{DateTime, Local};

use crate::bluetooth::ConnectionState;

/// Name shown when the peer has not identified itself yet.
pub const UNKNOWN_PEER: &str = "Unknown";

/// A single line in the session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

/// Everything the session knows about the link.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Last state reported by the controller.
    pub link: ConnectionState,

    /// Name of the connected device.
    pub peer: Option<String>,

    /// Commands sent and data received, oldest first.
    pub log: Vec<LogEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_name(&self) -> &str {
        self.peer.as_deref().unwrap_or(UNKNOWN_PEER)
    }

    /// Status line for the current link state.
    pub fn status(&self) -> String {
        status_text(self.link, self.peer.as_deref())
    }

    pub fn append(&mut self, text: String) {
        self.log.push(LogEntry {
            timestamp: Local::now(),
            text,
        });
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log.iter().map(|entry| entry.text.clone()).collect()
    }
}

/// Status line shown for a link state.
pub fn status_text(link: ConnectionState, peer: Option<&str>) -> String {
    match link {
        ConnectionState::Connected => {
            format!("connected to {}", peer.unwrap_or(UNKNOWN_PEER))
        }
        ConnectionState::Connecting => "connecting…".to_string(),
        ConnectionState::Listen | ConnectionState::None => "not connected".to_string(),
    }
}

/// Read-only view of the session handed to the front end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub link: ConnectionState,
    pub status: String,
    pub peer: Option<String>,
    pub log: Vec<LogEntry>,
}

impl SessionSnapshot {
    /// The newest `count` log entries, oldest first.
    pub fn recent(&self, count: usize) -> &[LogEntry] {
        let start = self.log.len().saturating_sub(count);
        &self.log[start..]
    }
}
