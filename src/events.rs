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

//! Notification dispatch and command gating.
//!
//! The [`SessionCoordinator`] is the single consumer of controller
//! notifications. It runs on one task, is never shared, and only changes its
//! state from [`SessionCoordinator::on_notification`] and
//! [`SessionCoordinator::send_command`].

use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bluetooth::{decode_prefix, ConnectionController, ConnectionState, Notification};
use crate::state::{SessionSnapshot, SessionState};

/// Number of action buttons. Button `n` sends the command `n`.
pub const ACTION_COUNT: u8 = 6;

/// Notice shown when a command is attempted without a link.
pub const NOT_CONNECTED_NOTICE: &str = "You are not connected to a device";

/// Why a command was not sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The link is not in the connected state.
    #[error("not connected")]
    NotConnected,
    /// There is no action button with this number.
    #[error("no action button {0}")]
    UnknownAction(u8),
}

/// Command text for action button `n`, if such a button exists.
pub fn action_command(n: u8) -> Option<String> {
    (1..=ACTION_COUNT).contains(&n).then(|| n.to_string())
}

/// Mediates between user commands and the connection controller.
pub struct SessionCoordinator<C> {
    controller: C,
    state: SessionState,
    notices: VecDeque<String>,
}

impl<C: ConnectionController> SessionCoordinator<C> {
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            state: SessionState::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Start the controller unless it is already running.
    pub fn resume(&self) {
        if self.controller.current_state() == ConnectionState::None {
            info!("Starting connection controller");
            self.controller.start();
        }
    }

    /// Stop the controller.
    pub fn shutdown(&self) {
        info!("Stopping connection controller");
        self.controller.stop();
    }

    /// Ask the controller to connect to a device picked by the user.
    pub fn connect(&self, address: &str) {
        info!("Connect requested: {}", address);
        self.controller.connect(address);
    }

    /// Send a command to the connected device.
    ///
    /// The log entry is written when the controller echoes the bytes back,
    /// not here.
    pub fn send_command(&mut self, text: &str) -> Result<(), SendError> {
        if self.controller.current_state() != ConnectionState::Connected {
            warn!("Rejecting command {:?}: not connected", text);
            self.push_notice(NOT_CONNECTED_NOTICE.to_string());
            return Err(SendError::NotConnected);
        }

        if text.is_empty() {
            return Ok(());
        }

        debug!("Sending command: {}", text);
        self.controller.send(text.as_bytes().to_vec());
        Ok(())
    }

    /// Handle a press of action button `n`.
    pub fn press_action(&mut self, n: u8) -> Result<(), SendError> {
        let command = action_command(n).ok_or(SendError::UnknownAction(n))?;
        self.send_command(&command)
    }

    /// Apply a notification from the controller.
    pub fn on_notification(&mut self, notification: Notification) {
        match notification {
            Notification::StateChanged(link) => {
                info!("Link state changed: {}", link);
                self.state.link = link;
                if link == ConnectionState::Connected {
                    self.state.clear_log();
                }
            }
            Notification::DataSent(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                self.state.append(format!("Action: {}", text));
            }
            Notification::DataReceived { bytes, length } => {
                let text = decode_prefix(&bytes, length);
                let line = format!("{}: {}", self.state.peer_name(), text);
                self.state.append(line);
            }
            Notification::PeerIdentified(name) => {
                info!("Peer identified: {}", name);
                self.push_notice(format!("Connected to {}", name));
                self.state.peer = Some(name);
            }
            Notification::Toast(message) => {
                self.push_notice(message);
            }
        }
    }

    /// Drain the notices queued since the last call.
    ///
    /// Notices are transient. The session keeps no copy once drained.
    pub fn take_notices(&mut self) -> Vec<String> {
        self.notices.drain(..).collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            link: self.state.link,
            status: self.state.status(),
            peer: self.state.peer.clone(),
            log: self.state.log.clone(),
        }
    }

    fn push_notice(&mut self, notice: String) {
        info!("Notice: {}", notice);
        self.notices.push_back(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeController {
        state: Cell<ConnectionState>,
        sent: RefCell<Vec<Vec<u8>>>,
        connects: RefCell<Vec<String>>,
        starts: Cell<u32>,
        stops: Cell<u32>,
    }

    impl FakeController {
        fn with_state(state: ConnectionState) -> Self {
            let controller = Self::default();
            controller.state.set(state);
            controller
        }
    }

    impl ConnectionController for FakeController {
        fn start(&self) {
            self.starts.set(self.starts.get() + 1);
        }

        fn stop(&self) {
            self.stops.set(self.stops.get() + 1);
        }

        fn connect(&self, address: &str) {
            self.connects.borrow_mut().push(address.to_string());
        }

        fn send(&self, bytes: Vec<u8>) {
            self.sent.borrow_mut().push(bytes);
        }

        fn current_state(&self) -> ConnectionState {
            self.state.get()
        }
    }

    fn coordinator(state: ConnectionState) -> SessionCoordinator<FakeController> {
        SessionCoordinator::new(FakeController::with_state(state))
    }

    #[test]
    fn test_send_rejected_unless_connected() {
        for state in [
            ConnectionState::None,
            ConnectionState::Listen,
            ConnectionState::Connecting,
        ] {
            let mut session = coordinator(state);
            assert_eq!(session.send_command("1"), Err(SendError::NotConnected));
            assert!(session.controller().sent.borrow().is_empty());
            assert!(session.state().log.is_empty());
            assert_eq!(session.take_notices(), vec![NOT_CONNECTED_NOTICE.to_string()]);
        }
    }

    #[test]
    fn test_empty_command_is_noop() {
        let mut session = coordinator(ConnectionState::Connected);
        assert_eq!(session.send_command(""), Ok(()));
        assert!(session.controller().sent.borrow().is_empty());
        assert!(session.state().log.is_empty());
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_send_logs_on_echo_only() {
        let mut session = coordinator(ConnectionState::Connected);
        assert_eq!(session.send_command("3"), Ok(()));
        assert_eq!(*session.controller().sent.borrow(), vec![b"3".to_vec()]);
        assert!(session.state().log.is_empty());

        session.on_notification(Notification::DataSent(b"3".to_vec()));
        assert_eq!(session.state().log_lines().last().map(String::as_str), Some("Action: 3"));
    }

    #[test]
    fn test_connected_clears_log() {
        let mut session = coordinator(ConnectionState::Connected);
        session.on_notification(Notification::DataSent(b"1".to_vec()));
        session.on_notification(Notification::received("pong"));
        assert_eq!(session.state().log.len(), 2);

        session.on_notification(Notification::StateChanged(ConnectionState::Connected));
        assert!(session.state().log.is_empty());
    }

    #[test]
    fn test_other_states_keep_log() {
        let mut session = coordinator(ConnectionState::Connected);
        session.on_notification(Notification::DataSent(b"2".to_vec()));

        session.on_notification(Notification::StateChanged(ConnectionState::Connecting));
        assert_eq!(session.snapshot().status, "connecting…");
        session.on_notification(Notification::StateChanged(ConnectionState::None));
        assert_eq!(session.snapshot().status, "not connected");
        assert_eq!(session.state().log_lines(), vec!["Action: 2"]);
    }

    #[test]
    fn test_received_decodes_valid_prefix() {
        let mut session = coordinator(ConnectionState::Connected);
        session.on_notification(Notification::PeerIdentified("Uno".to_string()));
        session.on_notification(Notification::DataReceived {
            bytes: b"HELLO!".to_vec(),
            length: 5,
        });

        let lines = session.state().log_lines();
        assert_eq!(lines, vec!["Uno: HELLO"]);
        assert!(lines[0].ends_with("HELLO"));
    }

    #[test]
    fn test_received_with_overlong_length_is_clamped() {
        let mut session = coordinator(ConnectionState::Connected);
        session.on_notification(Notification::PeerIdentified("Nano".to_string()));
        session.on_notification(Notification::DataReceived {
            bytes: b"ok".to_vec(),
            length: 1024,
        });
        assert_eq!(session.state().log_lines(), vec!["Nano: ok"]);
    }

    #[test]
    fn test_received_before_peer_identified() {
        let mut session = coordinator(ConnectionState::Connected);
        session.on_notification(Notification::received("hi"));
        assert_eq!(session.state().log_lines(), vec!["Unknown: hi"]);
    }

    #[test]
    fn test_connect_sequence() {
        let mut session = coordinator(ConnectionState::None);

        session.on_notification(Notification::StateChanged(ConnectionState::Connecting));
        session.controller().state.set(ConnectionState::Connected);
        session.on_notification(Notification::StateChanged(ConnectionState::Connected));
        session.on_notification(Notification::PeerIdentified("Uno".to_string()));
        assert_eq!(session.send_command("1"), Ok(()));
        session.on_notification(Notification::DataSent(b"1".to_vec()));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, "connected to Uno");
        assert_eq!(session.state().log_lines(), vec!["Action: 1"]);
    }

    #[test]
    fn test_repeated_listen_is_idempotent() {
        let mut session = coordinator(ConnectionState::Listen);
        session.on_notification(Notification::received("x"));
        let before = session.state().log.clone();

        session.on_notification(Notification::StateChanged(ConnectionState::Listen));
        let first = session.snapshot().status;
        session.on_notification(Notification::StateChanged(ConnectionState::Listen));
        let second = session.snapshot().status;

        assert_eq!(first, "not connected");
        assert_eq!(first, second);
        assert_eq!(session.state().log, before);
    }

    #[test]
    fn test_peer_identified_queues_notice() {
        let mut session = coordinator(ConnectionState::Connecting);
        session.on_notification(Notification::PeerIdentified("HC-06".to_string()));

        assert_eq!(session.state().peer.as_deref(), Some("HC-06"));
        assert_eq!(session.take_notices(), vec!["Connected to HC-06".to_string()]);
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_toast_is_verbatim() {
        let mut session = coordinator(ConnectionState::Listen);
        session.on_notification(Notification::Toast("Unable to connect device".to_string()));

        assert_eq!(session.take_notices(), vec!["Unable to connect device".to_string()]);
        assert_eq!(session.state().link, ConnectionState::None);
        assert!(session.state().log.is_empty());
    }

    #[test]
    fn test_action_buttons() {
        let mut session = coordinator(ConnectionState::Connected);
        for n in 1..=ACTION_COUNT {
            assert_eq!(session.press_action(n), Ok(()));
        }
        let sent: Vec<Vec<u8>> = (1..=ACTION_COUNT).map(|n| n.to_string().into_bytes()).collect();
        assert_eq!(*session.controller().sent.borrow(), sent);

        assert_eq!(session.press_action(0), Err(SendError::UnknownAction(0)));
        assert_eq!(session.press_action(7), Err(SendError::UnknownAction(7)));
        assert_eq!(session.controller().sent.borrow().len(), ACTION_COUNT as usize);
    }

    #[test]
    fn test_action_command_mapping() {
        assert_eq!(action_command(1).as_deref(), Some("1"));
        assert_eq!(action_command(6).as_deref(), Some("6"));
        assert_eq!(action_command(0), None);
        assert_eq!(action_command(7), None);
    }

    #[test]
    fn test_resume_only_starts_from_none() {
        let session = coordinator(ConnectionState::None);
        session.resume();
        assert_eq!(session.controller().starts.get(), 1);

        let session = coordinator(ConnectionState::Listen);
        session.resume();
        assert_eq!(session.controller().starts.get(), 0);
    }

    #[test]
    fn test_connect_and_shutdown_forward_to_controller() {
        let session = coordinator(ConnectionState::Listen);
        session.connect("98:D3:31:F5:2A:10");
        session.shutdown();

        assert_eq!(*session.controller().connects.borrow(), vec!["98:D3:31:F5:2A:10".to_string()]);
        assert_eq!(session.controller().stops.get(), 1);
    }

    #[test]
    fn test_send_error_message() {
        assert_eq!(SendError::NotConnected.to_string(), "not connected");
    }
}
