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

//! System tray implementation using ksni.

use anyhow::Result;
use ksni::{self, menu::StandardItem, menu::SubMenu, Handle, MenuItem, Tray, TrayService};
use tokio::sync::mpsc;
use tracing::info;

use crate::bluetooth::{ConnectionState, PairedDevice};
use crate::events::ACTION_COUNT;
use crate::state::SessionSnapshot;

/// Actions that can be triggered from the tray menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayAction {
    Connect(String),
    RefreshDevices,
    Action(u8),
    Quit,
}

/// System tray icon and menu.
pub struct ArduinoRemoteTray {
    snapshot: SessionSnapshot,
    notice: Option<String>,
    devices: Vec<PairedDevice>,
    visible_log_lines: usize,
    action_tx: mpsc::UnboundedSender<TrayAction>,
}

pub type TrayHandle = Handle<ArduinoRemoteTray>;

impl ArduinoRemoteTray {
    pub fn new(visible_log_lines: usize, action_tx: mpsc::UnboundedSender<TrayAction>) -> Self {
        Self {
            snapshot: SessionSnapshot::default(),
            notice: None,
            devices: Vec::new(),
            visible_log_lines,
            action_tx,
        }
    }

    pub fn set_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.snapshot = snapshot;
    }

    /// Notice shown under the status line, if any.
    pub fn set_notice(&mut self, notice: Option<String>) {
        self.notice = notice;
    }

    pub fn set_devices(&mut self, devices: Vec<PairedDevice>) {
        self.devices = devices;
    }

    fn device_menu(&self) -> Vec<MenuItem<Self>> {
        let mut items: Vec<MenuItem<Self>> = self
            .devices
            .iter()
            .map(|device| {
                let address = device.address.to_string();
                MenuItem::Standard(StandardItem {
                    label: format!("{} ({})", device.name, address),
                    activate: Box::new(move |tray: &mut Self| {
                        let _ = tray.action_tx.send(TrayAction::Connect(address.clone()));
                    }),
                    ..Default::default()
                })
            })
            .collect();

        if items.is_empty() {
            items.push(MenuItem::Standard(StandardItem {
                label: "No paired devices".to_string(),
                enabled: false,
                ..Default::default()
            }));
        }

        items.push(MenuItem::Separator);
        items.push(MenuItem::Standard(StandardItem {
            label: "Refresh".to_string(),
            activate: Box::new(|tray: &mut Self| {
                let _ = tray.action_tx.send(TrayAction::RefreshDevices);
            }),
            ..Default::default()
        }));

        items
    }
}

/// Icon for a link state.
pub fn icon_name(link: ConnectionState) -> &'static str {
    match link {
        ConnectionState::None => "network-offline",
        ConnectionState::Listen => "network-idle",
        ConnectionState::Connecting => "network-idle",
        ConnectionState::Connected => "network-transmit-receive",
    }
}

/// Menu labels for the newest log entries.
pub fn log_labels(snapshot: &SessionSnapshot, count: usize) -> Vec<String> {
    snapshot
        .recent(count)
        .iter()
        .map(|entry| format!("{}  {}", entry.timestamp.format("%H:%M:%S"), entry.text))
        .collect()
}

/// Tooltip body: the status line, then the current notice.
fn tool_tip_text(status: &str, notice: Option<&str>) -> String {
    match notice {
        Some(notice) => format!("{}\n{}", status, notice),
        None => status.to_string(),
    }
}

impl Tray for ArduinoRemoteTray {
    fn icon_name(&self) -> String {
        icon_name(self.snapshot.link).to_string()
    }

    fn title(&self) -> String {
        "Arduino Remote".to_string()
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            icon_name: String::new(),
            icon_pixmap: Vec::new(),
            title: "Arduino Remote".to_string(),
            description: tool_tip_text(&self.snapshot.status, self.notice.as_deref()),
        }
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        let mut items = vec![];

        // Status header
        items.push(MenuItem::Standard(StandardItem {
            label: self.snapshot.status.clone(),
            enabled: false,
            ..Default::default()
        }));

        items.push(MenuItem::Separator);

        items.push(MenuItem::SubMenu(SubMenu {
            label: "Connect a device".to_string(),
            submenu: self.device_menu(),
            ..Default::default()
        }));

        items.push(MenuItem::Separator);

        for n in 1..=ACTION_COUNT {
            items.push(MenuItem::Standard(StandardItem {
                label: format!("Action {}", n),
                activate: Box::new(move |tray: &mut Self| {
                    let _ = tray.action_tx.send(TrayAction::Action(n));
                }),
                ..Default::default()
            }));
        }

        let log = log_labels(&self.snapshot, self.visible_log_lines);
        if !log.is_empty() {
            items.push(MenuItem::Separator);
            for line in log {
                items.push(MenuItem::Standard(StandardItem {
                    label: line,
                    enabled: false,
                    ..Default::default()
                }));
            }
        }

        items.push(MenuItem::Separator);

        items.push(MenuItem::Standard(StandardItem {
            label: "Quit".to_string(),
            activate: Box::new(|tray: &mut Self| {
                let _ = tray.action_tx.send(TrayAction::Quit);
            }),
            ..Default::default()
        }));

        items
    }

    fn id(&self) -> String {
        "arduino-remote".to_string()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::Hardware
    }
}

/// Run the system tray service.
pub fn run_tray(
    visible_log_lines: usize,
) -> Result<(mpsc::UnboundedReceiver<TrayAction>, TrayHandle)> {
    let (action_tx, action_rx) = mpsc::unbounded_channel();

    let tray = ArduinoRemoteTray::new(visible_log_lines, action_tx);
    let service = TrayService::new(tray);
    let handle = service.handle();

    // Spawn the tray service
    std::thread::spawn(move || {
        let _ = service.run();
    });

    info!("System tray started");

    Ok((action_rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LogEntry;
    use chrono::{Local, TimeZone};

    #[test]
    fn test_icon_per_state() {
        assert_eq!(icon_name(ConnectionState::None), "network-offline");
        assert_eq!(icon_name(ConnectionState::Connected), "network-transmit-receive");
    }

    #[test]
    fn test_log_labels_show_newest_entries() {
        let timestamp = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();
        let snapshot = SessionSnapshot {
            log: ["Action: 1", "Uno: ok", "Action: 2"]
                .iter()
                .map(|text| LogEntry {
                    timestamp,
                    text: text.to_string(),
                })
                .collect(),
            ..Default::default()
        };

        assert_eq!(
            log_labels(&snapshot, 2),
            vec!["09:30:05  Uno: ok".to_string(), "09:30:05  Action: 2".to_string()]
        );
    }

    #[test]
    fn test_tool_tip_shows_notice_until_cleared() {
        let (action_tx, _action_rx) = mpsc::unbounded_channel();
        let mut tray = ArduinoRemoteTray::new(5, action_tx);
        tray.set_snapshot(SessionSnapshot {
            status: "not connected".to_string(),
            ..Default::default()
        });

        tray.set_notice(Some("Unable to connect device".to_string()));
        assert_eq!(tray.tool_tip().description, "not connected\nUnable to connect device");

        tray.set_notice(None);
        assert_eq!(tray.tool_tip().description, "not connected");
    }

    #[test]
    fn test_action_menu_sends_actions() {
        let (action_tx, mut action_rx) = mpsc::unbounded_channel();
        let mut tray = ArduinoRemoteTray::new(5, action_tx);

        let activations: Vec<_> = tray
            .menu()
            .into_iter()
            .filter_map(|item| match item {
                MenuItem::Standard(item) if item.label.starts_with("Action ") => Some(item.activate),
                _ => None,
            })
            .collect();
        assert_eq!(activations.len(), ACTION_COUNT as usize);

        for activate in &activations {
            activate(&mut tray);
        }
        for n in 1..=ACTION_COUNT {
            assert_eq!(action_rx.try_recv().ok(), Some(TrayAction::Action(n)));
        }
    }
}
