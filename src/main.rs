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

//! Arduino Remote Desktop Application

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arduino_remote::bluetooth::{ConnectionState, Notification, RfcommController};
use arduino_remote::config::Config;
use arduino_remote::events::SessionCoordinator;
use arduino_remote::ui::{self, NoticeBoard, TrayAction, TrayHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("arduino_remote=info".parse()?))
        .init();

    info!("Starting Arduino Remote v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    // The notification channel is the only hand-off between the link tasks
    // and the session, which lives on this task alone.
    let (notify_tx, mut notify_rx) =
        mpsc::channel::<Notification>(config.session.notification_capacity.max(1));
    let controller = RfcommController::new(&config.bluetooth, notify_tx).await?;

    // Start system tray
    let (mut action_rx, tray) = ui::run_tray(config.session.visible_log_lines)?;
    refresh_devices(&controller, &tray).await;

    let mut session = SessionCoordinator::new(controller.clone());
    let mut notices = NoticeBoard::new(Duration::from_secs(config.session.notice_seconds));
    session.resume();
    if let Some(address) = &config.bluetooth.default_device {
        session.connect(address);
    }
    publish(&mut session, &mut notices, &tray);

    info!("Ready. System tray active.");

    loop {
        tokio::select! {
            Some(notification) = notify_rx.recv() => {
                session.on_notification(notification);
            }
            Some(action) = action_rx.recv() => {
                match action {
                    TrayAction::Connect(address) => session.connect(&address),
                    TrayAction::RefreshDevices => refresh_devices(&controller, &tray).await,
                    TrayAction::Action(n) => {
                        if let Err(e) = session.press_action(n) {
                            warn!("Action {} not sent: {}", n, e);
                        }
                    }
                    TrayAction::Quit => {
                        info!("Quit requested");
                        break;
                    }
                }
            }
            _ = notice_expiry(notices.deadline()) => {
                notices.expire(Instant::now());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }

        publish(&mut session, &mut notices, &tray);
    }

    session.shutdown();
    let stopped = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(notification) = notify_rx.recv().await {
            if notification == Notification::StateChanged(ConnectionState::None) {
                break;
            }
        }
    })
    .await;
    if stopped.is_err() {
        warn!("Connection controller did not stop in time");
    }

    info!("Arduino Remote stopped");
    Ok(())
}

/// Push the current session view and notice to the tray.
fn publish(
    session: &mut SessionCoordinator<RfcommController>,
    notices: &mut NoticeBoard,
    tray: &TrayHandle,
) {
    let now = Instant::now();
    for notice in session.take_notices() {
        notices.post(notice, now);
    }

    let snapshot = session.snapshot();
    let notice = notices.current().map(str::to_string);
    tray.update(move |tray| {
        tray.set_snapshot(snapshot);
        tray.set_notice(notice);
    });
}

/// Resolves when the visible notice is due to disappear.
async fn notice_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn refresh_devices(controller: &RfcommController, tray: &TrayHandle) {
    match controller.paired_devices().await {
        Ok(devices) => {
            info!("Found {} paired devices", devices.len());
            tray.update(move |tray| tray.set_devices(devices));
        }
        Err(e) => error!("Failed to list paired devices: {}", e),
    }
}
