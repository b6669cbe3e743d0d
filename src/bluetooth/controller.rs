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

//! Connection controller for the RFCOMM serial link.
//!
//! The controller owns the link state machine. Callers talk to it through a
//! cheap handle; the actual work happens on a driver task which serializes
//! start, stop, connect and send requests together with events coming back
//! from the transport tasks. Everything the session needs to know is pushed
//! through the bounded notification channel handed in at construction.

use anyhow::Result;
use bluer::{Adapter, Address};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::connection::{Link, LinkEvent, Transport};
use super::notification::{ConnectionState, Notification};
use super::server::{self, BluezTransport, PairedDevice};
use crate::config::BluetoothConfig;

/// Notice shown when an outgoing connection attempt fails.
pub const CONNECT_FAILED_NOTICE: &str = "Unable to connect device";

/// Notice shown when an established link drops.
pub const CONNECTION_LOST_NOTICE: &str = "Device connection was lost";

/// Notice shown when incoming connections cannot be accepted.
pub const LISTEN_FAILED_NOTICE: &str = "Unable to listen for connections";

/// Operations the session needs from a connection controller.
///
/// Every method returns immediately. Outcomes are observed later through
/// notifications, never through return values.
pub trait ConnectionController {
    /// Start listening for incoming connections.
    fn start(&self);

    /// Tear everything down.
    fn stop(&self);

    /// Connect to the device with the given address.
    fn connect(&self, address: &str);

    /// Write bytes to the connected device.
    fn send(&self, bytes: Vec<u8>);

    /// Snapshot of the current link state.
    fn current_state(&self) -> ConnectionState;
}

/// Requests sent from the handle to the driver task.
#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Connect(String),
    Send(Vec<u8>),
}

/// Handle to the RFCOMM connection controller.
#[derive(Clone)]
pub struct RfcommController {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<RwLock<ConnectionState>>,
    adapter: Adapter,
}

impl RfcommController {
    /// Open the adapter and spawn the driver task.
    pub async fn new(config: &BluetoothConfig, notify_tx: mpsc::Sender<Notification>) -> Result<Self> {
        let adapter = server::open_adapter(config.adapter.as_deref()).await?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let (driver, link_rx) = Driver::new(
            BluezTransport::new(adapter.clone()),
            config.rfcomm_channel,
            config.read_buffer_size,
            notify_tx,
        );
        let state = driver.state.clone();
        tokio::spawn(driver.run(command_rx, link_rx));

        Ok(Self {
            command_tx,
            state,
            adapter,
        })
    }

    /// Devices paired with the local adapter.
    pub async fn paired_devices(&self) -> Result<Vec<PairedDevice>> {
        server::paired_devices(&self.adapter).await
    }

    fn request(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            error!("Connection controller is not running");
        }
    }
}

impl ConnectionController for RfcommController {
    fn start(&self) {
        self.request(Command::Start);
    }

    fn stop(&self) {
        self.request(Command::Stop);
    }

    fn connect(&self, address: &str) {
        self.request(Command::Connect(address.to_string()));
    }

    fn send(&self, bytes: Vec<u8>) {
        self.request(Command::Send(bytes));
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.read()
    }
}

/// Task that owns the link lifecycle.
struct Driver<T: Transport> {
    transport: T,
    channel: u8,
    buffer_size: usize,
    state: Arc<RwLock<ConnectionState>>,
    notify_tx: mpsc::Sender<Notification>,
    link_tx: mpsc::UnboundedSender<LinkEvent<T::Stream>>,
    /// Bumped whenever outgoing attempts or links are replaced.
    generation: u64,
    /// Bumped for every listener started.
    listener_generation: u64,
    accept_task: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    link: Option<Link>,
}

impl<T: Transport> Driver<T> {
    fn new(
        transport: T,
        channel: u8,
        buffer_size: usize,
        notify_tx: mpsc::Sender<Notification>,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent<T::Stream>>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let driver = Self {
            transport,
            channel,
            buffer_size,
            state: Arc::new(RwLock::new(ConnectionState::None)),
            notify_tx,
            link_tx,
            generation: 0,
            listener_generation: 0,
            accept_task: None,
            connect_task: None,
            link: None,
        };
        (driver, link_rx)
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut link_rx: mpsc::UnboundedReceiver<LinkEvent<T::Stream>>,
    ) {
        info!("Connection controller started");

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = link_rx.recv() => self.handle_link_event(event).await,
            }
        }

        self.cancel_all();
        *self.state.write() = ConnectionState::None;
        info!("Connection controller stopped");
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start().await,
            Command::Stop => self.stop().await,
            Command::Connect(address) => self.connect(&address).await,
            Command::Send(bytes) => self.send(bytes),
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent<T::Stream>) {
        match event {
            LinkEvent::Accepted {
                generation,
                stream,
                address,
                name,
            } => {
                if generation != self.listener_generation || self.accept_task.is_none() {
                    debug!("Ignoring connection from {} on a closed listener", address);
                    return;
                }
                match self.current_state() {
                    ConnectionState::Listen | ConnectionState::Connecting => {
                        self.connected(stream, address, name).await;
                    }
                    other => {
                        warn!("Dropping incoming connection from {} while {}", address, other);
                    }
                }
            }
            LinkEvent::ListenFailed { generation, error } => {
                if generation != self.listener_generation {
                    return;
                }
                error!("Failed to listen on RFCOMM channel {}: {}", self.channel, error);
                self.accept_task = None;
                self.notify(Notification::Toast(LISTEN_FAILED_NOTICE.to_string()))
                    .await;
                if self.current_state() == ConnectionState::Listen {
                    self.set_state(ConnectionState::None).await;
                }
            }
            LinkEvent::Established {
                generation,
                stream,
                address,
                name,
            } => {
                if generation != self.generation {
                    debug!("Ignoring stale connection to {}", address);
                    return;
                }
                self.connect_task = None;
                self.connected(stream, address, name).await;
            }
            LinkEvent::ConnectFailed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                warn!("Connect failed: {}", error);
                self.connect_task = None;
                self.notify(Notification::Toast(CONNECT_FAILED_NOTICE.to_string()))
                    .await;
                self.start().await;
            }
            LinkEvent::Lost { generation, error } => {
                if generation != self.generation || self.link.is_none() {
                    return;
                }
                match error {
                    Some(e) => warn!("Connection lost: {}", e),
                    None => info!("Connection lost"),
                }
                self.link = None;
                self.notify(Notification::Toast(CONNECTION_LOST_NOTICE.to_string()))
                    .await;
                self.start().await;
            }
        }
    }

    /// Cancel outgoing work and listen for incoming connections.
    async fn start(&mut self) {
        self.cancel_pending();

        if self.accept_task.is_none() {
            self.listener_generation += 1;
            self.accept_task = Some(self.transport.listen(
                self.channel,
                self.listener_generation,
                self.link_tx.clone(),
            ));
        }

        self.set_state(ConnectionState::Listen).await;
    }

    async fn stop(&mut self) {
        self.cancel_all();
        self.set_state(ConnectionState::None).await;
    }

    async fn connect(&mut self, address: &str) {
        let address: Address = match address.trim().parse() {
            Ok(address) => address,
            Err(_) => {
                warn!("Invalid device address: {}", address);
                self.notify(Notification::Toast(format!("Invalid device address: {}", address)))
                    .await;
                return;
            }
        };

        info!("Connecting to {}", address);
        self.cancel_pending();
        self.connect_task = Some(self.transport.connect(
            address,
            self.channel,
            self.generation,
            self.link_tx.clone(),
        ));

        self.set_state(ConnectionState::Connecting).await;
    }

    /// Take over a fresh stream as the one active link.
    ///
    /// The session hears about the peer and the new state before the reader
    /// starts, so nothing the device sends first lands ahead of them.
    async fn connected(&mut self, stream: T::Stream, address: Address, name: String) {
        self.cancel_all();

        self.notify(Notification::PeerIdentified(name)).await;
        self.set_state(ConnectionState::Connected).await;

        self.link = Some(Link::spawn(
            stream,
            address,
            self.generation,
            self.buffer_size,
            self.notify_tx.clone(),
            self.link_tx.clone(),
        ));
    }

    fn send(&mut self, bytes: Vec<u8>) {
        match &self.link {
            Some(link) if self.current_state() == ConnectionState::Connected => {
                if !link.send(bytes) {
                    warn!("Writer for {} is gone, dropping write", link.address());
                }
            }
            _ => warn!("Not connected, dropping {} bytes", bytes.len()),
        }
    }

    /// Cancel a pending connect attempt and any live link.
    fn cancel_pending(&mut self) {
        self.generation += 1;
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.link = None;
    }

    fn cancel_all(&mut self) {
        self.cancel_pending();
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }

    async fn set_state(&mut self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        info!("Link state {} -> {}", previous, state);
        self.notify(Notification::StateChanged(state)).await;
    }

    async fn notify(&self, notification: Notification) {
        if self.notify_tx.send(notification).await.is_err() {
            debug!("Session closed, dropping notification");
        }
    }
}
