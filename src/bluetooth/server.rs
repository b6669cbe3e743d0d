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

//! BlueZ RFCOMM transport and adapter helpers.

use anyhow::Result;
use bluer::rfcomm::{Listener, SocketAddr, Stream};
use bluer::{Adapter, Address};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::connection::{LinkEvent, Transport};

/// Open the default adapter, or the named one, and make sure it is powered.
pub async fn open_adapter(name: Option<&str>) -> Result<Adapter> {
    let session = bluer::Session::new().await?;
    info!("BlueZ session created");

    let adapter = match name {
        Some(name) => session.adapter(name)?,
        None => session.default_adapter().await?,
    };
    info!("Using Bluetooth adapter: {}", adapter.name());

    if !adapter.is_powered().await? {
        info!("Powering on Bluetooth adapter...");
        adapter.set_powered(true).await?;
    }

    Ok(adapter)
}

/// RFCOMM sockets on a BlueZ adapter.
pub(crate) struct BluezTransport {
    adapter: Adapter,
}

impl BluezTransport {
    pub(crate) fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }
}

impl Transport for BluezTransport {
    type Stream = Stream;

    fn listen(
        &self,
        channel: u8,
        generation: u64,
        link_tx: mpsc::UnboundedSender<LinkEvent<Stream>>,
    ) -> JoinHandle<()> {
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            let local_addr = SocketAddr::new(Address::any(), channel);
            match Listener::bind(local_addr).await {
                Ok(listener) => {
                    info!("RFCOMM server listening on channel {}", channel);
                    accept_loop(listener, adapter, generation, link_tx).await;
                }
                Err(e) => {
                    let _ = link_tx.send(LinkEvent::ListenFailed {
                        generation,
                        error: e.to_string(),
                    });
                }
            }
        })
    }

    fn connect(
        &self,
        address: Address,
        channel: u8,
        generation: u64,
        link_tx: mpsc::UnboundedSender<LinkEvent<Stream>>,
    ) -> JoinHandle<()> {
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            let event = match Stream::connect(SocketAddr::new(address, channel)).await {
                Ok(stream) => LinkEvent::Established {
                    generation,
                    stream,
                    address,
                    name: device_name(&adapter, address).await,
                },
                Err(e) => LinkEvent::ConnectFailed {
                    generation,
                    error: e.to_string(),
                },
            };
            let _ = link_tx.send(event);
        })
    }
}

/// Accept loop for incoming connections.
async fn accept_loop(
    listener: Listener,
    adapter: Adapter,
    generation: u64,
    link_tx: mpsc::UnboundedSender<LinkEvent<Stream>>,
) {
    info!("Waiting for connections...");

    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let address = remote_addr.addr;
                info!("Connection from: {}", address);
                let event = LinkEvent::Accepted {
                    generation,
                    stream,
                    address,
                    name: device_name(&adapter, address).await,
                };
                if link_tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Accept error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}

/// A paired Bluetooth device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    pub address: Address,
    pub name: String,
}

/// List the devices paired with the adapter, sorted by name.
pub async fn paired_devices(adapter: &Adapter) -> Result<Vec<PairedDevice>> {
    let mut devices = Vec::new();

    for addr in adapter.device_addresses().await? {
        let device = adapter.device(addr)?;
        if device.is_paired().await? {
            let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
            devices.push(PairedDevice {
                address: addr,
                name,
            });
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// Display name for a remote device, falling back to its address.
async fn device_name(adapter: &Adapter, address: Address) -> String {
    match adapter.device(address) {
        Ok(device) => device
            .alias()
            .await
            .unwrap_or_else(|_| address.to_string()),
        Err(_) => address.to_string(),
    }
}
