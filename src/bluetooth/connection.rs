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

//! Transport seam and the reader/writer tasks for an established link.

use bluer::Address;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::notification::Notification;

/// Events reported by transport tasks back to the controller driver.
///
/// Every event carries the generation of the task that produced it so the
/// driver can discard events from tasks it has already replaced.
pub(crate) enum LinkEvent<S> {
    /// The listener accepted an incoming connection.
    Accepted {
        generation: u64,
        stream: S,
        address: Address,
        name: String,
    },
    /// The listener could not be set up.
    ListenFailed { generation: u64, error: String },
    /// An outgoing connection attempt succeeded.
    Established {
        generation: u64,
        stream: S,
        address: Address,
        name: String,
    },
    /// An outgoing connection attempt failed.
    ConnectFailed { generation: u64, error: String },
    /// The connected link went away.
    Lost { generation: u64, error: Option<String> },
}

/// Opens streams for the controller.
///
/// Both operations run in the background and report back through `link_tx`
/// with the given generation. The returned handle is aborted when the driver
/// no longer needs the task.
pub(crate) trait Transport: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Listen on `channel` and report every accepted stream.
    fn listen(
        &self,
        channel: u8,
        generation: u64,
        link_tx: mpsc::UnboundedSender<LinkEvent<Self::Stream>>,
    ) -> JoinHandle<()>;

    /// Connect to `address` on `channel` and report the outcome.
    fn connect(
        &self,
        address: Address,
        channel: u8,
        generation: u64,
        link_tx: mpsc::UnboundedSender<LinkEvent<Self::Stream>>,
    ) -> JoinHandle<()>;
}

/// An established link. Dropping it closes both halves.
pub(crate) struct Link {
    address: Address,
    write_tx: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    /// Split the stream and spawn the reader and writer tasks.
    pub(crate) fn spawn<S>(
        stream: S,
        address: Address,
        generation: u64,
        buffer_size: usize,
        notify_tx: mpsc::Sender<Notification>,
        link_tx: mpsc::UnboundedSender<LinkEvent<S>>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            reader,
            generation,
            buffer_size,
            notify_tx.clone(),
            link_tx.clone(),
        ));
        let writer = tokio::spawn(write_loop(writer, generation, write_rx, notify_tx, link_tx));

        info!("Link to {} established (generation {})", address, generation);
        Self {
            address,
            write_tx,
            reader,
            writer,
        }
    }

    /// Queue bytes for the writer. Returns false if the writer is gone.
    pub(crate) fn send(&self, bytes: Vec<u8>) -> bool {
        self.write_tx.send(bytes).is_ok()
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        debug!("Closing link to {}", self.address);
        self.reader.abort();
        self.writer.abort();
    }
}

/// Read into a fixed buffer and forward every chunk to the session.
async fn read_loop<S: AsyncRead>(
    mut reader: ReadHalf<S>,
    generation: u64,
    buffer_size: usize,
    notify_tx: mpsc::Sender<Notification>,
    link_tx: mpsc::UnboundedSender<LinkEvent<S>>,
) {
    let mut buffer = vec![0u8; buffer_size.max(1)];

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Connection closed by remote");
                let _ = link_tx.send(LinkEvent::Lost {
                    generation,
                    error: None,
                });
                break;
            }
            Ok(length) => {
                debug!("Received {} bytes", length);
                let notification = Notification::DataReceived {
                    bytes: buffer.clone(),
                    length,
                };
                if notify_tx.send(notification).await.is_err() {
                    debug!("Session gone, stopping reader");
                    break;
                }
            }
            Err(e) => {
                error!("Read error: {}", e);
                let _ = link_tx.send(LinkEvent::Lost {
                    generation,
                    error: Some(e.to_string()),
                });
                break;
            }
        }
    }
}

/// Write queued buffers and echo each one back once it is on the wire.
async fn write_loop<S: AsyncWrite>(
    mut writer: WriteHalf<S>,
    generation: u64,
    mut write_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    notify_tx: mpsc::Sender<Notification>,
    link_tx: mpsc::UnboundedSender<LinkEvent<S>>,
) {
    while let Some(bytes) = write_rx.recv().await {
        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                debug!("Sent {} bytes", bytes.len());
                if notify_tx.send(Notification::DataSent(bytes)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Write error: {}", e);
                let _ = link_tx.send(LinkEvent::Lost {
                    generation,
                    error: Some(e.to_string()),
                });
                break;
            }
        }
    }
}
