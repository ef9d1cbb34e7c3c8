// src/convergence/client.rs

//! Replica-side protocol client.
//!
//! The agent owns the replica's end of the convergence protocol: it
//! subscribes, reports the version of the snapshot it serves, and runs a
//! cache refresh whenever the server asks for one. Query traffic never
//! waits on this loop; the refresh happens through the store's own
//! out-of-band reload path.

use crate::convergence::Message;
use crate::error::{Error, Result};
use crate::snapshot::{ArtifactFetcher, RefreshOutcome, SnapshotStore};
use chrono::SecondsFormat;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{info, warn};

/// Persistent replica agent with reconnect.
pub struct ReplicaAgent {
    server_addr: String,
    store: Arc<SnapshotStore>,
    fetcher: Arc<ArtifactFetcher>,
    reconnect_delay: Duration,
}

impl ReplicaAgent {
    pub fn new(
        server_addr: impl Into<String>,
        store: Arc<SnapshotStore>,
        fetcher: Arc<ArtifactFetcher>,
    ) -> Self {
        Self {
            server_addr: server_addr.into(),
            store,
            fetcher,
            reconnect_delay: Duration::from_secs(2),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Connect-and-serve loop; reconnects with a fixed delay whenever the
    /// connection drops.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.session().await {
                Ok(()) => info!("Convergence connection closed, reconnecting"),
                Err(e) => warn!("Cannot serve convergence connection: {}. Trying again.", e),
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One protocol session over one connection.
    pub async fn session(&self) -> Result<()> {
        let stream = TcpStream::connect(&self.server_addr)
            .await
            .map_err(|e| Error::ConnectionLost(format!("{}: {e}", self.server_addr)))?;
        info!("Connected to convergence server at {}", self.server_addr);

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, LinesCodec::new());
        let mut writer = FramedWrite::new(write_half, LinesCodec::new());

        // Refresh tasks report back through this channel so the read loop
        // keeps answering pings while a reload runs.
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        send(&mut writer, Message::SubscribeWebapp).await?;
        // Report version before status so the server does not immediately
        // send a refresh for a snapshot we already serve.
        if let Some(version) = self.store.version() {
            send(&mut writer, version_message(version)).await?;
        }
        send(&mut writer, Message::StatusReady).await?;

        loop {
            tokio::select! {
                line = reader.next() => {
                    let line = match line {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => {
                            return Err(Error::ConnectionLost(format!("read error: {e}")));
                        }
                        None => return Ok(()),
                    };
                    match Message::parse(&line) {
                        Ok(Message::Ping) => send(&mut writer, Message::Pong).await?,
                        Ok(Message::Pong) => {}
                        Ok(Message::RefreshCache) => self.spawn_refresh(tx.clone()),
                        Ok(message) => warn!("Unexpected server frame: {}", message),
                        Err(e) => warn!("{}", e),
                    }
                }
                Some(message) = rx.recv() => {
                    send(&mut writer, message).await?;
                }
            }
        }
    }

    /// Run the cache refresh out-of-band and report progress back over
    /// the connection: refreshing, then the loaded version, then ready.
    fn spawn_refresh(&self, tx: mpsc::UnboundedSender<Message>) {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        tokio::spawn(async move {
            info!("Starting cached data refresh");
            let _ = tx.send(Message::StatusRefreshing);

            match store.refresh(&fetcher).await {
                Ok(RefreshOutcome::Refreshed(version)) => {
                    info!("Cached data refreshed to {}", version.to_rfc3339());
                }
                Ok(RefreshOutcome::AlreadyInProgress) => {
                    warn!("Cached data refresh already in progress");
                    return;
                }
                Err(e) => warn!("Cached data refresh failed: {}", e),
            }

            // Report whatever version is live now; after a failed refresh
            // that is still the previous snapshot.
            if let Some(version) = store.version() {
                let _ = tx.send(version_message(version));
            }
            let _ = tx.send(Message::StatusReady);
        });
    }
}

fn version_message(version: chrono::DateTime<chrono::Utc>) -> Message {
    Message::Version(version.to_rfc3339_opts(SecondsFormat::Secs, true))
}

async fn send(
    writer: &mut FramedWrite<tokio::net::tcp::OwnedWriteHalf, LinesCodec>,
    message: Message,
) -> Result<()> {
    writer
        .send(message.to_string())
        .await
        .map_err(|e| Error::ConnectionLost(format!("write failed: {e}")))
}

/// One-shot publisher notification: announce a new snapshot version and
/// start a refresh round. Used by the scan pipeline side and the CLI.
pub async fn publish_version(
    server_addr: &str,
    version: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    let stream = TcpStream::connect(server_addr)
        .await
        .map_err(|e| Error::ConnectionLost(format!("{server_addr}: {e}")))?;
    let (_read_half, write_half) = stream.into_split();
    let mut writer = FramedWrite::new(write_half, LinesCodec::new());

    send(&mut writer, Message::SubscribeReposcan).await?;
    send(&mut writer, version_message(version)).await?;
    // send() flushes each frame; the connection closes on drop.
    send(&mut writer, Message::InvalidateCache).await?;
    Ok(())
}
