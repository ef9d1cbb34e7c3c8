// src/convergence/server.rs

//! Convergence protocol server.
//!
//! One tokio task per connection; all frames are funneled through the
//! shared [`Registry`] under a single lock. Each connection is pinged on a
//! fixed interval; a peer silent past the pong deadline is presumed dead,
//! disconnected and evicted from the convergence round.

use crate::convergence::{Message, Registry};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

/// Protocol server configuration.
#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Liveness ping interval.
    pub ping_interval: Duration,
    /// Pong deadline as a multiple of the ping interval.
    pub pong_timeout_multiple: u32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8082".to_string(),
            ping_interval: Duration::from_secs(5),
            pong_timeout_multiple: 12,
        }
    }
}

/// The convergence protocol server.
pub struct ConvergenceServer {
    config: ConvergenceConfig,
    registry: Arc<Mutex<Registry>>,
    metrics: Arc<Metrics>,
}

impl ConvergenceServer {
    pub fn new(config: ConvergenceConfig) -> Self {
        Self {
            config,
            registry: Arc::new(Mutex::new(Registry::new())),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Shared registry handle, mainly for introspection and tests.
    pub fn registry(&self) -> Arc<Mutex<Registry>> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Bind and accept connections until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        let (listener, _) = self.bind().await?;
        self.run_on(listener).await
    }

    /// Bind to the configured address and return the actual local address.
    /// Used with port 0 in tests; `run_on` then serves the listener.
    pub async fn bind(&self) -> Result<(TcpListener, std::net::SocketAddr)> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| {
                Error::IoError(format!("Failed to bind {}: {e}", self.config.bind_addr))
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| Error::IoError(e.to_string()))?;
        Ok((listener, addr))
    }

    /// Accept loop over an already bound listener.
    pub async fn run_on(&self, listener: TcpListener) -> Result<()> {
        info!(
            "Convergence server listening on {}",
            listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_default()
        );
        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| Error::IoError(format!("accept failed: {e}")))?;
            debug!("Accepted connection from {}", addr);
            self.metrics.record_connection_opened();

            let registry = Arc::clone(&self.registry);
            let metrics = Arc::clone(&self.metrics);
            let config = self.config.clone();
            tokio::spawn(async move {
                handle_connection(stream, registry, &config).await;
                metrics.record_connection_closed();
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Mutex<Registry>>,
    config: &ConvergenceConfig,
) {
    let label = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, LinesCodec::new());
    let mut writer = FramedWrite::new(write_half, LinesCodec::new());

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = registry.lock().register(label.clone(), tx);

    let pong_deadline = config.ping_interval * config.pong_timeout_multiple;
    let mut ping_timer = tokio::time::interval(config.ping_interval);
    // The first tick fires immediately; skip it so the deadline clock
    // starts from the accept.
    ping_timer.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            line = reader.next() => {
                match line {
                    Some(Ok(line)) => {
                        last_seen = Instant::now();
                        match Message::parse(&line) {
                            Ok(Message::Ping) => {
                                if writer.send(Message::Pong.to_string()).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Message::Pong) => {}
                            Ok(message) => {
                                registry.lock().handle_message(conn_id, message);
                            }
                            Err(e) => warn!("Connection {}: {}", label, e),
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Connection {} read error: {}", label, e);
                        break;
                    }
                    None => break,
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if writer.send(message.to_string()).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_timer.tick() => {
                if last_seen.elapsed() > pong_deadline {
                    warn!(
                        "Connection {} missed pong deadline ({:?}), evicting",
                        label, pong_deadline
                    );
                    break;
                }
                if writer.send(Message::Ping.to_string()).await.is_err() {
                    break;
                }
            }
        }
    }

    registry.lock().disconnect(conn_id);
}
