// src/convergence/registry.rs

//! Per-round convergence state.
//!
//! The registry is the single owner of connection bookkeeping: which peer
//! plays which role, what version and status each replica last reported,
//! and which version is advertised to observers. It is owned by the
//! protocol server and passed by reference into message handling; there is
//! no ambient global state. Access is serialized behind the server's lock
//! so two replicas reporting `status-ready` concurrently cannot lose an
//! update.

use crate::convergence::Message;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Role a connection is assigned on its first message, fixed for the
/// connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The scan pipeline announcing new snapshot versions.
    Publisher,
    /// A query server holding a snapshot cache.
    Replica,
    /// A readiness watcher (load balancer, deploy gate).
    Observer,
}

/// Replica load progress as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicaStatus {
    #[default]
    Unknown,
    Refreshing,
    Ready,
}

struct Connection {
    /// Short id for log correlation.
    label: String,
    role: Option<Role>,
    sender: UnboundedSender<Message>,
    /// Last version this replica reported having loaded. Forward-only.
    version: Option<DateTime<Utc>>,
    status: ReplicaStatus,
}

/// Connection registry and convergence bookkeeping for the current round.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<u64, Connection>,
    next_id: u64,
    /// Newest snapshot version announced by a Publisher.
    latest_version: Option<DateTime<Utc>>,
    /// Version currently advertised to Observers.
    advertised_version: Option<DateTime<Utc>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id.
    pub fn register(&mut self, label: String, sender: UnboundedSender<Message>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        info!("New connection: {}", label);
        self.connections.insert(
            id,
            Connection {
                label,
                role: None,
                sender,
                version: None,
                status: ReplicaStatus::Unknown,
            },
        );
        id
    }

    /// Remove a connection (disconnect or liveness eviction) and
    /// re-evaluate the barrier: a vanished replica stops counting toward
    /// it for the remainder of the round.
    pub fn disconnect(&mut self, id: u64) {
        if let Some(conn) = self.connections.remove(&id) {
            warn!("Closing connection: {}", conn.label);
            self.evaluate();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn replica_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.role == Some(Role::Replica))
            .count()
    }

    /// Replicas currently reporting `status-ready`.
    pub fn ready_replica_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.role == Some(Role::Replica) && c.status == ReplicaStatus::Ready)
            .count()
    }

    pub fn observer_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.role == Some(Role::Observer))
            .count()
    }

    /// The version Observers are currently told is fleet-wide live.
    pub fn advertised_version(&self) -> Option<DateTime<Utc>> {
        self.advertised_version
    }

    pub fn latest_version(&self) -> Option<DateTime<Utc>> {
        self.latest_version
    }

    /// Handle one frame from a connection. Returns true when this frame
    /// completed a convergence round.
    pub fn handle_message(&mut self, id: u64, message: Message) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        match &conn.role {
            Some(role) => debug!("Received from {:?} ({}): {}", role, conn.label, message),
            None => debug!("Received from unsubscribed client ({}): {}", conn.label, message),
        }

        match (message, conn.role) {
            (Message::SubscribeReposcan, None) => {
                conn.role = Some(Role::Publisher);
                false
            }
            (Message::SubscribeWebapp, None) => {
                conn.role = Some(Role::Replica);
                // A fresh replica joins the round unknown and blocks
                // convergence until it reports.
                self.evaluate();
                false
            }
            (Message::SubscribeListener, None) => {
                conn.role = Some(Role::Observer);
                false
            }
            (
                Message::SubscribeReposcan | Message::SubscribeWebapp | Message::SubscribeListener,
                Some(_),
            ) => {
                warn!("Connection {} attempted to change role, ignoring", conn.label);
                false
            }
            (Message::Version(ts), Some(Role::Publisher)) => {
                match parse_version(&ts) {
                    Some(version) if Some(version) > self.latest_version => {
                        info!("Publisher announced snapshot version {}", ts);
                        self.latest_version = Some(version);
                        self.evaluate()
                    }
                    Some(_) => {
                        debug!("Ignoring non-advancing publisher version {}", ts);
                        false
                    }
                    None => {
                        warn!("Ignoring unparseable publisher version '{}'", ts);
                        false
                    }
                }
            }
            (Message::Version(ts), Some(Role::Replica)) => {
                match parse_version(&ts) {
                    Some(version) if Some(version) > conn.version => {
                        conn.version = Some(version);
                        self.evaluate()
                    }
                    Some(_) => {
                        debug!("Ignoring non-advancing replica version {}", ts);
                        false
                    }
                    None => {
                        warn!("Ignoring unparseable replica version '{}'", ts);
                        false
                    }
                }
            }
            (Message::StatusRefreshing, Some(Role::Replica)) => {
                conn.status = ReplicaStatus::Refreshing;
                false
            }
            (Message::StatusReady, Some(Role::Replica)) => {
                conn.status = ReplicaStatus::Ready;
                self.evaluate()
            }
            (Message::InvalidateCache, Some(Role::Publisher)) => {
                self.start_refresh_round();
                false
            }
            (message, role) => {
                warn!(
                    "Dropping frame '{}' from {:?} connection {}",
                    message, role, conn.label
                );
                false
            }
        }
    }

    /// Publisher started a refresh round: every recorded replica state is
    /// cleared and every connected replica is told to reload.
    fn start_refresh_round(&mut self) {
        let replicas = self.replica_count();
        info!("Refresh round started, notifying {} replicas", replicas);
        for conn in self.connections.values_mut() {
            if conn.role == Some(Role::Replica) {
                conn.version = None;
                conn.status = ReplicaStatus::Unknown;
                send(conn, Message::RefreshCache);
            }
        }
    }

    /// Convergence rule: the advertised version advances to the latest
    /// announced version only once every currently connected replica has
    /// reported that version and `status-ready`. On advance, exactly one
    /// `fleet-converged` goes to every observer.
    fn evaluate(&mut self) -> bool {
        let Some(latest) = self.latest_version else {
            return false;
        };
        if self.advertised_version == Some(latest) {
            return false;
        }

        let mut replicas = 0;
        for conn in self.connections.values() {
            if conn.role != Some(Role::Replica) {
                continue;
            }
            replicas += 1;
            if conn.version != Some(latest) || conn.status != ReplicaStatus::Ready {
                return false;
            }
        }
        if replicas == 0 {
            return false;
        }

        info!(
            "Fleet converged on snapshot version {}, notifying observers",
            latest.to_rfc3339()
        );
        self.advertised_version = Some(latest);
        for conn in self.connections.values_mut() {
            if conn.role == Some(Role::Observer) {
                send(conn, Message::FleetConverged);
            }
        }
        true
    }
}

fn send(conn: &mut Connection, message: Message) {
    // A failed send means the peer is going away; eviction will follow.
    if conn.sender.send(message).is_err() {
        debug!("Connection {} send failed, peer closing", conn.label);
    }
}

fn parse_version(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
