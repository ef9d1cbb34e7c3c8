// src/convergence/message.rs

//! Protocol frames.
//!
//! The convergence protocol is newline-delimited text over a persistent
//! bidirectional connection. Every frame is one line.

use crate::error::{Error, Result};
use std::fmt;

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client declares itself the scan pipeline (Publisher).
    SubscribeReposcan,
    /// Client declares itself a query replica.
    SubscribeWebapp,
    /// Client declares itself a readiness watcher (Observer).
    SubscribeListener,
    /// Publisher: a snapshot with this export timestamp exists.
    /// Replica: finished loading the snapshot with this timestamp.
    Version(String),
    /// Replica is reloading its snapshot.
    StatusRefreshing,
    /// Replica serves a fully loaded snapshot.
    StatusReady,
    /// Publisher starts a refresh round.
    InvalidateCache,
    /// Server tells a Replica to reload.
    RefreshCache,
    /// Server tells Observers the whole fleet serves the latest version.
    FleetConverged,
    /// Liveness probe.
    Ping,
    /// Liveness reply.
    Pong,
}

impl Message {
    /// Parse one frame. Unknown frames are a parse error; the server logs
    /// and drops them without closing the connection.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        match line {
            "subscribe-reposcan" => Ok(Message::SubscribeReposcan),
            "subscribe-webapp" => Ok(Message::SubscribeWebapp),
            "subscribe-listener" => Ok(Message::SubscribeListener),
            "status-refreshing" => Ok(Message::StatusRefreshing),
            "status-ready" => Ok(Message::StatusReady),
            "invalidate-cache" => Ok(Message::InvalidateCache),
            "refresh-cache" => Ok(Message::RefreshCache),
            "fleet-converged" => Ok(Message::FleetConverged),
            "ping" => Ok(Message::Ping),
            "pong" => Ok(Message::Pong),
            _ => match line.split_once(' ') {
                Some(("version", ts)) if !ts.trim().is_empty() => {
                    Ok(Message::Version(ts.trim().to_string()))
                }
                _ => Err(Error::ParseError(format!("unknown protocol frame '{line}'"))),
            },
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::SubscribeReposcan => write!(f, "subscribe-reposcan"),
            Message::SubscribeWebapp => write!(f, "subscribe-webapp"),
            Message::SubscribeListener => write!(f, "subscribe-listener"),
            Message::Version(ts) => write!(f, "version {ts}"),
            Message::StatusRefreshing => write!(f, "status-refreshing"),
            Message::StatusReady => write!(f, "status-ready"),
            Message::InvalidateCache => write!(f, "invalidate-cache"),
            Message::RefreshCache => write!(f, "refresh-cache"),
            Message::FleetConverged => write!(f, "fleet-converged"),
            Message::Ping => write!(f, "ping"),
            Message::Pong => write!(f, "pong"),
        }
    }
}
