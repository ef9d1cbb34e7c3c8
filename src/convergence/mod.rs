// src/convergence/mod.rs

//! Replica convergence protocol.
//!
//! Keeps a fleet of stateless query replicas consistently advertising one
//! data version during rolling snapshot reloads. The server tracks every
//! connected replica's reported version and load status; the version
//! advertised to observers only advances once the whole fleet has loaded
//! it, so downstream gating is never told "new data is live" while any
//! replica still serves stale answers.

mod client;
mod message;
mod registry;
mod server;

pub use client::{ReplicaAgent, publish_version};
pub use message::Message;
pub use registry::{Registry, ReplicaStatus, Role};
pub use server::{ConvergenceConfig, ConvergenceServer};
