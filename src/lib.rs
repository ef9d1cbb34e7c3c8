// src/lib.rs

//! Advisor
//!
//! Answers, for an installed package set, whether newer packages exist and
//! which advisories and CVEs they remediate, constrained by enabled
//! repositories and module streams.
//!
//! # Architecture
//!
//! - Snapshot cache: one immutable, versioned, fully denormalized copy of
//!   scan data per process, replaced wholesale by atomic pointer swap
//! - Resolver: pure batch resolution over one snapshot, EVR-ordered
//! - Convergence protocol: keeps a replica fleet advertising a single
//!   data version during rolling reloads

pub mod config;
pub mod convergence;
mod error;
pub mod metrics;
pub mod resolver;
pub mod snapshot;
pub mod version;

pub use config::AdvisorConfig;
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use resolver::{
    PatchesResponse, Update, UpdateDetail, UpdatesRequest, UpdatesResponse,
    VulnerabilitiesResponse,
};
pub use snapshot::{ArtifactFetcher, RefreshOutcome, Snapshot, SnapshotStore};
pub use version::{Evr, EvrKey, Nevra, compare_evr, compare_version};
