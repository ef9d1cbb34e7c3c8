// src/resolver/mod.rs

//! Update resolution over a snapshot.
//!
//! Three views share one resolution walk: [`updates`] lists candidate
//! packages with their advisories and repositories, [`vulnerabilities`]
//! follows those advisories to deduplicated CVEs, and [`patches`] returns
//! advisory names only. All views are batch-oriented: a malformed or
//! unknown input entry yields an empty per-entry result and never fails
//! the batch.

mod updates;
mod vulnerabilities;

pub use updates::updates;
pub use vulnerabilities::{patches, vulnerabilities};

use crate::snapshot::ModuleStream;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolver request, shared by all three views.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatesRequest {
    #[serde(rename = "package_list")]
    pub packages: Vec<String>,

    /// Repository labels to restrict candidates to. Absent means "the
    /// repositories each input package itself is published in".
    #[serde(rename = "repository_list", default)]
    pub repositories: Option<Vec<String>>,

    #[serde(default)]
    pub releasever: Option<String>,

    #[serde(default)]
    pub basearch: Option<String>,

    /// Enabled module streams. Absent means the caller is non-modular and
    /// module membership is not filtered at all.
    #[serde(rename = "modules_list", default)]
    pub modules: Option<Vec<ModuleStream>>,

    /// Keep only advisories typed `security` or carrying CVEs.
    #[serde(default)]
    pub security_only: bool,

    /// Pre-filter the input list to the latest EVR per package name.
    #[serde(default)]
    pub latest_only: bool,
}

impl UpdatesRequest {
    pub fn for_packages(packages: Vec<String>) -> Self {
        Self {
            packages,
            ..Self::default()
        }
    }
}

/// One available update row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    pub package: String,
    pub erratum: String,
    pub repository: String,
    pub basearch: String,
    pub releasever: String,
}

/// Per-input-package result. An unknown or unparseable input serializes
/// as `{}`; a known package always carries `available_updates`, possibly
/// empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_updates: Option<Vec<Update>>,
}

/// Response for the updates view: one entry per input string.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatesResponse {
    pub update_list: BTreeMap<String, UpdateDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub releasever: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basearch: Option<String>,
    #[serde(rename = "modules_list", skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ModuleStream>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<DateTime<Utc>>,
}

/// Response for the vulnerabilities view: deduplicated CVE names across
/// the whole batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VulnerabilitiesResponse {
    pub cve_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<DateTime<Utc>>,
}

/// Response for the patches view: deduplicated advisory names across the
/// whole batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatchesResponse {
    pub errata_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<DateTime<Utc>>,
}
