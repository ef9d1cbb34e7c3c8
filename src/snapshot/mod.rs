// src/snapshot/mod.rs

//! In-memory snapshot of scan data.
//!
//! A [`Snapshot`] is one immutable, fully denormalized copy of the scan
//! pipeline's output: every relation is loaded into forward and reverse
//! lookup maps so the resolver never joins at query time. Snapshots are
//! replaced wholesale by the [`SnapshotStore`]; nothing mutates one after
//! construction.

mod fetch;
mod load;
mod store;

pub use fetch::ArtifactFetcher;
pub use load::load;
pub use store::{RefreshOutcome, SnapshotStore};

use crate::version::{Evr, EvrKey};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

id_type!(
    /// Package name id.
    NameId
);
id_type!(
    /// Package id.
    PkgId
);
id_type!(
    /// EVR tuple id.
    EvrId
);
id_type!(
    /// Architecture id.
    ArchId
);
id_type!(
    /// Repository id.
    RepoId
);
id_type!(
    /// Advisory id.
    AdvisoryId
);
id_type!(
    /// Module stream id.
    StreamId
);
id_type!(
    /// Interned string id (summaries, descriptions).
    StringId
);

/// One package row, fully resolved by ids within the owning snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDetail {
    pub name_id: NameId,
    pub evr_id: EvrId,
    pub arch_id: ArchId,
    pub summary_id: Option<StringId>,
    pub description_id: Option<StringId>,
    pub source_package_id: Option<PkgId>,
}

/// Repository metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDetail {
    pub label: String,
    pub name: String,
    pub url: String,
    pub basearch: Option<String>,
    pub releasever: Option<String>,
    pub product: String,
    pub revision: Option<DateTime<Utc>>,
}

/// A named bundle of fixes: CVEs it addresses, packages that carry the
/// fix, repositories it is published in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryDetail {
    pub name: String,
    pub advisory_type: String,
    pub severity: Option<String>,
    pub cves: Vec<String>,
    pub package_ids: Vec<PkgId>,
    pub repo_ids: HashSet<RepoId>,
}

impl AdvisoryDetail {
    /// Security advisories are those typed `security` or carrying CVEs.
    pub fn is_security(&self) -> bool {
        self.advisory_type == "security" || !self.cves.is_empty()
    }
}

/// A (module, stream) pair as callers enable them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleStream {
    #[serde(rename = "module_name")]
    pub module: String,
    #[serde(rename = "module_stream")]
    pub stream: String,
}

/// Change timestamps embedded in the artifact. `exported` is the version
/// identity used by the store and the convergence protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbChange {
    pub exported: DateTime<Utc>,
    pub last_change: DateTime<Utc>,
}

/// One immutable, versioned, fully denormalized copy of scan data.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub dbchange: Option<DbChange>,

    pub packagename2id: HashMap<String, NameId>,
    pub id2packagename: HashMap<NameId, String>,

    /// name -> package ids ordered by EVR (then arch, then id for
    /// determinism); the resolver walks suffixes of these.
    pub updates: HashMap<NameId, Vec<PkgId>>,
    /// name -> evr -> positions in `updates[name]`.
    pub updates_index: HashMap<NameId, HashMap<EvrId, Vec<usize>>>,

    pub evr2id: HashMap<Evr, EvrId>,
    pub id2evr: HashMap<EvrId, Evr>,
    /// Precomputed order keys, monotonic with the comparator.
    pub evr_keys: HashMap<EvrId, EvrKey>,

    pub arch2id: HashMap<String, ArchId>,
    pub id2arch: HashMap<ArchId, String>,
    pub arch_compat: HashMap<ArchId, HashSet<ArchId>>,

    pub package_details: HashMap<PkgId, PackageDetail>,
    pub nevra2pkgid: HashMap<(NameId, EvrId, ArchId), PkgId>,

    pub repo_details: HashMap<RepoId, RepoDetail>,
    pub repolabel2ids: HashMap<String, Vec<RepoId>>,
    pub pkgid2repoids: HashMap<PkgId, Vec<RepoId>>,
    pub repoid2pkgids: HashMap<RepoId, Vec<PkgId>>,

    pub advisory_details: HashMap<AdvisoryId, AdvisoryDetail>,
    pub advisoryname2id: HashMap<String, AdvisoryId>,
    pub pkgid2advisoryids: HashMap<PkgId, Vec<AdvisoryId>>,
    pub cve2advisoryids: HashMap<String, Vec<AdvisoryId>>,

    pub modulename2streamids: HashMap<(String, String), Vec<StreamId>>,
    pub streamid2pkgids: HashMap<StreamId, HashSet<PkgId>>,
    pub pkgid2streamids: HashMap<PkgId, Vec<StreamId>>,
    pub stream_requires: HashMap<StreamId, HashSet<StreamId>>,

    pub strings: HashMap<StringId, String>,
}

impl Snapshot {
    /// Export timestamp, the version identity of this snapshot.
    pub fn version(&self) -> Option<DateTime<Utc>> {
        self.dbchange.as_ref().map(|c| c.exported)
    }

    /// Format a package id back into its NEVRA string.
    pub fn pkg_nevra(&self, pkg_id: PkgId) -> Option<String> {
        let detail = self.package_details.get(&pkg_id)?;
        let name = self.id2packagename.get(&detail.name_id)?;
        let evr = self.id2evr.get(&detail.evr_id)?;
        let arch = self.id2arch.get(&detail.arch_id)?;
        Some(crate::version::nevra_string(name, evr, arch))
    }

    /// Exact-match repository lookup by label.
    pub fn repo_ids_by_label(&self, label: &str) -> &[RepoId] {
        self.repolabel2ids
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pattern lookup over repository labels. Deliberately a separate
    /// operation from [`Self::repo_ids_by_label`]; callers choose one,
    /// nothing switches behavior on input shape.
    pub fn repo_ids_matching(&self, pattern: &Regex) -> Vec<RepoId> {
        let mut ids: Vec<RepoId> = self
            .repolabel2ids
            .iter()
            .filter(|(label, _)| pattern.is_match(label))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Whether a candidate arch can update a package of the given arch:
    /// identical, or listed in the compatibility relation.
    pub fn arch_compatible(&self, installed: ArchId, candidate: ArchId) -> bool {
        installed == candidate
            || self
                .arch_compat
                .get(&installed)
                .is_some_and(|set| set.contains(&candidate))
    }
}
