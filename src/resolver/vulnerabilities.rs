// src/resolver/vulnerabilities.rs

//! CVE and patch views over the resolution walk.

use super::updates::collect;
use super::{PatchesResponse, UpdatesRequest, VulnerabilitiesResponse};
use crate::snapshot::Snapshot;
use std::collections::BTreeSet;

/// The vulnerabilities view: advisories attached to available updates,
/// followed to their CVE sets and deduplicated.
pub fn vulnerabilities(snap: &Snapshot, req: &UpdatesRequest) -> VulnerabilitiesResponse {
    let collected = collect(snap, req);

    let mut cves = BTreeSet::new();
    for rows in collected.values().flatten() {
        for row in rows {
            let advisory = &snap.advisory_details[&row.advisory_id];
            cves.extend(advisory.cves.iter().cloned());
        }
    }

    VulnerabilitiesResponse {
        cve_list: cves.into_iter().collect(),
        last_change: snap.dbchange.as_ref().map(|c| c.last_change),
    }
}

/// The patches view: advisory names only, deduplicated.
pub fn patches(snap: &Snapshot, req: &UpdatesRequest) -> PatchesResponse {
    let collected = collect(snap, req);

    let mut errata = BTreeSet::new();
    for rows in collected.values().flatten() {
        for row in rows {
            errata.insert(snap.advisory_details[&row.advisory_id].name.clone());
        }
    }

    PatchesResponse {
        errata_list: errata.into_iter().collect(),
        last_change: snap.dbchange.as_ref().map(|c| c.last_change),
    }
}
