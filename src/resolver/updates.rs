// src/resolver/updates.rs

//! The update-resolution walk.
//!
//! Resolution is a pure function of one snapshot: parse each input NEVRA,
//! scope the repositories, walk the suffix of the per-name EVR ordering
//! above the input, filter by architecture family and enabled module
//! streams, and attach advisories published in the scoped repositories.

use super::{Update, UpdateDetail, UpdatesRequest, UpdatesResponse};
use crate::snapshot::{AdvisoryId, ModuleStream, PkgId, RepoId, Snapshot, StreamId};
use crate::version::{EvrKey, Nevra};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// One resolved update before formatting.
pub(crate) struct RawUpdate {
    pub pkg_id: PkgId,
    pub advisory_id: AdvisoryId,
    pub repo_id: RepoId,
}

/// Resolve the whole batch. `None` marks an entry whose NEVRA did not
/// parse or does not exist in the snapshot; `Some` entries are known and
/// carry their (possibly empty) update rows.
pub(crate) fn collect(
    snap: &Snapshot,
    req: &UpdatesRequest,
) -> BTreeMap<String, Option<Vec<RawUpdate>>> {
    let explicit_scope = req.repositories.is_some()
        || req.releasever.is_some()
        || req.basearch.is_some();
    let scope = explicit_scope.then(|| repo_scope(snap, req));

    let module_constrained = req.modules.is_some();
    let enabled_streams = enabled_streams(snap, req.modules.as_deref());

    let parsed: Vec<(&str, Option<Nevra>)> = req
        .packages
        .iter()
        .map(|p| {
            let nevra = match Nevra::parse(p) {
                Ok(n) => Some(n),
                Err(e) => {
                    debug!("Skipping input entry: {}", e);
                    None
                }
            };
            (p.as_str(), nevra)
        })
        .collect();

    // latest_only keeps, per name, only the inputs at the highest EVR.
    let latest: Option<HashMap<&str, EvrKey>> = req.latest_only.then(|| {
        let mut newest: HashMap<&str, EvrKey> = HashMap::new();
        for (_, nevra) in &parsed {
            if let Some(nevra) = nevra {
                let key = nevra.evr().key();
                newest
                    .entry(nevra.name.as_str())
                    .and_modify(|cur| {
                        if key > *cur {
                            *cur = key.clone();
                        }
                    })
                    .or_insert(key);
            }
        }
        newest
    });

    let mut result = BTreeMap::new();
    for (input, nevra) in &parsed {
        let entry = nevra.as_ref().and_then(|nevra| {
            if let Some(newest) = &latest {
                if newest.get(nevra.name.as_str()).is_some_and(|k| nevra.evr().key() < *k) {
                    return None;
                }
            }
            resolve_one(
                snap,
                nevra,
                scope.as_ref(),
                module_constrained,
                &enabled_streams,
                req.security_only,
            )
        });
        result.insert(input.to_string(), entry);
    }
    result
}

/// Candidate repository scope from explicit filters: label list narrowed
/// by releasever, then basearch. A repo without its own releasever or
/// basearch matches when the value appears in its URL.
fn repo_scope(snap: &Snapshot, req: &UpdatesRequest) -> HashSet<RepoId> {
    let mut ids: HashSet<RepoId> = match &req.repositories {
        Some(labels) => labels
            .iter()
            .flat_map(|label| snap.repo_ids_by_label(label).iter().copied())
            .collect(),
        None => snap.repo_details.keys().copied().collect(),
    };

    if let Some(releasever) = &req.releasever {
        ids.retain(|id| {
            let detail = &snap.repo_details[id];
            match &detail.releasever {
                Some(v) => v == releasever,
                None => detail.url.contains(releasever.as_str()),
            }
        });
    }

    if let Some(basearch) = &req.basearch {
        ids.retain(|id| {
            let detail = &snap.repo_details[id];
            match &detail.basearch {
                Some(v) => v == basearch,
                None => detail.url.contains(basearch.as_str()),
            }
        });
    }

    ids
}

/// Stream ids enabled by the caller, restricted to streams whose
/// requirements are all themselves enabled.
fn enabled_streams(snap: &Snapshot, modules: Option<&[ModuleStream]>) -> HashSet<StreamId> {
    let Some(modules) = modules else {
        return HashSet::new();
    };
    let mut ids: HashSet<StreamId> = HashSet::new();
    for m in modules {
        if let Some(stream_ids) = snap
            .modulename2streamids
            .get(&(m.module.clone(), m.stream.clone()))
        {
            ids.extend(stream_ids.iter().copied());
        }
    }
    ids.iter()
        .copied()
        .filter(|sid| {
            snap.stream_requires
                .get(sid)
                .is_none_or(|requires| requires.is_subset(&ids))
        })
        .collect()
}

fn resolve_one(
    snap: &Snapshot,
    nevra: &Nevra,
    scope: Option<&HashSet<RepoId>>,
    module_constrained: bool,
    enabled_streams: &HashSet<StreamId>,
    security_only: bool,
) -> Option<Vec<RawUpdate>> {
    let name_id = *snap.packagename2id.get(&nevra.name)?;
    let evr_id = *snap.evr2id.get(&nevra.evr())?;
    let arch_id = *snap.arch2id.get(&nevra.arch)?;
    let current_pkg = *snap.nevra2pkgid.get(&(name_id, evr_id, arch_id))?;

    let order = snap.updates.get(&name_id)?;
    let positions = snap.updates_index.get(&name_id)?.get(&evr_id)?;
    let start = positions.last().copied()? + 1;
    let current_key = &snap.evr_keys[&evr_id];

    // Without explicit filters the scope is exactly the repos this
    // package is published in, not all repos.
    let own_repos: HashSet<RepoId>;
    let candidate_repos: &HashSet<RepoId> = match scope {
        Some(s) => s,
        None => {
            own_repos = pkg_repos(snap, current_pkg);
            &own_repos
        }
    };

    let mut rows = Vec::new();
    for &candidate in &order[start..] {
        let detail = &snap.package_details[&candidate];
        if snap.evr_keys[&detail.evr_id] <= *current_key {
            // Positions are EVR-sorted, but distinct EVR ids can share an
            // order key; candidates must compare strictly greater.
            continue;
        }
        if !snap.arch_compatible(arch_id, detail.arch_id) {
            continue;
        }
        if let Some(streams) = snap.pkgid2streamids.get(&candidate) {
            if module_constrained && !streams.iter().any(|s| enabled_streams.contains(s)) {
                continue;
            }
        }

        let cand_repos: Vec<RepoId> = snap
            .pkgid2repoids
            .get(&candidate)
            .into_iter()
            .flatten()
            .filter(|r| candidate_repos.contains(r))
            .copied()
            .collect();
        if cand_repos.is_empty() {
            continue;
        }

        let Some(advisory_ids) = snap.pkgid2advisoryids.get(&candidate) else {
            continue;
        };
        for &advisory_id in advisory_ids {
            let advisory = &snap.advisory_details[&advisory_id];
            if security_only && !advisory.is_security() {
                continue;
            }
            for &repo_id in &cand_repos {
                if advisory.repo_ids.contains(&repo_id) {
                    rows.push(RawUpdate {
                        pkg_id: candidate,
                        advisory_id,
                        repo_id,
                    });
                }
            }
        }
    }

    sort_rows(snap, &mut rows);
    Some(rows)
}

fn pkg_repos(snap: &Snapshot, pkg_id: PkgId) -> HashSet<RepoId> {
    snap.pkgid2repoids
        .get(&pkg_id)
        .into_iter()
        .flatten()
        .copied()
        .collect()
}

/// Stable row ordering for reproducible pagination: EVR key, then arch,
/// then erratum, then repository label. Not semantically meaningful.
fn sort_rows(snap: &Snapshot, rows: &mut [RawUpdate]) {
    rows.sort_by(|a, b| {
        let da = &snap.package_details[&a.pkg_id];
        let db = &snap.package_details[&b.pkg_id];
        snap.evr_keys[&da.evr_id]
            .cmp(&snap.evr_keys[&db.evr_id])
            .then_with(|| snap.id2arch[&da.arch_id].cmp(&snap.id2arch[&db.arch_id]))
            .then_with(|| {
                snap.advisory_details[&a.advisory_id]
                    .name
                    .cmp(&snap.advisory_details[&b.advisory_id].name)
            })
            .then_with(|| {
                snap.repo_details[&a.repo_id]
                    .label
                    .cmp(&snap.repo_details[&b.repo_id].label)
            })
    });
}

/// The updates view: full rows per input package.
pub fn updates(snap: &Snapshot, req: &UpdatesRequest) -> UpdatesResponse {
    let collected = collect(snap, req);

    let mut update_list = BTreeMap::new();
    for (input, entry) in collected {
        let detail = match entry {
            None => UpdateDetail::default(),
            Some(rows) => UpdateDetail {
                available_updates: Some(
                    rows.iter()
                        .map(|row| {
                            let repo = &snap.repo_details[&row.repo_id];
                            Update {
                                package: snap.pkg_nevra(row.pkg_id).unwrap_or_default(),
                                erratum: snap.advisory_details[&row.advisory_id].name.clone(),
                                repository: repo.label.clone(),
                                basearch: repo.basearch.clone().unwrap_or_default(),
                                releasever: repo.releasever.clone().unwrap_or_default(),
                            }
                        })
                        .collect(),
                ),
            },
        };
        update_list.insert(input, detail);
    }

    UpdatesResponse {
        update_list,
        repository_list: req.repositories.clone(),
        releasever: req.releasever.clone(),
        basearch: req.basearch.clone(),
        modules: req.modules.clone(),
        last_change: snap.dbchange.as_ref().map(|c| c.last_change),
    }
}
