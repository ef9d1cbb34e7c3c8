// src/snapshot/load.rs

//! Snapshot artifact loading.
//!
//! The artifact is a single SQLite file holding every relation the cache
//! needs. Loading reads it wholesale, builds the forward and reverse maps,
//! derives the per-name EVR ordering, and validates that every id resolves
//! within the artifact. Any failure aborts the load with
//! [`Error::CorruptArtifact`]; a half-built snapshot is never returned.

use crate::error::{Error, Result};
use crate::snapshot::{
    AdvisoryDetail, AdvisoryId, ArchId, DbChange, EvrId, NameId, PackageDetail, PkgId,
    RepoDetail, RepoId, Snapshot, StreamId, StringId,
};
use crate::version::Evr;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

fn parse_ts(value: &str, context: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::CorruptArtifact(format!("invalid timestamp in {context}: {e}")))
}

fn opt_string_id(raw: Option<i64>) -> Option<StringId> {
    raw.map(|v| StringId(v as u32))
}

/// Load a snapshot artifact from disk.
pub fn load(path: &Path) -> Result<Snapshot> {
    info!("Loading snapshot artifact from {:?}", path);
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| Error::CorruptArtifact(format!("cannot open artifact {path:?}: {e}")))?;

    let mut snapshot = Snapshot::default();

    load_relations(&conn, &mut snapshot)?;
    validate(&snapshot)?;
    build_updates(&mut snapshot);

    let version = snapshot
        .version()
        .ok_or_else(|| Error::CorruptArtifact("artifact has no dbchange row".to_string()))?;
    info!(
        "Loaded snapshot version {} ({} packages, {} repos, {} advisories)",
        version.to_rfc3339(),
        snapshot.package_details.len(),
        snapshot.repo_details.len(),
        snapshot.advisory_details.len()
    );
    Ok(snapshot)
}

fn load_relations(conn: &Connection, snap: &mut Snapshot) -> Result<()> {
    let mut stmt = conn.prepare("SELECT id, arch FROM arch")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (id, arch) = row?;
        let id = ArchId(id as u32);
        snap.id2arch.insert(id, arch.clone());
        snap.arch2id.insert(arch, id);
    }

    let mut stmt = conn.prepare("SELECT from_arch_id, to_arch_id FROM arch_compat")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (from, to) = row?;
        snap.arch_compat
            .entry(ArchId(from as u32))
            .or_default()
            .insert(ArchId(to as u32));
    }

    let mut stmt = conn.prepare("SELECT id, string FROM string")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (id, s) = row?;
        snap.strings.insert(StringId(id as u32), s);
    }

    let mut stmt = conn.prepare("SELECT id, packagename FROM packagename")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (id, name) = row?;
        let id = NameId(id as u32);
        snap.id2packagename.insert(id, name.clone());
        snap.packagename2id.insert(name, id);
    }

    let mut stmt = conn.prepare("SELECT id, epoch, version, release FROM evr")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (id, epoch, version, release) = row?;
        let id = EvrId(id as u32);
        let evr = Evr::new(epoch.max(0) as u64, version, release);
        snap.evr_keys.insert(id, evr.key());
        snap.evr2id.insert(evr.clone(), id);
        snap.id2evr.insert(id, evr);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name_id, evr_id, arch_id, summary_id, description_id, source_package_id
         FROM package_detail",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, i64>(3)?,
            r.get::<_, Option<i64>>(4)?,
            r.get::<_, Option<i64>>(5)?,
            r.get::<_, Option<i64>>(6)?,
        ))
    })?;
    for row in rows {
        let (id, name_id, evr_id, arch_id, summary_id, description_id, src_pkg_id) = row?;
        let id = PkgId(id as u32);
        let detail = PackageDetail {
            name_id: NameId(name_id as u32),
            evr_id: EvrId(evr_id as u32),
            arch_id: ArchId(arch_id as u32),
            summary_id: opt_string_id(summary_id),
            description_id: opt_string_id(description_id),
            source_package_id: src_pkg_id.map(|v| PkgId(v as u32)),
        };
        snap.nevra2pkgid
            .insert((detail.name_id, detail.evr_id, detail.arch_id), id);
        snap.package_details.insert(id, detail);
    }

    let mut stmt = conn.prepare(
        "SELECT id, label, name, url, basearch, releasever, product, revision FROM repo_detail",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, Option<String>>(7)?,
        ))
    })?;
    for row in rows {
        let (id, label, name, url, basearch, releasever, product, revision) = row?;
        let id = RepoId(id as u32);
        let revision = match revision {
            Some(raw) => Some(parse_ts(&raw, "repo_detail.revision")?),
            None => None,
        };
        snap.repolabel2ids.entry(label.clone()).or_default().push(id);
        snap.repo_details.insert(
            id,
            RepoDetail {
                label,
                name,
                url,
                basearch,
                releasever,
                product,
                revision,
            },
        );
    }

    let mut stmt = conn.prepare("SELECT pkg_id, repo_id FROM pkg_repo")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (pkg_id, repo_id) = row?;
        let pkg_id = PkgId(pkg_id as u32);
        let repo_id = RepoId(repo_id as u32);
        snap.pkgid2repoids.entry(pkg_id).or_default().push(repo_id);
        snap.repoid2pkgids.entry(repo_id).or_default().push(pkg_id);
    }

    let mut advisory_cves: HashMap<AdvisoryId, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT advisory_id, cve FROM advisory_cve")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (advisory_id, cve) = row?;
        let advisory_id = AdvisoryId(advisory_id as u32);
        advisory_cves.entry(advisory_id).or_default().push(cve.clone());
        snap.cve2advisoryids.entry(cve).or_default().push(advisory_id);
    }

    let mut advisory_pkgs: HashMap<AdvisoryId, Vec<PkgId>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT pkg_id, advisory_id FROM pkg_advisory")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (pkg_id, advisory_id) = row?;
        let pkg_id = PkgId(pkg_id as u32);
        let advisory_id = AdvisoryId(advisory_id as u32);
        snap.pkgid2advisoryids
            .entry(pkg_id)
            .or_default()
            .push(advisory_id);
        advisory_pkgs.entry(advisory_id).or_default().push(pkg_id);
    }

    let mut advisory_repos: HashMap<AdvisoryId, Vec<RepoId>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT advisory_id, repo_id FROM advisory_repo")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (advisory_id, repo_id) = row?;
        advisory_repos
            .entry(AdvisoryId(advisory_id as u32))
            .or_default()
            .push(RepoId(repo_id as u32));
    }

    let mut stmt =
        conn.prepare("SELECT id, name, advisory_type, severity FROM advisory_detail")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, Option<String>>(3)?,
        ))
    })?;
    for row in rows {
        let (id, name, advisory_type, severity) = row?;
        let id = AdvisoryId(id as u32);
        snap.advisoryname2id.insert(name.clone(), id);
        snap.advisory_details.insert(
            id,
            AdvisoryDetail {
                name,
                advisory_type,
                severity,
                cves: advisory_cves.remove(&id).unwrap_or_default(),
                package_ids: advisory_pkgs.remove(&id).unwrap_or_default(),
                repo_ids: advisory_repos.remove(&id).unwrap_or_default().into_iter().collect(),
            },
        );
    }

    let mut stmt = conn.prepare("SELECT id, module, stream FROM module_stream")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
        ))
    })?;
    for row in rows {
        let (id, module, stream) = row?;
        snap.modulename2streamids
            .entry((module, stream))
            .or_default()
            .push(StreamId(id as u32));
    }

    let mut stmt = conn.prepare("SELECT stream_id, require_id FROM module_stream_require")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (stream_id, require_id) = row?;
        snap.stream_requires
            .entry(StreamId(stream_id as u32))
            .or_default()
            .insert(StreamId(require_id as u32));
    }

    let mut stmt = conn.prepare("SELECT stream_id, pkg_id FROM module_stream_pkg")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
    for row in rows {
        let (stream_id, pkg_id) = row?;
        let stream_id = StreamId(stream_id as u32);
        let pkg_id = PkgId(pkg_id as u32);
        snap.streamid2pkgids
            .entry(stream_id)
            .or_default()
            .insert(pkg_id);
        snap.pkgid2streamids
            .entry(pkg_id)
            .or_default()
            .push(stream_id);
    }

    let mut stmt = conn.prepare("SELECT exported, last_change FROM dbchange")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (exported, last_change) = row?;
        snap.dbchange = Some(DbChange {
            exported: parse_ts(&exported, "dbchange.exported")?,
            last_change: parse_ts(&last_change, "dbchange.last_change")?,
        });
    }

    Ok(())
}

/// Derive the per-name EVR ordering and its index. Packages of one name
/// are sorted by EVR key (arch, then id break ties for determinism);
/// `updates_index` maps each EVR back to its positions in that order.
fn build_updates(snap: &mut Snapshot) {
    let mut by_name: HashMap<NameId, Vec<PkgId>> = HashMap::new();
    for (pkg_id, detail) in &snap.package_details {
        by_name.entry(detail.name_id).or_default().push(*pkg_id);
    }

    for (name_id, mut pkg_ids) in by_name {
        pkg_ids.sort_by(|a, b| {
            let da = &snap.package_details[a];
            let db = &snap.package_details[b];
            snap.evr_keys[&da.evr_id]
                .cmp(&snap.evr_keys[&db.evr_id])
                .then(da.arch_id.cmp(&db.arch_id))
                .then(a.cmp(b))
        });

        let mut index: HashMap<EvrId, Vec<usize>> = HashMap::new();
        for (pos, pkg_id) in pkg_ids.iter().enumerate() {
            let evr_id = snap.package_details[pkg_id].evr_id;
            index.entry(evr_id).or_default().push(pos);
        }

        snap.updates.insert(name_id, pkg_ids);
        snap.updates_index.insert(name_id, index);
    }
}

/// Intra-snapshot id closure: every reference resolves within this
/// snapshot. A dangling id marks the artifact corrupt.
fn validate(snap: &Snapshot) -> Result<()> {
    for (pkg_id, detail) in &snap.package_details {
        if !snap.id2packagename.contains_key(&detail.name_id) {
            return Err(dangling("package", pkg_id.0, "name_id", detail.name_id.0));
        }
        if !snap.id2evr.contains_key(&detail.evr_id) {
            return Err(dangling("package", pkg_id.0, "evr_id", detail.evr_id.0));
        }
        if !snap.id2arch.contains_key(&detail.arch_id) {
            return Err(dangling("package", pkg_id.0, "arch_id", detail.arch_id.0));
        }
        for string_id in [detail.summary_id, detail.description_id].into_iter().flatten() {
            if !snap.strings.contains_key(&string_id) {
                return Err(dangling("package", pkg_id.0, "string_id", string_id.0));
            }
        }
        if let Some(src) = detail.source_package_id {
            if !snap.package_details.contains_key(&src) {
                return Err(dangling("package", pkg_id.0, "source_package_id", src.0));
            }
        }
    }

    for (pkg_id, repo_ids) in &snap.pkgid2repoids {
        if !snap.package_details.contains_key(pkg_id) {
            return Err(dangling("pkg_repo", pkg_id.0, "pkg_id", pkg_id.0));
        }
        for repo_id in repo_ids {
            if !snap.repo_details.contains_key(repo_id) {
                return Err(dangling("pkg_repo", pkg_id.0, "repo_id", repo_id.0));
            }
        }
    }

    for (advisory_id, detail) in &snap.advisory_details {
        for pkg_id in &detail.package_ids {
            if !snap.package_details.contains_key(pkg_id) {
                return Err(dangling("advisory", advisory_id.0, "pkg_id", pkg_id.0));
            }
        }
        for repo_id in &detail.repo_ids {
            if !snap.repo_details.contains_key(repo_id) {
                return Err(dangling("advisory", advisory_id.0, "repo_id", repo_id.0));
            }
        }
    }

    for (pkg_id, advisory_ids) in &snap.pkgid2advisoryids {
        if !snap.package_details.contains_key(pkg_id) {
            return Err(dangling("pkg_advisory", pkg_id.0, "pkg_id", pkg_id.0));
        }
        for advisory_id in advisory_ids {
            if !snap.advisory_details.contains_key(advisory_id) {
                return Err(dangling("pkg_advisory", pkg_id.0, "advisory_id", advisory_id.0));
            }
        }
    }

    for (stream_id, pkg_ids) in &snap.streamid2pkgids {
        for pkg_id in pkg_ids {
            if !snap.package_details.contains_key(pkg_id) {
                return Err(dangling("module_stream", stream_id.0, "pkg_id", pkg_id.0));
            }
        }
    }

    for advisory_ids in snap.cve2advisoryids.values() {
        for advisory_id in advisory_ids {
            if !snap.advisory_details.contains_key(advisory_id) {
                return Err(Error::CorruptArtifact(format!(
                    "advisory_cve references missing advisory {}",
                    advisory_id.0
                )));
            }
        }
    }

    Ok(())
}

fn dangling(entity: &str, id: u32, field: &str, target: u32) -> Error {
    Error::CorruptArtifact(format!("{entity} {id} references missing {field} {target}"))
}
