// tests/resolver.rs

//! Resolver behavior against a real artifact: repo scoping, module
//! stream gating, advisory attachment and the batch error contract.

mod common;

use advisor::UpdatesRequest;
use advisor::resolver;
use advisor::snapshot::{ModuleStream, Snapshot};

fn snapshot() -> Snapshot {
    let (_dir, path) = common::artifact();
    advisor::snapshot::load(&path).unwrap()
}

fn request(packages: &[&str]) -> UpdatesRequest {
    UpdatesRequest::for_packages(packages.iter().map(|s| s.to_string()).collect())
}

#[test]
fn test_update_found_in_own_repo() {
    let snap = snapshot();
    let resp = resolver::updates(&snap, &request(&["mypkg-1.0-1.x86_64"]));

    let detail = &resp.update_list["mypkg-1.0-1.x86_64"];
    let updates = detail.available_updates.as_ref().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].package, "mypkg-2.0-1.x86_64");
    assert_eq!(updates[0].erratum, "ADV-2024-1");
    assert_eq!(updates[0].repository, "my-repo");
    assert_eq!(updates[0].basearch, "x86_64");
    assert_eq!(updates[0].releasever, "8");
}

#[test]
fn test_absent_filters_mean_own_repos_not_all_repos() {
    let snap = snapshot();
    // mypkg-3.0 exists only in other-repo; the input lives in my-repo, so
    // without filters the 3.0 candidate is out of scope.
    let resp = resolver::updates(&snap, &request(&["mypkg-1.0-1.x86_64"]));
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert!(updates.iter().all(|u| u.repository == "my-repo"));
}

#[test]
fn test_explicit_repository_filter() {
    let snap = snapshot();
    let mut req = request(&["mypkg-1.0-1.x86_64"]);
    req.repositories = Some(vec!["other-repo".to_string()]);

    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].package, "mypkg-3.0-1.x86_64");
    assert_eq!(updates[0].erratum, "ADV-2024-2");
    assert_eq!(updates[0].repository, "other-repo");
    assert_eq!(resp.repository_list.as_deref(), Some(&["other-repo".to_string()][..]));
}

#[test]
fn test_releasever_filter_scopes_repos() {
    let snap = snapshot();
    let mut req = request(&["mypkg-1.0-1.x86_64"]);
    req.releasever = Some("9".to_string());

    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].repository, "other-repo");
}

#[test]
fn test_unknown_repository_label_yields_empty_scope() {
    let snap = snapshot();
    let mut req = request(&["mypkg-1.0-1.x86_64"]);
    req.repositories = Some(vec!["no-such-repo".to_string()]);

    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert!(updates.is_empty());
}

#[test]
fn test_security_only_drops_plain_bugfix_advisories() {
    let snap = snapshot();
    let mut req = request(&["mypkg-1.0-1.x86_64"]);
    req.repositories = Some(vec!["my-repo".to_string(), "other-repo".to_string()]);
    req.security_only = true;

    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].erratum, "ADV-2024-1");
}

#[test]
fn test_package_at_latest_has_no_updates() {
    let snap = snapshot();
    let resp = resolver::updates(&snap, &request(&["mypkg-3.0-1.x86_64"]));

    let detail = &resp.update_list["mypkg-3.0-1.x86_64"];
    assert_eq!(detail.available_updates.as_deref(), Some(&[][..]));
}

#[test]
fn test_unknown_name_yields_empty_non_error_entry() {
    let snap = snapshot();
    let resp = resolver::updates(&snap, &request(&["ghost-1.0-1.x86_64"]));

    let detail = &resp.update_list["ghost-1.0-1.x86_64"];
    assert!(detail.available_updates.is_none());
}

#[test]
fn test_unknown_evr_and_arch_yield_empty_entries() {
    let snap = snapshot();
    let resp = resolver::updates(
        &snap,
        &request(&["mypkg-9.9-1.x86_64", "mypkg-1.0-1.i686"]),
    );

    assert!(resp.update_list["mypkg-9.9-1.x86_64"].available_updates.is_none());
    assert!(resp.update_list["mypkg-1.0-1.i686"].available_updates.is_none());
}

#[test]
fn test_unparseable_entry_does_not_fail_the_batch() {
    let snap = snapshot();
    let resp = resolver::updates(&snap, &request(&["not-a-nevra", "mypkg-1.0-1.x86_64"]));

    assert_eq!(resp.update_list.len(), 2);
    assert!(resp.update_list["not-a-nevra"].available_updates.is_none());
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert_eq!(updates.len(), 1);
}

#[test]
fn test_candidate_from_disabled_stream_is_filtered() {
    let snap = snapshot();
    let mut req = request(&["modpkg-1.0-1.x86_64"]);
    req.modules = Some(vec![ModuleStream {
        module: "testmod".to_string(),
        stream: "a".to_string(),
    }]);

    // The newer modpkg belongs to stream b; with only stream a enabled
    // the result is empty despite the newer EVR existing.
    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["modpkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert!(updates.is_empty());
}

#[test]
fn test_candidate_from_enabled_stream_is_kept() {
    let snap = snapshot();
    let mut req = request(&["modpkg-1.0-1.x86_64"]);
    req.modules = Some(vec![ModuleStream {
        module: "testmod".to_string(),
        stream: "b".to_string(),
    }]);

    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["modpkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].package, "modpkg-2.0-1.x86_64");
    assert_eq!(updates[0].erratum, "ADV-2024-3");
}

#[test]
fn test_non_modular_caller_sees_module_candidates() {
    let snap = snapshot();
    let resp = resolver::updates(&snap, &request(&["modpkg-1.0-1.x86_64"]));

    let updates = resp.update_list["modpkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    assert_eq!(updates.len(), 1);
}

#[test]
fn test_latest_only_prefilters_inputs() {
    let snap = snapshot();
    let mut req = request(&["mypkg-1.0-1.x86_64", "mypkg-2.0-1.x86_64"]);
    req.latest_only = true;

    let resp = resolver::updates(&snap, &req);
    assert!(resp.update_list["mypkg-1.0-1.x86_64"].available_updates.is_none());
    assert!(resp.update_list["mypkg-2.0-1.x86_64"].available_updates.is_some());
}

#[test]
fn test_vulnerabilities_view_dedups_cves() {
    let snap = snapshot();
    let resp = resolver::vulnerabilities(&snap, &request(&["mypkg-1.0-1.x86_64"]));
    assert_eq!(resp.cve_list, vec!["CVE-2024-1111", "CVE-2024-2222"]);
}

#[test]
fn test_patches_view_returns_advisory_names_only() {
    let snap = snapshot();
    let resp = resolver::patches(&snap, &request(&["mypkg-1.0-1.x86_64"]));
    assert_eq!(resp.errata_list, vec!["ADV-2024-1"]);
}

#[test]
fn test_rows_are_sorted_for_stable_pagination() {
    let snap = snapshot();
    let mut req = request(&["mypkg-1.0-1.x86_64"]);
    req.repositories = Some(vec!["my-repo".to_string(), "other-repo".to_string()]);

    let resp = resolver::updates(&snap, &req);
    let updates = resp.update_list["mypkg-1.0-1.x86_64"]
        .available_updates
        .as_ref()
        .unwrap();
    // 2.0 before 3.0: EVR-key order.
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].package, "mypkg-2.0-1.x86_64");
    assert_eq!(updates[1].package, "mypkg-3.0-1.x86_64");
}
