// tests/common/mod.rs

//! Shared test fixtures: builds snapshot artifacts for integration tests.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const EXPORTED_V1: &str = "2024-05-01T10:00:00+00:00";
pub const EXPORTED_V2: &str = "2024-06-01T10:00:00+00:00";

const SCHEMA: &str = "
    CREATE TABLE arch (id INTEGER PRIMARY KEY, arch TEXT NOT NULL);
    CREATE TABLE arch_compat (from_arch_id INTEGER NOT NULL, to_arch_id INTEGER NOT NULL);
    CREATE TABLE string (id INTEGER PRIMARY KEY, string TEXT NOT NULL);
    CREATE TABLE packagename (id INTEGER PRIMARY KEY, packagename TEXT NOT NULL);
    CREATE TABLE evr (id INTEGER PRIMARY KEY, epoch INTEGER NOT NULL,
                      version TEXT NOT NULL, release TEXT NOT NULL);
    CREATE TABLE package_detail (id INTEGER PRIMARY KEY, name_id INTEGER NOT NULL,
                                 evr_id INTEGER NOT NULL, arch_id INTEGER NOT NULL,
                                 summary_id INTEGER, description_id INTEGER,
                                 source_package_id INTEGER);
    CREATE TABLE repo_detail (id INTEGER PRIMARY KEY, label TEXT NOT NULL, name TEXT NOT NULL,
                              url TEXT NOT NULL, basearch TEXT, releasever TEXT,
                              product TEXT NOT NULL, revision TEXT);
    CREATE TABLE pkg_repo (pkg_id INTEGER NOT NULL, repo_id INTEGER NOT NULL);
    CREATE TABLE advisory_detail (id INTEGER PRIMARY KEY, name TEXT NOT NULL,
                                  advisory_type TEXT NOT NULL, severity TEXT);
    CREATE TABLE advisory_cve (advisory_id INTEGER NOT NULL, cve TEXT NOT NULL);
    CREATE TABLE pkg_advisory (pkg_id INTEGER NOT NULL, advisory_id INTEGER NOT NULL);
    CREATE TABLE advisory_repo (advisory_id INTEGER NOT NULL, repo_id INTEGER NOT NULL);
    CREATE TABLE module_stream (id INTEGER PRIMARY KEY, module TEXT NOT NULL,
                                stream TEXT NOT NULL);
    CREATE TABLE module_stream_require (stream_id INTEGER NOT NULL, require_id INTEGER NOT NULL);
    CREATE TABLE module_stream_pkg (stream_id INTEGER NOT NULL, pkg_id INTEGER NOT NULL);
    CREATE TABLE dbchange (exported TEXT NOT NULL, last_change TEXT NOT NULL);
";

/// Write the standard test artifact and return its path.
///
/// Layout: `mypkg` at 1.0/2.0 in `my-repo` and 3.0 in `other-repo`;
/// `modpkg` at 1.0 (stream `testmod:a`) with the 2.0 candidate in stream
/// `testmod:b`; advisories ADV-2024-1 (security, two CVEs), ADV-2024-2
/// (bugfix, no CVEs), ADV-2024-3 (security, one CVE).
pub fn write_artifact(path: &Path, exported: &str) -> anyhow::Result<()> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;

    conn.execute_batch(
        "
        INSERT INTO arch VALUES (1, 'noarch'), (2, 'i686'), (3, 'x86_64'), (4, 'src');
        INSERT INTO arch_compat VALUES (1, 3), (3, 1);

        INSERT INTO string VALUES (1, 'package summary'), (2, 'package description');

        INSERT INTO packagename VALUES (101, 'mypkg'), (102, 'otherpkg'), (103, 'modpkg');

        INSERT INTO evr VALUES (1, 0, '1.0', '1'), (2, 0, '2.0', '1'), (3, 0, '3.0', '1');

        INSERT INTO package_detail VALUES
            (1001, 101, 1, 3, 1, 2, NULL),
            (1002, 101, 2, 3, 1, 2, NULL),
            (1003, 101, 3, 3, 1, 2, NULL),
            (1004, 102, 1, 3, 1, 2, NULL),
            (1005, 103, 1, 3, 1, 2, NULL),
            (1006, 103, 2, 3, 1, 2, NULL);

        INSERT INTO repo_detail VALUES
            (1, 'my-repo', 'My Repo', 'http://repo.example.com/8/x86_64/', 'x86_64', '8',
             'My Product', '2024-04-30T00:00:00+00:00'),
            (2, 'other-repo', 'Other Repo', 'http://repo.example.com/9/x86_64/', 'x86_64', '9',
             'My Product', '2024-04-30T00:00:00+00:00');

        INSERT INTO pkg_repo VALUES
            (1001, 1), (1002, 1), (1003, 2), (1004, 1), (1005, 1), (1006, 1);

        INSERT INTO advisory_detail VALUES
            (1, 'ADV-2024-1', 'security', 'Important'),
            (2, 'ADV-2024-2', 'bugfix', NULL),
            (3, 'ADV-2024-3', 'security', 'Moderate');

        INSERT INTO advisory_cve VALUES
            (1, 'CVE-2024-1111'), (1, 'CVE-2024-2222'), (3, 'CVE-2024-3333');

        INSERT INTO pkg_advisory VALUES (1002, 1), (1003, 2), (1006, 3);

        INSERT INTO advisory_repo VALUES (1, 1), (2, 1), (2, 2), (3, 1);

        INSERT INTO module_stream VALUES (10, 'testmod', 'a'), (11, 'testmod', 'b');
        INSERT INTO module_stream_pkg VALUES (10, 1005), (11, 1006);
        ",
    )?;

    conn.execute(
        "INSERT INTO dbchange VALUES (?1, ?2)",
        (exported, exported),
    )?;
    Ok(())
}

/// Standard artifact in a fresh temp dir. Keep the `TempDir` alive for
/// the duration of the test.
pub fn artifact() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("advisor.db");
    write_artifact(&path, EXPORTED_V1).unwrap();
    (dir, path)
}
