//! Integration tests for CLI commands

use git2::{IndexAddOption, Repository, Signature, Time};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run the chartstreams binary with an isolated config directory
fn chartstreams(config_home: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chartstreams"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env("CHART_STREAMS_LOG_LEVEL", "warn")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute chartstreams")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn commit(repo: &Repository, message: &str, seconds: i64) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();

    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::new("Chart Bot", "charts@example.com", &Time::new(seconds, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}

/// A repository with nginx 1.0.0, then nginx 1.1.0 and redis 2.0.0
fn chart_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    write(dir.path(), "stable/nginx/Chart.yaml", "name: nginx\nversion: 1.0.0\n");
    write(dir.path(), "stable/nginx/values.yaml", "replicas: 1\n");
    commit(&repo, "nginx 1.0.0", 1_600_000_000);

    write(dir.path(), "stable/nginx/Chart.yaml", "name: nginx\nversion: 1.1.0\n");
    write(
        dir.path(),
        "stable/redis/Chart.yaml",
        "name: redis\nversion: 2.0.0\ndescription: key-value store\n",
    );
    commit(&repo, "nginx 1.1.0, redis 2.0.0", 1_600_000_060);

    dir
}

fn url(repo: &TempDir) -> String {
    repo.path().display().to_string()
}

mod index_command {
    use super::*;

    #[test]
    fn test_index_yaml() {
        let repo = chart_repo();
        let home = TempDir::new().unwrap();

        let output = chartstreams(home.path(), &["index", "--repo-url", &url(&repo)]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let index: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
        assert_eq!(index["apiVersion"], "v1");
        assert_eq!(index["entries"]["nginx"].as_sequence().unwrap().len(), 2);
        assert_eq!(index["entries"]["nginx"][0]["version"], "1.0.0");
        assert_eq!(index["entries"]["redis"][0]["urls"][0], "/redis/2.0.0");
        assert_eq!(index["entries"]["redis"][0]["digest"], "deadbeef");
    }

    #[test]
    fn test_index_json_is_stable() {
        let repo = chart_repo();
        let home = TempDir::new().unwrap();
        let args = ["index", "--json", "--repo-url", &url(&repo)];

        let first = chartstreams(home.path(), &args);
        let second = chartstreams(home.path(), &args);
        assert!(first.status.success());
        assert_eq!(first.stdout, second.stdout);

        let json: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
        assert_eq!(json["generated"], "2020-09-13T12:27:40Z");
    }

    #[test]
    fn test_index_to_file() {
        let repo = chart_repo();
        let home = TempDir::new().unwrap();
        let out = home.path().join("index.yaml");

        let output = chartstreams(
            home.path(),
            &[
                "index",
                "--repo-url",
                &url(&repo),
                "-o",
                &out.display().to_string(),
            ],
        );
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
        assert!(std::fs::read_to_string(&out).unwrap().contains("redis"));
    }

    #[test]
    fn test_index_from_config_file() {
        let repo = chart_repo();
        let home = TempDir::new().unwrap();
        write(
            home.path(),
            "chartstreams/config.yaml",
            &format!("repoUrl: {}\n", url(&repo)),
        );

        let output = chartstreams(home.path(), &["index"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert!(String::from_utf8_lossy(&output.stdout).contains("nginx"));
    }

    #[test]
    fn test_invalid_chart_fails_unless_skipped() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(dir.path(), "stable/ok/Chart.yaml", "name: ok\nversion: 1.0.0\n");
        write(dir.path(), "stable/bad/Chart.yaml", "description: no name\n");
        commit(&repo, "one good, one bad", 1_600_000_000);

        let home = TempDir::new().unwrap();
        let strict = chartstreams(home.path(), &["index", "--repo-url", &url(&dir)]);
        assert_eq!(strict.status.code(), Some(4));

        let relaxed = chartstreams(
            home.path(),
            &["index", "--skip-invalid", "--repo-url", &url(&dir)],
        );
        assert!(relaxed.status.success());
        assert!(String::from_utf8_lossy(&relaxed.stdout).contains("ok"));
    }
}

mod fetch_command {
    use super::*;

    #[test]
    fn test_fetch_writes_archive() {
        let repo = chart_repo();
        let home = TempDir::new().unwrap();
        let out = home.path().join("charts");

        let output = chartstreams(
            home.path(),
            &[
                "fetch",
                "nginx",
                "1.0.0",
                "--repo-url",
                &url(&repo),
                "-o",
                &out.display().to_string(),
            ],
        );
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("nginx/Chart.yaml"));
        assert!(stdout.contains("nginx/values.yaml"));
        assert!(stdout.contains("sha256:"));

        let archive = out.join("nginx-1.0.0.tgz");
        assert!(archive.exists());
    }

    #[test]
    fn test_fetch_unknown_version() {
        let repo = chart_repo();
        let home = TempDir::new().unwrap();

        let output = chartstreams(
            home.path(),
            &["fetch", "nginx", "9.9.9", "--repo-url", &url(&repo)],
        );
        assert_eq!(output.status.code(), Some(4));
        assert!(String::from_utf8_lossy(&output.stderr).contains("nginx@9.9.9"));
    }
}

mod usage {
    use super::*;

    #[test]
    fn test_missing_repository() {
        let home = TempDir::new().unwrap();
        let output = chartstreams(home.path(), &["index"]);
        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_unknown_flag() {
        let home = TempDir::new().unwrap();
        let output = chartstreams(home.path(), &["index", "--no-such-flag"]);
        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_unreachable_repository() {
        let home = TempDir::new().unwrap();
        let missing = home.path().join("missing");
        let output = chartstreams(
            home.path(),
            &["index", "--repo-url", &missing.display().to_string()],
        );
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_help() {
        let home = TempDir::new().unwrap();
        let output = chartstreams(home.path(), &["--help"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("serve"));
    }
}
