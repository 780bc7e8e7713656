//! Throwaway Git repositories with controlled committer times
//!
//! Shared by the integration tests and, as `test_support`, the unit tests.

#![allow(dead_code)]

use git2::{IndexAddOption, Repository, Signature, Time};
use tempfile::TempDir;

pub struct FixtureRepo {
    dir: TempDir,
    repo: Repository,
    clock: i64,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self {
            dir,
            repo,
            clock: 1_600_000_000,
        }
    }

    /// Clone URL of the fixture (a local path)
    pub fn url(&self) -> String {
        self.dir.path().display().to_string()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Write a file with mode 0755
    #[cfg(unix)]
    pub fn write_executable(&self, rel: &str, content: &str) {
        use std::os::unix::fs::PermissionsExt;

        self.write(rel, content);
        let path = self.dir.path().join(rel);
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        let path = self.dir.path().join(rel);
        if path.is_dir() {
            std::fs::remove_dir_all(path).unwrap();
        } else {
            std::fs::remove_file(path).unwrap();
        }
    }

    /// Write `stable/<dir>/Chart.yaml` and a template
    pub fn chart(&self, dir: &str, name: &str, version: &str) {
        self.write(
            &format!("stable/{}/Chart.yaml", dir),
            &format!(
                "apiVersion: v1\nname: {}\nversion: {}\ndescription: {} chart\n",
                name, version, name
            ),
        );
        self.write(
            &format!("stable/{}/templates/configmap.yaml", dir),
            &format!("# {} {}\n", name, version),
        );
    }

    /// Commit everything in the tree, one minute after the previous commit
    pub fn commit(&mut self, message: &str) -> String {
        self.clock += 60;
        let seconds = self.clock;
        self.commit_at(message, seconds)
    }

    /// Commit everything in the tree with an explicit committer time
    pub fn commit_at(&mut self, message: &str, seconds: i64) -> String {
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let signature =
            Signature::new("Chart Bot", "charts@example.com", &Time::new(seconds, 0)).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .unwrap()
            .to_string()
    }
}
