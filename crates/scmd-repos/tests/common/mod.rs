//! Shared harness: a local repository server plus a cache-backed manager.

use std::path::PathBuf;
use std::sync::Arc;

use scmd_repos::{Cache, Manager, ManagerOptions};
use scmd_test::{StaticRepoServer, TestDirs, command_spec_yaml, manifest_yaml};

/// A running repository server with a manager pointed at it.
#[allow(dead_code)]
pub struct RepoHarness {
    /// Serves `/official/...`.
    pub server: StaticRepoServer,
    /// Manager with `official` registered and a cache attached.
    pub manager: Arc<Manager>,
    /// The attached cache.
    pub cache: Arc<Cache>,
    dirs: TestDirs,
}

#[allow(dead_code)]
impl RepoHarness {
    /// Start a server publishing `explain` and `review`, both at 1.0.0.
    pub async fn start() -> Self {
        Self::start_with(ManagerOptions::default()).await
    }

    /// Same as [`RepoHarness::start`] with explicit manager options.
    pub async fn start_with(options: ManagerOptions) -> Self {
        scmd_test::setup_test_logging("scmd_repos=debug");

        let server = StaticRepoServer::start().await.unwrap();
        server.serve(
            "/official/scmd-repo.yaml",
            manifest_yaml(
                "official",
                &[
                    ("explain", "commands/explain.yaml"),
                    ("review", "commands/review.yaml"),
                ],
            ),
        );
        server.serve(
            "/official/commands/explain.yaml",
            command_spec_yaml("explain", "1.0.0"),
        );
        server.serve(
            "/official/commands/review.yaml",
            command_spec_yaml("review", "1.0.0"),
        );

        let dirs = TestDirs::new();
        let cache = Arc::new(Cache::new(&dirs.data_dir()));
        let manager = Manager::with_options(dirs.data_dir(), options)
            .unwrap()
            .with_cache(Arc::clone(&cache));
        manager.add("official", &server.repo_url("official")).unwrap();

        Self {
            server,
            manager: Arc::new(manager),
            cache,
            dirs,
        }
    }

    /// Where commands get installed.
    pub fn install_dir(&self) -> PathBuf {
        self.dirs.install_dir()
    }

    /// Publish a new version of a command spec.
    pub fn publish(&self, name: &str, version: &str) {
        self.server.serve(
            &format!("/official/commands/{name}.yaml"),
            command_spec_yaml(name, version),
        );
    }
}

/// URL helpers for the server.
pub trait RepoUrl {
    /// Base URL of a repository served under `/{name}`.
    fn repo_url(&self, name: &str) -> String;
}

impl RepoUrl for StaticRepoServer {
    fn repo_url(&self, name: &str) -> String {
        format!("{}/{name}", self.url())
    }
}
