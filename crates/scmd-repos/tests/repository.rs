//! Manager behavior against a live HTTP repository.

mod common;

use std::time::Duration;

use common::{RepoHarness, RepoUrl};
use scmd_repos::{ErrorKind, ManagerOptions, RepoError};
use scmd_test::manifest_yaml;

#[tokio::test]
async fn test_fetch_manifest_and_command() {
    let h = RepoHarness::start().await;
    let repo = h.manager.get("official").unwrap();
    assert!(repo.last_updated.is_none());

    let manifest = h.manager.fetch_manifest(&repo).await.unwrap();
    assert_eq!(manifest.name, "official");
    assert_eq!(manifest.commands.len(), 2);
    assert!(h.manager.get("official").unwrap().last_updated.is_some());

    let spec = h
        .manager
        .fetch_command(&repo, "commands/explain.yaml")
        .await
        .unwrap();
    assert_eq!(spec.name, "explain");
    assert_eq!(spec.version, "1.0.0");
    assert_eq!(spec.prompt.template, "explain {{ .file }}: {{ .stdin }}");
}

#[tokio::test]
async fn test_missing_files_are_not_found() {
    let h = RepoHarness::start().await;
    let repo = h.manager.get("official").unwrap();

    let err = h
        .manager
        .fetch_command(&repo, "commands/ghost.yaml")
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::HttpStatus { status: 404, .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.manager.find_command("official", "ghost").await.unwrap_err();
    assert!(matches!(err, RepoError::CommandNotFound { .. }));

    let err = h.manager.find_command("nowhere", "explain").await.unwrap_err();
    assert!(matches!(err, RepoError::RepositoryNotFound(_)));
}

#[tokio::test]
async fn test_malformed_manifest() {
    let h = RepoHarness::start().await;
    h.server.serve("/broken/scmd-repo.yaml", "commands: [oops");
    let repo = h.manager.add("broken", &h.server.repo_url("broken")).unwrap();

    let err = h.manager.fetch_manifest(&repo).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[tokio::test]
async fn test_server_error_status() {
    let h = RepoHarness::start().await;
    h.server.serve_status("/down/scmd-repo.yaml", 500, "boom");
    let repo = h.manager.add("down", &h.server.repo_url("down")).unwrap();

    let err = h.manager.fetch_manifest(&repo).await.unwrap_err();
    assert!(matches!(err, RepoError::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_search_skips_failing_and_disabled_repos() {
    let h = RepoHarness::start().await;
    h.server.serve(
        "/extras/scmd-repo.yaml",
        manifest_yaml("extras", &[("summarize", "summarize.yaml")]),
    );
    h.server.serve(
        "/hidden/scmd-repo.yaml",
        manifest_yaml("hidden", &[("explain-more", "x.yaml")]),
    );
    h.manager.add("extras", &h.server.repo_url("extras")).unwrap();
    h.manager.add("hidden", &h.server.repo_url("hidden")).unwrap();
    h.manager.add("offline", &h.server.repo_url("offline")).unwrap();
    h.manager.set_enabled("hidden", false).unwrap();

    let all = h.manager.search_commands("").await;
    let mut found: Vec<_> = all
        .iter()
        .map(|r| format!("{}/{}", r.repo, r.command.name))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec!["extras/summarize", "official/explain", "official/review"]
    );

    let hits = h.manager.search_commands("EXPLAIN").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].repo, "official");
    assert_eq!(h.server.hit_count("/hidden/scmd-repo.yaml"), 0);
}

#[tokio::test]
async fn test_resolve_manifest_uses_cache_until_ttl() {
    let h = RepoHarness::start_with(ManagerOptions {
        manifest_ttl: Duration::from_millis(200),
        ..Default::default()
    })
    .await;
    let repo = h.manager.get("official").unwrap();

    h.manager.resolve_manifest(&repo).await.unwrap();
    h.manager.resolve_manifest(&repo).await.unwrap();
    assert_eq!(h.server.hit_count("/official/scmd-repo.yaml"), 1);
    assert!(h.cache.get_manifest(&repo.manifest_url()).is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(h.cache.get_manifest(&repo.manifest_url()).is_none());

    h.manager.resolve_manifest(&repo).await.unwrap();
    assert_eq!(h.server.hit_count("/official/scmd-repo.yaml"), 2);
}

#[tokio::test]
async fn test_find_command_caches_spec() {
    let h = RepoHarness::start().await;
    let (repo, spec) = h.manager.find_command("official", "explain").await.unwrap();
    assert_eq!(repo.name, "official");
    assert_eq!(h.cache.get_command("official", "explain"), Some(spec));
    assert_eq!(
        h.manager.latest_version("official", "review").await.unwrap(),
        "1.0.0"
    );
}

#[tokio::test]
async fn test_install_record_and_update_check() {
    let h = RepoHarness::start().await;
    let dir = h.install_dir();

    let (repo, spec) = h.manager.find_command("official", "explain").await.unwrap();
    h.manager.install_command(&spec, &dir).unwrap();
    h.manager.record_install(&repo, &spec).unwrap();

    let installed = h.manager.load_installed_commands(&dir).unwrap();
    assert_eq!(installed, vec![spec]);

    h.publish("explain", "1.1.0");
    let manager = std::sync::Arc::clone(&h.manager);
    let updates = h
        .cache
        .check_updates(move |repo, name| {
            let manager = std::sync::Arc::clone(&manager);
            async move { manager.latest_version(&repo, &name).await }
        })
        .await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].current, "1.0.0");
    assert_eq!(updates[0].latest, "1.1.0");

    h.manager.uninstall_command("explain", &dir).unwrap();
    assert!(h.manager.load_installed_commands(&dir).unwrap().is_empty());
    assert!(h.cache.installed().is_empty());
}
