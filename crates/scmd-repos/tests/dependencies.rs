//! Dependency resolution against a live repository.

mod common;

use std::sync::Arc;

use common::RepoHarness;
use scmd_core::{Command, CommandRegistry};
use scmd_repos::{CommandSpec, Composer, RepoError};
use scmd_test::{FnCommand, command_spec_yaml};

fn spec_with_deps(deps: &str) -> CommandSpec {
    let yaml = format!(
        "name: audit\n\
         version: 1.0.0\n\
         description: Audit a change\n\
         prompt:\n\
         \x20 template: \"audit {{{{ .stdin }}}}\"\n\
         dependencies:\n{deps}"
    );
    CommandSpec::from_yaml(&yaml, "audit.yaml").unwrap()
}

#[tokio::test]
async fn test_installs_and_registers_dependency() {
    let h = RepoHarness::start().await;
    let dir = h.install_dir();
    let registry = Arc::new(CommandRegistry::new());
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: official/explain\n    version: \"~> 1.0.0\"\n");
    let installed = composer
        .resolve_dependencies(&spec, &h.manager, &dir)
        .await
        .unwrap();

    assert_eq!(installed, vec!["explain"]);
    assert!(registry.contains("explain"));
    assert!(dir.join("explain.yaml").exists());
    assert_eq!(h.cache.installed().len(), 1);
}

#[tokio::test]
async fn test_installed_plugin_dependency_is_not_fetched() {
    let h = RepoHarness::start().await;
    let dir = h.install_dir();
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("explain.yaml"), command_spec_yaml("explain", "1.0.0")).unwrap();

    let registry = Arc::new(CommandRegistry::new());
    registry
        .register(Arc::new(FnCommand::constant("explain", "already here")))
        .unwrap();
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: official/explain\n");
    let installed = composer
        .resolve_dependencies(&spec, &h.manager, &dir)
        .await
        .unwrap();

    assert!(installed.is_empty());
    assert_eq!(h.server.hit_count("/official/commands/explain.yaml"), 0);
}

#[tokio::test]
async fn test_builtin_sharing_the_name_does_not_satisfy() {
    let h = RepoHarness::start().await;
    let dir = h.install_dir();
    let registry = Arc::new(CommandRegistry::new());
    registry
        .register(Arc::new(FnCommand::constant("review", "builtin review")))
        .unwrap();
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: official/review\n");
    let installed = composer
        .resolve_dependencies(&spec, &h.manager, &dir)
        .await
        .unwrap();

    assert_eq!(installed, vec!["review"]);
    assert_eq!(h.server.hit_count("/official/commands/review.yaml"), 1);
    assert!(dir.join("review.yaml").exists());
    assert!(!registry.get("review").unwrap().requires_backend());
}

#[tokio::test]
async fn test_full_reference_registration_satisfies() {
    let h = RepoHarness::start().await;
    let registry = Arc::new(CommandRegistry::new());
    registry
        .register(Arc::new(FnCommand::constant("official/explain", "pinned")))
        .unwrap();
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: official/explain\n");
    let installed = composer
        .resolve_dependencies(&spec, &h.manager, &h.install_dir())
        .await
        .unwrap();

    assert!(installed.is_empty());
    assert_eq!(h.server.hit_count("/official/commands/explain.yaml"), 0);
}

#[tokio::test]
async fn test_optional_dependency_failure_is_skipped() {
    let h = RepoHarness::start().await;
    let registry = Arc::new(CommandRegistry::new());
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: nowhere/ghost\n    optional: true\n");
    let installed = composer
        .resolve_dependencies(&spec, &h.manager, &h.install_dir())
        .await
        .unwrap();

    assert!(installed.is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_required_dependency_failure_aborts() {
    let h = RepoHarness::start().await;
    let registry = Arc::new(CommandRegistry::new());
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: nowhere/ghost\n");
    let err = composer
        .resolve_dependencies(&spec, &h.manager, &h.install_dir())
        .await
        .unwrap_err();

    assert!(matches!(err, RepoError::RepositoryNotFound(_)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_unsatisfied_constraint_is_rejected() {
    let h = RepoHarness::start().await;
    let dir = h.install_dir();
    let registry = Arc::new(CommandRegistry::new());
    let composer = Composer::new(Arc::clone(&registry));

    let spec = spec_with_deps("  - command: official/review\n    version: \">=2.0.0\"\n");
    let err = composer
        .resolve_dependencies(&spec, &h.manager, &dir)
        .await
        .unwrap_err();

    assert!(matches!(err, RepoError::DependencyUnsatisfied { .. }));
    assert!(!dir.join("review.yaml").exists());
    assert!(!registry.contains("review"));
}

#[tokio::test]
async fn test_malformed_dependency_reference() {
    let h = RepoHarness::start().await;
    let composer = Composer::new(Arc::new(CommandRegistry::new()));

    let spec = spec_with_deps("  - command: justaname\n");
    let err = composer
        .resolve_dependencies(&spec, &h.manager, &h.install_dir())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidDependency(_)));
}
