// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use gm_core::installer::{ExemptionRule, LatestMinorRule};
use gm_core::{
    DependencyManifest, InMemorySource, InstallerResolver, MatrixError, MatrixGenerator, MatrixInputs,
};
use gm_registry::ReferenceData;
use pretty_assertions::assert_eq;

const INSTALLER_BRANCHES: [&str; 8] = ["4.10", "4.11", "4.12", "4.13", "4", "5.0", "5.1", "5"];

fn inputs(repository: &str, git_ref: &str, parent: Option<&str>) -> MatrixInputs {
    MatrixInputs {
        github_repository: repository.to_string(),
        github_my_ref: git_ref.to_string(),
        parent_branch: parent.map(str::to_string),
        ..MatrixInputs::default()
    }
}

fn resolve_with(source: &InMemorySource, repository: &str, git_ref: &str, parent: Option<&str>) -> String {
    let registry = ReferenceData::builtin().unwrap();
    MatrixGenerator::new(&registry, source)
        .installer_version(&inputs(repository, git_ref, parent))
        .unwrap()
        .to_string()
}

fn resolve(repository: &str, git_ref: &str) -> String {
    let source = InMemorySource::new().with_installer_branches(INSTALLER_BRANCHES);
    resolve_with(&source, repository, git_ref, None)
}

fn with_requirements(requirements: &[(&str, &str)]) -> InMemorySource {
    let manifest = requirements
        .iter()
        .fold(DependencyManifest::default(), |m, (package, constraint)| {
            m.with_requirement(package, constraint)
        });
    InMemorySource::new()
        .with_installer_branches(INSTALLER_BRANCHES)
        .with_manifest(manifest)
}

#[test]
fn lockstepped_repositories_follow_their_branch() {
    let cases = [
        ("myaccount/silverstripe-admin", "1", "4.x-dev"),
        ("myaccount/silverstripe-admin", "1.10", "4.10.x-dev"),
        ("myaccount/silverstripe-admin", "2.1", "5.1.x-dev"),
        ("myaccount/silverstripe-framework", "4", "4.x-dev"),
        ("myaccount/silverstripe-framework", "4.10", "4.10.x-dev"),
        ("myaccount/silverstripe-framework", "5", "5.x-dev"),
        ("myaccount/silverstripe-framework", "5.10", "5.10.x-dev"),
        ("myaccount/silverstripe-versioned", "pulls/1.10/module-standards", "4.10.x-dev"),
        ("myaccount/silverstripe-versioned", "pulls/1/some-feature", "4.x-dev"),
    ];
    for (repository, git_ref, expected) in cases {
        assert_eq!(resolve(repository, git_ref), expected, "{repository} {git_ref}");
    }
}

#[test]
fn release_branches_resolve_to_release_installers() {
    assert_eq!(resolve("myaccount/silverstripe-framework", "4.10-release"), "dev-4.10-release");
    assert_eq!(
        resolve("myaccount/silverstripe-admin", "pulls/1.11-release/fix-thing"),
        "dev-4.11-release"
    );
    assert_eq!(resolve("myaccount/silverstripe-html5", "2.2-release"), "dev-4.10-release");
}

#[test]
fn exempt_repositories_have_no_installer() {
    let source = with_requirements(&[("silverstripe/framework", "5.x-dev")]);
    for git_ref in ["4", "4.11", "5.1", "burger"] {
        assert_eq!(resolve("myaccount/recipe-cms", git_ref), "");
        assert_eq!(resolve_with(&source, "myaccount/recipe-cms", git_ref, None), "");
        assert_eq!(resolve("silverstripe/silverstripe-installer", git_ref), "");
        assert_eq!(resolve("silverstripe/vendor-plugin", git_ref), "");
    }
}

#[test]
fn forced_recipes_get_an_installer() {
    assert_eq!(resolve("silverstripe/recipe-blog", "2"), "5.x-dev");
    assert_eq!(resolve("silverstripe/recipe-solr-search", "3.1"), "5.1.x-dev");
}

#[test]
fn tags_resolve_like_their_branch() {
    assert_eq!(resolve("silverstripe/silverstripe-framework", "4.10.6"), "4.10.x-dev");
    assert_eq!(resolve("silverstripe/silverstripe-framework", "5.0.0-beta2"), "5.0.0-beta1");
    assert_eq!(resolve("silverstripe/silverstripe-framework", "5.1.0-rc1"), "5.1.0-rc1");
    assert_eq!(resolve("silverstripe/silverstripe-admin", "2.0.0-alpha3"), "5.0.0-alpha1");
}

#[test]
fn historical_pins_win_over_the_latest_minor() {
    assert_eq!(resolve("myaccount/silverstripe-session-manager", "1.2"), "4.10.x-dev");
    assert_eq!(resolve("myaccount/silverstripe-html5", "2.3"), "4.10.x-dev");
    assert_eq!(resolve("myaccount/silverstripe-html5", "2.4"), "4.11.x-dev");
    assert_eq!(resolve("myaccount/silverstripe-elemental-bannerblock", "2.4"), "4.10.x-dev");
}

#[test]
fn parent_branch_stands_in_for_feature_branches() {
    let source = InMemorySource::new().with_installer_branches(INSTALLER_BRANCHES);
    let resolve = |parent| resolve_with(&source, "myaccount/silverstripe-versioned", "myaccount-patch-1", Some(parent));
    assert_eq!(resolve("4.10"), "4.10.x-dev");
    assert_eq!(resolve("4.10-release"), "dev-4.10-release");
    assert_eq!(resolve("burger"), "4.13.x-dev");
}

#[test]
fn manifest_decides_when_the_branch_cannot() {
    let cases: [(&str, &str, &[(&str, &str)], &str); 7] = [
        ("myaccount/silverstripe-framework", "burger", &[], "4.13.x-dev"),
        ("myaccount/silverstripe-admin", "mybranch", &[("silverstripe/framework", "5.x-dev")], "5.x-dev"),
        ("myaccount/silverstripe-admin", "mybranch", &[("silverstripe/framework", "5.0.x-dev")], "5.0.x-dev"),
        ("myaccount/silverstripe-admin", "mybranch", &[("silverstripe/framework", "^5")], "5.1.x-dev"),
        ("myaccount/silverstripe-somemodule", "mybranch", &[("silverstripe/cms", "^5")], "5.1.x-dev"),
        ("myaccount/silverstripe-somemodule", "mybranch", &[("silverstripe/admin", "^2")], "5.1.x-dev"),
        ("myaccount/silverstripe-somemodule", "3", &[("silverstripe/framework", "^5")], "5.x-dev"),
    ];
    for (repository, git_ref, requirements, expected) in cases {
        let source = with_requirements(requirements);
        assert_eq!(
            resolve_with(&source, repository, git_ref, None),
            expected,
            "{repository} {git_ref} {requirements:?}"
        );
    }
}

#[test]
fn unbranched_minors_fall_back_to_the_major() {
    let source = InMemorySource::new().with_installer_branches(["4", "5"]);
    assert_eq!(resolve_with(&source, "myaccount/silverstripe-somemodule", "burger", None), "4.x-dev");
}

#[test]
fn missing_branch_listing_is_fatal_when_needed() {
    let registry = ReferenceData::builtin().unwrap();
    let source = InMemorySource::new();
    let generator = MatrixGenerator::new(&registry, &source);

    let err = generator
        .installer_version(&inputs("myaccount/silverstripe-somemodule", "burger", None))
        .unwrap_err();
    assert!(matches!(err, MatrixError::MissingInstallerBranches { .. }));

    // lockstepped branches never consult the listing
    let version = generator
        .installer_version(&inputs("myaccount/silverstripe-admin", "1.10", None))
        .unwrap();
    assert_eq!(version.as_str(), "4.10.x-dev");
}

#[test]
fn rule_chain_can_be_replaced() {
    let registry = ReferenceData::builtin().unwrap();
    let source = InMemorySource::new().with_installer_branches(INSTALLER_BRANCHES);
    let resolver = InstallerResolver::with_rules(vec![Box::new(ExemptionRule), Box::new(LatestMinorRule)]);
    let generator = MatrixGenerator::new(&registry, &source).with_installer_resolver(resolver);

    // without the lockstep rule the admin branch only contributes its major
    let version = generator
        .installer_version(&inputs("myaccount/silverstripe-admin", "1.10", None))
        .unwrap();
    assert_eq!(version.as_str(), "4.13.x-dev");

    let version = generator
        .installer_version(&inputs("myaccount/recipe-cms", "4.10", None))
        .unwrap();
    assert!(version.is_none());
}
