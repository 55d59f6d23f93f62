// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resolution of the `silverstripe/installer` version to require for testing
//!
//! Resolution is an ordered chain of [`InstallerRule`]s; the first rule that
//! produces a version wins. The default chain ends in a rule that always
//! produces one. Pre-release tags rewrite whatever the chain produced.

use crate::branch::PreReleaseStage;
use crate::error::{MatrixError, Result};
use crate::resolution::Resolution;
use gm_registry::RepositoryType;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info};

const DEV_SUFFIX: &str = ".x-dev";

fn installer_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:dev-)?(\d+)(?:\.(\d+))?").unwrap())
}

fn dev_requirement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(?:\.(\d+))?\.x-dev$").unwrap())
}

/// A composer version specifier for `silverstripe/installer`.
///
/// Empty means the repository is tested without the installer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InstallerVersion(String);

impl InstallerVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Development version of a release line, e.g. `4.10.x-dev` or `dev-4.10-release`.
    pub fn for_line(major: &str, minor: Option<&str>, release: bool) -> Self {
        let line = match minor {
            Some(minor) => format!("{major}.{minor}"),
            None => major.to_string(),
        };
        if release {
            Self(format!("dev-{line}-release"))
        } else {
            Self(format!("{line}{DEV_SUFFIX}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Key into the installer PHP table: `"4.10"` for `4.10.x-dev`, `"5"` for `5.x-dev`.
    pub fn php_key(&self) -> Option<String> {
        let caps = installer_line().captures(&self.0)?;
        Some(match caps.get(2) {
            Some(minor) => format!("{}.{}", &caps[1], minor.as_str()),
            None => caps[1].to_string(),
        })
    }

    /// `5.0.x-dev` becomes `5.0.0-beta1` for a beta tag.
    pub fn for_pre_release(self, stage: PreReleaseStage) -> Self {
        match self.0.strip_suffix(DEV_SUFFIX) {
            Some(line) => Self(format!("{line}.0-{stage}1")),
            None => self,
        }
    }
}

impl fmt::Display for InstallerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of the installer resolution chain.
pub trait InstallerRule {
    fn name(&self) -> &'static str;

    /// `Ok(None)` passes resolution on to the next rule.
    fn apply(&self, resolution: &mut Resolution<'_>) -> Result<Option<InstallerVersion>>;
}

/// Recipes and tooling are tested without the installer unless forced.
pub struct ExemptionRule;

impl InstallerRule for ExemptionRule {
    fn name(&self) -> &'static str {
        "exemption"
    }

    fn apply(&self, resolution: &mut Resolution<'_>) -> Result<Option<InstallerVersion>> {
        let registry = resolution.registry();
        let repo = resolution.repository();
        if registry.is_force_installer(repo) {
            return Ok(None);
        }
        let exempt = registry.is_no_installer(repo)
            || matches!(
                registry.repository_type(repo),
                RepositoryType::Recipe | RepositoryType::Other
            );
        Ok(exempt.then(InstallerVersion::none))
    }
}

/// Lockstepped repositories follow their own branch.
pub struct LockstepBranchRule;

impl InstallerRule for LockstepBranchRule {
    fn name(&self) -> &'static str {
        "lockstep-branch"
    }

    fn apply(&self, resolution: &mut Resolution<'_>) -> Result<Option<InstallerVersion>> {
        if !resolution.registry().is_lockstepped(resolution.repository())
            || !resolution.branch.is_numeric()
        {
            return Ok(None);
        }
        let major = resolution.ecosystem_major()?;
        let branch = &resolution.branch;
        Ok(Some(InstallerVersion::for_line(
            &major,
            branch.minor(),
            branch.is_release(),
        )))
    }
}

/// Module minors pinned to an installer minor in the registry.
pub struct PinnedMinorRule;

impl InstallerRule for PinnedMinorRule {
    fn name(&self) -> &'static str {
        "pinned-minor"
    }

    fn apply(&self, resolution: &mut Resolution<'_>) -> Result<Option<InstallerVersion>> {
        let pinned = resolution
            .registry()
            .pinned_installer_for(resolution.repository(), resolution.branch.as_str());
        Ok(pinned.map(|installer| {
            let (major, minor) = match installer.split_once('.') {
                Some((major, minor)) => (major, Some(minor)),
                None => (installer, None),
            };
            InstallerVersion::for_line(major, minor, resolution.branch.is_release())
        }))
    }
}

/// A `.x-dev` requirement on a lockstepped module pins the installer line.
pub struct ManifestLockstepRule;

impl InstallerRule for ManifestLockstepRule {
    fn name(&self) -> &'static str {
        "manifest-lockstep"
    }

    fn apply(&self, resolution: &mut Resolution<'_>) -> Result<Option<InstallerVersion>> {
        let registry = resolution.registry();
        let Some(manifest) = resolution.manifest()? else {
            return Ok(None);
        };
        for (package, requirement) in manifest.dependencies() {
            let Some(caps) = dev_requirement().captures(requirement.trim()) else {
                continue;
            };
            if let Some(major) = registry.lockstep_major(package, &caps[1]) {
                debug!(package, requirement, major, "Installer line from lockstepped dependency");
                return Ok(Some(InstallerVersion::for_line(
                    major,
                    caps.get(2).map(|m| m.as_str()),
                    false,
                )));
            }
        }
        Ok(None)
    }
}

/// Newest installer minor of the ecosystem major that exists upstream.
pub struct LatestMinorRule;

impl InstallerRule for LatestMinorRule {
    fn name(&self) -> &'static str {
        "latest-minor"
    }

    fn apply(&self, resolution: &mut Resolution<'_>) -> Result<Option<InstallerVersion>> {
        let major = resolution.ecosystem_major()?;
        // a bare major branch targets the next minor
        if resolution.branch.is_bare_major() {
            return Ok(Some(InstallerVersion::for_line(&major, None, false)));
        }
        let minors = resolution.registry().installer_minors(&major);
        if minors.is_empty() {
            return Ok(Some(InstallerVersion::for_line(&major, None, false)));
        }

        let repository = resolution.identity.to_string();
        let branch = resolution.branch.to_string();
        let listing = resolution
            .installer_branches()?
            .ok_or(MatrixError::MissingInstallerBranches { repository, branch })?;
        let existing = minors.iter().rev().find(|minor| {
            let name = format!("{major}.{minor}");
            listing.iter().any(|b| *b == name)
        });
        Ok(Some(match existing {
            Some(minor) => InstallerVersion::for_line(&major, Some(&minor.to_string()), false),
            // none of the known minors is branched yet
            None => InstallerVersion::for_line(&major, None, false),
        }))
    }
}

/// The ordered rule chain.
pub struct InstallerResolver {
    rules: Vec<Box<dyn InstallerRule>>,
}

impl Default for InstallerResolver {
    fn default() -> Self {
        Self::with_rules(vec![
            Box::new(ExemptionRule),
            Box::new(LockstepBranchRule),
            Box::new(PinnedMinorRule),
            Box::new(ManifestLockstepRule),
            Box::new(LatestMinorRule),
        ])
    }
}

impl InstallerResolver {
    pub fn with_rules(rules: Vec<Box<dyn InstallerRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn resolve(&self, resolution: &mut Resolution<'_>) -> Result<InstallerVersion> {
        let mut resolved = None;
        for rule in &self.rules {
            if let Some(version) = rule.apply(resolution)? {
                debug!(rule = rule.name(), version = %version, "Installer rule matched");
                resolved = Some(version);
                break;
            }
        }
        let mut version = resolved.unwrap_or_default();
        if let Some(stage) = resolution.git_ref.stage {
            version = version.for_pre_release(stage);
        }
        info!(
            repository = %resolution.identity,
            branch = %resolution.branch,
            installer = %version,
            "Resolved installer version"
        );
        Ok(version)
    }
}
