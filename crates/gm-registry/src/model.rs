// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Reference data describing the ecosystem's repositories and release lines

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Vendor prefix shared by every package in the ecosystem.
pub const ECOSYSTEM_VENDOR: &str = "silverstripe/";

/// Declared classification of a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryType {
    #[default]
    Module,
    /// Bundle of modules without code of its own
    Recipe,
    Theme,
    /// Composer plugins and similar build tooling
    Tooling,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryMetadata {
    #[serde(rename = "type", default)]
    pub kind: RepositoryType,
    /// Release numbering is tied to the ecosystem major
    #[serde(default)]
    pub lockstepped: bool,
    /// Composer package name, when it differs from the repository name heuristic
    pub package: Option<String>,
}

/// One minor version or several minor versions of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinorVersions {
    One(String),
    Many(Vec<String>),
}

impl MinorVersions {
    pub fn contains(&self, minor: &str) -> bool {
        match self {
            MinorVersions::One(v) => v == minor,
            MinorVersions::Many(vs) => vs.iter().any(|v| v == minor),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReferenceData {
    /// Used whenever no evidence points at a specific major
    pub lowest_supported_major: String,

    /// Installer version (`"4.10"`, or bare major `"4"`) to supported PHP versions, oldest first
    #[serde(default)]
    pub installer_php_versions: BTreeMap<String, Vec<String>>,

    /// Ecosystem major to repository name to the repository's own major
    #[serde(default)]
    pub major_versions: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryMetadata>,

    /// Repositories that are tested without requiring the installer
    #[serde(default)]
    pub no_installer: BTreeSet<String>,

    /// Repositories that need the installer even though their type would exempt them
    #[serde(default)]
    pub force_installer: BTreeSet<String>,

    /// Historical pins: installer minor to repository name to the repository minor(s)
    #[serde(default)]
    pub installer_repo_minors: BTreeMap<String, BTreeMap<String, MinorVersions>>,

    /// Lockstepped package to its own major to the ecosystem major
    #[serde(default)]
    pub lockstep_dependencies: BTreeMap<String, BTreeMap<String, String>>,
}

fn parse_line(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
    Some((major.parse().ok()?, minor.parse().ok()?))
}

impl ReferenceData {
    pub fn php_versions_for(&self, key: &str) -> Option<&[String]> {
        self.installer_php_versions.get(key).map(Vec::as_slice)
    }

    /// PHP list of the lowest supported ecosystem major.
    pub fn lowest_php_versions(&self) -> &[String] {
        self.php_versions_for(&self.lowest_supported_major).unwrap_or_default()
    }

    pub fn repository(&self, name: &str) -> Option<&RepositoryMetadata> {
        self.repositories.get(name)
    }

    /// Unknown repositories are treated as ordinary modules.
    pub fn repository_type(&self, name: &str) -> RepositoryType {
        self.repository(name).map(|r| r.kind).unwrap_or_default()
    }

    pub fn is_lockstepped(&self, name: &str) -> bool {
        self.repository(name).is_some_and(|r| r.lockstepped)
    }

    pub fn is_no_installer(&self, name: &str) -> bool {
        self.no_installer.contains(name)
    }

    pub fn is_force_installer(&self, name: &str) -> bool {
        self.force_installer.contains(name)
    }

    /// Find the ecosystem major in which `repo` is released as `repo_major`.
    pub fn ecosystem_major_for(&self, repo: &str, repo_major: &str) -> Option<&str> {
        let mut majors: Vec<_> = self.major_versions.iter().collect();
        majors.sort_by_key(|(eco, _)| eco.parse::<u32>().unwrap_or(u32::MAX));
        majors
            .into_iter()
            .find(|(_, repos)| repos.get(repo).is_some_and(|m| m == repo_major))
            .map(|(eco, _)| eco.as_str())
    }

    /// Map a composer package name to its repository name.
    ///
    /// Packages registered with an explicit `package` win; other packages under the
    /// ecosystem vendor follow the naming convention where everything except recipes
    /// carries a `silverstripe-` prefix.
    pub fn repository_for_package(&self, package: &str) -> Option<String> {
        if let Some((name, _)) = self
            .repositories
            .iter()
            .find(|(_, meta)| meta.package.as_deref() == Some(package))
        {
            return Some(name.clone());
        }
        let short = package.strip_prefix(ECOSYSTEM_VENDOR)?;
        if short.is_empty() {
            return None;
        }
        if short.starts_with("recipe-") {
            Some(short.to_string())
        } else {
            Some(format!("silverstripe-{short}"))
        }
    }

    /// Known installer minors of an ecosystem major, ascending.
    pub fn installer_minors(&self, major: &str) -> Vec<u32> {
        let mut minors: Vec<u32> = self
            .installer_php_versions
            .keys()
            .filter_map(|key| {
                let (m, minor) = key.split_once('.')?;
                if m != major {
                    return None;
                }
                minor.parse().ok()
            })
            .collect();
        minors.sort_unstable();
        minors.dedup();
        minors
    }

    /// Installer version pinned for `repo` at `minor`, if any.
    ///
    /// When a repository minor is pinned under several installer versions the oldest wins.
    pub fn pinned_installer_for(&self, repo: &str, minor: &str) -> Option<&str> {
        let mut pins: Vec<_> = self.installer_repo_minors.iter().collect();
        pins.sort_by_key(|(installer, _)| parse_line(installer).unwrap_or((u32::MAX, u32::MAX)));
        pins.into_iter()
            .find(|(_, repos)| repos.get(repo).is_some_and(|m| m.contains(minor)))
            .map(|(installer, _)| installer.as_str())
    }

    /// Translate a lockstepped package's own major to the ecosystem major.
    pub fn lockstep_major(&self, package: &str, package_major: &str) -> Option<&str> {
        self.lockstep_dependencies.get(package)?.get(package_major).map(String::as_str)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.lowest_supported_major.trim().is_empty() {
            return Err("lowest-supported-major must not be empty".into());
        }
        if self.php_versions_for(&self.lowest_supported_major).is_none() {
            return Err(format!(
                "installer-php-versions has no entry for lowest supported major {}",
                self.lowest_supported_major
            ));
        }
        if let Some((key, _)) = self.installer_php_versions.iter().find(|(_, v)| v.is_empty()) {
            return Err(format!("installer-php-versions.\"{key}\" is empty"));
        }
        if let Some(key) = self.installer_repo_minors.keys().find(|k| parse_line(k).is_none()) {
            return Err(format!("installer-repo-minors key {key:?} is not a major.minor version"));
        }
        Ok(())
    }
}
