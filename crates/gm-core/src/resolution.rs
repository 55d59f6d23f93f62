// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-run resolution state
//!
//! External reads happen at most once per run. Their results live in explicit
//! [`Loadable`] fields so that "not read yet" and "read, but absent" stay distinct.

use crate::branch::{self, BranchSpec, GitRef};
use crate::error::{MatrixError, Result};
use crate::major;
use crate::manifest::DependencyManifest;
use crate::source::RepoSource;
use gm_registry::ReferenceData;
use std::fmt;
use tracing::debug;

/// State of a lazily read external input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Loadable<T> {
    #[default]
    Pending,
    Loaded(T),
    Absent,
}

impl<T> Loadable<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Loadable::Pending)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Loadable::Loaded(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Loadable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Loadable::Loaded(v),
            None => Loadable::Absent,
        }
    }
}

/// `owner/name` of the repository under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    pub fn parse(full_name: &str) -> Result<Self> {
        match full_name.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(MatrixError::InvalidRepository(full_name.to_string())),
        }
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Everything known about one generation run.
pub struct Resolution<'a> {
    registry: &'a ReferenceData,
    source: &'a dyn RepoSource,
    pub identity: RepositoryIdentity,
    pub git_ref: GitRef,
    pub branch: BranchSpec,
    manifest: Loadable<DependencyManifest>,
    installer_branches: Loadable<Vec<String>>,
    ecosystem_major: Option<String>,
}

impl<'a> Resolution<'a> {
    pub fn new(
        registry: &'a ReferenceData,
        source: &'a dyn RepoSource,
        identity: RepositoryIdentity,
        raw_ref: &str,
        parent_branch: Option<&str>,
    ) -> Self {
        let git_ref = GitRef::parse(raw_ref);
        let normalized = branch::normalize(&git_ref.branch, parent_branch, true);
        debug!(raw_ref, branch = %normalized, "Normalized ref");
        Self {
            registry,
            source,
            identity,
            branch: BranchSpec::parse(&normalized),
            git_ref,
            manifest: Loadable::Pending,
            installer_branches: Loadable::Pending,
            ecosystem_major: None,
        }
    }

    pub fn registry(&self) -> &'a ReferenceData {
        self.registry
    }

    pub fn source(&self) -> &'a dyn RepoSource {
        self.source
    }

    pub fn repository(&self) -> &str {
        &self.identity.name
    }

    pub(crate) fn load_manifest(&mut self) -> Result<()> {
        if self.manifest.is_pending() {
            self.manifest = self.source.read_manifest()?.into();
        }
        Ok(())
    }

    pub fn manifest(&mut self) -> Result<Option<&DependencyManifest>> {
        self.load_manifest()?;
        Ok(self.manifest.value())
    }

    pub fn installer_branches(&mut self) -> Result<Option<&[String]>> {
        if self.installer_branches.is_pending() {
            self.installer_branches = self.source.installer_branches()?.into();
        }
        Ok(self.installer_branches.value().map(Vec::as_slice))
    }

    /// The ecosystem major of the branch under test, resolved once.
    pub fn ecosystem_major(&mut self) -> Result<String> {
        if let Some(major) = &self.ecosystem_major {
            return Ok(major.clone());
        }
        self.load_manifest()?;
        let major = major::resolve_major(
            self.registry,
            &self.identity.name,
            &self.branch,
            self.manifest.value(),
        );
        self.ecosystem_major = Some(major.clone());
        Ok(major)
    }
}
