// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Build-matrix generation for the CMS module ecosystem
//!
//! Given a repository, the ref being tested and the action inputs, work out
//! which `silverstripe/installer` version and PHP runtimes to test against and
//! emit the GitHub Actions job matrix.
//!
//! ```text
//! inputs ─▶ branch ─▶ ecosystem major ─▶ installer ─▶ PHP per slot ─▶ jobs ─▶ JSON
//! ```

pub mod branch;
pub mod constraint;
pub mod error;
pub mod inputs;
pub mod installer;
pub mod job;
pub mod major;
pub mod manifest;
pub mod matrix;
pub mod php;
pub mod render;
pub mod resolution;
pub mod source;

pub use branch::{BranchSpec, GitRef, PreReleaseStage};
pub use constraint::{MinorVersion, PhpConstraint, is_satisfied_by};
pub use error::{MatrixError, Result};
pub use inputs::{ExtraJob, FeatureFlags, MatrixInputs};
pub use installer::{InstallerResolver, InstallerRule, InstallerVersion};
pub use job::{Database, JobRecord};
pub use manifest::DependencyManifest;
pub use matrix::JobMatrixBuilder;
pub use php::PhpVersionSelector;
pub use render::{Matrix, RenderedJob};
pub use resolution::{Loadable, RepositoryIdentity, Resolution};
pub use source::{FeatureFile, FsRepoSource, InMemorySource, RepoSource};

use gm_registry::ReferenceData;
use tracing::info;

/// Runs the whole pipeline against one repository source.
pub struct MatrixGenerator<'a> {
    registry: &'a ReferenceData,
    source: &'a dyn RepoSource,
    installer_resolver: InstallerResolver,
}

impl<'a> MatrixGenerator<'a> {
    pub fn new(registry: &'a ReferenceData, source: &'a dyn RepoSource) -> Self {
        Self {
            registry,
            source,
            installer_resolver: InstallerResolver::default(),
        }
    }

    pub fn with_installer_resolver(mut self, resolver: InstallerResolver) -> Self {
        self.installer_resolver = resolver;
        self
    }

    /// The installer version `inputs` resolve to, without building jobs.
    pub fn installer_version(&self, inputs: &MatrixInputs) -> Result<InstallerVersion> {
        let mut resolution = self.resolution(inputs)?;
        self.installer_resolver.resolve(&mut resolution)
    }

    pub fn generate(&self, inputs: &MatrixInputs) -> Result<Matrix> {
        let mut resolution = self.resolution(inputs)?;
        let installer = self.installer_resolver.resolve(&mut resolution)?;
        let jobs = JobMatrixBuilder::new(&mut resolution, installer, inputs)?.build()?;
        let matrix = Matrix::from_jobs(&jobs)?;
        info!(
            repository = %resolution.identity,
            jobs = matrix.include.len(),
            "Generated matrix"
        );
        Ok(matrix)
    }

    /// Parse the input document and render the matrix as single-line JSON.
    pub fn create_json(&self, yml: &str) -> Result<String> {
        let inputs = MatrixInputs::parse(yml)?;
        self.generate(&inputs)?.to_json()
    }

    fn resolution(&self, inputs: &MatrixInputs) -> Result<Resolution<'a>> {
        let identity = RepositoryIdentity::parse(&inputs.github_repository)?;
        Ok(Resolution::new(
            self.registry,
            self.source,
            identity,
            &inputs.github_my_ref,
            inputs.parent_branch.as_deref(),
        ))
    }
}
