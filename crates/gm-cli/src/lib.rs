// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Context;
use gm_core::{FsRepoSource, MatrixGenerator};
use gm_logging::CliLoggingArgs;
use gm_registry::ReferenceData;
use std::path::PathBuf;
use tracing::debug;

pub use clap::Parser;

/// Name used for the binary and its log target.
pub const COMPONENT: &str = "gha-generate-matrix";

#[derive(clap::Parser, Debug)]
#[command(
    name = "gha-generate-matrix",
    about = "Generate the GitHub Actions CI job matrix for a CMS module",
    version
)]
pub struct Cli {
    /// Action inputs document
    #[arg(long, default_value = "__inputs.yml")]
    pub inputs: PathBuf,

    /// Checkout of the repository under test
    #[arg(long, default_value = ".")]
    pub repo_dir: PathBuf,

    /// Dependency manifest, defaults to composer.json in the repository
    #[arg(long)]
    pub composer_json: Option<PathBuf>,

    /// Branch listing of silverstripe/installer, defaults to
    /// __installer_branches.json in the repository
    #[arg(long)]
    pub installer_branches: Option<PathBuf>,

    /// Reference data overriding the built-in registry
    #[arg(long, env = "GM_REGISTRY")]
    pub registry: Option<PathBuf>,

    #[command(flatten)]
    pub logging: CliLoggingArgs,
}

impl Cli {
    /// Generate the matrix and return it as single-line JSON.
    pub fn run(&self) -> anyhow::Result<String> {
        let yml = std::fs::read_to_string(&self.inputs)
            .with_context(|| format!("Failed to read inputs {}", self.inputs.display()))?;

        let registry = ReferenceData::load_or_builtin(self.registry.as_deref())
            .context("Failed to load registry")?;

        let mut source = FsRepoSource::new(&self.repo_dir);
        if let Some(path) = &self.composer_json {
            source = source.with_manifest_path(path);
        }
        if let Some(path) = &self.installer_branches {
            source = source.with_installer_branches_path(path);
        }
        debug!(repo_dir = %self.repo_dir.display(), "Reading repository");

        let json = MatrixGenerator::new(&registry, &source).create_json(&yml)?;
        Ok(json)
    }
}
