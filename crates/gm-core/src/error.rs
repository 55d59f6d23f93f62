// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use thiserror::Error;

/// Convenient result alias for matrix generation.
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Errors that abort matrix generation.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The input document is not valid YAML, or not a mapping.
    #[error("Failed to parse yml")]
    InvalidYaml(#[source] Option<serde_yaml::Error>),

    /// A ref input was not single-quoted, so YAML may have turned `1.10` into a float.
    #[error("{0} needs to be surrounded by single-quotes")]
    UnquotedInput(String),

    #[error("Unhandled input {0}")]
    UnhandledInput(String),

    #[error("Missing input {0}")]
    MissingInput(String),

    #[error("Invalid input {key}: {reason}")]
    InvalidInput { key: String, reason: String },

    #[error("Invalid github_repository {0}, expected owner/name")]
    InvalidRepository(String),

    /// The fallback rule needs to know which installer branches exist.
    #[error("Installer branch listing is required to resolve the installer for {repository} on {branch}")]
    MissingInstallerBranches { repository: String, branch: String },

    /// Some feature files carry `@jobN` tags and others do not.
    #[error("All feature files must be tagged with @jobN or none may be: {tagged} tagged, {untagged} untagged")]
    InconsistentFeatureTags { tagged: usize, untagged: usize },

    #[error("Invalid composer_require_extra {0}")]
    InvalidComposerRequireExtra(String),

    #[error("Invalid value {value:?} for job field {field}")]
    InvalidJobValue { field: String, value: String },

    /// No candidate PHP version satisfies the manifest constraint.
    #[error("No PHP version in [{candidates}] satisfies the constraint {constraint}")]
    UnsatisfiablePhpConstraint {
        constraint: String,
        candidates: String,
    },

    #[error("Invalid test configuration {path}: {reason}")]
    TestConfig { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] gm_registry::RegistryError),
}
