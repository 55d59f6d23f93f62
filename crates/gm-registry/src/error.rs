// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use thiserror::Error;

/// Convenient result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while loading reference data.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying IO error while reading a registry file.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Registry parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Registry parsed but is internally inconsistent.
    #[error("Registry validation error: {0}")]
    Validation(String),
}
