// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Ecosystem reference data for the CI matrix generator
//!
//! The tables here change with every minor CMS release. They are kept as data
//! (`data/registry.toml`) so the resolution engine can be exercised against
//! synthetic tables and so a newer table can be supplied without a rebuild.

pub mod error;
pub mod loader;
pub mod model;

pub use error::{RegistryError, Result};
pub use loader::BUILTIN_REGISTRY;
pub use model::{
    ECOSYSTEM_VENDOR, MinorVersions, ReferenceData, RepositoryMetadata, RepositoryType,
};
