// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! PHP runtime selection per matrix slot

use crate::constraint::PhpConstraint;
use crate::error::{MatrixError, Result};
use crate::installer::InstallerVersion;
use crate::resolution::Resolution;
use tracing::debug;

/// Picks a PHP version for a matrix slot.
///
/// Slot 0 asks for the oldest runtime the repository allows, higher slots
/// for progressively newer ones, independent of how many runtimes the
/// installer line supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhpVersionSelector {
    candidates: Vec<String>,
    constraint: PhpConstraint,
    platform_override: Option<String>,
}

impl PhpVersionSelector {
    pub fn new(
        candidates: Vec<String>,
        constraint: PhpConstraint,
        platform_override: Option<String>,
    ) -> Self {
        Self {
            candidates,
            constraint,
            platform_override,
        }
    }

    /// Build the selector for the installer resolved in `resolution`.
    pub fn for_resolution(
        resolution: &mut Resolution<'_>,
        installer: &InstallerVersion,
    ) -> Result<Self> {
        let key = match installer.php_key() {
            Some(key) => key,
            None => {
                // no installer: derive the line from the branch
                let major = resolution.ecosystem_major()?;
                match resolution.branch.minor() {
                    Some(minor) => format!("{major}.{minor}"),
                    None => major,
                }
            }
        };
        let registry = resolution.registry();
        let candidates = registry
            .php_versions_for(&key)
            .unwrap_or_else(|| registry.lowest_php_versions())
            .to_vec();

        let (constraint, platform_override) = match resolution.manifest()? {
            Some(manifest) => (
                manifest.php_constraint(),
                manifest.platform_override().map(str::to_string),
            ),
            None => (PhpConstraint::Unconstrained, None),
        };
        debug!(
            key,
            candidates = ?candidates,
            constraint = %constraint,
            platform = ?platform_override,
            "PHP selection"
        );
        Ok(Self::new(candidates, constraint, platform_override))
    }

    pub fn select(&self, slot: usize) -> Result<String> {
        if let Some(version) = &self.platform_override {
            return Ok(version.clone());
        }
        let allowed = |v: &&String| self.constraint.allows(v);
        let found = if slot >= self.candidates.len() {
            self.candidates.iter().rev().find(allowed)
        } else {
            self.candidates[slot..]
                .iter()
                .find(allowed)
                .or_else(|| self.candidates[..slot].iter().rev().find(allowed))
        };
        found
            .cloned()
            .ok_or_else(|| MatrixError::UnsatisfiablePhpConstraint {
                constraint: self.constraint.to_string(),
                candidates: self.candidates.join(", "),
            })
    }
}
