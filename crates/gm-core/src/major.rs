// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mapping a repository branch onto an ecosystem major
//!
//! Lockstepped modules carry their own major numbers (admin `2` ships with
//! CMS `5`), so the answer comes from a lookup table rather than arithmetic.

use crate::branch::BranchSpec;
use crate::manifest::DependencyManifest;
use gm_registry::ReferenceData;
use tracing::debug;

fn leading_number(constraint: &str) -> Option<&str> {
    let start = constraint.find(|c: char| c.is_ascii_digit())?;
    let rest = &constraint[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Resolve the ecosystem major that `branch` of `repository` belongs to.
///
/// Branch evidence wins, then the manifest's ecosystem dependencies in
/// declaration order, then the lowest supported major.
pub fn resolve_major(
    registry: &ReferenceData,
    repository: &str,
    branch: &BranchSpec,
    manifest: Option<&DependencyManifest>,
) -> String {
    if let Some(major) = branch
        .major()
        .and_then(|m| registry.ecosystem_major_for(repository, m))
    {
        debug!(repository, branch = %branch, major, "Ecosystem major from branch");
        return major.to_string();
    }

    if let Some(manifest) = manifest {
        for (package, constraint) in manifest.dependencies() {
            let Some(dependency) = registry.repository_for_package(package) else {
                continue;
            };
            let Some(dep_major) = leading_number(constraint) else {
                continue;
            };
            if let Some(major) = registry.ecosystem_major_for(&dependency, dep_major) {
                debug!(repository, package, constraint, major, "Ecosystem major from manifest");
                return major.to_string();
            }
        }
    }

    debug!(
        repository,
        branch = %branch,
        major = %registry.lowest_supported_major,
        "Ecosystem major defaulted"
    );
    registry.lowest_supported_major.clone()
}
