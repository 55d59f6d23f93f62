// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The parts of a repository's `composer.json` that influence resolution

use crate::branch::is_semver_like;
use crate::constraint::PhpConstraint;
use crate::error::Result;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    require: Map<String, Value>,
    #[serde(default)]
    config: RawConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    platform: Map<String, Value>,
}

/// Dependency manifest of the repository under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    /// `require` entries in declaration order, the `php` entry excluded
    pub require: Vec<(String, String)>,
    pub php: Option<String>,
    /// `config.platform.php`
    pub platform_php: Option<String>,
}

impl DependencyManifest {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content)?;
        let mut manifest = DependencyManifest {
            platform_php: raw
                .config
                .platform
                .get("php")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Default::default()
        };
        for (package, constraint) in raw.require {
            let Some(constraint) = constraint.as_str() else {
                continue;
            };
            if package == "php" {
                manifest.php = Some(constraint.to_string());
            } else {
                manifest.require.push((package, constraint.to_string()));
            }
        }
        Ok(manifest)
    }

    pub fn with_requirement(mut self, package: &str, constraint: &str) -> Self {
        if package == "php" {
            self.php = Some(constraint.to_string());
        } else {
            self.require.push((package.to_string(), constraint.to_string()));
        }
        self
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.require.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn php_constraint(&self) -> PhpConstraint {
        PhpConstraint::from_declared(self.php.as_deref())
    }

    /// The platform PHP version, when it is a plain version number.
    pub fn platform_override(&self) -> Option<&str> {
        self.platform_php.as_deref().map(str::trim).filter(|v| is_semver_like(v))
    }
}
