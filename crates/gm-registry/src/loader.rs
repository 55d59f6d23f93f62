// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! TOML loading of reference data

use crate::error::{RegistryError, Result};
use crate::model::ReferenceData;
use std::path::Path;
use tracing::debug;

/// Reference data shipped with the binary.
pub const BUILTIN_REGISTRY: &str = include_str!("../data/registry.toml");

impl ReferenceData {
    /// Parse and validate reference data from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let data: ReferenceData = toml::from_str(content)?;
        data.validate().map_err(RegistryError::Validation)?;
        Ok(data)
    }

    /// The reference data embedded at build time.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_REGISTRY)
    }

    /// Load reference data from a file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading registry");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, otherwise use the embedded data.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
lowest-supported-major = "4"

[installer-php-versions]
"4" = ["7.4", "8.0"]
"4.11" = ["7.4", "8.0", "8.1"]

[repositories.silverstripe-framework]
type = "module"
lockstepped = true
package = "silverstripe/framework"

[installer-repo-minors."4.11"]
silverstripe-html5 = "2.4"
silverstripe-userforms = ["5.12", "5.13"]
"#;

    #[test]
    fn parses_minimal_document() {
        let data = ReferenceData::from_toml_str(MINIMAL).unwrap();
        assert_eq!(data.lowest_supported_major, "4");
        assert_eq!(data.php_versions_for("4.11").unwrap().len(), 3);
        assert!(data.is_lockstepped("silverstripe-framework"));
        assert_eq!(
            data.pinned_installer_for("silverstripe-userforms", "5.13"),
            Some("4.11")
        );
    }

    #[test]
    fn rejects_unknown_repository_type() {
        let doc = MINIMAL.replace("type = \"module\"", "type = \"library\"");
        let err = ReferenceData::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, RegistryError::Parse(_)));
    }

    #[test]
    fn validation_errors_are_reported() {
        let doc = MINIMAL.replace("lowest-supported-major = \"4\"", "lowest-supported-major = \"3\"");
        let err = ReferenceData::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let data = ReferenceData::load_or_builtin(Some(file.path())).unwrap();
        assert_eq!(data.installer_minors("4"), vec![11]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReferenceData::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)));
    }
}
