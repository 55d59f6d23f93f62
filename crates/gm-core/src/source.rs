// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Access to the checked-out repository and the files the CI action prepares

use crate::error::{MatrixError, Result};
use crate::manifest::DependencyManifest;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

pub const PHPUNIT_CONFIGS: [&str; 2] = ["phpunit.xml", "phpunit.xml.dist"];
pub const DEFAULT_MANIFEST: &str = "composer.json";
pub const DEFAULT_INSTALLER_BRANCHES: &str = "__installer_branches.json";

/// A behat feature file and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Everything the engine reads from outside its inputs.
pub trait RepoSource {
    /// `Ok(None)` when the repository has no manifest.
    fn read_manifest(&self) -> Result<Option<DependencyManifest>>;

    /// Branches of the installer repository, `Ok(None)` when no listing was provided.
    fn installer_branches(&self) -> Result<Option<Vec<String>>>;

    fn file_exists(&self, name: &str) -> bool;

    /// Test suite names declared in the phpunit configuration.
    fn test_suite_names(&self) -> Result<Vec<String>>;

    fn feature_files(&self) -> Result<Vec<FeatureFile>>;
}

/// Extract `<testsuite name="...">` names from a phpunit configuration.
pub fn parse_test_suite_names(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"testsuite" {
                    let name = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.as_ref() == b"name")
                        .map(|attr| String::from_utf8_lossy(&attr.value).trim().to_string());
                    if let Some(name) = name.filter(|n| !n.is_empty()) {
                        names.push(name);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

/// Branch names from an installer branch listing.
///
/// Accepts the GitHub API shape (objects with a `name`) or a plain list of strings.
pub fn parse_branch_listing(json: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(json)?;
    let entries = value.as_array().cloned().unwrap_or_default();
    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect())
}

/// Names every `@jobN` tag in a feature file, in order of appearance.
pub fn job_tags(contents: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for word in contents.split_whitespace() {
        let Some(number) = word.strip_prefix("@job") else {
            continue;
        };
        if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) {
            let tag = word.to_string();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "vendor" || name == "node_modules"
}

/// A repository checked out on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsRepoSource {
    root: PathBuf,
    manifest_path: PathBuf,
    installer_branches_path: PathBuf,
}

impl FsRepoSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join(DEFAULT_MANIFEST),
            installer_branches_path: root.join(DEFAULT_INSTALLER_BRANCHES),
            root,
        }
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_installer_branches_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.installer_branches_path = path.into();
        self
    }
}

impl RepoSource for FsRepoSource {
    fn read_manifest(&self) -> Result<Option<DependencyManifest>> {
        if !self.manifest_path.is_file() {
            debug!(path = %self.manifest_path.display(), "No manifest, PHP is unconstrained");
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.manifest_path)?;
        DependencyManifest::from_json_str(&content).map(Some)
    }

    fn installer_branches(&self) -> Result<Option<Vec<String>>> {
        if !self.installer_branches_path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.installer_branches_path)?;
        parse_branch_listing(&content).map(Some)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    fn test_suite_names(&self) -> Result<Vec<String>> {
        let Some(config) = PHPUNIT_CONFIGS.iter().map(|n| self.root.join(n)).find(|p| p.is_file())
        else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(&config)?;
        parse_test_suite_names(&content).map_err(|reason| MatrixError::TestConfig {
            path: config.display().to_string(),
            reason,
        })
    }

    fn feature_files(&self) -> Result<Vec<FeatureFile>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
        {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "feature") {
                files.push(FeatureFile {
                    path: path.strip_prefix(&self.root).unwrap_or(path).to_path_buf(),
                    contents: std::fs::read_to_string(path)?,
                });
            }
        }
        Ok(files)
    }
}

/// An in-memory repository, handy for driving the engine without a checkout.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub manifest: Option<DependencyManifest>,
    pub installer_branches: Option<Vec<String>>,
    pub files: BTreeMap<String, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(mut self, manifest: DependencyManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn with_installer_branches<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.installer_branches = Some(branches.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }
}

impl RepoSource for InMemorySource {
    fn read_manifest(&self) -> Result<Option<DependencyManifest>> {
        Ok(self.manifest.clone())
    }

    fn installer_branches(&self) -> Result<Option<Vec<String>>> {
        Ok(self.installer_branches.clone())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn test_suite_names(&self) -> Result<Vec<String>> {
        let Some((name, xml)) = PHPUNIT_CONFIGS
            .iter()
            .find_map(|n| self.files.get_key_value(*n))
        else {
            return Ok(Vec::new());
        };
        parse_test_suite_names(xml).map_err(|reason| MatrixError::TestConfig {
            path: name.clone(),
            reason,
        })
    }

    fn feature_files(&self) -> Result<Vec<FeatureFile>> {
        Ok(self
            .files
            .iter()
            .filter(|(name, _)| name.ends_with(".feature"))
            .map(|(name, contents)| FeatureFile {
                path: PathBuf::from(name),
                contents: contents.clone(),
            })
            .collect())
    }
}
