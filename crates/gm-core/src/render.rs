// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Rendering job records into the matrix consumed by `strategy.matrix`
//!
//! Values end up inside shell commands of the CI workflow, so everything is
//! rendered as printable ASCII with quoting and control characters removed.

use crate::error::{MatrixError, Result};
use crate::job::JobRecord;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

const STRIPPED: [char; 8] = ['\u{0c}', '\r', '\n', '\t', '\'', '"', '&', '|'];
const NAME_SUFFIX_MAX: usize = 20;

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .filter(|c| (' '..='~').contains(c))
        .collect()
}

fn is_artifact_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ')
}

fn is_require_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '^' | '/' | '~' | ':' | ' ')
}

fn render_value(key: &str, value: &str) -> Result<String> {
    let mut value = sanitize(value);
    match key {
        // used in artifact file names
        "name_suffix" if value.len() > NAME_SUFFIX_MAX => {
            value = value.chars().filter(|c| is_artifact_safe(*c)).take(NAME_SUFFIX_MAX).collect();
        }
        "composer_require_extra" if !value.chars().all(is_require_safe) => {
            return Err(MatrixError::InvalidComposerRequireExtra(value));
        }
        // YAML turns `8.0` into `8`
        "php" if value.len() == 1 && matches!(value.as_bytes()[0], b'1'..=b'9') => {
            value.push_str(".0");
        }
        _ => {}
    }
    Ok(value)
}

/// A job as emitted: string values in output order, `name` last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedJob(Vec<(String, String)>);

impl RenderedJob {
    pub fn render(job: &JobRecord) -> Result<Self> {
        let fields = job
            .raw_fields()
            .into_iter()
            .map(|(key, value)| {
                let value = render_value(&key, &value)?;
                Ok((sanitize(&key), value))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut rendered = Self(fields);
        let name = rendered.compute_name();
        rendered.0.push(("name".to_string(), name));
        Ok(rendered)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    pub fn name(&self) -> &str {
        self.get("name").unwrap_or_default()
    }

    fn is_set(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    fn compute_name(&self) -> String {
        let field = |key: &str| self.get(key).unwrap_or_default();
        let mut tokens = vec![field("php")];
        if field("composer_args").contains("--prefer-lowest") {
            tokens.push("prf-low");
        }
        tokens.push(field("db"));
        if self.is_set("phpunit") {
            tokens.extend(["phpunit", field("phpunit_suite")]);
        }
        if self.is_set("endtoend") {
            let suite = field("endtoend_suite");
            tokens.push("endtoend");
            tokens.push(if suite.is_empty() { "root" } else { suite });
            tokens.push(field("endtoend_tags"));
        }
        for flag in ["js", "phpcoverage", "phplinting", "doclinting"] {
            if self.is_set(flag) {
                tokens.push(flag);
            }
        }
        tokens.push(field("name_suffix"));
        tokens.retain(|t| !t.is_empty());
        tokens.join(" ")
    }
}

impl Serialize for RenderedJob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// The generated matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Matrix {
    pub include: Vec<RenderedJob>,
}

impl Matrix {
    /// Render `jobs`, dropping any job identical to an earlier one.
    pub fn from_jobs(jobs: &[JobRecord]) -> Result<Self> {
        let mut include: Vec<RenderedJob> = Vec::with_capacity(jobs.len());
        for job in jobs {
            let rendered = RenderedJob::render(job)?;
            if include.contains(&rendered) {
                debug!(name = rendered.name(), "Dropping duplicate job");
                continue;
            }
            include.push(rendered);
        }
        Ok(Self { include })
    }

    /// Single-line JSON for `$GITHUB_OUTPUT`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
