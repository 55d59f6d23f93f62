// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The YAML input document written by the GitHub action

use crate::error::{MatrixError, Result};
use serde_yaml::Value;
use std::str::FromStr;
use strum::{AsRefStr, EnumString};
use tracing::debug;

/// Keys the input document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
enum InputKey {
    GithubRepository,
    GithubMyRef,
    ParentBranch,
    Endtoend,
    Js,
    Phpunit,
    Phpcoverage,
    PhpcoverageForceOff,
    Phplinting,
    Doclinting,
    SimpleMatrix,
    DynamicMatrix,
    ComposerInstall,
    ExtraJobs,
    PhpunitSkipSuites,
}

/// Keys whose values YAML would mangle unless quoted.
const QUOTED_KEYS: [InputKey; 2] = [InputKey::GithubMyRef, InputKey::ParentBranch];

/// Switches for the job kinds and matrix shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlags {
    pub endtoend: bool,
    pub js: bool,
    pub phpunit: bool,
    pub phpcoverage: bool,
    pub phpcoverage_force_off: bool,
    pub phplinting: bool,
    pub doclinting: bool,
    pub simple_matrix: bool,
    pub dynamic_matrix: bool,
    pub composer_install: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            endtoend: false,
            js: false,
            phpunit: false,
            phpcoverage: false,
            phpcoverage_force_off: false,
            phplinting: false,
            doclinting: false,
            simple_matrix: false,
            dynamic_matrix: true,
            composer_install: false,
        }
    }
}

impl FeatureFlags {
    /// One job per kind instead of the database/PHP spread.
    pub fn single_job_mode(&self) -> bool {
        self.simple_matrix || self.composer_install
    }
}

/// Field overrides for one user-declared job, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraJob {
    pub overrides: Vec<(String, String)>,
}

/// Parsed and validated inputs for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixInputs {
    pub github_repository: String,
    pub github_my_ref: String,
    pub parent_branch: Option<String>,
    pub flags: FeatureFlags,
    pub extra_jobs: Vec<ExtraJob>,
    pub phpunit_skip_suites: Vec<String>,
}

fn is_single_quoted(yml: &str, key: &str) -> bool {
    let needle = format!("{key}:");
    yml.lines().any(|line| {
        line.trim_start()
            .strip_prefix(&needle)
            .is_some_and(|rest| rest.trim_start_matches(' ').starts_with('\''))
    })
}

fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Scalar rendered the way a job field expects it.
fn scalar_text(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        _ => Err(MatrixError::InvalidInput {
            key: key.to_string(),
            reason: "expected a scalar value".to_string(),
        }),
    }
}

fn parse_extra_jobs(value: &Value) -> Result<Vec<ExtraJob>> {
    let invalid = |reason: &str| MatrixError::InvalidInput {
        key: InputKey::ExtraJobs.as_ref().to_string(),
        reason: reason.to_string(),
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s == "none" => Ok(Vec::new()),
        Value::Sequence(entries) => entries
            .iter()
            .map(|entry| {
                let Value::Mapping(map) = entry else {
                    return Err(invalid("each extra job must be a mapping"));
                };
                let overrides = map
                    .iter()
                    .map(|(field, value)| {
                        let field = field
                            .as_str()
                            .ok_or_else(|| invalid("job field names must be strings"))?;
                        Ok((field.to_string(), scalar_text(field, value)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ExtraJob { overrides })
            })
            .collect(),
        _ => Err(invalid("expected 'none' or a list of jobs")),
    }
}

fn parse_skip_suites(value: &Value) -> Result<Vec<String>> {
    let names: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_text(InputKey::PhpunitSkipSuites.as_ref(), item))
            .collect::<Result<_>>()?,
        _ => {
            return Err(MatrixError::InvalidInput {
                key: InputKey::PhpunitSkipSuites.as_ref().to_string(),
                reason: "expected a comma separated string or a list".to_string(),
            });
        }
    };
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

fn required_text(key: InputKey, value: Option<&Value>) -> Result<String> {
    let key_name = key.as_ref();
    let text = match value {
        Some(value) => scalar_text(key_name, value)?,
        None => String::new(),
    };
    if text.trim().is_empty() {
        return Err(MatrixError::MissingInput(key_name.to_string()));
    }
    Ok(text.trim().to_string())
}

impl MatrixInputs {
    /// Parse the action's input document.
    pub fn parse(yml: &str) -> Result<Self> {
        let document: Value =
            serde_yaml::from_str(yml).map_err(|e| MatrixError::InvalidYaml(Some(e)))?;
        let Value::Mapping(mapping) = document else {
            return Err(MatrixError::InvalidYaml(None));
        };
        if mapping.is_empty() {
            return Err(MatrixError::InvalidYaml(None));
        }

        let mut inputs = MatrixInputs::default();
        let mut repository = None;
        let mut my_ref = None;

        for (key, value) in &mapping {
            let name = match key {
                Value::String(s) => s.clone(),
                other => scalar_text("key", other).unwrap_or_default(),
            };
            let key = InputKey::from_str(&name).map_err(|_| MatrixError::UnhandledInput(name.clone()))?;
            if QUOTED_KEYS.contains(&key) && !value.is_null() && !is_single_quoted(yml, &name) {
                return Err(MatrixError::UnquotedInput(name));
            }

            let flags = &mut inputs.flags;
            match key {
                InputKey::GithubRepository => repository = Some(value),
                InputKey::GithubMyRef => my_ref = Some(value),
                InputKey::ParentBranch => {
                    let parent = scalar_text(&name, value)?;
                    inputs.parent_branch = Some(parent.trim().to_string()).filter(|s| !s.is_empty());
                }
                InputKey::Endtoend => flags.endtoend = parse_bool(value),
                InputKey::Js => flags.js = parse_bool(value),
                InputKey::Phpunit => flags.phpunit = parse_bool(value),
                InputKey::Phpcoverage => flags.phpcoverage = parse_bool(value),
                InputKey::PhpcoverageForceOff => flags.phpcoverage_force_off = parse_bool(value),
                InputKey::Phplinting => flags.phplinting = parse_bool(value),
                InputKey::Doclinting => flags.doclinting = parse_bool(value),
                InputKey::SimpleMatrix => flags.simple_matrix = parse_bool(value),
                InputKey::DynamicMatrix => flags.dynamic_matrix = parse_bool(value),
                InputKey::ComposerInstall => flags.composer_install = parse_bool(value),
                InputKey::ExtraJobs => inputs.extra_jobs = parse_extra_jobs(value)?,
                InputKey::PhpunitSkipSuites => inputs.phpunit_skip_suites = parse_skip_suites(value)?,
            }
        }

        inputs.github_repository = required_text(InputKey::GithubRepository, repository)?;
        inputs.github_my_ref = required_text(InputKey::GithubMyRef, my_ref)?;
        debug!(
            repository = %inputs.github_repository,
            git_ref = %inputs.github_my_ref,
            parent = ?inputs.parent_branch,
            extra_jobs = inputs.extra_jobs.len(),
            "Parsed inputs"
        );
        Ok(inputs)
    }
}
