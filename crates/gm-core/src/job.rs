// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! A single CI job of the generated matrix

use crate::error::{MatrixError, Result};
use crate::installer::InstallerVersion;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Database service a job runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Database {
    Mysql57,
    Mysql57Pdo,
    Mysql80,
    Pgsql,
}

/// Every field a job carries before rendering.
///
/// Consumers test fields with `if [[ "${{ matrix.key }}" == "true" ]]`, so every
/// field is always present in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub installer_version: String,
    pub php: String,
    pub db: String,
    pub composer_require_extra: String,
    pub composer_args: String,
    pub name_suffix: String,
    pub phpunit: bool,
    pub phpunit_suite: String,
    pub phplinting: bool,
    pub phpcoverage: bool,
    pub endtoend: bool,
    pub endtoend_suite: String,
    pub endtoend_config: String,
    pub endtoend_tags: String,
    pub js: bool,
    pub doclinting: bool,
    pub composer_install: bool,
    /// Fields set by extra jobs that the generator does not know about
    pub extra: Vec<(String, String)>,
}

/// Field names in output order.
pub const JOB_FIELDS: [&str; 17] = [
    "installer_version",
    "php",
    "db",
    "composer_require_extra",
    "composer_args",
    "name_suffix",
    "phpunit",
    "phpunit_suite",
    "phplinting",
    "phpcoverage",
    "endtoend",
    "endtoend_suite",
    "endtoend_config",
    "endtoend_tags",
    "js",
    "doclinting",
    "composer_install",
];

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(MatrixError::InvalidJobValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn flag(value: bool) -> String {
    value.to_string()
}

impl JobRecord {
    /// A job with every task switched off.
    pub fn new(installer: &InstallerVersion, php: impl Into<String>) -> Self {
        Self {
            installer_version: installer.to_string(),
            php: php.into(),
            db: Database::Mysql57.to_string(),
            composer_require_extra: String::new(),
            composer_args: String::new(),
            name_suffix: String::new(),
            phpunit: false,
            phpunit_suite: "all".to_string(),
            phplinting: false,
            phpcoverage: false,
            endtoend: false,
            endtoend_suite: "root".to_string(),
            endtoend_config: String::new(),
            endtoend_tags: String::new(),
            js: false,
            doclinting: false,
            composer_install: false,
            extra: Vec::new(),
        }
    }

    pub fn with_db(mut self, db: Database) -> Self {
        self.db = db.to_string();
        self
    }

    /// Override a field by name, as extra jobs do.
    ///
    /// Unknown fields are carried through to the output. `name` is always
    /// computed, so a value given for it is ignored.
    pub fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let text = |slot: &mut String| *slot = value.to_string();
        match field {
            "installer_version" => text(&mut self.installer_version),
            "php" => text(&mut self.php),
            "db" => text(&mut self.db),
            "composer_require_extra" => text(&mut self.composer_require_extra),
            "composer_args" => text(&mut self.composer_args),
            "name_suffix" => text(&mut self.name_suffix),
            "phpunit_suite" => text(&mut self.phpunit_suite),
            "endtoend_suite" => text(&mut self.endtoend_suite),
            "endtoend_config" => text(&mut self.endtoend_config),
            "endtoend_tags" => text(&mut self.endtoend_tags),
            "phpunit" => self.phpunit = parse_flag(field, value)?,
            "phplinting" => self.phplinting = parse_flag(field, value)?,
            "phpcoverage" => self.phpcoverage = parse_flag(field, value)?,
            "endtoend" => self.endtoend = parse_flag(field, value)?,
            "js" => self.js = parse_flag(field, value)?,
            "doclinting" => self.doclinting = parse_flag(field, value)?,
            "composer_install" => self.composer_install = parse_flag(field, value)?,
            "name" => {}
            _ => match self.extra.iter().position(|(key, _)| key == field) {
                Some(index) => text(&mut self.extra[index].1),
                None => self.extra.push((field.to_string(), value.to_string())),
            },
        }
        Ok(())
    }

    /// Unsanitized field values in output order, extra fields last.
    pub fn raw_fields(&self) -> Vec<(String, String)> {
        let values = [
            self.installer_version.clone(),
            self.php.clone(),
            self.db.clone(),
            self.composer_require_extra.clone(),
            self.composer_args.clone(),
            self.name_suffix.clone(),
            flag(self.phpunit),
            self.phpunit_suite.clone(),
            flag(self.phplinting),
            flag(self.phpcoverage),
            flag(self.endtoend),
            self.endtoend_suite.clone(),
            self.endtoend_config.clone(),
            self.endtoend_tags.clone(),
            flag(self.js),
            flag(self.doclinting),
            flag(self.composer_install),
        ];
        JOB_FIELDS
            .into_iter()
            .map(str::to_string)
            .zip(values)
            .chain(self.extra.iter().cloned())
            .collect()
    }
}
