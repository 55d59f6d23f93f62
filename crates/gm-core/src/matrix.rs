// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Assembly of the dynamic job list
//!
//! Each job kind runs when its input flag is set and the repository carries
//! the matching tool configuration. A full matrix spreads unit tests over four
//! PHP slots paired with databases:
//!
//! | slot | database   | notes                          |
//! |------|------------|--------------------------------|
//! | 0    | mysql57    | `--prefer-lowest`              |
//! | 1    | pgsql      |                                |
//! | 2    | mysql57pdo | replaced by the coverage job   |
//! | 3    | mysql80    |                                |

use crate::error::{MatrixError, Result};
use crate::inputs::{ExtraJob, FeatureFlags, MatrixInputs};
use crate::installer::InstallerVersion;
use crate::job::{Database, JobRecord};
use crate::php::PhpVersionSelector;
use crate::resolution::Resolution;
use crate::source::{PHPUNIT_CONFIGS, RepoSource, job_tags};
use tracing::debug;

const LINT_CONFIGS: [&str; 4] = ["phpcs.xml", "phpcs.xml.dist", "phpstan.neon", "phpstan.neon.dist"];
const BEHAT_CONFIG: &str = "behat.yml";
const JS_CONFIG: &str = "package.json";
const DOCLINT_CONFIG: &str = ".doclintrc";
const DEFAULT_SUITE: &str = "Default";
const LOWEST_DEPENDENCIES: &str = "--prefer-lowest";
const GRAPHQL_3: &str = "silverstripe/graphql:^3";
/// Ships sample code for projects, which is not linted.
const INSTALLER_REPOSITORY: &str = "silverstripe-installer";
/// Account whose repositories always report coverage.
const COVERAGE_OWNER: &str = "silverstripe";

/// Builds the job list for one resolved repository and branch.
pub struct JobMatrixBuilder<'a> {
    source: &'a dyn RepoSource,
    owner: String,
    repository: String,
    ecosystem_major: String,
    installer: InstallerVersion,
    php: PhpVersionSelector,
    flags: FeatureFlags,
    skip_suites: Vec<String>,
    extra_jobs: Vec<ExtraJob>,
}

impl<'a> JobMatrixBuilder<'a> {
    pub fn new(
        resolution: &mut Resolution<'a>,
        installer: InstallerVersion,
        inputs: &MatrixInputs,
    ) -> Result<Self> {
        let php = PhpVersionSelector::for_resolution(resolution, &installer)?;
        Ok(Self {
            source: resolution.source(),
            owner: resolution.identity.owner.clone(),
            repository: resolution.identity.name.clone(),
            ecosystem_major: resolution.ecosystem_major()?,
            installer,
            php,
            flags: inputs.flags.clone(),
            skip_suites: inputs.phpunit_skip_suites.clone(),
            extra_jobs: inputs.extra_jobs.clone(),
        })
    }

    /// A job at `slot` with every task off.
    pub fn job(&self, slot: usize) -> Result<JobRecord> {
        let mut job = JobRecord::new(&self.installer, self.php.select(slot)?);
        job.composer_install = self.flags.composer_install;
        Ok(job)
    }

    pub fn runs_coverage(&self) -> bool {
        if self.owner == COVERAGE_OWNER {
            !self.flags.phpcoverage_force_off
        } else {
            self.flags.phpcoverage
        }
    }

    fn any_exists(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.source.file_exists(name))
    }

    fn single(&self) -> bool {
        self.flags.single_job_mode()
    }

    /// Dynamic jobs in kind order, followed by the extra jobs.
    pub fn build(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = if self.flags.dynamic_matrix {
            self.dynamic_jobs()?
        } else {
            Vec::new()
        };
        jobs.extend(self.extra()?);
        Ok(jobs)
    }

    fn dynamic_jobs(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        if self.flags.phpunit && self.any_exists(&PHPUNIT_CONFIGS) {
            self.push_unit_jobs(&mut jobs)?;
        }
        if self.flags.phplinting
            && self.any_exists(&LINT_CONFIGS)
            && self.repository != INSTALLER_REPOSITORY
        {
            let mut job = self.job(0)?;
            job.phplinting = true;
            jobs.push(job);
        }
        if self.runs_coverage() {
            self.push_coverage_job(&mut jobs)?;
        }
        if self.flags.endtoend && self.source.file_exists(BEHAT_CONFIG) {
            self.push_endtoend_jobs(&mut jobs)?;
        }
        if self.flags.js && self.source.file_exists(JS_CONFIG) {
            let mut job = self.job(0)?;
            job.js = true;
            jobs.push(job);
        }
        if self.flags.doclinting && self.source.file_exists(DOCLINT_CONFIG) {
            let mut job = self.job(0)?;
            job.doclinting = true;
            jobs.push(job);
        }
        debug!(count = jobs.len(), "Built dynamic jobs");
        Ok(jobs)
    }

    fn unit_suites(&self) -> Result<Vec<String>> {
        let declared: Vec<String> = self
            .source
            .test_suite_names()?
            .into_iter()
            .filter(|name| name != DEFAULT_SUITE)
            .collect();
        if declared.is_empty() {
            return Ok(vec!["all".to_string()]);
        }
        let (skipped, suites): (Vec<String>, Vec<String>) = declared
            .into_iter()
            .partition(|name| self.skip_suites.contains(name));
        if !skipped.is_empty() {
            debug!(skipped = ?skipped, "Skipping test suites");
        }
        Ok(suites)
    }

    fn push_unit_jobs(&self, jobs: &mut Vec<JobRecord>) -> Result<()> {
        for suite in self.unit_suites()? {
            let unit = |slot: usize, db: Database| -> Result<JobRecord> {
                let mut job = self.job(slot)?.with_db(db);
                job.phpunit = true;
                job.phpunit_suite = suite.clone();
                Ok(job)
            };
            if self.single() {
                jobs.push(unit(0, Database::Mysql57)?);
                continue;
            }
            let mut lowest = unit(0, Database::Mysql57)?;
            lowest.composer_args = LOWEST_DEPENDENCIES.to_string();
            jobs.push(lowest);
            jobs.push(unit(1, Database::Pgsql)?);
            // the coverage job already runs the suite on this combination
            if !self.runs_coverage() {
                jobs.push(unit(2, Database::Mysql57Pdo)?);
            }
            jobs.push(unit(3, Database::Mysql80)?);
        }
        Ok(())
    }

    fn push_coverage_job(&self, jobs: &mut Vec<JobRecord>) -> Result<()> {
        let mut job = if self.single() {
            self.job(0)?
        } else {
            self.job(2)?.with_db(Database::Mysql57Pdo)
        };
        job.phpcoverage = true;
        jobs.push(job);
        Ok(())
    }

    /// Jobs declared by hand, each starting from a slot 0 job.
    fn extra(&self) -> Result<Vec<JobRecord>> {
        self.extra_jobs
            .iter()
            .map(|extra| {
                let mut job = self.job(0)?;
                for (field, value) in &extra.overrides {
                    job.set(field, value)?;
                }
                Ok(job)
            })
            .collect()
    }

    /// `@jobN` tags across all feature files, numerically ordered.
    ///
    /// An empty list means the suite runs as a single group.
    fn endtoend_groups(&self) -> Result<Vec<String>> {
        let files = self.source.feature_files()?;
        let mut tagged = 0;
        let mut tags: Vec<String> = Vec::new();
        for file in &files {
            let file_tags = job_tags(&file.contents);
            if file_tags.is_empty() {
                continue;
            }
            tagged += 1;
            for tag in file_tags {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        let untagged = files.len() - tagged;
        if tagged > 0 && untagged > 0 {
            return Err(MatrixError::InconsistentFeatureTags { tagged, untagged });
        }
        tags.sort_by_key(|tag| tag["@job".len()..].parse::<u64>().unwrap_or(u64::MAX));
        Ok(tags)
    }

    fn push_endtoend_jobs(&self, jobs: &mut Vec<JobRecord>) -> Result<()> {
        let mut groups = self.endtoend_groups()?;
        if groups.is_empty() {
            groups.push(String::new());
        }
        let graphql3 = !self.single() && self.ecosystem_major == "4";
        for tags in groups {
            let endtoend = |slot: usize, db: Database| -> Result<JobRecord> {
                let mut job = self.job(slot)?.with_db(db);
                job.endtoend = true;
                job.endtoend_suite = "root".to_string();
                job.endtoend_tags = tags.clone();
                Ok(job)
            };
            let mut first = endtoend(0, Database::Mysql57)?;
            if graphql3 {
                first.composer_require_extra = GRAPHQL_3.to_string();
            }
            jobs.push(first);
            if !self.single() {
                jobs.push(endtoend(3, Database::Mysql80)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::InstallerResolver;
    use crate::resolution::RepositoryIdentity;
    use crate::source::InMemorySource;
    use gm_registry::ReferenceData;
    use pretty_assertions::assert_eq;

    fn build(repo: &str, git_ref: &str, source: &InMemorySource, inputs: &MatrixInputs) -> Result<Vec<JobRecord>> {
        let registry = ReferenceData::builtin()?;
        let identity = RepositoryIdentity::parse(repo)?;
        let mut resolution = Resolution::new(&registry, source, identity, git_ref, None);
        let installer = InstallerResolver::default().resolve(&mut resolution)?;
        JobMatrixBuilder::new(&mut resolution, installer, inputs)?.build()
    }

    fn inputs(flags: FeatureFlags) -> MatrixInputs {
        MatrixInputs {
            flags,
            ..MatrixInputs::default()
        }
    }

    fn branches() -> InMemorySource {
        InMemorySource::new().with_installer_branches(["4.10", "4.11", "4.12", "4.13", "5.0", "5.1"])
    }

    #[test]
    fn full_unit_matrix_spreads_slots() {
        let source = branches().with_file("phpunit.xml.dist", "<phpunit/>");
        let flags = FeatureFlags {
            phpunit: true,
            ..FeatureFlags::default()
        };
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs(flags)).unwrap();
        let summary: Vec<(&str, &str, &str)> = jobs
            .iter()
            .map(|j| (j.php.as_str(), j.db.as_str(), j.composer_args.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("7.4", "mysql57", "--prefer-lowest"),
                ("8.0", "pgsql", ""),
                ("8.1", "mysql57pdo", ""),
                ("8.1", "mysql80", ""),
            ]
        );
        assert!(jobs.iter().all(|j| j.installer_version == "4.11.x-dev" && j.phpunit));
    }

    #[test]
    fn coverage_replaces_the_pdo_unit_job() {
        let source = branches().with_file("phpunit.xml", "<phpunit/>");
        let flags = FeatureFlags {
            phpunit: true,
            ..FeatureFlags::default()
        };
        let jobs = build("silverstripe/silverstripe-framework", "4.11", &source, &inputs(flags)).unwrap();
        assert_eq!(jobs.len(), 4);
        let coverage = &jobs[3];
        assert!(coverage.phpcoverage);
        assert!(!coverage.phpunit);
        assert_eq!(coverage.db, "mysql57pdo");
        assert_eq!(coverage.php, "8.1");
    }

    #[test]
    fn coverage_can_be_forced_off_or_requested() {
        let source = branches();
        let off = FeatureFlags {
            phpcoverage_force_off: true,
            ..FeatureFlags::default()
        };
        assert!(build("silverstripe/silverstripe-framework", "4.11", &source, &inputs(off)).unwrap().is_empty());

        let on = FeatureFlags {
            phpcoverage: true,
            simple_matrix: true,
            ..FeatureFlags::default()
        };
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs(on)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!((jobs[0].php.as_str(), jobs[0].db.as_str()), ("7.4", "mysql57"));
    }

    #[test]
    fn suites_are_split_and_skipped() {
        let xml = r#"<phpunit><testsuites>
            <testsuite name="Default"/>
            <testsuite name="one"/>
            <testsuite name="two"/>
        </testsuites></phpunit>"#;
        let source = branches().with_file("phpunit.xml.dist", xml);
        let mut inputs = inputs(FeatureFlags {
            phpunit: true,
            simple_matrix: true,
            ..FeatureFlags::default()
        });
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs).unwrap();
        let suites: Vec<&str> = jobs.iter().map(|j| j.phpunit_suite.as_str()).collect();
        assert_eq!(suites, vec!["one", "two"]);

        inputs.phpunit_skip_suites = vec!["one".into()];
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].phpunit_suite, "two");
    }

    #[test]
    fn lint_skips_the_installer() {
        let source = branches().with_file("phpstan.neon.dist", "");
        let flags = FeatureFlags {
            phplinting: true,
            ..FeatureFlags::default()
        };
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs(flags.clone())).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].phplinting);
        assert!(build("myaccount/silverstripe-installer", "4.11", &source, &inputs(flags)).unwrap().is_empty());
    }

    #[test]
    fn endtoend_groups_follow_job_tags() {
        let source = branches()
            .with_file("behat.yml", "")
            .with_file("tests/behat/features/a.feature", "@job10\nFeature: a")
            .with_file("tests/behat/features/b.feature", "@job2 @retry\nFeature: b")
            .with_file("tests/behat/features/c.feature", "@job2\nFeature: c");
        let flags = FeatureFlags {
            endtoend: true,
            simple_matrix: true,
            ..FeatureFlags::default()
        };
        let jobs = build("myaccount/silverstripe-admin", "1.11", &source, &inputs(flags)).unwrap();
        let tags: Vec<&str> = jobs.iter().map(|j| j.endtoend_tags.as_str()).collect();
        assert_eq!(tags, vec!["@job2", "@job10"]);
        assert!(jobs.iter().all(|j| j.composer_require_extra.is_empty()));
    }

    #[test]
    fn mixed_feature_tagging_is_fatal() {
        let source = branches()
            .with_file("behat.yml", "")
            .with_file("a.feature", "@job1\nFeature: a")
            .with_file("b.feature", "Feature: b");
        let flags = FeatureFlags {
            endtoend: true,
            ..FeatureFlags::default()
        };
        let err = build("myaccount/silverstripe-admin", "1.11", &source, &inputs(flags)).unwrap_err();
        assert!(matches!(err, MatrixError::InconsistentFeatureTags { tagged: 1, untagged: 1 }));
    }

    #[test]
    fn cms4_endtoend_requires_graphql3_once() {
        let source = branches().with_file("behat.yml", "");
        let flags = FeatureFlags {
            endtoend: true,
            ..FeatureFlags::default()
        };
        let endtoend = |git_ref: &str, flags: FeatureFlags| -> Vec<JobRecord> {
            let jobs = build("silverstripe/recipe-cms", git_ref, &source, &inputs(flags)).unwrap();
            jobs.into_iter().filter(|j| j.endtoend).collect()
        };
        let jobs = endtoend("4.11", flags.clone());
        let extras: Vec<&str> = jobs.iter().map(|j| j.composer_require_extra.as_str()).collect();
        assert_eq!(extras, vec![GRAPHQL_3, ""]);
        assert_eq!(jobs[1].db, "mysql80");

        let simple = FeatureFlags {
            simple_matrix: true,
            ..flags.clone()
        };
        let jobs = endtoend("4.11", simple);
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].composer_require_extra.is_empty());

        let jobs = endtoend("5.0", flags);
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.composer_require_extra.is_empty()));
    }

    #[test]
    fn extra_jobs_start_from_slot_zero() {
        let mut inputs = inputs(FeatureFlags {
            dynamic_matrix: false,
            ..FeatureFlags::default()
        });
        inputs.extra_jobs = vec![ExtraJob {
            overrides: vec![("phpunit".into(), "true".into()), ("db".into(), "pgsql".into())],
        }];
        let jobs = build("myaccount/silverstripe-framework", "4.11", &branches(), &inputs).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!((jobs[0].php.as_str(), jobs[0].db.as_str()), ("7.4", "pgsql"));
        assert!(jobs[0].phpunit);
    }

    #[test]
    fn doclint_needs_its_config() {
        let flags = FeatureFlags {
            doclinting: true,
            ..FeatureFlags::default()
        };
        let jobs = build("myaccount/silverstripe-framework", "4.11", &branches(), &inputs(flags.clone())).unwrap();
        assert!(jobs.is_empty());

        let source = branches().with_file(DOCLINT_CONFIG, "");
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs(flags)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].doclinting);
        assert!(!jobs[0].phpunit);
        assert_eq!(jobs[0].php, "7.4");
    }

    #[test]
    fn composer_install_runs_a_single_unit_job() {
        let source = branches().with_file("phpunit.xml.dist", "<phpunit/>").with_file(JS_CONFIG, "{}");
        let flags = FeatureFlags {
            phpunit: true,
            js: true,
            composer_install: true,
            ..FeatureFlags::default()
        };
        let jobs = build("myaccount/silverstripe-framework", "4.11", &source, &inputs(flags)).unwrap();
        let unit: Vec<&JobRecord> = jobs.iter().filter(|j| j.phpunit).collect();
        assert_eq!(unit.len(), 1);
        assert_eq!((unit[0].php.as_str(), unit[0].db.as_str()), ("7.4", "mysql57"));
        assert!(unit[0].composer_args.is_empty());
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.composer_install));
    }
}

