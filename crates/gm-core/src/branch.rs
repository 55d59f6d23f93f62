// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Normalization of git refs into release-line tokens

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const RELEASE_SUFFIX: &str = "-release";

fn pull_request_branch() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^pulls/(\d+(?:\.\d+)*(?:-release)?)/").unwrap())
}

fn release_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-(alpha|beta|rc)\d+)?$").unwrap())
}

/// Pure digits and dots, e.g. `4` or `4.10`.
pub fn is_semver_like(token: &str) -> bool {
    !token.is_empty()
        && token.split('.').all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

/// A numeric token with a `-release` suffix, e.g. `4.10-release`.
pub fn is_release_token(token: &str) -> bool {
    token.strip_suffix(RELEASE_SUFFIX).is_some_and(is_semver_like)
}

/// Reduce a raw ref to the release-line token used for resolution.
///
/// Tags must already have been converted to `major.minor` (see [`GitRef`]).
pub fn normalize(raw_ref: &str, parent_branch: Option<&str>, allow_release_suffix: bool) -> String {
    let raw_ref = raw_ref.trim();
    let mut branch = if let Some(caps) = pull_request_branch().captures(raw_ref) {
        caps[1].to_string()
    } else {
        match parent_branch.map(str::trim) {
            Some(hint)
                if !is_semver_like(raw_ref)
                    && !is_release_token(raw_ref)
                    && (is_semver_like(hint) || is_release_token(hint)) =>
            {
                hint.to_string()
            }
            _ => raw_ref.to_string(),
        }
    };
    if !allow_release_suffix && is_release_token(&branch) {
        branch.truncate(branch.len() - RELEASE_SUFFIX.len());
    }
    branch
}

/// A normalized branch, with any `-release` suffix split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSpec {
    token: String,
    release: bool,
}

impl BranchSpec {
    pub fn parse(normalized: &str) -> Self {
        match normalized.strip_suffix(RELEASE_SUFFIX) {
            Some(token) if is_semver_like(token) => Self {
                token: token.to_string(),
                release: true,
            },
            _ => Self {
                token: normalized.to_string(),
                release: false,
            },
        }
    }

    /// The branch without its release suffix.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn is_release(&self) -> bool {
        self.release
    }

    pub fn is_numeric(&self) -> bool {
        is_semver_like(&self.token)
    }

    pub fn is_bare_major(&self) -> bool {
        self.is_numeric() && !self.token.contains('.')
    }

    pub fn major(&self) -> Option<&str> {
        if !self.is_numeric() {
            return None;
        }
        self.token.split('.').next()
    }

    pub fn minor(&self) -> Option<&str> {
        if !self.is_numeric() {
            return None;
        }
        self.token.split('.').nth(1)
    }
}

impl fmt::Display for BranchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.release {
            write!(f, "{}{}", self.token, RELEASE_SUFFIX)
        } else {
            write!(f, "{}", self.token)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PreReleaseStage {
    Alpha,
    Beta,
    Rc,
}

/// The ref a workflow runs against: a branch, or a tag reduced to its branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    pub branch: String,
    pub is_tag: bool,
    /// Set for tags such as `5.0.0-beta2`
    pub stage: Option<PreReleaseStage>,
}

impl GitRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let Some(caps) = release_tag().captures(raw) else {
            return Self {
                branch: raw.to_string(),
                is_tag: false,
                stage: None,
            };
        };
        // leading zeros are dropped the same way a `%d` format would
        let number = |i: usize| {
            caps[i]
                .parse::<u64>()
                .map(|n| n.to_string())
                .unwrap_or_else(|_| caps[i].to_string())
        };
        Self {
            branch: format!("{}.{}", number(1), number(2)),
            is_tag: true,
            stage: caps.get(4).and_then(|m| m.as_str().parse().ok()),
        }
    }
}
