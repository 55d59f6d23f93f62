// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Composer-style version constraints evaluated against `major.minor` runtimes
//!
//! Only the part of the constraint grammar that matters for picking a PHP
//! runtime is understood. Patch components are ignored because the CI image
//! always provides the latest patch of a minor. Text that is not understood
//! never errors, it just does not match.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn hyphen_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)*)\s*-\s*(\d+(?:\.\d+)*)").unwrap())
}

fn operator_gap() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(>=|<=|>|<|=|\^|~)\s+").unwrap())
}

/// A `major.minor` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MinorVersion {
    pub major: u32,
    pub minor: u32,
}

impl MinorVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }
}

impl fmt::Display for MinorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Caret,
    Tilde,
    Gte,
    Lte,
    Gt,
    Lt,
    Eq,
}

impl Operator {
    fn split(token: &str) -> (Self, &str) {
        // two-character operators first
        const OPERATORS: [(&str, Operator); 7] = [
            (">=", Operator::Gte),
            ("<=", Operator::Lte),
            (">", Operator::Gt),
            ("<", Operator::Lt),
            ("=", Operator::Eq),
            ("^", Operator::Caret),
            ("~", Operator::Tilde),
        ];
        for (prefix, op) in OPERATORS {
            if let Some(rest) = token.strip_prefix(prefix) {
                return (op, rest);
            }
        }
        (Operator::Tilde, token)
    }
}

/// Whether `candidate` (`"major.minor"`) satisfies `expression`.
///
/// `||` (or a single `|`) separates alternatives, whitespace or commas separate
/// sub-constraints that must all hold. A blank expression allows everything.
pub fn is_satisfied_by(expression: &str, candidate: &str) -> bool {
    let Some(candidate) = MinorVersion::parse(candidate) else {
        return false;
    };
    if expression.trim().is_empty() {
        return true;
    }
    expression
        .split('|')
        .filter(|alternative| !alternative.trim().is_empty())
        .any(|alternative| alternative_matches(alternative, candidate))
}

fn alternative_matches(alternative: &str, candidate: MinorVersion) -> bool {
    let expanded = hyphen_range().replace_all(alternative.trim(), ">=$1 <=$2");
    let joined = operator_gap().replace_all(&expanded, "$1");
    let mut tokens = joined
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .peekable();
    if tokens.peek().is_none() {
        return false;
    }
    tokens.all(|token| sub_constraint_matches(token, candidate))
}

fn sub_constraint_matches(token: &str, candidate: MinorVersion) -> bool {
    let (op, value) = Operator::split(token);

    let mut value = value.trim_start_matches(['v', 'V']);
    let mut wildcard = false;
    while let Some(stripped) = value.strip_suffix(".*") {
        value = stripped;
        wildcard = true;
    }
    if matches!(value, "*" | "x" | "X" | "") {
        return true;
    }

    let parts: Vec<&str> = value.split('.').collect();
    if parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return false;
    }
    let Some(target) = MinorVersion::parse(&parts[..parts.len().min(2)].join(".")) else {
        return false;
    };

    // `8.0.*` pins the minor, `8.*` pins the major
    if wildcard && op == Operator::Tilde {
        return if parts.len() >= 2 {
            candidate == target
        } else {
            candidate.major == target.major
        };
    }

    let full_semver = parts.len() >= 3;
    let op = if op == Operator::Tilde && !full_semver {
        Operator::Caret
    } else {
        op
    };

    match op {
        Operator::Caret => candidate.major == target.major && candidate >= target,
        Operator::Tilde | Operator::Eq => candidate == target,
        Operator::Gte => candidate >= target,
        Operator::Lte => candidate <= target,
        Operator::Gt => candidate > target,
        Operator::Lt => candidate < target,
    }
}

/// The PHP requirement declared by a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PhpConstraint {
    /// Nothing declared, every runtime is acceptable.
    #[default]
    Unconstrained,
    Expression(String),
}

impl PhpConstraint {
    pub fn from_declared(declared: Option<&str>) -> Self {
        match declared.map(str::trim) {
            Some(expr) if !expr.is_empty() => PhpConstraint::Expression(expr.to_string()),
            _ => PhpConstraint::Unconstrained,
        }
    }

    pub fn allows(&self, candidate: &str) -> bool {
        match self {
            PhpConstraint::Unconstrained => true,
            PhpConstraint::Expression(expr) => is_satisfied_by(expr, candidate),
        }
    }
}

impl fmt::Display for PhpConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhpConstraint::Unconstrained => write!(f, "*"),
            PhpConstraint::Expression(expr) => write!(f, "{expr}"),
        }
    }
}
