// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host, port and path targets derived from the brownfield custom resources.
//!
//! A [`TargetPolicy`] answers one question for the rest of the overlay: may the
//! controller program this host (and optionally this port and path)? Prohibited targets
//! are matched directly. When any allowed target exists the answer is inverted: anything
//! not covered by an allowed target is prohibited as well.
//!
//! # Matching Rules
//!
//! - Hostnames compare case-insensitively. A leading `*.` on either side matches any
//!   subdomain; an absent hostname on a policy target matches every host.
//! - An absent or zero port matches every port.
//! - Paths are normalized by trimming trailing `*` and `/`. Two paths overlap when they
//!   are equal, when the policy path ends in a wildcard and covers the other, or when the
//!   checked path is a parent of the policy path.

use std::fmt;
use tracing::trace;

use crate::cache::ClusterSnapshot;

/// Strip trailing `*` and `/` characters.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.trim_end_matches(['*', '/']).to_string()
}

/// A normalized path with its wildcard marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPattern {
    pub prefix: String,
    pub wildcard: bool,
}

impl PathPattern {
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            prefix: normalize_path(path),
            wildcard: path.ends_with('*'),
        }
    }
}

/// Whether `path` equals `parent` or lives below it, on segment boundaries.
fn is_within(path: &str, parent: &str) -> bool {
    parent.is_empty()
        || path == parent
        || path
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// One host, port and path tuple.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Target {
    /// `None` matches every host.
    pub hostname: Option<String>,
    /// `None` matches every port.
    pub port: Option<i32>,
    /// `None` covers every path on the host.
    pub path: Option<PathPattern>,
}

impl Target {
    #[must_use]
    pub fn new(hostname: Option<&str>, port: Option<i32>, path: Option<&str>) -> Self {
        Self {
            hostname: hostname
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty()),
            port: port.filter(|p| *p > 0),
            path: path.map(PathPattern::parse),
        }
    }

    /// Expand a custom resource entry into one target per path, or a single path-less
    /// target when no paths are listed.
    fn expand(hostname: Option<&str>, port: Option<i32>, paths: &[String]) -> Vec<Self> {
        if paths.is_empty() {
            return vec![Self::new(hostname, port, None)];
        }
        paths
            .iter()
            .map(|p| Self::new(hostname, port, Some(p)))
            .collect()
    }

    /// Whether this policy target covers `host`.
    #[must_use]
    pub fn matches_host(&self, host: Option<&str>) -> bool {
        let Some(policy_host) = self.hostname.as_deref() else {
            return true;
        };
        let Some(host) = host.map(str::to_ascii_lowercase).filter(|h| !h.is_empty()) else {
            return false;
        };
        hosts_overlap(policy_host, &host)
    }

    #[must_use]
    pub fn matches_port(&self, port: Option<i32>) -> bool {
        match (self.port, port.filter(|p| *p > 0)) {
            (Some(policy_port), Some(port)) => policy_port == port,
            _ => true,
        }
    }

    /// Whether this prohibition touches `path`.
    #[must_use]
    pub fn overlaps_path(&self, path: Option<&PathPattern>) -> bool {
        let (Some(policy), Some(path)) = (self.path.as_ref(), path) else {
            return true;
        };
        path.prefix == policy.prefix
            || (policy.wildcard && is_within(&path.prefix, &policy.prefix))
            || (path.prefix.len() < policy.prefix.len() && is_within(&policy.prefix, &path.prefix))
    }

    /// Whether this allowance covers all of `path`.
    #[must_use]
    pub fn covers_path(&self, path: Option<&PathPattern>) -> bool {
        let Some(policy) = self.path.as_ref() else {
            return true;
        };
        let Some(path) = path else {
            return false;
        };
        path.prefix == policy.prefix || (policy.wildcard && is_within(&path.prefix, &policy.prefix))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}",
            self.hostname.as_deref().unwrap_or("*"),
            self.port.map_or_else(|| "*".to_string(), |p| p.to_string()),
            self.path.as_ref().map_or("", |p| p.prefix.as_str())
        )
    }
}

fn hosts_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let wildcard_covers = |wildcard: &str, host: &str| {
        wildcard
            .strip_prefix("*.")
            .is_some_and(|suffix| host.ends_with(&format!(".{suffix}")) || host == suffix)
    };
    wildcard_covers(a, b) || wildcard_covers(b, a)
}

// ============================================================================
// Target Policy
// ============================================================================

/// Prohibited and allowed targets in effect for one reconcile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetPolicy {
    prohibited: Vec<Target>,
    allowed: Vec<Target>,
}

impl TargetPolicy {
    #[must_use]
    pub fn new(prohibited: Vec<Target>, allowed: Vec<Target>) -> Self {
        Self {
            prohibited,
            allowed,
        }
    }

    /// Targets from every prohibited and allowed resource in the snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        let prohibited = snapshot
            .prohibited_targets
            .values()
            .flat_map(|t| {
                Target::expand(t.spec.hostname.as_deref(), t.spec.port, &t.spec.paths)
            })
            .collect();
        let allowed = snapshot
            .allowed_targets
            .values()
            .flat_map(|t| Target::expand(Some(&t.spec.hostname), t.spec.port, &t.spec.paths))
            .collect();
        Self::new(prohibited, allowed)
    }

    /// Whether no resource restricts the controller.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prohibited.is_empty() && self.allowed.is_empty()
    }

    #[must_use]
    pub fn prohibited(&self) -> &[Target] {
        &self.prohibited
    }

    #[must_use]
    pub fn allowed(&self) -> &[Target] {
        &self.allowed
    }

    /// Whether `host`/`port`/`path` may not be programmed.
    #[must_use]
    pub fn is_prohibited(&self, host: Option<&str>, port: Option<i32>, path: Option<&str>) -> bool {
        let path = path.map(PathPattern::parse);
        let blocked = self.prohibited.iter().any(|t| {
            t.matches_host(host) && t.matches_port(port) && t.overlaps_path(path.as_ref())
        });
        if blocked {
            trace!(host = ?host, port = ?port, "Target matches a prohibited target");
            return true;
        }
        !self.allowed.is_empty()
            && !self.allowed.iter().any(|t| {
                t.matches_host(host) && t.matches_port(port) && t.covers_path(path.as_ref())
            })
    }

    /// Whether a listener serving `host` on `port` belongs to another tenant.
    ///
    /// Any prohibition on the host claims the whole listener, whatever its paths.
    #[must_use]
    pub fn is_host_prohibited(&self, host: Option<&str>, port: Option<i32>) -> bool {
        let claimed = self
            .prohibited
            .iter()
            .any(|t| t.matches_host(host) && t.matches_port(port));
        claimed
            || (!self.allowed.is_empty()
                && !self
                    .allowed
                    .iter()
                    .any(|t| t.matches_host(host) && t.matches_port(port)))
    }
}
