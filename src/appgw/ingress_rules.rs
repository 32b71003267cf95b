// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Read-only views over Ingress rules shared by the builder and the cache.
//!
//! Nothing here looks at services or the gateway. The functions only classify what an
//! Ingress references: service backends, custom-resource backends, TLS secrets and the
//! gateway paths its HTTP paths expand to.

use k8s_openapi::api::networking::v1::{Ingress, IngressBackend, IngressRule};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::constants::{KIND_BACKEND_POOL, KIND_LOAD_DISTRIBUTION_POLICY};

/// Paths that select the listener's default backend instead of a path rule.
pub const DEFAULT_PATHS: &[&str] = &["", "/", "/*"];

// ============================================================================
// Backend Identity
// ============================================================================

/// Port of a service backend as written in the Ingress.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServicePortKey {
    Number(i32),
    Name(String),
}

impl fmt::Display for ServicePortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// One service backend as used by one Ingress.
///
/// HTTP settings are per Ingress (they carry Ingress annotations), so the Ingress name
/// is part of the identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackendId {
    pub namespace: String,
    pub ingress: String,
    pub service: String,
    pub port: ServicePortKey,
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} -> {}:{}",
            self.namespace, self.ingress, self.service, self.port
        )
    }
}

/// Host and path a backend was first seen under; used to seed its health probe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeHint {
    pub host: Option<String>,
    pub path: Option<String>,
}

/// What an Ingress backend points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendRef {
    Service(BackendId),
    /// `AzureApplicationGatewayBackendPool` in the Ingress namespace
    ExternalPool { namespace: String, name: String },
    /// `AzureApplicationGatewayLoadDistributionPolicy` in the Ingress namespace
    LoadDistribution { namespace: String, name: String },
    Unsupported,
}

/// Classify `backend` as used by `ingress`.
#[must_use]
pub fn classify_backend(ingress: &Ingress, backend: &IngressBackend) -> BackendRef {
    let namespace = ingress.namespace().unwrap_or_default();
    if let Some(service) = backend.service.as_ref() {
        let port = service.port.as_ref().and_then(|p| match (p.number, p.name.as_deref()) {
            (Some(n), _) if n > 0 => Some(ServicePortKey::Number(n)),
            (_, Some(name)) if !name.is_empty() => Some(ServicePortKey::Name(name.to_string())),
            _ => None,
        });
        return match port {
            Some(port) => BackendRef::Service(BackendId {
                namespace,
                ingress: ingress.name_any(),
                service: service.name.clone(),
                port,
            }),
            None => BackendRef::Unsupported,
        };
    }
    match backend.resource.as_ref() {
        Some(r) if r.kind == KIND_BACKEND_POOL => BackendRef::ExternalPool {
            namespace,
            name: r.name.clone(),
        },
        Some(r) if r.kind == KIND_LOAD_DISTRIBUTION_POLICY => BackendRef::LoadDistribution {
            namespace,
            name: r.name.clone(),
        },
        _ => BackendRef::Unsupported,
    }
}

/// Rules of `ingress` (empty when it has none).
#[must_use]
pub fn rules(ingress: &Ingress) -> &[IngressRule] {
    ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_deref())
        .unwrap_or_default()
}

/// Every backend of `ingress`: path backends in rule order, then the default backend.
#[must_use]
pub fn all_backends(ingress: &Ingress) -> Vec<(Option<&str>, Option<&str>, &IngressBackend)> {
    let mut backends = Vec::new();
    for rule in rules(ingress) {
        let Some(http) = rule.http.as_ref() else {
            continue;
        };
        for path in &http.paths {
            backends.push((rule.host.as_deref(), path.path.as_deref(), &path.backend));
        }
    }
    if let Some(default) = ingress.spec.as_ref().and_then(|s| s.default_backend.as_ref()) {
        backends.push((None, None, default));
    }
    backends
}

/// Service backends of `ingresses` with the host and path each was first seen under.
#[must_use]
pub fn service_backends(ingresses: &[Ingress]) -> BTreeMap<BackendId, ProbeHint> {
    let mut found = BTreeMap::new();
    for ingress in ingresses {
        for (host, path, backend) in all_backends(ingress) {
            if let BackendRef::Service(id) = classify_backend(ingress, backend) {
                found.entry(id).or_insert_with(|| ProbeHint {
                    host: host.filter(|h| !h.is_empty()).map(ToString::to_string),
                    path: path.map(ToString::to_string),
                });
            }
        }
    }
    found
}

/// Names of services `ingress` routes to directly.
#[must_use]
pub fn backend_service_names(ingress: &Ingress) -> BTreeSet<String> {
    all_backends(ingress)
        .into_iter()
        .filter_map(|(_, _, backend)| backend.service.as_ref().map(|s| s.name.clone()))
        .collect()
}

/// Names of load distribution policies `ingress` routes to.
#[must_use]
pub fn load_distribution_policy_names(ingress: &Ingress) -> BTreeSet<String> {
    all_backends(ingress)
        .into_iter()
        .filter_map(|(_, _, backend)| match classify_backend(ingress, backend) {
            BackendRef::LoadDistribution { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}

/// Names of TLS secrets referenced by `ingress`.
#[must_use]
pub fn tls_secret_names(ingress: &Ingress) -> BTreeSet<String> {
    ingress
        .spec
        .as_ref()
        .and_then(|s| s.tls.as_ref())
        .map(|tls| {
            tls.iter()
                .filter_map(|t| t.secret_name.clone())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Whether `ingress` declares at least one TLS block.
#[must_use]
pub fn has_tls(ingress: &Ingress) -> bool {
    ingress
        .spec
        .as_ref()
        .and_then(|s| s.tls.as_ref())
        .is_some_and(|tls| !tls.is_empty())
}

// ============================================================================
// Paths
// ============================================================================

/// Gateway path for an Ingress path.
///
/// `Exact` paths are literal, `Prefix` paths gain a trailing `*` and
/// `ImplementationSpecific` (or missing) path types pass through unchanged.
#[must_use]
pub fn expand_path(path: Option<&str>, path_type: &str) -> String {
    let path = path.unwrap_or_default();
    if path.is_empty() {
        return String::new();
    }
    match path_type {
        "Prefix" if !path.ends_with('*') => format!("{path}*"),
        _ => path.to_string(),
    }
}

/// Whether an expanded path selects the default backend.
#[must_use]
pub fn is_default_path(path: &str) -> bool {
    DEFAULT_PATHS.contains(&path)
}

#[cfg(test)]
#[path = "ingress_rules_tests.rs"]
mod ingress_rules_tests;
