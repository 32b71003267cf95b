// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ARM resource IDs and generated names for gateway children.
//!
//! Every name the builder emits comes from this module so brownfield ownership checks
//! and tests agree on a single scheme: `<prefix><kind>-<parts>`, shortened to
//! [`MAX_RESOURCE_NAME_LENGTH`] characters with a SHA-256 suffix when it would overflow.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::GatewayCoordinates;
use crate::constants::{
    DEFAULT_BACKEND_POOL_NAME, DEFAULT_HTTP_SETTINGS_NAME, DEFAULT_PROBE_PREFIX,
    MAX_RESOURCE_NAME_LENGTH, NAME_HASH_LENGTH, REWRITE_CRD_PREFIX,
};

use super::document::Protocol;

/// Kind segment of a gateway child ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    BackendAddressPools,
    FrontendIpConfigurations,
    FrontendPorts,
    SslCertificates,
    TrustedRootCertificates,
    BackendHttpSettingsCollection,
    UrlPathMaps,
    HttpListeners,
    Probes,
    RequestRoutingRules,
    RedirectConfigurations,
    RewriteRuleSets,
    LoadDistributionPolicies,
}

impl ChildKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackendAddressPools => "backendAddressPools",
            Self::FrontendIpConfigurations => "frontendIPConfigurations",
            Self::FrontendPorts => "frontendPorts",
            Self::SslCertificates => "sslCertificates",
            Self::TrustedRootCertificates => "trustedRootCertificates",
            Self::BackendHttpSettingsCollection => "backendHttpSettingsCollection",
            Self::UrlPathMaps => "urlPathMaps",
            Self::HttpListeners => "httpListeners",
            Self::Probes => "probes",
            Self::RequestRoutingRules => "requestRoutingRules",
            Self::RedirectConfigurations => "redirectConfigurations",
            Self::RewriteRuleSets => "rewriteRuleSets",
            Self::LoadDistributionPolicies => "loadDistributionPolicies",
        }
    }
}

/// Hex SHA-256 digest of `input`, truncated to [`NAME_HASH_LENGTH`] characters.
#[must_use]
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(NAME_HASH_LENGTH);
    hex
}

/// Shorten a generated name to the gateway's length limit.
///
/// Names within the limit are returned unchanged. Longer names keep their first
/// `80 - 33` characters followed by `-` and a digest of the full name, so two long
/// names sharing a prefix still map to different results.
#[must_use]
pub fn format_prop_name(name: &str) -> String {
    if name.chars().count() <= MAX_RESOURCE_NAME_LENGTH {
        return name.to_string();
    }
    let keep = MAX_RESOURCE_NAME_LENGTH - NAME_HASH_LENGTH - 1;
    let head: String = name.chars().take(keep).collect();
    format!("{head}-{}", short_hash(name))
}

// ============================================================================
// Listener Identity
// ============================================================================

/// Fingerprint of a listener: frontend port, hostnames and frontend kind.
///
/// Two ingress rules that produce the same `ListenerId` share one listener, one routing
/// rule and one URL path map.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId {
    pub frontend_port: i32,
    /// Ordered, deduplicated hostnames; empty means "any host".
    pub host_names: Vec<String>,
    pub use_private_ip: bool,
}

impl ListenerId {
    pub fn new(frontend_port: i32, host_names: Vec<String>, use_private_ip: bool) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(host_names.len());
        for host in host_names {
            if !host.is_empty() && !unique.contains(&host) {
                unique.push(host);
            }
        }
        Self {
            frontend_port,
            host_names: unique,
            use_private_ip,
        }
    }

    /// The listener matching every host on `port`.
    #[must_use]
    pub fn default_for(port: i32, use_private_ip: bool) -> Self {
        Self::new(port, Vec::new(), use_private_ip)
    }

    #[must_use]
    pub fn has_host_names(&self) -> bool {
        !self.host_names.is_empty()
    }

    /// Whether any hostname carries a wildcard label.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.host_names.iter().any(|h| h.contains('*'))
    }

    /// Stable digest used in listener, path map and rule names.
    #[must_use]
    pub fn hash(&self) -> String {
        short_hash(&self.to_string())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.frontend_port,
            self.host_names.join(","),
            if self.use_private_ip { "private" } else { "public" }
        )
    }
}

// ============================================================================
// Resource Naming
// ============================================================================

/// Builds child IDs and names for one gateway and one name prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNamer {
    gateway_id: String,
    prefix: String,
}

impl ResourceNamer {
    #[must_use]
    pub fn new(coordinates: &GatewayCoordinates, prefix: &str) -> Self {
        Self {
            gateway_id: coordinates.resource_id(),
            prefix: prefix.to_string(),
        }
    }

    /// ARM ID of the gateway itself.
    #[must_use]
    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    /// Configured name prefix (may be empty).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `name` was produced by this namer.
    #[must_use]
    pub fn is_generated(&self, name: &str) -> bool {
        !self.prefix.is_empty() && name.starts_with(&self.prefix)
    }

    #[must_use]
    pub fn child_id(&self, kind: ChildKind, name: &str) -> String {
        format!("{}/{}/{}", self.gateway_id, kind.as_str(), name)
    }

    #[must_use]
    pub fn path_rule_id(&self, path_map: &str, rule: &str) -> String {
        format!(
            "{}/pathRules/{}",
            self.child_id(ChildKind::UrlPathMaps, path_map),
            rule
        )
    }

    fn name(&self, kind: &str, rest: &str) -> String {
        format_prop_name(&format!("{}{kind}-{rest}", self.prefix))
    }

    /// `bp-{ns}-{svc}-{svcport}-{backendport}-{ingress}`
    #[must_use]
    pub fn http_settings_name(
        &self,
        namespace: &str,
        service: &str,
        service_port: &str,
        backend_port: i32,
        ingress: &str,
    ) -> String {
        self.name(
            "bp",
            &format!("{namespace}-{service}-{service_port}-{backend_port}-{ingress}"),
        )
    }

    /// `pb-{ns}-{svc}-{svcport}-{ingress}`
    #[must_use]
    pub fn probe_name(
        &self,
        namespace: &str,
        service: &str,
        service_port: &str,
        ingress: &str,
    ) -> String {
        self.name("pb", &format!("{namespace}-{service}-{service_port}-{ingress}"))
    }

    /// `pool-{ns}-{svc}-{svcport}-bp-{backendport}`
    #[must_use]
    pub fn pool_name(
        &self,
        namespace: &str,
        service: &str,
        service_port: &str,
        backend_port: i32,
    ) -> String {
        self.name(
            "pool",
            &format!("{namespace}-{service}-{service_port}-bp-{backend_port}"),
        )
    }

    /// Pool materialized from an `AzureApplicationGatewayBackendPool` resource.
    #[must_use]
    pub fn external_pool_name(&self, namespace: &str, resource: &str) -> String {
        self.name("pool", &format!("{namespace}-{resource}-external"))
    }

    #[must_use]
    pub fn load_distribution_policy_name(&self, namespace: &str, resource: &str) -> String {
        self.name("ldp", &format!("{namespace}-{resource}"))
    }

    #[must_use]
    pub fn frontend_port_name(&self, port: i32) -> String {
        self.name("fp", &port.to_string())
    }

    #[must_use]
    pub fn listener_name(&self, listener: &ListenerId) -> String {
        self.name("fl", &listener.hash())
    }

    #[must_use]
    pub fn url_path_map_name(&self, listener: &ListenerId) -> String {
        self.name("url", &listener.hash())
    }

    #[must_use]
    pub fn routing_rule_name(&self, listener: &ListenerId) -> String {
        self.name("rr", &listener.hash())
    }

    /// Redirect attached to the HTTP listener that forwards to `target`.
    #[must_use]
    pub fn ssl_redirect_name(&self, target: &ListenerId) -> String {
        self.name("sslr", &self.listener_name(target))
    }

    #[must_use]
    pub fn path_rule_name(
        &self,
        namespace: &str,
        ingress: &str,
        rule_index: usize,
        path_index: usize,
    ) -> String {
        self.name(
            "pr",
            &format!("{namespace}-{ingress}-rule-{rule_index}-path-{path_index}"),
        )
    }

    /// Certificate generated from the TLS secret `namespace/secret`.
    #[must_use]
    pub fn ssl_certificate_name(&self, namespace: &str, secret: &str) -> String {
        self.name("cert", &format!("{namespace}-{secret}"))
    }

    #[must_use]
    pub fn default_http_settings_name(&self) -> String {
        format!("{}{DEFAULT_HTTP_SETTINGS_NAME}", self.prefix)
    }

    #[must_use]
    pub fn default_backend_pool_name(&self) -> String {
        format!("{}{DEFAULT_BACKEND_POOL_NAME}", self.prefix)
    }

    #[must_use]
    pub fn default_probe_name(&self, protocol: &Protocol) -> String {
        format!("{}{DEFAULT_PROBE_PREFIX}{}", self.prefix, protocol.as_str())
    }

    /// Rewrite rule set materialized from an `AzureApplicationGatewayRewrite` resource.
    #[must_use]
    pub fn rewrite_crd_name(namespace: &str, name: &str) -> String {
        format_prop_name(&format!("{REWRITE_CRD_PREFIX}{namespace}-{name}"))
    }
}

#[cfg(test)]
#[path = "identifier_tests.rs"]
mod identifier_tests;
