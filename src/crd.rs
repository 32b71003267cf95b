// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) consumed by the ingress controller.
//!
//! # Resource Types
//!
//! ## Brownfield
//!
//! - [`AzureIngressProhibitedTarget`] - Host/port/paths the controller must leave untouched
//! - [`AzureIngressAllowedTarget`] - Inverse list: only these targets may be programmed
//!
//! ## Backends
//!
//! - [`AzureApplicationGatewayBackendPool`] - Backend addresses living outside the cluster
//! - [`AzureApplicationGatewayLoadDistributionPolicy`] - Weighted service backends
//!
//! ## Request Handling
//!
//! - [`AzureApplicationGatewayRewrite`] - Header and URL rewrite rules
//!
//! ## Status
//!
//! - [`AzureApplicationGatewayInstanceUpdateStatus`] - Per-instance acknowledgement of a
//!   backend address update
//!
//! # Example: Protecting a Legacy Host
//!
//! ```rust
//! use appgw_ingress::crd::AzureIngressProhibitedTargetSpec;
//!
//! let spec = AzureIngressProhibitedTargetSpec {
//!     ip: None,
//!     hostname: Some("legacy.example.com".into()),
//!     port: None,
//!     paths: vec!["/admin/*".into()],
//! };
//! assert_eq!(spec.hostname.as_deref(), Some("legacy.example.com"));
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Brownfield Targets
// ============================================================================

/// Host and paths on the shared gateway that the controller must not mutate.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appgw.ingress.k8s.io",
    version = "v1",
    kind = "AzureIngressProhibitedTarget",
    namespaced,
    derive = "PartialEq",
    shortname = "prohibited",
    doc = "AzureIngressProhibitedTarget marks a host, port and set of paths on a shared Application Gateway as owned by another tenant. The ingress controller leaves matching listeners, rules and their backends untouched."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureIngressProhibitedTargetSpec {
    /// Frontend IP address of the target (public or private).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Hostname of the target. A leading `*.` matches any subdomain; empty matches any host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Frontend port of the target. Absent or zero matches every port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 65535))]
    pub port: Option<i32>,

    /// URL paths that are off limits. Must start with `/`; may end with `/*`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// Host and paths on the shared gateway that the controller may program.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appgw.ingress.k8s.io",
    version = "v1",
    kind = "AzureIngressAllowedTarget",
    namespaced,
    derive = "PartialEq",
    shortname = "allowed",
    doc = "AzureIngressAllowedTarget whitelists a host on a shared Application Gateway. When any allowed target exists, every host not listed is treated as prohibited."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureIngressAllowedTargetSpec {
    /// Frontend IP address of the target (public or private).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Hostname of the target.
    pub hostname: String,

    /// Frontend port of the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 65535))]
    pub port: Option<i32>,

    /// URL paths the controller may program.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

// ============================================================================
// Backends
// ============================================================================

/// A single backend address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddressSpec {
    /// IPv4 or IPv6 address of the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Fully qualified domain name of the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
}

/// Named group of backend addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddressPoolSpec {
    /// Pool name.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_addresses: Vec<BackendAddressSpec>,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appgw.ingress.k8s.io",
    version = "v1beta1",
    kind = "AzureApplicationGatewayBackendPool",
    namespaced,
    derive = "PartialEq",
    doc = "AzureApplicationGatewayBackendPool lists backend addresses outside the cluster. Ingress backends reference it through `resource` with this kind."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureApplicationGatewayBackendPoolSpec {
    /// Address pools. Addresses of every pool are merged into one gateway pool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_address_pools: Vec<BackendAddressPoolSpec>,
}

/// Port of a referenced service, by number or by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicePortRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Service in the policy's namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBackendRef {
    pub name: String,

    #[serde(default)]
    pub port: ServicePortRef,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBackend {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceBackendRef>,
}

/// One weighted target of a load distribution policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadDistributionTarget {
    /// Free-form role label (e.g. `primary`, `canary`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Relative weight, 0-100.
    #[serde(default)]
    #[schemars(range(min = 0, max = 100))]
    pub weight: i32,

    #[serde(default)]
    pub backend: PolicyBackend,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appgw.ingress.k8s.io",
    version = "v1beta1",
    kind = "AzureApplicationGatewayLoadDistributionPolicy",
    namespaced,
    derive = "PartialEq",
    doc = "AzureApplicationGatewayLoadDistributionPolicy splits traffic for an ingress path across several services by weight."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureApplicationGatewayLoadDistributionPolicySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<LoadDistributionTarget>,
}

// ============================================================================
// Rewrites
// ============================================================================

/// Condition gating a rewrite rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewriteCondition {
    #[serde(default)]
    pub ignore_case: bool,

    #[serde(default)]
    pub negate: bool,

    /// Server variable or header (e.g. `http_req_Authorization`).
    #[serde(default)]
    pub variable: String,

    /// Fixed string or regular expression.
    #[serde(default)]
    pub pattern: String,
}

/// Header manipulation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderConfiguration {
    /// `set` or `delete`
    #[serde(default)]
    pub action_type: String,

    #[serde(default)]
    pub header_name: String,

    /// Empty when `action_type` is `delete`.
    #[serde(default)]
    pub header_value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrlConfiguration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modified_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modified_query_string: String,

    /// Re-evaluate the path map with the modified path.
    #[serde(default)]
    pub reroute: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewriteActions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_header_configurations: Vec<HeaderConfiguration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_header_configurations: Vec<HeaderConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_configuration: Option<UrlConfiguration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRuleSpec {
    pub name: String,

    /// Execution order within the rule set.
    #[serde(default)]
    #[schemars(range(min = 0, max = 1000))]
    pub rule_sequence: i32,

    #[serde(default)]
    pub actions: RewriteActions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RewriteCondition>,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appgw.ingress.k8s.io",
    version = "v1beta1",
    kind = "AzureApplicationGatewayRewrite",
    namespaced,
    derive = "PartialEq",
    doc = "AzureApplicationGatewayRewrite declares a rewrite rule set. Ingresses attach it with the rewrite-rule-set-custom-resource annotation."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureApplicationGatewayRewriteSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rewrite_rules: Vec<RewriteRuleSpec>,
}

// ============================================================================
// Instance Update Status
// ============================================================================

/// Update state of a single gateway instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceUpdateState {
    /// Gateway instance identifier.
    pub instance_name: String,

    /// Whether the instance has picked up the latest backend addresses.
    #[serde(default)]
    pub updated: bool,

    /// RFC 3339 timestamp of the last acknowledgement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appgw.ingress.k8s.io",
    version = "v1beta1",
    kind = "AzureApplicationGatewayInstanceUpdateStatus",
    namespaced,
    derive = "PartialEq",
    doc = "AzureApplicationGatewayInstanceUpdateStatus records which gateway instances have applied a backend pool update."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureApplicationGatewayInstanceUpdateStatusSpec {
    /// Backend pool the acknowledgements refer to.
    #[serde(default)]
    pub backend_pool_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceUpdateState>,
}

impl AzureApplicationGatewayInstanceUpdateStatusSpec {
    /// Whether every listed instance acknowledged the update.
    #[must_use]
    pub fn all_updated(&self) -> bool {
        !self.instances.is_empty() && self.instances.iter().all(|i| i.updated)
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
