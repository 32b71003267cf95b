// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed view of the Application Gateway resource document.
//!
//! Only the slots the controller reads or writes are modelled. Every object keeps a
//! flattened `extra` map so fields unknown to the controller (WAF settings, SKU, SSL
//! policies, ...) survive a GET → PUT round trip untouched.
//!
//! Redirect configurations and the rules that use them reference each other. The
//! forward references (rule → redirect) are authoritative; the back-pointers held by the
//! redirect are cleared by [`ApplicationGateway::clear_redirect_back_pointers`] before
//! the document is serialized for an update.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants::MUTABLE_OPERATIONAL_STATES;

// ============================================================================
// Common Building Blocks
// ============================================================================

/// Reference to another ARM resource or gateway child.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubResource {
    #[serde(default)]
    pub id: String,
}

impl SubResource {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Last path segment of the ID, i.e. the referenced child's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or_default()
    }
}

/// Listener, settings and probe protocol.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Http,
    Https,
    #[serde(untagged)]
    Other(String),
}

impl Protocol {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "Http",
            Self::Https => "Https",
            Self::Other(other) => other,
        }
    }
}

/// A named child of the gateway (listener, pool, probe, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayChild<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default)]
    pub properties: P,
}

impl<P> GatewayChild<P> {
    /// Build a child with its ARM ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, properties: P) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            etag: None,
            type_: None,
            properties,
        }
    }

    /// Reference pointing at this child.
    #[must_use]
    pub fn reference(&self) -> Option<SubResource> {
        self.id.as_ref().map(SubResource::new)
    }
}

// ============================================================================
// Child Properties
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendIpConfigurationProperties {
    #[serde(rename = "privateIPAddress", default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,

    #[serde(rename = "privateIPAllocationMethod", default, skip_serializing_if = "Option::is_none")]
    pub private_ip_allocation_method: Option<String>,

    #[serde(rename = "publicIPAddress", default, skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendPortProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpListenerProperties {
    #[serde(rename = "frontendIPConfiguration", default, skip_serializing_if = "Option::is_none")]
    pub frontend_ip_configuration: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_port: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_server_name_indication: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HttpListenerProperties {
    /// All hostnames of the listener, single or multi-host form.
    #[must_use]
    pub fn all_host_names(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.host_names.clone();
        if let Some(host) = self.host_name.as_ref().filter(|h| !h.is_empty()) {
            if !hosts.contains(host) {
                hosts.push(host.clone());
            }
        }
        hosts
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificateProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_cert_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_vault_secret_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRootCertificateProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_vault_secret_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A backend member, by IP or by FQDN.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddressPoolProperties {
    #[serde(default)]
    pub backend_addresses: Vec<BackendAddress>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDraining {
    pub enabled: bool,
    pub drain_timeout_in_sec: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHttpSettingsProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    /// `Enabled` or `Disabled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_based_affinity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_host_name_from_backend_address: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_draining: Option<ConnectionDraining>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_root_certificates: Vec<SubResource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeMatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_codes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_host_name_from_backend_http_settings: Option<bool>,

    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_: Option<ProbeMatch>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Basic or path-based routing rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    Basic,
    PathBasedRouting,
    #[serde(untagged)]
    Other(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRoutingRuleProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_listener: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_http_settings: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path_map: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_configuration: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_rule_set: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_distribution_policy: Option<SubResource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRuleProperties {
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_http_settings: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_configuration: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_rule_set: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_distribution_policy: Option<SubResource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPathMapProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend_address_pool: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend_http_settings: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_redirect_configuration: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rewrite_rule_set: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_load_distribution_policy: Option<SubResource>,

    #[serde(default)]
    pub path_rules: Vec<PathRule>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectConfigurationProperties {
    /// `Permanent`, `Found`, `SeeOther` or `Temporary`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_listener: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_path: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_query_string: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_routing_rules: Vec<SubResource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_path_maps: Vec<SubResource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_rules: Vec<SubResource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRuleCondition {
    pub variable: String,
    pub pattern: String,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderConfiguration {
    pub header_name: String,
    /// Empty deletes the header.
    #[serde(default)]
    pub header_value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_query_string: Option<String>,
    #[serde(default)]
    pub reroute: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteActionSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_header_configurations: Vec<HeaderConfiguration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_header_configurations: Vec<HeaderConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_configuration: Option<UrlConfiguration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRule {
    pub name: String,
    #[serde(default)]
    pub rule_sequence: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RewriteRuleCondition>,
    #[serde(default)]
    pub action_set: RewriteActionSet,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRuleSetProperties {
    #[serde(default)]
    pub rewrite_rules: Vec<RewriteRule>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDistributionTargetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_per_server: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_address_pool: Option<SubResource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDistributionPolicyProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_distribution_algorithm: Option<String>,

    #[serde(default)]
    pub load_distribution_targets: Vec<LoadDistributionTarget>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type FrontendIpConfiguration = GatewayChild<FrontendIpConfigurationProperties>;
pub type FrontendPort = GatewayChild<FrontendPortProperties>;
pub type HttpListener = GatewayChild<HttpListenerProperties>;
pub type SslCertificate = GatewayChild<SslCertificateProperties>;
pub type TrustedRootCertificate = GatewayChild<TrustedRootCertificateProperties>;
pub type BackendAddressPool = GatewayChild<BackendAddressPoolProperties>;
pub type BackendHttpSettings = GatewayChild<BackendHttpSettingsProperties>;
pub type Probe = GatewayChild<ProbeProperties>;
pub type RequestRoutingRule = GatewayChild<RequestRoutingRuleProperties>;
pub type UrlPathMap = GatewayChild<UrlPathMapProperties>;
pub type PathRule = GatewayChild<PathRuleProperties>;
pub type RedirectConfiguration = GatewayChild<RedirectConfigurationProperties>;
pub type RewriteRuleSet = GatewayChild<RewriteRuleSetProperties>;
pub type LoadDistributionPolicy = GatewayChild<LoadDistributionPolicyProperties>;
pub type LoadDistributionTarget = GatewayChild<LoadDistributionTargetProperties>;

// ============================================================================
// Gateway
// ============================================================================

/// The gateway's `properties` bag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,

    #[serde(rename = "frontendIPConfigurations", default)]
    pub frontend_ip_configurations: Vec<FrontendIpConfiguration>,

    #[serde(default)]
    pub frontend_ports: Vec<FrontendPort>,

    #[serde(default)]
    pub http_listeners: Vec<HttpListener>,

    #[serde(default)]
    pub ssl_certificates: Vec<SslCertificate>,

    #[serde(default)]
    pub trusted_root_certificates: Vec<TrustedRootCertificate>,

    #[serde(default)]
    pub backend_address_pools: Vec<BackendAddressPool>,

    #[serde(default)]
    pub backend_http_settings_collection: Vec<BackendHttpSettings>,

    #[serde(default)]
    pub probes: Vec<Probe>,

    #[serde(default)]
    pub request_routing_rules: Vec<RequestRoutingRule>,

    #[serde(default)]
    pub url_path_maps: Vec<UrlPathMap>,

    #[serde(default)]
    pub redirect_configurations: Vec<RedirectConfiguration>,

    #[serde(default)]
    pub rewrite_rule_sets: Vec<RewriteRuleSet>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load_distribution_policies: Vec<LoadDistributionPolicy>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An Application Gateway resource as returned by ARM.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub properties: GatewayProperties,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApplicationGateway {
    /// Reported operational state (`Running`, `Stopped`, ...).
    #[must_use]
    pub fn operational_state(&self) -> Option<&str> {
        self.properties.operational_state.as_deref()
    }

    /// Whether an update may be issued in the current operational state.
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.operational_state()
            .is_some_and(|state| MUTABLE_OPERATIONAL_STATES.contains(&state))
    }

    /// First frontend IP configuration of the requested kind.
    #[must_use]
    pub fn frontend_ip(&self, private: bool) -> Option<&FrontendIpConfiguration> {
        self.properties.frontend_ip_configurations.iter().find(|fip| {
            if private {
                fip.properties.private_ip_address.is_some()
            } else {
                fip.properties.public_ip_address.is_some()
            }
        })
    }

    /// Whether the gateway exposes a private frontend.
    #[must_use]
    pub fn has_private_frontend(&self) -> bool {
        self.frontend_ip(true).is_some()
    }

    /// Set a tag, creating the tag map when absent.
    pub fn set_tag(&mut self, key: &str, value: &str) {
        self.tags
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
    }

    /// Drop the redirect → rule/map/path-rule back-pointers. ARM reconstructs them.
    pub fn clear_redirect_back_pointers(&mut self) {
        for redirect in &mut self.properties.redirect_configurations {
            redirect.properties.request_routing_rules.clear();
            redirect.properties.url_path_maps.clear();
            redirect.properties.path_rules.clear();
        }
    }

    /// Names of every SSL certificate installed on the gateway.
    #[must_use]
    pub fn ssl_certificate_names(&self) -> Vec<&str> {
        self.properties
            .ssl_certificates
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Names of every trusted root certificate installed on the gateway.
    #[must_use]
    pub fn trusted_root_certificate_names(&self) -> Vec<&str> {
        self.properties
            .trusted_root_certificates
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Subnet the gateway instances are deployed into.
    #[must_use]
    pub fn subnet_id(&self) -> Option<&str> {
        self.properties
            .extra
            .get("gatewayIPConfigurations")
            .and_then(|configs| configs.pointer("/0/properties/subnet/id"))
            .and_then(Value::as_str)
    }

    /// Port number of a frontend port referenced by ID.
    #[must_use]
    pub fn frontend_port_number(&self, reference: &SubResource) -> Option<i32> {
        self.properties
            .frontend_ports
            .iter()
            .find(|p| p.id.as_deref() == Some(reference.id.as_str()) || p.name == reference.name())
            .and_then(|p| p.properties.port)
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod document_tests;
