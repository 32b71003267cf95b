// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress annotation keys understood by the controller and their parsed form.
//!
//! Every key lives under the `appgw.ingress.kubernetes.io/` prefix except the legacy
//! class annotation. Values that fail to parse are ignored (logged at debug) and the
//! documented default is used instead.

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::debug;

use crate::constants::{DEFAULT_CONNECTION_DRAINING_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

// ============================================================================
// Annotation Keys
// ============================================================================

/// Prefix shared by all controller annotations
pub const ANNOTATION_PREFIX: &str = "appgw.ingress.kubernetes.io";

/// Legacy ingress class annotation
pub const INGRESS_CLASS: &str = "kubernetes.io/ingress.class";

/// Redirect HTTP listeners to their HTTPS counterpart
pub const SSL_REDIRECT: &str = "appgw.ingress.kubernetes.io/ssl-redirect";

/// Listen on the gateway's private frontend
pub const USE_PRIVATE_IP: &str = "appgw.ingress.kubernetes.io/use-private-ip";

/// Path prefix prepended to requests sent to the backend
pub const BACKEND_PATH_PREFIX: &str = "appgw.ingress.kubernetes.io/backend-path-prefix";

/// Host header sent to the backend
pub const BACKEND_HOSTNAME: &str = "appgw.ingress.kubernetes.io/backend-hostname";

/// Protocol used to talk to the backend (`http` or `https`)
pub const BACKEND_PROTOCOL: &str = "appgw.ingress.kubernetes.io/backend-protocol";

/// Enable connection draining on backend removal
pub const CONNECTION_DRAINING: &str = "appgw.ingress.kubernetes.io/connection-draining";

/// Connection draining timeout in seconds
pub const CONNECTION_DRAINING_TIMEOUT: &str =
    "appgw.ingress.kubernetes.io/connection-draining-timeout";

/// Enable cookie based session affinity
pub const COOKIE_BASED_AFFINITY: &str = "appgw.ingress.kubernetes.io/cookie-based-affinity";

/// Backend request timeout in seconds
pub const REQUEST_TIMEOUT: &str = "appgw.ingress.kubernetes.io/request-timeout";

/// Probe path override
pub const HEALTH_PROBE_PATH: &str = "appgw.ingress.kubernetes.io/health-probe-path";

/// Probe host override
pub const HEALTH_PROBE_HOSTNAME: &str = "appgw.ingress.kubernetes.io/health-probe-hostname";

/// Probe port override
pub const HEALTH_PROBE_PORT: &str = "appgw.ingress.kubernetes.io/health-probe-port";

/// Probe interval override (seconds)
pub const HEALTH_PROBE_INTERVAL: &str = "appgw.ingress.kubernetes.io/health-probe-interval";

/// Probe timeout override (seconds)
pub const HEALTH_PROBE_TIMEOUT: &str = "appgw.ingress.kubernetes.io/health-probe-timeout";

/// Probe unhealthy threshold override
pub const HEALTH_PROBE_UNHEALTHY_THRESHOLD: &str =
    "appgw.ingress.kubernetes.io/health-probe-unhealthy-threshold";

/// Comma separated accepted probe status codes (e.g. `200-399,401`)
pub const HEALTH_PROBE_STATUS_CODES: &str =
    "appgw.ingress.kubernetes.io/health-probe-status-codes";

/// Name of an SSL certificate pre-installed on the gateway
pub const APPGW_SSL_CERTIFICATE: &str = "appgw.ingress.kubernetes.io/appgw-ssl-certificate";

/// Comma separated names of trusted root certificates pre-installed on the gateway
pub const APPGW_TRUSTED_ROOT_CERTIFICATE: &str =
    "appgw.ingress.kubernetes.io/appgw-trusted-root-certificate";

/// Frontend port override for the ingress listeners
pub const OVERRIDE_FRONTEND_PORT: &str = "appgw.ingress.kubernetes.io/override-frontend-port";

/// Name of an existing rewrite rule set on the gateway
pub const REWRITE_RULE_SET: &str = "appgw.ingress.kubernetes.io/rewrite-rule-set";

/// Name of an `AzureApplicationGatewayRewrite` resource in the ingress namespace
pub const REWRITE_RULE_SET_CUSTOM_RESOURCE: &str =
    "appgw.ingress.kubernetes.io/rewrite-rule-set-custom-resource";

/// Comma separated extra hostnames added to every rule of the ingress
pub const HOSTNAME_EXTENSION: &str = "appgw.ingress.kubernetes.io/hostname-extension";

// ============================================================================
// Parsed Annotations
// ============================================================================

/// Protocol spoken between the gateway and the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendProtocol {
    #[default]
    Http,
    Https,
}

impl BackendProtocol {
    /// Gateway wire spelling (`Http` / `Https`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "Http",
            Self::Https => "Https",
        }
    }
}

/// Typed view of every annotation the builder and pruner consult.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IngressAnnotations {
    pub ingress_class: Option<String>,
    pub ssl_redirect: bool,
    /// `None` when the ingress does not express a preference.
    pub use_private_ip: Option<bool>,
    pub backend_path_prefix: Option<String>,
    pub backend_hostname: Option<String>,
    pub backend_protocol: Option<BackendProtocol>,
    pub connection_draining: bool,
    pub connection_draining_timeout: i32,
    pub cookie_based_affinity: bool,
    pub request_timeout: i32,
    pub health_probe_path: Option<String>,
    pub health_probe_hostname: Option<String>,
    pub health_probe_port: Option<i32>,
    pub health_probe_interval: Option<i32>,
    pub health_probe_timeout: Option<i32>,
    pub health_probe_unhealthy_threshold: Option<i32>,
    pub health_probe_status_codes: Vec<String>,
    pub appgw_ssl_certificate: Option<String>,
    pub appgw_trusted_root_certificates: Vec<String>,
    pub override_frontend_port: Option<i32>,
    pub rewrite_rule_set: Option<String>,
    pub rewrite_rule_set_custom_resource: Option<String>,
    pub hostname_extensions: Vec<String>,
}

impl IngressAnnotations {
    /// Parse the annotation bag of an ingress.
    #[must_use]
    pub fn from_ingress(ingress: &Ingress) -> Self {
        let bag = ingress.annotations();
        let get = |key: &str| {
            bag.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            ingress_class: get(INGRESS_CLASS),
            ssl_redirect: parse_bool(get(SSL_REDIRECT), SSL_REDIRECT).unwrap_or(false),
            use_private_ip: parse_bool(get(USE_PRIVATE_IP), USE_PRIVATE_IP),
            backend_path_prefix: get(BACKEND_PATH_PREFIX),
            backend_hostname: get(BACKEND_HOSTNAME),
            backend_protocol: get(BACKEND_PROTOCOL).and_then(|v| parse_protocol(&v)),
            connection_draining: parse_bool(get(CONNECTION_DRAINING), CONNECTION_DRAINING)
                .unwrap_or(false),
            connection_draining_timeout: parse_i32(
                get(CONNECTION_DRAINING_TIMEOUT),
                CONNECTION_DRAINING_TIMEOUT,
            )
            .unwrap_or(DEFAULT_CONNECTION_DRAINING_TIMEOUT_SECS),
            cookie_based_affinity: parse_bool(get(COOKIE_BASED_AFFINITY), COOKIE_BASED_AFFINITY)
                .unwrap_or(false),
            request_timeout: parse_i32(get(REQUEST_TIMEOUT), REQUEST_TIMEOUT)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            health_probe_path: get(HEALTH_PROBE_PATH),
            health_probe_hostname: get(HEALTH_PROBE_HOSTNAME),
            health_probe_port: parse_i32(get(HEALTH_PROBE_PORT), HEALTH_PROBE_PORT),
            health_probe_interval: parse_i32(get(HEALTH_PROBE_INTERVAL), HEALTH_PROBE_INTERVAL),
            health_probe_timeout: parse_i32(get(HEALTH_PROBE_TIMEOUT), HEALTH_PROBE_TIMEOUT),
            health_probe_unhealthy_threshold: parse_i32(
                get(HEALTH_PROBE_UNHEALTHY_THRESHOLD),
                HEALTH_PROBE_UNHEALTHY_THRESHOLD,
            ),
            health_probe_status_codes: split_list(get(HEALTH_PROBE_STATUS_CODES)),
            appgw_ssl_certificate: get(APPGW_SSL_CERTIFICATE),
            appgw_trusted_root_certificates: split_list(get(APPGW_TRUSTED_ROOT_CERTIFICATE)),
            override_frontend_port: parse_i32(get(OVERRIDE_FRONTEND_PORT), OVERRIDE_FRONTEND_PORT)
                .filter(|p| (1..=65535).contains(p)),
            rewrite_rule_set: get(REWRITE_RULE_SET),
            rewrite_rule_set_custom_resource: get(REWRITE_RULE_SET_CUSTOM_RESOURCE),
            hostname_extensions: split_list(get(HOSTNAME_EXTENSION)),
        }
    }

    /// Effective private-IP preference given the controller-wide default.
    #[must_use]
    pub fn uses_private_ip(&self, default: bool) -> bool {
        self.use_private_ip.unwrap_or(default)
    }

    /// Effective backend protocol.
    #[must_use]
    pub fn protocol(&self) -> BackendProtocol {
        self.backend_protocol.unwrap_or_default()
    }
}

fn parse_bool(value: Option<String>, key: &str) -> Option<bool> {
    let value = value?;
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => {
            debug!(annotation = key, value = %value, "Ignoring malformed boolean annotation");
            None
        }
    }
}

fn parse_i32(value: Option<String>, key: &str) -> Option<i32> {
    let value = value?;
    match value.parse::<i32>() {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(annotation = key, value = %value, error = %e, "Ignoring malformed integer annotation");
            None
        }
    }
}

fn parse_protocol(value: &str) -> Option<BackendProtocol> {
    match value.to_ascii_lowercase().as_str() {
        "http" => Some(BackendProtocol::Http),
        "https" => Some(BackendProtocol::Https),
        _ => {
            debug!(annotation = BACKEND_PROTOCOL, value = %value, "Ignoring unknown backend protocol");
            None
        }
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;
