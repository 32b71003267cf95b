// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Every option can be given as a command-line flag or through the environment. The
//! gateway coordinates are declared optional here so that [`ControllerConfig::validate`]
//! can report them with a coded [`ErrorCode::EnvironmentMissing`] instead of a clap usage
//! error.

use clap::{ArgAction, Parser};

use crate::constants::{
    DEFAULT_ARM_ENDPOINT, DEFAULT_HTTP_SERVICE_PORT, DEFAULT_INGRESS_CLASS,
    DEFAULT_RECONCILE_PERIOD_SECS, DEFAULT_STARTUP_RETRY_ATTEMPTS,
    DEFAULT_STARTUP_RETRY_INTERVAL_SECS, GATEWAY_PROVIDER, IGNORED_NAMESPACES,
};
use crate::controller_errors::{ControllerError, ErrorCode};

/// Maximum length of the configurable name prefix
const MAX_NAME_PREFIX_LENGTH: usize = 47;

/// Runtime configuration of the ingress controller.
#[derive(Parser, Clone, Debug, PartialEq)]
#[command(name = "appgw-ingress", version, about, long_about = None)]
pub struct ControllerConfig {
    /// Subscription containing the Application Gateway
    #[arg(long, env = "APPGW_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Resource group containing the Application Gateway
    #[arg(long, env = "APPGW_RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// Application Gateway name
    #[arg(long, env = "APPGW_NAME")]
    pub gateway_name: Option<String>,

    /// Comma separated namespaces to watch; empty watches all
    #[arg(long, env = "KUBERNETES_WATCHNAMESPACE", default_value = "")]
    pub watch_namespace: String,

    /// Default private-IP preference for ingresses that do not specify one
    #[arg(long, env = "USE_PRIVATE_IP", default_value_t = false, action = ArgAction::Set)]
    pub use_private_ip: bool,

    /// Share the gateway with configuration the controller does not own
    #[arg(long, env = "APPGW_ENABLE_SHARED_APPGW", default_value_t = false, action = ArgAction::Set)]
    pub enable_brownfield: bool,

    /// Accepted for compatibility; Istio resources are not watched
    #[arg(long, env = "APPGW_ENABLE_ISTIO_INTEGRATION", default_value_t = false, action = ArgAction::Set)]
    pub enable_istio: bool,

    /// Write every applied (sanitized) document to a temp file
    #[arg(long, env = "APPGW_ENABLE_SAVE_CONFIG_TO_FILE", default_value_t = false, action = ArgAction::Set)]
    pub enable_save_config_to_file: bool,

    /// Abort the process when a gateway update fails
    #[arg(long, env = "APPGW_ENABLE_PANIC_ON_PUT_ERROR", default_value_t = false, action = ArgAction::Set)]
    pub enable_panic_on_put_error: bool,

    /// Seconds between periodic reconciles
    #[arg(long, env = "APPGW_RECONCILE_PERIOD_SECONDS", default_value_t = DEFAULT_RECONCILE_PERIOD_SECS)]
    pub reconcile_period_seconds: u64,

    /// Log verbosity used when `RUST_LOG` is unset
    #[arg(long, env = "APPGW_VERBOSITY_LEVEL", default_value_t = 1)]
    pub verbosity_level: u8,

    /// Prefix prepended to every generated sub-resource name
    #[arg(long, env = "APPGW_CONFIG_NAME_PREFIX", default_value = "")]
    pub name_prefix: String,

    /// Ingress class this controller answers to
    #[arg(long, env = "INGRESS_CLASS", default_value = DEFAULT_INGRESS_CLASS)]
    pub ingress_class: String,

    /// `IngressClass.spec.controller` value this controller answers to
    #[arg(long, env = "INGRESS_CLASS_CONTROLLER", default_value = DEFAULT_INGRESS_CLASS)]
    pub ingress_class_controller: String,

    /// Azure Resource Manager endpoint
    #[arg(long, env = "AZURE_RESOURCE_MANAGER_ENDPOINT", default_value = DEFAULT_ARM_ENDPOINT)]
    pub arm_endpoint: String,

    /// File holding the ARM bearer token, re-read on every request
    #[arg(long, env = "AZURE_TOKEN_FILE")]
    pub token_file: Option<String>,

    /// Port of the metrics and health server
    #[arg(long, env = "HTTP_SERVICE_PORT", default_value_t = DEFAULT_HTTP_SERVICE_PORT)]
    pub http_service_port: u16,

    /// Name of the controller pod, used as event reporter instance
    #[arg(long, env = "AGIC_POD_NAME")]
    pub pod_name: Option<String>,

    /// Namespace of the controller pod
    #[arg(long, env = "AGIC_POD_NAMESPACE")]
    pub pod_namespace: Option<String>,

    /// Route table to associate with the gateway subnet (kubenet clusters)
    #[arg(long, env = "APPGW_ROUTE_TABLE_ID")]
    pub route_table_id: Option<String>,

    /// Gateway GET attempts before startup gives up
    #[arg(long, env = "APPGW_STARTUP_RETRY_ATTEMPTS", default_value_t = DEFAULT_STARTUP_RETRY_ATTEMPTS)]
    pub startup_retry_attempts: u32,

    /// Seconds between startup gateway GET attempts
    #[arg(long, env = "APPGW_STARTUP_RETRY_INTERVAL_SECONDS", default_value_t = DEFAULT_STARTUP_RETRY_INTERVAL_SECS)]
    pub startup_retry_interval_seconds: u64,
}

/// Coordinates of the target gateway once validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayCoordinates {
    pub subscription_id: String,
    pub resource_group: String,
    pub gateway_name: String,
}

impl GatewayCoordinates {
    /// ARM resource ID of the gateway.
    #[must_use]
    pub fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id, self.resource_group, GATEWAY_PROVIDER, self.gateway_name
        )
    }
}

impl ControllerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentMissing` when any gateway coordinate is missing and
    /// `InvalidEnvironment` when the name prefix is malformed or the reconcile period is zero.
    pub fn validate(&self) -> Result<GatewayCoordinates, ControllerError> {
        let required = |value: &Option<String>, env: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
                .ok_or_else(|| {
                    ControllerError::new(
                        ErrorCode::EnvironmentMissing,
                        format!("{env} is required"),
                    )
                })
        };

        let coordinates = GatewayCoordinates {
            subscription_id: required(&self.subscription_id, "APPGW_SUBSCRIPTION_ID")?,
            resource_group: required(&self.resource_group, "APPGW_RESOURCE_GROUP")?,
            gateway_name: required(&self.gateway_name, "APPGW_NAME")?,
        };

        if !is_valid_name_prefix(&self.name_prefix) {
            return Err(ControllerError::new(
                ErrorCode::InvalidEnvironment,
                format!(
                    "APPGW_CONFIG_NAME_PREFIX '{}' must be at most {MAX_NAME_PREFIX_LENGTH} alphanumeric or '-' characters",
                    self.name_prefix
                ),
            ));
        }

        if self.reconcile_period_seconds == 0 {
            return Err(ControllerError::new(
                ErrorCode::InvalidEnvironment,
                "APPGW_RECONCILE_PERIOD_SECONDS must be greater than zero",
            ));
        }

        Ok(coordinates)
    }

    /// Explicitly watched namespaces; empty means all.
    #[must_use]
    pub fn watch_namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self
            .watch_namespace
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(ToString::to_string)
            .collect();
        namespaces.sort();
        namespaces.dedup();
        namespaces
    }

    /// Whether events from `namespace` may be admitted.
    #[must_use]
    pub fn is_namespace_watched(&self, namespace: &str) -> bool {
        if IGNORED_NAMESPACES.contains(&namespace) {
            return false;
        }
        let watched = self.watch_namespaces();
        watched.is_empty() || watched.iter().any(|ns| ns == namespace)
    }

    /// `EnvFilter` directive derived from the verbosity level.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_level {
            0..=1 => "info",
            2..=4 => "debug",
            _ => "trace",
        }
    }
}

fn is_valid_name_prefix(prefix: &str) -> bool {
    prefix.len() <= MAX_NAME_PREFIX_LENGTH
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
