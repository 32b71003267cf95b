// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Application Gateway ingress controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the controller's custom resources
pub const API_GROUP: &str = "appgw.ingress.k8s.io";

/// Stable API version for target and backend-pool resources
pub const API_VERSION_V1: &str = "v1";

/// Beta API version for rewrite, load distribution and instance status resources
pub const API_VERSION_V1BETA1: &str = "v1beta1";

/// Kind name for `AzureApplicationGatewayBackendPool` backend references
pub const KIND_BACKEND_POOL: &str = "AzureApplicationGatewayBackendPool";

/// Kind name for `AzureApplicationGatewayLoadDistributionPolicy` backend references
pub const KIND_LOAD_DISTRIBUTION_POLICY: &str = "AzureApplicationGatewayLoadDistributionPolicy";

/// Name reported as the event source and field manager
pub const CONTROLLER_NAME: &str = "appgw-ingress-controller";

/// Ingress class value this controller answers to unless configured otherwise
pub const DEFAULT_INGRESS_CLASS: &str = "azure/application-gateway";

/// Annotation set on an `IngressClass` that marks it as the cluster default
pub const DEFAULT_INGRESS_CLASS_ANNOTATION: &str = "ingressclass.kubernetes.io/is-default-class";

/// Namespaces whose events are never admitted
pub const IGNORED_NAMESPACES: &[&str] = &["kube-system", "kube-public"];

// ============================================================================
// Gateway Document Constants
// ============================================================================

/// ARM resource provider path segment for Application Gateways
pub const GATEWAY_PROVIDER: &str = "Microsoft.Network/applicationGateways";

/// ARM API version used for gateway GET/PUT
pub const ARM_API_VERSION: &str = "2023-09-01";

/// Default ARM endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Tag marking a gateway as programmed by this controller
pub const MANAGED_BY_TAG: &str = "managed-by-k8s-ingress";

/// Value written into [`MANAGED_BY_TAG`]
pub const MANAGED_BY_TAG_VALUE: &str = "true";

/// Passphrase every generated PFX blob is encrypted with
pub const PFX_PASSPHRASE: &str = "msazure";

/// Gateway operational states in which an update may be issued
pub const MUTABLE_OPERATIONAL_STATES: &[&str] = &["Running", "Starting"];

/// Maximum length of a generated sub-resource name
pub const MAX_RESOURCE_NAME_LENGTH: usize = 80;

/// Number of digest characters kept when a name has to be shortened
pub const NAME_HASH_LENGTH: usize = 32;

/// Maximum hostnames on a single listener
pub const MAX_LISTENER_HOSTNAMES: usize = 5;

/// First routing rule priority handed out to generated rules
pub const ROUTING_RULE_PRIORITY_BASE: i32 = 19000;

/// Step between consecutive generated routing rule priorities
pub const ROUTING_RULE_PRIORITY_STEP: i32 = 5;

// ============================================================================
// Reserved Names
// ============================================================================

/// Name of the always-present default HTTP settings
pub const DEFAULT_HTTP_SETTINGS_NAME: &str = "defaulthttpsetting";

/// Name of the always-present (empty) default backend pool
pub const DEFAULT_BACKEND_POOL_NAME: &str = "defaultaddresspool";

/// Prefix of the reserved default probes (`defaultprobe-Http`, `defaultprobe-Https`)
pub const DEFAULT_PROBE_PREFIX: &str = "defaultprobe-";

/// Prefix of rewrite rule sets materialized from custom resources
pub const REWRITE_CRD_PREFIX: &str = "crd-";

// ============================================================================
// Port and Protocol Defaults
// ============================================================================

/// Frontend port for plain HTTP listeners
pub const HTTP_PORT: i32 = 80;

/// Frontend port for TLS listeners
pub const HTTPS_PORT: i32 = 443;

/// Default backend request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: i32 = 30;

/// Default connection draining timeout in seconds
pub const DEFAULT_CONNECTION_DRAINING_TIMEOUT_SECS: i32 = 30;

/// Default probe host
pub const DEFAULT_PROBE_HOST: &str = "localhost";

/// Default probe path
pub const DEFAULT_PROBE_PATH: &str = "/";

/// Default probe interval in seconds
pub const DEFAULT_PROBE_INTERVAL_SECS: i32 = 30;

/// Default probe timeout in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: i32 = 30;

/// Default probe unhealthy threshold
pub const DEFAULT_PROBE_UNHEALTHY_THRESHOLD: i32 = 3;

// ============================================================================
// Worker and Event Bus Timing
// ============================================================================

/// Default interval between periodic reconcile events (seconds)
pub const DEFAULT_RECONCILE_PERIOD_SECS: u64 = 30;

/// Minimum gap between two applies (milliseconds)
pub const MIN_TIME_BETWEEN_UPDATES_MILLIS: u64 = 1000;

/// Sleep after a failed reconcile (seconds)
pub const SLEEP_ON_ERROR_SECS: u64 = 5;

/// Capacity of the event bus before the oldest events are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Default number of gateway GET attempts at startup
pub const DEFAULT_STARTUP_RETRY_ATTEMPTS: u32 = 60;

/// Default interval between startup gateway GET attempts (seconds)
pub const DEFAULT_STARTUP_RETRY_INTERVAL_SECS: u64 = 10;

/// Default port for the metrics and health HTTP server
pub const DEFAULT_HTTP_SERVICE_PORT: u16 = 8123;
