// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes event reasons emitted against Ingress objects.
//!
//! Reasons are programmatic CamelCase identifiers. Warnings that correspond one-to-one
//! with an [`ErrorCode`](crate::controller_errors::ErrorCode) reuse the code's spelling,
//! so operators can grep events and logs for the same string.
//!
//! # Example
//!
//! ```text
//! LAST SEEN   TYPE      REASON              OBJECT            MESSAGE
//! 12s         Warning   NoPrivateIPError    ingress/web       Ingress web requires Application Gateway ...
//! 4s          Warning   PortResolutionError ingress/api       Unable to resolve backend port 8080 ...
//! ```

// ============================================================================
// Pruning Reasons
// ============================================================================

/// Ingress asks for a private frontend but the gateway has none.
pub const REASON_NO_PRIVATE_IP: &str = "NoPrivateIPError";

/// Ingress enables ssl-redirect without any TLS block.
pub const REASON_REDIRECT_WITH_NO_TLS: &str = "RedirectWithNoTLS";

/// Ingress references an `appgw-ssl-certificate` the gateway does not carry.
pub const REASON_SSL_CERTIFICATE_NOT_FOUND: &str = "SslCertificateNotFound";

/// Ingress references an `appgw-trusted-root-certificate` the gateway does not carry.
pub const REASON_TRUSTED_ROOT_CERTIFICATE_NOT_FOUND: &str = "TrustedRootCertificateNotFound";

/// Every rule of the ingress targets a prohibited host or path.
pub const REASON_PROHIBITED_TARGET: &str = "ProhibitedTarget";

// ============================================================================
// Build Reasons
// ============================================================================

/// Backend service port cannot be mapped onto a container port.
pub const REASON_PORT_RESOLUTION_ERROR: &str = "PortResolutionError";

/// Backend service port matches more than one container port.
pub const REASON_MULTIPLE_PORT_BINDING: &str = "MultipleServiceBackendPortBinding";

/// Two ingresses configure the same listener differently; the loser is told.
pub const REASON_LISTENER_CONFLICT: &str = "ListenerConflict";

/// Ingress backend names a service that does not exist.
pub const REASON_INGRESS_SERVICE_TARGET_MATCH: &str = "IngressServiceTargetMatch";

/// Referenced service has no ready endpoints.
pub const REASON_ENDPOINTS_EMPTY: &str = "EndpointsEmpty";

/// TLS secret is missing or could not be converted.
pub const REASON_SECRET_NOT_FOUND: &str = "SecretNotFound";

/// Backend resource reference names a custom resource that does not exist.
pub const REASON_BACKEND_NOT_FOUND: &str = "BackendNotFound";

/// Rewrite rule set referenced by annotation does not exist.
pub const REASON_REWRITE_RULE_SET_NOT_FOUND: &str = "RewriteRuleSetNotFound";

// ============================================================================
// Status Reasons
// ============================================================================

/// Ingress load-balancer status was cleared.
pub const REASON_RESET_INGRESS_STATUS: &str = "ResetIngressStatus";

/// Ingress load-balancer status could not be written.
pub const REASON_UNABLE_TO_UPDATE_INGRESS_STATUS: &str = "UnableToUpdateIngressStatus";

/// Generated configuration failed validation.
pub const REASON_INVALID_APPGW_CONFIG: &str = "InvalidAppGwConfig";

/// Gateway update failed.
pub const REASON_FAILED_APPLYING_APPGW_CONFIG: &str = "FailedApplyingAppGwConfig";

// ============================================================================
// Actions
// ============================================================================

/// Action recorded alongside pruning events
pub const ACTION_PRUNE: &str = "Prune";

/// Action recorded alongside configuration build events
pub const ACTION_BUILD: &str = "Build";

/// Action recorded alongside status write events
pub const ACTION_UPDATE_STATUS: &str = "UpdateStatus";

/// Action recorded alongside apply events
pub const ACTION_APPLY: &str = "Apply";
