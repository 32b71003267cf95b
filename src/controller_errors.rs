// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for the ingress controller.
//!
//! Every failure the reconcile path can surface carries a stable [`ErrorCode`]. Codes are
//! rendered as CamelCase identifiers and reused verbatim as Kubernetes event reasons and
//! metric labels, so they must never be renamed.
//!
//! Codes fall into four categories:
//!
//! - **Input** errors describe a single offending Ingress. They become warning events and
//!   never abort the reconcile for other Ingresses.
//! - **Build** errors describe a malformed generated document. They abort the current
//!   reconcile.
//! - **Apply** errors come from the cloud control plane. They invalidate the config cache.
//! - **Environment** errors are fatal at startup.

use std::fmt;
use thiserror::Error;

/// Broad class of an [`ErrorCode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Build,
    Apply,
    Environment,
}

/// Stable identifier of a controller failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input
    NoSuchNamespace,
    ServiceNotFound,
    EndpointsEmpty,
    SecretNotFound,
    MalformedSecret,
    UnknownSecretType,
    ExportingError,
    MultipleServiceBackendPortBinding,
    UnableToResolveBackendPort,
    BackendPoolNotFound,
    LoadDistributionPolicyNotFound,
    RewriteRuleSetNotFound,

    // Build
    NoDefaults,
    EitherDefaults,
    NoBackendorRedirect,
    EitherBackendorRedirect,
    NoPublicIP,
    NoPrivateIP,
    EmptyConfig,
    DuplicateResourceName,
    UnmanagedResourceCollision,

    // Apply
    FetchingAppGatewayConfig,
    DeployingAppGatewayConfig,
    GatewayNotFound,
    GatewayForbidden,
    GatewayNotMutable,
    FetchingPublicIP,

    // Environment
    EnvironmentMissing,
    InvalidEnvironment,
}

impl ErrorCode {
    /// Stable CamelCase spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSuchNamespace => "NoSuchNamespace",
            Self::ServiceNotFound => "ServiceNotFound",
            Self::EndpointsEmpty => "EndpointsEmpty",
            Self::SecretNotFound => "SecretNotFound",
            Self::MalformedSecret => "MalformedSecret",
            Self::UnknownSecretType => "UnknownSecretType",
            Self::ExportingError => "ExportingError",
            Self::MultipleServiceBackendPortBinding => "MultipleServiceBackendPortBinding",
            Self::UnableToResolveBackendPort => "UnableToResolveBackendPort",
            Self::BackendPoolNotFound => "BackendPoolNotFound",
            Self::LoadDistributionPolicyNotFound => "LoadDistributionPolicyNotFound",
            Self::RewriteRuleSetNotFound => "RewriteRuleSetNotFound",
            Self::NoDefaults => "NoDefaults",
            Self::EitherDefaults => "EitherDefaults",
            Self::NoBackendorRedirect => "NoBackendorRedirect",
            Self::EitherBackendorRedirect => "EitherBackendorRedirect",
            Self::NoPublicIP => "NoPublicIP",
            Self::NoPrivateIP => "NoPrivateIP",
            Self::EmptyConfig => "EmptyConfig",
            Self::DuplicateResourceName => "DuplicateResourceName",
            Self::UnmanagedResourceCollision => "UnmanagedResourceCollision",
            Self::FetchingAppGatewayConfig => "FetchingAppGatewayConfig",
            Self::DeployingAppGatewayConfig => "DeployingAppGatewayConfig",
            Self::GatewayNotFound => "GatewayNotFound",
            Self::GatewayForbidden => "GatewayForbidden",
            Self::GatewayNotMutable => "GatewayNotMutable",
            Self::FetchingPublicIP => "FetchingPublicIP",
            Self::EnvironmentMissing => "EnvironmentMissing",
            Self::InvalidEnvironment => "InvalidEnvironment",
        }
    }

    /// Category the code belongs to.
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::NoSuchNamespace
            | Self::ServiceNotFound
            | Self::EndpointsEmpty
            | Self::SecretNotFound
            | Self::MalformedSecret
            | Self::UnknownSecretType
            | Self::ExportingError
            | Self::MultipleServiceBackendPortBinding
            | Self::UnableToResolveBackendPort
            | Self::BackendPoolNotFound
            | Self::LoadDistributionPolicyNotFound
            | Self::RewriteRuleSetNotFound => ErrorCategory::Input,
            Self::NoDefaults
            | Self::EitherDefaults
            | Self::NoBackendorRedirect
            | Self::EitherBackendorRedirect
            | Self::NoPublicIP
            | Self::NoPrivateIP
            | Self::EmptyConfig
            | Self::DuplicateResourceName
            | Self::UnmanagedResourceCollision => ErrorCategory::Build,
            Self::FetchingAppGatewayConfig
            | Self::DeployingAppGatewayConfig
            | Self::GatewayNotFound
            | Self::GatewayForbidden
            | Self::GatewayNotMutable
            | Self::FetchingPublicIP => ErrorCategory::Apply,
            Self::EnvironmentMissing | Self::InvalidEnvironment => ErrorCategory::Environment,
        }
    }

    /// Whether this code aborts the current reconcile.
    #[must_use]
    pub fn is_fatal_for_reconcile(self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Build | ErrorCategory::Apply | ErrorCategory::Environment
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coded controller error with an optional inner cause.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}{}", .inner.as_ref().map(|i| format!(" ({i})")).unwrap_or_default())]
pub struct ControllerError {
    /// Stable error code
    pub code: ErrorCode,
    /// Human readable description
    pub message: String,
    /// Rendered cause, if the error wraps another failure
    pub inner: Option<String>,
}

impl ControllerError {
    /// Create an error without an inner cause.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            inner: None,
        }
    }

    /// Create an error wrapping another failure.
    pub fn with_inner(
        code: ErrorCode,
        message: impl Into<String>,
        inner: impl fmt::Display,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            inner: Some(inner.to_string()),
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

#[cfg(test)]
#[path = "controller_errors_tests.rs"]
mod controller_errors_tests;
