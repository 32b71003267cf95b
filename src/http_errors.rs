// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP status mapping for Azure Resource Manager responses.
//!
//! The cloud client only sees status codes. This module turns them into the controller's
//! stable [`ErrorCode`]s so the reconciler, the events and the metrics all speak the same
//! vocabulary.
//!
//! # Usage
//!
//! ```rust
//! use appgw_ingress::controller_errors::ErrorCode;
//! use appgw_ingress::http_errors::{map_arm_status_to_code, ArmOperation};
//!
//! let (code, message) = map_arm_status_to_code(404, ArmOperation::GetGateway);
//! assert_eq!(code, ErrorCode::GatewayNotFound);
//! assert!(message.contains("404"));
//! ```

use crate::controller_errors::ErrorCode;

/// The ARM call that produced a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmOperation {
    GetGateway,
    UpdateGateway,
    GetPublicIp,
    GetSubnet,
    ApplyRouteTable,
}

impl ArmOperation {
    fn describe(self) -> &'static str {
        match self {
            Self::GetGateway => "fetching Application Gateway",
            Self::UpdateGateway => "updating Application Gateway",
            Self::GetPublicIp => "fetching public IP address",
            Self::GetSubnet => "fetching subnet",
            Self::ApplyRouteTable => "associating route table",
        }
    }

    /// Code used for statuses with no more specific mapping.
    fn fallback_code(self) -> ErrorCode {
        match self {
            Self::GetGateway | Self::GetSubnet => ErrorCode::FetchingAppGatewayConfig,
            Self::UpdateGateway | Self::ApplyRouteTable => ErrorCode::DeployingAppGatewayConfig,
            Self::GetPublicIp => ErrorCode::FetchingPublicIP,
        }
    }
}

/// Map an ARM HTTP status code to an error code and message.
///
/// # Arguments
///
/// * `status_code` - HTTP status code returned by ARM
/// * `operation` - The call that produced it
///
/// # Returns
///
/// A tuple of `(code, message)`.
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Code | Meaning |
/// |-----------|------|---------|
/// | 401 | `GatewayForbidden` | Token rejected |
/// | 403 | `GatewayForbidden` | Identity lacks permissions |
/// | 404 | `GatewayNotFound` | Gateway or child resource absent |
/// | Other | operation specific | `FetchingAppGatewayConfig`, `DeployingAppGatewayConfig` or `FetchingPublicIP` |
#[must_use]
pub fn map_arm_status_to_code(status_code: u16, operation: ArmOperation) -> (ErrorCode, String) {
    let what = operation.describe();
    match status_code {
        401 => (
            ErrorCode::GatewayForbidden,
            format!("ARM rejected the credentials while {what} (401)"),
        ),
        403 => (
            ErrorCode::GatewayForbidden,
            format!("Identity is not authorized for {what} (403)"),
        ),
        404 => (
            ErrorCode::GatewayNotFound,
            format!("Resource not found while {what} (404)"),
        ),
        429 => (
            operation.fallback_code(),
            format!("ARM throttled the request while {what} (429)"),
        ),
        500..=599 => (
            operation.fallback_code(),
            format!("ARM server error while {what} ({status_code})"),
        ),
        _ => (
            operation.fallback_code(),
            format!("Unexpected HTTP status while {what} ({status_code})"),
        ),
    }
}

/// Map a transport failure (no HTTP status received) to an error code and message.
#[must_use]
pub fn map_connection_error(operation: ArmOperation) -> (ErrorCode, String) {
    (
        operation.fallback_code(),
        format!(
            "Unable to reach Azure Resource Manager while {}",
            operation.describe()
        ),
    )
}
