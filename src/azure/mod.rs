// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Resource Manager client for the Application Gateway.
//!
//! [`GatewayClient`] is the narrow interface the reconciler consumes. The production
//! implementation, [`ArmGatewayClient`], talks to ARM over `reqwest`:
//!
//! - every request carries the bearer token read from the configured token file
//!   (credential acquisition happens outside the controller);
//! - transient failures are retried through [`retry::retry_arm_call`];
//! - long-running `PUT`s are followed through their `Azure-AsyncOperation` (or
//!   `Location`) header until ARM reports a terminal state.

pub mod retry;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::appgw::document::ApplicationGateway;
use crate::config::{ControllerConfig, GatewayCoordinates};
use crate::constants::ARM_API_VERSION;
use crate::controller_errors::{ControllerError, ErrorCode};
use crate::http_errors::{map_arm_status_to_code, map_connection_error, ArmOperation};
use crate::metrics;

use retry::{retry_arm_call, ArmCallError, RetrySettings};

/// Header naming the status monitor of a long-running operation
const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

/// Per-request timeout
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default gap between two polls of a long-running operation
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Give up following a long-running operation after this long (30 minutes)
const MAX_OPERATION_SECS: u64 = 1800;

/// Operations the controller performs against ARM.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Fetch the live gateway document.
    async fn get_gateway(&self) -> Result<ApplicationGateway, ControllerError>;

    /// Replace the gateway document and wait for the deployment to finish.
    async fn update_gateway(&self, gateway: &ApplicationGateway) -> Result<(), ControllerError>;

    /// Address of the public IP resource `resource_id`, if allocated.
    async fn get_public_ip(&self, resource_id: &str) -> Result<Option<String>, ControllerError>;

    /// Address prefix of the subnet `resource_id`.
    async fn get_subnet(&self, resource_id: &str) -> Result<Option<String>, ControllerError>;

    /// Associate `route_table_id` with the subnet `subnet_id`.
    async fn apply_route_table(
        &self,
        subnet_id: &str,
        route_table_id: &str,
    ) -> Result<(), ControllerError>;
}

/// Map a failed call onto the controller error taxonomy.
fn to_controller_error(operation: ArmOperation, err: ArmCallError) -> ControllerError {
    let (code, message) = match err.status {
        Some(status) => map_arm_status_to_code(status, operation),
        None if err.transient => map_connection_error(operation),
        None => (
            match operation {
                ArmOperation::GetGateway | ArmOperation::GetSubnet => {
                    ErrorCode::FetchingAppGatewayConfig
                }
                ArmOperation::GetPublicIp => ErrorCode::FetchingPublicIP,
                ArmOperation::UpdateGateway | ArmOperation::ApplyRouteTable => {
                    ErrorCode::DeployingAppGatewayConfig
                }
            },
            "Azure Resource Manager call failed".to_string(),
        ),
    };
    ControllerError::with_inner(code, message, err)
}

/// Production [`GatewayClient`] backed by the ARM REST API.
pub struct ArmGatewayClient {
    http: HttpClient,
    endpoint: String,
    gateway_id: String,
    token_file: Option<String>,
    retry: RetrySettings,
    poll_interval: Duration,
}

impl ArmGatewayClient {
    /// Create a client for the gateway at `coordinates`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnvironment` when the endpoint is not a URL or the HTTP client
    /// cannot be constructed.
    pub fn new(
        config: &ControllerConfig,
        coordinates: &GatewayCoordinates,
    ) -> Result<Self, ControllerError> {
        let endpoint = url::Url::parse(&config.arm_endpoint).map_err(|e| {
            ControllerError::with_inner(
                ErrorCode::InvalidEnvironment,
                format!("Invalid ARM endpoint '{}'", config.arm_endpoint),
                e,
            )
        })?;
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                ControllerError::with_inner(
                    ErrorCode::InvalidEnvironment,
                    "Unable to build HTTP client",
                    e,
                )
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            gateway_id: coordinates.resource_id(),
            token_file: config.token_file.clone(),
            retry: RetrySettings::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        })
    }

    /// Override retry limits and the long-running operation poll interval.
    #[must_use]
    pub fn with_timing(mut self, retry: RetrySettings, poll_interval: Duration) -> Self {
        self.retry = retry;
        self.poll_interval = poll_interval;
        self
    }

    /// ARM resource ID of the managed gateway.
    #[must_use]
    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    fn resource_url(&self, resource_id: &str) -> String {
        format!(
            "{}{resource_id}?api-version={ARM_API_VERSION}",
            self.endpoint
        )
    }

    async fn token(&self) -> Result<Option<String>, ArmCallError> {
        let Some(path) = self.token_file.as_deref() else {
            return Ok(None);
        };
        let token = tokio::fs::read_to_string(path).await.map_err(|e| {
            ArmCallError::permanent(format!("Unable to read token file {path}: {e}"))
        })?;
        Ok(Some(token.trim().to_string()))
    }

    /// Send one request and return the status, headers and body of a 2xx response.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, HeaderMap, String), ArmCallError> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = self.token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArmCallError::transport(format!("{method} {url}: {e}")))?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| ArmCallError::transport(format!("Reading response of {method} {url}: {e}")))?;

        if status.is_success() {
            Ok((status, headers, text))
        } else {
            Err(ArmCallError::from_status(status, arm_error_message(&text)))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: ArmOperation,
        name: &str,
        resource_id: &str,
    ) -> Result<T, ControllerError> {
        let url = self.resource_url(resource_id);
        retry_arm_call(self.retry, name, || async {
            let (_, _, text) = self.send(Method::GET, &url, None).await?;
            serde_json::from_str::<T>(&text)
                .map_err(|e| ArmCallError::permanent(format!("Unable to decode {resource_id}: {e}")))
        })
        .await
        .map_err(|e| to_controller_error(operation, e))
    }

    /// `PUT` `body` to `resource_id` and follow the operation until it completes.
    async fn put_and_wait(
        &self,
        operation: ArmOperation,
        name: &str,
        resource_id: &str,
        body: &Value,
    ) -> Result<(), ControllerError> {
        let url = self.resource_url(resource_id);
        let (status, headers) = retry_arm_call(self.retry, name, || async {
            let (status, headers, _) = self.send(Method::PUT, &url, Some(body)).await?;
            Ok((status, headers))
        })
        .await
        .map_err(|e| to_controller_error(operation, e))?;

        self.wait_for_completion(status, &headers)
            .await
            .map_err(|e| to_controller_error(operation, e))
    }

    /// Follow a long-running operation started by a response with `status`/`headers`.
    async fn wait_for_completion(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Result<(), ArmCallError> {
        let async_operation = header_str(headers, ASYNC_OPERATION_HEADER);
        let location = header_str(headers, LOCATION.as_str());
        let started = Instant::now();
        let mut delay = retry_after(headers).unwrap_or(self.poll_interval);

        if let Some(monitor) = async_operation {
            loop {
                if started.elapsed() > Duration::from_secs(MAX_OPERATION_SECS) {
                    return Err(ArmCallError::permanent("Timed out waiting for ARM operation"));
                }
                tokio::time::sleep(delay).await;
                let (_, headers, text) = retry_arm_call(self.retry, "poll operation", || {
                    self.send(Method::GET, &monitor, None)
                })
                .await?;
                let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                match body.get("status").and_then(Value::as_str).unwrap_or("InProgress") {
                    "Succeeded" => return Ok(()),
                    state @ ("Failed" | "Canceled") => {
                        return Err(ArmCallError::permanent(format!(
                            "Operation {state}: {}",
                            arm_error_message(&text)
                        )));
                    }
                    state => {
                        debug!(state, "Waiting for ARM operation");
                        delay = retry_after(&headers).unwrap_or(self.poll_interval);
                    }
                }
            }
        }

        if status == StatusCode::ACCEPTED {
            if let Some(location) = location {
                loop {
                    if started.elapsed() > Duration::from_secs(MAX_OPERATION_SECS) {
                        return Err(ArmCallError::permanent("Timed out waiting for ARM operation"));
                    }
                    tokio::time::sleep(delay).await;
                    let (status, headers, _) = retry_arm_call(self.retry, "poll location", || {
                        self.send(Method::GET, &location, None)
                    })
                    .await?;
                    if status != StatusCode::ACCEPTED {
                        return Ok(());
                    }
                    delay = retry_after(&headers).unwrap_or(self.poll_interval);
                }
            }
        }
        Ok(())
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// `error.message` of an ARM error body, or the raw body.
fn arm_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.chars().take(512).collect())
}

#[async_trait]
impl GatewayClient for ArmGatewayClient {
    async fn get_gateway(&self) -> Result<ApplicationGateway, ControllerError> {
        let result = self
            .get_json::<ApplicationGateway>(ArmOperation::GetGateway, "get gateway", &self.gateway_id)
            .await;
        metrics::record_arm_get(result.is_ok());
        result
    }

    async fn update_gateway(&self, gateway: &ApplicationGateway) -> Result<(), ControllerError> {
        let body = serde_json::to_value(gateway).map_err(|e| {
            ControllerError::with_inner(
                ErrorCode::DeployingAppGatewayConfig,
                "Unable to serialize gateway document",
                e,
            )
        })?;
        let start = Instant::now();
        let result = self
            .put_and_wait(ArmOperation::UpdateGateway, "update gateway", &self.gateway_id, &body)
            .await;
        metrics::record_arm_update(result.is_ok(), start.elapsed());
        match &result {
            Ok(()) => info!(elapsed = ?start.elapsed(), "Application Gateway updated"),
            Err(e) => warn!(error = %e, "Application Gateway update failed"),
        }
        result
    }

    async fn get_public_ip(&self, resource_id: &str) -> Result<Option<String>, ControllerError> {
        let body: Value = self
            .get_json(ArmOperation::GetPublicIp, "get public ip", resource_id)
            .await?;
        Ok(body
            .pointer("/properties/ipAddress")
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    async fn get_subnet(&self, resource_id: &str) -> Result<Option<String>, ControllerError> {
        let body: Value = self
            .get_json(ArmOperation::GetSubnet, "get subnet", resource_id)
            .await?;
        Ok(body
            .pointer("/properties/addressPrefix")
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    async fn apply_route_table(
        &self,
        subnet_id: &str,
        route_table_id: &str,
    ) -> Result<(), ControllerError> {
        let mut subnet: Value = self
            .get_json(ArmOperation::GetSubnet, "get subnet", subnet_id)
            .await?;
        let current = subnet
            .pointer("/properties/routeTable/id")
            .and_then(Value::as_str);
        if current.is_some_and(|id| id.eq_ignore_ascii_case(route_table_id)) {
            debug!(subnet = subnet_id, "Route table already associated");
            return Ok(());
        }
        match subnet.pointer_mut("/properties") {
            Some(Value::Object(props)) => {
                props.insert("routeTable".to_string(), json!({ "id": route_table_id }));
            }
            _ => {
                return Err(ControllerError::new(
                    ErrorCode::DeployingAppGatewayConfig,
                    format!("Subnet {subnet_id} has no properties"),
                ));
            }
        }
        info!(subnet = subnet_id, route_table = route_table_id, "Associating route table");
        self.put_and_wait(ArmOperation::ApplyRouteTable, "apply route table", subnet_id, &subnet)
            .await
    }
}

/// Fetch the gateway, retrying every failure up to `attempts` times.
///
/// Used once at startup to ride out credential propagation delays.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn wait_for_gateway(
    client: &dyn GatewayClient,
    attempts: u32,
    interval: Duration,
) -> Result<ApplicationGateway, ControllerError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match client.get_gateway().await {
            Ok(gateway) => return Ok(gateway),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    retry_after = ?interval,
                    error = %e,
                    "Application Gateway not reachable yet"
                );
                tokio::time::sleep(interval).await;
                attempt += 1;
            }
        }
    }
}

/// Associate the gateway subnet with `route_table_id`.
///
/// Kubenet clusters route pod traffic through a route table that the gateway subnet must
/// share, otherwise the gateway cannot reach pod IPs.
///
/// # Errors
///
/// Returns the ARM error of the subnet lookup or update.
pub async fn attach_route_table(
    client: &dyn GatewayClient,
    gateway: &ApplicationGateway,
    route_table_id: &str,
) -> Result<(), ControllerError> {
    let Some(subnet_id) = gateway.subnet_id() else {
        warn!(route_table = route_table_id, "Gateway has no subnet, skipping route table association");
        return Ok(());
    };
    let prefix = client.get_subnet(subnet_id).await?;
    info!(
        subnet = subnet_id,
        address_prefix = prefix.as_deref().unwrap_or("unknown"),
        route_table = route_table_id,
        "Ensuring gateway subnet uses the cluster route table"
    );
    client.apply_route_table(subnet_id, route_table_id).await
}
