// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress load-balancer status.
//!
//! After every successful (or skipped-as-unchanged) apply, each accepted Ingress gets the
//! gateway frontend address matching its private/public preference. Ingresses that were
//! pruned or belong to another controller have their status cleared, but only when it
//! still shows one of this gateway's addresses, so another controller's status is never
//! touched.
//!
//! Public addresses live on a separate ARM resource; [`FrontendIpCache`] resolves them once
//! and keeps them until the cache is cleared.

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Patch, PatchParams};
use kube::runtime::events::EventType;
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::annotations::IngressAnnotations;
use crate::appgw::document::ApplicationGateway;
use crate::azure::GatewayClient;
use crate::cache::key_of;
use crate::event_reasons::{
    ACTION_UPDATE_STATUS, REASON_RESET_INGRESS_STATUS, REASON_UNABLE_TO_UPDATE_INGRESS_STATUS,
};
use crate::pruner::PruneOutcome;
use crate::recorder::{ingress_reference, EventPublisher, IngressNotice};

// ============================================================================
// Frontend Addresses
// ============================================================================

/// Addresses of the gateway frontends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontendAddresses {
    pub public: Option<String>,
    pub private: Option<String>,
}

impl FrontendAddresses {
    /// Address an Ingress with the given preference is reachable on.
    #[must_use]
    pub fn for_preference(&self, private: bool) -> Option<&str> {
        if private {
            self.private.as_deref()
        } else {
            self.public.as_deref()
        }
    }

    /// Whether `ip` is one of the gateway's addresses.
    #[must_use]
    pub fn contains(&self, ip: &str) -> bool {
        self.public.as_deref() == Some(ip) || self.private.as_deref() == Some(ip)
    }
}

/// Public-IP resource ID → address.
#[derive(Debug, Default)]
pub struct FrontendIpCache {
    public_ips: RwLock<BTreeMap<String, String>>,
}

impl FrontendIpCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses of `gateway`'s frontends, resolving public IPs through `client` on a miss.
    ///
    /// A failed lookup leaves the public address unknown for this cycle.
    pub async fn refresh(
        &self,
        client: &dyn GatewayClient,
        gateway: &ApplicationGateway,
    ) -> FrontendAddresses {
        let private = gateway
            .frontend_ip(true)
            .and_then(|fip| fip.properties.private_ip_address.clone());

        let public_id = gateway
            .frontend_ip(false)
            .and_then(|fip| fip.properties.public_ip_address.as_ref())
            .map(|pip| pip.id.clone());
        let public = match public_id {
            Some(id) => self.resolve(client, &id).await,
            None => None,
        };

        FrontendAddresses { public, private }
    }

    async fn resolve(&self, client: &dyn GatewayClient, resource_id: &str) -> Option<String> {
        let cached = self
            .public_ips
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource_id)
            .cloned();
        if cached.is_some() {
            return cached;
        }

        match client.get_public_ip(resource_id).await {
            Ok(Some(ip)) => {
                debug!(public_ip = %resource_id, address = %ip, "Resolved frontend public IP");
                self.public_ips
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(resource_id.to_string(), ip.clone());
                Some(ip)
            }
            Ok(None) => {
                warn!(public_ip = %resource_id, "Frontend public IP has no address allocated");
                None
            }
            Err(e) => {
                warn!(public_ip = %resource_id, error = %e, "Unable to resolve frontend public IP");
                None
            }
        }
    }

    pub fn clear(&self) {
        self.public_ips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// ============================================================================
// Status Client
// ============================================================================

/// Writes `status.loadBalancer` of an Ingress.
#[async_trait]
pub trait IngressStatusClient: Send + Sync {
    /// Replace the load-balancer addresses of `namespace/name` with `ips`.
    async fn set_load_balancer_ips(&self, namespace: &str, name: &str, ips: &[String])
        -> Result<()>;
}

/// [`IngressStatusClient`] patching the Ingress status subresource.
pub struct KubeIngressStatusClient {
    client: Client,
}

impl KubeIngressStatusClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IngressStatusClient for KubeIngressStatusClient {
    async fn set_load_balancer_ips(
        &self,
        namespace: &str,
        name: &str,
        ips: &[String],
    ) -> Result<()> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        let entries: Vec<_> = ips.iter().map(|ip| json!({ "ip": ip })).collect();
        let patch = json!({
            "status": {
                "loadBalancer": {
                    "ingress": entries
                }
            }
        });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Addresses currently recorded in `ingress`'s status.
#[must_use]
pub fn current_ips(ingress: &Ingress) -> Vec<String> {
    ingress
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|entries| entries.iter().filter_map(|e| e.ip.clone()).collect())
        .unwrap_or_default()
}

// ============================================================================
// Status Writer
// ============================================================================

/// Brings Ingress statuses in line with the gateway frontends.
pub struct StatusWriter {
    client: Arc<dyn IngressStatusClient>,
    publisher: Arc<dyn EventPublisher>,
    default_private: bool,
}

impl StatusWriter {
    #[must_use]
    pub fn new(
        client: Arc<dyn IngressStatusClient>,
        publisher: Arc<dyn EventPublisher>,
        default_private: bool,
    ) -> Self {
        Self {
            client,
            publisher,
            default_private,
        }
    }

    /// Write statuses for every Ingress in `outcome`.
    ///
    /// Returns warnings for statuses that could not be written.
    pub async fn update(
        &self,
        addresses: &FrontendAddresses,
        outcome: &PruneOutcome,
    ) -> Vec<IngressNotice> {
        let mut notices = Vec::new();

        for ingress in &outcome.accepted {
            let private = IngressAnnotations::from_ingress(ingress).uses_private_ip(self.default_private);
            let desired: Vec<String> = addresses
                .for_preference(private)
                .map(ToString::to_string)
                .into_iter()
                .collect();
            if desired.is_empty() || current_ips(ingress) == desired {
                continue;
            }
            if let Err(e) = self.write(ingress, &desired).await {
                notices.push(e);
            }
        }

        for ingress in outcome.rejected.iter().chain(&outcome.foreign) {
            let current = current_ips(ingress);
            if !current.iter().any(|ip| addresses.contains(ip)) {
                continue;
            }
            match self.write(ingress, &[]).await {
                Ok(()) => {
                    info!(ingress = %key_of(ingress), "Cleared ingress status");
                    self.publisher
                        .publish(
                            &ingress_reference(ingress),
                            EventType::Normal,
                            REASON_RESET_INGRESS_STATUS,
                            ACTION_UPDATE_STATUS,
                            Some("Ingress is no longer served by this gateway".to_string()),
                        )
                        .await;
                }
                Err(e) => notices.push(e),
            }
        }

        notices
    }

    async fn write(&self, ingress: &Ingress, ips: &[String]) -> Result<(), IngressNotice> {
        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();
        match self.client.set_load_balancer_ips(&namespace, &name, ips).await {
            Ok(()) => {
                debug!(ingress = %key_of(ingress), ips = ?ips, "Updated ingress status");
                Ok(())
            }
            Err(e) => Err(IngressNotice::new(
                ingress,
                REASON_UNABLE_TO_UPDATE_INGRESS_STATUS,
                ACTION_UPDATE_STATUS,
                format!("Unable to update ingress status: {e}"),
            )),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
