// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend port resolution, address pools and load distribution policies.
//!
//! A service backend is usable once its Ingress port resolves to exactly one
//! `(service port, backend port)` pair:
//!
//! - only TCP service ports take part; a port matches by number, by name, or by a named
//!   `targetPort` equal to the Ingress port name;
//! - an integer `targetPort` gives the backend port directly, a missing one reuses the
//!   service port, a named one is looked up in the endpoint subsets;
//! - a backend whose service does not exist yet keeps a numeric Ingress port as is.
//!
//! Backends resolving to no pair or to several pairs are reported and left out.

use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::cache::ClusterSnapshot;
use crate::crd;
use crate::event_reasons::{
    ACTION_BUILD, REASON_ENDPOINTS_EMPTY, REASON_MULTIPLE_PORT_BINDING,
    REASON_PORT_RESOLUTION_ERROR,
};
use crate::recorder::IngressNotice;

use super::builder::BuildContext;
use super::document::{
    BackendAddress, BackendAddressPool, BackendAddressPoolProperties, LoadDistributionPolicy,
    LoadDistributionPolicyProperties, LoadDistributionTarget, LoadDistributionTargetProperties,
    SubResource,
};
use super::identifier::{ChildKind, ResourceNamer};
use super::ingress_rules::{
    all_backends, classify_backend, load_distribution_policy_names, service_backends, BackendId,
    BackendRef, ProbeHint, ServicePortKey,
};

// ============================================================================
// Port Resolution
// ============================================================================

/// Port the gateway listens to on the service and port it sends traffic to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServicePortPair {
    pub service_port: i32,
    pub backend_port: i32,
}

impl ServicePortPair {
    #[must_use]
    pub fn new(service_port: i32, backend_port: i32) -> Self {
        Self {
            service_port,
            backend_port,
        }
    }
}

/// A service backend with its single resolved port pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedBackend {
    pub ports: ServicePortPair,
    pub hint: ProbeHint,
}

pub type ResolvedBackends = BTreeMap<BackendId, ResolvedBackend>;

/// Every port pair `id` could mean.
#[must_use]
pub fn resolve_service_ports(snapshot: &ClusterSnapshot, id: &BackendId) -> BTreeSet<ServicePortPair> {
    let mut pairs = BTreeSet::new();
    let Some(service) = snapshot.service(&id.namespace, &id.service) else {
        if let ServicePortKey::Number(n) = id.port {
            pairs.insert(ServicePortPair::new(n, n));
        }
        return pairs;
    };

    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_deref())
        .unwrap_or_default();
    for port in ports
        .iter()
        .filter(|p| p.protocol.as_deref().unwrap_or("TCP") == "TCP")
    {
        let matches = match &id.port {
            ServicePortKey::Number(n) => port.port == *n,
            ServicePortKey::Name(name) => {
                port.name.as_deref() == Some(name.as_str())
                    || matches!(&port.target_port, Some(IntOrString::String(t)) if t == name)
            }
        };
        if !matches {
            continue;
        }
        match &port.target_port {
            Some(IntOrString::Int(target)) if *target > 0 => {
                pairs.insert(ServicePortPair::new(port.port, *target));
            }
            Some(IntOrString::String(target)) if !target.is_empty() => {
                let port_name = port.name.as_deref().unwrap_or_default();
                for backend_port in endpoint_ports_named(snapshot, id, port_name) {
                    pairs.insert(ServicePortPair::new(port.port, backend_port));
                }
            }
            _ => {
                pairs.insert(ServicePortPair::new(port.port, port.port));
            }
        }
    }
    pairs
}

fn endpoint_ports_named(snapshot: &ClusterSnapshot, id: &BackendId, name: &str) -> BTreeSet<i32> {
    snapshot
        .endpoints(&id.namespace, &id.service)
        .and_then(|e| e.subsets.as_ref())
        .into_iter()
        .flatten()
        .flat_map(|subset| subset.ports.iter().flatten())
        .filter(|p| p.name.as_deref().unwrap_or_default() == name)
        .map(|p| p.port)
        .collect()
}

/// Service backend of a load distribution target, as used by `ingress`.
#[must_use]
pub fn policy_target_backend(
    ingress: &Ingress,
    target: &crd::LoadDistributionTarget,
) -> Option<BackendId> {
    let service = target.backend.service.as_ref()?;
    let port = match (service.port.number, service.port.name.as_deref()) {
        (Some(n), _) if n > 0 => ServicePortKey::Number(n),
        (_, Some(name)) if !name.is_empty() => ServicePortKey::Name(name.to_string()),
        _ => return None,
    };
    Some(BackendId {
        namespace: ingress.namespace().unwrap_or_default(),
        ingress: ingress.name_any(),
        service: service.name.clone(),
        port,
    })
}

/// Weighted backends of the load distribution policy `name` as used by `ingress`.
#[must_use]
pub fn policy_backends(
    ctx: &BuildContext<'_>,
    ingress: &Ingress,
    name: &str,
) -> Vec<(BackendId, i32)> {
    let namespace = ingress.namespace().unwrap_or_default();
    ctx.snapshot
        .load_distribution_policy(&namespace, name)
        .map(|policy| {
            policy
                .spec
                .targets
                .iter()
                .filter_map(|t| policy_target_backend(ingress, t).map(|id| (id, t.weight)))
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve every service backend of the accepted Ingresses, directly referenced or
/// reached through a load distribution policy.
pub fn resolve_backends(
    ctx: &BuildContext<'_>,
    notices: &mut Vec<IngressNotice>,
) -> ResolvedBackends {
    let mut usage = service_backends(ctx.ingresses);
    for ingress in ctx.ingresses {
        for name in load_distribution_policy_names(ingress) {
            for (id, _) in policy_backends(ctx, ingress, &name) {
                usage.entry(id).or_default();
            }
        }
    }

    let mut resolved = ResolvedBackends::new();
    for (id, hint) in usage {
        let pairs = resolve_service_ports(ctx.snapshot, &id);
        let mut pairs = pairs.into_iter();
        match (pairs.next(), pairs.next()) {
            (Some(ports), None) => {
                resolved.insert(id, ResolvedBackend { ports, hint });
            }
            (None, _) => {
                debug!(backend = %id, "Unable to resolve backend port");
                if let Some(ingress) = ctx.ingress(&id.namespace, &id.ingress) {
                    notices.push(IngressNotice::new(
                        ingress,
                        REASON_PORT_RESOLUTION_ERROR,
                        ACTION_BUILD,
                        format!("Unable to resolve port {} of service {}", id.port, id.service),
                    ));
                }
            }
            (Some(_), Some(_)) => {
                if let Some(ingress) = ctx.ingress(&id.namespace, &id.ingress) {
                    notices.push(IngressNotice::new(
                        ingress,
                        REASON_MULTIPLE_PORT_BINDING,
                        ACTION_BUILD,
                        format!(
                            "Port {} of service {} binds to more than one backend port",
                            id.port, id.service
                        ),
                    ));
                }
            }
        }
    }
    resolved
}

// ============================================================================
// Address Pools
// ============================================================================

/// Pool serving a resolved backend.
#[must_use]
pub fn pool_name(namer: &ResourceNamer, id: &BackendId, ports: ServicePortPair) -> String {
    namer.pool_name(
        &id.namespace,
        &id.service,
        &id.port.to_string(),
        ports.backend_port,
    )
}

/// Sorted, deduplicated endpoint IPs of `namespace/service` listening on `port`.
#[must_use]
pub fn endpoint_addresses(
    snapshot: &ClusterSnapshot,
    namespace: &str,
    service: &str,
    port: i32,
) -> Vec<BackendAddress> {
    let ips: BTreeSet<String> = snapshot
        .endpoints(namespace, service)
        .and_then(|e| e.subsets.as_ref())
        .into_iter()
        .flatten()
        .filter(|subset| subset.ports.iter().flatten().any(|p| p.port == port))
        .flat_map(|subset| subset.addresses.iter().flatten())
        .map(|address| address.ip.clone())
        .collect();
    ips.into_iter()
        .map(|ip| BackendAddress {
            ip_address: Some(ip),
            fqdn: None,
        })
        .collect()
}

fn pool(ctx: &BuildContext<'_>, name: String, backend_addresses: Vec<BackendAddress>) -> BackendAddressPool {
    BackendAddressPool::new(
        ctx.namer.child_id(ChildKind::BackendAddressPools, &name),
        name,
        BackendAddressPoolProperties {
            backend_addresses,
            ..Default::default()
        },
    )
}

/// The always-present empty pool.
#[must_use]
pub fn default_backend_pool(ctx: &BuildContext<'_>) -> BackendAddressPool {
    pool(ctx, ctx.namer.default_backend_pool_name(), Vec::new())
}

/// Address pools for the new document: the default pool, one pool per resolved port
/// pair and one per referenced `AzureApplicationGatewayBackendPool`.
pub fn backend_address_pools(
    ctx: &BuildContext<'_>,
    resolved: &ResolvedBackends,
    notices: &mut Vec<IngressNotice>,
) -> Vec<BackendAddressPool> {
    let mut pools: BTreeMap<String, BackendAddressPool> = BTreeMap::new();
    let default = default_backend_pool(ctx);
    pools.insert(default.name.clone(), default);

    for (id, backend) in resolved {
        let name = pool_name(ctx.namer, id, backend.ports);
        if pools.contains_key(&name) {
            continue;
        }
        let addresses =
            endpoint_addresses(ctx.snapshot, &id.namespace, &id.service, backend.ports.backend_port);
        if addresses.is_empty() && ctx.snapshot.service(&id.namespace, &id.service).is_some() {
            if let Some(ingress) = ctx.ingress(&id.namespace, &id.ingress) {
                notices.push(IngressNotice::new(
                    ingress,
                    REASON_ENDPOINTS_EMPTY,
                    ACTION_BUILD,
                    format!("Service {} has no ready endpoints", id.service),
                ));
            }
        }
        pools.insert(name.clone(), pool(ctx, name, addresses));
    }

    for ingress in ctx.ingresses {
        for (_, _, backend) in all_backends(ingress) {
            let BackendRef::ExternalPool { namespace, name } = classify_backend(ingress, backend)
            else {
                continue;
            };
            let Some(resource) = ctx.snapshot.backend_pool(&namespace, &name) else {
                continue;
            };
            let pool_name = ctx.namer.external_pool_name(&namespace, &name);
            if pools.contains_key(&pool_name) {
                continue;
            }
            let addresses: BTreeSet<BackendAddress> = resource
                .spec
                .backend_address_pools
                .iter()
                .flat_map(|p| p.backend_addresses.iter())
                .map(|a| BackendAddress {
                    ip_address: a.ip_address.clone().filter(|ip| !ip.is_empty()),
                    fqdn: a.fqdn.clone().filter(|fqdn| !fqdn.is_empty()),
                })
                .filter(|a| a.ip_address.is_some() || a.fqdn.is_some())
                .collect();
            pools.insert(
                pool_name.clone(),
                pool(ctx, pool_name, addresses.into_iter().collect()),
            );
        }
    }

    pools.into_values().collect()
}

// ============================================================================
// Load Distribution Policies
// ============================================================================

/// One gateway policy per referenced `AzureApplicationGatewayLoadDistributionPolicy`.
///
/// Targets whose backend did not resolve are left out.
#[must_use]
pub fn load_distribution_policies(
    ctx: &BuildContext<'_>,
    resolved: &ResolvedBackends,
) -> Vec<LoadDistributionPolicy> {
    let mut policies: BTreeMap<String, LoadDistributionPolicy> = BTreeMap::new();
    for ingress in ctx.ingresses {
        let namespace = ingress.namespace().unwrap_or_default();
        for name in load_distribution_policy_names(ingress) {
            if ctx.snapshot.load_distribution_policy(&namespace, &name).is_none() {
                continue;
            }
            let policy_name = ctx.namer.load_distribution_policy_name(&namespace, &name);
            if policies.contains_key(&policy_name) {
                continue;
            }
            let policy_id = ctx
                .namer
                .child_id(ChildKind::LoadDistributionPolicies, &policy_name);
            let targets = policy_backends(ctx, ingress, &name)
                .into_iter()
                .filter_map(|(id, weight)| {
                    resolved
                        .get(&id)
                        .map(|backend| (pool_name(ctx.namer, &id, backend.ports), weight))
                })
                .enumerate()
                .map(|(index, (pool, weight))| {
                    let target = format!("target-{index}");
                    LoadDistributionTarget::new(
                        format!("{policy_id}/loadDistributionTargets/{target}"),
                        target,
                        LoadDistributionTargetProperties {
                            weight_per_server: Some(weight),
                            backend_address_pool: Some(SubResource::new(
                                ctx.namer.child_id(ChildKind::BackendAddressPools, &pool),
                            )),
                            ..Default::default()
                        },
                    )
                })
                .collect();
            policies.insert(
                policy_name.clone(),
                LoadDistributionPolicy::new(
                    policy_id,
                    policy_name,
                    LoadDistributionPolicyProperties {
                        load_distribution_targets: targets,
                        ..Default::default()
                    },
                ),
            );
        }
    }
    policies.into_values().collect()
}

#[cfg(test)]
#[path = "backend_pools_tests.rs"]
mod backend_pools_tests;
