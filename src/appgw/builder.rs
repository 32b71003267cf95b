// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Gateway document generation.
//!
//! [`ConfigBuilder`] turns a cluster snapshot and the accepted Ingress list into a full
//! Application Gateway document. The live document is the starting point: frontend IP
//! configurations, trusted root certificates, SKU and every property this controller
//! does not model are carried over untouched, while each managed collection is
//! regenerated from scratch.
//!
//! # Stages
//!
//! 1. Pre-build notices for references to missing objects
//! 2. SSL certificates, listener plan, frontend ports, listeners
//! 3. Backend resolution, probes, HTTP settings, pools, load distribution policies
//! 4. Redirects, rewrite sets, routing rules and URL path maps
//! 5. Brownfield merge (optional) and post-build validation
//!
//! Every stage is deterministic: the same inputs always produce byte-identical output.

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::brownfield::merge::merge_unmanaged;
use crate::brownfield::partition::UnmanagedResources;
use crate::cache::{key_of, ClusterSnapshot};
use crate::constants::{MANAGED_BY_TAG, MANAGED_BY_TAG_VALUE};
use crate::controller_errors::ControllerError;
use crate::recorder::IngressNotice;

use super::backend_pools::{backend_address_pools, load_distribution_policies, resolve_backends};
use super::certificates::ssl_certificates;
use super::document::ApplicationGateway;
use super::frontend::{frontend_ports, http_listeners, plan_listeners};
use super::http_settings::backend_http_settings;
use super::identifier::ResourceNamer;
use super::probes::health_probes;
use super::redirects::redirect_configurations;
use super::rewrites::rewrite_rule_sets;
use super::routing_rules::request_routing;
use super::validators::{pre_build_notices, validate_gateway};

// ============================================================================
// Build Context
// ============================================================================

/// Read-only inputs shared by every build stage.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub snapshot: &'a ClusterSnapshot,
    /// Accepted Ingresses in build order.
    pub ingresses: &'a [Ingress],
    /// The live gateway document.
    pub existing: &'a ApplicationGateway,
    pub namer: &'a ResourceNamer,
    /// Controller-wide default for `use-private-ip`.
    pub use_private_ip: bool,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        snapshot: &'a ClusterSnapshot,
        ingresses: &'a [Ingress],
        existing: &'a ApplicationGateway,
        namer: &'a ResourceNamer,
        use_private_ip: bool,
    ) -> Self {
        Self {
            snapshot,
            ingresses,
            existing,
            namer,
            use_private_ip,
        }
    }

    /// The accepted Ingress `namespace/name`, if any.
    #[must_use]
    pub fn ingress(&self, namespace: &str, name: &str) -> Option<&'a Ingress> {
        self.ingresses
            .iter()
            .find(|i| i.namespace().as_deref() == Some(namespace) && i.name_any() == name)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// A generated document and the warnings collected while building it.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildOutput {
    pub gateway: ApplicationGateway,
    pub notices: Vec<IngressNotice>,
}

/// Builds the desired gateway document for one reconcile.
pub struct ConfigBuilder<'a> {
    snapshot: &'a ClusterSnapshot,
    existing: &'a ApplicationGateway,
    namer: &'a ResourceNamer,
    use_private_ip: bool,
    unmanaged: Option<&'a UnmanagedResources>,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(
        snapshot: &'a ClusterSnapshot,
        existing: &'a ApplicationGateway,
        namer: &'a ResourceNamer,
        use_private_ip: bool,
    ) -> Self {
        Self {
            snapshot,
            existing,
            namer,
            use_private_ip,
            unmanaged: None,
        }
    }

    /// Keep the given unmanaged resources alongside the generated ones.
    #[must_use]
    pub fn with_unmanaged(mut self, unmanaged: &'a UnmanagedResources) -> Self {
        self.unmanaged = Some(unmanaged);
        self
    }

    /// Generate the document for `ingresses`.
    ///
    /// # Errors
    ///
    /// Returns `NoPublicIP`/`NoPrivateIP` when a listener needs a frontend the gateway
    /// lacks, `UnmanagedResourceCollision` from the brownfield merge, and any
    /// post-build validation error.
    pub fn build(&self, ingresses: &[Ingress]) -> Result<BuildOutput, ControllerError> {
        let mut ordered = ingresses.to_vec();
        ordered.sort_by_key(key_of);
        let ctx = BuildContext::new(
            self.snapshot,
            &ordered,
            self.existing,
            self.namer,
            self.use_private_ip,
        );

        let mut notices = pre_build_notices(self.snapshot, &ordered);

        let certificates = ssl_certificates(&ctx, &mut notices);
        let plan = plan_listeners(&ctx, &mut notices);
        let ports = frontend_ports(&ctx, &plan);
        let listeners = http_listeners(&ctx, &plan, &ports)?;

        let resolved = resolve_backends(&ctx, &mut notices);
        let (probes, assigned_probes) = health_probes(&ctx, &resolved);
        let settings = backend_http_settings(&ctx, &resolved, &assigned_probes);
        let pools = backend_address_pools(&ctx, &resolved, &mut notices);
        let policies = load_distribution_policies(&ctx, &resolved);

        let redirects = redirect_configurations(&ctx, &plan);
        let rewrites = rewrite_rule_sets(&ctx);
        let (rules, path_maps) = request_routing(&ctx, &plan, &resolved);

        let mut gateway = self.existing.clone();
        {
            let p = &mut gateway.properties;
            p.ssl_certificates = certificates;
            p.frontend_ports = ports;
            p.http_listeners = listeners;
            p.probes = probes;
            p.backend_http_settings_collection = settings;
            p.backend_address_pools = pools;
            p.load_distribution_policies = policies;
            p.redirect_configurations = redirects;
            p.rewrite_rule_sets = rewrites;
            p.request_routing_rules = rules;
            p.url_path_maps = path_maps;
        }
        gateway.set_tag(MANAGED_BY_TAG, MANAGED_BY_TAG_VALUE);

        if let Some(unmanaged) = self.unmanaged {
            debug!("Merging unmanaged gateway resources");
            gateway = merge_unmanaged(gateway, unmanaged, self.existing, self.namer)?;
        }

        validate_gateway(&gateway)?;

        let p = &gateway.properties;
        info!(
            ingresses = ordered.len(),
            listeners = p.http_listeners.len(),
            rules = p.request_routing_rules.len(),
            pools = p.backend_address_pools.len(),
            notices = notices.len(),
            "Built Application Gateway configuration"
        );
        Ok(BuildOutput { gateway, notices })
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
