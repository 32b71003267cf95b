// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress pruning ahead of the configuration build.
//!
//! The pruner narrows the observed Ingress list with a fixed sequence of filters:
//!
//! 1. **Class**: only Ingresses addressed to this controller are considered at all.
//!    Everything else is reported as foreign so its status can be cleared.
//! 2. **Private IP**: an Ingress asking for the private frontend is dropped when the
//!    gateway has none.
//! 3. **Redirect without TLS**: `ssl-redirect` needs a TLS block or a gateway
//!    certificate to redirect to.
//! 4. **Gateway certificates**: `appgw-ssl-certificate` and
//!    `appgw-trusted-root-certificate` must name certificates installed on the gateway.
//! 5. **Brownfield**: prohibited host/path pairs are removed; an Ingress with nothing
//!    left is dropped.
//!
//! Each drop yields an [`IngressNotice`] that the reconciler publishes as a warning event.

use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

use crate::annotations::IngressAnnotations;
use crate::appgw::document::ApplicationGateway;
use crate::brownfield::{prune_prohibited_rules, TargetPolicy};
use crate::config::ControllerConfig;
use crate::constants::DEFAULT_INGRESS_CLASS_ANNOTATION;
use crate::event_reasons::{
    ACTION_PRUNE, REASON_NO_PRIVATE_IP, REASON_PROHIBITED_TARGET, REASON_REDIRECT_WITH_NO_TLS,
    REASON_SSL_CERTIFICATE_NOT_FOUND, REASON_TRUSTED_ROOT_CERTIFICATE_NOT_FOUND,
};
use crate::metrics;
use crate::recorder::IngressNotice;

// ============================================================================
// Class Filter
// ============================================================================

/// Decides whether an Ingress is addressed to this controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassFilter {
    ingress_class: String,
    controller: String,
}

impl ClassFilter {
    #[must_use]
    pub fn new(ingress_class: &str, controller: &str) -> Self {
        Self {
            ingress_class: ingress_class.to_string(),
            controller: controller.to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(&config.ingress_class, &config.ingress_class_controller)
    }

    fn class_is_ours(&self, class: Option<&IngressClass>) -> bool {
        class
            .and_then(|c| c.spec.as_ref())
            .and_then(|s| s.controller.as_deref())
            .is_some_and(|controller| controller == self.controller)
    }

    /// Whether `ingress` belongs to this controller.
    ///
    /// The legacy class annotation wins when present. Otherwise `ingressClassName` must
    /// equal the configured class or name an `IngressClass` whose controller is ours.
    /// An Ingress without any class is ours when a default `IngressClass` is ours.
    #[must_use]
    pub fn matches(&self, ingress: &Ingress, classes: &BTreeMap<String, IngressClass>) -> bool {
        let annotations = IngressAnnotations::from_ingress(ingress);
        if let Some(class) = annotations.ingress_class {
            return class == self.ingress_class;
        }

        let class_name = ingress
            .spec
            .as_ref()
            .and_then(|s| s.ingress_class_name.as_deref())
            .filter(|name| !name.is_empty());
        if let Some(name) = class_name {
            return name == self.ingress_class || self.class_is_ours(classes.get(name));
        }

        classes.values().any(|class| {
            class
                .annotations()
                .get(DEFAULT_INGRESS_CLASS_ANNOTATION)
                .is_some_and(|v| v == "true")
                && self.class_is_ours(Some(class))
        })
    }
}

// ============================================================================
// Pruning
// ============================================================================

/// Inputs shared by every filter.
pub struct PruneContext<'a> {
    pub config: &'a ControllerConfig,
    pub gateway: &'a ApplicationGateway,
    pub classes: &'a BTreeMap<String, IngressClass>,
    /// Present only in brownfield mode.
    pub policy: Option<&'a TargetPolicy>,
}

/// Result of pruning the observed Ingress list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PruneOutcome {
    /// Ingresses to build configuration for, possibly with paths removed.
    pub accepted: Vec<Ingress>,
    /// Ingresses addressed to this controller but dropped by a filter.
    pub rejected: Vec<Ingress>,
    /// Ingresses belonging to another controller.
    pub foreign: Vec<Ingress>,
    pub notices: Vec<IngressNotice>,
}

impl PruneOutcome {
    fn reject(&mut self, ingress: Ingress, reason: &'static str, message: String) {
        debug!(ingress = %ingress.name_any(), reason, "Pruning ingress");
        metrics::record_ingress_pruned(reason);
        self.notices
            .push(IngressNotice::new(&ingress, reason, ACTION_PRUNE, message));
        self.rejected.push(ingress);
    }
}

/// Why `ingress` may not be programmed on `gateway`, if it may not.
fn rejection(
    ingress: &Ingress,
    annotations: &IngressAnnotations,
    ctx: &PruneContext<'_>,
) -> Option<(&'static str, String)> {
    if annotations.uses_private_ip(ctx.config.use_private_ip) && !ctx.gateway.has_private_frontend()
    {
        return Some((
            REASON_NO_PRIVATE_IP,
            "Ingress requests a private IP but the gateway has no private frontend".to_string(),
        ));
    }

    let has_tls = ingress
        .spec
        .as_ref()
        .and_then(|s| s.tls.as_ref())
        .is_some_and(|tls| !tls.is_empty());
    if annotations.ssl_redirect && !has_tls && annotations.appgw_ssl_certificate.is_none() {
        return Some((
            REASON_REDIRECT_WITH_NO_TLS,
            "Ingress requests an SSL redirect but declares no TLS".to_string(),
        ));
    }

    if let Some(cert) = annotations.appgw_ssl_certificate.as_deref() {
        if !ctx.gateway.ssl_certificate_names().contains(&cert) {
            return Some((
                REASON_SSL_CERTIFICATE_NOT_FOUND,
                format!("SSL certificate {cert} is not installed on the gateway"),
            ));
        }
    }

    let roots = ctx.gateway.trusted_root_certificate_names();
    if let Some(missing) = annotations
        .appgw_trusted_root_certificates
        .iter()
        .find(|name| !roots.contains(&name.as_str()))
    {
        return Some((
            REASON_TRUSTED_ROOT_CERTIFICATE_NOT_FOUND,
            format!("Trusted root certificate {missing} is not installed on the gateway"),
        ));
    }

    None
}

/// Run every filter over `ingresses`, in order.
#[must_use]
pub fn prune_ingresses(
    ingresses: impl IntoIterator<Item = Ingress>,
    ctx: &PruneContext<'_>,
) -> PruneOutcome {
    let classes = ClassFilter::from_config(ctx.config);
    let mut outcome = PruneOutcome::default();

    for ingress in ingresses {
        if !classes.matches(&ingress, ctx.classes) {
            outcome.foreign.push(ingress);
            continue;
        }

        let annotations = IngressAnnotations::from_ingress(&ingress);
        if let Some((reason, message)) = rejection(&ingress, &annotations, ctx) {
            outcome.reject(ingress, reason, message);
            continue;
        }

        match ctx.policy {
            Some(policy) => match prune_prohibited_rules(&ingress, policy) {
                Some(pruned) => outcome.accepted.push(pruned),
                None => outcome.reject(
                    ingress,
                    REASON_PROHIBITED_TARGET,
                    "Every rule of the ingress targets a prohibited host or path".to_string(),
                ),
            },
            None => outcome.accepted.push(ingress),
        }
    }

    debug!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        foreign = outcome.foreign.len(),
        "Pruned ingress list"
    );
    outcome
}

#[cfg(test)]
#[path = "pruner_tests.rs"]
mod pruner_tests;
