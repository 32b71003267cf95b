// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Checks before and after a build.
//!
//! Before the build, references to missing cluster objects are reported as notices; the
//! build still runs and simply leaves those backends out. After the build, the generated
//! document must hold together on its own: every URL path map has exactly one kind of
//! default, every route has exactly one kind of target, there is at least one listener
//! and one rule, and no collection repeats a name. Any of these aborts the apply.

use std::collections::BTreeSet;

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;

use crate::annotations::IngressAnnotations;
use crate::cache::ClusterSnapshot;
use crate::controller_errors::{ControllerError, ErrorCode};
use crate::event_reasons::{
    ACTION_BUILD, REASON_BACKEND_NOT_FOUND, REASON_INGRESS_SERVICE_TARGET_MATCH,
    REASON_REWRITE_RULE_SET_NOT_FOUND,
};
use crate::recorder::IngressNotice;

use super::document::{ApplicationGateway, GatewayChild, RuleType, SubResource};
use super::ingress_rules::{all_backends, classify_backend, BackendRef};

// ============================================================================
// Pre-build
// ============================================================================

fn ingress_notices(snapshot: &ClusterSnapshot, ingress: &Ingress) -> Vec<IngressNotice> {
    let namespace = ingress.namespace().unwrap_or_default();
    let mut seen = BTreeSet::new();
    let mut notices = Vec::new();
    let mut push = |reason: &'static str, message: String| {
        if seen.insert((reason, message.clone())) {
            notices.push(IngressNotice::new(ingress, reason, ACTION_BUILD, message));
        }
    };

    for (_, _, backend) in all_backends(ingress) {
        match classify_backend(ingress, backend) {
            BackendRef::Service(id) => {
                if snapshot.service(&id.namespace, &id.service).is_none() {
                    push(
                        REASON_INGRESS_SERVICE_TARGET_MATCH,
                        format!("Unable to get the service [{}/{}]", id.namespace, id.service),
                    );
                }
            }
            BackendRef::ExternalPool { namespace, name } => {
                if snapshot.backend_pool(&namespace, &name).is_none() {
                    push(
                        REASON_BACKEND_NOT_FOUND,
                        format!("Backend pool {namespace}/{name} does not exist"),
                    );
                }
            }
            BackendRef::LoadDistribution { namespace, name } => {
                if snapshot.load_distribution_policy(&namespace, &name).is_none() {
                    push(
                        REASON_BACKEND_NOT_FOUND,
                        format!("Load distribution policy {namespace}/{name} does not exist"),
                    );
                }
            }
            BackendRef::Unsupported => {}
        }
    }

    let annotations = IngressAnnotations::from_ingress(ingress);
    if let Some(resource) = annotations.rewrite_rule_set_custom_resource.as_deref() {
        if snapshot.rewrite(&namespace, resource).is_none() {
            push(
                REASON_REWRITE_RULE_SET_NOT_FOUND,
                format!("Rewrite rule set {namespace}/{resource} does not exist"),
            );
        }
    }
    notices
}

/// Notices for references to cluster objects that do not exist.
#[must_use]
pub fn pre_build_notices(snapshot: &ClusterSnapshot, ingresses: &[Ingress]) -> Vec<IngressNotice> {
    ingresses
        .iter()
        .flat_map(|ingress| ingress_notices(snapshot, ingress))
        .collect()
}

// ============================================================================
// Post-build
// ============================================================================

fn check_target(
    owner: &str,
    backend: Option<&SubResource>,
    distribution: Option<&SubResource>,
    redirect: Option<&SubResource>,
    neither: ErrorCode,
    both: ErrorCode,
) -> Result<(), ControllerError> {
    let has_backend = backend.is_some() || distribution.is_some();
    match (has_backend, redirect.is_some()) {
        (false, false) => Err(ControllerError::new(
            neither,
            format!("{owner} has neither a backend nor a redirect"),
        )),
        (true, true) => Err(ControllerError::new(
            both,
            format!("{owner} has both a backend and a redirect"),
        )),
        _ => Ok(()),
    }
}

fn check_unique<P>(kind: &str, children: &[GatewayChild<P>]) -> Result<(), ControllerError> {
    let mut names = BTreeSet::new();
    for child in children {
        if !names.insert(child.name.as_str()) {
            return Err(ControllerError::new(
                ErrorCode::DuplicateResourceName,
                format!("Duplicate {kind} name {}", child.name),
            ));
        }
    }
    Ok(())
}

fn check_unique_names(gateway: &ApplicationGateway) -> Result<(), ControllerError> {
    let p = &gateway.properties;
    check_unique("frontend port", &p.frontend_ports)?;
    check_unique("listener", &p.http_listeners)?;
    check_unique("ssl certificate", &p.ssl_certificates)?;
    check_unique("backend pool", &p.backend_address_pools)?;
    check_unique("http settings", &p.backend_http_settings_collection)?;
    check_unique("probe", &p.probes)?;
    check_unique("routing rule", &p.request_routing_rules)?;
    check_unique("url path map", &p.url_path_maps)?;
    check_unique("redirect", &p.redirect_configurations)?;
    check_unique("rewrite rule set", &p.rewrite_rule_sets)?;
    check_unique("load distribution policy", &p.load_distribution_policies)?;
    for map in &p.url_path_maps {
        check_unique("path rule", &map.properties.path_rules)?;
    }
    Ok(())
}

/// Validate a generated document before it is sent to the gateway.
///
/// # Errors
///
/// Returns the first violation found: `EmptyConfig`, `NoDefaults`, `EitherDefaults`,
/// `NoBackendorRedirect`, `EitherBackendorRedirect` or `DuplicateResourceName`.
pub fn validate_gateway(gateway: &ApplicationGateway) -> Result<(), ControllerError> {
    let p = &gateway.properties;
    if p.http_listeners.is_empty() || p.request_routing_rules.is_empty() {
        return Err(ControllerError::new(
            ErrorCode::EmptyConfig,
            "Configuration has no listeners or no routing rules",
        ));
    }

    for map in &p.url_path_maps {
        let d = &map.properties;
        check_target(
            &format!("URL path map {}", map.name),
            d.default_backend_address_pool.as_ref(),
            d.default_load_distribution_policy.as_ref(),
            d.default_redirect_configuration.as_ref(),
            ErrorCode::NoDefaults,
            ErrorCode::EitherDefaults,
        )?;
        for rule in &d.path_rules {
            let r = &rule.properties;
            check_target(
                &format!("Path rule {} of {}", rule.name, map.name),
                r.backend_address_pool.as_ref(),
                r.load_distribution_policy.as_ref(),
                r.redirect_configuration.as_ref(),
                ErrorCode::NoBackendorRedirect,
                ErrorCode::EitherBackendorRedirect,
            )?;
        }
    }

    for rule in &p.request_routing_rules {
        let r = &rule.properties;
        if r.rule_type == Some(RuleType::PathBasedRouting) {
            continue;
        }
        check_target(
            &format!("Routing rule {}", rule.name),
            r.backend_address_pool.as_ref(),
            r.load_distribution_policy.as_ref(),
            r.redirect_configuration.as_ref(),
            ErrorCode::NoBackendorRedirect,
            ErrorCode::EitherBackendorRedirect,
        )?;
    }

    check_unique_names(gateway)
}

#[cfg(test)]
#[path = "validators_tests.rs"]
mod validators_tests;
