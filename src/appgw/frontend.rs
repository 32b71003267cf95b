// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Listener planning, frontend ports and HTTP listeners.
//!
//! Every Ingress rule maps to one or two listeners:
//!
//! - an HTTPS listener (port 443, or `override-frontend-port`) when a certificate is
//!   available for the rule host;
//! - an HTTP listener (port 80) when there is no certificate or `ssl-redirect` is set. With
//!   `ssl-redirect` it redirects to the HTTPS listener.
//!
//! Rules landing on the same [`ListenerId`] share the listener. When two Ingresses need
//! incompatible listeners for the same ID, the Ingress sorting first by key wins.

use k8s_openapi::api::networking::v1::{Ingress, IngressRule};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::annotations::IngressAnnotations;
use crate::constants::{HTTPS_PORT, HTTP_PORT, MAX_LISTENER_HOSTNAMES};
use crate::controller_errors::{ControllerError, ErrorCode};
use crate::event_reasons::{ACTION_BUILD, REASON_LISTENER_CONFLICT};
use crate::recorder::IngressNotice;

use super::builder::BuildContext;
use super::certificates::listener_certificate;
use super::document::{
    FrontendPort, FrontendPortProperties, HttpListener, HttpListenerProperties, Protocol,
    SubResource,
};
use super::identifier::{ChildKind, ListenerId};
use super::ingress_rules::rules;

/// Everything about a listener beyond its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    pub protocol: Protocol,
    /// Gateway certificate name, for HTTPS listeners
    pub ssl_certificate: Option<String>,
    /// HTTPS listener this HTTP listener redirects to
    pub redirect_to: Option<ListenerId>,
}

impl ListenerConfig {
    #[must_use]
    pub fn http() -> Self {
        Self {
            protocol: Protocol::Http,
            ssl_certificate: None,
            redirect_to: None,
        }
    }
}

/// Listeners keyed by identity, in identity order.
pub type ListenerPlan = BTreeMap<ListenerId, ListenerConfig>;

/// Listeners needed by one rule of `ingress`; `None` stands for the default backend.
#[must_use]
pub fn rule_listeners(
    ctx: &BuildContext<'_>,
    ingress: &Ingress,
    annotations: &IngressAnnotations,
    rule: Option<&IngressRule>,
) -> Vec<(ListenerId, ListenerConfig)> {
    let host = rule
        .and_then(|r| r.host.as_deref())
        .filter(|h| !h.is_empty());
    let hosts: Vec<String> = host
        .into_iter()
        .map(ToString::to_string)
        .chain(annotations.hostname_extensions.iter().cloned())
        .collect();
    let private = annotations.uses_private_ip(ctx.use_private_ip);
    let listener_id = |port: i32| {
        let mut id = ListenerId::new(port, hosts.clone(), private);
        id.host_names.truncate(MAX_LISTENER_HOSTNAMES);
        id
    };

    let mut listeners = Vec::with_capacity(2);
    let https = listener_certificate(ctx, ingress, annotations, host).map(|cert| {
        (
            listener_id(annotations.override_frontend_port.unwrap_or(HTTPS_PORT)),
            ListenerConfig {
                protocol: Protocol::Https,
                ssl_certificate: Some(cert),
                redirect_to: None,
            },
        )
    });

    if https.is_none() || annotations.ssl_redirect {
        let port = if https.is_some() {
            HTTP_PORT
        } else {
            annotations.override_frontend_port.unwrap_or(HTTP_PORT)
        };
        let redirect_to = https
            .as_ref()
            .filter(|_| annotations.ssl_redirect)
            .map(|(id, _)| id.clone());
        listeners.push((
            listener_id(port),
            ListenerConfig {
                redirect_to,
                ..ListenerConfig::http()
            },
        ));
    }
    listeners.extend(https);
    listeners
}

/// Listeners needed by `ingress`, paired with the rule index they come from.
///
/// An Ingress without rules contributes its default backend as rule `None`.
#[must_use]
pub fn ingress_listeners(
    ctx: &BuildContext<'_>,
    ingress: &Ingress,
    annotations: &IngressAnnotations,
) -> Vec<(Option<usize>, ListenerId, ListenerConfig)> {
    let rules = rules(ingress);
    if rules.is_empty() {
        let has_default = ingress
            .spec
            .as_ref()
            .is_some_and(|s| s.default_backend.is_some());
        if !has_default {
            return Vec::new();
        }
        return rule_listeners(ctx, ingress, annotations, None)
            .into_iter()
            .map(|(id, config)| (None, id, config))
            .collect();
    }
    rules
        .iter()
        .enumerate()
        .flat_map(|(index, rule)| {
            rule_listeners(ctx, ingress, annotations, Some(rule))
                .into_iter()
                .map(move |(id, config)| (Some(index), id, config))
        })
        .collect()
}

/// Every listener the accepted Ingresses need.
///
/// Without any Ingress a catch-all HTTP listener on port 80 serves the default backend.
pub fn plan_listeners(ctx: &BuildContext<'_>, notices: &mut Vec<IngressNotice>) -> ListenerPlan {
    let mut plan = ListenerPlan::new();
    for ingress in ctx.ingresses {
        let annotations = IngressAnnotations::from_ingress(ingress);
        for (_, id, config) in ingress_listeners(ctx, ingress, &annotations) {
            match plan.get(&id) {
                None => {
                    plan.insert(id, config);
                }
                Some(existing) if *existing == config => {}
                Some(_) => {
                    warn!(ingress = %ingress.name_any(), listener = %id, "Conflicting listener configuration");
                    notices.push(IngressNotice::new(
                        ingress,
                        REASON_LISTENER_CONFLICT,
                        ACTION_BUILD,
                        format!("Listener {id} is already configured differently by another ingress"),
                    ));
                }
            }
        }
    }
    if plan.is_empty() {
        plan.insert(
            ListenerId::default_for(HTTP_PORT, ctx.use_private_ip),
            ListenerConfig::http(),
        );
    }
    plan
}

/// Frontend ports used by `plan`, reusing ports already on the gateway.
#[must_use]
pub fn frontend_ports(ctx: &BuildContext<'_>, plan: &ListenerPlan) -> Vec<FrontendPort> {
    let numbers: BTreeSet<i32> = plan.keys().map(|id| id.frontend_port).collect();
    numbers
        .into_iter()
        .map(|number| {
            ctx.existing
                .properties
                .frontend_ports
                .iter()
                .find(|p| p.properties.port == Some(number))
                .cloned()
                .unwrap_or_else(|| {
                    let name = ctx.namer.frontend_port_name(number);
                    FrontendPort::new(
                        ctx.namer.child_id(ChildKind::FrontendPorts, &name),
                        name,
                        FrontendPortProperties {
                            port: Some(number),
                            ..Default::default()
                        },
                    )
                })
        })
        .collect()
}

/// HTTP listeners for `plan`.
///
/// # Errors
///
/// `NoPublicIP` / `NoPrivateIP` when the gateway lacks the frontend a listener needs.
pub fn http_listeners(
    ctx: &BuildContext<'_>,
    plan: &ListenerPlan,
    ports: &[FrontendPort],
) -> Result<Vec<HttpListener>, ControllerError> {
    let mut listeners = Vec::with_capacity(plan.len());
    for (id, config) in plan {
        let frontend = ctx
            .existing
            .frontend_ip(id.use_private_ip)
            .and_then(|fip| fip.reference())
            .ok_or_else(|| {
                if id.use_private_ip {
                    ControllerError::new(
                        ErrorCode::NoPrivateIP,
                        "Gateway has no private frontend IP configuration",
                    )
                } else {
                    ControllerError::new(
                        ErrorCode::NoPublicIP,
                        "Gateway has no public frontend IP configuration",
                    )
                }
            })?;
        let port = ports
            .iter()
            .find(|p| p.properties.port == Some(id.frontend_port))
            .and_then(FrontendPort::reference);

        let (host_name, host_names) = match id.host_names.as_slice() {
            [] => (None, Vec::new()),
            [single] => (Some(single.clone()), Vec::new()),
            many => (None, many.to_vec()),
        };

        let name = ctx.namer.listener_name(id);
        listeners.push(HttpListener::new(
            ctx.namer.child_id(ChildKind::HttpListeners, &name),
            name,
            HttpListenerProperties {
                frontend_ip_configuration: Some(frontend),
                frontend_port: port,
                protocol: Some(config.protocol.clone()),
                host_name,
                host_names,
                ssl_certificate: config.ssl_certificate.as_ref().map(|cert| {
                    SubResource::new(ctx.namer.child_id(ChildKind::SslCertificates, cert))
                }),
                ..Default::default()
            },
        ));
    }
    listeners.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listeners)
}

#[cfg(test)]
#[path = "frontend_tests.rs"]
mod frontend_tests;
