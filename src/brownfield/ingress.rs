// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remove prohibited host/path pairs from an Ingress before it reaches the builder.

use k8s_openapi::api::networking::v1::{HTTPIngressRuleValue, Ingress, IngressRule};
use kube::ResourceExt;
use tracing::debug;

use crate::annotations::IngressAnnotations;
use crate::constants::{HTTPS_PORT, HTTP_PORT};

use super::targets::TargetPolicy;

/// Frontend ports the ingress will listen on.
fn listener_ports(ingress: &Ingress) -> Vec<i32> {
    let annotations = IngressAnnotations::from_ingress(ingress);
    if let Some(port) = annotations.override_frontend_port {
        return vec![port];
    }
    let has_tls = ingress
        .spec
        .as_ref()
        .and_then(|s| s.tls.as_ref())
        .is_some_and(|tls| !tls.is_empty());
    if has_tls {
        vec![HTTP_PORT, HTTPS_PORT]
    } else {
        vec![HTTP_PORT]
    }
}

/// Strip every prohibited path from `ingress`.
///
/// Rules left without paths are dropped. Returns `None` when nothing remains, in which
/// case the whole ingress is off limits.
#[must_use]
pub fn prune_prohibited_rules(ingress: &Ingress, policy: &TargetPolicy) -> Option<Ingress> {
    if policy.is_empty() {
        return Some(ingress.clone());
    }
    let rules = ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .cloned()
        .unwrap_or_default();
    if rules.is_empty() {
        return Some(ingress.clone());
    }

    let ports = listener_ports(ingress);
    let prohibited = |host: Option<&str>, path: Option<&str>| {
        ports
            .iter()
            .any(|port| policy.is_prohibited(host, Some(*port), path))
    };

    let mut kept: Vec<IngressRule> = Vec::new();
    for rule in rules {
        let Some(http) = rule.http.as_ref() else {
            continue;
        };
        let host = rule.host.as_deref();
        let paths: Vec<_> = http
            .paths
            .iter()
            .filter(|p| {
                let blocked = prohibited(host, p.path.as_deref());
                if blocked {
                    debug!(
                        ingress = %ingress.name_any(),
                        host = ?host,
                        path = ?p.path,
                        "Dropping prohibited ingress path"
                    );
                }
                !blocked
            })
            .cloned()
            .collect();
        if !paths.is_empty() {
            kept.push(IngressRule {
                host: rule.host.clone(),
                http: Some(HTTPIngressRuleValue { paths }),
            });
        }
    }

    if kept.is_empty() {
        return None;
    }
    let mut pruned = ingress.clone();
    if let Some(spec) = pruned.spec.as_mut() {
        spec.rules = Some(kept);
    }
    Some(pruned)
}
