// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health probes for resolved backends.
//!
//! A probe starts from the default probe for the backend protocol and is refined, in
//! order, by:
//!
//! 1. the Ingress rule host (or `backend-hostname`) and path the backend was first seen
//!    under;
//! 2. the readiness (else liveness) `httpGet` probe of a pod behind the service whose
//!    container exposes the backend port;
//! 3. the `health-probe-*` annotations.
//!
//! Probes identical to one emitted earlier (default probes included) are not repeated;
//! the backend settings reference the earlier probe instead.

use k8s_openapi::api::core::v1::{HTTPGetAction, Probe as ContainerProbe};
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::annotations::{BackendProtocol, IngressAnnotations};
use crate::cache::selector_matches;
use crate::constants::{
    DEFAULT_PROBE_HOST, DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_PROBE_PATH,
    DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_PROBE_UNHEALTHY_THRESHOLD,
};

use super::backend_pools::{ResolvedBackend, ResolvedBackends};
use super::builder::BuildContext;
use super::document::{Probe, ProbeMatch, ProbeProperties, Protocol};
use super::identifier::ChildKind;
use super::ingress_rules::BackendId;

/// Status codes a default probe accepts.
const DEFAULT_PROBE_STATUS_CODES: &str = "200-399";

#[must_use]
pub fn protocol_of(protocol: BackendProtocol) -> Protocol {
    match protocol {
        BackendProtocol::Http => Protocol::Http,
        BackendProtocol::Https => Protocol::Https,
    }
}

fn default_probe_properties(protocol: Protocol) -> ProbeProperties {
    ProbeProperties {
        protocol: Some(protocol),
        host: Some(DEFAULT_PROBE_HOST.to_string()),
        path: Some(DEFAULT_PROBE_PATH.to_string()),
        interval: Some(DEFAULT_PROBE_INTERVAL_SECS),
        timeout: Some(DEFAULT_PROBE_TIMEOUT_SECS),
        unhealthy_threshold: Some(DEFAULT_PROBE_UNHEALTHY_THRESHOLD),
        match_: Some(ProbeMatch {
            status_codes: vec![DEFAULT_PROBE_STATUS_CODES.to_string()],
            body: None,
        }),
        ..Default::default()
    }
}

/// The reserved default probe for `protocol`.
#[must_use]
pub fn default_probe(ctx: &BuildContext<'_>, protocol: Protocol) -> Probe {
    let name = ctx.namer.default_probe_name(&protocol);
    Probe::new(
        ctx.namer.child_id(ChildKind::Probes, &name),
        name,
        default_probe_properties(protocol),
    )
}

/// `httpGet` action of the first pod behind the backend exposing its port.
fn container_http_get<'a>(
    ctx: &'a BuildContext<'_>,
    id: &'a BackendId,
    backend_port: i32,
) -> Option<(&'a ContainerProbe, &'a HTTPGetAction)> {
    let service = ctx.snapshot.service(&id.namespace, &id.service)?;
    ctx.snapshot
        .pods_in(&id.namespace)
        .filter(|pod| selector_matches(service, pod.labels()))
        .filter_map(|pod| pod.spec.as_ref())
        .flat_map(|spec| spec.containers.iter())
        .filter(|container| {
            container
                .ports
                .iter()
                .flatten()
                .any(|p| p.container_port == backend_port)
        })
        .find_map(|container| {
            [
                container.readiness_probe.as_ref(),
                container.liveness_probe.as_ref(),
            ]
            .into_iter()
            .flatten()
            .find_map(|probe| probe.http_get.as_ref().map(|get| (probe, get)))
        })
}

fn probe_properties(
    ctx: &BuildContext<'_>,
    id: &BackendId,
    backend: &ResolvedBackend,
    annotations: &IngressAnnotations,
) -> ProbeProperties {
    let mut props = default_probe_properties(protocol_of(annotations.protocol()));

    let host = annotations
        .backend_hostname
        .clone()
        .or_else(|| backend.hint.host.clone())
        .filter(|h| !h.contains('*'));
    if host.is_some() {
        props.host = host;
    }
    let path = annotations.backend_path_prefix.clone().or_else(|| {
        backend
            .hint
            .path
            .as_deref()
            .map(|p| p.trim_end_matches('*').to_string())
    });
    if let Some(path) = path.filter(|p| !p.is_empty()) {
        props.path = Some(path);
    }

    if let Some((probe, get)) = container_http_get(ctx, id, backend.ports.backend_port) {
        if let Some(host) = get.host.as_ref().filter(|h| !h.is_empty()) {
            props.host = Some(host.clone());
        }
        if let Some(path) = get.path.as_ref().filter(|p| !p.is_empty()) {
            props.path = Some(path.clone());
        }
        if get.scheme.as_deref() == Some("HTTPS") {
            props.protocol = Some(Protocol::Https);
        }
        if let Some(period) = probe.period_seconds.filter(|v| *v > 0) {
            props.interval = Some(period);
        }
        if let Some(timeout) = probe.timeout_seconds.filter(|v| *v > 0) {
            props.timeout = Some(timeout);
        }
        if let Some(threshold) = probe.failure_threshold.filter(|v| *v > 0) {
            props.unhealthy_threshold = Some(threshold);
        }
    }

    if let Some(host) = annotations.health_probe_hostname.as_ref() {
        props.host = Some(host.clone());
    }
    if let Some(path) = annotations.health_probe_path.as_ref() {
        props.path = Some(path.clone());
    }
    if let Some(port) = annotations.health_probe_port.filter(|p| (1..=65535).contains(p)) {
        props.port = Some(port);
    }
    if let Some(interval) = annotations.health_probe_interval.filter(|v| *v > 0) {
        props.interval = Some(interval);
    }
    if let Some(timeout) = annotations.health_probe_timeout.filter(|v| *v > 0) {
        props.timeout = Some(timeout);
    }
    if let Some(threshold) = annotations.health_probe_unhealthy_threshold.filter(|v| *v > 0) {
        props.unhealthy_threshold = Some(threshold);
    }
    if !annotations.health_probe_status_codes.is_empty() {
        props.match_ = Some(ProbeMatch {
            status_codes: annotations.health_probe_status_codes.clone(),
            body: None,
        });
    }
    props
}

/// Probes for the new document and the probe each backend's settings should use.
#[must_use]
pub fn health_probes(
    ctx: &BuildContext<'_>,
    resolved: &ResolvedBackends,
) -> (Vec<Probe>, BTreeMap<BackendId, String>) {
    let mut probes = vec![
        default_probe(ctx, Protocol::Http),
        default_probe(ctx, Protocol::Https),
    ];
    let mut assigned = BTreeMap::new();

    for (id, backend) in resolved {
        let Some(ingress) = ctx.ingress(&id.namespace, &id.ingress) else {
            continue;
        };
        let annotations = IngressAnnotations::from_ingress(ingress);
        let props = probe_properties(ctx, id, backend, &annotations);

        if let Some(same) = probes.iter().find(|p| p.properties == props) {
            assigned.insert(id.clone(), same.name.clone());
            continue;
        }
        let name = ctx.namer.probe_name(
            &id.namespace,
            &id.service,
            &id.port.to_string(),
            &ingress.name_any(),
        );
        if probes.iter().any(|p| p.name == name) {
            assigned.insert(id.clone(), name);
            continue;
        }
        assigned.insert(id.clone(), name.clone());
        probes.push(Probe::new(
            ctx.namer.child_id(ChildKind::Probes, &name),
            name,
            props,
        ));
    }

    probes.sort_by(|a, b| a.name.cmp(&b.name));
    (probes, assigned)
}

#[cfg(test)]
#[path = "probes_tests.rs"]
mod probes_tests;
