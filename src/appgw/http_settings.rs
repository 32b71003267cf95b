// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend HTTP settings, one per resolved backend plus the reserved default.

use std::collections::BTreeMap;

use crate::annotations::{BackendProtocol, IngressAnnotations};
use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, HTTP_PORT};

use super::backend_pools::{ResolvedBackends, ServicePortPair};
use super::builder::BuildContext;
use super::document::{
    BackendHttpSettings, BackendHttpSettingsProperties, ConnectionDraining, Protocol, SubResource,
};
use super::identifier::{ChildKind, ResourceNamer};
use super::ingress_rules::BackendId;
use super::probes::protocol_of;

const AFFINITY_ENABLED: &str = "Enabled";
const AFFINITY_DISABLED: &str = "Disabled";

/// Settings serving a resolved backend.
#[must_use]
pub fn settings_name(namer: &ResourceNamer, id: &BackendId, ports: ServicePortPair) -> String {
    namer.http_settings_name(
        &id.namespace,
        &id.service,
        &id.port.to_string(),
        ports.backend_port,
        &id.ingress,
    )
}

/// The reserved settings used by default routes: port 80, HTTP, default probe.
#[must_use]
pub fn default_http_settings(ctx: &BuildContext<'_>) -> BackendHttpSettings {
    let name = ctx.namer.default_http_settings_name();
    let probe = ctx.namer.default_probe_name(&Protocol::Http);
    BackendHttpSettings::new(
        ctx.namer.child_id(ChildKind::BackendHttpSettingsCollection, &name),
        name,
        BackendHttpSettingsProperties {
            port: Some(HTTP_PORT),
            protocol: Some(Protocol::Http),
            cookie_based_affinity: Some(AFFINITY_DISABLED.to_string()),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            probe: Some(SubResource::new(ctx.namer.child_id(ChildKind::Probes, &probe))),
            ..Default::default()
        },
    )
}

fn settings_properties(
    ctx: &BuildContext<'_>,
    ports: ServicePortPair,
    annotations: &IngressAnnotations,
    probe: Option<&String>,
) -> BackendHttpSettingsProperties {
    let protocol = annotations.protocol();
    let trusted_root_certificates = if protocol == BackendProtocol::Https {
        annotations
            .appgw_trusted_root_certificates
            .iter()
            .map(|root| {
                SubResource::new(ctx.namer.child_id(ChildKind::TrustedRootCertificates, root))
            })
            .collect()
    } else {
        Vec::new()
    };

    BackendHttpSettingsProperties {
        port: Some(ports.backend_port),
        protocol: Some(protocol_of(protocol)),
        cookie_based_affinity: Some(
            if annotations.cookie_based_affinity {
                AFFINITY_ENABLED
            } else {
                AFFINITY_DISABLED
            }
            .to_string(),
        ),
        request_timeout: Some(annotations.request_timeout),
        probe: probe.map(|name| SubResource::new(ctx.namer.child_id(ChildKind::Probes, name))),
        host_name: annotations.backend_hostname.clone(),
        path: annotations.backend_path_prefix.clone(),
        connection_draining: annotations.connection_draining.then(|| ConnectionDraining {
            enabled: true,
            drain_timeout_in_sec: annotations.connection_draining_timeout,
        }),
        trusted_root_certificates,
        ..Default::default()
    }
}

/// Settings for the new document, default first, then by name.
#[must_use]
pub fn backend_http_settings(
    ctx: &BuildContext<'_>,
    resolved: &ResolvedBackends,
    probes: &BTreeMap<BackendId, String>,
) -> Vec<BackendHttpSettings> {
    let mut settings: BTreeMap<String, BackendHttpSettings> = BTreeMap::new();
    for (id, backend) in resolved {
        let Some(ingress) = ctx.ingress(&id.namespace, &id.ingress) else {
            continue;
        };
        let name = settings_name(ctx.namer, id, backend.ports);
        if settings.contains_key(&name) {
            continue;
        }
        let annotations = IngressAnnotations::from_ingress(ingress);
        let props = settings_properties(ctx, backend.ports, &annotations, probes.get(id));
        settings.insert(
            name.clone(),
            BackendHttpSettings::new(
                ctx.namer
                    .child_id(ChildKind::BackendHttpSettingsCollection, &name),
                name,
                props,
            ),
        );
    }

    let mut all = vec![default_http_settings(ctx)];
    all.extend(settings.into_values());
    all
}
