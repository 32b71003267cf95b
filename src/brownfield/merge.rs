// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fold the unmanaged partition back into a freshly generated document.
//!
//! Unmanaged children come first and are kept exactly as fetched. A generated child
//! with the same name is dropped when its properties are identical and is a
//! [`ErrorCode::UnmanagedResourceCollision`] otherwise.
//!
//! When a generated listener has the same frontend, port and hostnames as an
//! unmanaged one, ARM would reject the pair. The generated path rules are appended to
//! the unmanaged URL path map instead (skipping paths it already serves) and the
//! generated listener, routing rule and path map are dropped.

use std::collections::BTreeSet;
use std::mem::take;
use tracing::{debug, warn};

use crate::appgw::document::{
    ApplicationGateway, GatewayChild, HttpListener, RuleType, UrlPathMap,
};
use crate::appgw::identifier::ResourceNamer;
use crate::controller_errors::{ControllerError, ErrorCode};

use super::partition::UnmanagedResources;

/// Identity of a listener as ARM sees it.
#[derive(Debug, PartialEq, Eq)]
struct ListenerKey {
    frontend_ip: String,
    port: Option<i32>,
    hosts: Vec<String>,
}

fn listener_key(gateway: &ApplicationGateway, listener: &HttpListener) -> ListenerKey {
    let mut hosts = listener.properties.all_host_names();
    hosts.sort();
    ListenerKey {
        frontend_ip: listener
            .properties
            .frontend_ip_configuration
            .as_ref()
            .map(|f| f.name().to_string())
            .unwrap_or_default(),
        port: listener
            .properties
            .frontend_port
            .as_ref()
            .and_then(|p| gateway.frontend_port_number(p)),
        hosts,
    }
}

/// Concatenate `unmanaged` and `generated`, deduplicating by name.
fn merge_children<P>(
    kind: &str,
    unmanaged: Vec<GatewayChild<P>>,
    generated: Vec<GatewayChild<P>>,
) -> Result<Vec<GatewayChild<P>>, ControllerError>
where
    P: PartialEq,
{
    let mut merged = unmanaged;
    for child in generated {
        match merged.iter().find(|existing| existing.name == child.name) {
            Some(existing) if existing.properties == child.properties => {
                debug!(kind, name = %child.name, "Generated child matches unmanaged child");
            }
            Some(_) => {
                return Err(ControllerError::new(
                    ErrorCode::UnmanagedResourceCollision,
                    format!("generated {kind} {} collides with an unmanaged {kind}", child.name),
                ));
            }
            None => merged.push(child),
        }
    }
    Ok(merged)
}

/// Move the path rules of generated listeners that shadow unmanaged listeners into the
/// unmanaged path maps, dropping the shadowing listener, rule and path map.
fn absorb_shadowed_listeners(
    generated: &mut ApplicationGateway,
    unmanaged: &mut UnmanagedResources,
    existing: &ApplicationGateway,
    namer: &ResourceNamer,
) {
    let mut dropped_listeners = BTreeSet::new();
    let mut dropped_rules = BTreeSet::new();
    let mut dropped_maps = BTreeSet::new();

    for listener in &generated.properties.http_listeners {
        let key = listener_key(generated, listener);
        let Some(shadowed) = unmanaged
            .http_listeners
            .iter()
            .find(|u| listener_key(existing, u) == key)
        else {
            continue;
        };

        let generated_rule = generated.properties.request_routing_rules.iter().find(|r| {
            r.properties
                .http_listener
                .as_ref()
                .is_some_and(|l| l.name() == listener.name)
        });
        let generated_map = generated_rule
            .and_then(|r| r.properties.url_path_map.as_ref())
            .and_then(|m| {
                generated
                    .properties
                    .url_path_maps
                    .iter()
                    .find(|map| map.name == m.name())
            });

        let unmanaged_rule = unmanaged.request_routing_rules.iter().find(|r| {
            r.properties
                .http_listener
                .as_ref()
                .is_some_and(|l| l.name() == shadowed.name)
        });

        match unmanaged_rule.map(|r| (r.properties.rule_type.clone(), r.properties.url_path_map.clone())) {
            Some((Some(RuleType::PathBasedRouting), Some(map_ref))) => {
                if let (Some(target), Some(source)) = (
                    unmanaged
                        .url_path_maps
                        .iter_mut()
                        .find(|m| m.name == map_ref.name()),
                    generated_map,
                ) {
                    append_path_rules(target, source, namer);
                }
            }
            _ => {
                warn!(
                    listener = %listener.name,
                    unmanaged = %shadowed.name,
                    "Generated listener shadows an unmanaged basic rule; dropping generated routing"
                );
            }
        }

        dropped_listeners.insert(listener.name.clone());
        if let Some(rule) = generated_rule {
            dropped_rules.insert(rule.name.clone());
        }
        if let Some(map) = generated_map {
            dropped_maps.insert(map.name.clone());
        }
    }

    let props = &mut generated.properties;
    props
        .http_listeners
        .retain(|l| !dropped_listeners.contains(&l.name));
    props
        .request_routing_rules
        .retain(|r| !dropped_rules.contains(&r.name));
    props.url_path_maps.retain(|m| !dropped_maps.contains(&m.name));
}

fn append_path_rules(target: &mut UrlPathMap, source: &UrlPathMap, namer: &ResourceNamer) {
    let served: BTreeSet<String> = target
        .properties
        .path_rules
        .iter()
        .flat_map(|r| r.properties.paths.iter().cloned())
        .collect();
    for rule in &source.properties.path_rules {
        let mut rule = rule.clone();
        rule.properties.paths.retain(|p| !served.contains(p));
        if rule.properties.paths.is_empty() {
            continue;
        }
        if target.properties.path_rules.iter().any(|r| r.name == rule.name) {
            continue;
        }
        rule.id = Some(namer.path_rule_id(&target.name, &rule.name));
        debug!(path_map = %target.name, rule = %rule.name, "Merging generated path rule into unmanaged path map");
        target.properties.path_rules.push(rule);
    }
}

/// Combine the generated document with the unmanaged resources of `existing`.
///
/// # Errors
///
/// Returns [`ErrorCode::UnmanagedResourceCollision`] when a generated child has the
/// name of an unmanaged child but different properties.
pub fn merge_unmanaged(
    mut generated: ApplicationGateway,
    unmanaged: &UnmanagedResources,
    existing: &ApplicationGateway,
    namer: &ResourceNamer,
) -> Result<ApplicationGateway, ControllerError> {
    if unmanaged.is_empty() {
        return Ok(generated);
    }
    let mut unmanaged = unmanaged.clone();
    absorb_shadowed_listeners(&mut generated, &mut unmanaged, existing, namer);

    // Generated priorities must not clash with priorities another tenant owns.
    let mut taken: BTreeSet<i32> = unmanaged
        .request_routing_rules
        .iter()
        .filter_map(|r| r.properties.priority)
        .collect();
    for rule in &mut generated.properties.request_routing_rules {
        if let Some(mut priority) = rule.properties.priority {
            while taken.contains(&priority) {
                priority += 1;
            }
            taken.insert(priority);
            rule.properties.priority = Some(priority);
        }
    }

    let props = &mut generated.properties;
    let u = unmanaged;
    props.frontend_ports = merge_children("frontend port", u.frontend_ports, take(&mut props.frontend_ports))?;
    props.http_listeners = merge_children("listener", u.http_listeners, take(&mut props.http_listeners))?;
    props.ssl_certificates = merge_children(
        "ssl certificate",
        u.ssl_certificates,
        take(&mut props.ssl_certificates),
    )?;
    props.backend_address_pools = merge_children(
        "backend pool",
        u.backend_address_pools,
        take(&mut props.backend_address_pools),
    )?;
    props.backend_http_settings_collection = merge_children(
        "http settings",
        u.backend_http_settings_collection,
        take(&mut props.backend_http_settings_collection),
    )?;
    props.probes = merge_children("probe", u.probes, take(&mut props.probes))?;
    props.request_routing_rules = merge_children(
        "routing rule",
        u.request_routing_rules,
        take(&mut props.request_routing_rules),
    )?;
    props.url_path_maps = merge_children("url path map", u.url_path_maps, take(&mut props.url_path_maps))?;
    props.redirect_configurations = merge_children(
        "redirect",
        u.redirect_configurations,
        take(&mut props.redirect_configurations),
    )?;
    props.rewrite_rule_sets = merge_children(
        "rewrite rule set",
        u.rewrite_rule_sets,
        take(&mut props.rewrite_rule_sets),
    )?;
    props.load_distribution_policies = merge_children(
        "load distribution policy",
        u.load_distribution_policies,
        take(&mut props.load_distribution_policies),
    )?;
    Ok(generated)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod merge_tests;
