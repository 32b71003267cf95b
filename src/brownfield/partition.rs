// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Split a live gateway into the part owned by other tenants and the part the
//! controller may rewrite.
//!
//! The walk starts at listeners: a listener serving a prohibited host is unmanaged.
//! Everything reachable from an unmanaged listener through its routing rule is
//! unmanaged too (path maps, pools, settings, probes, redirects, rewrite sets,
//! load distribution policies, certificates and frontend ports). Redirects that
//! target another listener pull that listener in, so the walk repeats until nothing
//! new is found.

use std::collections::BTreeSet;
use tracing::debug;

use crate::appgw::document::{
    ApplicationGateway, BackendAddressPool, BackendHttpSettings, FrontendPort, GatewayChild,
    HttpListener, LoadDistributionPolicy, Probe, RedirectConfiguration, RequestRoutingRule,
    RewriteRuleSet, SslCertificate, SubResource, UrlPathMap,
};

use super::targets::TargetPolicy;

/// Gateway children that must survive the next update unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnmanagedResources {
    pub frontend_ports: Vec<FrontendPort>,
    pub http_listeners: Vec<HttpListener>,
    pub ssl_certificates: Vec<SslCertificate>,
    pub backend_address_pools: Vec<BackendAddressPool>,
    pub backend_http_settings_collection: Vec<BackendHttpSettings>,
    pub probes: Vec<Probe>,
    pub request_routing_rules: Vec<RequestRoutingRule>,
    pub url_path_maps: Vec<UrlPathMap>,
    pub redirect_configurations: Vec<RedirectConfiguration>,
    pub rewrite_rule_sets: Vec<RewriteRuleSet>,
    pub load_distribution_policies: Vec<LoadDistributionPolicy>,
}

impl UnmanagedResources {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http_listeners.is_empty() && self.request_routing_rules.is_empty()
    }

    /// Names of every unmanaged listener.
    #[must_use]
    pub fn listener_names(&self) -> BTreeSet<String> {
        self.http_listeners.iter().map(|l| l.name.clone()).collect()
    }
}

/// Names reachable from the unmanaged listeners, per collection.
#[derive(Default)]
struct Reachable {
    listeners: BTreeSet<String>,
    rules: BTreeSet<String>,
    path_maps: BTreeSet<String>,
    pools: BTreeSet<String>,
    settings: BTreeSet<String>,
    probes: BTreeSet<String>,
    redirects: BTreeSet<String>,
    rewrites: BTreeSet<String>,
    policies: BTreeSet<String>,
    certificates: BTreeSet<String>,
    ports: BTreeSet<String>,
}

fn insert(set: &mut BTreeSet<String>, reference: Option<&SubResource>) {
    if let Some(reference) = reference {
        set.insert(reference.name().to_string());
    }
}

fn pick<P: Clone>(children: &[GatewayChild<P>], names: &BTreeSet<String>) -> Vec<GatewayChild<P>> {
    children
        .iter()
        .filter(|c| names.contains(&c.name))
        .cloned()
        .collect()
}

/// Whether `listener` serves a host the policy reserves for someone else.
#[must_use]
pub fn is_listener_unmanaged(
    gateway: &ApplicationGateway,
    listener: &HttpListener,
    policy: &TargetPolicy,
) -> bool {
    let port = listener
        .properties
        .frontend_port
        .as_ref()
        .and_then(|p| gateway.frontend_port_number(p));
    let hosts = listener.properties.all_host_names();
    if hosts.is_empty() {
        return policy.is_host_prohibited(None, port);
    }
    hosts
        .iter()
        .any(|host| policy.is_host_prohibited(Some(host), port))
}

/// Collect the unmanaged part of `gateway`.
#[must_use]
pub fn partition(gateway: &ApplicationGateway, policy: &TargetPolicy) -> UnmanagedResources {
    let props = &gateway.properties;
    if policy.is_empty() {
        return UnmanagedResources::default();
    }

    let mut reach = Reachable {
        listeners: props
            .http_listeners
            .iter()
            .filter(|l| is_listener_unmanaged(gateway, l, policy))
            .map(|l| l.name.clone())
            .collect(),
        ..Reachable::default()
    };

    // Rules and their redirects until no redirect pulls in another listener.
    loop {
        for rule in &props.request_routing_rules {
            let on_unmanaged = rule
                .properties
                .http_listener
                .as_ref()
                .is_some_and(|l| reach.listeners.contains(l.name()));
            if !on_unmanaged {
                continue;
            }
            reach.rules.insert(rule.name.clone());
            insert(&mut reach.path_maps, rule.properties.url_path_map.as_ref());
            insert(&mut reach.pools, rule.properties.backend_address_pool.as_ref());
            insert(&mut reach.settings, rule.properties.backend_http_settings.as_ref());
            insert(&mut reach.redirects, rule.properties.redirect_configuration.as_ref());
            insert(&mut reach.rewrites, rule.properties.rewrite_rule_set.as_ref());
            insert(&mut reach.policies, rule.properties.load_distribution_policy.as_ref());
        }

        for map in props
            .url_path_maps
            .iter()
            .filter(|m| reach.path_maps.contains(&m.name))
        {
            let p = &map.properties;
            insert(&mut reach.pools, p.default_backend_address_pool.as_ref());
            insert(&mut reach.settings, p.default_backend_http_settings.as_ref());
            insert(&mut reach.redirects, p.default_redirect_configuration.as_ref());
            insert(&mut reach.rewrites, p.default_rewrite_rule_set.as_ref());
            insert(&mut reach.policies, p.default_load_distribution_policy.as_ref());
            for rule in &p.path_rules {
                let r = &rule.properties;
                insert(&mut reach.pools, r.backend_address_pool.as_ref());
                insert(&mut reach.settings, r.backend_http_settings.as_ref());
                insert(&mut reach.redirects, r.redirect_configuration.as_ref());
                insert(&mut reach.rewrites, r.rewrite_rule_set.as_ref());
                insert(&mut reach.policies, r.load_distribution_policy.as_ref());
            }
        }

        let before = reach.listeners.len();
        for redirect in props
            .redirect_configurations
            .iter()
            .filter(|r| reach.redirects.contains(&r.name))
        {
            insert(&mut reach.listeners, redirect.properties.target_listener.as_ref());
        }
        if reach.listeners.len() == before {
            break;
        }
    }

    for ldp in props
        .load_distribution_policies
        .iter()
        .filter(|p| reach.policies.contains(&p.name))
    {
        for target in &ldp.properties.load_distribution_targets {
            insert(&mut reach.pools, target.properties.backend_address_pool.as_ref());
        }
    }
    for settings in props
        .backend_http_settings_collection
        .iter()
        .filter(|s| reach.settings.contains(&s.name))
    {
        insert(&mut reach.probes, settings.properties.probe.as_ref());
    }
    for listener in props
        .http_listeners
        .iter()
        .filter(|l| reach.listeners.contains(&l.name))
    {
        insert(&mut reach.certificates, listener.properties.ssl_certificate.as_ref());
        insert(&mut reach.ports, listener.properties.frontend_port.as_ref());
    }

    debug!(
        listeners = reach.listeners.len(),
        rules = reach.rules.len(),
        pools = reach.pools.len(),
        "Partitioned existing gateway configuration"
    );

    UnmanagedResources {
        frontend_ports: pick(&props.frontend_ports, &reach.ports),
        http_listeners: pick(&props.http_listeners, &reach.listeners),
        ssl_certificates: pick(&props.ssl_certificates, &reach.certificates),
        backend_address_pools: pick(&props.backend_address_pools, &reach.pools),
        backend_http_settings_collection: pick(
            &props.backend_http_settings_collection,
            &reach.settings,
        ),
        probes: pick(&props.probes, &reach.probes),
        request_routing_rules: pick(&props.request_routing_rules, &reach.rules),
        url_path_maps: pick(&props.url_path_maps, &reach.path_maps),
        redirect_configurations: pick(&props.redirect_configurations, &reach.redirects),
        rewrite_rule_sets: pick(&props.rewrite_rule_sets, &reach.rewrites),
        load_distribution_policies: pick(&props.load_distribution_policies, &reach.policies),
    }
}

#[cfg(test)]
#[path = "partition_tests.rs"]
mod partition_tests;
