// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Request routing rules and URL path maps.
//!
//! Each planned listener gets exactly one routing rule. Paths contributed by every
//! Ingress rule on the listener are merged into one URL path map:
//!
//! - paths are expanded by type (`Prefix` gains `*`); the first Ingress to claim a path
//!   keeps it;
//! - `""`, `/` and `/*` select the listener default instead of a path rule. Without one,
//!   the Ingress `defaultBackend` serves as default, else the reserved default pool;
//! - a redirecting HTTP listener redirects by default and on every path.
//!
//! A listener without path rules gets a `Basic` rule; otherwise the rule is
//! `PathBasedRouting` over the map.
//!
//! Priorities start at 19000 in steps of 5: exact hosts first, wildcard hosts next,
//! host-less listeners last; more hostnames before fewer; then by rule name.

use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use kube::ResourceExt;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::annotations::IngressAnnotations;
use crate::constants::{ROUTING_RULE_PRIORITY_BASE, ROUTING_RULE_PRIORITY_STEP};

use super::backend_pools::{pool_name, policy_backends, ResolvedBackends};
use super::builder::BuildContext;
use super::document::{
    PathRule, PathRuleProperties, RequestRoutingRule, RequestRoutingRuleProperties, RuleType,
    SubResource, UrlPathMap, UrlPathMapProperties,
};
use super::frontend::{ingress_listeners, ListenerPlan};
use super::http_settings::settings_name;
use super::identifier::{ChildKind, ListenerId};
use super::ingress_rules::{classify_backend, expand_path, is_default_path, rules, BackendRef};
use super::redirects::redirect_reference;
use super::rewrites::rewrite_reference;

/// Where a route sends matching requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteTarget {
    pub pool: Option<SubResource>,
    pub settings: Option<SubResource>,
    pub redirect: Option<SubResource>,
    pub rewrite: Option<SubResource>,
    pub load_distribution_policy: Option<SubResource>,
}

impl RouteTarget {
    fn redirect(redirect: SubResource) -> Self {
        Self {
            redirect: Some(redirect),
            ..Default::default()
        }
    }

    fn default_backend(ctx: &BuildContext<'_>) -> Self {
        Self {
            pool: Some(SubResource::new(ctx.namer.child_id(
                ChildKind::BackendAddressPools,
                &ctx.namer.default_backend_pool_name(),
            ))),
            settings: Some(SubResource::new(ctx.namer.child_id(
                ChildKind::BackendHttpSettingsCollection,
                &ctx.namer.default_http_settings_name(),
            ))),
            ..Default::default()
        }
    }
}

/// Target for `backend` as used by `ingress`, if it resolved.
#[must_use]
pub fn backend_target(
    ctx: &BuildContext<'_>,
    resolved: &ResolvedBackends,
    ingress: &Ingress,
    annotations: &IngressAnnotations,
    backend: &IngressBackend,
) -> Option<RouteTarget> {
    let pool_ref = |name: &str| {
        SubResource::new(ctx.namer.child_id(ChildKind::BackendAddressPools, name))
    };
    let settings_ref = |name: &str| {
        SubResource::new(
            ctx.namer
                .child_id(ChildKind::BackendHttpSettingsCollection, name),
        )
    };

    let mut target = match classify_backend(ingress, backend) {
        BackendRef::Service(id) => {
            let resolved = resolved.get(&id)?;
            RouteTarget {
                pool: Some(pool_ref(&pool_name(ctx.namer, &id, resolved.ports))),
                settings: Some(settings_ref(&settings_name(ctx.namer, &id, resolved.ports))),
                ..Default::default()
            }
        }
        BackendRef::ExternalPool { namespace, name } => {
            ctx.snapshot.backend_pool(&namespace, &name)?;
            RouteTarget {
                pool: Some(pool_ref(&ctx.namer.external_pool_name(&namespace, &name))),
                settings: Some(settings_ref(&ctx.namer.default_http_settings_name())),
                ..Default::default()
            }
        }
        BackendRef::LoadDistribution { namespace, name } => {
            let (first, backend) = policy_backends(ctx, ingress, &name)
                .into_iter()
                .find_map(|(id, _)| resolved.get(&id).map(|b| (id, b)))?;
            RouteTarget {
                settings: Some(settings_ref(&settings_name(ctx.namer, &first, backend.ports))),
                load_distribution_policy: Some(SubResource::new(ctx.namer.child_id(
                    ChildKind::LoadDistributionPolicies,
                    &ctx.namer.load_distribution_policy_name(&namespace, &name),
                ))),
                ..Default::default()
            }
        }
        BackendRef::Unsupported => return None,
    };
    target.rewrite = rewrite_reference(ctx, ingress, annotations);
    Some(target)
}

/// Routes collected for one listener.
#[derive(Debug, Default)]
struct ListenerRoutes {
    default: Option<RouteTarget>,
    paths: Vec<(String, String, RouteTarget)>,
}

impl ListenerRoutes {
    fn add_path(&mut self, rule_name: String, path: String, target: RouteTarget) {
        if !self.paths.iter().any(|(_, existing, _)| *existing == path) {
            self.paths.push((rule_name, path, target));
        }
    }
}

fn collect_routes(
    ctx: &BuildContext<'_>,
    plan: &ListenerPlan,
    resolved: &ResolvedBackends,
) -> BTreeMap<ListenerId, ListenerRoutes> {
    let mut routes: BTreeMap<ListenerId, ListenerRoutes> = BTreeMap::new();
    for ingress in ctx.ingresses {
        let annotations = IngressAnnotations::from_ingress(ingress);
        let namespace = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();
        let default_backend = ingress.spec.as_ref().and_then(|s| s.default_backend.as_ref());
        let ingress_default = default_backend
            .and_then(|b| backend_target(ctx, resolved, ingress, &annotations, b));

        for (rule_index, listener, config) in ingress_listeners(ctx, ingress, &annotations) {
            if plan.get(&listener) != Some(&config) {
                continue;
            }
            let entry = routes.entry(listener).or_default();
            let redirect = config
                .redirect_to
                .as_ref()
                .map(|target| RouteTarget::redirect(redirect_reference(ctx, target)));

            let paths = rule_index
                .and_then(|i| rules(ingress).get(i))
                .and_then(|r| r.http.as_ref())
                .map(|http| http.paths.as_slice())
                .unwrap_or_default();
            for (path_index, path) in paths.iter().enumerate() {
                let expanded = expand_path(path.path.as_deref(), &path.path_type);
                let target = match &redirect {
                    Some(redirect) => Some(redirect.clone()),
                    None => backend_target(ctx, resolved, ingress, &annotations, &path.backend),
                };
                let Some(target) = target else {
                    continue;
                };
                if is_default_path(&expanded) {
                    entry.default.get_or_insert(target);
                } else {
                    let rule_name = ctx.namer.path_rule_name(
                        &namespace,
                        &name,
                        rule_index.unwrap_or_default(),
                        path_index,
                    );
                    entry.add_path(rule_name, expanded, target);
                }
            }

            if let Some(target) = redirect.or_else(|| ingress_default.clone()) {
                entry.default.get_or_insert(target);
            }
        }
    }
    routes
}

fn priority_key(listener: &ListenerId, name: &str) -> (u8, Reverse<usize>, String) {
    let class = if !listener.has_host_names() {
        2
    } else if listener.has_wildcard() {
        1
    } else {
        0
    };
    (class, Reverse(listener.host_names.len()), name.to_string())
}

fn apply_target_to_rule(props: &mut RequestRoutingRuleProperties, target: RouteTarget) {
    props.backend_address_pool = target.pool;
    props.backend_http_settings = target.settings;
    props.redirect_configuration = target.redirect;
    props.rewrite_rule_set = target.rewrite;
    props.load_distribution_policy = target.load_distribution_policy;
}

/// Routing rules and URL path maps for every listener in `plan`.
#[must_use]
pub fn request_routing(
    ctx: &BuildContext<'_>,
    plan: &ListenerPlan,
    resolved: &ResolvedBackends,
) -> (Vec<RequestRoutingRule>, Vec<UrlPathMap>) {
    let mut routes = collect_routes(ctx, plan, resolved);
    let mut ordered = Vec::with_capacity(plan.len());
    let mut maps = Vec::new();

    for (listener, config) in plan {
        let collected = routes.remove(listener).unwrap_or_default();
        let default = collected.default.unwrap_or_else(|| match &config.redirect_to {
            Some(target) => RouteTarget::redirect(redirect_reference(ctx, target)),
            None => RouteTarget::default_backend(ctx),
        });

        let rule_name = ctx.namer.routing_rule_name(listener);
        let mut props = RequestRoutingRuleProperties {
            http_listener: Some(SubResource::new(ctx.namer.child_id(
                ChildKind::HttpListeners,
                &ctx.namer.listener_name(listener),
            ))),
            ..Default::default()
        };

        if collected.paths.is_empty() {
            props.rule_type = Some(RuleType::Basic);
            apply_target_to_rule(&mut props, default);
        } else {
            let map_name = ctx.namer.url_path_map_name(listener);
            let path_rules = collected
                .paths
                .into_iter()
                .map(|(name, path, target)| {
                    PathRule::new(
                        ctx.namer.path_rule_id(&map_name, &name),
                        name,
                        PathRuleProperties {
                            paths: vec![path],
                            backend_address_pool: target.pool,
                            backend_http_settings: target.settings,
                            redirect_configuration: target.redirect,
                            rewrite_rule_set: target.rewrite,
                            load_distribution_policy: target.load_distribution_policy,
                            ..Default::default()
                        },
                    )
                })
                .collect();
            let map_id = ctx.namer.child_id(ChildKind::UrlPathMaps, &map_name);
            maps.push(UrlPathMap::new(
                map_id.clone(),
                map_name,
                UrlPathMapProperties {
                    default_backend_address_pool: default.pool,
                    default_backend_http_settings: default.settings,
                    default_redirect_configuration: default.redirect,
                    default_rewrite_rule_set: default.rewrite,
                    default_load_distribution_policy: default.load_distribution_policy,
                    path_rules,
                    ..Default::default()
                },
            ));
            props.rule_type = Some(RuleType::PathBasedRouting);
            props.url_path_map = Some(SubResource::new(map_id));
        }

        ordered.push((
            priority_key(listener, &rule_name),
            RequestRoutingRule::new(
                ctx.namer.child_id(ChildKind::RequestRoutingRules, &rule_name),
                rule_name,
                props,
            ),
        ));
    }

    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    let mut priority = ROUTING_RULE_PRIORITY_BASE;
    let rules = ordered
        .into_iter()
        .map(|(_, mut rule)| {
            rule.properties.priority = Some(priority);
            priority += ROUTING_RULE_PRIORITY_STEP;
            rule
        })
        .collect();
    maps.sort_by(|a, b| a.name.cmp(&b.name));
    (rules, maps)
}

#[cfg(test)]
#[path = "routing_rules_tests.rs"]
mod routing_rules_tests;
