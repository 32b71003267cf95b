// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rewrite rule sets.
//!
//! Sets materialized from `AzureApplicationGatewayRewrite` resources are named
//! `crd-{namespace}-{name}` and regenerated on every build. All other sets on the gateway
//! belong to the operator and are carried over verbatim.

use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::BTreeMap;

use crate::annotations::IngressAnnotations;
use crate::constants::REWRITE_CRD_PREFIX;
use crate::crd::{self, AzureApplicationGatewayRewrite};

use super::builder::BuildContext;
use super::document::{
    HeaderConfiguration, RewriteActionSet, RewriteRule, RewriteRuleCondition, RewriteRuleSet,
    RewriteRuleSetProperties, SubResource, UrlConfiguration,
};
use super::identifier::{ChildKind, ResourceNamer};

const ACTION_DELETE: &str = "delete";

/// Rewrite set an Ingress attaches to its routes, if any.
///
/// The custom resource annotation wins over a plain rule set name, and only applies when
/// the resource exists.
#[must_use]
pub fn rewrite_reference(
    ctx: &BuildContext<'_>,
    ingress: &Ingress,
    annotations: &IngressAnnotations,
) -> Option<SubResource> {
    let namespace = ingress.namespace().unwrap_or_default();
    let name = match annotations.rewrite_rule_set_custom_resource.as_deref() {
        Some(resource) if ctx.snapshot.rewrite(&namespace, resource).is_some() => {
            ResourceNamer::rewrite_crd_name(&namespace, resource)
        }
        _ => annotations.rewrite_rule_set.clone()?,
    };
    Some(SubResource::new(
        ctx.namer.child_id(ChildKind::RewriteRuleSets, &name),
    ))
}

fn header(config: &crd::HeaderConfiguration) -> HeaderConfiguration {
    let delete = config.action_type.eq_ignore_ascii_case(ACTION_DELETE);
    HeaderConfiguration {
        header_name: config.header_name.clone(),
        header_value: if delete {
            String::new()
        } else {
            config.header_value.clone()
        },
    }
}

fn rule_set_properties(rewrite: &AzureApplicationGatewayRewrite) -> RewriteRuleSetProperties {
    let rewrite_rules = rewrite
        .spec
        .rewrite_rules
        .iter()
        .map(|rule| RewriteRule {
            name: rule.name.clone(),
            rule_sequence: rule.rule_sequence,
            conditions: rule
                .conditions
                .iter()
                .map(|c| RewriteRuleCondition {
                    variable: c.variable.clone(),
                    pattern: c.pattern.clone(),
                    ignore_case: c.ignore_case,
                    negate: c.negate,
                })
                .collect(),
            action_set: RewriteActionSet {
                request_header_configurations: rule
                    .actions
                    .request_header_configurations
                    .iter()
                    .map(header)
                    .collect(),
                response_header_configurations: rule
                    .actions
                    .response_header_configurations
                    .iter()
                    .map(header)
                    .collect(),
                url_configuration: rule.actions.url_configuration.as_ref().map(|url| {
                    UrlConfiguration {
                        modified_path: Some(url.modified_path.clone())
                            .filter(|p| !p.is_empty()),
                        modified_query_string: Some(url.modified_query_string.clone())
                            .filter(|q| !q.is_empty()),
                        reroute: url.reroute,
                    }
                }),
            },
        })
        .collect();
    RewriteRuleSetProperties {
        rewrite_rules,
        ..Default::default()
    }
}

/// Rewrite rule sets for the new document, sorted by name.
#[must_use]
pub fn rewrite_rule_sets(ctx: &BuildContext<'_>) -> Vec<RewriteRuleSet> {
    let mut sets: BTreeMap<String, RewriteRuleSet> = ctx
        .existing
        .properties
        .rewrite_rule_sets
        .iter()
        .filter(|set| !set.name.starts_with(REWRITE_CRD_PREFIX))
        .map(|set| (set.name.clone(), set.clone()))
        .collect();

    for ingress in ctx.ingresses {
        let annotations = IngressAnnotations::from_ingress(ingress);
        let Some(resource) = annotations.rewrite_rule_set_custom_resource.as_deref() else {
            continue;
        };
        let namespace = ingress.namespace().unwrap_or_default();
        let Some(rewrite) = ctx.snapshot.rewrite(&namespace, resource) else {
            continue;
        };
        let name = ResourceNamer::rewrite_crd_name(&namespace, resource);
        sets.entry(name.clone()).or_insert_with(|| {
            RewriteRuleSet::new(
                ctx.namer.child_id(ChildKind::RewriteRuleSets, &name),
                name,
                rule_set_properties(rewrite),
            )
        });
    }
    sets.into_values().collect()
}
