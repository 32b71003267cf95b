// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP → HTTPS redirect configurations.

use std::collections::BTreeMap;

use super::builder::BuildContext;
use super::document::{RedirectConfiguration, RedirectConfigurationProperties, SubResource};
use super::frontend::ListenerPlan;
use super::identifier::{ChildKind, ListenerId};

const REDIRECT_TYPE_PERMANENT: &str = "Permanent";

/// Reference to the redirect forwarding to `target`.
#[must_use]
pub fn redirect_reference(ctx: &BuildContext<'_>, target: &ListenerId) -> SubResource {
    SubResource::new(ctx.namer.child_id(
        ChildKind::RedirectConfigurations,
        &ctx.namer.ssl_redirect_name(target),
    ))
}

/// One permanent redirect per HTTPS listener some HTTP listener redirects to.
///
/// Back-pointers to rules and path maps are left empty; the gateway fills them in.
#[must_use]
pub fn redirect_configurations(
    ctx: &BuildContext<'_>,
    plan: &ListenerPlan,
) -> Vec<RedirectConfiguration> {
    let mut redirects = BTreeMap::new();
    for target in plan.values().filter_map(|config| config.redirect_to.as_ref()) {
        let name = ctx.namer.ssl_redirect_name(target);
        redirects.entry(name.clone()).or_insert_with(|| {
            RedirectConfiguration::new(
                ctx.namer.child_id(ChildKind::RedirectConfigurations, &name),
                name,
                RedirectConfigurationProperties {
                    redirect_type: Some(REDIRECT_TYPE_PERMANENT.to_string()),
                    target_listener: Some(SubResource::new(ctx.namer.child_id(
                        ChildKind::HttpListeners,
                        &ctx.namer.listener_name(target),
                    ))),
                    include_path: Some(true),
                    include_query_string: Some(true),
                    ..Default::default()
                },
            )
        });
    }
    redirects.into_values().collect()
}
