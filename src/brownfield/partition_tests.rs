// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::appgw::document::SubResource;
    use crate::brownfield::targets::Target;
    use crate::test_fixtures::{brownfield_gateway, legacy_policy, GATEWAY_ID};
    use serde_json::json;

    fn names<P>(children: &[GatewayChild<P>]) -> Vec<&str> {
        children.iter().map(|c| c.name.as_str()).collect()
    }

    // ========================================================================
    // Listener Classification
    // ========================================================================

    #[test]
    fn test_listener_on_prohibited_host_is_unmanaged() {
        let gw = brownfield_gateway();
        let policy = legacy_policy();
        let listeners = &gw.properties.http_listeners;
        assert!(is_listener_unmanaged(&gw, &listeners[0], &policy));
        assert!(!is_listener_unmanaged(&gw, &listeners[1], &policy));
    }

    #[test]
    fn test_port_scoped_prohibition_checks_frontend_port() {
        let gw = brownfield_gateway();
        let policy = TargetPolicy::new(
            vec![Target::new(Some("legacy.example.com"), Some(443), None)],
            Vec::new(),
        );
        assert!(!is_listener_unmanaged(&gw, &gw.properties.http_listeners[0], &policy));
    }

    // ========================================================================
    // Partition Walk
    // ========================================================================

    #[test]
    fn test_partition_follows_rule_references() {
        let unmanaged = partition(&brownfield_gateway(), &legacy_policy());

        assert_eq!(names(&unmanaged.http_listeners), vec!["legacy-80"]);
        assert_eq!(names(&unmanaged.request_routing_rules), vec!["legacy-rule"]);
        assert_eq!(names(&unmanaged.backend_address_pools), vec!["legacy-pool"]);
        assert_eq!(
            names(&unmanaged.backend_http_settings_collection),
            vec!["legacy-settings"]
        );
        assert_eq!(names(&unmanaged.probes), vec!["legacy-probe"]);
        assert_eq!(names(&unmanaged.frontend_ports), vec!["legacy-port-80"]);
        assert!(unmanaged.url_path_maps.is_empty());
    }

    #[test]
    fn test_partition_keeps_children_verbatim() {
        let gw = brownfield_gateway();
        let unmanaged = partition(&gw, &legacy_policy());
        assert_eq!(unmanaged.http_listeners[0], gw.properties.http_listeners[0]);
        assert_eq!(
            unmanaged.http_listeners[0].etag.as_deref(),
            Some("W/\"1\"")
        );
    }

    #[test]
    fn test_empty_policy_yields_nothing() {
        let unmanaged = partition(&brownfield_gateway(), &TargetPolicy::default());
        assert!(unmanaged.is_empty());
        assert_eq!(unmanaged, UnmanagedResources::default());
    }

    #[test]
    fn test_redirect_target_listener_is_pulled_in() {
        let mut gw = brownfield_gateway();
        let redirect: crate::appgw::document::RedirectConfiguration =
            serde_json::from_value(json!({
                "name": "legacy-redirect",
                "id": format!("{GATEWAY_ID}/redirectConfigurations/legacy-redirect"),
                "properties": {
                    "redirectType": "Permanent",
                    "targetListener": {"id": format!("{GATEWAY_ID}/httpListeners/old-listener")}
                }
            }))
            .unwrap();
        gw.properties.redirect_configurations.push(redirect);
        gw.properties.request_routing_rules[0]
            .properties
            .redirect_configuration = Some(SubResource::new(format!(
            "{GATEWAY_ID}/redirectConfigurations/legacy-redirect"
        )));

        let unmanaged = partition(&gw, &legacy_policy());
        assert_eq!(
            names(&unmanaged.http_listeners),
            vec!["legacy-80", "old-listener"]
        );
        assert_eq!(
            names(&unmanaged.request_routing_rules),
            vec!["legacy-rule", "old-rule"]
        );
        assert_eq!(names(&unmanaged.redirect_configurations), vec!["legacy-redirect"]);
    }

    #[test]
    fn test_allowed_target_marks_other_hosts_unmanaged() {
        let policy = TargetPolicy::new(
            Vec::new(),
            vec![Target::new(Some("old.example.com"), None, None)],
        );
        let unmanaged = partition(&brownfield_gateway(), &policy);
        assert_eq!(names(&unmanaged.http_listeners), vec!["legacy-80"]);
        assert_eq!(
            unmanaged.listener_names(),
            ["legacy-80".to_string()].into_iter().collect()
        );
    }
}
