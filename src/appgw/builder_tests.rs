// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::annotations::{APPGW_TRUSTED_ROOT_CERTIFICATE, SSL_REDIRECT, USE_PRIVATE_IP};
    use crate::appgw::document::{Protocol, RuleType, SubResource, TrustedRootCertificate};
    use crate::brownfield::partition::partition;
    use crate::controller_errors::ErrorCode;
    use crate::event_reasons::REASON_INGRESS_SERVICE_TARGET_MATCH;
    use crate::test_fixtures::{
        brownfield_gateway, gateway, hello_ingress, hello_snapshot, ingress, legacy_policy, namer,
        path, rule, with_annotation, with_tls,
    };

    fn build(
        snapshot: &ClusterSnapshot,
        existing: &ApplicationGateway,
        ingresses: &[Ingress],
    ) -> Result<BuildOutput, ControllerError> {
        let namer = namer();
        ConfigBuilder::new(snapshot, existing, &namer, false).build(ingresses)
    }

    // ========================================================================
    // Context
    // ========================================================================

    #[test]
    fn test_context_finds_ingress_by_namespace_and_name() {
        let snapshot = ClusterSnapshot::default();
        let existing = gateway(false);
        let namer = namer();
        let ingresses = vec![hello_ingress()];
        let ctx = BuildContext::new(&snapshot, &ingresses, &existing, &namer, false);
        assert!(ctx.ingress("ns", "hello").is_some());
        assert!(ctx.ingress("other", "hello").is_none());
    }

    // ========================================================================
    // Full builds
    // ========================================================================

    #[test]
    fn test_empty_cluster_builds_catch_all() {
        let existing = gateway(false);
        let out = build(&ClusterSnapshot::default(), &existing, &[]).unwrap();
        let p = &out.gateway.properties;
        assert_eq!(p.http_listeners.len(), 1);
        assert_eq!(p.frontend_ports.len(), 1);
        assert_eq!(p.request_routing_rules.len(), 1);
        assert_eq!(p.backend_address_pools.len(), 1);
        assert_eq!(p.backend_address_pools[0].name, "defaultaddresspool");
        assert_eq!(p.backend_http_settings_collection[0].name, "defaulthttpsetting");
        assert_eq!(
            p.probes.iter().map(|x| x.name.as_str()).collect::<Vec<_>>(),
            vec!["defaultprobe-Http", "defaultprobe-Https"]
        );
        assert!(out.notices.is_empty());
    }

    #[test]
    fn test_hello_world_document() {
        let existing = gateway(false);
        let out = build(&hello_snapshot(), &existing, &[hello_ingress()]).unwrap();
        let p = &out.gateway.properties;

        assert_eq!(p.http_listeners.len(), 1);
        assert_eq!(p.http_listeners[0].properties.host_name.as_deref(), Some("hello.com"));
        assert_eq!(p.http_listeners[0].properties.protocol, Some(Protocol::Http));

        let pool = p
            .backend_address_pools
            .iter()
            .find(|pool| pool.name == "pool-ns-hello-80-bp-8080")
            .expect("service pool");
        let ips: Vec<&str> = pool
            .properties
            .backend_addresses
            .iter()
            .filter_map(|a| a.ip_address.as_deref())
            .collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);

        assert_eq!(p.request_routing_rules[0].properties.rule_type, Some(RuleType::PathBasedRouting));
        assert_eq!(p.url_path_maps.len(), 1);
        assert_eq!(
            out.gateway.tags.as_ref().and_then(|t| t.get(MANAGED_BY_TAG)).map(String::as_str),
            Some(MANAGED_BY_TAG_VALUE)
        );
    }

    #[test]
    fn test_build_is_deterministic_and_order_independent() {
        let existing = gateway(false);
        let a = ingress("ns", "a", vec![rule("a.com", vec![path("/a", "Prefix", "hello", 80)])]);
        let b = ingress("ns", "b", vec![rule("b.com", vec![path("/b", "Prefix", "hello", 80)])]);
        let first = build(&hello_snapshot(), &existing, &[a.clone(), b.clone()]).unwrap();
        let second = build(&hello_snapshot(), &existing, &[b, a]).unwrap();
        assert_eq!(
            serde_json::to_string(&first.gateway).unwrap(),
            serde_json::to_string(&second.gateway).unwrap()
        );
    }

    #[test]
    fn test_unmodelled_properties_survive() {
        let mut existing = gateway(false);
        existing.properties.trusted_root_certificates = vec![TrustedRootCertificate::new(
            format!("{}/trustedRootCertificates/root-a", crate::test_fixtures::GATEWAY_ID),
            "root-a",
            Default::default(),
        )];
        let out = build(&hello_snapshot(), &existing, &[hello_ingress()]).unwrap();
        assert_eq!(out.gateway.properties.trusted_root_certificates.len(), 1);
        assert_eq!(out.gateway.properties.frontend_ip_configurations.len(), 1);
        assert!(out.gateway.properties.extra.contains_key("sku"));
    }

    #[test]
    fn test_tls_with_redirect() {
        let mut snapshot = hello_snapshot();
        snapshot.insert_certificate("ns", "tls", vec![7, 7, 7]);
        let ing = with_annotation(
            with_tls(hello_ingress(), &["hello.com"], "tls"),
            SSL_REDIRECT,
            "true",
        );
        let out = build(&snapshot, &gateway(false), &[ing]).unwrap();
        let p = &out.gateway.properties;
        assert_eq!(p.http_listeners.len(), 2);
        assert_eq!(p.frontend_ports.len(), 2);
        assert_eq!(p.ssl_certificates.len(), 1);
        assert_eq!(p.ssl_certificates[0].name, "cert-ns-tls");
        assert_eq!(p.redirect_configurations.len(), 1);

        let https = p
            .http_listeners
            .iter()
            .find(|l| l.properties.protocol == Some(Protocol::Https))
            .expect("https listener");
        assert_eq!(
            https.properties.ssl_certificate.as_ref().map(SubResource::name),
            Some("cert-ns-tls")
        );
    }

    #[test]
    fn test_missing_service_only_warns() {
        let ing = ingress("ns", "ghost", vec![rule("ghost.com", vec![path("/g", "Prefix", "absent", 80)])]);
        let out = build(&ClusterSnapshot::default(), &gateway(false), &[ing]).unwrap();
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].reason, REASON_INGRESS_SERVICE_TARGET_MATCH);
    }

    #[test]
    fn test_private_ip_without_private_frontend_fails() {
        let ing = with_annotation(hello_ingress(), USE_PRIVATE_IP, "true");
        let err = build(&hello_snapshot(), &gateway(false), &[ing]).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoPrivateIP);
    }

    #[test]
    fn test_controller_wide_private_ip() {
        let existing = gateway(true);
        let namer = namer();
        let out = ConfigBuilder::new(&hello_snapshot(), &existing, &namer, true)
            .build(&[hello_ingress()])
            .unwrap();
        assert_eq!(
            out.gateway.properties.http_listeners[0]
                .properties
                .frontend_ip_configuration
                .as_ref()
                .map(SubResource::name),
            Some("appGatewayPrivateFrontendIP")
        );
    }

    #[test]
    fn test_trusted_root_reference_is_kept_on_https_settings() {
        let ing = with_annotation(
            with_annotation(hello_ingress(), APPGW_TRUSTED_ROOT_CERTIFICATE, "root-a"),
            crate::annotations::BACKEND_PROTOCOL,
            "https",
        );
        let out = build(&hello_snapshot(), &gateway(false), &[ing]).unwrap();
        let settings = out
            .gateway
            .properties
            .backend_http_settings_collection
            .iter()
            .find(|s| s.properties.protocol == Some(Protocol::Https))
            .expect("https settings");
        assert_eq!(settings.properties.trusted_root_certificates.len(), 1);
    }

    // ========================================================================
    // Brownfield
    // ========================================================================

    #[test]
    fn test_brownfield_keeps_unmanaged_and_drops_stale() {
        let existing = brownfield_gateway();
        let unmanaged = partition(&existing, &legacy_policy());
        let namer = namer();
        let out = ConfigBuilder::new(&hello_snapshot(), &existing, &namer, false)
            .with_unmanaged(&unmanaged)
            .build(&[hello_ingress()])
            .unwrap();
        let p = &out.gateway.properties;

        let listeners: Vec<&str> = p.http_listeners.iter().map(|l| l.name.as_str()).collect();
        assert!(listeners.contains(&"legacy-80"));
        assert!(!listeners.contains(&"old-listener"));
        assert!(p.backend_address_pools.iter().any(|b| b.name == "legacy-pool"));
        assert!(!p.backend_address_pools.iter().any(|b| b.name == "old-pool"));

        let legacy = p
            .request_routing_rules
            .iter()
            .find(|r| r.name == "legacy-rule")
            .expect("legacy rule");
        assert_eq!(legacy.properties.priority, Some(19000));
        let generated = p
            .request_routing_rules
            .iter()
            .find(|r| r.name != "legacy-rule")
            .expect("generated rule");
        assert_eq!(generated.properties.priority, Some(19001));
    }
}
