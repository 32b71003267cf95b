// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::annotations::{HOSTNAME_EXTENSION, OVERRIDE_FRONTEND_PORT, SSL_REDIRECT};
    use crate::appgw::document::ApplicationGateway;
    use crate::appgw::identifier::ResourceNamer;
    use crate::cache::ClusterSnapshot;
    use crate::test_fixtures::{
        gateway, hello_ingress, hello_snapshot, ingress, namer, path, rule, with_annotation,
        with_tls,
    };

    struct Fixture {
        snapshot: ClusterSnapshot,
        existing: ApplicationGateway,
        namer: ResourceNamer,
        ingresses: Vec<Ingress>,
    }

    impl Fixture {
        fn new(ingresses: Vec<Ingress>) -> Self {
            let mut snapshot = hello_snapshot();
            snapshot.insert_certificate("ns", "tls", vec![1, 2, 3]);
            Self {
                snapshot,
                existing: gateway(false),
                namer: namer(),
                ingresses,
            }
        }

        fn ctx(&self) -> BuildContext<'_> {
            BuildContext::new(
                &self.snapshot,
                &self.ingresses,
                &self.existing,
                &self.namer,
                false,
            )
        }
    }

    fn id(port: i32, hosts: &[&str]) -> ListenerId {
        ListenerId::new(port, hosts.iter().map(ToString::to_string).collect(), false)
    }

    // ========================================================================
    // Listener Planning
    // ========================================================================

    #[test]
    fn test_plain_rule_gets_http_listener() {
        let fx = Fixture::new(vec![hello_ingress()]);
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get(&id(80, &["hello.com"])), Some(&ListenerConfig::http()));
    }

    #[test]
    fn test_tls_rule_gets_https_listener_only() {
        let fx = Fixture::new(vec![with_tls(hello_ingress(), &["hello.com"], "tls")]);
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        assert_eq!(plan.len(), 1);
        let https = plan.get(&id(443, &["hello.com"])).unwrap();
        assert_eq!(https.protocol, Protocol::Https);
        assert_eq!(https.ssl_certificate.as_deref(), Some("cert-ns-tls"));
    }

    #[test]
    fn test_ssl_redirect_adds_redirecting_http_listener() {
        let ing = with_annotation(
            with_tls(hello_ingress(), &["hello.com"], "tls"),
            SSL_REDIRECT,
            "true",
        );
        let fx = Fixture::new(vec![ing]);
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan.get(&id(80, &["hello.com"])).unwrap().redirect_to,
            Some(id(443, &["hello.com"]))
        );
    }

    #[test]
    fn test_missing_certificate_falls_back_to_http() {
        let fx = Fixture::new(vec![with_tls(hello_ingress(), &["hello.com"], "absent")]);
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        assert_eq!(plan.keys().collect::<Vec<_>>(), vec![&id(80, &["hello.com"])]);
    }

    #[test]
    fn test_override_port_and_hostname_extension() {
        let ing = with_annotation(
            with_annotation(hello_ingress(), OVERRIDE_FRONTEND_PORT, "8080"),
            HOSTNAME_EXTENSION,
            "a.com, b.com",
        );
        let fx = Fixture::new(vec![ing]);
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        assert!(plan.contains_key(&id(8080, &["hello.com", "a.com", "b.com"])));
    }

    #[test]
    fn test_hostnames_are_capped() {
        let ing = with_annotation(
            hello_ingress(),
            HOSTNAME_EXTENSION,
            "a.com,b.com,c.com,d.com,e.com,f.com",
        );
        let fx = Fixture::new(vec![ing]);
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        let listener = plan.keys().next().unwrap();
        assert_eq!(listener.host_names.len(), 5);
        assert_eq!(listener.host_names[0], "hello.com");
    }

    #[test]
    fn test_conflicting_listener_first_ingress_wins() {
        let a = ingress("ns", "a", vec![rule("hello.com", vec![path("/a", "Prefix", "hello", 80)])]);
        let b = with_annotation(
            with_tls(
                ingress("ns", "b", vec![rule("hello.com", vec![path("/b", "Prefix", "hello", 80)])]),
                &["hello.com"],
                "tls",
            ),
            SSL_REDIRECT,
            "true",
        );
        let fx = Fixture::new(vec![a, b]);
        let mut notices = Vec::new();
        let plan = plan_listeners(&fx.ctx(), &mut notices);

        assert_eq!(plan.get(&id(80, &["hello.com"])), Some(&ListenerConfig::http()));
        assert!(plan.contains_key(&id(443, &["hello.com"])));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].reason, "ListenerConflict");
        assert_eq!(notices[0].ingress_key(), "ns/b");
    }

    #[test]
    fn test_no_ingress_yields_catch_all_listener() {
        let fx = Fixture::new(Vec::new());
        let plan = plan_listeners(&fx.ctx(), &mut Vec::new());
        assert_eq!(plan.keys().collect::<Vec<_>>(), vec![&id(80, &[])]);
    }

    // ========================================================================
    // Ports and Listeners
    // ========================================================================

    #[test]
    fn test_existing_frontend_port_is_reused() {
        let mut fx = Fixture::new(vec![hello_ingress()]);
        fx.existing.properties.frontend_ports.push(FrontendPort::new(
            "legacy-id",
            "legacy-port-80",
            FrontendPortProperties {
                port: Some(80),
                ..Default::default()
            },
        ));
        let ctx = fx.ctx();
        let plan = plan_listeners(&ctx, &mut Vec::new());
        let ports = frontend_ports(&ctx, &plan);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "legacy-port-80");

        let listeners = http_listeners(&ctx, &plan, &ports).unwrap();
        assert_eq!(
            listeners[0].properties.frontend_port.as_ref().map(|p| p.id.as_str()),
            Some("legacy-id")
        );
    }

    #[test]
    fn test_listener_properties() {
        let fx = Fixture::new(vec![with_tls(hello_ingress(), &["hello.com"], "tls")]);
        let ctx = fx.ctx();
        let plan = plan_listeners(&ctx, &mut Vec::new());
        let ports = frontend_ports(&ctx, &plan);
        assert_eq!(ports[0].name, "fp-443");

        let listeners = http_listeners(&ctx, &plan, &ports).unwrap();
        let listener = &listeners[0];
        assert_eq!(listener.name, fx.namer.listener_name(&id(443, &["hello.com"])));
        assert_eq!(listener.properties.host_name.as_deref(), Some("hello.com"));
        assert!(listener.properties.host_names.is_empty());
        assert!(listener
            .properties
            .ssl_certificate
            .as_ref()
            .is_some_and(|c| c.name() == "cert-ns-tls"));
        assert!(listener
            .properties
            .frontend_ip_configuration
            .as_ref()
            .is_some_and(|f| f.name() == "appGatewayFrontendIP"));
    }

    #[test]
    fn test_missing_public_frontend_is_fatal() {
        let mut fx = Fixture::new(vec![hello_ingress()]);
        fx.existing.properties.frontend_ip_configurations.clear();
        let ctx = fx.ctx();
        let plan = plan_listeners(&ctx, &mut Vec::new());
        let ports = frontend_ports(&ctx, &plan);
        let err = http_listeners(&ctx, &plan, &ports).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoPublicIP);
    }
}
