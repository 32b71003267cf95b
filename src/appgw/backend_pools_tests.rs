// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::appgw::document::ApplicationGateway;
    use crate::crd::{
        AzureApplicationGatewayBackendPool, AzureApplicationGatewayBackendPoolSpec,
        AzureApplicationGatewayLoadDistributionPolicy,
        AzureApplicationGatewayLoadDistributionPolicySpec, BackendAddressPoolSpec,
        BackendAddressSpec, PolicyBackend, ServiceBackendRef, ServicePortRef,
    };
    use crate::test_fixtures::{
        endpoints, gateway, hello_ingress, hello_snapshot, ingress, namer, path, rule, service,
    };
    use k8s_openapi::api::core::v1::{EndpointPort, TypedLocalObjectReference};
    use k8s_openapi::api::networking::v1::IngressBackend;

    fn id(service: &str, port: ServicePortKey) -> BackendId {
        BackendId {
            namespace: "ns".to_string(),
            ingress: "hello".to_string(),
            service: service.to_string(),
            port,
        }
    }

    fn resource_backend(kind: &str, name: &str) -> IngressBackend {
        IngressBackend {
            service: None,
            resource: Some(TypedLocalObjectReference {
                api_group: Some("appgw.ingress.k8s.io".to_string()),
                kind: kind.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn ctx<'a>(
        snapshot: &'a ClusterSnapshot,
        ingresses: &'a [Ingress],
        existing: &'a ApplicationGateway,
        namer: &'a ResourceNamer,
    ) -> BuildContext<'a> {
        BuildContext::new(snapshot, ingresses, existing, namer, false)
    }

    // ========================================================================
    // Port Resolution
    // ========================================================================

    #[test]
    fn test_integer_target_port() {
        let snapshot = hello_snapshot();
        let pairs = resolve_service_ports(&snapshot, &id("hello", ServicePortKey::Number(80)));
        assert_eq!(pairs, [ServicePortPair::new(80, 8080)].into_iter().collect());
    }

    #[test]
    fn test_port_by_name() {
        let snapshot = hello_snapshot();
        let pairs = resolve_service_ports(
            &snapshot,
            &id("hello", ServicePortKey::Name("http".to_string())),
        );
        assert_eq!(pairs, [ServicePortPair::new(80, 8080)].into_iter().collect());
    }

    #[test]
    fn test_missing_target_port_reuses_service_port() {
        let mut snapshot = ClusterSnapshot::default();
        let mut svc = service("ns", "plain", 9000, 0);
        svc.spec.as_mut().unwrap().ports.as_mut().unwrap()[0].target_port = None;
        snapshot.insert_service(svc);
        let pairs = resolve_service_ports(&snapshot, &id("plain", ServicePortKey::Number(9000)));
        assert_eq!(pairs, [ServicePortPair::new(9000, 9000)].into_iter().collect());
    }

    #[test]
    fn test_named_target_port_resolves_through_endpoints() {
        let mut snapshot = ClusterSnapshot::default();
        let mut svc = service("ns", "named", 80, 0);
        svc.spec.as_mut().unwrap().ports.as_mut().unwrap()[0].target_port =
            Some(IntOrString::String("web".to_string()));
        snapshot.insert_service(svc);
        snapshot.insert_endpoints(endpoints("ns", "named", &["10.0.0.9"], 8443));

        let pairs = resolve_service_ports(&snapshot, &id("named", ServicePortKey::Number(80)));
        assert_eq!(pairs, [ServicePortPair::new(80, 8443)].into_iter().collect());

        let by_target = resolve_service_ports(
            &snapshot,
            &id("named", ServicePortKey::Name("web".to_string())),
        );
        assert_eq!(by_target, pairs);
    }

    #[test]
    fn test_udp_ports_are_ignored() {
        let mut snapshot = ClusterSnapshot::default();
        let mut svc = service("ns", "dns", 53, 53);
        svc.spec.as_mut().unwrap().ports.as_mut().unwrap()[0].protocol = Some("UDP".to_string());
        snapshot.insert_service(svc);
        assert!(resolve_service_ports(&snapshot, &id("dns", ServicePortKey::Number(53))).is_empty());
    }

    #[test]
    fn test_missing_service_keeps_numeric_port() {
        let snapshot = ClusterSnapshot::default();
        assert_eq!(
            resolve_service_ports(&snapshot, &id("ghost", ServicePortKey::Number(81))),
            [ServicePortPair::new(81, 81)].into_iter().collect()
        );
        assert!(resolve_service_ports(
            &snapshot,
            &id("ghost", ServicePortKey::Name("http".to_string()))
        )
        .is_empty());
    }

    #[test]
    fn test_unresolvable_and_ambiguous_backends_are_reported() {
        let mut snapshot = hello_snapshot();
        let mut multi = service("ns", "multi", 80, 8080);
        let ports = multi.spec.as_mut().unwrap().ports.as_mut().unwrap();
        ports[0].target_port = Some(IntOrString::String("web".to_string()));
        snapshot.insert_service(multi);
        let mut eps = endpoints("ns", "multi", &["10.0.0.3"], 8080);
        eps.subsets.as_mut().unwrap()[0]
            .ports
            .as_mut()
            .unwrap()
            .push(EndpointPort {
                name: Some("http".to_string()),
                port: 8081,
                ..Default::default()
            });
        snapshot.insert_endpoints(eps);

        let ing = ingress(
            "ns",
            "hello",
            vec![rule(
                "hello.com",
                vec![
                    path("/ok", "Prefix", "hello", 80),
                    path("/bad", "Prefix", "hello", 99),
                    path("/multi", "Prefix", "multi", 80),
                ],
            )],
        );
        let ingresses = vec![ing];
        let existing = gateway(false);
        let namer = namer();
        let ctx = ctx(&snapshot, &ingresses, &existing, &namer);

        let mut notices = Vec::new();
        let resolved = resolve_backends(&ctx, &mut notices);
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key(&id("hello", ServicePortKey::Number(80))));
        let reasons: Vec<&str> = notices.iter().map(|n| n.reason).collect();
        assert_eq!(
            reasons,
            vec!["PortResolutionError", "MultipleServiceBackendPortBinding"]
        );
    }

    // ========================================================================
    // Pools
    // ========================================================================

    #[test]
    fn test_pools_sorted_and_deduplicated() {
        let snapshot = hello_snapshot();
        let ingresses = vec![hello_ingress()];
        let existing = gateway(false);
        let namer = namer();
        let ctx = ctx(&snapshot, &ingresses, &existing, &namer);

        let mut notices = Vec::new();
        let resolved = resolve_backends(&ctx, &mut notices);
        let pools = backend_address_pools(&ctx, &resolved, &mut notices);

        let names: Vec<&str> = pools.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["defaultaddresspool", "pool-ns-hello-80-bp-8080"]);
        let ips: Vec<&str> = pools[1]
            .properties
            .backend_addresses
            .iter()
            .filter_map(|a| a.ip_address.as_deref())
            .collect();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2"]);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_empty_endpoints_are_reported() {
        let mut snapshot = ClusterSnapshot::default();
        snapshot.insert_service(service("ns", "hello", 80, 8080));
        let ingresses = vec![hello_ingress()];
        let existing = gateway(false);
        let namer = namer();
        let ctx = ctx(&snapshot, &ingresses, &existing, &namer);

        let mut notices = Vec::new();
        let resolved = resolve_backends(&ctx, &mut notices);
        let pools = backend_address_pools(&ctx, &resolved, &mut notices);
        assert!(pools[1].properties.backend_addresses.is_empty());
        assert_eq!(notices[0].reason, "EndpointsEmpty");
    }

    #[test]
    fn test_external_pool_unions_addresses() {
        let mut snapshot = hello_snapshot();
        let mut resource = AzureApplicationGatewayBackendPool::new(
            "ext",
            AzureApplicationGatewayBackendPoolSpec {
                backend_address_pools: vec![
                    BackendAddressPoolSpec {
                        name: "a".to_string(),
                        backend_addresses: vec![
                            BackendAddressSpec {
                                ip_address: Some("192.168.1.2".to_string()),
                                fqdn: None,
                            },
                            BackendAddressSpec {
                                ip_address: None,
                                fqdn: Some("api.example.com".to_string()),
                            },
                        ],
                    },
                    BackendAddressPoolSpec {
                        name: "b".to_string(),
                        backend_addresses: vec![BackendAddressSpec {
                            ip_address: Some("192.168.1.2".to_string()),
                            fqdn: None,
                        }],
                    },
                ],
            },
        );
        resource.metadata.namespace = Some("ns".to_string());
        snapshot.insert_backend_pool(resource);

        let mut ing = hello_ingress();
        ing.spec.as_mut().unwrap().default_backend =
            Some(resource_backend("AzureApplicationGatewayBackendPool", "ext"));
        let ingresses = vec![ing];
        let existing = gateway(false);
        let namer = namer();
        let ctx = ctx(&snapshot, &ingresses, &existing, &namer);

        let mut notices = Vec::new();
        let resolved = resolve_backends(&ctx, &mut notices);
        let pools = backend_address_pools(&ctx, &resolved, &mut notices);
        let external = pools.iter().find(|p| p.name == "pool-ns-ext-external").unwrap();
        assert_eq!(external.properties.backend_addresses.len(), 2);
    }

    // ========================================================================
    // Load Distribution Policies
    // ========================================================================

    #[test]
    fn test_policy_targets_reference_resolved_pools() {
        let mut snapshot = hello_snapshot();
        snapshot.insert_service(service("ns", "canary", 80, 9090));
        snapshot.insert_endpoints(endpoints("ns", "canary", &["10.0.1.1"], 9090));
        let target = |svc: &str, weight: i32| crate::crd::LoadDistributionTarget {
            role: None,
            weight,
            backend: PolicyBackend {
                service: Some(ServiceBackendRef {
                    name: svc.to_string(),
                    port: ServicePortRef {
                        number: Some(80),
                        name: None,
                    },
                }),
            },
        };
        let mut policy = AzureApplicationGatewayLoadDistributionPolicy::new(
            "split",
            AzureApplicationGatewayLoadDistributionPolicySpec {
                targets: vec![target("hello", 90), target("canary", 10), target("ghost", 0)],
            },
        );
        policy.metadata.namespace = Some("ns".to_string());
        snapshot.insert_load_distribution_policy(policy);

        let mut ing = ingress("ns", "hello", Vec::new());
        ing.spec.as_mut().unwrap().default_backend = Some(resource_backend(
            "AzureApplicationGatewayLoadDistributionPolicy",
            "split",
        ));
        let ingresses = vec![ing];
        let existing = gateway(false);
        let namer = namer();
        let ctx = ctx(&snapshot, &ingresses, &existing, &namer);

        let mut notices = Vec::new();
        let resolved = resolve_backends(&ctx, &mut notices);
        assert_eq!(resolved.len(), 3);

        let policies = load_distribution_policies(&ctx, &resolved);
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].name, "ldp-ns-split");
        let targets = &policies[0].properties.load_distribution_targets;
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].properties.weight_per_server, Some(90));
        assert_eq!(
            targets[1]
                .properties
                .backend_address_pool
                .as_ref()
                .map(SubResource::name),
            Some("pool-ns-canary-80-bp-9090")
        );
    }
}
