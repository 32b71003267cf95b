// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_fixtures::{hello_ingress, ingress, path, rule, service_backend, with_tls};
    use k8s_openapi::api::core::v1::TypedLocalObjectReference;
    use k8s_openapi::api::networking::v1::{IngressServiceBackend, ServiceBackendPort};

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

    // ========================================================================
    // Paths
    // ========================================================================

    #[test]
    fn test_expand_path_by_type() {
        assert_eq!(expand_path(Some("/hi"), "Prefix"), "/hi*");
        assert_eq!(expand_path(Some("/api/"), "Prefix"), "/api/*");
        assert_eq!(expand_path(Some("/x*"), "Prefix"), "/x*");
        assert_eq!(expand_path(Some("/hi"), "Exact"), "/hi");
        assert_eq!(expand_path(Some("/hi"), "ImplementationSpecific"), "/hi");
        assert_eq!(expand_path(None, "Prefix"), "");
    }

    #[test]
    fn test_default_paths() {
        assert!(is_default_path(""));
        assert!(is_default_path("/"));
        assert!(is_default_path(&expand_path(Some("/"), "Prefix")));
        assert!(!is_default_path("/hi*"));
    }

    // ========================================================================
    // Backends
    // ========================================================================

    #[test]
    fn test_classify_service_backend_by_number_and_name() {
        let ing = hello_ingress();
        let by_number = classify_backend(&ing, &service_backend("hello", 80));
        assert_eq!(
            by_number,
            BackendRef::Service(BackendId {
                namespace: "ns".to_string(),
                ingress: "hello".to_string(),
                service: "hello".to_string(),
                port: ServicePortKey::Number(80),
            })
        );

        let named = IngressBackend {
            service: Some(IngressServiceBackend {
                name: "hello".to_string(),
                port: Some(ServiceBackendPort {
                    name: Some("http".to_string()),
                    number: None,
                }),
            }),
            resource: None,
        };
        match classify_backend(&ing, &named) {
            BackendRef::Service(id) => assert_eq!(id.port.to_string(), "http"),
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_classify_resource_backends() {
        let ing = hello_ingress();
        assert_eq!(
            classify_backend(&ing, &resource_backend("AzureApplicationGatewayBackendPool", "ext")),
            BackendRef::ExternalPool {
                namespace: "ns".to_string(),
                name: "ext".to_string()
            }
        );
        assert_eq!(
            classify_backend(
                &ing,
                &resource_backend("AzureApplicationGatewayLoadDistributionPolicy", "ldp")
            ),
            BackendRef::LoadDistribution {
                namespace: "ns".to_string(),
                name: "ldp".to_string()
            }
        );
        assert_eq!(
            classify_backend(&ing, &resource_backend("ConfigMap", "x")),
            BackendRef::Unsupported
        );
    }

    #[test]
    fn test_service_backends_keep_first_probe_hint() {
        let ing = ingress(
            "ns",
            "multi",
            vec![
                rule("a.com", vec![path("/a", "Prefix", "svc", 80)]),
                rule("b.com", vec![path("/b", "Prefix", "svc", 80)]),
            ],
        );
        let backends = service_backends(&[ing]);
        assert_eq!(backends.len(), 1);
        let hint = backends.values().next().unwrap();
        assert_eq!(hint.host.as_deref(), Some("a.com"));
        assert_eq!(hint.path.as_deref(), Some("/a"));
    }

    #[test]
    fn test_service_backends_are_per_ingress() {
        let a = ingress("ns", "a", vec![rule("a.com", vec![path("/", "Prefix", "svc", 80)])]);
        let b = ingress("ns", "b", vec![rule("b.com", vec![path("/", "Prefix", "svc", 80)])]);
        assert_eq!(service_backends(&[a, b]).len(), 2);
    }

    #[test]
    fn test_default_backend_is_included() {
        let mut ing = hello_ingress();
        ing.spec.as_mut().unwrap().default_backend = Some(service_backend("fallback", 8080));
        assert_eq!(
            backend_service_names(&ing),
            ["fallback".to_string(), "hello".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn test_load_distribution_policy_names() {
        let mut ing = hello_ingress();
        ing.spec.as_mut().unwrap().default_backend = Some(resource_backend(
            "AzureApplicationGatewayLoadDistributionPolicy",
            "weights",
        ));
        assert_eq!(
            load_distribution_policy_names(&ing),
            ["weights".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn test_tls_secret_names() {
        let ing = with_tls(with_tls(hello_ingress(), &["hello.com"], "cert"), &[], "other");
        assert!(has_tls(&ing));
        assert_eq!(
            tls_secret_names(&ing),
            ["cert".to_string(), "other".to_string()].into_iter().collect()
        );
        assert!(!has_tls(&hello_ingress()));
    }
}
