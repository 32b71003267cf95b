// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use kube::CustomResourceExt;

    // ========================================================================
    // CRD Metadata
    // ========================================================================

    #[test]
    fn test_crd_groups_and_versions() {
        let crd = AzureIngressProhibitedTarget::crd();
        assert_eq!(crd.spec.group, "appgw.ingress.k8s.io");
        assert_eq!(crd.spec.names.kind, "AzureIngressProhibitedTarget");
        assert_eq!(crd.spec.versions[0].name, "v1");

        let crd = AzureApplicationGatewayRewrite::crd();
        assert_eq!(crd.spec.versions[0].name, "v1beta1");
        assert_eq!(crd.spec.scope, "Namespaced");
    }

    #[test]
    fn test_all_crds_render() {
        let names = [
            AzureIngressProhibitedTarget::crd_name(),
            AzureIngressAllowedTarget::crd_name(),
            AzureApplicationGatewayBackendPool::crd_name(),
            AzureApplicationGatewayLoadDistributionPolicy::crd_name(),
            AzureApplicationGatewayRewrite::crd_name(),
            AzureApplicationGatewayInstanceUpdateStatus::crd_name(),
        ];
        for name in names {
            assert!(name.ends_with(".appgw.ingress.k8s.io"), "{name}");
        }
    }

    // ========================================================================
    // Deserialization
    // ========================================================================

    #[test]
    fn test_prohibited_target_deserializes_camel_case() {
        let spec: AzureIngressProhibitedTargetSpec = serde_json::from_value(serde_json::json!({
            "hostname": "legacy.example.com",
            "port": 443,
            "paths": ["/admin/*"]
        }))
        .unwrap();
        assert_eq!(spec.hostname.as_deref(), Some("legacy.example.com"));
        assert_eq!(spec.port, Some(443));
        assert_eq!(spec.paths, vec!["/admin/*"]);
        assert!(spec.ip.is_none());
    }

    #[test]
    fn test_backend_pool_deserializes() {
        let spec: AzureApplicationGatewayBackendPoolSpec =
            serde_json::from_value(serde_json::json!({
                "backendAddressPools": [
                    {"name": "external", "backendAddresses": [{"ipAddress": "192.0.2.10"}, {"fqdn": "api.example.net"}]}
                ]
            }))
            .unwrap();
        let pool = &spec.backend_address_pools[0];
        assert_eq!(pool.name, "external");
        assert_eq!(pool.backend_addresses[0].ip_address.as_deref(), Some("192.0.2.10"));
        assert_eq!(pool.backend_addresses[1].fqdn.as_deref(), Some("api.example.net"));
    }

    #[test]
    fn test_load_distribution_policy_deserializes() {
        let spec: AzureApplicationGatewayLoadDistributionPolicySpec =
            serde_json::from_value(serde_json::json!({
                "targets": [
                    {"role": "primary", "weight": 80, "backend": {"service": {"name": "v1", "port": {"number": 80}}}},
                    {"weight": 20, "backend": {"service": {"name": "v2", "port": {"name": "http"}}}}
                ]
            }))
            .unwrap();
        assert_eq!(spec.targets.len(), 2);
        assert_eq!(spec.targets[0].weight, 80);
        let svc = spec.targets[1].backend.service.as_ref().unwrap();
        assert_eq!(svc.port.name.as_deref(), Some("http"));
    }

    #[test]
    fn test_rewrite_deserializes() {
        let spec: AzureApplicationGatewayRewriteSpec = serde_json::from_value(serde_json::json!({
            "rewriteRules": [{
                "name": "strip-server",
                "ruleSequence": 100,
                "actions": {"responseHeaderConfigurations": [{"actionType": "delete", "headerName": "Server"}]}
            }]
        }))
        .unwrap();
        let rule = &spec.rewrite_rules[0];
        assert_eq!(rule.rule_sequence, 100);
        assert_eq!(
            rule.actions.response_header_configurations[0].header_name,
            "Server"
        );
        assert!(rule.actions.url_configuration.is_none());
    }

    #[test]
    fn test_instance_update_status_all_updated() {
        let mut spec = AzureApplicationGatewayInstanceUpdateStatusSpec::default();
        assert!(!spec.all_updated());

        spec.instances = vec![
            InstanceUpdateState {
                instance_name: "appgw_0".into(),
                updated: true,
                last_update_time: None,
            },
            InstanceUpdateState {
                instance_name: "appgw_1".into(),
                updated: false,
                last_update_time: None,
            },
        ];
        assert!(!spec.all_updated());
        spec.instances[1].updated = true;
        assert!(spec.all_updated());
    }
}
