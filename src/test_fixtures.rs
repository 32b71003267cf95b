// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared builders for unit tests.

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EndpointAddress, EndpointPort, EndpointSubset, Endpoints,
    HTTPGetAction, Pod, PodSpec, Probe as ContainerProbe, Secret, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};
use serde_json::json;
use std::collections::BTreeMap;

use crate::annotations::INGRESS_CLASS;
use crate::appgw::document::ApplicationGateway;
use crate::appgw::identifier::ResourceNamer;
use crate::cache::ClusterSnapshot;
use crate::config::GatewayCoordinates;
use crate::constants::DEFAULT_INGRESS_CLASS;

pub const GATEWAY_ID: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/applicationGateways/gw";

pub const PUBLIC_IP_ID: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/pip";

pub fn coordinates() -> GatewayCoordinates {
    GatewayCoordinates {
        subscription_id: "sub".to_string(),
        resource_group: "rg".to_string(),
        gateway_name: "gw".to_string(),
    }
}

pub fn namer() -> ResourceNamer {
    ResourceNamer::new(&coordinates(), "")
}

// ============================================================================
// Ingress
// ============================================================================

pub fn service_backend(service: &str, port: i32) -> IngressBackend {
    IngressBackend {
        service: Some(IngressServiceBackend {
            name: service.to_string(),
            port: Some(ServiceBackendPort {
                number: Some(port),
                name: None,
            }),
        }),
        resource: None,
    }
}

pub fn path(path: &str, path_type: &str, service: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: path_type.to_string(),
        backend: service_backend(service, port),
    }
}

pub fn rule(host: &str, paths: Vec<HTTPIngressPath>) -> IngressRule {
    IngressRule {
        host: (!host.is_empty()).then(|| host.to_string()),
        http: Some(HTTPIngressRuleValue { paths }),
    }
}

/// Class-matched ingress with the given rules.
pub fn ingress(namespace: &str, name: &str, rules: Vec<IngressRule>) -> Ingress {
    let mut annotations = BTreeMap::new();
    annotations.insert(INGRESS_CLASS.to_string(), DEFAULT_INGRESS_CLASS.to_string());
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(rules),
            ..Default::default()
        }),
        status: None,
    }
}

/// The `ns/hello` ingress routing `hello.com/hi` to `hello:80`.
pub fn hello_ingress() -> Ingress {
    ingress(
        "ns",
        "hello",
        vec![rule("hello.com", vec![path("/hi", "Prefix", "hello", 80)])],
    )
}

pub fn with_annotation(mut ingress: Ingress, key: &str, value: &str) -> Ingress {
    ingress
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    ingress
}

pub fn with_tls(mut ingress: Ingress, hosts: &[&str], secret: &str) -> Ingress {
    if let Some(spec) = ingress.spec.as_mut() {
        spec.tls.get_or_insert_with(Vec::new).push(IngressTLS {
            hosts: Some(hosts.iter().map(ToString::to_string).collect()),
            secret_name: Some(secret.to_string()),
        });
    }
    ingress
}

// ============================================================================
// Backends
// ============================================================================

pub fn service(namespace: &str, name: &str, port: i32, target_port: i32) -> Service {
    let mut selector = BTreeMap::new();
    selector.insert("app".to_string(), name.to_string());
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(target_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn endpoints(namespace: &str, name: &str, ips: &[&str], port: i32) -> Endpoints {
    Endpoints {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                ips.iter()
                    .map(|ip| EndpointAddress {
                        ip: (*ip).to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                name: Some("http".to_string()),
                port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}

/// Pod selected by [`service`] with a readiness probe on `port`.
pub fn pod_with_readiness(namespace: &str, app: &str, port: i32, probe_path: &str) -> Pod {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app.to_string());
    Pod {
        metadata: ObjectMeta {
            name: Some(format!("{app}-0")),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: app.to_string(),
                ports: Some(vec![ContainerPort {
                    container_port: port,
                    ..Default::default()
                }]),
                readiness_probe: Some(ContainerProbe {
                    http_get: Some(HTTPGetAction {
                        path: Some(probe_path.to_string()),
                        port: IntOrString::Int(port),
                        ..Default::default()
                    }),
                    period_seconds: Some(10),
                    timeout_seconds: Some(5),
                    failure_threshold: Some(4),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: None,
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Self-signed certificate and key as PEM.
pub fn self_signed_pem(common_name: &str) -> (Vec<u8>, Vec<u8>) {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (
        builder.build().to_pem().unwrap(),
        key.private_key_to_pem_pkcs8().unwrap(),
    )
}

pub fn tls_secret(namespace: &str, name: &str) -> Secret {
    let (cert, key) = self_signed_pem("hello.com");
    secret_with(namespace, name, Some("kubernetes.io/tls"), Some(cert), Some(key))
}

pub fn secret_with(
    namespace: &str,
    name: &str,
    type_: Option<&str>,
    cert: Option<Vec<u8>>,
    key: Option<Vec<u8>>,
) -> Secret {
    let mut data = BTreeMap::new();
    if let Some(cert) = cert {
        data.insert("tls.crt".to_string(), ByteString(cert));
    }
    if let Some(key) = key {
        data.insert("tls.key".to_string(), ByteString(key));
    }
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: type_.map(ToString::to_string),
        data: Some(data),
        ..Default::default()
    }
}

// ============================================================================
// Gateway and Snapshot
// ============================================================================

/// Running gateway with a public frontend and, optionally, a private one.
pub fn gateway(with_private: bool) -> ApplicationGateway {
    let mut frontends = vec![json!({
        "name": "appGatewayFrontendIP",
        "id": format!("{GATEWAY_ID}/frontendIPConfigurations/appGatewayFrontendIP"),
        "properties": {"publicIPAddress": {"id": PUBLIC_IP_ID}}
    })];
    if with_private {
        frontends.push(json!({
            "name": "appGatewayPrivateFrontendIP",
            "id": format!("{GATEWAY_ID}/frontendIPConfigurations/appGatewayPrivateFrontendIP"),
            "properties": {"privateIPAddress": "10.1.0.10", "privateIPAllocationMethod": "Static"}
        }));
    }
    serde_json::from_value(json!({
        "id": GATEWAY_ID,
        "name": "gw",
        "etag": "W/\"0\"",
        "location": "westeurope",
        "properties": {
            "operationalState": "Running",
            "sku": {"name": "Standard_v2", "tier": "Standard_v2"},
            "frontendIPConfigurations": frontends
        }
    }))
    .unwrap()
}

/// Snapshot with the `hello` service and two endpoints on 8080.
pub fn hello_snapshot() -> ClusterSnapshot {
    let mut snapshot = ClusterSnapshot::default();
    snapshot.insert_service(service("ns", "hello", 80, 8080));
    snapshot.insert_endpoints(endpoints("ns", "hello", &["10.0.0.2", "10.0.0.1"], 8080));
    snapshot
}

/// Gateway carrying another tenant's `legacy.example.com` site on port 80 (a basic rule
/// to `legacy-pool`) next to a stale controller listener for `old.example.com`.
pub fn brownfield_gateway() -> ApplicationGateway {
    let id = |kind: &str, name: &str| format!("{GATEWAY_ID}/{kind}/{name}");
    let mut gw = gateway(false);
    let extra: ApplicationGateway = serde_json::from_value(json!({
        "properties": {
            "frontendPorts": [
                {"name": "legacy-port-80", "id": id("frontendPorts", "legacy-port-80"), "etag": "W/\"1\"", "properties": {"port": 80}}
            ],
            "httpListeners": [
                {
                    "name": "legacy-80",
                    "id": id("httpListeners", "legacy-80"),
                    "etag": "W/\"1\"",
                    "properties": {
                        "frontendIPConfiguration": {"id": id("frontendIPConfigurations", "appGatewayFrontendIP")},
                        "frontendPort": {"id": id("frontendPorts", "legacy-port-80")},
                        "protocol": "Http",
                        "hostName": "legacy.example.com"
                    }
                },
                {
                    "name": "old-listener",
                    "id": id("httpListeners", "old-listener"),
                    "properties": {
                        "frontendIPConfiguration": {"id": id("frontendIPConfigurations", "appGatewayFrontendIP")},
                        "frontendPort": {"id": id("frontendPorts", "legacy-port-80")},
                        "protocol": "Http",
                        "hostName": "old.example.com"
                    }
                }
            ],
            "backendAddressPools": [
                {"name": "legacy-pool", "id": id("backendAddressPools", "legacy-pool"), "properties": {"backendAddresses": [{"ipAddress": "192.168.0.4"}]}},
                {"name": "old-pool", "id": id("backendAddressPools", "old-pool"), "properties": {"backendAddresses": []}}
            ],
            "backendHttpSettingsCollection": [
                {"name": "legacy-settings", "id": id("backendHttpSettingsCollection", "legacy-settings"), "properties": {"port": 80, "protocol": "Http", "probe": {"id": id("probes", "legacy-probe")}}}
            ],
            "probes": [
                {"name": "legacy-probe", "id": id("probes", "legacy-probe"), "properties": {"protocol": "Http", "host": "legacy.example.com", "path": "/health"}}
            ],
            "requestRoutingRules": [
                {
                    "name": "legacy-rule",
                    "id": id("requestRoutingRules", "legacy-rule"),
                    "properties": {
                        "ruleType": "Basic",
                        "priority": 19000,
                        "httpListener": {"id": id("httpListeners", "legacy-80")},
                        "backendAddressPool": {"id": id("backendAddressPools", "legacy-pool")},
                        "backendHttpSettings": {"id": id("backendHttpSettingsCollection", "legacy-settings")}
                    }
                },
                {
                    "name": "old-rule",
                    "id": id("requestRoutingRules", "old-rule"),
                    "properties": {
                        "ruleType": "Basic",
                        "priority": 100,
                        "httpListener": {"id": id("httpListeners", "old-listener")},
                        "backendAddressPool": {"id": id("backendAddressPools", "old-pool")}
                    }
                }
            ]
        }
    }))
    .unwrap();
    gw.properties.frontend_ports = extra.properties.frontend_ports;
    gw.properties.http_listeners = extra.properties.http_listeners;
    gw.properties.backend_address_pools = extra.properties.backend_address_pools;
    gw.properties.backend_http_settings_collection =
        extra.properties.backend_http_settings_collection;
    gw.properties.probes = extra.properties.probes;
    gw.properties.request_routing_rules = extra.properties.request_routing_rules;
    gw
}

/// Policy prohibiting the whole `legacy.example.com` host.
pub fn legacy_policy() -> crate::brownfield::TargetPolicy {
    crate::brownfield::TargetPolicy::new(
        vec![crate::brownfield::Target::new(
            Some("legacy.example.com"),
            None,
            None,
        )],
        Vec::new(),
    )
}

/// Parsed configuration for the fixture gateway plus `args`.
pub fn config(args: &[&str]) -> crate::config::ControllerConfig {
    use clap::Parser;
    let mut argv = vec![
        "appgw-ingress",
        "--subscription-id",
        "sub",
        "--resource-group",
        "rg",
        "--gateway-name",
        "gw",
    ];
    argv.extend_from_slice(args);
    crate::config::ControllerConfig::try_parse_from(argv).unwrap()
}

// ============================================================================
// Gateway Client
// ============================================================================

/// In-memory [`crate::azure::GatewayClient`] recording every update.
pub struct FakeGatewayClient {
    pub gateway: std::sync::Mutex<ApplicationGateway>,
    pub updates: std::sync::Mutex<Vec<ApplicationGateway>>,
    pub fail_updates: std::sync::atomic::AtomicBool,
    pub public_ips: BTreeMap<String, String>,
}

impl FakeGatewayClient {
    pub fn new(gateway: ApplicationGateway) -> Self {
        let mut public_ips = BTreeMap::new();
        public_ips.insert(PUBLIC_IP_ID.to_string(), "20.1.2.3".to_string());
        Self {
            gateway: std::sync::Mutex::new(gateway),
            updates: std::sync::Mutex::new(Vec::new()),
            fail_updates: std::sync::atomic::AtomicBool::new(false),
            public_ips,
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<ApplicationGateway> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_updates
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl crate::azure::GatewayClient for FakeGatewayClient {
    async fn get_gateway(&self) -> Result<ApplicationGateway, crate::controller_errors::ControllerError> {
        Ok(self.gateway.lock().unwrap().clone())
    }

    async fn update_gateway(
        &self,
        gateway: &ApplicationGateway,
    ) -> Result<(), crate::controller_errors::ControllerError> {
        if self.fail_updates.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::controller_errors::ControllerError::new(
                crate::controller_errors::ErrorCode::DeployingAppGatewayConfig,
                "update rejected",
            ));
        }
        self.updates.lock().unwrap().push(gateway.clone());
        let mut applied = gateway.clone();
        applied.etag = Some(format!("W/\"{}\"", self.update_count()));
        *self.gateway.lock().unwrap() = applied;
        Ok(())
    }

    async fn get_public_ip(
        &self,
        resource_id: &str,
    ) -> Result<Option<String>, crate::controller_errors::ControllerError> {
        Ok(self.public_ips.get(resource_id).cloned())
    }

    async fn get_subnet(
        &self,
        _resource_id: &str,
    ) -> Result<Option<String>, crate::controller_errors::ControllerError> {
        Ok(Some("10.224.0.0/16".to_string()))
    }

    async fn apply_route_table(
        &self,
        _subnet_id: &str,
        _route_table_id: &str,
    ) -> Result<(), crate::controller_errors::ControllerError> {
        Ok(())
    }
}

// ============================================================================
// Status Client
// ============================================================================

/// [`crate::status::IngressStatusClient`] recording every write.
#[derive(Default)]
pub struct RecordingStatusClient {
    pub writes: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingStatusClient {
    pub fn writes(&self) -> Vec<(String, Vec<String>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl crate::status::IngressStatusClient for RecordingStatusClient {
    async fn set_load_balancer_ips(
        &self,
        namespace: &str,
        name: &str,
        ips: &[String],
    ) -> anyhow::Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("status subresource unavailable");
        }
        self.writes
            .lock()
            .unwrap()
            .push((format!("{namespace}/{name}"), ips.to_vec()));
        Ok(())
    }
}

/// `ingress` with `ips` in its load-balancer status.
pub fn with_status_ips(mut ingress: Ingress, ips: &[&str]) -> Ingress {
    use k8s_openapi::api::networking::v1::{
        IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
    };
    ingress.status = Some(IngressStatus {
        load_balancer: Some(IngressLoadBalancerStatus {
            ingress: Some(
                ips.iter()
                    .map(|ip| IngressLoadBalancerIngress {
                        ip: Some((*ip).to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
        }),
    });
    ingress
}
