// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use appgw_ingress::annotations::INGRESS_CLASS;
use appgw_ingress::appgw::document::ApplicationGateway;
use appgw_ingress::azure::GatewayClient;
use appgw_ingress::cache::handlers::{EventHandler, ObservedResource};
use appgw_ingress::cache::{ResourceCache, SnapshotSource, StoreWriters};
use appgw_ingress::config::{ControllerConfig, GatewayCoordinates};
use appgw_ingress::constants::DEFAULT_INGRESS_CLASS;
use appgw_ingress::controller_errors::{ControllerError, ErrorCode};
use appgw_ingress::crd::{AzureIngressProhibitedTarget, AzureIngressProhibitedTargetSpec};
use appgw_ingress::events::{ControllerEvent, EventBus};
use appgw_ingress::reconciler::{Reconcile, Reconciler};
use appgw_ingress::recorder::{EventPublisher, RecordingEventPublisher};
use appgw_ingress::status::IngressStatusClient;
use appgw_ingress::worker::{run_worker, WorkerSettings};
use async_trait::async_trait;
use clap::Parser;
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Namespace, Secret, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::client::Client;
use kube::runtime::reflector::store::Writer;
use kube::runtime::watcher;
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GATEWAY_ID: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/applicationGateways/gw";

pub const PUBLIC_IP_ID: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/publicIPAddresses/pip";

pub const PUBLIC_IP: &str = "20.1.2.3";

// ============================================================================
// Cluster Helpers
// ============================================================================

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "appgw-ingress-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

// ============================================================================
// Configuration
// ============================================================================

pub fn coordinates() -> GatewayCoordinates {
    GatewayCoordinates {
        subscription_id: "sub".to_string(),
        resource_group: "rg".to_string(),
        gateway_name: "gw".to_string(),
    }
}

/// Parsed configuration for the fixture gateway plus `args`.
pub fn config(args: &[&str]) -> ControllerConfig {
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
    ControllerConfig::try_parse_from(argv).unwrap()
}

// ============================================================================
// Kubernetes Objects
// ============================================================================

pub fn path(path: &str, path_type: &str, service: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: path_type.to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: service.to_string(),
                port: Some(ServiceBackendPort {
                    number: Some(port),
                    name: None,
                }),
            }),
            resource: None,
        },
    }
}

pub fn rule(host: &str, paths: Vec<HTTPIngressPath>) -> IngressRule {
    IngressRule {
        host: Some(host.to_string()),
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

/// `kubernetes.io/tls` secret holding a fresh self-signed certificate for `host`.
pub fn tls_secret(namespace: &str, name: &str, host: &str) -> Secret {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut subject = X509NameBuilder::new().unwrap();
    subject.append_entry_by_text("CN", host).unwrap();
    let subject = subject.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    let mut data = BTreeMap::new();
    data.insert("tls.crt".to_string(), ByteString(builder.build().to_pem().unwrap()));
    data.insert(
        "tls.key".to_string(),
        ByteString(key.private_key_to_pem_pkcs8().unwrap()),
    );
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// Prohibited target covering every path of `hostname`.
pub fn prohibited_host(namespace: &str, name: &str, hostname: &str) -> AzureIngressProhibitedTarget {
    let mut target = AzureIngressProhibitedTarget::new(
        name,
        AzureIngressProhibitedTargetSpec {
            ip: None,
            hostname: Some(hostname.to_string()),
            port: None,
            paths: Vec::new(),
        },
    );
    target.metadata.namespace = Some(namespace.to_string());
    target
}

// ============================================================================
// Gateway Documents
// ============================================================================

/// Running gateway with a single public frontend.
pub fn gateway() -> ApplicationGateway {
    serde_json::from_value(json!({
        "id": GATEWAY_ID,
        "name": "gw",
        "etag": "W/\"0\"",
        "location": "westeurope",
        "properties": {
            "operationalState": "Running",
            "sku": {"name": "Standard_v2", "tier": "Standard_v2"},
            "frontendIPConfigurations": [{
                "name": "appGatewayFrontendIP",
                "id": format!("{GATEWAY_ID}/frontendIPConfigurations/appGatewayFrontendIP"),
                "properties": {"publicIPAddress": {"id": PUBLIC_IP_ID}}
            }]
        }
    }))
    .unwrap()
}

/// Gateway also serving another tenant's `legacy.example.com` on port 80.
pub fn shared_gateway() -> ApplicationGateway {
    let id = |kind: &str, name: &str| format!("{GATEWAY_ID}/{kind}/{name}");
    let mut gw = gateway();
    let legacy: ApplicationGateway = serde_json::from_value(json!({
        "properties": {
            "frontendPorts": [
                {"name": "legacy-port-80", "id": id("frontendPorts", "legacy-port-80"), "etag": "W/\"1\"", "properties": {"port": 80}}
            ],
            "httpListeners": [{
                "name": "legacy-80",
                "id": id("httpListeners", "legacy-80"),
                "etag": "W/\"1\"",
                "properties": {
                    "frontendIPConfiguration": {"id": id("frontendIPConfigurations", "appGatewayFrontendIP")},
                    "frontendPort": {"id": id("frontendPorts", "legacy-port-80")},
                    "protocol": "Http",
                    "hostName": "legacy.example.com"
                }
            }],
            "backendAddressPools": [
                {"name": "legacy-pool", "id": id("backendAddressPools", "legacy-pool"), "properties": {"backendAddresses": [{"ipAddress": "192.168.0.4"}]}}
            ],
            "backendHttpSettingsCollection": [
                {"name": "legacy-settings", "id": id("backendHttpSettingsCollection", "legacy-settings"), "properties": {"port": 80, "protocol": "Http"}}
            ],
            "requestRoutingRules": [{
                "name": "legacy-rule",
                "id": id("requestRoutingRules", "legacy-rule"),
                "properties": {
                    "ruleType": "Basic",
                    "priority": 19000,
                    "httpListener": {"id": id("httpListeners", "legacy-80")},
                    "backendAddressPool": {"id": id("backendAddressPools", "legacy-pool")},
                    "backendHttpSettings": {"id": id("backendHttpSettingsCollection", "legacy-settings")}
                }
            }]
        }
    }))
    .unwrap();
    gw.properties.frontend_ports = legacy.properties.frontend_ports;
    gw.properties.http_listeners = legacy.properties.http_listeners;
    gw.properties.backend_address_pools = legacy.properties.backend_address_pools;
    gw.properties.backend_http_settings_collection =
        legacy.properties.backend_http_settings_collection;
    gw.properties.request_routing_rules = legacy.properties.request_routing_rules;
    gw
}

// ============================================================================
// Fakes
// ============================================================================

/// In-memory gateway recording every update.
pub struct FakeArm {
    gateway: Mutex<ApplicationGateway>,
    updates: Mutex<Vec<ApplicationGateway>>,
    failing: AtomicBool,
}

impl FakeArm {
    pub fn new(gateway: ApplicationGateway) -> Self {
        Self {
            gateway: Mutex::new(gateway),
            updates: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<ApplicationGateway> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_live(&self) -> ApplicationGateway {
        self.gateway.lock().unwrap().clone()
    }

    /// Replace the live document, as another writer would.
    pub fn set_live(&self, gateway: ApplicationGateway) {
        *self.gateway.lock().unwrap() = gateway;
    }
}

#[async_trait]
impl GatewayClient for FakeArm {
    async fn get_gateway(&self) -> Result<ApplicationGateway, ControllerError> {
        Ok(self.gateway.lock().unwrap().clone())
    }

    async fn update_gateway(&self, gateway: &ApplicationGateway) -> Result<(), ControllerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ControllerError::new(
                ErrorCode::DeployingAppGatewayConfig,
                "update rejected",
            ));
        }
        self.updates.lock().unwrap().push(gateway.clone());
        let mut live = gateway.clone();
        live.etag = Some(format!("W/\"{}\"", self.update_count()));
        *self.gateway.lock().unwrap() = live;
        Ok(())
    }

    async fn get_public_ip(&self, resource_id: &str) -> Result<Option<String>, ControllerError> {
        Ok((resource_id == PUBLIC_IP_ID).then(|| PUBLIC_IP.to_string()))
    }

    async fn get_subnet(&self, _resource_id: &str) -> Result<Option<String>, ControllerError> {
        Ok(None)
    }

    async fn apply_route_table(
        &self,
        _subnet_id: &str,
        _route_table_id: &str,
    ) -> Result<(), ControllerError> {
        Ok(())
    }
}

/// Status client recording `(namespace/name, ips)` writes.
#[derive(Default)]
pub struct RecordingStatus {
    writes: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingStatus {
    pub fn writes(&self) -> Vec<(String, Vec<String>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl IngressStatusClient for RecordingStatus {
    async fn set_load_balancer_ips(
        &self,
        namespace: &str,
        name: &str,
        ips: &[String],
    ) -> anyhow::Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((format!("{namespace}/{name}"), ips.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Informer handler, event bus, worker and reconciler wired to in-memory fakes.
pub struct Pipeline {
    pub writers: StoreWriters,
    pub bus: Arc<EventBus>,
    pub handler: EventHandler,
    pub arm: Arc<FakeArm>,
    pub status: Arc<RecordingStatus>,
    pub events: Arc<RecordingEventPublisher>,
    pub reconciler: Arc<Reconciler>,
}

impl Pipeline {
    pub fn new(live: ApplicationGateway, args: &[&str]) -> Self {
        let config = Arc::new(config(args));
        let writers = StoreWriters::new();
        let cache = Arc::new(ResourceCache::new(writers.stores()));
        let bus = Arc::new(EventBus::default());
        let handler = EventHandler::new(Arc::clone(&cache), Arc::clone(&bus), Arc::clone(&config));
        let arm = Arc::new(FakeArm::new(live));
        let status = Arc::new(RecordingStatus::default());
        let events = Arc::new(RecordingEventPublisher::new());
        let reconciler = Arc::new(Reconciler::new(
            config,
            &coordinates(),
            cache as Arc<dyn SnapshotSource>,
            Arc::clone(&arm) as Arc<dyn GatewayClient>,
            Arc::clone(&status) as Arc<dyn IngressStatusClient>,
            Arc::clone(&events) as Arc<dyn EventPublisher>,
        ));
        Self {
            writers,
            bus,
            handler,
            arm,
            status,
            events,
            reconciler,
        }
    }

    fn apply<K: ObservedResource>(
        handler: &EventHandler,
        writer: &mut Writer<K>,
        obj: K,
    ) -> Option<ControllerEvent> {
        handler.handle(writer, watcher::Event::Apply(obj))
    }

    pub fn apply_ingress(&mut self, ingress: Ingress) -> Option<ControllerEvent> {
        Self::apply(&self.handler, &mut self.writers.ingresses, ingress)
    }

    pub fn apply_service(&mut self, service: Service) -> Option<ControllerEvent> {
        Self::apply(&self.handler, &mut self.writers.services, service)
    }

    pub fn apply_endpoints(&mut self, endpoints: Endpoints) -> Option<ControllerEvent> {
        Self::apply(&self.handler, &mut self.writers.endpoints, endpoints)
    }

    pub fn apply_secret(&mut self, secret: Secret) -> Option<ControllerEvent> {
        Self::apply(&self.handler, &mut self.writers.secrets, secret)
    }

    pub fn apply_prohibited_target(
        &mut self,
        target: AzureIngressProhibitedTarget,
    ) -> Option<ControllerEvent> {
        Self::apply(&self.handler, &mut self.writers.prohibited_targets, target)
    }

    /// The `hello` service with endpoints `10.0.0.2` and `10.0.0.1` on 8080.
    pub fn apply_hello_backend(&mut self, namespace: &str) {
        self.apply_service(service(namespace, "hello", 80, 8080));
        self.apply_endpoints(endpoints(namespace, "hello", &["10.0.0.2", "10.0.0.1"], 8080));
    }

    /// Close the bus and let the worker consume everything queued so far.
    pub async fn drain(&self) -> Result<(), ControllerError> {
        self.bus.close();
        run_worker(
            Arc::clone(&self.bus),
            Arc::clone(&self.reconciler) as Arc<dyn Reconcile>,
            WorkerSettings {
                min_gap: Duration::ZERO,
                error_backoff: Duration::ZERO,
            },
        )
        .await
    }
}
