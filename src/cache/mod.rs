// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource cache of the observed cluster state.
//!
//! One kube reflector [`Store`] per watched kind holds the raw objects. The cache also
//! owns the Ingress ↔ Secret map and the PFX certificate store. Reflector writers are
//! driven by [`handlers`]; everything else only reads.
//!
//! [`ResourceCache::snapshot`] produces a [`ClusterSnapshot`]: deep copies of every
//! object in `BTreeMap`s keyed by `namespace/name`, so the builder always iterates in
//! the same order no matter how the informers delivered the objects.

use k8s_openapi::api::core::v1::{Endpoints, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use kube::runtime::reflector::store::{Writer, WriterDropped};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::appgw::ingress_rules::{backend_service_names, load_distribution_policy_names, tls_secret_names};
use crate::controller_errors::ControllerError;
use crate::crd::{
    AzureApplicationGatewayBackendPool, AzureApplicationGatewayInstanceUpdateStatus,
    AzureApplicationGatewayLoadDistributionPolicy, AzureApplicationGatewayRewrite,
    AzureIngressAllowedTarget, AzureIngressProhibitedTarget,
};
use crate::pruner::ClassFilter;

pub mod handlers;
pub mod ingress_secret_map;
pub mod secret_store;

pub use ingress_secret_map::{IngressSecretMap, SecretLinkChange};
pub use secret_store::SecretStore;

/// `namespace/name` key used throughout the controller.
#[must_use]
pub fn object_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Key of a namespaced object.
pub fn key_of<K: ResourceExt>(obj: &K) -> String {
    object_key(&obj.namespace().unwrap_or_default(), &obj.name_any())
}

fn object_ref<K>(namespace: &str, name: &str) -> ObjectRef<K>
where
    K: kube::Resource<DynamicType = ()>,
{
    ObjectRef::new(name).within(namespace)
}

// ============================================================================
// Snapshot
// ============================================================================

/// Deep copy of the observed state, ordered by key.
#[derive(Clone, Debug, Default)]
pub struct ClusterSnapshot {
    pub ingresses: BTreeMap<String, Ingress>,
    /// Keyed by name (cluster scoped)
    pub ingress_classes: BTreeMap<String, IngressClass>,
    pub services: BTreeMap<String, Service>,
    pub endpoints: BTreeMap<String, Endpoints>,
    pub pods: BTreeMap<String, Pod>,
    /// PFX blobs keyed by secret key
    pub certificates: BTreeMap<String, Vec<u8>>,
    pub prohibited_targets: BTreeMap<String, AzureIngressProhibitedTarget>,
    pub allowed_targets: BTreeMap<String, AzureIngressAllowedTarget>,
    pub backend_pools: BTreeMap<String, AzureApplicationGatewayBackendPool>,
    pub load_distribution_policies: BTreeMap<String, AzureApplicationGatewayLoadDistributionPolicy>,
    pub rewrites: BTreeMap<String, AzureApplicationGatewayRewrite>,
}

impl ClusterSnapshot {
    pub fn insert_ingress(&mut self, ingress: Ingress) {
        self.ingresses.insert(key_of(&ingress), ingress);
    }

    pub fn insert_ingress_class(&mut self, class: IngressClass) {
        self.ingress_classes.insert(class.name_any(), class);
    }

    pub fn insert_service(&mut self, service: Service) {
        self.services.insert(key_of(&service), service);
    }

    pub fn insert_endpoints(&mut self, endpoints: Endpoints) {
        self.endpoints.insert(key_of(&endpoints), endpoints);
    }

    pub fn insert_pod(&mut self, pod: Pod) {
        self.pods.insert(key_of(&pod), pod);
    }

    pub fn insert_certificate(&mut self, namespace: &str, secret: &str, pfx: Vec<u8>) {
        self.certificates.insert(object_key(namespace, secret), pfx);
    }

    pub fn insert_prohibited_target(&mut self, target: AzureIngressProhibitedTarget) {
        self.prohibited_targets.insert(key_of(&target), target);
    }

    pub fn insert_allowed_target(&mut self, target: AzureIngressAllowedTarget) {
        self.allowed_targets.insert(key_of(&target), target);
    }

    pub fn insert_backend_pool(&mut self, pool: AzureApplicationGatewayBackendPool) {
        self.backend_pools.insert(key_of(&pool), pool);
    }

    pub fn insert_load_distribution_policy(
        &mut self,
        policy: AzureApplicationGatewayLoadDistributionPolicy,
    ) {
        self.load_distribution_policies.insert(key_of(&policy), policy);
    }

    pub fn insert_rewrite(&mut self, rewrite: AzureApplicationGatewayRewrite) {
        self.rewrites.insert(key_of(&rewrite), rewrite);
    }

    #[must_use]
    pub fn service(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.services.get(&object_key(namespace, name))
    }

    #[must_use]
    pub fn endpoints(&self, namespace: &str, name: &str) -> Option<&Endpoints> {
        self.endpoints.get(&object_key(namespace, name))
    }

    /// Pods of `namespace`, in key order.
    pub fn pods_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a Pod> + 'a {
        self.pods
            .values()
            .filter(move |pod| pod.namespace().as_deref() == Some(namespace))
    }

    #[must_use]
    pub fn certificate(&self, namespace: &str, secret: &str) -> Option<&[u8]> {
        self.certificates
            .get(&object_key(namespace, secret))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn backend_pool(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<&AzureApplicationGatewayBackendPool> {
        self.backend_pools.get(&object_key(namespace, name))
    }

    #[must_use]
    pub fn load_distribution_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<&AzureApplicationGatewayLoadDistributionPolicy> {
        self.load_distribution_policies
            .get(&object_key(namespace, name))
    }

    #[must_use]
    pub fn rewrite(&self, namespace: &str, name: &str) -> Option<&AzureApplicationGatewayRewrite> {
        self.rewrites.get(&object_key(namespace, name))
    }
}

// ============================================================================
// Reflector Stores
// ============================================================================

/// Readers of every reflector store.
#[derive(Clone)]
pub struct Stores {
    pub ingresses: Store<Ingress>,
    pub ingress_classes: Store<IngressClass>,
    pub services: Store<Service>,
    pub endpoints: Store<Endpoints>,
    pub pods: Store<Pod>,
    pub secrets: Store<Secret>,
    pub prohibited_targets: Store<AzureIngressProhibitedTarget>,
    pub allowed_targets: Store<AzureIngressAllowedTarget>,
    pub backend_pools: Store<AzureApplicationGatewayBackendPool>,
    pub load_distribution_policies: Store<AzureApplicationGatewayLoadDistributionPolicy>,
    pub rewrites: Store<AzureApplicationGatewayRewrite>,
    pub instance_update_statuses: Store<AzureApplicationGatewayInstanceUpdateStatus>,
}

impl Stores {
    /// Wait until every informer has delivered its initial list.
    ///
    /// Reconciling before that would program the gateway from a partial view of the
    /// cluster and tear down listeners of Ingresses not listed yet.
    ///
    /// # Errors
    ///
    /// Returns an error when an informer's writer is dropped before it became ready.
    pub async fn wait_until_ready(&self) -> Result<(), WriterDropped> {
        futures::try_join!(
            self.ingresses.wait_until_ready(),
            self.ingress_classes.wait_until_ready(),
            self.services.wait_until_ready(),
            self.endpoints.wait_until_ready(),
            self.pods.wait_until_ready(),
            self.secrets.wait_until_ready(),
            self.prohibited_targets.wait_until_ready(),
            self.allowed_targets.wait_until_ready(),
            self.backend_pools.wait_until_ready(),
            self.load_distribution_policies.wait_until_ready(),
            self.rewrites.wait_until_ready(),
            self.instance_update_statuses.wait_until_ready(),
        )?;
        Ok(())
    }
}

/// Writers feeding [`Stores`]; consumed by the informer tasks.
pub struct StoreWriters {
    pub ingresses: Writer<Ingress>,
    pub ingress_classes: Writer<IngressClass>,
    pub services: Writer<Service>,
    pub endpoints: Writer<Endpoints>,
    pub pods: Writer<Pod>,
    pub secrets: Writer<Secret>,
    pub prohibited_targets: Writer<AzureIngressProhibitedTarget>,
    pub allowed_targets: Writer<AzureIngressAllowedTarget>,
    pub backend_pools: Writer<AzureApplicationGatewayBackendPool>,
    pub load_distribution_policies: Writer<AzureApplicationGatewayLoadDistributionPolicy>,
    pub rewrites: Writer<AzureApplicationGatewayRewrite>,
    pub instance_update_statuses: Writer<AzureApplicationGatewayInstanceUpdateStatus>,
}

impl StoreWriters {
    /// Create empty writers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ingresses: Writer::default(),
            ingress_classes: Writer::default(),
            services: Writer::default(),
            endpoints: Writer::default(),
            pods: Writer::default(),
            secrets: Writer::default(),
            prohibited_targets: Writer::default(),
            allowed_targets: Writer::default(),
            backend_pools: Writer::default(),
            load_distribution_policies: Writer::default(),
            rewrites: Writer::default(),
            instance_update_statuses: Writer::default(),
        }
    }

    /// Readers for every writer.
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            ingresses: self.ingresses.as_reader(),
            ingress_classes: self.ingress_classes.as_reader(),
            services: self.services.as_reader(),
            endpoints: self.endpoints.as_reader(),
            pods: self.pods.as_reader(),
            secrets: self.secrets.as_reader(),
            prohibited_targets: self.prohibited_targets.as_reader(),
            allowed_targets: self.allowed_targets.as_reader(),
            backend_pools: self.backend_pools.as_reader(),
            load_distribution_policies: self.load_distribution_policies.as_reader(),
            rewrites: self.rewrites.as_reader(),
            instance_update_statuses: self.instance_update_statuses.as_reader(),
        }
    }
}

impl Default for StoreWriters {
    fn default() -> Self {
        Self::new()
    }
}

fn collect<K>(store: &Store<K>) -> BTreeMap<String, K>
where
    K: kube::Resource<DynamicType = ()> + Clone + 'static,
{
    store
        .state()
        .iter()
        .map(|obj| (key_of(obj.as_ref()), obj.as_ref().clone()))
        .collect()
}

// ============================================================================
// Resource Cache
// ============================================================================

/// Observed cluster state shared by the informers and the reconciler.
pub struct ResourceCache {
    stores: Stores,
    secrets: SecretStore,
    ingress_secrets: IngressSecretMap,
}

impl ResourceCache {
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            secrets: SecretStore::new(),
            ingress_secrets: IngressSecretMap::new(),
        }
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    #[must_use]
    pub fn ingress_secrets(&self) -> &IngressSecretMap {
        &self.ingress_secrets
    }

    /// Deep copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            ingresses: collect(&self.stores.ingresses),
            ingress_classes: self.ingress_classes(),
            services: collect(&self.stores.services),
            endpoints: collect(&self.stores.endpoints),
            pods: collect(&self.stores.pods),
            certificates: self.secrets.snapshot(),
            prohibited_targets: collect(&self.stores.prohibited_targets),
            allowed_targets: collect(&self.stores.allowed_targets),
            backend_pools: collect(&self.stores.backend_pools),
            load_distribution_policies: collect(&self.stores.load_distribution_policies),
            rewrites: collect(&self.stores.rewrites),
        }
    }

    /// Observed IngressClasses by name.
    #[must_use]
    pub fn ingress_classes(&self) -> BTreeMap<String, IngressClass> {
        self.stores
            .ingress_classes
            .state()
            .iter()
            .map(|class| (class.name_any(), class.as_ref().clone()))
            .collect()
    }

    /// Every observed ingress, sorted by key.
    #[must_use]
    pub fn list_ingresses(&self) -> Vec<Ingress> {
        collect(&self.stores.ingresses).into_values().collect()
    }

    #[must_use]
    pub fn get_ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.stores
            .ingresses
            .get(&object_ref(namespace, name))
            .map(|i| i.as_ref().clone())
    }

    #[must_use]
    pub fn get_service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.stores
            .services
            .get(&object_ref(namespace, name))
            .map(|s| s.as_ref().clone())
    }

    #[must_use]
    pub fn get_secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.stores
            .secrets
            .get(&object_ref(namespace, name))
            .map(|s| s.as_ref().clone())
    }

    /// PFX bytes of a converted secret.
    #[must_use]
    pub fn get_certificate(&self, key: &str) -> Option<Vec<u8>> {
        self.secrets.get_certificate(key)
    }

    /// Convert a TLS secret into the certificate store.
    ///
    /// # Errors
    ///
    /// See [`SecretStore::convert_secret`].
    pub fn convert_secret(&self, key: &str, secret: &Secret) -> Result<(), ControllerError> {
        self.secrets.convert_secret(key, secret)
    }

    /// Drop the certificate for `key`.
    pub fn delete_certificate(&self, key: &str) -> bool {
        self.secrets.delete(key)
    }

    /// Whether some ingress references the secret `key`.
    #[must_use]
    pub fn is_secret_referenced(&self, key: &str) -> bool {
        self.ingress_secrets.contains_secret(key)
    }

    /// Record the TLS secrets of `ingress`.
    pub fn link_ingress_secrets(&self, ingress: &Ingress) -> SecretLinkChange {
        let namespace = ingress.namespace().unwrap_or_default();
        let secrets = tls_secret_names(ingress)
            .into_iter()
            .map(|name| object_key(&namespace, &name))
            .collect();
        self.ingress_secrets.update(&key_of(ingress), secrets)
    }

    /// Forget the TLS secrets of a deleted ingress; returns orphaned secret keys.
    pub fn unlink_ingress(&self, ingress_key: &str) -> Vec<String> {
        self.ingress_secrets.erase_ingress(ingress_key)
    }

    /// Names of services in `namespace` referenced by a backend of an ingress that
    /// `classes` accepts, directly or through a load distribution policy.
    #[must_use]
    pub fn referenced_services(&self, namespace: &str, classes: &ClassFilter) -> BTreeSet<String> {
        let ingress_classes = self.ingress_classes();
        let mut services = BTreeSet::new();
        for ingress in self.stores.ingresses.state() {
            if ingress.namespace().as_deref() != Some(namespace)
                || !classes.matches(&ingress, &ingress_classes)
            {
                continue;
            }
            services.extend(backend_service_names(&ingress));
            for policy_name in load_distribution_policy_names(&ingress) {
                if let Some(policy) = self
                    .stores
                    .load_distribution_policies
                    .get(&object_ref(namespace, &policy_name))
                {
                    services.extend(
                        policy
                            .spec
                            .targets
                            .iter()
                            .filter_map(|t| t.backend.service.as_ref().map(|s| s.name.clone())),
                    );
                }
            }
        }
        services
    }

    /// Whether the endpoints object `namespace/name` backs a referenced service.
    #[must_use]
    pub fn is_endpoints_referenced(
        &self,
        namespace: &str,
        name: &str,
        classes: &ClassFilter,
    ) -> bool {
        self.referenced_services(namespace, classes).contains(name)
    }

    /// Whether `pod` is selected by a referenced service.
    #[must_use]
    pub fn is_pod_referenced(&self, pod: &Pod, classes: &ClassFilter) -> bool {
        let namespace = pod.namespace().unwrap_or_default();
        let labels = pod.labels();
        self.referenced_services(&namespace, classes)
            .iter()
            .filter_map(|name| self.stores.services.get(&object_ref(&namespace, name)))
            .any(|service| selector_matches(service.as_ref(), labels))
    }
}

/// Whether a service's selector picks a pod with `labels`. Empty selectors match nothing.
#[must_use]
pub fn selector_matches(service: &Service, labels: &BTreeMap<String, String>) -> bool {
    let Some(selector) = service.spec.as_ref().and_then(|s| s.selector.as_ref()) else {
        return false;
    };
    !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Anything that can produce a [`ClusterSnapshot`] for one reconcile.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> ClusterSnapshot;
}

impl SnapshotSource for ResourceCache {
    fn snapshot(&self) -> ClusterSnapshot {
        ResourceCache::snapshot(self)
    }
}

/// Fixed state, replaced wholesale by the owner.
impl SnapshotSource for RwLock<ClusterSnapshot> {
    fn snapshot(&self) -> ClusterSnapshot {
        self.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
