// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Informer callbacks feeding the reflector stores and the event bus.
//!
//! Every watch event first goes through a deep-equality check against the store, so
//! periodic relists and status-only churn never reach the worker. Kind-specific
//! admission then decides whether the change matters:
//!
//! - Ingresses are admitted only when they belong to this controller, before or after
//!   the change.
//! - Pods and Endpoints are admitted only when one of our Ingresses references them
//!   (through a Service).
//! - Secrets are admitted only when they appear in the Ingress ↔ Secret map, which
//!   holds links for our Ingresses only.
//! - Objects from ignored or unwatched namespaces never enter the stores.

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass};
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{key_of, ResourceCache, StoreWriters};
use crate::config::ControllerConfig;
use crate::crd::{
    AzureApplicationGatewayBackendPool, AzureApplicationGatewayInstanceUpdateStatus,
    AzureApplicationGatewayLoadDistributionPolicy, AzureApplicationGatewayRewrite,
    AzureIngressAllowedTarget, AzureIngressProhibitedTarget,
};
use crate::events::{ControllerEvent, EventBus, EventKind, ResourceKind};
use crate::metrics;
use crate::pruner::ClassFilter;

/// An object kind the controller observes.
pub trait ObservedResource:
    Resource<DynamicType = ()> + Clone + PartialEq + DeserializeOwned + Debug + Send + Sync + 'static
{
    const KIND: ResourceKind;

    /// Whether `kind` on `obj` should reach the worker. Runs after the store is updated;
    /// `old` is the object the store held before.
    fn admit(
        _handler: &EventHandler,
        _kind: EventKind,
        _obj: &Self,
        _old: Option<&Self>,
    ) -> bool {
        true
    }
}

/// Applies watch events to the stores and forwards admitted changes to the bus.
pub struct EventHandler {
    cache: Arc<ResourceCache>,
    bus: Arc<EventBus>,
    config: Arc<ControllerConfig>,
    classes: ClassFilter,
}

impl EventHandler {
    #[must_use]
    pub fn new(cache: Arc<ResourceCache>, bus: Arc<EventBus>, config: Arc<ControllerConfig>) -> Self {
        let classes = ClassFilter::from_config(&config);
        Self {
            cache,
            bus,
            config,
            classes,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Whether `obj` lives in a namespace the controller watches.
    fn in_scope<K: ObservedResource>(&self, obj: &K) -> bool {
        match obj.namespace() {
            Some(namespace) => self.config.is_namespace_watched(&namespace),
            None => true,
        }
    }

    /// Apply one watch event to `writer` and forward the resulting change.
    ///
    /// Returns the event pushed to the bus, if any.
    pub fn handle<K: ObservedResource>(
        &self,
        writer: &mut Writer<K>,
        event: watcher::Event<K>,
    ) -> Option<ControllerEvent> {
        match event {
            watcher::Event::Apply(obj) => {
                if !self.in_scope(&obj) {
                    return None;
                }
                let old = stored(writer, &obj);
                let kind = classify(old.as_deref(), &obj);
                writer.apply_watcher_event(&watcher::Event::Apply(obj.clone()));
                kind.and_then(|kind| self.forward(kind, &obj, old.as_deref()))
            }
            watcher::Event::InitApply(obj) => {
                if !self.in_scope(&obj) {
                    return None;
                }
                // Relisted objects land in the store on InitDone; compare against the
                // pre-relist state now.
                let old = stored(writer, &obj);
                let kind = classify(old.as_deref(), &obj);
                writer.apply_watcher_event(&watcher::Event::InitApply(obj.clone()));
                kind.and_then(|kind| self.forward(kind, &obj, old.as_deref()))
            }
            watcher::Event::Delete(obj) => {
                if !self.in_scope(&obj) {
                    return None;
                }
                let old = stored(writer, &obj);
                writer.apply_watcher_event(&watcher::Event::Delete(obj.clone()));
                self.forward(EventKind::Delete, &obj, old.as_deref())
            }
            event @ (watcher::Event::Init | watcher::Event::InitDone) => {
                writer.apply_watcher_event(&event);
                None
            }
        }
    }

    fn forward<K: ObservedResource>(
        &self,
        kind: EventKind,
        obj: &K,
        old: Option<&K>,
    ) -> Option<ControllerEvent> {
        if !K::admit(self, kind, obj, old) {
            debug!(
                resource = K::KIND.as_str(),
                key = %key_of(obj),
                "Dropping event for unreferenced object"
            );
            metrics::record_event_dropped(K::KIND.as_str());
            return None;
        }
        let event = ControllerEvent::new(kind, K::KIND, key_of(obj));
        metrics::record_event_admitted(kind.as_str(), K::KIND.as_str());
        self.bus.push(event.clone()).then_some(event)
    }

    fn is_ours(&self, ingress: &Ingress, classes: &BTreeMap<String, IngressClass>) -> bool {
        self.classes.matches(ingress, classes)
    }

    /// Keep the Ingress ↔ Secret map and the certificate store in step with `ingress`.
    ///
    /// Only ingresses of this controller hold links; a deleted or foreign one releases its
    /// secrets.
    fn sync_ingress_secrets(&self, linked: bool, ingress: &Ingress) {
        let orphaned = if !linked {
            self.cache.unlink_ingress(&key_of(ingress))
        } else {
            let change = self.cache.link_ingress_secrets(ingress);
            for secret_key in self.cache.ingress_secrets().secrets_for_ingress(&key_of(ingress)) {
                if self.cache.get_certificate(&secret_key).is_none() {
                    self.convert_cached_secret(&secret_key);
                }
            }
            change.orphaned
        };
        for secret_key in orphaned {
            if self.cache.delete_certificate(&secret_key) {
                debug!(secret = %secret_key, "Dropped certificate no ingress references");
            }
        }
    }

    fn convert_cached_secret(&self, secret_key: &str) {
        let Some((namespace, name)) = secret_key.split_once('/') else {
            return;
        };
        if let Some(secret) = self.cache.get_secret(namespace, name) {
            self.convert(secret_key, &secret);
        }
    }

    fn convert(&self, secret_key: &str, secret: &Secret) {
        if let Err(e) = self.cache.convert_secret(secret_key, secret) {
            warn!(secret = %secret_key, error = %e, "Unable to convert TLS secret");
            metrics::record_pfx_failure(e.code.as_str());
        }
    }
}

/// The object the store holds under `obj`'s key.
fn stored<K: ObservedResource>(writer: &Writer<K>, obj: &K) -> Option<Arc<K>> {
    writer.as_reader().get(&ObjectRef::from_obj(obj))
}

/// `Create` for unknown objects, `Update` for changed ones, `None` when unchanged.
fn classify<K: ObservedResource>(old: Option<&K>, obj: &K) -> Option<EventKind> {
    match old {
        None => Some(EventKind::Create),
        Some(old) if same_object(old, obj) => None,
        Some(_) => Some(EventKind::Update),
    }
}

/// Equality ignoring server bookkeeping fields.
fn same_object<K: ObservedResource>(old: &K, new: &K) -> bool {
    let strip = |obj: &K| {
        let mut copy = obj.clone();
        let meta = copy.meta_mut();
        meta.resource_version = None;
        meta.managed_fields = None;
        copy
    };
    strip(old) == strip(new)
}

// ============================================================================
// Kinds
// ============================================================================

impl ObservedResource for Ingress {
    const KIND: ResourceKind = ResourceKind::Ingress;

    fn admit(handler: &EventHandler, kind: EventKind, obj: &Self, old: Option<&Self>) -> bool {
        let classes = handler.cache.ingress_classes();
        let ours = handler.is_ours(obj, &classes);
        handler.sync_ingress_secrets(ours && kind != EventKind::Delete, obj);
        // An ingress switched away from this controller still needs one event to be
        // reconciled off the gateway.
        ours || old.is_some_and(|old| handler.is_ours(old, &classes))
    }
}

impl ObservedResource for IngressClass {
    const KIND: ResourceKind = ResourceKind::IngressClass;
}

impl ObservedResource for Service {
    const KIND: ResourceKind = ResourceKind::Service;
}

impl ObservedResource for Endpoints {
    const KIND: ResourceKind = ResourceKind::Endpoints;

    fn admit(handler: &EventHandler, _kind: EventKind, obj: &Self, _old: Option<&Self>) -> bool {
        handler.cache.is_endpoints_referenced(
            &obj.namespace().unwrap_or_default(),
            &obj.name_any(),
            &handler.classes,
        )
    }
}

impl ObservedResource for Pod {
    const KIND: ResourceKind = ResourceKind::Pod;

    fn admit(handler: &EventHandler, _kind: EventKind, obj: &Self, _old: Option<&Self>) -> bool {
        handler.cache.is_pod_referenced(obj, &handler.classes)
    }
}

impl ObservedResource for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn admit(handler: &EventHandler, kind: EventKind, obj: &Self, _old: Option<&Self>) -> bool {
        let key = key_of(obj);
        if !handler.cache.is_secret_referenced(&key) {
            return false;
        }
        if kind == EventKind::Delete {
            handler.cache.delete_certificate(&key);
        } else {
            handler.convert(&key, obj);
        }
        true
    }
}

impl ObservedResource for AzureIngressProhibitedTarget {
    const KIND: ResourceKind = ResourceKind::ProhibitedTarget;
}

impl ObservedResource for AzureIngressAllowedTarget {
    const KIND: ResourceKind = ResourceKind::AllowedTarget;
}

impl ObservedResource for AzureApplicationGatewayBackendPool {
    const KIND: ResourceKind = ResourceKind::BackendPool;
}

impl ObservedResource for AzureApplicationGatewayLoadDistributionPolicy {
    const KIND: ResourceKind = ResourceKind::LoadDistributionPolicy;
}

impl ObservedResource for AzureApplicationGatewayRewrite {
    const KIND: ResourceKind = ResourceKind::Rewrite;
}

impl ObservedResource for AzureApplicationGatewayInstanceUpdateStatus {
    const KIND: ResourceKind = ResourceKind::InstanceUpdateStatus;

    fn admit(_handler: &EventHandler, _kind: EventKind, _obj: &Self, _old: Option<&Self>) -> bool {
        // Status acknowledgements are read on demand; they never change the document.
        false
    }
}

// ============================================================================
// Informer Tasks
// ============================================================================

/// Drive one watcher into `writer` until the stream ends.
pub async fn run_informer<K: ObservedResource>(
    api: Api<K>,
    mut writer: Writer<K>,
    handler: Arc<EventHandler>,
) {
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);

    info!(resource = K::KIND.as_str(), "Starting informer");
    while let Some(result) = stream.next().await {
        match result {
            Ok(event) => {
                handler.handle(&mut writer, event);
            }
            Err(e) => {
                warn!(resource = K::KIND.as_str(), error = %e, "Watch error, retrying");
            }
        }
    }
    warn!(resource = K::KIND.as_str(), "Informer stream ended");
}

fn scoped_api<K>(client: &Client, namespaces: &[String]) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespaces {
        [single] => Api::namespaced(client.clone(), single),
        _ => Api::all(client.clone()),
    }
}

/// Spawn one informer per observed kind.
///
/// A single watched namespace uses a namespaced watch; otherwise objects are watched
/// cluster-wide and filtered by [`EventHandler`].
#[must_use]
pub fn spawn_informers(
    client: &Client,
    writers: StoreWriters,
    handler: &Arc<EventHandler>,
    config: &ControllerConfig,
) -> Vec<JoinHandle<()>> {
    let namespaces = config.watch_namespaces();
    let mut tasks = Vec::new();

    macro_rules! spawn_namespaced {
        ($writer:expr, $ty:ty) => {
            tasks.push(tokio::spawn(run_informer(
                scoped_api::<$ty>(client, &namespaces),
                $writer,
                Arc::clone(handler),
            )));
        };
    }

    tasks.push(tokio::spawn(run_informer(
        Api::<IngressClass>::all(client.clone()),
        writers.ingress_classes,
        Arc::clone(handler),
    )));
    spawn_namespaced!(writers.ingresses, Ingress);
    spawn_namespaced!(writers.services, Service);
    spawn_namespaced!(writers.endpoints, Endpoints);
    spawn_namespaced!(writers.pods, Pod);
    spawn_namespaced!(writers.secrets, Secret);
    spawn_namespaced!(writers.prohibited_targets, AzureIngressProhibitedTarget);
    spawn_namespaced!(writers.allowed_targets, AzureIngressAllowedTarget);
    spawn_namespaced!(writers.backend_pools, AzureApplicationGatewayBackendPool);
    spawn_namespaced!(
        writers.load_distribution_policies,
        AzureApplicationGatewayLoadDistributionPolicy
    );
    spawn_namespaced!(writers.rewrites, AzureApplicationGatewayRewrite);
    spawn_namespaced!(
        writers.instance_update_statuses,
        AzureApplicationGatewayInstanceUpdateStatus
    );

    tasks
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod handlers_tests;
