// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One reconcile cycle, from live gateway to Ingress status.
//!
//! ```text
//! GET gateway → frontend IPs → snapshot → prune → partition (brownfield)
//!     → build + validate → diff/apply → Ingress status → Kubernetes events
//! ```
//!
//! Every step after the GET works on copies: the snapshot is a deep copy of the cache
//! and the generated document is owned by this cycle only. Input problems become warning
//! events on the offending Ingress; build and apply errors abort the cycle and are
//! returned to the worker.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::appgw::{ConfigBuilder, ResourceNamer};
use crate::azure::GatewayClient;
use crate::brownfield::{partition, TargetPolicy};
use crate::cache::SnapshotSource;
use crate::config::{ControllerConfig, GatewayCoordinates};
use crate::controller_errors::{ControllerError, ErrorCategory};
use crate::diff::{ApplyOutcome, ConfigApplier};
use crate::event_reasons::{
    ACTION_APPLY, ACTION_BUILD, REASON_FAILED_APPLYING_APPGW_CONFIG, REASON_INVALID_APPGW_CONFIG,
};
use crate::events::ControllerEvent;
use crate::metrics;
use crate::pruner::{prune_ingresses, PruneContext};
use crate::recorder::{publish_notices, EventPublisher};
use crate::status::{FrontendIpCache, IngressStatusClient, StatusWriter};

/// Something the worker can drive with events.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Handle one (coalesced) event.
    async fn reconcile(&self, event: &ControllerEvent) -> Result<(), ControllerError>;

    /// Whether `err` must stop the worker.
    fn is_fatal(&self, _err: &ControllerError) -> bool {
        false
    }
}

/// The production reconcile pipeline.
pub struct Reconciler {
    config: Arc<ControllerConfig>,
    source: Arc<dyn SnapshotSource>,
    client: Arc<dyn GatewayClient>,
    applier: ConfigApplier,
    ip_cache: FrontendIpCache,
    status: StatusWriter,
    publisher: Arc<dyn EventPublisher>,
    namer: ResourceNamer,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        config: Arc<ControllerConfig>,
        coordinates: &GatewayCoordinates,
        source: Arc<dyn SnapshotSource>,
        client: Arc<dyn GatewayClient>,
        status_client: Arc<dyn IngressStatusClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let applier = ConfigApplier::new(Arc::clone(&client), &config);
        let status = StatusWriter::new(status_client, Arc::clone(&publisher), config.use_private_ip);
        let namer = ResourceNamer::new(coordinates, &config.name_prefix);
        Self {
            config,
            source,
            client,
            applier,
            ip_cache: FrontendIpCache::new(),
            status,
            publisher,
            namer,
        }
    }

    #[must_use]
    pub fn applier(&self) -> &ConfigApplier {
        &self.applier
    }

    /// Run one cycle for `event` and record its outcome.
    ///
    /// # Errors
    ///
    /// Returns the first build, validation or apply error.
    pub async fn reconcile_event(
        &self,
        event: &ControllerEvent,
    ) -> Result<ApplyOutcome, ControllerError> {
        let start = Instant::now();
        debug!(event = %event, "Reconciling");

        let result = self.run(event).await;
        let outcome = match &result {
            Ok(ApplyOutcome::Applied) => "applied",
            Ok(ApplyOutcome::Unchanged) => "unchanged",
            Ok(ApplyOutcome::NotMutable) => "skipped",
            Err(_) => "error",
        };
        metrics::record_reconcile(outcome, start.elapsed());

        if let Err(e) = &result {
            metrics::record_error(e.code.as_str());
            self.report_failure(e).await;
        } else {
            info!(event = %event, outcome, elapsed = ?start.elapsed(), "Reconcile complete");
        }
        result
    }

    async fn run(&self, event: &ControllerEvent) -> Result<ApplyOutcome, ControllerError> {
        let live = self.client.get_gateway().await?;
        let addresses = self.ip_cache.refresh(self.client.as_ref(), &live).await;
        let snapshot = self.source.snapshot();

        let policy = self
            .config
            .enable_brownfield
            .then(|| TargetPolicy::from_snapshot(&snapshot));
        let ctx = PruneContext {
            config: &self.config,
            gateway: &live,
            classes: &snapshot.ingress_classes,
            policy: policy.as_ref(),
        };
        let pruned = prune_ingresses(snapshot.ingresses.values().cloned(), &ctx);

        let unmanaged = policy.as_ref().map(|policy| partition(&live, policy));
        let mut builder =
            ConfigBuilder::new(&snapshot, &live, &self.namer, self.config.use_private_ip);
        if let Some(unmanaged) = &unmanaged {
            builder = builder.with_unmanaged(unmanaged);
        }

        let mut notices = pruned.notices.clone();
        let built = match builder.build(&pruned.accepted) {
            Ok(built) => built,
            Err(e) => {
                publish_notices(self.publisher.as_ref(), &notices).await;
                return Err(e);
            }
        };
        notices.extend(built.notices);

        let applied = self
            .applier
            .apply(built.gateway, &live, event.is_periodic())
            .await;
        match &applied {
            Ok(ApplyOutcome::Applied | ApplyOutcome::Unchanged) => {
                notices.extend(self.status.update(&addresses, &pruned).await);
            }
            Ok(ApplyOutcome::NotMutable) => {}
            Err(_) => self.ip_cache.clear(),
        }

        publish_notices(self.publisher.as_ref(), &notices).await;
        applied
    }

    /// Record a failed cycle on the controller pod, when it is known.
    async fn report_failure(&self, err: &ControllerError) {
        warn!(code = err.code.as_str(), error = %err, "Reconcile failed");
        let (Some(name), Some(namespace)) = (&self.config.pod_name, &self.config.pod_namespace)
        else {
            return;
        };
        let (reason, action) = match err.category() {
            ErrorCategory::Apply => (REASON_FAILED_APPLYING_APPGW_CONFIG, ACTION_APPLY),
            _ => (REASON_INVALID_APPGW_CONFIG, ACTION_BUILD),
        };
        let pod = ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Pod".to_string()),
            name: Some(name.clone()),
            namespace: Some(namespace.clone()),
            ..Default::default()
        };
        self.publisher
            .publish(&pod, EventType::Warning, reason, action, Some(err.to_string()))
            .await;
    }
}

#[async_trait]
impl Reconcile for Reconciler {
    async fn reconcile(&self, event: &ControllerEvent) -> Result<(), ControllerError> {
        self.reconcile_event(event).await.map(|_| ())
    }

    fn is_fatal(&self, err: &ControllerError) -> bool {
        self.applier.escalates(err)
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
