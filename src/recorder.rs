// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes event recording for the ingress controller.
//!
//! Events are **fire-and-forget**: a failed publish is logged as a warning and never
//! propagates. The builder and pruner collect [`IngressNotice`]s while they run; the
//! reconciler publishes them once the cycle is over.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use std::sync::Mutex;
use tracing::warn;

/// Publishes Kubernetes events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on `resource_ref`.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason (see [`crate::event_reasons`])
    /// * `action` - What the controller was doing
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production publisher wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`, optionally tagged with the pod name.
    pub fn new(client: Client, controller_name: &str, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops everything.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// One event captured by [`RecordingEventPublisher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Publisher that keeps every event in memory, for tests and dry runs.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events published so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events published with `reason`.
    #[must_use]
    pub fn with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                namespace: resource_ref.namespace.clone(),
                name: resource_ref.name.clone(),
                warning: matches!(type_, EventType::Warning),
                reason: reason.to_string(),
                action: action.to_string(),
                note,
            });
        }
    }
}

// ============================================================================
// Ingress Notices
// ============================================================================

/// Warning about one Ingress collected during a reconcile.
#[derive(Clone, Debug, PartialEq)]
pub struct IngressNotice {
    pub reference: ObjectReference,
    pub reason: &'static str,
    pub action: &'static str,
    pub message: String,
}

impl IngressNotice {
    pub fn new(
        ingress: &Ingress,
        reason: &'static str,
        action: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            reference: ingress_reference(ingress),
            reason,
            action,
            message: message.into(),
        }
    }

    /// `namespace/name` of the ingress the notice is about.
    #[must_use]
    pub fn ingress_key(&self) -> String {
        format!(
            "{}/{}",
            self.reference.namespace.as_deref().unwrap_or_default(),
            self.reference.name.as_deref().unwrap_or_default()
        )
    }
}

/// Object reference used as the event target for an Ingress.
#[must_use]
pub fn ingress_reference(ingress: &Ingress) -> ObjectReference {
    let mut reference = ingress.object_ref(&());
    if reference.namespace.is_none() {
        reference.namespace = ingress.namespace();
    }
    reference
}

/// Publish every notice as a warning event.
pub async fn publish_notices(publisher: &dyn EventPublisher, notices: &[IngressNotice]) {
    for notice in notices {
        warn!(
            ingress = %notice.ingress_key(),
            reason = notice.reason,
            "{}",
            notice.message
        );
        publisher
            .publish(
                &notice.reference,
                EventType::Warning,
                notice.reason,
                notice.action,
                Some(notice.message.clone()),
            )
            .await;
    }
}
