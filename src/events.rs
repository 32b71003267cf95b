// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded event bus between the informers and the worker.
//!
//! Producers never block: when the queue is full the oldest event is dropped and
//! counted. Losing an event is safe because the periodic reconcile re-enters the
//! pipeline on its own schedule.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::constants::EVENT_QUEUE_CAPACITY;
use crate::metrics;

/// What happened to the observed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Update,
    Delete,
    /// Time-triggered full reconcile
    PeriodicReconcile,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::PeriodicReconcile => "periodic",
        }
    }
}

/// Kind of the observed object carried by an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Ingress,
    IngressClass,
    Service,
    Endpoints,
    Pod,
    Secret,
    ProhibitedTarget,
    AllowedTarget,
    BackendPool,
    LoadDistributionPolicy,
    Rewrite,
    InstanceUpdateStatus,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
            Self::IngressClass => "ingressclass",
            Self::Service => "service",
            Self::Endpoints => "endpoints",
            Self::Pod => "pod",
            Self::Secret => "secret",
            Self::ProhibitedTarget => "prohibitedtarget",
            Self::AllowedTarget => "allowedtarget",
            Self::BackendPool => "backendpool",
            Self::LoadDistributionPolicy => "loaddistributionpolicy",
            Self::Rewrite => "rewrite",
            Self::InstanceUpdateStatus => "instanceupdatestatus",
        }
    }
}

/// A unit of work for the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerEvent {
    pub kind: EventKind,
    /// `None` for periodic reconciles
    pub resource: Option<ResourceKind>,
    /// `namespace/name` of the object, empty for periodic reconciles
    pub key: String,
}

impl ControllerEvent {
    pub fn new(kind: EventKind, resource: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            resource: Some(resource),
            key: key.into(),
        }
    }

    #[must_use]
    pub fn periodic() -> Self {
        Self {
            kind: EventKind::PeriodicReconcile,
            resource: None,
            key: String::new(),
        }
    }

    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.kind == EventKind::PeriodicReconcile
    }
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resource {
            Some(resource) => write!(f, "{} {} {}", self.kind.as_str(), resource.as_str(), self.key),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// Bounded multi-producer, single-consumer queue of [`ControllerEvent`]s.
pub struct EventBus {
    queue: Mutex<VecDeque<ControllerEvent>>,
    notify: Notify,
    shutdown: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            shutdown: Notify::new(),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue `event`, dropping the oldest one on overflow.
    ///
    /// Returns `false` when the bus is closed.
    pub fn push(&self, event: ControllerEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        let depth = {
            let mut queue = self.lock();
            if queue.len() >= self.capacity {
                if let Some(dropped) = queue.pop_front() {
                    debug!(event = %dropped, "Event queue full, dropping oldest event");
                    metrics::record_event_dropped("overflow");
                }
            }
            trace!(event = %event, "Queued event");
            queue.push_back(event);
            queue.len()
        };
        metrics::set_event_queue_depth(depth);
        self.notify.notify_one();
        true
    }

    /// Wait for the next event; `None` once the bus is closed and empty.
    ///
    /// Events queued before the close are still handed out. The worker checks
    /// [`EventBus::is_closed`] after every reconcile and leaves them behind.
    pub async fn recv(&self) -> Option<ControllerEvent> {
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Pop the next event without waiting.
    pub fn try_recv(&self) -> Option<ControllerEvent> {
        let (event, depth) = {
            let mut queue = self.lock();
            let event = queue.pop_front();
            (event, queue.len())
        };
        if event.is_some() {
            metrics::set_event_queue_depth(depth);
        }
        event
    }

    /// Take every queued event.
    pub fn drain(&self) -> Vec<ControllerEvent> {
        let events: Vec<ControllerEvent> = self.lock().drain(..).collect();
        metrics::set_event_queue_depth(0);
        events
    }

    /// Stop accepting events and wake the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
        self.shutdown.notify_waiters();
    }

    /// Resolve once the bus is closed.
    pub async fn closed(&self) {
        let notified = self.shutdown.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ControllerEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_QUEUE_CAPACITY)
    }
}

/// Push a [`EventKind::PeriodicReconcile`] every `period` until the bus closes.
pub async fn run_periodic_reconcile(bus: Arc<EventBus>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately; the startup sync already covers it.
    interval.tick().await;
    loop {
        interval.tick().await;
        if !bus.push(ControllerEvent::periodic()) {
            debug!("Event bus closed, stopping periodic reconcile");
            return;
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
