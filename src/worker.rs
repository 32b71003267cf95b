// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The single consumer of the event bus.
//!
//! Bursts are collapsed twice: everything queued when an event is picked up is drained
//! into one batch, and a minimum gap between two reconciles lets the next burst pile up
//! before it is drained. Only one reconcile runs at a time, so two applies can never
//! race against the gateway.
//!
//! Closing the bus stops the worker once the in-flight reconcile returns; whatever is
//! still queued is dropped and pending sleeps are cut short.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::constants::{MIN_TIME_BETWEEN_UPDATES_MILLIS, SLEEP_ON_ERROR_SECS};
use crate::controller_errors::ControllerError;
use crate::events::{ControllerEvent, EventBus};
use crate::reconciler::Reconcile;

/// Pacing of the worker loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Minimum time between the starts of two reconciles
    pub min_gap: Duration,
    /// Pause after a failed reconcile
    pub error_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            min_gap: Duration::from_millis(MIN_TIME_BETWEEN_UPDATES_MILLIS),
            error_backoff: Duration::from_secs(SLEEP_ON_ERROR_SECS),
        }
    }
}

/// Reduce a batch of queued events to the one worth reacting to.
///
/// The most recent object event wins; a periodic reconcile is only returned when the
/// batch holds nothing else.
#[must_use]
pub fn coalesce(events: Vec<ControllerEvent>) -> Option<ControllerEvent> {
    let mut periodic = None;
    let mut latest = None;
    for event in events {
        if event.is_periodic() {
            periodic = Some(event);
        } else {
            latest = Some(event);
        }
    }
    latest.or(periodic)
}

/// Consume `bus` until it is closed.
///
/// # Errors
///
/// Returns the reconcile error `reconciler` reports as fatal. The bus is closed first so
/// producers stop queueing.
pub async fn run_worker(
    bus: Arc<EventBus>,
    reconciler: Arc<dyn Reconcile>,
    settings: WorkerSettings,
) -> Result<(), ControllerError> {
    info!(
        min_gap = ?settings.min_gap,
        error_backoff = ?settings.error_backoff,
        "Worker started"
    );
    let mut last_start: Option<Instant> = None;

    while let Some(first) = bus.recv().await {
        let mut batch = vec![first];
        batch.extend(bus.drain());

        if let Some(last) = last_start {
            let since = last.elapsed();
            if since < settings.min_gap {
                tokio::select! {
                    () = sleep(settings.min_gap - since) => {}
                    () = bus.closed() => break,
                }
                batch.extend(bus.drain());
            }
        }

        let collapsed = batch.len();
        let Some(event) = coalesce(batch) else {
            continue;
        };
        if collapsed > 1 {
            debug!(event = %event, collapsed, "Coalesced queued events");
        }

        last_start = Some(Instant::now());
        match reconciler.reconcile(&event).await {
            Ok(()) => {}
            Err(e) if reconciler.is_fatal(&e) => {
                error!(code = e.code.as_str(), error = %e, "Fatal reconcile error, stopping worker");
                bus.close();
                return Err(e);
            }
            Err(e) => {
                warn!(
                    code = e.code.as_str(),
                    backoff = ?settings.error_backoff,
                    "Reconcile failed, backing off"
                );
                tokio::select! {
                    () = sleep(settings.error_backoff) => {}
                    () = bus.closed() => break,
                }
            }
        }

        if bus.is_closed() {
            let dropped = bus.drain().len();
            if dropped > 0 {
                debug!(dropped, "Dropping events queued behind the stop signal");
            }
            break;
        }
    }

    info!("Event bus closed, worker stopping");
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod worker_tests;
