// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Change detection and apply for the generated gateway document.
//!
//! The desired document is compared against the last document this controller applied
//! (not against the live gateway) using canonical JSON: every `etag` key is stripped at
//! any depth, case-insensitively, before the bytes are compared. ARM bumps etags on every
//! write, so comparing with them would make every reconcile look like a change.
//!
//! | Event | Document | Result |
//! |-------|----------|--------|
//! | watch event | unchanged | no write |
//! | watch event | changed | write, cache on success |
//! | periodic reconcile | any | write |
//!
//! A failed write invalidates the cache so the next reconcile writes again.

use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use crate::appgw::document::ApplicationGateway;
use crate::azure::GatewayClient;
use crate::config::ControllerConfig;
use crate::controller_errors::{ControllerError, ErrorCategory, ErrorCode};

/// Server-assigned version tag removed before comparison
const ETAG_KEY: &str = "etag";

/// Document sections never logged or written to disk
const SENSITIVE_PROPERTIES: &[&str] = &["sslCertificates", "trustedRootCertificates"];

/// Remove every `etag` key from `value`, recursively.
pub fn strip_etags(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !key.eq_ignore_ascii_case(ETAG_KEY));
            for child in map.values_mut() {
                strip_etags(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_etags(item);
            }
        }
        _ => {}
    }
}

/// Canonical bytes of `gateway` used for change detection.
///
/// # Errors
///
/// Returns `DeployingAppGatewayConfig` when the document cannot be serialized.
pub fn canonical_json(gateway: &ApplicationGateway) -> Result<Vec<u8>, ControllerError> {
    let mut value = serde_json::to_value(gateway).map_err(|e| {
        ControllerError::with_inner(
            ErrorCode::DeployingAppGatewayConfig,
            "Unable to serialize gateway document",
            e,
        )
    })?;
    strip_etags(&mut value);
    serde_json::to_vec(&value).map_err(|e| {
        ControllerError::with_inner(
            ErrorCode::DeployingAppGatewayConfig,
            "Unable to serialize gateway document",
            e,
        )
    })
}

/// `gateway` as JSON without certificate material, for logs and config dumps.
#[must_use]
pub fn sanitized(gateway: &ApplicationGateway) -> Value {
    let mut value = serde_json::to_value(gateway).unwrap_or(Value::Null);
    if let Some(Value::Object(properties)) = value.get_mut("properties") {
        for key in SENSITIVE_PROPERTIES {
            properties.remove(*key);
        }
    }
    value
}

/// Canonical JSON of the last successfully applied document.
#[derive(Debug, Default)]
pub struct ConfigCache {
    last_applied: Mutex<Option<Vec<u8>>>,
}

impl ConfigCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `canonical` equals the cached document.
    #[must_use]
    pub fn matches(&self, canonical: &[u8]) -> bool {
        self.lock().as_deref() == Some(canonical)
    }

    pub fn store(&self, canonical: Vec<u8>) {
        *self.lock() = Some(canonical);
    }

    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<u8>>> {
        self.last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// What [`ConfigApplier::apply`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The document was written to the gateway
    Applied,
    /// The document matched the last applied one
    Unchanged,
    /// The gateway is not in a mutable operational state
    NotMutable,
}

/// Applies generated documents through a [`GatewayClient`], skipping no-op writes.
pub struct ConfigApplier {
    client: Arc<dyn GatewayClient>,
    cache: ConfigCache,
    /// Directory receiving a copy of every applied document
    dump_dir: Option<PathBuf>,
    panic_on_put_error: bool,
}

impl ConfigApplier {
    #[must_use]
    pub fn new(client: Arc<dyn GatewayClient>, config: &ControllerConfig) -> Self {
        Self {
            client,
            cache: ConfigCache::new(),
            dump_dir: config
                .enable_save_config_to_file
                .then(std::env::temp_dir),
            panic_on_put_error: config.enable_panic_on_put_error,
        }
    }

    /// Write applied documents under `dir` instead of the OS temp dir.
    #[must_use]
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    /// Whether `err` must stop the controller instead of waiting for the next cycle.
    #[must_use]
    pub fn escalates(&self, err: &ControllerError) -> bool {
        self.panic_on_put_error && err.category() == ErrorCategory::Apply
    }

    /// Apply `desired` unless it matches the last applied document.
    ///
    /// `live` is the document fetched at the start of the cycle and only gates on the
    /// operational state. `force` bypasses the cache (periodic reconciles).
    ///
    /// # Errors
    ///
    /// Returns the client error of a failed write; the cache is invalidated first.
    pub async fn apply(
        &self,
        mut desired: ApplicationGateway,
        live: &ApplicationGateway,
        force: bool,
    ) -> Result<ApplyOutcome, ControllerError> {
        if !live.is_mutable() {
            warn!(
                state = live.operational_state().unwrap_or("Unknown"),
                "Application Gateway is not mutable, skipping update"
            );
            return Ok(ApplyOutcome::NotMutable);
        }

        desired.clear_redirect_back_pointers();
        let canonical = canonical_json(&desired)?;

        if !force && self.cache.matches(&canonical) {
            debug!("Generated configuration unchanged, skipping update");
            self.cache.store(canonical);
            return Ok(ApplyOutcome::Unchanged);
        }

        let dump = sanitized(&desired);
        debug!(config = %dump, "Applying Application Gateway configuration");

        match self.client.update_gateway(&desired).await {
            Ok(()) => {
                self.cache.store(canonical);
                if let Some(dir) = &self.dump_dir {
                    save_config(dir, &dump);
                }
                info!(forced = force, "Applied Application Gateway configuration");
                Ok(ApplyOutcome::Applied)
            }
            Err(e) => {
                self.cache.invalidate();
                error!(code = e.code.as_str(), error = %e, "Failed applying Application Gateway configuration");
                Err(e)
            }
        }
    }
}

/// Write `config` to a timestamped file under `dir`. Failures only log.
fn save_config(dir: &Path, config: &Value) -> Option<PathBuf> {
    let path = dir.join(format!(
        "appgw-config-{}.json",
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));
    let written = serde_json::to_vec_pretty(config)
        .map_err(|e| e.to_string())
        .and_then(|bytes| std::fs::write(&path, bytes).map_err(|e| e.to_string()));
    match written {
        Ok(()) => {
            info!(path = %path.display(), "Saved Application Gateway configuration");
            Some(path)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unable to save Application Gateway configuration");
            None
        }
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
