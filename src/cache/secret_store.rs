// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! PFX certificate cache for TLS secrets.
//!
//! The gateway only accepts certificates as password-protected PKCS#12 blobs. TLS secrets
//! referenced by an Ingress are converted in process with `openssl` and kept here under
//! their `namespace/name` key. Every blob is encrypted with [`PFX_PASSPHRASE`] so the
//! builder can hand the same passphrase to the gateway.

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::X509;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::constants::PFX_PASSPHRASE;
use crate::controller_errors::{ControllerError, ErrorCode};

/// Secret type carrying a certificate and private key
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Data key of the PEM certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Data key of the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Thread-safe map of `namespace/name` → PFX bytes.
#[derive(Debug, Default)]
pub struct SecretStore {
    certificates: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl SecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `secret` and store the result under `key`.
    ///
    /// On failure any previously stored certificate for `key` is dropped, so a listener
    /// is never built from a stale certificate.
    ///
    /// # Errors
    ///
    /// - `UnknownSecretType` when the secret is not of type `kubernetes.io/tls`
    /// - `MalformedSecret` when the certificate or key is missing or not valid PEM
    /// - `ExportingError` when PKCS#12 packaging fails
    pub fn convert_secret(&self, key: &str, secret: &Secret) -> Result<(), ControllerError> {
        match secret_to_pfx(secret) {
            Ok(pfx) => {
                debug!(secret = %key, bytes = pfx.len(), "Converted TLS secret to PFX");
                self.write().insert(key.to_string(), pfx);
                Ok(())
            }
            Err(e) => {
                self.write().remove(key);
                Err(e)
            }
        }
    }

    /// PFX bytes for `key`, if converted.
    #[must_use]
    pub fn get_certificate(&self, key: &str) -> Option<Vec<u8>> {
        self.read().get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Drop the certificate for `key`; returns whether one was stored.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Copy of every stored certificate.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.certificates.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.certificates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Package a TLS secret's PEM certificate chain and key as PKCS#12.
///
/// # Errors
///
/// See [`SecretStore::convert_secret`].
pub fn secret_to_pfx(secret: &Secret) -> Result<Vec<u8>, ControllerError> {
    let key = format!(
        "{}/{}",
        secret.namespace().unwrap_or_default(),
        secret.name_any()
    );

    if secret.type_.as_deref() != Some(TLS_SECRET_TYPE) {
        return Err(ControllerError::new(
            ErrorCode::UnknownSecretType,
            format!(
                "secret {key} has type {:?}, expected {TLS_SECRET_TYPE}",
                secret.type_.as_deref().unwrap_or_default()
            ),
        ));
    }

    let field = |name: &str| {
        secret
            .data
            .as_ref()
            .and_then(|data| data.get(name))
            .map(|bytes| bytes.0.clone())
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| {
                ControllerError::new(
                    ErrorCode::MalformedSecret,
                    format!("secret {key} has no {name}"),
                )
            })
    };
    let cert_pem = field(TLS_CERT_KEY)?;
    let key_pem = field(TLS_PRIVATE_KEY_KEY)?;

    let mut chain = X509::stack_from_pem(&cert_pem).map_err(|e| {
        ControllerError::with_inner(
            ErrorCode::MalformedSecret,
            format!("secret {key} has an unreadable {TLS_CERT_KEY}"),
            e,
        )
    })?;
    if chain.is_empty() {
        return Err(ControllerError::new(
            ErrorCode::MalformedSecret,
            format!("secret {key} has no certificate in {TLS_CERT_KEY}"),
        ));
    }
    let leaf = chain.remove(0);

    let pkey = PKey::private_key_from_pem(&key_pem).map_err(|e| {
        ControllerError::with_inner(
            ErrorCode::MalformedSecret,
            format!("secret {key} has an unreadable {TLS_PRIVATE_KEY_KEY}"),
            e,
        )
    })?;

    let exporting = |e: openssl::error::ErrorStack| {
        ControllerError::with_inner(
            ErrorCode::ExportingError,
            format!("unable to export secret {key} as PFX"),
            e,
        )
    };

    let mut builder = Pkcs12::builder();
    builder.pkey(&pkey).cert(&leaf);
    if !chain.is_empty() {
        let mut ca = Stack::new().map_err(exporting)?;
        for cert in chain {
            ca.push(cert).map_err(exporting)?;
        }
        builder.ca(ca);
    }

    builder
        .build2(PFX_PASSPHRASE)
        .and_then(|pfx| pfx.to_der())
        .map_err(exporting)
}

#[cfg(test)]
#[path = "secret_store_tests.rs"]
mod secret_store_tests;
