// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Many-to-many map between Ingresses and the TLS secrets they reference.
//!
//! Both directions are kept in one lock so the map is always symmetric. Entries whose
//! set becomes empty are erased.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Links {
    secrets_by_ingress: BTreeMap<String, BTreeSet<String>>,
    ingresses_by_secret: BTreeMap<String, BTreeSet<String>>,
}

/// Result of replacing the secret set of one ingress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretLinkChange {
    /// Secrets no ingress referenced before this update
    pub newly_referenced: Vec<String>,
    /// Secrets no ingress references any more
    pub orphaned: Vec<String>,
}

/// Thread-safe bidirectional `ingress key` ↔ `secret key` multimap.
#[derive(Debug, Default)]
pub struct IngressSecretMap {
    links: Mutex<Links>,
}

impl IngressSecretMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the secrets referenced by `ingress`.
    pub fn update(&self, ingress: &str, secrets: BTreeSet<String>) -> SecretLinkChange {
        let mut links = self.lock();
        let previous = links
            .secrets_by_ingress
            .remove(ingress)
            .unwrap_or_default();

        let mut change = SecretLinkChange::default();

        for secret in previous.difference(&secrets) {
            if unlink(&mut links.ingresses_by_secret, secret, ingress) {
                change.orphaned.push(secret.clone());
            }
        }

        for secret in &secrets {
            let ingresses = links
                .ingresses_by_secret
                .entry(secret.clone())
                .or_default();
            if ingresses.is_empty() {
                change.newly_referenced.push(secret.clone());
            }
            ingresses.insert(ingress.to_string());
        }

        if !secrets.is_empty() {
            links.secrets_by_ingress.insert(ingress.to_string(), secrets);
        }
        change
    }

    /// Forget `ingress`; returns the secrets left without any referencing ingress.
    pub fn erase_ingress(&self, ingress: &str) -> Vec<String> {
        self.update(ingress, BTreeSet::new()).orphaned
    }

    /// Forget `secret`; returns the ingresses that referenced it.
    pub fn erase_secret(&self, secret: &str) -> Vec<String> {
        let mut links = self.lock();
        let ingresses = links
            .ingresses_by_secret
            .remove(secret)
            .unwrap_or_default();
        for ingress in &ingresses {
            unlink(&mut links.secrets_by_ingress, ingress, secret);
        }
        ingresses.into_iter().collect()
    }

    #[must_use]
    pub fn contains_secret(&self, secret: &str) -> bool {
        self.lock().ingresses_by_secret.contains_key(secret)
    }

    #[must_use]
    pub fn contains_ingress(&self, ingress: &str) -> bool {
        self.lock().secrets_by_ingress.contains_key(ingress)
    }

    #[must_use]
    pub fn ingresses_for_secret(&self, secret: &str) -> Vec<String> {
        self.lock()
            .ingresses_by_secret
            .get(secret)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn secrets_for_ingress(&self, ingress: &str) -> Vec<String> {
        self.lock()
            .secrets_by_ingress
            .get(ingress)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Links> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Remove `value` from `map[key]`, erasing the entry when it empties.
/// Returns whether the entry was erased.
fn unlink(map: &mut BTreeMap<String, BTreeSet<String>>, key: &str, value: &str) -> bool {
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    set.remove(value);
    if set.is_empty() {
        map.remove(key);
        return true;
    }
    false
}
