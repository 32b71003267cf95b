// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! SSL certificates installed from Ingress TLS secrets.
//!
//! Every TLS secret referenced by an Ingress whose PFX conversion succeeded becomes one
//! `cert-{namespace}-{secret}` certificate. Certificates the controller did not generate
//! (uploaded by hand, or referenced through `appgw-ssl-certificate`) are kept as they are.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

use crate::annotations::IngressAnnotations;
use crate::constants::PFX_PASSPHRASE;
use crate::event_reasons::{ACTION_BUILD, REASON_SECRET_NOT_FOUND};
use crate::recorder::IngressNotice;

use super::builder::BuildContext;
use super::document::{SslCertificate, SslCertificateProperties};
use super::identifier::ChildKind;
use super::ingress_rules::tls_secret_names;

/// Name of the TLS secret serving `host` in `ingress`.
///
/// A TLS block listing the host wins; otherwise a block without hosts is the fallback.
/// `None` as host only matches the fallback.
#[must_use]
pub fn tls_secret_for_host(ingress: &Ingress, host: Option<&str>) -> Option<String> {
    let tls = ingress.spec.as_ref().and_then(|s| s.tls.as_ref())?;
    let mut fallback = None;
    for block in tls {
        let Some(secret) = block.secret_name.as_ref().filter(|s| !s.is_empty()) else {
            continue;
        };
        let hosts = block.hosts.as_deref().unwrap_or_default();
        if hosts.iter().all(String::is_empty) {
            fallback.get_or_insert_with(|| secret.clone());
        } else if let Some(host) = host {
            if hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
                return Some(secret.clone());
            }
        }
    }
    fallback
}

/// Certificate a listener for `host` should terminate TLS with, if any.
///
/// `appgw-ssl-certificate` names a certificate already on the gateway and takes
/// precedence over the Ingress TLS blocks.
#[must_use]
pub fn listener_certificate(
    ctx: &BuildContext<'_>,
    ingress: &Ingress,
    annotations: &IngressAnnotations,
    host: Option<&str>,
) -> Option<String> {
    if let Some(name) = annotations.appgw_ssl_certificate.as_ref() {
        return Some(name.clone());
    }
    let namespace = ingress.namespace().unwrap_or_default();
    let secret = tls_secret_for_host(ingress, host)?;
    ctx.snapshot
        .certificate(&namespace, &secret)
        .map(|_| ctx.namer.ssl_certificate_name(&namespace, &secret))
}

/// Whether `name` is a certificate this controller generates.
fn is_generated(ctx: &BuildContext<'_>, name: &str) -> bool {
    name.starts_with(&format!("{}cert-", ctx.namer.prefix()))
}

/// SSL certificates for the new document.
///
/// Secrets without a converted PFX are reported once per Ingress and secret.
pub fn ssl_certificates(
    ctx: &BuildContext<'_>,
    notices: &mut Vec<IngressNotice>,
) -> Vec<SslCertificate> {
    let mut certificates: BTreeMap<String, SslCertificate> = ctx
        .existing
        .properties
        .ssl_certificates
        .iter()
        .filter(|cert| !is_generated(ctx, &cert.name))
        .map(|cert| (cert.name.clone(), cert.clone()))
        .collect();

    for ingress in ctx.ingresses {
        let namespace = ingress.namespace().unwrap_or_default();
        for secret in tls_secret_names(ingress) {
            let Some(pfx) = ctx.snapshot.certificate(&namespace, &secret) else {
                notices.push(IngressNotice::new(
                    ingress,
                    REASON_SECRET_NOT_FOUND,
                    ACTION_BUILD,
                    format!("Unable to find a usable certificate in secret {namespace}/{secret}"),
                ));
                continue;
            };
            let name = ctx.namer.ssl_certificate_name(&namespace, &secret);
            if certificates.contains_key(&name) {
                continue;
            }
            debug!(certificate = %name, ingress = %ingress.name_any(), "Installing TLS secret");
            certificates.insert(
                name.clone(),
                SslCertificate::new(
                    ctx.namer.child_id(ChildKind::SslCertificates, &name),
                    name,
                    SslCertificateProperties {
                        data: Some(STANDARD.encode(pfx)),
                        password: Some(PFX_PASSPHRASE.to_string()),
                        ..Default::default()
                    },
                ),
            );
        }
    }

    certificates.into_values().collect()
}
