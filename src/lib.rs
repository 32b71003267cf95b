// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # appgw-ingress - Application Gateway Ingress Controller
//!
//! A Kubernetes controller that watches Ingresses and the objects they point at, and keeps
//! a single cloud-managed layer-7 Application Gateway programmed to match them.
//!
//! ## Overview
//!
//! The controller is a reconciliation engine built around one pipeline:
//!
//! ```text
//! informers → cache + admission → event bus → worker (coalesce, rate limit)
//!     → reconciler: GET gateway → prune → build → diff → PUT → Ingress status
//! ```
//!
//! Every cycle regenerates the full gateway document from the cluster snapshot. A
//! byte-level cache of the last applied document (with etags stripped) keeps the
//! controller from re-sending unchanged configuration. In brownfield mode the gateway is
//! shared with other tenants, and `AzureIngressProhibitedTarget` resources mark the parts
//! of the live document that must survive untouched.
//!
//! ## Modules
//!
//! - [`cache`] - Informer stores, event admission and the TLS secret store
//! - [`events`] - The bounded event bus between informers and worker
//! - [`worker`] - Single consumer with coalescing and pacing
//! - [`reconciler`] - One reconcile cycle from live gateway to Ingress status
//! - [`appgw`] - Gateway document model and the configuration builder
//! - [`brownfield`] - Prohibited targets, partition and merge of unmanaged resources
//! - [`diff`] - Idempotent apply against the gateway
//! - [`azure`] - Azure Resource Manager client
//! - [`status`] - Ingress load-balancer status
//! - [`crd`] - Custom resources read by the controller
//!
//! ## Example
//!
//! ```rust,no_run
//! use appgw_ingress::crd::{AzureIngressProhibitedTarget, AzureIngressProhibitedTargetSpec};
//!
//! // Keep the controller away from every path of legacy.example.com
//! let target = AzureIngressProhibitedTarget::new(
//!     "legacy",
//!     AzureIngressProhibitedTargetSpec {
//!         ip: None,
//!         hostname: Some("legacy.example.com".to_string()),
//!         port: None,
//!         paths: Vec::new(),
//!     },
//! );
//! ```

pub mod annotations;
pub mod appgw;
pub mod azure;
pub mod brownfield;
pub mod cache;
pub mod config;
pub mod constants;
pub mod controller_errors;
pub mod crd;
pub mod diff;
pub mod event_reasons;
pub mod events;
pub mod http_errors;
pub mod http_server;
pub mod metrics;
pub mod pruner;
pub mod reconciler;
pub mod recorder;
pub mod status;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_fixtures;
