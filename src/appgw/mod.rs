// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Application Gateway configuration generation.
//!
//! [`document`] models the ARM resource, [`identifier`] names its children and
//! [`builder::ConfigBuilder`] produces a complete document from the cluster state. The
//! remaining modules are the individual build stages.

pub mod backend_pools;
pub mod builder;
pub mod certificates;
pub mod document;
pub mod frontend;
pub mod http_settings;
pub mod identifier;
pub mod ingress_rules;
pub mod probes;
pub mod redirects;
pub mod rewrites;
pub mod routing_rules;
pub mod validators;

pub use builder::{BuildContext, BuildOutput, ConfigBuilder};
pub use document::ApplicationGateway;
pub use identifier::ResourceNamer;
