// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared-gateway ("brownfield") support.
//!
//! When brownfield mode is enabled the controller shares the gateway with
//! configuration it does not own. Ownership is expressed with
//! `AzureIngressProhibitedTarget` and `AzureIngressAllowedTarget` resources:
//!
//! 1. [`targets`] turns those resources into a [`TargetPolicy`].
//! 2. [`ingress`] strips prohibited paths from each Ingress before the build.
//! 3. [`partition`] extracts the unmanaged part of the live gateway.
//! 4. [`merge`] folds it back into the generated document.

pub mod ingress;
pub mod merge;
pub mod partition;
pub mod targets;

pub use ingress::prune_prohibited_rules;
pub use merge::merge_unmanaged;
pub use partition::{partition, UnmanagedResources};
pub use targets::{Target, TargetPolicy};
