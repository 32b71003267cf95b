// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates Kubernetes CRD YAML files from Rust types defined in src/crd.rs.
//! This keeps the YAML files in deploy/crds/ in sync with the Rust code.
//!
//! Usage:
//!   cargo run --bin crdgen
//!
//! Generated files will be written to deploy/crds/ with proper headers.

use appgw_ingress::crd::{
    AzureApplicationGatewayBackendPool, AzureApplicationGatewayInstanceUpdateStatus,
    AzureApplicationGatewayLoadDistributionPolicy, AzureApplicationGatewayRewrite,
    AzureIngressAllowedTarget, AzureIngressProhibitedTarget,
};
use kube::CustomResourceExt;
use serde_json::Value;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<AzureIngressProhibitedTarget>("azureingressprohibitedtargets.crd.yaml", output_dir)?;
    generate_crd::<AzureIngressAllowedTarget>("azureingressallowedtargets.crd.yaml", output_dir)?;
    generate_crd::<AzureApplicationGatewayBackendPool>(
        "azureapplicationgatewaybackendpools.crd.yaml",
        output_dir,
    )?;
    generate_crd::<AzureApplicationGatewayLoadDistributionPolicy>(
        "azureapplicationgatewayloaddistributionpolicies.crd.yaml",
        output_dir,
    )?;
    generate_crd::<AzureApplicationGatewayRewrite>(
        "azureapplicationgatewayrewrites.crd.yaml",
        output_dir,
    )?;
    generate_crd::<AzureApplicationGatewayInstanceUpdateStatus>(
        "azureapplicationgatewayinstanceupdatestatuses.crd.yaml",
        output_dir,
    )?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let crd = T::crd();

    let mut crd_json: Value = serde_json::to_value(&crd)?;

    // Single served version per kind; mark it as storage explicitly
    if let Some(versions) = crd_json["spec"]["versions"].as_array_mut() {
        for version in versions.iter_mut() {
            version["served"] = Value::Bool(true);
            version["storage"] = Value::Bool(true);
        }
    }

    let yaml = serde_yaml::to_string(&crd_json)?;

    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
