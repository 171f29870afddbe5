// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Deployment descriptors
//!
//! A descriptor describes one deployable unit: container image, ports,
//! resource requests/limits, secret references, replica count. The
//! scheduler consuming it lives elsewhere; stagehand only validates.

mod validation;

pub use validation::DescriptorValidator;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::StagehandError;

/// One deployable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    /// Unit name
    pub name: String,

    /// Container image reference
    pub image: String,

    /// Desired replica count
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Exposed ports
    #[serde(default)]
    pub ports: Vec<PortSpec>,

    /// Resource requests and limits
    #[serde(default)]
    pub resources: Resources,

    /// Environment entries
    #[serde(default)]
    pub env: Vec<EnvEntry>,

    /// Labels attached to the unit
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_replicas() -> u32 {
    1
}

impl Descriptor {
    /// Load a descriptor from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, StagehandError> {
        if !path.exists() {
            return Err(StagehandError::DescriptorNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StagehandError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            }
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(Into::into),
            _ => serde_yaml::from_str(&content).map_err(Into::into),
        }
    }

    /// Parse a descriptor from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, StagehandError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }
}

/// Exposed port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    /// Service port
    pub port: u32,

    /// Container port, when different from the service port
    #[serde(default)]
    pub target_port: Option<u32>,

    /// Protocol
    #[serde(default)]
    pub protocol: Protocol,
}

/// Port protocol
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Resource requests and limits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    /// Minimum guaranteed resources
    #[serde(default)]
    pub requests: Option<ResourceSpec>,

    /// Hard ceilings
    #[serde(default)]
    pub limits: Option<ResourceSpec>,
}

/// One resource quantity pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// CPU in cores ("0.5") or millicores ("500m")
    #[serde(default)]
    pub cpu: Option<String>,

    /// Memory in bytes with binary suffix ("512Mi", "2Gi")
    #[serde(default)]
    pub memory: Option<String>,
}

/// One environment entry: a literal value or a secret reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvEntry {
    /// Variable name
    pub name: String,

    /// Literal value
    #[serde(default)]
    pub value: Option<String>,

    /// Secret reference (name + key); the value never appears here
    #[serde(default)]
    pub secret: Option<SecretRef>,
}

/// Reference to a secret held by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRef {
    /// Secret object name
    pub name: String,

    /// Key within the secret
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let yaml = r#"
name: "order-service"
image: "registry.example.com/order-service:1.4.2"
replicas: 3
ports:
  - port: 8080
resources:
  requests:
    cpu: "250m"
    memory: "256Mi"
  limits:
    cpu: "500m"
    memory: "512Mi"
env:
  - name: "DB_HOST"
    value: "postgres.internal"
  - name: "DB_PASSWORD"
    secret:
      name: "order-db"
      key: "password"
"#;

        let descriptor = Descriptor::from_yaml(yaml).unwrap();
        assert_eq!(descriptor.name, "order-service");
        assert_eq!(descriptor.replicas, 3);
        assert_eq!(descriptor.ports[0].port, 8080);
        assert_eq!(descriptor.ports[0].protocol, Protocol::Tcp);
        assert!(descriptor.env[1].secret.is_some());
    }

    #[test]
    fn test_replicas_default_to_one() {
        let yaml = r#"
name: "svc"
image: "svc:1.0"
"#;
        let descriptor = Descriptor::from_yaml(yaml).unwrap();
        assert_eq!(descriptor.replicas, 1);
    }
}
