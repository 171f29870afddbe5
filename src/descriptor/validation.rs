// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Deployment descriptor validation

use crate::descriptor::{Descriptor, ResourceSpec};
use crate::pipeline::ValidationResult;

/// Names that suggest an env entry carries credential material
const SECRET_HINTS: [&str; 4] = ["PASSWORD", "TOKEN", "SECRET", "KEY"];

/// Deployment descriptor validator
pub struct DescriptorValidator;

impl DescriptorValidator {
    /// Validate a descriptor
    pub fn validate(descriptor: &Descriptor) -> ValidationResult {
        let mut result = ValidationResult::new();

        if descriptor.name.trim().is_empty() {
            result.add_error("Descriptor name is empty");
        }

        Self::validate_image(descriptor, &mut result);
        Self::validate_replicas(descriptor, &mut result);
        Self::validate_ports(descriptor, &mut result);
        Self::validate_resources(descriptor, &mut result);
        Self::validate_env(descriptor, &mut result);

        result
    }

    fn validate_image(descriptor: &Descriptor, result: &mut ValidationResult) {
        let image = descriptor.image.trim();

        if image.is_empty() {
            result.add_error("Image reference is empty");
            return;
        }

        // Tag detection must ignore registry ports (host:5000/img).
        let tag = image.rsplit('/').next().and_then(|last| {
            last.split_once(':').map(|(_, tag)| tag)
        });

        match tag {
            None => result.add_warning(&format!(
                "Image '{}' has no tag; the scheduler will default to 'latest'",
                image
            )),
            Some("latest") => result.add_warning(&format!(
                "Image '{}' uses the 'latest' tag; deployments will not be reproducible",
                image
            )),
            Some(_) => {}
        }
    }

    fn validate_replicas(descriptor: &Descriptor, result: &mut ValidationResult) {
        if descriptor.replicas == 0 {
            result.add_error("Replica count is 0; the unit would never be scheduled");
        }
    }

    fn validate_ports(descriptor: &Descriptor, result: &mut ValidationResult) {
        let mut seen = std::collections::HashSet::new();

        for spec in &descriptor.ports {
            for port in std::iter::once(spec.port).chain(spec.target_port) {
                if port == 0 || port > 65535 {
                    result.add_error(&format!("Port {} is out of range 1-65535", port));
                }
            }

            if !seen.insert(spec.port) {
                result.add_error(&format!("Port {} is declared more than once", spec.port));
            }
        }
    }

    fn validate_resources(descriptor: &Descriptor, result: &mut ValidationResult) {
        let requests = descriptor.resources.requests.as_ref();
        let limits = descriptor.resources.limits.as_ref();

        for (label, spec) in [("requests", requests), ("limits", limits)] {
            if let Some(spec) = spec {
                Self::validate_quantities(label, spec, result);
            }
        }

        if let (Some(req), Some(lim)) = (requests, limits) {
            if let (Some(r), Some(l)) = (
                req.cpu.as_deref().and_then(parse_cpu),
                lim.cpu.as_deref().and_then(parse_cpu),
            ) {
                if r > l {
                    result.add_error(&format!(
                        "CPU request {}m exceeds limit {}m",
                        r, l
                    ));
                }
            }

            if let (Some(r), Some(l)) = (
                req.memory.as_deref().and_then(parse_memory),
                lim.memory.as_deref().and_then(parse_memory),
            ) {
                if r > l {
                    result.add_error(&format!(
                        "Memory request {} bytes exceeds limit {} bytes",
                        r, l
                    ));
                }
            }
        }
    }

    fn validate_quantities(label: &str, spec: &ResourceSpec, result: &mut ValidationResult) {
        if let Some(cpu) = &spec.cpu {
            if parse_cpu(cpu).is_none() {
                result.add_error(&format!(
                    "{}: CPU quantity '{}' is not cores or millicores",
                    label, cpu
                ));
            }
        }

        if let Some(memory) = &spec.memory {
            if parse_memory(memory).is_none() {
                result.add_error(&format!(
                    "{}: memory quantity '{}' is not bytes or Ki/Mi/Gi/Ti",
                    label, memory
                ));
            }
        }
    }

    fn validate_env(descriptor: &Descriptor, result: &mut ValidationResult) {
        for entry in &descriptor.env {
            if entry.name.trim().is_empty() {
                result.add_error("An env entry has an empty name");
            }

            match (&entry.value, &entry.secret) {
                (Some(_), Some(_)) => result.add_error(&format!(
                    "Env '{}' has both a literal value and a secret reference",
                    entry.name
                )),
                (None, None) => result.add_error(&format!(
                    "Env '{}' has neither a value nor a secret reference",
                    entry.name
                )),
                (Some(_), None) => {
                    let upper = entry.name.to_uppercase();
                    if SECRET_HINTS.iter().any(|hint| upper.contains(hint)) {
                        result.add_warning(&format!(
                            "Env '{}' looks like a credential but carries a literal value; \
                             use a secret reference",
                            entry.name
                        ));
                    }
                }
                (None, Some(_)) => {}
            }
        }
    }
}

/// Parse a CPU quantity into millicores
fn parse_cpu(quantity: &str) -> Option<u64> {
    let quantity = quantity.trim();

    if let Some(millis) = quantity.strip_suffix('m') {
        return millis.parse::<u64>().ok();
    }

    quantity
        .parse::<f64>()
        .ok()
        .filter(|cores| *cores >= 0.0)
        .map(|cores| (cores * 1000.0) as u64)
}

/// Parse a memory quantity into bytes
fn parse_memory(quantity: &str) -> Option<u64> {
    let re = regex::Regex::new(r"^(\d+)(Ki|Mi|Gi|Ti)?$").ok()?;
    let caps = re.captures(quantity.trim())?;

    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        None => 1,
        Some("Ki") => 1 << 10,
        Some("Mi") => 1 << 20,
        Some("Gi") => 1 << 30,
        Some("Ti") => 1u64 << 40,
        Some(_) => return None,
    };

    value.checked_mul(multiplier)
}
