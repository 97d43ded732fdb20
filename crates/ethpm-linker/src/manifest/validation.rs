use alloy::hex;
use alloy::primitives::Address;
use error_stack::Report;

use super::{BytecodeObject, Manifest, MANIFEST_VERSION};
use crate::errors::{ManifestError, ManifestResult};
use crate::uri::BlockUri;

pub(super) fn validate_manifest(manifest: &Manifest) -> ManifestResult<()> {
    if manifest.manifest_version != MANIFEST_VERSION {
        return Err(Report::new(ManifestError::UnsupportedVersion(
            manifest.manifest_version.clone(),
        )));
    }
    if !is_valid_package_name(&manifest.package_name) {
        return Err(Report::new(ManifestError::InvalidPackageName(manifest.package_name.clone())));
    }
    if manifest.version.trim().is_empty() {
        return Err(Report::new(ManifestError::EmptyVersion));
    }

    for (name, contract_type) in manifest.contract_types.iter() {
        if !is_valid_contract_type_name(name) {
            return Err(Report::new(ManifestError::InvalidContractTypeName(name.clone())));
        }
        let bytecodes = [&contract_type.deployment_bytecode, &contract_type.runtime_bytecode];
        for bytecode in bytecodes.into_iter().flatten() {
            validate_bytecode_object(name, bytecode)?;
        }
    }

    for (uri, deployments) in manifest.deployments.iter() {
        BlockUri::parse(uri)?;
        for (deployment_name, deployment) in deployments.iter() {
            if !manifest.contract_types.contains_key(&deployment.contract_type) {
                return Err(Report::new(ManifestError::UndeclaredContractType {
                    deployment: deployment_name.clone(),
                    contract_type: deployment.contract_type.clone(),
                }));
            }
            if deployment.address.parse::<Address>().is_err() {
                return Err(Report::new(ManifestError::InvalidAddress {
                    deployment: deployment_name.clone(),
                    address: deployment.address.clone(),
                }));
            }
        }
    }
    Ok(())
}

/// `^[a-z][-a-z0-9]{0,255}$`
pub fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    name.len() <= 256
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// `^[a-zA-Z][-a-zA-Z0-9_]{0,255}$`
pub fn is_valid_contract_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 256 && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_bytecode_object(contract: &str, object: &BytecodeObject) -> ManifestResult<()> {
    let Some(bytecode) = &object.bytecode else {
        return Ok(());
    };
    let bytes = hex::decode(bytecode.trim_start_matches("0x")).map_err(|e| {
        Report::new(ManifestError::InvalidBytecode { contract: contract.to_string() })
            .attach_printable(e.to_string())
    })?;

    for reference in object.link_references.iter() {
        let out_of_bounds = reference.offsets.iter().any(|offset| {
            reference.region(*offset).map_or(true, |region| region.end > bytes.len())
        });
        if out_of_bounds {
            return Err(Report::new(ManifestError::LinkReferenceOutOfBounds {
                contract: contract.to_string(),
                reference: reference.name.clone(),
            }));
        }
    }
    Ok(())
}
