use std::collections::BTreeMap;

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::hex;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes};
use error_stack::Report;

use crate::errors::{LinkerError, LinkerResult};
use crate::manifest::{ContractType, LinkReference};

const ADDRESS_LENGTH: usize = 20;

/// Deployment capability derived from a contract type's abi and deployment
/// bytecode.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractFactory {
    name: String,
    abi: Option<JsonAbi>,
    bytecode: Bytes,
    link_references: Vec<LinkReference>,
}

impl ContractFactory {
    pub fn from_contract_type(name: &str, contract_type: &ContractType) -> LinkerResult<Self> {
        let deployment_bytecode = contract_type
            .deployment_bytecode
            .as_ref()
            .ok_or_else(|| Report::new(LinkerError::MissingBytecode(name.to_string())))?;
        let raw_bytecode = deployment_bytecode
            .bytecode
            .as_deref()
            .ok_or_else(|| Report::new(LinkerError::MissingBytecode(name.to_string())))?;
        let bytecode = hex::decode(raw_bytecode.trim_start_matches("0x")).map_err(|e| {
            Report::new(LinkerError::MissingBytecode(name.to_string()))
                .attach_printable(format!("invalid contract bytecode: {}", e))
        })?;

        Ok(Self {
            name: name.to_string(),
            abi: contract_type.abi.clone(),
            bytecode: bytecode.into(),
            link_references: deployment_bytecode.link_references.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abi(&self) -> Option<&JsonAbi> {
        self.abi.as_ref()
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    pub fn link_references(&self) -> &[LinkReference] {
        &self.link_references
    }

    /// References with at least one zero-filled placeholder left.
    pub fn unlinked_references(&self) -> Vec<&LinkReference> {
        self.link_references
            .iter()
            .filter(|reference| {
                reference.offsets.iter().any(|offset| {
                    match reference.region(*offset).and_then(|region| self.bytecode.get(region)) {
                        Some(region) => region.iter().all(|byte| *byte == 0),
                        None => true,
                    }
                })
            })
            .collect()
    }

    pub fn needs_bytecode_linking(&self) -> bool {
        !self.unlinked_references().is_empty()
    }

    /// Writes each address at every offset of the link reference with the
    /// same name.
    pub fn link_bytecode(&self, links: &BTreeMap<String, Address>) -> LinkerResult<Self> {
        let mut bytecode = self.bytecode.to_vec();

        for (reference_name, address) in links.iter() {
            let reference = self
                .link_references
                .iter()
                .find(|reference| &reference.name == reference_name)
                .ok_or_else(|| {
                    Report::new(LinkerError::UnknownLinkReference {
                        contract: self.name.clone(),
                        reference: reference_name.clone(),
                    })
                })?;
            if reference.length != ADDRESS_LENGTH {
                return Err(self.invalid_reference(reference_name));
            }
            for offset in reference.offsets.iter() {
                let region = reference
                    .region(*offset)
                    .and_then(|region| bytecode.get_mut(region))
                    .ok_or_else(|| self.invalid_reference(reference_name))?;
                region.copy_from_slice(address.as_slice());
            }
        }

        Ok(Self { bytecode: bytecode.into(), ..self.clone() })
    }

    /// Init code for a deployment transaction: bytecode followed by the abi
    /// encoded constructor arguments.
    pub fn deployment_data(&self, constructor_args: &[DynSolValue]) -> LinkerResult<Bytes> {
        if self.needs_bytecode_linking() {
            return Err(Report::new(LinkerError::UnlinkedDeployment { contract: self.name.clone() })
                .attach_printable(format!(
                    "unlinked libraries: {}",
                    self.unlinked_references()
                        .iter()
                        .map(|r| format!("'{}'", r.name))
                        .collect::<Vec<_>>()
                        .join(",")
                )));
        }

        let mut init_code = self.bytecode.to_vec();
        let constructor = self.abi.as_ref().and_then(|abi| abi.constructor.as_ref());
        let mut encoded_args = match (constructor, self.abi.is_some()) {
            (Some(constructor), _) => constructor.abi_encode_input(constructor_args).map_err(|e| {
                Report::new(LinkerError::ConstructorArguments(self.name.clone()))
                    .attach_printable(format!("failed to encode constructor args: {e}"))
            })?,
            (None, true) if !constructor_args.is_empty() => {
                return Err(Report::new(LinkerError::ConstructorArguments(self.name.clone()))
                    .attach_printable("constructor arguments provided, abi has no constructor"));
            }
            (None, _) => constructor_args.iter().flat_map(|arg| arg.abi_encode()).collect(),
        };
        init_code.append(&mut encoded_args);
        Ok(init_code.into())
    }

    fn invalid_reference(&self, reference: &str) -> Report<LinkerError> {
        Report::new(LinkerError::InvalidLinkReference {
            contract: self.name.clone(),
            reference: reference.to_string(),
        })
    }
}
