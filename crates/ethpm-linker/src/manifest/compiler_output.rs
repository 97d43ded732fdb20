use std::collections::BTreeMap;

use alloy::json_abi::JsonAbi;
use error_stack::Report;

use super::{BytecodeObject, ContractType, LinkReference};
use crate::errors::{ManifestError, ManifestResult};

/// Compiler output in the solc standard-json shape:
/// source path -> contract type name -> compiled asset.
pub type CompilerOutput = BTreeMap<String, BTreeMap<String, RawContractAsset>>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawContractAsset {
    pub abi: JsonAbi,
    pub evm: RawEvmOutput,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvmOutput {
    pub bytecode: RawBytecode,
    #[serde(rename = "deployedBytecode", default, skip_serializing_if = "Option::is_none")]
    pub deployed_bytecode: Option<RawBytecode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBytecode {
    pub object: String,
    /// source file -> library name -> placeholder positions
    #[serde(rename = "linkReferences", default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<RawLinkOffset>>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLinkOffset {
    pub start: usize,
    pub length: usize,
}

/// Finds the source path and compiled asset for a contract type name.
pub fn find_contract<'a>(
    output: &'a CompilerOutput,
    name: &str,
) -> Option<(&'a str, &'a RawContractAsset)> {
    output
        .iter()
        .find_map(|(path, contracts)| contracts.get(name).map(|asset| (path.as_str(), asset)))
}

impl RawContractAsset {
    pub fn to_contract_type(&self, name: &str) -> ManifestResult<ContractType> {
        Ok(ContractType {
            contract_name: None,
            abi: Some(self.abi.clone()),
            deployment_bytecode: Some(self.evm.bytecode.normalize(name)?),
            runtime_bytecode: self
                .evm
                .deployed_bytecode
                .as_ref()
                .map(|bytecode| bytecode.normalize(name))
                .transpose()?,
            natspec: None,
            compiler: None,
        })
    }
}

impl RawBytecode {
    /// Zero-fills every placeholder and regroups the link references by
    /// library name.
    pub fn normalize(&self, contract: &str) -> ManifestResult<BytecodeObject> {
        let mut bytecode = self.object.trim_start_matches("0x").to_string();
        let mut references: BTreeMap<String, LinkReference> = BTreeMap::new();

        for libraries in self.link_references.values() {
            for (library, offsets) in libraries.iter() {
                for offset in offsets.iter() {
                    let end = offset.start.checked_add(offset.length);
                    let (from, to) = match (
                        offset.start.checked_mul(2),
                        end.and_then(|end| end.checked_mul(2)),
                    ) {
                        (Some(from), Some(to)) if to <= bytecode.len() => (from, to),
                        _ => {
                            return Err(Report::new(ManifestError::LinkReferenceOutOfBounds {
                                contract: contract.to_string(),
                                reference: library.clone(),
                            }))
                        }
                    };
                    bytecode.replace_range(from..to, &"0".repeat(to - from));

                    let reference =
                        references.entry(library.clone()).or_insert_with(|| LinkReference {
                            offsets: vec![],
                            length: offset.length,
                            name: library.clone(),
                        });
                    reference.offsets.push(offset.start);
                }
            }
        }

        let link_references = references
            .into_values()
            .map(|mut reference| {
                reference.offsets.sort_unstable();
                reference
            })
            .collect();

        Ok(BytecodeObject {
            bytecode: Some(format!("0x{}", bytecode)),
            link_references,
            link_dependencies: vec![],
        })
    }
}
