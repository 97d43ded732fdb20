//! ethPM v2 package manifests.
//!
//! A [`Manifest`] is treated as a persistent value: every `with_*` method
//! leaves `self` untouched and returns an updated copy.

use std::collections::BTreeMap;
use std::ops::Range;

use alloy::json_abi::JsonAbi;
use alloy::primitives::B256;
use error_stack::{Report, ResultExt};

use crate::errors::{ManifestError, ManifestResult};
use crate::uri::BlockUri;

pub mod builder;
pub mod compiler_output;
mod validation;

pub const MANIFEST_VERSION: &str = "2";

/// Deployment records of one chain, keyed by deployment name.
pub type Deployments = BTreeMap<String, Deployment>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub manifest_version: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// Inline sources keyed by their `./`-relative path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contract_types: BTreeMap<String, ContractType>,
    /// Deployment records keyed by the block uri they were observed at
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployments: BTreeMap<String, Deployments>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build_dependencies: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<JsonAbi>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_bytecode: Option<BytecodeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_bytecode: Option<BytecodeObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natspec: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<serde_json::Value>,
}

/// Hex encoded bytecode where every link reference region is zero filled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_references: Vec<LinkReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_dependencies: Vec<LinkValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub offsets: Vec<usize>,
    pub length: usize,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkValue {
    pub offsets: Vec<usize>,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub contract_type: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_bytecode: Option<BytecodeObject>,
}

impl Manifest {
    pub fn from_json(json: &str) -> ManifestResult<Self> {
        serde_json::from_str(json)
            .change_context(ManifestError::Json)
            .attach_printable("failed to decode package manifest")
    }

    pub fn to_json(&self) -> ManifestResult<String> {
        serde_json::to_string(self)
            .change_context(ManifestError::Json)
            .attach_printable("failed to encode package manifest")
    }

    pub fn contract_type(&self, name: &str) -> Option<&ContractType> {
        self.contract_types.get(name)
    }

    /// Block uris whose deployments claim the chain with the given genesis
    /// hash. Whether their blocks exist on a particular node is up to the
    /// caller to check.
    pub fn block_uris_on_chain(&self, genesis_hash: &B256) -> Vec<(&str, BlockUri)> {
        self.deployments
            .keys()
            .filter_map(|uri| BlockUri::parse(uri).ok().map(|block_uri| (uri.as_str(), block_uri)))
            .filter(|(_, block_uri)| block_uri.is_on_chain(genesis_hash))
            .collect()
    }

    pub fn with_package_name(&self, package_name: impl Into<String>) -> Self {
        Self { package_name: package_name.into(), ..self.clone() }
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self { version: version.into(), ..self.clone() }
    }

    pub fn with_manifest_version(&self, manifest_version: impl Into<String>) -> Self {
        Self { manifest_version: manifest_version.into(), ..self.clone() }
    }

    pub fn with_source(&self, path: impl Into<String>, source: impl Into<String>) -> Self {
        let mut sources = self.sources.clone();
        sources.insert(path.into(), source.into());
        Self { sources, ..self.clone() }
    }

    pub fn with_contract_type(&self, name: impl Into<String>, contract_type: ContractType) -> Self {
        let mut contract_types = self.contract_types.clone();
        contract_types.insert(name.into(), contract_type);
        Self { contract_types, ..self.clone() }
    }

    /// Replaces `contract_types.<name>.deployment_bytecode.bytecode`, creating
    /// the intermediate entries when they are missing.
    pub fn with_deployment_bytecode(&self, name: &str, bytecode: impl Into<String>) -> Self {
        let mut contract_type = self.contract_types.get(name).cloned().unwrap_or_default();
        let mut deployment_bytecode = contract_type.deployment_bytecode.unwrap_or_default();
        deployment_bytecode.bytecode = Some(bytecode.into());
        contract_type.deployment_bytecode = Some(deployment_bytecode);
        self.with_contract_type(name, contract_type)
    }

    /// Stores `deployments` under `block_uri`, dropping `replaced_uri` if given.
    pub fn with_chain_deployments(
        &self,
        replaced_uri: Option<&str>,
        block_uri: impl Into<String>,
        deployments: Deployments,
    ) -> Self {
        let mut all_deployments = self.deployments.clone();
        if let Some(replaced_uri) = replaced_uri {
            all_deployments.remove(replaced_uri);
        }
        all_deployments.insert(block_uri.into(), deployments);
        Self { deployments: all_deployments, ..self.clone() }
    }

    pub fn validate(&self) -> ManifestResult<()> {
        validation::validate_manifest(self)
    }
}

impl LinkReference {
    /// Byte range the reference covers at `offset`, `None` when it overflows.
    pub fn region(&self, offset: usize) -> Option<Range<usize>> {
        offset.checked_add(self.length).map(|end| offset..end)
    }
}

impl std::str::FromStr for Manifest {
    type Err = Report<ManifestError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Manifest::from_json(s)
    }
}
