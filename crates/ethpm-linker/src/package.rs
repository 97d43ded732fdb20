use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use error_stack::{Report, ResultExt};

use crate::chain::ChainClient;
use crate::context::Context;
use crate::errors::{LinkerError, LinkerResult, ManifestError, ManifestResult};
use crate::factory::ContractFactory;
use crate::manifest::{Deployments, Manifest};

/// A manifest bound to a chain client.
///
/// A package never changes; deploying or linking produces a new package that
/// wraps a new manifest and shares the same client.
#[derive(Clone)]
pub struct Package {
    manifest: Arc<Manifest>,
    client: Arc<dyn ChainClient>,
    genesis_hash: B256,
    /// Block uri of the deployments found on the bound chain
    deployments_uri: Option<String>,
    ctx: Context,
}

impl Package {
    /// Validates `manifest` and binds it to `client`, whose genesis hash is
    /// queried once and reused by every derived package.
    ///
    /// Deployments only count for this chain when their block uri shares the
    /// genesis hash and its block is known to the client.
    pub async fn new(
        manifest: Manifest,
        client: Arc<dyn ChainClient>,
        ctx: Context,
    ) -> LinkerResult<Self> {
        manifest.validate().change_context(LinkerError::Manifest)?;
        let genesis_hash = client
            .genesis_hash()
            .await
            .change_context(LinkerError::Chain)
            .attach_printable("resolving the chain a package is bound to")?;

        let mut deployments_uri = None;
        for (uri, block_uri) in manifest.block_uris_on_chain(&genesis_hash) {
            let found = client
                .has_block(block_uri.block_hash)
                .await
                .change_context(LinkerError::Chain)
                .attach_printable(format!("looking up deployments at {}", uri))?;
            if found {
                deployments_uri = Some(uri.to_string());
                break;
            }
            ctx.try_log(|logger| {
                info!(logger, "ignoring deployments at {}, block not found on chain", uri)
            });
        }

        Ok(Self { manifest: Arc::new(manifest), client, genesis_hash, deployments_uri, ctx })
    }

    /// Same client and chain, different manifest.
    pub fn with_manifest(&self, manifest: Manifest) -> Self {
        Self { manifest: Arc::new(manifest), ..self.clone() }
    }

    /// Same client and chain, with this chain's deployments now stored under
    /// `deployments_uri`.
    pub fn with_deployments_at(&self, manifest: Manifest, deployments_uri: String) -> Self {
        Self {
            manifest: Arc::new(manifest),
            deployments_uri: Some(deployments_uri),
            ..self.clone()
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn genesis_hash(&self) -> B256 {
        self.genesis_hash
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn name(&self) -> &str {
        &self.manifest.package_name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Deployments recorded for the chain this package is bound to.
    pub fn deployments(&self) -> Deployments {
        self.chain_deployments().cloned().unwrap_or_default()
    }

    /// Block uri the current chain's deployments are stored under, if any.
    pub fn deployments_uri(&self) -> Option<&str> {
        self.deployments_uri.as_deref()
    }

    pub fn deployment_address(&self, name: &str) -> Option<ManifestResult<Address>> {
        self.chain_deployments().and_then(|deployments| deployments.get(name)).map(|deployment| {
            deployment.address.parse::<Address>().map_err(|e| {
                Report::new(ManifestError::InvalidAddress {
                    deployment: name.to_string(),
                    address: deployment.address.clone(),
                })
                .attach_printable(e.to_string())
            })
        })
    }

    fn chain_deployments(&self) -> Option<&Deployments> {
        self.deployments_uri.as_ref().and_then(|uri| self.manifest.deployments.get(uri))
    }

    pub fn contract_factory(&self, name: &str) -> LinkerResult<ContractFactory> {
        let contract_type = self
            .manifest
            .contract_type(name)
            .ok_or_else(|| Report::new(LinkerError::UnknownContractType(name.to_string())))?;
        ContractFactory::from_contract_type(name, contract_type)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.manifest.package_name)
            .field("version", &self.manifest.version)
            .field("genesis_hash", &self.genesis_hash)
            .field("deployments_uri", &self.deployments_uri)
            .field("client", &self.client)
            .finish()
    }
}
