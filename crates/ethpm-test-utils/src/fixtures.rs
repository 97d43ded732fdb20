use std::fs;
use std::path::Path;
use std::sync::Arc;

use error_stack::ResultExt;
use ethpm_linker::manifest::builder;
use ethpm_linker::{
    ChainClient, Context, Deployer, InMemoryChain, Manifest, Package, RpcChainClient,
};
use hiro_system_kit::Logger;
use tokio::sync::OnceCell;

use crate::compiler::{
    generate_compiler_output, generate_contract_types, generate_inline_sources, Compiler,
    VyperCompiler,
};
use crate::config::FixtureConfig;
use crate::errors::{FixtureError, FixtureResult};
use crate::sources::discover_sources;

/// Chain client for a test session: the configured dev node, or a fresh
/// in-memory chain.
pub fn w3(config: &FixtureConfig) -> FixtureResult<Arc<dyn ChainClient>> {
    match &config.chain.rpc_url {
        Some(rpc_url) => {
            let client = RpcChainClient::new(rpc_url)
                .change_context(FixtureError::Chain)?
                .with_poll_interval(config.chain.poll_interval())
                .with_receipt_timeout(config.chain.receipt_timeout());
            Ok(Arc::new(client))
        }
        None => Ok(Arc::new(InMemoryChain::new())),
    }
}

/// Compiles every contract source under the configured directory and
/// assembles a validated manifest from the results.
pub fn manifest(
    config: &FixtureConfig,
    compiler: &dyn Compiler,
    ctx: &Context,
) -> FixtureResult<Manifest> {
    let pattern = config.sources_pattern()?;
    let contracts_path = config.contracts_path();
    let all_sources = discover_sources(&contracts_path, &pattern)?;
    ctx.try_log(|logger| {
        info!(
            logger,
            "compiling {} contract sources from {}",
            all_sources.len(),
            contracts_path.display()
        )
    });

    let compiler_output = generate_compiler_output(&all_sources, &config.package_root, compiler)?;
    let composed_inline_sources = generate_inline_sources(&compiler_output, &config.package_root);
    let composed_contract_types = generate_contract_types(&compiler_output);

    let steps = vec![
        builder::package_name(config.package_name.clone()),
        builder::version(config.version.clone()),
        builder::manifest_version(config.manifest_version.clone()),
    ]
    .into_iter()
    .chain(composed_inline_sources)
    .chain(composed_contract_types)
    .chain(std::iter::once(builder::validate()));

    builder::build(Manifest::default(), steps).change_context(FixtureError::Manifest)
}

pub async fn package(
    manifest: Manifest,
    client: Arc<dyn ChainClient>,
    ctx: &Context,
) -> FixtureResult<Package> {
    Package::new(manifest, client, ctx.clone()).await.change_context(FixtureError::Package)
}

pub fn vy_deployer(package: Package) -> Deployer {
    Deployer::new(package)
}

/// Deployer for a precompiled manifest json file.
pub async fn solc_deployer(
    path: &Path,
    client: Arc<dyn ChainClient>,
    ctx: &Context,
) -> FixtureResult<Deployer> {
    let content = fs::read_to_string(path)
        .change_context(FixtureError::Manifest)
        .attach_printable(format!("reading {}", path.display()))?;
    let manifest = Manifest::from_json(&content).change_context(FixtureError::Manifest)?;
    let package = package(manifest, client, ctx).await?;
    Ok(Deployer::new(package))
}

/// Fixtures of one test session, each set up on first use and reused after.
pub struct Session {
    config: FixtureConfig,
    compiler: Box<dyn Compiler>,
    ctx: Context,
    chain: OnceCell<Arc<dyn ChainClient>>,
    manifest: OnceCell<Manifest>,
    package: OnceCell<Package>,
}

impl Session {
    pub fn new(config: FixtureConfig) -> Self {
        let compiler = VyperCompiler::new(config.compiler.program.clone());
        Self {
            config,
            compiler: Box::new(compiler),
            ctx: Context::empty(),
            chain: OnceCell::new(),
            manifest: OnceCell::new(),
            package: OnceCell::new(),
        }
    }

    pub fn with_compiler(self, compiler: impl Compiler + 'static) -> Self {
        Self { compiler: Box::new(compiler), ..self }
    }

    pub fn with_logger(self, logger: Logger) -> Self {
        Self { ctx: Context::new(logger), ..self }
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub async fn chain(&self) -> FixtureResult<Arc<dyn ChainClient>> {
        self.chain.get_or_try_init(|| async { w3(&self.config) }).await.cloned()
    }

    pub async fn manifest(&self) -> FixtureResult<&Manifest> {
        self.manifest
            .get_or_try_init(|| async { manifest(&self.config, self.compiler.as_ref(), &self.ctx) })
            .await
    }

    pub async fn package(&self) -> FixtureResult<&Package> {
        self.package
            .get_or_try_init(|| async {
                let manifest = self.manifest().await?.clone();
                let client = self.chain().await?;
                package(manifest, client, &self.ctx).await
            })
            .await
    }

    pub async fn vy_deployer(&self) -> FixtureResult<Deployer> {
        Ok(vy_deployer(self.package().await?.clone()))
    }

    pub async fn solc_deployer(&self, path: &Path) -> FixtureResult<Deployer> {
        solc_deployer(path, self.chain().await?, &self.ctx).await
    }
}
