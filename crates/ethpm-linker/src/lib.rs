#[macro_use]
extern crate hiro_system_kit;

#[macro_use]
extern crate serde_derive;

pub mod chain;
pub mod context;
pub mod deployer;
pub mod errors;
pub mod factory;
pub mod linker;
pub mod manifest;
pub mod package;
pub mod uri;
pub mod utils;

#[cfg(test)]
mod tests;

pub use chain::{ChainClient, DeploymentReceipt, InMemoryChain, RpcChainClient};
pub use context::Context;
pub use deployer::Deployer;
pub use errors::{ChainError, LinkerError, LinkerResult, ManifestError, ManifestResult};
pub use factory::ContractFactory;
pub use linker::{deploy, link, Deploy, Link, Linked, Linker, Operation};
pub use manifest::Manifest;
pub use package::Package;
