#[macro_use]
extern crate hiro_system_kit;

#[macro_use]
extern crate serde_derive;

pub mod compiler;
pub mod config;
pub mod errors;
pub mod fixtures;
pub mod sources;

pub use compiler::{Compiler, VyperCompiler};
pub use config::FixtureConfig;
pub use errors::{FixtureError, FixtureResult};
pub use fixtures::{manifest, package, solc_deployer, vy_deployer, w3, Session};
