use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::hex;
use alloy::primitives::{address, Address};

use super::{escrow_manifest, escrow_package, RejectingChain};
use crate::chain::{ChainClient, InMemoryChain};
use crate::context::Context;
use crate::errors::{ChainError, LinkerError};
use crate::linker::{deploy, link, Linked, Linker, Operation};
use crate::package::Package;
use crate::uri::BlockUri;
use crate::utils::get_deployment_address;

const RECIPIENT: Address = address!("0x00000000000000000000000000000000000000aa");

fn deployment_bytecode(package: &Package, contract: &str) -> String {
    package.manifest().contract_types[contract]
        .deployment_bytecode
        .as_ref()
        .and_then(|bytecode| bytecode.bytecode.clone())
        .unwrap()
}

#[tokio::test]
async fn test_deploy_submits_one_transaction_and_records_address() {
    let (package, chain) = escrow_package().await;

    let Linked { package: deployed, address } =
        deploy("SafeSendLib", vec![]).apply(package.clone().into()).await.unwrap();

    let address = address.unwrap();
    assert_eq!(chain.transaction_count().await, 1);
    assert_eq!(address, chain.sender().create(0));
    assert_eq!(deployed.deployment_address("SafeSendLib").unwrap().unwrap(), address);

    let deployments = deployed.deployments();
    let deployment = &deployments["SafeSendLib"];
    assert_eq!(deployment.contract_type, "SafeSendLib");
    assert_eq!(deployment.address, address.to_checksum(None));
    assert!(deployment.transaction.is_some());

    // the input package is left untouched
    assert!(package.deployments().is_empty());
    assert_eq!(package.manifest(), &escrow_manifest());
}

#[tokio::test]
async fn test_deployment_is_keyed_by_latest_block_uri() {
    let (package, chain) = escrow_package().await;
    let deployed = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap().package;

    let uri: BlockUri = deployed.deployments_uri().unwrap().parse().unwrap();
    assert_eq!(uri.chain_id, chain.genesis_hash().await.unwrap());
    assert_eq!(uri.block_hash, chain.block_hash(1).await.unwrap());
}

#[tokio::test]
async fn test_deploy_short_circuits_when_already_deployed() {
    let (package, chain) = escrow_package().await;
    let first = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap();
    let second = deploy("SafeSendLib", vec![]).apply(first.package.clone().into()).await.unwrap();

    assert_eq!(chain.transaction_count().await, 1);
    assert_eq!(first.address, second.address);
    assert_eq!(first.package.manifest(), second.package.manifest());
}

#[tokio::test]
async fn test_later_deployments_move_to_newest_block_uri() {
    let (package, _chain) = escrow_package().await;
    let pipeline =
        Linker::default().then(deploy("SafeSendLib", vec![])).then(deploy("Owned", vec![]));
    let Linked { package: deployed, .. } = pipeline.run(package).await.unwrap();

    // one chain, one deployments entry holding both records
    assert_eq!(deployed.manifest().deployments.len(), 1);
    let deployments = deployed.deployments();
    assert!(deployments.contains_key("SafeSendLib"));
    assert!(deployments.contains_key("Owned"));
}

#[tokio::test]
async fn test_link_requires_deployed_dependency() {
    let (package, chain) = escrow_package().await;

    let error = link("Escrow", "SafeSendLib").apply(package.into()).await.unwrap_err();

    assert_eq!(
        error.current_context(),
        &LinkerError::MissingDependency {
            contract: "Escrow".to_string(),
            dependency: "SafeSendLib".to_string()
        }
    );
    assert_eq!(chain.transaction_count().await, 0);
}

#[tokio::test]
async fn test_link_rejects_contract_without_link_references() {
    let (package, _chain) = escrow_package().await;
    let deployed = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap();

    let error = link("Owned", "SafeSendLib").apply(deployed).await.unwrap_err();

    assert_eq!(
        error.current_context(),
        &LinkerError::NotLinkable { contract: "Owned".to_string() }
    );
}

#[tokio::test]
async fn test_link_rejects_already_linked_contract() {
    let (package, _chain) = escrow_package().await;
    let pipeline = crate::linker![deploy("SafeSendLib", vec![]), link("Escrow", "SafeSendLib")];
    let linked = pipeline.run(package).await.unwrap();

    let error = link("Escrow", "SafeSendLib").apply(linked).await.unwrap_err();
    assert_eq!(
        error.current_context(),
        &LinkerError::NotLinkable { contract: "Escrow".to_string() }
    );
}

#[tokio::test]
async fn test_link_substitutes_dependency_address() {
    let (package, _chain) = escrow_package().await;
    let deployed = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap();
    let library = deployed.address.unwrap();

    let linked = link("Escrow", "SafeSendLib").apply(deployed.clone()).await.unwrap();

    let before = deployment_bytecode(&deployed.package, "Escrow");
    let after = deployment_bytecode(&linked.package, "Escrow");
    assert_ne!(before, after);
    assert_eq!(after, format!("0x60606073{}60405260", hex::encode(library)));
    assert!(linked.address.is_none());
    assert!(!linked.package.contract_factory("Escrow").unwrap().needs_bytecode_linking());
}

#[tokio::test]
async fn test_link_leaves_runtime_bytecode_unlinked() {
    let (package, _chain) = escrow_package().await;
    let pipeline = crate::linker![deploy("SafeSendLib", vec![]), link("Escrow", "SafeSendLib")];
    let linked = pipeline.run(package.clone()).await.unwrap();

    assert_eq!(
        linked.package.manifest().contract_types["Escrow"].runtime_bytecode,
        package.manifest().contract_types["Escrow"].runtime_bytecode
    );
}

#[tokio::test]
async fn test_pipeline_matches_manual_sequencing() {
    let (package, chain) = escrow_package().await;
    let (manual_package, manual_chain) = escrow_package().await;

    let pipeline = crate::linker![
        deploy("SafeSendLib", vec![]),
        deploy("Owned", vec![]),
        link("Escrow", "SafeSendLib"),
    ];
    let piped = pipeline.run(package).await.unwrap();

    let step = deploy("SafeSendLib", vec![]).apply(manual_package.into()).await.unwrap();
    let step = deploy("Owned", vec![]).apply(step).await.unwrap();
    let manual = link("Escrow", "SafeSendLib").apply(step).await.unwrap();

    assert_eq!(piped.package.manifest(), manual.package.manifest());
    assert_eq!(piped.address, manual.address);
    assert_eq!(chain.transaction_count().await, 2);
    assert_eq!(manual_chain.transaction_count().await, 2);
}

#[tokio::test]
async fn test_rerunning_pipeline_is_idempotent() {
    let (package, chain) = escrow_package().await;
    let pipeline = crate::linker![
        deploy("SafeSendLib", vec![]),
        link("Escrow", "SafeSendLib"),
        deploy("Escrow", vec![DynSolValue::Address(RECIPIENT)]),
    ];

    let first = pipeline.run(package).await.unwrap();
    assert_eq!(chain.transaction_count().await, 2);

    let rerun = crate::linker![deploy("SafeSendLib", vec![]), deploy("Escrow", vec![])];
    let second = rerun.run(first.package.clone()).await.unwrap();

    assert_eq!(chain.transaction_count().await, 2);
    assert_eq!(second.address, first.address);
    assert_eq!(second.package.manifest(), first.package.manifest());
}

#[tokio::test]
async fn test_linked_contract_deploys_with_constructor_args() {
    let (package, chain) = escrow_package().await;
    let pipeline = crate::linker![
        deploy("SafeSendLib", vec![]),
        link("Escrow", "SafeSendLib"),
        deploy("Escrow", vec![DynSolValue::Address(RECIPIENT)]),
    ];

    let Linked { package: deployed, address } = pipeline.run(package).await.unwrap();

    let escrow = address.unwrap();
    assert_eq!(escrow, chain.sender().create(1));
    let init_code = chain.code_at(&escrow).await.unwrap();
    // linked bytecode followed by the abi encoded recipient
    assert_eq!(init_code.len(), 28 + 32);
    assert_eq!(&init_code[init_code.len() - 20..], RECIPIENT.as_slice());
    assert_eq!(deployed.deployments().len(), 2);
}

#[tokio::test]
async fn test_failing_step_aborts_pipeline() {
    let (package, chain) = escrow_package().await;
    let pipeline = crate::linker![
        deploy("Escrow", vec![DynSolValue::Address(RECIPIENT)]),
        deploy("SafeSendLib", vec![]),
    ];

    let error = pipeline.run(package).await.unwrap_err();

    assert_eq!(
        error.current_context(),
        &LinkerError::UnlinkedDeployment { contract: "Escrow".to_string() }
    );
    assert_eq!(chain.transaction_count().await, 0);
}

#[tokio::test]
async fn test_nested_linkers_compose() {
    let (package, chain) = escrow_package().await;
    let libraries = crate::linker![deploy("SafeSendLib", vec![])];
    let pipeline = Linker::default().then(libraries).then(link("Escrow", "SafeSendLib"));

    let linked = pipeline.run(package).await.unwrap();

    assert_eq!(pipeline.len(), 2);
    assert_eq!(chain.transaction_count().await, 1);
    assert!(!linked.package.contract_factory("Escrow").unwrap().needs_bytecode_linking());
}

#[tokio::test]
async fn test_chain_failures_propagate_with_their_report() {
    let client: Arc<dyn ChainClient> = Arc::new(RejectingChain);
    let package = Package::new(escrow_manifest(), client, Context::empty()).await.unwrap();

    let error = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap_err();

    assert_eq!(error.current_context(), &LinkerError::Chain);
    assert_eq!(
        error.downcast_ref::<ChainError>(),
        Some(&ChainError::NodeError("insufficient funds for gas".to_string()))
    );
}

#[tokio::test]
async fn test_deploy_unknown_contract_type() {
    let (package, _chain) = escrow_package().await;
    let error = deploy("Wallet", vec![]).apply(package.into()).await.unwrap_err();
    assert_eq!(error.current_context(), &LinkerError::UnknownContractType("Wallet".to_string()));
}

#[tokio::test]
async fn test_deployments_are_scoped_to_the_bound_chain() {
    let (package, chain) = escrow_package().await;
    let deployed = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap();
    let manifest = deployed.package.manifest().clone();

    // rebinding to the node that mined the deployment keeps it
    let same_chain: Arc<dyn ChainClient> = chain.clone();
    let rebound = Package::new(manifest.clone(), same_chain, Context::empty()).await.unwrap();
    assert_eq!(rebound.deployments_uri(), deployed.package.deployments_uri());
    assert_eq!(
        rebound.deployment_address("SafeSendLib").unwrap().unwrap(),
        deployed.address.unwrap()
    );

    let rejecting: Arc<dyn ChainClient> = Arc::new(RejectingChain);
    let foreign = Package::new(manifest, rejecting, Context::empty()).await.unwrap();
    assert!(foreign.deployments().is_empty());
}

#[tokio::test]
async fn test_unmined_deployment_is_ignored_on_fresh_chain() {
    let (package, _chain) = escrow_package().await;
    let deployed = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap();

    let client: Arc<dyn ChainClient> = Arc::new(InMemoryChain::new());
    let rebound =
        Package::new(deployed.package.manifest().clone(), client, Context::empty()).await.unwrap();
    assert!(rebound.deployments().is_empty());
    assert!(get_deployment_address("Escrow", "SafeSendLib", &rebound).is_err());
}

#[tokio::test]
async fn test_fresh_chain_with_same_genesis_redeploys() {
    let (package, _chain) = escrow_package().await;
    let deployed = deploy("SafeSendLib", vec![]).apply(package.into()).await.unwrap();
    let stale_uri = deployed.package.deployments_uri().unwrap().to_string();

    // a sender of its own keeps the new block hashes apart from the stale ones
    let sender = address!("0x00000000000000000000000000000000000000bb");
    let fresh_chain = Arc::new(InMemoryChain::with_sender(sender));
    let client: Arc<dyn ChainClient> = fresh_chain.clone();
    let rebound =
        Package::new(deployed.package.manifest().clone(), client, Context::empty()).await.unwrap();
    assert_eq!(rebound.genesis_hash(), deployed.package.genesis_hash());
    assert!(rebound.deployments_uri().is_none());
    assert!(rebound.deployment_address("SafeSendLib").is_none());

    let redeployed = deploy("SafeSendLib", vec![]).apply(rebound.into()).await.unwrap();
    let address = redeployed.address.unwrap();
    assert_eq!(fresh_chain.transaction_count().await, 1);
    assert!(fresh_chain.code_at(&address).await.is_some());

    // the unverified record is left in place under its own uri
    let manifest = redeployed.package.manifest();
    assert!(manifest.deployments.contains_key(&stale_uri));
    assert_eq!(manifest.deployments.len(), 2);
}
