use alloy::dyn_abi::DynSolValue;
use alloy::primitives::address;

use super::escrow_package;
use crate::deployer::Deployer;
use crate::errors::LinkerError;
use crate::linker::{deploy, link};

#[tokio::test]
async fn test_deploys_contract_without_links() {
    let (package, chain) = escrow_package().await;
    let deployer = Deployer::new(package);

    let linked = deployer.deploy("Owned", vec![]).await.unwrap();

    assert_eq!(linked.address, Some(chain.sender().create(0)));
    assert!(linked.package.deployments().contains_key("Owned"));
    // the deployer keeps working from its own package
    assert!(deployer.package().deployments().is_empty());
}

#[tokio::test]
async fn test_refuses_unlinked_contract_without_strategy() {
    let (package, chain) = escrow_package().await;
    let deployer = Deployer::new(package);

    let error = deployer.deploy("Escrow", vec![]).await.unwrap_err();

    assert_eq!(
        error.current_context(),
        &LinkerError::UnlinkedDeployment { contract: "Escrow".to_string() }
    );
    assert_eq!(chain.transaction_count().await, 0);
}

#[tokio::test]
async fn test_registered_strategy_replaces_plain_deployment() {
    let (package, chain) = escrow_package().await;
    let recipient = address!("0x00000000000000000000000000000000000000aa");
    let mut deployer = Deployer::new(package);
    deployer.register_strategy(
        "Escrow",
        crate::linker![
            deploy("SafeSendLib", vec![]),
            link("Escrow", "SafeSendLib"),
            deploy("Escrow", vec![DynSolValue::Address(recipient)]),
        ],
    );
    assert!(deployer.has_strategy("Escrow"));
    assert!(format!("{:?}", deployer).contains(r#"strategies: ["Escrow"]"#));

    let linked = deployer.deploy("Escrow", vec![]).await.unwrap();

    assert_eq!(chain.transaction_count().await, 2);
    assert_eq!(linked.address, Some(chain.sender().create(1)));
    let deployments = linked.package.deployments();
    assert!(deployments.contains_key("SafeSendLib"));
    assert!(deployments.contains_key("Escrow"));
}

#[tokio::test]
async fn test_unknown_contract_type() {
    let (package, _chain) = escrow_package().await;
    let deployer = Deployer::new(package);

    let error = deployer.deploy("Wallet", vec![]).await.unwrap_err();
    assert_eq!(error.current_context(), &LinkerError::UnknownContractType("Wallet".to_string()));
}
