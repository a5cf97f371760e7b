//! Contract instantiation through the Universal Deployer, with address recovery.

use serde::{Deserialize, Serialize};
use starknet::core::{types::Felt, utils::get_selector_from_name};

use crate::{
    DeploymentSpec, TransactionWaiter, WaiterConfig,
    address::{UDC_ADDRESS, compute_udc_address},
    network::{ChainWriter, NetworkError, TransactionReceipt},
};

/// Outcome of a deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The deployment transaction was accepted; the address comes from its receipt.
    Confirmed {
        transaction_hash: Felt,
        contract_address: Felt,
    },
    /// Submission or confirmation failed; the address was derived from the inputs.
    Recovered { contract_address: Felt, cause: String },
}

impl DeployOutcome {
    pub fn contract_address(&self) -> Felt {
        match self {
            Self::Confirmed {
                contract_address, ..
            }
            | Self::Recovered {
                contract_address, ..
            } => *contract_address,
        }
    }

    pub fn transaction_hash(&self) -> Option<Felt> {
        match self {
            Self::Confirmed {
                transaction_hash, ..
            } => Some(*transaction_hash),
            Self::Recovered { .. } => None,
        }
    }
}

/// A deployed (or recovered) contract instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub tag: String,
    pub contract_address: Felt,
    pub class_hash: Felt,
    pub constructor_calldata: Vec<Felt>,
    pub salt: Felt,
    pub unique: bool,
    pub deployer_address: Felt,
    /// Unset when the address was recovered rather than read from a receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<Felt>,
}

impl InstanceDescriptor {
    pub fn is_recovered(&self) -> bool {
        self.transaction_hash.is_none()
    }
}

/// Deploys instances of declared classes.
pub struct InstanceDeployer<'a, A: ?Sized> {
    account: &'a A,
    waiter: TransactionWaiter<'a, A>,
}

impl<'a, A> InstanceDeployer<'a, A>
where
    A: ChainWriter + ?Sized,
{
    pub fn new(account: &'a A, waiter_config: WaiterConfig) -> Self {
        Self {
            account,
            waiter: TransactionWaiter::new(account, waiter_config),
        }
    }

    /// Deploy `spec` as an instance of `class_hash`. Never fails: a failed
    /// submission or confirmation yields a recovered descriptor.
    pub async fn deploy(&self, class_hash: Felt, spec: &DeploymentSpec) -> InstanceDescriptor {
        let outcome = self
            .deploy_outcome(
                class_hash,
                &spec.constructor_calldata,
                spec.salt,
                spec.unique,
            )
            .await;

        InstanceDescriptor {
            tag: spec.tag.clone(),
            contract_address: outcome.contract_address(),
            class_hash,
            constructor_calldata: spec.constructor_calldata.clone(),
            salt: spec.salt,
            unique: spec.unique,
            deployer_address: self.account.account_address(),
            transaction_hash: outcome.transaction_hash(),
        }
    }

    pub async fn deploy_outcome(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
        unique: bool,
    ) -> DeployOutcome {
        let deployer = self.account.account_address();
        let predicted =
            compute_udc_address(deployer, class_hash, salt, unique, constructor_calldata);

        match self
            .submit_and_confirm(class_hash, constructor_calldata, salt, unique)
            .await
        {
            Ok((transaction_hash, contract_address)) => {
                if unique && contract_address != predicted {
                    tracing::warn!(
                        confirmed = %format!("{:#x}", contract_address),
                        predicted = %format!("{:#x}", predicted),
                        "Confirmed address differs from the derived one"
                    );
                }
                tracing::info!(
                    class_hash = %format!("{:#x}", class_hash),
                    contract_address = %format!("{:#x}", contract_address),
                    tx_hash = %format!("{:#x}", transaction_hash),
                    "Deployed contract"
                );
                DeployOutcome::Confirmed {
                    transaction_hash,
                    contract_address,
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    class_hash = %format!("{:#x}", class_hash),
                    contract_address = %format!("{:#x}", predicted),
                    "Deployment failed, using derived address"
                );
                DeployOutcome::Recovered {
                    contract_address: predicted,
                    cause: e.to_string(),
                }
            }
        }
    }

    async fn submit_and_confirm(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
        unique: bool,
    ) -> Result<(Felt, Felt), NetworkError> {
        let tx_hash = self
            .account
            .submit_udc_deploy(class_hash, constructor_calldata, salt, unique)
            .await?;
        let receipt = self.waiter.wait(tx_hash).await?;
        let address =
            deployed_address(&receipt).ok_or(NetworkError::MissingDeployment { tx_hash })?;
        Ok((tx_hash, address))
    }
}

/// Address announced by the UDC `ContractDeployed` event of a receipt.
pub fn deployed_address(receipt: &TransactionReceipt) -> Option<Felt> {
    let selector = get_selector_from_name("ContractDeployed").ok()?;
    receipt
        .events
        .iter()
        .find(|event| event.from_address == UDC_ADDRESS && event.keys.first() == Some(&selector))
        .and_then(|event| event.data.first().copied())
}
