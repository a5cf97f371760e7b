//! Idempotent class declaration.

use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::{
    ContractArtifact, TransactionWaiter, WaiterConfig,
    network::{ChainWriter, ClassLookup, NetworkError},
};

/// Outcome of declaring one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub class_hash: Felt,
    /// `true` if this run submitted the declaration, `false` if the class was already known.
    pub declared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declare_tx_hash: Option<Felt>,
}

/// Errors raised while declaring a class. All of them abort the batch.
#[derive(Debug, thiserror::Error)]
pub enum DeclareError {
    /// The class query failed without a clear "not found"; the class may or may not exist.
    #[error("could not determine whether class {class_hash:#x} is declared")]
    Lookup {
        class_hash: Felt,
        #[source]
        source: NetworkError,
    },

    #[error("failed to submit declaration of class {class_hash:#x}")]
    Submit {
        class_hash: Felt,
        #[source]
        source: NetworkError,
    },

    #[error("declaration of class {class_hash:#x} in transaction {tx_hash:#x} was not accepted")]
    Confirm {
        class_hash: Felt,
        tx_hash: Felt,
        #[source]
        source: NetworkError,
    },
}

/// Declares classes that the network does not know yet.
pub struct Declarer<'a, A: ?Sized> {
    account: &'a A,
    waiter: TransactionWaiter<'a, A>,
}

impl<'a, A> Declarer<'a, A>
where
    A: ChainWriter + ?Sized,
{
    pub fn new(account: &'a A, waiter_config: WaiterConfig) -> Self {
        Self {
            account,
            waiter: TransactionWaiter::new(account, waiter_config),
        }
    }

    /// Make sure the artifact's class is known to the network, declaring it at most once.
    pub async fn declare(
        &self,
        artifact: &ContractArtifact,
    ) -> Result<ClassDescriptor, DeclareError> {
        let class_hash = artifact.class_hash();
        let hash_hex = format!("{:#x}", class_hash);

        let lookup = self
            .account
            .class_lookup(class_hash)
            .await
            .map_err(|source| DeclareError::Lookup { class_hash, source })?;

        if lookup == ClassLookup::Declared {
            tracing::info!(class_hash = %hash_hex, "Class already declared");
            return Ok(ClassDescriptor {
                class_hash,
                declared: false,
                declare_tx_hash: None,
            });
        }

        tracing::info!(class_hash = %hash_hex, "Declaring class...");

        let tx_hash = self
            .account
            .submit_declare(artifact)
            .await
            .map_err(|source| DeclareError::Submit { class_hash, source })?;

        self.waiter
            .wait(tx_hash)
            .await
            .map_err(|source| DeclareError::Confirm {
                class_hash,
                tx_hash,
                source,
            })?;

        tracing::info!(
            class_hash = %hash_hex,
            tx_hash = %format!("{:#x}", tx_hash),
            "Class declared"
        );

        Ok(ClassDescriptor {
            class_hash,
            declared: true,
            declare_tx_hash: Some(tx_hash),
        })
    }
}
