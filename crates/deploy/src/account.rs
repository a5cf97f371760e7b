//! Signing account backed by a Starknet JSON-RPC node.

use std::sync::Arc;

use async_trait::async_trait;
use starknet::{
    accounts::{Account, ConnectedAccount, ExecutionEncoding, SingleOwnerAccount},
    contract::ContractFactory,
    core::types::Felt,
    providers::{JsonRpcClient, Provider, jsonrpc::HttpTransport},
    signers::{LocalWallet, SigningKey},
};
use url::Url;

use crate::{
    ContractArtifact, rpc,
    network::{
        ChainReader, ChainWriter, ClassLookup, EventFilter, EventsPage, NetworkError,
        TransactionReceipt, TransactionStatus,
    },
};

type Signer = SingleOwnerAccount<JsonRpcClient<HttpTransport>, LocalWallet>;

/// A single-owner account. Reads and signed writes share the account's provider.
pub struct StarknetAccount {
    signer: Signer,
}

impl StarknetAccount {
    /// Connect to `url` and fetch the chain id the account signs for.
    pub async fn connect(
        url: Url,
        address: Felt,
        signing_key: SigningKey,
    ) -> Result<Self, NetworkError> {
        let provider = rpc::create_provider(url.clone());
        let chain_id = provider.chain_id().await?;

        let mut signer = SingleOwnerAccount::new(
            provider,
            LocalWallet::from(signing_key),
            address,
            chain_id,
            ExecutionEncoding::New,
        );
        signer.set_block_id(rpc::CLASS_LOOKUP_BLOCK);

        tracing::info!(
            rpc_url = %url,
            account = %format!("{:#x}", address),
            chain_id = %format!("{:#x}", chain_id),
            "Connected account"
        );
        Ok(Self { signer })
    }
}

#[async_trait]
impl ChainReader for StarknetAccount {
    async fn class_lookup(&self, class_hash: Felt) -> Result<ClassLookup, NetworkError> {
        rpc::class_lookup(self.signer.provider(), class_hash).await
    }

    async fn transaction_status(&self, tx_hash: Felt) -> Result<TransactionStatus, NetworkError> {
        rpc::transaction_status(self.signer.provider(), tx_hash).await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: Felt,
    ) -> Result<TransactionReceipt, NetworkError> {
        rpc::transaction_receipt(self.signer.provider(), tx_hash).await
    }

    async fn events_page(
        &self,
        filter: &EventFilter,
        continuation_token: Option<&str>,
        chunk_size: u64,
    ) -> Result<EventsPage, NetworkError> {
        rpc::events_page(self.signer.provider(), filter, continuation_token, chunk_size).await
    }
}

#[async_trait]
impl ChainWriter for StarknetAccount {
    fn account_address(&self) -> Felt {
        self.signer.address()
    }

    async fn submit_declare(&self, artifact: &ContractArtifact) -> Result<Felt, NetworkError> {
        let class = artifact
            .flattened_class()
            .map_err(|e| NetworkError::Submission(e.to_string()))?;

        let result = self
            .signer
            .declare_v3(Arc::new(class), artifact.compiled_class_hash())
            .send()
            .await
            .map_err(|e| NetworkError::Submission(e.to_string()))?;
        Ok(result.transaction_hash)
    }

    async fn submit_udc_deploy(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
        unique: bool,
    ) -> Result<Felt, NetworkError> {
        let factory = ContractFactory::new(class_hash, &self.signer);
        let result = factory
            .deploy_v3(constructor_calldata.to_vec(), salt, unique)
            .send()
            .await
            .map_err(|e| NetworkError::Submission(e.to_string()))?;
        Ok(result.transaction_hash)
    }
}
