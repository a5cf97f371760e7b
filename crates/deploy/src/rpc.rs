//! Read-only access to a Starknet node over JSON-RPC.

use async_trait::async_trait;
use starknet::{
    core::types::{BlockId, BlockTag, Felt},
    providers::{JsonRpcClient, Provider, jsonrpc::HttpTransport},
};
use url::Url;

use crate::network::{
    ChainReader, ClassLookup, EventFilter, EventsPage, NetworkError, TransactionReceipt,
    TransactionStatus,
};

/// Block classes are looked up at. Matches the block the signing account reads its
/// nonce from, so a class declared by the previous run is seen as soon as it is
/// accepted.
pub const CLASS_LOOKUP_BLOCK: BlockId = BlockId::Tag(BlockTag::Pending);

/// Create a JSON-RPC provider for `url`.
pub fn create_provider(url: Url) -> JsonRpcClient<HttpTransport> {
    JsonRpcClient::new(HttpTransport::new(url))
}

/// [`ChainReader`] over any `starknet` provider.
#[derive(Debug, Clone)]
pub struct RpcClient<P = JsonRpcClient<HttpTransport>> {
    provider: P,
}

impl RpcClient {
    pub fn connect(url: Url) -> Self {
        Self::new(create_provider(url))
    }
}

impl<P> RpcClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

/// Read calls shared by [`RpcClient`] and the signing account, which reuses its own
/// provider for them.
pub(crate) async fn class_lookup<P>(
    provider: &P,
    class_hash: Felt,
) -> Result<ClassLookup, NetworkError>
where
    P: Provider + Sync,
{
    match provider.get_class(CLASS_LOOKUP_BLOCK, class_hash).await {
        Ok(_) => Ok(ClassLookup::Declared),
        Err(e) => {
            let e = NetworkError::from(e);
            if e.is_class_not_found() {
                Ok(ClassLookup::NotDeclared)
            } else {
                Err(e)
            }
        }
    }
}

pub(crate) async fn transaction_status<P>(
    provider: &P,
    tx_hash: Felt,
) -> Result<TransactionStatus, NetworkError>
where
    P: Provider + Sync,
{
    let status = provider.get_transaction_status(tx_hash).await?;
    Ok(TransactionStatus::from(&status))
}

pub(crate) async fn transaction_receipt<P>(
    provider: &P,
    tx_hash: Felt,
) -> Result<TransactionReceipt, NetworkError>
where
    P: Provider + Sync,
{
    let receipt = provider.get_transaction_receipt(tx_hash).await?;
    Ok(receipt.receipt.into())
}

pub(crate) async fn events_page<P>(
    provider: &P,
    filter: &EventFilter,
    continuation_token: Option<&str>,
    chunk_size: u64,
) -> Result<EventsPage, NetworkError>
where
    P: Provider + Sync,
{
    tracing::trace!(?continuation_token, chunk_size, "Requesting events page");
    let page = provider
        .get_events(
            filter.clone(),
            continuation_token.map(String::from),
            chunk_size,
        )
        .await?;
    Ok(page)
}

#[async_trait]
impl<P> ChainReader for RpcClient<P>
where
    P: Provider + Send + Sync,
{
    async fn class_lookup(&self, class_hash: Felt) -> Result<ClassLookup, NetworkError> {
        class_lookup(&self.provider, class_hash).await
    }

    async fn transaction_status(&self, tx_hash: Felt) -> Result<TransactionStatus, NetworkError> {
        transaction_status(&self.provider, tx_hash).await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: Felt,
    ) -> Result<TransactionReceipt, NetworkError> {
        transaction_receipt(&self.provider, tx_hash).await
    }

    async fn events_page(
        &self,
        filter: &EventFilter,
        continuation_token: Option<&str>,
        chunk_size: u64,
    ) -> Result<EventsPage, NetworkError> {
        events_page(&self.provider, filter, continuation_token, chunk_size).await
    }
}
