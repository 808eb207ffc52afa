//! Read access to the guestbook contract through an `ethers` provider.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use tracing::debug;

use crate::abi::{self, AbiError};
use crate::feed::GuestbookMessage;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("undecodable contract data: {0}")]
    Abi(#[from] AbiError),
}

/// The reads the service needs from chain state.
#[async_trait]
pub trait GuestbookReader: Send + Sync {
    /// All messages, oldest first.
    async fn messages(&self) -> Result<Vec<GuestbookMessage>, ChainError>;

    async fn owner(&self) -> Result<Address, ChainError>;

    /// Contract balance in wei.
    async fn balance(&self) -> Result<U256, ChainError>;
}

pub struct ChainClient {
    provider: Arc<Provider<Http>>,
    contract: Address,
}

impl ChainClient {
    pub fn new(rpc_url: &str, contract: Address) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::InvalidRpcUrl(format!("{rpc_url}: {e}")))?;

        Ok(Self {
            provider: Arc::new(provider),
            contract,
        })
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// A read-only call of the no-argument function `signature`.
    fn read_request(&self, signature: &str) -> TypedTransaction {
        TransactionRequest::new()
            .to(self.contract)
            .data(abi::encode_no_args(signature))
            .into()
    }

    async fn call(&self, signature: &str) -> Result<Bytes, ChainError> {
        debug!(function = signature, contract = ?self.contract, "eth_call");
        Ok(self
            .provider
            .call(&self.read_request(signature), None)
            .await?)
    }
}

#[async_trait]
impl GuestbookReader for ChainClient {
    async fn messages(&self) -> Result<Vec<GuestbookMessage>, ChainError> {
        let data = self.call(abi::GET_MESSAGES).await?;
        Ok(abi::decode_messages(&data)?)
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        let data = self.call(abi::OWNER).await?;
        Ok(abi::decode_address(&data)?)
    }

    async fn balance(&self) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(self.contract, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::NameOrAddress;
    use ethers::utils::id;

    fn contract() -> Address {
        "0xB71C596aC966125d03960A43c762E86e51040F9B".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = ChainClient::new("https://mainnet.base.org", contract()).unwrap();
        assert_eq!(client.contract(), contract());
    }

    #[test]
    fn test_invalid_rpc_url() {
        assert!(matches!(
            ChainClient::new("not a url", contract()),
            Err(ChainError::InvalidRpcUrl(_))
        ));
    }

    #[test]
    fn test_read_request_targets_contract() {
        let client = ChainClient::new("https://sepolia.base.org", contract()).unwrap();
        let request = client.read_request(abi::GET_MESSAGES);

        assert_eq!(request.to(), Some(&NameOrAddress::Address(contract())));
        assert_eq!(
            request.data().map(|d| d.to_vec()),
            Some(id(abi::GET_MESSAGES).to_vec())
        );
        assert!(request.value().is_none());
    }
}
