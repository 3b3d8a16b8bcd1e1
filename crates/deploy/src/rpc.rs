//! JSON-RPC client for an Ethereum execution-layer endpoint.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::chain::{ChainClient, TransactionReceipt};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error in {}: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// [`ChainClient`] backed by an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
}

impl RpcClient {
    /// Create a client for the endpoint at `url`.
    pub fn new(url: Url) -> anyhow::Result<Self> {
        tracing::debug!(rpc_url = %url, "Connecting to execution RPC");
        Ok(Self {
            http: create_client()?,
            url,
        })
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> anyhow::Result<T> {
        json_rpc_call(&self.http, self.url.as_str(), method, params).await
    }
}

impl ChainClient for RpcClient {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        let chain_id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(chain_id.to())
    }

    async fn balance(&self, address: Address) -> anyhow::Result<U256> {
        self.request(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        let count: U64 = self
            .request(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("latest")],
            )
            .await?;
        Ok(count.to())
    }

    async fn code(&self, address: Address) -> anyhow::Result<Bytes> {
        self.request(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        self.request(
            "eth_call",
            vec![
                serde_json::json!({ "to": to, "data": data }),
                serde_json::json!("latest"),
            ],
        )
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<B256> {
        self.request("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await
    }

    async fn transaction_receipt(&self, hash: B256) -> anyhow::Result<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", vec![serde_json::json!(hash)])
            .await
    }
}
