use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::blocks::block::{canonicalize, RawHeader};
use crate::blocks::hash::ChainHash;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::ChainId;

/// Anything that can hand out raw headers for a half-open height range.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    async fn headers(&self, chain: ChainId, from_height: u64, to_height: u64)
        -> Result<Vec<RawHeader>>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Bitcoin Core style JSON-RPC node. Dogecoin and Bitcoin Cash nodes speak the same dialect.
#[derive(Clone)]
pub struct RpcHeaderSource {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
}

impl RpcHeaderSource {
    pub fn new(url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::HeaderSource(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
            auth_token,
        })
    }

    pub fn from_config(config: &Config, chain: ChainId) -> Result<Self> {
        let url = config
            .rpc_url(chain)
            .ok_or_else(|| Error::HeaderSource(format!("no rpc url configured for {chain}")))?;
        RpcHeaderSource::new(url, config.rpc_auth_token.clone(), config.rpc_timeout)
    }

    /// Send one JSON-RPC batch and return results ordered by request id.
    async fn call_batch(&self, requests: &[RpcRequest<'_>]) -> Result<Vec<Value>> {
        let mut builder = self.client.post(&self.url).json(requests);
        if let Some(token) = &self.auth_token {
            builder = builder.header("X-Auth-Token", token);
        }

        let mut responses = builder
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::HeaderSource(format!("request to {} failed: {e}", self.url)))?
            .json::<Vec<RpcResponse>>()
            .await
            .map_err(|e| Error::HeaderSource(format!("bad rpc response: {e}")))?;

        if responses.len() != requests.len() {
            return Err(Error::HeaderSource(format!(
                "expected {} rpc results, got {}",
                requests.len(),
                responses.len()
            )));
        }
        responses.sort_by_key(|r| r.id);

        let mut results = Vec::with_capacity(responses.len());
        for (request, response) in requests.iter().zip(responses) {
            if response.id != request.id {
                return Err(Error::HeaderSource(format!(
                    "missing rpc result for id {}",
                    request.id
                )));
            }
            match (response.result, response.error) {
                (_, Some(err)) if !err.is_null() => {
                    return Err(Error::HeaderSource(format!(
                        "{} for id {} failed: {err}",
                        request.method, request.id
                    )));
                }
                (Some(result), _) if !result.is_null() => results.push(result),
                _ => {
                    return Err(Error::HeaderSource(format!(
                        "{} for id {} returned no result",
                        request.method, request.id
                    )));
                }
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl HeaderSource for RpcHeaderSource {
    async fn headers(
        &self,
        chain: ChainId,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<RawHeader>> {
        if from_height > to_height {
            return Err(Error::HeaderSource(
                "from_height must be less than or equal to to_height".to_string(),
            ));
        }
        if from_height == to_height {
            return Ok(Vec::new());
        }
        log::debug!("Fetching {chain} headers {from_height}..{to_height} from {}", self.url);

        let hash_requests = (from_height..to_height)
            .map(|height| RpcRequest {
                jsonrpc: "2.0",
                id: height,
                method: "getblockhash",
                params: vec![json!(height)],
            })
            .collect::<Vec<_>>();
        let hashes = self.call_batch(&hash_requests).await?;

        let header_requests = hashes
            .into_iter()
            .zip(from_height..to_height)
            .map(|(hash, height)| RpcRequest {
                jsonrpc: "2.0",
                id: height,
                method: "getblockheader",
                params: vec![hash],
            })
            .collect::<Vec<_>>();
        let headers = self.call_batch(&header_requests).await?;

        headers.iter().map(RawHeader::from_json).collect()
    }
}

pub struct LinkHashAndHeaders {
    pub link_hash: ChainHash,
    pub headers: Vec<RawHeader>,
}

/// Fetch `[from_height, to_height)` plus the header right before it.
/// The predecessor is only kept as its hash; a range starting at 0 links to the zero hash.
pub async fn get_link_hash_and_headers(
    source: &dyn HeaderSource,
    chain: ChainId,
    from_height: u64,
    to_height: u64,
) -> Result<LinkHashAndHeaders> {
    if from_height > to_height {
        return Err(Error::HeaderSource(
            "from_height must be less than or equal to to_height".to_string(),
        ));
    }
    let fetch_from_height = if from_height > 0 { from_height - 1 } else { 0 };

    let mut headers = source.headers(chain, fetch_from_height, to_height).await?;
    let expected = (to_height - fetch_from_height) as usize;
    if headers.len() != expected {
        return Err(Error::HeaderSource(format!(
            "expected {expected} headers for {fetch_from_height}..{to_height}, got {}",
            headers.len()
        )));
    }

    let link_hash = if from_height > 0 {
        let link_header = headers.remove(0);
        canonicalize(&link_header)?.hash()
    } else {
        ChainHash::ZERO
    };

    Ok(LinkHashAndHeaders { link_hash, headers })
}
