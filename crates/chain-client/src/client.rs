use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, IntoUrl, Request, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::types::{quantity, LogFilter, LogRecord};


/// The narrow chain interface the backfill job depends on.
///
/// Everything the pipeline needs from a node fits in four read-only
/// operations, which keeps the scanning and resolution logic testable
/// against scripted fakes.
#[async_trait]
pub trait ChainRpc {
    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes>;

    /// `eth_getLogs` over the filter's block range.
    async fn get_logs(&self, filter: &LogFilter) -> anyhow::Result<Vec<LogRecord>>;

    /// Timestamp (unix seconds) of the given block.
    async fn get_block_timestamp(&self, number: u64) -> anyhow::Result<u64>;

    /// Current chain head.
    async fn block_number(&self) -> anyhow::Result<u64>;
}


pub fn default_http_client() -> Client {
    Client::builder()
        .read_timeout(Duration::from_secs(20))
        .connect_timeout(Duration::from_secs(20))
        .build()
        .unwrap()
}


/// JSON-RPC 2.0 client over HTTP.
///
/// Transport-level failures and throttling statuses are retried with a
/// fixed pause schedule; errors reported by the node itself (malformed
/// request, unknown method) are surfaced to the caller immediately.
#[derive(Clone, Debug)]
pub struct RpcClient {
    http: Client,
    url: Url,
}

impl RpcClient {
    pub fn from_url(url: impl IntoUrl) -> anyhow::Result<Self> {
        Ok(Self::new(default_http_client(), url.into_url()?))
    }

    pub fn new(http: Client, url: Url) -> Self {
        Self { http, url }
    }

    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let req = self.http.post(self.url.clone()).json(&body).build()?;

        debug!(method, "send rpc request");

        self.with_retries(&req, |res| async {
            let envelope: RpcEnvelope = res
                .json()
                .await
                .context("failed to decode json-rpc response body")?;

            if let Some(err) = envelope.error {
                return Err(anyhow!("rpc error {}: {}", err.code, err.message));
            }

            envelope
                .result
                .ok_or_else(|| anyhow!("json-rpc response carries neither result nor error"))
        })
        .await
        .with_context(|| format!("{} request failed", method))
    }

    async fn with_retries<R, F, Fut>(&self, req: &Request, mut cb: F) -> anyhow::Result<R>
    where
        F: FnMut(Response) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<R>>,
    {
        let mut retry_attempt = 0;
        let retry_schedule = [0, 100, 200, 500, 1000, 2000];
        loop {
            let retry_error = match self.http.execute(req.try_clone().unwrap()).await {
                Ok(res) => match res.status().as_u16() {
                    429 | 502 | 503 | 504 | 524 => response_error(res).await,
                    _ => match cb(res).await {
                        Ok(value) => return Ok(value),
                        Err(err) => return Err(err),
                    },
                },
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    anyhow!(err)
                }
                Err(err) => return Err(err.into()),
            };

            let pause = retry_schedule[std::cmp::min(retry_attempt, retry_schedule.len() - 1)];

            warn!(
                url = %req.url().as_str(),
                error = ?retry_error,
                "rpc request failed, will retry in {} ms",
                pause
            );

            retry_attempt = retry_attempt.saturating_add(1);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }
}


async fn response_error(response: Response) -> anyhow::Error {
    let status = response.status().as_u16();
    if let Ok(text) = response.text().await {
        anyhow!("got HTTP {}: {}", status, text)
    } else {
        anyhow!("got HTTP {}", status)
    }
}


#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcError>,
}


#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}


/// `eth_getLogs` entry as it appears on the wire, with hex-quantity
/// block numbers.
#[derive(Deserialize)]
struct WireLog {
    #[serde(rename = "blockNumber")]
    block_number: String,
    address: Address,
    topics: Vec<alloy_primitives::B256>,
    data: Bytes,
}

impl WireLog {
    fn into_record(self) -> anyhow::Result<LogRecord> {
        Ok(LogRecord {
            block_number: quantity::parse(&self.block_number)?,
            address: self.address,
            topics: self.topics,
            data: self.data,
        })
    }
}


fn filter_to_params(filter: &LogFilter) -> Value {
    json!([{
        "fromBlock": quantity::encode(filter.from_block),
        "toBlock": quantity::encode(filter.to_block),
        "address": filter.address,
        "topics": filter.topics,
    }])
}


#[async_trait]
impl ChainRpc for RpcClient {
    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        let result = self
            .request("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await?;
        serde_json::from_value(result).context("eth_call returned a non-hex result")
    }

    async fn get_logs(&self, filter: &LogFilter) -> anyhow::Result<Vec<LogRecord>> {
        let result = self.request("eth_getLogs", filter_to_params(filter)).await?;
        let logs: Vec<WireLog> =
            serde_json::from_value(result).context("unexpected eth_getLogs result shape")?;
        logs.into_iter().map(WireLog::into_record).collect()
    }

    async fn get_block_timestamp(&self, number: u64) -> anyhow::Result<u64> {
        let result = self
            .request(
                "eth_getBlockByNumber",
                json!([quantity::encode(number), false]),
            )
            .await?;

        let timestamp = result
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("block {} has no timestamp field", number))?;

        quantity::parse(timestamp)
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let head = result
            .as_str()
            .ok_or_else(|| anyhow!("eth_blockNumber returned a non-string result"))?;
        quantity::parse(head)
    }
}
