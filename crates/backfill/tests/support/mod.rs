#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use dropfill::abi::{event_topic, IDrop, TRANSFER_SINGLE_SIGNATURE};
use dropfill::content::{Document, DocumentStore};
use dropfill_chain_client::{ChainRpc, LogFilter, LogRecord};


pub const CONTRACT: Address = Address::repeat_byte(0x51);


/// Mint-event record as the chain would return it: token id and
/// quantity words in the payload, zero-address `from` topic.
pub fn mint_log(block_number: u64, token_id: u64) -> LogRecord {
    let mut data = U256::from(token_id).to_be_bytes::<32>().to_vec();
    data.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());
    LogRecord {
        block_number,
        address: CONTRACT,
        topics: vec![
            event_topic(TRANSFER_SINGLE_SIGNATURE),
            B256::ZERO,
            B256::ZERO,
            B256::ZERO,
        ],
        data: Bytes::from(data),
    }
}


/// Scripted chain backend. `get_logs` emulates a provider that caps the
/// page size: it answers with at most `page_size` records from the
/// requested range, in block order.
pub struct MockRpc {
    pub head: u64,
    pub records: Vec<LogRecord>,
    pub page_size: usize,
    pub timestamps: HashMap<u64, u64>,
    pub collection_name: String,
    pub next_token_id: u64,
    pub uris: HashMap<u64, String>,
    /// When set, `get_logs` fails once this many pages were served.
    pub fail_get_logs_after: Option<usize>,
    pub get_logs_calls: AtomicUsize,
    pub uri_calls: AtomicUsize,
}

impl MockRpc {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            records: Vec::new(),
            page_size: usize::MAX,
            timestamps: HashMap::new(),
            collection_name: "Drops".to_string(),
            next_token_id: 0,
            uris: HashMap::new(),
            fail_get_logs_after: None,
            get_logs_calls: AtomicUsize::new(0),
            uri_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn call(&self, _to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        anyhow::ensure!(data.len() >= 4, "calldata without a selector");
        let selector: [u8; 4] = data[..4].try_into().unwrap();

        if selector == IDrop::nameCall::SELECTOR {
            Ok(self.collection_name.clone().abi_encode().into())
        } else if selector == IDrop::nextTokenIdCall::SELECTOR {
            Ok(U256::from(self.next_token_id).abi_encode().into())
        } else if selector == IDrop::uriCall::SELECTOR {
            self.uri_calls.fetch_add(1, Ordering::SeqCst);
            let call = IDrop::uriCall::abi_decode(&data)?;
            let token_id: u64 = call
                .id
                .try_into()
                .map_err(|_| anyhow::anyhow!("token id out of u64 range"))?;
            let uri = self
                .uris
                .get(&token_id)
                .ok_or_else(|| anyhow::anyhow!("no uri scripted for token {}", token_id))?;
            Ok(uri.clone().abi_encode().into())
        } else {
            anyhow::bail!("unexpected selector {:?}", selector)
        }
    }

    async fn get_logs(&self, filter: &LogFilter) -> anyhow::Result<Vec<LogRecord>> {
        let served = self.get_logs_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_get_logs_after {
            if served >= limit {
                anyhow::bail!("rpc endpoint went away");
            }
        }
        Ok(self
            .records
            .iter()
            .filter(|record| {
                record.block_number >= filter.from_block
                    && record.block_number <= filter.to_block
            })
            .take(self.page_size)
            .cloned()
            .collect())
    }

    async fn get_block_timestamp(&self, number: u64) -> anyhow::Result<u64> {
        self.timestamps
            .get(&number)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no timestamp scripted for block {}", number))
    }

    async fn block_number(&self) -> anyhow::Result<u64> {
        Ok(self.head)
    }
}


/// Scripted off-chain document store.
pub enum Scripted {
    Json(serde_json::Value),
    Gone,
}

pub struct MockDocumentStore {
    pub responses: HashMap<String, Scripted>,
    /// Number of initial requests that fail regardless of the script.
    pub fail_first: usize,
    pub calls: AtomicUsize,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fail_first: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, url: &str, response: Scripted) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn get(&self, url: &str) -> anyhow::Result<Document> {
        let served = self.calls.fetch_add(1, Ordering::SeqCst);
        if served < self.fail_first {
            anyhow::bail!("connection reset");
        }
        match self.responses.get(url) {
            Some(Scripted::Json(value)) => Ok(Document::Found(value.to_string().into_bytes())),
            Some(Scripted::Gone) => Ok(Document::Gone),
            None => anyhow::bail!("no document scripted for {}", url),
        }
    }
}
