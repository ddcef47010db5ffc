use alloy_primitives::Address;
use anyhow::Context;
use chrono::{DateTime, Utc};
use dropfill_chain_client::{ChainRpc, LogRecord};
use serde::Deserialize;
use tracing::info;

use crate::abi::DropContract;
use crate::content::{rewrite_content_uri, Document, DocumentStore};
use crate::error::FatalError;
use crate::resolver::resolve_mint_date;
use crate::retry::RetryPolicy;


/// Sentinel for document fields the off-chain metadata does not carry.
pub const MISSING_FIELD: &str = "N/A";


/// Off-chain metadata document shape. Fields are optional because the
/// documents are heterogeneous; missing ones default to [`MISSING_FIELD`]
/// at assembly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataDocument {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}


/// Fully assembled per-token metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub token_id: u64,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub mint_date: Option<DateTime<Utc>>,
}


/// Assembles a token's metadata: contract pointer, document fetch,
/// pointer rewriting and mint-date resolution, all under one retry
/// policy.
///
/// The whole sequence is retried on any failure except a document
/// endpoint answering HTTP 410, which terminally resolves to an empty
/// document with no retry.
pub struct MetadataFetcher<'a, C, D> {
    rpc: &'a C,
    documents: &'a D,
    contract: Address,
    next_token_id: u64,
    records: &'a [LogRecord],
    retry: RetryPolicy,
}

impl<'a, C: ChainRpc, D: DocumentStore> MetadataFetcher<'a, C, D> {
    /// `records` must hold the contract's complete scanned mint-log
    /// sequence; an empty set here is a programming error, not a
    /// retryable condition.
    pub fn new(
        rpc: &'a C,
        documents: &'a D,
        contract: Address,
        next_token_id: u64,
        records: &'a [LogRecord],
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rpc,
            documents,
            contract,
            next_token_id,
            records,
            retry,
        }
    }

    pub async fn fetch(&self, token_id: u64) -> anyhow::Result<TokenMetadata> {
        if token_id >= self.next_token_id {
            return Err(FatalError::TokenOutOfRange {
                token_id,
                last_id: self.next_token_id.saturating_sub(1),
            }
            .into());
        }
        anyhow::ensure!(
            !self.records.is_empty(),
            "mint logs must be scanned before fetching token metadata"
        );

        self.retry
            .run(&format!("metadata fetch for token {}", token_id), || {
                self.fetch_once(token_id)
            })
            .await
    }

    async fn fetch_once(&self, token_id: u64) -> anyhow::Result<TokenMetadata> {
        let token_uri = DropContract::new(self.rpc, self.contract)
            .uri(token_id)
            .await?;
        let url = rewrite_content_uri(&token_uri);

        let document = match self.documents.get(&url).await? {
            Document::Found(bytes) => serde_json::from_slice::<MetadataDocument>(&bytes)
                .with_context(|| format!("invalid metadata document at {}", url))?,
            Document::Gone => {
                info!(url, "this URI no longer contains any data");
                MetadataDocument::default()
            }
        };

        let mint_date = resolve_mint_date(self.rpc, token_id, self.records).await?;

        let missing = || MISSING_FIELD.to_string();
        Ok(TokenMetadata {
            token_id,
            name: document.name.unwrap_or_else(missing),
            description: document.description.unwrap_or_else(missing),
            image_url: rewrite_content_uri(&document.image.unwrap_or_else(missing)),
            mint_date,
        })
    }
}
