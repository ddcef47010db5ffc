use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use dropfill_chain_client::{ChainRpc, RpcClient};
use tracing::{info, info_span, warn, Instrument};

use crate::abi::{DropContract, TRANSFER_SINGLE_SIGNATURE};
use crate::cache::LogCache;
use crate::config::{Config, ContractConfig, GeneralConfig, OpenAiConfig};
use crate::content::{download_image, DocumentStore, HttpDocumentStore};
use crate::error::FatalError;
use crate::fetcher::MetadataFetcher;
use crate::retry::RetryPolicy;
use crate::scanner::LogScanner;
use crate::store::{MetadataStore, TokenRecord};
use crate::vision::VisionClient;


/// Runs the backfill over every configured chain and contract.
pub async fn run(config: &Config, store: &MetadataStore, use_cache: bool) -> anyhow::Result<()> {
    let documents = HttpDocumentStore::default();
    let cache = LogCache::new(config.paths.event_log_cache_dir.clone());

    let vision = match &config.openai {
        Some(openai) => {
            let api_key = std::env::var(&openai.api_key_env).with_context(|| {
                format!("environment variable {} is not set", openai.api_key_env)
            })?;
            Some(VisionClient::new(openai, api_key))
        }
        None => None,
    };

    for (chain_name, blockchain) in config.blockchains.iter() {
        let network = config
            .networks
            .get(chain_name)
            .ok_or_else(|| FatalError::UnsupportedNetwork(chain_name.clone()))?;
        let rpc = RpcClient::from_url(&network.rpc_url)?;

        for contract in blockchain.contracts.iter() {
            info!(
                network = chain_name,
                contract = %contract.address,
                from_block = contract.from_block,
                "starting the mint event log search"
            );

            ContractJob {
                network: chain_name,
                source: contract,
                rpc: &rpc,
                documents: &documents,
                store,
                cache: &cache,
                vision: vision.as_ref(),
                openai: config.openai.as_ref(),
                general: &config.general,
                images_dir: &config.paths.nft_images_dir,
                use_cache,
            }
            .run()
            .await?;
        }
    }

    Ok(())
}


/// Backfill of a single contract: supply read once, full log scan, then
/// a strictly sequential pass over the token range. A token is fully
/// processed (fetch, description, persistence) before the next begins.
pub struct ContractJob<'a, C, D> {
    pub network: &'a str,
    pub source: &'a ContractConfig,
    pub rpc: &'a C,
    pub documents: &'a D,
    pub store: &'a MetadataStore,
    pub cache: &'a LogCache,
    pub vision: Option<&'a VisionClient>,
    pub openai: Option<&'a OpenAiConfig>,
    pub general: &'a GeneralConfig,
    pub images_dir: &'a Path,
    pub use_cache: bool,
}

impl<'a, C: ChainRpc, D: DocumentStore> ContractJob<'a, C, D> {
    pub async fn run(&self) -> anyhow::Result<()> {
        let contract = DropContract::new(self.rpc, self.source.address);

        let collection_name =
            contract
                .name()
                .await
                .map_err(|source| FatalError::ContractRead {
                    what: "collection name",
                    source,
                })?;
        let next_token_id =
            contract
                .next_token_id()
                .await
                .map_err(|source| FatalError::ContractRead {
                    what: "nextTokenId",
                    source,
                })?;

        // the scan phase completes before any per-token fetch begins
        let records = LogScanner::new(
            self.rpc,
            self.cache,
            self.network,
            self.source.address,
            TRANSFER_SINGLE_SIGNATURE,
            self.source.from_block,
            self.use_cache,
        )
        .fetch()
        .await?;

        let delay = Duration::from_secs(self.general.fetch_retry_delay_secs);
        let retry = match self.general.fetch_max_attempts {
            Some(max) => RetryPolicy::bounded(delay, max),
            None => RetryPolicy::unbounded(delay),
        };
        let fetcher = MetadataFetcher::new(
            self.rpc,
            self.documents,
            self.source.address,
            next_token_id,
            &records,
            retry,
        );

        let contract_key = format!("{:#x}", self.source.address);

        for token_id in self.source.first_id..next_token_id {
            let span = info_span!(
                "token",
                network = self.network,
                contract = %short_address(&contract_key),
                token = token_id,
                last = next_token_id - 1
            );
            self.process_token(&fetcher, &collection_name, &contract_key, token_id)
                .instrument(span)
                .await?;
        }

        Ok(())
    }

    async fn process_token(
        &self,
        fetcher: &MetadataFetcher<'_, C, D>,
        collection_name: &str,
        contract_key: &str,
        token_id: u64,
    ) -> anyhow::Result<()> {
        let existing = self.store.get(self.network, contract_key, token_id)?;

        let min_len = self.openai.map_or(0, |config| config.description_min_len);
        let mut fetch_metadata = false;
        let mut generate_description = false;
        match &existing {
            Some(row) => {
                if !row.is_complete() {
                    fetch_metadata = true;
                }
                if row
                    .ai_image_description
                    .as_ref()
                    .map_or(true, |text| text.len() < min_len)
                {
                    generate_description = true;
                }
            }
            None => {
                fetch_metadata = true;
                generate_description = true;
            }
        }

        let mut fetched = None;
        if fetch_metadata {
            info!("getting token metadata");
            let token = fetcher.fetch(token_id).await?;

            self.store.upsert(&TokenRecord {
                network: self.network.to_string(),
                contract_address: contract_key.to_string(),
                collection_name: Some(collection_name.to_string()),
                token_id,
                token_name: Some(token.name.clone()),
                description: Some(token.description.clone()),
                image_url: Some(token.image_url.clone()),
                mint_date: token.mint_date,
                ai_image_description: existing
                    .as_ref()
                    .and_then(|row| row.ai_image_description.clone()),
            })?;
            fetched = Some(token);
        }

        // a description is generated only for tokens whose metadata was
        // fetched successfully on this run
        if generate_description {
            if let (Some(vision), Some(openai), Some(token)) =
                (self.vision, self.openai, &fetched)
            {
                info!(model = vision.model(), "generating an image description");

                let image_retry = RetryPolicy::unbounded(Duration::from_secs(
                    self.general.image_retry_delay_secs,
                ));
                let image_base64 = download_image(
                    self.documents,
                    &token.image_url,
                    self.images_dir,
                    openai.image_resolution,
                    &image_retry,
                )
                .await?;

                match vision.describe(&image_base64, "image/png").await {
                    Ok(text) => {
                        self.store
                            .set_ai_description(self.network, contract_key, token_id, &text)?
                    }
                    Err(err) => warn!(
                        error = format!("{:#}", err),
                        "failed to generate an image description"
                    ),
                }
            }
        } else if !fetch_metadata && existing.is_some() {
            info!("nothing to do, skipping");
        }

        Ok(())
    }
}


/// `0x1234…abcd` form used in per-token log context.
fn short_address(address: &str) -> String {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    if hex.len() < 10 {
        return hex.to_string();
    }
    format!("{}…{}", &hex[..4], &hex[hex.len() - 4..])
}
