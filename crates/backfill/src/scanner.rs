use alloy_primitives::Address;
use dropfill_chain_client::{ChainRpc, LogFilter, LogRecord};
use tracing::info;

use crate::abi::{event_topic, zero_address_topic};
use crate::cache::LogCache;
use crate::error::FatalError;


/// Retrieves the full mint-event history of a contract.
///
/// Log-index endpoints cap how much a single query returns, so the scan
/// pages over the block range: each query covers `[cursor, head]` with
/// `head` observed once at scan start, and the cursor resumes from the
/// last returned block + 1. An empty page means the history is
/// exhausted.
pub struct LogScanner<'a, C> {
    rpc: &'a C,
    cache: &'a LogCache,
    network: &'a str,
    contract: Address,
    event_signature: &'a str,
    from_block: u64,
    use_cache: bool,
}

impl<'a, C: ChainRpc> LogScanner<'a, C> {
    pub fn new(
        rpc: &'a C,
        cache: &'a LogCache,
        network: &'a str,
        contract: Address,
        event_signature: &'a str,
        from_block: u64,
        use_cache: bool,
    ) -> Self {
        Self {
            rpc,
            cache,
            network,
            contract,
            event_signature,
            from_block,
            use_cache,
        }
    }

    /// Returns the contract's complete mint-log sequence, from the cache
    /// when one exists, otherwise by scanning the chain. A fresh scan
    /// that terminated cleanly is written back to the cache before
    /// returning.
    pub async fn fetch(&self) -> anyhow::Result<Vec<LogRecord>> {
        if self.use_cache {
            if let Some(records) = self.cache.load(self.network, self.contract)? {
                info!(
                    records = records.len(),
                    file = %self.cache.file_path(self.network, self.contract).display(),
                    "loaded mint event logs from the cache"
                );
                return Ok(records);
            }
        }

        let records = self.scan().await?;

        if self.use_cache {
            self.cache.save(self.network, self.contract, &records)?;
            info!(
                file = %self.cache.file_path(self.network, self.contract).display(),
                "saved mint event logs to the cache"
            );
        }

        Ok(records)
    }

    async fn scan(&self) -> anyhow::Result<Vec<LogRecord>> {
        let head = self.rpc.block_number().await?;
        let mut cursor = self.from_block;
        let mut all_records = Vec::new();

        // signature, operator, from, to; from == zero address selects mints
        let topics = vec![
            Some(event_topic(self.event_signature)),
            None,
            Some(zero_address_topic()),
            None,
        ];

        info!(
            from_block = self.from_block,
            head, "scanning mint event logs, this can take a while"
        );

        loop {
            let page = self
                .rpc
                .get_logs(&LogFilter {
                    from_block: cursor,
                    to_block: head,
                    address: self.contract,
                    topics: topics.clone(),
                })
                .await?;

            let Some(last) = page.last() else {
                break;
            };
            cursor = last.block_number + 1;
            all_records.extend(page);

            if cursor > head {
                break;
            }
        }

        if all_records.is_empty() {
            return Err(FatalError::NoMintLogsFound {
                network: self.network.to_string(),
                contract: format!("{:#x}", self.contract),
            }
            .into());
        }

        info!(records = all_records.len(), "mint log scan finished");
        Ok(all_records)
    }
}
