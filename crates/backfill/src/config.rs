use std::collections::HashMap;
use std::path::PathBuf;

use alloy_primitives::Address;
use anyhow::{anyhow, ensure, Context};
use serde::{Deserialize, Serialize};


/// Job configuration, read once at startup and passed by reference to
/// everything that needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network name -> RPC endpoint. Endpoint URLs may embed secrets via
    /// `${VAR}` placeholders, expanded from the environment at load time.
    pub networks: HashMap<String, NetworkConfig>,

    /// Chain name -> contracts to backfill on it.
    pub blockchains: HashMap<String, BlockchainConfig>,

    #[serde(default)]
    pub paths: PathsConfig,

    /// When absent, AI image descriptions are not generated.
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Fixed delay between metadata fetch attempts.
    #[serde(default = "default_fetch_retry_delay")]
    pub fetch_retry_delay_secs: u64,

    /// Attempt budget for a single token's metadata fetch.
    /// `None` retries until it succeeds, like the long-running batch
    /// job is expected to.
    #[serde(default)]
    pub fetch_max_attempts: Option<u32>,

    /// Fixed delay between image download attempts.
    #[serde(default = "default_image_retry_delay")]
    pub image_retry_delay_secs: u64,

    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            fetch_retry_delay_secs: default_fetch_retry_delay(),
            fetch_max_attempts: None,
            image_retry_delay_secs: default_image_retry_delay(),
            use_cache: default_use_cache(),
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub contracts: Vec<ContractConfig>,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: Address,

    /// First block of the mint-log scan.
    #[serde(default)]
    pub from_block: u64,

    /// First token id of the collection.
    #[serde(default = "default_first_id")]
    pub first_id: u64,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_log_cache_dir")]
    pub event_log_cache_dir: PathBuf,

    #[serde(default = "default_images_dir")]
    pub nft_images_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            event_log_cache_dir: default_log_cache_dir(),
            nft_images_dir: default_images_dir(),
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub model: String,
    pub prompt: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Descriptions shorter than this are re-requested.
    #[serde(default = "default_description_min_len")]
    pub description_min_len: usize,

    #[serde(default = "default_vision_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_vision_error_delay")]
    pub error_delay_secs: u64,

    /// Bounding box images are shrunk into before upload.
    #[serde(default = "default_image_resolution")]
    pub image_resolution: [u32; 2],
}


impl Config {
    pub fn read(file: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_json::from_reader(std::io::BufReader::new(
            std::fs::File::open(file)?,
        ))?;
        for network in config.networks.values_mut() {
            network.rpc_url = expand_env(&network.rpc_url)?;
        }
        config.validate().context("invalid config")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (chain, blockchain) in self.blockchains.iter() {
            ensure!(
                !blockchain.contracts.is_empty(),
                "chain {} lists no contracts",
                chain
            );
            for contract in blockchain.contracts.iter() {
                ensure!(
                    contract.first_id < u64::MAX,
                    "invalid first_id for contract {} on {}",
                    contract.address,
                    chain
                );
            }
        }
        Ok(())
    }
}


/// Replaces every `${VAR}` occurrence with the value of the environment
/// variable `VAR`. A placeholder for an unset variable is an error.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| anyhow!("unterminated ${{ in '{}'", input))?;
        let name = &after[..end];
        let value = std::env::var(name)
            .with_context(|| format!("environment variable {} is not set", name))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}


fn default_fetch_retry_delay() -> u64 {
    60
}

fn default_image_retry_delay() -> u64 {
    5
}

fn default_use_cache() -> bool {
    true
}

fn default_first_id() -> u64 {
    1
}

fn default_log_cache_dir() -> PathBuf {
    PathBuf::from("cache/event_logs")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("cache/nft_images")
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_description_min_len() -> usize {
    100
}

fn default_vision_attempts() -> u32 {
    5
}

fn default_vision_error_delay() -> u64 {
    10
}

fn default_image_resolution() -> [u32; 2] {
    [512, 512]
}
