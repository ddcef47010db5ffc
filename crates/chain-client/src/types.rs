use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};


/// One raw event occurrence as returned by the chain's log index.
///
/// Records are accumulated in scan order and cached as-is, so the
/// serialized form must round-trip exactly: block numbers stay plain
/// integers and byte payloads stay `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub block_number: u64,
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}


/// Parameters of an `eth_getLogs` query.
///
/// A `None` topic slot matches anything at that position.
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    pub address: Address,
    pub topics: Vec<Option<B256>>,
}


/// Hex-quantity encoding used by the JSON-RPC wire format (`"0x10"` = 16).
pub mod quantity {
    use anyhow::{anyhow, Context};

    pub fn encode(value: u64) -> String {
        format!("{:#x}", value)
    }

    pub fn parse(value: &str) -> anyhow::Result<u64> {
        let digits = value
            .strip_prefix("0x")
            .ok_or_else(|| anyhow!("quantity '{}' is missing the 0x prefix", value))?;
        u64::from_str_radix(digits, 16)
            .with_context(|| format!("invalid hex quantity '{}'", value))
    }
}
