use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use dropfill_chain_client::{ChainRpc, LogRecord};


/// Minted token id encoded in a mint event's payload: the first 32-byte
/// big-endian word.
pub fn decode_token_id(data: &[u8]) -> Option<u64> {
    if data.len() < 32 {
        return None;
    }
    U256::from_be_slice(&data[..32]).try_into().ok()
}


/// Finds the mint timestamp of a token in the scanned record set.
///
/// The record set is scanned linearly for the first payload whose
/// decoded token id matches, then that record's block is looked up once
/// for its timestamp. For a drop-style collection the record count is of
/// the same order as the supply, so no index is built.
///
/// `Ok(None)` when no record matches; a missing mint date degrades the
/// token record, it never aborts the fetch.
pub async fn resolve_mint_date<C: ChainRpc>(
    rpc: &C,
    token_id: u64,
    records: &[LogRecord],
) -> anyhow::Result<Option<DateTime<Utc>>> {
    for record in records {
        if decode_token_id(&record.data) != Some(token_id) {
            continue;
        }

        let timestamp = rpc.get_block_timestamp(record.block_number).await?;
        let mint_date = i64::try_from(timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "block {} carries out-of-range timestamp {}",
                    record.block_number,
                    timestamp
                )
            })?;
        return Ok(Some(mint_date));
    }
    Ok(None)
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    #[test]
    fn decodes_first_word_as_token_id() {
        let mut data = U256::from(42u64).to_be_bytes::<32>().to_vec();
        // trailing quantity word must be ignored
        data.extend_from_slice(&U256::from(7u64).to_be_bytes::<32>());
        assert_eq!(decode_token_id(&data), Some(42));
    }

    #[test]
    fn rejects_short_payloads() {
        assert_eq!(decode_token_id(&[0u8; 31]), None);
        assert_eq!(decode_token_id(&[]), None);
    }

    #[test]
    fn rejects_oversized_token_ids() {
        let data = Bytes::from(U256::MAX.to_be_bytes::<32>());
        assert_eq!(decode_token_id(&data), None);
    }
}
