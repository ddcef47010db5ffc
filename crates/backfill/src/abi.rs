use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{sol, SolCall};
use anyhow::Context;
use dropfill_chain_client::ChainRpc;


// Minimal surface of a drop-style 1155 contract: collection name, total
// supply and per-token metadata pointer.
sol! {
    interface IDrop {
        function name() external view returns (string);
        function nextTokenId() external view returns (uint256);
        function uri(uint256 id) external view returns (string);
    }
}


/// Transfer event emitted on every mint; mints are the occurrences whose
/// `from` topic is the zero address.
pub const TRANSFER_SINGLE_SIGNATURE: &str =
    "TransferSingle(address,address,address,uint256,uint256)";


pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}


/// The zero address left-padded to topic width.
pub fn zero_address_topic() -> B256 {
    B256::ZERO
}


/// Typed read-only calls against a drop contract.
pub struct DropContract<'a, C> {
    rpc: &'a C,
    address: Address,
}

impl<'a, C: ChainRpc> DropContract<'a, C> {
    pub fn new(rpc: &'a C, address: Address) -> Self {
        Self { rpc, address }
    }

    pub async fn name(&self) -> anyhow::Result<String> {
        let output = self
            .rpc
            .call(self.address, IDrop::nameCall {}.abi_encode().into())
            .await?;
        IDrop::nameCall::abi_decode_returns(&output).context("failed to decode name()")
    }

    pub async fn next_token_id(&self) -> anyhow::Result<u64> {
        let output = self
            .rpc
            .call(self.address, IDrop::nextTokenIdCall {}.abi_encode().into())
            .await?;
        let supply =
            IDrop::nextTokenIdCall::abi_decode_returns(&output).context("failed to decode nextTokenId()")?;
        supply
            .try_into()
            .map_err(|_| anyhow::anyhow!("nextTokenId {} does not fit in u64", supply))
    }

    pub async fn uri(&self, token_id: u64) -> anyhow::Result<String> {
        let call = IDrop::uriCall {
            id: U256::from(token_id),
        };
        let output = self.rpc.call(self.address, call.abi_encode().into()).await?;
        IDrop::uriCall::abi_decode_returns(&output)
            .with_context(|| format!("failed to decode uri({})", token_id))
    }
}
