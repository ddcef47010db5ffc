use std::fmt::{Display, Formatter};


/// Conditions that abort the run for a contract.
///
/// Everything else is either absorbed by a retry loop or degrades the
/// affected token record; only these categories terminate the process,
/// each with its own exit code.
#[derive(Debug)]
pub enum FatalError {
    UnsupportedNetwork(String),
    ContractRead {
        what: &'static str,
        source: anyhow::Error,
    },
    NoMintLogsFound {
        network: String,
        contract: String,
    },
    TokenOutOfRange {
        token_id: u64,
        last_id: u64,
    },
    RetriesExhausted {
        operation: String,
        attempts: u32,
        source: anyhow::Error,
    },
}


impl FatalError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::UnsupportedNetwork(_) => 2,
            FatalError::TokenOutOfRange { .. } => 2,
            FatalError::ContractRead { .. } => 3,
            FatalError::NoMintLogsFound { .. } => 4,
            FatalError::RetriesExhausted { .. } => 5,
        }
    }
}


impl Display for FatalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalError::UnsupportedNetwork(network) => {
                write!(f, "unsupported network: {}", network)
            }
            FatalError::ContractRead { what, source } => {
                write!(f, "failed to read {} from the contract: {:#}", what, source)
            }
            FatalError::NoMintLogsFound { network, contract } => {
                write!(
                    f,
                    "no mint event logs were found for {} on {}, \
                     check the contract address and from_block",
                    contract, network
                )
            }
            FatalError::TokenOutOfRange { token_id, last_id } => {
                write!(
                    f,
                    "token id {} exceeds the maximum available id {}",
                    token_id, last_id
                )
            }
            FatalError::RetriesExhausted {
                operation,
                attempts,
                source,
            } => {
                write!(
                    f,
                    "{} did not succeed after {} attempts: {:#}",
                    operation, attempts, source
                )
            }
        }
    }
}


impl std::error::Error for FatalError {}


/// Exit code for an arbitrary run failure (1 unless the cause is fatal
/// with a category of its own).
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<FatalError>()
        .map(FatalError::exit_code)
        .unwrap_or(1)
}
