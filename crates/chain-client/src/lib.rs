mod client;
mod types;

pub use client::{default_http_client, ChainRpc, RpcClient};
pub use types::{quantity, LogFilter, LogRecord};
