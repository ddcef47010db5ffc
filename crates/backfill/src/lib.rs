pub mod abi;
pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod store;
pub mod vision;
