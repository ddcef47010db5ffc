use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::DateTime;
use dropfill::error::FatalError;
use dropfill::fetcher::{MetadataFetcher, MISSING_FIELD};
use dropfill::resolver::resolve_mint_date;
use dropfill::retry::RetryPolicy;
use dropfill_chain_client::LogRecord;

mod support;
use support::{mint_log, MockDocumentStore, MockRpc, Scripted, CONTRACT};


fn quick_retry() -> RetryPolicy {
    RetryPolicy::bounded(Duration::ZERO, 5)
}

fn fetcher<'a>(
    rpc: &'a MockRpc,
    documents: &'a MockDocumentStore,
    records: &'a [LogRecord],
) -> MetadataFetcher<'a, MockRpc, MockDocumentStore> {
    MetadataFetcher::new(rpc, documents, CONTRACT, rpc.next_token_id, records, quick_retry())
}


#[tokio::test]
async fn assembles_metadata_with_rewritten_pointers() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 2;
    rpc.uris.insert(1, "ipfs://QmDoc/1.json".to_string());
    rpc.timestamps.insert(100, 1_700_000_000);
    let records = vec![mint_log(100, 1)];

    let documents = MockDocumentStore::new().with(
        "https://ipfs.io/ipfs/QmDoc/1.json",
        Scripted::Json(serde_json::json!({
            "name": "Drop #1",
            "description": "first drop",
            "image": "ipfs://QmImg/1.png"
        })),
    );

    let token = fetcher(&rpc, &documents, &records).fetch(1).await.unwrap();
    assert_eq!(token.name, "Drop #1");
    assert_eq!(token.description, "first drop");
    assert_eq!(token.image_url, "https://ipfs.io/ipfs/QmImg/1.png");
    assert_eq!(token.mint_date, DateTime::from_timestamp(1_700_000_000, 0));
}


#[tokio::test]
async fn missing_document_fields_default_to_sentinel() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 2;
    rpc.uris.insert(1, "https://example.com/1.json".to_string());
    rpc.timestamps.insert(100, 1_700_000_000);
    let records = vec![mint_log(100, 1)];

    let documents = MockDocumentStore::new().with(
        "https://example.com/1.json",
        Scripted::Json(serde_json::json!({ "name": "only a name" })),
    );

    let token = fetcher(&rpc, &documents, &records).fetch(1).await.unwrap();
    assert_eq!(token.name, "only a name");
    assert_eq!(token.description, MISSING_FIELD);
    assert_eq!(token.image_url, MISSING_FIELD);
}


#[tokio::test]
async fn gone_document_is_terminal_with_zero_retries() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 2;
    rpc.uris.insert(1, "ipfs://QmGone".to_string());
    rpc.timestamps.insert(100, 1_700_000_000);
    let records = vec![mint_log(100, 1)];

    let documents =
        MockDocumentStore::new().with("https://ipfs.io/ipfs/QmGone", Scripted::Gone);

    let token = fetcher(&rpc, &documents, &records).fetch(1).await.unwrap();
    assert_eq!(token.name, MISSING_FIELD);
    assert_eq!(token.description, MISSING_FIELD);
    assert_eq!(token.image_url, MISSING_FIELD);
    // the mint date still resolves even when the document is gone
    assert_eq!(token.mint_date, DateTime::from_timestamp(1_700_000_000, 0));

    assert_eq!(documents.calls.load(Ordering::SeqCst), 1);
    assert_eq!(rpc.uri_calls.load(Ordering::SeqCst), 1);
}


#[tokio::test]
async fn transient_document_failures_are_retried() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 2;
    rpc.uris.insert(1, "https://example.com/1.json".to_string());
    rpc.timestamps.insert(100, 1_700_000_000);
    let records = vec![mint_log(100, 1)];

    let mut documents = MockDocumentStore::new().with(
        "https://example.com/1.json",
        Scripted::Json(serde_json::json!({ "name": "Drop #1" })),
    );
    documents.fail_first = 2;

    let token = fetcher(&rpc, &documents, &records).fetch(1).await.unwrap();
    assert_eq!(token.name, "Drop #1");
    assert_eq!(documents.calls.load(Ordering::SeqCst), 3);
}


#[tokio::test]
async fn missing_mint_log_degrades_to_a_null_date() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 6;
    rpc.uris.insert(5, "https://example.com/5.json".to_string());
    // only token 1 was ever seen in the logs
    let records = vec![mint_log(100, 1)];

    let documents = MockDocumentStore::new().with(
        "https://example.com/5.json",
        Scripted::Json(serde_json::json!({ "name": "Drop #5" })),
    );

    let token = fetcher(&rpc, &documents, &records).fetch(5).await.unwrap();
    assert_eq!(token.mint_date, None);
}


#[tokio::test]
async fn out_of_range_token_is_fatal_before_any_io() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 4;
    let records = vec![mint_log(100, 1)];
    let documents = MockDocumentStore::new();

    let err = fetcher(&rpc, &documents, &records).fetch(99).await.unwrap_err();
    let fatal = err.downcast_ref::<FatalError>().unwrap();
    assert!(matches!(
        fatal,
        FatalError::TokenOutOfRange { token_id: 99, last_id: 3 }
    ));
    assert_eq!(fatal.exit_code(), 2);
    assert_eq!(documents.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rpc.uri_calls.load(Ordering::SeqCst), 0);
}


#[tokio::test]
async fn fetching_before_the_scan_is_an_error() {
    let mut rpc = MockRpc::new(500);
    rpc.next_token_id = 4;
    let documents = MockDocumentStore::new();

    let result = fetcher(&rpc, &documents, &[]).fetch(1).await;
    assert!(result.is_err());
    assert_eq!(rpc.uri_calls.load(Ordering::SeqCst), 0);
}


#[tokio::test]
async fn mint_date_resolves_to_the_matching_block_timestamp() {
    let mut rpc = MockRpc::new(500);
    rpc.timestamps.insert(100, 1000);
    rpc.timestamps.insert(101, 2000);
    let records = vec![mint_log(100, 1), mint_log(101, 2)];

    let date = resolve_mint_date(&rpc, 2, &records).await.unwrap();
    assert_eq!(date, DateTime::from_timestamp(2000, 0));

    let absent = resolve_mint_date(&rpc, 7, &records).await.unwrap();
    assert_eq!(absent, None);
}


#[tokio::test]
async fn out_of_range_block_timestamp_is_an_error() {
    let mut rpc = MockRpc::new(500);
    rpc.timestamps.insert(100, u64::MAX);
    let records = vec![mint_log(100, 1)];

    let err = resolve_mint_date(&rpc, 1, &records).await.unwrap_err();
    assert!(err.to_string().contains("out-of-range timestamp"));
}
