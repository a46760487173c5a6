mod mock_source;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use max_pain::cache::{CacheKey, DiskCache, MemoryCache, SnapshotStore};
use max_pain::error::ChainError;
use max_pain::fetch_data::Acquirer;
use max_pain::fetch_data::retry::{Backoff, RetryPolicy};
use max_pain::fetch_data::source::{ExpirationMatch, RawChain};
use max_pain::model::AcquisitionStatus;

use mock_source::*;

fn statuses(outcomes: &[max_pain::model::AcquisitionOutcome]) -> Vec<AcquisitionStatus> {
    outcomes.iter().map(|o| o.status).collect()
}

fn three_liquid() -> MockSource {
    MockSource::new()
        .with("AAA", Reply::Chain(liquid("AAA")))
        .with("BBB", Reply::Chain(liquid("BBB")))
        .with("CCC", Reply::Chain(liquid("CCC")))
}

// ── Cache ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let names = tickers(&["AAA", "BBB", "CCC"]);

    let first_source = three_liquid();
    let first_calls = first_source.call_counter();
    let mut first = Acquirer::new(Box::new(first_source), DiskCache::open(dir.path()).unwrap())
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::ZERO);
    let report1 = first.run(&names, as_of(), expiration()).await;
    assert_eq!(first_calls.load(Ordering::SeqCst), 3);
    assert_eq!(report1.count(AcquisitionStatus::FetchedNew), 3);

    let second_source = three_liquid();
    let second_calls = second_source.call_counter();
    let mut second = Acquirer::new(Box::new(second_source), DiskCache::open(dir.path()).unwrap())
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::ZERO);
    let report2 = second.run(&names, as_of(), expiration()).await;

    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(statuses(&report2.outcomes), vec![AcquisitionStatus::FetchedCached; 3]);
    assert_eq!(
        serde_json::to_string(&report1.snapshots).unwrap(),
        serde_json::to_string(&report2.snapshots).unwrap()
    );
}

#[tokio::test]
async fn test_stale_as_of_is_not_a_hit() {
    let mut store = MemoryCache::new();
    let yesterday = as_of().pred_opt().unwrap();
    let mut warm = Acquirer::new(Box::new(three_liquid()), MemoryCache::new())
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::ZERO);
    let report = warm.run(&tickers(&["AAA"]), yesterday, expiration()).await;
    let snap = &report.snapshots[0];
    store
        .save(&CacheKey::new("AAA", yesterday, expiration()), snap)
        .unwrap();

    let source = three_liquid();
    let calls = source.call_counter();
    let mut acquirer = Acquirer::new(Box::new(source), store)
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::ZERO);
    let report = acquirer.run(&tickers(&["AAA"]), as_of(), expiration()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes[0].status, AcquisitionStatus::FetchedNew);
    assert_eq!(acquirer.store().len(), 2);
}

#[tokio::test]
async fn test_overwrite_refetches() {
    let names = tickers(&["AAA"]);
    let mut warm = Acquirer::new(Box::new(three_liquid()), MemoryCache::new())
        .with_retry(RetryPolicy::none());
    warm.run(&names, as_of(), expiration()).await;
    let store = warm.into_store();
    assert_eq!(store.len(), 1);

    let source = three_liquid();
    let calls = source.call_counter();
    let mut acquirer = Acquirer::new(Box::new(source), store)
        .with_retry(RetryPolicy::none())
        .with_overwrite(true);
    let report = acquirer.run(&names, as_of(), expiration()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes[0].status, AcquisitionStatus::FetchedNew);
}

// ── Failure isolation ────────────────────────────────────────────────

#[tokio::test]
async fn test_middle_ticker_failure_is_isolated() {
    let source = MockSource::new()
        .with("AAA", Reply::Chain(liquid("AAA")))
        .with("CCC", Reply::Chain(liquid("CCC")));
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::ZERO);

    let report = acquirer
        .run(&tickers(&["AAA", "BBB", "CCC"]), as_of(), expiration())
        .await;

    assert_eq!(
        statuses(&report.outcomes),
        vec![
            AcquisitionStatus::FetchedNew,
            AcquisitionStatus::Failed,
            AcquisitionStatus::FetchedNew,
        ]
    );
    assert_eq!(report.count(AcquisitionStatus::Failed), 1);
    let failed = report.failures().next().unwrap();
    assert_eq!(failed.ticker, "BBB");
    assert!(failed.error_detail.as_deref().unwrap().contains("no option chain listed"));

    let got: Vec<&str> = report.snapshots.iter().map(|s| s.ticker.as_str()).collect();
    assert_eq!(got, vec!["AAA", "CCC"]);
}

#[tokio::test]
async fn test_malformed_chain_keeps_raw_payload() {
    let source = MockSource::new().with(
        "NVDA",
        Reply::Chain(chain("NVDA", None, &[(180, 1200.0, 900.0)])),
    );
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(RetryPolicy::none());

    let report = acquirer.run(&tickers(&["NVDA"]), as_of(), expiration()).await;

    assert_eq!(report.outcomes[0].status, AcquisitionStatus::Failed);
    assert!(report.outcomes[0]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("missing current price"));
    assert!(report.snapshots.is_empty());

    let key = CacheKey::new("NVDA", as_of(), expiration());
    let raw = acquirer.store().rejected(&key).unwrap();
    assert!(raw.contains("NVDA260220C00180000"));
    assert!(acquirer.store().is_empty());
}

#[tokio::test]
async fn test_undecodable_quotes_body_is_kept() {
    let body = "<html><body>Service temporarily moved</body></html>";
    let source = MockSource::new()
        .with(
            "NVDA",
            Reply::Chain(RawChain::QuotesJson {
                body: body.to_string(),
                expiration_match: ExpirationMatch::Nearest,
            }),
        )
        .with("AAPL", Reply::Fail(ChainError::no_data("AAPL", "HTTP 404")));
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(RetryPolicy::none());

    let report = acquirer.run(&tickers(&["NVDA", "AAPL"]), as_of(), expiration()).await;

    assert_eq!(statuses(&report.outcomes), vec![AcquisitionStatus::Failed; 2]);
    let nvda = CacheKey::new("NVDA", as_of(), expiration());
    assert_eq!(acquirer.store().rejected(&nvda), Some(body));
    // Only rejected payloads are kept, not fetch errors
    let aapl = CacheKey::new("AAPL", as_of(), expiration());
    assert_eq!(acquirer.store().rejected(&aapl), None);
}

// ── Retry ────────────────────────────────────────────────────────────

fn fixed_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_secs(1),
        backoff: Backoff::Fixed,
        jitter: 0.0,
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let source = MockSource::new().with("AAA", Reply::FlakyThen(2, liquid("AAA")));
    let calls = source.call_counter();
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(fixed_retry(3));

    let report = acquirer.run(&tickers(&["AAA"]), as_of(), expiration()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.outcomes[0].status, AcquisitionStatus::FetchedNew);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_fails_only_that_ticker() {
    let source = MockSource::new()
        .with("AAA", Reply::FlakyThen(10, liquid("AAA")))
        .with("BBB", Reply::Chain(liquid("BBB")));
    let calls = source.call_counter();
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(fixed_retry(3))
        .with_request_delay(Duration::ZERO);

    let report = acquirer.run(&tickers(&["AAA", "BBB"]), as_of(), expiration()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        statuses(&report.outcomes),
        vec![AcquisitionStatus::Failed, AcquisitionStatus::FetchedNew]
    );
    assert_eq!(
        report.outcomes[0].error_detail.as_deref(),
        Some(ChainError::unavailable("AAA", "connection reset").to_string().as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_data_is_never_retried() {
    let source = MockSource::new().with("BABA", Reply::Fail(ChainError::no_data("BABA", "HTTP 404")));
    let calls = source.call_counter();
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(fixed_retry(5));

    acquirer.run(&tickers(&["BABA"]), as_of(), expiration()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ── Rate limiting ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_delay_only_between_live_fetches() {
    let names = tickers(&["AAA", "BBB", "CCC"]);
    let mut acquirer = Acquirer::new(Box::new(three_liquid()), MemoryCache::new())
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::from_secs(2));

    let start = tokio::time::Instant::now();
    acquirer.run(&names, as_of(), expiration()).await;
    // Two gaps between three fetches; none after the last
    assert_eq!(start.elapsed(), Duration::from_secs(4));

    let start = tokio::time::Instant::now();
    let report = acquirer.run(&names, as_of(), expiration()).await;
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(report.count(AcquisitionStatus::FetchedCached), 3);
}

#[tokio::test(start_paused = true)]
async fn test_uncached_source_skips_cache_and_delay() {
    let source = MockSource::new()
        .with("AAA", Reply::Chain(liquid("AAA")))
        .with("BBB", Reply::Chain(liquid("BBB")))
        .uncached();
    let calls = source.call_counter();
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(RetryPolicy::none())
        .with_request_delay(Duration::from_secs(2));

    let names = tickers(&["AAA", "BBB"]);
    let start = tokio::time::Instant::now();
    acquirer.run(&names, as_of(), expiration()).await;
    let report = acquirer.run(&names, as_of(), expiration()).await;

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.count(AcquisitionStatus::FetchedNew), 2);
    assert!(acquirer.store().is_empty());
}

// ── Interrupt ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancelled_batch_records_remaining_tickers() {
    let source = three_liquid();
    let calls = source.call_counter();
    let flag = Arc::new(AtomicBool::new(true));
    let mut acquirer = Acquirer::new(Box::new(source), MemoryCache::new())
        .with_retry(RetryPolicy::none())
        .with_cancel_flag(flag);

    let report = acquirer
        .run(&tickers(&["AAA", "BBB", "CCC"]), as_of(), expiration())
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.count(AcquisitionStatus::Failed), 3);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.error_detail.as_deref() == Some("interrupted before acquisition")));
}
