use std::sync::Arc;
use std::time::Duration;
use tokenprices::infrastructure::{InMemoryKeyValueStore, ManualClock, MockQuoteTransport};
use tokenprices::{ClientSettings, PriceClient, PriceError, QuoteSource, TokenQuote};
use tokio::sync::mpsc;
use tokio::time::Instant;

fn client_for(mock: &MockQuoteTransport) -> Arc<PriceClient> {
    let settings = ClientSettings {
        min_request_delay: Duration::ZERO,
        ..ClientSettings::default()
    };
    let client = PriceClient::builder()
        .transport(Arc::new(mock.clone()))
        .store(Arc::new(InMemoryKeyValueStore::new()))
        .clock(Arc::new(ManualClock::default()))
        .settings(settings)
        .build()
        .expect("Failed to build client");
    Arc::new(client)
}

fn bitcoin_market() -> MockQuoteTransport {
    let mock = MockQuoteTransport::new();
    mock.insert_quote(TokenQuote::priced("bitcoin", "btc", "Bitcoin", 50_000.0));
    mock
}

#[tokio::test(start_paused = true)]
async fn test_first_update_is_immediate_and_cancel_stops_ticks() {
    let mock = bitcoin_market();
    let client = client_for(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let started = Instant::now();

    let handle = client
        .start_polling(vec!["BTC".to_string()], Duration::from_secs(1), move |quotes| {
            let _ = tx.send(quotes);
        })
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].source, QuoteSource::Live);

    handle.cancel();
    assert!(handle.is_cancelled());
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(handle.is_finished());
    assert!(rx.try_recv().is_err());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_cancels_subscription() {
    let mock = bitcoin_market();
    let client = client_for(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = client
        .start_polling(vec!["BTC".to_string()], Duration::from_secs(1), move |quotes| {
            let _ = tx.send(quotes);
        })
        .unwrap();
    rx.recv().await.unwrap();
    drop(handle);

    // Sender lives in the callback, so the channel closes once the task ends
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_widens_after_failures_and_resets_on_success() {
    let mock = bitcoin_market();
    mock.fail_with(Some(PriceError::RateLimited));
    let client = client_for(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let interval = Duration::from_secs(1);

    let _handle = client
        .start_polling(vec!["BTC".to_string()], interval, move |quotes: Vec<TokenQuote>| {
            let _ = tx.send((Instant::now(), quotes));
        })
        .unwrap();

    let mut ticks = Vec::new();
    for _ in 0..4 {
        let (at, quotes) = rx.recv().await.unwrap();
        assert_eq!(quotes[0].source, QuoteSource::Synthetic);
        ticks.push(at);
    }
    // Two failures keep the base interval; the third widens to interval * 4
    assert!(ticks[1] - ticks[0] < interval * 2);
    assert!(ticks[2] - ticks[1] < interval * 2);
    let widened = ticks[3] - ticks[2];
    assert!(widened >= interval * 4 && widened < interval * 5);

    mock.fail_with(None);
    let (recovered_at, quotes) = rx.recv().await.unwrap();
    assert_eq!(quotes[0].source, QuoteSource::Live);
    assert!(recovered_at - ticks[3] >= interval * 5);

    let (next_at, _) = rx.recv().await.unwrap();
    let reset = next_at - recovered_at;
    assert!(reset >= interval && reset < interval * 2);
    assert_eq!(client.metrics().polls_total.with_label_values(&["synthetic"]).get(), 4.0);
}

#[tokio::test]
async fn test_start_polling_rejects_bad_arguments() {
    let client = client_for(&bitcoin_market());

    assert!(matches!(
        client.start_polling(Vec::new(), Duration::from_secs(1), |_| {}),
        Err(PriceError::InvalidArgument { .. })
    ));
    assert!(matches!(
        client.start_polling(vec!["BTC".to_string()], Duration::ZERO, |_| {}),
        Err(PriceError::InvalidArgument { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_mid_fetch_discards_result() {
    let mock = bitcoin_market();
    mock.set_latency(Some(Duration::from_millis(500)));
    let client = client_for(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = client
        .start_polling(vec!["BTC".to_string()], Duration::from_secs(1), move |quotes| {
            let _ = tx.send(quotes);
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.call_count(), 1);
    drop(handle);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(rx.recv().await.is_none());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_fetch_discards_result() {
    let mock = bitcoin_market();
    mock.set_latency(Some(Duration::from_millis(500)));
    let client = client_for(&mock);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = client
        .start_polling(vec!["BTC".to_string()], Duration::from_secs(1), move |quotes| {
            let _ = tx.send(quotes);
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(handle.is_finished());
    assert!(rx.try_recv().is_err());
    assert_eq!(mock.call_count(), 1);
}
