mod common;

use common::RecordingAutocomplete;
use pictolink_core::{SuggestionClient, SuggestionPipeline};
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(300);

fn pipeline() -> (
    SuggestionPipeline,
    tokio::sync::mpsc::UnboundedReceiver<pictolink_core::suggest::SuggestionUpdate>,
    Arc<RecordingAutocomplete>,
) {
    let service = Arc::new(RecordingAutocomplete::default());
    let client = Arc::new(SuggestionClient::new(service.clone()));
    let (pipeline, rx) = SuggestionPipeline::new(client, QUIET);
    (pipeline, rx, service)
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_input_issues_one_request_for_the_last_value() {
    let (mut pipeline, mut rx, service) = pipeline();

    pipeline.on_input("quiero co");
    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.on_input("quiero com");
    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.on_input("quiero come");

    let update = rx.recv().await.unwrap();
    assert_eq!(update.query, "come");
    assert_eq!(update.suggestions, vec!["comer", "comes"]);

    tokio::time::sleep(QUIET * 3).await;
    assert_eq!(service.queries(), vec!["come"]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_short_prefix_clears_without_a_request() {
    let (mut pipeline, mut rx, service) = pipeline();

    pipeline.on_input("quiero c");

    let update = rx.recv().await.unwrap();
    assert_eq!(update.query, "c");
    assert!(update.suggestions.is_empty());
    assert!(service.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_prefix_cancels_the_pending_request() {
    let (mut pipeline, mut rx, service) = pipeline();

    pipeline.on_input("hol");
    pipeline.on_input("hola ");

    let update = rx.recv().await.unwrap();
    assert!(update.suggestions.is_empty());
    tokio::time::sleep(QUIET * 3).await;
    assert!(service.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_pipeline_cancels_pending_work() {
    let (mut pipeline, mut rx, service) = pipeline();

    pipeline.on_input("agu");
    drop(pipeline);

    assert!(rx.recv().await.is_none());
    assert!(service.queries().is_empty());
}
