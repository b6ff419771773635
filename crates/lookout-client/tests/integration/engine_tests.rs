use std::time::{Duration, Instant};

use lookout_client::{ReqwestFetcher, SelectorExtractor};
use lookout_core::models::Outcome;
use lookout_core::registry::{Registry, SharedRegistry};
use lookout_core::{Engine, EngineConfig, Scheduler, store};

use crate::common::{SLOW_DELAY, spawn_test_server, url};

fn engine(timeout: Duration) -> Engine<ReqwestFetcher, SelectorExtractor> {
    Engine::with_config(
        ReqwestFetcher::new().unwrap(),
        SelectorExtractor::new(),
        EngineConfig::new(timeout),
    )
}

#[tokio::test]
async fn scenario_title_extraction() {
    let addr = spawn_test_server().await;
    let page = url(addr, "/page");

    let mut registry = Registry::new();
    registry.add(&page, ".title");

    let snapshot = engine(Duration::from_secs(5)).run(registry.view()).await;

    let result = snapshot.outcomes[&page].extraction().unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[".title"], vec!["Hello World"]);
}

#[tokio::test]
async fn mixed_success_timeout_and_error() {
    let addr = spawn_test_server().await;
    let page = url(addr, "/page");
    let slow = url(addr, "/slow");
    let missing = url(addr, "/missing");

    let mut registry = Registry::new();
    registry.add(&page, ".title");
    registry.add(&page, ".price");
    registry.add(&page, ".x");
    registry.add(&page, ".absent");
    registry.add(&slow, ".title");
    registry.add(&missing, ".title");

    let started = Instant::now();
    let snapshot = engine(Duration::from_secs(1)).run(registry.view()).await;

    assert!(started.elapsed() < SLOW_DELAY);
    assert_eq!(snapshot.outcomes.len(), 3);

    let result = snapshot.outcomes[&page].extraction().unwrap();
    assert_eq!(result[".title"], vec!["Hello World"]);
    assert_eq!(result[".price"], vec!["100 лв.", "200 лв."]);
    assert_eq!(result[".x"], vec!["spaced  out"]);
    assert!(result[".absent"].is_empty());

    assert_eq!(snapshot.outcomes[&slow], Outcome::Failed);
    assert_eq!(snapshot.outcomes[&missing], Outcome::Failed);
}

#[tokio::test]
async fn manual_run_persists_and_exports() {
    let addr = spawn_test_server().await;
    let page = url(addr, "/page");
    let missing = url(addr, "/missing");
    let dir = tempfile::tempdir().unwrap();

    let registry = SharedRegistry::default();
    registry.add(&page, ".price");
    registry.add(&missing, ".price");

    let (scheduler, mut rx) = Scheduler::new(engine(Duration::from_secs(5)), registry);
    scheduler.manual_run().await.unwrap();

    let mut collection = lookout_core::SnapshotCollection::new();
    while let Ok(snapshot) = rx.try_recv() {
        collection.insert(snapshot);
    }
    assert_eq!(collection.len(), 1);

    let json_path = dir.path().join("snapshots.json");
    store::save(&collection, &json_path).unwrap();
    assert_eq!(store::load(&json_path).unwrap(), collection);

    let csv_path = dir.path().join("snapshots.csv");
    let rows = store::export_csv(&collection, &csv_path).unwrap();
    assert_eq!(rows, 2);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("timestamp,url,selector,text"));
    assert!(csv.contains("100 лв."));
    assert!(!csv.contains(&missing));
}
