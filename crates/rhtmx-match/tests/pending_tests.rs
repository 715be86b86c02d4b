//! Pending-state timing, driven by Tokio's paused clock

use rhtmx_match::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn slow_match(options: RouterOptions, loader_ms: u64) -> RouteMatch {
    let route = RouteDefinition::new("/slow").with_loader(move |_ctx| async move {
        sleep(Duration::from_millis(loader_ms)).await;
        Ok(json!({"slow": true}))
    });
    RouteMatch::new(
        Arc::new(RouterContext::new(options)),
        Arc::new(route),
        "/slow",
        HashMap::new(),
    )
}

fn spawn_load(m: &RouteMatch) -> tokio::task::JoinHandle<()> {
    let m = m.clone();
    tokio::spawn(async move { m.load().await })
}

#[tokio::test(start_paused = true)]
async fn test_pending_minimum_holds_completion() {
    let m = slow_match(
        RouterOptions::default()
            .with_pending_ms(Duration::from_millis(50))
            .with_pending_min_ms(Duration::from_millis(100)),
        60,
    );
    let start = Instant::now();
    let load = spawn_load(&m);

    sleep(Duration::from_millis(40)).await;
    assert!(!m.is_pending());

    sleep(Duration::from_millis(15)).await;
    assert!(m.is_pending());
    assert_eq!(m.status(), MatchStatus::Loading);

    // Data is committed at 60ms but the load waits out the minimum.
    sleep(Duration::from_millis(10)).await;
    assert_eq!(m.status(), MatchStatus::Success);
    assert!(m.is_pending());
    assert!(!load.is_finished());

    load.await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(150), "settled after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(160), "settled after {elapsed:?}");
    assert!(!m.is_pending());
    assert!(!m.is_fetching());
}

#[tokio::test(start_paused = true)]
async fn test_fast_load_never_pending() {
    let m = slow_match(
        RouterOptions::default()
            .with_pending_ms(Duration::from_millis(50))
            .with_pending_min_ms(Duration::from_millis(100)),
        10,
    );
    let start = Instant::now();

    m.load().await;
    assert!(start.elapsed() < Duration::from_millis(50));

    sleep(Duration::from_millis(200)).await;
    assert!(!m.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_pending_without_minimum_settles_with_loader() {
    let m = slow_match(
        RouterOptions::default().with_pending_ms(Duration::from_millis(50)),
        80,
    );
    let start = Instant::now();
    let load = spawn_load(&m);

    sleep(Duration::from_millis(60)).await;
    assert!(m.is_pending());

    load.await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(80));
    assert!(elapsed < Duration::from_millis(90));
    assert!(!m.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_background_refetch_is_never_pending() {
    let m = slow_match(
        RouterOptions::default().with_pending_ms(Duration::from_millis(10)),
        50,
    );
    m.load().await;
    assert_eq!(m.status(), MatchStatus::Success);

    let refetch = spawn_load(&m);
    sleep(Duration::from_millis(30)).await;
    assert!(m.is_fetching());
    assert!(!m.is_pending());

    refetch.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pending_fires_notification() {
    let router = Arc::new(RouterContext::new(
        RouterOptions::default().with_pending_ms(Duration::from_millis(20)),
    ));
    let mut events = router.subscribe();
    let route = RouteDefinition::new("/").with_loader(|_ctx| async {
        sleep(Duration::from_millis(100)).await;
        Ok(json!({}))
    });
    let m = RouteMatch::new(router, Arc::new(route), "/", HashMap::new());
    let load = spawn_load(&m);

    sleep(Duration::from_millis(1)).await;
    // Load start.
    assert!(events.try_recv().is_ok());
    assert!(events.try_recv().is_err());

    sleep(Duration::from_millis(25)).await;
    let event = events.try_recv().unwrap();
    assert_eq!(&event.match_id, m.match_id());
    assert!(m.is_pending());

    load.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_clears_pending_mid_load() {
    let m = slow_match(
        RouterOptions::default()
            .with_pending_ms(Duration::from_millis(10))
            .with_pending_min_ms(Duration::from_millis(500)),
        50,
    );
    let start = Instant::now();
    let load = spawn_load(&m);

    sleep(Duration::from_millis(20)).await;
    assert!(m.is_pending());

    m.cancel();
    assert!(!m.is_pending());

    // The minimum wait was dropped with the pending state.
    load.await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_minimum_wait() {
    let router = Arc::new(RouterContext::new(
        RouterOptions::default()
            .with_pending_ms(Duration::from_millis(10))
            .with_pending_min_ms(Duration::from_millis(500)),
    ));
    let route = RouteDefinition::new("/").with_loader(|_ctx| async {
        sleep(Duration::from_millis(20)).await;
        Ok(json!({}))
    });
    let m = RouteMatch::new(router.clone(), Arc::new(route), "/", HashMap::new());
    let start = Instant::now();
    let load = spawn_load(&m);

    // Data is in; the load is holding for the minimum.
    sleep(Duration::from_millis(30)).await;
    assert!(m.is_pending());
    assert_eq!(m.status(), MatchStatus::Success);
    assert!(!load.is_finished());

    let mut events = router.subscribe();
    m.cancel();

    assert!(!m.is_pending());
    let event = events.try_recv().unwrap();
    assert_eq!(&event.match_id, m.match_id());

    load.await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(40));
    assert!(!m.is_fetching());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_pending_notifies_only_when_pending() {
    let router = Arc::new(RouterContext::new(
        RouterOptions::default().with_pending_ms(Duration::from_millis(10)),
    ));
    let route = RouteDefinition::new("/").with_loader(|_ctx| async {
        sleep(Duration::from_millis(100)).await;
        Ok(json!({}))
    });
    let m = RouteMatch::new(router.clone(), Arc::new(route), "/", HashMap::new());
    let mut events = router.subscribe();

    m.cancel_pending();
    assert!(events.try_recv().is_err());

    let load = spawn_load(&m);
    sleep(Duration::from_millis(15)).await;
    assert!(m.is_pending());
    while events.try_recv().is_ok() {}

    m.cancel_pending();
    assert!(events.try_recv().is_ok());
    m.cancel_pending();
    assert!(events.try_recv().is_err());

    load.await.unwrap();
}
