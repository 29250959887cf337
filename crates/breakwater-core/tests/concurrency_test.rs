//! Breakers under concurrent load

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use breakwater_core::breaker::{
    Breaker, BreakerConfig, BreakerError, BreakerManager, CircuitState, Rejection,
};
use breakwater_core::clock::ManualClock;
use futures::future::join_all;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("breakwater_core=debug")
        .with_test_writer()
        .try_init();
}

fn failing() -> Result<(), io::Error> {
    Err(io::Error::other("connection refused"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_open_circuit_once() {
    init_tracing();
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let breaker = Arc::new(Breaker::new(
        BreakerConfig::default()
            .with_name("flood")
            .with_threshold(10),
    ));
    breaker.on_state_change(move |change| {
        if change.to == CircuitState::Open {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let tasks = (0..200).map(|_| {
        let breaker = Arc::clone(&breaker);
        tokio::spawn(async move { breaker.call(|| async { failing() }).await })
    });
    let results = join_all(tasks).await;

    let mut inner = 0;
    let mut rejected = 0;
    for result in results {
        match result.unwrap() {
            Err(BreakerError::Inner(_)) => inner += 1,
            Err(BreakerError::Rejected(Rejection::CircuitOpen)) => rejected += 1,
            other => panic!("unexpected outcome: {:?}", other.map_err(|e| e.to_string())),
        }
    }

    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(inner >= 10);
    assert_eq!(inner + rejected, 200);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn half_open_never_exceeds_probe_budget() {
    init_tracing();
    let clock = Arc::new(ManualClock::new());
    let breaker = Arc::new(Breaker::new(
        BreakerConfig::default()
            .with_threshold(1)
            .with_half_open_max_requests(3)
            .with_success_threshold(100)
            .with_clock(clock.clone()),
    ));
    breaker.trip();
    clock.advance(breaker.config().timeout);

    let running = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));

    let tasks = (0..64).map(|_| {
        let breaker = Arc::clone(&breaker);
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        tokio::spawn(async move {
            breaker
                .call(|| async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, io::Error>(())
                })
                .await
        })
    });

    for result in join_all(tasks).await {
        if let Err(err) = result.unwrap() {
            assert_eq!(err.rejection(), Some(Rejection::TooManyRequests));
        }
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.stats().half_open_in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn manager_shares_breakers_across_tasks() {
    let manager = Arc::new(BreakerManager::with_config(
        BreakerConfig::default().with_threshold(1_000),
    ));

    let tasks = (0..100).map(|i| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let key = format!("dep-{}", i % 4);
            manager
                .call(&key, || async { Ok::<_, io::Error>(()) })
                .await
                .unwrap();
        })
    });
    join_all(tasks).await;

    assert_eq!(manager.len(), 4);
    let total: u64 = manager
        .stats()
        .iter()
        .map(|(_, stats)| stats.total_calls)
        .sum();
    assert_eq!(total, 100);
}
