//! Polling controller behavior under a paused Tokio clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codetrack_core::records::{ApprovalStatus, Role, User};
use codetrack_core::{Domain, SyncError};
use codetrack_sync::{fetch_fn, FetchFn, PollState, PollingController, SubscriberToken, SyncStore};
use parking_lot::Mutex;

fn roster(n: usize) -> Vec<User> {
    (0..n)
        .map(|i| User::new(format!("u{i}").as_str(), format!("User {i}"), Role::Student))
        .collect()
}

/// Fetch that returns `calls` users after `delay`, counting invocations.
fn slow_roster(calls: Arc<AtomicUsize>, delay: Duration) -> FetchFn<User> {
    fetch_fn(move || {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(delay).await;
            Ok(roster(n))
        }
    })
}

fn controller(store: &SyncStore) -> PollingController {
    PollingController::new(store.clone(), Duration::from_secs(30))
}

#[tokio::test(start_paused = true)]
async fn first_fetch_populates_and_notifies_once() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let seen = Arc::new(Mutex::new(Vec::new()));

    assert!(store.snapshot::<User>().is_empty());
    let sink = seen.clone();
    store.subscribe::<User, _>(SubscriberToken::new(), move |snapshot| {
        let ids: Vec<String> = snapshot.iter().map(|u| u.id.to_string()).collect();
        sink.lock().push(ids);
    });

    let fetch: FetchFn<User> = fetch_fn(|| async { Ok(roster(3)) });
    let snapshot = polling.refresh_now(fetch).await.unwrap();

    assert_eq!(snapshot.len(), 3);
    assert_eq!(store.snapshot::<User>().len(), 3);
    assert_eq!(*seen.lock(), vec![vec!["u0".to_string(), "u1".into(), "u2".into()]]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_share_one_fetch() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = slow_roster(calls.clone(), Duration::from_millis(100));

    let (a, b) = tokio::join!(
        polling.refresh_now(fetch.clone()),
        polling.refresh_now(fetch.clone())
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.version(), b.version());
    assert!(a.same_items(&b));
    assert_eq!(store.version(Domain::Users), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failures_are_shared_too() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetch: FetchFn<User> = fetch_fn(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(SyncError::transient(Domain::Users, "503"))
        }
    });

    let (a, b) = tokio::join!(polling.refresh_now(fetch.clone()), polling.refresh_now(fetch));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap_err(), b.unwrap_err());
}

#[tokio::test(start_paused = true)]
async fn failing_poll_keeps_snapshot_and_keeps_ticking() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetch: FetchFn<User> = fetch_fn(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(roster(3))
            } else {
                Err(SyncError::transient(Domain::Users, "connection reset"))
            }
        }
    });

    polling.start_polling(Duration::from_secs(1), fetch).unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    assert!(calls.load(Ordering::SeqCst) >= 3);
    let snapshot = store.snapshot::<User>();
    assert_eq!(snapshot.version(), 1);
    assert_eq!(snapshot.len(), 3);

    let status = polling.status(Domain::Users);
    assert!(status.consecutive_failures >= 2);
    assert!(status.last_error.as_ref().is_some_and(SyncError::is_transient));
    assert_eq!(polling.state(Domain::Users), PollState::Idle);
    polling.shutdown();
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_fetch_land_without_another_tick() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));

    polling
        .start_polling(
            Duration::from_secs(10),
            slow_roster(calls.clone(), Duration::from_millis(500)),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(polling.state(Domain::Users), PollState::Fetching);

    assert!(polling.stop_polling(Domain::Users));
    assert!(!polling.stop_polling(Domain::Users));
    assert_eq!(polling.state(Domain::Users), PollState::Stopped);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.version(Domain::Users), 1);
    assert!(!polling.is_fetching(Domain::Users));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_replaces_timer() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let slow_calls = Arc::new(AtomicUsize::new(0));
    let fast_calls = Arc::new(AtomicUsize::new(0));

    polling
        .start_polling(Duration::from_secs(60), slow_roster(slow_calls.clone(), Duration::ZERO))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    polling
        .start_polling(Duration::from_secs(1), slow_roster(fast_calls.clone(), Duration::ZERO))
        .unwrap();
    assert_eq!(polling.interval(Domain::Users), Some(Duration::from_secs(1)));

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
    assert!(fast_calls.load(Ordering::SeqCst) >= 3);
    polling.shutdown();
    assert_eq!(polling.state(Domain::Users), PollState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_write_runs_behind_in_flight_fetch() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = slow_roster(calls.clone(), Duration::from_millis(100));

    let stale = fetch.clone();
    let background = polling.clone();
    let early = tokio::spawn(async move { background.refresh_now(stale).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(polling.is_fetching(Domain::Users));

    // Two writes land while the first fetch is outstanding.
    let (first, second) = tokio::join!(
        polling.refresh_after_write(fetch.clone()),
        polling.refresh_after_write(fetch.clone())
    );

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(first.unwrap().len(), 2);
    assert_eq!(second.unwrap().len(), 2);
    assert_eq!(early.await.unwrap().unwrap().len(), 2);
    assert_eq!(store.version(Domain::Users), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_write_when_idle_fetches_once() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));

    let snapshot = polling
        .refresh_after_write(slow_roster(calls.clone(), Duration::from_millis(5)))
        .await
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_and_next_refresh_succeeds() {
    let store = SyncStore::new();
    let polling = PollingController::new(store.clone(), Duration::from_secs(2));
    let hung: FetchFn<User> = fetch_fn(|| async {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(roster(1))
    });

    let err = polling.refresh_now(hung).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout { domain: Domain::Users, after_ms: 2_000 }));
    assert!(err.is_transient());
    assert!(!polling.is_fetching(Domain::Users));

    let ok: FetchFn<User> = fetch_fn(|| async {
        Ok(vec![User::new("u9", "Nine", Role::Student).with_status(ApprovalStatus::Pending)])
    });
    let snapshot = polling.refresh_now(ok).await.unwrap();
    assert_eq!(snapshot.version(), 1);
    assert!(snapshot.items()[0].is_pending());
    assert_eq!(polling.status(Domain::Users).consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn unauthenticated_poll_does_not_stop_timer() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetch: FetchFn<User> = fetch_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(SyncError::NotAuthenticated) }
    });

    polling.start_polling(Duration::from_secs(1), fetch).unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(store.version(Domain::Users), 0);
    polling.shutdown();
}

#[tokio::test(start_paused = true)]
async fn panicking_fetch_does_not_wedge_the_domain() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetch: FetchFn<User> = fetch_fn(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("remote client blew up");
            }
            Ok(roster(2))
        }
    });

    let err = polling.refresh_now(fetch.clone()).await.unwrap_err();
    assert!(matches!(err, SyncError::Internal { .. }), "got {err:?}");
    assert!(!polling.is_fetching(Domain::Users));

    let snapshot = polling.refresh_now(fetch.clone()).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    polling.start_polling(Duration::from_secs(1), fetch).unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(calls.load(Ordering::SeqCst) >= 4);
    assert!(store.version(Domain::Users) >= 3);
    polling.shutdown();
}

#[tokio::test(start_paused = true)]
async fn zero_interval_never_registers_a_poller() {
    let store = SyncStore::new();
    let polling = controller(&store);
    let calls = Arc::new(AtomicUsize::new(0));

    let result = polling.start_polling(Duration::ZERO, slow_roster(calls.clone(), Duration::ZERO));
    assert!(matches!(result, Err(SyncError::Config { .. })));
    assert_eq!(polling.state(Domain::Users), PollState::Stopped);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
