//! Run group supervision tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wechat_token::{Group, GroupError, Signal, SignalWatcher};

/// Adds an actor that blocks until interrupted and records both events.
fn add_blocking(group: &mut Group, interrupts: &Arc<AtomicUsize>, finished: &Arc<AtomicUsize>) {
    let token = CancellationToken::new();
    let stop = token.clone();
    let interrupts = Arc::clone(interrupts);
    let finished = Arc::clone(finished);
    group.add(
        "blocking",
        async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        move |_| {
            interrupts.fetch_add(1, Ordering::SeqCst);
            stop.cancel();
        },
    );
}

#[tokio::test]
async fn test_any_actor_returning_interrupts_all_once() {
    for first in 0..4 {
        let interrupts = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = Group::new();

        for idx in 0..4 {
            if idx == first {
                let interrupts = Arc::clone(&interrupts);
                let finished = Arc::clone(&finished);
                group.add(
                    "failing",
                    async move {
                        finished.fetch_add(1, Ordering::SeqCst);
                        Err(GroupError::actor("failing", anyhow::anyhow!("boom")))
                    },
                    move |err: Option<&GroupError>| {
                        assert!(err.is_some());
                        interrupts.fetch_add(1, Ordering::SeqCst);
                    },
                );
            } else {
                add_blocking(&mut group, &interrupts, &finished);
            }
        }
        assert_eq!(group.len(), 4);

        let err = group.run().await.unwrap_err();
        assert_eq!(err.to_string(), "failing: boom");
        assert_eq!(interrupts.load(Ordering::SeqCst), 4);
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }
}

#[tokio::test]
async fn test_signal_watcher_outcome_is_group_outcome() {
    let (tx, rx) = mpsc::channel(1);
    let watcher = SignalWatcher::from_channel(rx);
    let interrupter = watcher.interrupter();

    let interrupts = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let mut group = Group::new();
    add_blocking(&mut group, &interrupts, &finished);
    add_blocking(&mut group, &interrupts, &finished);
    group.add("signal", watcher.run(), move |_| interrupter.cancel());

    tx.send(Signal::Terminate).await.unwrap();
    let err = group.run().await.unwrap_err();

    assert!(matches!(err, GroupError::Signal(Signal::Terminate)));
    assert_eq!(err.to_string(), "received signal terminated");
    assert_eq!(interrupts.load(Ordering::SeqCst), 2);
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clean_exit_stops_signal_watcher() {
    let (_tx, rx) = mpsc::channel(1);
    let watcher = SignalWatcher::from_channel(rx);
    let interrupter = watcher.interrupter();

    let mut group = Group::new();
    group.add("done", async { Ok(()) }, |_| {});
    group.add("signal", watcher.run(), move |_| interrupter.cancel());

    assert!(group.run().await.is_ok());
}
