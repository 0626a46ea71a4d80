use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use super::SessionsPoller;
use crate::domain::models::Event;
use crate::domain::services::fakes::FakeBackend;
use crate::domain::services::SessionController;
use crate::infrastructure::stores::memory::MemoryStore;

fn list_calls(fake: &FakeBackend) -> usize {
    return fake
        .calls()
        .iter()
        .filter(|call| return *call == "list")
        .count();
}

#[tokio::test(start_paused = true)]
async fn it_refreshes_on_every_tick() {
    let fake = Arc::new(FakeBackend::default());
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let controller = SessionController::new(
        Box::new(fake.clone()),
        Box::new(MemoryStore::default()),
        tx,
    );

    let handle = tokio::spawn(SessionsPoller::start(
        controller,
        Duration::from_millis(100),
    ));
    time::sleep(Duration::from_millis(250)).await;
    handle.abort();

    assert!(list_calls(&fake) >= 3);
    assert!(matches!(rx.try_recv(), Ok(Event::SessionsListed(_))));
}

#[tokio::test(start_paused = true)]
async fn it_keeps_polling_through_failures() {
    let fake = Arc::new(FakeBackend::default());
    fake.fail_list.store(true, Ordering::SeqCst);
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let controller = SessionController::new(
        Box::new(fake.clone()),
        Box::new(MemoryStore::default()),
        tx,
    );

    let handle = tokio::spawn(SessionsPoller::start(
        controller.clone(),
        Duration::from_millis(100),
    ));
    time::sleep(Duration::from_millis(250)).await;
    let failed = list_calls(&fake);
    assert!(rx.try_recv().is_err());

    fake.fail_list.store(false, Ordering::SeqCst);
    time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    assert!(failed >= 3);
    assert!(list_calls(&fake) > failed);
    assert!(controller.sessions().await.is_empty());
}
