use liveset::{Constant, LiveValue, PaginatorDefaults, QueryState, Statement};
use serde_json::json;

use crate::fixtures::{ages, make_log, people, seed_ages};

#[tokio::test]
async fn subscribe_replays_then_follows() {
    let repo = people();
    seed_ages(&repo, &[1]).await;
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();

    let counts = make_log::<usize>();
    let sink = counts.clone();
    let unsubscribe = select.subscribe(move |set| sink.lock().push(set.count), |_| {});
    seed_ages(&repo, &[2]).await;
    unsubscribe();
    seed_ages(&repo, &[3]).await;

    assert_eq!(*counts.lock(), vec![1, 2]);
    assert_eq!(select.count(), 3);
}

#[tokio::test]
async fn each_write_publishes_once() {
    let repo = people();
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();
    let publishes = make_log::<()>();
    let sink = publishes.clone();
    let _unsubscribe = select.subscribe(move |_| sink.lock().push(()), |_| {});
    publishes.lock().clear();

    seed_ages(&repo, &[1, 2, 3]).await;
    assert_eq!(publishes.lock().len(), 3);
}

#[tokio::test]
async fn watch_receivers_see_new_states() {
    let repo = people();
    let select = repo
        .select(Statement::new().filter("age > 1"), PaginatorDefaults::default())
        .unwrap();
    let mut rx = select.watch();
    let _ = rx.borrow_and_update();

    let waiter = tokio::spawn(async move {
        rx.changed().await.unwrap();
        let state = rx.borrow().clone();
        match state {
            QueryState::Ready(set) => set.count,
            other => panic!("unexpected state {other:?}"),
        }
    });
    seed_ages(&repo, &[5]).await;
    assert_eq!(waiter.await.unwrap(), 1);
}

#[tokio::test]
async fn unrelated_params_do_not_leak_between_queries() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 3]).await;
    let low = LiveValue::new(1);
    let high = LiveValue::new(3);

    let a = repo
        .select(
            Statement::new().filter("age = ?").param(low.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();
    let b = repo
        .select(
            Statement::new().filter("age = ?").param(high.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();

    low.set(2);
    assert_eq!(ages(&a.results()), vec![2]);
    assert_eq!(ages(&b.results()), vec![3]);
}

#[tokio::test]
async fn constants_never_change() {
    let repo = people();
    seed_ages(&repo, &[1, 2]).await;
    let select = repo
        .select(
            Statement::new().filter("age = ?").param(Constant(2)),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert_eq!(ages(&select.results()), vec![2]);
}

#[tokio::test]
async fn dropped_queries_release_their_params() {
    let repo = people();
    let age = LiveValue::new(1);
    {
        let select = repo
            .select(
                Statement::new().filter("age = ?").param(age.clone()),
                PaginatorDefaults::default(),
            )
            .unwrap();
        assert_eq!(age.listener_count(), 1);
        drop(select);
    }
    assert_eq!(age.listener_count(), 0);
    seed_ages(&repo, &[1]).await;
}

#[tokio::test]
async fn unsubscribed_queries_release_their_params() {
    let repo = people();
    let age = LiveValue::new(1);
    let select = repo
        .select(
            Statement::new().filter("age = ?").param(age.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();

    select.unsubscribe();
    assert_eq!(age.listener_count(), 0);
    age.set(2);
    assert!(select.subject().is_closed());
}

#[tokio::test]
async fn invalidate_recomputes_in_place() {
    let repo = people();
    seed_ages(&repo, &[1]).await;
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();
    let before = select.result_set().unwrap();

    select.subject().invalidate();
    let after = select.result_set().unwrap();
    assert!(!std::sync::Arc::ptr_eq(&before, &after));
    assert_eq!(after.uuids(), before.uuids());
}

#[tokio::test]
async fn updates_to_matching_rows_republish() {
    let repo = people();
    let created = seed_ages(&repo, &[1]).await;
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();

    repo.update_value(created[0].uuid(), json!({ "name": "renamed" }), None)
        .await
        .unwrap();
    assert_eq!(select.results()[0].name, "renamed");
}
