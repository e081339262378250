use std::sync::Arc;
use std::time::Duration;

use liveset::{
    ConnectorCall, CreateOptions, LiveSetError, LiveValue, MemoryConnector, PaginatorDefaults,
    Statement,
};
use serde_json::json;

use crate::fixtures::{ages, people, remote_person, seed_ages, uuids};

fn selects(store: &MemoryConnector) -> Vec<String> {
    store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ConnectorCall::Select(sql) => Some(sql),
            _ => None,
        })
        .collect()
}

fn writes(store: &MemoryConnector) -> Vec<ConnectorCall> {
    store
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                ConnectorCall::Add(_) | ConnectorCall::Update(_) | ConnectorCall::Remove(_)
            )
        })
        .collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn local_writes_are_forwarded() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());

    let created = seed_ages(&repo, &[1]).await;
    let uuid = created[0].uuid().to_string();
    repo.update_value(&uuid, json!({ "age": 2 }), None).await.unwrap();
    repo.remove(&[uuid.clone()], None).await.unwrap();

    assert_eq!(
        writes(&store),
        vec![
            ConnectorCall::Add(vec![uuid.clone()]),
            ConnectorCall::Update(vec![uuid.clone()]),
            ConnectorCall::Remove(vec![uuid.clone()]),
        ]
    );
    assert!(store.record(&uuid).is_none());
}

#[tokio::test]
async fn forwarded_records_carry_metadata() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let created = seed_ages(&repo, &[7]).await;

    let stored = store.record(created[0].uuid()).unwrap();
    assert_eq!(stored["age"], json!(7));
    assert_eq!(stored["__uuid"], json!(created[0].uuid()));
    assert_eq!(stored["__owner"]["u1"], json!(true));
    assert_eq!(stored["_index"], json!(created[0].index()));
}

#[tokio::test]
async fn skip_connector_suppresses_one_target() {
    let a = Arc::new(MemoryConnector::new("a"));
    let b = Arc::new(MemoryConnector::new("b"));
    let repo = people().with_connector(a.clone()).with_connector(b.clone());

    let created = repo
        .create_with(json!({ "age": 1 }), CreateOptions::default().skip_connector("a"))
        .await
        .unwrap();

    assert!(writes(&a).is_empty());
    assert_eq!(writes(&b), vec![ConnectorCall::Add(vec![created.uuid().to_string()])]);
}

#[tokio::test]
async fn connector_failures_surface_but_keep_the_row() {
    let a = Arc::new(MemoryConnector::new("a"));
    let b = Arc::new(MemoryConnector::new("b"));
    let repo = people().with_connector(a.clone()).with_connector(b.clone());
    a.fail_next("offline");

    let err = repo.create(json!({ "age": 1 })).await.unwrap_err();
    match err {
        LiveSetError::Connector(err) => {
            assert_eq!(err.connector, "a");
            assert_eq!(err.message, "offline");
        }
        other => panic!("expected connector error, got {other:?}"),
    }
    assert_eq!(repo.count(), 1);
    assert_eq!(writes(&b).len(), 1);
    assert_eq!(b.records().len(), 1);
}

#[tokio::test]
async fn filters_are_forwarded_only_when_they_change() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    seed_ages(&repo, &[1, 2, 3, 4, 5, 6]).await;
    let age = LiveValue::new(3);

    let select = repo
        .select(
            Statement::new().filter("age < ?").param(age.clone()),
            PaginatorDefaults::page_size(1),
        )
        .unwrap();
    assert_eq!(selects(&store).len(), 1);

    select.paginator().set_page_index(1);
    seed_ages(&repo, &[0]).await;
    select.subject().invalidate();
    assert_eq!(selects(&store).len(), 1);

    age.set(5);
    let sent = selects(&store);
    assert_eq!(sent.len(), 2);
    assert!(sent[1].contains("age < 5"), "{}", sent[1]);
    assert_eq!(select.subject().forwarded_sql().as_deref(), Some(sent[1].as_str()));
}

#[tokio::test]
async fn retargeting_replaces_the_remote_subscription() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let age = LiveValue::new(1);
    let _select = repo
        .select(
            Statement::new().filter("age = ?").param(age.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();

    for next in 2..=4 {
        age.set(next);
    }

    assert_eq!(selects(&store).len(), 4);
    let subscriptions = store.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert!(subscriptions[0].contains("age = 4"), "{}", subscriptions[0]);

    let stale = store
        .push_remote(vec![remote_person("r1", "Rita", 1)], None)
        .await
        .unwrap();
    assert_eq!(stale, 0);
    assert!(repo.get("r1").is_none());

    let current = store
        .push_remote(vec![remote_person("r4", "Ravi", 4)], None)
        .await
        .unwrap();
    assert_eq!(current, 1);
    assert!(repo.get("r4").is_some());
}

#[tokio::test]
async fn unsubscribe_releases_the_remote_subscription() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let select = repo
        .select(Statement::new().filter("age = 1"), PaginatorDefaults::default())
        .unwrap();
    assert_eq!(store.subscriptions().len(), 1);

    select.unsubscribe();
    select.unsubscribe();

    assert!(store.subscriptions().is_empty());
    let releases: Vec<_> = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ConnectorCall::Release(_)))
        .collect();
    assert_eq!(releases, vec![ConnectorCall::Release(select.subject().query_id())]);

    let applied = store
        .push_remote(vec![remote_person("r1", "Rita", 1)], None)
        .await
        .unwrap();
    assert_eq!(applied, 0);
    assert_eq!(repo.count(), 0);
}

#[tokio::test]
async fn dropped_and_destroyed_queries_release_their_subscriptions() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let older = repo
        .select(Statement::new().filter("age > 3"), PaginatorDefaults::default())
        .unwrap();
    let younger = repo
        .select(Statement::new().filter("age < 2"), PaginatorDefaults::default())
        .unwrap();
    assert_ne!(older.subject().query_id(), younger.subject().query_id());
    assert_eq!(store.subscriptions().len(), 2);

    let older_id = older.subject().query_id();
    drop(older);
    let subscriptions = store.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert!(subscriptions[0].contains("age < 2"), "{}", subscriptions[0]);

    let younger_id = younger.subject().query_id();
    repo.destroy().await;
    assert!(store.subscriptions().is_empty());
    let calls = store.calls();
    assert!(calls.contains(&ConnectorCall::Release(older_id)));
    let release = calls
        .iter()
        .position(|c| *c == ConnectorCall::Release(younger_id))
        .unwrap();
    let disconnect = calls
        .iter()
        .position(|c| *c == ConnectorCall::Disconnect)
        .unwrap();
    assert!(release < disconnect);
}

#[tokio::test]
async fn forwarded_filters_carry_ownership_terms() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let _select = repo
        .select(Statement::new().filter("age > 3"), PaginatorDefaults::default())
        .unwrap();

    let sent = selects(&store);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("__owner['EVERYBODY'] = true"), "{}", sent[0]);
    assert!(sent[0].contains("__owner['u1'] = true"), "{}", sent[0]);
    assert!(sent[0].contains("age > 3"), "{}", sent[0]);
}

#[tokio::test]
async fn select_pulls_matching_remote_rows() {
    let store = Arc::new(MemoryConnector::new("store").with_records(vec![
        remote_person("r1", "Rita", 40),
        remote_person("r2", "Rolf", 10),
    ]));
    let repo = people().with_connector(store.clone());

    let select = repo
        .select(Statement::new().filter("age > 18"), PaginatorDefaults::default())
        .unwrap();

    assert_eq!(ages(&select.results()), vec![40]);
    assert!(repo.get("r1").is_some());
    assert!(repo.get("r2").is_none());
    let rita = repo.get("r1").unwrap();
    assert!(rita.is_owned_by("u2"));
    assert!(!rita.is_owned_by("u1"));
}

#[tokio::test]
async fn late_connectors_receive_live_filters() {
    let repo = people();
    let select = repo
        .select(Statement::new().filter("age > 18"), PaginatorDefaults::default())
        .unwrap();
    assert!(select.results().is_empty());

    let store = Arc::new(
        MemoryConnector::new("store").with_records(vec![remote_person("r1", "Rita", 40)]),
    );
    repo.connect(store.clone());

    assert_eq!(selects(&store).len(), 1);
    assert_eq!(ages(&select.results()), vec![40]);
    assert_eq!(repo.connector_keys(), vec!["store".to_string()]);
}

#[tokio::test]
async fn remote_writes_are_not_echoed() {
    let a = Arc::new(MemoryConnector::new("a"));
    let b = Arc::new(MemoryConnector::new("b"));
    let repo = people().with_connector(a.clone()).with_connector(b.clone());
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();

    let applied = a
        .push_remote(vec![remote_person("r1", "Rita", 40)], None)
        .await
        .unwrap();

    assert_eq!(applied, 1);
    assert_eq!(ages(&select.results()), vec![40]);
    assert!(writes(&a).is_empty());
    assert_eq!(writes(&b), vec![ConnectorCall::Add(vec!["r1".to_string()])]);
}

#[tokio::test]
async fn remote_upserts_overwrite_in_place() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let _select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();

    store
        .push_remote(vec![remote_person("r1", "Rita", 40)], None)
        .await
        .unwrap();
    store
        .push_remote(vec![remote_person("r1", "Rita", 41)], None)
        .await
        .unwrap();

    assert_eq!(repo.count(), 1);
    assert_eq!(repo.get("r1").unwrap().age, 41);
}

#[tokio::test]
async fn stale_snapshots_are_ignored() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let _select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();

    let stamp = repo.created_at() - chrono::Duration::seconds(1);
    let applied = store
        .push_remote(vec![remote_person("r1", "Rita", 40)], Some(stamp))
        .await
        .unwrap();

    assert_eq!(applied, 0);
    assert!(repo.get("r1").is_none());

    let fresh = chrono::Utc::now();
    let applied = store
        .push_remote(vec![remote_person("r1", "Rita", 40)], Some(fresh))
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn malformed_remote_rows_are_skipped() {
    let store = Arc::new(MemoryConnector::new("store"));
    let repo = people().with_connector(store.clone());
    let _select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();

    let mut bad = remote_person("bad", "Bad", 1);
    bad["age"] = json!("one");
    let applied = store
        .push_remote(vec![bad, remote_person("good", "Good", 2)], None)
        .await
        .unwrap();

    assert_eq!(applied, 1);
    assert!(repo.get("bad").is_none());
    assert!(repo.get("good").is_some());
}

#[tokio::test]
async fn remote_deletes_propagate_to_other_connectors() {
    let a = Arc::new(MemoryConnector::new("a"));
    let b = Arc::new(MemoryConnector::new("b"));
    let repo = people().with_connector(a.clone()).with_connector(b.clone());
    let created = seed_ages(&repo, &[1, 2]).await;
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();
    settle().await;
    a.clear_calls();
    b.clear_calls();

    let removed = a.delete_remote(&uuids(&created[..1])).await;
    settle().await;

    assert_eq!(removed, 1);
    assert_eq!(ages(&select.results()), vec![2]);
    assert!(writes(&a).is_empty());
    assert_eq!(writes(&b), vec![ConnectorCall::Remove(uuids(&created[..1]))]);
    assert!(b.record(created[0].uuid()).is_none());
}

#[tokio::test]
async fn fetch_falls_back_to_connectors() {
    let store = Arc::new(
        MemoryConnector::new("store").with_records(vec![remote_person("r9", "Remote", 9)]),
    );
    let repo = people().with_connector(store.clone());

    let fetched = repo.fetch("r9").await.unwrap().unwrap();
    assert_eq!(fetched.age, 9);
    assert!(repo.get("r9").is_some());
    assert!(repo.fetch("missing").await.unwrap().is_none());
    assert!(store
        .calls()
        .contains(&ConnectorCall::FetchOne("r9".to_string())));
}

#[tokio::test]
async fn sinks_outliving_the_repository_do_nothing() {
    let store = Arc::new(MemoryConnector::new("store"));
    {
        let repo = people().with_connector(store.clone());
        let _select = repo
            .select(Statement::new(), PaginatorDefaults::default())
            .unwrap();
    }
    let applied = store
        .push_remote(vec![remote_person("r1", "Rita", 40)], None)
        .await
        .unwrap();
    assert_eq!(applied, 0);
}
