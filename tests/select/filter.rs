use liveset::{
    LiveSetError, LiveValue, Operator, PaginatorDefaults, Statement, StatementError,
};
use serde_json::{json, Value};

use crate::fixtures::{ages, make_log, people, seed_ages};

#[tokio::test]
async fn reactive_param_reevaluates_on_change() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 2, 3, 3, 3]).await;

    let age = LiveValue::new(2);
    let select = repo
        .select(
            Statement::new().filter("age = ?").param(age.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert_eq!(ages(&select.results()), vec![2, 2]);

    age.set(3);
    assert_eq!(ages(&select.results()), vec![3, 3, 3]);
    assert_eq!(select.count(), 3);
    assert_eq!(select.subject().filter().as_deref(), Some("age = 3"));
}

#[tokio::test]
async fn table_changes_flow_into_matching_queries() {
    let repo = people();
    let select = repo
        .select(
            Statement::new().filter("age >= 18"),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert!(select.results().is_empty());

    let created = seed_ages(&repo, &[10, 20]).await;
    assert_eq!(ages(&select.results()), vec![20]);

    repo.update_value(created[0].uuid(), json!({ "age": 40 }), None)
        .await
        .unwrap();
    assert_eq!(ages(&select.results()), vec![20, 40]);
}

#[tokio::test]
async fn order_by_then_window() {
    let repo = people();
    seed_ages(&repo, &[3, 1, 4, 1, 5, 9, 2, 6]).await;

    let select = repo
        .select(
            Statement::new().order_by("age DESC").offset(1).limit(3),
            PaginatorDefaults::default(),
        )
        .unwrap();

    assert_eq!(ages(&select.results()), vec![6, 5, 4]);
    assert_eq!(select.count(), 8);
    let set = select.result_set().unwrap();
    assert_eq!(set.results_all.len(), 8);
    assert_eq!(set.page_index, None);
}

#[tokio::test]
async fn unordered_queries_follow_insertion_index() {
    let repo = people();
    seed_ages(&repo, &[3, 1, 2]).await;
    let select = repo
        .select(Statement::new(), PaginatorDefaults::default())
        .unwrap();
    assert_eq!(ages(&select.results()), vec![3, 1, 2]);
}

#[tokio::test]
async fn reactive_limit_resizes_window() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 3, 4]).await;
    let limit = LiveValue::new(2);

    let select = repo
        .select(
            Statement::new().order_by("age").limit(limit.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert_eq!(ages(&select.results()), vec![1, 2]);

    limit.set(3);
    assert_eq!(ages(&select.results()), vec![1, 2, 3]);
}

#[tokio::test]
async fn invalid_limit_fails_then_recovers() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 3]).await;
    let limit = LiveValue::new(json!(1));

    let select = repo
        .select(
            Statement::new().order_by("age").limit(limit.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();
    let errors = make_log::<String>();
    let sink = errors.clone();
    let _unsubscribe = select.subscribe(|_| {}, move |err| sink.lock().push(err.to_string()));

    limit.set(json!(-1));
    let state = select.subject().state();
    assert!(matches!(
        state.error(),
        Some(LiveSetError::Statement(StatementError::InvalidWindow { name: "limit", .. }))
    ));
    assert_eq!(errors.lock().len(), 1);

    limit.set(json!(2));
    assert_eq!(ages(&select.results()), vec![1, 2]);
    assert!(select.subject().state().error().is_none());
}

#[tokio::test]
async fn malformed_statements_fail_at_select() {
    let repo = people();

    let parse = repo.select(
        Statement::new().filter("age = = 3"),
        PaginatorDefaults::default(),
    );
    assert!(matches!(
        parse.err(),
        Some(LiveSetError::Statement(StatementError::Parse { .. }))
    ));

    let missing = repo.select(
        Statement::new().filter("age = ? AND name = ?").param(1),
        PaginatorDefaults::default(),
    );
    assert!(matches!(
        missing.err(),
        Some(LiveSetError::Statement(StatementError::MissingParameter { .. }))
    ));

    let order = repo.select(
        Statement::new().order_by("age upward"),
        PaginatorDefaults::default(),
    );
    assert!(matches!(
        order.err(),
        Some(LiveSetError::Statement(StatementError::InvalidOrderBy(_)))
    ));
}

#[tokio::test]
async fn like_and_in_filters() {
    let repo = people();
    for (name, age) in [("Anna", 1), ("anders", 2), ("Bob", 3), ("Carl", 4)] {
        repo.create(json!({ "name": name, "age": age })).await.unwrap();
    }

    let like = repo
        .select(
            Statement::new().filter("name LIKE 'an%'"),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert_eq!(ages(&like.results()), vec![1, 2]);

    let names = LiveValue::new(vec!["Bob".to_string(), "Carl".to_string()]);
    let in_list = repo
        .select(
            Statement::new().condition("name", Operator::In, names.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert_eq!(ages(&in_list.results()), vec![3, 4]);

    names.set(vec!["Anna".to_string()]);
    assert_eq!(ages(&in_list.results()), vec![1]);
}

#[tokio::test]
async fn conditions_combine_with_text_filters() {
    let repo = people();
    seed_ages(&repo, &[5, 15, 25, 35]).await;

    let select = repo
        .select(
            Statement::new()
                .filter("age > ?")
                .param(10)
                .condition("age", Operator::Lt, 30),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert_eq!(ages(&select.results()), vec![15, 25]);
    assert_eq!(
        select.subject().filter().as_deref(),
        Some("age > 10 AND age < 30")
    );
}

#[tokio::test]
async fn null_params_match_nothing() {
    let repo = people();
    seed_ages(&repo, &[1, 2]).await;
    let age = LiveValue::new(Value::Null);

    let select = repo
        .select(
            Statement::new().filter("age = ?").param(age.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();
    assert!(select.results().is_empty());

    age.set(json!(2));
    assert_eq!(ages(&select.results()), vec![2]);
}

#[tokio::test]
async fn select_one_tracks_first_match() {
    let repo = people();
    seed_ages(&repo, &[7, 3]).await;

    let one = repo
        .select_one(Statement::new().filter("age < 10").order_by("age"))
        .unwrap();
    assert_eq!(one.current().unwrap().age, 3);

    let seen = make_log::<Option<i64>>();
    let sink = seen.clone();
    let _unsubscribe = one.subscribe(move |first| sink.lock().push(first.map(|e| e.age)), |_| {});

    repo.create(json!({ "name": "young", "age": 1 })).await.unwrap();
    assert_eq!(one.first_async().await.unwrap().unwrap().age, 1);
    assert_eq!(seen.lock().first(), Some(&Some(3)));
    assert_eq!(seen.lock().last(), Some(&Some(1)));

    let none = repo.select_one(Statement::new().filter("age > 100")).unwrap();
    assert!(none.current().is_none());
}
