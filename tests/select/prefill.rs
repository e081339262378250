use liveset::{LiveValue, PaginatorDefaults, Statement};
use serde_json::{json, Value};

use crate::fixtures::{ages, people, seed_ages};

#[tokio::test]
async fn created_rows_land_in_the_filtered_view() {
    let repo = people();
    seed_ages(&repo, &[1, 2]).await;
    let select = repo
        .select(Statement::new().filter("age = 5"), PaginatorDefaults::default())
        .unwrap();
    assert!(select.results().is_empty());

    let created = select.create(Value::Null).await.unwrap();
    assert_eq!(created.age, 5);
    assert_eq!(ages(&select.results()), vec![5]);
}

#[tokio::test]
async fn prefill_reads_resolved_parameters() {
    let repo = people();
    let city = LiveValue::new("Oslo".to_string());
    let select = repo
        .select(
            Statement::new()
                .filter("city = ? AND name LIKE 'Ann%' AND age > 3")
                .param(city.clone()),
            PaginatorDefaults::default(),
        )
        .unwrap();

    let first = select.create(json!({ "age": 30 })).await.unwrap();
    assert_eq!(first.city, "Oslo");
    assert_eq!(first.name, "Ann");
    assert_eq!(first.age, 30);

    city.set("Bergen".to_string());
    let second = select.create(json!({ "age": 31 })).await.unwrap();
    assert_eq!(second.city, "Bergen");
    assert_eq!(ages(&select.results()), vec![31]);
}

#[tokio::test]
async fn explicit_data_wins_over_filter_values() {
    let repo = people();
    let select = repo
        .select(Statement::new().filter("age = 5"), PaginatorDefaults::default())
        .unwrap();

    let created = select.create(json!({ "age": 6, "name": "x" })).await.unwrap();
    assert_eq!(created.age, 6);
    assert!(select.results().is_empty());
}

#[tokio::test]
async fn disjunctions_do_not_prefill() {
    let repo = people();
    let select = repo
        .select(
            Statement::new().filter("age = 5 OR age = 6"),
            PaginatorDefaults::default(),
        )
        .unwrap();

    let created = select.create(Value::Null).await.unwrap();
    assert_eq!(created.age, 0);
}

#[tokio::test]
async fn create_with_id_upserts_through_the_view() {
    let repo = people();
    let select = repo
        .select(Statement::new().filter("city = 'Oslo'"), PaginatorDefaults::default())
        .unwrap();

    select.create_with_id(json!({ "age": 1 }), "fixed").await.unwrap();
    select.create_with_id(json!({ "age": 2 }), "fixed").await.unwrap();

    assert_eq!(repo.count(), 1);
    assert_eq!(ages(&select.results()), vec![2]);
    assert_eq!(repo.get("fixed").unwrap().city, "Oslo");
}
