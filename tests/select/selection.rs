use liveset::{Direction, PaginatorDefaults, Statement};

use crate::fixtures::{ages, make_log, people, seed_ages, uuids};

fn paged() -> PaginatorDefaults {
    PaginatorDefaults::page_size(2).sorted("age", Direction::Asc)
}

#[tokio::test]
async fn toggle_all_selects_then_clears() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2, 3]).await;
    let select = repo.select(Statement::new(), paged()).unwrap();
    let paginator = select.paginator();

    paginator.toggle_selection(None);
    assert_eq!(paginator.selected_count(), 3);
    assert!(paginator.is_selected_all());
    for uuid in uuids(&created) {
        assert!(paginator.is_selected(&uuid));
    }

    paginator.toggle_selection(None);
    assert_eq!(paginator.selected_count(), 0);
    assert!(!paginator.is_selected_all());
}

#[tokio::test]
async fn toggle_all_completes_a_partial_selection() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2, 3]).await;
    let select = repo.select(Statement::new(), paged()).unwrap();
    let paginator = select.paginator();

    paginator.toggle_selection(Some(created[1].uuid()));
    assert!(!paginator.is_selected_all());

    paginator.toggle_selection(None);
    assert!(paginator.is_selected_all());
}

#[tokio::test]
async fn toggling_one_row_flips_it() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2]).await;
    let select = repo.select(Statement::new(), paged()).unwrap();
    let paginator = select.paginator();
    let uuid = created[0].uuid();

    paginator.toggle_selection(Some(uuid));
    assert!(paginator.is_selected(uuid));
    assert_eq!(paginator.selected_ids(), vec![uuid.to_string()]);

    paginator.toggle_selection(Some(uuid));
    assert!(!paginator.is_selected(uuid));

    paginator.toggle_selection(Some("not-a-row"));
    assert_eq!(paginator.selected_count(), 0);
}

#[tokio::test]
async fn selection_spans_pages() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2, 3, 4, 5]).await;
    let select = repo.select(Statement::new(), paged()).unwrap();
    let paginator = select.paginator();

    paginator.select_many(&[created[0].uuid().to_string(), created[4].uuid().to_string()]);
    paginator.set_page_index(1);
    assert_eq!(ages(&select.results()), vec![3, 4]);

    assert_eq!(paginator.selected_count(), 2);
    assert_eq!(ages(&paginator.selected()), vec![1, 5]);
}

#[tokio::test]
async fn removed_rows_leave_the_selection() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2, 3]).await;
    let select = repo.select(Statement::new(), paged()).unwrap();
    let paginator = select.paginator();
    let counts = paginator.watch_selected_count();

    paginator.toggle_selection(None);
    assert_eq!(*counts.borrow(), 3);

    repo.remove(&uuids(&created[..1]), None).await.unwrap();
    assert_eq!(paginator.selected_count(), 2);
    assert_eq!(*counts.borrow(), 2);
    assert!(!paginator.is_selected(created[0].uuid()));
    assert!(paginator.is_selected_all());
}

#[tokio::test]
async fn rows_filtered_out_leave_the_selection() {
    let repo = people();
    let created = seed_ages(&repo, &[10, 20]).await;
    let select = repo
        .select(Statement::new().filter("age < 50"), paged())
        .unwrap();
    let paginator = select.paginator();
    paginator.toggle_selection(None);

    repo.update_value(created[0].uuid(), serde_json::json!({ "age": 99 }), None)
        .await
        .unwrap();
    assert_eq!(paginator.selected_ids(), vec![created[1].uuid().to_string()]);
}

#[tokio::test]
async fn selection_listeners_see_each_change() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2]).await;
    let select = repo.select(Statement::new(), paged()).unwrap();
    let paginator = select.paginator();

    let log = make_log::<usize>();
    let sink = log.clone();
    let unsubscribe = paginator.on_selection_change(move |ids| sink.lock().push(ids.len()));

    paginator.toggle_selection(Some(created[0].uuid()));
    paginator.toggle_selection(None);
    paginator.clear_selection();
    paginator.clear_selection();
    unsubscribe();
    paginator.toggle_selection(None);

    assert_eq!(*log.lock(), vec![1, 2, 0]);
}
