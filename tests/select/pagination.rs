use liveset::{Direction, PageSort, PaginatorDefaults, Statement};

use crate::fixtures::{ages, people, seed_ages, uuids};

fn by_age(size: usize) -> PaginatorDefaults {
    PaginatorDefaults::page_size(size).sorted("age", Direction::Asc)
}

#[tokio::test]
async fn pages_through_sorted_results() {
    let repo = people();
    seed_ages(&repo, &[8, 3, 6, 1, 7, 2, 5, 4]).await;

    let select = repo.select(Statement::new(), by_age(5)).unwrap();
    let paginator = select.paginator();
    assert_eq!(ages(&select.results()), vec![1, 2, 3, 4, 5]);
    assert_eq!(select.count(), 8);
    assert_eq!(paginator.page_count(), 2);

    paginator.set_page_index(1);
    assert_eq!(ages(&select.results()), vec![6, 7, 8]);
    assert_eq!(select.result_set().unwrap().page_index, Some(1));
}

#[tokio::test]
async fn out_of_range_page_settles_to_last_page() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 3, 4, 5, 6, 7, 8]).await;
    let select = repo.select(Statement::new(), by_age(5)).unwrap();

    select.paginator().set_page_index(7);
    assert_eq!(select.paginator().page_index(), 1);
    assert_eq!(ages(&select.results()), vec![6, 7, 8]);
}

#[tokio::test]
async fn shrinking_results_pull_page_back() {
    let repo = people();
    let created = seed_ages(&repo, &[1, 2, 3, 4, 5, 6, 7]).await;
    let select = repo.select(Statement::new(), by_age(5)).unwrap();
    select.paginator().set_page_index(1);
    assert_eq!(ages(&select.results()), vec![6, 7]);

    repo.remove(&uuids(&created[5..]), None).await.unwrap();
    assert_eq!(select.paginator().page_index(), 0);
    assert_eq!(ages(&select.results()), vec![1, 2, 3, 4, 5]);

    repo.remove(&uuids(&created[..5]), None).await.unwrap();
    assert_eq!(select.paginator().page_index(), 0);
    assert!(select.results().is_empty());
    assert_eq!(select.paginator().page_count(), 1);
}

#[tokio::test]
async fn page_size_changes_extend_options() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]).await;
    let select = repo.select(Statement::new(), by_age(5)).unwrap();
    let paginator = select.paginator();
    assert_eq!(paginator.page_size_options(), vec![5, 10, 25, 100]);

    paginator.set_page_size(3);
    assert_eq!(paginator.page_size(), Some(3));
    assert_eq!(paginator.page_size_options(), vec![3, 5, 10, 25, 100]);
    assert_eq!(ages(&select.results()), vec![1, 2, 3]);

    paginator.set_page(3, 4);
    assert_eq!(paginator.page_index(), 2);
    assert_eq!(ages(&select.results()), vec![9, 10, 11, 12]);
    assert_eq!(paginator.page_size_options(), vec![3, 4, 5, 10, 25, 100]);
}

#[tokio::test]
async fn page_sort_overrides_statement_order() {
    let repo = people();
    seed_ages(&repo, &[2, 9, 4]).await;
    let select = repo
        .select(
            Statement::new().order_by("age DESC"),
            PaginatorDefaults::page_size(10),
        )
        .unwrap();
    assert_eq!(ages(&select.results()), vec![9, 4, 2]);

    select
        .paginator()
        .set_page_sort(Some(PageSort::new("age", Direction::Asc)));
    assert_eq!(ages(&select.results()), vec![2, 4, 9]);

    select.paginator().set_page_sort(None);
    assert_eq!(ages(&select.results()), vec![9, 4, 2]);
}

#[tokio::test]
async fn windows_stay_within_bounds() {
    let repo = people();
    let all: Vec<i64> = (0..23).collect();
    seed_ages(&repo, &all).await;
    let select = repo.select(Statement::new(), by_age(5)).unwrap();
    let paginator = select.paginator();

    for index in 0..8 {
        paginator.set_page_index(index);
        let set = select.result_set().unwrap();
        let settled = paginator.page_index();
        assert!(set.results.len() <= 5);
        assert!(settled * 5 <= set.count);
        assert_eq!(set.results.first().map(|e| e.age), Some(settled as i64 * 5));
    }
    assert_eq!(paginator.page_index(), 4);
    assert_eq!(select.results().len(), 3);
}

#[tokio::test]
async fn unpaged_selects_ignore_page_index() {
    let repo = people();
    seed_ages(&repo, &[1, 2, 3]).await;
    let select = repo
        .select(Statement::new().limit(2), PaginatorDefaults::default())
        .unwrap();

    select.paginator().set_page_index(4);
    assert_eq!(ages(&select.results()), vec![1, 2]);
    assert_eq!(select.paginator().page_count(), 1);
}
