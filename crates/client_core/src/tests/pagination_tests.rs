use super::*;

#[test]
fn total_pages_rounds_up_and_never_drops_below_one() {
    assert_eq!(total_pages_for(0, 5), 1);
    assert_eq!(total_pages_for(1, 5), 1);
    assert_eq!(total_pages_for(5, 5), 1);
    assert_eq!(total_pages_for(12, 5), 3);
    assert_eq!(total_pages_for(13, 5), 3);
    assert_eq!(total_pages_for(7, 0), 7);
}

#[test]
fn starts_on_first_page_of_one() {
    let pagination = PaginationController::default();
    assert_eq!(pagination.current_page(), 1);
    assert_eq!(pagination.total_pages(), 1);
    assert_eq!(pagination.page_size(), DEFAULT_PAGE_SIZE);
    assert!(!pagination.has_previous());
    assert!(!pagination.has_next());
    assert_eq!(pagination.label(), "Page 1 of 1");
}

#[test]
fn go_to_ignores_pages_outside_the_range() {
    let mut pagination = PaginationController::new(5);
    pagination.set_total_count(13);
    assert_eq!(pagination.total_pages(), 3);

    assert!(!pagination.go_to(0));
    assert!(!pagination.go_to(4));
    assert_eq!(pagination.current_page(), 1);

    assert!(pagination.go_to(2));
    assert_eq!(pagination.current_page(), 2);
    assert!(pagination.go_to(2), "reloading the current page still fetches");
    assert!(pagination.go_to(3));
    assert_eq!(pagination.label(), "Page 3 of 3");
}

#[test]
fn next_and_previous_stop_at_the_edges() {
    let mut pagination = PaginationController::new(5);
    pagination.set_total_pages(2);

    assert!(!pagination.previous());
    assert!(pagination.next());
    assert_eq!(pagination.current_page(), 2);
    assert!(!pagination.next());
    assert_eq!(pagination.current_page(), 2);
    assert!(pagination.previous());
    assert!(pagination.last());
    assert!(pagination.first());
    assert_eq!(pagination.current_page(), 1);
}

#[test]
fn shrinking_total_clamps_current_page() {
    let mut pagination = PaginationController::new(5);
    pagination.set_total_count(11);
    assert!(pagination.go_to(3));

    assert!(pagination.set_total_count(10));
    assert_eq!(pagination.current_page(), 2);
    assert_eq!(pagination.total_pages(), 2);

    assert!(pagination.set_total_count(0));
    assert_eq!(pagination.current_page(), 1);
    assert_eq!(pagination.total_pages(), 1);
    assert!(!pagination.set_total_count(4));
}

#[test]
fn reset_returns_to_first_page_and_keeps_total() {
    let mut pagination = PaginationController::new(5);
    pagination.set_total_count(30);
    pagination.go_to(4);
    pagination.reset();
    assert_eq!(pagination.current_page(), 1);
    assert_eq!(pagination.total_pages(), 6);
}

#[test]
fn settle_moves_only_to_a_page_that_loaded() {
    let mut pagination = PaginationController::new(5);
    pagination.set_total_count(13);
    assert!(pagination.contains(3));
    assert!(!pagination.contains(4));
    assert!(!pagination.contains(0));
    assert_eq!(pagination.current_page(), 1, "contains never moves the page");

    assert!(!pagination.settle(2, 13));
    assert_eq!(pagination.label(), "Page 2 of 3");

    assert!(pagination.settle(3, 10));
    assert_eq!(pagination.current_page(), 2);
    assert_eq!(pagination.total_pages(), 2);
}
