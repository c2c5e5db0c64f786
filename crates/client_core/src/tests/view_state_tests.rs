use super::*;
use chrono::NaiveDate;
use shared::{
    domain::{HolidayId, LeaveId},
    protocol::Holiday,
};

fn holiday(id: i64, name: &str) -> Holiday {
    Holiday {
        id: HolidayId(id),
        name: name.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 12, 25).expect("valid date"),
        holiday_image: None,
    }
}

fn loaded(records: Vec<Holiday>, count: u64) -> ViewState<Holiday> {
    let mut state = ViewState::default();
    state.replace_page(Page::new(records, count));
    state
}

#[test]
fn slot_walks_through_submit_success() {
    let mut slot = ActionSlot::default();
    assert!(!slot.is_open());
    assert!(slot.begin_submit().is_none());

    assert!(slot.select(LeaveId(4)));
    assert_eq!(slot.begin_submit(), Some(&LeaveId(4)));
    assert!(slot.is_submitting());
    assert!(!slot.select(LeaveId(5)), "cannot reselect while submitting");
    assert!(!slot.cancel());
    assert!(slot.begin_submit().is_none());

    slot.finish_ok();
    assert_eq!(slot, ActionSlot::Idle);
}

#[test]
fn failed_slot_keeps_target_for_retry() {
    let mut slot = ActionSlot::default();
    slot.select(LeaveId(9));
    slot.begin_submit();
    slot.finish_err("server said no");

    assert_eq!(slot.failure(), Some("server said no"));
    assert_eq!(slot.target(), Some(&LeaveId(9)));
    assert!(slot.target_mut().is_some());

    slot.reselect();
    assert_eq!(slot, ActionSlot::Selected(LeaveId(9)));
    assert!(slot.cancel());
    assert!(!slot.is_open());
}

#[test]
fn finish_err_outside_submit_is_ignored() {
    let mut slot = ActionSlot::Selected(LeaveId(1));
    slot.finish_err("late failure");
    assert_eq!(slot, ActionSlot::Selected(LeaveId(1)));
    slot.finish_ok();
    assert_eq!(slot, ActionSlot::Selected(LeaveId(1)));
}

#[test]
fn empty_result_differs_from_not_loaded() {
    let state: ViewState<Holiday> = ViewState::default();
    assert!(!state.page().is_loaded());
    assert!(!state.is_empty_result());
    assert!(state.records().is_empty());

    let state = loaded(Vec::new(), 0);
    assert!(state.page().is_loaded());
    assert!(state.is_empty_result());
}

#[test]
fn patch_replaces_only_the_matching_row() {
    let mut state = loaded(vec![holiday(1, "New Year"), holiday(2, "Diwali")], 2);

    assert!(state.patch_record(holiday(2, "Deepavali")));
    assert_eq!(state.records()[0].name, "New Year");
    assert_eq!(state.records()[1].name, "Deepavali");

    assert!(!state.patch_record(holiday(3, "Holi")));
    assert_eq!(state.records().len(), 2);
}

#[test]
fn remove_drops_the_row_and_the_count() {
    let mut state = loaded(vec![holiday(1, "New Year"), holiday(2, "Diwali")], 7);

    assert!(state.remove_record(&RecordKey::Int(1)));
    assert_eq!(state.records().len(), 1);
    assert_eq!(state.page().page().map(|p| p.count), Some(6));
    assert!(!state.remove_record(&RecordKey::Int(1)));
}

#[test]
fn message_and_error_replace_each_other() {
    let mut state = loaded(vec![holiday(1, "New Year")], 1);
    state.set_error("Failed to update holiday");
    state.set_field_errors(
        [("name".to_string(), vec!["This field is required.".to_string()])]
            .into_iter()
            .collect(),
    );
    assert_eq!(state.error(), Some("Failed to update holiday"));
    assert_eq!(state.field_errors().len(), 1);

    state.set_message("Holiday updated successfully");
    assert_eq!(state.message(), Some("Holiday updated successfully"));
    assert!(state.error().is_none());
    assert!(state.field_errors().is_empty());

    state.set_error("again");
    assert!(state.message().is_none());
    state.dismiss_error();
    assert!(state.error().is_none());
}

#[test]
fn draft_attachments_replace_by_field() {
    let mut state = loaded(vec![holiday(1, "New Year")], 1);
    assert!(state.begin_edit(&holiday(1, "New Year")));

    let draft = state.draft_mut().expect("draft open");
    draft.attach(FilePart::new("holiday_image", "a.png", "image/png", vec![1]));
    draft.attach(FilePart::new("holiday_image", "b.png", "image/png", vec![2]));
    assert_eq!(draft.attachments.len(), 1);
    assert_eq!(draft.attachments[0].file_name, "b.png");

    assert!(state.cancel_edit());
    assert!(state.draft_mut().is_none());
    assert_eq!(state.records()[0].name, "New Year");
}
