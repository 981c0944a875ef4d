use super::*;
use crate::test_support::{FakeComposeField, FakeDialog};

fn coordinator(initial: &str) -> (PickerCoordinator, Arc<FakeDialog>, Arc<FakeComposeField>) {
    let dialog = Arc::new(FakeDialog::default());
    let compose = Arc::new(FakeComposeField::with_value(initial));
    (
        PickerCoordinator::new(dialog.clone(), compose.clone()),
        dialog,
        compose,
    )
}

#[test]
fn double_toggle_from_closed_ends_closed_with_compose_untouched() {
    let (mut picker, dialog, compose) = coordinator("draft");

    picker.toggle();
    assert_eq!(picker.state(), DialogState::Open);
    assert!(dialog.is_open());

    picker.toggle();
    assert_eq!(picker.state(), DialogState::Closed);
    assert!(!dialog.is_open());
    assert_eq!(compose.value(), "draft");
    assert_eq!(compose.focus_count(), 1);
}

#[test]
fn selecting_glyph_appends_closes_and_refocuses() {
    let (mut picker, dialog, compose) = coordinator("hello ");

    picker.toggle();
    picker.on_glyph_selected("😀");

    assert_eq!(compose.value(), "hello 😀");
    assert_eq!(picker.state(), DialogState::Closed);
    assert!(!dialog.is_open());
    assert_eq!(compose.focus_count(), 1);
    assert_eq!(dialog.modal_opens(), 1);
}

#[test]
fn glyphs_accumulate_at_end_across_selections() {
    let (mut picker, _dialog, compose) = coordinator("");

    for glyph in ["🎉", "👍"] {
        picker.toggle();
        picker.on_glyph_selected(glyph);
    }

    assert_eq!(compose.value(), "🎉👍");
    assert_eq!(picker.state(), DialogState::Closed);
}
