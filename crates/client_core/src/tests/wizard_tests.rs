use super::*;
use chrono::Utc;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};

fn png(name: &str, width: u32, height: u32) -> AssetFile {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png");
    AssetFile::from_bytes(name, bytes).expect("asset")
}

fn text_patch() -> DraftPatch {
    DraftPatch {
        app_name_en: Some("Foo".into()),
        app_name_ar: Some("فو".into()),
        privacy_link: Some("https://x.com/p".into()),
        short_description: Some("ok".into()),
        long_description: Some("ok".into()),
        ..DraftPatch::default()
    }
}

fn complete_wizard() -> WizardController {
    let mut wizard = WizardController::new();
    wizard.mutate(text_patch());
    wizard.mutate(DraftPatch {
        logo: Some(Some(png("logo.png", 512, 512))),
        screenshots: Some(vec![png("home.png", 20, 40)]),
        ..DraftPatch::default()
    });
    wizard
}

#[test]
fn steps_are_ordered_and_track_completion() {
    let mut wizard = WizardController::new();
    let labels: Vec<&str> = wizard.steps().iter().map(|s| s.definition.label).collect();
    assert_eq!(
        labels,
        [
            "App Name",
            "Privacy",
            "Short Description",
            "Long Description",
            "Logo",
            "Screenshots",
            "Confirm"
        ]
    );

    wizard.mutate(text_patch());
    assert!(wizard.advance());
    assert!(wizard.advance());
    let steps = wizard.steps();
    assert!(steps[0].completed && steps[1].completed);
    assert!(steps[2].current && !steps[2].completed);
    assert_eq!(wizard.current_key(), StepKey::ShortDescription);
}

#[test]
fn advance_is_a_no_op_when_the_step_is_invalid() {
    let mut wizard = WizardController::new();
    assert!(!wizard.advance());
    assert_eq!(wizard.current_step(), 0);
    assert_eq!(
        wizard.error(Field::AppNameEn),
        Some("App name in English is required")
    );
    assert_eq!(
        wizard.error(Field::AppNameAr),
        Some("App name in Arabic is required")
    );

    wizard.mutate(DraftPatch {
        app_name_en: Some("  ".into()),
        app_name_ar: Some("فو".into()),
        ..DraftPatch::default()
    });
    assert!(!wizard.advance());
    assert_eq!(wizard.errors().len(), 1);
}

#[test]
fn validation_only_reports_the_validated_step() {
    let mut wizard = WizardController::new();
    assert!(!wizard.validate(StepKey::AppName));
    assert!(!wizard.validate(StepKey::Privacy));
    assert_eq!(wizard.errors().len(), 1);
    assert_eq!(
        wizard.error(Field::PrivacyLink),
        Some("Privacy policy link is required")
    );

    wizard.mutate(DraftPatch {
        privacy_link: Some("ftp://x.com".into()),
        ..DraftPatch::default()
    });
    assert!(!wizard.validate(StepKey::Privacy));
    assert_eq!(
        wizard.error(Field::PrivacyLink),
        Some("Please enter a valid URL starting with http:// or https://")
    );
    assert!(wizard.validate(StepKey::Confirm));
    assert!(wizard.errors().is_empty());
}

#[test]
fn description_limits_are_inclusive() {
    let mut wizard = WizardController::new();
    wizard.mutate(DraftPatch {
        short_description: Some("a".repeat(80)),
        long_description: Some("b".repeat(301)),
        ..DraftPatch::default()
    });
    assert!(wizard.validate(StepKey::ShortDescription));
    assert!(!wizard.validate(StepKey::LongDescription));
    assert_eq!(
        wizard.error(Field::LongDescription),
        Some("Long description must be 300 characters or less")
    );
}

#[test]
fn logo_must_be_present_and_square() {
    let mut wizard = WizardController::new();
    assert!(!wizard.validate(StepKey::Logo));
    assert_eq!(wizard.error(Field::Logo), Some("Logo image is required"));

    wizard.mutate(DraftPatch {
        logo: Some(Some(png("wide.png", 600, 300))),
        ..DraftPatch::default()
    });
    assert!(!wizard.validate(StepKey::Logo));
    assert_eq!(
        wizard.error(Field::Logo),
        Some("Image must be exactly 512x512px")
    );

    wizard.mutate(DraftPatch {
        logo: Some(Some(png("logo.png", 512, 512))),
        ..DraftPatch::default()
    });
    assert!(wizard.validate(StepKey::Logo));
    assert!(wizard.draft().logo_preview().expect("preview").starts_with("data:image/png;base64,"));

    wizard.mutate(DraftPatch {
        logo: Some(None),
        ..DraftPatch::default()
    });
    assert!(wizard.draft().logo_preview().is_none());
}

#[test]
fn advance_stops_at_the_last_step_and_retreat_at_the_first() {
    let mut wizard = complete_wizard();
    for _ in 0..STEPS.len() - 1 {
        assert!(wizard.advance());
    }
    assert!(wizard.is_last_step());
    assert!(!wizard.advance());
    assert_eq!(wizard.current_step(), STEPS.len() - 1);

    for _ in 0..STEPS.len() + 2 {
        wizard.retreat();
    }
    assert_eq!(wizard.current_step(), 0);
}

#[test]
fn go_to_only_jumps_backwards() {
    let mut wizard = complete_wizard();
    assert!(!wizard.go_to(3));
    wizard.advance();
    wizard.advance();
    assert!(wizard.go_to(0));
    assert_eq!(wizard.current_step(), 0);
}

#[test]
fn finalize_moves_to_first_failing_step() {
    let mut wizard = WizardController::new();
    wizard.mutate(text_patch());
    let errors = wizard.finalize().expect_err("no assets");
    assert!(errors.contains_key(&Field::Logo));
    assert_eq!(wizard.current_key(), StepKey::Logo);

    let mut wizard = complete_wizard();
    let draft = wizard.finalize().expect("complete");
    let payload = draft.to_payload();
    assert_eq!(payload.app_name_en, "Foo");
    assert_eq!(payload.screenshots.len(), 1);
    assert_eq!(payload.logo.expect("logo").content_type, "image/png");
}

#[test]
fn screenshots_can_be_removed_individually() {
    let mut wizard = WizardController::new();
    wizard.mutate(DraftPatch {
        screenshots: Some(vec![png("a.png", 4, 4), png("b.png", 4, 4)]),
        ..DraftPatch::default()
    });
    assert_eq!(wizard.draft().screenshot_previews().len(), 2);
    assert!(wizard.remove_screenshot(0));
    assert!(!wizard.remove_screenshot(5));
    assert_eq!(wizard.draft().screenshots[0].file_name, "b.png");
    assert_eq!(wizard.draft().screenshot_previews().len(), 1);
}

#[test]
fn reset_restores_initial_state() {
    let mut wizard = complete_wizard();
    wizard.advance();
    wizard.validate(StepKey::Confirm);
    wizard.reset();
    assert_eq!(wizard.current_step(), 0);
    assert_eq!(wizard.draft(), &SubmissionDraft::default());
    assert!(wizard.errors().is_empty());
}

#[test]
fn editing_uses_stored_assets_until_replaced() {
    let record = SubmissionRecord {
        id: SubmissionId(7),
        app_name_en: "Foo".into(),
        app_name_ar: "فو".into(),
        privacy_link: "https://x.com/p".into(),
        short_description: "ok".into(),
        long_description: "ok".into(),
        logo_url: "http://h/assets/app_logos/1/1-logo.png".into(),
        screenshot_urls: vec!["http://h/assets/app_screenshots/1/2-a.png".into()],
        created_by: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let mut wizard = WizardController::editing(&record);
    assert_eq!(wizard.mode(), WizardMode::Edit(SubmissionId(7)));
    assert!(wizard.validate(StepKey::Logo));
    assert!(wizard.validate(StepKey::Screenshots));
    assert_eq!(wizard.draft().logo_preview(), Some(record.logo_url.as_str()));

    let payload = wizard.finalize().expect("valid").to_payload();
    assert!(payload.logo.is_none());
    assert!(payload.screenshots.is_empty());

    wizard.mutate(DraftPatch {
        screenshots: Some(vec![png("new.png", 4, 4)]),
        ..DraftPatch::default()
    });
    let previews = wizard.draft().screenshot_previews();
    assert_eq!(previews.len(), 1);
    assert!(previews[0].starts_with("data:image/png"));
}
