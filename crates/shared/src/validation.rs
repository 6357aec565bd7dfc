//! Field rules shared by the wizard and the server.
//!
//! Blankness is checked on the trimmed value, length on the raw value counted
//! in Unicode scalar values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SHORT_DESCRIPTION_MAX_CHARS: usize = 80;
pub const LONG_DESCRIPTION_MAX_CHARS: usize = 300;
pub const LOGO_WIDTH: u32 = 512;
pub const LOGO_HEIGHT: u32 = 512;
pub const LOGO_MAX_BYTES: usize = 2 * 1024 * 1024;
pub const SCREENSHOT_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    AppNameEn,
    AppNameAr,
    PrivacyLink,
    ShortDescription,
    LongDescription,
    Logo,
    Screenshots,
}

impl Field {
    pub fn wire_name(self) -> &'static str {
        match self {
            Field::AppNameEn => "app_name_en",
            Field::AppNameAr => "app_name_ar",
            Field::PrivacyLink => "privacy_link",
            Field::ShortDescription => "short_description",
            Field::LongDescription => "long_description",
            Field::Logo => "logo",
            Field::Screenshots => "screenshots",
        }
    }
}

pub type FieldErrors = BTreeMap<Field, String>;

pub fn to_wire(errors: &FieldErrors) -> BTreeMap<String, String> {
    errors
        .iter()
        .map(|(field, message)| (field.wire_name().to_string(), message.clone()))
        .collect()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn app_name_en_error(value: &str) -> Option<String> {
    is_blank(value).then(|| "App name in English is required".to_string())
}

pub fn app_name_ar_error(value: &str) -> Option<String> {
    is_blank(value).then(|| "App name in Arabic is required".to_string())
}

pub fn privacy_link_error(value: &str) -> Option<String> {
    if is_blank(value) {
        Some("Privacy policy link is required".to_string())
    } else if !value.starts_with("http") {
        Some("Please enter a valid URL starting with http:// or https://".to_string())
    } else {
        None
    }
}

pub fn short_description_error(value: &str) -> Option<String> {
    bounded_text_error(value, SHORT_DESCRIPTION_MAX_CHARS, "Short description")
}

pub fn long_description_error(value: &str) -> Option<String> {
    bounded_text_error(value, LONG_DESCRIPTION_MAX_CHARS, "Long description")
}

fn bounded_text_error(value: &str, max_chars: usize, label: &str) -> Option<String> {
    if is_blank(value) {
        Some(format!("{label} is required"))
    } else if value.chars().count() > max_chars {
        Some(format!("{label} must be {max_chars} characters or less"))
    } else {
        None
    }
}

/// `dimensions` is `None` when the logo has not been decoded, e.g. a stored URL.
pub fn logo_error(present: bool, dimensions: Option<(u32, u32)>) -> Option<String> {
    if !present {
        return Some("Logo image is required".to_string());
    }
    match dimensions {
        Some((width, height)) if width != LOGO_WIDTH || height != LOGO_HEIGHT => Some(format!(
            "Image must be exactly {LOGO_WIDTH}x{LOGO_HEIGHT}px"
        )),
        _ => None,
    }
}

pub fn screenshots_error(count: usize) -> Option<String> {
    (count == 0).then(|| "At least one screenshot is required".to_string())
}

pub fn max_size_message(max_bytes: usize, multiple: bool) -> String {
    let megabytes = max_bytes / (1024 * 1024);
    if multiple {
        format!("Some files exceed the maximum size of {megabytes}MB")
    } else {
        format!("File exceeds the maximum size of {megabytes}MB")
    }
}

/// Borrowed view of the text half of a submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionText<'a> {
    pub app_name_en: &'a str,
    pub app_name_ar: &'a str,
    pub privacy_link: &'a str,
    pub short_description: &'a str,
    pub long_description: &'a str,
}

pub fn text_errors(text: SubmissionText<'_>) -> FieldErrors {
    let checks = [
        (Field::AppNameEn, app_name_en_error(text.app_name_en)),
        (Field::AppNameAr, app_name_ar_error(text.app_name_ar)),
        (Field::PrivacyLink, privacy_link_error(text.privacy_link)),
        (
            Field::ShortDescription,
            short_description_error(text.short_description),
        ),
        (
            Field::LongDescription,
            long_description_error(text.long_description),
        ),
    ];
    checks
        .into_iter()
        .filter_map(|(field, error)| error.map(|message| (field, message)))
        .collect()
}
