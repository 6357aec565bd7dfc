//! Step sequencing, per-step validation, and the draft the steps fill in.

use shared::{
    domain::SubmissionId,
    protocol::{SubmissionPayload, SubmissionRecord},
    validation::{
        app_name_ar_error, app_name_en_error, logo_error, long_description_error,
        privacy_link_error, screenshots_error, short_description_error, Field, FieldErrors,
    },
};

use crate::preview::AssetFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKey {
    AppName,
    Privacy,
    ShortDescription,
    LongDescription,
    Logo,
    Screenshots,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub key: StepKey,
    pub label: &'static str,
}

pub const STEPS: [StepDefinition; 7] = [
    StepDefinition {
        key: StepKey::AppName,
        label: "App Name",
    },
    StepDefinition {
        key: StepKey::Privacy,
        label: "Privacy",
    },
    StepDefinition {
        key: StepKey::ShortDescription,
        label: "Short Description",
    },
    StepDefinition {
        key: StepKey::LongDescription,
        label: "Long Description",
    },
    StepDefinition {
        key: StepKey::Logo,
        label: "Logo",
    },
    StepDefinition {
        key: StepKey::Screenshots,
        label: "Screenshots",
    },
    StepDefinition {
        key: StepKey::Confirm,
        label: "Confirm",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStatus {
    pub definition: StepDefinition,
    pub completed: bool,
    pub current: bool,
}

/// Form state accumulated across the wizard steps.
///
/// `stored_logo_url` and `stored_screenshot_urls` are set when editing an
/// existing submission and stand in for assets that will be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionDraft {
    pub app_name_en: String,
    pub app_name_ar: String,
    pub privacy_link: String,
    pub short_description: String,
    pub long_description: String,
    pub logo: Option<AssetFile>,
    pub screenshots: Vec<AssetFile>,
    pub stored_logo_url: Option<String>,
    pub stored_screenshot_urls: Vec<String>,
}

impl SubmissionDraft {
    pub fn from_record(record: &SubmissionRecord) -> Self {
        Self {
            app_name_en: record.app_name_en.clone(),
            app_name_ar: record.app_name_ar.clone(),
            privacy_link: record.privacy_link.clone(),
            short_description: record.short_description.clone(),
            long_description: record.long_description.clone(),
            logo: None,
            screenshots: Vec::new(),
            stored_logo_url: (!record.logo_url.is_empty()).then(|| record.logo_url.clone()),
            stored_screenshot_urls: record.screenshot_urls.clone(),
        }
    }

    pub fn logo_preview(&self) -> Option<&str> {
        self.logo
            .as_ref()
            .map(|logo| logo.preview.as_str())
            .or(self.stored_logo_url.as_deref())
    }

    /// Freshly picked screenshots replace the stored ones, so only one set is ever shown.
    pub fn screenshot_previews(&self) -> Vec<&str> {
        if self.screenshots.is_empty() {
            self.stored_screenshot_urls.iter().map(String::as_str).collect()
        } else {
            self.screenshots.iter().map(|s| s.preview.as_str()).collect()
        }
    }

    /// Request body for create or update. Unchanged stored assets are omitted.
    pub fn to_payload(&self) -> SubmissionPayload {
        SubmissionPayload {
            app_name_en: self.app_name_en.clone(),
            app_name_ar: self.app_name_ar.clone(),
            privacy_link: self.privacy_link.clone(),
            short_description: self.short_description.clone(),
            long_description: self.long_description.clone(),
            logo: self.logo.as_ref().map(AssetFile::to_upload),
            screenshots: self.screenshots.iter().map(AssetFile::to_upload).collect(),
        }
    }

    fn errors_for(&self, step: StepKey) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let mut check = |field: Field, error: Option<String>| {
            if let Some(message) = error {
                errors.insert(field, message);
            }
        };
        match step {
            StepKey::AppName => {
                check(Field::AppNameEn, app_name_en_error(&self.app_name_en));
                check(Field::AppNameAr, app_name_ar_error(&self.app_name_ar));
            }
            StepKey::Privacy => check(Field::PrivacyLink, privacy_link_error(&self.privacy_link)),
            StepKey::ShortDescription => check(
                Field::ShortDescription,
                short_description_error(&self.short_description),
            ),
            StepKey::LongDescription => check(
                Field::LongDescription,
                long_description_error(&self.long_description),
            ),
            StepKey::Logo => check(
                Field::Logo,
                logo_error(
                    self.logo.is_some() || self.stored_logo_url.is_some(),
                    self.logo.as_ref().map(|logo| logo.info.dimensions()),
                ),
            ),
            StepKey::Screenshots => check(
                Field::Screenshots,
                screenshots_error(self.screenshots.len().max(self.stored_screenshot_urls.len())),
            ),
            StepKey::Confirm => {}
        }
        errors
    }
}

/// Partial update for [`WizardController::mutate`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct DraftPatch {
    pub app_name_en: Option<String>,
    pub app_name_ar: Option<String>,
    pub privacy_link: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    /// `Some(None)` clears the logo and its preview.
    pub logo: Option<Option<AssetFile>>,
    pub screenshots: Option<Vec<AssetFile>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardMode {
    Create,
    Edit(SubmissionId),
}

#[derive(Debug, Clone)]
pub struct WizardController {
    mode: WizardMode,
    step: usize,
    draft: SubmissionDraft,
    errors: FieldErrors,
}

impl Default for WizardController {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardController {
    pub fn new() -> Self {
        Self {
            mode: WizardMode::Create,
            step: 0,
            draft: SubmissionDraft::default(),
            errors: FieldErrors::new(),
        }
    }

    /// Starts from an existing submission; stored assets satisfy the logo and screenshot steps.
    pub fn editing(record: &SubmissionRecord) -> Self {
        Self {
            mode: WizardMode::Edit(record.id),
            step: 0,
            draft: SubmissionDraft::from_record(record),
            errors: FieldErrors::new(),
        }
    }

    pub fn mode(&self) -> WizardMode {
        self.mode
    }

    pub fn draft(&self) -> &SubmissionDraft {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn current_key(&self) -> StepKey {
        STEPS[self.step].key
    }

    pub fn is_last_step(&self) -> bool {
        self.step + 1 == STEPS.len()
    }

    pub fn steps(&self) -> Vec<StepStatus> {
        STEPS
            .iter()
            .enumerate()
            .map(|(index, definition)| StepStatus {
                definition: *definition,
                completed: index < self.step,
                current: index == self.step,
            })
            .collect()
    }

    /// Moves forward only when the current step validates. Returns whether the cursor moved.
    pub fn advance(&mut self) -> bool {
        if !self.validate(self.current_key()) || self.is_last_step() {
            return false;
        }
        self.step += 1;
        true
    }

    pub fn retreat(&mut self) {
        self.step = self.step.saturating_sub(1);
    }

    /// Jumps back to a completed step. Forward jumps are refused.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index >= self.step {
            return false;
        }
        self.step = index;
        true
    }

    pub fn mutate(&mut self, patch: DraftPatch) {
        let draft = &mut self.draft;
        if let Some(v) = patch.app_name_en {
            draft.app_name_en = v;
        }
        if let Some(v) = patch.app_name_ar {
            draft.app_name_ar = v;
        }
        if let Some(v) = patch.privacy_link {
            draft.privacy_link = v;
        }
        if let Some(v) = patch.short_description {
            draft.short_description = v;
        }
        if let Some(v) = patch.long_description {
            draft.long_description = v;
        }
        if let Some(logo) = patch.logo {
            if logo.is_none() {
                draft.stored_logo_url = None;
            }
            draft.logo = logo;
        }
        if let Some(screenshots) = patch.screenshots {
            draft.screenshots = screenshots;
        }
    }

    /// Drops one picked screenshot together with its preview.
    pub fn remove_screenshot(&mut self, index: usize) -> bool {
        if index >= self.draft.screenshots.len() {
            return false;
        }
        self.draft.screenshots.remove(index);
        true
    }

    /// Replaces the error map with this step's errors and reports whether there were none.
    pub fn validate(&mut self, step: StepKey) -> bool {
        self.errors = self.draft.errors_for(step);
        self.errors.is_empty()
    }

    /// Validates every step in order. On failure the cursor moves to the first failing step.
    pub fn finalize(&mut self) -> Result<&SubmissionDraft, FieldErrors> {
        for (index, definition) in STEPS.iter().enumerate() {
            if !self.validate(definition.key) {
                self.step = index;
                return Err(self.errors.clone());
            }
        }
        Ok(&self.draft)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
