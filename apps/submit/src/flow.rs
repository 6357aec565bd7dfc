//! Terminal rendition of the submission wizard.

use std::{
    io::{self, Write as _},
    path::PathBuf,
};

use anyhow::{bail, Result};
use client_core::{
    pick_logo, pick_screenshots, DraftPatch, StepKey, SubmissionDraft, WizardController,
};
use shared::{protocol::SubmissionRecord, validation::FieldErrors};
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Values supplied on the command line. Anything missing is asked for on stdin.
#[derive(clap::Args, Debug, Default)]
pub struct DraftArgs {
    #[arg(long)]
    pub name_en: Option<String>,
    #[arg(long)]
    pub name_ar: Option<String>,
    #[arg(long)]
    pub privacy_link: Option<String>,
    #[arg(long)]
    pub short_description: Option<String>,
    #[arg(long)]
    pub long_description: Option<String>,
    #[arg(long)]
    pub logo: Option<PathBuf>,
    #[arg(long = "screenshot")]
    pub screenshots: Vec<PathBuf>,
    /// Submit without asking for confirmation.
    #[arg(long)]
    pub yes: bool,
}

pub struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(stdin()).lines(),
        }
    }

    /// `None` once stdin is exhausted.
    pub async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}: ");
        io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }
}

enum Answer {
    Value(String),
    Keep,
    Back,
}

async fn text(
    prompter: &mut Prompter,
    label: &str,
    current: &str,
    preset: Option<String>,
) -> Result<Answer> {
    if let Some(value) = preset {
        return Ok(Answer::Value(value));
    }
    let label = if current.is_empty() {
        label.to_string()
    } else {
        format!("{label} [{current}]")
    };
    match prompter.ask(&label).await? {
        None => bail!("input ended before the wizard was complete"),
        Some(line) if line.trim() == "<" => Ok(Answer::Back),
        Some(line) if line.trim().is_empty() => Ok(Answer::Keep),
        Some(line) => Ok(Answer::Value(line)),
    }
}

/// Walks the wizard until the draft is confirmed. Returns `false` when the user declines.
pub async fn run_wizard(
    wizard: &mut WizardController,
    mut args: DraftArgs,
    prompter: &mut Prompter,
) -> Result<bool> {
    println!("Enter '<' to go back a step; an empty answer keeps the current value.");
    loop {
        print_steps(wizard);
        let key = wizard.current_key();
        if key == StepKey::Confirm {
            print_draft(wizard.draft());
            if !args.yes {
                match prompter.ask("Submit? [y/N]").await?.as_deref().map(str::trim) {
                    Some("<") => {
                        wizard.retreat();
                        continue;
                    }
                    Some(answer) if answer.eq_ignore_ascii_case("y") => {}
                    _ => return Ok(false),
                }
            }
            match wizard.finalize() {
                Ok(_) => return Ok(true),
                Err(errors) => {
                    print_errors(&errors);
                    args.yes = false;
                    continue;
                }
            }
        }

        if !fill_step(wizard, key, &mut args, prompter).await? {
            wizard.retreat();
            continue;
        }
        if !wizard.advance() {
            print_errors(wizard.errors());
        }
    }
}

/// Returns `false` when the user asked to go back.
async fn fill_step(
    wizard: &mut WizardController,
    key: StepKey,
    args: &mut DraftArgs,
    prompter: &mut Prompter,
) -> Result<bool> {
    let mut patch = DraftPatch::default();
    let draft = wizard.draft().clone();
    match key {
        StepKey::AppName => {
            let preset = args.name_en.take();
            match text(prompter, "App name (English)", &draft.app_name_en, preset).await? {
                Answer::Back => return Ok(false),
                Answer::Value(value) => patch.app_name_en = Some(value),
                Answer::Keep => {}
            }
            let preset = args.name_ar.take();
            match text(prompter, "App name (Arabic)", &draft.app_name_ar, preset).await? {
                Answer::Back => return Ok(false),
                Answer::Value(value) => patch.app_name_ar = Some(value),
                Answer::Keep => {}
            }
        }
        StepKey::Privacy => {
            let preset = args.privacy_link.take();
            match text(prompter, "Privacy policy URL", &draft.privacy_link, preset).await? {
                Answer::Back => return Ok(false),
                Answer::Value(value) => patch.privacy_link = Some(value),
                Answer::Keep => {}
            }
        }
        StepKey::ShortDescription => {
            match text(
                prompter,
                "Short description (max 80)",
                &draft.short_description,
                args.short_description.take(),
            )
            .await?
            {
                Answer::Back => return Ok(false),
                Answer::Value(value) => patch.short_description = Some(value),
                Answer::Keep => {}
            }
        }
        StepKey::LongDescription => {
            match text(
                prompter,
                "Long description (max 300)",
                &draft.long_description,
                args.long_description.take(),
            )
            .await?
            {
                Answer::Back => return Ok(false),
                Answer::Value(value) => patch.long_description = Some(value),
                Answer::Keep => {}
            }
        }
        StepKey::Logo => {
            let current = draft.logo_preview().map(short_preview).unwrap_or_default();
            let preset = args.logo.take().map(|path| path.display().to_string());
            match text(prompter, "Logo file (512x512)", &current, preset).await? {
                Answer::Back => return Ok(false),
                Answer::Value(path) => match pick_logo(path.trim().as_ref()).await {
                    Ok(file) => patch.logo = Some(Some(file)),
                    Err(message) => println!("  ! {message}"),
                },
                Answer::Keep => {}
            }
        }
        StepKey::Screenshots => {
            let current = format!("{} selected", draft.screenshot_previews().len());
            let preset = (!args.screenshots.is_empty())
                .then(|| std::mem::take(&mut args.screenshots))
                .map(|paths| {
                    paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                });
            match text(
                prompter,
                "Screenshot files, comma separated ('rm N' removes one)",
                &current,
                preset,
            )
            .await?
            {
                Answer::Back => return Ok(false),
                Answer::Value(value) => {
                    if let Some(index) = value.trim().strip_prefix("rm ") {
                        let removed = index
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|n| n.checked_sub(1))
                            .is_some_and(|i| wizard.remove_screenshot(i));
                        if !removed {
                            println!("  ! no picked screenshot {}", index.trim());
                        }
                        return Ok(true);
                    }
                    let paths: Vec<PathBuf> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect();
                    let selection = pick_screenshots(&paths).await;
                    if let Some(message) = &selection.error {
                        println!("  ! {message}");
                    }
                    patch.screenshots = Some(selection.files);
                }
                Answer::Keep => {}
            }
        }
        StepKey::Confirm => {}
    }
    wizard.mutate(patch);
    Ok(true)
}

fn print_steps(wizard: &WizardController) {
    let line: Vec<String> = wizard
        .steps()
        .iter()
        .map(|step| {
            let mark = if step.current {
                '>'
            } else if step.completed {
                'x'
            } else {
                ' '
            };
            format!("({mark}) {}", step.definition.label)
        })
        .collect();
    println!("\n{}", line.join("  "));
}

fn print_errors(errors: &FieldErrors) {
    for (field, message) in errors {
        println!("  ! {}: {message}", field.wire_name());
    }
}

fn short_preview(preview: &str) -> String {
    if preview.starts_with("data:") {
        "picked file".to_string()
    } else {
        preview.to_string()
    }
}

fn print_draft(draft: &SubmissionDraft) {
    println!("App name (English): {}", draft.app_name_en);
    println!("App name (Arabic):  {}", draft.app_name_ar);
    println!("Privacy policy:     {}", draft.privacy_link);
    println!("Short description:  {}", draft.short_description);
    println!("Long description:   {}", draft.long_description);
    match &draft.logo {
        Some(logo) => {
            let (w, h) = logo.info.dimensions();
            println!("Logo:               {} ({w}x{h}, {} bytes)", logo.file_name, logo.len());
        }
        None => println!(
            "Logo:               {}",
            draft.stored_logo_url.as_deref().unwrap_or("-")
        ),
    }
    if draft.screenshots.is_empty() {
        for url in &draft.stored_screenshot_urls {
            println!("Screenshot:         {url}");
        }
    } else {
        for (n, shot) in draft.screenshots.iter().enumerate() {
            println!("Screenshot {}:       {} ({} bytes)", n + 1, shot.file_name, shot.len());
        }
    }
}

pub fn print_record(record: &SubmissionRecord) {
    println!("#{} {} / {}", record.id, record.app_name_en, record.app_name_ar);
    println!("  privacy:  {}", record.privacy_link);
    println!("  short:    {}", record.short_description);
    println!("  long:     {}", record.long_description);
    println!("  logo:     {}", record.logo_url);
    for url in &record.screenshot_urls {
        println!("  shot:     {url}");
    }
    println!(
        "  created:  {}  updated: {}",
        record.created_at.to_rfc3339(),
        record.updated_at.to_rfc3339()
    );
}
