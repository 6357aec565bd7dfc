use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    download_targets, guard, ClientError, Route, SubmissionClient, WizardController,
};
use shared::{
    domain::{Role, SubmissionId, UserId},
    protocol::{CreateUserRequest, UpdateUserRequest},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod flow;

use flow::{print_record, run_wizard, DraftArgs, Prompter};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "SUBMIT_SERVER_URL", default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long, env = "SUBMIT_EMAIL")]
    email: Option<String>,
    #[arg(long, env = "SUBMIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Token printed by `login`; used instead of email and password.
    #[arg(long, env = "SUBMIT_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print a bearer token.
    Login,
    /// Fill in and send a new submission.
    Submit(DraftArgs),
    /// Dashboard: every submission, newest first.
    List,
    Show {
        id: i64,
    },
    /// Re-run the wizard over an existing submission.
    Edit {
        id: i64,
        #[command(flatten)]
        draft: DraftArgs,
    },
    Delete {
        id: i64,
    },
    /// Save a submission's logo and screenshots as `{app}-logo.png` and so on.
    Download {
        id: i64,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    #[command(subcommand)]
    Users(UsersCommand),
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "writer")]
        role: Role,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: Role,
    },
    Delete {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut client = SubmissionClient::new(args.server_url.clone());
    if matches!(args.command, Command::Login) {
        let (Some(email), Some(password)) = (&args.email, &args.password) else {
            bail!("login needs --email and --password");
        };
        let user = client.login(email, password).await.map_err(redirect)?;
        info!(user_id = user.id.0, "signed in");
        if let Some(session) = client.session() {
            println!("{}", session.token);
        }
        return Ok(());
    }

    if let Some(token) = &args.token {
        client.resume(token).await.map_err(redirect)?;
    } else if let (Some(email), Some(password)) = (&args.email, &args.password) {
        client.login(email, password).await.map_err(redirect)?;
    }

    run(&client, args.command).await
}

async fn run(client: &SubmissionClient, command: Command) -> Result<()> {
    match command {
        Command::Login => {}
        Command::Submit(draft) => {
            enter(client, Route::Wizard)?;
            let mut wizard = WizardController::new();
            let mut prompter = Prompter::new();
            if !run_wizard(&mut wizard, draft, &mut prompter).await? {
                println!("Nothing submitted.");
                return Ok(());
            }
            let record = client
                .create_submission(wizard.draft())
                .await
                .map_err(report)?;
            println!("Submitted #{}. View it at {}", record.id, Route::Preview(record.id));
        }
        Command::List => {
            enter(client, Route::Dashboard)?;
            let records = client.list_submissions().await.map_err(redirect)?;
            if records.is_empty() {
                println!("No submissions yet.");
            }
            for record in records {
                println!(
                    "#{:<5} {:<24} {:<24} {}",
                    record.id,
                    record.app_name_en,
                    record.app_name_ar,
                    record.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Show { id } => {
            let id = SubmissionId(id);
            enter(client, Route::Preview(id))?;
            match client.get_submission(id).await.map_err(redirect)? {
                Some(record) => print_record(&record),
                None => println!("Submission #{id} was not found. Back to {}", Route::Dashboard),
            }
        }
        Command::Edit { id, draft } => {
            let id = SubmissionId(id);
            enter(client, Route::Edit(id))?;
            let Some(record) = client.get_submission(id).await.map_err(redirect)? else {
                bail!("submission #{id} was not found");
            };
            let mut wizard = WizardController::editing(&record);
            let mut prompter = Prompter::new();
            if !run_wizard(&mut wizard, draft, &mut prompter).await? {
                println!("Nothing changed.");
                return Ok(());
            }
            let record = client
                .update_submission(id, wizard.draft())
                .await
                .map_err(report)?;
            println!("Updated #{}.", record.id);
        }
        Command::Delete { id } => {
            let id = SubmissionId(id);
            enter(client, Route::Dashboard)?;
            client.delete_submission(id).await.map_err(redirect)?;
            println!("Deleted #{id}.");
        }
        Command::Download { id, dir } => {
            let id = SubmissionId(id);
            enter(client, Route::Preview(id))?;
            let Some(record) = client.get_submission(id).await.map_err(redirect)? else {
                bail!("submission #{id} was not found");
            };
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
            for target in download_targets(&record) {
                let bytes = client.download_asset(&target.url).await.map_err(redirect)?;
                let path = dir.join(&target.file_name);
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Saved {}", path.display());
            }
        }
        Command::Users(command) => {
            enter(client, Route::Users)?;
            users(client, command).await?;
        }
    }
    Ok(())
}

async fn users(client: &SubmissionClient, command: UsersCommand) -> Result<()> {
    match command {
        UsersCommand::List => {
            for user in client.list_users().await.map_err(redirect)? {
                println!("#{:<4} {:<8} {:<32} {}", user.id, user.role, user.email, user.name);
            }
        }
        UsersCommand::Create {
            name,
            email,
            password,
            role,
        } => {
            let user = client
                .create_user(&CreateUserRequest {
                    name,
                    email,
                    password,
                    role,
                })
                .await
                .map_err(report)?;
            println!("Created user #{} ({})", user.id, user.email);
        }
        UsersCommand::Update { id, name, role } => {
            let user = client
                .update_user(UserId(id), &UpdateUserRequest { name, role })
                .await
                .map_err(report)?;
            println!("Updated user #{} ({}, {})", user.id, user.name, user.role);
        }
        UsersCommand::Delete { id } => {
            client.delete_user(UserId(id)).await.map_err(redirect)?;
            println!("Deleted user #{id}");
        }
    }
    Ok(())
}

fn enter(client: &SubmissionClient, route: Route) -> Result<()> {
    guard(route, client.current_user())
        .map(|_| ())
        .map_err(|target| anyhow!("{route} is not available here; continue at {target}"))
}

/// Prints field errors before falling back to [`redirect`].
fn report(err: ClientError) -> anyhow::Error {
    if let ClientError::Api(api) = &err {
        for (field, message) in &api.fields {
            println!("  ! {field}: {message}");
        }
    }
    redirect(err)
}

fn redirect(err: ClientError) -> anyhow::Error {
    match err.recovery_route() {
        Some(route) => anyhow!("{err} (continue at {route})"),
        None => anyhow!(err),
    }
}
