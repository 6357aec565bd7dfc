use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use server_api::provision_user;
use shared::{
    domain::{AssetBucket, Role, SubmissionId},
    error::ApiException,
};
use storage::{FsObjectStore, ObjectStore, Storage};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/server.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        name: String,
        email: String,
        password: String,
        #[arg(long, default_value = "writer")]
        role: Role,
    },
    ListUsers,
    ListSubmissions,
    /// Deletes the row and, when `--asset-root` is given, its stored images.
    DeleteSubmission {
        id: i64,
        #[arg(long)]
        asset_root: Option<PathBuf>,
        /// Base URL the server was publishing asset links under.
        #[arg(long, default_value = "http://127.0.0.1:8443")]
        public_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser {
            name,
            email,
            password,
            role,
        } => {
            let user = match provision_user(&storage, &name, &email, &password, role).await {
                Ok(user) => user,
                Err(err) => {
                    for (field, message) in &err.fields {
                        eprintln!("  ! {field}: {message}");
                    }
                    return Err(ApiException::from(err).into());
                }
            };
            println!("created user_id={} role={}", user.id, user.role);
        }
        Command::ListUsers => {
            for user in storage.list_users().await? {
                println!("{}\t{}\t{}\t{}", user.id, user.role, user.email, user.name);
            }
        }
        Command::ListSubmissions => {
            for record in storage.list_submissions().await? {
                println!(
                    "{}\t{}\t{}\t{} screenshots",
                    record.id,
                    record.created_at.to_rfc3339(),
                    record.app_name_en,
                    record.screenshot_urls.len()
                );
            }
        }
        Command::DeleteSubmission {
            id,
            asset_root,
            public_url,
        } => {
            let id = SubmissionId(id);
            let Some(record) = storage.load_submission(id).await? else {
                bail!("submission {id} not found");
            };
            storage.delete_submission(id).await?;
            println!("deleted submission_id={id}");

            if let Some(root) = asset_root {
                let store = FsObjectStore::new(root, &public_url).await?;
                let logos: Vec<String> = store
                    .key_for_url(AssetBucket::Logo, &record.logo_url)
                    .into_iter()
                    .collect();
                let shots: Vec<String> = record
                    .screenshot_urls
                    .iter()
                    .filter_map(|url| store.key_for_url(AssetBucket::Screenshot, url))
                    .collect();
                // The row is already gone; leftovers are reported, not fatal.
                let mut removed = 0;
                let batches = [(AssetBucket::Logo, &logos), (AssetBucket::Screenshot, &shots)];
                for (bucket, keys) in batches {
                    match store.remove(bucket, keys).await {
                        Ok(()) => removed += keys.len(),
                        Err(error) => warn!(
                            submission_id = id.0,
                            ?bucket,
                            keys = ?keys,
                            error = %error,
                            "failed to remove submission assets"
                        ),
                    }
                }
                info!(submission_id = id.0, removed, "submission assets removed");
            }
        }
    }

    Ok(())
}
