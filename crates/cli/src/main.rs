use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use shelf_app::modules::auth::repo;
use shelf_db::Database;
use shelf_kernel::settings::Settings;

/// Operator commands for a Shelf deployment
#[derive(Debug, Parser)]
#[command(name = "shelf-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Create a user and print their API token
    CreateUser {
        username: String,
        /// Grant the admin role (may create, edit and delete books)
        #[arg(long)]
        admin: bool,
    },
    /// Print the API token of an existing user, creating one if needed
    IssueToken { username: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load Shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    let db = Database::connect(&settings.database.url, settings.database.max_connections).await?;
    let registry = shelf_app::registry();
    let applied = db.apply_migrations(&registry.collect_migrations()).await?;
    tracing::info!(applied, "database schema up to date");

    let result = run(cli.command, &db).await;
    db.close().await;
    result
}

async fn run(command: Command, db: &Database) -> anyhow::Result<()> {
    match command {
        Command::Migrate => Ok(()),
        Command::CreateUser { username, admin } => {
            let username = username.trim();
            if username.is_empty() {
                bail!("username must not be blank");
            }

            let mut tx = db.pool().begin().await?;
            let user = repo::create_user(&mut *tx, username, admin)
                .await
                .map_err(|err| {
                    if shelf_db::is_unique_violation(&err) {
                        anyhow::anyhow!("user '{username}' already exists")
                    } else {
                        anyhow::Error::new(err).context("failed to create user")
                    }
                })?;
            let token = repo::issue_token(&mut *tx, user.id).await?;
            tx.commit().await?;

            tracing::info!(user_id = user.id, admin, "user created");
            println!("{token}");
            Ok(())
        }
        Command::IssueToken { username } => {
            let user = repo::find_user_by_username(db.pool(), &username)
                .await?
                .with_context(|| format!("no user named '{username}'"))?;
            let token = repo::issue_token(db.pool(), user.id).await?;
            println!("{token}");
            Ok(())
        }
    }
}
