use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod app;
mod auth;
mod catalog;
mod config;
mod error;
mod extract;
mod images;
mod pagination;
mod recipes;
mod relations;
mod state;
mod storage;
mod users;

use crate::catalog::dto::NewTag;

#[derive(Parser)]
#[command(name = "foodgram", about = "Recipe sharing backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Load ingredients from a `name,measurement_unit` CSV file
    LoadIngredients {
        path: PathBuf,
    },
    /// Create a tag
    AddTag {
        #[arg(long)]
        name: String,
        /// Hex color such as #E26C2D
        #[arg(long)]
        color: String,
        #[arg(long)]
        slug: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "foodgram=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::LoadIngredients { path } => {
            let db = connect().await?;
            let report = catalog::import::load_ingredients_from_path(&db, &path).await?;
            println!(
                "imported {} ingredients, skipped {}",
                report.imported, report.skipped
            );
            Ok(())
        }
        Command::AddTag { name, color, slug } => {
            let db = connect().await?;
            let tag = NewTag { name, color, slug };
            catalog::services::validate_new_tag(&tag)?;
            let tag = catalog::repo::insert_tag(&db, &tag)
                .await
                .map_err(error::AppError::from)?;
            println!("created tag {} ({})", tag.slug, tag.id);
            Ok(())
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env()?;
    let app_state = state::AppState::init(config).await?;

    migrate(&app_state.db).await?;

    let config = app_state.config.clone();
    let app = app::build_app(app_state);
    app::serve(app, &config).await
}

/// Management commands only need the database, not the full server config.
async fn connect() -> anyhow::Result<PgPool> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .context("connect to database")?;
    migrate(&db).await?;
    Ok(db)
}

async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}
