use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courseforge::import::{import_as_new_course, import_into_existing_module, preview_playlist};
use courseforge::store::db::{Db, PgStore};
use courseforge::trace::init_tracing;
use courseforge::util::env;
use courseforge::youtube::client::YouTubeClient;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "cf", version, about = "CourseForge admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Import a YouTube playlist into an existing module
    ImportPlaylist {
        /// Target module id
        #[arg(long)]
        module: Uuid,
        /// Playlist URL or bare playlist id
        playlist: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Import a YouTube playlist as a brand-new course
    ImportCourse {
        /// Owning user id
        #[arg(long)]
        owner: Uuid,
        /// Playlist URL or bare playlist id
        playlist: String,
        /// Course title (slug is derived from it)
        #[arg(long, default_value = "Imported YouTube course")]
        title: String,
        /// Course description
        #[arg(long, default_value = "")]
        description: String,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Fetch and resolve a playlist without writing anything
    Preview {
        /// Playlist URL or bare playlist id
        playlist: String,
        /// Emit the rows as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print row counts for the core content tables
    DbCounts {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

async fn connect(db_url: Option<String>) -> Result<Db> {
    let url = match db_url {
        Some(u) => u,
        None => env::db_url()?,
    };
    let max_connections = env::env_parse("DB_MAX_CONNECTIONS", 5u32);
    Db::connect(&url, max_connections).await
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    init_tracing("info")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::ImportPlaylist {
            module,
            playlist,
            db_url,
        } => {
            let api = YouTubeClient::from_env()?;
            let store = PgStore::new(connect(db_url).await?);
            let counts = import_into_existing_module(&api, &store, module, &playlist)
                .await
                .context("playlist import failed")?;
            info!(
                videos_created = counts.videos_created,
                lessons_created = counts.lessons_created,
                "import finished"
            );
            println!(
                "videos created: {}, lessons created: {}",
                counts.videos_created, counts.lessons_created
            );
        }
        Commands::ImportCourse {
            owner,
            playlist,
            title,
            description,
            db_url,
        } => {
            let api = YouTubeClient::from_env()?;
            let store = PgStore::new(connect(db_url).await?);
            let result =
                import_as_new_course(&api, &store, owner, &playlist, &title, &description)
                    .await
                    .context("course import failed")?;
            println!(
                "course {} ({}), module {}, videos created: {}, lessons created: {}",
                result.course.id,
                result.course.slug,
                result.module.id,
                result.counts.videos_created,
                result.counts.lessons_created
            );
        }
        Commands::Preview { playlist, json } => {
            let api = YouTubeClient::from_env()?;
            let rows = preview_playlist(&api, &playlist)
                .await
                .context("playlist preview failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    println!(
                        "{:>5}s  {}  {}",
                        row.duration_seconds, row.video_id, row.title
                    );
                }
                println!("{} items", rows.len());
            }
        }
        Commands::DbCounts { db_url } => {
            let db = connect(db_url).await?;
            for table in ["courses", "modules", "lessons", "videos"] {
                let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
                    .persistent(false)
                    .fetch_one(&db.pool)
                    .await?;
                println!("{table}: {}", row.get::<i64, _>("n"));
            }
        }
    }
    Ok(())
}
