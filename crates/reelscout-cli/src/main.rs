use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use reelscout_core::enrich::enrich_metadata;
use reelscout_core::reconcile::{reconcile, ReconcileEvent, ReconcileSummary};
use reelscout_core::{CaptionAnalyzer, InstagramClient, PlaceResolver};

#[derive(Parser)]
#[command(
    name = "reelscout",
    version,
    about = "Collect Instagram collections and enrich captions with place data"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with a saved session, pick a collection, download its media
    Collect {
        /// Path to the saved Instagram session file
        #[arg(long, default_value = "auth/session.json")]
        session_file: PathBuf,

        /// Base directory for collection folders
        #[arg(long, default_value = "downloads")]
        download_dir: PathBuf,

        /// Collection name; prompts interactively when omitted
        #[arg(long)]
        collection: Option<String>,

        /// Skip downloading media files, only save metadata
        #[arg(long)]
        skip_download: bool,
    },
    /// Analyze captions of a collected collection and attach place data
    Enrich {
        /// Path to a collection's metadata.json
        #[arg(long)]
        metadata_file: PathBuf,

        /// Re-analyze records that already carry an analysis
        #[arg(long)]
        force: bool,

        /// Gemini model override
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // API keys live next to the session file, auth/.env.
    let _ = dotenvy::from_path("auth/.env");
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Collect {
            session_file,
            download_dir,
            collection,
            skip_download,
        } => collect(session_file, download_dir, collection, skip_download).await,
        Command::Enrich {
            metadata_file,
            force,
            model,
        } => enrich(metadata_file, force, model).await,
    }
}

async fn collect(
    session_file: PathBuf,
    download_dir: PathBuf,
    collection: Option<String>,
    skip_download: bool,
) -> anyhow::Result<()> {
    let client = InstagramClient::from_session_file(&session_file)
        .with_context(|| format!("could not load session from {}", session_file.display()))?;
    let username = client
        .verify_session()
        .await
        .context("login failed, please refresh your session file")?;
    eprintln!("Logged in as {username}.");

    let collections = client.collections().await?;
    if collections.is_empty() {
        bail!("no saved collections found");
    }

    let selected = match collection {
        Some(name) => collections
            .iter()
            .find(|c| c.collection_name == name)
            .with_context(|| format!("no collection named '{name}'"))?,
        None => {
            let labels: Vec<String> = collections
                .iter()
                .map(|c| format!("{} ({} items)", c.collection_name, c.collection_media_count))
                .collect();
            let choice = Select::new()
                .with_prompt("Collection to download")
                .items(&labels)
                .default(0)
                .interact()?;
            &collections[choice]
        }
    };
    eprintln!("Selected collection: '{}'", selected.collection_name);

    let items = client.collection_media(&selected.collection_id).await?;
    if items.is_empty() {
        bail!("collection '{}' contains no items", selected.collection_name);
    }
    eprintln!("Found {} items.", items.len());
    if skip_download {
        eprintln!("Collecting metadata only (downloads skipped).");
    }

    let bar = ProgressBar::new(items.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let on_event = |event: &ReconcileEvent<'_>| match event {
        ReconcileEvent::ItemStarted { pk, .. } => {
            bar.set_message(format!("pk {pk}"));
            bar.inc(1);
        }
        ReconcileEvent::ItemUnsupported { .. } => bar.inc(1),
        ReconcileEvent::ItemFailed { pk, reason } => {
            bar.println(format!("  pk {pk}: {reason}"));
        }
        ReconcileEvent::ResourceFailed { album_pk, pk, reason } => {
            bar.println(format!("  album {album_pk}, resource {pk}: {reason}"));
        }
        _ => {}
    };

    let summary = reconcile(
        &client,
        &items,
        &selected.collection_name,
        &download_dir,
        skip_download,
        &on_event,
    )
    .await?;
    bar.finish_and_clear();

    print_summary(&selected.collection_name, &summary);
    eprintln!(
        "Metadata saved to {}.",
        download_dir
            .join(&selected.collection_name)
            .join(reelscout_core::METADATA_FILENAME)
            .display()
    );
    Ok(())
}

fn print_summary(collection_name: &str, summary: &ReconcileSummary) {
    eprintln!("\nCollection summary for '{collection_name}':");
    eprintln!("  Downloaded photos:        {}", summary.downloaded_photos);
    eprintln!("  Downloaded videos:        {}", summary.downloaded_videos);
    eprintln!("  Downloaded album items:   {}", summary.downloaded_resources);
    eprintln!("  Skipped (already exists): {}", summary.skipped_existing);
    eprintln!("  Skipped (metadata only):  {}", summary.metadata_only);
    eprintln!("  Skipped (unsupported):    {}", summary.skipped_unsupported);
    eprintln!("  Errors:                   {}", summary.errors);
}

async fn enrich(
    metadata_file: PathBuf,
    force: bool,
    model: Option<String>,
) -> anyhow::Result<()> {
    let mut analyzer = CaptionAnalyzer::from_env()
        .context("set GEMINI_API_KEY in the environment or auth/.env")?;
    if let Some(model) = model {
        analyzer = analyzer.with_model(model);
    }
    let resolver = PlaceResolver::from_env()
        .context("set GOOGLE_PLACES_API in the environment or auth/.env")?;

    let summary = enrich_metadata(&analyzer, &resolver, &metadata_file, force).await?;

    eprintln!("Enrichment summary for {}:", metadata_file.display());
    eprintln!("  Captions analyzed:        {}", summary.analyzed);
    eprintln!("  Skipped (already done):   {}", summary.skipped_analyzed);
    eprintln!("  Places resolved:          {}", summary.places_resolved);
    eprintln!("  Places without a match:   {}", summary.places_unresolved);
    eprintln!("  Place lookup errors:      {}", summary.place_errors);
    Ok(())
}
