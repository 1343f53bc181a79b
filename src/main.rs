use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canvas_palette::{ColorSet, Palette};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tileward::models::{EngineConfig, Placement, Template, TemplateCollection, TemplateSet};
use tileward::rendering::RgbaImage;
use tileward::services::{
    reconcile, schedule, AccountSnapshot, AtomicFlag, AutoPainter, DirTileSource,
    EnginePaintSession, ExitOnRestart, HttpTileSource, HttpWriteChannel, LogStatus, RunOutcome,
    SharedFlag, StaticAccount, TileAnalyzer, TileSource, WritePlan, WriteQueue,
};

/// Exit code asking the process supervisor for a restart (EX_TEMPFAIL).
const RESTART_EXIT_CODE: i32 = 75;

const DEFAULT_TEMPLATES_FILE: &str = "templates.json";

#[derive(Parser)]
#[command(name = "tileward")]
#[command(about = "Keep pixel-art templates painted on a tiled canvas")]
struct Cli {
    /// Config file (YAML); defaults to $TILEWARD_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an image to the template set
    Create {
        /// Template image (PNG)
        #[arg(short, long)]
        image: PathBuf,

        /// Placement of the top-left pixel: "tileX, tileY, pixelX, pixelY"
        #[arg(short = 'p', long)]
        coords: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Author id
        #[arg(short, long, default_value = "0")]
        author: String,
    },
    /// Reconcile the templates once and print the writes that would be made
    Plan {
        /// Read tiles from `{dir}/{x}/{y}.png` instead of the backend
        #[arg(long)]
        tiles_dir: Option<PathBuf>,

        /// Charges available
        #[arg(long, default_value_t = 20)]
        charges: u32,

        /// Premium colour unlock bitmap (bit i unlocks id 32 + i)
        #[arg(long, default_value_t = 0)]
        unlocked: u32,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the painter until stopped (Ctrl-C)
    Run {
        /// Charges available per cycle
        #[arg(long, default_value_t = 20)]
        charges: u32,

        /// Premium colour unlock bitmap (bit i unlocks id 32 + i)
        #[arg(long, default_value_t = 0)]
        unlocked: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var("TILEWARD_CONFIG").ok().map(PathBuf::from));

    match cli.command {
        Some(Commands::Create {
            image,
            coords,
            name,
            author,
        }) => {
            init_tracing("tileward=warn");
            let config = EngineConfig::load(config_path.as_deref());
            run_create_command(&config, &image, &coords, &name, &author).await
        }
        Some(Commands::Plan {
            tiles_dir,
            charges,
            unlocked,
            json,
        }) => {
            init_tracing("tileward=warn");
            let config = EngineConfig::load(config_path.as_deref());
            run_plan_command(&config, tiles_dir, charges, unlocked, json).await
        }
        Some(Commands::Run { charges, unlocked }) => {
            init_tracing("tileward=info");
            let config = EngineConfig::load(config_path.as_deref());
            run_painter(config, charges, unlocked).await
        }
        None => {
            run_status_command(config_path.as_deref()).await;
            Ok(())
        }
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn templates_path(config: &EngineConfig) -> PathBuf {
    config
        .templates_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_FILE))
}

async fn load_templates(config: &EngineConfig) -> anyhow::Result<TemplateCollection> {
    let path = templates_path(config);
    let set = TemplateSet::load(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", path.display()))?;
    Ok(TemplateCollection::from_set(&set, config.draw_multiplier)?)
}

fn account(charges: u32, unlocked: u32) -> AccountSnapshot {
    AccountSnapshot {
        charges,
        available: ColorSet::with_unlocks(Palette::canvas().free_colors(), unlocked),
        token: std::env::var("TILEWARD_TOKEN").unwrap_or_default(),
    }
}

/// Slice an image into a new template and add it to the template set
async fn run_create_command(
    config: &EngineConfig,
    image: &Path,
    coords: &str,
    name: &str,
    author: &str,
) -> anyhow::Result<()> {
    let placement: Placement = coords.parse()?;
    let bytes = tokio::fs::read(image).await?;
    let image = RgbaImage::decode_png(&bytes)?;

    let path = templates_path(config);
    let mut templates = if tokio::fs::try_exists(&path).await? {
        load_templates(config).await?
    } else {
        TemplateCollection::new()
    };

    let template = Template::from_image(
        name,
        author,
        templates.next_sort_id(),
        placement,
        &image,
        config.tile_size,
        config.draw_multiplier,
    )?;
    println!(
        "Created \"{}\" at {} ({} pixels on {} tiles)",
        template.name,
        template.placement,
        template.pixel_count(),
        template.tiles().len()
    );
    for (id, count) in template.color_usage() {
        if let Some(entry) = Palette::canvas().entry(*id) {
            let premium = if entry.premium { " (premium)" } else { "" };
            println!("  {:>6} x {}{premium}", count, entry.name);
        }
    }

    templates.insert(template);
    templates.to_set()?.save(&path).await?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Reconcile once and print the scheduled writes
async fn run_plan_command(
    config: &EngineConfig,
    tiles_dir: Option<PathBuf>,
    charges: u32,
    unlocked: u32,
    json: bool,
) -> anyhow::Result<()> {
    let templates = load_templates(config).await?;
    let source: Box<dyn TileSource> = match tiles_dir {
        Some(dir) => Box::new(DirTileSource::new(dir)),
        None => Box::new(HttpTileSource::new(
            config.endpoints.tile_base_url.clone(),
            config.endpoints.request_timeout(),
        )?),
    };

    let analyzer = TileAnalyzer::new(
        Palette::canvas(),
        config.draw_multiplier,
        config.analyze_transparent_pixels,
    );
    let summary = reconcile(source.as_ref(), &templates, &analyzer).await;
    for (tile, reason) in &summary.failed {
        eprintln!("Tile {tile} skipped: {reason}");
    }

    let mut queue = WriteQueue::new();
    queue.replace(summary.candidates.clone());
    queue.dedup_by_pixel();

    let account = account(charges, unlocked);
    let plan = schedule(
        queue.entries(),
        &account.available,
        account.budget(config.reserved_charges),
        &mut StdRng::from_entropy(),
    );

    let progress = summary.progress();
    if json {
        let batches = match &plan {
            WritePlan::Exhausted => Vec::new(),
            WritePlan::Batches(batches) => batches.clone(),
        };
        let out = serde_json::json!({
            "progress": progress,
            "queued": queue.len(),
            "batches": batches,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} of {} pixels correct, {} missing, {} wrong, {} griefed",
        progress.correct,
        progress.template_pixels(),
        progress.missing,
        progress.wrong,
        progress.griefed
    );
    println!("{} writes queued", queue.len());
    match plan {
        WritePlan::Exhausted => println!("Nothing to paint with the current budget"),
        WritePlan::Batches(batches) => {
            for batch in batches {
                println!("Tile {}: {} pixels", batch.tile, batch.len());
            }
        }
    }
    Ok(())
}

/// Run the painter against the configured backend
async fn run_painter(config: EngineConfig, charges: u32, unlocked: u32) -> anyhow::Result<()> {
    let templates = load_templates(&config).await?;
    if templates.is_empty() {
        anyhow::bail!("No templates to paint; add one with 'tileward create'");
    }

    let timeout = config.endpoints.request_timeout();
    let tiles = Arc::new(HttpTileSource::new(
        config.endpoints.tile_base_url.clone(),
        timeout,
    )?);
    let writer = Arc::new(HttpWriteChannel::new(
        config.endpoints.write_base_url.clone(),
        timeout,
    )?);
    let account = account(charges, unlocked);
    if account.token.is_empty() {
        tracing::warn!("TILEWARD_TOKEN is not set, writes will be rejected");
    }

    let session = EnginePaintSession::new(
        config.clone(),
        templates,
        tiles,
        writer,
        Arc::new(StaticAccount(account)),
    );
    if let Some(path) = &config.queue_file {
        session.restore_queue(WriteQueue::load_or_default(path).await?).await;
    }

    let running: Arc<dyn SharedFlag> = Arc::new(AtomicFlag::default());
    let reset = Arc::new(ExitOnRestart::new(running.clone()));
    let painter = Arc::new(AutoPainter::new(
        Arc::new(session),
        running,
        Arc::new(AtomicFlag::default()),
        Arc::new(LogStatus),
        reset,
        config.painter.clone(),
    ));

    let stopper = painter.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    painter.start();
    match painter.run().await {
        RunOutcome::Stopped => Ok(()),
        RunOutcome::Restarted => std::process::exit(RESTART_EXIT_CODE),
        RunOutcome::Aborted => anyhow::bail!("Painter stopped on an unrecoverable error"),
        RunOutcome::AlreadyRunning => anyhow::bail!("Painter loop is already running"),
    }
}

/// Display configuration, templates and queue
async fn run_status_command(config_path: Option<&Path>) {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    println!("Tileward v{VERSION}");
    println!("Keeps pixel-art templates painted on a tiled canvas\n");

    println!("Environment Variables:");
    println!(
        "  TILEWARD_CONFIG = {}",
        config_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!(
        "  TILEWARD_TOKEN  = {}",
        if std::env::var("TILEWARD_TOKEN").is_ok() {
            "(set)"
        } else {
            "(not set)"
        }
    );

    let config = match config_path {
        Some(path) => match EngineConfig::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                println!("\nConfig error: {e} (using defaults)");
                EngineConfig::default()
            }
        },
        None => EngineConfig::default(),
    };

    println!("\nEngine:");
    println!("  Tile size:       {}", config.tile_size);
    println!("  Draw multiplier: {}", config.draw_multiplier);
    println!("  Grief clean:     {}", config.analyze_transparent_pixels);
    println!("  Tiles from:      {}", config.endpoints.tile_base_url);
    println!("  Writes to:       {}", config.endpoints.write_base_url);

    let path = templates_path(&config);
    println!("\nTemplates ({}):", path.display());
    match load_templates(&config).await {
        Ok(templates) if templates.is_empty() => println!("  (none)"),
        Ok(templates) => {
            for t in templates.iter() {
                let state = if t.enabled { "" } else { " [disabled]" };
                println!(
                    "  {:>3} {} by {} at {}: {} pixels{state}",
                    t.sort_id,
                    t.name,
                    t.author,
                    t.placement,
                    t.pixel_count()
                );
            }
        }
        Err(e) => println!("  {e}"),
    }

    if let Some(queue_path) = &config.queue_file {
        match WriteQueue::load_or_default(queue_path).await {
            Ok(queue) => println!("\nQueue: {} writes pending", queue.len()),
            Err(e) => println!("\nQueue: {e}"),
        }
    }

    println!("\nCommands:");
    println!("  tileward create   Add an image as a template");
    println!("  tileward plan     Show the next writes without painting");
    println!("  tileward run      Paint until stopped");
    println!("\nRun 'tileward --help' for more details.");
}
