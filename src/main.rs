use clap::{Args, Parser, Subcommand};
use mediaforge::admin::{self, BatchSelection};
use mediaforge::config::{self, MediaConfig};
use mediaforge::conversions::{ConversionRegistry, register_presets};
use mediaforge::format::ImageFormat;
use mediaforge::imaging::RustBackend;
use mediaforge::media::MediaId;
use mediaforge::queue::{WorkerQueue, WorkerStats};
use mediaforge::records::JsonRecordStore;
use mediaforge::responsive::ResponsiveOptions;
use mediaforge::service::{MediaService, Pipeline, UploadRequest};
use mediaforge::storage::Disks;
use mediaforge::{html, output};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Attempts per queued task before it is dropped.
const QUEUE_MAX_ATTEMPTS: u32 = 3;

#[derive(Parser)]
#[command(name = "mediaforge")]
#[command(about = "Media library with responsive image derivation")]
#[command(long_about = "\
Media library with responsive image derivation

Originals are stored on named disks under a salted per-media directory.
Responsive sets (one file per width and format) and named conversions are
derived from the original and written next to it:

  {id}-{hash}/
  ├── sunset.jpg                       # original
  ├── responsive/sunset_1920w.webp     # responsive set
  └── conversions/thumb/sunset.webp    # named conversion

Run 'mediaforge gen-config' to print a documented mediaforge.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Which media a batch command touches.
#[derive(Args, Clone)]
struct SelectionArgs {
    /// Only media in this collection
    #[arg(long)]
    collection: Option<String>,

    /// Only this media id
    #[arg(long)]
    media: Option<u64>,
}

impl SelectionArgs {
    fn selection(&self) -> BatchSelection {
        BatchSelection {
            collection: self.collection.clone(),
            media: self.media.map(MediaId),
        }
    }
}

/// Overrides for `responsive_images` defaults.
#[derive(Args, Clone)]
struct ResponsiveArgs {
    /// Encoding quality (1-100)
    #[arg(long)]
    quality: Option<u32>,

    /// Output formats, comma separated
    #[arg(long, value_delimiter = ',')]
    formats: Option<Vec<ImageFormat>>,

    /// Explicit widths, comma separated
    #[arg(long, value_delimiter = ',')]
    widths: Option<Vec<u32>>,
}

impl ResponsiveArgs {
    fn options(&self) -> ResponsiveOptions {
        let mut options = ResponsiveOptions::new();
        if let Some(quality) = self.quality {
            options = options.with_quality(quality);
        }
        if let Some(formats) = &self.formats {
            options = options.with_formats(formats.clone());
        }
        if let Some(widths) = &self.widths {
            options = options.with_widths(widths.clone());
        }
        options
    }
}

/// Run on the queue worker or inline, overriding `responsive_images.queue`.
#[derive(Args, Clone)]
struct DispatchArgs {
    /// Hand the work to the background queue
    #[arg(long, conflicts_with = "sync")]
    queue: bool,

    /// Run inline
    #[arg(long)]
    sync: bool,
}

impl DispatchArgs {
    fn queued(&self) -> Option<bool> {
        match (self.queue, self.sync) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Store a file as a new media item
    Upload {
        file: PathBuf,
        /// Display name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Target disk (defaults to `default_disk`)
        #[arg(long)]
        disk: Option<String>,
        /// Collection to attach, created if missing
        #[arg(long)]
        collection: Option<String>,
        /// Generate a responsive set right away
        #[arg(long)]
        responsive: bool,
        #[command(flatten)]
        options: ResponsiveArgs,
    },
    /// Generate responsive sets for images without one
    Generate {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Regenerate images that already have a set
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        options: ResponsiveArgs,
        #[command(flatten)]
        dispatch: DispatchArgs,
    },
    /// Delete responsive sets
    Clear {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Required when no filter narrows the selection
        #[arg(long)]
        yes: bool,
    },
    /// Responsive set coverage and effective configuration
    Stats,
    /// Run named conversions for one media item
    Convert {
        media: u64,
        #[arg(required = true)]
        conversions: Vec<String>,
        /// Overwrite existing conversion output
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        dispatch: DispatchArgs,
    },
    /// Show a media item and its responsive set
    Show { media: u64 },
    /// Delete a media item with everything derived from it
    Delete { media: u64 },
    /// Move an original to another disk
    MoveDisk { media: u64, disk: String },
    /// Rename an original on its disk
    Rename { media: u64, file_name: String },
    /// Print `<picture>` markup for a media item
    Html {
        media: u64,
        #[arg(long, default_value = "")]
        alt: String,
        #[arg(long, default_value = html::DEFAULT_SIZES)]
        sizes: String,
    },
    /// Print a stock mediaforge.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    init_thread_pool(&config.processing);
    let app = App::build(&config)?;
    let result = run(&app, cli.command);
    app.finish();
    result
}

fn run(app: &App, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let service = &app.service;
    match command {
        Command::Upload {
            file,
            name,
            disk,
            collection,
            responsive,
            options,
        } => {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut request = UploadRequest::new(file_name, std::fs::read(&file)?);
            request.name = name;
            request.disk = disk;
            request.collection = collection;
            if responsive {
                request = request.with_responsive(options.options());
            }
            let uploaded = service.upload(request)?;
            let path = uploaded.media.original_path(service.app_key());
            output::print_media(&uploaded.media, &path);
            if let Some(result) = &uploaded.responsive {
                output::print_generate(uploaded.media.id, result);
            }
        }
        Command::Generate {
            selection,
            force,
            options,
            dispatch,
        } => {
            let report = admin::batch_generate(
                service,
                &selection.selection(),
                &options.options(),
                force,
                dispatch.queued(),
            )?;
            output::print_batch_report("Generated", &report);
        }
        Command::Clear { selection, yes } => {
            if selection.collection.is_none() && selection.media.is_none() && !yes {
                return Err("refusing to clear every responsive set without --yes".into());
            }
            let report = admin::batch_clear(service, &selection.selection())?;
            output::print_batch_report("Cleared", &report);
        }
        Command::Stats => {
            output::print_stats(&admin::stats(service)?);
        }
        Command::Convert {
            media,
            conversions,
            force,
            dispatch,
        } => {
            let id = MediaId(media);
            let result = service.perform_conversions(id, conversions, !force, dispatch.queued())?;
            output::print_conversions(id, &result);
        }
        Command::Show { media } => {
            let media = service.media(MediaId(media))?;
            output::print_media(&media, &media.original_path(service.app_key()));
        }
        Command::Delete { media } => {
            service.delete(MediaId(media))?;
            println!("Deleted {}", media);
        }
        Command::MoveDisk { media, disk } => {
            let media = service.relocate_disk(MediaId(media), &disk)?;
            output::print_media(&media, &media.original_path(service.app_key()));
        }
        Command::Rename { media, file_name } => {
            let media = service.rename_file(MediaId(media), &file_name)?;
            output::print_media(&media, &media.original_path(service.app_key()));
        }
        Command::Html { media, alt, sizes } => {
            let media = service.media(MediaId(media))?;
            let original_url = service.original_url(&media)?;
            println!("{}", html::picture(&media, &original_url, &alt, &sizes).into_string());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }
    Ok(())
}

/// The service plus the worker that drains its queue.
struct App {
    service: MediaService,
    worker: Arc<WorkerQueue>,
}

impl App {
    fn build(config: &MediaConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let disks = Disks::from_config(&config.disks);
        let records = Arc::new(JsonRecordStore::open(&config.records)?);
        let mut registry = ConversionRegistry::new();
        register_presets(&mut registry, &config.conversions);

        let pipeline = Arc::new(Pipeline::new(
            config,
            Arc::new(RustBackend::new()),
            disks,
            records,
            registry,
        ));
        let worker = Arc::new(WorkerQueue::start(pipeline.clone(), QUEUE_MAX_ATTEMPTS));
        let service = MediaService::new(config, pipeline).with_queue(worker.clone());
        Ok(Self { service, worker })
    }

    /// Drain the queue so queued work finishes before the process exits.
    fn finish(&self) {
        let stats = self.worker.shutdown();
        if stats != WorkerStats::default() {
            println!("Queue: {}", stats);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
