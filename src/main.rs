use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use zoom_tiles::batch::{self, BatchOptions, BatchReport};
use zoom_tiles::catalog::JsonCatalog;
use zoom_tiles::config::{self, Settings};
use zoom_tiles::select::SelectionCriteria;
use zoom_tiles::{output, relocate, tiling};

/// Which catalog files a batch covers.
#[derive(clap::Args, Clone)]
struct SelectionArgs {
    /// JSON catalog export ({"records": [{file_id, item_id, collection_id, filename}]})
    #[arg(long, value_name = "FILE")]
    catalog: PathBuf,

    /// Tile every file in these collections
    #[arg(long = "collection", value_name = "ID")]
    collections: Vec<u64>,

    /// Tile every file of these items (ignored when --collection is given)
    #[arg(long = "item", value_name = "ID")]
    items: Vec<u64>,

    /// Tile every file in the catalog (used when no --collection or --item is given)
    #[arg(long)]
    all: bool,

    /// Leave out files in these collections
    #[arg(long = "exclude-collection", value_name = "ID")]
    exclude_collections: Vec<u64>,

    /// Leave out files of these items
    #[arg(long = "exclude-item", value_name = "ID")]
    exclude_items: Vec<u64>,

    /// Leave out these files
    #[arg(long = "exclude-file", value_name = "ID")]
    exclude_files: Vec<u64>,
}

impl SelectionArgs {
    fn criteria(&self) -> SelectionCriteria {
        SelectionCriteria {
            include_group_ids: self.collections.iter().copied().collect(),
            include_record_ids: self.items.iter().copied().collect(),
            include_all: self.all,
            exclude_group_ids: self.exclude_collections.iter().copied().collect(),
            exclude_record_ids: self.exclude_items.iter().copied().collect(),
            exclude_candidate_ids: self.exclude_files.iter().copied().collect(),
        }
    }
}

#[derive(Parser)]
#[command(name = "zoom-tiles")]
#[command(version)]
#[command(about = "Batch builder for deep-zoom tile pyramids")]
#[command(long_about = "\
Batch builder for deep-zoom tile pyramids

Selects images from a catalog export, cuts each into a Zoomify tile pyramid
next to its source, and moves the pyramid into the storage root. Images whose
pyramid already exists are skipped, so re-running a selection is safe.

Layout:

  files/original/2019/plate-04.tif         source image
  files/original/2019/plate-04_zdata/      staging (generator output)
  files/zoom_tiles/2019/plate-04_zdata/    storage (published)
  /files/zoom_tiles/2019/plate-04_zdata    publish URL

Selection precedence: --collection, then --item, then --all. Exclusions apply
to whichever base was used.

Diagnostics go to stderr; set RUST_LOG or pass -v / -vv.

Run 'zoom-tiles gen-config' to generate a documented zoom-tiles.toml.")]
struct Cli {
    /// Config file [default: zoom-tiles.toml, if present]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tile the selected images and move the pyramids into storage
    Build {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print the batch report as JSON instead of progress lines
        #[arg(long)]
        json: bool,
    },
    /// Report what a build would do without generating anything
    Check(SelectionArgs),
    /// Remove the pyramids of these source images (relative paths)
    Remove {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
    },
    /// Print the staging, storage and URL derived from a relative path
    Paths {
        #[arg(value_name = "PATH")]
        path: String,

        /// Force an absolute URL
        #[arg(long, conflicts_with = "relative")]
        absolute: bool,

        /// Force a site-relative URL
        #[arg(long)]
        relative: bool,
    },
    /// Print a stock zoom-tiles.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Build { selection, json } => {
            let settings = load_settings(cli.config.as_ref())?;
            let report = run_batch(&settings, selection, BatchOptions::default(), !json)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_summary(&report);
            }
            Ok(exit_code(&report))
        }
        Command::Check(selection) => {
            let settings = load_settings(cli.config.as_ref())?;
            let report = run_batch(&settings, selection, BatchOptions { dry_run: true }, true)?;
            output::print_summary(&report);
            Ok(exit_code(&report))
        }
        Command::Remove { paths } => {
            let settings = load_settings(cli.config.as_ref())?;
            let mut code = ExitCode::SUCCESS;
            for path in paths {
                match relocate::remove_tiles(path, &settings) {
                    Ok(outcome) => output::print_remove_outcome(path, &outcome),
                    Err(e) => {
                        eprintln!("{}: {}", path, e);
                        code = ExitCode::FAILURE;
                    }
                }
            }
            Ok(code)
        }
        Command::Paths {
            path,
            absolute,
            relative,
        } => {
            let settings = load_settings(cli.config.as_ref())?;
            let mode = match (*absolute, *relative) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            output::print_paths(path, &settings, mode);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize the stderr logger. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

/// Load and resolve the config. An explicit `--config` must exist; the
/// default file is optional.
fn load_settings(path: Option<&PathBuf>) -> Result<Settings, Box<dyn Error>> {
    let path = match path {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path.clone(),
        None => PathBuf::from(config::DEFAULT_CONFIG_FILE),
    };
    let config = config::load_config(&path)?;
    Ok(Settings::from_config(&config))
}

/// Select and run a batch, streaming progress lines to stdout when `stream`.
fn run_batch(
    settings: &Settings,
    selection: &SelectionArgs,
    options: BatchOptions,
    stream: bool,
) -> Result<BatchReport, Box<dyn Error>> {
    let catalog = JsonCatalog::load(&selection.catalog)?;
    let criteria = selection.criteria();
    let generator = tiling::generator_for(&settings.tiles);

    if !stream {
        let report = batch::run_selection(&criteria, &catalog, settings, &*generator, &options, None)?;
        return Ok(report);
    }

    let all_messages = settings.all_messages;
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event, all_messages);
        }
    });
    let result = batch::run_selection(&criteria, &catalog, settings, &*generator, &options, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    Ok(result?)
}

fn exit_code(report: &BatchReport) -> ExitCode {
    if report.is_aborted() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
