//! Command-line interface implementation

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, merge_cli_overrides, read_api_key, resolve_year, CliOverrides, ConfigError};
use crate::fetch::{FetchError, FrcApiClient};
use crate::pipeline::{PipelineError, RunSummary, SheetPipeline};

/// Exit codes
const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// Generates a sprite sheet of FRC team avatars for the firstmap client
#[derive(Parser, Debug)]
#[command(name = "avatar-sheet")]
#[command(about = "Generates a spritesheet from team avatars that are all the same size and are square")]
#[command(version)]
pub struct Cli {
    /// firstmap data directory holding teams.json and the previous avatars.json/avatars.png
    pub data_dir: PathBuf,

    /// Config file (default: avatars.toml found from the working directory up)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Season year to fetch avatars for (default: YEAR file, then the current year)
    #[arg(long)]
    pub year: Option<i32>,

    /// File holding the raw events API key
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// File holding the season year
    #[arg(long)]
    pub year_file: Option<PathBuf>,

    /// Events API root URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Directory to write avatars.json and avatars.png to
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Log every placed avatar
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            year: self.year,
            key_file: self.key_file.clone(),
            year_file: self.year_file.clone(),
            api_url: self.api_url.clone(),
            out_dir: self.out_dir.clone(),
        }
    }
}

/// Error that stops the CLI, with the exit code it maps to.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("data directory {} does not exist!", .0.display())]
    MissingDataDir(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] FetchError),
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Run(#[from] PipelineError),
}

impl CliError {
    /// Configuration problems are reported before any network activity.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::MissingDataDir(_) | CliError::Config(_) | CliError::Client(_) => EXIT_INVALID_ARGS,
            CliError::Runtime(_) | CliError::Run(_) => EXIT_ERROR,
        }
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(summary) => {
            info!(
                downloaded = summary.downloaded,
                reused = summary.reused,
                missing = summary.missing,
                sheet_size = summary.sheet_size,
                "Done in {:?}",
                summary.duration
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Run one avatar sheet build with already-parsed arguments.
pub fn execute(cli: &Cli) -> Result<RunSummary, CliError> {
    if !cli.data_dir.is_dir() {
        return Err(CliError::MissingDataDir(cli.data_dir.clone()));
    }

    let (client, pipeline) = prepare(cli)?;
    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(CliError::Runtime)?;

    Ok(runtime.block_on(pipeline.run(&client))?)
}

/// Resolve configuration, credentials and year into a ready pipeline.
fn prepare(cli: &Cli) -> Result<(FrcApiClient, SheetPipeline), CliError> {
    let mut config = load_config(cli.config.as_deref())?;
    merge_cli_overrides(&mut config, &cli.overrides())?;

    let year = resolve_year(&config)?;
    let api_key = read_api_key(&config)?;
    let client = FrcApiClient::new(config.api.base_url.clone(), &api_key)?;

    let pipeline = SheetPipeline::new(year, config.input_paths(&cli.data_dir), config.output_paths());
    info!("Downloading {} avatars from the FRC API ({})", pipeline.year(), client.base_url());
    Ok((client, pipeline))
}

fn init_logging(verbose: bool) {
    let directive = if verbose { "avatar_sheet=debug" } else { "avatar_sheet=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
