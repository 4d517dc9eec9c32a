use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use live_monitor::config::{AppConfig, DEFAULT_CONFIG_FILE};
use live_monitor::inspector::HttpPageInspector;
use live_monitor::logging;
use live_monitor::manager::MonitorManager;
use live_monitor::transport::HttpTransport;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch live pages and record their streams", long_about = None)]
struct Args {
    /// Path of the JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Directory for log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// Log filter directive, e.g. `live_monitor=debug` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor every source in the source list (default)
    Run,
    /// Show the configuration or change the download directory
    Config {
        /// New download directory, created if missing
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let result = match args.command {
        Some(Command::Config { download_dir }) => configure(&args.config, download_dir.as_deref()),
        Some(Command::Run) | None => {
            run(&args.config, &args.log_dir, args.log_filter.as_deref()).await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn configure(config_path: &Path, download_dir: Option<&Path>) -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_create(config_path)?;

    if let Some(dir) = download_dir {
        let resolved = config.set_download_dir(dir)?;
        config.save(config_path)?;
        println!("Download directory set to {}", resolved.display());
    }

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn run(config_path: &Path, log_dir: &Path, log_filter: Option<&str>) -> anyhow::Result<()> {
    let guard = logging::init_logging(log_dir, log_filter)?;
    let log_cleanup_token = CancellationToken::new();
    logging::start_retention_cleanup(log_dir.to_path_buf(), log_cleanup_token.clone());

    let mut config = AppConfig::load_or_create(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.apply_env_overrides();
    config.validate()?;

    let client_options = config.client_options();
    let inspector = Arc::new(HttpPageInspector::new(&client_options)?);
    let transport = Arc::new(HttpTransport::new(&client_options)?);

    let manager = MonitorManager::new(config.settings(), inspector, transport);
    manager
        .start()
        .await
        .context("starting the monitor manager")?;

    info!(
        sources_file = %config.sources_file.display(),
        "Monitoring, press Ctrl-C to exit"
    );

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;

    // In-flight downloads are not awaited; partial files stay on disk.
    info!("Ctrl-C received, exiting");
    log_cleanup_token.cancel();
    drop(guard);
    std::process::exit(0);
}
