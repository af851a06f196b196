use clap::{Parser, Subcommand};
use presence_core::export::export_csv;
use presence_core::*;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "presence-kiosk")]
#[command(about = "Attendance kiosk token check-in/check-out engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override record store path
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve scans until interrupted (default)
    Run {
        /// Read scans from this file or FIFO instead of stdin; the kiosk
        /// stops once the input is closed and drained
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show tokens currently checked in, rebuilt from the record store
    Status,

    /// Export the record store to CSV
    Export {
        /// Destination CSV file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Validate the config file and report suspicious settings
    CheckConfig,
}

fn main() -> Result<()> {
    // Initialize logging
    presence_core::logging::init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::load_from(&config_path)?;
    let store_path = cli.store.unwrap_or_else(|| config.store.path.clone());

    match cli.command {
        Some(Commands::Run { input }) => cmd_run(&config, &store_path, input),
        Some(Commands::Status) => cmd_status(&config, &store_path),
        Some(Commands::Export { output }) => cmd_export(&config, &store_path, &output),
        Some(Commands::CheckConfig) => cmd_check_config(&config, &config_path, &store_path),
        None => cmd_run(&config, &store_path, None),
    }
}

fn cmd_run(config: &Config, store_path: &Path, input: Option<PathBuf>) -> Result<()> {
    let ledger = reconstruct(store_path, config.store.replay_window);
    let connector = SerialConnector::new(config.serial.baud_rate, config.serial.timeout());
    let store = JsonLogStore::new(store_path);

    let mut source = match input {
        Some(path) => {
            let file = File::open(&path)?;
            spawn_line_listener(BufReader::new(file), config.source.queue_capacity)
        }
        None => spawn_line_listener(BufReader::new(io::stdin()), config.source.queue_capacity),
    };

    tracing::info!(
        "Kiosk at {} (cooldown {}s, stay {}s), store {:?}",
        config.device.location,
        config.device.scan_cooldown,
        config.device.stay_duration,
        store_path
    );

    let mut kiosk = Kiosk::new(config, ledger, connector, store, SystemClock);
    kiosk.run(&mut source)
}

fn cmd_status(config: &Config, store_path: &Path) -> Result<()> {
    let ledger = reconstruct(store_path, config.store.replay_window);
    let zone = LocalZone::from_offset_minutes(config.device.utc_offset_minutes);
    let duration = i64::try_from(config.device.stay_duration).unwrap_or(i64::MAX);

    if ledger.is_empty() {
        println!("No tokens checked in at {}.", config.device.location);
        return Ok(());
    }

    println!("{} token(s) checked in at {}:", ledger.len(), config.device.location);
    for (token, since) in ledger.sorted_entries() {
        println!(
            "  {}  since {}  checkout from {}",
            token,
            zone.line_time(since),
            zone.checkout_time(since.saturating_add(duration))
        );
    }
    Ok(())
}

fn cmd_export(config: &Config, store_path: &Path, output: &Path) -> Result<()> {
    let zone = LocalZone::from_offset_minutes(config.device.utc_offset_minutes);
    let count = export_csv(store_path, output, &zone)?;
    println!("✓ Exported {} records to {}", count, output.display());
    Ok(())
}

fn cmd_check_config(config: &Config, config_path: &Path, store_path: &Path) -> Result<()> {
    println!("✓ Config OK: {}", config_path.display());
    println!("  Location:       {}", config.device.location);
    println!("  Scan cooldown:  {}s", config.device.scan_cooldown);
    println!("  Stay duration:  {}s", config.device.stay_duration);
    println!("  Record store:   {}", store_path.display());
    for warning in config.warnings() {
        println!("  ⚠ {}", warning);
    }
    Ok(())
}
