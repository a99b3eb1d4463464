//! geopac: generate and maintain a geosite-based PAC file.

use clap::{Parser, Subcommand};
use geopac::geosite::{GeositeDatabase, TextParser};
use geopac::{generate_rules, Config, PacDaemon, PacEvent, SourceSynchronizer, DEFAULT_DATABASE};
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "geopac")]
#[command(version)]
#[command(about = "Generate and maintain a PAC file from geosite groups", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated rule lines for the configured groups
    Generate,

    /// Write the PAC file if its content changed
    Merge,

    /// Check the remote geosite database once and re-merge
    Update,

    /// List the groups of the geosite database
    Groups {
        /// Also print the entry count of each group
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compile a text group list into a geosite database
    Build {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        /// Output database file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Keep the PAC file up to date until interrupted
    Run,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Generate => generate(&config),
            Commands::Merge => merge(&config),
            Commands::Update => update(&config).await,
            Commands::Groups { verbose } => groups(&config, verbose),
            Commands::Build { input, output } => build(&input, &output),
            Commands::Run => run(&config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}

fn open_database(config: &Config) -> Result<Arc<GeositeDatabase>, Box<dyn std::error::Error>> {
    fs::create_dir_all(&config.working_dir)?;
    let database = GeositeDatabase::open(&config.database_path(), DEFAULT_DATABASE)?;
    Ok(Arc::new(database))
}

fn open_daemon(config: &Config) -> Result<PacDaemon, Box<dyn std::error::Error>> {
    let daemon = PacDaemon::new(&config.working_dir, open_database(config)?)
        .with_debounce(config.debounce());
    daemon.ensure_defaults()?;
    Ok(daemon)
}

fn merge_validated(daemon: &PacDaemon, config: &Config) -> geopac::Result<bool> {
    let policy = config.geosite.validated(&daemon.database().index()).policy();
    daemon.merge_and_write(&policy)
}

fn generate(config: &Config) -> CliResult {
    let database = open_database(config)?;
    let index = database.index();
    let rules = generate_rules(&index, &config.geosite.validated(&index).policy())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for rule in rules {
        writeln!(out, "{}", rule)?;
    }
    Ok(())
}

fn merge(config: &Config) -> CliResult {
    let daemon = open_daemon(config)?;
    if merge_validated(&daemon, config)? {
        println!("Wrote {:?}", daemon.paths().pac_file);
    } else {
        println!("{:?} is up to date", daemon.paths().pac_file);
    }
    Ok(())
}

async fn update(config: &Config) -> CliResult {
    let daemon = open_daemon(config)?;
    let mut events = daemon.subscribe();
    let sync = SourceSynchronizer::http(config.fetch_timeout())?;

    let changed = daemon.update_from_source(&sync, &config.geosite).await;

    while let Ok(event) = events.try_recv() {
        if let PacEvent::UpdateFailed { reason } = event {
            return Err(reason.into());
        }
    }
    println!("PAC file {}", if changed { "updated" } else { "unchanged" });
    Ok(())
}

fn groups(config: &Config, verbose: bool) -> CliResult {
    let database = open_database(config)?;
    let index = database.index();

    for name in index.group_names() {
        if verbose {
            println!("{:<32} {}", name, index.get(name)?.len());
        } else {
            println!("{}", name);
        }
    }
    println!("\n{} groups", index.len());
    Ok(())
}

fn build(input: &Path, output: &Path) -> CliResult {
    let file = fs::File::open(input)?;
    let builder = TextParser::parse(BufReader::new(file))?;
    let data = builder.encode();

    fs::write(output, &data)?;
    println!(
        "Wrote {} groups, {} entries ({} bytes) to {:?}",
        builder.group_count(),
        builder.entry_count(),
        data.len(),
        output
    );
    Ok(())
}

async fn run(config: &Config) -> CliResult {
    let daemon = open_daemon(config)?;
    let mut events = daemon.subscribe();
    let sync = SourceSynchronizer::http(config.fetch_timeout())?;

    if let Err(e) = merge_validated(&daemon, config) {
        log::error!("Failed to merge PAC file: {}", e);
    }
    let _watchers = daemon.watch()?;
    // needs_update decides; the ticker only bounds how late a retry can be
    let mut ticker = tokio::time::interval(config.check_period());

    log::info!("Serving {:?}", daemon.paths().pac_file);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if sync.needs_update(daemon.database(), config.update_interval()) {
                    daemon.update_from_source(&sync, &config.geosite).await;
                }
            }
            event = events.recv() => match event {
                Ok(PacEvent::UserRuleFileChanged) => {
                    if let Err(e) = merge_validated(&daemon, config) {
                        log::error!("Failed to merge PAC file: {}", e);
                    }
                }
                Ok(PacEvent::PacFileChanged) => log::debug!("PAC file changed on disk"),
                Ok(PacEvent::UpdateCompleted { success }) => {
                    log::info!("Geosite update completed, PAC file changed: {}", success);
                }
                Ok(PacEvent::UpdateFailed { reason }) => log::warn!("Geosite update failed: {}", reason),
                Err(RecvError::Lagged(n)) => log::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }
    Ok(())
}
