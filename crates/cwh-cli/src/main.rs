use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cwh")]
#[command(about = "Crypto warehouse ingestion CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch N days of history for the top coins, stage it, run the transformation
    Backfill {
        /// Days of history to fetch (>= 1)
        #[arg(long, allow_negative_numbers = true)]
        days: Option<i64>,

        /// Number of coins in the universe (>= 1)
        #[arg(long = "top-coins", allow_negative_numbers = true)]
        top_coins: Option<i64>,

        /// Quote currency (e.g. usd, eur)
        #[arg(long = "vs-currency")]
        vs_currency: Option<String>,

        /// Pause between coins, in seconds
        #[arg(long = "pause-seconds", allow_negative_numbers = true)]
        pause_seconds: Option<f64>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Stage the current top-N listing as one record, then transform
    IngestLive {
        #[arg(long = "top-coins", allow_negative_numbers = true)]
        top_coins: Option<i64>,

        #[arg(long = "vs-currency")]
        vs_currency: Option<String>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,

        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,
    },

    /// Pipeline run log inspection
    Run {
        #[command(subcommand)]
        cmd: RunCmd,

        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order; none means built-in defaults
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Create the staging, run-log and directory tables if missing.
    Migrate,
}

#[derive(Subcommand)]
enum RunCmd {
    /// Print one run row
    Status {
        #[arg(long)]
        run_id: i64,
    },

    /// List runs still RUNNING (interrupted or in flight)
    Open {
        /// Only runs started more than N minutes ago
        #[arg(long = "older-than-minutes")]
        older_than_minutes: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Backfill {
            days,
            top_coins,
            vs_currency,
            pause_seconds,
            config_paths,
        } => {
            commands::ingest::backfill(commands::ingest::BackfillArgs {
                days,
                top_coins,
                vs_currency,
                pause_seconds,
                config_paths,
            })
            .await?;
        }

        Commands::IngestLive {
            top_coins,
            vs_currency,
            config_paths,
        } => {
            commands::ingest::ingest_live(top_coins, vs_currency, config_paths).await?;
        }

        Commands::Db { cmd, config_paths } => {
            let loaded = commands::load_config(&config_paths)?;
            let pool = commands::connect(&loaded.config).await?;
            match cmd {
                DbCmd::Status => {
                    let s = cwh_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_staging_table={} has_run_log_table={} has_directory_table={}",
                        s.ok, s.has_staging_table, s.has_run_log_table, s.has_directory_table
                    );
                    println!("db_ready={}", s.is_ready());
                }
                DbCmd::Migrate => {
                    cwh_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Run { cmd, config_paths } => {
            let loaded = commands::load_config(&config_paths)?;
            match cmd {
                RunCmd::Status { run_id } => commands::run::status(&loaded.config, run_id).await?,
                RunCmd::Open { older_than_minutes } => {
                    commands::run::open(&loaded.config, older_than_minutes).await?
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays `key=value` only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
