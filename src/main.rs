use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use fxledger::config::AppConfig;
use fxledger::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, alias = "debug")]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Overrides {
    /// Rate refresh period in minutes
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    period: Option<u64>,

    /// Starting balance of USD
    #[arg(long, value_name = "X")]
    usd: Option<f64>,

    /// Starting balance of EUR
    #[arg(long, value_name = "X")]
    eur: Option<f64>,

    /// Starting balance of RUB
    #[arg(long, value_name = "X")]
    rub: Option<f64>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
}

impl Overrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(period) = self.period {
            config.refresh.period_minutes = period;
        }
        for (code, amount) in [("USD", self.usd), ("EUR", self.eur), ("RUB", self.rub)] {
            if let Some(amount) = amount {
                config.set_initial_balance(code, amount);
            }
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP service (default)
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(Commands::Serve) | None => serve(cli.config_path.as_deref(), cli.overrides).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

async fn serve(config_path: Option<&str>, overrides: Overrides) -> Result<()> {
    let mut config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    overrides.apply(&mut config);
    tracing::info!(
        period_minutes = config.refresh.period_minutes,
        balances = ?config.balances,
        "Parameters"
    );
    fxledger::run(config).await
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(&path, fxledger::config::DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
