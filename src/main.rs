//! Roku telnet debugger CLI
//!
//! Interactive client for the BrightScript debug console a Roku device
//! exposes on TCP port 8085.

use clap::Parser;
use roku_debugger::cli;
use roku_debugger::common::{logging, Config};

#[derive(Parser)]
#[command(name = "roku-debugger", about = "Client for the Roku BrightScript debug console")]
#[command(version, long_about = None)]
struct Cli {
    /// Device hostname or IP; falls back to the configured default
    host: Option<String>,

    /// Emit query results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init(config.logging.filter.as_deref());

    if let Err(e) = cli::run(cli.host, &config, cli.json).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
