#![cfg(not(tarpaulin_include))]

use clap::Parser;
use env_logger::Env;
use plotter::app;
use plotter::config::Config;

/// Main entry point for the web application
///
/// Reads the configuration from the command line and `PLOTTER_*` environment
/// variables, initializes logging and runs the web server until it is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log.as_str())).init();

    log::info!(
        "Starting plotter with data directory {}",
        config.data_dir.display()
    );
    app::run(config).await
}
