use clap::Parser;
use std::path::PathBuf;

/// Command-line and environment configuration for the web server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "CSV editing and charting web application", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PLOTTER_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Directory holding the SQLite database, uploads and session snapshots
    #[arg(long, env = "PLOTTER_DATA_DIR", default_value = "database")]
    pub data_dir: PathBuf,

    /// Table rows per page on the data view
    #[arg(long, env = "PLOTTER_PAGE_SIZE", default_value_t = 10)]
    pub page_size: usize,

    /// Most frequent values listed per low-cardinality column
    #[arg(long, env = "PLOTTER_TOP_VALUES", default_value_t = 5)]
    pub top_values: usize,

    /// Default log filter
    #[arg(long, env = "PLOTTER_LOG", default_value = "info")]
    pub log: String,
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("plotter.sqlite3")
    }

    /// Defaults rooted at `data_dir`, for embedding the app without a command
    /// line.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            bind: "127.0.0.1:3000".to_string(),
            data_dir: data_dir.into(),
            page_size: crate::view::PAGE_SIZE,
            top_values: 5,
            log: "info".to_string(),
        }
    }
}
