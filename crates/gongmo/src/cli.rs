use clap::{Parser, ValueEnum};

/// Keep a Google Sheet of Korean IPO listings in step with Naver
/// finance.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Discard the sheet and rebuild it from a fresh scrape of both
    /// listing views; without this flag the sheet is updated in place.
    #[arg(long)]
    pub full_refresh: bool,

    /// Sets the level of tracing
    #[arg(long, default_value = "info")]
    pub trace: TraceLevel,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    DEBUG,
    INFO,
    WARN,
    ERROR,
}
