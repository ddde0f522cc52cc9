use crate::schema::Header;
use anyhow::{bail, Context, Result};
use std::env;

pub const DEFAULT_MAX_WORKERS: usize = 8;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Engine-side settings; the store and scraper adapters carry their own.
#[derive(Clone, Debug)]
pub struct Config {
    /// Column set the sheet is kept in.
    pub header: Header,
    /// Concurrent detail-page fetches.
    pub max_workers: usize,
    /// Sent with every scrape request.
    pub user_agent: String,
}

impl Config {
    /// Read the optional knobs from the environment:
    ///
    /// ```text
    /// GONGMO_MAX_WORKERS  (default 8)
    /// GONGMO_USER_AGENT   (default "Mozilla/5.0")
    /// ```
    pub fn from_env() -> Result<Self> {
        let max_workers = match env::var("GONGMO_MAX_WORKERS") {
            Ok(raw) => raw
                .parse()
                .context("GONGMO_MAX_WORKERS must be an integer")?,
            Err(_) => DEFAULT_MAX_WORKERS,
        };
        if max_workers == 0 {
            bail!("GONGMO_MAX_WORKERS must be at least 1");
        }

        let user_agent =
            env::var("GONGMO_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            header: Header::default(),
            max_workers,
            user_agent,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            header: Header::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
