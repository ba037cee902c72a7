use anyhow::{Context, Result};

/// Pairs shown by default in listings and reports.
pub const DEFAULT_TOP_N: usize = 15;

pub const PG_MAX_CONNECTIONS: u32 = 5;

/// Get DATABASE_URL from the environment (or a local `.env`)
pub fn get_database_url() -> Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a Postgres instance")
}
