use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use incident_coparticipation::{
    config, coparticipation, db, report, EventRecord, SentinelFilter, UndatedPolicy,
};

#[derive(Parser)]
#[command(name = "incident-coparticipation")]
#[command(about = "Which attributed groups strike on the same dates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small sample of events
    Seed,
    /// Import events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the most frequent co-participating group pairs
    Pairs {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = config::DEFAULT_TOP_N, value_parser = parse_limit())]
        limit: usize,
        /// Emit JSON instead of a text listing
        #[arg(long)]
        json: bool,
        /// Emit every pair, unsorted, instead of the top --limit
        #[arg(long, requires = "json", conflicts_with = "limit")]
        all: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = config::DEFAULT_TOP_N, value_parser = parse_limit())]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_limit() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::<usize>::new().range(1..)
}

#[derive(Args)]
struct SourceArgs {
    /// Read events from this CSV file instead of the database
    #[arg(long)]
    input_csv: Option<PathBuf>,
    /// Group name to treat as unattributed, on top of "Unknown"
    #[arg(long = "exclude-group", value_name = "NAME")]
    exclude_groups: Vec<String>,
    /// Leave out events that have no year, month or day
    #[arg(long)]
    skip_undated: bool,
}

impl SourceArgs {
    fn sentinels(&self) -> SentinelFilter {
        SentinelFilter::with_extra(self.exclude_groups.iter().cloned())
    }

    fn undated_policy(&self) -> UndatedPolicy {
        if self.skip_undated {
            UndatedPolicy::Skip
        } else {
            UndatedPolicy::Keep
        }
    }

    fn scope_label(&self) -> Option<String> {
        self.input_csv
            .as_deref()
            .map(|path| path.display().to_string())
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = config::get_database_url()?;

    PgPoolOptions::new()
        .max_connections(config::PG_MAX_CONNECTIONS)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_records(source: &SourceArgs) -> anyhow::Result<Vec<EventRecord>> {
    let sentinels = source.sentinels();

    if let Some(path) = source.input_csv.as_deref() {
        return db::read_records_csv(path, &sentinels);
    }

    let pool = connect().await?;
    let records = db::fetch_coparticipation_records(&pool, &sentinels).await;
    pool.close().await;
    records
}

fn write_report(out: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} events from {}.", csv.display());
        }
        Commands::Pairs {
            source,
            limit,
            json,
            all,
        } => {
            let records = load_records(&source).await?;
            let aggregation = coparticipation::aggregate(&records, source.undated_policy());
            info!(
                pairs = aggregation.stats.pair_count,
                dates = aggregation.stats.bucket_count,
                "built co-participation graph"
            );
            if all {
                let pairs = coparticipation::into_pair_weights(aggregation.weights);
                println!("{}", report::render_json(&pairs)?);
            } else if json {
                let pairs = coparticipation::top_pairs(&aggregation.weights, limit);
                println!("{}", report::render_json(&pairs)?);
            } else {
                print!("{}", report::render_listing(&aggregation.weights, limit));
            }
        }
        Commands::Report { source, limit, out } => {
            let records = load_records(&source).await?;
            let aggregation = coparticipation::aggregate(&records, source.undated_policy());
            let report = report::build_report(
                source.scope_label().as_deref(),
                chrono::Utc::now(),
                &aggregation,
                limit,
            );
            write_report(&out, &report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_is_rejected() {
        let parsed = Cli::try_parse_from(["incident-coparticipation", "report", "--limit", "0"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["incident-coparticipation", "pairs", "--limit", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn all_pairs_requires_json() {
        assert!(Cli::try_parse_from(["incident-coparticipation", "pairs", "--all"]).is_err());
        assert!(
            Cli::try_parse_from(["incident-coparticipation", "pairs", "--all", "--json"]).is_ok()
        );
    }

    #[test]
    fn positive_limit_is_accepted() {
        let cli = Cli::try_parse_from(["incident-coparticipation", "report", "--limit", "3"])
            .unwrap();
        match cli.command {
            Commands::Report { limit, .. } => assert_eq!(limit, 3),
            _ => panic!("expected report command"),
        }
    }
}
