use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::coparticipation::{self, Aggregation, ConnectionWeights};
use crate::models::PairWeight;

const BAR_WIDTH: usize = 30;

/// Lists at least one pair whenever the graph has any.
pub fn render_listing(weights: &ConnectionWeights, limit: usize) -> String {
    let mut output = String::new();

    if weights.is_empty() {
        let _ = writeln!(output, "No co-participating groups found.");
        return output;
    }

    let pairs = coparticipation::top_pairs(weights, limit.max(1));
    let _ = writeln!(output, "Top group pairs by shared attack dates:");
    for entry in &pairs {
        let _ = writeln!(
            output,
            "- {}: {} shared {}",
            entry.pair,
            entry.weight,
            if entry.weight == 1 { "date" } else { "dates" }
        );
    }
    output
}

pub fn render_json(pairs: &[PairWeight]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(pairs)?)
}

fn bar(weight: u32, max_weight: u32) -> String {
    if max_weight == 0 {
        return String::new();
    }
    let filled = ((weight as f64 / max_weight as f64) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(filled.max(1))
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

pub fn build_report(
    scope: Option<&str>,
    generated_at: DateTime<Utc>,
    aggregation: &Aggregation,
    limit: usize,
) -> String {
    let limit = limit.max(1);
    let pairs = coparticipation::top_pairs(&aggregation.weights, limit);
    let stats = &aggregation.stats;

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all attributed groups");

    let _ = writeln!(output, "# Group Co-participation in Attacks");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Date Buckets");
    let _ = writeln!(output, "- Event records: {}", stats.record_count);
    let _ = writeln!(output, "- Distinct dates: {}", stats.bucket_count);
    let _ = writeln!(
        output,
        "- Dates with two or more groups: {}",
        stats.co_active_bucket_count
    );
    let _ = writeln!(output, "- Group pairs: {}", stats.pair_count);
    if stats.has_undated_bucket {
        let _ = writeln!(
            output,
            "- Events without any date were grouped into a single bucket."
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top {} Group Pairs", limit);

    if aggregation.weights.is_empty() {
        let _ = writeln!(output, "No co-participating groups found.");
        return output;
    }

    let max_weight = pairs.first().map(|entry| entry.weight).unwrap_or(0);
    let _ = writeln!(output, "| Groups | Shared dates | |");
    let _ = writeln!(output, "| --- | ---: | --- |");
    for entry in &pairs {
        let _ = writeln!(
            output,
            "| {} | {} | `{}` |",
            escape_cell(&entry.pair.to_string()),
            entry.weight,
            bar(entry.weight, max_weight)
        );
    }

    output
}
