use std::collections::{BTreeSet, HashMap};

use crate::models::{BucketStats, DateKey, EventRecord, GroupPair, PairWeight};

pub type EventBuckets<'a> = HashMap<DateKey, BTreeSet<&'a str>>;
pub type ConnectionWeights = HashMap<GroupPair, u32>;

/// What to do with events that carry no date parts at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndatedPolicy {
    /// All fully undated events share one `(None, None, None)` bucket.
    #[default]
    Keep,
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub weights: ConnectionWeights,
    pub stats: BucketStats,
}

/// Counts, for every pair of distinct groups, the dates on which both were active.
pub fn build_co_participation(records: &[EventRecord]) -> ConnectionWeights {
    aggregate(records, UndatedPolicy::Keep).weights
}

pub fn aggregate(records: &[EventRecord], policy: UndatedPolicy) -> Aggregation {
    let buckets = bucket_by_date(records, policy);
    let weights = count_connections(&buckets);

    let stats = BucketStats {
        record_count: records.len(),
        bucket_count: buckets.len(),
        co_active_bucket_count: buckets.values().filter(|groups| groups.len() > 1).count(),
        pair_count: weights.len(),
        has_undated_bucket: buckets.keys().any(DateKey::is_undated),
    };
    tracing::debug!(
        records = stats.record_count,
        buckets = stats.bucket_count,
        pairs = stats.pair_count,
        "aggregated co-participation"
    );

    Aggregation { weights, stats }
}

pub fn bucket_by_date(records: &[EventRecord], policy: UndatedPolicy) -> EventBuckets<'_> {
    let mut buckets: EventBuckets<'_> = HashMap::new();

    for record in records {
        let key = record.date_key();
        if policy == UndatedPolicy::Skip && key.is_undated() {
            continue;
        }
        buckets
            .entry(key)
            .or_default()
            .insert(record.group_name.as_str());
    }

    buckets
}

/// Each bucket adds at most one to any pair, however many events it holds.
pub fn count_connections(buckets: &EventBuckets<'_>) -> ConnectionWeights {
    let mut connections = ConnectionWeights::new();

    for groups in buckets.values() {
        if groups.len() < 2 {
            continue;
        }
        let names: Vec<&str> = groups.iter().copied().collect();
        for (i, first) in names.iter().enumerate() {
            for second in &names[i + 1..] {
                if let Some(pair) = GroupPair::new(*first, *second) {
                    *connections.entry(pair).or_insert(0) += 1;
                }
            }
        }
    }

    connections
}

/// Unordered view of the weights.
pub fn into_pair_weights(weights: ConnectionWeights) -> Vec<PairWeight> {
    weights
        .into_iter()
        .map(|(pair, weight)| PairWeight { pair, weight })
        .collect()
}

/// Heaviest pairs first; equal weights fall back to name order.
pub fn top_pairs(weights: &ConnectionWeights, limit: usize) -> Vec<PairWeight> {
    let mut values: Vec<PairWeight> = weights
        .iter()
        .map(|(pair, weight)| PairWeight {
            pair: pair.clone(),
            weight: *weight,
        })
        .collect();
    values.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.pair.cmp(&b.pair)));
    values.truncate(limit);
    values
}

pub const UNKNOWN_GROUP: &str = "Unknown";

/// Unattributed-group placeholders removed before aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelFilter {
    names: BTreeSet<String>,
}

impl Default for SentinelFilter {
    fn default() -> Self {
        Self {
            names: BTreeSet::from([UNKNOWN_GROUP.to_string()]),
        }
    }
}

impl SentinelFilter {
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::default();
        filter.names.extend(extra.into_iter().map(Into::into));
        filter
    }

    pub fn is_sentinel(&self, group_name: &str) -> bool {
        self.names.contains(group_name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn retain(&self, records: &mut Vec<EventRecord>) {
        records.retain(|record| !self.is_sentinel(&record.group_name));
    }
}
