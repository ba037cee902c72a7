pub mod config;
pub mod coparticipation;
pub mod db;
pub mod models;
pub mod report;

pub use coparticipation::{
    aggregate, build_co_participation, top_pairs, Aggregation, ConnectionWeights, SentinelFilter,
    UndatedPolicy,
};
pub use models::{DateKey, EventRecord, GroupPair, PairWeight};
