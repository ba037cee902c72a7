use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// One event row joined with the group that claimed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_id: i64,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
    pub summary: Option<String>,
    pub group_name: String,
}

impl EventRecord {
    pub fn date_key(&self) -> DateKey {
        DateKey {
            year: self.year,
            month: self.month,
            day: self.day,
        }
    }
}

/// Grouping key built from the raw date columns. Missing parts are kept as-is,
/// so two events with no date at all land in the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
}

impl DateKey {
    pub fn is_undated(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    /// Calendar date, if every part is present and forms a real day.
    pub fn as_date(&self) -> Option<NaiveDate> {
        let month = u32::try_from(self.month?).ok()?;
        let day = u32::try_from(self.day?).ok()?;
        NaiveDate::from_ymd_opt(self.year?, month, day)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(date) = self.as_date() {
            return write!(f, "{date}");
        }
        match self.year {
            Some(year) => write!(f, "{year:04}")?,
            None => write!(f, "????")?,
        }
        for part in [self.month, self.day] {
            match part {
                Some(value) => write!(f, "-{value:02}")?,
                None => write!(f, "-??")?,
            }
        }
        Ok(())
    }
}

/// Two distinct group names stored in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupPair {
    first: String,
    second: String,
}

impl GroupPair {
    /// Returns `None` when both names are the same group.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Option<Self> {
        let (a, b) = (a.into(), b.into());
        if a == b {
            return None;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Some(Self { first, second })
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }
}

impl fmt::Display for GroupPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} & {}", self.first, self.second)
    }
}

impl Serialize for GroupPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq([&self.first, &self.second])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairWeight {
    #[serde(rename = "groups")]
    pub pair: GroupPair,
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub record_count: usize,
    pub bucket_count: usize,
    pub co_active_bucket_count: usize,
    pub pair_count: usize,
    pub has_undated_bucket: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(year: Option<i32>, month: Option<i32>, day: Option<i32>) -> DateKey {
        DateKey { year, month, day }
    }

    #[test]
    fn pair_is_order_independent() {
        let ab = GroupPair::new("Al-Shabaab", "Boko Haram").unwrap();
        let ba = GroupPair::new("Boko Haram", "Al-Shabaab").unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.first(), "Al-Shabaab");
        assert_eq!(ab.second(), "Boko Haram");
    }

    #[test]
    fn same_group_is_not_a_pair() {
        assert!(GroupPair::new("Taliban", "Taliban").is_none());
    }

    #[test]
    fn pair_serializes_as_name_array() {
        let entry = PairWeight {
            pair: GroupPair::new("B", "A").unwrap(),
            weight: 3,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"groups": ["A", "B"], "weight": 3}));
    }

    #[test]
    fn date_key_display_handles_missing_parts() {
        assert_eq!(key(Some(2017), Some(3), Some(9)).to_string(), "2017-03-09");
        assert_eq!(key(Some(1994), Some(7), None).to_string(), "1994-07-??");
        assert_eq!(key(None, None, None).to_string(), "????-??-??");
        // Day 0 is how the source data marks an unknown day.
        assert_eq!(key(Some(1970), Some(1), Some(0)).to_string(), "1970-01-00");
    }

    #[test]
    fn undated_only_when_every_part_is_missing() {
        assert!(key(None, None, None).is_undated());
        assert!(!key(None, Some(1), None).is_undated());
    }
}
