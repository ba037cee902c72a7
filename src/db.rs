use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use sqlx::{PgPool, Row};

use crate::coparticipation::SentinelFilter;
use crate::models::EventRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

type SeedEvent = (i64, Option<i32>, Option<i32>, Option<i32>, &'static str, &'static str);

/// Sample events; each group is upserted the first time an event names it.
fn seed_events() -> [SeedEvent; 10] {
    [
        (
            201_501_010_001,
            Some(2015),
            Some(1),
            Some(1),
            "Checkpoint assault outside Kunduz",
            "Taliban",
        ),
        (
            201_501_010_002,
            Some(2015),
            Some(1),
            Some(1),
            "Bombing at a market in Mosul",
            "Islamic State of Iraq and the Levant (ISIL)",
        ),
        (
            201_501_010_003,
            Some(2015),
            Some(1),
            Some(1),
            "Raid on a village near Baga",
            "Boko Haram",
        ),
        (
            201_501_010_004,
            Some(2015),
            Some(1),
            Some(1),
            "Second device at the same market",
            "Islamic State of Iraq and the Levant (ISIL)",
        ),
        (
            201_501_020_001,
            Some(2015),
            Some(1),
            Some(2),
            "Roadside bomb in Helmand",
            "Taliban",
        ),
        (
            201_501_020_002,
            Some(2015),
            Some(1),
            Some(2),
            "Suicide attack in Baghdad",
            "Islamic State of Iraq and the Levant (ISIL)",
        ),
        (
            201_501_020_003,
            Some(2015),
            Some(1),
            Some(2),
            "Attack on a hotel in Mogadishu",
            "Al-Shabaab",
        ),
        (
            201_501_020_004,
            Some(2015),
            Some(1),
            Some(2),
            "Unclaimed arson in Peshawar",
            "Unknown",
        ),
        (
            197_000_000_001,
            None,
            None,
            None,
            "Undated ambush in Samar",
            "New People's Army (NPA)",
        ),
        (
            197_000_000_002,
            None,
            None,
            None,
            "Undated kidnapping near Garissa",
            "Al-Shabaab",
        ),
    ]
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut group_ids: HashMap<&str, i32> = HashMap::new();

    for (event_id, year, month, day, summary, group_name) in seed_events() {
        let group_id = match group_ids.get(group_name) {
            Some(id) => *id,
            None => {
                let id = upsert_group(pool, group_name).await?;
                group_ids.insert(group_name, id);
                id
            }
        };
        insert_event(pool, event_id, year, month, day, Some(summary), group_id).await?;
    }

    Ok(())
}

/// Events joined with their claiming group, minus unattributed placeholders.
pub async fn fetch_coparticipation_records(
    pool: &PgPool,
    sentinels: &SentinelFilter,
) -> anyhow::Result<Vec<EventRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT e.id AS event_id, e.year, e.month, e.day, e.summary, g.group_name
        FROM incident_stats.events e
        JOIN incident_stats.terrorist_group g ON e.group_id = g.id
        WHERE g.group_name <> ALL($1)
        "#,
    )
    .bind(sentinels.names())
    .fetch_all(pool)
    .await
    .context("failed to read events with their groups")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(EventRecord {
            event_id: row.get("event_id"),
            year: row.get("year"),
            month: row.get("month"),
            day: row.get("day"),
            summary: row.get("summary"),
            group_name: row.get("group_name"),
        });
    }

    tracing::info!(records = records.len(), "fetched event records");
    Ok(records)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    event_id: i64,
    year: Option<i32>,
    month: Option<i32>,
    day: Option<i32>,
    summary: Option<String>,
    group_name: String,
}

impl From<CsvRow> for EventRecord {
    fn from(row: CsvRow) -> Self {
        EventRecord {
            event_id: row.event_id,
            year: row.year,
            month: row.month,
            day: row.day,
            summary: row.summary.filter(|summary| !summary.is_empty()),
            group_name: row.group_name,
        }
    }
}

fn read_csv_rows(csv_path: &Path) -> anyhow::Result<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut rows = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result.with_context(|| format!("invalid row in {}", csv_path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Loads records straight from an export file, skipping the database.
pub fn read_records_csv(
    csv_path: &Path,
    sentinels: &SentinelFilter,
) -> anyhow::Result<Vec<EventRecord>> {
    let mut records: Vec<EventRecord> = read_csv_rows(csv_path)?
        .into_iter()
        .map(EventRecord::from)
        .collect();
    let total = records.len();
    sentinels.retain(&mut records);

    tracing::info!(
        records = records.len(),
        excluded = total - records.len(),
        path = %csv_path.display(),
        "read event records"
    );
    Ok(records)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for row in read_csv_rows(csv_path)? {
        let record = EventRecord::from(row);
        let group_id = upsert_group(pool, &record.group_name).await?;
        let affected = insert_event(
            pool,
            record.event_id,
            record.year,
            record.month,
            record.day,
            record.summary.as_deref(),
            group_id,
        )
        .await?;

        if affected > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

async fn upsert_group(pool: &PgPool, group_name: &str) -> anyhow::Result<i32> {
    let group_id: i32 = sqlx::query(
        r#"
        INSERT INTO incident_stats.terrorist_group (group_name)
        VALUES ($1)
        ON CONFLICT (group_name) DO UPDATE
        SET group_name = EXCLUDED.group_name
        RETURNING id
        "#,
    )
    .bind(group_name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert group {group_name}"))?
    .get("id");

    Ok(group_id)
}

async fn insert_event(
    pool: &PgPool,
    event_id: i64,
    year: Option<i32>,
    month: Option<i32>,
    day: Option<i32>,
    summary: Option<&str>,
    group_id: i32,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO incident_stats.events (id, year, month, day, summary, group_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(year)
    .bind(month)
    .bind(day)
    .bind(summary)
    .bind(group_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Write;

    use super::*;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn seed_covers_each_group_once_per_name() {
        let events = seed_events();
        let groups: HashSet<&str> = events.iter().map(|event| event.5).collect();
        assert_eq!(groups.len(), 6);
        assert!(groups.contains("Unknown"));

        let ids: HashSet<i64> = events.iter().map(|event| event.0).collect();
        assert_eq!(ids.len(), events.len());
    }

    #[test]
    fn csv_source_keeps_missing_date_parts_as_none() {
        let file = write_csv(
            "event_id,year,month,day,summary,group_name\n\
             1,2014,6,10,Fall of Mosul,ISIL\n\
             2,,,,,Boko Haram\n\
             3,1998,8,,Embassy bombing,Al-Qaida\n",
        );

        let records = read_records_csv(file.path(), &SentinelFilter::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date_key().to_string(), "2014-06-10");
        assert!(records[1].date_key().is_undated());
        assert_eq!(records[1].summary, None);
        assert_eq!(records[2].day, None);
        assert_eq!(records[2].month, Some(8));
    }

    #[test]
    fn csv_source_drops_sentinel_groups() {
        let file = write_csv(
            "event_id,year,month,day,summary,group_name\n\
             1,2016,3,22,Airport attack,ISIL\n\
             2,2016,3,22,,Unknown\n\
             3,2016,3,22,,Gunmen\n",
        );

        let records = read_records_csv(file.path(), &SentinelFilter::default()).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.group_name.as_str()).collect();
        assert_eq!(names, vec!["ISIL", "Gunmen"]);

        let strict = SentinelFilter::with_extra(["Gunmen"]);
        let records = read_records_csv(file.path(), &strict).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn csv_source_reports_bad_rows() {
        let file = write_csv("event_id,year,month,day,summary,group_name\nabc,2016,1,1,,ISIL\n");

        let err = read_records_csv(file.path(), &SentinelFilter::default()).unwrap_err();
        assert!(err.to_string().contains("invalid row"));
    }
}
