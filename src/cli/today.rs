use std::fmt::Display;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use futures::StreamExt;
use now::DateTimeNow;
use tracing::warn;

use crate::{
    config::AppConfig,
    storage::{codec::StoredRecord, record_reader::RecordReader},
    utils::time::{format_hhmmss, format_time_ago, next_day_start},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct TodayCommand {
    #[arg(
        long,
        short,
        help = "Day to show. Examples are \"yesterday\", \"15/03/2025\", \"last friday\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(
        long,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
    #[arg(long, short, help = "Show every user instead of only the current one")]
    all: bool,
    #[arg(long, short, default_value_t = 50, help = "Maximum number of records to show")]
    limit: usize,
    #[arg(long, help = "Print records as JSON")]
    json: bool,
}

/// Lists the records started on a single local day, newest first.
pub async fn process_today_command(
    TodayCommand {
        date,
        date_style,
        all,
        limit,
        json,
    }: TodayCommand,
    config: &AppConfig,
) -> Result<()> {
    let now = Local::now();
    let day = match date.map(|s| parse_date_string(&s, now, date_style.into())) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate date {e}"),
                )
                .into());
        }
        None => now,
    };
    let start = day.beginning_of_day();
    let end = next_day_start(start).context("Day has no end in the local time zone")?;

    let reader = RecordReader::new(config.store_dir.clone());
    let user_key = (!all).then(|| config.operator.key());
    let (records, failures) = collect_day(&reader, user_key, start, end).await?;
    let records = newest_first(records, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records for {}", start.format("%x"));
    }
    let now = Utc::now();
    for record in &records {
        println!("{}", format_row(record, now, all));
    }
    if failures > 0 {
        println!("{failures} record file(s) couldn't be read, see the log for details");
    }
    Ok(())
}

/// UTC dates a local `[start, end)` range touches. A local day spans one or two UTC partitions.
fn utc_dates<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Vec<NaiveDate> {
    let first = start.with_timezone(&Utc).date_naive();
    let last = (end.with_timezone(&Utc) - Duration::microseconds(1)).date_naive();
    first.iter_days().take_while(|d| *d <= last).collect()
}

/// Every readable record that started within `[start, end)`, plus how many files failed.
async fn collect_day<Tz: TimeZone>(
    reader: &RecordReader,
    user_key: Option<&str>,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
) -> Result<(Vec<StoredRecord>, usize)> {
    let mut partitions = vec![];
    for date in utc_dates(&start, &end) {
        partitions.extend(reader.day_partitions(user_key, date).await?);
    }

    let start = start.with_timezone(&Utc);
    let end = end.with_timezone(&Utc);
    let mut records = vec![];
    let mut failures = 0;
    let mut stream = std::pin::pin!(reader.read_partitions(partitions));
    while let Some(result) = stream.next().await {
        match result {
            Ok(record) => {
                let started = record.record.start_utc();
                if start <= started && started < end {
                    records.push(record);
                }
            }
            Err(e) => {
                warn!("Skipping unreadable record {e:#}");
                failures += 1;
            }
        }
    }
    Ok((records, failures))
}

fn newest_first(mut records: Vec<StoredRecord>, limit: usize) -> Vec<StoredRecord> {
    records.sort_by(|a, b| b.record.start_utc().cmp(&a.record.start_utc()));
    records.truncate(limit);
    records
}

fn format_row(stored: &StoredRecord, now: DateTime<Utc>, with_user: bool) -> String {
    let record = &stored.record;
    let mut row = format!(
        "{}\t{}\t{}\t{}",
        record.start_utc().with_timezone(&Local).format("%H:%M"),
        format_hhmmss(record.duration_seconds()),
        record.cadence(),
        record.task(),
    );
    if let Some(account) = record.account() {
        row.push_str(&format!(" [{account}]"));
    }
    if record.partially_complete() {
        row.push_str(" (partial)");
    }
    if with_user {
        row.push_str(&format!("\t{}", record.user()));
    }
    if let Some(covering) = record.covering_for() {
        row.push_str(&format!("\tcovering {covering}"));
    }
    row.push_str(&format!(
        "\tuploaded {}",
        format_time_ago(stored.upload_utc, now)
    ));
    row
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;
    use uuid::Uuid;

    use crate::{
        session::record::{Cadence, TaskRecord},
        storage::{
            codec::StoredRecord,
            record_reader::RecordReader,
            record_writer::{PartitionedRecordWriter, RecordWriter},
        },
        utils::clock::ManualClock,
    };

    use super::{collect_day, format_row, newest_first, utc_dates};

    fn record_at(user: &str, task: &str, start: DateTime<Utc>) -> TaskRecord {
        TaskRecord {
            task: task.into(),
            cadence: Cadence::Daily,
            account: Some("Acme".into()),
            user: user.into(),
            start_utc: start,
            end_utc: start + Duration::minutes(25),
            duration_seconds: 1500,
            notes: None,
            app_version: "test".into(),
            record_id: Uuid::new_v4(),
            covering_for: None,
            partially_complete: false,
        }
    }

    #[test]
    fn test_local_day_can_span_two_utc_dates() {
        let kyiv = FixedOffset::east_opt(2 * 3600).unwrap();
        let start = kyiv.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = kyiv.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();

        assert_eq!(
            utc_dates(&start, &end),
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ]
        );

        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            utc_dates(&start, &(start + Duration::days(1))),
            vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_collects_only_the_requested_day_and_user() -> Result<()> {
        let dir = tempdir()?;
        let kyiv = FixedOffset::east_opt(2 * 3600).unwrap();
        let day_start = kyiv.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let writer = PartitionedRecordWriter::new(
            dir.path().to_owned(),
            Arc::new(ManualClock::starting_at(Utc::now())),
        )
        .await?;

        // 23:00 UTC on the 1st is already the 2nd in Kyiv.
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let midday = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let too_early = Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap();
        let too_late = Utc.with_ymd_and_hms(2024, 1, 2, 22, 30, 0).unwrap();
        for (user, task, start) in [
            ("jdoe", "Early", early),
            ("jdoe", "Midday", midday),
            ("jdoe", "Yesterday", too_early),
            ("jdoe", "Tomorrow", too_late),
            ("pat", "Someone else", midday),
        ] {
            writer.write(&record_at(user, task, start)).await?;
        }

        let reader = RecordReader::new(dir.path().to_owned());
        let (mine, failures) =
            collect_day(&reader, Some("jdoe"), day_start, day_start + Duration::days(1)).await?;
        let mine = newest_first(mine, 10);

        assert_eq!(failures, 0);
        assert_eq!(
            mine.iter().map(|r| r.record.task()).collect::<Vec<_>>(),
            vec!["Midday", "Early"]
        );

        let (everyone, _) =
            collect_day(&reader, None, day_start, day_start + Duration::days(1)).await?;
        assert_eq!(everyone.len(), 3);
        assert_eq!(newest_first(everyone, 1).len(), 1);
        Ok(())
    }

    #[test]
    fn test_row_shows_duration_and_upload_age() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let stored = StoredRecord {
            record: record_at("jdoe", "Inventory Check", start),
            upload_utc: start + Duration::minutes(30),
        };

        let row = format_row(&stored, start + Duration::minutes(35), true);

        assert!(row.contains("00:25:00\tDaily\tInventory Check [Acme]"));
        assert!(row.contains("\tjdoe"));
        assert!(row.ends_with("uploaded 5 min ago"));
    }
}
