//! Arrow IPC encoding of [TaskRecord]. Every record file is a single-row Arrow file with the
//! schema below, so pyarrow, DuckDB or Polars can scan whole partition trees as one dataset.

use std::{io::Cursor, str::FromStr, sync::Arc};

use arrow_array::{
    Array, ArrayRef, BooleanArray, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow_ipc::{reader::FileReader, writer::FileWriter};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::session::record::{Cadence, TaskRecord};

/// Column names in file order.
pub const COLUMNS: [&str; 13] = [
    "task",
    "cadence",
    "account",
    "user",
    "start_utc",
    "end_utc",
    "duration_seconds",
    "notes",
    "app_version",
    "record_id",
    "covering_for",
    "partially_complete",
    "upload_utc",
];

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("column {0} is missing or has an unexpected type")]
    MissingColumn(&'static str),
    #[error("column {column} holds an invalid value {value:?}")]
    InvalidValue { column: &'static str, value: String },
}

/// A record as found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub record: TaskRecord,
    pub upload_utc: DateTime<Utc>,
}

fn utc_timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

pub fn record_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("task", DataType::Utf8, false),
        Field::new("cadence", DataType::Utf8, false),
        Field::new("account", DataType::Utf8, true),
        Field::new("user", DataType::Utf8, false),
        Field::new("start_utc", utc_timestamp(), false),
        Field::new("end_utc", utc_timestamp(), false),
        Field::new("duration_seconds", DataType::Int64, false),
        Field::new("notes", DataType::Utf8, true),
        Field::new("app_version", DataType::Utf8, false),
        Field::new("record_id", DataType::Utf8, false),
        Field::new("covering_for", DataType::Utf8, true),
        Field::new("partially_complete", DataType::Boolean, false),
        Field::new("upload_utc", utc_timestamp(), false),
    ]))
}

fn timestamp(moment: DateTime<Utc>) -> ArrayRef {
    Arc::new(TimestampMicrosecondArray::from(vec![moment.timestamp_micros()]).with_timezone("UTC"))
}

/// Encodes `record` as a complete Arrow IPC file.
pub fn encode_record(
    record: &TaskRecord,
    upload_utc: DateTime<Utc>,
) -> Result<Vec<u8>, ArrowError> {
    let schema = record_schema();
    let record_id = record.record_id().to_string();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec![record.task()])),
            Arc::new(StringArray::from(vec![record.cadence().as_str()])),
            Arc::new(StringArray::from(vec![record.account()])),
            Arc::new(StringArray::from(vec![record.user()])),
            timestamp(record.start_utc()),
            timestamp(record.end_utc()),
            Arc::new(Int64Array::from(vec![record.duration_seconds()])),
            Arc::new(StringArray::from(vec![record.notes()])),
            Arc::new(StringArray::from(vec![record.app_version()])),
            Arc::new(StringArray::from(vec![record_id.as_str()])),
            Arc::new(StringArray::from(vec![record.covering_for()])),
            Arc::new(BooleanArray::from(vec![record.partially_complete()])),
            timestamp(upload_utc),
        ],
    )?;

    let mut writer = FileWriter::try_new(Vec::new(), &schema)?;
    writer.write(&batch)?;
    writer.into_inner()
}

/// Column names of an encoded file, without decoding any rows.
pub fn read_column_names(bytes: Vec<u8>) -> Result<Vec<String>, ReadError> {
    let reader = FileReader::try_new(Cursor::new(bytes), None)?;
    Ok(reader
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect())
}

pub fn decode_records(bytes: Vec<u8>) -> Result<Vec<StoredRecord>, ReadError> {
    let reader = FileReader::try_new(Cursor::new(bytes), None)?;
    let mut records = vec![];
    for batch in reader {
        let batch = batch?;
        let columns = Columns::new(&batch)?;
        for row in 0..batch.num_rows() {
            records.push(columns.row(row)?);
        }
    }
    Ok(records)
}

struct Columns<'a> {
    task: &'a StringArray,
    cadence: &'a StringArray,
    account: &'a StringArray,
    user: &'a StringArray,
    start_utc: &'a TimestampMicrosecondArray,
    end_utc: &'a TimestampMicrosecondArray,
    duration_seconds: &'a Int64Array,
    notes: &'a StringArray,
    app_version: &'a StringArray,
    record_id: &'a StringArray,
    covering_for: &'a StringArray,
    partially_complete: &'a BooleanArray,
    upload_utc: &'a TimestampMicrosecondArray,
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &'static str,
) -> Result<&'a T, ReadError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or(ReadError::MissingColumn(name))
}

impl<'a> Columns<'a> {
    fn new(batch: &'a RecordBatch) -> Result<Self, ReadError> {
        Ok(Self {
            task: column(batch, "task")?,
            cadence: column(batch, "cadence")?,
            account: column(batch, "account")?,
            user: column(batch, "user")?,
            start_utc: column(batch, "start_utc")?,
            end_utc: column(batch, "end_utc")?,
            duration_seconds: column(batch, "duration_seconds")?,
            notes: column(batch, "notes")?,
            app_version: column(batch, "app_version")?,
            record_id: column(batch, "record_id")?,
            covering_for: column(batch, "covering_for")?,
            partially_complete: column(batch, "partially_complete")?,
            upload_utc: column(batch, "upload_utc")?,
        })
    }

    fn row(&self, row: usize) -> Result<StoredRecord, ReadError> {
        let cadence = required(self.cadence, row, "cadence")?;
        let record_id = required(self.record_id, row, "record_id")?;

        let record = TaskRecord {
            task: required(self.task, row, "task")?.to_string(),
            cadence: Cadence::from_str(cadence).map_err(|_| ReadError::InvalidValue {
                column: "cadence",
                value: cadence.to_string(),
            })?,
            account: optional(self.account, row),
            user: required(self.user, row, "user")?.to_string(),
            start_utc: moment(self.start_utc, row, "start_utc")?,
            end_utc: moment(self.end_utc, row, "end_utc")?,
            duration_seconds: self.duration_seconds.value(row),
            notes: optional(self.notes, row),
            app_version: required(self.app_version, row, "app_version")?.to_string(),
            record_id: Uuid::parse_str(record_id).map_err(|_| ReadError::InvalidValue {
                column: "record_id",
                value: record_id.to_string(),
            })?,
            covering_for: optional(self.covering_for, row),
            partially_complete: !self.partially_complete.is_null(row)
                && self.partially_complete.value(row),
        };

        Ok(StoredRecord {
            record,
            upload_utc: moment(self.upload_utc, row, "upload_utc")?,
        })
    }
}

fn required<'a>(
    array: &'a StringArray,
    row: usize,
    column: &'static str,
) -> Result<&'a str, ReadError> {
    if array.is_null(row) {
        Err(ReadError::InvalidValue {
            column,
            value: "null".into(),
        })
    } else {
        Ok(array.value(row))
    }
}

fn optional(array: &StringArray, row: usize) -> Option<String> {
    (!array.is_null(row)).then(|| array.value(row).to_string())
}

fn moment(
    array: &TimestampMicrosecondArray,
    row: usize,
    column: &'static str,
) -> Result<DateTime<Utc>, ReadError> {
    let micros = array.value(row);
    DateTime::from_timestamp_micros(micros)
        .filter(|_| !array.is_null(row))
        .ok_or_else(|| ReadError::InvalidValue {
            column,
            value: micros.to_string(),
        })
}
