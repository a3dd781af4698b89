use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::{identity::sanitize_key, session::record::TaskRecord};

/// Extension of committed record files.
pub const RECORD_EXTENSION: &str = "arrow";

const RECORD_PREFIX: &str = "task_";

/// Directory name prefixes, outermost first.
pub const PARTITION_LEVELS: [&str; 4] = ["user=", "year=", "month=", "day="];

/// `<root>/user=<user>/year=<YYYY>/month=<MM>/day=<DD>`
pub fn partition_dir(root: &Path, user_key: &str, date: NaiveDate) -> PathBuf {
    root.join(format!("user={user_key}"))
        .join(format!("year={:04}", date.year()))
        .join(format!("month={:02}", date.month()))
        .join(format!("day={:02}", date.day()))
}

/// Partition of a record: its sanitised user and the UTC day it started on.
pub fn record_partition(root: &Path, record: &TaskRecord) -> PathBuf {
    partition_dir(root, &sanitize_key(record.user()), record.partition_date())
}

/// `task_<YYYYmmdd_HHMMSS>_<record id>.arrow`. The full record id keeps names unique even when
/// many sessions start within the same second.
pub fn record_file_name(record: &TaskRecord) -> String {
    format!(
        "{RECORD_PREFIX}{}_{}.{RECORD_EXTENSION}",
        record.start_utc().format("%Y%m%d_%H%M%S"),
        record.record_id().simple()
    )
}

pub fn is_record_file_name(name: &str) -> bool {
    name.starts_with(RECORD_PREFIX) && name.ends_with(&format!(".{RECORD_EXTENSION}"))
}
