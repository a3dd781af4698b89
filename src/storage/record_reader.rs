use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use futures::{stream, Stream, StreamExt};
use tracing::{debug, error};

use crate::fs::operations::is_temporary_name;

use super::{
    codec::{decode_records, ReadError, StoredRecord},
    partition::{is_record_file_name, partition_dir, PARTITION_LEVELS},
};

/// Read side of the partitioned store. Separate from the writer, which never reads.
pub struct RecordReader {
    root: PathBuf,
}

/// Files found in a partition directory.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PartitionListing {
    pub records: Vec<PathBuf>,
    /// Leftovers of writes that never reached the rename.
    pub temporary: Vec<PathBuf>,
}

impl RecordReader {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn read_file(path: &Path) -> Result<Vec<StoredRecord>, ReadError> {
        debug!("Reading {path:?}");
        let bytes = tokio::fs::read(path).await?;
        decode_records(bytes)
    }

    /// Lists a single partition directory. A missing directory is simply empty.
    pub async fn list_partition(dir: &Path) -> Result<PartitionListing, std::io::Error> {
        let mut listing = PartitionListing::default();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(listing),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_record_file_name(&name) {
                listing.records.push(entry.path());
            } else if is_temporary_name(&name) {
                listing.temporary.push(entry.path());
            }
        }
        listing.records.sort();
        listing.temporary.sort();
        Ok(listing)
    }

    /// Partition directories holding records for `date`, for one user or for everyone.
    pub async fn day_partitions(
        &self,
        user_key: Option<&str>,
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>, std::io::Error> {
        let users = match user_key {
            Some(key) => vec![key.to_string()],
            None => self
                .child_dirs(&self.root, PARTITION_LEVELS[0])
                .await?
                .iter()
                .filter_map(|dir| dir.file_name())
                .map(|name| {
                    name.to_string_lossy()
                        .trim_start_matches(PARTITION_LEVELS[0])
                        .to_string()
                })
                .collect(),
        };
        Ok(users
            .iter()
            .map(|user| partition_dir(&self.root, user, date))
            .collect())
    }

    /// Every `user=*/year=*/month=*/day=*` directory in the store.
    pub async fn all_partitions(&self) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut current = vec![self.root.clone()];
        for prefix in PARTITION_LEVELS {
            let mut next = vec![];
            for dir in &current {
                next.extend(self.child_dirs(dir, prefix).await?);
            }
            current = next;
        }
        current.sort();
        Ok(current)
    }

    /// Streams every record stored under the given partitions. Files are read a few at a time;
    /// a broken file yields an error item and doesn't stop the stream.
    pub fn read_partitions(
        &self,
        partitions: Vec<PathBuf>,
    ) -> impl Stream<Item = Result<StoredRecord, anyhow::Error>> {
        let files = stream::iter(partitions)
            .then(|dir| async move { (Self::list_partition(&dir).await, dir) })
            .flat_map(|(listing, dir)| match listing {
                Ok(listing) => stream::iter(listing.records).map(Ok).boxed(),
                Err(e) => {
                    error!("Failed to list partition {dir:?} {e}");
                    stream::once(async move { Err(anyhow::Error::from(e)) }).boxed()
                }
            });

        files
            .map(|file| async move {
                let file = file?;
                Self::read_file(&file).await.map_err(|e| {
                    error!("Failed to read record file {file:?} {e}");
                    anyhow::Error::from(e).context(format!("Failed to read {file:?}"))
                })
            })
            .buffered(4)
            .flat_map(|result| match result {
                Ok(records) => stream::iter(records).map(Ok).boxed(),
                Err(e) => stream::once(async move { Err(e) }).boxed(),
            })
    }

    async fn child_dirs(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e),
        };
        let mut dirs = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(prefix) && entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
