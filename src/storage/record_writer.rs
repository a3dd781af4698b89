use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow_schema::ArrowError;
use async_trait::async_trait;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{fs::operations::AtomicFile, session::record::TaskRecord, utils::clock::Clock};

use super::{
    codec::encode_record,
    partition::{record_file_name, record_partition},
};

/// Persistence failure. Always carries the path that was attempted so the operator can tell
/// a full disk from an unreachable share.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("couldn't create partition {path:?}: {source}")]
    Partition {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't encode record {record_id}: {source}")]
    Encode {
        record_id: Uuid,
        #[source]
        source: ArrowError,
    },
    #[error("couldn't write record to {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WriteError::Partition { path, .. } | WriteError::Io { path, .. } => Some(path),
            WriteError::Encode { .. } => None,
        }
    }
}

/// Interface for persisting finished records. Implementations only ever append, they never
/// look at what is already stored.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Returns the final location of the record.
    async fn write(&self, record: &TaskRecord) -> Result<PathBuf, WriteError>;
}

/// Writes every record into its own file under
/// `user=<user>/year=<YYYY>/month=<MM>/day=<DD>/`. Many machines can share the same root:
/// names are unique per record and files appear atomically.
pub struct PartitionedRecordWriter {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl PartitionedRecordWriter {
    /// Creates the root if it's missing. A failure here means the store isn't reachable at all.
    pub async fn new(root: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, io::Error> {
        tokio::fs::create_dir_all(&root).await?;

        Ok(Self { root, clock })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path `record` would be written to.
    pub fn path_for(&self, record: &TaskRecord) -> PathBuf {
        record_partition(&self.root, record).join(record_file_name(record))
    }

    async fn create_partition(path: &Path) -> Result<(), WriteError> {
        match tokio::fs::create_dir_all(path).await {
            Ok(()) => Ok(()),
            // Another writer won the race.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(source) => Err(WriteError::Partition {
                path: path.to_owned(),
                source,
            }),
        }
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> Result<PathBuf, io::Error> {
        let mut file = AtomicFile::create(path).await?;
        file.write_all(bytes).await?;
        file.commit().await
    }
}

#[async_trait]
impl RecordWriter for PartitionedRecordWriter {
    async fn write(&self, record: &TaskRecord) -> Result<PathBuf, WriteError> {
        let path = self.path_for(record);
        debug!("Writing record {} to {path:?}", record.record_id());

        if let Some(partition) = path.parent() {
            Self::create_partition(partition).await?;
        }

        let bytes =
            encode_record(record, self.clock.time()).map_err(|source| WriteError::Encode {
                record_id: record.record_id(),
                source,
            })?;

        let written = Self::write_file(&path, &bytes)
            .await
            .map_err(|source| WriteError::Io {
                path: path.clone(),
                source,
            })
            .inspect_err(|e| error!("Failed to write record {}: {e}", record.record_id()))?;

        info!("Stored record {} at {written:?}", record.record_id());
        Ok(written)
    }
}
