use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

/// Suffix of in-flight files. Anything carrying it was never committed.
pub const TEMP_SUFFIX: &str = ".tmp";

/// File that only shows up under its final name once [AtomicFile::commit] succeeds. Until then
/// the bytes live in a hidden sibling (`.<name>.tmp`) in the same directory, so the final rename
/// never crosses filesystems. Dropping an uncommitted handle removes the sibling.
pub struct AtomicFile {
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl AtomicFile {
    /// Fails with [io::ErrorKind::AlreadyExists] if another writer is already using the same
    /// temporary name.
    pub async fn create(final_path: impl Into<PathBuf>) -> io::Result<Self> {
        let final_path = final_path.into();
        let temp_path = temporary_path(&final_path)?;
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        debug!("Opened temporary file {temp_path:?}");

        Ok(Self {
            file: Some(file),
            temp_path,
            final_path,
            committed: false,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data).await,
            None => Err(io::Error::other("file was already closed")),
        }
    }

    /// Flushes everything to disk and moves the file under its final name.
    pub async fn commit(mut self) -> io::Result<PathBuf> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        self.committed = true;
        debug!("Committed {:?}", self.final_path);
        Ok(self.final_path.clone())
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.file.take());
        // Blocking, but a single unlink. Drop can't await.
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => debug!("Removed abandoned {:?}", self.temp_path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => warn!("Couldn't remove abandoned {:?}: {e}", self.temp_path),
        }
    }
}

fn temporary_path(final_path: &Path) -> io::Result<PathBuf> {
    let Some(name) = final_path.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{final_path:?} has no file name"),
        ));
    };
    let mut temp_name = OsString::from(".");
    temp_name.push(name);
    temp_name.push(TEMP_SUFFIX);
    Ok(final_path.with_file_name(temp_name))
}

/// Whether `name` is an uncommitted [AtomicFile].
pub fn is_temporary_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{is_temporary_name, AtomicFile};

    fn names_in(dir: &std::path::Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_commit_moves_into_place() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("record.arrow");

        let mut file = AtomicFile::create(&target).await?;
        assert_eq!(file.temp_path(), dir.path().join(".record.arrow.tmp"));
        file.write_all(b"hello ").await?;
        file.write_all(b"world").await?;
        assert!(!target.exists());

        let path = file.commit().await?;

        assert_eq!(path, target);
        assert_eq!(fs::read(&target)?, b"hello world");
        assert_eq!(names_in(dir.path()), vec!["record.arrow".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_write_leaves_nothing_behind() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("record.arrow");

        let mut file = AtomicFile::create(&target).await?;
        file.write_all(b"half a rec").await?;
        drop(file);

        assert!(!target.exists());
        assert!(names_in(dir.path()).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_same_temporary_name_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("record.arrow");

        let _first = AtomicFile::create(&target).await?;
        let second = AtomicFile::create(&target).await;

        assert_eq!(
            second.err().map(|e| e.kind()),
            Some(std::io::ErrorKind::AlreadyExists)
        );
        Ok(())
    }

    #[test]
    fn test_temporary_names() {
        assert!(is_temporary_name(".task_20240101_100000_abc.arrow.tmp"));
        assert!(!is_temporary_name("task_20240101_100000_abc.arrow"));
        assert!(!is_temporary_name("notes.tmp"));
    }
}
