use std::path::PathBuf;

/// Path of the tracker binary installed next to the launcher.
pub fn to_tracker_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name("tasklog");
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}
