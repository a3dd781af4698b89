use anyhow::Result;

/// The launcher only waits on a child process, so it doesn't need worker threads.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
