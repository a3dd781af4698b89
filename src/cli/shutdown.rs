use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancellation` on Ctrl-C. Returns early if something else cancels first.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => {},
    };
}
