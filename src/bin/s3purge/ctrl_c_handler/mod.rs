// Cancels the run on Ctrl+C. Exits quietly once the token is cancelled
// by anyone else.

use s3purge_rs::PurgeCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: PurgeCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("run cancelled; ctrl-c handler stopped.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received. The in-flight S3 request is abandoned; completed pages stay deleted.");
                cancellation_token.cancel();
            }
        }
    })
}
