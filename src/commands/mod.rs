// ABOUTME: Command module aggregator for the rollwright CLI.
// ABOUTME: Re-exports deploy, rollback, status and validate command handlers.

mod deploy;
mod rollback;
mod status;
mod validate;

pub use deploy::{DeployOptions, deploy};
pub use rollback::rollback;
pub use status::{StatusOptions, status};
pub use validate::validate;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use rollwright::output::Output;
use rollwright::progress::{FanoutSink, ProgressSink, TracingSink};

/// Progress goes to the log and to the terminal.
fn progress_sink(output: &Arc<Output>) -> Arc<dyn ProgressSink> {
    Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(output.clone()),
    )
}

/// A token cancelled on Ctrl-C, so in-flight rollouts stop waiting and roll back.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}
