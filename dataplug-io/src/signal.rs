//! Interrupt handling

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Token tripped by the first Ctrl-C
///
/// The listener runs on the current runtime and stops after the first
/// interrupt. The SIGINT handler stays installed for the life of the
/// process, so later interrupts are ignored. A stdin read may still be
/// pending when the pipeline returns; shut the runtime down with
/// `shutdown_background` rather than dropping it.
pub fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, finishing output");
                trigger.cancel();
            }
            Err(err) => debug!(error = %err, "Interrupt handler unavailable"),
        }
    });
    token
}
