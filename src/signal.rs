//! Ctrl-C handling for foreground agent sessions.

use tokio_util::sync::CancellationToken;

/// Return a token that is cancelled on the first Ctrl-C.
///
/// The watcher runs on its own thread with a single-threaded tokio runtime,
/// so the rest of the program stays synchronous. If the handler cannot be
/// installed the token simply never fires.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();

    let spawned = std::thread::Builder::new()
        .name("vp-interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot start interrupt watcher");
                    return;
                }
            };

            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => {
                            tracing::debug!("interrupt received");
                            watcher.cancel();
                        }
                        Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
                    },
                    _ = watcher.cancelled() => {}
                }
            });
        });

    if let Err(e) = spawned {
        tracing::warn!(error = %e, "cannot spawn interrupt watcher");
    }
    token
}
